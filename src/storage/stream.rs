//! Primitive encodings shared by every index file.
//!
//! - `vint` / `vlong`: 7 bits per byte, low-order group first, high bit set
//!   on every byte but the last.
//! - `uint` / `ulong`: fixed-width big-endian.
//! - `string`: `vint` byte length followed by the UTF-8 bytes.

use std::io::{Read, Write};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use crate::error::{Result, XiphosError};

/// Encode a `u64` as a variable-length integer.
pub fn encode_vlong(value: u64) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(10);
    let mut val = value;
    loop {
        let mut byte = (val & 0x7F) as u8;
        val >>= 7;
        if val != 0 {
            byte |= 0x80;
        }
        bytes.push(byte);
        if val == 0 {
            return bytes;
        }
    }
}

/// Decode a variable-length integer from the front of `bytes`, returning
/// the value and the number of bytes consumed.
pub fn decode_vlong(bytes: &[u8]) -> Result<(u64, usize)> {
    let mut result = 0u64;
    let mut shift = 0;
    for (i, &byte) in bytes.iter().enumerate() {
        if shift >= 64 {
            return Err(XiphosError::io("VInt overflow"));
        }
        result |= u64::from(byte & 0x7F) << shift;
        if byte & 0x80 == 0 {
            return Ok((result, i + 1));
        }
        shift += 7;
    }
    Err(XiphosError::eof("Incomplete VInt"))
}

/// Reading side of the index encodings, available on every [`Read`].
pub trait DataInput: Read {
    /// Read a single byte.
    fn read_byte(&mut self) -> Result<u8> {
        Ok(self.read_u8()?)
    }

    /// Read exactly `len` bytes.
    ///
    /// The buffer grows with the bytes actually read, so a corrupt length
    /// prefix fails with an EOF error instead of a huge allocation.
    fn read_bytes(&mut self, len: usize) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(len.min(8192));
        Read::take(&mut *self, len as u64).read_to_end(&mut buf)?;
        if buf.len() < len {
            return Err(XiphosError::eof(format!(
                "Tried to read {len} bytes but only {} were left",
                buf.len()
            )));
        }
        Ok(buf)
    }

    /// Read a big-endian `u32`.
    fn read_uint(&mut self) -> Result<u32> {
        Ok(self.read_u32::<BigEndian>()?)
    }

    /// Read a big-endian `u64`.
    fn read_ulong(&mut self) -> Result<u64> {
        Ok(self.read_u64::<BigEndian>()?)
    }

    /// Read a variable-length `u64`.
    fn read_vlong(&mut self) -> Result<u64> {
        let mut result = 0u64;
        let mut shift = 0;
        loop {
            let byte = self.read_u8()?;
            if shift >= 64 {
                return Err(XiphosError::io("VInt overflow"));
            }
            result |= u64::from(byte & 0x7F) << shift;
            if byte & 0x80 == 0 {
                return Ok(result);
            }
            shift += 7;
        }
    }

    /// Read a variable-length `u32`.
    fn read_vint(&mut self) -> Result<u32> {
        let value = self.read_vlong()?;
        u32::try_from(value).map_err(|_| XiphosError::io(format!("VInt {value} overflows u32")))
    }

    /// Read a length-prefixed string.
    fn read_string(&mut self) -> Result<String> {
        let len = self.read_vint()? as usize;
        let bytes = self.read_bytes(len)?;
        String::from_utf8(bytes).map_err(|e| XiphosError::io(format!("Invalid string: {e}")))
    }
}

impl<R: Read + ?Sized> DataInput for R {}

/// Writing side of the index encodings, available on every [`Write`].
pub trait DataOutput: Write {
    /// Write a single byte.
    fn write_byte(&mut self, b: u8) -> Result<()> {
        Ok(self.write_u8(b)?)
    }

    /// Write raw bytes.
    fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        Ok(self.write_all(bytes)?)
    }

    /// Write a big-endian `u32`.
    fn write_uint(&mut self, value: u32) -> Result<()> {
        Ok(self.write_u32::<BigEndian>(value)?)
    }

    /// Write a big-endian `u64`.
    fn write_ulong(&mut self, value: u64) -> Result<()> {
        Ok(self.write_u64::<BigEndian>(value)?)
    }

    /// Write a variable-length `u64`, returning the encoded length.
    fn write_vlong(&mut self, value: u64) -> Result<usize> {
        let bytes = encode_vlong(value);
        self.write_all(&bytes)?;
        Ok(bytes.len())
    }

    /// Write a variable-length `u32`, returning the encoded length.
    fn write_vint(&mut self, value: u32) -> Result<usize> {
        self.write_vlong(u64::from(value))
    }

    /// Write a length-prefixed string.
    fn write_string(&mut self, s: &str) -> Result<()> {
        self.write_vint(s.len() as u32)?;
        self.write_bytes(s.as_bytes())
    }
}

impl<W: Write + ?Sized> DataOutput for W {}
