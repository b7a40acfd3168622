//! Compound files: many logical files packed into one physical file.
//!
//! Layout:
//!
//! ```text
//! vint   entry count
//! repeat entry count times:
//!     u64    data offset (big-endian, absolute)
//!     string file name
//! file data, concatenated in directory order
//! ```
//!
//! Entry lengths are not stored. Each entry runs up to the next entry's
//! offset and the last one runs to the end of the physical file.

use std::io::{self, Read, Seek, SeekFrom};
use std::sync::Arc;

use ahash::AHashMap;
use log::debug;
use parking_lot::Mutex;

use crate::error::{Result, XiphosError};
use crate::storage::{
    DataInput, DataOutput, FileMetadata, Storage, StorageInput, StorageLock, StorageOutput,
};
use crate::util::{HashKeyStatus, HashSet};

const COPY_BUFFER_SIZE: usize = 1024;

type SharedInput = Arc<Mutex<Option<Box<dyn StorageInput>>>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FileEntry {
    offset: u64,
    length: u64,
}

/// Read-only [`Storage`] over a compound file.
///
/// Every input opened from the store shares the parent stream, so reads
/// are serialised on the parent's mutex. Closing the store invalidates
/// all outstanding inputs.
#[derive(Debug)]
pub struct CompoundStore {
    name: String,
    store: Arc<dyn Storage>,
    entries: AHashMap<String, FileEntry>,
    names: Vec<String>,
    stream: SharedInput,
}

impl CompoundStore {
    /// Open the compound file `name` inside `store` and read its directory.
    pub fn open(store: Arc<dyn Storage>, name: &str) -> Result<Self> {
        let mut stream = store.open_input(name)?;
        let file_length = stream.size()?;

        let count = stream.read_vint()?;
        // Each directory entry takes at least a u64 offset and a length byte.
        if u64::from(count) > file_length / 9 {
            return Err(XiphosError::io(format!(
                "Corrupt compound file {name}: directory of {count} entries in {file_length} bytes"
            )));
        }
        let mut entries = AHashMap::with_capacity(count as usize);
        let mut names = Vec::with_capacity(count as usize);
        let mut previous: Option<(String, u64)> = None;

        for _ in 0..count {
            let offset = stream.read_ulong()?;
            let file_name = stream.read_string()?;
            if offset > file_length {
                return Err(XiphosError::io(format!(
                    "Corrupt compound file {name}: entry {file_name} starts at {offset} past the end <{file_length}>"
                )));
            }

            if let Some((prev_name, prev_offset)) = previous.take() {
                entries.insert(
                    prev_name,
                    FileEntry {
                        offset: prev_offset,
                        length: offset.saturating_sub(prev_offset),
                    },
                );
            }
            names.push(file_name.clone());
            previous = Some((file_name, offset));
        }

        if let Some((last_name, last_offset)) = previous {
            entries.insert(
                last_name,
                FileEntry {
                    offset: last_offset,
                    length: file_length.saturating_sub(last_offset),
                },
            );
        }

        debug!("opened compound store {name} with {count} entries");

        Ok(CompoundStore {
            name: name.to_string(),
            store,
            entries,
            names,
            stream: Arc::new(Mutex::new(Some(stream))),
        })
    }

    /// Name of the physical compound file.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The storage holding the physical file.
    pub fn parent(&self) -> &Arc<dyn Storage> {
        &self.store
    }

    /// Number of entries in the directory.
    pub fn count(&self) -> usize {
        self.entries.len()
    }

    /// Length of entry `name`, or 0 when there is no such entry.
    pub fn length(&self, name: &str) -> u64 {
        self.entries.get(name).map_or(0, |entry| entry.length)
    }

    /// Visit every entry name in directory order.
    pub fn each<F: FnMut(&str)>(&self, mut f: F) {
        for name in &self.names {
            f(name);
        }
    }

    /// True once [`Storage::close`] has been called.
    pub fn is_closed(&self) -> bool {
        self.stream.lock().is_none()
    }

    fn unsupported(op: &str) -> XiphosError {
        XiphosError::unsupported(format!("{op} is not supported by compound stores"))
    }
}

impl Storage for CompoundStore {
    fn open_input(&self, name: &str) -> Result<Box<dyn StorageInput>> {
        if self.is_closed() {
            return Err(XiphosError::io(
                "Can't open compound file input stream. Parent stream is closed.",
            ));
        }

        let entry = self
            .entries
            .get(name)
            .ok_or_else(|| XiphosError::io(format!("File {name} does not exist")))?;

        Ok(Box::new(CompoundInput {
            parent: Arc::clone(&self.stream),
            offset: entry.offset,
            length: entry.length,
            position: 0,
        }))
    }

    fn create_output(&self, _name: &str) -> Result<Box<dyn StorageOutput>> {
        Err(Self::unsupported("create_output"))
    }

    fn file_exists(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    fn delete_file(&self, _name: &str) -> Result<()> {
        Err(Self::unsupported("delete_file"))
    }

    fn list_files(&self) -> Result<Vec<String>> {
        let mut names = self.names.clone();
        names.sort();
        Ok(names)
    }

    fn file_size(&self, name: &str) -> Result<u64> {
        self.entries
            .get(name)
            .map(|entry| entry.length)
            .ok_or_else(|| XiphosError::io(format!("File {name} does not exist")))
    }

    fn metadata(&self, name: &str) -> Result<FileMetadata> {
        let size = self.file_size(name)?;
        let parent = self.store.metadata(&self.name)?;
        Ok(FileMetadata {
            size,
            modified: parent.modified,
            readonly: true,
        })
    }

    fn rename_file(&self, _old_name: &str, _new_name: &str) -> Result<()> {
        Err(Self::unsupported("rename_file"))
    }

    fn make_lock(&self, _name: &str) -> Result<Box<dyn StorageLock>> {
        Err(Self::unsupported("make_lock"))
    }

    fn sync(&self) -> Result<()> {
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        let mut stream = self
            .stream
            .lock()
            .take()
            .ok_or_else(|| XiphosError::io("Tried to close already closed compound store"))?;
        stream.close()?;
        self.entries.clear();
        self.names.clear();
        debug!("closed compound store {}", self.name);
        Ok(())
    }
}

/// A bounded view onto one entry of a compound file.
#[derive(Debug)]
pub struct CompoundInput {
    parent: SharedInput,
    offset: u64,
    length: u64,
    position: u64,
}

impl CompoundInput {
    /// Fill `buf` completely, failing with an EOF error if that would read
    /// past the end of the entry.
    pub fn read_checked(&mut self, buf: &mut [u8]) -> Result<()> {
        self.check_end(buf.len()).map_err(XiphosError::eof)?;
        self.read_at(buf)?;
        Ok(())
    }

    /// End position of a read of `len` bytes, or the EOF message when that
    /// read would leave the entry.
    fn check_end(&self, len: usize) -> std::result::Result<u64, String> {
        match self.position.checked_add(len as u64) {
            Some(end) if end <= self.length => Ok(end),
            Some(end) => Err(format!(
                "Tried to read past end of file. File length is <{}> and tried to read to <{}>",
                self.length, end
            )),
            None => Err(format!(
                "Tried to read past end of file. File length is <{}> and tried to read {} bytes from <{}>",
                self.length, len, self.position
            )),
        }
    }

    fn read_at(&mut self, buf: &mut [u8]) -> io::Result<()> {
        let mut guard = self.parent.lock();
        let parent = guard
            .as_mut()
            .ok_or_else(|| io::Error::other("Compound store is closed"))?;
        parent.seek(SeekFrom::Start(self.offset + self.position))?;
        parent.read_exact(buf)?;
        self.position += buf.len() as u64;
        Ok(())
    }
}

impl Read for CompoundInput {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let remaining = self.length.saturating_sub(self.position);
        let n = (buf.len() as u64).min(remaining) as usize;
        if n > 0 {
            self.read_at(&mut buf[..n])?;
        }
        Ok(n)
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> io::Result<()> {
        self.check_end(buf.len())
            .map_err(|msg| io::Error::new(io::ErrorKind::UnexpectedEof, msg))?;
        self.read_at(buf)
    }
}

impl Seek for CompoundInput {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let new_pos = match pos {
            SeekFrom::Start(offset) => Some(offset),
            SeekFrom::End(offset) => self.length.checked_add_signed(offset),
            SeekFrom::Current(offset) => self.position.checked_add_signed(offset),
        }
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "Invalid seek position"))?;

        self.position = new_pos;
        Ok(new_pos)
    }
}

impl StorageInput for CompoundInput {
    fn size(&self) -> Result<u64> {
        Ok(self.length)
    }

    fn clone_input(&self) -> Result<Box<dyn StorageInput>> {
        Ok(Box::new(CompoundInput {
            parent: Arc::clone(&self.parent),
            offset: self.offset,
            length: self.length,
            position: self.position,
        }))
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

#[derive(Debug)]
struct WriterEntry {
    name: Arc<String>,
    dir_offset: u64,
    data_offset: u64,
}

/// Packs existing files of a storage into a single compound file.
#[derive(Debug)]
pub struct CompoundWriter {
    store: Arc<dyn Storage>,
    name: String,
    ids: HashSet<String>,
}

impl CompoundWriter {
    /// Start a compound file called `name` in `store`.
    pub fn new(store: Arc<dyn Storage>, name: &str) -> Self {
        CompoundWriter {
            store,
            name: name.to_string(),
            ids: HashSet::new(),
        }
    }

    /// Register a file to be packed. Files are laid out in registration
    /// order; registering the same name twice is an I/O error.
    pub fn add_file(&mut self, id: &str) -> Result<()> {
        match self.ids.add(Arc::new(id.to_string())) {
            HashKeyStatus::DoesNotExist => Ok(()),
            _ => Err(XiphosError::io(format!(
                "Tried to add file \"{id}\" which has already been added to the compound store"
            ))),
        }
    }

    /// Number of registered files.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// True when no file has been registered.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Write the compound file and consume the writer.
    pub fn close(self) -> Result<()> {
        if self.ids.is_empty() {
            return Err(XiphosError::state(
                "Tried to merge compound file with no entries",
            ));
        }

        let mut entries: Vec<WriterEntry> = self
            .ids
            .iter()
            .map(|name| WriterEntry {
                name: Arc::clone(name),
                dir_offset: 0,
                data_offset: 0,
            })
            .collect();

        let mut os = self.store.create_output(&self.name)?;
        os.write_vint(entries.len() as u32)?;

        // Offsets are patched once the data has been copied.
        for entry in entries.iter_mut() {
            entry.dir_offset = os.position()?;
            os.write_ulong(0)?;
            os.write_string(&entry.name)?;
        }

        for entry in entries.iter_mut() {
            entry.data_offset = os.position()?;
            self.copy_file(&entry.name, &mut os)?;
        }

        for entry in &entries {
            os.seek(SeekFrom::Start(entry.dir_offset))?;
            os.write_ulong(entry.data_offset)?;
        }

        os.close()?;
        debug!(
            "wrote compound file {} with {} entries",
            self.name,
            entries.len()
        );
        Ok(())
    }

    fn copy_file(&self, name: &str, os: &mut Box<dyn StorageOutput>) -> Result<()> {
        let start = os.position()?;
        let mut is = self.store.open_input(name)?;
        let length = is.size()?;
        let mut remainder = length;
        let mut buffer = [0u8; COPY_BUFFER_SIZE];

        while remainder > 0 {
            let len = remainder.min(COPY_BUFFER_SIZE as u64) as usize;
            is.read_exact(&mut buffer[..len])?;
            os.write_bytes(&buffer[..len])?;
            remainder -= len as u64;
        }

        let written = os.position()? - start;
        if written != length {
            return Err(XiphosError::io(format!(
                "Difference in compound file output file offsets <{written}> does not match the original file length <{length}>"
            )));
        }

        is.close()
    }
}
