//! In-memory storage implementation for testing and caching.

use std::io::{Cursor, Read, Seek, SeekFrom, Write};
use std::sync::Arc;

use ahash::{AHashMap, AHashSet};
use parking_lot::Mutex;

use crate::error::Result;
use crate::storage::{
    FileMetadata, LockManager, Storage, StorageError, StorageInput, StorageLock, StorageOutput,
};

type FileMap = Arc<Mutex<AHashMap<String, Arc<[u8]>>>>;

/// Configuration specific to memory-based storage.
#[derive(Debug, Clone)]
pub struct MemoryStorageConfig {
    /// Initial capacity of the file map.
    pub initial_capacity: usize,
}

impl Default for MemoryStorageConfig {
    fn default() -> Self {
        MemoryStorageConfig {
            initial_capacity: 16,
        }
    }
}

/// An in-memory storage implementation.
///
/// Finished files are kept as shared `Arc<[u8]>` buffers so that inputs
/// and their clones never copy file data.
#[derive(Debug)]
pub struct MemoryStorage {
    files: FileMap,
    lock_manager: Arc<MemoryLockManager>,
    closed: bool,
}

impl MemoryStorage {
    /// Create a new memory storage.
    pub fn new(config: MemoryStorageConfig) -> Self {
        MemoryStorage {
            files: Arc::new(Mutex::new(AHashMap::with_capacity(config.initial_capacity))),
            lock_manager: Arc::new(MemoryLockManager::new()),
            closed: false,
        }
    }

    /// Create a new memory storage with default configuration.
    pub fn new_default() -> Self {
        Self::new(MemoryStorageConfig::default())
    }

    fn check_closed(&self) -> Result<()> {
        if self.closed {
            Err(StorageError::StorageClosed.into())
        } else {
            Ok(())
        }
    }

    /// Get the number of files stored.
    pub fn file_count(&self) -> usize {
        self.files.lock().len()
    }

    /// Get the total size of all files.
    pub fn total_size(&self) -> u64 {
        self.files.lock().values().map(|data| data.len() as u64).sum()
    }

    /// Clear all files from storage.
    pub fn clear(&self) -> Result<()> {
        self.check_closed()?;
        self.files.lock().clear();
        Ok(())
    }

    /// The lock manager shared by every lock handed out by this storage.
    pub fn lock_manager(&self) -> &MemoryLockManager {
        &self.lock_manager
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new_default()
    }
}

impl Storage for MemoryStorage {
    fn open_input(&self, name: &str) -> Result<Box<dyn StorageInput>> {
        self.check_closed()?;

        let files = self.files.lock();
        let data = files
            .get(name)
            .ok_or_else(|| StorageError::FileNotFound(name.to_string()))?;

        Ok(Box::new(MemoryInput::new(Arc::clone(data))))
    }

    fn create_output(&self, name: &str) -> Result<Box<dyn StorageOutput>> {
        self.check_closed()?;

        Ok(Box::new(MemoryOutput::new(
            name.to_string(),
            Arc::clone(&self.files),
        )))
    }

    fn file_exists(&self, name: &str) -> bool {
        if self.closed {
            return false;
        }
        self.files.lock().contains_key(name)
    }

    fn delete_file(&self, name: &str) -> Result<()> {
        self.check_closed()?;
        self.files.lock().remove(name);
        Ok(())
    }

    fn list_files(&self) -> Result<Vec<String>> {
        self.check_closed()?;

        let mut file_names: Vec<String> = self.files.lock().keys().cloned().collect();
        file_names.sort();
        Ok(file_names)
    }

    fn file_size(&self, name: &str) -> Result<u64> {
        self.check_closed()?;

        let files = self.files.lock();
        let data = files
            .get(name)
            .ok_or_else(|| StorageError::FileNotFound(name.to_string()))?;

        Ok(data.len() as u64)
    }

    fn metadata(&self, name: &str) -> Result<FileMetadata> {
        let size = self.file_size(name)?;
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();

        Ok(FileMetadata {
            size,
            modified: now,
            readonly: false,
        })
    }

    fn rename_file(&self, old_name: &str, new_name: &str) -> Result<()> {
        self.check_closed()?;

        let mut files = self.files.lock();
        let data = files
            .remove(old_name)
            .ok_or_else(|| StorageError::FileNotFound(old_name.to_string()))?;

        files.insert(new_name.to_string(), data);
        Ok(())
    }

    fn make_lock(&self, name: &str) -> Result<Box<dyn StorageLock>> {
        self.check_closed()?;
        self.lock_manager.acquire_lock(name)
    }

    fn sync(&self) -> Result<()> {
        self.check_closed()
    }

    fn close(&mut self) -> Result<()> {
        self.closed = true;
        self.lock_manager.release_all()
    }
}

/// A memory-based input implementation.
#[derive(Debug)]
pub struct MemoryInput {
    cursor: Cursor<Arc<[u8]>>,
}

impl MemoryInput {
    /// Read from a shared buffer.
    pub fn new(data: Arc<[u8]>) -> Self {
        MemoryInput {
            cursor: Cursor::new(data),
        }
    }
}

impl Read for MemoryInput {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.cursor.read(buf)
    }
}

impl Seek for MemoryInput {
    fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
        self.cursor.seek(pos)
    }
}

impl StorageInput for MemoryInput {
    fn size(&self) -> Result<u64> {
        Ok(self.cursor.get_ref().len() as u64)
    }

    fn clone_input(&self) -> Result<Box<dyn StorageInput>> {
        Ok(Box::new(MemoryInput::new(Arc::clone(self.cursor.get_ref()))))
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// A memory-based output implementation.
///
/// Writes land at the current position, overwriting earlier bytes after a
/// seek. The file becomes visible to readers when the output is closed or
/// dropped.
#[derive(Debug)]
pub struct MemoryOutput {
    name: String,
    buffer: Vec<u8>,
    files: FileMap,
    position: u64,
    closed: bool,
}

impl MemoryOutput {
    fn new(name: String, files: FileMap) -> Self {
        MemoryOutput {
            name,
            buffer: Vec::new(),
            files,
            position: 0,
            closed: false,
        }
    }
}

impl Write for MemoryOutput {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        if self.closed {
            return Err(std::io::Error::other("Output is closed"));
        }

        let start = self.position as usize;
        let end = start + buf.len();
        if end > self.buffer.len() {
            self.buffer.resize(end, 0);
        }
        self.buffer[start..end].copy_from_slice(buf);
        self.position = end as u64;
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl Seek for MemoryOutput {
    fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
        if self.closed {
            return Err(std::io::Error::other("Output is closed"));
        }

        let (base, offset) = match pos {
            SeekFrom::Start(offset) => {
                self.position = offset;
                return Ok(offset);
            }
            SeekFrom::End(offset) => (self.buffer.len() as u64, offset),
            SeekFrom::Current(offset) => (self.position, offset),
        };

        let new_pos = base.checked_add_signed(offset).ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "Invalid seek position")
        })?;
        self.position = new_pos;
        Ok(new_pos)
    }
}

impl StorageOutput for MemoryOutput {
    fn flush_and_sync(&mut self) -> Result<()> {
        Ok(())
    }

    fn position(&self) -> Result<u64> {
        Ok(self.position)
    }

    fn close(&mut self) -> Result<()> {
        if !self.closed {
            let data: Arc<[u8]> = std::mem::take(&mut self.buffer).into();
            self.files.lock().insert(self.name.clone(), data);
            self.closed = true;
        }
        Ok(())
    }
}

impl Drop for MemoryOutput {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

/// A memory-based lock manager.
#[derive(Debug, Default)]
pub struct MemoryLockManager {
    locks: Arc<Mutex<AHashSet<String>>>,
}

impl MemoryLockManager {
    fn new() -> Self {
        Self::default()
    }
}

impl LockManager for MemoryLockManager {
    fn acquire_lock(&self, name: &str) -> Result<Box<dyn StorageLock>> {
        let mut locks = self.locks.lock();

        if !locks.insert(name.to_string()) {
            return Err(StorageError::LockFailed(name.to_string()).into());
        }

        Ok(Box::new(MemoryLock {
            name: name.to_string(),
            locks: Arc::clone(&self.locks),
            released: false,
        }))
    }

    fn try_acquire_lock(&self, name: &str) -> Result<Option<Box<dyn StorageLock>>> {
        if self.lock_exists(name) {
            return Ok(None);
        }
        self.acquire_lock(name).map(Some)
    }

    fn lock_exists(&self, name: &str) -> bool {
        self.locks.lock().contains(name)
    }

    fn release_all(&self) -> Result<()> {
        self.locks.lock().clear();
        Ok(())
    }
}

/// A lock held in a [`MemoryLockManager`]. Released on drop.
#[derive(Debug)]
struct MemoryLock {
    name: String,
    locks: Arc<Mutex<AHashSet<String>>>,
    released: bool,
}

impl StorageLock for MemoryLock {
    fn name(&self) -> &str {
        &self.name
    }

    fn release(&mut self) -> Result<()> {
        if !self.released {
            self.locks.lock().remove(&self.name);
            self.released = true;
        }
        Ok(())
    }

    fn is_valid(&self) -> bool {
        !self.released && self.locks.lock().contains(&self.name)
    }
}

impl Drop for MemoryLock {
    fn drop(&mut self) {
        let _ = self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{DataInput, DataOutput};

    #[test]
    fn test_memory_storage_creation() {
        let storage = MemoryStorage::new_default();
        assert_eq!(storage.file_count(), 0);
        assert_eq!(storage.total_size(), 0);
    }

    #[test]
    fn test_create_and_read_file() {
        let storage = MemoryStorage::new_default();

        let mut output = storage.create_output("test.txt").unwrap();
        output.write_all(b"Hello, Memory!").unwrap();
        output.close().unwrap();

        let mut input = storage.open_input("test.txt").unwrap();
        let mut buffer = Vec::new();
        input.read_to_end(&mut buffer).unwrap();

        assert_eq!(buffer, b"Hello, Memory!");
        assert_eq!(input.size().unwrap(), 14);
        assert_eq!(storage.file_count(), 1);
        assert_eq!(storage.total_size(), 14);
    }

    #[test]
    fn test_file_operations() {
        let storage = MemoryStorage::new_default();

        assert!(!storage.file_exists("nonexistent.txt"));

        let mut output = storage.create_output("test.txt").unwrap();
        output.write_all(b"Test content").unwrap();
        output.close().unwrap();

        assert!(storage.file_exists("test.txt"));
        assert_eq!(storage.file_size("test.txt").unwrap(), 12);
        assert_eq!(storage.list_files().unwrap(), vec!["test.txt"]);

        storage.rename_file("test.txt", "renamed.txt").unwrap();
        assert!(!storage.file_exists("test.txt"));
        assert!(storage.file_exists("renamed.txt"));

        storage.delete_file("renamed.txt").unwrap();
        assert!(!storage.file_exists("renamed.txt"));
        assert_eq!(storage.file_count(), 0);
    }

    #[test]
    fn test_multiple_files() {
        let storage = MemoryStorage::new_default();

        for i in (0..5).rev() {
            let mut output = storage.create_output(&format!("file_{i}.txt")).unwrap();
            output.write_all(format!("Content {i}").as_bytes()).unwrap();
            output.close().unwrap();
        }

        let files = storage.list_files().unwrap();
        assert_eq!(files.len(), 5);
        for (i, file) in files.iter().enumerate() {
            assert_eq!(file, &format!("file_{i}.txt"));
        }
    }

    #[test]
    fn test_output_drop_stores_file() {
        let storage = MemoryStorage::new_default();
        {
            let mut output = storage.create_output("dropped").unwrap();
            output.write_all(b"abc").unwrap();
        }
        assert_eq!(storage.file_size("dropped").unwrap(), 3);
    }

    #[test]
    fn test_seek_back_and_patch() {
        let storage = MemoryStorage::new_default();

        let mut output = storage.create_output("patched").unwrap();
        output.write_ulong(0).unwrap();
        output.write_string("data").unwrap();
        assert_eq!(output.position().unwrap(), 13);
        output.seek(SeekFrom::Start(0)).unwrap();
        output.write_ulong(42).unwrap();
        output.seek(SeekFrom::End(0)).unwrap();
        output.write_byte(9).unwrap();
        output.close().unwrap();

        let mut input = storage.open_input("patched").unwrap();
        assert_eq!(input.size().unwrap(), 14);
        assert_eq!(input.read_ulong().unwrap(), 42);
        assert_eq!(input.read_string().unwrap(), "data");
        assert_eq!(input.read_byte().unwrap(), 9);
    }

    #[test]
    fn test_input_clone() {
        let storage = MemoryStorage::new_default();

        let mut output = storage.create_output("test.txt").unwrap();
        output.write_all(b"Hello, Clone!").unwrap();
        output.close().unwrap();

        let mut input1 = storage.open_input("test.txt").unwrap();
        input1.seek(SeekFrom::Start(7)).unwrap();
        let mut input2 = input1.clone_input().unwrap();

        let mut buffer1 = Vec::new();
        let mut buffer2 = Vec::new();
        input1.read_to_end(&mut buffer1).unwrap();
        input2.read_to_end(&mut buffer2).unwrap();

        assert_eq!(buffer1, b"Clone!");
        assert_eq!(buffer2, b"Hello, Clone!");
    }

    #[test]
    fn test_seek_operations() {
        let storage = MemoryStorage::new_default();

        let mut output = storage.create_output("test.txt").unwrap();
        output.write_all(b"0123456789").unwrap();
        output.close().unwrap();

        let mut input = storage.open_input("test.txt").unwrap();

        input.seek(SeekFrom::Start(5)).unwrap();
        let mut buffer = [0u8; 3];
        input.read_exact(&mut buffer).unwrap();
        assert_eq!(&buffer, b"567");

        input.seek(SeekFrom::End(-2)).unwrap();
        let mut buffer = [0u8; 2];
        input.read_exact(&mut buffer).unwrap();
        assert_eq!(&buffer, b"89");
    }

    #[test]
    fn test_file_not_found() {
        let storage = MemoryStorage::new_default();

        assert!(storage.open_input("nonexistent.txt").is_err());
        assert!(storage.file_size("nonexistent.txt").is_err());
        assert!(storage.rename_file("nonexistent.txt", "x").is_err());
    }

    #[test]
    fn test_storage_close() {
        let mut storage = MemoryStorage::new_default();

        storage.close().unwrap();
        assert!(storage.closed);
        assert!(storage.create_output("test.txt").is_err());
    }

    #[test]
    fn test_locks() {
        let storage = MemoryStorage::new_default();

        let mut lock = storage.make_lock("write").unwrap();
        assert_eq!(lock.name(), "write");
        assert!(lock.is_valid());
        assert!(storage.make_lock("write").is_err());
        assert!(storage.lock_manager().try_acquire_lock("write").unwrap().is_none());

        lock.release().unwrap();
        assert!(!lock.is_valid());
        let other = storage.make_lock("write").unwrap();
        drop(other);
        assert!(!storage.lock_manager().lock_exists("write"));
    }

    #[test]
    fn test_clear_storage() {
        let storage = MemoryStorage::new_default();

        for i in 0..3 {
            let mut output = storage.create_output(&format!("file_{i}.txt")).unwrap();
            output.write_all(b"content").unwrap();
            output.close().unwrap();
        }
        assert_eq!(storage.file_count(), 3);

        storage.clear().unwrap();
        assert_eq!(storage.file_count(), 0);
        assert_eq!(storage.total_size(), 0);
    }
}
