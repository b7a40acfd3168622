//! Named-file stores holding index data.
//!
//! Every backend implements [`Storage`]: a flat namespace of byte files
//! opened as seekable [`StorageInput`]s and written through
//! [`StorageOutput`]s. The binary encodings on top of those streams live in
//! [`stream`].
//!
//! - [`file::FileStorage`] keeps one OS file per name in a directory and can
//!   memory-map its inputs.
//! - [`memory::MemoryStorage`] keeps finished files as shared buffers.
//! - [`CompoundStore`] is a read-only view of the entries packed into a
//!   single compound file of another store; [`CompoundWriter`] packs them.
//!
//! ```
//! use std::sync::Arc;
//!
//! use xiphos::storage::{CompoundWriter, DataOutput, StorageConfig, StorageFactory};
//!
//! # fn main() -> xiphos::error::Result<()> {
//! let store = StorageFactory::create(StorageConfig::default())?;
//! let mut out = store.create_output("_0.frq")?;
//! out.write_vint(42)?;
//! out.close()?;
//!
//! let mut writer = CompoundWriter::new(Arc::clone(&store), "_0.cfs");
//! writer.add_file("_0.frq")?;
//! writer.close()?;
//!
//! let compound = StorageFactory::create(StorageConfig::compound(store, "_0.cfs"))?;
//! assert!(compound.file_exists("_0.frq"));
//! # Ok(())
//! # }
//! ```

use std::io::{Read, Seek, Write};
use std::sync::Arc;

use crate::error::{Result, XiphosError};

pub mod compound;
pub mod file;
pub mod memory;
pub mod stream;

pub use compound::{CompoundStore, CompoundWriter};
pub use stream::{DataInput, DataOutput};

/// File metadata information.
#[derive(Debug, Clone)]
pub struct FileMetadata {
    /// File size in bytes.
    pub size: u64,

    /// Last modified time (seconds since epoch).
    pub modified: u64,

    /// Whether the file is read-only.
    pub readonly: bool,
}

/// A trait for storage backends that can store and retrieve data.
pub trait Storage: Send + Sync + std::fmt::Debug {
    /// Open an existing file for reading.
    fn open_input(&self, name: &str) -> Result<Box<dyn StorageInput>>;

    /// Create a file for writing, truncating any previous contents.
    fn create_output(&self, name: &str) -> Result<Box<dyn StorageOutput>>;

    /// Check if a file exists.
    fn file_exists(&self, name: &str) -> bool;

    /// Delete a file.
    fn delete_file(&self, name: &str) -> Result<()>;

    /// List all files in the storage, sorted by name.
    fn list_files(&self) -> Result<Vec<String>>;

    /// Get the size of a file in bytes.
    fn file_size(&self, name: &str) -> Result<u64>;

    /// Get file metadata.
    fn metadata(&self, name: &str) -> Result<FileMetadata>;

    /// Rename a file.
    fn rename_file(&self, old_name: &str, new_name: &str) -> Result<()>;

    /// Acquire an advisory lock with the given name.
    fn make_lock(&self, name: &str) -> Result<Box<dyn StorageLock>>;

    /// Sync all pending writes to storage.
    fn sync(&self) -> Result<()>;

    /// Close the storage and release resources.
    fn close(&mut self) -> Result<()>;
}

/// A trait for reading data from storage.
pub trait StorageInput: Read + Seek + Send + std::fmt::Debug {
    /// Get the size of the input stream.
    fn size(&self) -> Result<u64>;

    /// Clone this input stream. The clone has its own position.
    fn clone_input(&self) -> Result<Box<dyn StorageInput>>;

    /// Close the input stream.
    fn close(&mut self) -> Result<()>;
}

/// A trait for writing data to storage.
pub trait StorageOutput: Write + Seek + Send + std::fmt::Debug {
    /// Flush and sync the output to storage.
    fn flush_and_sync(&mut self) -> Result<()>;

    /// Get the current position in the output stream.
    fn position(&self) -> Result<u64>;

    /// Close the output stream.
    fn close(&mut self) -> Result<()>;
}

// Implement StorageOutput for Box<dyn StorageOutput> to allow trait objects
impl StorageOutput for Box<dyn StorageOutput> {
    fn flush_and_sync(&mut self) -> Result<()> {
        self.as_mut().flush_and_sync()
    }

    fn position(&self) -> Result<u64> {
        self.as_ref().position()
    }

    fn close(&mut self) -> Result<()> {
        self.as_mut().close()
    }
}

// Implement StorageInput for Box<dyn StorageInput> to allow trait objects
impl StorageInput for Box<dyn StorageInput> {
    fn size(&self) -> Result<u64> {
        self.as_ref().size()
    }

    fn clone_input(&self) -> Result<Box<dyn StorageInput>> {
        self.as_ref().clone_input()
    }

    fn close(&mut self) -> Result<()> {
        self.as_mut().close()
    }
}

/// Hands out named locks for one storage.
pub trait LockManager: Send + Sync + std::fmt::Debug {
    /// Take the lock `name`, failing when somebody else holds it.
    fn acquire_lock(&self, name: &str) -> Result<Box<dyn StorageLock>>;

    /// Take the lock `name` if it is free.
    fn try_acquire_lock(&self, name: &str) -> Result<Option<Box<dyn StorageLock>>>;

    /// Whether the lock `name` is currently held.
    fn lock_exists(&self, name: &str) -> bool;

    /// Drop every lock handed out so far.
    fn release_all(&self) -> Result<()>;
}

/// A held lock. Dropping it releases it.
pub trait StorageLock: Send + std::fmt::Debug {
    /// Lock name.
    fn name(&self) -> &str;

    /// Release early.
    fn release(&mut self) -> Result<()>;

    /// False once released or broken.
    fn is_valid(&self) -> bool;
}

/// Which backend [`StorageFactory::create`] builds.
#[derive(Debug, Clone)]
pub enum StorageConfig {
    /// A directory of files.
    File(file::FileStorageConfig),

    /// Shared in-memory buffers.
    Memory(memory::MemoryStorageConfig),

    /// The entries of compound file `name` inside `parent`.
    Compound {
        parent: Arc<dyn Storage>,
        name: String,
    },
}

impl StorageConfig {
    /// Configuration for a directory at `path` with default settings.
    pub fn file<P: AsRef<std::path::Path>>(path: P) -> Self {
        StorageConfig::File(file::FileStorageConfig::new(path))
    }

    /// Configuration for the compound file `name` of `parent`.
    pub fn compound(parent: Arc<dyn Storage>, name: &str) -> Self {
        StorageConfig::Compound {
            parent,
            name: name.to_string(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig::Memory(memory::MemoryStorageConfig::default())
    }
}

/// Builds a [`Storage`] from a [`StorageConfig`].
pub struct StorageFactory;

impl StorageFactory {
    /// Open the configured backend. Compound stores read their directory
    /// here, so a missing or truncated compound file fails immediately.
    pub fn create(config: StorageConfig) -> Result<Arc<dyn Storage>> {
        Ok(match config {
            StorageConfig::File(file_config) => Arc::new(file::FileStorage::new(file_config)?),
            StorageConfig::Memory(mem_config) => Arc::new(memory::MemoryStorage::new(mem_config)),
            StorageConfig::Compound { parent, name } => {
                Arc::new(CompoundStore::open(parent, &name)?)
            }
        })
    }
}

/// Failures raised by the file and memory backends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// No file with this name.
    FileNotFound(String),

    /// A file with this name is in the way.
    FileExists(String),

    /// The OS refused access to this file.
    PermissionDenied(String),

    /// Any other OS level failure.
    IoError(String),

    /// The named lock is held elsewhere.
    LockFailed(String),

    /// The storage was closed.
    StorageClosed,

    /// The backend does not support the operation.
    InvalidOperation(String),
}

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageError::FileNotFound(name) => write!(f, "File {name} does not exist"),
            StorageError::FileExists(name) => write!(f, "File {name} already exists"),
            StorageError::PermissionDenied(name) => write!(f, "Permission denied for {name}"),
            StorageError::IoError(msg) => f.write_str(msg),
            StorageError::LockFailed(name) => write!(f, "Couldn't obtain lock \"{name}\""),
            StorageError::StorageClosed => f.write_str("Storage is closed"),
            StorageError::InvalidOperation(msg) => f.write_str(msg),
        }
    }
}

impl std::error::Error for StorageError {}

impl From<StorageError> for XiphosError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::StorageClosed => XiphosError::state(err.to_string()),
            StorageError::InvalidOperation(msg) => XiphosError::unsupported(msg),
            StorageError::LockFailed(_) => XiphosError::storage(err.to_string()),
            _ => XiphosError::io(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::file::FileStorageConfig;

    #[test]
    fn test_storage_config_default() {
        match StorageConfig::default() {
            StorageConfig::Memory(mem_config) => assert_eq!(mem_config.initial_capacity, 16),
            other => panic!("Expected Memory config, got {other:?}"),
        }
    }

    #[test]
    fn test_file_storage_config() {
        let config = FileStorageConfig::new("/tmp/test");
        assert_eq!(config.path, std::path::PathBuf::from("/tmp/test"));
        assert!(!config.use_mmap);
        assert_eq!(config.buffer_size, 65536);
        assert!(!config.sync_writes);
        assert!(config.use_locking);
    }

    #[test]
    fn test_storage_error_taxonomy() {
        let err: XiphosError = StorageError::FileNotFound("_0.frq".to_string()).into();
        assert_eq!(err.to_string(), "I/O error: File _0.frq does not exist");
        assert!(err.is_io());

        let err: XiphosError = StorageError::StorageClosed.into();
        assert_eq!(err.to_string(), "State error: Storage is closed");

        let err: XiphosError = StorageError::InvalidOperation("no renames".to_string()).into();
        assert!(matches!(err, XiphosError::Unsupported(_)));

        let err: XiphosError = StorageError::LockFailed("write".to_string()).into();
        assert_eq!(err.to_string(), "Storage error: Couldn't obtain lock \"write\"");
    }

    #[test]
    fn test_factory_file_with_mmap() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let mut file_config = FileStorageConfig::new(temp_dir.path());
        file_config.use_mmap = true;
        let storage = StorageFactory::create(StorageConfig::File(file_config)).unwrap();

        let mut output = storage.create_output("_0.tis").unwrap();
        output.write_string("segment terms").unwrap();
        output.close().unwrap();

        let mut input = storage.open_input("_0.tis").unwrap();
        assert_eq!(input.read_string().unwrap(), "segment terms");
    }

    #[test]
    fn test_factory_compound() {
        let parent = StorageFactory::create(StorageConfig::default()).unwrap();
        let mut output = parent.create_output("_0.fdt").unwrap();
        output.write_uint(7).unwrap();
        output.close().unwrap();

        let mut writer = CompoundWriter::new(Arc::clone(&parent), "_0.cfs");
        writer.add_file("_0.fdt").unwrap();
        writer.close().unwrap();

        let compound =
            StorageFactory::create(StorageConfig::compound(Arc::clone(&parent), "_0.cfs")).unwrap();
        assert_eq!(compound.list_files().unwrap(), vec!["_0.fdt"]);
        assert_eq!(compound.open_input("_0.fdt").unwrap().read_uint().unwrap(), 7);

        let missing = StorageFactory::create(StorageConfig::compound(parent, "_1.cfs"));
        assert!(missing.is_err());
    }
}
