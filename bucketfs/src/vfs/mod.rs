//! VFS layer (virtual filesystem)
//!
//! Presents a flat object store as a file tree: paths are normalized and
//! mapped to keys, directories are inferred from key prefixes, and file
//! contents are served through whole-object or range-cached handles.
//!
//! Submodules:
//! - `path`: virtual path normalization and key mapping
//! - `resolver`: file/directory/absent classification and listings
//! - `fs`: the `BucketFs` adapter implementing `FileSystem`

pub mod fs;
pub mod path;
pub mod resolver;

use crate::error::Result;
use async_trait::async_trait;
use std::io::{Read, Seek, Write};
use std::time::SystemTime;

pub use fs::BucketFs;
pub use path::{PathMapper, VirtualPath};
pub use resolver::DirectoryResolver;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FileType {
    File,
    Dir,
}

/// Metadata of one file-tree entry. Directories are synthesized: size 0
/// and the UNIX epoch as modification time.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileAttr {
    pub name: String,
    pub size: u64,
    pub kind: FileType,
    pub mtime: SystemTime,
}

impl FileAttr {
    pub fn dir(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            size: 0,
            kind: FileType::Dir,
            mtime: SystemTime::UNIX_EPOCH,
        }
    }

    pub fn file(name: impl Into<String>, size: u64, mtime: Option<SystemTime>) -> Self {
        Self {
            name: name.into(),
            size,
            kind: FileType::File,
            mtime: mtime.unwrap_or(SystemTime::UNIX_EPOCH),
        }
    }

    pub fn is_dir(&self) -> bool {
        self.kind == FileType::Dir
    }
}

/// One page of a directory listing; `next` resumes the listing.
#[derive(Clone, Debug, Default)]
pub struct DirPage {
    pub entries: Vec<FileAttr>,
    pub next: Option<String>,
}

#[derive(Clone, Debug)]
pub struct FsConfig {
    /// Bucket-relative key prefix the tree is rooted at.
    pub prefix: String,
    /// Keys requested per listing call by `read_dir`.
    pub list_page_size: usize,
    /// Whether readers from `open_range_cached` fetch missed spans themselves.
    pub autofetch: bool,
}

impl Default for FsConfig {
    fn default() -> Self {
        Self {
            prefix: String::new(),
            list_page_size: 1000,
            autofetch: true,
        }
    }
}

/// Hierarchical filesystem surface.
#[async_trait]
pub trait FileSystem: Send + Sync {
    type File: Read + Seek + Send;
    type Writer: Write + Send;

    /// Opens the whole file for reading.
    async fn open(&self, path: &str) -> Result<Self::File>;

    async fn read_dir(&self, path: &str) -> Result<Vec<FileAttr>>;

    async fn lstat(&self, path: &str) -> Result<FileAttr>;

    async fn stat(&self, path: &str) -> Result<FileAttr> {
        self.lstat(path).await
    }

    /// Opens the file for writing, creating or truncating it.
    async fn create(&self, path: &str) -> Result<Self::Writer>;

    async fn remove(&self, path: &str) -> Result<()>;

    async fn mkdir(&self, path: &str) -> Result<()>;

    async fn mkdir_all(&self, path: &str) -> Result<()>;
}
