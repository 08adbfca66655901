//! bucketfs: a hierarchical file tree over flat, key-addressed object storage.
//!
//! `vfs::BucketFs` maps paths onto object keys, infers directories from key
//! prefixes and hands out whole-object or range-cached read handles. Backends
//! implement `cadapter::client::ObjectBackend`.

pub mod cadapter;
pub mod error;
pub mod object;
pub mod vfs;

pub use error::{Error, ErrorKind, Result};
pub use vfs::{BucketFs, FileAttr, FileSystem, FileType, FsConfig};
