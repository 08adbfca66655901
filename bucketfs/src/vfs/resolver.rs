//! DirectoryResolver: infers directories from key prefixes.
//!
//! The store has no directory entities, so a path is a directory when at
//! least one key lives under `path/`, a file when an object exists at
//! exactly `path`, and absent otherwise. When both hold, the directory wins.

use super::path::{PathMapper, VirtualPath};
use super::{DirPage, FileAttr};
use crate::cadapter::client::{ObjectBackend, ObjectEntry};
use crate::error::Result;
use tracing::debug;

pub struct DirectoryResolver<'a, B: ObjectBackend> {
    backend: &'a B,
    mapper: &'a PathMapper,
}

impl<'a, B: ObjectBackend> DirectoryResolver<'a, B> {
    pub fn new(backend: &'a B, mapper: &'a PathMapper) -> Self {
        Self { backend, mapper }
    }

    /// Classifies `path`. The root is always a directory and costs no
    /// request; otherwise one single-key listing, then a head probe if the
    /// listing came back empty.
    pub async fn lstat(&self, path: &VirtualPath) -> Result<FileAttr> {
        if path.is_root() {
            return Ok(FileAttr::dir("."));
        }

        let prefix = self.mapper.dir_prefix(path);
        if !self.backend.list_by_prefix(&prefix, Some(1)).await?.is_empty() {
            debug!(%path, %prefix, "prefix has keys, treating as directory");
            return Ok(FileAttr::dir(path.base_name()));
        }

        let head = self.backend.head_object(&self.mapper.key(path)).await?;
        Ok(FileAttr::file(path.base_name(), head.size, head.last_modified))
    }

    /// One listing page under `path`. Entry names are the last segment of
    /// each key; keys deeper than one level are not filtered out. The
    /// directory's own marker key (`path/`) is skipped, so a page may come
    /// back empty while `next` is still set.
    pub async fn read_dir_page(
        &self,
        path: &VirtualPath,
        page_size: usize,
        continuation: Option<String>,
    ) -> Result<DirPage> {
        let prefix = self.mapper.dir_prefix(path);
        let page = self
            .backend
            .list_objects(&prefix, page_size, continuation)
            .await?;
        Ok(DirPage {
            entries: page
                .entries
                .iter()
                .filter(|e| e.key != prefix)
                .map(entry_attr)
                .collect(),
            next: page.next,
        })
    }

    /// Every entry under `path`, paging until the listing is exhausted.
    pub async fn read_dir(&self, path: &VirtualPath, page_size: usize) -> Result<Vec<FileAttr>> {
        let mut out = Vec::new();
        let mut token = None;
        loop {
            let page = self.read_dir_page(path, page_size, token.take()).await?;
            out.extend(page.entries);
            match page.next {
                Some(next) => token = Some(next),
                None => return Ok(out),
            }
        }
    }
}

fn entry_attr(entry: &ObjectEntry) -> FileAttr {
    // A key with a trailing slash is a directory marker object.
    match entry.key.strip_suffix('/') {
        Some(dir) => FileAttr::dir(last_segment(dir)),
        None => FileAttr::file(last_segment(&entry.key), entry.size, entry.last_modified),
    }
}

fn last_segment(key: &str) -> &str {
    key.rsplit('/').next().unwrap_or(key)
}
