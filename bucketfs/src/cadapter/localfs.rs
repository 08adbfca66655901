//! Local directory backend used to mock the object store (implements ObjectBackend).
//! Keys map to relative file paths under `root`; directories are never objects.

use crate::cadapter::client::{ByteRange, ListPage, ObjectBackend, ObjectEntry, ObjectHead};
use crate::error::{Error, Result};
use async_trait::async_trait;
use bytes::Bytes;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use tokio::{
    fs,
    io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt},
};
use walkdir::WalkDir;

pub struct LocalFsBackend {
    root: PathBuf,
}

impl LocalFsBackend {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }

    /// Every file under root as `(key, size, mtime)`, sorted by key.
    fn scan(root: &Path) -> Result<Vec<ObjectEntry>> {
        let mut out = Vec::new();
        if !root.exists() {
            return Ok(out);
        }
        for entry in WalkDir::new(root).min_depth(1) {
            let entry = entry.map_err(Error::transport)?;
            if !entry.file_type().is_file() {
                continue;
            }
            let rel = entry
                .path()
                .strip_prefix(root)
                .map_err(|e| Error::Decode(e.to_string()))?;
            let key = rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            let meta = entry.metadata().map_err(Error::transport)?;
            out.push(ObjectEntry {
                key,
                size: meta.len(),
                last_modified: meta.modified().ok(),
            });
        }
        out.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(out)
    }
}

fn map_io(e: std::io::Error) -> Error {
    if e.kind() == std::io::ErrorKind::NotFound {
        Error::NotFound
    } else {
        Error::Io(e)
    }
}

#[async_trait]
impl ObjectBackend for LocalFsBackend {
    fn describe(&self) -> String {
        format!("file://{}", self.root.display())
    }

    async fn get_object(&self, key: &str, range: Option<ByteRange>) -> Result<Bytes> {
        let path = self.path_for(key);
        if fs::metadata(&path).await.map_err(map_io)?.is_dir() {
            return Err(Error::NotFound);
        }
        let Some(range) = range else {
            return Ok(Bytes::from(fs::read(path).await.map_err(map_io)?));
        };
        let mut f = fs::File::open(path).await.map_err(map_io)?;
        f.seek(SeekFrom::Start(range.start)).await?;
        let mut buf = Vec::with_capacity(range.len().min(1 << 20) as usize);
        f.take(range.len()).read_to_end(&mut buf).await?;
        Ok(Bytes::from(buf))
    }

    async fn head_object(&self, key: &str) -> Result<ObjectHead> {
        let meta = fs::metadata(self.path_for(key)).await.map_err(map_io)?;
        if !meta.is_file() {
            return Err(Error::NotFound);
        }
        Ok(ObjectHead {
            size: meta.len(),
            last_modified: meta.modified().ok(),
        })
    }

    async fn put_object(&self, key: &str, data: Bytes) -> Result<()> {
        let path = self.path_for(key);
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).await?;
        }
        let mut f = fs::File::create(path).await?;
        f.write_all(&data).await?;
        f.flush().await?;
        Ok(())
    }

    async fn delete_object(&self, key: &str) -> Result<()> {
        match fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn list_objects(
        &self,
        prefix: &str,
        max_keys: usize,
        continuation: Option<String>,
    ) -> Result<ListPage> {
        let root = self.root.clone();
        let all = tokio::task::spawn_blocking(move || Self::scan(&root))
            .await
            .map_err(Error::transport)??;
        let max_keys = max_keys.max(1);
        let mut entries: Vec<ObjectEntry> = all
            .into_iter()
            .filter(|e| e.key.starts_with(prefix))
            .filter(|e| continuation.as_deref().is_none_or(|after| e.key.as_str() > after))
            .take(max_keys + 1)
            .collect();
        let next = if entries.len() > max_keys {
            entries.truncate(max_keys);
            entries.last().map(|e| e.key.clone())
        } else {
            None
        };
        Ok(ListPage { entries, next })
    }
}
