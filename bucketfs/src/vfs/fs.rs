//! BucketFs: path-based file tree over an object store.

use super::path::{PathMapper, VirtualPath};
use super::resolver::DirectoryResolver;
use super::{DirPage, FileAttr, FileSystem, FsConfig};
use crate::cadapter::client::ObjectBackend;
use crate::error::Result;
use crate::object::{ObjectFile, ObjectWriter, RangeReader};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

pub struct BucketFs<B: ObjectBackend> {
    backend: Arc<B>,
    mapper: PathMapper,
    config: FsConfig,
}

impl<B: ObjectBackend> BucketFs<B> {
    pub fn new(backend: B, config: FsConfig) -> Self {
        Self::with_backend(Arc::new(backend), config)
    }

    pub fn with_backend(backend: Arc<B>, config: FsConfig) -> Self {
        Self {
            mapper: PathMapper::new(&config.prefix),
            backend,
            config,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn config(&self) -> &FsConfig {
        &self.config
    }

    fn resolve(&self, path: &str) -> (VirtualPath, String) {
        let vpath = VirtualPath::new(path);
        let key = self.mapper.key(&vpath);
        (vpath, key)
    }

    fn resolver(&self) -> DirectoryResolver<'_, B> {
        DirectoryResolver::new(&self.backend, &self.mapper)
    }

    /// Returns a range-cached reader for `path`. Nothing is requested until
    /// the reader fetches, so a missing object surfaces on first fetch.
    pub fn open_range_cached(&self, path: &str) -> RangeReader<B> {
        let (_, key) = self.resolve(path);
        RangeReader::new(self.backend.clone(), key).with_autofetch(self.config.autofetch)
    }

    /// One page of `read_dir`; pass the returned `next` token to continue.
    pub async fn read_dir_page(
        &self,
        path: &str,
        continuation: Option<String>,
    ) -> Result<DirPage> {
        let (vpath, key) = self.resolve(path);
        self.resolver()
            .read_dir_page(&vpath, self.config.list_page_size, continuation)
            .await
            .map_err(|e| e.with_op("readdir", key))
    }
}

impl<B: ObjectBackend> fmt::Display for BucketFs<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "object filesystem at {}", self.backend.describe())?;
        if !self.mapper.prefix().is_empty() {
            write!(f, "/{}", self.mapper.prefix())?;
        }
        Ok(())
    }
}

#[async_trait]
impl<B: ObjectBackend> FileSystem for BucketFs<B> {
    type File = ObjectFile;
    type Writer = ObjectWriter<B>;

    async fn open(&self, path: &str) -> Result<ObjectFile> {
        let (_, key) = self.resolve(path);
        let data = self
            .backend
            .get_object(&key, None)
            .await
            .map_err(|e| e.with_op("open", &key))?;
        debug!(%key, size = data.len(), "opened object");
        Ok(ObjectFile::new(key, data))
    }

    async fn read_dir(&self, path: &str) -> Result<Vec<FileAttr>> {
        let (vpath, key) = self.resolve(path);
        self.resolver()
            .read_dir(&vpath, self.config.list_page_size)
            .await
            .map_err(|e| e.with_op("readdir", key))
    }

    async fn lstat(&self, path: &str) -> Result<FileAttr> {
        let (vpath, key) = self.resolve(path);
        self.resolver()
            .lstat(&vpath)
            .await
            .map_err(|e| e.with_op("lstat", key))
    }

    async fn create(&self, path: &str) -> Result<ObjectWriter<B>> {
        let (_, key) = self.resolve(path);
        Ok(ObjectWriter::new(self.backend.clone(), key))
    }

    async fn remove(&self, path: &str) -> Result<()> {
        let (_, key) = self.resolve(path);
        self.backend
            .delete_object(&key)
            .await
            .map_err(|e| e.with_op("remove", key))
    }

    async fn mkdir(&self, _path: &str) -> Result<()> {
        // Object stores have no directories.
        Ok(())
    }

    async fn mkdir_all(&self, _path: &str) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cadapter::client::{ByteRange, ListPage, ObjectHead};
    use crate::cadapter::localfs::LocalFsBackend;
    use crate::cadapter::memory::InMemoryBackend;
    use crate::error::{Error, ErrorKind};
    use bytes::Bytes;
    use crate::vfs::FileType;
    use std::io::{Read, SeekFrom, Write};

    fn memory_fs() -> BucketFs<InMemoryBackend> {
        BucketFs::new(InMemoryBackend::new(), FsConfig::default())
    }

    async fn put<B: ObjectBackend>(fs: &BucketFs<B>, path: &str, data: &[u8]) {
        let mut w = fs.create(path).await.unwrap();
        w.write_all(data).unwrap();
        w.close().await.unwrap();
    }

    async fn read_all<B: ObjectBackend>(fs: &BucketFs<B>, path: &str) -> Vec<u8> {
        let mut out = Vec::new();
        fs.open(path).await.unwrap().read_to_end(&mut out).unwrap();
        out
    }

    #[tokio::test]
    async fn test_create_open_round_trip() {
        let fs = memory_fs();
        let large: Vec<u8> = (0..(64 * 1024 + 17)).map(|i| (i % 251) as u8).collect();
        for (path, data) in [
            ("empty", Vec::new()),
            ("one", vec![9u8]),
            ("nested/large.bin", large),
        ] {
            put(&fs, path, &data).await;
            assert_eq!(read_all(&fs, path).await, data, "{path}");
        }
    }

    #[tokio::test]
    async fn test_remove_then_stat_is_not_found() {
        let fs = memory_fs();
        put(&fs, "a/b.txt", b"hello").await;
        assert_eq!(fs.stat("a/b.txt").await.unwrap().size, 5);

        fs.remove("a/b.txt").await.unwrap();
        let err = fs.stat("a/b.txt").await.unwrap_err();
        assert!(err.is_not_found());
        assert!(err.to_string().starts_with("lstat a/b.txt"));
        assert!(fs.stat("a").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_mkdir_touches_nothing() {
        let fs = memory_fs();
        fs.mkdir("x").await.unwrap();
        fs.mkdir_all("x/y/z").await.unwrap();
        assert_eq!(fs.backend().stats().total(), 0);
        assert!(fs.backend().keys().is_empty());
        assert!(fs.lstat("").await.unwrap().is_dir());
    }

    #[tokio::test]
    async fn test_open_missing_is_wrapped_not_found() {
        let fs = memory_fs();
        let err = fs.open("/missing/file").await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "open missing/file: not found");
    }

    #[tokio::test]
    async fn test_readdir_and_range_reader_scenario() {
        let fs = memory_fs();
        put(&fs, "a/b.txt", b"hello").await;

        let entries = fs.read_dir("a").await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "b.txt");
        assert_eq!(entries[0].size, 5);
        assert_eq!(entries[0].kind, FileType::File);

        let mut r = fs.open_range_cached("a/b.txt");
        r.fetch(0, 2).await.unwrap();
        let mut two = [0u8; 2];
        assert_eq!(r.read(&mut two).await.unwrap(), 2);
        assert_eq!(&two, b"he");

        r.seek(SeekFrom::Start(0)).unwrap();
        let mut five = [0u8; 5];
        assert_eq!(r.read_full(&mut five).await.unwrap(), 5);
        assert_eq!(&five, b"hello");
        r.close();
    }

    #[tokio::test]
    async fn test_range_reader_respects_config() {
        let fs = BucketFs::new(
            InMemoryBackend::new(),
            FsConfig {
                autofetch: false,
                ..Default::default()
            },
        );
        put(&fs, "f", b"abcdef").await;
        let mut r = fs.open_range_cached("f");
        let mut buf = [0u8; 3];
        assert_eq!(r.read(&mut buf).await.unwrap_err().kind(), ErrorKind::Usage);
        r.fetch(3, 6).await.unwrap();
        r.read(&mut buf).await.unwrap();
        assert_eq!(&buf, b"def");
    }

    #[tokio::test]
    async fn test_read_dir_paginates_explicitly() {
        let fs = BucketFs::new(
            InMemoryBackend::new(),
            FsConfig {
                list_page_size: 2,
                ..Default::default()
            },
        );
        for i in 0..5 {
            put(&fs, &format!("logs/{i}.log"), b"x").await;
        }

        let lists_before = fs.backend().stats().lists();
        let all = fs.read_dir("logs").await.unwrap();
        assert_eq!(all.len(), 5);
        assert_eq!(fs.backend().stats().lists() - lists_before, 3);

        let first = fs.read_dir_page("logs", None).await.unwrap();
        assert_eq!(first.entries.len(), 2);
        let second = fs.read_dir_page("logs", first.next).await.unwrap();
        assert_eq!(second.entries[0].name, "2.log");
    }

    #[tokio::test]
    async fn test_prefix_and_display() {
        let fs = BucketFs::new(
            InMemoryBackend::new(),
            FsConfig {
                prefix: "tenant-a".into(),
                ..Default::default()
            },
        );
        put(&fs, "doc.txt", b"1").await;
        assert_eq!(fs.backend().keys(), vec!["tenant-a/doc.txt".to_string()]);
        assert_eq!(fs.to_string(), "object filesystem at memory:///tenant-a");
    }

    #[tokio::test]
    async fn test_localfs_backed_tree() {
        let tmp = tempfile::tempdir().unwrap();
        let fs = BucketFs::new(LocalFsBackend::new(tmp.path()), FsConfig::default());

        put(&fs, "/a/b/hello.txt", b"hello world").await;
        assert!(fs.stat("a").await.unwrap().is_dir());
        assert!(fs.stat("a/b").await.unwrap().is_dir());
        let attr = fs.stat("a/b/hello.txt").await.unwrap();
        assert_eq!(attr.kind, FileType::File);
        assert_eq!(attr.size, 11);

        let mut r = fs.open_range_cached("a/b/hello.txt");
        r.fetch(6, 11).await.unwrap();
        let mut buf = [0u8; 5];
        r.read(&mut buf).await.unwrap();
        assert_eq!(&buf, b"world");

        fs.remove("a/b/hello.txt").await.unwrap();
        assert!(fs.stat("a/b/hello.txt").await.unwrap_err().is_not_found());
    }

    /// Store whose metadata probes are refused with 403.
    struct DeniedHeadBackend {
        inner: InMemoryBackend,
    }

    #[async_trait]
    impl ObjectBackend for DeniedHeadBackend {
        fn describe(&self) -> String {
            "denied://".into()
        }
        async fn get_object(&self, key: &str, range: Option<ByteRange>) -> Result<Bytes> {
            self.inner.get_object(key, range).await
        }
        async fn head_object(&self, _key: &str) -> Result<ObjectHead> {
            Err(Error::BackendStatus {
                code: 403,
                body: "AccessDenied".into(),
            })
        }
        async fn put_object(&self, key: &str, data: Bytes) -> Result<()> {
            self.inner.put_object(key, data).await
        }
        async fn delete_object(&self, key: &str) -> Result<()> {
            self.inner.delete_object(key).await
        }
        async fn list_objects(
            &self,
            prefix: &str,
            max_keys: usize,
            continuation: Option<String>,
        ) -> Result<ListPage> {
            self.inner.list_objects(prefix, max_keys, continuation).await
        }
    }

    #[tokio::test]
    async fn test_stat_surfaces_head_status() {
        let inner = InMemoryBackend::new();
        inner.insert("secret.txt", "x");
        inner.insert("dir/child", "y");
        let fs = BucketFs::new(DeniedHeadBackend { inner }, FsConfig::default());

        let err = fs.stat("secret.txt").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BackendStatus);
        assert_eq!(err.status_code(), Some(403));
        assert!(!err.is_not_found());
        let msg = err.to_string();
        assert!(msg.starts_with("lstat secret.txt: "), "{msg}");
        assert!(msg.contains("403"), "{msg}");

        // Directories resolve from the listing alone and never probe.
        assert!(fs.stat("dir").await.unwrap().is_dir());
    }
}
