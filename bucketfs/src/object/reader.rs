//! RangeReader: lazy, range-cached reader over one object.
//!
//! The reader holds at most one fetched window `[start, end)` of the object
//! and a cursor in absolute object coordinates. Reads inside the window are
//! served from memory; reads outside it either fail (autofetch disabled) or
//! fetch a new window sized to cover the read plus an overfetch margin.
//!
//! After `close` or a failed fetch the reader refuses reads and seeks until
//! an explicit `fetch` succeeds; autofetch does not resume on its own.

use crate::cadapter::client::{ByteRange, ObjectBackend};
use crate::error::{Error, Result};
use bytes::Bytes;
use std::io::SeekFrom;
use std::sync::Arc;
use tracing::debug;

/// Extra spans fetched beyond a missed read: round-trip latency dominates
/// throughput for small reads, so a miss of `len` bytes fetches `5 * len`.
pub const OVERFETCH_FACTOR: u64 = 4;

struct FetchWindow {
    range: ByteRange,
    // May be shorter than `range` when the window runs past the end of the object.
    body: Bytes,
}

pub struct RangeReader<B: ObjectBackend> {
    backend: Arc<B>,
    key: String,
    window: Option<FetchWindow>,
    pos: u64,
    autofetch: bool,
    // Set by `close` and by a failed fetch, cleared by a successful fetch.
    needs_fetch: bool,
}

impl<B: ObjectBackend> RangeReader<B> {
    /// Creates a reader with an empty window and autofetch enabled. No
    /// backend request is made until the first `fetch` or `read`.
    pub fn new(backend: Arc<B>, key: impl Into<String>) -> Self {
        Self {
            backend,
            key: key.into(),
            window: None,
            pos: 0,
            autofetch: true,
            needs_fetch: false,
        }
    }

    pub fn with_autofetch(mut self, autofetch: bool) -> Self {
        self.autofetch = autofetch;
        self
    }

    /// Currently fetched range, `None` while the window is empty.
    pub fn window(&self) -> Option<ByteRange> {
        self.window.as_ref().map(|w| w.range)
    }

    /// Absolute position of the read cursor.
    pub fn position(&self) -> u64 {
        self.pos
    }

    fn is_fetched(&self, span: &ByteRange) -> bool {
        self.window
            .as_ref()
            .is_some_and(|w| span.start <= span.end && w.range.contains(span))
    }

    /// Reads from the cursor into `buf`, fetching first when the span
    /// `[pos, pos + buf.len())` is outside the window. Returns 0 at end of
    /// object or for an empty `buf`.
    pub async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        if self.needs_fetch {
            return Err(Error::usage("must fetch before read").with_op("read", &self.key));
        }
        let len = buf.len() as u64;
        let span = ByteRange::new(self.pos, self.pos.saturating_add(len));
        if !self.is_fetched(&span) {
            if !self.autofetch {
                let fetched = self
                    .window()
                    .map_or_else(|| "nothing".to_string(), |w| w.to_string());
                return Err(Error::usage(format!(
                    "range {span} not fetched ({fetched} fetched; offset {})",
                    self.pos
                ))
                .with_op("read", &self.key));
            }
            let fetch_end = span.end.saturating_add(len.saturating_mul(OVERFETCH_FACTOR));
            debug!(
                key = %self.key,
                "autofetching range {}-{} because read of unfetched {span} attempted ({len} bytes)",
                span.start,
                fetch_end
            );
            self.fetch(span.start, fetch_end).await?;
        }

        let Some(window) = self.window.as_ref() else {
            return Err(Error::usage("range not fetched").with_op("read", &self.key));
        };
        let offset = (self.pos - window.range.start) as usize;
        if offset >= window.body.len() {
            return Ok(0);
        }
        let n = buf.len().min(window.body.len() - offset);
        buf[..n].copy_from_slice(&window.body[offset..offset + n]);
        self.pos += n as u64;
        Ok(n)
    }

    /// Reads until `buf` is full or the object ends; returns the byte count.
    pub async fn read_full(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            let n = self.read(&mut buf[filled..]).await?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        Ok(filled)
    }

    /// Makes `[start, end)` the active window and moves the cursor to
    /// `start`. A range already inside the window is a no-op that keeps the
    /// cursor where it is. The previous window is released before the
    /// request is issued, so a failed fetch leaves the reader empty and
    /// unusable until a later fetch succeeds.
    pub async fn fetch(&mut self, start: u64, end: u64) -> Result<()> {
        if start >= end {
            return Err(
                Error::usage(format!("invalid fetch range {start}-{end}")).with_op("fetch", &self.key)
            );
        }
        let range = ByteRange::new(start, end);
        if self.is_fetched(&range) {
            debug!(key = %self.key, "already fetched {range} (fetched range is {:?})", self.window());
            return Ok(());
        }

        self.close();

        debug!(key = %self.key, header = %range.to_header(), "fetching range");
        let body = self
            .backend
            .get_object(&self.key, Some(range))
            .await
            .map_err(|e| e.with_op("fetch", &self.key))?;
        self.window = Some(FetchWindow { range, body });
        self.pos = start;
        self.needs_fetch = false;
        Ok(())
    }

    /// Moves the cursor. Requires a fetched window; seeking relative to the
    /// end is rejected because the object length is unknown to the reader.
    /// Returns the new absolute position.
    pub fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        if let SeekFrom::End(_) = pos {
            return Err(
                Error::usage("seek relative to end of object is not supported")
                    .with_op("seek", &self.key),
            );
        }
        if self.window.is_none() {
            return Err(Error::usage("must fetch before seek").with_op("seek", &self.key));
        }
        let next = match pos {
            SeekFrom::Start(n) => Some(n),
            SeekFrom::Current(delta) => self.pos.checked_add_signed(delta),
            SeekFrom::End(_) => None,
        };
        let Some(next) = next else {
            return Err(
                Error::usage("seek to a negative or overflowing position").with_op("seek", &self.key)
            );
        };
        self.pos = next;
        Ok(next)
    }

    /// Releases the window and resets the cursor. Safe to call repeatedly.
    /// Reads fail until the next successful `fetch`.
    pub fn close(&mut self) {
        self.window = None;
        self.pos = 0;
        self.needs_fetch = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cadapter::client::{ListPage, ObjectHead};
    use crate::cadapter::memory::InMemoryBackend;
    use crate::error::ErrorKind;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn reader_over(data: &'static [u8]) -> (Arc<InMemoryBackend>, RangeReader<InMemoryBackend>) {
        let backend = Arc::new(InMemoryBackend::new());
        backend.insert("obj", data);
        let reader = RangeReader::new(backend.clone(), "obj");
        (backend, reader)
    }

    #[tokio::test]
    async fn test_read_inside_window_makes_no_request() {
        let (backend, mut r) = reader_over(b"0123456789abcdef");
        r.fetch(0, 10).await.unwrap();
        assert_eq!(backend.stats().gets(), 1);

        let mut buf = [0u8; 4];
        assert_eq!(r.read(&mut buf).await.unwrap(), 4);
        assert_eq!(&buf, b"0123");
        assert_eq!(r.read(&mut buf).await.unwrap(), 4);
        assert_eq!(&buf, b"4567");
        r.fetch(2, 8).await.unwrap();
        assert_eq!(backend.stats().gets(), 1);
        // A subsumed fetch keeps the cursor.
        assert_eq!(r.position(), 8);
    }

    #[tokio::test]
    async fn test_autofetch_overfetches_once() {
        let data: &'static [u8] = &[7u8; 1000];
        let (backend, mut r) = reader_over(data);
        r.fetch(0, 10).await.unwrap();
        r.seek(SeekFrom::Start(100)).unwrap();

        let mut buf = [0u8; 20];
        assert_eq!(r.read(&mut buf).await.unwrap(), 20);
        assert_eq!(backend.stats().gets(), 2);
        let w = r.window().unwrap();
        assert_eq!(w, ByteRange::new(100, 200));
        assert!(w.contains(&ByteRange::new(100, 120)));
        assert!(w.end <= 100 + 5 * 20);

        // The overfetched tail serves the next reads.
        for _ in 0..4 {
            r.read(&mut buf).await.unwrap();
        }
        assert_eq!(backend.stats().gets(), 2);
        assert_eq!(r.position(), 200);
    }

    #[tokio::test]
    async fn test_first_read_without_fetch_autofetches() {
        let (backend, mut r) = reader_over(b"hello world");
        let mut buf = [0u8; 5];
        assert_eq!(r.read(&mut buf).await.unwrap(), 5);
        assert_eq!(&buf, b"hello");
        assert_eq!(r.window(), Some(ByteRange::new(0, 25)));
        assert_eq!(backend.stats().gets(), 1);
    }

    #[tokio::test]
    async fn test_read_without_autofetch_fails() {
        let (backend, r) = reader_over(b"hello");
        let mut r = r.with_autofetch(false);
        let mut buf = [0u8; 2];
        let err = r.read(&mut buf).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Usage);
        assert!(err.to_string().contains("not fetched"));

        r.fetch(0, 2).await.unwrap();
        assert_eq!(r.read(&mut buf).await.unwrap(), 2);
        let err = r.read(&mut buf).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Usage);
        assert_eq!(backend.stats().gets(), 1);
    }

    #[tokio::test]
    async fn test_seek_rules() {
        let (_backend, mut r) = reader_over(b"hello");
        let err = r.seek(SeekFrom::Start(0)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Usage);
        assert!(r.seek(SeekFrom::End(0)).is_err());

        r.fetch(1, 4).await.unwrap();
        assert_eq!(r.seek(SeekFrom::Current(0)).unwrap(), 1);
        assert_eq!(r.seek(SeekFrom::Start(3)).unwrap(), 3);
        assert_eq!(r.seek(SeekFrom::Current(-1)).unwrap(), 2);
        assert!(r.seek(SeekFrom::Current(-10)).is_err());
        let err = r.seek(SeekFrom::End(-1)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Usage);

        let mut buf = [0u8; 2];
        r.read(&mut buf).await.unwrap();
        assert_eq!(&buf, b"ll");
    }

    #[tokio::test]
    async fn test_fetch_then_seek_back_scenario() {
        let (_backend, mut r) = reader_over(b"hello");
        r.fetch(0, 2).await.unwrap();
        let mut two = [0u8; 2];
        assert_eq!(r.read(&mut two).await.unwrap(), 2);
        assert_eq!(&two, b"he");

        assert_eq!(r.seek(SeekFrom::Start(0)).unwrap(), 0);
        let mut five = [0u8; 5];
        assert_eq!(r.read(&mut five).await.unwrap(), 5);
        assert_eq!(&five, b"hello");
        assert!(r.window().unwrap().contains(&ByteRange::new(0, 5)));
    }

    #[tokio::test]
    async fn test_read_past_end_returns_zero() {
        let (_backend, mut r) = reader_over(b"abc");
        let mut buf = [0u8; 8];
        assert_eq!(r.read_full(&mut buf).await.unwrap(), 3);
        assert_eq!(&buf[..3], b"abc");
        assert_eq!(r.read(&mut buf).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let (backend, mut r) = reader_over(b"abc");
        r.fetch(0, 3).await.unwrap();
        r.close();
        r.close();
        assert!(r.window().is_none());
        assert!(r.seek(SeekFrom::Start(0)).is_err());

        let mut buf = [0u8; 2];
        let err = r.read(&mut buf).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Usage);
        assert_eq!(backend.stats().gets(), 1);

        r.fetch(1, 3).await.unwrap();
        assert_eq!(r.read(&mut buf).await.unwrap(), 2);
        assert_eq!(&buf, b"bc");
    }

    #[tokio::test]
    async fn test_invalid_fetch_range() {
        let (backend, mut r) = reader_over(b"abc");
        assert_eq!(r.fetch(2, 2).await.unwrap_err().kind(), ErrorKind::Usage);
        assert_eq!(r.fetch(3, 1).await.unwrap_err().kind(), ErrorKind::Usage);
        assert_eq!(backend.stats().gets(), 0);
    }

    /// Serves ranges from an inner store until `fail` is set.
    struct FlakyBackend {
        inner: InMemoryBackend,
        fail: AtomicBool,
    }

    #[async_trait]
    impl ObjectBackend for FlakyBackend {
        fn describe(&self) -> String {
            "flaky://".into()
        }
        async fn get_object(&self, key: &str, range: Option<ByteRange>) -> Result<Bytes> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(Error::BackendStatus {
                    code: 503,
                    body: "SlowDown".into(),
                });
            }
            self.inner.get_object(key, range).await
        }
        async fn head_object(&self, key: &str) -> Result<ObjectHead> {
            self.inner.head_object(key).await
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
    async fn test_failed_refetch_leaves_empty_window() {
        let inner = InMemoryBackend::new();
        inner.insert("obj", "0123456789");
        let backend = Arc::new(FlakyBackend {
            inner,
            fail: AtomicBool::new(false),
        });
        let mut r = RangeReader::new(backend.clone(), "obj");
        r.fetch(0, 4).await.unwrap();

        backend.fail.store(true, Ordering::SeqCst);
        let err = r.fetch(4, 8).await.unwrap_err();
        assert_eq!(err.status_code(), Some(503));
        assert!(r.window().is_none());
        // Previously buffered bytes are gone as well.
        assert!(r.seek(SeekFrom::Start(0)).is_err());

        // The store recovers, but the reader stays unusable without a fetch.
        backend.fail.store(false, Ordering::SeqCst);
        let mut buf = [0u8; 2];
        let err = r.read(&mut buf).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Usage);
        assert_eq!(backend.inner.stats().gets(), 1);

        r.fetch(4, 8).await.unwrap();
        assert_eq!(r.read(&mut buf).await.unwrap(), 2);
        assert_eq!(&buf, b"45");
    }

    #[tokio::test]
    async fn test_failed_autofetch_does_not_rewind_cursor() {
        let inner = InMemoryBackend::new();
        inner.insert("obj", "0123456789");
        let backend = Arc::new(FlakyBackend {
            inner,
            fail: AtomicBool::new(false),
        });
        let mut r = RangeReader::new(backend.clone(), "obj");
        r.fetch(0, 4).await.unwrap();
        r.seek(SeekFrom::Start(6)).unwrap();

        backend.fail.store(true, Ordering::SeqCst);
        let mut buf = [0u8; 2];
        let err = r.read(&mut buf).await.unwrap_err();
        assert_eq!(err.status_code(), Some(503));

        backend.fail.store(false, Ordering::SeqCst);
        let err = r.read(&mut buf).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Usage);
        assert!(err.to_string().contains("must fetch before read"));
        assert_ne!(&buf, b"01");
        assert_eq!(backend.inner.stats().gets(), 1);

        r.fetch(6, 10).await.unwrap();
        assert_eq!(r.read(&mut buf).await.unwrap(), 2);
        assert_eq!(&buf, b"67");
    }
}
