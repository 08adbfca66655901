//! Capability set consumed from the object store: ranged get, head, put,
//! delete and paged prefix listing.

use crate::error::Result;
use async_trait::async_trait;
use bytes::Bytes;
use std::fmt;
use std::time::SystemTime;

/// Page size used by `list_by_prefix` when the caller asks for every key.
pub const DEFAULT_LIST_PAGE: usize = 1000;

/// Half-open byte range `[start, end)` in an object's coordinate space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    pub fn new(start: u64, end: u64) -> Self {
        debug_assert!(start <= end, "inverted byte range {start}-{end}");
        Self { start, end }
    }

    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn contains(&self, other: &ByteRange) -> bool {
        other.start >= self.start && other.end <= self.end
    }

    /// HTTP `Range` header value. The header bounds are inclusive, so the
    /// last byte requested is `end - 1`.
    pub fn to_header(&self) -> String {
        format!("bytes={}-{}", self.start, self.end.saturating_sub(1))
    }
}

impl fmt::Display for ByteRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// Result of a metadata-only probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectHead {
    pub size: u64,
    pub last_modified: Option<SystemTime>,
}

/// One key returned by a prefix listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectEntry {
    pub key: String,
    pub size: u64,
    pub last_modified: Option<SystemTime>,
}

/// A page of listing results. `next` is the continuation token for the
/// following page, `None` once the listing is exhausted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListPage {
    pub entries: Vec<ObjectEntry>,
    pub next: Option<String>,
}

#[async_trait]
pub trait ObjectBackend: Send + Sync {
    /// Human readable location of the store, e.g. `s3://bucket`.
    fn describe(&self) -> String;

    /// Fetches the whole object, or only `range` when given. A range that
    /// starts at or past the end of the object yields an empty body.
    async fn get_object(&self, key: &str, range: Option<ByteRange>) -> Result<Bytes>;

    async fn head_object(&self, key: &str) -> Result<ObjectHead>;

    /// Creates or overwrites the object.
    async fn put_object(&self, key: &str, data: Bytes) -> Result<()>;

    async fn delete_object(&self, key: &str) -> Result<()>;

    /// Lists at most `max_keys` keys starting with `prefix`, in key order,
    /// resuming after `continuation` when given.
    async fn list_objects(
        &self,
        prefix: &str,
        max_keys: usize,
        continuation: Option<String>,
    ) -> Result<ListPage>;

    /// Collects up to `max_results` keys under `prefix` (every key when
    /// `None`), following continuation tokens page by page.
    async fn list_by_prefix(
        &self,
        prefix: &str,
        max_results: Option<usize>,
    ) -> Result<Vec<ObjectEntry>> {
        let mut out = Vec::new();
        let mut token = None;
        loop {
            let want = match max_results {
                Some(max) => max.saturating_sub(out.len()).min(DEFAULT_LIST_PAGE),
                None => DEFAULT_LIST_PAGE,
            };
            if want == 0 {
                break;
            }
            let page = self.list_objects(prefix, want, token.take()).await?;
            out.extend(page.entries);
            match page.next {
                Some(next) => token = Some(next),
                None => break,
            }
        }
        if let Some(max) = max_results {
            out.truncate(max);
        }
        Ok(out)
    }
}
