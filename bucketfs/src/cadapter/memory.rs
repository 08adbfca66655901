//! In-process object store: a sorted key map with per-operation counters.

use crate::cadapter::client::{ByteRange, ListPage, ObjectBackend, ObjectEntry, ObjectHead};
use crate::error::{Error, Result};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::SystemTime;

#[derive(Debug, Clone)]
struct StoredObject {
    data: Bytes,
    modified: SystemTime,
}

/// Number of backend calls served, by operation.
#[derive(Debug, Default)]
pub struct CallStats {
    gets: AtomicUsize,
    heads: AtomicUsize,
    puts: AtomicUsize,
    deletes: AtomicUsize,
    lists: AtomicUsize,
}

impl CallStats {
    pub fn gets(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }
    pub fn heads(&self) -> usize {
        self.heads.load(Ordering::SeqCst)
    }
    pub fn puts(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }
    pub fn deletes(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }
    pub fn lists(&self) -> usize {
        self.lists.load(Ordering::SeqCst)
    }
    pub fn total(&self) -> usize {
        self.gets() + self.heads() + self.puts() + self.deletes() + self.lists()
    }
}

/// Simple in-memory store for local development and tests.
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    objects: Mutex<BTreeMap<String, StoredObject>>,
    stats: CallStats,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> &CallStats {
        &self.stats
    }

    /// Seeds an object without counting it as a backend call.
    pub fn insert(&self, key: impl Into<String>, data: impl Into<Bytes>) {
        self.objects().insert(
            key.into(),
            StoredObject {
                data: data.into(),
                modified: SystemTime::now(),
            },
        );
    }

    pub fn keys(&self) -> Vec<String> {
        self.objects().keys().cloned().collect()
    }

    fn objects(&self) -> MutexGuard<'_, BTreeMap<String, StoredObject>> {
        self.objects.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl ObjectBackend for InMemoryBackend {
    fn describe(&self) -> String {
        "memory://".to_string()
    }

    async fn get_object(&self, key: &str, range: Option<ByteRange>) -> Result<Bytes> {
        self.stats.gets.fetch_add(1, Ordering::SeqCst);
        let objects = self.objects();
        let obj = objects.get(key).ok_or(Error::NotFound)?;
        let Some(range) = range else {
            return Ok(obj.data.clone());
        };
        let len = obj.data.len() as u64;
        if range.start >= len {
            return Ok(Bytes::new());
        }
        let end = range.end.min(len);
        Ok(obj.data.slice(range.start as usize..end as usize))
    }

    async fn head_object(&self, key: &str) -> Result<ObjectHead> {
        self.stats.heads.fetch_add(1, Ordering::SeqCst);
        let objects = self.objects();
        let obj = objects.get(key).ok_or(Error::NotFound)?;
        Ok(ObjectHead {
            size: obj.data.len() as u64,
            last_modified: Some(obj.modified),
        })
    }

    async fn put_object(&self, key: &str, data: Bytes) -> Result<()> {
        self.stats.puts.fetch_add(1, Ordering::SeqCst);
        self.objects().insert(
            key.to_string(),
            StoredObject {
                data,
                modified: SystemTime::now(),
            },
        );
        Ok(())
    }

    async fn delete_object(&self, key: &str) -> Result<()> {
        // Deleting a missing key succeeds, as it does on S3.
        self.stats.deletes.fetch_add(1, Ordering::SeqCst);
        self.objects().remove(key);
        Ok(())
    }

    async fn list_objects(
        &self,
        prefix: &str,
        max_keys: usize,
        continuation: Option<String>,
    ) -> Result<ListPage> {
        self.stats.lists.fetch_add(1, Ordering::SeqCst);
        let max_keys = max_keys.max(1);
        let lower = match continuation {
            Some(after) => Bound::Excluded(after),
            None => Bound::Included(prefix.to_string()),
        };
        let objects = self.objects();
        let mut entries: Vec<ObjectEntry> = objects
            .range::<String, _>((lower, Bound::Unbounded))
            .skip_while(|(k, _)| !k.starts_with(prefix) && k.as_str() < prefix)
            .take_while(|(k, _)| k.starts_with(prefix))
            .take(max_keys + 1)
            .map(|(k, v)| ObjectEntry {
                key: k.clone(),
                size: v.data.len() as u64,
                last_modified: Some(v.modified),
            })
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
