//! ObjectWriter: buffers written bytes and commits them as one object on close.

use crate::cadapter::client::ObjectBackend;
use crate::error::Result;
use bytes::BytesMut;
use std::io;
use std::sync::Arc;
use tracing::{debug, warn};

pub struct ObjectWriter<B: ObjectBackend> {
    backend: Arc<B>,
    key: String,
    buf: BytesMut,
    closed: bool,
}

impl<B: ObjectBackend> ObjectWriter<B> {
    pub fn new(backend: Arc<B>, key: impl Into<String>) -> Self {
        Self {
            backend,
            key: key.into(),
            buf: BytesMut::new(),
            closed: false,
        }
    }

    /// Bytes buffered so far.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Uploads the buffered bytes, creating or overwriting the object.
    pub async fn close(mut self) -> Result<()> {
        self.closed = true;
        let data = std::mem::take(&mut self.buf).freeze();
        debug!(key = %self.key, size = data.len(), "committing object");
        self.backend
            .put_object(&self.key, data)
            .await
            .map_err(|e| e.with_op("close", &self.key))
    }
}

impl<B: ObjectBackend> io::Write for ObjectWriter<B> {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<B: ObjectBackend> Drop for ObjectWriter<B> {
    fn drop(&mut self) {
        if !self.closed {
            warn!(key = %self.key, buffered = self.buf.len(), "writer dropped without close; nothing committed");
        }
    }
}
