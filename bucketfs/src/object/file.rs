//! ObjectFile: a whole object materialized in memory.

use bytes::Bytes;
use std::io::{self, Cursor, Read, Seek, SeekFrom};

/// Readable, seekable view of a fully downloaded object. Unlike
/// `RangeReader` the length is known, so end-relative seeks work.
#[derive(Debug)]
pub struct ObjectFile {
    key: String,
    inner: Cursor<Bytes>,
}

impl ObjectFile {
    pub fn new(key: impl Into<String>, data: Bytes) -> Self {
        Self {
            key: key.into(),
            inner: Cursor::new(data),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn len(&self) -> u64 {
        self.inner.get_ref().len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.inner.get_ref().is_empty()
    }
}

impl Read for ObjectFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl Seek for ObjectFile {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.inner.seek(pos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_and_seek_from_end() {
        let mut f = ObjectFile::new("k", Bytes::from_static(b"hello"));
        assert_eq!(f.len(), 5);
        assert_eq!(f.seek(SeekFrom::End(-3)).unwrap(), 2);
        let mut out = String::new();
        f.read_to_string(&mut out).unwrap();
        assert_eq!(out, "llo");
    }
}
