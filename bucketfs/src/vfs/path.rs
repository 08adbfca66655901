//! Virtual path normalization and mapping onto object keys.

use std::fmt;

/// Normalized, slash-separated path. The root is the empty path; there is
/// never a leading slash nor a `.` or `..` segment. `..` above the root
/// stays at the root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct VirtualPath(String);

impl VirtualPath {
    pub fn new(raw: &str) -> Self {
        let mut parts: Vec<&str> = Vec::new();
        for seg in raw.split('/') {
            match seg {
                "" | "." => {}
                ".." => {
                    parts.pop();
                }
                s => parts.push(s),
            }
        }
        VirtualPath(parts.join("/"))
    }

    pub fn root() -> Self {
        VirtualPath(String::new())
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Final segment, `.` for the root.
    pub fn base_name(&self) -> &str {
        if self.is_root() {
            return ".";
        }
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }
}

impl fmt::Display for VirtualPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            f.write_str(".")
        } else {
            f.write_str(&self.0)
        }
    }
}

/// Maps virtual paths to keys under a bucket-relative prefix.
#[derive(Debug, Clone, Default)]
pub struct PathMapper {
    prefix: VirtualPath,
}

impl PathMapper {
    pub fn new(prefix: &str) -> Self {
        Self {
            prefix: VirtualPath::new(prefix),
        }
    }

    pub fn prefix(&self) -> &str {
        self.prefix.as_str()
    }

    /// Object key of `path`. The root maps to the bare prefix.
    pub fn key(&self, path: &VirtualPath) -> String {
        match (self.prefix.is_root(), path.is_root()) {
            (true, _) => path.as_str().to_string(),
            (false, true) => self.prefix.as_str().to_string(),
            (false, false) => format!("{}/{}", self.prefix.as_str(), path.as_str()),
        }
    }

    /// Listing prefix for the children of `path`: its key plus a trailing
    /// slash, or the empty string for the root of an unprefixed bucket.
    pub fn dir_prefix(&self, path: &VirtualPath) -> String {
        let key = self.key(path);
        if key.is_empty() { key } else { key + "/" }
    }
}
