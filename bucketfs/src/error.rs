//! Error taxonomy shared by the backend adapters, the readers and the VFS layer.

use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Coarse classification used by callers to branch on failures without
/// unpacking the `Op` wrappers added at the filesystem boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    BackendStatus,
    Decode,
    Usage,
    Transport,
    Io,
}

#[derive(Debug, Error)]
pub enum Error {
    /// Key or prefix absent in the backend.
    #[error("not found")]
    NotFound,

    /// Unexpected response status; the body is kept for diagnostics.
    #[error("unwanted backend status {code}: {body:?}")]
    BackendStatus { code: u16, body: String },

    /// Malformed listing or metadata response.
    #[error("malformed backend response: {0}")]
    Decode(String),

    /// Caller misuse of a reader or writer.
    #[error("{0}")]
    Usage(String),

    #[error("transport failure: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Operation name and resolved object key of a failed filesystem call.
    #[error("{op} {path}: {source}")]
    Op {
        op: &'static str,
        path: String,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    pub fn usage(msg: impl Into<String>) -> Self {
        Error::Usage(msg.into())
    }

    pub fn transport<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Error::Transport(Box::new(err))
    }

    /// Wraps the error with the operation and path it happened on.
    pub fn with_op(self, op: &'static str, path: impl Into<String>) -> Self {
        Error::Op {
            op,
            path: path.into(),
            source: Box::new(self),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::NotFound => ErrorKind::NotFound,
            Error::BackendStatus { .. } => ErrorKind::BackendStatus,
            Error::Decode(_) => ErrorKind::Decode,
            Error::Usage(_) => ErrorKind::Usage,
            Error::Transport(_) => ErrorKind::Transport,
            Error::Io(e) if e.kind() == std::io::ErrorKind::NotFound => ErrorKind::NotFound,
            Error::Io(_) => ErrorKind::Io,
            Error::Op { source, .. } => source.kind(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    /// Status code of a `BackendStatus` error, looking through `Op` wrappers.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Error::BackendStatus { code, .. } => Some(*code),
            Error::Op { source, .. } => source.status_code(),
            _ => None,
        }
    }
}
