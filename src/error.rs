use std::path::PathBuf;

/// All errors produced by the core: path resolution, object-graph lookups,
/// and the descriptor/cache machinery that backs open/read/release.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("is a directory: {0}")]
    IsADirectory(String),

    #[error("not a directory: {0}")]
    NotADirectory(String),

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("read-only filesystem")]
    ReadOnly,

    #[error("operation not supported")]
    NotSupported,

    #[error("git error: {0}")]
    Git(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

// ---------------------------------------------------------------------------
// Convenience constructors
// ---------------------------------------------------------------------------

impl Error {
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound(path.into())
    }

    pub fn is_a_directory(path: impl Into<String>) -> Self {
        Self::IsADirectory(path.into())
    }

    pub fn not_a_directory(path: impl Into<String>) -> Self {
        Self::NotADirectory(path.into())
    }

    pub fn invalid_path(path: impl Into<String>) -> Self {
        Self::InvalidPath(path.into())
    }

    pub fn git(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Git(Box::new(err))
    }

    pub fn git_msg(msg: impl Into<String>) -> Self {
        Self::Git(msg.into().into())
    }

    pub fn io(path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        Self::Io(std::io::Error::new(
            err.kind(),
            format!("{}: {}", path.into().display(), err),
        ))
    }

    /// The errno the FUSE surface reports to the kernel for this failure.
    pub fn errno(&self) -> libc::c_int {
        match self {
            Error::NotFound(_) => libc::ENOENT,
            Error::IsADirectory(_) => libc::EISDIR,
            Error::NotADirectory(_) => libc::ENOTDIR,
            Error::InvalidPath(_) => libc::EINVAL,
            Error::ReadOnly => libc::EROFS,
            Error::NotSupported => libc::ENOSYS,
            Error::Git(_) | Error::Io(_) => libc::EIO,
        }
    }
}
