use std::path::PathBuf;

use crate::Hash;

/// error type for snapshot store operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("snapshot not found: {0}")]
    SnapshotNotFound(Hash),

    #[error("blob not found: {0}")]
    ObjectNotFound(Hash),

    #[error("path not found: {0}")]
    PathNotFound(String),

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("path is outside the tracked directory: {0}")]
    PathOutsideRepository(PathBuf),

    #[error("corrupt blob: hash mismatch for {0}")]
    CorruptObject(Hash),

    #[error("corrupt snapshot record at {path}: {message}")]
    CorruptSnapshot { path: PathBuf, message: String },

    #[error("corrupt repository meta: {0}")]
    CorruptMeta(String),

    #[error("unsupported format version {found} (supported: {supported})")]
    UnsupportedFormat { found: u32, supported: u32 },

    #[error("invalid hash hex: {0}")]
    InvalidHashHex(String),

    #[error("image already exists: {0}")]
    ImageExists(String),

    #[error("image not found: {0}")]
    ImageNotFound(String),

    #[error("invalid ignore pattern: {0}")]
    InvalidPattern(String),

    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("config error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("config serialization error: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// helper to wrap io errors with path context
pub trait IoResultExt<T> {
    fn with_path(self, path: impl Into<PathBuf>) -> Result<T>;
}

impl<T> IoResultExt<T> for std::io::Result<T> {
    fn with_path(self, path: impl Into<PathBuf>) -> Result<T> {
        self.map_err(|source| Error::Io {
            path: path.into(),
            source,
        })
    }
}

impl Error {
    /// true for every "does not exist" flavour (snapshot, blob, path)
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::SnapshotNotFound(_)
            | Error::ObjectNotFound(_)
            | Error::PathNotFound(_)
            | Error::ImageNotFound(_) => true,
            Error::Io { source, .. } => source.kind() == std::io::ErrorKind::NotFound,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_path_wraps_io_error() {
        let res: std::io::Result<()> = Err(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "nope",
        ));
        let err = res.with_path("/some/file").unwrap_err();
        match err {
            Error::Io { path, source } => {
                assert_eq!(path, PathBuf::from("/some/file"));
                assert_eq!(source.kind(), std::io::ErrorKind::PermissionDenied);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_is_not_found() {
        assert!(Error::SnapshotNotFound(Hash::ZERO).is_not_found());
        assert!(Error::ObjectNotFound(Hash::ZERO).is_not_found());
        assert!(Error::PathNotFound("a.txt".into()).is_not_found());
        assert!(!Error::CorruptObject(Hash::ZERO).is_not_found());
        assert!(!Error::InvalidPath("..".into()).is_not_found());
    }
}
