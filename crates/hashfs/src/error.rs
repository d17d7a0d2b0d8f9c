use thiserror::Error as ThisError;

pub type Result<R, E = Error> = std::result::Result<R, E>;

#[derive(Debug, ThisError)]
pub enum Error {
    #[error("IO Error: {0:?}")]
    Io(#[from] std::io::Error),

    #[error("UTF-8 Error: {0:?}")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("not a HashFS archive (magic mismatch)")]
    NotHashFs,

    #[error("unsupported archive version {0}")]
    UnsupportedVersion(u16),

    #[error("unsupported hash method {0:?}")]
    UnsupportedHashMethod([u8; 4]),

    #[error("unsupported feature: {0}")]
    UnsupportedFeature(&'static str),

    #[error("corrupt table: {0}")]
    CorruptTable(&'static str),

    #[error("entry not found: {0}")]
    NotFound(String),

    #[error("entry is a directory: {0}")]
    IsDirectory(String),

    #[error("entry is not a directory: {0}")]
    NotDirectory(String),

    #[error("invalid archive path {path:?}: {reason}")]
    InvalidArchivePath { path: String, reason: &'static str },

    #[error("texture packing failed for {path:?}: {reason}")]
    TexturePacking { path: String, reason: &'static str },

    #[error("operation attempted on a closed reader")]
    Closed,
}
