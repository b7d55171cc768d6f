use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum PathError {
    #[error("{0} is not an absolute path")]
    NotAbsolute(PathBuf),
    #[error("{0} is not a relative path")]
    NotRelative(String),
    #[error("{0} is not a parent of {1}")]
    NotParent(String, String),
    #[error("{0} does not have prefix {1}")]
    PrefixError(String, String),
    #[error("path contains invalid unicode: {0}")]
    InvalidUnicode(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
