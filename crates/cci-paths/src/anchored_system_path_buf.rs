use std::{
    fmt,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::PathError;

/// A path known to be relative to some anchor, in native-separator form,
/// owned.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct AnchoredSystemPathBuf(pub(crate) PathBuf);

impl AnchoredSystemPathBuf {
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, PathError> {
        let path = path.into();
        if path.is_absolute() {
            return Err(PathError::NotRelative(path.to_string_lossy().into_owned()));
        }
        Ok(Self(path))
    }

    /// # Safety
    /// The caller must guarantee `path` is relative.
    pub unsafe fn new_unchecked(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    pub fn as_path(&self) -> &Path {
        &self.0
    }

    pub fn push(&mut self, segment: impl AsRef<Path>) {
        self.0.push(segment);
    }

    pub fn components(&self) -> std::path::Components<'_> {
        self.0.components()
    }
}

impl fmt::Display for AnchoredSystemPathBuf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

impl From<PathBuf> for AnchoredSystemPathBuf {
    fn from(path: PathBuf) -> Self {
        Self(path)
    }
}
