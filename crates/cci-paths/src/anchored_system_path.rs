use std::{borrow::Borrow, ops::Deref, path::Path};

use crate::{AnchoredSystemPathBuf, PathError};

/// A path known to be relative to some anchor, in native-separator form.
/// Borrowed counterpart of [`AnchoredSystemPathBuf`].
#[derive(Debug, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct AnchoredSystemPath(Path);

impl AnchoredSystemPath {
    pub fn new<P: AsRef<Path> + ?Sized>(path: &P) -> Result<&Self, PathError> {
        let path = path.as_ref();
        if path.is_absolute() {
            return Err(PathError::NotRelative(path.to_string_lossy().into_owned()));
        }
        Ok(unsafe { Self::new_unchecked(path) })
    }

    /// # Safety
    /// The caller must guarantee `path` is relative.
    pub unsafe fn new_unchecked<P: AsRef<Path> + ?Sized>(path: &P) -> &Self {
        &*(path.as_ref() as *const Path as *const Self)
    }

    pub fn as_path(&self) -> &Path {
        &self.0
    }

    pub fn parent(&self) -> Option<&Self> {
        self.0.parent().map(|p| unsafe { Self::new_unchecked(p) })
    }

    pub fn to_owned(&self) -> AnchoredSystemPathBuf {
        AnchoredSystemPathBuf(self.0.to_path_buf())
    }

    /// True if this path has no parent segment, i.e. it names an entry
    /// directly under the anchor.
    pub fn is_root(&self) -> bool {
        self.0.parent().map_or(true, |p| p.as_os_str().is_empty())
    }
}

impl Borrow<AnchoredSystemPath> for AnchoredSystemPathBuf {
    fn borrow(&self) -> &AnchoredSystemPath {
        unsafe { AnchoredSystemPath::new_unchecked(self.0.as_path()) }
    }
}

impl Deref for AnchoredSystemPathBuf {
    type Target = AnchoredSystemPath;

    fn deref(&self) -> &Self::Target {
        self.borrow()
    }
}
