use std::{
    borrow::Borrow,
    fmt,
    ops::Deref,
    path::{Path, PathBuf},
};

use crate::{AbsoluteSystemPathBuf, AnchoredSystemPath, AnchoredSystemPathBuf, PathError};

/// An absolute, native-separator path. Borrowed counterpart of
/// [`AbsoluteSystemPathBuf`].
#[derive(Debug, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct AbsoluteSystemPath(Path);

impl AbsoluteSystemPath {
    pub fn new<P: AsRef<Path> + ?Sized>(path: &P) -> Result<&Self, PathError> {
        let path = path.as_ref();
        if !path.is_absolute() {
            return Err(PathError::NotAbsolute(path.to_path_buf()));
        }
        Ok(unsafe { &*(path as *const Path as *const Self) })
    }

    /// # Safety
    /// The caller must guarantee `path` is absolute.
    pub unsafe fn new_unchecked<P: AsRef<Path> + ?Sized>(path: &P) -> &Self {
        let path = path.as_ref();
        &*(path as *const Path as *const Self)
    }

    pub fn as_path(&self) -> &Path {
        &self.0
    }

    pub fn to_owned(&self) -> AbsoluteSystemPathBuf {
        AbsoluteSystemPathBuf(self.0.to_path_buf())
    }

    pub fn parent(&self) -> Option<&Self> {
        self.0.parent().map(|p| unsafe { Self::new_unchecked(p) })
    }

    pub fn join_component(&self, segment: &str) -> AbsoluteSystemPathBuf {
        debug_assert!(
            !segment.contains('/') && !segment.contains(std::path::MAIN_SEPARATOR),
            "join_component takes a single path segment, got {segment}",
        );
        let mut buf = self.0.to_path_buf();
        buf.push(segment);
        AbsoluteSystemPathBuf(buf)
    }

    /// Resolve an anchored path against this anchor.
    pub fn resolve(&self, anchored: &AnchoredSystemPath) -> AbsoluteSystemPathBuf {
        let mut buf = self.0.to_path_buf();
        buf.push(anchored.as_path());
        AbsoluteSystemPathBuf(buf)
    }

    pub fn anchor(&self, target: &Self) -> Result<AnchoredSystemPathBuf, PathError> {
        let stripped = target
            .0
            .strip_prefix(&self.0)
            .map_err(|_| PathError::NotParent(self.0.to_string_lossy().into(), target.0.to_string_lossy().into()))?;
        Ok(AnchoredSystemPathBuf(stripped.to_path_buf()))
    }

    pub fn exists(&self) -> bool {
        self.0.exists()
    }

    pub fn symlink_metadata(&self) -> std::io::Result<std::fs::Metadata> {
        std::fs::symlink_metadata(&self.0)
    }

    pub fn create_dir_all(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.0)
    }

    pub fn ensure_dir(&self) -> std::io::Result<()> {
        if let Some(parent) = self.0.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(())
    }

    pub fn remove_file(&self) -> std::io::Result<()> {
        std::fs::remove_file(&self.0)
    }

    pub fn read_link(&self) -> std::io::Result<PathBuf> {
        std::fs::read_link(&self.0)
    }

    pub fn starts_with(&self, base: &Self) -> bool {
        self.0.starts_with(&base.0)
    }
}

impl fmt::Display for AbsoluteSystemPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

impl Borrow<AbsoluteSystemPath> for AbsoluteSystemPathBuf {
    fn borrow(&self) -> &AbsoluteSystemPath {
        unsafe { AbsoluteSystemPath::new_unchecked(self.0.as_path()) }
    }
}

impl Deref for AbsoluteSystemPathBuf {
    type Target = AbsoluteSystemPath;

    fn deref(&self) -> &Self::Target {
        self.borrow()
    }
}
