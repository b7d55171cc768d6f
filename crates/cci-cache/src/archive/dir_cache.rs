use std::path::{Component, Path, PathBuf};

use cci_paths::{AbsoluteSystemPath, AbsoluteSystemPathBuf, AnchoredSystemPath};

use crate::CacheError;

/// Tracks the directory chain most recently materialized on disk during
/// one restore call, so that a depth-first stream of directory entries
/// only ever issues one `mkdir` per directory instead of walking from the
/// anchor every time. This is purely a performance hint: every lookup
/// still verifies containment by walking any remaining segments, so a
/// stale or empty cache can only cost extra syscalls, never produce an
/// incorrect restore.
pub struct CachedDirTree {
    anchors: Vec<AbsoluteSystemPathBuf>,
    prefix: Vec<String>,
}

impl CachedDirTree {
    pub fn new(anchor: AbsoluteSystemPathBuf) -> Self {
        Self {
            anchors: vec![anchor],
            prefix: Vec::new(),
        }
    }

    /// Create every directory on the path from the anchor down to `dest`,
    /// following existing symlinks and rejecting any that would resolve
    /// outside `anchor`. `mode` is applied only to `dest` itself when it
    /// has to be created; any absent ancestor gets `0o755`. Extends the
    /// cache to the full depth of `dest`.
    pub fn mkdir_all(
        &mut self,
        anchor: &AbsoluteSystemPath,
        dest: &AnchoredSystemPath,
        mode: u32,
    ) -> Result<AbsoluteSystemPathBuf, CacheError> {
        let segments = normal_segments(dest.as_path());

        let common = segments
            .iter()
            .zip(self.prefix.iter())
            .take_while(|(a, b)| a == b)
            .count();

        let mut current = self.anchors[common].as_path().to_path_buf();
        let last = segments.len().saturating_sub(1);
        for (i, segment) in segments[common..].iter().enumerate() {
            let segment_mode = if common + i == last { mode } else { 0o755 };
            current = advance_segment(anchor, &current, segment, segment_mode)?;
        }

        self.prefix.truncate(common);
        self.anchors.truncate(common + 1);
        let mut running = self.anchors[common].as_path().to_path_buf();
        for segment in &segments[common..] {
            running.push(segment);
            self.prefix.push(segment.clone());
            self.anchors
                .push(unsafe { AbsoluteSystemPathBuf::new_unchecked(running.clone()) });
        }

        AbsoluteSystemPathBuf::new(current).map_err(Into::into)
    }

    /// Ensure every directory up to (but not including) `dest` exists.
    /// Leaves the cache intact at `dest`'s parent depth, per the
    /// "non-directory entries don't extend the cache past their parent"
    /// rule.
    pub fn ensure_parent(
        &mut self,
        anchor: &AbsoluteSystemPath,
        dest: &AnchoredSystemPath,
    ) -> Result<(), CacheError> {
        match dest.as_path().parent() {
            None => Ok(()),
            Some(p) if p.as_os_str().is_empty() => Ok(()),
            Some(p) => {
                let parent = AnchoredSystemPath::new(p)?;
                self.mkdir_all(anchor, parent, 0o755)?;
                Ok(())
            }
        }
    }
}

fn normal_segments(path: &Path) -> Vec<String> {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect()
}

/// Resolve one more path segment under `current`, creating it as a plain
/// directory if absent, or following it if it is already a symlink --
/// failing `Traversal` if that symlink points outside `anchor`.
fn advance_segment(
    anchor: &AbsoluteSystemPath,
    current: &Path,
    segment: &str,
    mode: u32,
) -> Result<PathBuf, CacheError> {
    let candidate = current.join(segment);

    match std::fs::symlink_metadata(&candidate) {
        Ok(meta) if meta.file_type().is_symlink() => {
            let target = std::fs::read_link(&candidate)?;
            let resolved = if target.is_absolute() {
                cci_paths::lexical_clean(&target)
            } else {
                cci_paths::lexical_clean(current.join(&target))
            };
            if !resolved.starts_with(anchor.as_path()) {
                tracing::debug!(path = %candidate.display(), target = %resolved.display(), "symlink escapes anchor");
                return Err(CacheError::Traversal(candidate.display().to_string()));
            }
            Ok(resolved)
        }
        Ok(meta) if meta.is_dir() => Ok(candidate),
        Ok(_) => Err(CacheError::IsADirectory(candidate.display().to_string())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            std::fs::create_dir(&candidate)?;
            set_mode(&candidate, mode)?;
            Ok(candidate)
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) -> std::io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use cci_paths::AbsoluteSystemPathBuf;
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn creates_nested_directories_once() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let anchor = AbsoluteSystemPathBuf::new(dir.path().to_path_buf())?;
        let mut cache = CachedDirTree::new(anchor.clone());

        let dest = AnchoredSystemPath::new(Path::new("a/b/c"))?;
        let resolved = cache.mkdir_all(&anchor, dest, 0o755)?;
        assert!(resolved.as_path().is_dir());
        assert!(anchor.as_path().join("a/b/c").is_dir());
        Ok(())
    }

    #[test]
    fn rejects_traversal_through_escaping_symlink() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let anchor = AbsoluteSystemPathBuf::new(dir.path().to_path_buf())?;
        let mut cache = CachedDirTree::new(anchor.clone());

        #[cfg(unix)]
        {
            std::os::unix::fs::symlink("../", anchor.as_path().join("escape"))?;
            let dest = AnchoredSystemPath::new(Path::new("escape/inner"))?;
            let err = cache.mkdir_all(&anchor, dest, 0o755).unwrap_err();
            assert!(matches!(err, CacheError::Traversal(_)));
        }
        Ok(())
    }
}
