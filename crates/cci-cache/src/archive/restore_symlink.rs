use std::{
    borrow::Cow,
    ffi::OsStr,
    path::{Path, PathBuf},
};

use cci_paths::{AbsoluteSystemPath, AbsoluteSystemPathBuf, AnchoredSystemPath, AnchoredSystemPathBuf};
use os_str_bytes::OsStrBytes;

use crate::{archive::dir_cache::CachedDirTree, name_validate::canonicalize_name, CacheError};

/// Canonicalize a symlink's own name into the vertex key used for
/// topological sorting: the anchor-resolved, lexically-cleaned entry
/// path.
pub(crate) fn canonical_entry_path(
    anchor: &AbsoluteSystemPath,
    entry_name: &AnchoredSystemPath,
) -> AbsoluteSystemPathBuf {
    let resolved = anchor.resolve(entry_name);
    unsafe { AbsoluteSystemPathBuf::new_unchecked(cci_paths::lexical_clean(resolved.as_path())) }
}

/// Canonicalize a symlink's target: clean it lexically, take it as-is if
/// absolute on the host, otherwise resolve it against the symlink's own
/// parent directory under the anchor.
pub(crate) fn canonicalize_linkname(
    anchor: &AbsoluteSystemPath,
    entry_name: &AnchoredSystemPath,
    raw_linkname: &[u8],
) -> AbsoluteSystemPathBuf {
    let linkname_os: Cow<OsStr> =
        OsStr::from_raw_bytes(raw_linkname).unwrap_or(Cow::Borrowed(OsStr::new("")));
    let cleaned = cci_paths::lexical_clean(Path::new(&linkname_os));

    if cleaned.is_absolute() {
        return unsafe { AbsoluteSystemPathBuf::new_unchecked(cleaned) };
    }

    let base = match entry_name.parent() {
        Some(parent) => anchor.resolve(parent),
        None => anchor.to_owned(),
    };
    let joined = base.as_path().join(&cleaned);
    unsafe { AbsoluteSystemPathBuf::new_unchecked(cci_paths::lexical_clean(joined)) }
}

fn raw_link_name(header: &tar::Header) -> PathBuf {
    header
        .link_name_bytes()
        .map(|bytes| {
            let os: Cow<OsStr> = OsStr::from_raw_bytes(&*bytes).unwrap_or(Cow::Borrowed(OsStr::new("")));
            PathBuf::from(os.into_owned())
        })
        .unwrap_or_default()
}

/// First pass: create the link only if its canonicalized target already
/// exists on disk. Returns `MissingSymlinkTarget` otherwise, which the
/// caller treats as a signal to defer.
pub(crate) fn restore_symlink(
    anchor: &AbsoluteSystemPath,
    dir_cache: &mut CachedDirTree,
    header: &tar::Header,
) -> Result<AnchoredSystemPathBuf, CacheError> {
    let name = canonicalize_name(header)?;
    dir_cache.ensure_parent(anchor, &name)?;

    let raw_target_bytes = header.link_name_bytes().map(|c| c.into_owned()).unwrap_or_default();
    let canonical_target = canonicalize_linkname(anchor, &name, &raw_target_bytes);

    if std::fs::symlink_metadata(canonical_target.as_path()).is_err() {
        return Err(CacheError::MissingSymlinkTarget);
    }

    actually_restore_symlink(anchor, &name, &raw_link_name(header))?;
    Ok(name)
}

/// Second pass: create the link unconditionally. A dangling symlink is
/// not an error here -- the producer may have legitimately recorded a
/// link to a path outside the archive.
pub(crate) fn restore_symlink_allow_missing_target(
    anchor: &AbsoluteSystemPath,
    dir_cache: &mut CachedDirTree,
    header: &tar::Header,
) -> Result<AnchoredSystemPathBuf, CacheError> {
    let name = canonicalize_name(header)?;
    dir_cache.ensure_parent(anchor, &name)?;
    actually_restore_symlink(anchor, &name, &raw_link_name(header))?;
    Ok(name)
}

fn actually_restore_symlink(
    anchor: &AbsoluteSystemPath,
    name: &AnchoredSystemPath,
    target: &Path,
) -> Result<(), CacheError> {
    let resolved = anchor.resolve(name);

    if resolved.symlink_metadata().is_ok() {
        resolved.remove_file()?;
    }

    #[cfg(unix)]
    {
        std::os::unix::fs::symlink(target, resolved.as_path())?;
    }
    #[cfg(windows)]
    {
        if std::os::windows::fs::symlink_file(target, resolved.as_path()).is_err() {
            std::os::windows::fs::symlink_dir(target, resolved.as_path())?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use cci_paths::AbsoluteSystemPathBuf;
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn relative_target_resolves_against_entry_parent() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let anchor = AbsoluteSystemPathBuf::new(dir.path().to_path_buf())?;
        let entry = AnchoredSystemPath::new(Path::new("sub/link"))?;
        let target = canonicalize_linkname(&anchor, entry, b"../other");
        assert_eq!(target.as_path(), anchor.as_path().join("other"));
        Ok(())
    }

    #[test]
    fn absolute_target_is_taken_as_is() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let anchor = AbsoluteSystemPathBuf::new(dir.path().to_path_buf())?;
        let entry = AnchoredSystemPath::new(Path::new("link"))?;
        #[cfg(unix)]
        {
            let target = canonicalize_linkname(&anchor, entry, b"/etc/passwd");
            assert_eq!(target.as_path(), Path::new("/etc/passwd"));
        }
        Ok(())
    }

    #[test]
    fn root_level_escape_resolves_to_anchor_parent() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let anchor = AbsoluteSystemPathBuf::new(dir.path().to_path_buf())?;
        let entry = AnchoredSystemPath::new(Path::new("escape"))?;
        let target = canonicalize_linkname(&anchor, entry, b"../");
        assert_eq!(target.as_path(), anchor.as_path().parent().unwrap());
        Ok(())
    }
}
