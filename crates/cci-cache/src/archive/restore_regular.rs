use std::{fs::OpenOptions, io};

use cci_paths::{AbsoluteSystemPath, AnchoredSystemPathBuf};

use crate::{archive::dir_cache::CachedDirTree, name_validate::canonicalize_name, CacheError};

pub(crate) fn restore_regular(
    anchor: &AbsoluteSystemPath,
    dir_cache: &mut CachedDirTree,
    header: &tar::Header,
    reader: &mut dyn io::Read,
) -> Result<AnchoredSystemPathBuf, CacheError> {
    let name = canonicalize_name(header)?;
    let resolved = anchor.resolve(&name);

    if let Ok(meta) = resolved.symlink_metadata() {
        if meta.is_dir() {
            return Err(CacheError::IsADirectory(resolved.to_string()));
        }
    }

    dir_cache.ensure_parent(anchor, &name)?;

    let mut options = OpenOptions::new();
    options.write(true).truncate(true).create(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(header.mode()?);
    }

    let mut file = options.open(resolved.as_path())?;
    io::copy(reader, &mut file)?;

    Ok(name)
}
