use cci_paths::{AbsoluteSystemPath, AnchoredSystemPathBuf};

use crate::{archive::dir_cache::CachedDirTree, name_validate::canonicalize_name, CacheError};

pub(crate) fn restore_directory(
    anchor: &AbsoluteSystemPath,
    dir_cache: &mut CachedDirTree,
    header: &tar::Header,
) -> Result<AnchoredSystemPathBuf, CacheError> {
    let name = canonicalize_name(header)?;
    let mode = header.mode()?;
    dir_cache.mkdir_all(anchor, &name, mode)?;
    Ok(name)
}
