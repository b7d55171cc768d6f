use std::{
    fs::{File, OpenOptions},
    io::Read,
};

use cci_paths::{AbsoluteSystemPath, AnchoredSystemPathBuf};
use tar::EntryType;

use crate::{
    archive::{compression::Compression, dir_cache::CachedDirTree, link_graph, restore_directory, restore_regular, restore_symlink},
    CacheError,
};

/// Opens an archive, autodetecting its compression layer from the
/// filename suffix, and streams tar entries out of it.
pub struct CacheReader {
    reader: Box<dyn Read>,
}

impl CacheReader {
    pub fn open(path: &AbsoluteSystemPath) -> Result<Self, CacheError> {
        let mut options = OpenOptions::new();
        options.read(true);
        #[cfg(windows)]
        {
            use std::os::windows::fs::OpenOptionsExt;
            const FILE_FLAG_SEQUENTIAL_SCAN: u32 = 0x0800_0000;
            options.custom_flags(FILE_FLAG_SEQUENTIAL_SCAN);
        }
        let file = options.open(path.as_path())?;
        Self::from_reader(file, Compression::from_path(path.as_path()))
    }

    pub fn from_reader(reader: impl Read + 'static, compression: Compression) -> Result<Self, CacheError> {
        let reader: Box<dyn Read> = match compression {
            Compression::Zstd => Box::new(zstd::Decoder::new(reader)?),
            Compression::Gzip => Box::new(flate2::read::GzDecoder::new(reader)),
            Compression::None => Box::new(reader),
        };
        Ok(Self { reader })
    }

    /// Ensure `anchor` exists, then stream every entry, dispatching on
    /// kind and deferring symlinks whose target does not exist yet. At
    /// EOF, deferred symlinks are restored by a topologically ordered
    /// second pass. Returns the anchored paths of every entry
    /// successfully restored, in the order they were realized.
    pub fn restore(&mut self, anchor: &AbsoluteSystemPath) -> Result<Vec<AnchoredSystemPathBuf>, CacheError> {
        anchor.create_dir_all()?;
        let mut dir_cache = CachedDirTree::new(anchor.to_owned());
        let mut restored = Vec::new();
        let mut deferred = Vec::new();

        let mut archive = tar::Archive::new(&mut self.reader);
        for entry in archive.entries()? {
            let mut entry = entry?;
            let header = entry.header().clone();

            let result = match header.entry_type() {
                EntryType::Directory => restore_directory::restore_directory(anchor, &mut dir_cache, &header),
                EntryType::Regular => restore_regular::restore_regular(anchor, &mut dir_cache, &header, &mut entry),
                EntryType::Symlink => restore_symlink::restore_symlink(anchor, &mut dir_cache, &header),
                other => Err(CacheError::UnsupportedFileType(other)),
            };

            match result {
                Ok(name) => restored.push(name),
                Err(CacheError::MissingSymlinkTarget) => {
                    tracing::debug!(name = %String::from_utf8_lossy(&header.path_bytes()), "deferring symlink, target missing");
                    deferred.push(header);
                }
                Err(e) => return Err(e),
            }
        }

        if !deferred.is_empty() {
            let symlinks = link_graph::restore_deferred(anchor, &mut dir_cache, deferred)?;
            restored.extend(symlinks);
        }

        Ok(restored)
    }
}
