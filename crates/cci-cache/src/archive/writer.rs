use std::{
    fmt,
    fs::{File, OpenOptions},
    io::{BufWriter, Read, Write},
    sync::atomic::{AtomicU32, Ordering},
};

use cci_paths::{AbsoluteSystemPath, AbsoluteSystemPathBuf, AnchoredSystemPath};
use sha2::{Digest, Sha512};
use tar::{EntryType, Header};

use crate::{archive::compression::Compression, CacheError};

static TEMP_COUNTER: AtomicU32 = AtomicU32::new(0);

fn entry_type_of(file_info: &std::fs::Metadata) -> EntryType {
    if file_info.is_dir() {
        return EntryType::Directory;
    }
    if file_info.is_symlink() {
        return EntryType::Symlink;
    }
    if file_info.is_file() {
        return EntryType::Regular;
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::FileTypeExt;
        let file_type = file_info.file_type();
        if file_type.is_fifo() {
            return EntryType::Fifo;
        }
        if file_type.is_char_device() {
            return EntryType::Char;
        }
        if file_type.is_block_device() {
            return EntryType::Block;
        }
        if file_type.is_socket() {
            return EntryType::new(b'?');
        }
    }

    EntryType::new(b'?')
}

fn generate_temp_path(final_path: &AbsoluteSystemPath) -> AbsoluteSystemPathBuf {
    let counter = TEMP_COUNTER.fetch_add(1, Ordering::SeqCst);
    let file_name = final_path
        .as_path()
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let temp_name = format!(".{file_name}.{}.{counter}.tmp", std::process::id());
    match final_path.parent() {
        Some(parent) => parent.join_component(&temp_name),
        None => unsafe { AbsoluteSystemPathBuf::new_unchecked(temp_name) },
    }
}

enum Layer {
    Zstd(tar::Builder<zstd::Encoder<'static, BufWriter<File>>>),
    Gzip(tar::Builder<flate2::write::GzEncoder<BufWriter<File>>>),
    Plain(tar::Builder<BufWriter<File>>),
}

impl Layer {
    fn append_entry(&mut self, header: &Header, body: impl Read) -> std::io::Result<()> {
        match self {
            Layer::Zstd(builder) => builder.append(header, body),
            Layer::Gzip(builder) => builder.append(header, body),
            Layer::Plain(builder) => builder.append(header, body),
        }
    }

    fn finish(self) -> std::io::Result<File> {
        match self {
            Layer::Zstd(builder) => {
                let encoder = builder.into_inner()?;
                let buffered = encoder.finish()?;
                buffered.into_inner().map_err(|e| e.into_error())
            }
            Layer::Gzip(builder) => {
                let encoder = builder.into_inner()?;
                let buffered = encoder.finish()?;
                buffered.into_inner().map_err(|e| e.into_error())
            }
            Layer::Plain(builder) => {
                let buffered = builder.into_inner()?;
                buffered.into_inner().map_err(|e| e.into_error())
            }
        }
    }
}

/// Opens an output file, layers a compressor and a tar writer over it,
/// and accepts entries one at a time. `close()` finalizes tar, then the
/// compressor, then the file, in that order, and renames the temp file
/// into place. If `close()` is never reached, `Drop` removes the temp
/// file.
pub struct CacheWriter {
    layer: Option<Layer>,
    temp_path: Option<AbsoluteSystemPathBuf>,
    final_path: AbsoluteSystemPathBuf,
}

impl CacheWriter {
    pub fn create(path: &AbsoluteSystemPath) -> Result<Self, CacheError> {
        path.ensure_dir()?;
        let temp_path = generate_temp_path(path);

        let mut options = OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o644);
        }
        let file = options.open(temp_path.as_path())?;
        let buffered = BufWriter::with_capacity(2usize.pow(20), file);

        let compression = Compression::from_path(path.as_path());
        let layer = match compression {
            Compression::Zstd => Layer::Zstd(tar::Builder::new(zstd::Encoder::new(buffered, 0)?)),
            Compression::Gzip => Layer::Gzip(tar::Builder::new(flate2::write::GzEncoder::new(
                buffered,
                flate2::Compression::default(),
            ))),
            Compression::None => Layer::Plain(tar::Builder::new(buffered)),
        };

        Ok(Self {
            layer: Some(layer),
            temp_path: Some(temp_path),
            final_path: path.to_owned(),
        })
    }

    /// Stat `source_path` and append it to the archive under `file_path`
    /// (anchored, relative to `anchor`). Unsupported tar types fail with
    /// `UnsupportedFileType`; creation otherwise does not enforce the
    /// upstream name-safety rules, since restoration, not creation, is
    /// the trust boundary.
    pub fn add_entry(
        &mut self,
        anchor: &AbsoluteSystemPath,
        file_path: &AnchoredSystemPath,
    ) -> Result<(), CacheError> {
        let source_path = anchor.resolve(file_path);
        let file_info = source_path.symlink_metadata()?;
        let is_dir = file_info.is_dir();

        let mut header = Header::new_gnu();
        #[cfg(unix)]
        {
            use std::os::unix::fs::MetadataExt;
            header.set_mode(file_info.mode());
        }
        #[cfg(not(unix))]
        {
            header.set_mode(if is_dir { 0o755 } else { 0o644 });
        }

        header.set_entry_type(entry_type_of(&file_info));

        let upstream = cci_paths::AnchoredUpstreamPathBuf::from_system(file_path, is_dir);
        header.set_path(upstream.as_str())?;
        header.set_size(if file_info.is_file() { file_info.len() } else { 0 });

        if file_info.is_symlink() {
            let target = source_path.read_link()?;
            header.set_link_name(&target)?;
        }

        if !matches!(
            header.entry_type(),
            EntryType::Regular | EntryType::Directory | EntryType::Symlink
        ) {
            return Err(CacheError::UnsupportedFileType(header.entry_type()));
        }

        header.set_uid(0);
        header.set_gid(0);
        if let Some(gnu) = header.as_gnu_mut() {
            gnu.set_atime(0);
            gnu.set_ctime(0);
        }
        header.set_mtime(0);
        header.set_cksum();

        let layer = self.layer.as_mut().expect("writer already closed");
        if matches!(header.entry_type(), EntryType::Regular) && file_info.len() > 0 {
            let file = OpenOptions::new().read(true).open(source_path.as_path())?;
            layer.append_entry(&header, file)?;
        } else {
            layer.append_entry(&header, std::io::empty())?;
        }

        Ok(())
    }

    /// Finalize tar, compressor, and file, then atomically install the
    /// archive at its final path.
    pub fn close(mut self) -> Result<ClosedArchive, CacheError> {
        let layer = self.layer.take().expect("writer already closed");
        let mut file = layer.finish()?;
        file.flush()?;
        file.sync_all()?;
        drop(file);

        let temp_path = self.temp_path.take().expect("writer already closed");
        std::fs::rename(temp_path.as_path(), self.final_path.as_path())?;

        Ok(ClosedArchive {
            path: self.final_path.clone(),
        })
    }
}

impl Drop for CacheWriter {
    fn drop(&mut self) {
        if let Some(temp_path) = self.temp_path.take() {
            let _ = std::fs::remove_file(temp_path.as_path());
        }
    }
}

/// A fully written, renamed-into-place archive. The type itself is the
/// proof that tar/compressor/file have all been flushed and closed --
/// `digest()` can only be called once this value exists.
pub struct ClosedArchive {
    path: AbsoluteSystemPathBuf,
}

impl ClosedArchive {
    pub fn path(&self) -> &AbsoluteSystemPath {
        &self.path
    }

    /// SHA-512 over the exact bytes on disk, post-compression. Re-reads
    /// the file raw; does not go through any decompression layer.
    pub fn digest(&self) -> Result<ArchiveDigest, CacheError> {
        let mut file = File::open(self.path.as_path())?;
        let mut hasher = Sha512::new();
        let mut buf = [0u8; 8192];
        loop {
            let n = file.read(&mut buf)?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }
        let digest = hasher.finalize();
        let mut bytes = [0u8; 64];
        bytes.copy_from_slice(&digest);
        Ok(ArchiveDigest(bytes))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchiveDigest([u8; 64]);

impl ArchiveDigest {
    pub fn as_bytes(&self) -> &[u8; 64] {
        &self.0
    }
}

impl fmt::Display for ArchiveDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::{fs, io::Write as _};

    use cci_paths::AnchoredSystemPathBuf;
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn creates_uncompressed_archive_and_digest() -> anyhow::Result<()> {
        let src = tempdir()?;
        let out = tempdir()?;
        let anchor = AbsoluteSystemPathBuf::new(src.path().to_path_buf())?;

        fs::write(src.path().join("file.txt"), b"hello")?;

        let archive_path = AbsoluteSystemPathBuf::new(out.path().join("item.tar"))?;
        let mut writer = CacheWriter::create(&archive_path)?;
        let rel = AnchoredSystemPathBuf::new("file.txt")?;
        writer.add_entry(&anchor, &rel)?;
        let closed = writer.close()?;

        assert!(closed.path().exists());
        let digest = closed.digest()?;
        assert_eq!(format!("{digest}").len(), 128);
        Ok(())
    }

    #[test]
    fn drop_without_close_removes_temp_file() -> anyhow::Result<()> {
        let out = tempdir()?;
        let archive_path = AbsoluteSystemPathBuf::new(out.path().join("item.tar"))?;
        {
            let _writer = CacheWriter::create(&archive_path)?;
        }
        let leftovers: Vec<_> = fs::read_dir(out.path())?.collect();
        assert!(leftovers.is_empty());
        Ok(())
    }

    #[test]
    fn digest_is_deterministic_across_runs() -> anyhow::Result<()> {
        let src = tempdir()?;
        fs::write(src.path().join("a.txt"), b"same contents")?;
        let anchor = AbsoluteSystemPathBuf::new(src.path().to_path_buf())?;
        let rel = AnchoredSystemPathBuf::new("a.txt")?;

        let mut digests = Vec::new();
        for i in 0..2 {
            let out = tempdir()?;
            let archive_path = AbsoluteSystemPathBuf::new(out.path().join(format!("item{i}.tar")))?;
            let mut writer = CacheWriter::create(&archive_path)?;
            writer.add_entry(&anchor, &rel)?;
            let closed = writer.close()?;
            digests.push(closed.digest()?);
        }
        assert_eq!(digests[0], digests[1]);
        Ok(())
    }

    #[test]
    fn compresses_with_zstd_suffix() -> anyhow::Result<()> {
        let src = tempdir()?;
        let out = tempdir()?;
        let anchor = AbsoluteSystemPathBuf::new(src.path().to_path_buf())?;
        fs::write(src.path().join("file.txt"), b"hello")?;

        let archive_path = AbsoluteSystemPathBuf::new(out.path().join("item.tar.zst"))?;
        let mut writer = CacheWriter::create(&archive_path)?;
        let rel = AnchoredSystemPathBuf::new("file.txt")?;
        writer.add_entry(&anchor, &rel)?;
        let closed = writer.close()?;

        let mut raw = Vec::new();
        File::open(closed.path().as_path())?.read_to_end(&mut raw)?;
        assert_eq!(&raw[..4], &[0x28, 0xb5, 0x2f, 0xfd], "zstd magic number");
        Ok(())
    }
}
