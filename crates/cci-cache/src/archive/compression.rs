use std::path::Path;

/// Compression layer selected by filename suffix. There is no magic-byte
/// sniffing; the suffix is the only signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    None,
    Zstd,
    Gzip,
}

impl Compression {
    pub fn from_path(path: &Path) -> Self {
        let name = path.to_string_lossy();
        if name.ends_with(".tar.zst") || name.ends_with(".zst") {
            Compression::Zstd
        } else if name.ends_with(".tar.gz") || name.ends_with(".gz") {
            Compression::Gzip
        } else {
            Compression::None
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use test_case::test_case;

    use super::*;

    #[test_case("item.tar.zst", Compression::Zstd; "tar zst")]
    #[test_case("item.zst", Compression::Zstd; "bare zst")]
    #[test_case("item.tar.gz", Compression::Gzip; "tar gz")]
    #[test_case("item.gz", Compression::Gzip; "bare gz")]
    #[test_case("item.tar", Compression::None; "raw tar")]
    #[test_case("item", Compression::None; "no suffix")]
    fn detects_from_suffix(name: &str, expected: Compression) {
        assert_eq!(Compression::from_path(Path::new(name)), expected);
    }
}
