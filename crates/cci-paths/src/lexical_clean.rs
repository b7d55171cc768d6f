use std::path::{Path, PathBuf};

use path_clean::PathClean;

/// Collapse redundant separators, `.` components, and `..` components
/// against preceding path segments, purely lexically -- no filesystem
/// access, no symlink resolution. On non-Windows platforms this does not
/// treat `\` as a separator, matching `std::path::Components`.
pub fn lexical_clean(path: impl AsRef<Path>) -> PathBuf {
    path.as_ref().to_path_buf().clean()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapses_dot_and_double_slash() {
        assert_eq!(lexical_clean("a/./b//c"), Path::new("a/b/c"));
    }

    #[test]
    fn resolves_dotdot_lexically() {
        assert_eq!(lexical_clean("a/b/../c"), Path::new("a/c"));
    }

    #[test]
    fn leaves_escaping_dotdot_in_place() {
        assert_eq!(lexical_clean("../escape"), Path::new("../escape"));
    }

    #[test]
    #[cfg(not(windows))]
    fn does_not_touch_backslashes() {
        assert_eq!(lexical_clean("a\\b/c"), Path::new("a\\b/c"));
    }
}
