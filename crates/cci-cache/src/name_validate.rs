use cci_paths::{AnchoredSystemPathBuf, AnchoredUpstreamPathBuf};

use crate::CacheError;

/// Result of validating an upstream (forward-slash, tar-header) entry
/// name. Both fields are independent: a name can be well-formed but
/// Windows-unsafe, or malformed yet still free of backslashes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NameValidation {
    pub well_formed: bool,
    pub windows_safe: bool,
}

/// Total function: never panics, for any input string.
pub fn validate(name: &str) -> NameValidation {
    let windows_safe = !name.contains('\\');

    let well_formed = !(name.is_empty()
        || name == "."
        || name == ".."
        || name.starts_with('/')
        || name.starts_with("./")
        || name.starts_with("../")
        || name.ends_with("/.")
        || name.ends_with("/..")
        || name.contains("//")
        || name.contains("/./")
        || name.contains("/../"));

    NameValidation {
        well_formed,
        windows_safe,
    }
}

pub(crate) fn canonicalize_name(header: &tar::Header) -> Result<AnchoredSystemPathBuf, CacheError> {
    let raw = header.path_bytes();
    let name = String::from_utf8_lossy(&raw).into_owned();

    let NameValidation {
        well_formed,
        windows_safe,
    } = validate(&name);

    if !well_formed {
        return Err(CacheError::NameMalformed(name));
    }
    if cfg!(windows) && !windows_safe {
        return Err(CacheError::NameWindowsUnsafe(name));
    }

    Ok(AnchoredUpstreamPathBuf::new(name).to_system()?)
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test_case("a/b/c", true, true; "plain relative path")]
    #[test_case("", false, true; "empty")]
    #[test_case(".", false, true; "dot")]
    #[test_case("..", false, true; "dotdot")]
    #[test_case("/abs", false, true; "leading slash")]
    #[test_case("./rel", false, true; "leading dot slash")]
    #[test_case("../rel", false, true; "leading dotdot slash")]
    #[test_case("a/.", false, true; "trailing slash dot")]
    #[test_case("a/..", false, true; "trailing slash dotdot")]
    #[test_case("a//b", false, true; "double slash")]
    #[test_case("a/./b", false, true; "embedded dot segment")]
    #[test_case("a/../b", false, true; "embedded dotdot segment")]
    #[test_case("...", true, true; "three dot run is structural not a wildcard")]
    #[test_case(".../x", true, true; "three dot run prefix")]
    #[test_case("x/...", true, true; "three dot run suffix")]
    #[test_case("a\\b", true, false; "backslash is windows unsafe but well formed")]
    fn validate_matches_table(name: &str, well_formed: bool, windows_safe: bool) {
        let result = validate(name);
        assert_eq!(result.well_formed, well_formed, "well_formed for {name:?}");
        assert_eq!(result.windows_safe, windows_safe, "windows_safe for {name:?}");
    }

    #[test]
    fn never_panics_on_arbitrary_bytes() {
        for s in ["\u{0}", "ⅸⅺ", "🎉/🎉", "a".repeat(10_000).as_str()] {
            let _ = validate(s);
        }
    }
}
