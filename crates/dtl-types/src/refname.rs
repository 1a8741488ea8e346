//! Git ref-name safety rules shared by every name the ledger writes.
//!
//! A name is acceptable when:
//! - it is non-empty
//! - it contains no whitespace, `~`, `^`, `:`, `?`, `*`, `[`, `\`
//! - it contains neither `..` nor `@{`
//! - it does not start or end with `.` or `/`, and does not end with `.lock`
//! - it has no empty components and no component starting with `.` or `-`

/// Characters that are forbidden anywhere in a ref name.
const FORBIDDEN_CHARS: &[char] = &[' ', '\t', '\n', '\r', '~', '^', ':', '?', '*', '[', '\\'];

/// Check a (short) ref name, returning the first violated rule.
///
/// ```
/// use dtl_types::check_ref_name;
///
/// assert!(check_ref_name("api/v1.2.3").is_ok());
/// assert!(check_ref_name("bad..name").is_err());
/// ```
pub fn check_ref_name(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("must not be empty".into());
    }

    if let Some(ch) = FORBIDDEN_CHARS.iter().find(|ch| name.contains(**ch)) {
        return Err(format!("contains forbidden character {ch:?}"));
    }
    if let Some(ch) = name.chars().find(|c| c.is_control()) {
        return Err(format!("contains control character {ch:?}"));
    }

    if name.contains("..") {
        return Err("must not contain '..'".into());
    }
    if name.contains("@{") {
        return Err("must not contain '@{'".into());
    }
    if name.starts_with('.') || name.ends_with('.') {
        return Err("must not start or end with '.'".into());
    }
    if name.starts_with('/') || name.ends_with('/') {
        return Err("must not start or end with '/'".into());
    }
    if name.ends_with(".lock") {
        return Err("must not end with '.lock'".into());
    }

    for component in name.split('/') {
        if component.is_empty() {
            return Err("path components must not be empty".into());
        }
        if component.starts_with('.') {
            return Err(format!("component must not start with '.': {component:?}"));
        }
        if component.starts_with('-') {
            return Err(format!("component must not start with '-': {component:?}"));
        }
        if component.ends_with(".lock") {
            return Err(format!("component must not end with '.lock': {component:?}"));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_names() {
        for name in ["production", "v1.0.0", "api/v1.0.0-rc.1", "svc/api/staging"] {
            assert!(check_ref_name(name).is_ok(), "{name}");
        }
    }

    #[test]
    fn reject_forbidden_chars() {
        for name in ["a~b", "a^b", "a:b", "a?b", "a*b", "a[b", "a\\b", "has space", "tab\there"] {
            assert!(check_ref_name(name).is_err(), "{name}");
        }
    }

    #[test]
    fn reject_structural_problems() {
        assert!(check_ref_name("").is_err());
        assert!(check_ref_name("a..b").is_err());
        assert!(check_ref_name("ref@{0}").is_err());
        assert!(check_ref_name(".hidden").is_err());
        assert!(check_ref_name("trailing/").is_err());
        assert!(check_ref_name("/leading").is_err());
        assert!(check_ref_name("a//b").is_err());
        assert!(check_ref_name("main.lock").is_err());
        assert!(check_ref_name("api/.hidden/v1.0.0").is_err());
    }

    #[test]
    fn reject_option_like_components() {
        for name in ["-fm/v1.0.0", "-production", "api/-x/v1.0.0", "--force"] {
            assert!(check_ref_name(name).is_err(), "{name}");
        }
        assert!(check_ref_name("api/v1.0.0-rc-1").is_ok());
    }
}
