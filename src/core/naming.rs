use uuid::Uuid;

use crate::core::error::{XToolError, XToolResult};

/// Prefix of instances created on the fly from a version.
pub const TEMPORARY_INSTANCE_PREFIX: &str = "xtool";

/// Eight random lowercase hex characters.
pub fn random_suffix() -> String {
    let mut id = Uuid::new_v4().simple().to_string();
    id.truncate(8);
    id
}

/// `xtool-<8 hex>`
pub fn temporary_instance_name() -> String {
    format!("{TEMPORARY_INSTANCE_PREFIX}-{}", random_suffix())
}

/// `<instance>-<8 hex>`
pub fn suffixed_name(base: &str) -> String {
    format!("{base}-{}", random_suffix())
}

/// Instance names become directory names: they must be non-empty single
/// path components.
pub fn validate_instance_name(name: &str) -> XToolResult<()> {
    let invalid = name.trim().is_empty()
        || name != name.trim()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\']);
    if invalid {
        return Err(XToolError::InvalidName(name.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suffix_is_eight_hex_chars() {
        let suffix = random_suffix();
        assert_eq!(suffix.len(), 8);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));
        assert!(temporary_instance_name().starts_with("xtool-"));
        assert_eq!(suffixed_name("dev").len(), "dev-".len() + 8);
    }

    #[test]
    fn rejects_names_that_are_not_plain_directories() {
        for bad in ["", "  ", "..", ".", "a/b", "a\\b", " dev"] {
            assert!(
                matches!(validate_instance_name(bad), Err(XToolError::InvalidName(_))),
                "{bad:?} should be rejected"
            );
        }
        validate_instance_name("dev-15.10").unwrap();
    }
}
