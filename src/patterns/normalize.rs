//! Pattern normalization.

use globset::GlobBuilder;

use crate::scope::has_drive_prefix;
use crate::settings::SettingsError;

/// Characters that make a pattern a glob rather than a literal path.
const GLOB_META: &[char] = &['*', '?', '[', ']', '{', '}'];

/// Whether the pattern carries glob syntax.
pub fn is_glob(pattern: &str) -> bool {
    pattern.contains(GLOB_META)
}

/// Whether the pattern is already anchored to some location.
pub fn is_rooted(pattern: &str) -> bool {
    pattern.starts_with('/')
        || pattern.starts_with("./")
        || pattern.starts_with("../")
        || pattern.starts_with('~')
        || has_drive_prefix(pattern)
}

/// Normalize a user-supplied pattern.
///
/// A literal path such as `src/generated` becomes `/src/generated`, so it
/// only matches that directory at the workspace root instead of any path
/// that happens to contain the same segments.
pub fn normalize_pattern(raw: &str) -> Result<String, SettingsError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(SettingsError::InvalidPattern {
            pattern: raw.to_string(),
            reason: "pattern is empty".to_string(),
        });
    }

    let normalized = if !is_glob(trimmed) && !is_rooted(trimmed) {
        format!("/{}", trimmed)
    } else {
        trimmed.to_string()
    };

    GlobBuilder::new(&normalized)
        .literal_separator(true)
        .build()
        .map_err(|e| SettingsError::InvalidPattern {
            pattern: raw.to_string(),
            reason: e.to_string(),
        })?;

    Ok(normalized)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_is_rooted() {
        assert_eq!(normalize_pattern("src/generated").unwrap(), "/src/generated");
        assert_eq!(normalize_pattern("  vendor ").unwrap(), "/vendor");
    }

    #[test]
    fn test_globs_untouched() {
        assert_eq!(normalize_pattern("**/*.min.js").unwrap(), "**/*.min.js");
        assert_eq!(normalize_pattern("src/*.rs").unwrap(), "src/*.rs");
        assert_eq!(normalize_pattern("file?.txt").unwrap(), "file?.txt");
    }

    #[test]
    fn test_rooted_forms_untouched() {
        for p in ["/abs/path", "./local", "../up", "~/home", "C:\\win", "d:/x"] {
            assert_eq!(normalize_pattern(p).unwrap(), p);
        }
    }

    #[test]
    fn test_invalid_patterns() {
        assert!(matches!(
            normalize_pattern("   "),
            Err(SettingsError::InvalidPattern { .. })
        ));
        assert!(matches!(
            normalize_pattern("src/[unclosed"),
            Err(SettingsError::InvalidPattern { .. })
        ));
    }
}
