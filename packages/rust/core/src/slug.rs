//! File-name slugs for published artifacts.

use std::sync::LazyLock;

use regex::Regex;

/// Used when a name has no usable characters.
const FALLBACK_SLUG: &str = "content";

static NON_SLUG_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9]+").expect("valid regex"));

/// Lowercase ASCII slug: runs of anything but `[a-z0-9]` collapse to `-`,
/// leading and trailing dashes are dropped.
pub fn slugify(name: &str) -> String {
    let lower = name.to_lowercase();
    let slug = NON_SLUG_CHARS.replace_all(&lower, "-");
    let slug = slug.trim_matches('-');
    if slug.is_empty() {
        FALLBACK_SLUG.to_string()
    } else {
        slug.to_string()
    }
}

/// `{slug(name)}_{millis}_{identifier}[.{ext}]`.
pub fn package_file_name(
    name: Option<&str>,
    millis: i64,
    identifier: &str,
    extension: Option<&str>,
) -> String {
    let slug = slugify(name.unwrap_or_default());
    match extension.filter(|ext| !ext.is_empty()) {
        Some(ext) => format!("{slug}_{millis}_{identifier}.{ext}"),
        None => format!("{slug}_{millis}_{identifier}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_collapses_and_trims() {
        assert_eq!(slugify("Counting Fun!"), "counting-fun");
        assert_eq!(slugify("  Math -- Grade 3 / Unit_2 "), "math-grade-3-unit-2");
        assert_eq!(slugify("ABC123"), "abc123");
    }

    #[test]
    fn slugify_falls_back_when_nothing_is_left() {
        assert_eq!(slugify(""), "content");
        assert_eq!(slugify("!!!"), "content");
    }

    #[test]
    fn package_file_name_layout() {
        assert_eq!(
            package_file_name(Some("Counting Fun"), 1_700_000_000_000, "do_123", Some("zip")),
            "counting-fun_1700000000000_do_123.zip"
        );
        assert_eq!(
            package_file_name(None, 5, "do_1", Some("ecar")),
            "content_5_do_1.ecar"
        );
        assert_eq!(package_file_name(Some("x"), 5, "do_1", None), "x_5_do_1");
    }
}
