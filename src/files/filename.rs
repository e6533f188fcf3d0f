//! Filename sanitization
//!
//! Storage keys must be free of spaces and special characters; the
//! original filename is preserved in object metadata for display.

use regex::Regex;

/// Sanitize a filename for use as a storage key
///
/// Whitespace runs become underscores, characters outside
/// `[A-Za-z0-9._-]` are dropped, repeats of `._-` collapse, and an empty
/// result falls back to `"file"`. The extension, when present, survives
/// sanitization.
///
/// # Examples
///
/// ```
/// use workdesk::files::sanitize_file_name;
///
/// assert_eq!(sanitize_file_name("a b.txt"), "a_b.txt");
/// assert_eq!(sanitize_file_name("résumé (final).pdf"), "rsum_final.pdf");
/// assert_eq!(sanitize_file_name("???"), "file");
/// ```
pub fn sanitize_file_name(name: &str) -> String {
    let whitespace = Regex::new(r"\s+").expect("static regex");
    let disallowed = Regex::new(r"[^A-Za-z0-9._-]").expect("static regex");
    let repeats = Regex::new(r"([._-])\1+").expect("static regex");

    let sanitized = whitespace.replace_all(name.trim(), "_");
    let sanitized = disallowed.replace_all(&sanitized, "");
    let sanitized = repeats.replace_all(&sanitized, "$1");
    let sanitized = sanitized.trim_matches(|c| c == '.' || c == '_' || c == '-');

    if sanitized.is_empty() {
        "file".to_string()
    } else {
        sanitized.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spaces_become_underscores() {
        assert_eq!(sanitize_file_name("a b.txt"), "a_b.txt");
        assert_eq!(sanitize_file_name("my  holiday   photo.jpg"), "my_holiday_photo.jpg");
    }

    #[test]
    fn test_special_characters_are_dropped() {
        assert_eq!(sanitize_file_name("invoice#42@final!.pdf"), "invoice42final.pdf");
        assert_eq!(sanitize_file_name("q&a (draft).md"), "qa_draft.md");
    }

    #[test]
    fn test_non_ascii_is_dropped() {
        assert_eq!(sanitize_file_name("résumé.pdf"), "rsum.pdf");
    }

    #[test]
    fn test_repeated_separators_collapse() {
        assert_eq!(sanitize_file_name("a -- b.txt"), "a_-_b.txt");
        assert_eq!(sanitize_file_name("weird....name.txt"), "weird.name.txt");
    }

    #[test]
    fn test_leading_trailing_separators_trimmed() {
        assert_eq!(sanitize_file_name(".hidden"), "hidden");
        assert_eq!(sanitize_file_name("  name.txt  "), "name.txt");
        assert_eq!(sanitize_file_name("-dash-"), "dash");
    }

    #[test]
    fn test_empty_result_falls_back() {
        assert_eq!(sanitize_file_name(""), "file");
        assert_eq!(sanitize_file_name("???"), "file");
        assert_eq!(sanitize_file_name("   "), "file");
    }

    #[test]
    fn test_clean_name_is_unchanged() {
        assert_eq!(sanitize_file_name("report-2026_v2.pdf"), "report-2026_v2.pdf");
    }

    #[test]
    fn test_result_never_contains_spaces() {
        for name in ["a b c.txt", " x ", "tab\there.txt", "new\nline.txt"] {
            assert!(!sanitize_file_name(name).contains(char::is_whitespace));
        }
    }
}
