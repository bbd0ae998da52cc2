//! Input sanitising for user-supplied text.
//!
//! Everything a user types is shown verbatim in someone else's browser, so
//! text is trimmed and HTML-escaped before it leaves the matchmaker. Image
//! payloads are opaque data URLs and are not touched.

/// Trim and HTML-escape user text.
///
/// Escapes `&`, `<`, `>`, `"` and `'`.
pub fn sanitize_text(raw: &str) -> String {
    let trimmed = raw.trim();
    let mut out = String::with_capacity(trimmed.len());
    for c in trimmed.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

/// Sanitise a bio and cut it to `max_chars` characters.
///
/// The cut happens after escaping, counted in characters rather than bytes.
pub fn sanitize_bio(raw: &str, max_chars: usize) -> String {
    sanitize_text(raw).chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn escapes_markup() {
        assert_eq!(
            sanitize_text("<script>alert('x') & \"y\"</script>"),
            "&lt;script&gt;alert(&#x27;x&#x27;) &amp; &quot;y&quot;&lt;/script&gt;"
        );
    }

    #[test]
    fn trims_whitespace() {
        assert_eq!(sanitize_text("  hi there \n"), "hi there");
        assert_eq!(sanitize_text("   "), "");
    }

    #[test]
    fn bio_is_cut_by_characters() {
        let bio = "é".repeat(80);
        assert_eq!(sanitize_bio(&bio, 50).chars().count(), 50);
    }

    #[test]
    fn short_bio_is_kept() {
        assert_eq!(sanitize_bio(" likes cats ", 50), "likes cats");
    }

    proptest! {
        #[test]
        fn output_has_no_raw_markup(raw in ".*") {
            let clean = sanitize_text(&raw);
            prop_assert!(!clean.contains('<'));
            prop_assert!(!clean.contains('>'));
            prop_assert!(!clean.contains('"'));
        }

        #[test]
        fn bio_never_exceeds_limit(raw in ".*", max in 0usize..80) {
            prop_assert!(sanitize_bio(&raw, max).chars().count() <= max);
        }
    }
}
