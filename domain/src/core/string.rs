//! String utilities for the domain layer.

/// Truncate a string to a maximum length with ellipsis (UTF-8 safe)
///
/// Uses byte length for max_len but ensures truncation occurs at valid
/// UTF-8 character boundaries.
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        s.to_string()
    } else {
        let target = max_len.saturating_sub(3);
        let mut end = target.min(s.len());
        while end > 0 && !s.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &s[..end])
    }
}

/// Lowercase the text and collapse every whitespace run into a single space.
pub fn normalize(s: &str) -> String {
    s.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// The first `chars` characters of the normalized text.
pub fn normalized_prefix(s: &str, chars: usize) -> String {
    normalize(s).chars().take(chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_ascii() {
        assert_eq!(truncate("hello", 10), "hello");
        assert_eq!(truncate("hello world", 8), "hello...");
    }

    #[test]
    fn test_truncate_multibyte() {
        // 'é' is 2 bytes; cutting inside it backs up to the previous boundary
        assert_eq!(truncate("café au lait", 7), "caf...");
        assert_eq!(truncate("日本語", 9), "日本語");
        assert_eq!(truncate("日本語テスト", 10), "日本...");
    }

    #[test]
    fn test_normalize_collapses_whitespace_and_case() {
        assert_eq!(normalize("  Use   a\tB-Tree\n"), "use a b-tree");
        assert_eq!(normalize(""), "");
    }

    #[test]
    fn test_normalized_prefix() {
        assert_eq!(normalized_prefix("Use  A  Hash Map", 8), "use a ha");
        assert_eq!(normalized_prefix("short", 64), "short");
    }
}
