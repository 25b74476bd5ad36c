//! Text normalization applied to every provider input

/// Normalize text before it is sent to an embedding provider.
///
/// Lowercases, replaces non-word characters with spaces, collapses
/// whitespace and truncates to `max_chars` characters.
pub fn preprocess_text(text: &str, max_chars: usize) -> String {
    let cleaned: String = text
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '_' || c.is_whitespace() {
                c
            } else {
                ' '
            }
        })
        .collect();

    let collapsed = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");

    let truncated: String = collapsed.chars().take(max_chars).collect();
    truncated.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalization() {
        assert_eq!(preprocess_text("  Hello,   WORLD!! ", 512), "hello world");
        assert_eq!(preprocess_text("pot-holes\ton\nMain St.", 512), "pot holes on main st");
        assert_eq!(preprocess_text("snake_case stays", 512), "snake_case stays");
    }

    #[test]
    fn test_only_punctuation_is_empty() {
        assert_eq!(preprocess_text("?!... --", 512), "");
        assert_eq!(preprocess_text("   ", 512), "");
    }

    #[test]
    fn test_truncation_counts_chars() {
        let text = "é".repeat(600);
        let processed = preprocess_text(&text, 512);
        assert_eq!(processed.chars().count(), 512);

        // Truncation must not leave a dangling space
        assert_eq!(preprocess_text("abc def", 4), "abc");
    }
}
