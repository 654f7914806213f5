//! Approximate token counting for fragment budgets

use unicode_segmentation::UnicodeSegmentation;

/// Approximate token count using a word-based heuristic.
///
/// Roughly 1 word ~ 1.33 tokens for English text, which tracks the
/// embedding model's tokenizer closely enough for budget decisions
/// without linking the tokenizer itself.
pub fn estimate_tokens(text: &str) -> usize {
    let word_count = text.unicode_words().count();
    ((word_count as f32) * 1.33) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_text_has_zero_tokens() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("   \n\t"), 0);
    }

    #[test]
    fn test_estimate_scales_with_words() {
        let short = estimate_tokens("one two three");
        let long = estimate_tokens(&"word ".repeat(100));
        assert!(short >= 3);
        assert!(long > short);
        assert_eq!(estimate_tokens(&"word ".repeat(100)), 133);
    }

    #[test]
    fn test_punctuation_does_not_inflate_count() {
        assert_eq!(
            estimate_tokens("hello, world!"),
            estimate_tokens("hello world")
        );
    }
}
