//! Prompt text and the fixed strings that shape model input.
//!
//! Callers override the OCR prompt via [`crate::config::RunConfig::ocr_prompt`]
//! and supply conversion prompts via [`crate::config::ConversionPrompts`];
//! the constants here are the defaults and the wire-level markers.

/// User-turn text sent alongside each page image.
///
/// This is DeepSeek-OCR's plain-transcription prompt (no layout grounding).
pub const DEFAULT_OCR_PROMPT: &str = "Free OCR.";

/// Placeholder in the user prompt that receives the combined OCR text.
pub const TEXT_PLACEHOLDER: &str = "{{text}}";

/// Delimiter line placed before each page's text in the combined document.
pub fn page_delimiter(page_num: usize) -> String {
    format!("--- Page {} ---", page_num)
}

/// One page's contribution to the combined document text.
///
/// The block is trimmed as a whole, so an empty page collapses to just its
/// delimiter line.
pub fn page_block(page_num: usize, text: &str) -> String {
    format!("{}\n{}", page_delimiter(page_num), text)
        .trim()
        .to_string()
}

/// Substitute the combined text into a user prompt template.
///
/// Only the first placeholder is replaced. A template without a placeholder
/// is sent unchanged and the text is not included.
pub fn fill_user_prompt(template: &str, text: &str) -> String {
    template.replacen(TEXT_PLACEHOLDER, text, 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_block_format() {
        assert_eq!(page_block(1, "Foo"), "--- Page 1 ---\nFoo");
        assert_eq!(page_block(3, "  bar \n"), "--- Page 3 ---\n  bar");
        assert_eq!(page_block(2, ""), "--- Page 2 ---");
    }

    #[test]
    fn fill_replaces_first_placeholder_only() {
        assert_eq!(
            fill_user_prompt("A {{text}} B {{text}}", "x"),
            "A x B {{text}}"
        );
    }

    #[test]
    fn fill_without_placeholder_keeps_template() {
        assert_eq!(fill_user_prompt("Return JSON.", "ignored"), "Return JSON.");
    }
}
