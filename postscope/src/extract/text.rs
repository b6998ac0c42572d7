use regex::Regex;
use std::sync::LazyLock;

/// Upper bound, in characters, of page text embedded in a prompt.
pub const MAX_PROMPT_CHARS: usize = 6000;
/// Characters of extracted text shown back to the user as a preview.
pub const PREVIEW_CHARS: usize = 1500;
/// Appended in place of an elided tail.
pub const ELISION_MARKER: &str = " ...";

static SCRIPT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<script\b.*?>.*?</script\s*>").unwrap());
static STYLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<style\b.*?>.*?</style\s*>").unwrap());
static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<[^>]+>").unwrap());
static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Flatten markup into a single line of plain text.
///
/// Script and style elements are dropped with their content, every remaining tag becomes a
/// space, and whitespace runs collapse to one space. Stray angle brackets left over by
/// unbalanced markup are blanked as well, so the output never contains `<` or `>`.
pub fn html_to_text(html: &str) -> String {
    let cleaned = SCRIPT_RE.replace_all(html, " ");
    let cleaned = STYLE_RE.replace_all(&cleaned, " ");
    let cleaned = TAG_RE.replace_all(&cleaned, " ");
    let cleaned = cleaned.replace(['<', '>'], " ");
    WHITESPACE_RE.replace_all(&cleaned, " ").trim().to_string()
}

/// Bound `text` to `max_chars` characters.
///
/// Text that already fits is returned unchanged. Otherwise the text is cut at the last word
/// boundary leaving room for [`ELISION_MARKER`], or hard-cut when no boundary exists.
pub fn truncate_text(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }

    let keep = max_chars.saturating_sub(ELISION_MARKER.chars().count());
    let cut = text.char_indices().nth(keep).map(|(i, _)| i).unwrap_or(text.len());
    let head = &text[..cut];

    // Prefer ending on a word boundary when the next char does not already start a new word.
    let next_is_space = text[cut..].chars().next().map(char::is_whitespace).unwrap_or(true);
    let head = if next_is_space {
        head
    } else {
        match head.rfind(char::is_whitespace) {
            Some(idx) if idx > 0 => &head[..idx],
            _ => head,
        }
    };

    format!("{}{}", head.trim_end(), ELISION_MARKER)
}

/// First [`PREVIEW_CHARS`] characters of `text`.
pub fn preview(text: &str) -> String {
    text.chars().take(PREVIEW_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_scripts_styles_and_tags() {
        let html = r#"<html><head><style type="text/css">body { color: red; }</style>
            <SCRIPT>var secret = "hidden";</SCRIPT></head>
            <body><h1>Title</h1>
            <p>First   paragraph
            spanning lines.</p></body></html>"#;
        let text = html_to_text(html);
        assert_eq!(text, "Title First paragraph spanning lines.");
        assert!(!text.contains("hidden"));
        assert!(!text.contains("color"));
    }

    #[test]
    fn tags_become_spaces() {
        assert_eq!(html_to_text("one<br>two<span>three</span>"), "one two three");
    }

    #[test]
    fn malformed_markup_never_leaks_brackets() {
        let inputs = [
            "<div><p>unclosed",
            "text with a < b and c > d",
            "<script>never closed",
            "<<>><a href='x'",
            "",
            "<p>emoji ✓ ok</p>",
        ];
        for input in inputs {
            let text = html_to_text(input);
            assert!(!text.contains('<') && !text.contains('>'), "leaked bracket for {input:?}: {text:?}");
        }
        assert_eq!(html_to_text("<p>emoji ✓ ok</p>"), "emoji ✓ ok");
    }

    #[test]
    fn short_text_is_untouched() {
        let text = "  spaced   text  ";
        assert_eq!(truncate_text(text, MAX_PROMPT_CHARS), text);
        let exact = "x".repeat(MAX_PROMPT_CHARS);
        assert_eq!(truncate_text(&exact, MAX_PROMPT_CHARS), exact);
    }

    #[test]
    fn long_text_is_cut_on_a_word_boundary() {
        let text = "word ".repeat(2000);
        let out = truncate_text(&text, MAX_PROMPT_CHARS);
        assert!(out.chars().count() <= MAX_PROMPT_CHARS);
        assert!(out.ends_with(ELISION_MARKER));
        assert!(out.trim_end_matches(ELISION_MARKER).ends_with("word"));
    }

    #[test]
    fn unbroken_text_is_hard_cut() {
        let text = "é".repeat(MAX_PROMPT_CHARS + 10);
        let out = truncate_text(&text, MAX_PROMPT_CHARS);
        assert_eq!(out.chars().count(), MAX_PROMPT_CHARS);
        assert!(out.ends_with(ELISION_MARKER));
    }

    #[test]
    fn preview_counts_characters() {
        let text = "ש".repeat(PREVIEW_CHARS * 2);
        assert_eq!(preview(&text).chars().count(), PREVIEW_CHARS);
        assert_eq!(preview("short"), "short");
    }
}
