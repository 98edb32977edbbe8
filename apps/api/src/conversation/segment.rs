//! Response segmenter — splits an assistant reply into prose and fenced code
//! segments so the client can render each with its own treatment.

use serde::{Deserialize, Serialize};

const FENCE: &str = "```";

/// Language tag used when a fence carries no recognizable tag.
/// Matches the highlighter default the web client ships with.
pub const FALLBACK_LANGUAGE: &str = "javascript";

/// One typed unit of rendered content, in source order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Segment {
    PlainText { text: String },
    CodeBlock { language: String, code: String },
}

/// Splits `text` on triple-backtick fences, keeping the delimiters in the
/// split: for `n` complete fences the result has exactly `2n + 1` segments,
/// with code blocks at the odd indices.
///
/// Plain fragments are trimmed but still emitted when empty — callers that
/// don't want blank paragraphs skip them at render time. An opening fence
/// with no closing partner is treated as plain text, not a code block.
pub fn segment(text: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut rest = text;

    loop {
        let Some(open) = rest.find(FENCE) else {
            segments.push(plain(rest));
            break;
        };
        let after_open = open + FENCE.len();
        let Some(close) = rest[after_open..].find(FENCE) else {
            // Unterminated fence: everything from here is prose.
            segments.push(plain(rest));
            break;
        };
        let end = after_open + close + FENCE.len();

        segments.push(plain(&rest[..open]));
        segments.push(code_block(&rest[after_open..after_open + close]));
        rest = &rest[end..];
    }

    segments
}

fn plain(fragment: &str) -> Segment {
    Segment::PlainText {
        text: fragment.trim().to_string(),
    }
}

/// Builds a `CodeBlock` from the fence interior (delimiters already
/// stripped). The first line is consumed as a language tag when it is a
/// single word; otherwise it belongs to the code and the tag falls back.
fn code_block(interior: &str) -> Segment {
    let (language, code) = match interior.split_once('\n') {
        // A tag only counts on the opening line, before any code.
        Some((first, body)) if is_language_tag(first.trim()) => {
            (first.trim().to_string(), body)
        }
        Some(_) => (FALLBACK_LANGUAGE.to_string(), interior),
        // Single-line fence: a lone word is a tag with no code.
        None if is_language_tag(interior.trim()) => (interior.trim().to_string(), ""),
        None => (FALLBACK_LANGUAGE.to_string(), interior),
    };

    Segment::CodeBlock {
        language,
        code: code.trim().to_string(),
    }
}

fn is_language_tag(candidate: &str) -> bool {
    !candidate.is_empty()
        && candidate
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '+' || c == '#')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain_text(s: &str) -> Segment {
        Segment::PlainText {
            text: s.to_string(),
        }
    }

    fn code(lang: &str, c: &str) -> Segment {
        Segment::CodeBlock {
            language: lang.to_string(),
            code: c.to_string(),
        }
    }

    #[test]
    fn test_prose_then_code_then_prose() {
        let reply = "Here:\n```python\nprint(1)\n```\nDone.";
        assert_eq!(
            segment(reply),
            vec![
                plain_text("Here:"),
                code("python", "print(1)"),
                plain_text("Done."),
            ]
        );
    }

    #[test]
    fn test_no_fences_is_single_plain_segment() {
        assert_eq!(segment("just an answer"), vec![plain_text("just an answer")]);
    }

    #[test]
    fn test_empty_input_is_single_empty_plain_segment() {
        assert_eq!(segment(""), vec![plain_text("")]);
    }

    #[test]
    fn test_fence_count_property_two_blocks_gives_five_segments() {
        let reply = "a\n```rust\nfn f() {}\n```\nb\n```\nx = 1\n```\nc";
        let segments = segment(reply);
        assert_eq!(segments.len(), 5);
        assert!(matches!(segments[1], Segment::CodeBlock { .. }));
        assert!(matches!(segments[3], Segment::CodeBlock { .. }));
    }

    #[test]
    fn test_adjacent_fences_emit_empty_plain_between() {
        let reply = "```python\na\n``````python\nb\n```";
        let segments = segment(reply);
        assert_eq!(segments.len(), 5);
        assert_eq!(segments[0], plain_text(""));
        assert_eq!(segments[2], plain_text(""));
        assert_eq!(segments[4], plain_text(""));
        assert_eq!(segments[1], code("python", "a"));
        assert_eq!(segments[3], code("python", "b"));
    }

    #[test]
    fn test_missing_language_tag_falls_back() {
        let segments = segment("```\nlet x = 1;\n```");
        assert_eq!(segments[1], code(FALLBACK_LANGUAGE, "let x = 1;"));
    }

    #[test]
    fn test_non_word_first_line_is_code_not_tag() {
        let segments = segment("```\nx = y + 1\n```");
        assert_eq!(segments[1], code(FALLBACK_LANGUAGE, "x = y + 1"));
    }

    #[test]
    fn test_unterminated_fence_stays_plain() {
        let reply = "start\n```python\nprint(1)";
        assert_eq!(segment(reply), vec![plain_text("start\n```python\nprint(1)")]);
    }

    #[test]
    fn test_resegmenting_plain_text_is_idempotent() {
        let first = segment("Some prose with no code at all.");
        let Segment::PlainText { text } = &first[0] else {
            panic!("expected plain text");
        };
        assert_eq!(segment(text), first);
    }

    #[test]
    fn test_language_with_plus_and_hash() {
        let segments = segment("```c++\nint x;\n```");
        assert_eq!(segments[1], code("c++", "int x;"));
    }
}
