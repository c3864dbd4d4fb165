//! Streaming filter that keeps only speakable text.
//!
//! Responses are streamed to TTS in fragments, and a parenthesised aside or a
//! link frequently starts in one fragment and ends in another. [`FilterState`]
//! carries the "inside brackets" flag across fragments of one session so the
//! whole span is suppressed no matter where the fragment boundaries fall.

use std::sync::LazyLock;

use regex::Regex;

/// Any `scheme://` URL up to the next whitespace.
static URL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[A-Za-z][A-Za-z0-9+.\-]*://\S+").expect("URL pattern is valid")
});

fn is_open_bracket(c: char) -> bool {
    matches!(c, '(' | '（')
}

fn is_close_bracket(c: char) -> bool {
    matches!(c, ')' | '）')
}

/// Bracket-suppression state for one streamed session.
///
/// ASCII and full-width brackets are interchangeable, so `（` may be closed by
/// `)`. Brackets do not nest: the first closing bracket ends suppression.
///
/// An opening bracket that is never closed silences every later fragment of
/// the session. Callers that start a new response on the same handle must call
/// [`FilterState::reset`] (or use a fresh state); [`FilterState::is_suppressing`]
/// reports whether the session is currently muted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FilterState {
    in_brackets: bool,
}

impl FilterState {
    pub fn new() -> Self {
        Self::default()
    }

    /// `true` while an opening bracket is waiting for its close.
    pub fn is_suppressing(&self) -> bool {
        self.in_brackets
    }

    /// Return to the speaking state.
    pub fn reset(&mut self) {
        self.in_brackets = false;
    }

    /// Filter one fragment, returning the speakable part (possibly empty).
    ///
    /// Accepts `&str` or `Option<&str>`; absent text yields an empty string.
    /// Bracket suppression runs first, then URLs left in the output are removed.
    /// Whitespace around a removed URL is kept as is.
    pub fn filter<'a>(&mut self, fragment: impl Into<Option<&'a str>>) -> String {
        let Some(fragment) = fragment.into() else {
            return String::new();
        };
        if fragment.is_empty() {
            return String::new();
        }

        let mut spoken = String::with_capacity(fragment.len());
        for c in fragment.chars() {
            if is_open_bracket(c) {
                self.in_brackets = true;
            } else if is_close_bracket(c) {
                self.in_brackets = false;
            } else if !self.in_brackets {
                spoken.push(c);
            }
        }

        strip_urls(&spoken)
    }
}

/// Remove every `scheme://...` URL from `text`.
pub fn strip_urls(text: &str) -> String {
    URL_PATTERN.replace_all(text, "").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter_all(fragments: &[&str]) -> Vec<String> {
        let mut state = FilterState::new();
        fragments.iter().map(|f| state.filter(*f)).collect()
    }

    #[test]
    fn test_plain_text_unchanged() {
        let mut state = FilterState::new();
        assert_eq!(state.filter("Hello there, chat!"), "Hello there, chat!");
        assert!(!state.is_suppressing());
    }

    #[test]
    fn test_filter_is_idempotent_on_clean_text() {
        let mut state = FilterState::new();
        let once = state.filter("今天的直播到此结束。Thanks everyone");
        let twice = state.filter(once.as_str());
        assert_eq!(once, twice);
    }

    #[test]
    fn test_brackets_within_fragment() {
        let mut state = FilterState::new();
        assert_eq!(state.filter("A(B)C"), "AC");
        assert_eq!(state.filter("我（笑）好"), "我好");
    }

    #[test]
    fn test_bracket_spans_fragment_boundary() {
        assert_eq!(filter_all(&["A(B", "C)D"]), vec!["A", "D"]);
    }

    #[test]
    fn test_suppression_spans_many_fragments() {
        assert_eq!(
            filter_all(&["Look (see", " the ", "link", " below) here"]),
            vec!["Look ", "", "", " here"]
        );
    }

    #[test]
    fn test_unmatched_open_bracket_silences_session() {
        let mut state = FilterState::new();
        assert_eq!(state.filter("A(B"), "A");
        assert!(state.is_suppressing());
        assert_eq!(state.filter("more text"), "");
        assert_eq!(state.filter("and more"), "");

        state.reset();
        assert_eq!(state.filter("back"), "back");
    }

    #[test]
    fn test_mixed_bracket_kinds() {
        let mut state = FilterState::new();
        assert_eq!(state.filter("A（B)C"), "AC");
        assert_eq!(state.filter("D(E）F"), "DF");
    }

    #[test]
    fn test_close_while_speaking_is_dropped() {
        let mut state = FilterState::new();
        assert_eq!(state.filter("A)B"), "AB");
        assert!(!state.is_suppressing());
    }

    #[test]
    fn test_brackets_do_not_nest() {
        let mut state = FilterState::new();
        assert_eq!(state.filter("A(B(C)D)E"), "ADE");
    }

    #[test]
    fn test_url_backstop_keeps_surrounding_spaces() {
        let mut state = FilterState::new();
        assert_eq!(state.filter("see http://x.com/y now"), "see  now");
        assert_eq!(state.filter("go to https://example.org"), "go to ");
        assert_eq!(state.filter("ftp://files.example.com/a.txt done"), " done");
    }

    #[test]
    fn test_fully_bracketed_link_is_empty() {
        let mut state = FilterState::new();
        assert_eq!(state.filter("(only link content)"), "");
        assert_eq!(state.filter("(https://example.com/page)"), "");
    }

    #[test]
    fn test_url_removed_after_bracket_suppression() {
        // The bracket closing inside the URL ends suppression; the URL pass then
        // removes the tail that became visible.
        let mut state = FilterState::new();
        assert_eq!(state.filter("x (a) http://t.co/(b)c y"), "x   y");
    }

    #[test]
    fn test_empty_and_absent_input() {
        let mut state = FilterState::new();
        assert_eq!(state.filter(""), "");
        assert_eq!(state.filter(None), "");

        // Absent input does not disturb suppression state.
        state.filter("(");
        assert_eq!(state.filter(None), "");
        assert!(state.is_suppressing());
    }

    #[test]
    fn test_concatenated_output_never_contains_bracketed_text() {
        let input = "Hi (secret one) there（秘密）, visit (http://a.b/c) now";
        // Split at every possible boundary and check the concatenation.
        let chars: Vec<char> = input.chars().collect();
        for cut in 0..=chars.len() {
            let first: String = chars[..cut].iter().collect();
            let second: String = chars[cut..].iter().collect();
            let out = filter_all(&[&first, &second]).concat();
            assert_eq!(out, "Hi  there, visit  now", "cut at {cut}");
        }
    }
}
