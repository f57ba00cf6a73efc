//! Alignment of an original prompt against its optimized counterpart
//!
//! Produces an ordered span sequence over the original text, marking which
//! portions survived optimization. The presentation layer uses the spans to
//! strike out removed text; the aligner itself is pure and stateless and is
//! invoked on demand, never on a recomputation schedule.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// How the original text is segmented and matched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlignMode {
    /// Whitespace-separated words, matched by set membership against the
    /// optimized word list.
    ///
    /// Membership is case-sensitive and positionless: a word that moved, or
    /// that occurs several times in the original while only one occurrence
    /// was kept, still reports as matched. Callers that need positional
    /// fidelity should use [`AlignMode::CharGreedy`].
    #[default]
    WordSet,
    /// Character-by-character greedy walk with a single forward cursor into
    /// the optimized string.
    ///
    /// Non-backtracking: a match consumes the cursor position even when a
    /// later character would have aligned better, so reordered text
    /// over-reports mismatches. Once the cursor exhausts the optimized
    /// string, everything remaining is unmatched.
    CharGreedy,
}

/// One unit of the original text (a word, a whitespace run, or a single
/// character, depending on mode) tagged with whether it survived.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlignmentSpan {
    pub text: String,
    pub matched: bool,
}

/// Align `original` against `optimized`.
///
/// Concatenating the `text` of every returned span reconstructs `original`
/// exactly, in both modes. Content present only in `optimized` is not
/// represented; the aligner annotates the original.
pub fn align(original: &str, optimized: &str, mode: AlignMode) -> Vec<AlignmentSpan> {
    match mode {
        AlignMode::WordSet => align_word_set(original, optimized),
        AlignMode::CharGreedy => align_char_greedy(original, optimized),
    }
}

fn align_word_set(original: &str, optimized: &str) -> Vec<AlignmentSpan> {
    let kept: HashSet<&str> = optimized.split_whitespace().collect();

    segment_runs(original)
        .into_iter()
        .map(|run| {
            // Whitespace runs carry the reconstruction invariant and are
            // never reported as removed.
            let is_whitespace = run.chars().all(char::is_whitespace);
            AlignmentSpan {
                text: run.to_string(),
                matched: is_whitespace || kept.contains(run),
            }
        })
        .collect()
}

fn align_char_greedy(original: &str, optimized: &str) -> Vec<AlignmentSpan> {
    let target: Vec<char> = optimized.chars().collect();
    let mut cursor = 0;

    original
        .chars()
        .map(|ch| {
            let matched = cursor < target.len() && target[cursor] == ch;
            if matched {
                cursor += 1;
            }
            AlignmentSpan {
                text: ch.to_string(),
                matched,
            }
        })
        .collect()
}

/// Split into maximal runs of whitespace / non-whitespace, preserving every
/// byte of the input.
fn segment_runs(text: &str) -> Vec<&str> {
    let mut runs = Vec::new();
    let mut start = 0;
    let mut prev_is_whitespace = None;

    for (idx, ch) in text.char_indices() {
        let is_whitespace = ch.is_whitespace();
        match prev_is_whitespace {
            Some(prev) if prev != is_whitespace => {
                runs.push(&text[start..idx]);
                start = idx;
                prev_is_whitespace = Some(is_whitespace);
            }
            Some(_) => {}
            None => prev_is_whitespace = Some(is_whitespace),
        }
    }

    if !text.is_empty() {
        runs.push(&text[start..]);
    }

    runs
}

/// Rebuild the original input from a span sequence.
pub fn reconstruct(spans: &[AlignmentSpan]) -> String {
    spans.iter().map(|span| span.text.as_str()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(spans: &[AlignmentSpan]) -> Vec<(&str, bool)> {
        spans
            .iter()
            .filter(|s| !s.text.chars().all(char::is_whitespace))
            .map(|s| (s.text.as_str(), s.matched))
            .collect()
    }

    #[test]
    fn identity_is_fully_matched_in_both_modes() {
        let text = "summarize this: the quick brown fox";
        for mode in [AlignMode::WordSet, AlignMode::CharGreedy] {
            let spans = align(text, text, mode);
            assert!(spans.iter().all(|s| s.matched), "mode {:?}", mode);
        }
    }

    #[test]
    fn concatenation_reconstructs_original() {
        let cases = [
            ("the cat  sat\non the mat", "cat sat mat"),
            ("  leading and trailing  ", "and"),
            ("no overlap at all", "xyz"),
            ("", "anything"),
        ];
        for (original, optimized) in cases {
            for mode in [AlignMode::WordSet, AlignMode::CharGreedy] {
                let spans = align(original, optimized, mode);
                assert_eq!(reconstruct(&spans), original, "mode {:?}", mode);
            }
        }
    }

    #[test]
    fn char_greedy_marks_dropped_character() {
        let spans = align("abc", "ac", AlignMode::CharGreedy);
        let flags: Vec<(String, bool)> = spans
            .into_iter()
            .map(|s| (s.text, s.matched))
            .collect();
        assert_eq!(
            flags,
            vec![
                ("a".to_string(), true),
                ("b".to_string(), false),
                ("c".to_string(), true),
            ]
        );
    }

    #[test]
    fn word_set_marks_removed_word() {
        let spans = align("the cat sat", "cat sat", AlignMode::WordSet);
        assert_eq!(
            words(&spans),
            vec![("the", false), ("cat", true), ("sat", true)]
        );
    }

    #[test]
    fn word_set_membership_is_not_positional() {
        // "sat cat" kept both words in a different order; membership still
        // reports them as matched. Documented limitation of this mode.
        let spans = align("cat sat", "sat cat", AlignMode::WordSet);
        assert!(words(&spans).iter().all(|(_, matched)| *matched));
    }

    #[test]
    fn word_set_is_case_sensitive() {
        let spans = align("Cat sat", "cat sat", AlignMode::WordSet);
        assert_eq!(words(&spans), vec![("Cat", false), ("sat", true)]);
    }

    #[test]
    fn empty_original_yields_no_spans() {
        assert!(align("", "whatever", AlignMode::WordSet).is_empty());
        assert!(align("", "whatever", AlignMode::CharGreedy).is_empty());
    }

    #[test]
    fn empty_optimized_marks_everything_unmatched() {
        let spans = align("abc", "", AlignMode::CharGreedy);
        assert!(spans.iter().all(|s| !s.matched));

        let spans = align("the cat", "", AlignMode::WordSet);
        assert!(words(&spans).iter().all(|(_, matched)| !matched));
    }

    #[test]
    fn char_greedy_stops_matching_once_cursor_is_exhausted() {
        let spans = align("abab", "ab", AlignMode::CharGreedy);
        let flags: Vec<bool> = spans.iter().map(|s| s.matched).collect();
        assert_eq!(flags, vec![true, true, false, false]);
    }

    #[test]
    fn char_greedy_does_not_backtrack() {
        // The cursor waits at "a", so the original "b" is reported removed
        // even though a "b" exists later in the optimized string.
        let spans = align("ba", "ab", AlignMode::CharGreedy);
        let flags: Vec<bool> = spans.iter().map(|s| s.matched).collect();
        assert_eq!(flags, vec![false, true]);
    }

    #[test]
    fn trailing_optimized_content_is_not_represented() {
        let spans = align("ab", "abcdef", AlignMode::CharGreedy);
        assert_eq!(reconstruct(&spans), "ab");
        assert!(spans.iter().all(|s| s.matched));
    }
}
