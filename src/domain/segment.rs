//! Line wrapping for vertical columns.
//!
//! Lengths are counted in grapheme clusters. Soft wraps happen at dictionary
//! word boundaries so that Japanese words are not split across columns unless
//! a single word is longer than the limit.

use icu_segmenter::{WordSegmenter, options::WordBreakInvariantOptions};
use unicode_segmentation::UnicodeSegmentation;

use super::error::DomainError;

/// Grapheme cluster count of `text`.
pub fn cluster_count(text: &str) -> usize {
    text.graphemes(true).count()
}

/// Auto-wrap length used when balanced layout is requested without a limit:
/// `max(1, round(sqrt(n)))` over the clusters of `text`, line breaks excluded.
pub fn balanced_line_length(text: &str) -> usize {
    let clusters = text
        .graphemes(true)
        .filter(|g| !matches!(*g, "\n" | "\r\n" | "\r"))
        .count();
    ((clusters as f64).sqrt().round() as usize).max(1)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TextSegmenter;

impl TextSegmenter {
    pub fn new() -> Self {
        Self
    }

    /// Split `text` into lines of at most `max_chars_per_line` clusters.
    ///
    /// Hard breaks (`\n`, `\r\n`) are always honored and blank lines are kept.
    /// Without a limit every hard line is returned as-is.
    pub fn segment(
        &self,
        text: &str,
        max_chars_per_line: Option<usize>,
    ) -> Result<Vec<String>, DomainError> {
        if text.trim().is_empty() {
            return Err(DomainError::invalid_input("text must not be empty"));
        }
        if max_chars_per_line == Some(0) {
            return Err(DomainError::invalid_option(
                "max_chars_per_line",
                "must be at least 1",
            ));
        }

        let mut lines = Vec::new();
        for hard_line in hard_lines(text) {
            match max_chars_per_line {
                Some(limit) if cluster_count(hard_line) > limit => {
                    wrap_hard_line(hard_line, limit, &mut lines);
                }
                _ => lines.push(hard_line.to_string()),
            }
        }
        Ok(lines)
    }
}

fn hard_lines(text: &str) -> impl Iterator<Item = &str> {
    text.split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
}

fn word_chunks(line: &str) -> Vec<&str> {
    let segmenter = WordSegmenter::new_dictionary(WordBreakInvariantOptions::default());
    let breaks: Vec<usize> = segmenter.segment_str(line).collect();
    breaks
        .windows(2)
        .map(|pair| &line[pair[0]..pair[1]])
        .filter(|chunk| !chunk.is_empty())
        .collect()
}

fn wrap_hard_line(line: &str, limit: usize, out: &mut Vec<String>) {
    let mut current = String::new();
    let mut current_len = 0;

    for chunk in word_chunks(line) {
        let chunk_len = cluster_count(chunk);
        if current_len + chunk_len <= limit {
            current.push_str(chunk);
            current_len += chunk_len;
            continue;
        }

        if current_len > 0 {
            out.push(std::mem::take(&mut current));
            current_len = 0;
        }

        // Whitespace at a wrap point is consumed by the break.
        if chunk.trim().is_empty() {
            continue;
        }

        if chunk_len <= limit {
            current.push_str(chunk);
            current_len = chunk_len;
            continue;
        }

        let graphemes: Vec<&str> = chunk.graphemes(true).collect();
        let mut pieces = graphemes.chunks(limit).peekable();
        while let Some(piece) = pieces.next() {
            if pieces.peek().is_some() {
                out.push(piece.concat());
            } else {
                current = piece.concat();
                current_len = piece.len();
            }
        }
    }

    if current_len > 0 {
        out.push(current);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_text_is_rejected() {
        let segmenter = TextSegmenter::new();
        assert!(matches!(
            segmenter.segment("", None),
            Err(DomainError::InvalidInput { .. })
        ));
        assert!(matches!(
            segmenter.segment(" \n\t", Some(3)),
            Err(DomainError::InvalidInput { .. })
        ));
    }

    #[test]
    fn hard_breaks_are_kept_without_limit() {
        let lines = TextSegmenter::new()
            .segment("一行目\r\n\n三行目", None)
            .expect("segments");
        assert_eq!(lines, vec!["一行目", "", "三行目"]);
    }

    #[test]
    fn wrapped_lines_respect_limit_and_keep_text() {
        let text = "吾輩は猫である。名前はまだ無い。どこで生れたかとんと見当がつかぬ。";
        for limit in [1, 2, 3, 5, 8, 13] {
            let lines = TextSegmenter::new()
                .segment(text, Some(limit))
                .expect("segments");
            assert!(
                lines.iter().all(|line| cluster_count(line) <= limit),
                "limit {limit}: {lines:?}"
            );
            assert_eq!(lines.concat(), text);
        }
    }

    #[test]
    fn long_runs_are_broken_mid_word() {
        let lines = TextSegmenter::new()
            .segment("aaaaaaaaaa", Some(4))
            .expect("segments");
        assert_eq!(lines, vec!["aaaa", "aaaa", "aa"]);
    }

    #[test]
    fn spaces_at_wrap_points_are_dropped() {
        let lines = TextSegmenter::new()
            .segment("hello world", Some(5))
            .expect("segments");
        assert_eq!(lines, vec!["hello", "world"]);
    }

    #[test]
    fn balanced_length_uses_square_root() {
        assert_eq!(balanced_line_length("あ"), 1);
        assert_eq!(balanced_line_length("あいうえおかきくけ"), 3);
        assert_eq!(balanced_line_length("あいうえ\nおかきくけ"), 3);
        assert_eq!(balanced_line_length("\n"), 1);
    }

    #[test]
    fn counts_grapheme_clusters() {
        assert_eq!(cluster_count("が"), 1);
        assert_eq!(cluster_count("か\u{3099}"), 1);
    }
}
