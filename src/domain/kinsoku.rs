//! Japanese line-start rules (kinsoku shori) and per-cluster vertical annotations.

use std::collections::{BTreeMap, BTreeSet};

use unicode_segmentation::UnicodeSegmentation;

const LEADING_PROHIBITED: &str = "、。，．」』）］｝〕〉》】〙〗〟’”・：；！？ゝゞヽヾ々ー\
ぁぃぅぇぉっゃゅょゎゕゖァィゥェォッャュョヮヵヶｧｨｩｪｫｯｬｭｮ";

const ROTATED: &str = "–—―−－─━⎯⸺⸻";

const VERTICAL_FORMS: [(char, char); 2] = [('…', '︙'), ('‥', '︰')];

const TATE_CHU_YOKO_MAX_DIGITS: usize = 2;

/// Character tables used by [`KinsokuEngine`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KinsokuRules {
    leading_prohibited: BTreeSet<char>,
    rotated: BTreeSet<char>,
    vertical_forms: BTreeMap<char, char>,
    tate_chu_yoko_max_digits: usize,
}

impl Default for KinsokuRules {
    fn default() -> Self {
        Self {
            leading_prohibited: LEADING_PROHIBITED.chars().collect(),
            rotated: ROTATED.chars().collect(),
            vertical_forms: VERTICAL_FORMS.into_iter().collect(),
            tate_chu_yoko_max_digits: TATE_CHU_YOKO_MAX_DIGITS,
        }
    }
}

impl KinsokuRules {
    /// Rules with empty tables; nothing is prohibited, rotated or substituted.
    pub fn empty() -> Self {
        Self {
            leading_prohibited: BTreeSet::new(),
            rotated: BTreeSet::new(),
            vertical_forms: BTreeMap::new(),
            tate_chu_yoko_max_digits: 0,
        }
    }

    pub fn with_leading_prohibited(mut self, chars: impl IntoIterator<Item = char>) -> Self {
        self.leading_prohibited.extend(chars);
        self
    }

    pub fn without_leading_prohibited(mut self, chars: impl IntoIterator<Item = char>) -> Self {
        for ch in chars {
            self.leading_prohibited.remove(&ch);
        }
        self
    }

    pub fn with_rotated(mut self, chars: impl IntoIterator<Item = char>) -> Self {
        self.rotated.extend(chars.into_iter().filter(|ch| *ch != 'ー'));
        self
    }

    pub fn with_vertical_form(mut self, from: char, to: char) -> Self {
        self.vertical_forms.insert(from, to);
        self
    }

    /// Longest digit run merged into one upright cell; `0` disables merging.
    pub fn with_tate_chu_yoko_max_digits(mut self, digits: usize) -> Self {
        self.tate_chu_yoko_max_digits = digits;
        self
    }

    pub fn is_leading_prohibited(&self, cluster: &str) -> bool {
        cluster
            .chars()
            .next()
            .is_some_and(|ch| self.leading_prohibited.contains(&ch))
    }

    pub fn is_rotated(&self, cluster: &str) -> bool {
        !cluster.is_empty() && cluster.chars().all(|ch| self.rotated.contains(&ch))
    }

    fn vertical_form(&self, cluster: &str) -> String {
        cluster
            .chars()
            .map(|ch| self.vertical_forms.get(&ch).copied().unwrap_or(ch))
            .collect()
    }
}

/// One grapheme cluster, or a merged tate-chu-yoko run, with its vertical flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cluster {
    text: String,
    rotated: bool,
    leading_prohibited: bool,
    upright_combined: bool,
}

impl Cluster {
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn rotated(&self) -> bool {
        self.rotated
    }

    pub fn leading_prohibited(&self) -> bool {
        self.leading_prohibited
    }

    pub fn upright_combined(&self) -> bool {
        self.upright_combined
    }
}

/// The clusters of one vertical column, top to bottom.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SegmentedLine {
    clusters: Vec<Cluster>,
}

impl SegmentedLine {
    pub fn clusters(&self) -> &[Cluster] {
        &self.clusters
    }

    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }

    pub fn text(&self) -> String {
        self.clusters.iter().map(Cluster::text).collect()
    }
}

#[derive(Debug, Clone, Default)]
pub struct KinsokuEngine {
    rules: KinsokuRules,
}

impl KinsokuEngine {
    pub fn new(rules: KinsokuRules) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &KinsokuRules {
        &self.rules
    }

    /// Annotate `lines` and move prohibited line-start clusters onto the
    /// previous line until no line (other than the first) starts with one.
    /// A line is never reduced below one cluster.
    pub fn apply<S: AsRef<str>>(&self, lines: &[S]) -> Vec<SegmentedLine> {
        let mut lines: Vec<SegmentedLine> = lines
            .iter()
            .map(|line| self.annotate(line.as_ref()))
            .collect();

        let total: usize = lines.iter().map(SegmentedLine::len).sum();
        for _ in 0..=total {
            if !carry_prohibited_starts(&mut lines) {
                break;
            }
        }
        lines
    }

    fn annotate(&self, line: &str) -> SegmentedLine {
        let graphemes: Vec<&str> = line.graphemes(true).collect();
        let mut clusters = Vec::with_capacity(graphemes.len());

        let mut index = 0;
        while index < graphemes.len() {
            let run = graphemes[index..]
                .iter()
                .take_while(|g| is_ascii_digit(g))
                .count();
            if run > 0 && run <= self.rules.tate_chu_yoko_max_digits {
                clusters.push(Cluster {
                    text: graphemes[index..index + run].concat(),
                    rotated: false,
                    leading_prohibited: false,
                    upright_combined: true,
                });
                index += run;
                continue;
            }

            let step = run.max(1);
            for grapheme in &graphemes[index..index + step] {
                clusters.push(self.cluster(grapheme));
            }
            index += step;
        }

        SegmentedLine { clusters }
    }

    fn cluster(&self, grapheme: &str) -> Cluster {
        let text = self.rules.vertical_form(grapheme);
        Cluster {
            rotated: self.rules.is_rotated(&text),
            leading_prohibited: self.rules.is_leading_prohibited(&text),
            upright_combined: false,
            text,
        }
    }
}

fn is_ascii_digit(grapheme: &str) -> bool {
    grapheme.len() == 1 && grapheme.as_bytes()[0].is_ascii_digit()
}

fn carry_prohibited_starts(lines: &mut [SegmentedLine]) -> bool {
    let mut changed = false;
    for index in 1..lines.len() {
        let (head, tail) = lines.split_at_mut(index);
        let previous = &mut head[index - 1];
        let current = &mut tail[0];
        while current.clusters.len() > 1 && current.clusters[0].leading_prohibited {
            let moved = current.clusters.remove(0);
            previous.clusters.push(moved);
            changed = true;
        }
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::segment::TextSegmenter;

    fn texts(lines: &[SegmentedLine]) -> Vec<String> {
        lines.iter().map(SegmentedLine::text).collect()
    }

    #[test]
    fn comma_is_pulled_back_to_previous_line() {
        let lines = TextSegmenter::new()
            .segment("こんにちは、世界", Some(5))
            .expect("segments");
        let lines = KinsokuEngine::default().apply(&lines);
        assert_eq!(texts(&lines)[0], "こんにちは、");
        assert!(!lines[1].clusters()[0].leading_prohibited());
    }

    #[test]
    fn consecutive_prohibited_clusters_all_move() {
        let lines = KinsokuEngine::default().apply(&["あいう", "」。えお"]);
        assert_eq!(texts(&lines), vec!["あいう」。", "えお"]);
    }

    #[test]
    fn single_cluster_line_is_never_emptied() {
        let lines = KinsokuEngine::default().apply(&["あ", "。"]);
        assert_eq!(texts(&lines), vec!["あ", "。"]);
    }

    #[test]
    fn carry_repeats_through_blank_lines() {
        let lines = KinsokuEngine::default().apply(&["あ", "", "、、い"]);
        assert_eq!(texts(&lines), vec!["あ、", "、", "い"]);
    }

    #[test]
    fn first_line_is_left_alone() {
        let lines = KinsokuEngine::default().apply(&["、あ"]);
        assert_eq!(texts(&lines), vec!["、あ"]);
    }

    #[test]
    fn dashes_rotate_but_prolonged_sound_mark_does_not() {
        let rules = KinsokuRules::default().with_rotated(['ー']);
        let lines = KinsokuEngine::new(rules).apply(&["あ—ー"]);
        let clusters = lines[0].clusters();
        assert!(clusters[1].rotated());
        assert!(!clusters[2].rotated());
        assert!(clusters[2].leading_prohibited());
    }

    #[test]
    fn ellipsis_uses_vertical_form() {
        let lines = KinsokuEngine::default().apply(&["待って…‥"]);
        assert_eq!(texts(&lines), vec!["待って︙︰"]);
    }

    #[test]
    fn short_digit_runs_are_combined_upright() {
        let lines = KinsokuEngine::default().apply(&["第12話と3回と2024年"]);
        let clusters = lines[0].clusters();
        let combined: Vec<&str> = clusters
            .iter()
            .filter(|c| c.upright_combined())
            .map(Cluster::text)
            .collect();
        assert_eq!(combined, vec!["12", "3"]);
        assert!(clusters.iter().any(|c| c.text() == "2" && !c.upright_combined()));
    }

    #[test]
    fn custom_tables_replace_defaults() {
        let rules = KinsokuRules::empty().with_leading_prohibited(['a']);
        let lines = KinsokuEngine::new(rules).apply(&["xy", "、z", "ab"]);
        assert_eq!(texts(&lines), vec!["xy", "、za", "b"]);
    }
}
