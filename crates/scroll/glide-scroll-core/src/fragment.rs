//! Text Fragmentation Engine.
//!
//! `fragment` is a pure function from heading text and a highlight set to an
//! ordered structure of word groups (each holding per-character
//! `AnimatableUnit`s) and verbatim whitespace separators. The `Fragmenter`
//! registry makes repeated mounts of the same heading a no-op.

use hashbrown::{HashMap, HashSet};
use serde::{Deserialize, Serialize};

use crate::ids::HeadingId;
use crate::style::Target;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnimatableUnit {
    pub text: char,
    pub owner_word_index: usize,
    pub highlighted: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordGroup {
    pub index: usize,
    pub highlighted: bool,
    pub units: Vec<AnimatableUnit>,
}

impl WordGroup {
    pub fn text(&self) -> String {
        self.units.iter().map(|u| u.text).collect()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FragmentNode {
    Word(WordGroup),
    /// Inter-word whitespace, kept verbatim and never animated.
    Separator { text: String },
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FragmentedHeading {
    pub nodes: Vec<FragmentNode>,
}

impl FragmentedHeading {
    /// All units in reading order.
    pub fn units(&self) -> impl Iterator<Item = &AnimatableUnit> + '_ {
        self.words().flat_map(|w| w.units.iter())
    }

    pub fn words(&self) -> impl Iterator<Item = &WordGroup> + '_ {
        self.nodes.iter().filter_map(|n| match n {
            FragmentNode::Word(w) => Some(w),
            FragmentNode::Separator { .. } => None,
        })
    }

    pub fn unit_count(&self) -> usize {
        self.words().map(|w| w.units.len()).sum()
    }

    /// Rebuild the original text; fragmentation never alters content.
    pub fn text(&self) -> String {
        let mut out = String::new();
        for n in &self.nodes {
            match n {
                FragmentNode::Word(w) => out.extend(w.units.iter().map(|u| u.text)),
                FragmentNode::Separator { text } => out.push_str(text),
            }
        }
        out
    }
}

/// Words to highlight. Matching ignores punctuation on both sides
/// (`"Sell."` matches `Sell`), except characters listed in `keep`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HighlightSet {
    pub words: Vec<String>,
    pub case_insensitive: bool,
    pub keep: Vec<char>,
}

impl HighlightSet {
    pub fn new<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            words: words.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn case_insensitive(mut self) -> Self {
        self.case_insensitive = true;
        self
    }

    pub fn keeping(mut self, chars: &[char]) -> Self {
        self.keep.extend_from_slice(chars);
        self
    }

    fn normalize(&self, word: &str) -> String {
        let stripped: String = word
            .chars()
            .filter(|c| c.is_alphanumeric() || *c == '_' || self.keep.contains(c))
            .collect();
        if self.case_insensitive {
            stripped.to_lowercase()
        } else {
            stripped
        }
    }

    fn matcher(&self) -> HashSet<String> {
        self.words
            .iter()
            .map(|w| self.normalize(w))
            .filter(|w| !w.is_empty())
            .collect()
    }
}

/// Split `text` into word groups and separators.
pub fn fragment(text: &str, highlights: &HighlightSet) -> FragmentedHeading {
    let matcher = highlights.matcher();
    let mut nodes = Vec::new();
    let mut word = String::new();
    let mut space = String::new();
    let mut word_index = 0usize;

    let mut flush_word = |word: &mut String, nodes: &mut Vec<FragmentNode>| {
        if word.is_empty() {
            return;
        }
        let highlighted = matcher.contains(&highlights.normalize(word));
        let units = word
            .chars()
            .map(|text| AnimatableUnit {
                text,
                owner_word_index: word_index,
                highlighted,
            })
            .collect();
        nodes.push(FragmentNode::Word(WordGroup {
            index: word_index,
            highlighted,
            units,
        }));
        word_index += 1;
        word.clear();
    };

    for ch in text.chars() {
        if ch.is_whitespace() {
            flush_word(&mut word, &mut nodes);
            space.push(ch);
        } else {
            if !space.is_empty() {
                nodes.push(FragmentNode::Separator {
                    text: std::mem::take(&mut space),
                });
            }
            word.push(ch);
        }
    }
    flush_word(&mut word, &mut nodes);
    if !space.is_empty() {
        nodes.push(FragmentNode::Separator { text: space });
    }
    FragmentedHeading { nodes }
}

/// Registry of fragmented headings keyed by the host's element key.
#[derive(Debug, Default)]
pub struct Fragmenter {
    by_key: HashMap<String, HeadingId>,
    headings: HashMap<HeadingId, FragmentedHeading>,
}

impl Fragmenter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fragment the heading at `key` once. Returns `(id, true)` when the
    /// heading was fragmented now and `(id, false)` if it already was.
    pub fn fragment_node(
        &mut self,
        key: &str,
        text: &str,
        highlights: &HighlightSet,
        alloc: impl FnOnce() -> HeadingId,
    ) -> (HeadingId, bool) {
        if let Some(id) = self.by_key.get(key) {
            return (*id, false);
        }
        let id = alloc();
        self.by_key.insert(key.to_string(), id);
        self.headings.insert(id, fragment(text, highlights));
        (id, true)
    }

    pub fn get(&self, id: HeadingId) -> Option<&FragmentedHeading> {
        self.headings.get(&id)
    }

    pub fn id_for(&self, key: &str) -> Option<HeadingId> {
        self.by_key.get(key).copied()
    }

    /// Targets for every unit of a heading, in reading order.
    pub fn unit_targets(&self, id: HeadingId) -> Vec<Target> {
        self.headings
            .get(&id)
            .map(|h| {
                (0..h.unit_count())
                    .map(|index| Target::Unit { heading: id, index })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// The heading unmounted; its units are gone.
    pub fn release(&mut self, id: HeadingId) -> bool {
        self.by_key.retain(|_, v| *v != id);
        self.headings.remove(&id).is_some()
    }

    pub fn len(&self) -> usize {
        self.headings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.headings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn words_and_separators_preserve_text() {
        let h = fragment("If You Can  Imagine It", &HighlightSet::default());
        assert_eq!(h.text(), "If You Can  Imagine It");
        assert_eq!(h.words().count(), 5);
        assert_eq!(
            h.nodes[5],
            FragmentNode::Separator {
                text: "  ".into()
            }
        );
        assert_eq!(h.unit_count(), 17);
    }

    #[test]
    fn highlight_ignores_punctuation() {
        let h = fragment(
            "Stores Built to Sell.",
            &HighlightSet::new(["Built", "Sell."]),
        );
        let flags: Vec<bool> = h.words().map(|w| w.highlighted).collect();
        assert_eq!(flags, vec![false, true, false, true]);
        assert!(h.words().nth(3).unwrap().units.iter().all(|u| u.highlighted));
    }

    #[test]
    fn highlight_is_case_sensitive_by_default() {
        let set = HighlightSet::new(["imagine"]);
        let h = fragment("Imagine", &set);
        assert!(!h.words().next().unwrap().highlighted);
        let h = fragment("Imagine", &set.case_insensitive());
        assert!(h.words().next().unwrap().highlighted);
    }

    #[test]
    fn keep_chars_participate_in_matching() {
        let set = HighlightSet::new(["e-commerce"]).keeping(&['-']);
        let h = fragment("Modern e-commerce, done", &set);
        assert!(h.words().nth(1).unwrap().highlighted);
    }

    #[test]
    fn units_know_their_word() {
        let h = fragment("ab c", &HighlightSet::default());
        let owners: Vec<usize> = h.units().map(|u| u.owner_word_index).collect();
        assert_eq!(owners, vec![0, 0, 1]);
    }

    #[test]
    fn empty_and_whitespace_only_input() {
        assert!(fragment("", &HighlightSet::default()).nodes.is_empty());
        let h = fragment("   ", &HighlightSet::default());
        assert_eq!(h.unit_count(), 0);
        assert_eq!(h.text(), "   ");
    }

    #[test]
    fn fragmenting_twice_is_identical() {
        let set = HighlightSet::new(["Win."]);
        let a = serde_json::to_vec(&fragment("Designed To Win.", &set)).unwrap();
        let b = serde_json::to_vec(&fragment("Designed To Win.", &set)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn registry_is_idempotent_per_key() {
        let mut reg = Fragmenter::new();
        let mut next = 0u32;
        let (a, fresh) = reg.fragment_node("title", "Hello world", &HighlightSet::default(), || {
            next += 1;
            HeadingId(next)
        });
        assert!(fresh);
        let (b, fresh) = reg.fragment_node("title", "Hello world", &HighlightSet::default(), || {
            HeadingId(99)
        });
        assert!(!fresh);
        assert_eq!(a, b);
        assert_eq!(reg.len(), 1);
        assert_eq!(reg.unit_targets(a).len(), 10);
        assert!(reg.release(a));
        assert!(reg.id_for("title").is_none());
    }
}
