// Vocabulary index and sparse word-count vectors.
//
// Every text and user carries a count vector over one shared vocabulary.
// Most items use a tiny fraction of the vocabulary, so counts are stored as
// sorted (word index, count) pairs and only densified for scoring.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex_lite::Regex;
use tracing::debug;

/// Sorted, deduplicated word list with a reverse index.
#[derive(Debug, Clone, Default)]
pub struct Vocabulary {
    words: Vec<String>,
    index: HashMap<String, usize>,
}

impl Vocabulary {
    pub fn new<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut words: Vec<String> = words.into_iter().map(Into::into).collect();
        words.sort();
        words.dedup();
        let index = words
            .iter()
            .enumerate()
            .map(|(i, w)| (w.clone(), i))
            .collect();
        Self { words, index }
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn words(&self) -> &[String] {
        &self.words
    }

    pub fn word(&self, index: usize) -> &str {
        &self.words[index]
    }

    pub fn index_of(&self, word: &str) -> Option<usize> {
        self.index.get(word).copied()
    }

    /// Convert word counts into a sparse vector over this vocabulary.
    ///
    /// Words missing from the vocabulary are dropped.
    pub fn vectorize<I, S>(&self, counts: I) -> WordCounts
    where
        I: IntoIterator<Item = (S, u64)>,
        S: AsRef<str>,
    {
        self.vectorize_counted(counts).0
    }

    /// Like [`Vocabulary::vectorize`], also returning how many words were
    /// dropped so callers can report one total.
    pub fn vectorize_counted<I, S>(&self, counts: I) -> (WordCounts, usize)
    where
        I: IntoIterator<Item = (S, u64)>,
        S: AsRef<str>,
    {
        let mut entries = Vec::new();
        let mut dropped = 0usize;
        let mut first_dropped: Option<String> = None;

        for (word, count) in counts {
            let word = word.as_ref();
            match self.index_of(word) {
                Some(i) => entries.push((i, count)),
                None => {
                    dropped += 1;
                    if first_dropped.is_none() {
                        first_dropped = Some(word.to_string());
                    }
                }
            }
        }

        if let Some(example) = first_dropped {
            debug!(dropped, example = %example, "Skipped words missing from the vocabulary");
        }

        (WordCounts::from_entries(entries), dropped)
    }

    /// Tokenize raw text and count the words that are in the vocabulary.
    pub fn count_words(&self, text: &str) -> WordCounts {
        let mut counts: HashMap<String, u64> = HashMap::new();
        for token in tokenize(text) {
            *counts.entry(token).or_insert(0) += 1;
        }
        self.vectorize(counts)
    }
}

fn token_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[a-z0-9']+").expect("token pattern is valid"))
}

/// Lowercase `text` and split it into word tokens (letters, digits and
/// apostrophes). Tokens made only of apostrophes are dropped.
pub fn tokenize(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    token_pattern()
        .find_iter(&lower)
        .map(|m| m.as_str().trim_matches('\''))
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Sparse word counts: `(vocabulary index, count)` pairs sorted by index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WordCounts {
    entries: Vec<(usize, u64)>,
}

impl WordCounts {
    /// Build from unsorted pairs; repeated indices are summed.
    pub fn from_entries(mut entries: Vec<(usize, u64)>) -> Self {
        entries.sort_by_key(|&(i, _)| i);
        let mut merged: Vec<(usize, u64)> = Vec::with_capacity(entries.len());
        for (i, count) in entries {
            match merged.last_mut() {
                Some((last, total)) if *last == i => *total += count,
                _ => merged.push((i, count)),
            }
        }
        Self { entries: merged }
    }

    pub fn entries(&self) -> &[(usize, u64)] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total(&self) -> u64 {
        self.entries.iter().map(|&(_, c)| c).sum()
    }

    pub fn get(&self, index: usize) -> u64 {
        self.entries
            .binary_search_by_key(&index, |&(i, _)| i)
            .map(|pos| self.entries[pos].1)
            .unwrap_or(0)
    }

    /// Add these counts into a dense vector.
    pub fn add_to(&self, dense: &mut [f64]) {
        for &(i, count) in &self.entries {
            dense[i] += count as f64;
        }
    }

    pub fn to_dense(&self, len: usize) -> Vec<f64> {
        let mut dense = vec![0.0; len];
        self.add_to(&mut dense);
        dense
    }
}

/// Elementwise sum of several count vectors, densified to `len`.
pub fn sum_counts<'a, I>(items: I, len: usize) -> Vec<f64>
where
    I: IntoIterator<Item = &'a WordCounts>,
{
    let mut dense = vec![0.0; len];
    for counts in items {
        counts.add_to(&mut dense);
    }
    dense
}
