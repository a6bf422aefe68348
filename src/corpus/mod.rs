// Corpus — embeddings, typed ids, word counts and engagement for every item.
//
// Rows are items in one shared embedding space. Comments and posts are the
// text rows that get clustered; users are classified against the resulting
// subgroup tree. The id prefix decides which is which.

pub mod embeddings;
pub mod loader;

use std::collections::HashMap;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::vocabulary::index::{sum_counts, Vocabulary, WordCounts};
use embeddings::EmbeddingMatrix;

/// What an item id refers to, from its type prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    /// `t1_`
    Comment,
    /// `t3_`
    Post,
    /// `t2_`
    User,
}

impl ItemKind {
    pub fn from_id(id: &str) -> Result<Self> {
        match id.get(..3) {
            Some("t1_") => Ok(ItemKind::Comment),
            Some("t3_") => Ok(ItemKind::Post),
            Some("t2_") => Ok(ItemKind::User),
            _ => anyhow::bail!("Unrecognized item id '{id}': expected a t1_, t2_ or t3_ prefix"),
        }
    }

    /// Comments and posts are texts; users are not.
    pub fn is_text(self) -> bool {
        matches!(self, ItemKind::Comment | ItemKind::Post)
    }
}

/// Engagement numbers for a text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemStats {
    pub upvotes: i64,
    pub replies: u32,
}

/// Everything the pipeline needs about one item.
#[derive(Debug, Clone)]
pub struct Item {
    pub id: String,
    pub embedding: Vec<f64>,
    pub counts: WordCounts,
    pub stats: ItemStats,
}

/// The full set of items, row-aligned with the embedding matrix.
#[derive(Debug, Clone)]
pub struct Corpus {
    ids: Vec<String>,
    kinds: Vec<ItemKind>,
    embeddings: EmbeddingMatrix,
    vocabulary: Vocabulary,
    counts: Vec<WordCounts>,
    stats: Vec<ItemStats>,
    rows_by_id: HashMap<String, usize>,
}

impl Corpus {
    /// An empty corpus over `vocabulary`.
    pub fn new(vocabulary: Vocabulary) -> Self {
        Self {
            ids: Vec::new(),
            kinds: Vec::new(),
            embeddings: EmbeddingMatrix::default(),
            vocabulary,
            counts: Vec::new(),
            stats: Vec::new(),
            rows_by_id: HashMap::new(),
        }
    }

    /// Add an item, returning its row. Ids must be unique and carry a known
    /// prefix; embeddings must match the dimensionality of earlier rows.
    pub fn push(&mut self, item: Item) -> Result<usize> {
        let kind = ItemKind::from_id(&item.id)?;
        if self.rows_by_id.contains_key(&item.id) {
            anyhow::bail!("Duplicate item id '{}'", item.id);
        }
        if let Some(&(index, _)) = item.counts.entries().last() {
            if index >= self.vocabulary.len() {
                anyhow::bail!(
                    "Item '{}' counts word {index} outside a vocabulary of {}",
                    item.id,
                    self.vocabulary.len()
                );
            }
        }

        let row = self.embeddings.push_row(&item.embedding)?;
        self.rows_by_id.insert(item.id.clone(), row);
        self.ids.push(item.id);
        self.kinds.push(kind);
        self.counts.push(item.counts);
        self.stats.push(item.stats);
        Ok(row)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn id(&self, row: usize) -> &str {
        &self.ids[row]
    }

    pub fn kind(&self, row: usize) -> ItemKind {
        self.kinds[row]
    }

    pub fn row_of(&self, id: &str) -> Option<usize> {
        self.rows_by_id.get(id).copied()
    }

    pub fn embeddings(&self) -> &EmbeddingMatrix {
        &self.embeddings
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }

    pub fn counts(&self, row: usize) -> &WordCounts {
        &self.counts[row]
    }

    pub fn stats(&self, row: usize) -> ItemStats {
        self.stats[row]
    }

    /// Rows of comments and posts, ascending. These are the clustered items.
    pub fn text_rows(&self) -> Vec<usize> {
        (0..self.len()).filter(|&r| self.kinds[r].is_text()).collect()
    }

    /// Rows of users, ascending.
    pub fn user_rows(&self) -> Vec<usize> {
        (0..self.len())
            .filter(|&r| self.kinds[r] == ItemKind::User)
            .collect()
    }

    /// Word counts summed over every text row.
    pub fn global_vector(&self) -> Vec<f64> {
        sum_counts(
            self.text_rows().into_iter().map(|r| &self.counts[r]),
            self.vocabulary.len(),
        )
    }

    /// Word counts summed over the given rows.
    pub fn summed_counts(&self, rows: &[usize]) -> Vec<f64> {
        sum_counts(rows.iter().map(|&r| &self.counts[r]), self.vocabulary.len())
    }
}
