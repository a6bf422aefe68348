// Flat subgroup table — one row per subgroup, the pipeline's final product.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::pipeline::exemplars::Exemplar;
use crate::vocabulary::logodds::WordScore;

/// One subgroup with its membership, geometry and vocabulary contrast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubgroupRow {
    /// Pre-order id; 0 is the root
    pub subgroup_id: usize,
    pub parent_id: Option<usize>,
    pub depth: usize,
    /// Embedding rows of the texts in this subgroup
    pub member_leaf_indices: Vec<usize>,
    pub matched_user_locs: Vec<usize>,
    pub matched_user_ids: Vec<String>,
    pub centroid: Vec<f64>,
    pub cutoff: f64,
    /// Summed word counts of the members, aligned to the vocabulary
    pub word_count_summary: Vec<f64>,
    /// Weighted log-odds z per vocabulary word
    pub wlogodds_z: Vec<f64>,
    pub top_words: Vec<WordScore>,
    pub bottom_words: Vec<WordScore>,
    pub exemplars: Vec<Exemplar>,
}

impl SubgroupRow {
    pub fn size(&self) -> usize {
        self.member_leaf_indices.len()
    }
}

/// All subgroups of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubgroupTable {
    pub generated_at: DateTime<Utc>,
    pub vocabulary: Vec<String>,
    pub rows: Vec<SubgroupRow>,
}

impl SubgroupTable {
    pub fn new(vocabulary: Vec<String>, rows: Vec<SubgroupRow>) -> Self {
        Self {
            generated_at: Utc::now(),
            vocabulary,
            rows,
        }
    }

    pub fn row(&self, subgroup_id: usize) -> Option<&SubgroupRow> {
        self.rows.iter().find(|r| r.subgroup_id == subgroup_id)
    }

    /// Rows whose parent is `subgroup_id`, in id order.
    pub fn children(&self, subgroup_id: usize) -> Vec<&SubgroupRow> {
        self.rows
            .iter()
            .filter(|r| r.parent_id == Some(subgroup_id))
            .collect()
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize subgroup table")
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Malformed subgroup table JSON")
    }

    pub fn write_json(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_json()?)
            .with_context(|| format!("Failed to write {}", path.display()))
    }

    pub fn read_json(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::from_json(&json).with_context(|| format!("Invalid subgroup table {}", path.display()))
    }
}
