// Corpus loading from the enriched-embeddings JSON document.
//
// The document carries the embedding matrix with its ids, the vocabulary
// (as the keys of `words`), per-text frequency tables and engagement, and
// per-user word counts plus the ids of the texts each user wrote. Users
// without an embedding of their own get the normalized mean of their
// texts' embeddings when they wrote at least two of them.

use std::cell::Cell;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::embeddings::normalized_mean;
use super::{Corpus, Item, ItemKind, ItemStats};
use crate::vocabulary::index::{Vocabulary, WordCounts};

#[derive(Debug, Deserialize)]
struct RawCorpus {
    ids: Vec<String>,
    embeddings: Vec<Vec<f32>>,
    #[serde(default)]
    words: BTreeMap<String, RawWord>,
    #[serde(default)]
    comments: Vec<RawComment>,
    #[serde(default)]
    posts: Vec<RawPost>,
    #[serde(default)]
    users: BTreeMap<String, RawUser>,
}

#[derive(Debug, Deserialize)]
struct RawWord {
    #[serde(default)]
    frequency: u64,
}

#[derive(Debug, Deserialize)]
struct RawComment {
    id: String,
    #[serde(default)]
    upvotes: i64,
    #[serde(default)]
    direct_reply_count: u32,
    #[serde(default)]
    frequency_table: Vec<(String, u64)>,
}

#[derive(Debug, Deserialize)]
struct RawPost {
    id: String,
    #[serde(default)]
    total_upvotes: i64,
    #[serde(default)]
    total_direct_replies: u32,
    #[serde(default)]
    frequency_table: Vec<(String, u64)>,
}

#[derive(Debug, Deserialize)]
struct RawUser {
    #[serde(default)]
    text_ids: Vec<String>,
    #[serde(default)]
    words: BTreeMap<String, RawWord>,
}

/// Read and validate a corpus file.
pub fn load(path: &Path) -> Result<Corpus> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read corpus file {}", path.display()))?;
    parse(&json).with_context(|| format!("Invalid corpus file {}", path.display()))
}

/// Parse and validate a corpus document.
pub fn parse(json: &str) -> Result<Corpus> {
    let raw: RawCorpus = serde_json::from_str(json).context("Malformed corpus JSON")?;

    if raw.ids.len() != raw.embeddings.len() {
        anyhow::bail!(
            "Corpus has {} ids but {} embeddings",
            raw.ids.len(),
            raw.embeddings.len()
        );
    }

    let vocabulary = Vocabulary::new(raw.words.keys().cloned());
    let unknown_words = Cell::new(0usize);
    let vectorize = |pairs: &mut dyn Iterator<Item = (&String, u64)>| {
        let (counts, dropped) = vocabulary.vectorize_counted(pairs);
        unknown_words.set(unknown_words.get() + dropped);
        counts
    };

    let mut texts: HashMap<&str, (WordCounts, ItemStats)> = HashMap::new();
    for comment in &raw.comments {
        let counts = vectorize(&mut comment.frequency_table.iter().map(|(w, n)| (w, *n)));
        let stats = ItemStats {
            upvotes: comment.upvotes,
            replies: comment.direct_reply_count,
        };
        texts.insert(comment.id.as_str(), (counts, stats));
    }
    for post in &raw.posts {
        let counts = vectorize(&mut post.frequency_table.iter().map(|(w, n)| (w, *n)));
        let stats = ItemStats {
            upvotes: post.total_upvotes,
            replies: post.total_direct_replies,
        };
        texts.insert(post.id.as_str(), (counts, stats));
    }

    let user_counts =
        |user: &RawUser| vectorize(&mut user.words.iter().map(|(w, entry)| (w, entry.frequency)));

    let mut corpus = Corpus::new(vocabulary.clone());
    for (id, embedding) in raw.ids.iter().zip(&raw.embeddings) {
        let (counts, stats) = match ItemKind::from_id(id)? {
            ItemKind::User => (
                raw.users.get(id).map(user_counts).unwrap_or_default(),
                ItemStats::default(),
            ),
            _ => texts.remove(id.as_str()).unwrap_or_default(),
        };
        corpus
            .push(Item {
                id: id.clone(),
                embedding: embedding.iter().map(|&v| v as f64).collect(),
                counts,
                stats,
            })
            .with_context(|| format!("Bad corpus row for '{id}'"))?;
    }

    if !texts.is_empty() {
        debug!(
            count = texts.len(),
            "Frequency tables without an embedding were ignored"
        );
    }

    let averaged = add_averaged_users(&mut corpus, &raw.users, user_counts)?;

    if unknown_words.get() > 0 {
        warn!(
            dropped = unknown_words.get(),
            "Frequency tables used words missing from the vocabulary"
        );
    }

    info!(
        items = corpus.len(),
        texts = corpus.text_rows().len(),
        users = corpus.user_rows().len(),
        averaged_users = averaged,
        vocabulary = corpus.vocabulary().len(),
        "Loaded corpus"
    );
    Ok(corpus)
}

/// Give users without an embedding the normalized mean of their texts'.
///
/// Users with fewer than two embedded texts are left out.
fn add_averaged_users<F>(
    corpus: &mut Corpus,
    users: &BTreeMap<String, RawUser>,
    user_counts: F,
) -> Result<usize>
where
    F: Fn(&RawUser) -> WordCounts,
{
    let mut added = 0;
    for (id, user) in users {
        if corpus.row_of(id).is_some() {
            continue;
        }

        let rows: Vec<usize> = user
            .text_ids
            .iter()
            .filter_map(|text| corpus.row_of(text))
            .filter(|&row| corpus.kind(row).is_text())
            .collect();
        if rows.len() < 2 {
            debug!(user = %id, texts = rows.len(), "Not enough texts to place user");
            continue;
        }

        let vectors: Vec<&[f64]> = rows.iter().map(|&r| corpus.embeddings().row(r)).collect();
        let Some(embedding) = normalized_mean(&vectors) else {
            debug!(user = %id, "Mean text embedding is zero, skipping user");
            continue;
        };

        corpus
            .push(Item {
                id: id.clone(),
                embedding,
                counts: user_counts(user),
                stats: ItemStats::default(),
            })
            .with_context(|| format!("Bad averaged embedding for user '{id}'"))?;
        added += 1;
    }
    Ok(added)
}
