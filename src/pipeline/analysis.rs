// Subgroup analysis pipeline: linkage tree in, subgroup table out.
//
// Steps:
//   1. map linkage leaves onto the corpus text rows
//   2. annotate leaf sets, decide validity, build the subgroup tree
//   3. classify every user row into the tree
//   4. per subgroup: summed word counts, log-odds z, top/bottom words
//   5. per subgroup: exemplars
//
// Every step is synchronous and reads the corpus snapshot only.

use std::collections::HashSet;

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use super::exemplars::select_exemplars;
use crate::corpus::Corpus;
use crate::output::table::{SubgroupRow, SubgroupTable};
use crate::subgroups::ellipsoid::DEFAULT_QUANTILE;
use crate::subgroups::hierarchy::SubgroupTree;
use crate::subgroups::membership::classify;
use crate::subgroups::validity::{ValidityAnalyzer, MIN_SUBGROUP_SIZE};
use crate::tree::annotate::LeafSets;
use crate::tree::linkage::LinkageTree;
use crate::vocabulary::logodds::{
    english_stop_words, top_words, weighted_log_odds_z, DEFAULT_ALPHA,
};

/// Tunables for one pipeline run.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineParams {
    /// Smallest linkage node that can become a subgroup
    pub min_subgroup_size: usize,
    /// Training coverage of each subgroup ellipsoid
    pub quantile: f64,
    /// Prior mass of the log-odds test
    pub alpha: f64,
    /// How many over- and under-represented words to keep per subgroup
    pub top_words: usize,
    /// Leave English stop words out of the top/bottom word lists
    pub exclude_stop_words: bool,
    /// Draw a progress bar while classifying users
    pub show_progress: bool,
}

impl Default for PipelineParams {
    fn default() -> Self {
        Self {
            min_subgroup_size: MIN_SUBGROUP_SIZE,
            quantile: DEFAULT_QUANTILE,
            alpha: DEFAULT_ALPHA,
            top_words: 10,
            exclude_stop_words: true,
            show_progress: false,
        }
    }
}

/// Run the whole pipeline.
pub fn run(corpus: &Corpus, tree: &LinkageTree, params: &PipelineParams) -> Result<SubgroupTable> {
    let subgroups = discover(corpus, tree, params)?;
    summarize(corpus, &subgroups, params)
}

/// Build the subgroup tree over the corpus texts and classify its users.
pub fn discover(
    corpus: &Corpus,
    tree: &LinkageTree,
    params: &PipelineParams,
) -> Result<SubgroupTree> {
    let text_rows = corpus.text_rows();
    if text_rows.is_empty() {
        anyhow::bail!("Corpus has no comments or posts to cluster");
    }

    let leaf_sets = LeafSets::annotate(tree, &text_rows)?;
    let flags = ValidityAnalyzer::new(tree, &leaf_sets, corpus.embeddings())
        .with_min_subgroup_size(params.min_subgroup_size)
        .analyze();
    info!(
        texts = text_rows.len(),
        flagged = flags.count(),
        "Subgroup boundaries decided"
    );

    let mut subgroups = SubgroupTree::build(
        tree,
        &leaf_sets,
        &flags,
        corpus.embeddings(),
        params.quantile,
    )?;

    let users = corpus.user_rows();
    let pb = if params.show_progress {
        let pb = ProgressBar::new(users.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar().template("  Classifying [{bar:30}] {pos}/{len} ({eta})")?,
        );
        pb
    } else {
        ProgressBar::hidden()
    };

    let mut placed = 0;
    for &row in &users {
        let matches = classify(
            &mut subgroups,
            corpus.embeddings().row(row),
            row,
            corpus.id(row),
        )?;
        if !matches.is_empty() {
            placed += 1;
        }
        pb.inc(1);
    }
    pb.finish_and_clear();

    info!(
        subgroups = subgroups.len(),
        users = users.len(),
        placed,
        "Classified users into subgroups"
    );
    Ok(subgroups)
}

/// Turn a classified subgroup tree into the output table.
pub fn summarize(
    corpus: &Corpus,
    subgroups: &SubgroupTree,
    params: &PipelineParams,
) -> Result<SubgroupTable> {
    let vocabulary = corpus.vocabulary();
    let global = corpus.global_vector();
    let exclude: HashSet<String> = if params.exclude_stop_words {
        english_stop_words()
    } else {
        HashSet::new()
    };

    let mut rows = Vec::with_capacity(subgroups.len());
    for node in subgroups.nodes() {
        let counts = corpus.summed_counts(&node.leaf_indices);
        let z = weighted_log_odds_z(&counts, &global, params.alpha)?;
        let words = top_words(&z, vocabulary, params.top_words, &exclude);

        rows.push(SubgroupRow {
            subgroup_id: node.id,
            parent_id: node.parent,
            depth: node.depth,
            member_leaf_indices: node.leaf_indices.clone(),
            matched_user_locs: node.matched_locs.clone(),
            matched_user_ids: node.matched_ids.clone(),
            centroid: node.ellipsoid.centroid().iter().copied().collect(),
            cutoff: node.ellipsoid.cutoff(),
            word_count_summary: counts,
            wlogodds_z: z,
            top_words: words.top,
            bottom_words: words.bottom,
            exemplars: select_exemplars(corpus, node),
        });
    }

    Ok(SubgroupTable::new(vocabulary.words().to_vec(), rows))
}
