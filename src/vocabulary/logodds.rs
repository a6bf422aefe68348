// Weighted log-odds with an informative Dirichlet prior (Monroe et al. 2008).
//
// Compares a subgroup's word counts against the rest of the corpus. The
// prior is the corpus-wide word distribution scaled by `alpha`, which keeps
// rare words from dominating the ranking. Positive z means the word is
// over-represented in the subgroup, negative means under-represented.

use std::collections::HashSet;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use stop_words::{get, LANGUAGE};

use super::index::Vocabulary;

/// Total prior mass spread over the vocabulary.
pub const DEFAULT_ALPHA: f64 = 1.0;

/// Z-score of every word for subgroup counts `y1` against `global` counts.
///
/// The complement is `max(global - y1, 0)`. Any z that comes out NaN or
/// infinite (a word absent everywhere, an empty corpus) is reported as 0.0.
pub fn weighted_log_odds_z(y1: &[f64], global: &[f64], alpha: f64) -> Result<Vec<f64>> {
    if y1.len() != global.len() {
        anyhow::bail!(
            "Subgroup counts have {} words but global counts have {}",
            y1.len(),
            global.len()
        );
    }

    let y2: Vec<f64> = global
        .iter()
        .zip(y1)
        .map(|(g, a)| (g - a).max(0.0))
        .collect();
    let n1: f64 = y1.iter().sum();
    let n2: f64 = y2.iter().sum();
    let global_total: f64 = global.iter().sum();

    let logit = |p: f64| p.ln() - (1.0 - p).ln();

    let z = (0..global.len())
        .map(|w| {
            let prior = alpha * global[w] / global_total;
            let a1 = y1[w] + prior;
            let a2 = y2[w] + prior;
            let delta = logit(a1 / (n1 + alpha)) - logit(a2 / (n2 + alpha));
            let z = delta / (1.0 / a1 + 1.0 / a2).sqrt();
            if z.is_finite() {
                z
            } else {
                0.0
            }
        })
        .collect();

    Ok(z)
}

/// A word with its z-score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordScore {
    pub word: String,
    pub z: f64,
}

/// Most over- and under-represented words of one subgroup.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContrastWords {
    /// Highest z first
    pub top: Vec<WordScore>,
    /// Lowest z first
    pub bottom: Vec<WordScore>,
}

/// Pick the `k` highest and `k` lowest scoring words.
///
/// Words in `exclude` and words with no signal (z = 0) are skipped.
pub fn top_words(
    z: &[f64],
    vocabulary: &Vocabulary,
    k: usize,
    exclude: &HashSet<String>,
) -> ContrastWords {
    let mut scored: Vec<(usize, f64)> = z
        .iter()
        .copied()
        .enumerate()
        .filter(|&(i, score)| score != 0.0 && !exclude.contains(vocabulary.word(i)))
        .collect();

    scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
    let to_score = |&(i, z): &(usize, f64)| WordScore {
        word: vocabulary.word(i).to_string(),
        z,
    };

    ContrastWords {
        top: scored
            .iter()
            .filter(|(_, z)| *z > 0.0)
            .take(k)
            .map(to_score)
            .collect(),
        bottom: scored
            .iter()
            .rev()
            .filter(|(_, z)| *z < 0.0)
            .take(k)
            .map(to_score)
            .collect(),
    }
}

/// English stop words from the `stop-words` list.
pub fn english_stop_words() -> HashSet<String> {
    get(LANGUAGE::English).into_iter().collect()
}
