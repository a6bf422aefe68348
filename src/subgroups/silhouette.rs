// Silhouette score over a handful of leaf groups.
//
// For every point: a = mean distance to the rest of its own group,
// b = smallest mean distance to any other group, s = (b - a) / max(a, b).
// A point alone in its group scores 0. The overall score is the mean of s.
//
// The score only exists for 2..=n-1 populated groups. Outside that range the
// result is `Silhouette::Undefined`, and every comparison against it resolves
// to "don't split".

use crate::corpus::embeddings::EmbeddingMatrix;

/// A silhouette score, or the marker for a grouping it can't be computed on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Silhouette {
    Score(f64),
    Undefined,
}

impl Silhouette {
    pub fn value(self) -> Option<f64> {
        match self {
            Silhouette::Score(s) => Some(s),
            Silhouette::Undefined => None,
        }
    }

    pub fn is_defined(self) -> bool {
        matches!(self, Silhouette::Score(_))
    }
}

impl std::fmt::Display for Silhouette {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Silhouette::Score(s) => write!(f, "{s:.4}"),
            Silhouette::Undefined => write!(f, "undefined"),
        }
    }
}

/// Whether a finer grouping scoring `candidate` should replace a coarser
/// grouping scoring `baseline`.
///
/// Ties go to the split. Anything undefined keeps the coarser grouping.
pub fn prefers_split(baseline: Silhouette, candidate: Silhouette) -> bool {
    match (baseline, candidate) {
        (Silhouette::Score(base), Silhouette::Score(cand)) => !(base > cand),
        _ => false,
    }
}

/// Silhouette score of the union of `groups`, labelled by group.
///
/// Each group is a list of embedding rows. Empty groups are ignored.
pub fn silhouette(embeddings: &EmbeddingMatrix, groups: &[&[usize]]) -> Silhouette {
    let groups: Vec<&[usize]> = groups.iter().copied().filter(|g| !g.is_empty()).collect();
    let total: usize = groups.iter().map(|g| g.len()).sum();

    if groups.len() < 2 || groups.len() >= total {
        return Silhouette::Undefined;
    }

    let mut sum = 0.0;
    for (gi, group) in groups.iter().enumerate() {
        if group.len() == 1 {
            continue;
        }

        for &i in group.iter() {
            let own: f64 = group
                .iter()
                .filter(|&&j| j != i)
                .map(|&j| embeddings.distance(i, j))
                .sum::<f64>()
                / (group.len() - 1) as f64;

            let nearest = groups
                .iter()
                .enumerate()
                .filter(|(gj, _)| *gj != gi)
                .map(|(_, other)| mean_distance(embeddings, i, other))
                .fold(f64::INFINITY, f64::min);

            let scale = own.max(nearest);
            if scale > 0.0 {
                sum += (nearest - own) / scale;
            }
        }
    }

    Silhouette::Score(sum / total as f64)
}

fn mean_distance(embeddings: &EmbeddingMatrix, i: usize, group: &[usize]) -> f64 {
    group
        .iter()
        .map(|&j| embeddings.distance(i, j))
        .sum::<f64>()
        / group.len() as f64
}
