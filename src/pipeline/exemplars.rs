// Exemplar selection — a few representative texts per subgroup.
//
// Three roles: the member closest to the subgroup's center (by Mahalanobis
// distance under the subgroup's own ellipsoid), the most upvoted member, and
// the member with the most direct replies. A text already picked for one
// role is passed over for the next when any other member is left.

use std::cmp::Ordering;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::corpus::Corpus;
use crate::subgroups::hierarchy::SubgroupNode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExemplarRole {
    MostCentral,
    MostUpvoted,
    MostReplied,
}

impl std::fmt::Display for ExemplarRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            ExemplarRole::MostCentral => "most central",
            ExemplarRole::MostUpvoted => "most upvoted",
            ExemplarRole::MostReplied => "most replied",
        };
        write!(f, "{label}")
    }
}

/// A labeled representative text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exemplar {
    pub role: ExemplarRole,
    pub id: String,
}

/// Pick up to three exemplars for `node`, in role order.
pub fn select_exemplars(corpus: &Corpus, node: &SubgroupNode) -> Vec<Exemplar> {
    let members = &node.leaf_indices;
    let embeddings = corpus.embeddings();
    let distances: HashMap<usize, f64> = members
        .iter()
        .map(|&row| {
            let d = node.ellipsoid.squared_mahalanobis(embeddings.row(row));
            (row, d)
        })
        .collect();

    let mut chosen: Vec<usize> = Vec::new();
    let mut exemplars = Vec::new();

    let central = |a: usize, b: usize| distances[&a].total_cmp(&distances[&b]);
    let upvoted = |a: usize, b: usize| corpus.stats(b).upvotes.cmp(&corpus.stats(a).upvotes);
    let replied = |a: usize, b: usize| corpus.stats(b).replies.cmp(&corpus.stats(a).replies);
    let roles: [(ExemplarRole, &dyn Fn(usize, usize) -> Ordering); 3] = [
        (ExemplarRole::MostCentral, &central),
        (ExemplarRole::MostUpvoted, &upvoted),
        (ExemplarRole::MostReplied, &replied),
    ];

    for (role, better) in roles {
        let Some(row) = pick(members, &chosen, better) else {
            break;
        };
        chosen.push(row);
        exemplars.push(Exemplar {
            role,
            id: corpus.id(row).to_string(),
        });
    }

    exemplars
}

/// Best member under `better` (ties to the lower row), preferring members
/// that aren't in `chosen`.
fn pick(
    members: &[usize],
    chosen: &[usize],
    better: &dyn Fn(usize, usize) -> Ordering,
) -> Option<usize> {
    let rank = |a: &usize, b: &usize| better(*a, *b).then(a.cmp(b));
    members
        .iter()
        .copied()
        .filter(|row| !chosen.contains(row))
        .min_by(rank)
        .or_else(|| members.iter().copied().min_by(rank))
}
