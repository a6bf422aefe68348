// Membership classification — placing out-of-sample points in the hierarchy.
//
// Membership is overlapping: a point can land in several siblings at once,
// and it keeps descending along every branch whose ellipsoid contains it.
// The root covers everything and is never recorded as a match; the search
// starts at its children.

use anyhow::Result;

use super::hierarchy::{SubgroupId, SubgroupNode, SubgroupTree};

/// Whether `point` lies inside `node`'s ellipsoid.
pub fn is_inside(node: &SubgroupNode, point: &[f64]) -> bool {
    node.ellipsoid.contains(point)
}

/// Every non-root subgroup whose ellipsoid contains `point`, in visiting
/// order.
///
/// The root's children are always checked. Deeper subgroups are only
/// reached through a parent that also contains the point.
pub fn matching_subgroups(tree: &SubgroupTree, point: &[f64]) -> Result<Vec<SubgroupId>> {
    if point.len() != tree.dim() {
        anyhow::bail!(
            "Point has {} dimensions but the subgroup tree was built in {}",
            point.len(),
            tree.dim()
        );
    }

    let mut matches = Vec::new();
    let mut stack: Vec<SubgroupId> = tree.root().children.iter().rev().copied().collect();
    while let Some(id) = stack.pop() {
        let node = tree.node(id);
        if !is_inside(node, point) {
            continue;
        }
        matches.push(id);
        stack.extend(node.children.iter().rev().copied());
    }

    Ok(matches)
}

/// Classify `point` and record `(loc, id)` on every matching subgroup.
///
/// Returns the matched subgroup ids.
pub fn classify(
    tree: &mut SubgroupTree,
    point: &[f64],
    loc: usize,
    id: &str,
) -> Result<Vec<SubgroupId>> {
    let matches = matching_subgroups(tree, point)?;
    for &subgroup in &matches {
        tree.record_match(subgroup, loc, id);
    }
    Ok(matches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::embeddings::EmbeddingMatrix;
    use crate::subgroups::validity::ValidityAnalyzer;
    use crate::tree::annotate::LeafSets;
    use crate::tree::linkage::{LinkageTree, Merge};

    /// Two 8-point rings far apart, each cut as its own subgroup.
    fn rings() -> (SubgroupTree, EmbeddingMatrix) {
        let mut rows = Vec::new();
        for center in [0.0, 20.0] {
            for k in 0..8 {
                let angle = k as f64 * std::f64::consts::FRAC_PI_4;
                rows.push(vec![center + angle.cos(), center + angle.sin()]);
            }
        }

        let mut merges = Vec::new();
        let mut tops = Vec::new();
        for start in [0, 8] {
            let mut current = start;
            for i in start + 1..start + 8 {
                merges.push(Merge {
                    left: current,
                    right: i,
                    distance: 1.0,
                    size: i - start + 1,
                });
                current = 16 + merges.len() - 1;
            }
            tops.push(current);
        }
        merges.push(Merge {
            left: tops[0],
            right: tops[1],
            distance: 30.0,
            size: 16,
        });

        let tree = LinkageTree::from_merges(&merges).unwrap();
        let embeddings = EmbeddingMatrix::from_rows(&rows).unwrap();
        let rows: Vec<usize> = (0..16).collect();
        let sets = LeafSets::annotate(&tree, &rows).unwrap();
        let flags = ValidityAnalyzer::new(&tree, &sets, &embeddings).analyze();
        let subgroups = SubgroupTree::build(&tree, &sets, &flags, &embeddings, 0.95).unwrap();
        (subgroups, embeddings)
    }

    #[test]
    fn test_center_of_ring_matches_only_that_ring() {
        let (tree, _) = rings();
        assert_eq!(tree.root().children.len(), 2);
        let second = tree.root().children[1];

        let matches = matching_subgroups(&tree, &[20.0, 20.0]).unwrap();
        assert!(matches.contains(&second));
        assert!(!matches.contains(&tree.root().children[0]));
    }

    #[test]
    fn test_far_point_matches_nothing() {
        let (tree, _) = rings();
        assert!(matching_subgroups(&tree, &[500.0, -500.0])
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_dimension_mismatch_is_error() {
        let (tree, _) = rings();
        assert!(matching_subgroups(&tree, &[1.0, 2.0, 3.0]).is_err());
    }

    #[test]
    fn test_classify_records_matches() {
        let (mut tree, _) = rings();
        let matches = classify(&mut tree, &[0.0, 0.0], 99, "t2_user").unwrap();
        assert!(!matches.is_empty());
        for id in matches {
            let node = tree.node(id);
            assert_eq!(node.matched_locs.last(), Some(&99));
            assert_eq!(node.matched_ids.last().map(String::as_str), Some("t2_user"));
        }
    }

    #[test]
    fn test_root_is_never_recorded() {
        let (mut tree, _) = rings();
        let first = tree.root().children[0];

        let matches = classify(&mut tree, &[0.0, 0.0], 7, "t2_inner").unwrap();
        assert_eq!(matches, vec![first]);
        assert!(!matches.contains(&0));
        assert!(tree.root().matched_locs.is_empty());
        assert!(tree.root().matched_ids.is_empty());
    }
}
