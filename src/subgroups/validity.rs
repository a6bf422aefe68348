// Subgroup validity — deciding where to cut the dendrogram.
//
// Starting from the root, each branch is either kept whole or broken one
// level further, whichever gives the better silhouette against the sibling
// context. Below an accepted boundary, `refine` keeps looking: a child is
// promoted to its own subgroup only if carving it out of the current
// boundary does not lower the separation against the uncle. Nodes smaller
// than the minimum subgroup size are never promoted and never refined.
//
// The result is a soft cut. Flags are not guaranteed to form an antichain;
// a flagged node only means "this span of leaves deserves its own subgroup".
//
// Both passes run on an explicit work stack so that deep, unbalanced linkage
// trees can't exhaust the call stack.

use tracing::debug;

use super::silhouette::{prefers_split, silhouette, Silhouette};
use crate::corpus::embeddings::EmbeddingMatrix;
use crate::tree::annotate::LeafSets;
use crate::tree::linkage::{LinkageTree, NodeId};

/// Nodes with fewer leaves than this are never their own subgroup.
pub const MIN_SUBGROUP_SIZE: usize = 7;

/// One validity flag per linkage node, indexed by `NodeId`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidityFlags(Vec<bool>);

impl ValidityFlags {
    fn new(len: usize) -> Self {
        Self(vec![false; len])
    }

    pub fn is_valid(&self, node: NodeId) -> bool {
        self.0[node]
    }

    /// Ids of every flagged node, ascending.
    pub fn valid_nodes(&self) -> Vec<NodeId> {
        self.0
            .iter()
            .enumerate()
            .filter(|(_, &v)| v)
            .map(|(id, _)| id)
            .collect()
    }

    pub fn count(&self) -> usize {
        self.0.iter().filter(|&&v| v).count()
    }
}

/// Silhouette scores behind the two top-level branch decisions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RootScores {
    /// Root split into its two children
    pub inner: Silhouette,
    /// Left child kept, right child broken into its two children
    pub break_right: Silhouette,
    /// Right child kept, left child broken into its two children
    pub break_left: Silhouette,
}

/// A pending `refine(node, ancestor, uncle)` call.
#[derive(Debug, Clone, Copy)]
struct Refinement {
    node: NodeId,
    ancestor: NodeId,
    uncle: NodeId,
}

/// Marks linkage nodes that are worth representing as subgroups.
pub struct ValidityAnalyzer<'a> {
    tree: &'a LinkageTree,
    leaf_sets: &'a LeafSets,
    embeddings: &'a EmbeddingMatrix,
    min_subgroup_size: usize,
}

impl<'a> ValidityAnalyzer<'a> {
    pub fn new(
        tree: &'a LinkageTree,
        leaf_sets: &'a LeafSets,
        embeddings: &'a EmbeddingMatrix,
    ) -> Self {
        Self {
            tree,
            leaf_sets,
            embeddings,
            min_subgroup_size: MIN_SUBGROUP_SIZE,
        }
    }

    pub fn with_min_subgroup_size(mut self, min_subgroup_size: usize) -> Self {
        self.min_subgroup_size = min_subgroup_size;
        self
    }

    pub fn big_enough(&self, node: NodeId) -> bool {
        self.leaf_sets.size(node) >= self.min_subgroup_size
    }

    /// Scores for the root's branch decisions, or `None` if the root is a leaf.
    pub fn root_scores(&self) -> Option<RootScores> {
        let (left, right) = self.tree.children(self.tree.root())?;
        let leaves = |id| self.leaf_sets.leaves(id);

        let inner = silhouette(self.embeddings, &[leaves(left), leaves(right)]);
        let broken = |kept: NodeId, branch: NodeId| match self.tree.children(branch) {
            Some((a, b)) => silhouette(self.embeddings, &[leaves(kept), leaves(a), leaves(b)]),
            None => Silhouette::Undefined,
        };

        Some(RootScores {
            inner,
            break_right: broken(left, right),
            break_left: broken(right, left),
        })
    }

    /// Run the full analysis and return the flag table.
    pub fn analyze(&self) -> ValidityFlags {
        let mut flags = ValidityFlags::new(self.tree.len());
        let root = self.tree.root();
        flags.0[root] = self.big_enough(root);

        let (Some((left, right)), Some(scores)) = (self.tree.children(root), self.root_scores())
        else {
            return flags;
        };

        debug!(
            inner = %scores.inner,
            break_right = %scores.break_right,
            break_left = %scores.break_left,
            "Root branch scores"
        );

        let mut work = Vec::new();
        for (branch, sibling, broken) in [
            (right, left, scores.break_right),
            (left, right, scores.break_left),
        ] {
            match self.tree.children(branch) {
                Some((a, b)) if prefers_split(scores.inner, broken) => {
                    flags.0[a] = self.big_enough(a);
                    flags.0[b] = self.big_enough(b);
                    work.push(Refinement {
                        node: a,
                        ancestor: a,
                        uncle: b,
                    });
                    work.push(Refinement {
                        node: b,
                        ancestor: b,
                        uncle: a,
                    });
                }
                _ => {
                    flags.0[branch] = self.big_enough(branch);
                    work.push(Refinement {
                        node: branch,
                        ancestor: branch,
                        uncle: sibling,
                    });
                }
            }
        }

        self.refine(&mut flags, work);
        flags
    }

    /// Drain the refinement work stack.
    fn refine(&self, flags: &mut ValidityFlags, mut work: Vec<Refinement>) {
        while let Some(Refinement {
            node,
            ancestor,
            uncle,
        }) = work.pop()
        {
            let Some((left, right)) = self.tree.children(node) else {
                continue;
            };
            if self.leaf_sets.size(node) < self.min_subgroup_size {
                continue;
            }

            let uncle_leaves = self.leaf_sets.leaves(uncle);
            let ancestor_score = silhouette(
                self.embeddings,
                &[self.leaf_sets.leaves(ancestor), uncle_leaves],
            );

            for (child, sibling) in [(left, right), (right, left)] {
                let remainder = self.leaf_sets.leaves_excluding(ancestor, child);
                let candidate = silhouette(
                    self.embeddings,
                    &[self.leaf_sets.leaves(child), remainder.as_slice(), uncle_leaves],
                );

                if prefers_split(ancestor_score, candidate) {
                    flags.0[child] = self.big_enough(child);
                    debug!(
                        node = child,
                        size = self.leaf_sets.size(child),
                        ancestor_score = %ancestor_score,
                        candidate = %candidate,
                        "Accepted subgroup boundary"
                    );
                    work.push(Refinement {
                        node: child,
                        ancestor: child,
                        uncle: sibling,
                    });
                } else {
                    work.push(Refinement {
                        node: child,
                        ancestor,
                        uncle,
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subgroups::ellipsoid::DEFAULT_QUANTILE;
    use crate::subgroups::hierarchy::SubgroupTree;
    use crate::subgroups::membership::matching_subgroups;
    use crate::tree::linkage::Merge;

    /// Builds a caterpillar tree over `n` points on a line: each merge adds
    /// the next point to everything merged so far.
    fn caterpillar(n: usize) -> (LinkageTree, EmbeddingMatrix) {
        let xs: Vec<f64> = (0..n).map(|i| i as f64).collect();
        caterpillar_over(&xs)
    }

    fn caterpillar_over(xs: &[f64]) -> (LinkageTree, EmbeddingMatrix) {
        let n = xs.len();
        let mut merges = Vec::new();
        let mut current = 0;
        for i in 1..n {
            merges.push(Merge {
                left: current,
                right: i,
                distance: i as f64,
                size: i + 1,
            });
            current = n + i - 1;
        }
        let rows: Vec<Vec<f64>> = xs.iter().map(|&x| vec![x]).collect();
        (
            LinkageTree::from_merges(&merges).unwrap(),
            EmbeddingMatrix::from_rows(&rows).unwrap(),
        )
    }

    /// Sixteen points on a line whose merge order disagrees with the
    /// geometry: the 20s and 25s are joined to the 10.0s before the 10.3s.
    ///
    ///   30 = 18 (0.0..0.3) + 29
    ///   29 = 26 + 28 (10.3..10.5)
    ///   26 = 23 + 25 (10.0..10.2)
    ///   23 = 20 (20.0..20.2) + 22 (25.0..25.2)
    fn misnested() -> (LinkageTree, EmbeddingMatrix, LeafSets) {
        let xs = [
            0.0, 0.1, 0.2, 0.3, 20.0, 20.1, 20.2, 25.0, 25.1, 25.2, 10.0, 10.1, 10.2, 10.3, 10.4,
            10.5,
        ];
        let pairs = [
            (0, 1, 2),
            (16, 2, 3),
            (17, 3, 4),
            (4, 5, 2),
            (19, 6, 3),
            (7, 8, 2),
            (21, 9, 3),
            (20, 22, 6),
            (10, 11, 2),
            (24, 12, 3),
            (23, 25, 9),
            (13, 14, 2),
            (27, 15, 3),
            (26, 28, 12),
            (18, 29, 16),
        ];
        let merges: Vec<Merge> = pairs
            .iter()
            .map(|&(left, right, size)| Merge {
                left,
                right,
                distance: 1.0,
                size,
            })
            .collect();
        let tree = LinkageTree::from_merges(&merges).unwrap();
        let rows: Vec<Vec<f64>> = xs.iter().map(|&x| vec![x]).collect();
        let embeddings = EmbeddingMatrix::from_rows(&rows).unwrap();
        let positions: Vec<usize> = (0..xs.len()).collect();
        let sets = LeafSets::annotate(&tree, &positions).unwrap();
        (tree, embeddings, sets)
    }

    fn refine_from(
        analyzer: &ValidityAnalyzer,
        node: NodeId,
        ancestor: NodeId,
        uncle: NodeId,
    ) -> Vec<NodeId> {
        let mut flags = ValidityFlags::new(analyzer.tree.len());
        analyzer.refine(
            &mut flags,
            vec![Refinement {
                node,
                ancestor,
                uncle,
            }],
        );
        flags.valid_nodes()
    }

    #[test]
    fn test_leaf_root_only_flags_root_when_big_enough() {
        let (tree, embeddings) = caterpillar(1);
        let sets = LeafSets::annotate(&tree, &[0]).unwrap();
        let flags = ValidityAnalyzer::new(&tree, &sets, &embeddings).analyze();
        assert_eq!(flags.count(), 0);

        let flags = ValidityAnalyzer::new(&tree, &sets, &embeddings)
            .with_min_subgroup_size(1)
            .analyze();
        assert_eq!(flags.valid_nodes(), vec![tree.root()]);
    }

    #[test]
    fn test_small_tree_never_flags_below_minimum() {
        let (tree, embeddings) = caterpillar(6);
        let rows: Vec<usize> = (0..6).collect();
        let sets = LeafSets::annotate(&tree, &rows).unwrap();
        let flags = ValidityAnalyzer::new(&tree, &sets, &embeddings).analyze();
        assert_eq!(flags.count(), 0, "No node has 7 leaves");
    }

    #[test]
    fn test_flagged_nodes_respect_minimum_size() {
        let (tree, embeddings) = caterpillar(40);
        let rows: Vec<usize> = (0..40).collect();
        let sets = LeafSets::annotate(&tree, &rows).unwrap();
        let analyzer = ValidityAnalyzer::new(&tree, &sets, &embeddings);
        let flags = analyzer.analyze();
        assert!(flags.is_valid(tree.root()));
        for id in flags.valid_nodes() {
            assert!(sets.size(id) >= MIN_SUBGROUP_SIZE);
        }
    }

    #[test]
    fn test_accepted_boundary_becomes_ancestor_of_its_children() {
        let (tree, embeddings, sets) = misnested();
        let analyzer =
            ValidityAnalyzer::new(&tree, &sets, &embeddings).with_min_subgroup_size(2);

        // Measured against its sibling, node 23 splits into the 20s and 25s
        assert_eq!(refine_from(&analyzer, 23, 23, 25), vec![20, 22]);
        // Measured against the wider context it does not
        assert_eq!(refine_from(&analyzer, 23, 29, 18), Vec::<NodeId>::new());
    }

    #[test]
    fn test_rejected_child_passes_its_context_to_grandchildren() {
        let (tree, embeddings, sets) = misnested();
        let analyzer =
            ValidityAnalyzer::new(&tree, &sets, &embeddings).with_min_subgroup_size(2);

        // 26 is rejected against (29, 18); its child 23 is then accepted
        // against the same pair and carries the search down to 20 and 22.
        let flagged = refine_from(&analyzer, 29, 29, 18);
        assert_eq!(flagged, vec![20, 22, 23]);
        assert!(!flagged.contains(&26));
        assert!(!flagged.contains(&25));
    }

    #[test]
    fn test_soft_cut_keeps_nested_flags() {
        let (tree, embeddings, sets) = misnested();
        let flags_at = |min: usize| {
            ValidityAnalyzer::new(&tree, &sets, &embeddings)
                .with_min_subgroup_size(min)
                .analyze()
                .valid_nodes()
        };

        // 20 and 22 sit inside 23, which sits inside 29: not an antichain
        assert_eq!(flags_at(2), vec![18, 20, 22, 23, 29, 30]);
        assert_eq!(flags_at(4), vec![18, 23, 29, 30]);
        assert_eq!(flags_at(5), vec![23, 29, 30]);
        assert_eq!(flags_at(7), vec![29, 30]);
    }

    #[test]
    fn test_deep_caterpillar_runs_every_pass() {
        let n = 5000;
        let (tree, embeddings) = caterpillar(n);
        let rows: Vec<usize> = (0..n).collect();
        let sets = LeafSets::annotate(&tree, &rows).unwrap();

        let flags = ValidityAnalyzer::new(&tree, &sets, &embeddings)
            .with_min_subgroup_size(n - 1)
            .analyze();
        assert!(flags.is_valid(tree.root()));
        for id in flags.valid_nodes() {
            assert!(sets.size(id) >= n - 1);
        }

        let subgroups =
            SubgroupTree::build(&tree, &sets, &flags, &embeddings, DEFAULT_QUANTILE).unwrap();
        assert_eq!(subgroups.len(), flags.count());
        assert_eq!(subgroups.root().size(), n);

        let matches = matching_subgroups(&subgroups, &[2500.0]).unwrap();
        for id in matches {
            assert!(subgroups.node(id).ellipsoid.contains(&[2500.0]));
        }
    }

    #[test]
    fn test_deep_subgroup_chain_builds_and_matches() {
        // 0, -1, 1, -2, 2, ...: every prefix is centered near 0
        let n = 3000;
        let xs: Vec<f64> = (0..n)
            .map(|i: usize| {
                let step = i.div_ceil(2) as f64;
                if i % 2 == 0 {
                    step
                } else {
                    -step
                }
            })
            .collect();
        let (tree, embeddings) = caterpillar_over(&xs);
        let rows: Vec<usize> = (0..n).collect();
        let sets = LeafSets::annotate(&tree, &rows).unwrap();
        let flags = ValidityFlags(vec![true; tree.len()]);

        let subgroups =
            SubgroupTree::build(&tree, &sets, &flags, &embeddings, DEFAULT_QUANTILE).unwrap();
        assert_eq!(subgroups.len(), tree.len());
        let deepest = subgroups.nodes().iter().map(|node| node.depth).max();
        assert_eq!(deepest, Some(n - 1));

        let matches = matching_subgroups(&subgroups, &[0.0]).unwrap();
        let matched_wide = matches
            .iter()
            .filter(|&&id| subgroups.node(id).size() >= 3)
            .count();
        let wide = subgroups
            .nodes()
            .iter()
            .filter(|node| !node.is_root() && node.size() >= 3)
            .count();
        assert_eq!(matched_wide, wide);
        assert!(wide > n - 5);
    }
}
