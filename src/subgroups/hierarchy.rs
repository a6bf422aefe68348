// Subgroup tree — the pruned hierarchy of valid linkage nodes.
//
// Every flagged non-root linkage node becomes a subgroup, attached to its
// nearest flagged ancestor. The root always becomes subgroup 0 whether or
// not it is big enough on its own. Subgroups live in an arena and are
// numbered in pre-order; each carries an ellipsoid fitted to its member rows.

use anyhow::{Context, Result};
use tracing::debug;

use super::ellipsoid::Ellipsoid;
use super::validity::ValidityFlags;
use crate::corpus::embeddings::EmbeddingMatrix;
use crate::tree::annotate::LeafSets;
use crate::tree::linkage::{LinkageTree, NodeId};

/// Index of a subgroup in its tree; 0 is the root.
pub type SubgroupId = usize;

/// One subgroup of the hierarchy.
#[derive(Debug, Clone)]
pub struct SubgroupNode {
    pub id: SubgroupId,
    pub parent: Option<SubgroupId>,
    pub children: Vec<SubgroupId>,
    /// Linkage node this subgroup was cut at
    pub linkage_node: NodeId,
    pub depth: usize,
    /// Embedding rows covered by this subgroup
    pub leaf_indices: Vec<usize>,
    pub ellipsoid: Ellipsoid,
    /// Rows of out-of-sample points that fell inside the ellipsoid
    pub matched_locs: Vec<usize>,
    /// Ids of those points, parallel to `matched_locs`
    pub matched_ids: Vec<String>,
}

impl SubgroupNode {
    pub fn size(&self) -> usize {
        self.leaf_indices.len()
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }
}

#[derive(Debug, Clone)]
pub struct SubgroupTree {
    nodes: Vec<SubgroupNode>,
    dim: usize,
}

impl SubgroupTree {
    /// Build the subgroup hierarchy from a flagged linkage tree.
    pub fn build(
        tree: &LinkageTree,
        leaf_sets: &LeafSets,
        flags: &ValidityFlags,
        embeddings: &EmbeddingMatrix,
        quantile: f64,
    ) -> Result<Self> {
        let root = tree.root();
        let mut subgroups = Self {
            nodes: Vec::new(),
            dim: embeddings.dim(),
        };
        subgroups.push(root, None, leaf_sets.leaves(root), embeddings, quantile)?;

        // (linkage node, nearest subgroup above it)
        let mut stack: Vec<(NodeId, SubgroupId)> = Vec::new();
        if let Some((left, right)) = tree.children(root) {
            stack.push((right, 0));
            stack.push((left, 0));
        }

        while let Some((node, parent)) = stack.pop() {
            let owner = if flags.is_valid(node) {
                subgroups.push(node, Some(parent), leaf_sets.leaves(node), embeddings, quantile)?
            } else {
                parent
            };

            if let Some((left, right)) = tree.children(node) {
                stack.push((right, owner));
                stack.push((left, owner));
            }
        }

        debug!(subgroups = subgroups.len(), "Built subgroup tree");
        Ok(subgroups)
    }

    fn push(
        &mut self,
        linkage_node: NodeId,
        parent: Option<SubgroupId>,
        leaves: &[usize],
        embeddings: &EmbeddingMatrix,
        quantile: f64,
    ) -> Result<SubgroupId> {
        let id = self.nodes.len();
        let ellipsoid = Ellipsoid::fit(&embeddings.gather(leaves), quantile)
            .with_context(|| format!("Failed to fit subgroup at linkage node {linkage_node}"))?;
        let depth = match parent {
            Some(p) => {
                self.nodes[p].children.push(id);
                self.nodes[p].depth + 1
            }
            None => 0,
        };

        self.nodes.push(SubgroupNode {
            id,
            parent,
            children: Vec::new(),
            linkage_node,
            depth,
            leaf_indices: leaves.to_vec(),
            ellipsoid,
            matched_locs: Vec::new(),
            matched_ids: Vec::new(),
        });
        Ok(id)
    }

    pub fn root(&self) -> &SubgroupNode {
        &self.nodes[0]
    }

    pub fn node(&self, id: SubgroupId) -> &SubgroupNode {
        &self.nodes[id]
    }

    pub fn nodes(&self) -> &[SubgroupNode] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Dimensionality of the embedding space the tree was built in.
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Subgroup cut at the given linkage node, if any.
    pub fn find_by_linkage_node(&self, node: NodeId) -> Option<&SubgroupNode> {
        self.nodes.iter().find(|s| s.linkage_node == node)
    }

    /// Append an out-of-sample match to a subgroup.
    pub fn record_match(&mut self, id: SubgroupId, loc: usize, item_id: &str) {
        let node = &mut self.nodes[id];
        node.matched_locs.push(loc);
        node.matched_ids.push(item_id.to_string());
    }
}
