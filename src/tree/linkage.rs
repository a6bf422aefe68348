// Linkage tree — the binary merge tree produced by agglomerative clustering.
//
// The tree is supplied from outside (Ward linkage or any other routine that
// follows the merge-matrix contract): leaves 0..N are the clustered items in
// order, and merge i creates node N + i from two earlier nodes. The last merge
// is the root. Nodes live in an arena and refer to children by index, so the
// later passes can keep their annotations in side tables keyed by NodeId.

use std::path::Path;

use anyhow::{Context, Result};

/// Index of a node in the linkage arena.
pub type NodeId = usize;

/// A node of the merge tree.
#[derive(Debug, Clone, PartialEq)]
pub enum LinkageNode {
    /// A clustered item; `position` indexes the clustered subset (0..N).
    Leaf { position: usize },
    /// A merge of two earlier nodes at the given linkage distance.
    Internal {
        left: NodeId,
        right: NodeId,
        distance: f64,
    },
}

/// One row of a merge matrix: `[left, right, distance, size]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Merge {
    pub left: usize,
    pub right: usize,
    pub distance: f64,
    /// Number of leaves under the new node
    pub size: usize,
}

impl Merge {
    /// Convert a raw `[left, right, distance, size]` row. Hierarchical
    /// clustering libraries emit every column as a float, so the index
    /// columns are checked for being non-negative integers.
    pub fn from_row(row: [f64; 4]) -> Result<Self> {
        let as_index = |value: f64, column: &str| -> Result<usize> {
            if !value.is_finite() || value < 0.0 || value.fract() != 0.0 {
                anyhow::bail!("Merge {column} must be a non-negative integer, got {value}");
            }
            Ok(value as usize)
        };

        Ok(Self {
            left: as_index(row[0], "left")?,
            right: as_index(row[1], "right")?,
            distance: row[2],
            size: as_index(row[3], "size")?,
        })
    }
}

/// A validated binary merge tree stored as an arena.
#[derive(Debug, Clone)]
pub struct LinkageTree {
    nodes: Vec<LinkageNode>,
    root: NodeId,
    leaf_count: usize,
}

impl LinkageTree {
    /// Build a tree from a merge matrix over `merges.len() + 1` leaves.
    ///
    /// An empty merge list describes a single-leaf tree.
    pub fn from_merges(merges: &[Merge]) -> Result<Self> {
        let leaf_count = merges.len() + 1;
        let mut nodes: Vec<LinkageNode> = (0..leaf_count)
            .map(|position| LinkageNode::Leaf { position })
            .collect();
        let mut sizes = vec![1usize; leaf_count];
        let mut consumed = vec![false; leaf_count + merges.len()];

        for (i, merge) in merges.iter().enumerate() {
            let new_id = leaf_count + i;
            for child in [merge.left, merge.right] {
                if child >= new_id {
                    anyhow::bail!(
                        "Merge {i} references node {child}, which does not exist before node {new_id}"
                    );
                }
                if consumed[child] {
                    anyhow::bail!("Merge {i} reuses node {child}, which was already merged");
                }
                consumed[child] = true;
            }
            if merge.left == merge.right {
                anyhow::bail!("Merge {i} joins node {} with itself", merge.left);
            }

            let size = sizes[merge.left] + sizes[merge.right];
            if merge.size != size {
                anyhow::bail!(
                    "Merge {i} declares {} leaves but its children hold {size}",
                    merge.size
                );
            }
            sizes.push(size);

            nodes.push(LinkageNode::Internal {
                left: merge.left,
                right: merge.right,
                distance: merge.distance,
            });
        }

        let root = nodes.len() - 1;
        Self::from_nodes(nodes, root)
    }

    /// Build a tree from an explicit node arena.
    ///
    /// Every node must be reachable from `root` exactly once, and the leaf
    /// positions must be exactly 0..leaf_count.
    pub fn from_nodes(nodes: Vec<LinkageNode>, root: NodeId) -> Result<Self> {
        if root >= nodes.len() {
            anyhow::bail!(
                "Root {root} is out of range for a tree with {} nodes",
                nodes.len()
            );
        }

        let mut seen = vec![false; nodes.len()];
        let mut positions = Vec::new();
        let mut stack = vec![root];

        while let Some(id) = stack.pop() {
            if seen[id] {
                anyhow::bail!("Node {id} is reachable along more than one path");
            }
            seen[id] = true;

            match &nodes[id] {
                LinkageNode::Leaf { position } => positions.push(*position),
                LinkageNode::Internal { left, right, .. } => {
                    for &child in [left, right] {
                        if child >= nodes.len() {
                            anyhow::bail!("Node {id} has child {child}, which is out of range");
                        }
                        stack.push(child);
                    }
                }
            }
        }

        if let Some(orphan) = seen.iter().position(|s| !s) {
            anyhow::bail!("Node {orphan} is not reachable from root {root}");
        }

        let leaf_count = positions.len();
        let mut present = vec![false; leaf_count];
        for &position in &positions {
            if position >= leaf_count || present[position] {
                anyhow::bail!(
                    "Leaf positions must be a permutation of 0..{leaf_count}, found {position}"
                );
            }
            present[position] = true;
        }

        Ok(Self {
            nodes,
            root,
            leaf_count,
        })
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn node(&self, id: NodeId) -> &LinkageNode {
        &self.nodes[id]
    }

    /// Total number of nodes (leaves and merges).
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn leaf_count(&self) -> usize {
        self.leaf_count
    }

    pub fn is_leaf(&self, id: NodeId) -> bool {
        matches!(self.nodes[id], LinkageNode::Leaf { .. })
    }

    /// `(left, right)` for an internal node, `None` for a leaf.
    pub fn children(&self, id: NodeId) -> Option<(NodeId, NodeId)> {
        match self.nodes[id] {
            LinkageNode::Internal { left, right, .. } => Some((left, right)),
            LinkageNode::Leaf { .. } => None,
        }
    }
}

/// Read a merge matrix from a JSON file holding `[[left, right, distance, size], ...]`.
pub fn load_merges(path: &Path) -> Result<Vec<Merge>> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read linkage file {}", path.display()))?;
    parse_merges(&json).with_context(|| format!("Invalid linkage file {}", path.display()))
}

/// Parse a merge matrix from JSON text.
pub fn parse_merges(json: &str) -> Result<Vec<Merge>> {
    let rows: Vec<[f64; 4]> =
        serde_json::from_str(json).context("Linkage must be an array of 4-element rows")?;
    rows.into_iter()
        .enumerate()
        .map(|(i, row)| Merge::from_row(row).with_context(|| format!("Bad merge row {i}")))
        .collect()
}
