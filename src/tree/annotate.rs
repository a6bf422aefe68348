// Leaf-set annotation — the ordered set of embedding rows under every node.
//
// A post-order walk concatenates leaves left-to-right, so the leaves of any
// node form one contiguous span of a single ordering of the rows. Each node
// stores only its span; `leaves(node)` is a slice into the shared ordering.

use std::ops::Range;

use anyhow::Result;

use super::linkage::{LinkageNode, LinkageTree, NodeId};

/// Leaf rows for every node of a linkage tree.
#[derive(Debug, Clone)]
pub struct LeafSets {
    /// Embedding rows in left-to-right leaf order
    order: Vec<usize>,
    /// `order[spans[node]]` are the rows under `node`
    spans: Vec<Range<usize>>,
}

enum Visit {
    Enter(NodeId),
    Exit(NodeId, usize),
}

impl LeafSets {
    /// Annotate `tree`, mapping leaf position `p` to embedding row `rows[p]`.
    pub fn annotate(tree: &LinkageTree, rows: &[usize]) -> Result<Self> {
        if rows.len() != tree.leaf_count() {
            anyhow::bail!(
                "Leaf mapping has {} rows but the linkage tree has {} leaves",
                rows.len(),
                tree.leaf_count()
            );
        }

        let mut order = Vec::with_capacity(rows.len());
        let mut spans = vec![0..0; tree.len()];
        let mut stack = vec![Visit::Enter(tree.root())];

        while let Some(visit) = stack.pop() {
            match visit {
                Visit::Enter(id) => match tree.node(id) {
                    LinkageNode::Leaf { position } => {
                        let start = order.len();
                        order.push(rows[*position]);
                        spans[id] = start..start + 1;
                    }
                    LinkageNode::Internal { left, right, .. } => {
                        stack.push(Visit::Exit(id, order.len()));
                        stack.push(Visit::Enter(*right));
                        stack.push(Visit::Enter(*left));
                    }
                },
                Visit::Exit(id, start) => spans[id] = start..order.len(),
            }
        }

        Ok(Self { order, spans })
    }

    /// Embedding rows under `node`, left subtree first.
    pub fn leaves(&self, node: NodeId) -> &[usize] {
        &self.order[self.spans[node].clone()]
    }

    /// Number of leaves under `node`.
    pub fn size(&self, node: NodeId) -> usize {
        self.spans[node].len()
    }

    /// Rows under `outer` that are not under `inner`.
    ///
    /// `inner` must be a descendant of `outer` (or `outer` itself), which
    /// makes its span a sub-span of `outer`'s.
    pub fn leaves_excluding(&self, outer: NodeId, inner: NodeId) -> Vec<usize> {
        let outer_span = &self.spans[outer];
        let inner_span = &self.spans[inner];
        debug_assert!(
            outer_span.start <= inner_span.start && inner_span.end <= outer_span.end,
            "node {inner} is not under node {outer}"
        );

        let mut rest = Vec::with_capacity(outer_span.len() - inner_span.len());
        rest.extend_from_slice(&self.order[outer_span.start..inner_span.start]);
        rest.extend_from_slice(&self.order[inner_span.end..outer_span.end]);
        rest
    }
}
