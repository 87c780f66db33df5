//! Forest nodes and the arena that owns them.
//!
//! Nodes refer to each other by [`NodeId`], an index into the [`Arena`] of
//! the forest they belong to. Besides the tree links (`parent`, `left`,
//! `right`) every node carries `prev` / `next` links to its neighbours on the
//! same level, so that each level of a forest reads as one doubly linked
//! list from left to right.
//!
//! Hashing:
//! - Leaf:              `hash(block)`
//! - Two children:      `hash(left.hash || right.hash)`
//! - Single child:      the child's hash, unchanged

use std::{
    collections::HashMap,
    ops::{Index, IndexMut},
};

use splithash_framework::{CryptoHash, hash::hash_pair};

/// Index of a node inside an [`Arena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct NodeId(usize);

#[derive(Debug, Clone)]
pub(crate) struct Node {
    pub hash: CryptoHash,
    pub level: usize,
    /// Round at which this node merged with its sibling. `None` while the
    /// node has not been consumed into a two-child parent.
    pub bitcount: Option<usize>,
    /// Leaves below this node, itself included when it is a leaf.
    pub leaves: usize,
    /// Nodes in the subtree rooted here, itself included.
    pub nodes: usize,
    pub parent: Option<NodeId>,
    pub left: Option<NodeId>,
    pub right: Option<NodeId>,
    pub prev: Option<NodeId>,
    pub next: Option<NodeId>,
}

impl Node {
    fn new(hash: CryptoHash, level: usize) -> Self {
        Node {
            hash,
            level,
            bitcount: None,
            leaves: 1,
            nodes: 1,
            parent: None,
            left: None,
            right: None,
            prev: None,
            next: None,
        }
    }

    pub fn is_single_parent(&self) -> bool {
        self.left.is_some() && self.right.is_none()
    }

    /// Rewrite every link through `map`. Links to nodes `map` does not know
    /// are dropped.
    fn remap_links(&mut self, map: impl Fn(NodeId) -> Option<NodeId>) {
        for link in [
            &mut self.parent,
            &mut self.left,
            &mut self.right,
            &mut self.prev,
            &mut self.next,
        ] {
            *link = link.and_then(&map);
        }
    }
}

/// How a node hangs below its parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Attachment {
    /// No parent.
    Root,
    /// Only child of a single-child parent.
    Single,
    /// Left child of a two-child parent.
    Left,
    /// Right child of a two-child parent.
    Right,
}

/// Owning storage for the nodes of one forest.
#[derive(Debug, Clone, Default)]
pub(crate) struct Arena {
    nodes: Vec<Node>,
}

impl Index<NodeId> for Arena {
    type Output = Node;

    fn index(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }
}

impl IndexMut<NodeId> for Arena {
    fn index_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0]
    }
}

impl Arena {
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Every id in the arena, in allocation order.
    #[cfg(test)]
    pub fn ids(&self) -> impl Iterator<Item = NodeId> {
        (0..self.nodes.len()).map(NodeId)
    }

    fn push(&mut self, node: Node) -> NodeId {
        self.nodes.push(node);
        NodeId(self.nodes.len() - 1)
    }

    pub fn leaf(&mut self, hash: CryptoHash) -> NodeId {
        self.push(Node::new(hash, 0))
    }

    /// Parent of two adjacent nodes at `level`.
    pub fn pair_parent(&mut self, left: NodeId, right: NodeId, level: usize) -> NodeId {
        let hash = hash_pair(&self[left].hash, &self[right].hash);
        let mut node = Node::new(hash, level);
        node.leaves = self[left].leaves + self[right].leaves;
        node.nodes = self[left].nodes + self[right].nodes + 1;
        node.left = Some(left);
        node.right = Some(right);
        let parent = self.push(node);
        self[left].parent = Some(parent);
        self[right].parent = Some(parent);
        parent
    }

    /// Single-child parent at `level`, carrying the child's hash.
    pub fn single_parent(&mut self, child: NodeId, level: usize) -> NodeId {
        let mut node = Node::new(self[child].hash, level);
        node.leaves = self[child].leaves;
        node.nodes = self[child].nodes + 1;
        node.left = Some(child);
        let parent = self.push(node);
        self[child].parent = Some(parent);
        parent
    }

    /// Copy every node of the trees under `roots` out of `source`, keeping
    /// their links among each other. Returns the new id of every copied
    /// node, keyed by its id in `source`.
    pub fn copy_trees(
        &mut self,
        source: &Arena,
        roots: impl IntoIterator<Item = NodeId>,
    ) -> HashMap<NodeId, NodeId> {
        let mut ids = HashMap::new();
        let mut copied = Vec::new();
        for root in roots {
            for old in source.preorder(root) {
                let new = self.push(source[old].clone());
                ids.insert(old, new);
                copied.push(new);
            }
        }
        for new in copied {
            self[new].remap_links(|old| ids.get(&old).copied());
        }
        ids
    }

    /// Make `next` the right-hand neighbour of `prev` on their level.
    pub fn link(&mut self, prev: NodeId, next: NodeId) {
        self[prev].next = Some(next);
        self[next].prev = Some(prev);
    }

    /// Link consecutive nodes of `level_nodes`.
    pub fn link_all(&mut self, level_nodes: &[NodeId]) {
        for pair in level_nodes.windows(2) {
            self.link(pair[0], pair[1]);
        }
    }

    pub fn attachment(&self, id: NodeId) -> Attachment {
        let Some(parent) = self[id].parent else {
            return Attachment::Root;
        };
        let parent = &self[parent];
        if parent.is_single_parent() {
            Attachment::Single
        } else if parent.left == Some(id) {
            Attachment::Left
        } else {
            Attachment::Right
        }
    }

    /// Leftmost descendant of `id` on `level`.
    pub fn leftmost_at(&self, mut id: NodeId, level: usize) -> NodeId {
        while self[id].level > level {
            match self[id].left {
                Some(child) => id = child,
                None => break,
            }
        }
        id
    }

    /// Leaf number `index` (counting from the left) below `id`.
    pub fn leaf_below(&self, mut id: NodeId, mut index: usize) -> NodeId {
        while let Some(left) = self[id].left {
            match self[id].right {
                Some(right) if index >= self[left].leaves => {
                    index -= self[left].leaves;
                    id = right;
                }
                _ => id = left,
            }
        }
        id
    }

    /// Rightmost descendant of `id` on `level`.
    pub fn rightmost_at(&self, mut id: NodeId, level: usize) -> NodeId {
        while self[id].level > level {
            match self[id].right.or(self[id].left) {
                Some(child) => id = child,
                None => break,
            }
        }
        id
    }

    /// Pre-order walk of the subtree under `root`, left child first.
    pub fn preorder(&self, root: NodeId) -> Preorder<'_> {
        Preorder {
            arena: self,
            stack: vec![root],
        }
    }
}

pub(crate) struct Preorder<'a> {
    arena: &'a Arena,
    stack: Vec<NodeId>,
}

impl Iterator for Preorder<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let id = self.stack.pop()?;
        let node = &self.arena[id];
        self.stack.extend(node.right);
        self.stack.extend(node.left);
        Some(id)
    }
}

#[cfg(test)]
mod tests {
    use splithash_framework::hash::hash_str;

    use super::*;

    #[test]
    fn test_parents_carry_expected_hashes() {
        let mut arena = Arena::default();
        let a = arena.leaf(hash_str("a"));
        let b = arena.leaf(hash_str("b"));
        let c = arena.leaf(hash_str("c"));

        let ab = arena.pair_parent(a, b, 1);
        let c1 = arena.single_parent(c, 1);

        assert_eq!(arena[ab].hash, hash_pair(&hash_str("a"), &hash_str("b")));
        assert_eq!(arena[c1].hash, hash_str("c"));
        assert_eq!(arena.attachment(a), Attachment::Left);
        assert_eq!(arena.attachment(b), Attachment::Right);
        assert_eq!(arena.attachment(c), Attachment::Single);
        assert_eq!(arena.attachment(ab), Attachment::Root);
        assert_eq!(arena.rightmost_at(ab, 0), b);
        assert_eq!(arena.leftmost_at(ab, 0), a);
        assert_eq!(arena.rightmost_at(c1, 0), c);
        assert_eq!(arena.preorder(ab).collect::<Vec<_>>(), vec![ab, a, b]);
    }

    #[test]
    fn test_subtree_counts() {
        let mut arena = Arena::default();
        let leaves: Vec<NodeId> = ["a", "b", "c"]
            .into_iter()
            .map(|v| arena.leaf(hash_str(v)))
            .collect();
        let ab = arena.pair_parent(leaves[0], leaves[1], 1);
        let c1 = arena.single_parent(leaves[2], 1);
        let root = arena.pair_parent(ab, c1, 2);

        assert_eq!(arena[root].leaves, 3);
        assert_eq!(arena[root].nodes, 6);
        assert_eq!(arena[c1].nodes, 2);
        for (index, &leaf) in leaves.iter().enumerate() {
            assert_eq!(arena.leaf_below(root, index), leaf);
        }
    }

    #[test]
    fn test_copy_trees_keeps_links_inside_the_copy() {
        let mut source = Arena::default();
        let x = source.leaf(hash_str("x"));
        let a = source.leaf(hash_str("a"));
        let b = source.leaf(hash_str("b"));
        source.link(x, a);
        source.link(a, b);
        let ab = source.pair_parent(a, b, 1);

        let mut target = Arena::default();
        target.leaf(hash_str("unrelated"));
        let ids = target.copy_trees(&source, [ab]);
        assert_eq!(ids.len(), 3);
        assert_eq!(target.len(), 4);

        let (a, b, ab) = (ids[&a], ids[&b], ids[&ab]);
        assert_eq!(target[a].next, Some(b));
        assert_eq!(target[b].prev, Some(a));
        // `x` was not copied.
        assert_eq!(target[a].prev, None);
        assert_eq!(target[a].parent, Some(ab));
        assert_eq!(target[ab].left, Some(a));
        assert_eq!(target[ab].right, Some(b));
        assert_eq!(target[ab].leaves, 2);
    }
}
