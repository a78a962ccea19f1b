use std::cmp::max;
use std::fmt;

use crate::error::LinkError;

/// Index of a node slot inside a [`KdArena`]. Slots are handed out in creation order, so ids also
/// order nodes by when they were created.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum Side {
    Left,
    Right,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Side::Left => "left",
            Side::Right => "right",
        })
    }
}

/// Structural links of one node. None of them own anything; the arena owns every node.
#[derive(Copy, Clone, Default, PartialEq, Eq, Debug)]
pub struct Links {
    pub parent: Option<NodeId>,
    pub left: Option<NodeId>,
    pub right: Option<NodeId>,
}

impl Links {
    #[inline]
    pub fn child(&self, side: Side) -> Option<NodeId> {
        match side {
            Side::Left => self.left,
            Side::Right => self.right,
        }
    }

    fn child_mut(&mut self, side: Side) -> &mut Option<NodeId> {
        match side {
            Side::Left => &mut self.left,
            Side::Right => &mut self.right,
        }
    }
}

#[derive(Clone, Debug)]
pub struct KdNode<V> {
    pub links: Links,
    pub value: V,
}

/// Read access to a linked binary tree of values, addressed by [`NodeId`].
///
/// Every id passed in must belong to the tree; implementations may panic otherwise.
pub trait KdLinks {
    type Value;

    fn links(&self, id: NodeId) -> &Links;
    fn value(&self, id: NodeId) -> &Self::Value;

    #[inline]
    fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.links(id).parent
    }

    #[inline]
    fn left(&self, id: NodeId) -> Option<NodeId> {
        self.links(id).left
    }

    #[inline]
    fn right(&self, id: NodeId) -> Option<NodeId> {
        self.links(id).right
    }

    fn is_leaf(&self, id: NodeId) -> bool {
        let links = self.links(id);
        links.left.is_none() && links.right.is_none()
    }

    /// Follow left links from `id` until there are none.
    fn leftmost(&self, mut id: NodeId) -> NodeId {
        while let Some(left) = self.left(id) {
            id = left;
        }
        id
    }

    /// Follow right links from `id` until there are none.
    fn rightmost(&self, mut id: NodeId) -> NodeId {
        while let Some(right) = self.right(id) {
            id = right;
        }
        id
    }
}

/// Growable table of tree nodes. Owns every node it has ever created; nodes are never removed
/// individually.
#[derive(Clone, Debug)]
pub struct KdArena<V> {
    pub(crate) nodes: Vec<KdNode<V>>,
    pub(crate) root: Option<NodeId>,
}

impl<V> KdLinks for KdArena<V> {
    type Value = V;

    #[inline]
    fn links(&self, id: NodeId) -> &Links {
        &self.nodes[id.0].links
    }

    #[inline]
    fn value(&self, id: NodeId) -> &V {
        &self.nodes[id.0].value
    }
}

impl<V> Default for KdArena<V> {
    fn default() -> Self {
        Self {
            nodes: Vec::new(),
            root: None,
        }
    }
}

impl<V> KdArena<V> {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            nodes: Vec::with_capacity(capacity),
            root: None,
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.root = None;
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    pub fn get(&self, id: NodeId) -> Option<&KdNode<V>> {
        self.nodes.get(id.0)
    }

    pub fn ids(&self) -> impl ExactSizeIterator<Item = NodeId> + Clone {
        (0..self.nodes.len()).map(NodeId)
    }

    /// Stored values in creation order.
    pub fn values(&self) -> impl ExactSizeIterator<Item = &V> {
        self.nodes.iter().map(|node| &node.value)
    }

    /// Number of links between `id` and the root.
    pub fn depth(&self, mut id: NodeId) -> usize {
        let mut depth = 0;
        while let Some(parent) = self.parent(id) {
            id = parent;
            depth += 1;
        }
        depth
    }

    /// Height of the whole tree: -1 when empty, 0 for a lone root.
    pub fn height(&self) -> isize {
        let Some(root) = self.root else { return -1 };
        let mut tallest = 0usize;
        let mut stack = vec![(root, 0usize)];
        while let Some((id, depth)) = stack.pop() {
            tallest = max(tallest, depth);
            let links = self.links(id);
            stack.extend([links.left, links.right].into_iter().flatten().map(|c| (c, depth + 1)));
        }
        tallest as isize
    }

    /// Create a node holding `value` as the `side` child of `parent`, or as the root when `parent`
    /// is `None` (in which case `side` is ignored).
    pub fn attach(
        &mut self,
        parent: Option<NodeId>,
        side: Side,
        value: V,
    ) -> Result<NodeId, LinkError> {
        match parent {
            None => {
                if let Some(root) = self.root {
                    return Err(LinkError::RootExists(root));
                }
            }
            Some(parent) => {
                let links = &self
                    .get(parent)
                    .ok_or(LinkError::UnknownNode(parent))?
                    .links;
                if let Some(existing) = links.child(side) {
                    return Err(LinkError::Occupied {
                        parent,
                        side,
                        existing,
                    });
                }
            }
        }
        Ok(self.link_new(parent, side, value))
    }

    /// Unchecked version of `attach`: the slot must be free.
    pub(crate) fn link_new(&mut self, parent: Option<NodeId>, side: Side, value: V) -> NodeId {
        let id = NodeId(self.nodes.len());
        match parent {
            None => {
                debug_assert!(self.root.is_none());
                self.root = Some(id);
            }
            Some(parent) => {
                let slot = self.nodes[parent.0].links.child_mut(side);
                debug_assert!(slot.is_none());
                *slot = Some(id);
            }
        }
        self.nodes.push(KdNode {
            links: Links {
                parent,
                left: None,
                right: None,
            },
            value,
        });
        self.check();
        id
    }

    #[inline]
    pub(crate) fn check(&self) {
        #[cfg(feature = "full_validation")]
        self.validate();
    }

    /// Assert every structural invariant: exactly one parentless node (the root), every child
    /// linking back to its parent, and every node reachable from the root exactly once.
    pub fn validate(&self) {
        let Some(root) = self.root else {
            assert!(self.nodes.is_empty(), "nodes exist but the arena has no root");
            return;
        };
        assert!(root.0 < self.nodes.len());
        assert_eq!(self.parent(root), None, "root {root} has a parent");
        let mut seen = vec![false; self.nodes.len()];
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            assert!(!seen[id.0], "node {id} is reachable twice");
            seen[id.0] = true;
            for child in [self.left(id), self.right(id)].into_iter().flatten() {
                assert!(child.0 < self.nodes.len(), "node {id} links to missing {child}");
                assert_eq!(
                    self.parent(child),
                    Some(id),
                    "child {child} does not link back to {id}"
                );
                stack.push(child);
            }
        }
        if let Some(orphan) = seen.iter().position(|&reached| !reached) {
            panic!("node #{orphan} is not reachable from the root");
        }
    }
}
