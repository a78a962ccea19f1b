#[cfg(feature = "tracing")]
use tracing::{event, span, Level};

use crate::geometry::{descend_side, Comparator, Geometry};
use crate::node::{KdArena, KdLinks, KdNode, Links, NodeId, Side};
use crate::value::Accessor;

impl<V> KdArena<V> {
    /// Insert `value` at the first empty link reached by descending from the root. The tree is not
    /// rebalanced.
    pub fn insert<A, C, M>(&mut self, geometry: &Geometry<A, C, M>, value: V) -> NodeId
    where
        A: Accessor<V>,
        C: Comparator<A::Coordinate>,
    {
        let Some(mut node) = self.root else {
            return self.link_new(None, Side::Left, value);
        };
        let mut dim = 0;
        loop {
            let side = descend_side(geometry, &*self, dim, &value, node);
            match self.links(node).child(side) {
                Some(child) => {
                    node = child;
                    dim = geometry.next_dim(dim);
                }
                None => {
                    #[cfg(feature = "tracing")]
                    event!(
                        Level::DEBUG,
                        parent = node.index(),
                        %side,
                        depth = self.depth(node) + 1,
                        "inserted"
                    );
                    return self.link_new(Some(node), side, value);
                }
            }
        }
    }

    /// Build a tree by inserting `values` one at a time, in order.
    pub fn from_values<A, C, M, I>(geometry: &Geometry<A, C, M>, values: I) -> Self
    where
        A: Accessor<V>,
        C: Comparator<A::Coordinate>,
        I: IntoIterator<Item = V>,
    {
        let mut arena = Self::new();
        for value in values {
            arena.insert(geometry, value);
        }
        arena
    }

    /// Build a tree of minimal height from `values`, splitting each subtree at its median along
    /// the subtree's active dimension. Node ids still follow the order of `values`.
    pub fn build_balanced<A, C, M, I>(geometry: &Geometry<A, C, M>, values: I) -> Self
    where
        A: Accessor<V>,
        C: Comparator<A::Coordinate>,
        I: IntoIterator<Item = V>,
    {
        let mut arena = Self {
            nodes: values
                .into_iter()
                .map(|value| KdNode {
                    links: Links::default(),
                    value,
                })
                .collect(),
            root: None,
        };
        #[cfg(feature = "tracing")]
        let _span = span!(Level::DEBUG, "build_balanced", len = arena.len()).entered();
        let mut order: Vec<NodeId> = arena.ids().collect();
        arena.root = arena.link_median(geometry, &mut order, None, 0);
        arena.check();
        arena
    }

    fn link_median<A, C, M>(
        &mut self,
        geometry: &Geometry<A, C, M>,
        ids: &mut [NodeId],
        parent: Option<NodeId>,
        dim: usize,
    ) -> Option<NodeId>
    where
        A: Accessor<V>,
        C: Comparator<A::Coordinate>,
    {
        if ids.is_empty() {
            return None;
        }
        // For an even count the median biases right, so the left side is never the shorter one.
        let pivot = ids.len() / 2;
        {
            let nodes = &self.nodes;
            ids.select_nth_unstable_by(pivot, |a, b| {
                geometry
                    .ordering(dim, &nodes[a.index()].value, &nodes[b.index()].value)
                    .then(a.cmp(b))
            });
        }
        let (lower, rest) = ids.split_at_mut(pivot);
        let (median, upper) = match rest.split_first_mut() {
            Some((median, upper)) => (*median, upper),
            None => unreachable!("pivot is inside a non-empty slice"),
        };
        let next_dim = geometry.next_dim(dim);
        let left = self.link_median(geometry, lower, Some(median), next_dim);
        let right = self.link_median(geometry, upper, Some(median), next_dim);
        self.nodes[median.index()].links = Links {
            parent,
            left,
            right,
        };
        Some(median)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::value::KdValue;

    /// Every node's value must lie on the correct side of each ancestor's splitting plane.
    fn assert_partitioned<V, A, C, M>(tree: &KdArena<V>, geometry: &Geometry<A, C, M>)
    where
        A: Accessor<V>,
        C: Comparator<A::Coordinate>,
    {
        for id in tree.ids() {
            let mut child = id;
            while let Some(ancestor) = tree.parent(child) {
                let dim = tree.depth(ancestor) % geometry.dims();
                let order = geometry.ordering(dim, tree.value(id), tree.value(ancestor));
                if tree.left(ancestor) == Some(child) {
                    assert!(order.is_le(), "{id} is left of {ancestor} but orders after it");
                } else {
                    assert!(order.is_ge(), "{id} is right of {ancestor} but orders before it");
                }
                child = ancestor;
            }
        }
    }

    fn grid(n: i32) -> Vec<[i32; 2]> {
        (0..n).map(|i| [(i * 7) % 11, (i * 5) % 13]).collect()
    }

    #[test]
    fn insert_descends_with_cycling_dimensions() {
        let geometry = Geometry::of::<[i32; 2]>();
        let mut tree = KdArena::new();
        let a = tree.insert(&geometry, [5, 5]);
        let b = tree.insert(&geometry, [3, 9]);
        let c = tree.insert(&geometry, [4, 1]);
        let d = tree.insert(&geometry, [5, 0]);
        assert_eq!(tree.root(), Some(a));
        assert_eq!(tree.left(a), Some(b));
        // Second level splits on y
        assert_eq!(tree.left(b), Some(c));
        // Ties on the splitting coordinate go right
        assert_eq!(tree.right(a), Some(d));
        tree.validate();
        assert_partitioned(&tree, &geometry);
    }

    #[test]
    fn sorted_input_makes_a_chain() {
        let geometry = Geometry::of::<[i32; 1]>();
        let tree = KdArena::from_values(&geometry, (0..20).map(|i| [i]));
        assert_eq!(tree.height(), 19);
        let root = tree.root().unwrap();
        assert_eq!(tree.value(tree.rightmost(root)), &[19]);
    }

    #[rstest]
    #[case(1, 0)]
    #[case(2, 1)]
    #[case(3, 1)]
    #[case(4, 2)]
    #[case(7, 2)]
    #[case(8, 3)]
    #[case(100, 6)]
    fn balanced_build_has_minimal_height(#[case] len: i32, #[case] height: isize) {
        let geometry = Geometry::of::<[i32; 2]>();
        let tree = KdArena::build_balanced(&geometry, grid(len));
        assert_eq!(tree.len(), len as usize);
        assert_eq!(tree.height(), height);
        tree.validate();
        assert_partitioned(&tree, &geometry);
    }

    #[test]
    fn balanced_build_keeps_input_order_as_ids() {
        let geometry = Geometry::of::<[i32; 2]>();
        let points = grid(30);
        let tree = KdArena::build_balanced(&geometry, points.clone());
        for (id, point) in tree.ids().zip(&points) {
            assert_eq!(tree.value(id), point);
        }
        assert!(KdArena::<[i32; 2]>::build_balanced(&geometry, Vec::new()).is_empty());
    }

    #[test]
    fn balanced_build_handles_duplicates() {
        let geometry = Geometry::of::<[u8; 3]>();
        let tree = KdArena::build_balanced(&geometry, vec![[1u8, 1, 1]; 9]);
        assert_eq!(tree.height(), 3);
        assert_eq!(<[u8; 3] as KdValue>::DIMS, geometry.dims());
        tree.validate();
        assert_partitioned(&tree, &geometry);
    }
}
