#[cfg(feature = "tracing")]
use tracing::{event, span, Level};

use crate::geometry::{descend, Comparator, Geometry};
use crate::metric::{AxialDistance, DistanceValue, MetricLimits};
use crate::node::{KdArena, KdLinks, NodeId};
use crate::value::Accessor;

/// Outcome of a nearest neighbor search.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct Nearest<D> {
    /// Best node found, or the seed if nothing beat it. `None` means no node satisfied the
    /// predicate within the bound and no seed was given.
    pub node: Option<NodeId>,
    /// Active dimension of `node`.
    pub dim: usize,
    /// Distance of `node` from the query, or the unchanged bound if there is no node.
    pub distance: D,
}

/// A search for the node nearest to a query within the subtree below `start`.
///
/// The start node itself is treated as already visited and is never evaluated; callers that want
/// it considered pass it as the seed. Ascent stops when it reaches `end`, which is normally the
/// parent of the subtree root (`None` above the tree root).
#[derive(Copy, Clone, Debug)]
pub struct NearestSearch<D> {
    start: NodeId,
    start_dim: usize,
    end: Option<NodeId>,
    best: Option<NodeId>,
    best_dim: usize,
    bound: D,
}

// TODO: k-nearest and radius queries, re-running the search with a tightened bound.
impl<D: DistanceValue> NearestSearch<D> {
    /// Fresh, unbounded search from `start`, whose active dimension is `start_dim`, ending above
    /// the tree root.
    pub fn from_start(start: NodeId, start_dim: usize) -> Self {
        Self {
            start,
            start_dim,
            end: None,
            best: None,
            best_dim: start_dim,
            bound: D::infinity(),
        }
    }

    pub fn ending_at(self, end: Option<NodeId>) -> Self {
        Self { end, ..self }
    }

    /// Only accept nodes no farther than `bound`.
    pub fn within(self, bound: D) -> Self {
        Self { bound, ..self }
    }

    /// Start from a previously known candidate `best` at `distance`, found at dimension `dim`.
    pub fn seeded(self, best: NodeId, distance: D, dim: usize) -> Self {
        Self {
            best: Some(best),
            best_dim: dim,
            bound: distance,
            ..self
        }
    }

    /// Run the search over `tree`. Only nodes whose values satisfy `predicate` can be returned,
    /// but every node reached still narrows the search through its splitting plane.
    ///
    /// Among equidistant eligible nodes the one with the lowest [`NodeId`] wins.
    pub fn run<T, A, C, M, P>(
        self,
        tree: &T,
        geometry: &Geometry<A, C, M>,
        query: &T::Value,
        mut predicate: P,
    ) -> Nearest<D>
    where
        T: KdLinks + ?Sized,
        A: Accessor<T::Value>,
        C: Comparator<A::Coordinate>,
        M: AxialDistance<A::Coordinate, Distance = D>,
        P: FnMut(&T::Value) -> bool,
    {
        #[cfg(feature = "tracing")]
        let _span = span!(Level::DEBUG, "nearest", start = self.start.index()).entered();

        let mut found = Nearest {
            node: self.best,
            dim: self.best_dim,
            distance: self.bound,
        };
        let mut consider = |id: NodeId, dim: usize, found: &mut Nearest<D>| {
            let value = tree.value(id);
            if !predicate(value) {
                return;
            }
            let d = geometry.accumulate_distance_within(query, value, found.distance);
            let better = d < found.distance
                || (d == found.distance && found.node.map_or(true, |best| id < best));
            if better {
                #[cfg(feature = "tracing")]
                event!(Level::TRACE, node = id.index(), dim, distance = ?d, "new best");
                *found = Nearest {
                    node: Some(id),
                    dim,
                    distance: d,
                };
            }
        };
        // The far side of `node` can only hold something as close as the bound if the query's
        // hypersphere reaches across the node's splitting plane.
        let reaches = |node: NodeId, dim: usize, bound: D| {
            let crosses = geometry.distance(dim, query, tree.value(node)) <= bound;
            #[cfg(feature = "tracing")]
            if !crosses {
                event!(Level::TRACE, node = node.index(), dim, "pruned far side");
            }
            crosses
        };

        // Straight descent to a leaf sets a first bound cheaply.
        let mut deepest = self.start;
        let mut dim = self.start_dim;
        let mut next = descend(geometry, tree, dim, query, self.start);
        dim = geometry.next_dim(dim);
        while let Some(node) = next {
            consider(node, dim, &mut found);
            deepest = node;
            next = descend(geometry, tree, dim, query, node);
            dim = geometry.next_dim(dim);
        }

        // Back up toward `end`, probing each untried sibling subtree the hypersphere reaches.
        let mut cur = deepest;
        let mut cur_dim = geometry.prev_dim(dim);
        let mut probe = cur;
        let mut probe_dim = cur_dim;
        let mut came_from = cur;
        let untried = if geometry.compare(cur_dim, query, tree.value(cur)) {
            tree.right(cur)
        } else {
            tree.left(cur)
        };
        if let Some(untried) = untried {
            if reaches(cur, cur_dim, found.distance) {
                probe = untried;
                probe_dim = geometry.next_dim(cur_dim);
            }
        }
        let mut on_descent_path = true;
        while Some(cur) != self.end {
            // Walk the probed subtree until the probe climbs back out to `cur`. Nodes have no
            // visited marks; arriving from the parent means moving down, anything else means
            // returning from a child.
            while probe != cur {
                let (near, far) = if geometry.compare(probe_dim, query, tree.value(probe)) {
                    (tree.left(probe), tree.right(probe))
                } else {
                    (tree.right(probe), tree.left(probe))
                };
                let step = if tree.parent(probe) == Some(came_from) {
                    consider(probe, probe_dim, &mut found);
                    match (near, far) {
                        (Some(near), _) => Some(near),
                        (None, Some(far)) if reaches(probe, probe_dim, found.distance) => {
                            Some(far)
                        }
                        _ => None,
                    }
                } else {
                    match far {
                        Some(far)
                            if near == Some(came_from)
                                && reaches(probe, probe_dim, found.distance) =>
                        {
                            Some(far)
                        }
                        _ => None,
                    }
                };
                came_from = probe;
                match step {
                    Some(child) => {
                        probe = child;
                        probe_dim = geometry.next_dim(probe_dim);
                    }
                    None => {
                        probe = climb(tree, probe);
                        probe_dim = geometry.prev_dim(probe_dim);
                    }
                }
            }

            if cur == self.start {
                on_descent_path = false;
            }
            let from = cur;
            let Some(parent) = tree.parent(cur) else { break };
            cur = parent;
            cur_dim = geometry.prev_dim(cur_dim);
            came_from = cur;
            probe = cur;
            probe_dim = cur_dim;
            if Some(cur) == self.end {
                break;
            }
            debug_assert!(
                tree.left(cur) == Some(from) || tree.right(cur) == Some(from),
                "{from} is not a child of its parent {cur}"
            );
            debug_assert!(
                !on_descent_path || descend(geometry, tree, cur_dim, query, cur) == Some(from),
                "ascended from {from} into {cur}, which the query does not descend through"
            );
            let untried = if tree.left(cur) == Some(from) {
                tree.right(cur)
            } else {
                tree.left(cur)
            };
            if let Some(untried) = untried {
                if reaches(cur, cur_dim, found.distance) {
                    probe = untried;
                    probe_dim = geometry.next_dim(cur_dim);
                }
            }
        }
        found
    }
}

/// Parent of a probe that is strictly inside the subtree being explored.
#[inline]
fn climb<T: KdLinks + ?Sized>(tree: &T, probe: NodeId) -> NodeId {
    match tree.parent(probe) {
        Some(parent) => parent,
        None => unreachable!("probe {probe} climbed out of the tree"),
    }
}

/// A node found by one of the [`KdArena`] nearest queries.
#[derive(Debug, PartialEq)]
pub struct Neighbour<'a, V, D> {
    pub node: NodeId,
    pub value: &'a V,
    pub distance: D,
}

// Manual impls: only the distance has to be copyable, never the stored value.
impl<V, D: Copy> Clone for Neighbour<'_, V, D> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<V, D: Copy> Copy for Neighbour<'_, V, D> {}

impl<V> KdArena<V> {
    /// Nearest stored value to `query`.
    pub fn find_nearest<A, C, M>(
        &self,
        geometry: &Geometry<A, C, M>,
        query: &V,
    ) -> Option<Neighbour<'_, V, M::Distance>>
    where
        A: Accessor<V>,
        C: Comparator<A::Coordinate>,
        M: AxialDistance<A::Coordinate>,
    {
        self.find_nearest_within(geometry, query, M::Distance::infinity(), |_: &V| true)
    }

    /// Nearest stored value to `query` among those satisfying `predicate`.
    pub fn find_nearest_if<A, C, M, P>(
        &self,
        geometry: &Geometry<A, C, M>,
        query: &V,
        predicate: P,
    ) -> Option<Neighbour<'_, V, M::Distance>>
    where
        A: Accessor<V>,
        C: Comparator<A::Coordinate>,
        M: AxialDistance<A::Coordinate>,
        P: FnMut(&V) -> bool,
    {
        self.find_nearest_within(geometry, query, M::Distance::infinity(), predicate)
    }

    /// Nearest stored value to `query` among those satisfying `predicate` and no farther than
    /// `max`.
    pub fn find_nearest_within<A, C, M, P>(
        &self,
        geometry: &Geometry<A, C, M>,
        query: &V,
        max: M::Distance,
        mut predicate: P,
    ) -> Option<Neighbour<'_, V, M::Distance>>
    where
        A: Accessor<V>,
        C: Comparator<A::Coordinate>,
        M: AxialDistance<A::Coordinate>,
        P: FnMut(&V) -> bool,
    {
        let root = self.root()?;
        let mut search = NearestSearch::from_start(root, 0).within(max);
        let root_value = self.value(root);
        if predicate(root_value) {
            let d = geometry.accumulate_distance(query, root_value);
            if d <= max {
                search = search.seeded(root, d, 0);
            }
        }
        let found = search.run(self, geometry, query, &mut predicate);
        found.node.map(|node| Neighbour {
            node,
            value: self.value(node),
            distance: found.distance,
        })
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::metric::SquaredDifference;
    use crate::node::Side;
    use crate::value::{DimensionAccessor, KdValuePlus};

    fn scenario() -> (Geometry<DimensionAccessor>, KdArena<(i32, i32)>) {
        let geometry = Geometry::of::<(i32, i32)>();
        let mut tree = KdArena::new();
        for point in [(0, 0), (2, 2), (5, 5), (9, 1)] {
            tree.insert(&geometry, point);
        }
        (geometry, tree)
    }

    #[test]
    fn scenario_tree_shape() {
        let (_, tree) = scenario();
        let ids: Vec<NodeId> = tree.ids().collect();
        assert_eq!(tree.root(), Some(ids[0]));
        assert_eq!(tree.right(ids[0]), Some(ids[1]));
        assert_eq!(tree.right(ids[1]), Some(ids[2]));
        assert_eq!(tree.left(ids[1]), Some(ids[3]));
    }

    #[test]
    fn tie_prefers_earlier_node() {
        let (geometry, tree) = scenario();
        let found = tree.find_nearest(&geometry, &(6, 2)).unwrap();
        assert_eq!(found.value, &(5, 5));
        assert_eq!(found.distance, 10.0);
        assert_eq!(found.node.index(), 2);
    }

    #[test]
    fn predicate_restricts_candidates() {
        let (geometry, tree) = scenario();
        let found = tree
            .find_nearest_if(&geometry, &(0, 0), |p: &(i32, i32)| p.0 % 2 != 0)
            .unwrap();
        assert_eq!(found.value, &(5, 5));
        assert_eq!(found.distance, 50.0);
    }

    #[test]
    fn predicate_rejecting_everything_finds_nothing() {
        let (geometry, tree) = scenario();
        assert_eq!(tree.find_nearest_if(&geometry, &(3, 3), |_: &(i32, i32)| false), None);
        let root = tree.root().unwrap();
        let outcome = NearestSearch::from_start(root, 0).run(&tree, &geometry, &(3, 3), |_| false);
        assert_eq!(outcome.node, None);
        assert_eq!(outcome.distance, f64::INFINITY);
    }

    #[rstest]
    #[case(10.0, Some((5, 5)))]
    #[case(9.99, None)]
    #[case(16.0, Some((5, 5)))]
    fn bound_is_inclusive(#[case] max: f64, #[case] expected: Option<(i32, i32)>) {
        let (geometry, tree) = scenario();
        let found = tree.find_nearest_within(&geometry, &(6, 2), max, |_: &(i32, i32)| true);
        assert_eq!(found.map(|n| *n.value), expected);
    }

    #[test]
    fn seed_is_kept_when_nothing_is_closer() {
        let (geometry, tree) = scenario();
        let ids: Vec<NodeId> = tree.ids().collect();
        let root = ids[0];
        // Pretend (2, 2) was found earlier at distance 0.5; nothing in the tree beats that.
        let outcome = NearestSearch::from_start(root, 0)
            .seeded(ids[1], 0.5, 1)
            .run(&tree, &geometry, &(6, 2), |_| true);
        assert_eq!(
            outcome,
            Nearest {
                node: Some(ids[1]),
                dim: 1,
                distance: 0.5,
            }
        );
    }

    #[test]
    fn reports_active_dimension_of_result() {
        let (geometry, tree) = scenario();
        let root = tree.root().unwrap();
        let outcome = NearestSearch::from_start(root, 0).run(&tree, &geometry, &(9, 0), |_| true);
        assert_eq!(outcome.node.map(NodeId::index), Some(3));
        assert_eq!(outcome.dim, tree.depth(outcome.node.unwrap()) % 2);
        assert_eq!(outcome.distance, 1.0);
    }

    #[test]
    fn start_node_is_not_evaluated() {
        let (geometry, tree) = scenario();
        let root = tree.root().unwrap();
        let outcome = NearestSearch::from_start(root, 0).run(&tree, &geometry, &(0, 0), |_| true);
        // (0, 0) itself is the start; the closest other node is (2, 2).
        assert_eq!(outcome.node.map(NodeId::index), Some(1));
        assert_eq!(outcome.distance, 8.0);
    }

    #[test]
    fn single_node_tree() {
        let geometry =
            Geometry::of::<[f32; 3]>().with_metric(SquaredDifference::<f32>::default());
        let mut tree = KdArena::new();
        tree.attach(None, Side::Left, [1.0f32, 2.0, 3.0]).unwrap();
        let found = tree.find_nearest(&geometry, &[0.0, 0.0, 0.0]).unwrap();
        assert_eq!(found.distance, 14.0);
        assert_eq!(tree.find_nearest_if(&geometry, &[0.0; 3], |_: &[f32; 3]| false), None);
        assert_eq!(KdArena::<[f32; 3]>::new().find_nearest(&geometry, &[0.0; 3]), None);
    }

    #[test]
    fn neighbours_copy_without_copying_values() {
        let geometry = Geometry::of::<KdValuePlus<(i32, i32), String>>();
        let labelled = [(0, 0), (2, 2), (5, 5)].map(|val| KdValuePlus {
            val,
            plus: format!("{val:?}"),
        });
        let tree = KdArena::from_values(&geometry, labelled);
        let query = KdValuePlus {
            val: (4, 4),
            plus: String::new(),
        };
        let found = tree.find_nearest(&geometry, &query);
        let summary = found.map(|n| (n.node, n.distance));
        let found = found.unwrap();
        let copied = found;
        assert_eq!(summary, Some((copied.node, 2.0)));
        assert_eq!(found.value.plus, "(5, 5)");
    }

    #[test]
    fn subtree_search_stops_at_end() {
        let (geometry, tree) = scenario();
        let ids: Vec<NodeId> = tree.ids().collect();
        // Search only below (2, 2); the root (0, 0) is never considered even though it is the
        // closest value to the query.
        let outcome = NearestSearch::from_start(ids[1], 1)
            .ending_at(Some(ids[0]))
            .run(&tree, &geometry, &(0, 0), |_| true);
        assert_eq!(outcome.node, Some(ids[2]));
        assert_eq!(outcome.distance, 50.0);
    }
}
