use std::cmp::Ordering;

use num_traits::Zero;

use crate::metric::{AxialDistance, SquaredDifference};
use crate::node::{KdLinks, NodeId, Side};
use crate::value::{Accessor, DimensionAccessor, KdValue, TotalOrd};

/// Strict weak ordering over coordinates, deciding which way the tree is descended.
pub trait Comparator<C: ?Sized> {
    /// Returns true if `a` orders strictly before `b`.
    fn precedes(&self, a: &C, b: &C) -> bool;
}

impl<C, F> Comparator<C> for F
where
    C: ?Sized,
    F: Fn(&C, &C) -> bool,
{
    #[inline]
    fn precedes(&self, a: &C, b: &C) -> bool {
        self(a, b)
    }
}

/// Default comparator: less-than under the coordinate's total order.
#[derive(Copy, Clone, Default, Debug)]
pub struct LessThan;

impl<C: TotalOrd + ?Sized> Comparator<C> for LessThan {
    #[inline]
    fn precedes(&self, a: &C, b: &C) -> bool {
        a.total_cmp(b).is_lt()
    }
}

/// True iff `a`'s coordinate at `dim` orders before `b`'s under `cmp`.
#[inline]
pub fn compare<V, A, C>(dim: usize, cmp: &C, acc: &A, a: &V, b: &V) -> bool
where
    V: ?Sized,
    A: Accessor<V>,
    C: Comparator<A::Coordinate>,
{
    cmp.precedes(&acc.coordinate(a, dim), &acc.coordinate(b, dim))
}

/// Distance between `a` and `b` along `dim` only.
#[inline]
pub fn distance<V, A, M>(dim: usize, dist: &M, acc: &A, a: &V, b: &V) -> M::Distance
where
    V: ?Sized,
    A: Accessor<V>,
    M: AxialDistance<A::Coordinate>,
{
    dist.axial(&acc.coordinate(a, dim), &acc.coordinate(b, dim))
}

/// Sum of the axial distances over dimensions `0..k`.
#[inline]
pub fn accumulate_distance<V, A, M>(k: usize, dist: &M, acc: &A, a: &V, b: &V) -> M::Distance
where
    V: ?Sized,
    A: Accessor<V>,
    M: AxialDistance<A::Coordinate>,
{
    (0..k).fold(M::Distance::zero(), |sum, dim| {
        sum + distance(dim, dist, acc, a, b)
    })
}

/// Like [`accumulate_distance`], but stops adding dimensions as soon as the partial sum exceeds
/// `bound`. The result is exact whenever it is not greater than `bound`.
#[inline]
pub fn accumulate_distance_within<V, A, M>(
    k: usize,
    dist: &M,
    acc: &A,
    a: &V,
    b: &V,
    bound: M::Distance,
) -> M::Distance
where
    V: ?Sized,
    A: Accessor<V>,
    M: AxialDistance<A::Coordinate>,
{
    let mut sum = M::Distance::zero();
    for dim in 0..k {
        if sum > bound {
            break;
        }
        sum = sum + distance(dim, dist, acc, a, b);
    }
    sum
}

/// Dimensionality of a tree together with the strategies used to read, order, and measure the
/// values stored in it. The same geometry must be used for every operation on one tree.
#[derive(Copy, Clone, Debug)]
pub struct Geometry<A, C = LessThan, M = SquaredDifference<f64>> {
    dims: usize,
    accessor: A,
    comparator: C,
    metric: M,
}

impl<A> Geometry<A, LessThan, SquaredDifference<f64>> {
    /// Geometry over `dims` dimensions, ordered by less-than and measured by squared euclidean
    /// distance.
    pub fn new(dims: usize, accessor: A) -> Self {
        assert!(dims > 0, "a k-d tree needs at least one dimension");
        Self {
            dims,
            accessor,
            comparator: LessThan,
            metric: Default::default(),
        }
    }
}

impl Geometry<DimensionAccessor> {
    /// Default geometry for a [`KdValue`] type, using all of its dimensions.
    pub fn of<V: KdValue>() -> Self {
        Self::new(V::DIMS, DimensionAccessor)
    }
}

impl<A, C, M> Geometry<A, C, M> {
    pub fn with_comparator<C2>(self, comparator: C2) -> Geometry<A, C2, M> {
        Geometry {
            dims: self.dims,
            accessor: self.accessor,
            comparator,
            metric: self.metric,
        }
    }

    pub fn with_metric<M2>(self, metric: M2) -> Geometry<A, C, M2> {
        Geometry {
            dims: self.dims,
            accessor: self.accessor,
            comparator: self.comparator,
            metric,
        }
    }

    #[inline]
    pub fn dims(&self) -> usize {
        self.dims
    }

    pub fn accessor(&self) -> &A {
        &self.accessor
    }

    pub fn comparator(&self) -> &C {
        &self.comparator
    }

    pub fn metric(&self) -> &M {
        &self.metric
    }

    #[inline]
    pub fn next_dim(&self, dim: usize) -> usize {
        if dim + 1 == self.dims {
            0
        } else {
            dim + 1
        }
    }

    #[inline]
    pub fn prev_dim(&self, dim: usize) -> usize {
        if dim == 0 {
            self.dims - 1
        } else {
            dim - 1
        }
    }

    #[inline]
    pub fn compare<V: ?Sized>(&self, dim: usize, a: &V, b: &V) -> bool
    where
        A: Accessor<V>,
        C: Comparator<A::Coordinate>,
    {
        compare(dim, &self.comparator, &self.accessor, a, b)
    }

    /// Three-way ordering along `dim` derived from the comparator.
    pub fn ordering<V: ?Sized>(&self, dim: usize, a: &V, b: &V) -> Ordering
    where
        A: Accessor<V>,
        C: Comparator<A::Coordinate>,
    {
        let (a, b) = (
            self.accessor.coordinate(a, dim),
            self.accessor.coordinate(b, dim),
        );
        if self.comparator.precedes(&a, &b) {
            Ordering::Less
        } else if self.comparator.precedes(&b, &a) {
            Ordering::Greater
        } else {
            Ordering::Equal
        }
    }

    #[inline]
    pub fn distance<V: ?Sized>(&self, dim: usize, a: &V, b: &V) -> M::Distance
    where
        A: Accessor<V>,
        M: AxialDistance<A::Coordinate>,
    {
        distance(dim, &self.metric, &self.accessor, a, b)
    }

    #[inline]
    pub fn accumulate_distance<V: ?Sized>(&self, a: &V, b: &V) -> M::Distance
    where
        A: Accessor<V>,
        M: AxialDistance<A::Coordinate>,
    {
        accumulate_distance(self.dims, &self.metric, &self.accessor, a, b)
    }

    #[inline]
    pub fn accumulate_distance_within<V: ?Sized>(
        &self,
        a: &V,
        b: &V,
        bound: M::Distance,
    ) -> M::Distance
    where
        A: Accessor<V>,
        M: AxialDistance<A::Coordinate>,
    {
        accumulate_distance_within(self.dims, &self.metric, &self.accessor, a, b, bound)
    }
}

/// Which side of `node` a search for `query` continues on, deciding at dimension `dim`.
#[inline]
pub fn descend_side<T, A, C, M>(
    geometry: &Geometry<A, C, M>,
    tree: &T,
    dim: usize,
    query: &T::Value,
    node: NodeId,
) -> Side
where
    T: KdLinks + ?Sized,
    A: Accessor<T::Value>,
    C: Comparator<A::Coordinate>,
{
    if geometry.compare(dim, query, tree.value(node)) {
        Side::Left
    } else {
        Side::Right
    }
}

/// The child of `node` a search for `query` continues into: the left child if the query orders
/// before the node at `dim`, otherwise the right child.
#[inline]
pub fn descend<T, A, C, M>(
    geometry: &Geometry<A, C, M>,
    tree: &T,
    dim: usize,
    query: &T::Value,
    node: NodeId,
) -> Option<NodeId>
where
    T: KdLinks + ?Sized,
    A: Accessor<T::Value>,
    C: Comparator<A::Coordinate>,
{
    tree.links(node)
        .child(descend_side(geometry, tree, dim, query, node))
}
