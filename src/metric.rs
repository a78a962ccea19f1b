use std::fmt::Debug;
use std::marker::PhantomData;
use std::ops::{Mul, Sub};

use num_traits::{AsPrimitive, Zero};

pub trait MetricLimits {
    /// Create a maximum metric, such that any two values are closer together than this value.
    fn infinity() -> Self;
}

macro_rules! float_limits {
    ($($T:ty),+) => {
        $(
            impl MetricLimits for $T {
                #[inline]
                fn infinity() -> Self {
                    <$T>::INFINITY
                }
            }
        )+
    };
}

macro_rules! integer_limits {
    ($($T:ty),+) => {
        $(
            impl MetricLimits for $T {
                #[inline]
                fn infinity() -> Self {
                    <$T>::MAX
                }
            }
        )+
    };
}

float_limits!(f32, f64);
integer_limits!(u8, u16, u32, u64, u128, usize, i8, i16, i32, i64, i128, isize);

/// Accumulated distance between two values. Must be totally ordered over the values a metric
/// actually produces, start from zero, and only grow as non-negative terms are added to it.
pub trait DistanceValue: Copy + PartialOrd + Zero + MetricLimits + Debug {}

impl<D> DistanceValue for D where D: Copy + PartialOrd + Zero + MetricLimits + Debug {}

/// Strategy measuring the distance between two coordinates along a single dimension.
///
/// The result must never be negative; summing it over every dimension gives the tree's metric.
pub trait AxialDistance<C: ?Sized> {
    type Distance: DistanceValue;

    fn axial(&self, a: &C, b: &C) -> Self::Distance;
}

impl<C, D, F> AxialDistance<C> for F
where
    C: ?Sized,
    D: DistanceValue,
    F: Fn(&C, &C) -> D,
{
    type Distance = D;

    #[inline]
    fn axial(&self, a: &C, b: &C) -> D {
        self(a, b)
    }
}

#[inline]
fn abs_diff<C, Holder>(a: &C, b: &C) -> Holder
where
    C: Copy + PartialOrd + Sub,
    <C as Sub>::Output: AsPrimitive<Holder>,
    Holder: 'static + Copy,
{
    // Larger minus smaller, so unsigned coordinates never wrap.
    let diff = if a < b { *b - *a } else { *a - *b };
    diff.as_()
}

/// Squared difference per dimension; accumulates to squared euclidean distance.
#[derive(Copy, Clone, Default, Debug)]
pub struct SquaredDifference<Holder = f64> {
    holder: PhantomData<Holder>,
}

impl<C, Holder> AxialDistance<C> for SquaredDifference<Holder>
where
    C: Copy + PartialOrd + Sub,
    <C as Sub>::Output: AsPrimitive<Holder>,
    Holder: 'static + DistanceValue + Mul<Output = Holder>,
{
    type Distance = Holder;

    #[inline]
    fn axial(&self, a: &C, b: &C) -> Holder {
        let diff: Holder = abs_diff(a, b);
        diff * diff
    }
}

/// Absolute difference per dimension; accumulates to manhattan (taxicab) distance.
#[derive(Copy, Clone, Default, Debug)]
pub struct AbsoluteDifference<Holder = f64> {
    holder: PhantomData<Holder>,
}

impl<C, Holder> AxialDistance<C> for AbsoluteDifference<Holder>
where
    C: Copy + PartialOrd + Sub,
    <C as Sub>::Output: AsPrimitive<Holder>,
    Holder: 'static + DistanceValue,
{
    type Distance = Holder;

    #[inline]
    fn axial(&self, a: &C, b: &C) -> Holder {
        abs_diff(a, b)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(0, 0, 0.0)]
    #[case(2, 5, 9.0)]
    #[case(5, 2, 9.0)]
    #[case(-3, 4, 49.0)]
    fn squared_difference_is_symmetric(#[case] a: i32, #[case] b: i32, #[case] expected: f64) {
        let metric = SquaredDifference::<f64>::default();
        assert_eq!(metric.axial(&a, &b), expected);
        assert_eq!(metric.axial(&b, &a), expected);
    }

    #[test]
    fn unsigned_coordinates_do_not_wrap() {
        let squared = SquaredDifference::<u64>::default();
        assert_eq!(squared.axial(&3u8, &250u8), 247 * 247);
        let manhattan = AbsoluteDifference::<u32>::default();
        assert_eq!(manhattan.axial(&10u16, &4u16), 6);
        assert_eq!(manhattan.axial(&4u16, &10u16), 6);
    }

    #[test]
    fn closures_are_axial_distances() {
        let chebyshev_term = |a: &f32, b: &f32| (a - b).abs();
        assert_eq!(chebyshev_term.axial(&1.5, &-1.0), 2.5);
    }

    #[test]
    fn limits() {
        assert_eq!(<f64 as MetricLimits>::infinity(), f64::INFINITY);
        assert_eq!(<u32 as MetricLimits>::infinity(), u32::MAX);
        assert!(1e300f64 < <f64 as MetricLimits>::infinity());
    }
}
