use std::cmp::Ordering;

/// Total ordering over coordinates, including floating point coordinates that are only
/// `PartialOrd` in the standard library.
pub trait TotalOrd {
    fn total_eq(&self, other: &Self) -> bool;
    fn total_cmp(&self, other: &Self) -> Ordering;
}

impl<T: TotalOrd + ?Sized> TotalOrd for &T {
    fn total_eq(&self, other: &Self) -> bool {
        (*self).total_eq(*other)
    }

    fn total_cmp(&self, other: &Self) -> Ordering {
        (*self).total_cmp(*other)
    }
}

impl TotalOrd for f32 {
    fn total_eq(&self, other: &Self) -> bool {
        self.to_bits() == other.to_bits()
    }

    fn total_cmp(&self, other: &Self) -> Ordering {
        f32::total_cmp(self, other)
    }
}

impl TotalOrd for f64 {
    fn total_eq(&self, other: &Self) -> bool {
        self.to_bits() == other.to_bits()
    }

    fn total_cmp(&self, other: &Self) -> Ordering {
        f64::total_cmp(self, other)
    }
}

macro_rules! define_total_ord {
    ($($T:ty),+ $(,)?) => {
        $(
            impl TotalOrd for $T {
                fn total_eq(&self, other: &Self) -> bool {
                    self == other
                }

                fn total_cmp(&self, other: &Self) -> Ordering {
                    self.cmp(other)
                }
            }
        )+
    };
}

define_total_ord!(u8, u16, u32, u64, u128, usize, i8, i16, i32, i64, i128, isize, char, bool);

/// A value with a fixed number of dimensions that can be read one coordinate at a time.
pub trait KdValue {
    const DIMS: usize;
    type Dimension: Clone;

    fn get_dimension(&self, dim: usize) -> Self::Dimension;
}

impl<T: Clone, const N: usize> KdValue for [T; N] {
    const DIMS: usize = N;
    type Dimension = T;

    #[inline]
    fn get_dimension(&self, dim: usize) -> T {
        self[dim].clone()
    }
}

impl<T: Clone> KdValue for (T, T) {
    const DIMS: usize = 2;
    type Dimension = T;

    #[inline]
    fn get_dimension(&self, dim: usize) -> T {
        match dim {
            0 => self.0.clone(),
            1 => self.1.clone(),
            _ => panic!("invalid dimension"),
        }
    }
}

impl<T: Clone> KdValue for (T, T, T) {
    const DIMS: usize = 3;
    type Dimension = T;

    #[inline]
    fn get_dimension(&self, dim: usize) -> T {
        match dim {
            0 => self.0.clone(),
            1 => self.1.clone(),
            2 => self.2.clone(),
            _ => panic!("invalid dimension"),
        }
    }
}

/// KdValue wrapper that attaches extra data which is ignored for purposes of geometry.
#[derive(Clone, Debug, PartialEq)]
pub struct KdValuePlus<V: KdValue, Plus> {
    pub val: V,
    pub plus: Plus,
}

impl<V: KdValue, Plus> KdValue for KdValuePlus<V, Plus> {
    const DIMS: usize = V::DIMS;
    type Dimension = V::Dimension;

    #[inline]
    fn get_dimension(&self, dim: usize) -> V::Dimension {
        self.val.get_dimension(dim)
    }
}

/// Strategy extracting the coordinate of a value along one dimension.
///
/// Implementations must be pure: the same value and dimension always produce the same coordinate
/// for as long as the value is stored in a tree.
pub trait Accessor<V: ?Sized> {
    type Coordinate;

    fn coordinate(&self, value: &V, dim: usize) -> Self::Coordinate;
}

impl<V, C, F> Accessor<V> for F
where
    V: ?Sized,
    F: Fn(&V, usize) -> C,
{
    type Coordinate = C;

    #[inline]
    fn coordinate(&self, value: &V, dim: usize) -> C {
        self(value, dim)
    }
}

/// Accessor for any [`KdValue`], reading coordinates with [`KdValue::get_dimension`].
#[derive(Copy, Clone, Default, Debug)]
pub struct DimensionAccessor;

impl<V: KdValue> Accessor<V> for DimensionAccessor {
    type Coordinate = V::Dimension;

    #[inline]
    fn coordinate(&self, value: &V, dim: usize) -> V::Dimension {
        value.get_dimension(dim)
    }
}

#[cfg(test)]
mod tests {
    use std::cmp::Ordering;

    use super::*;

    #[test]
    fn floats_order_totally() {
        assert_eq!(TotalOrd::total_cmp(&-0.0f64, &0.0), Ordering::Less);
        assert_eq!(TotalOrd::total_cmp(&1.0f32, &f32::NAN), Ordering::Less);
        assert!(TotalOrd::total_eq(&f64::NAN, &f64::NAN));
        assert!(!TotalOrd::total_eq(&-0.0f64, &0.0));
    }

    #[test]
    fn dimension_accessor_reads_each_axis() {
        let point = KdValuePlus {
            val: [3, 1, 4],
            plus: "label",
        };
        let coords: Vec<i32> = (0..3)
            .map(|dim| DimensionAccessor.coordinate(&point, dim))
            .collect();
        assert_eq!(coords, [3, 1, 4]);
        assert_eq!(DimensionAccessor.coordinate(&(7u8, 9u8), 1), 9);
        assert_eq!(<(f32, f32, f32) as KdValue>::DIMS, 3);
    }

    #[test]
    fn closures_are_accessors() {
        struct Station {
            lat: f64,
            lon: f64,
        }
        let acc = |s: &Station, dim: usize| if dim == 0 { s.lat } else { s.lon };
        let s = Station {
            lat: 51.5,
            lon: -0.1,
        };
        assert_eq!(acc.coordinate(&s, 0), 51.5);
        assert_eq!(acc.coordinate(&s, 1), -0.1);
    }

    #[test]
    #[should_panic(expected = "invalid dimension")]
    fn tuple_rejects_out_of_range_dimension() {
        (1, 2).get_dimension(2);
    }
}
