#![forbid(unsafe_code)]

pub use crate::error::LinkError;
pub use crate::geometry::{
    accumulate_distance, accumulate_distance_within, compare, descend, descend_side, distance,
    Comparator, Geometry, LessThan,
};
pub use crate::metric::{
    AbsoluteDifference, AxialDistance, DistanceValue, MetricLimits, SquaredDifference,
};
pub use crate::node::{KdArena, KdLinks, KdNode, Links, NodeId, Side};
pub use crate::search::{Nearest, NearestSearch, Neighbour};
pub use crate::value::{Accessor, DimensionAccessor, KdValue, KdValuePlus, TotalOrd};

mod build;
mod error;
pub mod geometry;
pub mod metric;
mod node;
pub mod search;
pub mod value;
