use std::error::Error;
use std::fmt;

use crate::node::{NodeId, Side};

/// Reasons a node could not be linked into an arena.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LinkError {
    /// The named parent is not a node of this arena.
    UnknownNode(NodeId),
    /// The parent already has a child on that side.
    Occupied {
        parent: NodeId,
        side: Side,
        existing: NodeId,
    },
    /// A parentless node was attached to an arena that already has a root.
    RootExists(NodeId),
}

impl fmt::Display for LinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkError::UnknownNode(id) => write!(f, "node {id} does not exist in this arena"),
            LinkError::Occupied {
                parent,
                side,
                existing,
            } => write!(
                f,
                "node {parent} already has {side} child {existing}"
            ),
            LinkError::RootExists(root) => write!(f, "arena already has root node {root}"),
        }
    }
}

impl Error for LinkError {}
