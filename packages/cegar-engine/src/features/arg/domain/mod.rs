pub mod arg;

pub use arg::{Arg, ArgEdge, ArgNode, ArgNodeId, Pruned};
