pub mod cost_map;
pub mod error;
pub mod graph;
pub mod lookahead;
pub mod sampler;
pub mod type_wire;

pub use error::LookaheadError;
pub use graph::{DeviceGraph, RoutingGraph};
pub use lookahead::Lookahead;
