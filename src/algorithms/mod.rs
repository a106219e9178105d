//! # Directionalization passes
//!
//! Each pass works on a [`SubNetwork`](crate::network::SubNetwork) view of a
//! [`FlowNetwork`](crate::network::FlowNetwork) and keeps its transient
//! per-node state in side-tables scoped to the call.
//!
//! ## Decomposition
//! - [`bridges`]: bridge edges by an explicit-stack Tarjan search
//! - [`partition`]: biconnected components collapsed into a bridge tree
//!
//! ## Orientation
//! - [`shortest_path`]: Dijkstra that honours known directions
//! - [`tree_propagation`]: orients the bridge tree from an ordered sink list
//! - [`path_orientation`]: orients the inside of each biconnected component
//!
//! ## Validation
//! - [`cycle_check`]: explicit-stack search for directed cycles

pub mod bridges;
pub mod cycle_check;
pub mod partition;
pub mod path_orientation;
pub mod shortest_path;
pub mod tree_propagation;
