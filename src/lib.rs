//! # Rivnet
//!
//! Rivnet assigns a flow direction to every segment of a river network.
//! Given a flat list of segments (two point identities, a length, and an
//! optional direction that is already known) and an ordered list of outlets,
//! it produces a consistent, acyclic drainage orientation in which every
//! segment flows toward an outlet and no segment known on input is ever
//! reversed.
//!
//! The work is split into passes over an arena-backed [`network::FlowNetwork`]:
//! bridge finding, partitioning into a tree of biconnected components,
//! propagation over that tree, and path-based orientation inside each
//! component. [`directionalize::Directionalizer`] drives them.
//!
//! ```
//! use rivnet::{directionalize::Directionalizer, network::Segment};
//!
//! let segments = vec![
//!     Segment::new("spring", "bend", 2.0),
//!     Segment::new("mouth", "bend", 1.0),
//! ];
//! let result = Directionalizer::default().run(segments, &["mouth"]).unwrap();
//! assert_eq!(result.directions.values().last(), Some(&("bend", "mouth")));
//! ```

pub mod algorithms;
pub mod directionalize;
pub mod error;
pub mod network;
pub mod settings;
pub mod typed_vec;

pub use directionalize::{Directionalized, Directionalizer};
pub use error::{FlowError, NetworkError};
pub use network::{FlowNetwork, Segment};
pub use settings::FlowSettings;

#[cfg(test)]
mod test_networks;
