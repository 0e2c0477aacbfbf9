//! Shared types for the time-dependent VRPTW with per-vertex profits:
//! piecewise-linear arithmetic, fixed-capacity vertex sets, the instance
//! data model, and the `Route` result type. Everything in `tdvrp-pricing`
//! and `tdvrp-bcp` builds on this crate.

pub mod error;
pub mod instance;
pub mod pwl;
pub mod route;
pub mod vertex_set;

pub use error::InstanceError;
pub use instance::{Digraph, Matrix, VrpInstance};
pub use pwl::{Piece, PwlFunction};
pub use route::Route;
pub use vertex_set::{VertexSet, MAX_VERTICES};
