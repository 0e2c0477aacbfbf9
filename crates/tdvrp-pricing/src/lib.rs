//! Bidirectional labeling pricing engine for the elementary
//! resource-constrained shortest path with piecewise-linear duration
//! functions and subset-row cut resources.

pub mod bidirectional;
pub mod domination;
pub mod label;
pub mod lazy_label;
pub mod monodirectional;
pub mod pricing_problem;

pub use bidirectional::{BidirectionalConfig, BidirectionalLabeling, BlbRunStats, BlbStatus};
pub use label::{Label, LabelArena, LabelId};
pub use lazy_label::LazyLabel;
pub use monodirectional::{MlbRunStats, MlbStatus, MonodirectionalConfig, MonodirectionalLabeling};
pub use pricing_problem::{PricingProblem, SubsetRowCut};
