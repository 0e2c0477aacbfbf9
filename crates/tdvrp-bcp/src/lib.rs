//! Set-partitioning master formulation and branch-cut-and-price driver:
//! column generation, subset-row cut separation, and strong branching on
//! arc flows (spec.md §4.7–§4.8).

pub mod bcp;
pub mod log;
pub mod master;
pub mod spf;

pub use bcp::{BcpConfig, BcpDriver, BcpSolution};
pub use log::{BcStatus, BcpExecutionLog, CgExecutionLog};
pub use master::{HighsMaster, MasterError, MasterModel, MasterSolution, MasterSolver, MasterStatus};
pub use spf::SetPartitioningFormulation;
