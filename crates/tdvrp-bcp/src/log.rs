//! Structured execution logs. Per spec.md §6, these *are* the system's log
//! — serialized into the `"Exact"` field of the final JSON output, not a
//! side channel — mirroring the original's `MLBExecutionLog`/
//! `BLBExecutionLog`/`CGExecutionLog`/`BCPExecutionLog` family.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BcStatus {
    DidNotStart,
    Optimum,
    TimeLimitReached,
    MemoryLimitReached,
    NodeLimitReached,
}

impl Default for BcStatus {
    fn default() -> Self {
        BcStatus::DidNotStart
    }
}

/// One BCP node's column-generation trace: how many LP-solve/pricing
/// round-trips it took to converge, and the relaxation values along the
/// way.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CgExecutionLog {
    pub iterations: usize,
    pub columns_added: usize,
    pub cuts_added: usize,
    pub root_relaxation: Option<f64>,
    pub final_relaxation: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BcpExecutionLog {
    pub status: BcStatus,
    pub nodes_processed: usize,
    pub cuts_added: usize,
    pub root_lp_value: Option<f64>,
    pub final_bound: f64,
    pub node_logs: Vec<CgExecutionLog>,
}
