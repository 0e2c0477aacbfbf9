//! The external LP/MIP collaborator's interface (spec.md §1, §6): a trait
//! boundary so [`crate::spf::SetPartitioningFormulation`] never depends on
//! HiGHS types directly, plus the one production implementation.
//!
//! Grounded on `vrppd-milp`'s choice of the `highs` crate over `good_lp` —
//! column generation needs row duals and a precise Optimal/Infeasible/
//! TimeLimit distinction that `good_lp` doesn't surface uniformly across
//! backends.

use std::time::Duration;

use highs::{HighsModelStatus, RowProblem, Sense};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MasterError {
    #[error("restricted master relaxation is infeasible")]
    Infeasible,
    #[error("restricted master relaxation is unbounded")]
    Unbounded,
    #[error("HiGHS reported an unexpected model status: {0:?}")]
    UnexpectedStatus(HighsModelStatus),
}

#[derive(Debug, Clone, Copy)]
pub struct RowBounds {
    pub lo: f64,
    pub hi: f64,
}

impl RowBounds {
    pub fn equal(v: f64) -> Self {
        RowBounds { lo: v, hi: v }
    }

    pub fn at_most(v: f64) -> Self {
        RowBounds { lo: f64::NEG_INFINITY, hi: v }
    }

    pub fn free() -> Self {
        RowBounds { lo: f64::NEG_INFINITY, hi: f64::INFINITY }
    }
}

/// One master variable `y_j`: objective coefficient, bounds, and the rows it
/// has a nonzero coefficient in.
#[derive(Debug, Clone)]
pub struct MasterColumn {
    pub cost: f64,
    pub lo: f64,
    pub hi: f64,
    pub row_coeffs: Vec<(usize, f64)>,
    /// Whether this column should be treated as integral when the model is
    /// solved with `integer = true` (the freeze heuristic's MIP solve).
    pub integer: bool,
}

#[derive(Debug, Clone, Default)]
pub struct MasterModel {
    pub row_bounds: Vec<RowBounds>,
    pub columns: Vec<MasterColumn>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MasterStatus {
    Optimal,
    TimeLimit,
}

#[derive(Debug, Clone)]
pub struct MasterSolution {
    pub status: MasterStatus,
    pub objective: f64,
    pub column_values: Vec<f64>,
    pub row_duals: Vec<f64>,
}

pub trait MasterSolver {
    fn solve(&self, model: &MasterModel, integer: bool, time_limit: Duration) -> Result<MasterSolution, MasterError>;
}

/// `vrppd-milp`'s solver of choice, used here for every LP relaxation, the
/// strong-branching bound estimates, and the freeze heuristic's MIP solve.
#[derive(Debug, Default)]
pub struct HighsMaster;

impl MasterSolver for HighsMaster {
    fn solve(&self, model: &MasterModel, integer: bool, time_limit: Duration) -> Result<MasterSolution, MasterError> {
        let mut pb = RowProblem::default();
        let rows: Vec<_> = model.row_bounds.iter().map(|b| pb.add_row(b.lo..=b.hi)).collect();
        for col in &model.columns {
            let factors: Vec<(highs::Row, f64)> = col.row_coeffs.iter().map(|&(r, c)| (rows[r], c)).collect();
            if integer && col.integer {
                pb.add_integer_column(col.cost, col.lo..=col.hi, factors);
            } else {
                pb.add_column(col.cost, col.lo..=col.hi, factors);
            }
        }

        let mut solvable = pb.optimise(Sense::Minimise);
        solvable.set_option("time_limit", time_limit.as_secs_f64().max(0.001));
        solvable.set_option("output_flag", false);
        let solved = solvable.solve();

        match solved.status() {
            HighsModelStatus::Optimal => {
                let solution = solved.get_solution();
                Ok(MasterSolution {
                    status: MasterStatus::Optimal,
                    objective: objective_of(model, solution.columns()),
                    column_values: solution.columns().to_vec(),
                    row_duals: solution.dual_rows().to_vec(),
                })
            }
            HighsModelStatus::Infeasible => Err(MasterError::Infeasible),
            HighsModelStatus::Unbounded => Err(MasterError::Unbounded),
            HighsModelStatus::ReachedTimeLimit => {
                let solution = solved.get_solution();
                Ok(MasterSolution {
                    status: MasterStatus::TimeLimit,
                    objective: objective_of(model, solution.columns()),
                    column_values: solution.columns().to_vec(),
                    row_duals: solution.dual_rows().to_vec(),
                })
            }
            other => Err(MasterError::UnexpectedStatus(other)),
        }
    }
}

fn objective_of(model: &MasterModel, values: &[f64]) -> f64 {
    model.columns.iter().zip(values).map(|(c, &v)| c.cost * v).sum()
}
