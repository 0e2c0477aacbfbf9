//! The set-partitioning master formulation (spec.md §4.7). Grounded on
//! `networks2019:code/src/bcp/spf.cpp`: one row per vertex (origin/
//! destination depots are trivial/free rows, customer rows force exactly
//! one covering route) plus one `<= 1` row per active subset-row cut, and
//! one column per route.
//!
//! Rebuilds the HiGHS column/row matrix from `routes`/`cuts`/
//! `forbidden_arcs` on every [`SetPartitioningFormulation::solve`] rather
//! than mutating an existing model in place the way the original mutates
//! variable bounds on a persistent `goc::Formulation*` — `highs::RowProblem`
//! has no supported incremental-bound-mutation API through this crate's
//! trait boundary, and a single-threaded research-grade BCP (spec.md §5: no
//! parallelism) can afford the rebuild.

use std::time::Duration;

use tdvrp_core::{pwl::EPS, Route, VertexSet};
use tdvrp_pricing::{PricingProblem, SubsetRowCut};

use crate::master::{MasterColumn, MasterError, MasterModel, MasterSolution, MasterSolver, RowBounds};

#[derive(Debug, Clone)]
pub struct SetPartitioningFormulation {
    n: usize,
    routes: Vec<Route>,
    forbidden_arcs: Vec<(usize, usize)>,
    cuts: Vec<SubsetRowCut>,
}

impl SetPartitioningFormulation {
    pub fn new(n: usize) -> Self {
        SetPartitioningFormulation { n, routes: Vec::new(), forbidden_arcs: Vec::new(), cuts: Vec::new() }
    }

    /// `spf.AddRoute(r)`. Returns the column index.
    pub fn add_route(&mut self, route: Route) -> usize {
        self.routes.push(route);
        self.routes.len() - 1
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn cut_count(&self) -> usize {
        self.cuts.len()
    }

    /// `spf.AddCut(S)`: adds a new subset-row row for the triple `S`.
    pub fn add_cut(&mut self, cut: SubsetRowCut) {
        self.cuts.push(cut);
    }

    /// `spf.SetForbiddenArcs(A_f)`: pins to zero every column whose route
    /// traverses an arc in `A_f`; unpins previously forbidden columns. Since
    /// the model is rebuilt from scratch each solve, "unpinning" is simply
    /// not re-applying a stale forbidden set.
    pub fn set_forbidden_arcs(&mut self, arcs: Vec<(usize, usize)>) {
        self.forbidden_arcs = arcs;
    }

    pub fn forbidden_arcs(&self) -> &[(usize, usize)] {
        &self.forbidden_arcs
    }

    fn route_uses_forbidden_arc(&self, route: &Route) -> bool {
        route.path.windows(2).any(|w| self.forbidden_arcs.contains(&(w[0], w[1])))
    }

    fn build_model(&self) -> MasterModel {
        let mut row_bounds = Vec::with_capacity(self.n + self.cuts.len());
        row_bounds.push(RowBounds::free()); // row 0: origin depot
        for _ in 1..self.n.saturating_sub(1) {
            row_bounds.push(RowBounds::equal(1.0)); // customer rows: covered exactly once
        }
        row_bounds.push(RowBounds::free()); // row n-1: destination depot
        for _ in &self.cuts {
            row_bounds.push(RowBounds::at_most(1.0));
        }

        let columns = self
            .routes
            .iter()
            .map(|route| {
                if self.route_uses_forbidden_arc(route) {
                    return MasterColumn { cost: route.duration, lo: 0.0, hi: 0.0, row_coeffs: Vec::new(), integer: true };
                }
                let mut visited = VertexSet::empty();
                let mut row_coeffs = Vec::new();
                for &v in &route.path {
                    if !visited.contains(v) {
                        visited.insert(v);
                        row_coeffs.push((v, 1.0));
                    }
                }
                for (i, cut) in self.cuts.iter().enumerate() {
                    let touched = route.path.iter().filter(|&&v| cut.contains(v)).count();
                    if touched >= 2 {
                        row_coeffs.push((self.n + i, 1.0));
                    }
                }
                MasterColumn { cost: route.duration, lo: 0.0, hi: f64::INFINITY, row_coeffs, integer: true }
            })
            .collect();

        MasterModel { row_bounds, columns }
    }

    pub fn solve(&self, solver: &dyn MasterSolver, integer: bool, time_limit: Duration) -> Result<MasterSolution, MasterError> {
        solver.solve(&self.build_model(), integer, time_limit)
    }

    /// `spf.InterpretDuals(duals)`: builds the pricing problem the column
    /// generator hands to bidirectional labeling. Cuts whose dual is
    /// (numerically) zero drop out of `S`, matching spec.md §3's "active
    /// subset-row cuts ... cut duals sigma_i <= 0" (zero-dual cuts impose no
    /// pricing cost and needn't be tracked by the labeling engine).
    pub fn interpret_duals(&self, row_duals: &[f64]) -> PricingProblem {
        let profits = row_duals[0..self.n].to_vec();
        let mut cuts = Vec::new();
        let mut cut_duals = Vec::new();
        for (i, cut) in self.cuts.iter().enumerate() {
            let dual = row_duals[self.n + i];
            if dual.abs() > EPS {
                cuts.push(*cut);
                cut_duals.push(dual);
            }
        }
        PricingProblem { forbidden_arcs: self.forbidden_arcs.clone(), profits, cuts, cut_duals }
    }

    /// The routes with strictly positive weight in a (possibly fractional)
    /// master solution, paired with their weight — used both for reporting
    /// the best integer solution and for cut separation's violation sum.
    pub fn basis(&self, solution: &MasterSolution) -> Vec<(&Route, f64)> {
        self.routes
            .iter()
            .zip(&solution.column_values)
            .filter(|(_, &y)| y > EPS)
            .map(|(r, &y)| (r, y))
            .collect()
    }

    /// Fractional arc-flow `x[i][j] = sum_r y_r * 1[(i,j) in r]`, used by
    /// strong branching.
    pub fn arc_flows(&self, solution: &MasterSolution) -> std::collections::HashMap<(usize, usize), f64> {
        let mut flows = std::collections::HashMap::new();
        for (route, y) in self.basis(solution) {
            for w in route.path.windows(2) {
                *flows.entry((w[0], w[1])).or_insert(0.0) += y;
            }
        }
        flows
    }

    /// Whether every route with nonzero weight has an (essentially)
    /// integral value — the master LP is then also a MIP-feasible solution.
    pub fn is_integer(&self, solution: &MasterSolution) -> bool {
        solution.column_values.iter().all(|&y| (y - y.round()).abs() <= EPS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tdvrp_core::VertexSet as Vs;

    fn route(path: &[usize], duration: f64) -> Route {
        Route { path: path.to_vec(), t0: 0.0, duration }
    }

    #[test]
    fn build_model_gives_one_row_per_vertex_plus_cuts() {
        let mut spf = SetPartitioningFormulation::new(4);
        spf.add_route(route(&[0, 1, 3], 5.0));
        spf.add_route(route(&[0, 2, 3], 7.0));
        spf.add_cut(Vs::from_iter([1, 2, 3]));
        let model = spf.build_model();
        assert_eq!(model.row_bounds.len(), 5);
        assert_eq!(model.columns.len(), 2);
    }

    #[test]
    fn forbidden_arc_pins_column_to_zero() {
        let mut spf = SetPartitioningFormulation::new(3);
        spf.add_route(route(&[0, 1, 2], 5.0));
        spf.set_forbidden_arcs(vec![(0, 1)]);
        let model = spf.build_model();
        assert_eq!(model.columns[0].hi, 0.0);
    }

    #[test]
    fn interpret_duals_drops_zero_dual_cuts() {
        let mut spf = SetPartitioningFormulation::new(3);
        spf.add_cut(Vs::from_iter([0, 1, 2]));
        let pp = spf.interpret_duals(&[1.0, 2.0, 3.0, 0.0]);
        assert!(pp.cuts.is_empty());
    }
}
