//! `networks2019:code/include/bcp/pricing_problem.h`: the duals the master
//! formulation hands down to the pricing problem each column-generation
//! iteration.

use tdvrp_core::VertexSet;

/// A subset-row cut over (at most) 3 vertices: `sum_{j: |path(j) ∩ S| >= 2} y_j <= 1`.
pub type SubsetRowCut = VertexSet;

#[derive(Debug, Clone, Default)]
pub struct PricingProblem {
    /// Arcs currently fixed to zero by branching (`spf::forbidden_arcs`).
    pub forbidden_arcs: Vec<(usize, usize)>,
    /// Per-vertex dual `pi_v`, folded into labels as profit.
    pub profits: Vec<f64>,
    /// Active subset-row cuts (nonzero dual only).
    pub cuts: Vec<SubsetRowCut>,
    /// Duals `sigma_i` for `cuts[i]`.
    pub cut_duals: Vec<f64>,
}

impl PricingProblem {
    pub fn new(profits: Vec<f64>) -> Self {
        PricingProblem { forbidden_arcs: Vec::new(), profits, cuts: Vec::new(), cut_duals: Vec::new() }
    }

    /// `reverse_pricing_problem`: arcs reversed for use against the
    /// time-reversed instance; profits and cuts are direction-agnostic.
    pub fn reversed(&self) -> PricingProblem {
        PricingProblem {
            forbidden_arcs: self.forbidden_arcs.iter().map(|&(u, v)| (v, u)).collect(),
            profits: self.profits.clone(),
            cuts: self.cuts.clone(),
            cut_duals: self.cut_duals.clone(),
        }
    }
}
