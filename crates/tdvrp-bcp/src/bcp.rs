//! The branch-cut-and-price driver (spec.md §4.8). Grounded on
//! `networks2019:code/src/bcp/bcp.cpp`: best-bound node selection, column
//! generation at each node, root-only subset-row cut separation, strong
//! branching on fractional arc flows, and the freeze heuristic.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::time::{Duration, Instant};

use tdvrp_core::pwl::EPS;
use tdvrp_core::{Route, VertexSet, VrpInstance};
use tdvrp_pricing::{BidirectionalConfig, BidirectionalLabeling};

use crate::log::{BcStatus, BcpExecutionLog, CgExecutionLog};
use crate::master::{MasterError, MasterSolution, MasterSolver, MasterStatus};
use crate::spf::SetPartitioningFormulation;

#[derive(Debug, Clone)]
pub struct BcpConfig {
    pub time_limit: Duration,
    pub cut_limit: usize,
    pub node_limit: usize,
    /// `K` in strong branching: how many closest-to-0.5 arcs are evaluated
    /// as branching candidates.
    pub strong_branch_candidates: usize,
    /// Minimum subset-row-cut violation to add a cut (spec.md §4.8: `0.1`).
    pub cut_violation_threshold: f64,
    pub freeze_heuristic: bool,
    pub bidirectional: BidirectionalConfig,
}

impl Default for BcpConfig {
    fn default() -> Self {
        BcpConfig {
            time_limit: Duration::from_secs(7200),
            cut_limit: 100,
            node_limit: usize::MAX,
            strong_branch_candidates: 10,
            cut_violation_threshold: 0.1,
            freeze_heuristic: true,
            bidirectional: BidirectionalConfig::default(),
        }
    }
}

#[derive(Debug, Clone)]
struct Node {
    index: usize,
    bound: f64,
    forbidden_arcs: Vec<(usize, usize)>,
}

#[derive(Debug, Clone)]
struct QueuedNode(Node);

impl PartialEq for QueuedNode {
    fn eq(&self, other: &Self) -> bool {
        self.0.bound == other.0.bound
    }
}
impl Eq for QueuedNode {}
impl PartialOrd for QueuedNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
/// Best-bound order: the smallest LP bound sorts first, so wrapping in
/// `Reverse` turns `BinaryHeap`'s max-heap into the min-heap best-bound
/// needs.
impl Ord for QueuedNode {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.bound.partial_cmp(&other.0.bound).unwrap_or(Ordering::Equal)
    }
}

#[derive(Debug, Clone)]
pub struct BcpSolution {
    pub status: BcStatus,
    pub objective: f64,
    pub routes: Vec<Route>,
    pub log: BcpExecutionLog,
}

pub struct BcpDriver<S: MasterSolver> {
    vrp: VrpInstance,
    solver: S,
    spf: SetPartitioningFormulation,
    blb: BidirectionalLabeling,
    config: BcpConfig,
    next_node_index: usize,
}

impl<S: MasterSolver> BcpDriver<S> {
    pub fn new(vrp: VrpInstance, solver: S, config: BcpConfig) -> Self {
        let n = vrp.vertex_count();
        let mut blb = BidirectionalLabeling::new(vrp.clone());
        blb.config = config.bidirectional.clone();
        BcpDriver { vrp, solver, spf: SetPartitioningFormulation::new(n), blb, config, next_node_index: 1 }
    }

    /// Seeds the master with an initial route so the root LP starts
    /// feasible; `main_bp.cpp` seeds one singleton `(o, i, d)` route per
    /// customer before the tree opens.
    pub fn seed_route(&mut self, route: Route) {
        self.spf.add_route(route);
    }

    pub fn solve(&mut self) -> BcpSolution {
        let start = Instant::now();
        let mut log = BcpExecutionLog::default();
        let mut z_ub = f64::INFINITY;
        let mut incumbent: Vec<Route> = Vec::new();
        let mut status = BcStatus::Optimum;

        let mut heap: BinaryHeap<Reverse<QueuedNode>> = BinaryHeap::new();
        heap.push(Reverse(QueuedNode(Node { index: 0, bound: f64::NEG_INFINITY, forbidden_arcs: Vec::new() })));

        while let Some(Reverse(QueuedNode(node))) = heap.pop() {
            if start.elapsed() >= self.config.time_limit {
                status = BcStatus::TimeLimitReached;
                break;
            }
            if log.nodes_processed >= self.config.node_limit {
                status = BcStatus::NodeLimitReached;
                break;
            }
            // `node.bound` only orders the heap (best-bound node selection);
            // it comes from `estimate_bound`'s no-pricing restricted-master
            // solve, which is an optimistic stand-in for the real,
            // column-generation-converged bound and must never be used to
            // prune — only the post-`process_node` check below (on
            // `solution.objective`, the true converged bound) may discard a
            // node.
            let is_root = node.index == 0;
            let remaining = self.config.time_limit.saturating_sub(start.elapsed());
            let (cg_log, lp_result) = self.process_node(&node, is_root, remaining);
            log.cuts_added += cg_log.cuts_added;
            log.node_logs.push(cg_log);
            log.nodes_processed += 1;

            let solution = match lp_result {
                Ok(s) => s,
                Err(_) => continue, // infeasible node, pruned
            };
            if is_root {
                log.root_lp_value = Some(solution.objective);
                if self.config.freeze_heuristic {
                    if let Some(freeze) = self.freeze_heuristic(self.config.time_limit.saturating_sub(start.elapsed())) {
                        if self.spf.is_integer(&freeze) && freeze.objective < z_ub {
                            z_ub = freeze.objective;
                            incumbent = self.spf.basis(&freeze).into_iter().map(|(r, _)| r.clone()).collect();
                        }
                    }
                }
            }

            if solution.objective >= z_ub - EPS {
                continue;
            }

            if self.spf.is_integer(&solution) {
                z_ub = solution.objective;
                incumbent = self.spf.basis(&solution).into_iter().map(|(r, _)| r.clone()).collect();
                continue;
            }

            if let Some((left, right)) = self.branch_node(&node, &solution) {
                heap.push(Reverse(QueuedNode(left)));
                heap.push(Reverse(QueuedNode(right)));
            }
        }

        log.final_bound = heap.peek().map(|Reverse(q)| q.0.bound).unwrap_or(z_ub);
        log.status = status;
        BcpSolution { status, objective: z_ub, routes: incumbent, log }
    }

    /// Column generation at one node: repeat (solve LP -> price -> add
    /// columns) until pricing returns nothing; at the root, if pricing is
    /// dry, separate subset-row cuts and resume.
    fn process_node(&mut self, node: &Node, is_root: bool, time_budget: Duration) -> (CgExecutionLog, Result<MasterSolution, MasterError>) {
        self.spf.set_forbidden_arcs(node.forbidden_arcs.clone());
        let start = Instant::now();
        let mut cg_log = CgExecutionLog::default();

        loop {
            let remaining = time_budget.saturating_sub(start.elapsed());
            let solution = match self.spf.solve(&self.solver, false, remaining) {
                Ok(s) => s,
                Err(e) => return (cg_log, Err(e)),
            };
            cg_log.iterations += 1;
            if is_root && cg_log.root_relaxation.is_none() {
                cg_log.root_relaxation = Some(solution.objective);
            }
            cg_log.final_relaxation = Some(solution.objective);

            if start.elapsed() >= time_budget {
                return (cg_log, Ok(solution));
            }

            let pricing_problem = self.spf.interpret_duals(&solution.row_duals);
            self.blb.config.time_limit = time_budget.saturating_sub(start.elapsed());
            let (routes, stats) = self.blb.run(pricing_problem);
            self.update_merge_schedule(stats.forward_processed);
            // `main_bp.cpp`'s `pricing_solver` closure: once a labeling run
            // finishes on its own (rather than hitting a limit), later
            // calls can skip straight to last-arc merge.
            if stats.status == Some(tdvrp_pricing::BlbStatus::Finished) {
                self.blb.config.closing_state = true;
            }

            if routes.is_empty() {
                if is_root && self.spf.cut_count() < self.config.cut_limit {
                    let added = self.separate_cuts(&solution);
                    if added > 0 {
                        cg_log.cuts_added += added;
                        continue;
                    }
                }
                return (cg_log, Ok(solution));
            }

            for route in routes {
                self.spf.add_route(route);
                cg_log.columns_added += 1;
            }
        }
    }

    /// `merge_start = (merge_start + forward_processed) / 2`: the adaptive
    /// schedule `main_bp.cpp` uses to decide when iterative merge starts
    /// pairing up labels, folded into the config reused on the next pricing
    /// call.
    fn update_merge_schedule(&mut self, forward_processed: usize) {
        self.blb.config.merge_start = (self.blb.config.merge_start + forward_processed) / 2;
    }

    /// Enumerates triples `(i,j,k)` with `1 <= i<j<k <= n-2` and adds the
    /// single most-violated one (ties broken lexicographically, per
    /// spec.md §5) if its violation exceeds the threshold. Returns `1` if a
    /// cut was added, `0` otherwise.
    fn separate_cuts(&mut self, solution: &MasterSolution) -> usize {
        let n = self.vrp.vertex_count();
        if n < 4 {
            return 0;
        }
        let basis = self.spf.basis(solution);
        let mut best: Option<(usize, usize, usize, f64)> = None;
        for i in 1..n - 1 {
            for j in (i + 1)..n - 1 {
                for k in (j + 1)..n - 1 {
                    let sum: f64 = basis
                        .iter()
                        .filter(|(route, _)| route.path.iter().filter(|&&v| v == i || v == j || v == k).count() >= 2)
                        .map(|(_, y)| *y)
                        .sum();
                    let violation = sum - 1.0;
                    if violation > self.config.cut_violation_threshold + EPS {
                        let beats_current = best.map(|(_, _, _, bv)| violation > bv).unwrap_or(true);
                        if beats_current {
                            best = Some((i, j, k, violation));
                        }
                    }
                }
            }
        }
        match best {
            Some((i, j, k, _)) => {
                self.spf.add_cut(VertexSet::from_iter([i, j, k]));
                1
            }
            None => 0,
        }
    }

    /// Strong branching on arc flows: pick the `K` arcs whose fractional
    /// flow is closest to `0.5`, estimate both children's bounds with a
    /// restricted-master LP solve (no pricing), and branch on the candidate
    /// maximizing `min(bound_left, bound_right)`.
    fn branch_node(&mut self, node: &Node, solution: &MasterSolution) -> Option<(Node, Node)> {
        let mut flows: Vec<((usize, usize), f64)> = self.spf.arc_flows(solution).into_iter().collect();
        if flows.is_empty() {
            return None;
        }
        flows.sort_by(|a, b| (a.1 - 0.5).abs().partial_cmp(&(b.1 - 0.5).abs()).unwrap_or(Ordering::Equal));
        flows.truncate(self.config.strong_branch_candidates);

        let mut best: Option<(Vec<(usize, usize)>, Vec<(usize, usize)>, f64, f64)> = None;
        for ((i, j), _x) in flows {
            let mut left = node.forbidden_arcs.clone();
            left.push((i, j));

            let mut right = node.forbidden_arcs.clone();
            for &w in self.vrp.digraph.successors(i) {
                if w != j {
                    right.push((i, w));
                }
            }
            for &u in self.vrp.digraph.predecessors(j) {
                if u != i {
                    right.push((u, j));
                }
            }

            let left_bound = self.estimate_bound(&left);
            let right_bound = self.estimate_bound(&right);
            let score = left_bound.min(right_bound);
            let is_better = best.as_ref().map(|(_, _, _, s)| score > *s).unwrap_or(true);
            if is_better {
                best = Some((left, right, left_bound, right_bound));
            }
        }

        best.map(|(left, right, left_bound, right_bound)| {
            let left_node = Node { index: self.next_node_index, bound: left_bound, forbidden_arcs: left };
            let right_node = Node { index: self.next_node_index + 1, bound: right_bound, forbidden_arcs: right };
            self.next_node_index += 2;
            (left_node, right_node)
        })
    }

    fn estimate_bound(&self, forbidden_arcs: &[(usize, usize)]) -> f64 {
        let mut spf = self.spf.clone();
        spf.set_forbidden_arcs(forbidden_arcs.to_vec());
        match spf.solve(&self.solver, false, self.config.time_limit) {
            Ok(solution) => solution.objective,
            Err(_) => f64::INFINITY,
        }
    }

    /// Runs the MIP solver on the current restricted master to obtain an
    /// integer upper bound, without touching the tree.
    fn freeze_heuristic(&self, time_limit: Duration) -> Option<MasterSolution> {
        match self.spf.solve(&self.solver, true, time_limit) {
            Ok(solution) if matches!(solution.status, MasterStatus::Optimal | MasterStatus::TimeLimit) => Some(solution),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tdvrp_core::{Piece, PwlFunction};

    fn straight_line_instance() -> VrpInstance {
        let mut tt = vec![vec![PwlFunction::empty(); 3]; 3];
        tt[0][1] = PwlFunction::from_pieces(vec![Piece::new((0.0, 100.0), (10.0, 10.0))]);
        tt[1][2] = PwlFunction::from_pieces(vec![Piece::new((0.0, 100.0), (10.0, 10.0))]);
        let json = serde_json::json!({
            "digraph": {"vertex_count": 3, "arc_count": 2, "arcs": [[0,1,0],[0,0,1],[0,0,0]]},
            "start_depot": 0,
            "end_depot": 2,
            "horizon": [0.0, 100.0],
            "time_windows": [[0.0,100.0],[0.0,100.0],[0.0,100.0]],
            "capacity": 10.0,
            "demands": [0.0, 1.0, 0.0],
            "profits": [0.0, 50.0, 0.0],
            "travel_times": tt,
        });
        VrpInstance::from_json(&json).unwrap()
    }

    #[test]
    fn bcp_solves_tiny_instance_to_optimum() {
        let vrp = straight_line_instance();
        let best = vrp.best_duration_route(&[0, 1, 2]);
        let mut driver = crate::BcpDriver::new(vrp, crate::HighsMaster, BcpConfig::default());
        driver.seed_route(best);
        let solution = driver.solve();
        assert_eq!(solution.status, BcStatus::Optimum);
        assert!(solution.routes.iter().any(|r| r.path == vec![0, 1, 2]));
    }
}
