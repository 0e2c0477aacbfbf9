//! Bidirectional labeling: runs a forward and a backward
//! [`MonodirectionalLabeling`] side by side and merges their half-labels at
//! a moving midpoint `t_m`. Grounded on
//! `networks2019:code/src/labeling/bidirectional_labeling.cpp`.

use std::collections::{BinaryHeap, HashMap};
use std::time::{Duration, Instant};

use tdvrp_core::pwl::{self, EPS};
use tdvrp_core::{Piece, PwlFunction, Route, VertexSet, VrpInstance};

use crate::label::{Label, LabelArena, LabelId};
use crate::lazy_label::LazyLabel;
use crate::monodirectional::{DemandLevel, MonodirectionalConfig, MonodirectionalLabeling};
use crate::pricing_problem::PricingProblem;

const FWD: usize = 0;
const BWD: usize = 1;

#[derive(Debug, Clone)]
pub struct BidirectionalConfig {
    pub solution_limit: usize,
    pub time_limit: Duration,
    /// `true`: only last-arc merge runs, once both queues are drained
    /// (cheaper, no running dominance structure kept on the side).
    /// `false`: iterative merge runs after every processed batch too.
    pub closing_state: bool,
    /// Minimum forward-processed-label count before iterative merge starts
    /// trying to pair up labels (`merge_start` in the original).
    pub merge_start: usize,
    pub symmetric: bool,
    pub mono: MonodirectionalConfig,
}

impl Default for BidirectionalConfig {
    fn default() -> Self {
        BidirectionalConfig {
            solution_limit: usize::MAX,
            time_limit: Duration::from_secs(3600 * 24 * 365),
            closing_state: true,
            merge_start: 0,
            symmetric: false,
            mono: MonodirectionalConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlbStatus {
    Finished,
    TimeLimitReached,
    SolutionLimitReached,
}

#[derive(Debug, Clone, Default)]
pub struct BlbRunStats {
    pub status: Option<BlbStatus>,
    pub forward_processed: usize,
    pub backward_processed: usize,
}

pub struct BidirectionalLabeling {
    vrp: VrpInstance,
    pub config: BidirectionalConfig,
    lbl: [MonodirectionalLabeling; 2],
    pp: PricingProblem,
    solutions: HashMap<VertexSet, Route>,
    m: [Vec<DemandLevel>; 2],
}

impl BidirectionalLabeling {
    pub fn new(vrp: VrpInstance) -> Self {
        let n = vrp.vertex_count();
        let reverse = reverse_instance(&vrp);
        let mut fwd = MonodirectionalLabeling::new(vrp.clone());
        let mut bwd = MonodirectionalLabeling::new(reverse);
        fwd.config.process_limit = 10;
        bwd.config.process_limit = 10;
        fwd.config.cross = false;
        bwd.config.cross = true;
        BidirectionalLabeling {
            vrp,
            config: BidirectionalConfig::default(),
            lbl: [fwd, bwd],
            pp: PricingProblem::default(),
            solutions: HashMap::new(),
            m: [vec![Vec::new(); n], vec![Vec::new(); n]],
        }
    }

    /// `BidirectionalLabeling::Run`.
    pub fn run(&mut self, pricing_problem: PricingProblem) -> (Vec<Route>, BlbRunStats) {
        self.solutions.clear();
        let n = self.vrp.vertex_count();
        self.m = [vec![Vec::new(); n], vec![Vec::new(); n]];

        self.pp = pricing_problem;
        self.lbl[FWD].set_problem(self.pp.clone());
        self.lbl[BWD].set_problem(self.pp.reversed());
        let t_m0 = if self.config.symmetric { self.vrp.horizon / 2.0 } else { self.vrp.horizon };
        self.lbl[FWD].t_m = t_m0;
        self.lbl[BWD].t_m = t_m0;
        for d in 0..2 {
            self.lbl[d].config.partial = self.config.mono.partial;
            self.lbl[d].config.relax_elementary_check = self.config.mono.relax_elementary_check;
            self.lbl[d].config.relax_cost_check = self.config.mono.relax_cost_check;
            self.lbl[d].config.limited_extension = self.config.mono.limited_extension;
            self.lbl[d].config.lazy_extension = self.config.mono.lazy_extension;
            self.lbl[d].config.sort_by_cost = self.config.mono.sort_by_cost;
            self.lbl[d].config.unreachable_strengthened = self.config.mono.unreachable_strengthened;
            self.lbl[d].config.correcting = self.config.mono.correcting;
        }

        let start = Instant::now();
        let mut q: [BinaryHeap<LazyLabel>; 2] = [BinaryHeap::new(), BinaryHeap::new()];
        q[FWD].push(self.lbl[FWD].init());
        q[BWD].push(self.lbl[BWD].init());

        let mut stats = BlbRunStats::default();
        let mut processed_any = true;
        'outer: while processed_any {
            processed_any = false;
            for d in [FWD, BWD] {
                let od = 1 - d;
                if q[d].is_empty() {
                    continue;
                }
                if start.elapsed() >= self.config.time_limit {
                    stats.status = Some(BlbStatus::TimeLimitReached);
                    break 'outer;
                }
                if self.solutions.len() >= self.config.solution_limit {
                    stats.status = Some(BlbStatus::SolutionLimitReached);
                    break 'outer;
                }
                self.lbl[d].config.time_limit = self.config.time_limit.saturating_sub(start.elapsed());
                let (p, _mlb_stats) = self.lbl[d].run(&mut q[d]);

                if !self.config.closing_state {
                    for &l_id in &p {
                        insert_into_demand_level(&mut self.m[d][self.lbl[d].arena().get(l_id).v], l_id, self.lbl[d].arena());
                    }
                    if self.lbl[FWD].processed_count() >= self.config.merge_start {
                        for &l_id in &p {
                            self.iterative_merge(d, l_id);
                        }
                    }
                }

                if d == FWD {
                    for &l_id in &p {
                        let l = self.lbl[FWD].arena().get(l_id);
                        if l.v == self.vrp.d && l.min_cost < -EPS {
                            let path = self.lbl[FWD].arena().path_of(l_id);
                            self.add_solution(&path, l.duration.min_image());
                        }
                    }
                }

                if q[d].is_empty() {
                    self.lbl[d].t_m = self.vrp.horizon - self.lbl[od].t_m;
                } else {
                    let top_makespan = q[d].peek().unwrap().makespan;
                    self.lbl[od].t_m = self.lbl[od].t_m.min((self.vrp.horizon - self.lbl[d].t_m).max(self.vrp.horizon - top_makespan));
                }

                if !p.is_empty() {
                    processed_any = true;
                }
                if d == FWD {
                    stats.forward_processed += p.len();
                } else {
                    stats.backward_processed += p.len();
                }
            }
        }

        if self.solutions.len() < self.config.solution_limit && start.elapsed() < self.config.time_limit {
            self.last_arc_merge(&mut q[FWD]);
        }

        if stats.status.is_none() {
            stats.status = Some(if self.solutions.len() >= self.config.solution_limit {
                BlbStatus::SolutionLimitReached
            } else {
                BlbStatus::Finished
            });
        }

        let routes = self
            .solutions
            .values()
            .map(|r| self.vrp.best_duration_route(&r.path))
            .collect();
        (routes, stats)
    }

    fn iterative_merge(&mut self, d: usize, l_id: LabelId) {
        let od = 1 - d;
        let l = self.lbl[d].arena().get(l_id).clone();
        let entries: Vec<(i64, Vec<LabelId>)> = self.m[od][l.v].clone();
        for (level, ids) in entries {
            if self.solutions.len() >= self.config.solution_limit {
                break;
            }
            if pwl::gt(level as f64 + l.q - self.vrp.demand[l.v], self.vrp.capacity) {
                break;
            }
            for m_id in ids {
                if self.solutions.len() >= self.config.solution_limit {
                    break;
                }
                let m = self.lbl[od].arena().get(m_id).clone();
                let l_parent_cut_cost = l.parent.map(|p| self.lbl[d].arena().get(p).cut_cost).unwrap_or(0.0);
                if m.min_cost + l.min_cost + self.pp.profits.get(l.v).copied().unwrap_or(0.0) + l.cut_cost - l_parent_cut_cost >= -EPS {
                    break;
                }
                self.merge(d, l_id, od, m_id);
            }
        }
    }

    fn last_arc_merge(&mut self, qf: &mut BinaryHeap<LazyLabel>) {
        // M[v][parent_v][q] = labels of the backward run ending at v whose
        // parent is `parent_v`, sorted by min_cost; `LastArcMerge` matches
        // only the exact last-arc pair `(ll.parent.v, ll.v)`.
        let n = self.vrp.vertex_count();
        let mut grid: Vec<Vec<Vec<(i64, Vec<LabelId>)>>> = vec![vec![Vec::new(); n]; n];
        for v in 0..n {
            for (level, ids) in &self.m[BWD][v] {
                for &m_id in ids {
                    let m = self.lbl[BWD].arena().get(m_id);
                    let Some(parent) = m.parent else { continue };
                    let parent_v = self.lbl[BWD].arena().get(parent).v;
                    insert_level(&mut grid[v][parent_v], *level, m_id, self.lbl[BWD].arena());
                }
            }
        }
        // If iterative merge never populated M[BWD], fall back to scanning
        // every backward-processed label directly (closing_state == true,
        // the default: no running structure was built during `Run`).
        if self.config.closing_state {
            grid = vec![vec![Vec::new(); n]; n];
            for v in 0..n {
                for (level, ids) in self.lbl[BWD].demand_levels(v).clone() {
                    for m_id in ids {
                        let m = self.lbl[BWD].arena().get(m_id);
                        let Some(parent) = m.parent else { continue };
                        let parent_v = self.lbl[BWD].arena().get(parent).v;
                        insert_level(&mut grid[v][parent_v], level, m_id, self.lbl[BWD].arena());
                    }
                }
            }
        }

        while let Some(ll) = qf.pop() {
            if self.solutions.len() >= self.config.solution_limit {
                continue;
            }
            let l_id = ll.parent;
            let l = self.lbl[FWD].arena().get(l_id).clone();
            let l_parent_cut_cost = l.parent.map(|p| self.lbl[FWD].arena().get(p).cut_cost).unwrap_or(0.0);
            for (level, ids) in grid[ll.v][l.v].clone() {
                if pwl::gt(level as f64 + l.q - self.vrp.demand[l.v], self.vrp.capacity) {
                    break;
                }
                if self.solutions.len() >= self.config.solution_limit {
                    break;
                }
                for m_id in ids {
                    if self.solutions.len() >= self.config.solution_limit {
                        break;
                    }
                    let m = self.lbl[BWD].arena().get(m_id);
                    if m.min_cost + l.min_cost + self.pp.profits.get(l.v).copied().unwrap_or(0.0) + l.cut_cost - l_parent_cut_cost >= -EPS {
                        break;
                    }
                    self.merge(FWD, l_id, BWD, m_id);
                }
            }
        }
    }

    /// `Merge(l, m)`: stitches a direction-`ld` half-label with a
    /// direction-`md` half-label sharing the same boundary vertex.
    fn merge(&mut self, ld: usize, l_id: LabelId, md: usize, m_id: LabelId) {
        let t = self.vrp.horizon;
        let l = self.lbl[ld].arena().get(l_id).clone();
        let m = self.lbl[md].arena().get(m_id).clone();

        if pwl::gt(l.rw.0, t - m.rw.0) {
            return;
        }
        if l.s.intersection(&m.s) != VertexSet::singleton(l.v) {
            return;
        }

        let duration;
        if pwl::geq(t - m.rw.1, l.rw.1) {
            duration = l.duration.value(l.rw.1) + m.duration.value(m.rw.1) + (t - m.rw.1) - l.rw.1;
        } else {
            let reflect = PwlFunction::identity((0.0, t)).negate().shift_image(t);
            let m_reflected = m.duration.compose(&reflect);
            let lm = l.duration.add(&m_reflected);
            if lm.is_empty() {
                return;
            }
            duration = lm.min_image();
        }

        let l_parent = l.parent.map(|p| self.lbl[ld].arena().get(p).clone());
        let mut merge_cut_cost = 0.0;
        for i in 0..self.pp.cuts.len() {
            let l_parent_visit = l_parent.as_ref().map(|p| p.cut_visited[i]).unwrap_or(0);
            if l_parent_visit + m.cut_visited[i] >= 2 {
                merge_cut_cost += self.pp.cut_duals[i];
            }
        }
        let merge_cost = duration - l.p - m.p + self.pp.profits.get(l.v).copied().unwrap_or(0.0) - merge_cut_cost;
        if merge_cost >= -EPS {
            return;
        }

        let mut path = self.lbl[ld].arena().path_of(l_id);
        let mut x = m.parent;
        while let Some(xid) = x {
            let xl = self.lbl[md].arena().get(xid);
            if xl.parent.is_none() {
                break;
            }
            path.push(xl.v);
            x = xl.parent;
        }
        if path.first().copied() != Some(self.vrp.o) {
            path.reverse();
        }

        self.add_solution(&path, duration);
    }

    fn add_solution(&mut self, path: &[usize], min_duration: f64) {
        let v = VertexSet::from_iter(path.iter().copied());
        let entry = self.solutions.entry(v).or_insert_with(|| Route::infeasible(Vec::new()));
        if entry.duration > min_duration {
            *entry = Route { path: path.to_vec(), t0: 0.0, duration: min_duration };
        }
    }
}

fn insert_into_demand_level(level_vec: &mut DemandLevel, l_id: LabelId, arena: &LabelArena) {
    let q_floor = arena.get(l_id).q.floor() as i64;
    insert_level(level_vec, q_floor, l_id, arena);
}

fn insert_level(level_vec: &mut DemandLevel, level: i64, l_id: LabelId, arena: &LabelArena) {
    let idx = level_vec.iter().position(|(lvl, _)| *lvl == level).unwrap_or_else(|| {
        let pos = level_vec.partition_point(|(lvl, _)| *lvl < level);
        level_vec.insert(pos, (level, Vec::new()));
        pos
    });
    let bucket = &mut level_vec[idx].1;
    let key_cost = arena.get(l_id).min_cost;
    let pos = bucket.partition_point(|&id| arena.get(id).min_cost < key_cost);
    bucket.insert(pos, l_id);
}

/// Builds the time-reversed instance used by the backward labeling: swap
/// origin/destination, reverse the digraph, reflect time windows around
/// `T/2`, and rebuild `arr`/`tau`/`dep`/`pretau` for the reversed arcs.
/// `networks2019:code/src/labeling/bidirectional_labeling.cpp`
/// `reverse_instance`.
pub fn reverse_instance(vrp: &VrpInstance) -> VrpInstance {
    let t = vrp.horizon;
    let n = vrp.vertex_count();
    let mut r = vrp.clone();
    std::mem::swap(&mut r.o, &mut r.d);
    r.digraph = vrp.digraph.reverse();
    for v in 0..n {
        r.tw[v] = (t - vrp.tw[v].1, t - vrp.tw[v].0);
    }

    for u in 0..n {
        for &v in vrp.digraph.successors(u) {
            let reflect = PwlFunction::identity((0.0, t)).negate().shift_image(t);
            let composed = vrp.dep.get(u, v).compose(&reflect);
            let mut arr_vu = composed.negate().shift_image(t);
            arr_vu = extend_left_flat(&arr_vu, r.tw[v].0);

            let tau_vu = arr_vu.sub(&PwlFunction::identity(arr_vu.domain().unwrap_or((0.0, 0.0))));
            let dep_vu = arr_vu.inverse();
            let pretau_vu = PwlFunction::identity(dep_vu.domain().unwrap_or((0.0, 0.0))).sub(&dep_vu);

            r.arr.set(v, u, arr_vu);
            r.tau.set(v, u, tau_vu);
            r.dep.set(v, u, dep_vu);
            r.pretau.set(v, u, pretau_vu);
        }
    }
    for u in 0..n {
        r.tau.set(u, u, PwlFunction::constant(0.0, r.tw[u]));
        r.pretau.set(u, u, PwlFunction::constant(0.0, r.tw[u]));
        r.dep.set(u, u, PwlFunction::identity(r.tw[u]));
        r.arr.set(u, u, PwlFunction::identity(r.tw[u]));
    }
    r.recompute_ldt();
    r
}

/// Extends `f` leftward from `new_lo` to `dom(f).0` with a flat piece at
/// `f`'s global minimum image value, mirroring the original's
/// `Min(ConstantFunction(min(img(f)), ...), f)` (a plain intersection-based
/// `Min` can't express "extend the domain", so this builds the extension
/// directly instead of reusing `PwlFunction::min_of`).
fn extend_left_flat(f: &PwlFunction, new_lo: f64) -> PwlFunction {
    let Some((lo, _hi)) = f.domain() else { return f.clone() };
    if !pwl::lt(new_lo, lo) {
        return f.clone();
    }
    let min_img = f.min_image();
    let mut pieces = vec![Piece::new((new_lo, lo), (min_img, min_img))];
    pieces.extend(f.pieces().iter().cloned());
    PwlFunction::from_pieces(pieces)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pricing_problem::PricingProblem;

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
            "travel_times": tt,
        });
        VrpInstance::from_json(&json).unwrap()
    }

    #[test]
    fn reverse_instance_swaps_depots_and_reverses_arcs() {
        let vrp = straight_line_instance();
        let r = reverse_instance(&vrp);
        assert_eq!(r.o, vrp.d);
        assert_eq!(r.d, vrp.o);
        assert!(r.digraph.has_arc(2, 1));
        assert!(r.digraph.has_arc(1, 0));
    }

    #[test]
    fn bidirectional_run_finds_the_only_negative_cost_route() {
        let vrp = straight_line_instance();
        let mut blb = BidirectionalLabeling::new(vrp);
        let (routes, stats) = blb.run(PricingProblem::new(vec![0.0, 50.0, 0.0]));
        assert!(stats.status.is_some());
        assert!(routes.iter().any(|r| r.path == vec![0, 1, 2]));
    }
}
