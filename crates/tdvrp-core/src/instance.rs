//! The TDVRPTW instance data model (spec.md §3).
//!
//! Grounded on `networks2019:code/include/vrp_instance.h` and
//! `code/src/vrp_instance.cpp`. Preprocessing (service-time folding,
//! triangle-depot arc removal, time-window tightening) is out of scope per
//! spec.md §1 and assumed to have already run over the JSON before it
//! reaches [`VrpInstance::from_json`]; only the derivation of `arr`/`dep`/
//! `pretau`/`LDT` from the given `travel_times` matrix happens here, because
//! spec.md §3 documents those matrices as part of the core data model.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::VecDeque;

use crate::error::InstanceError;
use crate::pwl::{self, PwlFunction};
use crate::route::Route;
use crate::vertex_set::VertexSet;

/// `D=(V,A)`: which arcs exist. Represented densely since instances in this
/// system's target size range (routing, not graph-analytics scale) are
/// small enough that an `n x n` boolean matrix plus adjacency lists is
/// cheaper to query than a sparse structure, and the original's
/// `goc::Digraph` is itself adjacency-list-backed with O(1) arc tests.
#[derive(Debug, Clone)]
pub struct Digraph {
    n: usize,
    arcs: Vec<bool>, // n*n, row-major
    successors: Vec<Vec<usize>>,
    predecessors: Vec<Vec<usize>>,
}

impl Digraph {
    pub fn new(n: usize, pairs: impl IntoIterator<Item = (usize, usize)>) -> Self {
        let mut d = Digraph {
            n,
            arcs: vec![false; n * n],
            successors: vec![Vec::new(); n],
            predecessors: vec![Vec::new(); n],
        };
        for (u, v) in pairs {
            d.add_arc(u, v);
        }
        d
    }

    pub fn vertex_count(&self) -> usize {
        self.n
    }

    pub fn vertices(&self) -> impl Iterator<Item = usize> {
        0..self.n
    }

    #[inline]
    pub fn has_arc(&self, u: usize, v: usize) -> bool {
        self.arcs[u * self.n + v]
    }

    pub fn add_arc(&mut self, u: usize, v: usize) {
        if !self.has_arc(u, v) {
            self.arcs[u * self.n + v] = true;
            self.successors[u].push(v);
            self.predecessors[v].push(u);
        }
    }

    pub fn remove_arc(&mut self, u: usize, v: usize) {
        if self.has_arc(u, v) {
            self.arcs[u * self.n + v] = false;
            self.successors[u].retain(|&x| x != v);
            self.predecessors[v].retain(|&x| x != u);
        }
    }

    pub fn add_arcs(&mut self, pairs: &[(usize, usize)]) {
        for &(u, v) in pairs {
            self.add_arc(u, v);
        }
    }

    pub fn remove_arcs(&mut self, pairs: &[(usize, usize)]) {
        for &(u, v) in pairs {
            self.remove_arc(u, v);
        }
    }

    pub fn successors(&self, v: usize) -> &[usize] {
        &self.successors[v]
    }

    pub fn predecessors(&self, v: usize) -> &[usize] {
        &self.predecessors[v]
    }

    pub fn arcs(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        (0..self.n).flat_map(move |u| self.successors[u].iter().map(move |&v| (u, v)))
    }

    /// `D.Reverse()`.
    pub fn reverse(&self) -> Digraph {
        Digraph::new(self.n, self.arcs().map(|(u, v)| (v, u)))
    }
}

/// A 2-D matrix indexed `[i][j]`, used for `tau`/`arr`/`dep`/`pretau`/`LDT`.
#[derive(Debug, Clone)]
pub struct Matrix<T> {
    n: usize,
    data: Vec<T>,
}

impl<T: Clone> Matrix<T> {
    pub fn filled(n: usize, value: T) -> Self {
        Matrix { n, data: vec![value; n * n] }
    }
}

impl<T> Matrix<T> {
    pub fn get(&self, i: usize, j: usize) -> &T {
        &self.data[i * self.n + j]
    }

    pub fn get_mut(&mut self, i: usize, j: usize) -> &mut T {
        &mut self.data[i * self.n + j]
    }

    pub fn set(&mut self, i: usize, j: usize, value: T) {
        self.data[i * self.n + j] = value;
    }
}

/// A TDVRPTW instance: digraph plus time windows, capacity/demand, profits,
/// and time-dependent travel-time functions, with the derived
/// `arr`/`dep`/`pretau`/`LDT` matrices.
#[derive(Debug, Clone)]
pub struct VrpInstance {
    pub digraph: Digraph,
    pub o: usize,
    pub d: usize,
    pub horizon: f64, // T
    pub tw: Vec<(f64, f64)>,
    pub capacity: f64,
    pub demand: Vec<f64>,
    pub profit: Vec<f64>,
    pub tau: Matrix<PwlFunction>,
    pub arr: Matrix<PwlFunction>,
    pub dep: Matrix<PwlFunction>,
    pub pretau: Matrix<PwlFunction>,
    /// `LDT[k][i]`: latest time one can be at `k` and still reach `i` within
    /// `i`'s deadline along some downstream path.
    pub ldt: Matrix<f64>,
}

#[derive(Debug, Deserialize, Serialize)]
struct DigraphJson {
    vertex_count: usize,
    #[allow(dead_code)]
    arc_count: usize,
    arcs: Vec<Vec<u8>>,
}

impl VrpInstance {
    /// Parses the JSON schema in spec.md §6 ("Instance file (JSON)").
    pub fn from_json(value: &Value) -> Result<VrpInstance, InstanceError> {
        let digraph_json: DigraphJson = serde_json::from_value(
            value.get("digraph").ok_or(InstanceError::MissingField("digraph"))?.clone(),
        )?;
        let n = digraph_json.vertex_count;

        let o: usize = serde_json::from_value(
            value.get("start_depot").ok_or(InstanceError::MissingField("start_depot"))?.clone(),
        )?;
        let d: usize = serde_json::from_value(
            value.get("end_depot").ok_or(InstanceError::MissingField("end_depot"))?.clone(),
        )?;
        if o >= n || d >= n {
            return Err(InstanceError::DepotOutOfRange { o, d, vertex_count: n });
        }

        let horizon: Vec<f64> = serde_json::from_value(
            value.get("horizon").ok_or(InstanceError::MissingField("horizon"))?.clone(),
        )?;
        let t_end = *horizon.get(1).ok_or(InstanceError::MissingField("horizon"))?;

        let tw_raw: Vec<(f64, f64)> = serde_json::from_value(
            value.get("time_windows").ok_or(InstanceError::MissingField("time_windows"))?.clone(),
        )?;
        if tw_raw.len() != n {
            return Err(InstanceError::SizeMismatch { vertex_count: n, field: "time_windows", actual: tw_raw.len() });
        }

        let capacity: f64 = value.get("capacity").and_then(Value::as_f64).unwrap_or(1.0);

        let demand: Vec<f64> = serde_json::from_value(
            value.get("demands").ok_or(InstanceError::MissingField("demands"))?.clone(),
        )?;
        if demand.len() != n {
            return Err(InstanceError::SizeMismatch { vertex_count: n, field: "demands", actual: demand.len() });
        }

        let profit: Vec<f64> = match value.get("profits") {
            Some(v) => serde_json::from_value(v.clone())?,
            None => vec![0.0; n],
        };

        let travel_times_json = value.get("travel_times").ok_or(InstanceError::MissingField("travel_times"))?;
        let travel_times: Vec<Vec<PwlFunction>> = serde_json::from_value(travel_times_json.clone())?;
        if travel_times.len() != n {
            return Err(InstanceError::SizeMismatch { vertex_count: n, field: "travel_times", actual: travel_times.len() });
        }

        let mut digraph = Digraph::new(n, std::iter::empty());
        for u in 0..n {
            let row = digraph_json.arcs.get(u).ok_or(InstanceError::SizeMismatch {
                vertex_count: n,
                field: "digraph.arcs",
                actual: digraph_json.arcs.len(),
            })?;
            for v in 0..n {
                if row.get(v).copied().unwrap_or(0) != 0 {
                    digraph.add_arc(u, v);
                }
            }
        }

        let mut tau = Matrix::filled(n, PwlFunction::empty());
        let mut arr = Matrix::filled(n, PwlFunction::empty());
        let mut dep = Matrix::filled(n, PwlFunction::empty());
        let mut pretau = Matrix::filled(n, PwlFunction::empty());

        for u in 0..n {
            for &v in digraph.successors(u) {
                let tau_uv = travel_times
                    .get(u)
                    .and_then(|row| row.get(v))
                    .cloned()
                    .ok_or(InstanceError::MissingTravelTime { tail: u, head: v })?;
                if tau_uv.is_empty() {
                    return Err(InstanceError::InvalidTravelTime { tail: u, head: v });
                }
                let arr_uv = tau_uv.add(&PwlFunction::identity(tau_uv.domain().unwrap()));
                let dep_uv = arr_uv.inverse();
                let pretau_uv = PwlFunction::identity(dep_uv.domain().unwrap_or((0.0, 0.0))).sub(&dep_uv);
                tau.set(u, v, tau_uv);
                arr.set(u, v, arr_uv);
                dep.set(u, v, dep_uv);
                pretau.set(u, v, pretau_uv);
            }
            // Self-loops carry identity arrival and zero travel time over
            // tw[v], per spec.md §3 ("boundary uniformity").
            tau.set(u, u, PwlFunction::constant(0.0, tw_raw[u]));
            pretau.set(u, u, PwlFunction::constant(0.0, tw_raw[u]));
            arr.set(u, u, PwlFunction::identity(tw_raw[u]));
            dep.set(u, u, PwlFunction::identity(tw_raw[u]));
        }

        let mut instance = VrpInstance {
            digraph,
            o,
            d,
            horizon: t_end,
            tw: tw_raw,
            capacity,
            demand,
            profit,
            tau,
            arr,
            dep,
            pretau,
            ldt: Matrix::filled(n, 0.0),
        };
        instance.ldt = compute_ldt(&instance);
        Ok(instance)
    }

    pub fn vertex_count(&self) -> usize {
        self.digraph.vertex_count()
    }

    /// Recomputes `ldt` from the current `dep` matrix. Called after
    /// building a time-reversed instance by hand (bidirectional labeling's
    /// `reverse_instance`), since the reversed `dep` matrix isn't the one
    /// `from_json` derived `ldt` from originally.
    pub fn recompute_ldt(&mut self) {
        self.ldt = compute_ldt(self);
    }

    /// Travel time for arc `(u,v)` if departing at `t0`; `INFTY` if departure
    /// at `t0` is infeasible.
    /// `networks2019:code/src/vrp_instance.cpp` `VRPInstance::TravelTime`.
    pub fn travel_time(&self, u: usize, v: usize, t0: f64) -> f64 {
        let tau_e = self.tau.get(u, v);
        let Some((lo, hi)) = tau_e.domain() else { return f64::INFINITY };
        if pwl::gt(t0, hi) {
            f64::INFINITY
        } else if pwl::lt(t0, lo) {
            lo + tau_e.value(lo) - t0
        } else {
            tau_e.value(t0)
        }
    }

    /// `networks2019:code/src/vrp_instance.cpp` `VRPInstance::PreTravelTime`.
    pub fn pre_travel_time(&self, u: usize, v: usize, tf: f64) -> f64 {
        let pretau_e = self.pretau.get(u, v);
        let Some((lo, hi)) = pretau_e.domain() else { return f64::INFINITY };
        if pwl::lt(tf, lo) {
            f64::INFINITY
        } else if pwl::gt(tf, hi) {
            tf - hi + pretau_e.value(hi)
        } else {
            pretau_e.value(tf)
        }
    }

    /// `networks2019:code/src/vrp_instance.cpp` `VRPInstance::ArrivalTime`.
    pub fn arrival_time(&self, u: usize, v: usize, t0: f64) -> f64 {
        let arr_e = self.arr.get(u, v);
        let Some((lo, hi)) = arr_e.domain() else { return f64::INFINITY };
        if pwl::gt(t0, hi) {
            f64::INFINITY
        } else if pwl::lt(t0, lo) {
            arr_e.min_image()
        } else {
            arr_e.value(t0)
        }
    }

    /// `networks2019:code/src/vrp_instance.cpp` `VRPInstance::DepartureTime`.
    /// Uses the clamp-to-image rule (spec.md §9 Open Question): clamps to
    /// `max(img(dep))` past the domain's right edge.
    pub fn departure_time(&self, u: usize, v: usize, tf: f64) -> f64 {
        let dep_e = self.dep.get(u, v);
        let Some((lo, hi)) = dep_e.domain() else { return f64::INFINITY };
        if pwl::lt(tf, lo) {
            f64::INFINITY
        } else if pwl::gt(tf, hi) {
            dep_e.max_image()
        } else {
            dep_e.value(tf)
        }
    }

    /// Ready time (arrival at the end of `p`) departing `o` at `t0`, or
    /// `INFTY` if infeasible (time-window or capacity violation anywhere
    /// along `p`). `networks2019:code/src/vrp_instance.cpp`
    /// `VRPInstance::ReadyTime`.
    pub fn ready_time(&self, p: &[usize], t0: f64) -> f64 {
        if p.is_empty() {
            return t0;
        }
        let mut q = self.demand[p[0]];
        let mut t = t0;
        for w in p.windows(2) {
            let (i, j) = (w[0], w[1]);
            let tau_ij = self.tau.get(i, j);
            match tau_ij.domain() {
                Some((lo, hi)) if pwl::geq(t, lo) && pwl::leq(t, hi) => {
                    t += tau_ij.value(t);
                }
                _ => return f64::INFINITY,
            }
            q += self.demand[j];
        }
        if pwl::gt(q, self.capacity) {
            return f64::INFINITY;
        }
        t
    }

    /// The route along `p` with minimum duration (over every feasible
    /// departure time from `o`), by composing `arr` along the path.
    /// `networks2019:code/src/vrp_instance.cpp`
    /// `VRPInstance::BestDurationRoute`.
    pub fn best_duration_route(&self, p: &[usize]) -> Route {
        if p.is_empty() {
            return Route::infeasible(p.to_vec());
        }
        let mut delta = self.arr.get(p[0], p[0]).clone();
        if delta.is_empty() {
            return Route::infeasible(p.to_vec());
        }
        for w in p.windows(2) {
            let (i, j) = (w[0], w[1]);
            delta = self.arr.get(i, j).compose(&delta);
            if delta.is_empty() {
                return Route::infeasible(p.to_vec());
            }
        }
        let Some(dom) = delta.domain() else { return Route::infeasible(p.to_vec()) };
        let duration_fn = delta.sub(&PwlFunction::identity(dom));
        let min_duration = duration_fn.min_image();
        let t0 = duration_fn.pre_value(min_duration);
        Route { path: p.to_vec(), t0, duration: min_duration }
    }

    /// Vertices unreachable (in time) departing `v` at `t0`: `w` such that
    /// `t0 > LDT[v][w]`. `networks2019:code/src/vrp_instance.cpp`
    /// `VRPInstance::Unreachable`.
    pub fn unreachable(&self, v: usize, t0: f64) -> VertexSet {
        let mut s = VertexSet::empty();
        for w in self.digraph.vertices() {
            if pwl::gt(t0, *self.ldt.get(v, w)) {
                s.insert(w);
            }
        }
        s
    }

    /// Weak (time-only) unreachable set, ignoring capacity — spec.md §4.2
    /// step 7's non-strengthened `unreachable` option (`unreachable_strengthened = false`).
    pub fn weak_unreachable(&self, v: usize, t0: f64) -> VertexSet {
        self.unreachable(v, t0)
    }
}

/// Backward latest-departure-time shortest path from `i`, using `dep`:
/// `LDT_i[k]` = the latest time one can depart `k` and still arrive at `i`
/// by `tw[i].1`. Computed for every `i` to fill the `LDT[k][i]` matrix.
/// `networks2019:code/src/vrp_instance.cpp`'s `from_json` calls
/// `compute_latest_departure_time` per vertex `i`.
fn compute_ldt(instance: &VrpInstance) -> Matrix<f64> {
    let n = instance.vertex_count();
    let mut ldt = Matrix::filled(n, f64::NEG_INFINITY);
    for i in 0..n {
        let ldt_i = latest_departure_time_to(instance, i);
        for k in 0..n {
            ldt.set(k, i, ldt_i[k]);
        }
    }
    ldt
}

fn latest_departure_time_to(instance: &VrpInstance, target: usize) -> Vec<f64> {
    let n = instance.vertex_count();
    let mut best = vec![f64::NEG_INFINITY; n];
    best[target] = instance.tw[target].1;
    // Bellman-Ford-style relaxation over the reverse digraph (small
    // instances; no negative-cycle concerns since `dep` is FIFO/monotone).
    let mut queue: VecDeque<usize> = VecDeque::new();
    queue.push_back(target);
    let mut in_queue = vec![false; n];
    in_queue[target] = true;
    while let Some(v) = queue.pop_front() {
        in_queue[v] = false;
        let v_bound = best[v];
        for &u in instance.digraph.predecessors(v) {
            let dep_uv = instance.departure_time(u, v, v_bound);
            if dep_uv.is_finite() && dep_uv > best[u] {
                best[u] = dep_uv;
                if !in_queue[u] {
                    in_queue[u] = true;
                    queue.push_back(u);
                }
            }
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pwl::Piece;

    fn two_arc_instance() -> VrpInstance {
        let mut tt = vec![vec![PwlFunction::empty(); 3]; 3];
        tt[0][1] = PwlFunction::from_pieces(vec![Piece::new((0.0, 1000.0), (10.0, 10.0))]);
        tt[1][2] = PwlFunction::from_pieces(vec![Piece::new((0.0, 1000.0), (10.0, 10.0))]);
        let instance_json = serde_json::json!({
            "digraph": {"vertex_count": 3, "arc_count": 2, "arcs": [[0,1,0],[0,0,1],[0,0,0]]},
            "start_depot": 0,
            "end_depot": 2,
            "horizon": [0.0, 1000.0],
            "time_windows": [[0.0,1000.0],[0.0,1000.0],[0.0,1000.0]],
            "capacity": 1000.0,
            "demands": [0.0, 0.0, 0.0],
            "travel_times": tt,
        });
        VrpInstance::from_json(&instance_json).unwrap()
    }

    #[test]
    fn parses_tiny_two_arc_instance() {
        let vrp = two_arc_instance();
        assert_eq!(vrp.vertex_count(), 3);
        assert!(vrp.digraph.has_arc(0, 1));
        assert!(vrp.digraph.has_arc(1, 2));
    }

    #[test]
    fn best_duration_route_sums_constant_travel_times() {
        let vrp = two_arc_instance();
        let r = vrp.best_duration_route(&[0, 1, 2]);
        assert!(r.is_feasible());
        assert!(pwl::eq(r.duration, 20.0));
    }

    #[test]
    fn reverse_digraph_flips_arcs() {
        let vrp = two_arc_instance();
        let rev = vrp.digraph.reverse();
        assert!(rev.has_arc(1, 0));
        assert!(rev.has_arc(2, 1));
        assert!(!rev.has_arc(0, 1));
    }
}
