//! `networks2019:code/include/labeling/label.h`, translated from a raw
//! `parent` pointer chain into arena indices: `Label`s live in a
//! `LabelArena` (append-only `Vec<Label>`) and reference their parent by
//! `LabelId`, so dropping a dominated label never has to reason about who
//! else might be pointing at it.

use tdvrp_core::{PwlFunction, VertexSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LabelId(pub u32);

/// A partial (or, at `v == d`, complete) path from the origin, with the
/// resources needed for domination and extension: load, profit, duration
/// PWL, visited/unreachable vertex sets, and the subset-row cut resources
/// folded in at extension time.
#[derive(Debug, Clone)]
pub struct Label {
    pub parent: Option<LabelId>,
    pub v: usize,
    pub q: f64,
    pub p: f64,
    pub length: u32,
    pub s: VertexSet,
    pub u: VertexSet,
    pub duration: PwlFunction,
    pub rw: (f64, f64),
    pub min_cost: f64,
    pub cut_visited: Vec<u8>,
    pub cut_nz: Vec<usize>,
    pub cut_cost: f64,
}

impl Label {
    /// The root label representing the empty path at the origin, departing
    /// at its earliest time window bound. `no_label` in
    /// `MonodirectionalLabeling::MonodirectionalLabeling`.
    pub fn root(vrp: &tdvrp_core::VrpInstance, origin: usize, num_cuts: usize) -> Label {
        let duration = vrp.tau.get(origin, origin).clone();
        let rw = duration.domain().unwrap_or((0.0, 0.0));
        Label {
            parent: None,
            v: origin,
            q: 0.0,
            p: 0.0,
            length: 0,
            s: VertexSet::empty(),
            u: VertexSet::empty(),
            duration,
            rw,
            min_cost: 0.0,
            cut_visited: vec![0; num_cuts],
            cut_nz: Vec::new(),
            cut_cost: 0.0,
        }
    }
}

/// Append-only store of labels for one labeling run, referenced by index.
#[derive(Debug, Default)]
pub struct LabelArena {
    labels: Vec<Label>,
}

impl LabelArena {
    pub fn new() -> Self {
        LabelArena { labels: Vec::new() }
    }

    pub fn push(&mut self, label: Label) -> LabelId {
        let id = LabelId(self.labels.len() as u32);
        self.labels.push(label);
        id
    }

    pub fn get(&self, id: LabelId) -> &Label {
        &self.labels[id.0 as usize]
    }

    pub fn get_mut(&mut self, id: LabelId) -> &mut Label {
        &mut self.labels[id.0 as usize]
    }

    pub fn clear(&mut self) {
        self.labels.clear();
    }

    /// Reconstructs the path from the origin up to (and including) `id`.
    pub fn path_of(&self, id: LabelId) -> Vec<usize> {
        let mut rev = Vec::new();
        let mut cur = Some(id);
        while let Some(c) = cur {
            let l = self.get(c);
            rev.push(l.v);
            cur = l.parent;
        }
        rev.reverse();
        rev
    }
}
