//! Piecewise-linear function arithmetic.
//!
//! A [`PwlFunction`] is an ordered, contiguous sequence of [`Piece`]s: linear
//! segments `value(t) = c + (d - c) / (b - a) * (t - a)` over `t in [a, b]`.
//! This is the "library primitive" spec.md's Glossary assumes is available;
//! it backs `tau`/`arr`/`dep`/`pretau` in [`crate::instance::VrpInstance`] and
//! the label durations in `tdvrp-pricing`.

use serde::{Deserialize, Serialize};

/// Absolute tolerance used for every comparison in this crate and its
/// dependents, per spec.md §7 ("Numeric comparisons use a shared absolute
/// tolerance ε").
pub const EPS: f64 = 1e-6;

pub fn eq(a: f64, b: f64) -> bool {
    (a - b).abs() <= EPS
}

pub fn lt(a: f64, b: f64) -> bool {
    a < b - EPS
}

pub fn gt(a: f64, b: f64) -> bool {
    a > b + EPS
}

pub fn leq(a: f64, b: f64) -> bool {
    !gt(a, b)
}

pub fn geq(a: f64, b: f64) -> bool {
    !lt(a, b)
}

/// A linear segment over `[domain.0, domain.1]` with endpoint values
/// `(image.0, image.1)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Piece {
    pub domain: (f64, f64),
    pub image: (f64, f64),
}

impl Piece {
    pub fn new(domain: (f64, f64), image: (f64, f64)) -> Self {
        Piece { domain, image }
    }

    pub fn value(&self, t: f64) -> f64 {
        let (a, b) = self.domain;
        if eq(a, b) {
            return self.image.0;
        }
        let (c, d) = self.image;
        c + (d - c) / (b - a) * (t - a)
    }

    pub fn slope(&self) -> f64 {
        let (a, b) = self.domain;
        if eq(a, b) {
            return 0.0;
        }
        (self.image.1 - self.image.0) / (b - a)
    }

    /// Restricts this piece to `[lo, hi]`, assumed to overlap `self.domain`.
    fn restrict(&self, lo: f64, hi: f64) -> Piece {
        let lo = lo.max(self.domain.0);
        let hi = hi.min(self.domain.1);
        Piece::new((lo, hi), (self.value(lo), self.value(hi)))
    }
}

/// A piecewise-linear function: non-empty, contiguous, ordered pieces.
/// The empty function (`pieces.is_empty()`) represents an infeasible
/// duration/arrival, the PWL analogue of `INFTY` in the original.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PwlFunction {
    pieces: Vec<Piece>,
}

impl PwlFunction {
    pub fn from_pieces(pieces: Vec<Piece>) -> Self {
        PwlFunction { pieces }
    }

    pub fn empty() -> Self {
        PwlFunction { pieces: Vec::new() }
    }

    pub fn is_empty(&self) -> bool {
        self.pieces.is_empty()
    }

    pub fn pieces(&self) -> &[Piece] {
        &self.pieces
    }

    pub fn constant(value: f64, domain: (f64, f64)) -> Self {
        PwlFunction { pieces: vec![Piece::new(domain, (value, value))] }
    }

    pub fn identity(domain: (f64, f64)) -> Self {
        PwlFunction { pieces: vec![Piece::new(domain, domain)] }
    }

    /// `dom(f)`: `(min, max)` of the overall domain, or `None` if empty.
    pub fn domain(&self) -> Option<(f64, f64)> {
        if self.pieces.is_empty() {
            return None;
        }
        Some((self.pieces.first().unwrap().domain.0, self.pieces.last().unwrap().domain.1))
    }

    /// `image(f)`: `(min, max)` over the whole function. Piecewise-linear
    /// extrema occur at breakpoints, so scanning endpoints suffices.
    pub fn image(&self) -> Option<(f64, f64)> {
        if self.pieces.is_empty() {
            return None;
        }
        let mut lo = f64::INFINITY;
        let mut hi = f64::NEG_INFINITY;
        for p in &self.pieces {
            lo = lo.min(p.image.0).min(p.image.1);
            hi = hi.max(p.image.0).max(p.image.1);
        }
        Some((lo, hi))
    }

    pub fn min_image(&self) -> f64 {
        self.image().map(|(lo, _)| lo).unwrap_or(f64::INFINITY)
    }

    pub fn max_image(&self) -> f64 {
        self.image().map(|(_, hi)| hi).unwrap_or(f64::NEG_INFINITY)
    }

    /// Evaluates `f(t)`. Panics if `t` is not in `dom(f)` within `EPS`; all
    /// call sites in this workspace check `dom` first (mirroring the
    /// original's `TravelTime`/`ArrivalTime`/... boundary-clamping helpers,
    /// which live on `VrpInstance`, not on the raw PWL).
    pub fn value(&self, t: f64) -> f64 {
        let idx = self.piece_index(t).expect("t outside domain");
        self.pieces[idx].value(t)
    }

    fn piece_index(&self, t: f64) -> Option<usize> {
        for (i, p) in self.pieces.iter().enumerate() {
            if geq(t, p.domain.0) && leq(t, p.domain.1) {
                return Some(i);
            }
        }
        None
    }

    /// Restricts the domain to `[lo, hi]`, dropping/truncating pieces that
    /// fall outside. `lv->duration.RestrictDomain({0.0, t_m})` in
    /// `networks2019:code/src/labeling/monodirectional_labeling.cpp`.
    pub fn restrict_domain(&mut self, lo: f64, hi: f64) {
        let mut out = Vec::new();
        for p in &self.pieces {
            if gt(p.domain.0, hi) || lt(p.domain.1, lo) {
                continue;
            }
            out.push(p.restrict(lo, hi));
        }
        self.pieces = out;
    }

    pub fn shift_image(&self, c: f64) -> PwlFunction {
        PwlFunction {
            pieces: self
                .pieces
                .iter()
                .map(|p| Piece::new(p.domain, (p.image.0 + c, p.image.1 + c)))
                .collect(),
        }
    }

    pub fn negate(&self) -> PwlFunction {
        PwlFunction {
            pieces: self
                .pieces
                .iter()
                .map(|p| Piece::new(p.domain, (-p.image.0, -p.image.1)))
                .collect(),
        }
    }

    /// `f + g`, restricted to `dom(f) ∩ dom(g)`.
    pub fn add(&self, other: &PwlFunction) -> PwlFunction {
        self.combine(other, |a, b| a + b)
    }

    pub fn sub(&self, other: &PwlFunction) -> PwlFunction {
        self.combine(other, |a, b| a - b)
    }

    /// Pointwise minimum of `f` and `g` over `dom(f) ∩ dom(g)`, including the
    /// crossing point within any overlapping sub-piece.
    pub fn min_of(&self, other: &PwlFunction) -> PwlFunction {
        self.combine(other, f64::min)
    }

    /// Builds the result of a pointwise binary op over the common refinement
    /// of both functions' breakpoints, splitting at the op's crossing point
    /// within each overlapping piece pair when the op is `min`/`max`-like
    /// (safe for `add`/`sub` too: the crossing test is a no-op since the
    /// difference is then irrelevant to picking a branch).
    fn combine(&self, other: &PwlFunction, op: fn(f64, f64) -> f64) -> PwlFunction {
        let (Some((lo_f, hi_f)), Some((lo_g, hi_g))) = (self.domain(), other.domain()) else {
            return PwlFunction::empty();
        };
        let lo = lo_f.max(lo_g);
        let hi = hi_f.min(hi_g);
        if gt(lo, hi) {
            return PwlFunction::empty();
        }

        let mut breakpoints: Vec<f64> = vec![lo, hi];
        for p in &self.pieces {
            if p.domain.0 > lo && p.domain.0 < hi {
                breakpoints.push(p.domain.0);
            }
        }
        for p in other.pieces.iter() {
            if p.domain.0 > lo && p.domain.0 < hi {
                breakpoints.push(p.domain.0);
            }
        }
        breakpoints.sort_by(|a, b| a.partial_cmp(b).unwrap());
        breakpoints.dedup_by(|a, b| eq(*a, *b));

        let mut out = Vec::new();
        for w in breakpoints.windows(2) {
            let (a, b) = (w[0], w[1]);
            if eq(a, b) {
                continue;
            }
            let fa = self.value(a);
            let fb = self.value(b);
            let ga = other.value(a);
            let gb = other.value(b);
            // If the op picks a different branch at a vs b (min/max), split
            // at the exact crossing of the two affine pieces.
            let da = fa - ga;
            let db = fb - gb;
            if da.signum() != db.signum() && da.abs() > EPS && db.abs() > EPS {
                let t_cross = a + (b - a) * da / (da - db);
                let mid_val = self.value(t_cross);
                push_piece(&mut out, a, t_cross, op(fa, ga), mid_val);
                push_piece(&mut out, t_cross, b, mid_val, op(fb, gb));
            } else {
                push_piece(&mut out, a, b, op(fa, ga), op(fb, gb));
            }
        }
        PwlFunction { pieces: out }
    }

    /// `f ∘ g`: `t -> f(g(t))` over `{t in dom(g) : g(t) in dom(f)}`. Since
    /// `g` is affine on each piece, the composition is exact and linear on
    /// each refined sub-piece.
    pub fn compose(&self, g: &PwlFunction) -> PwlFunction {
        let Some((lo_f, hi_f)) = self.domain() else {
            return PwlFunction::empty();
        };
        let mut out = Vec::new();
        for gp in &g.pieces {
            let (a, b) = gp.domain;
            let slope = gp.slope();
            // Clip [a, b] to where g(t) stays within dom(f).
            let (mut lo, mut hi) = (a, b);
            if slope.abs() < EPS {
                if gp.image.0 < lo_f - EPS || gp.image.0 > hi_f + EPS {
                    continue;
                }
            } else {
                // g(t) = gp.image.0 + slope * (t - a); solve for g(t) = lo_f / hi_f.
                let t_at = |val: f64| a + (val - gp.image.0) / slope;
                let (t_lo_f, t_hi_f) = (t_at(lo_f), t_at(hi_f));
                let (t_lo_f, t_hi_f) = if t_lo_f <= t_hi_f { (t_lo_f, t_hi_f) } else { (t_hi_f, t_lo_f) };
                lo = lo.max(t_lo_f);
                hi = hi.min(t_hi_f);
            }
            if gt(lo, hi) {
                continue;
            }
            // Further split at f's internal breakpoints that fall within g([lo,hi]).
            let mut cuts = vec![lo, hi];
            for fp in &self.pieces {
                for bound in [fp.domain.0, fp.domain.1] {
                    if bound > lo_f - EPS && bound < hi_f + EPS && slope.abs() > EPS {
                        let t = a + (bound - gp.image.0) / slope;
                        if t > lo + EPS && t < hi - EPS {
                            cuts.push(t);
                        }
                    }
                }
            }
            cuts.sort_by(|x, y| x.partial_cmp(y).unwrap());
            cuts.dedup_by(|x, y| eq(*x, *y));
            for w in cuts.windows(2) {
                let (ta, tb) = (w[0], w[1]);
                if eq(ta, tb) {
                    continue;
                }
                let ga = gp.value(ta);
                let gb = gp.value(tb);
                let fa = self.value(ga.clamp(lo_f, hi_f));
                let fb = self.value(gb.clamp(lo_f, hi_f));
                push_piece(&mut out, ta, tb, fa, fb);
            }
        }
        PwlFunction { pieces: out }
    }

    /// Inverse of a strictly monotone PWL: swaps domain and image per piece.
    pub fn inverse(&self) -> PwlFunction {
        let mut out: Vec<Piece> = self
            .pieces
            .iter()
            .map(|p| {
                let (lo, hi) = if p.image.0 <= p.image.1 { (p.image.0, p.image.1) } else { (p.image.1, p.image.0) };
                let (v_lo, v_hi) = if p.image.0 <= p.image.1 { (p.domain.0, p.domain.1) } else { (p.domain.1, p.domain.0) };
                Piece::new((lo, hi), (v_lo, v_hi))
            })
            .collect();
        out.sort_by(|a, b| a.domain.0.partial_cmp(&b.domain.0).unwrap());
        PwlFunction { pieces: out }
    }

    /// The pre-image of `target` under `f`: the smallest `t in dom(f)` with
    /// `f(t) == target`, used by `BestDurationRoute` to recover a route's
    /// departure time from its arrival-minimizing duration.
    pub fn pre_value(&self, target: f64) -> f64 {
        for p in &self.pieces {
            let (lo, hi) = (p.image.0.min(p.image.1), p.image.0.max(p.image.1));
            if geq(target, lo) && leq(target, hi) {
                let slope = p.slope();
                if slope.abs() < EPS {
                    return p.domain.0;
                }
                return p.domain.0 + (target - p.image.0) / slope;
            }
        }
        f64::NAN
    }
}

fn push_piece(out: &mut Vec<Piece>, a: f64, b: f64, va: f64, vb: f64) {
    if let Some(last) = out.last_mut() {
        if eq(last.domain.1, a) && eq(last.image.1, va) {
            last.domain.1 = b;
            last.image.1 = vb;
            return;
        }
    }
    out.push(Piece::new((a, b), (va, vb)));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_and_constant_roundtrip() {
        let id = PwlFunction::identity((0.0, 10.0));
        assert_eq!(id.value(4.0), 4.0);
        let c = PwlFunction::constant(7.0, (0.0, 10.0));
        assert_eq!(c.value(4.0), 7.0);
    }

    #[test]
    fn add_restricts_to_intersection() {
        let f = PwlFunction::identity((0.0, 10.0));
        let g = PwlFunction::constant(2.0, (5.0, 20.0));
        let sum = f.add(&g);
        assert_eq!(sum.domain(), Some((5.0, 10.0)));
        assert!(eq(sum.value(5.0), 7.0));
        assert!(eq(sum.value(10.0), 12.0));
    }

    #[test]
    fn compose_linear_through_linear() {
        // g(t) = 2t over [0,5] -> image [0,10]; f(s) = s + 1 over [0,10].
        let g = PwlFunction::from_pieces(vec![Piece::new((0.0, 5.0), (0.0, 10.0))]);
        let f = PwlFunction::from_pieces(vec![Piece::new((0.0, 10.0), (1.0, 11.0))]);
        let h = f.compose(&g);
        assert!(eq(h.value(0.0), 1.0));
        assert!(eq(h.value(5.0), 11.0));
    }

    #[test]
    fn inverse_swaps_domain_and_image() {
        let f = PwlFunction::from_pieces(vec![Piece::new((0.0, 5.0), (10.0, 20.0))]);
        let inv = f.inverse();
        assert!(eq(inv.value(10.0), 0.0));
        assert!(eq(inv.value(20.0), 5.0));
    }

    #[test]
    fn min_of_splits_at_crossing() {
        // f(t) = t over [0,10]; g(t) = 10 - t over [0,10]. They cross at t=5.
        let f = PwlFunction::identity((0.0, 10.0));
        let g = PwlFunction::from_pieces(vec![Piece::new((0.0, 10.0), (10.0, 0.0))]);
        let m = f.min_of(&g);
        assert!(eq(m.value(0.0), 0.0));
        assert!(eq(m.value(5.0), 5.0));
        assert!(eq(m.value(10.0), 0.0));
        assert!(m.max_image() <= 5.0 + EPS);
    }

    #[test]
    fn restrict_domain_truncates_pieces() {
        let mut f = PwlFunction::identity((0.0, 10.0));
        f.restrict_domain(2.0, 6.0);
        assert_eq!(f.domain(), Some((2.0, 6.0)));
    }

    #[test]
    fn pre_value_recovers_departure() {
        let f = PwlFunction::from_pieces(vec![Piece::new((0.0, 10.0), (5.0, 15.0))]);
        let t = f.pre_value(10.0);
        assert!(eq(t, 5.0));
    }
}
