//! Partial PWL dominance (spec.md §4.1). A label `m` dominates label `l`'s
//! duration function `Delta` at time `t` when
//! `m.duration(t) + theta <= Delta(t)`, where `theta` folds in the
//! profit/cut-cost gap between the two labels. [`dominate_pieces`]
//! truncates `Delta` down to the sub-intervals where this does *not* hold
//! (the surviving, non-dominated portion); [`is_always_dominated`] checks
//! whether it holds across the whole of `Delta`'s domain.
//!
//! No header for `PWLDominationFunction` survived retrieval; this is
//! reconstructed from every call site in
//! `networks2019:code/src/labeling/monodirectional_labeling.cpp`
//! (`DominationStep`, `CorrectionStep`), which fixes the signature and the
//! truncate-vs-reject-everywhere semantics precisely.

use tdvrp_core::pwl::{self, EPS};
use tdvrp_core::{Piece, PwlFunction};

/// `Delta.IsAlwaysDominated(m_duration, theta)`: true iff `dom(m) ⊇ dom(delta)`
/// and `m(t) + theta <= delta(t)` for every `t` in `dom(delta)`.
pub fn is_always_dominated(delta: &PwlFunction, m_duration: &PwlFunction, theta: f64) -> bool {
    let Some((dlo, dhi)) = delta.domain() else { return true };
    let Some((mlo, mhi)) = m_duration.domain() else { return false };
    if pwl::gt(mlo, dlo) || pwl::lt(mhi, dhi) {
        return false;
    }
    for (a, b) in breakpoint_segments(delta, m_duration, dlo, dhi) {
        let da = delta.value(a) - m_duration.value(a) - theta;
        let db = delta.value(b) - m_duration.value(b) - theta;
        if da < -EPS || db < -EPS {
            return false;
        }
    }
    true
}

/// `Delta.DominatePieces(m_duration, theta)`: truncates `delta` in place to
/// the sub-intervals not dominated by `m_duration + theta`. Returns `true`
/// if `delta` became empty (i.e. `m_duration` dominates all of it), which
/// is the signal callers use to stop considering further candidates.
pub fn dominate_pieces(delta: &mut PwlFunction, m_duration: &PwlFunction, theta: f64) -> bool {
    let Some((dlo, dhi)) = delta.domain() else { return true };
    let Some((mlo, mhi)) = m_duration.domain() else { return false };
    let lo = dlo.max(mlo);
    let hi = dhi.min(mhi);
    if pwl::geq(lo, hi) {
        return false;
    }

    let mut survivors: Vec<Piece> = Vec::new();
    if pwl::lt(dlo, lo) {
        survivors.extend(clip_pieces(delta, dlo, lo));
    }

    for (a, b) in breakpoint_segments(delta, m_duration, lo, hi) {
        let da = delta.value(a) - m_duration.value(a) - theta;
        let db = delta.value(b) - m_duration.value(b) - theta;
        let a_dominated = da >= -EPS;
        let b_dominated = db >= -EPS;
        if a_dominated && b_dominated {
            continue;
        }
        if !a_dominated && !b_dominated {
            survivors.push(Piece::new((a, b), (delta.value(a), delta.value(b))));
            continue;
        }
        // Sign changes within this (affine) sub-segment: split at the crossing.
        let t_cross = if (da - db).abs() > EPS { a + (b - a) * da / (da - db) } else { a };
        let t_cross = t_cross.clamp(a, b);
        if !a_dominated {
            survivors.push(Piece::new((a, t_cross), (delta.value(a), delta.value(t_cross))));
        }
        if !b_dominated {
            survivors.push(Piece::new((t_cross, b), (delta.value(t_cross), delta.value(b))));
        }
    }

    if pwl::lt(hi, dhi) {
        survivors.extend(clip_pieces(delta, hi, dhi));
    }

    *delta = PwlFunction::from_pieces(survivors);
    delta.is_empty()
}

fn clip_pieces(f: &PwlFunction, lo: f64, hi: f64) -> Vec<Piece> {
    let mut clone = f.clone();
    clone.restrict_domain(lo, hi);
    clone.pieces().to_vec()
}

/// Common refinement of `f`'s and `g`'s breakpoints within `[lo, hi]`, as
/// consecutive `(a, b)` segments; each segment is affine in both functions.
fn breakpoint_segments(f: &PwlFunction, g: &PwlFunction, lo: f64, hi: f64) -> Vec<(f64, f64)> {
    let mut bps = vec![lo, hi];
    for p in f.pieces() {
        if p.domain.0 > lo && p.domain.0 < hi {
            bps.push(p.domain.0);
        }
    }
    for p in g.pieces() {
        if p.domain.0 > lo && p.domain.0 < hi {
            bps.push(p.domain.0);
        }
    }
    bps.sort_by(|a, b| a.partial_cmp(b).unwrap());
    bps.dedup_by(|a, b| pwl::eq(*a, *b));
    bps.windows(2).filter(|w| !pwl::eq(w[0], w[1])).map(|w| (w[0], w[1])).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_functions_are_always_dominated_at_theta_zero() {
        let f = PwlFunction::identity((0.0, 10.0));
        assert!(is_always_dominated(&f, &f, 0.0));
    }

    #[test]
    fn strictly_worse_duration_is_never_dominated() {
        let delta = PwlFunction::constant(5.0, (0.0, 10.0));
        let m = PwlFunction::constant(100.0, (0.0, 10.0));
        assert!(!is_always_dominated(&delta, &m, 0.0));
        let mut d = delta.clone();
        let became_empty = dominate_pieces(&mut d, &m, 0.0);
        assert!(!became_empty);
        assert!(pwl::eq(d.domain().unwrap().0, 0.0));
    }

    #[test]
    fn crossing_functions_split_and_partially_dominate() {
        // delta(t) = t, m(t) = 5 over [0,10]: m dominates where t >= 5.
        let delta = PwlFunction::identity((0.0, 10.0));
        let m = PwlFunction::constant(5.0, (0.0, 10.0));
        let mut d = delta.clone();
        let became_empty = dominate_pieces(&mut d, &m, 0.0);
        assert!(!became_empty);
        // Surviving domain should be the left part where delta < m.
        assert!(pwl::leq(d.domain().unwrap().1, 5.0 + EPS));
    }

    #[test]
    fn full_domination_empties_delta() {
        let delta = PwlFunction::constant(5.0, (0.0, 10.0));
        let m = PwlFunction::constant(1.0, (0.0, 10.0));
        let mut d = delta.clone();
        let became_empty = dominate_pieces(&mut d, &m, 0.0);
        assert!(became_empty);
        assert!(d.is_empty());
    }
}
