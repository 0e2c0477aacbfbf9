use serde::{Deserialize, Serialize};

/// A complete `o -> ... -> d` route with its minimum duration and the
/// departure time from `o` that achieves it.
///
/// `networks2019:code/include/...` `goc::Route` (path, t0, duration).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub path: Vec<usize>,
    pub t0: f64,
    pub duration: f64,
}

impl Route {
    pub fn infeasible(path: Vec<usize>) -> Self {
        Route { path, t0: 0.0, duration: f64::INFINITY }
    }

    pub fn is_feasible(&self) -> bool {
        self.duration.is_finite()
    }
}
