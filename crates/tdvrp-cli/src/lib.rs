//! The experiment-config/instance JSON protocol (spec.md §6) and the shared
//! plumbing both binaries use to read it and report a result.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use tdvrp_bcp::BcpConfig;
use tdvrp_core::Route;
use tdvrp_pricing::{BidirectionalConfig, MonodirectionalConfig};

/// The experiment-config JSON object (spec.md §6's key table), deserialized
/// with one `#[serde(default = ...)]` per documented default so a partial
/// or empty `{}` config still resolves to the system's defaults —
/// `main_bp.cpp`/`main_pricing.cpp`'s `value_or_default` calls, one per
/// field.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ExperimentConfig {
    pub time_limit: f64,
    pub cut_limit: usize,
    pub node_limit: Option<usize>,
    pub partial: bool,
    pub limited_extension: bool,
    pub lazy_extension: bool,
    pub unreachable_strengthened: bool,
    pub sort_by_cost: bool,
    pub symmetric: bool,
    pub iterative_merge: bool,
    pub exact_labeling: bool,
    pub correcting: bool,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        ExperimentConfig {
            time_limit: 7200.0,
            cut_limit: 100,
            node_limit: None,
            partial: true,
            limited_extension: true,
            lazy_extension: true,
            unreachable_strengthened: true,
            sort_by_cost: true,
            symmetric: false,
            iterative_merge: true,
            exact_labeling: true,
            correcting: false,
        }
    }
}

impl ExperimentConfig {
    fn monodirectional_config(&self) -> MonodirectionalConfig {
        MonodirectionalConfig {
            partial: self.partial,
            limited_extension: self.limited_extension,
            lazy_extension: self.lazy_extension,
            unreachable_strengthened: self.unreachable_strengthened,
            sort_by_cost: self.sort_by_cost,
            // `exact_labeling = false` relaxes the elementarity/cost checks
            // in dominance, trading exactness for a cheaper (ng-route-like)
            // bound; `exact_labeling = true` (the default) keeps both
            // checks exact.
            relax_elementary_check: !self.exact_labeling,
            relax_cost_check: !self.exact_labeling,
            correcting: self.correcting,
            ..MonodirectionalConfig::default()
        }
    }

    pub fn bidirectional_config(&self) -> BidirectionalConfig {
        BidirectionalConfig {
            time_limit: Duration::from_secs_f64(self.time_limit),
            symmetric: self.symmetric,
            closing_state: !self.iterative_merge,
            mono: self.monodirectional_config(),
            ..BidirectionalConfig::default()
        }
    }

    pub fn bcp_config(&self) -> BcpConfig {
        BcpConfig {
            time_limit: Duration::from_secs_f64(self.time_limit),
            cut_limit: self.cut_limit,
            node_limit: self.node_limit.unwrap_or(usize::MAX),
            bidirectional: self.bidirectional_config(),
            ..BcpConfig::default()
        }
    }
}

/// The `"Best solution"` field of the output JSON: objective value and the
/// routes that attain it. `networks2019`'s `goc::VRPSolution`.
#[derive(Debug, Clone, Serialize)]
pub struct BestSolution {
    pub value: f64,
    pub routes: Vec<Route>,
}

impl BestSolution {
    pub fn none() -> Self {
        BestSolution { value: f64::INFINITY, routes: Vec::new() }
    }
}

/// Reads whitespace/newline-separated JSON values off a reader the way
/// `cin >> json1 >> json2 >> ...` does in the original — one call per
/// expected value. `main_bp.cpp`/`main_pricing.cpp` both read `experiment`,
/// `instance`, and (unused here) `solutions` this way.
pub fn read_json_values(reader: impl std::io::Read, count: usize) -> anyhow::Result<Vec<serde_json::Value>> {
    let mut stream = serde_json::Deserializer::from_reader(reader).into_iter::<serde_json::Value>();
    let mut values = Vec::with_capacity(count);
    for _ in 0..count {
        match stream.next() {
            Some(Ok(v)) => values.push(v),
            Some(Err(e)) => return Err(anyhow::anyhow!("malformed JSON on stdin: {e}")),
            None => return Err(anyhow::anyhow!("expected {count} JSON values on stdin, got {}", values.len())),
        }
    }
    Ok(values)
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .try_init();
}

pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_OUT_OF_MEMORY: i32 = 3;
pub const EXIT_FAILURE: i32 = 1;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_json_object_resolves_to_documented_defaults() {
        let config: ExperimentConfig = serde_json::from_value(serde_json::json!({})).unwrap();
        assert_eq!(config.time_limit, 7200.0);
        assert_eq!(config.cut_limit, 100);
        assert!(config.node_limit.is_none());
        assert!(config.partial);
    }

    #[test]
    fn partial_override_keeps_other_defaults() {
        let config: ExperimentConfig = serde_json::from_value(serde_json::json!({"cut_limit": 0, "symmetric": true})).unwrap();
        assert_eq!(config.cut_limit, 0);
        assert!(config.symmetric);
        assert_eq!(config.time_limit, 7200.0);
    }

    #[test]
    fn bcp_config_carries_time_limit_into_bidirectional_config() {
        let config = ExperimentConfig { time_limit: 42.0, ..ExperimentConfig::default() };
        let bcp = config.bcp_config();
        assert_eq!(bcp.time_limit.as_secs_f64(), 42.0);
        assert_eq!(bcp.bidirectional.time_limit.as_secs_f64(), 42.0);
    }

    #[test]
    fn read_json_values_reads_exactly_the_requested_count() {
        let input = b"{\"a\":1} {\"b\":2} {\"c\":3}";
        let values = read_json_values(&input[..], 3).unwrap();
        assert_eq!(values.len(), 3);
        assert_eq!(values[0]["a"], 1);
    }

    #[test]
    fn read_json_values_errors_on_too_few_values() {
        let input = b"{\"a\":1}";
        assert!(read_json_values(&input[..], 2).is_err());
    }
}
