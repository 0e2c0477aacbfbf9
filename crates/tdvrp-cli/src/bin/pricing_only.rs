//! The `pricing-only` binary (`main_pricing.cpp`): runs bidirectional
//! labeling directly against the profits given in the instance, with no
//! master LP and no branch-and-bound tree. Reads `experiment`, `instance`,
//! `solutions` as three sequential JSON values on stdin; writes
//! `{"Exact": ..., "Best solution": ...}` to stdout.

use std::io;

use serde::Serialize;

use tdvrp_cli::{init_tracing, read_json_values, BestSolution, ExperimentConfig, EXIT_FAILURE, EXIT_SUCCESS};
use tdvrp_core::VrpInstance;
use tdvrp_pricing::{BidirectionalLabeling, BlbStatus, PricingProblem};

/// Mirrors `BLBExecutionLog`'s fields relevant to a standalone pricing run.
#[derive(Debug, Clone, Serialize)]
struct PricingExecutionLog {
    status: Option<BlbStatusJson>,
    forward_processed: usize,
    backward_processed: usize,
}

#[derive(Debug, Clone, Copy, Serialize)]
enum BlbStatusJson {
    Finished,
    TimeLimitReached,
    SolutionLimitReached,
}

impl From<BlbStatus> for BlbStatusJson {
    fn from(s: BlbStatus) -> Self {
        match s {
            BlbStatus::Finished => BlbStatusJson::Finished,
            BlbStatus::TimeLimitReached => BlbStatusJson::TimeLimitReached,
            BlbStatus::SolutionLimitReached => BlbStatusJson::SolutionLimitReached,
        }
    }
}

fn path_profit(path: &[usize], profits: &[f64]) -> f64 {
    path.iter().map(|&v| profits[v]).sum()
}

fn run() -> anyhow::Result<()> {
    init_tracing();

    let values = read_json_values(io::stdin(), 3)?;
    let experiment: ExperimentConfig = serde_json::from_value(values[0].clone())?;
    let vrp = VrpInstance::from_json(&values[1])?;
    // `values[2]` ("solutions") is unused here too: a standalone pricing
    // run has no incumbent to compare against.

    let profits: Vec<f64> = serde_json::from_value(
        values[1]
            .get("profits")
            .ok_or_else(|| anyhow::anyhow!("instance missing `profits` field"))?
            .clone(),
    )?;

    let mut lbl = BidirectionalLabeling::new(vrp);
    lbl.config = experiment.bidirectional_config();
    let pricing_problem = PricingProblem::new(profits.clone());

    let (routes, stats) = lbl.run(pricing_problem);

    let best_solution = routes
        .iter()
        .min_by(|a, b| {
            let cost_a = a.duration - path_profit(&a.path, &profits);
            let cost_b = b.duration - path_profit(&b.path, &profits);
            cost_a.partial_cmp(&cost_b).unwrap_or(std::cmp::Ordering::Equal)
        })
        .map(|best| BestSolution { value: best.duration - path_profit(&best.path, &profits), routes: vec![best.clone()] })
        .unwrap_or_else(BestSolution::none);

    let log = PricingExecutionLog {
        status: stats.status.map(Into::into),
        forward_processed: stats.forward_processed,
        backward_processed: stats.backward_processed,
    };

    let output = serde_json::json!({
        "Exact": log,
        "Best solution": best_solution,
    });
    println!("{}", serde_json::to_string(&output)?);
    Ok(())
}

fn main() {
    match run() {
        Ok(()) => std::process::exit(EXIT_SUCCESS),
        Err(e) => {
            tracing::error!("{e:#}");
            std::process::exit(EXIT_FAILURE);
        }
    }
}
