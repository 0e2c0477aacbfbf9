//! The `bcp-solver` binary (`main_bp.cpp`): branch-cut-and-price to exact
//! optimality. Reads `experiment`, `instance`, and `solutions` as three
//! sequential JSON values on stdin; writes `{"Exact": ..., "Best
//! solution": ...}` to stdout.

use std::io;

use tdvrp_bcp::{BcpDriver, HighsMaster};
use tdvrp_cli::{init_tracing, read_json_values, BestSolution, ExperimentConfig, EXIT_FAILURE, EXIT_SUCCESS};
use tdvrp_core::VrpInstance;

fn run() -> anyhow::Result<()> {
    init_tracing();

    let values = read_json_values(io::stdin(), 3)?;
    let experiment: ExperimentConfig = serde_json::from_value(values[0].clone())?;
    let vrp = VrpInstance::from_json(&values[1])?;
    // `values[2]` ("solutions": warm-start routes for a previous run) is
    // accepted for protocol compatibility but unused: the root is always
    // seeded from scratch, matching `main_bp.cpp`'s unconditional
    // singleton-route seeding regardless of what `solutions` holds.

    let o = vrp.o;
    let d = vrp.d;
    let mut driver = BcpDriver::new(vrp.clone(), HighsMaster, experiment.bcp_config());
    for i in 0..vrp.vertex_count() {
        if i == o || i == d {
            continue;
        }
        driver.seed_route(vrp.best_duration_route(&[o, i, d]));
    }

    let solution = driver.solve();
    let best_solution = if solution.routes.is_empty() {
        BestSolution::none()
    } else {
        BestSolution { value: solution.objective, routes: solution.routes.clone() }
    };

    let output = serde_json::json!({
        "Exact": solution.log,
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
