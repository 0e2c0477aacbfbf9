use thiserror::Error;

/// Errors raised while parsing a TDVRPTW instance (spec.md §6's
/// "Instance file (JSON)"). Malformed input is the only failure mode this
/// crate surfaces as a `Result` — everything downstream (extension,
/// domination) rejects silently per spec.md §7.
#[derive(Debug, Error)]
pub enum InstanceError {
    #[error("missing required instance field `{0}`")]
    MissingField(&'static str),

    #[error("digraph vertex_count ({vertex_count}) does not match the size of field `{field}` ({actual})")]
    SizeMismatch { vertex_count: usize, field: &'static str, actual: usize },

    #[error("start_depot/end_depot ({o}, {d}) out of range for a {vertex_count}-vertex digraph")]
    DepotOutOfRange { o: usize, d: usize, vertex_count: usize },

    #[error("arc ({tail}, {head}) is marked present in `digraph.arcs` but has no entry in `travel_times`")]
    MissingTravelTime { tail: usize, head: usize },

    #[error("travel time function for arc ({tail}, {head}) is empty or has non-increasing-arrival pieces")]
    InvalidTravelTime { tail: usize, head: usize },

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
