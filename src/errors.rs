// src/errors.rs
//
// Typed failure taxonomy for the per-frame pipeline. Only DegenerateBlob is
// recoverable (the frame is dropped, never answered with a default);
// engine failures are escalated because no meaningful posterior exists
// without the network.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Zeroth moment <= 0: central-moment normalization is undefined.
    /// Recoverable by skipping the frame.
    #[error("degenerate blob: m00 = {m00}, cannot normalize central moments")]
    DegenerateBlob { m00: f64 },

    /// History queried before the first append. Contract violation, must
    /// not occur in normal operation.
    #[error("feature history queried before any append")]
    HistoryEmpty,

    /// An evidence input outside its expected domain that cannot be
    /// clamped (NaN/Inf). Indicates an upstream detector fault.
    #[error("feature {name} = {value} outside expected domain")]
    OutOfRangeFeature { name: &'static str, value: f64 },

    /// The belief engine failed; the decision pipeline cannot proceed.
    #[error(transparent)]
    Engine(#[from] EngineError),
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("reading network definition {path}: {source}")]
    Load {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("parsing network definition {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("node '{0}' not found in network")]
    NodeNotFound(String),

    #[error("outcome '{outcome}' not found on node '{node}'")]
    OutcomeNotFound { node: String, outcome: String },

    #[error("invalid definition on node '{node}': {reason}")]
    InvalidDefinition { node: String, reason: String },

    #[error("invalid network structure: {0}")]
    InvalidStructure(String),
}
