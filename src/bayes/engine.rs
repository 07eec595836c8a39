// src/bayes/engine.rs
//
// Capability seam to the discrete belief-inference engine. The pipeline
// only ever needs this small surface, so any compliant exact-inference
// library can sit behind it.

use crate::errors::EngineError;

pub type NodeId = usize;

pub trait BeliefEngine {
    /// Resolve a node by name.
    fn find_node(&self, name: &str) -> Result<NodeId, EngineError>;

    /// Names of a node's outcomes, in definition order.
    fn outcome_names(&self, node: NodeId) -> Result<&[String], EngineError>;

    /// Position of an outcome within a node's outcome list.
    fn outcome_index(&self, node: NodeId, outcome: &str) -> Result<usize, EngineError>;

    /// Redefine a root node's marginal distribution (soft evidence).
    fn set_definition(&mut self, node: NodeId, probs: &[f64]) -> Result<(), EngineError>;

    /// Clamp a node to an observed outcome (hard evidence).
    fn set_hard_evidence(&mut self, node: NodeId, outcome: usize) -> Result<(), EngineError>;

    /// Remove any hard evidence from a node. No-op when none is set.
    fn clear_evidence(&mut self, node: NodeId) -> Result<(), EngineError>;

    /// Run exact inference under the current definitions and evidence.
    fn propagate(&mut self) -> Result<(), EngineError>;

    /// Posterior marginal of one outcome after the latest propagation.
    fn marginal(&self, node: NodeId, outcome: usize) -> Result<f64, EngineError>;
}
