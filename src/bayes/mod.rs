// src/bayes/mod.rs

pub mod engine;
pub mod network;

pub use engine::{BeliefEngine, NodeId};
pub use network::{DiscreteNetwork, NetworkDefinition};
