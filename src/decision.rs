// src/decision.rs
//
// Reads back posterior marginals after propagation and assembles the
// classification vector in the fixed node order [flat, nonflat] so
// downstream consumers can index positionally.

use crate::bayes::{BeliefEngine, NodeId};
use crate::errors::EngineError;
use crate::types::Classification;
use crate::updater::{NODE_AREA, NODE_ELLIPSE, OUTCOME_HIGH};
use tracing::debug;

pub const NODE_FLAT: &str = "flat";
pub const NODE_NONFLAT: &str = "nonflat";
pub const OUTCOME_YES: &str = "YES";

pub struct DecisionEmitter {
    flat: NodeId,
    nonflat: NodeId,
    flat_yes: usize,
    nonflat_yes: usize,
    ellipse: NodeId,
    area: NodeId,
    ellipse_high: usize,
    area_high: usize,
}

impl DecisionEmitter {
    pub fn new<E: BeliefEngine>(engine: &E) -> Result<Self, EngineError> {
        let flat = engine.find_node(NODE_FLAT)?;
        let nonflat = engine.find_node(NODE_NONFLAT)?;
        let ellipse = engine.find_node(NODE_ELLIPSE)?;
        let area = engine.find_node(NODE_AREA)?;
        debug!(
            flat_outcomes = ?engine.outcome_names(flat)?,
            nonflat_outcomes = ?engine.outcome_names(nonflat)?,
            "decision nodes resolved"
        );
        Ok(Self {
            flat,
            nonflat,
            // Outcome positions are looked up by name once; the artifact
            // is free to reorder outcomes between versions.
            flat_yes: engine.outcome_index(flat, OUTCOME_YES)?,
            nonflat_yes: engine.outcome_index(nonflat, OUTCOME_YES)?,
            ellipse,
            area,
            ellipse_high: engine.outcome_index(ellipse, OUTCOME_HIGH)?,
            area_high: engine.outcome_index(area, OUTCOME_HIGH)?,
        })
    }

    /// Posterior classification for the frame. Also logs the input nodes'
    /// HIGH marginals for observability; those never enter the emitted
    /// vector.
    pub fn emit<E: BeliefEngine>(&self, engine: &E) -> Result<Classification, EngineError> {
        let flat = engine.marginal(self.flat, self.flat_yes)?;
        let nonflat = engine.marginal(self.nonflat, self.nonflat_yes)?;

        let ellipse_high = engine.marginal(self.ellipse, self.ellipse_high)?;
        let area_high = engine.marginal(self.area, self.area_high)?;
        debug!(
            ellipse_high,
            area_high, flat, nonflat, "posterior marginals"
        );

        Ok(Classification {
            flat,
            nonflat,
            probabilities: vec![flat, nonflat],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bayes::network::flatness_network;
    use crate::bayes::BeliefEngine;

    const TOL: f64 = 1e-9;

    #[test]
    fn emits_fixed_node_order() {
        let mut net = flatness_network();
        let emitter = DecisionEmitter::new(&net).unwrap();

        let ellipse = net.find_node(NODE_ELLIPSE).unwrap();
        let area = net.find_node(NODE_AREA).unwrap();
        net.set_definition(ellipse, &[1.0, 0.0]).unwrap();
        net.set_definition(area, &[1.0, 0.0]).unwrap();
        net.propagate().unwrap();

        let c = emitter.emit(&net).unwrap();
        assert!((c.flat - 0.95).abs() < TOL);
        assert!((c.nonflat - 0.05).abs() < TOL);
        assert_eq!(c.probabilities, vec![c.flat, c.nonflat]);
    }

    #[test]
    fn both_inputs_low_favors_nonflat() {
        let mut net = flatness_network();
        let emitter = DecisionEmitter::new(&net).unwrap();

        let ellipse = net.find_node(NODE_ELLIPSE).unwrap();
        let area = net.find_node(NODE_AREA).unwrap();
        net.set_definition(ellipse, &[0.0, 1.0]).unwrap();
        net.set_definition(area, &[0.0, 1.0]).unwrap();
        net.propagate().unwrap();

        let c = emitter.emit(&net).unwrap();
        assert!((c.flat - 0.01).abs() < TOL);
        assert!((c.nonflat - 0.99).abs() < TOL);
    }

    #[test]
    fn missing_output_node_is_an_engine_error() {
        // A network without the decision nodes must fail at construction,
        // not at first emit.
        let definition = crate::bayes::NetworkDefinition {
            name: "truncated".into(),
            version: String::new(),
            nodes: vec![crate::bayes::network::NodeDefinition {
                name: "ellipse".into(),
                outcomes: vec!["HIGH".into(), "LOW".into()],
                parents: vec![],
                cpt: vec![vec![0.5, 0.5]],
            }],
        };
        let net = crate::bayes::DiscreteNetwork::from_definition(&definition).unwrap();
        assert!(DecisionEmitter::new(&net).is_err());
    }
}
