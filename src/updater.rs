// src/updater.rs
//
// Writes each frame's evidence into the network's input nodes and runs
// propagation. Stale hard evidence is always cleared first so a previous
// frame's clamp can never silently dominate a graded update.

use crate::bayes::{BeliefEngine, NodeId};
use crate::errors::EngineError;
use crate::types::Evidence;
use tracing::{debug, trace};

pub const NODE_ELLIPSE: &str = "ellipse";
pub const NODE_AREA: &str = "area";
pub const OUTCOME_HIGH: &str = "HIGH";

/// Soft redefinition every frame, or a hard clamp on the ellipse node once
/// its evidence crosses a confidence threshold. Explicit policy rather
/// than divergent code paths.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EvidencePolicy {
    SoftOnly,
    ThresholdClamped { threshold: f64 },
}

pub struct BeliefUpdater {
    policy: EvidencePolicy,
    ellipse: NodeId,
    area: NodeId,
    ellipse_high: usize,
    /// Whether the latest update clamped the ellipse node.
    clamped: bool,
}

impl BeliefUpdater {
    pub fn new<E: BeliefEngine>(engine: &E, policy: EvidencePolicy) -> Result<Self, EngineError> {
        let ellipse = engine.find_node(NODE_ELLIPSE)?;
        let area = engine.find_node(NODE_AREA)?;
        let ellipse_high = engine.outcome_index(ellipse, OUTCOME_HIGH)?;
        engine.outcome_index(area, OUTCOME_HIGH)?;
        Ok(Self {
            policy,
            ellipse,
            area,
            ellipse_high,
            clamped: false,
        })
    }

    /// Inject the frame's evidence and propagate. Each input node's HIGH
    /// marginal becomes the evidence value, its complement 1 - evidence.
    pub fn update<E: BeliefEngine>(
        &mut self,
        engine: &mut E,
        evidence: &Evidence,
    ) -> Result<(), EngineError> {
        engine.clear_evidence(self.ellipse)?;
        engine.clear_evidence(self.area)?;

        engine.set_definition(self.area, &[evidence.area, 1.0 - evidence.area])?;

        self.clamped = match self.policy {
            EvidencePolicy::ThresholdClamped { threshold } if evidence.flatness > threshold => {
                // Hard observation replaces the soft write for this node
                // on this frame.
                engine.set_hard_evidence(self.ellipse, self.ellipse_high)?;
                debug!(
                    flatness = evidence.flatness,
                    threshold, "flatness evidence above threshold, clamping ellipse node"
                );
                true
            }
            _ => {
                engine
                    .set_definition(self.ellipse, &[evidence.flatness, 1.0 - evidence.flatness])?;
                false
            }
        };

        trace!(
            flatness = evidence.flatness,
            area = evidence.area,
            clamped = self.clamped,
            "propagating beliefs"
        );
        engine.propagate()
    }

    pub fn last_update_clamped(&self) -> bool {
        self.clamped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bayes::network::flatness_network;

    const TOL: f64 = 1e-9;

    #[test]
    fn soft_update_sets_input_marginals() {
        let mut net = flatness_network();
        let mut updater = BeliefUpdater::new(&net, EvidencePolicy::SoftOnly).unwrap();
        let evidence = Evidence {
            flatness: 0.75,
            area: 0.2,
        };
        updater.update(&mut net, &evidence).unwrap();

        let ellipse = net.find_node(NODE_ELLIPSE).unwrap();
        let area = net.find_node(NODE_AREA).unwrap();
        assert!((net.marginal(ellipse, 0).unwrap() - 0.75).abs() < TOL);
        assert!((net.marginal(area, 0).unwrap() - 0.2).abs() < TOL);
        assert!(!updater.last_update_clamped());
    }

    #[test]
    fn threshold_clamp_forces_high_outcome() {
        let mut net = flatness_network();
        let mut updater =
            BeliefUpdater::new(&net, EvidencePolicy::ThresholdClamped { threshold: 0.9 }).unwrap();
        let evidence = Evidence {
            flatness: 0.95,
            area: 0.5,
        };
        updater.update(&mut net, &evidence).unwrap();

        let ellipse = net.find_node(NODE_ELLIPSE).unwrap();
        assert!((net.marginal(ellipse, 0).unwrap() - 1.0).abs() < TOL);
        assert!(updater.last_update_clamped());
    }

    #[test]
    fn clamp_is_cleared_on_next_soft_frame() {
        let mut net = flatness_network();
        let mut updater =
            BeliefUpdater::new(&net, EvidencePolicy::ThresholdClamped { threshold: 0.9 }).unwrap();

        updater
            .update(
                &mut net,
                &Evidence {
                    flatness: 0.95,
                    area: 1.0,
                },
            )
            .unwrap();
        assert!(updater.last_update_clamped());

        // Next frame drops below the threshold: the old observation must
        // not survive into the graded update.
        updater
            .update(
                &mut net,
                &Evidence {
                    flatness: 0.3,
                    area: 1.0,
                },
            )
            .unwrap();
        let ellipse = net.find_node(NODE_ELLIPSE).unwrap();
        assert!((net.marginal(ellipse, 0).unwrap() - 0.3).abs() < TOL);
        assert!(!updater.last_update_clamped());
    }

    #[test]
    fn clamp_after_zero_evidence_frame_propagates() {
        // A frame with zero flatness evidence leaves the ellipse node
        // defined as [0, 1]; the next frame's clamp must still propagate
        // instead of contradicting that stale definition.
        let mut net = flatness_network();
        let mut updater =
            BeliefUpdater::new(&net, EvidencePolicy::ThresholdClamped { threshold: 0.9 }).unwrap();

        updater
            .update(
                &mut net,
                &Evidence {
                    flatness: 0.0,
                    area: 1.0,
                },
            )
            .unwrap();
        assert!(!updater.last_update_clamped());

        updater
            .update(
                &mut net,
                &Evidence {
                    flatness: 0.95,
                    area: 1.0,
                },
            )
            .unwrap();
        assert!(updater.last_update_clamped());
        let ellipse = net.find_node(NODE_ELLIPSE).unwrap();
        assert!((net.marginal(ellipse, 0).unwrap() - 1.0).abs() < TOL);
    }

    #[test]
    fn soft_only_policy_never_clamps() {
        let mut net = flatness_network();
        let mut updater = BeliefUpdater::new(&net, EvidencePolicy::SoftOnly).unwrap();
        updater
            .update(
                &mut net,
                &Evidence {
                    flatness: 0.99,
                    area: 1.0,
                },
            )
            .unwrap();
        let ellipse = net.find_node(NODE_ELLIPSE).unwrap();
        assert!((net.marginal(ellipse, 0).unwrap() - 0.99).abs() < TOL);
        assert!(!updater.last_update_clamped());
    }

    #[test]
    fn zero_evidence_is_valid() {
        let mut net = flatness_network();
        let mut updater = BeliefUpdater::new(&net, EvidencePolicy::SoftOnly).unwrap();
        updater
            .update(
                &mut net,
                &Evidence {
                    flatness: 0.0,
                    area: 0.0,
                },
            )
            .unwrap();
        let flat = net.find_node("flat").unwrap();
        // With both inputs LOW the flat CPT bottoms out at 0.01.
        assert!((net.marginal(flat, 0).unwrap() - 0.01).abs() < TOL);
    }
}
