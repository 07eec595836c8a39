// src/bayes/network.rs
//
// Discrete belief network loaded from a versioned YAML artifact, with
// exact inference by full joint enumeration. The networks this pipeline
// runs are a handful of binary nodes, so enumeration is both exact and
// cheap; a junction-tree engine could replace this behind the same trait.

use crate::bayes::engine::{BeliefEngine, NodeId};
use crate::errors::EngineError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

const ROW_SUM_TOLERANCE: f64 = 1e-6;

/// On-disk network artifact. Topology and baseline CPTs are fixed here;
/// the pipeline only rewrites root-node definitions at runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkDefinition {
    pub name: String,
    #[serde(default)]
    pub version: String,
    pub nodes: Vec<NodeDefinition>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeDefinition {
    pub name: String,
    pub outcomes: Vec<String>,
    /// Parent node names. Parents must be declared before their children.
    #[serde(default)]
    pub parents: Vec<String>,
    /// One distribution over `outcomes` per parent-outcome combination,
    /// first parent varying slowest. Root nodes carry exactly one row.
    pub cpt: Vec<Vec<f64>>,
}

#[derive(Debug, Clone)]
struct Node {
    name: String,
    outcomes: Vec<String>,
    parents: Vec<NodeId>,
    cpt: Vec<Vec<f64>>,
    hard_evidence: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct DiscreteNetwork {
    nodes: Vec<Node>,
    /// Posterior marginals per node, filled by `propagate`.
    beliefs: Vec<Vec<f64>>,
    propagated: bool,
}

impl DiscreteNetwork {
    pub fn load(path: &str) -> Result<Self, EngineError> {
        let contents = std::fs::read_to_string(Path::new(path)).map_err(|source| {
            EngineError::Load {
                path: path.to_string(),
                source,
            }
        })?;
        let definition: NetworkDefinition =
            serde_yaml::from_str(&contents).map_err(|source| EngineError::Parse {
                path: path.to_string(),
                source,
            })?;
        debug!(
            network = %definition.name,
            version = %definition.version,
            nodes = definition.nodes.len(),
            "loaded network definition"
        );
        Self::from_definition(&definition)
    }

    pub fn from_definition(definition: &NetworkDefinition) -> Result<Self, EngineError> {
        let mut nodes: Vec<Node> = Vec::with_capacity(definition.nodes.len());

        for def in &definition.nodes {
            if def.outcomes.len() < 2 {
                return Err(EngineError::InvalidDefinition {
                    node: def.name.clone(),
                    reason: "fewer than two outcomes".into(),
                });
            }
            // Declaration order doubles as a topological order.
            let mut parents = Vec::with_capacity(def.parents.len());
            for parent_name in &def.parents {
                let id = nodes.iter().position(|n| &n.name == parent_name).ok_or_else(|| {
                    EngineError::InvalidStructure(format!(
                        "node '{}' lists parent '{}' which is not declared before it",
                        def.name, parent_name
                    ))
                })?;
                parents.push(id);
            }

            let expected_rows: usize = parents
                .iter()
                .map(|&p| nodes[p].outcomes.len())
                .product();
            if def.cpt.len() != expected_rows {
                return Err(EngineError::InvalidDefinition {
                    node: def.name.clone(),
                    reason: format!(
                        "expected {} CPT rows, found {}",
                        expected_rows,
                        def.cpt.len()
                    ),
                });
            }
            for row in &def.cpt {
                validate_distribution(&def.name, row, def.outcomes.len())?;
            }

            nodes.push(Node {
                name: def.name.clone(),
                outcomes: def.outcomes.clone(),
                parents,
                cpt: def.cpt.clone(),
                hard_evidence: None,
            });
        }

        if nodes.is_empty() {
            return Err(EngineError::InvalidStructure("network has no nodes".into()));
        }

        let beliefs = nodes.iter().map(|n| vec![0.0; n.outcomes.len()]).collect();
        Ok(Self {
            nodes,
            beliefs,
            propagated: false,
        })
    }

    fn node(&self, id: NodeId) -> Result<&Node, EngineError> {
        self.nodes
            .get(id)
            .ok_or_else(|| EngineError::NodeNotFound(format!("#{id}")))
    }

    /// CPT row index for a node under a full outcome assignment,
    /// first parent varying slowest.
    fn cpt_row(&self, node: &Node, assignment: &[usize]) -> usize {
        let mut row = 0;
        for &parent in &node.parents {
            row = row * self.nodes[parent].outcomes.len() + assignment[parent];
        }
        row
    }
}

fn validate_distribution(node: &str, probs: &[f64], outcomes: usize) -> Result<(), EngineError> {
    if probs.len() != outcomes {
        return Err(EngineError::InvalidDefinition {
            node: node.to_string(),
            reason: format!("row has {} entries for {} outcomes", probs.len(), outcomes),
        });
    }
    let mut sum = 0.0;
    for &p in probs {
        if !(0.0..=1.0).contains(&p) || !p.is_finite() {
            return Err(EngineError::InvalidDefinition {
                node: node.to_string(),
                reason: format!("probability {p} outside [0, 1]"),
            });
        }
        sum += p;
    }
    if (sum - 1.0).abs() > ROW_SUM_TOLERANCE {
        return Err(EngineError::InvalidDefinition {
            node: node.to_string(),
            reason: format!("row sums to {sum}"),
        });
    }
    Ok(())
}

impl BeliefEngine for DiscreteNetwork {
    fn find_node(&self, name: &str) -> Result<NodeId, EngineError> {
        self.nodes
            .iter()
            .position(|n| n.name == name)
            .ok_or_else(|| EngineError::NodeNotFound(name.to_string()))
    }

    fn outcome_names(&self, node: NodeId) -> Result<&[String], EngineError> {
        Ok(&self.node(node)?.outcomes)
    }

    fn outcome_index(&self, node: NodeId, outcome: &str) -> Result<usize, EngineError> {
        let n = self.node(node)?;
        n.outcomes
            .iter()
            .position(|o| o == outcome)
            .ok_or_else(|| EngineError::OutcomeNotFound {
                node: n.name.clone(),
                outcome: outcome.to_string(),
            })
    }

    fn set_definition(&mut self, node: NodeId, probs: &[f64]) -> Result<(), EngineError> {
        let n = self.node(node)?;
        if !n.parents.is_empty() {
            return Err(EngineError::InvalidDefinition {
                node: n.name.clone(),
                reason: "only root nodes may be redefined at runtime".into(),
            });
        }
        validate_distribution(&n.name, probs, n.outcomes.len())?;
        self.nodes[node].cpt = vec![probs.to_vec()];
        self.propagated = false;
        Ok(())
    }

    fn set_hard_evidence(&mut self, node: NodeId, outcome: usize) -> Result<(), EngineError> {
        let n = self.node(node)?;
        if outcome >= n.outcomes.len() {
            return Err(EngineError::OutcomeNotFound {
                node: n.name.clone(),
                outcome: format!("#{outcome}"),
            });
        }
        self.nodes[node].hard_evidence = Some(outcome);
        self.propagated = false;
        Ok(())
    }

    fn clear_evidence(&mut self, node: NodeId) -> Result<(), EngineError> {
        self.node(node)?;
        self.nodes[node].hard_evidence = None;
        self.propagated = false;
        Ok(())
    }

    fn propagate(&mut self) -> Result<(), EngineError> {
        let n = self.nodes.len();
        let mut marginals: Vec<Vec<f64>> = self
            .nodes
            .iter()
            .map(|node| vec![0.0; node.outcomes.len()])
            .collect();
        let mut total = 0.0;

        // Enumerate every full assignment; nodes are in topological order
        // so each factor's parents are already assigned.
        let mut assignment = vec![0usize; n];
        'outer: loop {
            let mut consistent = true;
            for (id, node) in self.nodes.iter().enumerate() {
                if let Some(observed) = node.hard_evidence {
                    if assignment[id] != observed {
                        consistent = false;
                        break;
                    }
                }
            }
            if consistent {
                let mut weight = 1.0;
                for (id, node) in self.nodes.iter().enumerate() {
                    // A clamped root contributes no factor: its prior
                    // cancels in normalization whenever it is nonzero, and
                    // a zero prior must not annihilate the observed state.
                    if node.hard_evidence.is_some() && node.parents.is_empty() {
                        continue;
                    }
                    let row = self.cpt_row(node, &assignment);
                    weight *= node.cpt[row][assignment[id]];
                }
                if weight > 0.0 {
                    total += weight;
                    for (id, &outcome) in assignment.iter().enumerate() {
                        marginals[id][outcome] += weight;
                    }
                }
            }

            // Odometer increment over outcome indices.
            for id in (0..n).rev() {
                assignment[id] += 1;
                if assignment[id] < self.nodes[id].outcomes.len() {
                    continue 'outer;
                }
                assignment[id] = 0;
            }
            break;
        }

        if total <= 0.0 {
            return Err(EngineError::InvalidStructure(
                "evidence has zero probability under the network".into(),
            ));
        }
        for row in &mut marginals {
            for p in row.iter_mut() {
                *p /= total;
            }
        }
        self.beliefs = marginals;
        self.propagated = true;
        Ok(())
    }

    fn marginal(&self, node: NodeId, outcome: usize) -> Result<f64, EngineError> {
        if !self.propagated {
            return Err(EngineError::InvalidStructure(
                "marginal queried before propagation".into(),
            ));
        }
        let n = self.node(node)?;
        if outcome >= n.outcomes.len() {
            return Err(EngineError::OutcomeNotFound {
                node: n.name.clone(),
                outcome: format!("#{outcome}"),
            });
        }
        Ok(self.beliefs[node][outcome])
    }
}

/// The production topology: two binary roots feeding two binary children,
/// baseline CPTs from the shipped artifact. Shared fixture for the test
/// modules across the crate.
#[cfg(test)]
pub(crate) fn flatness_network() -> DiscreteNetwork {
    let definition = NetworkDefinition {
        name: "flatness".into(),
        version: "test".into(),
        nodes: vec![
            NodeDefinition {
                name: "ellipse".into(),
                outcomes: vec!["HIGH".into(), "LOW".into()],
                parents: vec![],
                cpt: vec![vec![0.5, 0.5]],
            },
            NodeDefinition {
                name: "area".into(),
                outcomes: vec!["HIGH".into(), "LOW".into()],
                parents: vec![],
                cpt: vec![vec![0.5, 0.5]],
            },
            NodeDefinition {
                name: "flat".into(),
                outcomes: vec!["YES".into(), "NO".into()],
                parents: vec!["ellipse".into(), "area".into()],
                cpt: vec![
                    vec![0.95, 0.05],
                    vec![0.65, 0.35],
                    vec![0.60, 0.40],
                    vec![0.01, 0.99],
                ],
            },
            NodeDefinition {
                name: "nonflat".into(),
                outcomes: vec!["YES".into(), "NO".into()],
                parents: vec!["ellipse".into(), "area".into()],
                cpt: vec![
                    vec![0.05, 0.95],
                    vec![0.35, 0.65],
                    vec![0.40, 0.60],
                    vec![0.99, 0.01],
                ],
            },
        ],
    };
    DiscreteNetwork::from_definition(&definition).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOL: f64 = 1e-9;

    #[test]
    fn marginal_matches_hand_computation() {
        let mut net = flatness_network();
        let ellipse = net.find_node("ellipse").unwrap();
        let area = net.find_node("area").unwrap();
        let flat = net.find_node("flat").unwrap();

        net.set_definition(ellipse, &[0.75, 0.25]).unwrap();
        net.set_definition(area, &[1.0, 0.0]).unwrap();
        net.propagate().unwrap();

        // P(flat=YES) = 0.75*1*0.95 + 0.25*1*0.60
        let expected = 0.75 * 0.95 + 0.25 * 0.60;
        let yes = net.outcome_index(flat, "YES").unwrap();
        assert!((net.marginal(flat, yes).unwrap() - expected).abs() < TOL);
    }

    #[test]
    fn propagation_is_idempotent() {
        let mut net = flatness_network();
        let ellipse = net.find_node("ellipse").unwrap();
        let flat = net.find_node("flat").unwrap();
        net.set_definition(ellipse, &[0.6, 0.4]).unwrap();

        net.propagate().unwrap();
        let first = net.marginal(flat, 0).unwrap();
        net.propagate().unwrap();
        let second = net.marginal(flat, 0).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn hard_evidence_clamps_root_posterior() {
        let mut net = flatness_network();
        let ellipse = net.find_node("ellipse").unwrap();
        net.set_definition(ellipse, &[0.3, 0.7]).unwrap();
        net.set_hard_evidence(ellipse, 0).unwrap();
        net.propagate().unwrap();
        assert!((net.marginal(ellipse, 0).unwrap() - 1.0).abs() < TOL);

        net.clear_evidence(ellipse).unwrap();
        net.propagate().unwrap();
        assert!((net.marginal(ellipse, 0).unwrap() - 0.3).abs() < TOL);
    }

    #[test]
    fn clamp_overrides_zero_prior_on_root() {
        // A hard observation must win even when the current graded
        // definition assigns the observed outcome probability 0.
        let mut net = flatness_network();
        let ellipse = net.find_node("ellipse").unwrap();
        let area = net.find_node("area").unwrap();
        net.set_definition(ellipse, &[0.0, 1.0]).unwrap();
        net.set_definition(area, &[0.5, 0.5]).unwrap();
        net.set_hard_evidence(ellipse, 0).unwrap();
        net.propagate().unwrap();

        assert!((net.marginal(ellipse, 0).unwrap() - 1.0).abs() < TOL);
        let flat = net.find_node("flat").unwrap();
        // P(flat=YES | ellipse=HIGH) = 0.5*0.95 + 0.5*0.65
        assert!((net.marginal(flat, 0).unwrap() - 0.8).abs() < TOL);
    }

    #[test]
    fn root_marginals_reflect_definitions() {
        let mut net = flatness_network();
        let area = net.find_node("area").unwrap();
        net.set_definition(area, &[0.42, 0.58]).unwrap();
        net.propagate().unwrap();
        assert!((net.marginal(area, 0).unwrap() - 0.42).abs() < TOL);
    }

    #[test]
    fn child_definition_rejected() {
        let mut net = flatness_network();
        let flat = net.find_node("flat").unwrap();
        let err = net.set_definition(flat, &[0.5, 0.5]).unwrap_err();
        assert!(matches!(err, EngineError::InvalidDefinition { .. }));
    }

    #[test]
    fn unknown_node_and_outcome_error() {
        let net = flatness_network();
        assert!(matches!(
            net.find_node("dice"),
            Err(EngineError::NodeNotFound(_))
        ));
        let flat = net.find_node("flat").unwrap();
        assert!(matches!(
            net.outcome_index(flat, "MAYBE"),
            Err(EngineError::OutcomeNotFound { .. })
        ));
    }

    #[test]
    fn malformed_rows_rejected() {
        let definition = NetworkDefinition {
            name: "bad".into(),
            version: String::new(),
            nodes: vec![NodeDefinition {
                name: "root".into(),
                outcomes: vec!["A".into(), "B".into()],
                parents: vec![],
                cpt: vec![vec![0.7, 0.7]],
            }],
        };
        assert!(matches!(
            DiscreteNetwork::from_definition(&definition),
            Err(EngineError::InvalidDefinition { .. })
        ));
    }

    #[test]
    fn undeclared_parent_rejected() {
        let definition = NetworkDefinition {
            name: "bad".into(),
            version: String::new(),
            nodes: vec![NodeDefinition {
                name: "child".into(),
                outcomes: vec!["A".into(), "B".into()],
                parents: vec!["ghost".into()],
                cpt: vec![vec![0.5, 0.5], vec![0.5, 0.5]],
            }],
        };
        assert!(matches!(
            DiscreteNetwork::from_definition(&definition),
            Err(EngineError::InvalidStructure(_))
        ));
    }

    #[test]
    fn marginal_before_propagation_errors() {
        let net = flatness_network();
        assert!(net.marginal(0, 0).is_err());
    }
}
