//! Partial credit propagation between related concepts.
//!
//! The graph is static configuration. Propagation runs exactly one hop from
//! the originating update, never transitively, so cycles in the configured
//! edges are harmless.

use std::collections::HashMap;

use crate::akt::config::TransferParams;

pub struct TransferGraph {
    factor: f64,
    adjacency: HashMap<String, Vec<(String, f64)>>,
}

impl TransferGraph {
    pub fn new(params: &TransferParams) -> Self {
        let mut adjacency: HashMap<String, Vec<(String, f64)>> = HashMap::new();
        for edge in &params.edges {
            if edge.from == edge.to {
                continue;
            }
            let weight = edge.weight.clamp(0.0, 1.0);
            adjacency
                .entry(edge.from.clone())
                .or_default()
                .push((edge.to.clone(), weight));
        }
        Self {
            factor: params.transfer_factor.clamp(0.0, 1.0),
            adjacency,
        }
    }

    /// Concepts one hop away from the originating concept.
    pub fn neighbors(&self, concept_id: &str) -> &[(String, f64)] {
        self.adjacency
            .get(concept_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Damped mastery delta to apply to a neighbor.
    pub fn propagated_delta(&self, edge_weight: f64, origin_delta: f64) -> f64 {
        edge_weight.clamp(0.0, 1.0) * origin_delta * self.factor
    }

    pub fn is_empty(&self) -> bool {
        self.adjacency.is_empty()
    }
}
