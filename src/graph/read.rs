//! Read traversals keyed by case-insensitive business key.

use crate::schema::{NodeKey, NodeLabel, RelationType};
use crate::store::{Direction, GraphStore, Neighbor, NodeRecord, StoreResult};

/// Read-only view over a graph store.
pub struct GraphReader<'s, S: GraphStore + ?Sized> {
    store: &'s S,
}

impl<'s, S: GraphStore + ?Sized> GraphReader<'s, S> {
    pub fn new(store: &'s S) -> Self {
        Self { store }
    }

    /// One hop from `(label, key)`. A blank key matches nothing.
    fn hop(
        &self,
        label: NodeLabel,
        key: &str,
        relation: RelationType,
        direction: Direction,
    ) -> StoreResult<Vec<Neighbor>> {
        let Ok(start) = NodeKey::new(label, key) else {
            return Ok(vec![]);
        };
        let hops = self.store.neighbors(&start, relation, direction)?;
        tracing::debug!(
            start = %start,
            relation = %relation,
            matches = hops.len(),
            "traversal"
        );
        Ok(hops)
    }

    fn hop_nodes(
        &self,
        label: NodeLabel,
        key: &str,
        relation: RelationType,
        direction: Direction,
    ) -> StoreResult<Vec<NodeRecord>> {
        Ok(self
            .hop(label, key, relation, direction)?
            .into_iter()
            .map(|n| n.node)
            .collect())
    }

    // -- Patient ------------------------------------------------------------

    pub fn list_patients(&self) -> StoreResult<Vec<NodeRecord>> {
        self.store.nodes_with_label(NodeLabel::Patient)
    }

    pub fn get_patient(&self, name: &str) -> StoreResult<Option<NodeRecord>> {
        match NodeKey::new(NodeLabel::Patient, name) {
            Ok(key) => self.store.get_node(&key),
            Err(_) => Ok(None),
        }
    }

    /// Symptoms of a patient together with `severity` / `onset_days`.
    pub fn patient_symptoms(&self, name: &str) -> StoreResult<Vec<Neighbor>> {
        self.hop(
            NodeLabel::Patient,
            name,
            RelationType::HasSymptom,
            Direction::Outgoing,
        )
    }

    pub fn patient_risk_factors(&self, name: &str) -> StoreResult<Vec<NodeRecord>> {
        self.hop_nodes(
            NodeLabel::Patient,
            name,
            RelationType::HasRiskFactor,
            Direction::Outgoing,
        )
    }

    pub fn patient_visits(&self, name: &str) -> StoreResult<Vec<NodeRecord>> {
        self.hop_nodes(
            NodeLabel::Patient,
            name,
            RelationType::HasVisit,
            Direction::Outgoing,
        )
    }

    // -- Visit --------------------------------------------------------------

    pub fn visit_observations(&self, visit_id: &str) -> StoreResult<Vec<NodeRecord>> {
        self.hop_nodes(
            NodeLabel::Visit,
            visit_id,
            RelationType::HasObservation,
            Direction::Outgoing,
        )
    }

    pub fn visit_tests(&self, visit_id: &str) -> StoreResult<Vec<NodeRecord>> {
        self.hop_nodes(
            NodeLabel::Visit,
            visit_id,
            RelationType::HasTest,
            Direction::Outgoing,
        )
    }

    // -- Symptom / Disease / Treatment --------------------------------------

    pub fn diseases_for_symptom(&self, symptom: &str) -> StoreResult<Vec<NodeRecord>> {
        self.hop_nodes(
            NodeLabel::Symptom,
            symptom,
            RelationType::Indicates,
            Direction::Outgoing,
        )
    }

    pub fn symptoms_for_disease(&self, disease: &str) -> StoreResult<Vec<NodeRecord>> {
        self.hop_nodes(
            NodeLabel::Disease,
            disease,
            RelationType::Indicates,
            Direction::Incoming,
        )
    }

    pub fn treatments_for_disease(&self, disease: &str) -> StoreResult<Vec<NodeRecord>> {
        self.hop_nodes(
            NodeLabel::Disease,
            disease,
            RelationType::TreatedBy,
            Direction::Outgoing,
        )
    }

    // -- Test / Observation -------------------------------------------------

    pub fn diseases_for_test(&self, test: &str) -> StoreResult<Vec<NodeRecord>> {
        self.hop_nodes(
            NodeLabel::Test,
            test,
            RelationType::UsedForDiagnosisOf,
            Direction::Outgoing,
        )
    }

    pub fn tests_for_disease(&self, disease: &str) -> StoreResult<Vec<NodeRecord>> {
        self.hop_nodes(
            NodeLabel::Disease,
            disease,
            RelationType::UsedForDiagnosisOf,
            Direction::Incoming,
        )
    }

    pub fn diseases_for_observation(&self, observation: &str) -> StoreResult<Vec<NodeRecord>> {
        self.hop_nodes(
            NodeLabel::Observation,
            observation,
            RelationType::Supports,
            Direction::Outgoing,
        )
    }

    pub fn observations_for_disease(&self, disease: &str) -> StoreResult<Vec<NodeRecord>> {
        self.hop_nodes(
            NodeLabel::Disease,
            disease,
            RelationType::Supports,
            Direction::Incoming,
        )
    }

    // -- Search -------------------------------------------------------------

    pub fn search(&self, term: &str) -> StoreResult<Vec<NodeRecord>> {
        self.store.search(term)
    }
}
