//! Idempotent graph population.
//!
//! Every attach operation upserts both endpoints and then the relationship,
//! so calling it twice leaves the graph as calling it once. Relationship
//! attributes take the latest call's values.

use crate::error::MedResult;
use crate::schema::{EdgeSpec, NodeLabel, NodeSpec, PropValue, RelationType};
use crate::store::{EdgeRecord, GraphStore, NodeRecord};

/// Write adapter over a graph store.
pub struct GraphWriter<'s, S: GraphStore + ?Sized> {
    store: &'s S,
}

impl<'s, S: GraphStore + ?Sized> GraphWriter<'s, S> {
    pub fn new(store: &'s S) -> Self {
        Self { store }
    }

    /// Upsert an arbitrary validated node.
    pub fn upsert_node(&self, spec: &NodeSpec) -> MedResult<NodeRecord> {
        Ok(self.store.upsert_node(spec)?)
    }

    /// Upsert an arbitrary validated relationship.
    pub fn upsert_edge(&self, spec: &EdgeSpec) -> MedResult<EdgeRecord> {
        let record = self.store.upsert_edge(spec)?;
        tracing::debug!(
            relation = %record.relation,
            from = %record.from,
            to = %record.to,
            "upserted relationship"
        );
        Ok(record)
    }

    /// Version of the seed pack recorded under `id`, if any.
    pub fn applied_seed(&self, id: &str) -> MedResult<Option<String>> {
        Ok(self.store.applied_seed(id)?)
    }

    /// Record that seed pack `id` has been applied at `version`.
    pub fn record_seed(&self, id: &str, version: &str) -> MedResult<()> {
        Ok(self.store.record_seed(id, version)?)
    }

    fn attach(
        &self,
        relation: RelationType,
        from: NodeSpec,
        to: NodeSpec,
    ) -> MedResult<EdgeRecord> {
        let spec = EdgeSpec::new(relation, from, to)?;
        self.upsert_edge(&spec)
    }

    // -- Patient ------------------------------------------------------------

    pub fn create_patient(
        &self,
        name: &str,
        age: Option<i64>,
        gender: Option<&str>,
    ) -> MedResult<NodeRecord> {
        let spec = NodeSpec::new(NodeLabel::Patient, name)?
            .with_opt("age", age)?
            .with_opt("gender", gender)?;
        self.upsert_node(&spec)
    }

    pub fn patient_add_symptom(
        &self,
        patient: &str,
        symptom: &str,
        severity: Option<&str>,
        onset_days: Option<i64>,
    ) -> MedResult<EdgeRecord> {
        let spec = EdgeSpec::new(
            RelationType::HasSymptom,
            NodeSpec::new(NodeLabel::Patient, patient)?,
            NodeSpec::new(NodeLabel::Symptom, symptom)?,
        )?
        .with_opt("severity", severity)?
        .with_opt("onset_days", onset_days)?;
        self.upsert_edge(&spec)
    }

    pub fn patient_add_risk_factor(
        &self,
        patient: &str,
        risk_factor: &str,
        category: Option<&str>,
    ) -> MedResult<EdgeRecord> {
        self.attach(
            RelationType::HasRiskFactor,
            NodeSpec::new(NodeLabel::Patient, patient)?,
            NodeSpec::new(NodeLabel::RiskFactor, risk_factor)?.with_opt("category", category)?,
        )
    }

    pub fn patient_add_visit(
        &self,
        patient: &str,
        visit_id: &str,
        date: Option<&str>,
        reason: Option<&str>,
    ) -> MedResult<EdgeRecord> {
        self.attach(
            RelationType::HasVisit,
            NodeSpec::new(NodeLabel::Patient, patient)?,
            NodeSpec::new(NodeLabel::Visit, visit_id)?
                .with_opt("date", date)?
                .with_opt("reason", reason)?,
        )
    }

    // -- Visit --------------------------------------------------------------

    pub fn visit_add_observation(
        &self,
        visit_id: &str,
        name: &str,
        value: impl Into<PropValue>,
        unit: Option<&str>,
        time: Option<&str>,
    ) -> MedResult<EdgeRecord> {
        self.attach(
            RelationType::HasObservation,
            NodeSpec::new(NodeLabel::Visit, visit_id)?,
            NodeSpec::new(NodeLabel::Observation, name)?
                .with("value", value)?
                .with_opt("unit", unit)?
                .with_opt("time", time)?,
        )
    }

    pub fn visit_add_test(
        &self,
        visit_id: &str,
        test: &str,
        test_type: Option<&str>,
    ) -> MedResult<EdgeRecord> {
        self.attach(
            RelationType::HasTest,
            NodeSpec::new(NodeLabel::Visit, visit_id)?,
            NodeSpec::new(NodeLabel::Test, test)?.with_opt("type", test_type)?,
        )
    }

    // -- Clinical knowledge -------------------------------------------------

    pub fn symptom_indicates_disease(
        &self,
        symptom: &str,
        disease: &str,
        weight: Option<f64>,
    ) -> MedResult<EdgeRecord> {
        let spec = EdgeSpec::new(
            RelationType::Indicates,
            NodeSpec::new(NodeLabel::Symptom, symptom)?,
            NodeSpec::new(NodeLabel::Disease, disease)?,
        )?
        .with_opt("weight", weight)?;
        self.upsert_edge(&spec)
    }

    pub fn disease_add_treatment(
        &self,
        disease: &str,
        treatment: &str,
        line: Option<&str>,
        recommended: Option<bool>,
    ) -> MedResult<EdgeRecord> {
        let spec = EdgeSpec::new(
            RelationType::TreatedBy,
            NodeSpec::new(NodeLabel::Disease, disease)?,
            NodeSpec::new(NodeLabel::Treatment, treatment)?,
        )?
        .with_opt("line", line)?
        .with_opt("recommended", recommended)?;
        self.upsert_edge(&spec)
    }

    pub fn test_used_for_diagnosis(&self, test: &str, disease: &str) -> MedResult<EdgeRecord> {
        self.attach(
            RelationType::UsedForDiagnosisOf,
            NodeSpec::new(NodeLabel::Test, test)?,
            NodeSpec::new(NodeLabel::Disease, disease)?,
        )
    }

    pub fn observation_supports_disease(
        &self,
        observation: &str,
        disease: &str,
    ) -> MedResult<EdgeRecord> {
        self.attach(
            RelationType::Supports,
            NodeSpec::new(NodeLabel::Observation, observation)?,
            NodeSpec::new(NodeLabel::Disease, disease)?,
        )
    }
}
