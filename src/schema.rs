//! Closed clinical graph schema.
//!
//! The graph has a fixed vocabulary: eight node labels, each identified by a
//! business key, and nine directed relationship types with fixed endpoint
//! labels. Writes are described with [`NodeSpec`] / [`EdgeSpec`] builders that
//! validate against this vocabulary, so nothing outside the schema can reach
//! the store.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SchemaError;

/// Result type for schema validation.
pub type SchemaResult<T> = std::result::Result<T, SchemaError>;

/// Node label in the clinical graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum NodeLabel {
    Patient,
    Symptom,
    Disease,
    RiskFactor,
    Visit,
    Observation,
    Test,
    Treatment,
}

impl NodeLabel {
    pub const ALL: [NodeLabel; 8] = [
        NodeLabel::Patient,
        NodeLabel::Symptom,
        NodeLabel::Disease,
        NodeLabel::RiskFactor,
        NodeLabel::Visit,
        NodeLabel::Observation,
        NodeLabel::Test,
        NodeLabel::Treatment,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Patient => "Patient",
            Self::Symptom => "Symptom",
            Self::Disease => "Disease",
            Self::RiskFactor => "RiskFactor",
            Self::Visit => "Visit",
            Self::Observation => "Observation",
            Self::Test => "Test",
            Self::Treatment => "Treatment",
        }
    }

    /// Name of the identifying property: `id` for visits, `name` otherwise.
    pub fn key_property(self) -> &'static str {
        match self {
            Self::Visit => "id",
            _ => "name",
        }
    }

    /// Non-key attributes a node of this label may carry.
    pub fn attributes(self) -> &'static [&'static str] {
        match self {
            Self::Patient => &["age", "gender"],
            Self::RiskFactor => &["category"],
            Self::Visit => &["date", "reason"],
            Self::Observation => &["value", "unit", "time"],
            Self::Test => &["type"],
            Self::Symptom | Self::Disease | Self::Treatment => &[],
        }
    }
}

impl fmt::Display for NodeLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeLabel {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|l| l.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| SchemaError::UnknownLabel {
                label: wanted.to_string(),
            })
    }
}

/// Directed, typed relationship between two labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RelationType {
    HasSymptom,
    HasRiskFactor,
    HasVisit,
    HasObservation,
    HasTest,
    Indicates,
    TreatedBy,
    UsedForDiagnosisOf,
    Supports,
}

impl RelationType {
    pub const ALL: [RelationType; 9] = [
        RelationType::HasSymptom,
        RelationType::HasRiskFactor,
        RelationType::HasVisit,
        RelationType::HasObservation,
        RelationType::HasTest,
        RelationType::Indicates,
        RelationType::TreatedBy,
        RelationType::UsedForDiagnosisOf,
        RelationType::Supports,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::HasSymptom => "HAS_SYMPTOM",
            Self::HasRiskFactor => "HAS_RISK_FACTOR",
            Self::HasVisit => "HAS_VISIT",
            Self::HasObservation => "HAS_OBSERVATION",
            Self::HasTest => "HAS_TEST",
            Self::Indicates => "INDICATES",
            Self::TreatedBy => "TREATED_BY",
            Self::UsedForDiagnosisOf => "USED_FOR_DIAGNOSIS_OF",
            Self::Supports => "SUPPORTS",
        }
    }

    /// The `(from, to)` labels this relationship connects.
    pub fn endpoints(self) -> (NodeLabel, NodeLabel) {
        use NodeLabel::*;
        match self {
            Self::HasSymptom => (Patient, Symptom),
            Self::HasRiskFactor => (Patient, RiskFactor),
            Self::HasVisit => (Patient, Visit),
            Self::HasObservation => (Visit, Observation),
            Self::HasTest => (Visit, Test),
            Self::Indicates => (Symptom, Disease),
            Self::TreatedBy => (Disease, Treatment),
            Self::UsedForDiagnosisOf => (Test, Disease),
            Self::Supports => (Observation, Disease),
        }
    }

    /// Attributes carried on the relationship itself.
    pub fn attributes(self) -> &'static [&'static str] {
        match self {
            Self::HasSymptom => &["severity", "onset_days"],
            Self::Indicates => &["weight"],
            Self::TreatedBy => &["line", "recommended"],
            _ => &[],
        }
    }
}

impl fmt::Display for RelationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RelationType {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|r| r.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| SchemaError::UnknownRelation {
                name: wanted.to_string(),
            })
    }
}

/// Scalar attribute value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl fmt::Display for PropValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Str(s) => f.write_str(s),
        }
    }
}

impl From<bool> for PropValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for PropValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<u32> for PropValue {
    fn from(v: u32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<f64> for PropValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for PropValue {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<String> for PropValue {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

/// Attribute map of a node or relationship.
pub type Properties = BTreeMap<String, PropValue>;

/// Normalize a business key for identity comparison.
pub fn normalize_key(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Identity of a node: its label plus normalized business key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeKey {
    pub label: NodeLabel,
    pub key: String,
}

impl NodeKey {
    pub fn new(label: NodeLabel, raw: &str) -> SchemaResult<Self> {
        let key = normalize_key(raw);
        if key.is_empty() {
            return Err(SchemaError::EmptyKey {
                label: label.to_string(),
            });
        }
        Ok(Self { label, key })
    }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.label, self.key)
    }
}

fn check_attribute(owner: &str, allowed: &[&str], attribute: &str) -> SchemaResult<()> {
    if allowed.contains(&attribute) {
        Ok(())
    } else {
        Err(SchemaError::UnknownAttribute {
            owner: owner.to_string(),
            attribute: attribute.to_string(),
        })
    }
}

/// A validated request to upsert a node.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeSpec {
    label: NodeLabel,
    key: String,
    properties: Properties,
}

impl NodeSpec {
    /// Start a node spec. The key is trimmed; blank keys are rejected.
    pub fn new(label: NodeLabel, key: impl Into<String>) -> SchemaResult<Self> {
        let key = key.into().trim().to_string();
        if key.is_empty() {
            return Err(SchemaError::EmptyKey {
                label: label.to_string(),
            });
        }
        Ok(Self {
            label,
            key,
            properties: Properties::new(),
        })
    }

    /// Set a schema attribute.
    pub fn with(mut self, attribute: &str, value: impl Into<PropValue>) -> SchemaResult<Self> {
        check_attribute(self.label.as_str(), self.label.attributes(), attribute)?;
        self.properties.insert(attribute.to_string(), value.into());
        Ok(self)
    }

    /// Set a schema attribute when present.
    pub fn with_opt<V: Into<PropValue>>(
        self,
        attribute: &str,
        value: Option<V>,
    ) -> SchemaResult<Self> {
        match value {
            Some(v) => self.with(attribute, v),
            None => Ok(self),
        }
    }

    pub fn label(&self) -> NodeLabel {
        self.label
    }

    /// The key as supplied by the caller (trimmed, case preserved).
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    pub fn node_key(&self) -> NodeKey {
        NodeKey {
            label: self.label,
            key: normalize_key(&self.key),
        }
    }
}

/// A validated request to upsert a relationship between two nodes.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeSpec {
    relation: RelationType,
    from: NodeSpec,
    to: NodeSpec,
    properties: Properties,
}

impl EdgeSpec {
    /// Build an edge spec, checking the endpoint labels against the schema.
    pub fn new(relation: RelationType, from: NodeSpec, to: NodeSpec) -> SchemaResult<Self> {
        let (expected_from, expected_to) = relation.endpoints();
        if from.label != expected_from || to.label != expected_to {
            return Err(SchemaError::EndpointMismatch {
                relation: relation.to_string(),
                expected_from: expected_from.to_string(),
                expected_to: expected_to.to_string(),
                from: from.label.to_string(),
                to: to.label.to_string(),
            });
        }
        Ok(Self {
            relation,
            from,
            to,
            properties: Properties::new(),
        })
    }

    /// Set a relationship attribute.
    pub fn with(mut self, attribute: &str, value: impl Into<PropValue>) -> SchemaResult<Self> {
        check_attribute(self.relation.as_str(), self.relation.attributes(), attribute)?;
        self.properties.insert(attribute.to_string(), value.into());
        Ok(self)
    }

    /// Set a relationship attribute when present.
    pub fn with_opt<V: Into<PropValue>>(
        self,
        attribute: &str,
        value: Option<V>,
    ) -> SchemaResult<Self> {
        match value {
            Some(v) => self.with(attribute, v),
            None => Ok(self),
        }
    }

    pub fn relation(&self) -> RelationType {
        self.relation
    }

    pub fn from(&self) -> &NodeSpec {
        &self.from
    }

    pub fn to(&self) -> &NodeSpec {
        &self.to
    }

    pub fn properties(&self) -> &Properties {
        &self.properties
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn visit_is_keyed_by_id() {
        assert_eq!(NodeLabel::Visit.key_property(), "id");
        assert_eq!(NodeLabel::Patient.key_property(), "name");
    }

    #[test]
    fn label_parsing_is_case_insensitive() {
        assert_eq!("riskfactor".parse::<NodeLabel>().unwrap(), NodeLabel::RiskFactor);
        assert_eq!("Symptom".parse::<NodeLabel>().unwrap(), NodeLabel::Symptom);
        assert!("Doctor".parse::<NodeLabel>().is_err());
    }

    #[test]
    fn relation_parsing() {
        assert_eq!(
            "used_for_diagnosis_of".parse::<RelationType>().unwrap(),
            RelationType::UsedForDiagnosisOf
        );
        assert!("KNOWS".parse::<RelationType>().is_err());
    }

    #[test]
    fn node_key_normalizes() {
        let a = NodeKey::new(NodeLabel::Symptom, "  Fever ").unwrap();
        let b = NodeSpec::new(NodeLabel::Symptom, "FEVER").unwrap().node_key();
        assert_eq!(a, b);
        assert_eq!(a.key, "fever");
    }

    #[test]
    fn blank_key_rejected() {
        assert!(matches!(
            NodeSpec::new(NodeLabel::Disease, "   "),
            Err(SchemaError::EmptyKey { .. })
        ));
    }

    #[test]
    fn node_spec_preserves_display_key() {
        let spec = NodeSpec::new(NodeLabel::Patient, " Omar ").unwrap();
        assert_eq!(spec.key(), "Omar");
    }

    #[test]
    fn unknown_node_attribute_rejected() {
        let spec = NodeSpec::new(NodeLabel::Symptom, "fever").unwrap();
        assert!(matches!(
            spec.with("age", 3i64),
            Err(SchemaError::UnknownAttribute { .. })
        ));
    }

    #[test]
    fn edge_endpoints_validated() {
        let symptom = NodeSpec::new(NodeLabel::Symptom, "fever").unwrap();
        let disease = NodeSpec::new(NodeLabel::Disease, "flu").unwrap();

        assert!(EdgeSpec::new(RelationType::Indicates, symptom.clone(), disease.clone()).is_ok());
        assert!(matches!(
            EdgeSpec::new(RelationType::Indicates, disease, symptom),
            Err(SchemaError::EndpointMismatch { .. })
        ));
    }

    #[test]
    fn edge_attributes_validated() {
        let edge = EdgeSpec::new(
            RelationType::TreatedBy,
            NodeSpec::new(NodeLabel::Disease, "flu").unwrap(),
            NodeSpec::new(NodeLabel::Treatment, "rest").unwrap(),
        )
        .unwrap();
        let edge = edge
            .with("line", "first")
            .unwrap()
            .with_opt::<bool>("recommended", None)
            .unwrap();
        assert_eq!(edge.properties().len(), 1);
        assert!(edge.with("weight", 0.5).is_err());
    }

    #[test]
    fn prop_value_untagged_json() {
        let v: PropValue = serde_json::from_str("37.5").unwrap();
        assert_eq!(v, PropValue::Float(37.5));
        let v: PropValue = serde_json::from_str("\"mild\"").unwrap();
        assert_eq!(v, PropValue::Str("mild".into()));
        let v: PropValue = serde_json::from_str("3").unwrap();
        assert_eq!(v, PropValue::Int(3));
    }
}
