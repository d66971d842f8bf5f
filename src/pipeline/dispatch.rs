//! Intent → traversal dispatch with per-intent aggregation.
//!
//! Three aggregation policies exist:
//! - `possible_diseases` intersects the disease sets of every symptom
//! - disease-scoped intents concatenate the results of every disease
//! - patient, visit, test and observation intents read only the first entity

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::graph::GraphReader;
use crate::schema::normalize_key;
use crate::store::{GraphStore, NodeRecord, StoreResult};

use super::entities::{Category, QuestionEntities};
use super::intent::Intent;

/// Key of one populated entry in [`GraphResults`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultKind {
    PossibleDiseases,
    Symptoms,
    Treatments,
    Tests,
    RiskFactors,
    Visits,
    Observations,
    Diseases,
}

impl ResultKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PossibleDiseases => "possible_diseases",
            Self::Symptoms => "symptoms",
            Self::Treatments => "treatments",
            Self::Tests => "tests",
            Self::RiskFactors => "risk_factors",
            Self::Visits => "visits",
            Self::Observations => "observations",
            Self::Diseases => "diseases",
        }
    }
}

impl fmt::Display for ResultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Display keys of matched nodes, grouped by result kind.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GraphResults(BTreeMap<ResultKind, Vec<String>>);

impl GraphResults {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, kind: ResultKind, values: Vec<String>) {
        self.0.insert(kind, values);
    }

    pub fn get(&self, kind: ResultKind) -> Option<&[String]> {
        self.0.get(&kind).map(Vec::as_slice)
    }

    pub fn contains(&self, kind: ResultKind) -> bool {
        self.0.contains_key(&kind)
    }

    /// Number of matched entities across all kinds.
    pub fn total_items(&self) -> usize {
        self.0.values().map(Vec::len).sum()
    }

    /// True when nothing matched, whether or not any key is present.
    pub fn is_empty(&self) -> bool {
        self.total_items() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = (ResultKind, &[String])> {
        self.0.iter().map(|(k, v)| (*k, v.as_slice()))
    }
}

fn display_keys(nodes: Vec<NodeRecord>) -> Vec<String> {
    nodes.into_iter().map(|n| n.key).collect()
}

/// Runs the traversals an intent calls for.
pub struct QueryDispatcher<'s, S: GraphStore + ?Sized> {
    reader: GraphReader<'s, S>,
}

impl<'s, S: GraphStore + ?Sized> QueryDispatcher<'s, S> {
    pub fn new(store: &'s S) -> Self {
        Self {
            reader: GraphReader::new(store),
        }
    }

    pub fn dispatch(&self, intent: Intent, entities: &QuestionEntities) -> StoreResult<GraphResults> {
        let mut results = GraphResults::new();
        let reader = &self.reader;

        match intent {
            Intent::PossibleDiseases => {
                results.insert(
                    ResultKind::PossibleDiseases,
                    self.intersect_diseases(&entities.symptoms)?,
                );
            }
            Intent::SymptomsOfDisease => {
                results.insert(
                    ResultKind::Symptoms,
                    self.per_disease(&entities.diseases, |d| reader.symptoms_for_disease(d))?,
                );
            }
            Intent::TreatmentsForDisease => {
                results.insert(
                    ResultKind::Treatments,
                    self.per_disease(&entities.diseases, |d| reader.treatments_for_disease(d))?,
                );
            }
            Intent::TestsForDisease => {
                results.insert(
                    ResultKind::Tests,
                    self.per_disease(&entities.diseases, |d| reader.tests_for_disease(d))?,
                );
            }
            Intent::DiseasesSupportedByObservation => {
                if let Some(obs) = entities.first(Category::Observations) {
                    results.insert(
                        ResultKind::Diseases,
                        display_keys(reader.diseases_for_observation(obs)?),
                    );
                }
            }
            Intent::DiseasesDiagnosedByTest => {
                if let Some(test) = entities.first(Category::Tests) {
                    results.insert(ResultKind::Diseases, display_keys(reader.diseases_for_test(test)?));
                }
            }
            Intent::SymptomsOfPatient => {
                if let Some(patient) = entities.first(Category::Patients) {
                    let hops = reader.patient_symptoms(patient)?;
                    results.insert(
                        ResultKind::Symptoms,
                        hops.into_iter().map(|h| h.node.key).collect(),
                    );
                }
            }
            Intent::RiskFactorsOfPatient => {
                if let Some(patient) = entities.first(Category::Patients) {
                    results.insert(
                        ResultKind::RiskFactors,
                        display_keys(reader.patient_risk_factors(patient)?),
                    );
                }
            }
            Intent::VisitsOfPatient => {
                if let Some(patient) = entities.first(Category::Patients) {
                    results.insert(ResultKind::Visits, display_keys(reader.patient_visits(patient)?));
                }
            }
            Intent::ObservationsOfVisit => {
                if let Some(visit) = entities.first(Category::Visits) {
                    results.insert(
                        ResultKind::Observations,
                        display_keys(reader.visit_observations(visit)?),
                    );
                }
            }
            Intent::TestsOfVisit => {
                if let Some(visit) = entities.first(Category::Visits) {
                    results.insert(ResultKind::Tests, display_keys(reader.visit_tests(visit)?));
                }
            }
            // Classified, but no traversal answers it.
            Intent::ObservationsForDisease | Intent::Unresolved => {}
        }

        tracing::info!(
            intent = %intent,
            keys = results.iter().count(),
            items = results.total_items(),
            "dispatched graph queries"
        );
        Ok(results)
    }

    /// Diseases indicated by every symptom. Order follows the first symptom.
    fn intersect_diseases(&self, symptoms: &[String]) -> StoreResult<Vec<String>> {
        let Some((first, rest)) = symptoms.split_first() else {
            return Ok(vec![]);
        };

        let mut candidates = display_keys(self.reader.diseases_for_symptom(first)?);
        for symptom in rest {
            if candidates.is_empty() {
                break;
            }
            let agreeing: HashSet<String> = self
                .reader
                .diseases_for_symptom(symptom)?
                .iter()
                .map(|n| normalize_key(&n.key))
                .collect();
            candidates.retain(|d| agreeing.contains(&normalize_key(d)));
        }

        let mut seen = HashSet::new();
        candidates.retain(|d| seen.insert(normalize_key(d)));
        Ok(candidates)
    }

    /// Concatenate a per-disease traversal over every disease, duplicates kept.
    fn per_disease<F>(&self, diseases: &[String], traverse: F) -> StoreResult<Vec<String>>
    where
        F: Fn(&str) -> StoreResult<Vec<NodeRecord>>,
    {
        let mut out = Vec::new();
        for disease in diseases {
            out.extend(display_keys(traverse(disease)?));
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::GraphWriter;
    use crate::store::MemGraph;

    fn symptoms(values: &[&str]) -> QuestionEntities {
        QuestionEntities {
            symptoms: values.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    fn flu_graph() -> MemGraph {
        let g = MemGraph::new();
        let w = GraphWriter::new(&g);
        w.symptom_indicates_disease("fever", "flu", None).unwrap();
        w.symptom_indicates_disease("fever", "covid", None).unwrap();
        w.symptom_indicates_disease("cough", "flu", None).unwrap();
        w.symptom_indicates_disease("cough", "bronchitis", None).unwrap();
        w.symptom_indicates_disease("cough", "covid", None).unwrap();
        g
    }

    #[test]
    fn possible_diseases_is_an_intersection() {
        let g = flu_graph();
        let d = QueryDispatcher::new(&g);
        let r = d
            .dispatch(Intent::PossibleDiseases, &symptoms(&["Fever", "COUGH"]))
            .unwrap();
        assert_eq!(
            r.get(ResultKind::PossibleDiseases).unwrap(),
            &["flu".to_string(), "covid".to_string()]
        );
    }

    #[test]
    fn one_unknown_symptom_empties_the_intersection() {
        let g = flu_graph();
        let d = QueryDispatcher::new(&g);
        let r = d
            .dispatch(Intent::PossibleDiseases, &symptoms(&["fever", "rash"]))
            .unwrap();
        assert_eq!(r.get(ResultKind::PossibleDiseases).unwrap(), &[] as &[String]);
        assert!(r.is_empty());
    }

    #[test]
    fn no_symptoms_yields_empty() {
        let g = flu_graph();
        let r = QueryDispatcher::new(&g)
            .dispatch(Intent::PossibleDiseases, &QuestionEntities::default())
            .unwrap();
        assert!(r.is_empty());
    }

    #[test]
    fn repeated_symptom_does_not_duplicate() {
        let g = flu_graph();
        let r = QueryDispatcher::new(&g)
            .dispatch(Intent::PossibleDiseases, &symptoms(&["fever", "fever"]))
            .unwrap();
        assert_eq!(r.get(ResultKind::PossibleDiseases).unwrap().len(), 2);
    }

    #[test]
    fn disease_intents_concatenate() {
        let g = flu_graph();
        let e = QuestionEntities {
            diseases: vec!["flu".into(), "covid".into()],
            ..Default::default()
        };
        let r = QueryDispatcher::new(&g)
            .dispatch(Intent::SymptomsOfDisease, &e)
            .unwrap();
        assert_eq!(
            r.get(ResultKind::Symptoms).unwrap(),
            &["fever".to_string(), "cough".into(), "fever".into(), "cough".into()]
        );
    }

    #[test]
    fn tests_for_disease_walks_diagnosis_edges_backwards() {
        let g = MemGraph::new();
        let w = GraphWriter::new(&g);
        w.test_used_for_diagnosis("HbA1c", "diabetes").unwrap();
        let e = QuestionEntities {
            diseases: vec!["Diabetes".into()],
            ..Default::default()
        };
        let r = QueryDispatcher::new(&g)
            .dispatch(Intent::TestsForDisease, &e)
            .unwrap();
        assert_eq!(r.get(ResultKind::Tests).unwrap(), &["HbA1c".to_string()]);
    }

    #[test]
    fn first_only_intents_ignore_later_entities() {
        let g = MemGraph::new();
        let w = GraphWriter::new(&g);
        w.patient_add_visit("Omar", "V001", None, None).unwrap();
        w.patient_add_visit("Jane", "V002", None, None).unwrap();
        let e = QuestionEntities {
            patients: vec!["omar".into(), "jane".into()],
            ..Default::default()
        };
        let r = QueryDispatcher::new(&g)
            .dispatch(Intent::VisitsOfPatient, &e)
            .unwrap();
        assert_eq!(r.get(ResultKind::Visits).unwrap(), &["V001".to_string()]);
    }

    #[test]
    fn dispatch_only_intents_still_work() {
        let g = MemGraph::new();
        let w = GraphWriter::new(&g);
        w.observation_supports_disease("high temperature", "flu").unwrap();
        w.test_used_for_diagnosis("PCR", "covid").unwrap();

        let d = QueryDispatcher::new(&g);
        let e = QuestionEntities {
            observations: vec!["high temperature".into()],
            tests: vec!["pcr".into()],
            ..Default::default()
        };
        let r = d
            .dispatch(Intent::DiseasesSupportedByObservation, &e)
            .unwrap();
        assert_eq!(r.get(ResultKind::Diseases).unwrap(), &["flu".to_string()]);
        let r = d.dispatch(Intent::DiseasesDiagnosedByTest, &e).unwrap();
        assert_eq!(r.get(ResultKind::Diseases).unwrap(), &["covid".to_string()]);
    }

    #[test]
    fn disease_observations_intent_has_no_traversal() {
        let g = MemGraph::new();
        GraphWriter::new(&g)
            .observation_supports_disease("rash", "measles")
            .unwrap();
        let e = QuestionEntities {
            diseases: vec!["measles".into()],
            ..Default::default()
        };
        let r = QueryDispatcher::new(&g)
            .dispatch(Intent::ObservationsForDisease, &e)
            .unwrap();
        assert_eq!(r, GraphResults::new());
    }

    #[test]
    fn missing_entity_leaves_key_absent() {
        let g = MemGraph::new();
        let r = QueryDispatcher::new(&g)
            .dispatch(Intent::VisitsOfPatient, &QuestionEntities::default())
            .unwrap();
        assert!(!r.contains(ResultKind::Visits));
        assert!(r.is_empty());
    }

    #[test]
    fn unresolved_intent_is_empty() {
        let g = flu_graph();
        let r = QueryDispatcher::new(&g)
            .dispatch(Intent::Unresolved, &symptoms(&["fever"]))
            .unwrap();
        assert_eq!(r, GraphResults::new());
    }

    #[test]
    fn results_serialize_with_snake_case_keys() {
        let mut r = GraphResults::new();
        r.insert(ResultKind::RiskFactors, vec!["smoking".into()]);
        assert_eq!(
            serde_json::to_value(&r).unwrap(),
            serde_json::json!({ "risk_factors": ["smoking"] })
        );
    }
}
