//! End-to-end question answering with a scripted completion model.

use std::sync::Mutex;

use medkg::error::{MedError, StoreError};
use medkg::graph::GraphWriter;
use medkg::llm::{CompletionModel, LlmError};
use medkg::pipeline::{Intent, NO_MATCH, QuestionEntities, QuestionPipeline, ResultKind};
use medkg::schema::{EdgeSpec, NodeKey, NodeLabel, NodeSpec, RelationType};
use medkg::seeds::SeedPack;
use medkg::store::{
    Direction, EdgeRecord, GraphStore, MemGraph, Neighbor, NodeRecord, StoreResult,
};

/// Replies with a fixed string and records every prompt it receives.
struct Scripted {
    reply: Result<String, ()>,
    prompts: Mutex<Vec<String>>,
}

impl Scripted {
    fn replying(reply: &str) -> Self {
        Self {
            reply: Ok(reply.to_string()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    fn failing() -> Self {
        Self {
            reply: Err(()),
            prompts: Mutex::new(Vec::new()),
        }
    }
}

impl CompletionModel for Scripted {
    fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.reply.clone().map_err(|_| LlmError::Unavailable {
            url: "scripted".into(),
        })
    }
}

/// A store whose traversals always fail.
struct BrokenStore;

fn broken() -> StoreError {
    StoreError::Redb {
        message: "disk unavailable".into(),
    }
}

impl GraphStore for BrokenStore {
    fn upsert_node(&self, _spec: &NodeSpec) -> StoreResult<NodeRecord> {
        Err(broken())
    }

    fn upsert_edge(&self, _spec: &EdgeSpec) -> StoreResult<EdgeRecord> {
        Err(broken())
    }

    fn get_node(&self, _key: &NodeKey) -> StoreResult<Option<NodeRecord>> {
        Err(broken())
    }

    fn nodes_with_label(&self, _label: NodeLabel) -> StoreResult<Vec<NodeRecord>> {
        Err(broken())
    }

    fn neighbors(
        &self,
        _key: &NodeKey,
        _relation: RelationType,
        _direction: Direction,
    ) -> StoreResult<Vec<Neighbor>> {
        Err(broken())
    }

    fn search(&self, _term: &str) -> StoreResult<Vec<NodeRecord>> {
        Err(broken())
    }

    fn applied_seed(&self, _id: &str) -> StoreResult<Option<String>> {
        Err(broken())
    }

    fn record_seed(&self, _id: &str, _version: &str) -> StoreResult<()> {
        Err(broken())
    }

    fn node_count(&self) -> usize {
        0
    }

    fn edge_count(&self) -> usize {
        0
    }
}

fn respiratory_graph() -> MemGraph {
    let g = MemGraph::new();
    let w = GraphWriter::new(&g);
    w.symptom_indicates_disease("fever", "flu", Some(0.8)).unwrap();
    w.symptom_indicates_disease("fever", "covid", Some(0.7)).unwrap();
    w.symptom_indicates_disease("cough", "flu", Some(0.7)).unwrap();
    w.symptom_indicates_disease("cough", "bronchitis", Some(0.8)).unwrap();
    g
}

#[test]
fn fever_and_cough_intersect_to_flu() {
    let g = respiratory_graph();
    let model = Scripted::replying(
        r#"{"intent": "", "symptoms": ["fever", "cough"], "diseases": [], "patients": [],
            "tests": [], "observations": [], "visits": []}"#,
    );
    let question = "What diseases are possible given fever and cough?";

    let answer = QuestionPipeline::new(&g, &model).answer(question).unwrap();

    assert_eq!(answer.analysis.intent, Intent::PossibleDiseases);
    assert_eq!(
        answer.graph_results.get(ResultKind::PossibleDiseases).unwrap(),
        &["flu".to_string()]
    );
    assert_eq!(answer.final_answer, "The possible diseases are: [flu]");
    assert!(answer.reasoning.ends_with("FINAL ANSWER:\nThe possible diseases are: [flu]"));

    let prompts = model.prompts.lock().unwrap();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].ends_with(question));
}

#[test]
fn diabetes_symptoms_from_bundled_seed() {
    let g = MemGraph::new();
    SeedPack::bundled()
        .unwrap()
        .apply(&GraphWriter::new(&g))
        .unwrap();
    let model = Scripted::replying(r#"{"diseases": ["diabetes"]}"#);

    let answer = QuestionPipeline::new(&g, &model)
        .answer("What are the symptoms of diabetes?")
        .unwrap();

    assert_eq!(answer.analysis.intent, Intent::SymptomsOfDisease);
    assert_eq!(
        answer.final_answer,
        "The symptoms of the disease are: [Increased thirst, Frequent urination, Fatigue, Blurred vision]"
    );
}

#[test]
fn malformed_extraction_degrades_to_sentinel() {
    let g = respiratory_graph();
    let model = Scripted::replying(r#"{"symptoms": ["fever", "cou"#);

    let answer = QuestionPipeline::new(&g, &model)
        .answer("What does fever and cough indicate?")
        .unwrap();

    assert_eq!(answer.analysis, QuestionEntities::default());
    assert_eq!(answer.analysis.intent, Intent::Unresolved);
    assert!(answer.graph_results.is_empty());
    assert_eq!(answer.final_answer, NO_MATCH);
    assert!(answer.reasoning.ends_with(NO_MATCH));
}

#[test]
fn unreachable_model_degrades_to_sentinel() {
    let g = respiratory_graph();
    let model = Scripted::failing();

    let answer = QuestionPipeline::new(&g, &model)
        .answer("What causes fever?")
        .unwrap();
    assert_eq!(answer.final_answer, NO_MATCH);
}

#[test]
fn patient_questions_use_first_patient() {
    let g = MemGraph::new();
    let w = GraphWriter::new(&g);
    w.create_patient("Omar", Some(52), Some("M")).unwrap();
    w.patient_add_symptom("Omar", "Headache", Some("mild"), Some(2))
        .unwrap();
    w.patient_add_risk_factor("Omar", "Smoking", Some("lifestyle"))
        .unwrap();
    w.patient_add_symptom("Jane", "Cough", None, None).unwrap();

    let model = Scripted::replying(r#"{"patients": ["omar", "Jane"]}"#);
    let pipeline = QuestionPipeline::new(&g, &model);

    let answer = pipeline.answer("Which symptom does Omar have?").unwrap();
    assert_eq!(answer.analysis.intent, Intent::SymptomsOfPatient);
    assert_eq!(answer.final_answer, "The patient's symptoms are: [Headache]");

    let answer = pipeline.answer("Any risk factor for Omar?").unwrap();
    assert_eq!(answer.final_answer, "The patient's risk factors are: [Smoking]");
}

#[test]
fn visit_observations_by_visit_id() {
    let g = MemGraph::new();
    let w = GraphWriter::new(&g);
    w.patient_add_visit("Omar", "V001", Some("2024-03-01"), Some("fever"))
        .unwrap();
    w.visit_add_observation("V001", "Temperature", 38.9, Some("C"), None)
        .unwrap();
    w.visit_add_observation("V001", "Oxygen level", 95i64, Some("%"), None)
        .unwrap();
    w.visit_add_test("V001", "CBC", Some("blood")).unwrap();

    let model = Scripted::replying(r#"{"visits": ["v001"], "patients": ["Omar"]}"#);
    let pipeline = QuestionPipeline::new(&g, &model);

    let answer = pipeline
        .answer("What observations were recorded during visit V001?")
        .unwrap();
    assert_eq!(answer.analysis.intent, Intent::ObservationsOfVisit);
    assert_eq!(
        answer.final_answer,
        "The visit observations are: [Temperature, Oxygen level]"
    );

    let answer = pipeline.answer("Which test was run at visit V001?").unwrap();
    assert_eq!(answer.final_answer, "The visit tests are: [CBC]");

    let answer = pipeline.answer("List every visit of Omar").unwrap();
    // Visits are in the entity set, but "observation"/"test" are not in the text.
    assert_eq!(answer.analysis.intent, Intent::VisitsOfPatient);
    assert_eq!(answer.final_answer, "The patient's visits are: [V001]");
}

#[test]
fn explicit_intent_reaches_dispatch_only_paths() {
    let g = MemGraph::new();
    let w = GraphWriter::new(&g);
    w.test_used_for_diagnosis("HbA1c", "Diabetes").unwrap();
    let model = Scripted::failing();

    let entities = QuestionEntities {
        tests: vec!["hba1c".into()],
        ..Default::default()
    };
    let answer = QuestionPipeline::new(&g, &model)
        .answer_as("What does HbA1c diagnose?", Intent::DiseasesDiagnosedByTest, entities)
        .unwrap();

    assert_eq!(
        answer.graph_results.get(ResultKind::Diseases).unwrap(),
        &["Diabetes".to_string()]
    );
    // No template exists for this intent.
    assert_eq!(answer.final_answer, NO_MATCH);
    assert!(model.prompts.lock().unwrap().is_empty());
}

#[test]
fn answer_serializes_in_wire_shape() {
    let g = respiratory_graph();
    let model = Scripted::replying(r#"{"symptoms": ["fever"]}"#);
    let answer = QuestionPipeline::new(&g, &model).answer("fever").unwrap();

    let json = serde_json::to_value(&answer).unwrap();
    assert_eq!(json["question"], "fever");
    assert_eq!(json["analysis"]["intent"], "possible_diseases");
    assert_eq!(
        json["graph_results"]["possible_diseases"],
        serde_json::json!(["flu", "covid"])
    );
    assert!(json["reasoning"].as_str().unwrap().starts_with("Reasoning Summary:"));
}

#[test]
fn storage_failure_propagates() {
    let model = Scripted::replying(r#"{"symptoms": ["fever"]}"#);
    let result = QuestionPipeline::new(&BrokenStore, &model)
        .answer("What diseases are possible given fever?");
    assert!(matches!(result, Err(MedError::Store(StoreError::Redb { .. }))));
}

#[test]
fn unresolved_question_never_touches_storage() {
    let model = Scripted::replying(r#"{"symptoms": []}"#);
    let answer = QuestionPipeline::new(&BrokenStore, &model)
        .answer("Hello there")
        .unwrap();
    assert_eq!(answer.analysis.intent, Intent::Unresolved);
    assert_eq!(answer.final_answer, NO_MATCH);
}

#[test]
fn disease_observation_questions_resolve_without_an_answer() {
    let g = MemGraph::new();
    GraphWriter::new(&g)
        .observation_supports_disease("rash", "measles")
        .unwrap();
    let model = Scripted::failing();
    let entities = QuestionEntities {
        diseases: vec!["measles".into()],
        ..Default::default()
    };

    let answer = QuestionPipeline::new(&g, &model)
        .answer_with("Which observation supports measles?", entities)
        .unwrap();

    assert_eq!(answer.analysis.intent, Intent::ObservationsForDisease);
    assert!(answer.graph_results.is_empty());
    assert_eq!(answer.final_answer, NO_MATCH);
}
