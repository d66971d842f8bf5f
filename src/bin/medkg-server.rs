//! medkg HTTP server.
//!
//! **Question answering:**
//! - `POST /query` `{"question": "..."}` → question, analysis, graph results, reasoning
//!
//! **Graph reads** (query-string parameters):
//! - `GET /patients/`, `/patients/detail/?name=`, `/patients/symptoms/?name=`,
//!   `/patients/risk_factors/?name=`, `/patients/visits/?name=`
//! - `GET /visits/observations/?visit_id=`, `/visits/tests/?visit_id=`
//! - `GET /symptoms/diseases/?symptom=`, `/diseases/symptoms/?disease=`,
//!   `/diseases/treatments/?disease=`, `/diseases/tests/?disease=`,
//!   `/diseases/observations/?disease=`
//! - `GET /tests/diseases/?test_name=`, `/observations/diseases/?observation=`
//! - `GET /search/?term=`
//!
//! **Graph writes** (JSON bodies):
//! - `POST /patients/create/`, `/patients/add_symptom/`, `/patients/add_risk_factor/`,
//!   `/patients/add_visit/`, `/visits/add_observation/`, `/visits/add_test/`,
//!   `/symptoms/indicates_disease/`, `/diseases/add_treatment/`,
//!   `/tests/used_for_diagnosis/`, `/observations/supports_disease/`
//!
//! **Meta:** `GET /` (endpoint index), `GET /health`
//!
//! Configuration comes from `MEDKG_CONFIG` (TOML path) plus the usual
//! `MEDKG_*` overrides. Build and run:
//! `cargo run --features server --bin medkg-server`

use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;

use medkg::config::MedConfig;
use medkg::error::MedError;
use medkg::graph::{GraphReader, GraphWriter};
use medkg::llm::LlmClient;
use medkg::pipeline::{Answer, QuestionPipeline};
use medkg::schema::PropValue;
use medkg::store::{EdgeRecord, GraphStore, MemGraph, Neighbor, NodeRecord};

// ── Server state ──────────────────────────────────────────────────────────

struct AppState {
    graph: MemGraph,
    llm: LlmClient,
}

type Shared = State<Arc<AppState>>;
type ApiResult<T> = Result<Json<T>, (StatusCode, String)>;

fn internal(e: impl std::fmt::Display) -> (StatusCode, String) {
    (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}

/// Schema violations are the caller's fault; everything else is ours.
fn write_error(e: MedError) -> (StatusCode, String) {
    match e {
        MedError::Schema(_) => (StatusCode::BAD_REQUEST, e.to_string()),
        other => internal(other),
    }
}

// ── Request / response types ──────────────────────────────────────────────

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    persistent: bool,
    nodes: usize,
    edges: usize,
}

#[derive(Serialize)]
struct WriteResponse<T> {
    status: &'static str,
    result: T,
}

fn ok<T>(result: T) -> Json<WriteResponse<T>> {
    Json(WriteResponse {
        status: "ok",
        result,
    })
}

#[derive(Deserialize)]
struct QueryRequest {
    question: String,
}

#[derive(Deserialize)]
struct NameParam {
    #[serde(default)]
    name: String,
}

#[derive(Deserialize)]
struct VisitParam {
    #[serde(default)]
    visit_id: String,
}

#[derive(Deserialize)]
struct SymptomParam {
    #[serde(default)]
    symptom: String,
}

#[derive(Deserialize)]
struct DiseaseParam {
    #[serde(default)]
    disease: String,
}

#[derive(Deserialize)]
struct TestParam {
    #[serde(default)]
    test_name: String,
}

#[derive(Deserialize)]
struct ObservationParam {
    #[serde(default)]
    observation: String,
}

#[derive(Deserialize)]
struct SearchParam {
    #[serde(default)]
    term: String,
}

#[derive(Deserialize)]
struct CreatePatient {
    name: String,
    age: Option<i64>,
    gender: Option<String>,
}

#[derive(Deserialize)]
struct AddSymptom {
    patient: String,
    symptom: String,
    severity: Option<String>,
    onset_days: Option<i64>,
}

#[derive(Deserialize)]
struct AddRiskFactor {
    patient: String,
    risk_name: String,
    category: Option<String>,
}

#[derive(Deserialize)]
struct AddVisit {
    patient: String,
    visit_id: String,
    date: Option<String>,
    reason: Option<String>,
}

#[derive(Deserialize)]
struct AddObservation {
    visit_id: String,
    name: String,
    value: PropValue,
    unit: Option<String>,
    time: Option<String>,
}

#[derive(Deserialize)]
struct AddTest {
    visit_id: String,
    test_name: String,
    test_type: Option<String>,
}

#[derive(Deserialize)]
struct IndicatesDisease {
    symptom: String,
    disease: String,
    weight: Option<f64>,
}

#[derive(Deserialize)]
struct AddTreatment {
    disease: String,
    treatment: String,
    line: Option<String>,
    recommended: Option<bool>,
}

#[derive(Deserialize)]
struct UsedForDiagnosis {
    test_name: String,
    disease: String,
}

#[derive(Deserialize)]
struct SupportsDisease {
    observation: String,
    disease: String,
}

// ── Meta handlers ─────────────────────────────────────────────────────────

const ENDPOINTS: &[(&str, &str)] = &[
    ("query", "/query"),
    ("patients_list", "/patients/"),
    ("patient_detail", "/patients/detail/"),
    ("patient_create", "/patients/create/"),
    ("patient_add_symptom", "/patients/add_symptom/"),
    ("patient_add_risk_factor", "/patients/add_risk_factor/"),
    ("patient_add_visit", "/patients/add_visit/"),
    ("patient_symptoms", "/patients/symptoms/"),
    ("patient_risk_factors", "/patients/risk_factors/"),
    ("patient_visits", "/patients/visits/"),
    ("visit_observations", "/visits/observations/"),
    ("visit_tests", "/visits/tests/"),
    ("visit_add_observation", "/visits/add_observation/"),
    ("visit_add_test", "/visits/add_test/"),
    ("symptom_indicates_disease", "/symptoms/indicates_disease/"),
    ("diseases_for_symptom", "/symptoms/diseases/"),
    ("symptoms_for_disease", "/diseases/symptoms/"),
    ("disease_add_treatment", "/diseases/add_treatment/"),
    ("treatments_for_disease", "/diseases/treatments/"),
    ("tests_for_disease", "/diseases/tests/"),
    ("observations_for_disease", "/diseases/observations/"),
    ("test_used_for_diagnosis", "/tests/used_for_diagnosis/"),
    ("diseases_for_test", "/tests/diseases/"),
    ("observation_supports_disease", "/observations/supports_disease/"),
    ("diseases_for_observation", "/observations/diseases/"),
    ("search", "/search/"),
    ("health", "/health"),
];

async fn api_root() -> Json<serde_json::Value> {
    let index: serde_json::Map<String, serde_json::Value> = ENDPOINTS
        .iter()
        .map(|(name, path)| (name.to_string(), serde_json::Value::from(*path)))
        .collect();
    Json(serde_json::Value::Object(index))
}

async fn health(State(state): Shared) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        persistent: state.graph.is_persistent(),
        nodes: state.graph.node_count(),
        edges: state.graph.edge_count(),
    })
}

// ── Question answering ────────────────────────────────────────────────────

async fn query(State(state): Shared, Json(req): Json<QueryRequest>) -> ApiResult<Answer> {
    // Extraction blocks on the model server.
    let answer = tokio::task::spawn_blocking(move || {
        QuestionPipeline::new(&state.graph, &state.llm).answer(&req.question)
    })
    .await
    .map_err(internal)?
    .map_err(internal)?;
    Ok(Json(answer))
}

// ── Read handlers ─────────────────────────────────────────────────────────

async fn patients_list(State(state): Shared) -> ApiResult<Vec<NodeRecord>> {
    GraphReader::new(&state.graph)
        .list_patients()
        .map(Json)
        .map_err(internal)
}

async fn patient_detail(
    State(state): Shared,
    Query(p): Query<NameParam>,
) -> ApiResult<Option<NodeRecord>> {
    GraphReader::new(&state.graph)
        .get_patient(&p.name)
        .map(Json)
        .map_err(internal)
}

async fn patient_symptoms(
    State(state): Shared,
    Query(p): Query<NameParam>,
) -> ApiResult<Vec<Neighbor>> {
    GraphReader::new(&state.graph)
        .patient_symptoms(&p.name)
        .map(Json)
        .map_err(internal)
}

async fn patient_risk_factors(
    State(state): Shared,
    Query(p): Query<NameParam>,
) -> ApiResult<Vec<NodeRecord>> {
    GraphReader::new(&state.graph)
        .patient_risk_factors(&p.name)
        .map(Json)
        .map_err(internal)
}

async fn patient_visits(
    State(state): Shared,
    Query(p): Query<NameParam>,
) -> ApiResult<Vec<NodeRecord>> {
    GraphReader::new(&state.graph)
        .patient_visits(&p.name)
        .map(Json)
        .map_err(internal)
}

async fn visit_observations(
    State(state): Shared,
    Query(p): Query<VisitParam>,
) -> ApiResult<Vec<NodeRecord>> {
    GraphReader::new(&state.graph)
        .visit_observations(&p.visit_id)
        .map(Json)
        .map_err(internal)
}

async fn visit_tests(
    State(state): Shared,
    Query(p): Query<VisitParam>,
) -> ApiResult<Vec<NodeRecord>> {
    GraphReader::new(&state.graph)
        .visit_tests(&p.visit_id)
        .map(Json)
        .map_err(internal)
}

async fn diseases_for_symptom(
    State(state): Shared,
    Query(p): Query<SymptomParam>,
) -> ApiResult<Vec<NodeRecord>> {
    GraphReader::new(&state.graph)
        .diseases_for_symptom(&p.symptom)
        .map(Json)
        .map_err(internal)
}

async fn symptoms_for_disease(
    State(state): Shared,
    Query(p): Query<DiseaseParam>,
) -> ApiResult<Vec<NodeRecord>> {
    GraphReader::new(&state.graph)
        .symptoms_for_disease(&p.disease)
        .map(Json)
        .map_err(internal)
}

async fn treatments_for_disease(
    State(state): Shared,
    Query(p): Query<DiseaseParam>,
) -> ApiResult<Vec<NodeRecord>> {
    GraphReader::new(&state.graph)
        .treatments_for_disease(&p.disease)
        .map(Json)
        .map_err(internal)
}

async fn tests_for_disease(
    State(state): Shared,
    Query(p): Query<DiseaseParam>,
) -> ApiResult<Vec<NodeRecord>> {
    GraphReader::new(&state.graph)
        .tests_for_disease(&p.disease)
        .map(Json)
        .map_err(internal)
}

async fn observations_for_disease(
    State(state): Shared,
    Query(p): Query<DiseaseParam>,
) -> ApiResult<Vec<NodeRecord>> {
    GraphReader::new(&state.graph)
        .observations_for_disease(&p.disease)
        .map(Json)
        .map_err(internal)
}

async fn diseases_for_test(
    State(state): Shared,
    Query(p): Query<TestParam>,
) -> ApiResult<Vec<NodeRecord>> {
    GraphReader::new(&state.graph)
        .diseases_for_test(&p.test_name)
        .map(Json)
        .map_err(internal)
}

async fn diseases_for_observation(
    State(state): Shared,
    Query(p): Query<ObservationParam>,
) -> ApiResult<Vec<NodeRecord>> {
    GraphReader::new(&state.graph)
        .diseases_for_observation(&p.observation)
        .map(Json)
        .map_err(internal)
}

async fn search(
    State(state): Shared,
    Query(p): Query<SearchParam>,
) -> ApiResult<Vec<NodeRecord>> {
    GraphReader::new(&state.graph)
        .search(&p.term)
        .map(Json)
        .map_err(internal)
}

// ── Write handlers ────────────────────────────────────────────────────────

async fn patient_create(
    State(state): Shared,
    Json(req): Json<CreatePatient>,
) -> ApiResult<WriteResponse<NodeRecord>> {
    GraphWriter::new(&state.graph)
        .create_patient(&req.name, req.age, req.gender.as_deref())
        .map(ok)
        .map_err(write_error)
}

async fn patient_add_symptom(
    State(state): Shared,
    Json(req): Json<AddSymptom>,
) -> ApiResult<WriteResponse<EdgeRecord>> {
    GraphWriter::new(&state.graph)
        .patient_add_symptom(
            &req.patient,
            &req.symptom,
            req.severity.as_deref(),
            req.onset_days,
        )
        .map(ok)
        .map_err(write_error)
}

async fn patient_add_risk_factor(
    State(state): Shared,
    Json(req): Json<AddRiskFactor>,
) -> ApiResult<WriteResponse<EdgeRecord>> {
    GraphWriter::new(&state.graph)
        .patient_add_risk_factor(&req.patient, &req.risk_name, req.category.as_deref())
        .map(ok)
        .map_err(write_error)
}

async fn patient_add_visit(
    State(state): Shared,
    Json(req): Json<AddVisit>,
) -> ApiResult<WriteResponse<EdgeRecord>> {
    GraphWriter::new(&state.graph)
        .patient_add_visit(
            &req.patient,
            &req.visit_id,
            req.date.as_deref(),
            req.reason.as_deref(),
        )
        .map(ok)
        .map_err(write_error)
}

async fn visit_add_observation(
    State(state): Shared,
    Json(req): Json<AddObservation>,
) -> ApiResult<WriteResponse<EdgeRecord>> {
    GraphWriter::new(&state.graph)
        .visit_add_observation(
            &req.visit_id,
            &req.name,
            req.value,
            req.unit.as_deref(),
            req.time.as_deref(),
        )
        .map(ok)
        .map_err(write_error)
}

async fn visit_add_test(
    State(state): Shared,
    Json(req): Json<AddTest>,
) -> ApiResult<WriteResponse<EdgeRecord>> {
    GraphWriter::new(&state.graph)
        .visit_add_test(&req.visit_id, &req.test_name, req.test_type.as_deref())
        .map(ok)
        .map_err(write_error)
}

async fn symptom_indicates_disease(
    State(state): Shared,
    Json(req): Json<IndicatesDisease>,
) -> ApiResult<WriteResponse<EdgeRecord>> {
    GraphWriter::new(&state.graph)
        .symptom_indicates_disease(&req.symptom, &req.disease, req.weight)
        .map(ok)
        .map_err(write_error)
}

async fn disease_add_treatment(
    State(state): Shared,
    Json(req): Json<AddTreatment>,
) -> ApiResult<WriteResponse<EdgeRecord>> {
    GraphWriter::new(&state.graph)
        .disease_add_treatment(
            &req.disease,
            &req.treatment,
            req.line.as_deref(),
            req.recommended,
        )
        .map(ok)
        .map_err(write_error)
}

async fn test_used_for_diagnosis(
    State(state): Shared,
    Json(req): Json<UsedForDiagnosis>,
) -> ApiResult<WriteResponse<EdgeRecord>> {
    GraphWriter::new(&state.graph)
        .test_used_for_diagnosis(&req.test_name, &req.disease)
        .map(ok)
        .map_err(write_error)
}

async fn observation_supports_disease(
    State(state): Shared,
    Json(req): Json<SupportsDisease>,
) -> ApiResult<WriteResponse<EdgeRecord>> {
    GraphWriter::new(&state.graph)
        .observation_supports_disease(&req.observation, &req.disease)
        .map(ok)
        .map_err(write_error)
}

// ── Main ──────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let bind = std::env::var("MEDKG_SERVER_BIND").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port = std::env::var("MEDKG_SERVER_PORT").unwrap_or_else(|_| "8300".to_string());
    let addr = format!("{bind}:{port}");

    let config_path = std::env::var("MEDKG_CONFIG").ok().map(PathBuf::from);
    let config = MedConfig::resolve(config_path.as_deref()).unwrap_or_else(|e| {
        tracing::error!("failed to load config: {e}");
        std::process::exit(1);
    });
    let graph = config.open_store().unwrap_or_else(|e| {
        tracing::error!("failed to open graph store: {e}");
        std::process::exit(1);
    });

    tracing::info!(
        nodes = graph.node_count(),
        edges = graph.edge_count(),
        persistent = graph.is_persistent(),
        model = %config.llm.model,
        "medkg server initialized"
    );

    let state = Arc::new(AppState {
        graph,
        llm: LlmClient::new(config.llm.clone()),
    });

    let app = Router::new()
        .route("/", get(api_root))
        .route("/health", get(health))
        .route("/query", post(query))
        // Patients.
        .route("/patients/", get(patients_list))
        .route("/patients/detail/", get(patient_detail))
        .route("/patients/create/", post(patient_create))
        .route("/patients/add_symptom/", post(patient_add_symptom))
        .route("/patients/add_risk_factor/", post(patient_add_risk_factor))
        .route("/patients/add_visit/", post(patient_add_visit))
        .route("/patients/symptoms/", get(patient_symptoms))
        .route("/patients/risk_factors/", get(patient_risk_factors))
        .route("/patients/visits/", get(patient_visits))
        // Visits.
        .route("/visits/add_observation/", post(visit_add_observation))
        .route("/visits/add_test/", post(visit_add_test))
        .route("/visits/observations/", get(visit_observations))
        .route("/visits/tests/", get(visit_tests))
        // Symptom / disease / treatment.
        .route("/symptoms/indicates_disease/", post(symptom_indicates_disease))
        .route("/symptoms/diseases/", get(diseases_for_symptom))
        .route("/diseases/symptoms/", get(symptoms_for_disease))
        .route("/diseases/add_treatment/", post(disease_add_treatment))
        .route("/diseases/treatments/", get(treatments_for_disease))
        .route("/diseases/tests/", get(tests_for_disease))
        .route("/diseases/observations/", get(observations_for_disease))
        // Test / observation.
        .route("/tests/used_for_diagnosis/", post(test_used_for_diagnosis))
        .route("/tests/diseases/", get(diseases_for_test))
        .route("/observations/supports_disease/", post(observation_supports_disease))
        .route("/observations/diseases/", get(diseases_for_observation))
        .route("/search/", get(search))
        .layer(CorsLayer::permissive())
        .with_state(state);

    tracing::info!("medkg server listening on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind");
    axum::serve(listener, app).await.expect("server error");
}
