//! Presentation of dispatched results. No graph access happens here.

use serde::{Deserialize, Serialize};

use super::dispatch::{GraphResults, ResultKind};
use super::entities::QuestionEntities;
use super::intent::Intent;

/// Final answer used when nothing can be said.
pub const NO_MATCH: &str = "No matching information found.";

/// Template prefix and the result key it renders, per intent.
fn template(intent: Intent) -> Option<(&'static str, ResultKind)> {
    let t = match intent {
        Intent::PossibleDiseases => ("The possible diseases are", ResultKind::PossibleDiseases),
        Intent::SymptomsOfDisease => ("The symptoms of the disease are", ResultKind::Symptoms),
        Intent::TreatmentsForDisease => ("The recommended treatments are", ResultKind::Treatments),
        Intent::TestsForDisease => ("The diagnostic tests are", ResultKind::Tests),
        Intent::SymptomsOfPatient => ("The patient's symptoms are", ResultKind::Symptoms),
        Intent::RiskFactorsOfPatient => ("The patient's risk factors are", ResultKind::RiskFactors),
        Intent::VisitsOfPatient => ("The patient's visits are", ResultKind::Visits),
        Intent::ObservationsOfVisit => ("The visit observations are", ResultKind::Observations),
        Intent::TestsOfVisit => ("The visit tests are", ResultKind::Tests),
        Intent::ObservationsForDisease
        | Intent::DiseasesSupportedByObservation
        | Intent::DiseasesDiagnosedByTest
        | Intent::Unresolved => return None,
    };
    Some(t)
}

/// `[a, b]`
fn render_list(values: &[String]) -> String {
    format!("[{}]", values.join(", "))
}

/// One-line answer plus the full traceable explanation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reasoning {
    pub final_answer: String,
    pub text: String,
}

/// Render the answer for an already-classified question.
pub fn format(question: &str, entities: &QuestionEntities, results: &GraphResults) -> Reasoning {
    let final_answer = match template(entities.intent) {
        Some((prefix, kind)) if !results.is_empty() => {
            let values = results.get(kind).unwrap_or_default();
            format!("{prefix}: {}", render_list(values))
        }
        _ => NO_MATCH.to_string(),
    };

    let graph_json = serde_json::to_string_pretty(results).unwrap_or_else(|_| "{}".into());
    let text = format!(
        "Reasoning Summary:\n\
         Based ONLY on the knowledge graph results below, provide a short explanation.\n\
         \n\
         GRAPH RESULTS:\n\
         {graph_json}\n\
         \n\
         FINAL ANSWER:\n\
         {final_answer}"
    );

    tracing::debug!(question, intent = %entities.intent, answer = %final_answer, "formatted reasoning");
    Reasoning { final_answer, text }
}
