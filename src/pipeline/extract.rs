//! Entity extraction through a language model.

use crate::llm::CompletionModel;

use super::entities::QuestionEntities;

const EXTRACTION_PROMPT: &str = r#"You are a medical NLP parser used inside a knowledge-graph reasoning system.
Your ONLY task is to extract entities EXACTLY as they appear in the user's question.
You MUST NOT answer the question. You MUST NOT guess. You MUST NOT add any extra text.

Return strict valid JSON with this structure:

{
  "intent": "",
  "symptoms": [],
  "diseases": [],
  "patients": [],
  "tests": [],
  "observations": [],
  "visits": []
}

Extraction rules:
- Extract ONLY words that appear in the question.
- Do NOT infer medical meaning.
- Do NOT rewrite, rephrase, pluralize, or correct spelling.
- If an entity is not explicitly in the question, do NOT include it.
- Leave "intent" empty; it is computed elsewhere.

Entity definitions:
- symptoms: medical symptoms in the question
- diseases: disease names in the question
- patients: human names (for example Omar, John Doe, Jane)
- tests: medical test names in the question
- observations: measurable observations (temperature, oxygen level, ...)
- visits: visit identifiers (V001, V002, ...)

QUESTION:
"#;

/// Build the full prompt for a question.
pub fn extraction_prompt(question: &str) -> String {
    format!("{EXTRACTION_PROMPT}{question}")
}

/// Outermost `{...}` span of a model reply, tolerating surrounding prose or
/// code fences.
fn json_span(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    (end > start).then(|| &raw[start..=end])
}

/// Parse a model reply into entities. The reply's own `intent` is discarded.
pub fn parse_entities(raw: &str) -> Result<QuestionEntities, String> {
    let span = json_span(raw).ok_or_else(|| "no JSON object in reply".to_string())?;
    let mut value: serde_json::Value = serde_json::from_str(span).map_err(|e| e.to_string())?;
    let obj = value
        .as_object_mut()
        .ok_or_else(|| "reply is not a JSON object".to_string())?;
    obj.remove("intent");
    serde_json::from_value(value).map_err(|e| e.to_string())
}

/// Turns question text into [`QuestionEntities`]. Never fails.
pub struct EntityExtractor<'m> {
    model: &'m dyn CompletionModel,
}

impl<'m> EntityExtractor<'m> {
    pub fn new(model: &'m dyn CompletionModel) -> Self {
        Self { model }
    }

    /// Extract entities; any model or format failure yields an empty record.
    pub fn extract(&self, question: &str) -> QuestionEntities {
        let raw = match self.model.complete(&extraction_prompt(question)) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(error = %e, "entity extraction call failed; using empty entities");
                return QuestionEntities::default();
            }
        };

        match parse_entities(&raw) {
            Ok(entities) => {
                tracing::debug!(?entities, "extracted entities");
                entities
            }
            Err(reason) => {
                tracing::warn!(%reason, reply = %raw, "invalid extractor reply; using empty entities");
                QuestionEntities::default()
            }
        }
    }
}
