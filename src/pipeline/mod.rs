//! Question resolution pipeline.
//!
//! Four stages, each consuming only the previous stage's output:
//!
//! 1. [`EntityExtractor`]: question text → [`QuestionEntities`] via a
//!    [`CompletionModel`]; never fails
//! 2. [`classify`]: ordered keyword/entity rules → [`Intent`]
//! 3. [`QueryDispatcher`]: intent → graph traversals → [`GraphResults`]
//! 4. [`reasoning::format`]: results → final answer and explanation
//!
//! Only storage failures surface as errors.

pub mod dispatch;
pub mod entities;
pub mod extract;
pub mod intent;
pub mod reasoning;

pub use dispatch::{GraphResults, QueryDispatcher, ResultKind};
pub use entities::{Category, QuestionEntities};
pub use extract::EntityExtractor;
pub use intent::{INTENT_RULES, Intent, IntentRule, KeywordMatch, classify, matching_rules};
pub use reasoning::{NO_MATCH, Reasoning};

use serde::{Deserialize, Serialize};

use crate::error::MedResult;
use crate::llm::CompletionModel;
use crate::store::GraphStore;

/// Everything produced while answering one question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub question: String,
    /// Extracted entities with the resolved intent.
    pub analysis: QuestionEntities,
    pub graph_results: GraphResults,
    pub final_answer: String,
    /// Full explanation text, embedding the raw results.
    pub reasoning: String,
}

/// Wires the four stages over an injected store and completion model.
pub struct QuestionPipeline<'a, S: GraphStore + ?Sized> {
    extractor: EntityExtractor<'a>,
    dispatcher: QueryDispatcher<'a, S>,
}

impl<'a, S: GraphStore + ?Sized> QuestionPipeline<'a, S> {
    pub fn new(store: &'a S, model: &'a dyn CompletionModel) -> Self {
        Self {
            extractor: EntityExtractor::new(model),
            dispatcher: QueryDispatcher::new(store),
        }
    }

    /// Answer a question end to end.
    pub fn answer(&self, question: &str) -> MedResult<Answer> {
        let entities = self.extractor.extract(question);
        self.answer_with(question, entities)
    }

    /// Run classification, dispatch and formatting on already-extracted
    /// entities. An intent already set on `entities` is replaced.
    pub fn answer_with(&self, question: &str, mut entities: QuestionEntities) -> MedResult<Answer> {
        entities.intent = classify(question, &entities);
        tracing::info!(intent = %entities.intent, "classified question");
        self.finish(question, entities)
    }

    /// Dispatch an explicit intent, bypassing the classifier. This is the
    /// only way to reach the dispatch-only intents.
    pub fn answer_as(
        &self,
        question: &str,
        intent: Intent,
        mut entities: QuestionEntities,
    ) -> MedResult<Answer> {
        entities.intent = intent;
        self.finish(question, entities)
    }

    fn finish(&self, question: &str, entities: QuestionEntities) -> MedResult<Answer> {
        let graph_results = self.dispatcher.dispatch(entities.intent, &entities)?;
        let Reasoning { final_answer, text } = reasoning::format(question, &entities, &graph_results);
        Ok(Answer {
            question: question.to_string(),
            analysis: entities,
            graph_results,
            final_answer,
            reasoning: text,
        })
    }
}
