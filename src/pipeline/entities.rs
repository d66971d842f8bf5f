//! Per-question entity record.

use serde::{Deserialize, Deserializer, Serialize};

use super::intent::Intent;

/// One of the six entity categories an extractor fills.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Symptoms,
    Diseases,
    Patients,
    Tests,
    Observations,
    Visits,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::Symptoms,
        Category::Diseases,
        Category::Patients,
        Category::Tests,
        Category::Observations,
        Category::Visits,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Symptoms => "symptoms",
            Self::Diseases => "diseases",
            Self::Patients => "patients",
            Self::Tests => "tests",
            Self::Observations => "observations",
            Self::Visits => "visits",
        }
    }
}

/// `null` and missing lists both read as empty; blank strings are dropped.
fn lenient_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<Vec<String>> = Option::deserialize(deserializer)?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect())
}

/// Entities extracted from one question, plus the locally resolved intent.
///
/// Created per question, its intent assigned once by the classifier, then
/// discarded after the answer is built.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuestionEntities {
    pub intent: Intent,
    #[serde(deserialize_with = "lenient_list")]
    pub symptoms: Vec<String>,
    #[serde(deserialize_with = "lenient_list")]
    pub diseases: Vec<String>,
    #[serde(deserialize_with = "lenient_list")]
    pub patients: Vec<String>,
    #[serde(deserialize_with = "lenient_list")]
    pub tests: Vec<String>,
    #[serde(deserialize_with = "lenient_list")]
    pub observations: Vec<String>,
    #[serde(deserialize_with = "lenient_list")]
    pub visits: Vec<String>,
}

impl QuestionEntities {
    pub fn get(&self, category: Category) -> &[String] {
        match category {
            Category::Symptoms => &self.symptoms,
            Category::Diseases => &self.diseases,
            Category::Patients => &self.patients,
            Category::Tests => &self.tests,
            Category::Observations => &self.observations,
            Category::Visits => &self.visits,
        }
    }

    /// First entity of a category, used by the first-only intents.
    pub fn first(&self, category: Category) -> Option<&str> {
        self.get(category).first().map(String::as_str)
    }

    /// True when no category holds an entity.
    pub fn is_empty(&self) -> bool {
        Category::ALL.iter().all(|c| self.get(*c).is_empty())
    }
}
