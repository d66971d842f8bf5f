//! Intent classification over an ordered rule table.
//!
//! Rules are evaluated top to bottom against the lower-cased question and the
//! extracted entities; the first match wins. Visit-scoped rules come first
//! since "visit" together with "observation" or "test" is the most specific
//! signal a question can carry.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::entities::{Category, QuestionEntities};

/// What a question asks of the graph.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    PossibleDiseases,
    SymptomsOfDisease,
    TreatmentsForDisease,
    TestsForDisease,
    ObservationsForDisease,
    /// Dispatch-only: no classifier rule produces it.
    DiseasesSupportedByObservation,
    /// Dispatch-only: no classifier rule produces it.
    DiseasesDiagnosedByTest,
    SymptomsOfPatient,
    RiskFactorsOfPatient,
    VisitsOfPatient,
    ObservationsOfVisit,
    TestsOfVisit,
    /// No rule matched.
    #[default]
    #[serde(rename = "")]
    Unresolved,
}

impl Intent {
    pub const ALL: [Intent; 13] = [
        Intent::PossibleDiseases,
        Intent::SymptomsOfDisease,
        Intent::TreatmentsForDisease,
        Intent::TestsForDisease,
        Intent::ObservationsForDisease,
        Intent::DiseasesSupportedByObservation,
        Intent::DiseasesDiagnosedByTest,
        Intent::SymptomsOfPatient,
        Intent::RiskFactorsOfPatient,
        Intent::VisitsOfPatient,
        Intent::ObservationsOfVisit,
        Intent::TestsOfVisit,
        Intent::Unresolved,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::PossibleDiseases => "possible_diseases",
            Self::SymptomsOfDisease => "symptoms_of_disease",
            Self::TreatmentsForDisease => "treatments_for_disease",
            Self::TestsForDisease => "tests_for_disease",
            Self::ObservationsForDisease => "observations_for_disease",
            Self::DiseasesSupportedByObservation => "diseases_supported_by_observation",
            Self::DiseasesDiagnosedByTest => "diseases_diagnosed_by_test",
            Self::SymptomsOfPatient => "symptoms_of_patient",
            Self::RiskFactorsOfPatient => "risk_factors_of_patient",
            Self::VisitsOfPatient => "visits_of_patient",
            Self::ObservationsOfVisit => "observations_of_visit",
            Self::TestsOfVisit => "tests_of_visit",
            Self::Unresolved => "",
        }
    }

    pub fn is_resolved(self) -> bool {
        self != Self::Unresolved
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Intent {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|i| i.as_str() == wanted)
            .ok_or_else(|| format!("unknown intent: {s}"))
    }
}

/// Keyword condition on the lower-cased question text.
#[derive(Debug, Clone, Copy)]
pub enum KeywordMatch {
    /// Every keyword must occur.
    All(&'static [&'static str]),
    /// At least one keyword must occur.
    Any(&'static [&'static str]),
    /// No keyword condition.
    None,
}

impl KeywordMatch {
    fn matches(self, text: &str) -> bool {
        match self {
            Self::All(words) => words.iter().all(|w| text.contains(w)),
            Self::Any(words) => words.iter().any(|w| text.contains(w)),
            Self::None => true,
        }
    }
}

/// One row of the classifier table.
#[derive(Debug, Clone, Copy)]
pub struct IntentRule {
    /// 1-based position; lower wins.
    pub priority: u8,
    pub keywords: KeywordMatch,
    /// Category that must hold at least one entity.
    pub requires: Category,
    pub intent: Intent,
}

impl IntentRule {
    /// `text` must already be lower-cased.
    pub fn matches(&self, text: &str, entities: &QuestionEntities) -> bool {
        !entities.get(self.requires).is_empty() && self.keywords.matches(text)
    }
}

/// Classifier rules in priority order.
pub const INTENT_RULES: &[IntentRule] = &[
    IntentRule {
        priority: 1,
        keywords: KeywordMatch::All(&["visit", "observation"]),
        requires: Category::Visits,
        intent: Intent::ObservationsOfVisit,
    },
    IntentRule {
        priority: 2,
        keywords: KeywordMatch::All(&["visit", "test"]),
        requires: Category::Visits,
        intent: Intent::TestsOfVisit,
    },
    IntentRule {
        priority: 3,
        keywords: KeywordMatch::All(&["visit"]),
        requires: Category::Patients,
        intent: Intent::VisitsOfPatient,
    },
    IntentRule {
        priority: 4,
        keywords: KeywordMatch::All(&["symptom"]),
        requires: Category::Diseases,
        intent: Intent::SymptomsOfDisease,
    },
    IntentRule {
        priority: 5,
        keywords: KeywordMatch::Any(&["indicate", "cause", "possible"]),
        requires: Category::Symptoms,
        intent: Intent::PossibleDiseases,
    },
    IntentRule {
        priority: 6,
        keywords: KeywordMatch::Any(&["treatment", "treatments"]),
        requires: Category::Diseases,
        intent: Intent::TreatmentsForDisease,
    },
    IntentRule {
        priority: 7,
        keywords: KeywordMatch::All(&["test"]),
        requires: Category::Diseases,
        intent: Intent::TestsForDisease,
    },
    IntentRule {
        priority: 8,
        keywords: KeywordMatch::All(&["observation"]),
        requires: Category::Diseases,
        intent: Intent::ObservationsForDisease,
    },
    IntentRule {
        priority: 9,
        keywords: KeywordMatch::All(&["symptom"]),
        requires: Category::Patients,
        intent: Intent::SymptomsOfPatient,
    },
    IntentRule {
        priority: 10,
        keywords: KeywordMatch::All(&["risk factor"]),
        requires: Category::Patients,
        intent: Intent::RiskFactorsOfPatient,
    },
    IntentRule {
        priority: 11,
        keywords: KeywordMatch::None,
        requires: Category::Symptoms,
        intent: Intent::PossibleDiseases,
    },
];

/// Resolve the intent of a question. Returns [`Intent::Unresolved`] when no
/// rule matches.
pub fn classify(question: &str, entities: &QuestionEntities) -> Intent {
    let text = question.to_lowercase();
    INTENT_RULES
        .iter()
        .find(|rule| rule.matches(&text, entities))
        .map_or(Intent::Unresolved, |rule| rule.intent)
}

/// Every rule the question satisfies, in priority order.
pub fn matching_rules(question: &str, entities: &QuestionEntities) -> Vec<&'static IntentRule> {
    let text = question.to_lowercase();
    INTENT_RULES
        .iter()
        .filter(|rule| rule.matches(&text, entities))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with(category: Category, values: &[&str]) -> QuestionEntities {
        let mut e = QuestionEntities::default();
        let v: Vec<String> = values.iter().map(|s| s.to_string()).collect();
        match category {
            Category::Symptoms => e.symptoms = v,
            Category::Diseases => e.diseases = v,
            Category::Patients => e.patients = v,
            Category::Tests => e.tests = v,
            Category::Observations => e.observations = v,
            Category::Visits => e.visits = v,
        }
        e
    }

    fn all_filled() -> QuestionEntities {
        QuestionEntities {
            intent: Intent::Unresolved,
            symptoms: vec!["fever".into()],
            diseases: vec!["flu".into()],
            patients: vec!["Omar".into()],
            tests: vec!["CBC".into()],
            observations: vec!["temperature".into()],
            visits: vec!["V001".into()],
        }
    }

    #[test]
    fn table_is_in_priority_order() {
        for (i, rule) in INTENT_RULES.iter().enumerate() {
            assert_eq!(rule.priority as usize, i + 1);
        }
    }

    #[test]
    fn rule_1_visit_observations() {
        let q = "Which observation was recorded during visit V001?";
        assert_eq!(classify(q, &all_filled()), Intent::ObservationsOfVisit);
        // Without a visit id the rule is skipped.
        let e = with(Category::Patients, &["Omar"]);
        assert_eq!(classify(q, &e), Intent::VisitsOfPatient);
    }

    #[test]
    fn rule_2_visit_tests() {
        let q = "What test was done at visit V001?";
        assert_eq!(classify(q, &all_filled()), Intent::TestsOfVisit);
    }

    #[test]
    fn rule_3_patient_visits() {
        let q = "List the visits of Omar who has a symptom";
        let mut e = with(Category::Patients, &["Omar"]);
        e.diseases = vec!["flu".into()];
        // "symptom" + diseases would match rule 4, but rule 3 comes first.
        assert_eq!(classify(q, &e), Intent::VisitsOfPatient);
    }

    #[test]
    fn rule_4_disease_symptoms() {
        let q = "What symptom could cause diabetes?";
        let mut e = with(Category::Diseases, &["diabetes"]);
        e.symptoms = vec!["thirst".into()];
        assert_eq!(classify(q, &e), Intent::SymptomsOfDisease);
    }

    #[test]
    fn rule_5_possible_diseases() {
        let q = "What does fever indicate? Any treatment?";
        let mut e = with(Category::Symptoms, &["fever"]);
        e.diseases = vec!["flu".into()];
        assert_eq!(classify(q, &e), Intent::PossibleDiseases);
    }

    #[test]
    fn rule_6_treatments() {
        let q = "Which treatments and tests exist for flu?";
        let e = with(Category::Diseases, &["flu"]);
        assert_eq!(classify(q, &e), Intent::TreatmentsForDisease);
    }

    #[test]
    fn rule_7_disease_tests() {
        let q = "Which test and observation confirm flu?";
        let e = with(Category::Diseases, &["flu"]);
        assert_eq!(classify(q, &e), Intent::TestsForDisease);
    }

    #[test]
    fn rule_8_disease_observations() {
        let q = "Which observation supports flu?";
        let e = with(Category::Diseases, &["flu"]);
        assert_eq!(classify(q, &e), Intent::ObservationsForDisease);
        assert!(Intent::ObservationsForDisease.is_resolved());
    }

    #[test]
    fn rule_9_patient_symptoms() {
        let q = "What symptom and risk factor does Omar have?";
        let e = with(Category::Patients, &["Omar"]);
        assert_eq!(classify(q, &e), Intent::SymptomsOfPatient);
    }

    #[test]
    fn rule_10_patient_risk_factors() {
        let q = "What is the main risk factor for Omar?";
        let e = with(Category::Patients, &["Omar"]);
        assert_eq!(classify(q, &e), Intent::RiskFactorsOfPatient);
    }

    #[test]
    fn rule_11_symptom_fallback() {
        let q = "fever and cough";
        let e = with(Category::Symptoms, &["fever", "cough"]);
        assert_eq!(classify(q, &e), Intent::PossibleDiseases);
    }

    #[test]
    fn rule_12_nothing_matches() {
        assert_eq!(
            classify("hello there", &QuestionEntities::default()),
            Intent::Unresolved
        );
        // Keywords alone are not enough.
        assert_eq!(
            classify("visit observation test symptom", &QuestionEntities::default()),
            Intent::Unresolved
        );
        // A patient with no keyword matches nothing.
        let e = with(Category::Patients, &["Omar"]);
        assert_eq!(classify("Tell me about Omar", &e), Intent::Unresolved);
    }

    #[test]
    fn classification_is_case_insensitive() {
        let e = with(Category::Diseases, &["flu"]);
        assert_eq!(
            classify("WHAT ARE THE SYMPTOMS OF FLU", &e),
            Intent::SymptomsOfDisease
        );
    }

    #[test]
    fn matching_rules_reports_every_hit() {
        let q = "Which observation and test were recorded during visit V001 for symptom?";
        let priorities: Vec<u8> = matching_rules(q, &all_filled())
            .iter()
            .map(|r| r.priority)
            .collect();
        assert_eq!(priorities, vec![1, 2, 3, 4, 7, 8, 9, 11]);
        assert_eq!(classify(q, &all_filled()), INTENT_RULES[0].intent);
    }

    #[test]
    fn dispatch_only_intents_are_unreachable() {
        for rule in INTENT_RULES {
            assert_ne!(rule.intent, Intent::DiseasesSupportedByObservation);
            assert_ne!(rule.intent, Intent::DiseasesDiagnosedByTest);
        }
    }

    #[test]
    fn intent_names_round_trip() {
        for intent in Intent::ALL {
            assert_eq!(intent.as_str().parse::<Intent>().unwrap(), intent);
            let json = serde_json::to_string(&intent).unwrap();
            assert_eq!(json, format!("\"{}\"", intent.as_str()));
        }
    }
}
