//! Seed packs: clinical knowledge bootstrapping.
//!
//! A seed pack is a TOML-defined bundle of clinical facts applied through the
//! [`GraphWriter`]. Facts come in four sections, one per knowledge
//! relationship: `[[indicates]]`, `[[treatments]]`, `[[diagnostics]]` and
//! `[[supports]]`. The `clinical-basics` pack is bundled into the binary.
//!
//! Applying a pack is idempotent since every fact is an upsert. The store
//! records each applied pack's version; [`SeedPack::apply_once`] skips a pack
//! already recorded at the same version, so attributes edited after seeding
//! are not reset on the next start.

use std::path::{Path, PathBuf};

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::graph::GraphWriter;
use crate::store::GraphStore;

// ── Errors ──────────────────────────────────────────────────────────────

#[derive(Debug, Error, Diagnostic)]
pub enum SeedError {
    #[error("failed to parse seed pack \"{id}\": {message}")]
    #[diagnostic(
        code(medkg::seed::parse),
        help("Check the seed.toml syntax against the bundled clinical-basics pack.")
    )]
    Parse { id: String, message: String },

    #[error("failed to read seed file: {path}")]
    #[diagnostic(code(medkg::seed::io), help("Ensure the file exists and is readable."))]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to apply seed \"{id}\": {message}")]
    #[diagnostic(
        code(medkg::seed::apply),
        help("Check that every fact names a non-blank entity and the store is writable.")
    )]
    Apply { id: String, message: String },
}

pub type SeedResult<T> = std::result::Result<T, SeedError>;

// ── Seed pack data model ────────────────────────────────────────────────

/// Where a seed pack came from.
#[derive(Debug, Clone, PartialEq)]
pub enum SeedSource {
    /// Bundled into the binary via `include_str!`.
    Bundled,
    /// Loaded from a file.
    External(PathBuf),
}

/// `Symptom -INDICATES-> Disease`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct IndicatesFact {
    pub symptom: String,
    pub disease: String,
    #[serde(default)]
    pub weight: Option<f64>,
}

/// `Disease -TREATED_BY-> Treatment`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TreatmentFact {
    pub disease: String,
    pub treatment: String,
    #[serde(default)]
    pub line: Option<String>,
    #[serde(default)]
    pub recommended: Option<bool>,
}

/// `Test -USED_FOR_DIAGNOSIS_OF-> Disease`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DiagnosticFact {
    pub test: String,
    pub disease: String,
}

/// `Observation -SUPPORTS-> Disease`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SupportsFact {
    pub observation: String,
    pub disease: String,
}

/// A seed pack: TOML-defined clinical knowledge bundle.
#[derive(Debug, Clone)]
pub struct SeedPack {
    pub id: String,
    pub name: String,
    pub version: String,
    pub description: String,
    pub indicates: Vec<IndicatesFact>,
    pub treatments: Vec<TreatmentFact>,
    pub diagnostics: Vec<DiagnosticFact>,
    pub supports: Vec<SupportsFact>,
    pub source: SeedSource,
}

/// Report after applying a seed pack.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SeedReport {
    pub id: String,
    pub indicates: usize,
    pub treatments: usize,
    pub diagnostics: usize,
    pub supports: usize,
    /// The pack was already recorded at this version and nothing was written.
    pub already_applied: bool,
}

impl SeedReport {
    pub fn total(&self) -> usize {
        self.indicates + self.treatments + self.diagnostics + self.supports
    }
}

// ── TOML deserialization helpers ─────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct SeedToml {
    seed: SeedMeta,
    #[serde(default)]
    indicates: Vec<IndicatesFact>,
    #[serde(default)]
    treatments: Vec<TreatmentFact>,
    #[serde(default)]
    diagnostics: Vec<DiagnosticFact>,
    #[serde(default)]
    supports: Vec<SupportsFact>,
}

#[derive(Debug, Deserialize)]
struct SeedMeta {
    id: String,
    name: String,
    version: String,
    #[serde(default)]
    description: String,
}

// ── Bundled seed pack ───────────────────────────────────────────────────

const CLINICAL_BASICS_TOML: &str = include_str!("../../data/seeds/clinical-basics/seed.toml");

impl SeedPack {
    /// Parse a pack from TOML text.
    pub fn parse(toml_str: &str, source: SeedSource) -> SeedResult<Self> {
        let parsed: SeedToml = toml::from_str(toml_str).map_err(|e| SeedError::Parse {
            id: match &source {
                SeedSource::Bundled => "(bundled)".into(),
                SeedSource::External(p) => p.display().to_string(),
            },
            message: e.to_string(),
        })?;
        Ok(Self {
            id: parsed.seed.id,
            name: parsed.seed.name,
            version: parsed.seed.version,
            description: parsed.seed.description,
            indicates: parsed.indicates,
            treatments: parsed.treatments,
            diagnostics: parsed.diagnostics,
            supports: parsed.supports,
            source,
        })
    }

    /// The built-in `clinical-basics` pack.
    pub fn bundled() -> SeedResult<Self> {
        Self::parse(CLINICAL_BASICS_TOML, SeedSource::Bundled)
    }

    /// Load a pack from a `seed.toml` file, or from a directory containing one.
    pub fn load(path: &Path) -> SeedResult<Self> {
        let file = if path.is_dir() {
            path.join("seed.toml")
        } else {
            path.to_path_buf()
        };
        let content = std::fs::read_to_string(&file).map_err(|e| SeedError::Io {
            path: file.display().to_string(),
            source: e,
        })?;
        Self::parse(&content, SeedSource::External(file))
    }

    /// Number of facts across all sections.
    pub fn fact_count(&self) -> usize {
        self.indicates.len() + self.treatments.len() + self.diagnostics.len() + self.supports.len()
    }

    /// Apply the pack unless the store already records it at this version.
    pub fn apply_once<S: GraphStore + ?Sized>(
        &self,
        writer: &GraphWriter<'_, S>,
    ) -> SeedResult<SeedReport> {
        let recorded = writer.applied_seed(&self.id).map_err(|e| SeedError::Apply {
            id: self.id.clone(),
            message: format!("seed lookup: {e}"),
        })?;
        if recorded.as_deref() == Some(self.version.as_str()) {
            tracing::debug!(seed = %self.id, version = %self.version, "seed pack already applied");
            return Ok(SeedReport {
                id: self.id.clone(),
                already_applied: true,
                ..Default::default()
            });
        }
        self.apply(writer)
    }

    /// Upsert every fact through the writer and record the pack as applied.
    pub fn apply<S: GraphStore + ?Sized>(&self, writer: &GraphWriter<'_, S>) -> SeedResult<SeedReport> {
        let fail = |what: &str, e: crate::error::MedError| SeedError::Apply {
            id: self.id.clone(),
            message: format!("{what}: {e}"),
        };
        let mut report = SeedReport {
            id: self.id.clone(),
            ..Default::default()
        };

        for f in &self.indicates {
            writer
                .symptom_indicates_disease(&f.symptom, &f.disease, f.weight)
                .map_err(|e| fail(&format!("{} -> {}", f.symptom, f.disease), e))?;
            report.indicates += 1;
        }
        for f in &self.treatments {
            writer
                .disease_add_treatment(&f.disease, &f.treatment, f.line.as_deref(), f.recommended)
                .map_err(|e| fail(&format!("{} -> {}", f.disease, f.treatment), e))?;
            report.treatments += 1;
        }
        for f in &self.diagnostics {
            writer
                .test_used_for_diagnosis(&f.test, &f.disease)
                .map_err(|e| fail(&format!("{} -> {}", f.test, f.disease), e))?;
            report.diagnostics += 1;
        }
        for f in &self.supports {
            writer
                .observation_supports_disease(&f.observation, &f.disease)
                .map_err(|e| fail(&format!("{} -> {}", f.observation, f.disease), e))?;
            report.supports += 1;
        }

        writer
            .record_seed(&self.id, &self.version)
            .map_err(|e| fail("record", e))?;

        tracing::info!(
            seed = %self.id,
            version = %self.version,
            facts = report.total(),
            "applied seed pack"
        );
        Ok(report)
    }
}
