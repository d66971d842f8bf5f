//! medkg CLI: question answering over a clinical knowledge graph.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};

use medkg::config::MedConfig;
use medkg::graph::{GraphReader, GraphWriter};
use medkg::llm::LlmClient;
use medkg::pipeline::QuestionPipeline;
use medkg::schema::{NodeLabel, PropValue, RelationType};
use medkg::seeds::SeedPack;
use medkg::store::{GraphStore, MemGraph, NodeRecord};

#[derive(Parser)]
#[command(name = "medkg", version, about = "Medical knowledge-graph question answering")]
struct Cli {
    /// TOML config file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Data directory for persistent storage (overrides config).
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Do not apply the bundled seed pack on start.
    #[arg(long, global = true)]
    no_seed: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Answer a natural-language question.
    Ask {
        question: String,
        /// Print the full answer as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Apply a seed pack (the bundled one when no path is given).
    Seed {
        /// seed.toml file or directory containing one.
        #[arg(long)]
        path: Option<PathBuf>,
    },

    /// Case-insensitive substring search over node names.
    Search { term: String },

    /// Show graph statistics.
    Info,

    /// Patient records.
    Patient {
        #[command(subcommand)]
        action: PatientAction,
    },

    /// Visit records.
    Visit {
        #[command(subcommand)]
        action: VisitAction,
    },

    /// Symptom knowledge.
    Symptom {
        #[command(subcommand)]
        action: SymptomAction,
    },

    /// Disease knowledge.
    Disease {
        #[command(subcommand)]
        action: DiseaseAction,
    },

    /// Diagnostic test knowledge.
    Test {
        #[command(subcommand)]
        action: TestAction,
    },

    /// Observation knowledge.
    Observation {
        #[command(subcommand)]
        action: ObservationAction,
    },
}

#[derive(Subcommand)]
enum PatientAction {
    /// List all patients.
    List,
    /// Show one patient.
    Show { name: String },
    /// Create or update a patient.
    Create {
        name: String,
        #[arg(long)]
        age: Option<i64>,
        #[arg(long)]
        gender: Option<String>,
    },
    /// Attach a symptom.
    AddSymptom {
        patient: String,
        symptom: String,
        #[arg(long)]
        severity: Option<String>,
        #[arg(long)]
        onset_days: Option<i64>,
    },
    /// Attach a risk factor.
    AddRiskFactor {
        patient: String,
        risk_factor: String,
        #[arg(long)]
        category: Option<String>,
    },
    /// Attach a visit.
    AddVisit {
        patient: String,
        visit_id: String,
        #[arg(long)]
        date: Option<String>,
        #[arg(long)]
        reason: Option<String>,
    },
    /// List a patient's symptoms.
    Symptoms { name: String },
    /// List a patient's risk factors.
    RiskFactors { name: String },
    /// List a patient's visits.
    Visits { name: String },
}

#[derive(Subcommand)]
enum VisitAction {
    /// Record an observation. Numeric values are stored as numbers.
    AddObservation {
        visit_id: String,
        name: String,
        value: String,
        #[arg(long)]
        unit: Option<String>,
        #[arg(long)]
        time: Option<String>,
    },
    /// Record a test.
    AddTest {
        visit_id: String,
        test: String,
        #[arg(long = "type")]
        test_type: Option<String>,
    },
    /// List a visit's observations.
    Observations { visit_id: String },
    /// List a visit's tests.
    Tests { visit_id: String },
}

#[derive(Subcommand)]
enum SymptomAction {
    /// Link a symptom to a disease it indicates.
    Indicates {
        symptom: String,
        disease: String,
        #[arg(long)]
        weight: Option<f64>,
    },
    /// Diseases a symptom indicates.
    Diseases { symptom: String },
}

#[derive(Subcommand)]
enum DiseaseAction {
    /// Link a disease to a treatment.
    AddTreatment {
        disease: String,
        treatment: String,
        #[arg(long)]
        line: Option<String>,
        #[arg(long)]
        recommended: Option<bool>,
    },
    /// Symptoms indicating a disease.
    Symptoms { disease: String },
    /// Treatments of a disease.
    Treatments { disease: String },
    /// Tests diagnosing a disease.
    Tests { disease: String },
    /// Observations supporting a disease.
    Observations { disease: String },
}

#[derive(Subcommand)]
enum TestAction {
    /// Link a test to a disease it diagnoses.
    UsedFor { test: String, disease: String },
    /// Diseases a test diagnoses.
    Diseases { test: String },
}

#[derive(Subcommand)]
enum ObservationAction {
    /// Link an observation to a disease it supports.
    Supports { observation: String, disease: String },
    /// Diseases an observation supports.
    Diseases { observation: String },
}

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(3)
                .build(),
        )
    }))
    .ok(); // Ignore error if hook already set (e.g., in tests)

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = MedConfig::resolve(cli.config.as_deref())?;
    if let Some(dir) = cli.data_dir {
        config.store.data_dir = Some(dir);
    }
    if cli.no_seed {
        config.store.seed_on_start = false;
    }

    let graph = config.open_store()?;
    if !graph.is_persistent() && is_write(&cli.command) {
        tracing::warn!("no data directory configured; writes are kept in memory only");
    }
    let reader = GraphReader::new(&graph);
    let writer = GraphWriter::new(&graph);

    match cli.command {
        Commands::Ask { question, json } => {
            let llm = LlmClient::new(config.llm.clone());
            let answer = QuestionPipeline::new(&graph, &llm).answer(&question)?;
            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&answer).into_diagnostic()?
                );
            } else {
                println!("Intent: {}", display_intent(answer.analysis.intent.as_str()));
                println!("{}", answer.reasoning);
            }
        }

        Commands::Seed { path } => {
            let pack = match path {
                Some(p) => SeedPack::load(&p)?,
                None => SeedPack::bundled()?,
            };
            let report = pack.apply(&writer)?;
            println!("Applied seed \"{}\" ({} v{}):", report.id, pack.name, pack.version);
            println!("  indicates:   {}", report.indicates);
            println!("  treatments:  {}", report.treatments);
            println!("  diagnostics: {}", report.diagnostics);
            println!("  supports:    {}", report.supports);
        }

        Commands::Search { term } => {
            let hits = reader.search(&term)?;
            if hits.is_empty() {
                println!("No matches for \"{term}\".");
            } else {
                println!("Matches ({}):", hits.len());
                for node in &hits {
                    println!("  {:<12} {}", node.label.as_str(), node.key);
                }
            }
        }

        Commands::Info => print_info(&graph)?,

        Commands::Patient { action } => match action {
            PatientAction::List => print_nodes("Patients", &reader.list_patients()?),
            PatientAction::Show { name } => match reader.get_patient(&name)? {
                Some(p) => print_nodes("Patient", &[p]),
                None => println!("Patient \"{name}\" not found."),
            },
            PatientAction::Create { name, age, gender } => {
                let p = writer.create_patient(&name, age, gender.as_deref())?;
                println!("Upserted patient \"{}\"", p.key);
            }
            PatientAction::AddSymptom {
                patient,
                symptom,
                severity,
                onset_days,
            } => {
                let e = writer.patient_add_symptom(
                    &patient,
                    &symptom,
                    severity.as_deref(),
                    onset_days,
                )?;
                println!("Upserted {} -{}-> {}", e.from, e.relation, e.to);
            }
            PatientAction::AddRiskFactor {
                patient,
                risk_factor,
                category,
            } => {
                let e = writer.patient_add_risk_factor(&patient, &risk_factor, category.as_deref())?;
                println!("Upserted {} -{}-> {}", e.from, e.relation, e.to);
            }
            PatientAction::AddVisit {
                patient,
                visit_id,
                date,
                reason,
            } => {
                let e = writer.patient_add_visit(
                    &patient,
                    &visit_id,
                    date.as_deref(),
                    reason.as_deref(),
                )?;
                println!("Upserted {} -{}-> {}", e.from, e.relation, e.to);
            }
            PatientAction::Symptoms { name } => {
                let hops = reader.patient_symptoms(&name)?;
                if hops.is_empty() {
                    println!("No symptoms recorded for \"{name}\".");
                } else {
                    println!("Symptoms of \"{name}\" ({}):", hops.len());
                    for hop in &hops {
                        println!("  {}{}", hop.node.key, format_props(&hop.relationship));
                    }
                }
            }
            PatientAction::RiskFactors { name } => {
                print_nodes("Risk factors", &reader.patient_risk_factors(&name)?)
            }
            PatientAction::Visits { name } => print_nodes("Visits", &reader.patient_visits(&name)?),
        },

        Commands::Visit { action } => match action {
            VisitAction::AddObservation {
                visit_id,
                name,
                value,
                unit,
                time,
            } => {
                let e = writer.visit_add_observation(
                    &visit_id,
                    &name,
                    parse_value(&value),
                    unit.as_deref(),
                    time.as_deref(),
                )?;
                println!("Upserted {} -{}-> {}", e.from, e.relation, e.to);
            }
            VisitAction::AddTest {
                visit_id,
                test,
                test_type,
            } => {
                let e = writer.visit_add_test(&visit_id, &test, test_type.as_deref())?;
                println!("Upserted {} -{}-> {}", e.from, e.relation, e.to);
            }
            VisitAction::Observations { visit_id } => {
                print_nodes("Observations", &reader.visit_observations(&visit_id)?)
            }
            VisitAction::Tests { visit_id } => print_nodes("Tests", &reader.visit_tests(&visit_id)?),
        },

        Commands::Symptom { action } => match action {
            SymptomAction::Indicates {
                symptom,
                disease,
                weight,
            } => {
                let e = writer.symptom_indicates_disease(&symptom, &disease, weight)?;
                println!("Upserted {} -{}-> {}", e.from, e.relation, e.to);
            }
            SymptomAction::Diseases { symptom } => {
                print_nodes("Diseases", &reader.diseases_for_symptom(&symptom)?)
            }
        },

        Commands::Disease { action } => match action {
            DiseaseAction::AddTreatment {
                disease,
                treatment,
                line,
                recommended,
            } => {
                let e = writer.disease_add_treatment(
                    &disease,
                    &treatment,
                    line.as_deref(),
                    recommended,
                )?;
                println!("Upserted {} -{}-> {}", e.from, e.relation, e.to);
            }
            DiseaseAction::Symptoms { disease } => {
                print_nodes("Symptoms", &reader.symptoms_for_disease(&disease)?)
            }
            DiseaseAction::Treatments { disease } => {
                print_nodes("Treatments", &reader.treatments_for_disease(&disease)?)
            }
            DiseaseAction::Tests { disease } => {
                print_nodes("Tests", &reader.tests_for_disease(&disease)?)
            }
            DiseaseAction::Observations { disease } => {
                print_nodes("Observations", &reader.observations_for_disease(&disease)?)
            }
        },

        Commands::Test { action } => match action {
            TestAction::UsedFor { test, disease } => {
                let e = writer.test_used_for_diagnosis(&test, &disease)?;
                println!("Upserted {} -{}-> {}", e.from, e.relation, e.to);
            }
            TestAction::Diseases { test } => {
                print_nodes("Diseases", &reader.diseases_for_test(&test)?)
            }
        },

        Commands::Observation { action } => match action {
            ObservationAction::Supports {
                observation,
                disease,
            } => {
                let e = writer.observation_supports_disease(&observation, &disease)?;
                println!("Upserted {} -{}-> {}", e.from, e.relation, e.to);
            }
            ObservationAction::Diseases { observation } => {
                print_nodes("Diseases", &reader.diseases_for_observation(&observation)?)
            }
        },
    }

    Ok(())
}

fn is_write(command: &Commands) -> bool {
    match command {
        Commands::Seed { .. } => true,
        Commands::Patient { action } => matches!(
            action,
            PatientAction::Create { .. }
                | PatientAction::AddSymptom { .. }
                | PatientAction::AddRiskFactor { .. }
                | PatientAction::AddVisit { .. }
        ),
        Commands::Visit { action } => matches!(
            action,
            VisitAction::AddObservation { .. } | VisitAction::AddTest { .. }
        ),
        Commands::Symptom { action } => matches!(action, SymptomAction::Indicates { .. }),
        Commands::Disease { action } => matches!(action, DiseaseAction::AddTreatment { .. }),
        Commands::Test { action } => matches!(action, TestAction::UsedFor { .. }),
        Commands::Observation { action } => matches!(action, ObservationAction::Supports { .. }),
        Commands::Ask { .. } | Commands::Search { .. } | Commands::Info => false,
    }
}

/// Integers first, then floats, then booleans; anything else is text.
fn parse_value(raw: &str) -> PropValue {
    let raw = raw.trim();
    if let Ok(i) = raw.parse::<i64>() {
        PropValue::Int(i)
    } else if let Ok(x) = raw.parse::<f64>() {
        PropValue::Float(x)
    } else if let Ok(b) = raw.parse::<bool>() {
        PropValue::Bool(b)
    } else {
        PropValue::Str(raw.to_string())
    }
}

fn display_intent(intent: &str) -> &str {
    if intent.is_empty() { "(unresolved)" } else { intent }
}

fn format_props(props: &medkg::schema::Properties) -> String {
    if props.is_empty() {
        return String::new();
    }
    let parts: Vec<String> = props.iter().map(|(k, v)| format!("{k}={v}")).collect();
    format!(" ({})", parts.join(", "))
}

fn print_nodes(title: &str, nodes: &[NodeRecord]) {
    if nodes.is_empty() {
        println!("{title}: none.");
        return;
    }
    println!("{title} ({}):", nodes.len());
    for node in nodes {
        println!("  {}{}", node.key, format_props(&node.properties));
    }
}

fn print_info(graph: &MemGraph) -> Result<()> {
    println!("medkg {}", env!("CARGO_PKG_VERSION"));
    println!(
        "  storage: {}",
        if graph.is_persistent() { "redb" } else { "memory" }
    );
    println!("  nodes:   {}", graph.node_count());
    println!("  edges:   {}", graph.edge_count());
    for label in NodeLabel::ALL {
        println!("    {:<12} {}", label.as_str(), graph.nodes_with_label(label)?.len());
    }
    println!("  relationship types: {}", RelationType::ALL.len());
    Ok(())
}
