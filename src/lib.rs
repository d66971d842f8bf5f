// thiserror's #[error("...{field}...")] format strings reference struct fields,
// but the compiler doesn't see through the derive macro and reports false positives.
#![allow(unused_assignments)]

//! # medkg
//!
//! Answers natural-language medical questions from a typed clinical
//! knowledge graph.
//!
//! ## Architecture
//!
//! - **Schema** (`schema`): closed vocabulary of node labels and relationships
//!   with validating `NodeSpec` / `EdgeSpec` builders
//! - **Storage** (`store`): `GraphStore` trait; petgraph + DashMap in memory,
//!   redb write-through on disk
//! - **Graph adapters** (`graph`): named single-hop reads and idempotent upserts
//! - **Question pipeline** (`pipeline`): LLM entity extraction, rule-table
//!   intent classification, graph dispatch and answer formatting
//! - **LLM client** (`llm`): blocking Ollama / OpenAI-compatible completion
//! - **Seed packs** (`seeds`): TOML-defined clinical facts
//!
//! ## Library usage
//!
//! ```no_run
//! use medkg::graph::GraphWriter;
//! use medkg::llm::{LlmClient, LlmConfig};
//! use medkg::pipeline::QuestionPipeline;
//! use medkg::store::MemGraph;
//!
//! let graph = MemGraph::new();
//! let writer = GraphWriter::new(&graph);
//! writer.symptom_indicates_disease("fever", "flu", Some(0.8)).unwrap();
//! writer.symptom_indicates_disease("cough", "flu", Some(0.7)).unwrap();
//!
//! let llm = LlmClient::new(LlmConfig::default());
//! let answer = QuestionPipeline::new(&graph, &llm)
//!     .answer("What diseases are possible given fever and cough?")
//!     .unwrap();
//! println!("{}", answer.reasoning);
//! ```

pub mod config;
pub mod error;
pub mod graph;
pub mod llm;
pub mod pipeline;
pub mod schema;
pub mod seeds;
pub mod store;
