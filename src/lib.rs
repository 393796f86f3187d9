// thiserror's #[error("...{field}...")] format strings reference struct fields,
// but the compiler doesn't see through the derive macro and reports false positives.
#![allow(unused_assignments)]

//! # trigraph
//!
//! Entity-grounded paragraph retrieval over a sentence–entity–paragraph graph.
//!
//! ## Architecture
//!
//! - **Graph** (`graph`): tripartite graph with sentence–entity (`M`) and
//!   paragraph–entity (`C`) CSR incidence matrices, built in parallel
//! - **Embeddings** (`embed`): per-sentence unit vectors behind the `Embedder` trait
//! - **Activation** (`retrieve::activation`): query → similar sentences → seed entities
//! - **Propagation** (`retrieve::propagation`): personalized PageRank over
//!   `W = MᵗM + CᵗC`
//! - **Ranking** (`retrieve::ranker`): semantic, coverage, and lexical signals
//!   fused into one score, with a hard filter that falls back when starved
//! - **Session** (`session`): build, persist, reload, query
//!
//! ## Library usage
//!
//! ```no_run
//! use trigraph::config::RetrievalConfig;
//! use trigraph::embed::HashingEmbedder;
//! use trigraph::extract::CapitalizedExtractor;
//! use trigraph::graph::Paragraph;
//! use trigraph::session::{QueryOptions, Session};
//!
//! let docs = vec![
//!     Paragraph::new("P1", "Vancomycin treats MRSA infections."),
//!     Paragraph::new("P2", "Diabetes is a metabolic disease."),
//! ];
//! let config = RetrievalConfig::default();
//! let embedder = Box::new(HashingEmbedder::new(config.embedding_dimension).unwrap());
//! let session = Session::build(&docs, &CapitalizedExtractor, embedder, config).unwrap();
//! let outcome = session.query("What drug treats MRSA?", &QueryOptions::default()).unwrap();
//! println!("{}", outcome.results[0].id);
//! ```

pub mod config;
pub mod corpus;
pub mod embed;
pub mod error;
pub mod extract;
pub mod graph;
pub mod retrieve;
pub mod session;
