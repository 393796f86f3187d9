//! Session facade: the top-level API of the retrieval engine.
//!
//! A `Session` owns one built corpus (graph, sentence embeddings, paragraph
//! aggregates, co-occurrence graph), the embedder used for queries, and the
//! configuration. Everything it holds is immutable after construction; each
//! query computes its activation set and propagation vector from scratch.

use std::borrow::Cow;
use std::path::Path;

use crate::config::{ConfigResult, RetrievalConfig};
use crate::embed::index::EmbeddingIndex;
use crate::embed::{Embedder, encode_checked};
use crate::error::{EmbedError, RetrievalError, TriGraphResult};
use crate::extract::EntityExtractor;
use crate::graph::analytics::{self, GraphSummary};
use crate::graph::builder::GraphBuilder;
use crate::graph::persist::{load_graph, save_graph};
use crate::graph::{Paragraph, TriGraph};
use crate::retrieve::activation::activate;
use crate::retrieve::dense::dense_search;
use crate::retrieve::propagation::CooccurrenceGraph;
use crate::retrieve::ranker::{RankInput, RankedParagraph, Signals, rank};

/// Per-query overrides of the session configuration. `None` keeps the
/// configured value; the merged configuration is validated per query.
#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    /// Results to return; the configured `top_k` when `None`.
    pub top_k: Option<usize>,
    /// Activation rounds.
    pub rounds: Option<usize>,
    /// Sentences always taken during activation.
    pub top_r: Option<usize>,
    /// Activation similarity threshold.
    pub similarity_threshold: Option<f32>,
    /// PageRank restart probability.
    pub damping: Option<f64>,
    pub max_iters: Option<usize>,
    pub tolerance: Option<f64>,
    /// Similarity weight against graph coverage.
    pub beta: Option<f64>,
    /// Keyword bonus weight.
    pub gamma: Option<f64>,
    /// Negative-term penalty weight.
    pub delta: Option<f64>,
    /// Hard filter on or off.
    pub require_positive: Option<bool>,
}

fn set<T: Copy>(target: &mut T, value: Option<T>) {
    if let Some(v) = value {
        *target = v;
    }
}

/// Result of [`Session::query`].
#[derive(Debug, Clone)]
pub struct QueryOutcome {
    pub results: Vec<RankedParagraph>,
    /// Surface strings of the activated entities, in id order.
    pub activated: Vec<String>,
    /// Sentences selected during activation.
    pub activated_sentences: usize,
    pub propagation_iterations: usize,
    pub propagation_converged: bool,
    /// The hard filter had too few candidates and the whole corpus was
    /// ranked.
    pub filter_starved: bool,
}

pub struct Session {
    config: RetrievalConfig,
    graph: TriGraph,
    index: EmbeddingIndex,
    paragraph_embeddings: Vec<Vec<f32>>,
    cooccurrence: CooccurrenceGraph,
    embedder: Box<dyn Embedder>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("paragraphs", &self.graph.paragraphs().len())
            .field("sentences", &self.graph.sentences().len())
            .field("entities", &self.graph.entity_count())
            .field("dimension", &self.index.dimension())
            .finish()
    }
}

impl Session {
    /// Build a session from raw documents.
    pub fn build(
        docs: &[Paragraph],
        extractor: &dyn EntityExtractor,
        embedder: Box<dyn Embedder>,
        config: RetrievalConfig,
    ) -> TriGraphResult<Self> {
        config.validate()?;
        let graph = GraphBuilder::new(extractor).build(docs)?;
        let index = EmbeddingIndex::build(&graph, embedder.as_ref())?;
        Self::assemble(graph, index, embedder, config)
    }

    /// Load a session saved with [`Session::save`].
    ///
    /// Fails with [`RetrievalError::MissingIndex`] if a file is absent and
    /// with a dimension mismatch if the index does not fit the graph or the
    /// embedder.
    pub fn open(dir: &Path, embedder: Box<dyn Embedder>, config: RetrievalConfig) -> TriGraphResult<Self> {
        config.validate()?;
        let graph = load_graph(dir)?;
        let index = EmbeddingIndex::load(dir)?;
        Self::assemble(graph, index, embedder, config)
    }

    fn assemble(
        graph: TriGraph,
        index: EmbeddingIndex,
        embedder: Box<dyn Embedder>,
        config: RetrievalConfig,
    ) -> TriGraphResult<Self> {
        index.check_against(&graph)?;
        if embedder.dimension() != index.dimension() {
            return Err(RetrievalError::from(EmbedError::DimensionMismatch {
                expected: index.dimension(),
                actual: embedder.dimension(),
            })
            .into());
        }
        let paragraph_embeddings = index.paragraph_embeddings(&graph);
        let cooccurrence =
            CooccurrenceGraph::new(graph.sentence_entities(), graph.paragraph_entities())?;

        tracing::info!(
            paragraphs = graph.paragraphs().len(),
            sentences = graph.sentences().len(),
            entities = graph.entity_count(),
            edges = cooccurrence.weights().nnz() / 2,
            dimension = index.dimension(),
            "session ready"
        );

        Ok(Self {
            config,
            graph,
            index,
            paragraph_embeddings,
            cooccurrence,
            embedder,
        })
    }

    /// Persist graph and embeddings into `dir`.
    pub fn save(&self, dir: &Path) -> TriGraphResult<()> {
        save_graph(&self.graph, dir)?;
        self.index.save(dir)
    }

    pub fn graph(&self) -> &TriGraph {
        &self.graph
    }

    pub fn index(&self) -> &EmbeddingIndex {
        &self.index
    }

    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    pub fn paragraph_embeddings(&self) -> &[Vec<f32>] {
        &self.paragraph_embeddings
    }

    /// Co-occurrence summary with the `hubs` highest-degree entities.
    pub fn summary(&self, hubs: usize) -> TriGraphResult<GraphSummary> {
        Ok(analytics::summarize(&self.graph, hubs)?)
    }

    fn encode(&self, text: &str) -> Result<Vec<f32>, RetrievalError> {
        Ok(encode_checked(self.embedder.as_ref(), text, self.index.dimension())?)
    }

    fn top_k(&self, options: &QueryOptions) -> Result<usize, RetrievalError> {
        match options.top_k.unwrap_or(self.config.top_k) {
            0 => Err(RetrievalError::InvalidTopK),
            k => Ok(k),
        }
    }

    /// The session configuration with `options` applied.
    fn effective_config(&self, options: &QueryOptions) -> ConfigResult<RetrievalConfig> {
        let mut config = self.config.clone();
        set(&mut config.top_k, options.top_k);
        set(&mut config.activation.rounds, options.rounds);
        set(&mut config.activation.top_r, options.top_r);
        set(&mut config.activation.similarity_threshold, options.similarity_threshold);
        set(&mut config.propagation.damping, options.damping);
        set(&mut config.propagation.max_iters, options.max_iters);
        set(&mut config.propagation.tolerance, options.tolerance);
        set(&mut config.ranking.beta, options.beta);
        set(&mut config.ranking.gamma, options.gamma);
        set(&mut config.ranking.delta, options.delta);
        set(&mut config.ranking.require_positive, options.require_positive);
        config.validate()?;
        Ok(config)
    }

    /// Entity-grounded retrieval: activation, propagation, hybrid ranking.
    pub fn query(&self, query: &str, options: &QueryOptions) -> TriGraphResult<QueryOutcome> {
        let top_k = self.top_k(options)?;
        let config = self.effective_config(options)?;
        let query_vec = self.encode(query)?;

        let activation = activate(&self.graph, &self.index, &query_vec, &config.activation);
        let propagation = self
            .cooccurrence
            .propagate(&activation.entities, &config.propagation);

        let vocabulary = &self.config.vocabulary;
        let expanded = vocabulary.expand_query(query);
        let rank_vec = if matches!(expanded, Cow::Borrowed(_)) {
            query_vec
        } else {
            tracing::debug!(expanded = %expanded, "expanded query");
            self.encode(&expanded)?
        };

        let input = RankInput {
            paragraphs: self.graph.paragraphs(),
            embeddings: &self.paragraph_embeddings,
            incidence: self.graph.paragraph_entities(),
            propagation: &propagation.scores,
            query: &rank_vec,
        };
        let ranking = rank(&input, vocabulary, &config.ranking, top_k)?;

        let activated = activation
            .entities
            .iter()
            .filter_map(|&e| self.graph.entity_label(e))
            .map(str::to_string)
            .collect();

        tracing::debug!(
            activated = activation.entities.len(),
            iterations = propagation.iterations,
            converged = propagation.converged,
            candidates = ranking.candidates,
            returned = ranking.results.len(),
            "query complete"
        );

        Ok(QueryOutcome {
            results: ranking.results,
            activated,
            activated_sentences: activation.sentences.len(),
            propagation_iterations: propagation.iterations,
            propagation_converged: propagation.converged,
            filter_starved: ranking.filter_starved,
        })
    }

    /// Dense baseline: paragraphs by cosine similarity to the raw query.
    /// `score` equals `signals.similarity`; the other signals are zero.
    pub fn dense_query(&self, query: &str, top_k: usize) -> TriGraphResult<Vec<RankedParagraph>> {
        let top_k = self.top_k(&QueryOptions {
            top_k: Some(top_k),
            ..Default::default()
        })?;
        let query_vec = self.encode(query)?;
        let hits = dense_search(&self.paragraph_embeddings, &query_vec, top_k)?;
        Ok(hits
            .into_iter()
            .map(|hit| {
                let p = &self.graph.paragraphs()[hit.paragraph];
                let similarity = f64::from(hit.similarity);
                RankedParagraph {
                    id: p.id.clone(),
                    score: similarity,
                    text: p.text.clone(),
                    signals: Signals {
                        similarity,
                        ..Default::default()
                    },
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::embed::HashingEmbedder;
    use crate::error::{ConfigError, TriGraphError};
    use crate::extract::CapitalizedExtractor;
    use crate::retrieve::ranker::{RankParams, Vocabulary};

    fn config() -> RetrievalConfig {
        RetrievalConfig {
            embedding_dimension: 64,
            vocabulary: Vocabulary {
                detail_terms: vec!["vancomycin".into()],
                negative_terms: vec!["diabetes".into()],
                ..Vocabulary::empty()
            },
            ..Default::default()
        }
    }

    fn session() -> Session {
        let docs = vec![
            Paragraph::new("P1", "Vancomycin treats MRSA infections."),
            Paragraph::new("P2", "Diabetes is a metabolic disease."),
        ];
        let embedder = Box::new(HashingEmbedder::new(64).unwrap());
        Session::build(&docs, &CapitalizedExtractor, embedder, config()).unwrap()
    }

    #[test]
    fn drug_question_ranks_drug_paragraph_first() {
        let s = session();
        let out = s
            .query(
                "What drug treats MRSA?",
                &QueryOptions {
                    top_k: Some(2),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(out.results.len(), 2);
        assert_eq!(out.results[0].id, "P1");
        assert!(out.results[0].score > out.results[1].score);
        assert!(out.filter_starved);
        assert!(!out.activated.is_empty());
    }

    #[test]
    fn zero_top_k_is_rejected() {
        let s = session();
        let err = s
            .query(
                "MRSA",
                &QueryOptions {
                    top_k: Some(0),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, TriGraphError::Retrieval(RetrievalError::InvalidTopK)));
        assert!(s.dense_query("MRSA", 0).is_err());
    }

    #[test]
    fn dense_query_scores_are_similarities() {
        let s = session();
        let hits = s.dense_query("metabolic disease", 2).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, "P2");
        assert_eq!(hits[0].score, hits[0].signals.similarity);
        assert!(hits[0].score >= hits[1].score);
    }

    #[test]
    fn wrong_embedder_dimension_is_rejected_on_open() {
        let dir = tempfile::TempDir::new().unwrap();
        session().save(dir.path()).unwrap();
        let err = Session::open(
            dir.path(),
            Box::new(HashingEmbedder::new(32).unwrap()),
            config(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            TriGraphError::Retrieval(RetrievalError::Embed(EmbedError::DimensionMismatch {
                expected: 64,
                actual: 32
            }))
        ));
    }

    #[test]
    fn per_query_beta_overrides_the_session_weights() {
        let s = session();
        let q = "What drug treats MRSA?";
        let base = s.query(q, &QueryOptions::default()).unwrap();
        let semantic = s
            .query(
                q,
                &QueryOptions {
                    beta: Some(1.0),
                    ..Default::default()
                },
            )
            .unwrap();

        // β = 1 drops coverage: score = sim + γ·kw − δ·neg.
        let ranking = &s.config().ranking;
        for r in &semantic.results {
            let sig = &r.signals;
            let expected = sig.similarity + ranking.gamma * sig.keyword - ranking.delta * sig.negative;
            assert!((r.score - expected).abs() < 1e-9, "{} vs {expected}", r.score);
        }
        assert_ne!(
            base.results.iter().map(|r| r.score).collect::<Vec<_>>(),
            semantic.results.iter().map(|r| r.score).collect::<Vec<_>>()
        );
        // The session itself is unchanged.
        assert_eq!(s.config().ranking.beta, RankParams::default().beta);
    }

    #[test]
    fn per_query_damping_overrides_propagation() {
        let s = session();
        let out = s
            .query(
                "What drug treats MRSA?",
                &QueryOptions {
                    damping: Some(1.0),
                    ..Default::default()
                },
            )
            .unwrap();
        // Full restart returns the teleport vector after one step.
        assert_eq!(out.propagation_iterations, 1);
        assert!(out.propagation_converged);

        let capped = s
            .query(
                "What drug treats MRSA?",
                &QueryOptions {
                    max_iters: Some(1),
                    tolerance: Some(1e-12),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(capped.propagation_iterations, 1);
    }

    #[test]
    fn invalid_query_override_is_a_config_error() {
        let s = session();
        let err = s
            .query(
                "MRSA",
                &QueryOptions {
                    beta: Some(2.0),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, TriGraphError::Config(ConfigError::Invalid { .. })));
    }

    #[test]
    fn invalid_config_is_rejected_before_building() {
        let mut cfg = config();
        cfg.ranking.beta = 2.0;
        let docs = vec![Paragraph::new("P1", "Text.")];
        let err = Session::build(
            &docs,
            &CapitalizedExtractor,
            Box::new(HashingEmbedder::new(64).unwrap()),
            cfg,
        )
        .unwrap_err();
        assert!(matches!(err, TriGraphError::Config(_)));
    }
}
