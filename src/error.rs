//! Rich diagnostic error types for the trigraph retrieval engine.
//!
//! Each subsystem defines its own error type with miette `#[diagnostic]` derives,
//! providing error codes, help text, and source chains so users know exactly what
//! went wrong and how to fix it.
//!
//! Only structural failures live here. Numerical shortfalls (an empty activation
//! set, a propagation that did not converge, a starved hard filter) are recovered
//! where they happen and reported as flags on the query outcome.

use miette::Diagnostic;
use thiserror::Error;

/// Top-level error type for the trigraph engine.
///
/// Each variant wraps a subsystem-specific error, preserving the full diagnostic
/// chain (error codes, help text, source spans) through to the user.
#[derive(Debug, Error, Diagnostic)]
pub enum TriGraphError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Embed(#[from] EmbedError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Retrieval(#[from] RetrievalError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Corpus(#[from] CorpusError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),
}

// ---------------------------------------------------------------------------
// Graph errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum GraphError {
    #[error("empty corpus: graph build requires at least one document")]
    #[diagnostic(
        code(trigraph::graph::empty_corpus),
        help(
            "The document sequence handed to the graph builder was empty. \
             Check that the corpus file exists and contains lines with text."
        )
    )]
    EmptyCorpus,

    #[error("entity extraction failed in paragraph \"{paragraph}\", sentence {sentence}: {message}")]
    #[diagnostic(
        code(trigraph::graph::extraction),
        help(
            "The entity extractor returned an error. Extraction failures are fatal \
             for the build and are not retried; fix the extractor input or model."
        )
    )]
    Extraction {
        paragraph: String,
        sentence: usize,
        message: String,
    },

    #[error("incidence shape mismatch for {matrix}: expected {expected:?}, got {actual:?}")]
    #[diagnostic(
        code(trigraph::graph::shape_mismatch),
        help(
            "The persisted incidence matrices disagree with the metadata tables. \
             The index directory is inconsistent; rebuild it from the corpus."
        )
    )]
    ShapeMismatch {
        matrix: &'static str,
        expected: (usize, usize),
        actual: (usize, usize),
    },
}

/// Failure reported by an entity-extraction collaborator.
#[derive(Debug, Error, Diagnostic)]
#[error("entity extractor error: {message}")]
#[diagnostic(code(trigraph::extract::failed))]
pub struct ExtractError {
    pub message: String,
}

impl ExtractError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Embedding errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum EmbedError {
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    #[diagnostic(
        code(trigraph::embed::dim_mismatch),
        help(
            "All embeddings in one index must share the same dimension. \
             Rebuild the index with the embedder you query with."
        )
    )]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("embedder failed to encode text: {message}")]
    #[diagnostic(
        code(trigraph::embed::encode),
        help("The embedding collaborator reported an error. Check its configuration.")
    )]
    Encode { message: String },

    #[error("embedder dimension must be > 0")]
    #[diagnostic(
        code(trigraph::embed::zero_dimension),
        help("Configure a positive `embedding_dimension`.")
    )]
    ZeroDimension,
}

// ---------------------------------------------------------------------------
// Retrieval errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum RetrievalError {
    #[error("missing index: {path}")]
    #[diagnostic(
        code(trigraph::retrieval::missing_index),
        help(
            "No graph or embedding index exists at this location. \
             Run `trigraph build --corpus <docs.jsonl> --index-dir <dir>` first."
        )
    )]
    MissingIndex { path: String },

    #[error("{what} count mismatch: index has {index}, corpus has {corpus}")]
    #[diagnostic(
        code(trigraph::retrieval::dim_mismatch),
        help(
            "The embedding index was built against a different corpus than the graph. \
             Rebuild both from the same documents."
        )
    )]
    DimensionMismatch {
        what: &'static str,
        index: usize,
        corpus: usize,
    },

    #[error("top_k must be > 0")]
    #[diagnostic(
        code(trigraph::retrieval::invalid_top_k),
        help("Request at least one result.")
    )]
    InvalidTopK,

    #[error(transparent)]
    #[diagnostic(transparent)]
    Embed(#[from] EmbedError),
}

// ---------------------------------------------------------------------------
// Store errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    #[diagnostic(
        code(trigraph::store::io),
        help(
            "A filesystem operation failed. Check that the index directory exists, \
             has correct permissions, and that the disk is not full."
        )
    )]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("serialization error in {path}: {message}")]
    #[diagnostic(
        code(trigraph::store::serde),
        help(
            "Failed to serialize or deserialize index data. \
             This usually means the index format has changed between versions. \
             Rebuild the index."
        )
    )]
    Serialization { path: String, message: String },
}

// ---------------------------------------------------------------------------
// Corpus errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum CorpusError {
    #[error("failed to read corpus {path}")]
    #[diagnostic(
        code(trigraph::corpus::io),
        help("Ensure the corpus file exists and is readable.")
    )]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed JSON on line {line} of {path}: {message}")]
    #[diagnostic(
        code(trigraph::corpus::parse),
        help("Each non-blank line must be a JSON object with an id and a text field.")
    )]
    Parse {
        path: String,
        line: usize,
        message: String,
    },
}

// ---------------------------------------------------------------------------
// Config errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("failed to read config: {path}")]
    #[diagnostic(
        code(trigraph::config::read),
        help("Ensure the config file exists and is valid TOML.")
    )]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write config: {path}")]
    #[diagnostic(
        code(trigraph::config::write),
        help("Check that the target directory is writable.")
    )]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {message}")]
    #[diagnostic(
        code(trigraph::config::parse),
        help("Check the TOML syntax and field names in the config file.")
    )]
    Parse { path: String, message: String },

    #[error("invalid configuration: {message}")]
    #[diagnostic(
        code(trigraph::config::invalid),
        help("Check the retrieval config fields against their documented ranges.")
    )]
    Invalid { message: String },
}

/// Convenience alias for functions returning trigraph results.
pub type TriGraphResult<T> = std::result::Result<T, TriGraphError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn graph_error_converts_to_top_level() {
        let err: TriGraphError = GraphError::EmptyCorpus.into();
        assert!(matches!(err, TriGraphError::Graph(GraphError::EmptyCorpus)));
    }

    #[test]
    fn retrieval_error_wraps_embed_error() {
        let inner = EmbedError::DimensionMismatch {
            expected: 384,
            actual: 128,
        };
        let err: RetrievalError = inner.into();
        assert!(matches!(
            err,
            RetrievalError::Embed(EmbedError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn error_display_messages_are_descriptive() {
        let err = RetrievalError::DimensionMismatch {
            what: "sentence embedding",
            index: 10,
            corpus: 12,
        };
        let msg = format!("{err}");
        assert!(msg.contains("sentence embedding"));
        assert!(msg.contains("10"));
        assert!(msg.contains("12"));
    }
}
