//! On-disk layout of a built graph.
//!
//! An index directory holds two graph files:
//!
//! - `index_meta.json`: paragraph table, sentence table, entity table
//! - `index_tri_graph.bin`: the `M` and `C` incidence matrices (bincode CSR)
//!
//! Loading re-checks every shape, so a graph that loads is one that
//! [`TriGraph::from_parts`] accepts.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{RetrievalError, StoreError, TriGraphResult};

use super::sparse::CsrMatrix;
use super::{Paragraph, Sentence, TriGraph};

pub const META_FILE: &str = "index_meta.json";
pub const MATRIX_FILE: &str = "index_tri_graph.bin";

#[derive(Serialize, Deserialize)]
struct GraphMeta {
    paragraphs: Vec<Paragraph>,
    sentences: Vec<Sentence>,
    /// Surface strings in id order.
    entities: Vec<String>,
}

#[derive(Serialize, Deserialize)]
struct IncidenceMatrices {
    sentence_entities: CsrMatrix,
    paragraph_entities: CsrMatrix,
}

/// Write `graph` into `dir`, creating the directory if needed.
pub fn save_graph(graph: &TriGraph, dir: &Path) -> TriGraphResult<()> {
    std::fs::create_dir_all(dir).map_err(|e| io_error(dir, e))?;

    let meta = GraphMeta {
        paragraphs: graph.paragraphs().to_vec(),
        sentences: graph.sentences().to_vec(),
        entities: graph.entities().to_vec(),
    };
    let meta_path = dir.join(META_FILE);
    let json = serde_json::to_vec(&meta).map_err(|e| serde_error(&meta_path, e))?;
    std::fs::write(&meta_path, json).map_err(|e| io_error(&meta_path, e))?;

    let matrices = IncidenceMatrices {
        sentence_entities: graph.sentence_entities().clone(),
        paragraph_entities: graph.paragraph_entities().clone(),
    };
    let matrix_path = dir.join(MATRIX_FILE);
    let bytes = bincode::serialize(&matrices).map_err(|e| serde_error(&matrix_path, e))?;
    std::fs::write(&matrix_path, bytes).map_err(|e| io_error(&matrix_path, e))?;

    tracing::info!(dir = %dir.display(), "saved graph");
    Ok(())
}

/// Load a graph previously written by [`save_graph`].
///
/// Fails with [`RetrievalError::MissingIndex`] if either file is absent.
pub fn load_graph(dir: &Path) -> TriGraphResult<TriGraph> {
    let meta_path = dir.join(META_FILE);
    let matrix_path = dir.join(MATRIX_FILE);
    for path in [&meta_path, &matrix_path] {
        if !path.is_file() {
            return Err(RetrievalError::MissingIndex {
                path: path.display().to_string(),
            }
            .into());
        }
    }

    let json = std::fs::read(&meta_path).map_err(|e| io_error(&meta_path, e))?;
    let meta: GraphMeta = serde_json::from_slice(&json).map_err(|e| serde_error(&meta_path, e))?;

    let bytes = std::fs::read(&matrix_path).map_err(|e| io_error(&matrix_path, e))?;
    let matrices: IncidenceMatrices =
        bincode::deserialize(&bytes).map_err(|e| serde_error(&matrix_path, e))?;

    let graph = TriGraph::from_parts(
        meta.paragraphs,
        meta.sentences,
        meta.entities,
        matrices.sentence_entities,
        matrices.paragraph_entities,
    )?;
    tracing::info!(
        dir = %dir.display(),
        paragraphs = graph.paragraphs().len(),
        entities = graph.entity_count(),
        "loaded graph"
    );
    Ok(graph)
}

pub(crate) fn io_error(path: &Path, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.display().to_string(),
        source,
    }
}

pub(crate) fn serde_error(path: &Path, e: impl std::fmt::Display) -> StoreError {
    StoreError::Serialization {
        path: path.display().to_string(),
        message: e.to_string(),
    }
}
