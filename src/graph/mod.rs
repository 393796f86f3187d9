//! Tripartite sentence–entity–paragraph graph.
//!
//! The graph is built once per corpus by [`builder::GraphBuilder`] and is
//! read-only afterwards. Two incidence matrices share one entity column space:
//!
//! - `M` (sentences × entities): entity mentioned in sentence
//! - `C` (paragraphs × entities): entity mentioned anywhere in paragraph

pub mod analytics;
pub mod builder;
pub mod persist;
pub mod sparse;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::GraphError;

use self::sparse::CsrMatrix;

/// Dense identifier of a unique entity surface string, in `[0, entity_count)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(transparent)]
pub struct EntityId(pub usize);

impl EntityId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// A retrievable document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paragraph {
    /// Opaque identifier from the corpus.
    pub id: String,
    /// Raw text.
    pub text: String,
}

impl Paragraph {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
        }
    }
}

/// One sentence of a paragraph. Its position in [`TriGraph::sentences`] is
/// its global sentence index and its row in `M`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sentence {
    pub text: String,
    /// Row of the owning paragraph in `C`.
    pub paragraph: usize,
}

/// The built graph: tables plus the two incidence matrices.
#[derive(Debug, Clone, PartialEq)]
pub struct TriGraph {
    paragraphs: Vec<Paragraph>,
    sentences: Vec<Sentence>,
    /// Surface strings in id order.
    entities: Vec<String>,
    entity_index: HashMap<String, EntityId>,
    /// Global sentence indices per paragraph, in order.
    paragraph_sentences: Vec<Vec<usize>>,
    sentence_entities: CsrMatrix,
    paragraph_entities: CsrMatrix,
}

impl TriGraph {
    /// Assemble a graph from its parts, checking that the tables and the
    /// matrix shapes agree.
    pub fn from_parts(
        paragraphs: Vec<Paragraph>,
        sentences: Vec<Sentence>,
        entities: Vec<String>,
        sentence_entities: CsrMatrix,
        paragraph_entities: CsrMatrix,
    ) -> Result<Self, GraphError> {
        sentence_entities.validate("M")?;
        paragraph_entities.validate("C")?;

        let expected_m = (sentences.len(), entities.len());
        if sentence_entities.shape() != expected_m {
            return Err(GraphError::ShapeMismatch {
                matrix: "M",
                expected: expected_m,
                actual: sentence_entities.shape(),
            });
        }
        let expected_c = (paragraphs.len(), entities.len());
        if paragraph_entities.shape() != expected_c {
            return Err(GraphError::ShapeMismatch {
                matrix: "C",
                expected: expected_c,
                actual: paragraph_entities.shape(),
            });
        }

        let mut paragraph_sentences = vec![Vec::new(); paragraphs.len()];
        for (sid, s) in sentences.iter().enumerate() {
            let Some(slot) = paragraph_sentences.get_mut(s.paragraph) else {
                return Err(GraphError::ShapeMismatch {
                    matrix: "sentence table",
                    expected: (paragraphs.len(), 0),
                    actual: (s.paragraph + 1, 0),
                });
            };
            slot.push(sid);
        }

        let entity_index = entities
            .iter()
            .enumerate()
            .map(|(i, e)| (e.clone(), EntityId(i)))
            .collect();

        Ok(Self {
            paragraphs,
            sentences,
            entities,
            entity_index,
            paragraph_sentences,
            sentence_entities,
            paragraph_entities,
        })
    }

    pub fn paragraphs(&self) -> &[Paragraph] {
        &self.paragraphs
    }

    pub fn sentences(&self) -> &[Sentence] {
        &self.sentences
    }

    /// Entity surface strings, indexed by [`EntityId`].
    pub fn entities(&self) -> &[String] {
        &self.entities
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn entity_id(&self, surface: &str) -> Option<EntityId> {
        self.entity_index.get(surface).copied()
    }

    pub fn entity_label(&self, id: EntityId) -> Option<&str> {
        self.entities.get(id.0).map(String::as_str)
    }

    /// Global sentence indices belonging to paragraph row `p`.
    pub fn sentences_of(&self, p: usize) -> &[usize] {
        self.paragraph_sentences
            .get(p)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Entities mentioned in sentence `s`.
    pub fn entities_of_sentence(&self, s: usize) -> impl Iterator<Item = EntityId> + '_ {
        self.sentence_entities.row(s).0.iter().map(|&e| EntityId(e))
    }

    /// Entities mentioned in paragraph row `p`.
    pub fn entities_of_paragraph(&self, p: usize) -> impl Iterator<Item = EntityId> + '_ {
        self.paragraph_entities.row(p).0.iter().map(|&e| EntityId(e))
    }

    /// Sentence–entity incidence `M`.
    pub fn sentence_entities(&self) -> &CsrMatrix {
        &self.sentence_entities
    }

    /// Paragraph–entity incidence `C`.
    pub fn paragraph_entities(&self) -> &CsrMatrix {
        &self.paragraph_entities
    }
}
