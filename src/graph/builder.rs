//! Graph construction: paragraphs → sentences → entity mentions.
//!
//! Sentence splitting and entity extraction are independent per paragraph and
//! run on the rayon pool. Entity-id allocation is first-seen-wins and order
//! dependent, so it happens afterwards in a single sequential pass over the
//! joined results: paragraph order, then sentence order, then the sorted order
//! of the extractor's set. Rebuilding the same corpus with the same extractor
//! therefore always yields the same ids.

use std::collections::{BTreeSet, HashMap};

use rayon::prelude::*;

use crate::error::GraphError;
use crate::extract::EntityExtractor;

use super::sparse::CsrMatrix;
use super::{Paragraph, Sentence, TriGraph};

/// Split text at sentence boundaries (`.`, `!`, `?` followed by whitespace).
///
/// Pieces are trimmed and empty pieces are discarded.
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();

    let mut chars = text.chars().peekable();
    while let Some(ch) = chars.next() {
        current.push(ch);
        if matches!(ch, '.' | '!' | '?') && chars.peek().is_some_and(|c| c.is_whitespace()) {
            let trimmed = current.trim();
            if !trimmed.is_empty() {
                sentences.push(trimmed.to_string());
            }
            current.clear();
        }
    }
    let trimmed = current.trim();
    if !trimmed.is_empty() {
        sentences.push(trimmed.to_string());
    }
    sentences
}

/// Per-paragraph extraction result, produced in parallel.
struct ExtractedParagraph {
    sentences: Vec<(String, BTreeSet<String>)>,
}

/// Builds a [`TriGraph`] from documents using an entity extractor.
pub struct GraphBuilder<'a> {
    extractor: &'a dyn EntityExtractor,
}

impl<'a> GraphBuilder<'a> {
    pub fn new(extractor: &'a dyn EntityExtractor) -> Self {
        Self { extractor }
    }

    /// Build the graph. Fails with [`GraphError::EmptyCorpus`] on zero
    /// documents and with [`GraphError::Extraction`] if the extractor fails
    /// on any sentence.
    pub fn build(&self, docs: &[Paragraph]) -> Result<TriGraph, GraphError> {
        if docs.is_empty() {
            return Err(GraphError::EmptyCorpus);
        }

        let extracted: Vec<ExtractedParagraph> = docs
            .par_iter()
            .map(|doc| self.extract_paragraph(doc))
            .collect::<Result<_, _>>()?;

        let mut entities: Vec<String> = Vec::new();
        let mut entity_ids: HashMap<String, usize> = HashMap::new();
        let mut sentences: Vec<Sentence> = Vec::new();
        let mut sentence_pairs: Vec<(usize, usize)> = Vec::new();
        let mut paragraph_pairs: Vec<(usize, usize)> = Vec::new();

        for (p, para) in extracted.into_iter().enumerate() {
            let mut in_paragraph: BTreeSet<usize> = BTreeSet::new();
            for (text, surfaces) in para.sentences {
                let sid = sentences.len();
                sentences.push(Sentence { text, paragraph: p });
                for surface in surfaces {
                    let eid = match entity_ids.get(&surface) {
                        Some(&id) => id,
                        None => {
                            let id = entities.len();
                            entities.push(surface.clone());
                            entity_ids.insert(surface, id);
                            id
                        }
                    };
                    sentence_pairs.push((sid, eid));
                    in_paragraph.insert(eid);
                }
            }
            paragraph_pairs.extend(in_paragraph.into_iter().map(|e| (p, e)));
        }

        let m = CsrMatrix::from_pairs(sentences.len(), entities.len(), &sentence_pairs);
        let c = CsrMatrix::from_pairs(docs.len(), entities.len(), &paragraph_pairs);

        tracing::info!(
            paragraphs = docs.len(),
            sentences = sentences.len(),
            entities = entities.len(),
            mentions = m.nnz(),
            "built tripartite graph"
        );

        TriGraph::from_parts(docs.to_vec(), sentences, entities, m, c)
    }

    fn extract_paragraph(&self, doc: &Paragraph) -> Result<ExtractedParagraph, GraphError> {
        let sentences = split_sentences(&doc.text)
            .into_iter()
            .enumerate()
            .map(|(i, sentence)| {
                let surfaces = self
                    .extractor
                    .extract(&sentence)
                    .map_err(|e| GraphError::Extraction {
                        paragraph: doc.id.clone(),
                        sentence: i,
                        message: e.message,
                    })?
                    .into_iter()
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect();
                Ok((sentence, surfaces))
            })
            .collect::<Result<_, GraphError>>()?;
        Ok(ExtractedParagraph { sentences })
    }
}
