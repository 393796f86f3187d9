//! Hybrid paragraph ranking.
//!
//! Four per-paragraph signals, each scaled to `[0, 1]` across the corpus:
//!
//! | signal     | source                                              |
//! |------------|-----------------------------------------------------|
//! | `sim`      | cosine(paragraph vector, expanded query), min–max   |
//! | `coverage` | `C[p,:]·r` for the propagation vector `r`, ÷ max    |
//! | `keyword`  | weighted positive-vocabulary occurrences, ÷ max     |
//! | `negative` | negative-vocabulary occurrences, ÷ max              |
//!
//! `score = β·sim + (1−β)·coverage + γ·keyword − δ·negative`
//!
//! With the hard filter on, only paragraphs containing a positive term are
//! ranked, unless fewer than `max(top_k, min_filtered)` qualify, in which case
//! the whole corpus is ranked instead.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use crate::embed::dot;
use crate::error::RetrievalError;
use crate::graph::Paragraph;
use crate::graph::sparse::CsrMatrix;

const STAPH_TERMS: &[&str] = &[
    "staphylococcus",
    "staphylococcal",
    "staph",
    "s. aureus",
    "staphylococcus aureus",
    "mrsa",
    "mssa",
];

const ANTIBIOTIC_TERMS: &[&str] = &[
    "nafcillin",
    "oxacillin",
    "dicloxacillin",
    "flucloxacillin",
    "cloxacillin",
    "cefazolin",
    "cephalexin",
    "vancomycin",
    "linezolid",
    "daptomycin",
    "teicoplanin",
    "ceftaroline",
    "clindamycin",
    "doxycycline",
    "trimethoprim-sulfamethoxazole",
    "tmp-smx",
    "co-trimoxazole",
    "cotrimoxazole",
    "trimethoprim",
    "sulfamethoxazole",
    "rifampin",
    "rifampicin",
    "gentamicin",
    "tetracycline",
];

const OFF_TOPIC_TERMS: &[&str] = &[
    "diabetes",
    "cancer",
    "immunotherapy",
    "exposure",
    "association",
    "risk",
    "microbiota",
    "observational",
    "cohort",
];

const EXPANSION_TRIGGERS: &[&str] = &["staphyl", "aureus", "mrsa", "mssa"];

fn owned(terms: &[&str]) -> Vec<String> {
    terms.iter().map(|t| t.to_string()).collect()
}

/// Lexical vocabularies. Matching is case-insensitive substring matching.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Vocabulary {
    /// Positive terms naming the topic; weighted by `topic_weight`.
    pub topic_terms: Vec<String>,
    /// Positive terms naming details (e.g. drugs); weighted by `detail_weight`.
    pub detail_terms: Vec<String>,
    /// Terms whose occurrences are penalized.
    pub negative_terms: Vec<String>,
    /// A query containing any of these gets all positive terms appended
    /// before it is embedded.
    pub expansion_triggers: Vec<String>,
}

impl Default for Vocabulary {
    fn default() -> Self {
        Self {
            topic_terms: owned(STAPH_TERMS),
            detail_terms: owned(ANTIBIOTIC_TERMS),
            negative_terms: owned(OFF_TOPIC_TERMS),
            expansion_triggers: owned(EXPANSION_TRIGGERS),
        }
    }
}

impl Vocabulary {
    /// A vocabulary with no terms at all.
    pub fn empty() -> Self {
        Self {
            topic_terms: Vec::new(),
            detail_terms: Vec::new(),
            negative_terms: Vec::new(),
            expansion_triggers: Vec::new(),
        }
    }

    /// All positive terms, topic first.
    pub fn positive_terms(&self) -> impl Iterator<Item = &str> {
        self.topic_terms
            .iter()
            .chain(&self.detail_terms)
            .map(String::as_str)
    }

    /// Append every positive term to `query` if it contains a trigger.
    pub fn expand_query<'q>(&self, query: &'q str) -> Cow<'q, str> {
        let lower = query.to_lowercase();
        let triggered = self
            .expansion_triggers
            .iter()
            .any(|t| !t.is_empty() && lower.contains(&t.to_lowercase()));
        if !triggered {
            return Cow::Borrowed(query);
        }
        let mut expanded = query.to_string();
        for term in self.positive_terms() {
            expanded.push(' ');
            expanded.push_str(term);
        }
        Cow::Owned(expanded)
    }

    /// Raw lexical counts for one text.
    pub fn counts(&self, text: &str) -> LexicalCounts {
        let lower = text.to_lowercase();
        LexicalCounts {
            topic: count_all(&lower, &self.topic_terms),
            detail: count_all(&lower, &self.detail_terms),
            negative: count_all(&lower, &self.negative_terms),
        }
    }
}

/// Non-overlapping occurrences of every term in already-lowercased text.
fn count_all(lower: &str, terms: &[String]) -> usize {
    terms
        .iter()
        .filter(|t| !t.is_empty())
        .map(|t| lower.matches(t.to_lowercase().as_str()).count())
        .sum()
}

/// Raw per-paragraph occurrence counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LexicalCounts {
    pub topic: usize,
    pub detail: usize,
    pub negative: usize,
}

impl LexicalCounts {
    pub fn positive(&self) -> usize {
        self.topic + self.detail
    }
}

/// Weights and policy for [`rank`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RankParams {
    /// β: semantic similarity vs. graph coverage, in `[0, 1]`.
    pub beta: f64,
    /// γ: keyword bonus.
    pub gamma: f64,
    /// δ: negative-term penalty.
    pub delta: f64,
    /// Restrict candidates to paragraphs with a positive term.
    pub require_positive: bool,
    /// Lower bound on the filtered set size before falling back.
    pub min_filtered: usize,
    pub topic_weight: f64,
    pub detail_weight: f64,
}

impl Default for RankParams {
    fn default() -> Self {
        Self {
            beta: 0.30,
            gamma: 1.20,
            delta: 0.50,
            require_positive: true,
            min_filtered: 3,
            topic_weight: 2.0,
            detail_weight: 1.0,
        }
    }
}

/// Normalized component signals of one paragraph's score.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Signals {
    pub similarity: f64,
    pub coverage: f64,
    pub keyword: f64,
    pub negative: f64,
}

/// One ranked result.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedParagraph {
    pub id: String,
    pub score: f64,
    pub text: String,
    pub signals: Signals,
}

/// Ranked results plus diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub struct Ranking {
    pub results: Vec<RankedParagraph>,
    /// The hard filter was enabled but too few paragraphs qualified, so the
    /// whole corpus was ranked.
    pub filter_starved: bool,
    /// Number of paragraphs that were ranked.
    pub candidates: usize,
}

/// Everything the ranker reads, borrowed from the session.
pub struct RankInput<'a> {
    pub paragraphs: &'a [Paragraph],
    /// Aggregate unit vector per paragraph, aligned with `paragraphs`.
    pub embeddings: &'a [Vec<f32>],
    /// Paragraph–entity incidence `C`.
    pub incidence: &'a CsrMatrix,
    /// Propagation vector over entities.
    pub propagation: &'a [f64],
    /// Embedding of the (expanded) query.
    pub query: &'a [f32],
}

impl RankInput<'_> {
    fn check(&self) -> Result<(), RetrievalError> {
        let n = self.paragraphs.len();
        if self.embeddings.len() != n {
            return Err(RetrievalError::DimensionMismatch {
                what: "paragraph embedding",
                index: self.embeddings.len(),
                corpus: n,
            });
        }
        if self.incidence.shape().0 != n {
            return Err(RetrievalError::DimensionMismatch {
                what: "paragraph incidence row",
                index: self.incidence.shape().0,
                corpus: n,
            });
        }
        if self.propagation.len() != self.incidence.shape().1 {
            return Err(RetrievalError::DimensionMismatch {
                what: "propagation entity",
                index: self.propagation.len(),
                corpus: self.incidence.shape().1,
            });
        }
        if let Some(bad) = self.embeddings.iter().find(|e| e.len() != self.query.len()) {
            return Err(crate::error::EmbedError::DimensionMismatch {
                expected: self.query.len(),
                actual: bad.len(),
            }
            .into());
        }
        Ok(())
    }
}

fn min_max(values: &[f64]) -> Vec<f64> {
    let lo = values.iter().copied().fold(f64::INFINITY, f64::min);
    let hi = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let range = hi - lo;
    if !(range > 0.0) {
        return vec![0.0; values.len()];
    }
    values.iter().map(|v| (v - lo) / range).collect()
}

fn divide_by_max(values: &[f64]) -> Vec<f64> {
    let hi = values.iter().copied().fold(0.0f64, f64::max);
    if hi <= 0.0 {
        return vec![0.0; values.len()];
    }
    values.iter().map(|v| v / hi).collect()
}

/// Rank paragraphs. Output is the top `top_k` by descending score; equal
/// scores keep corpus order.
pub fn rank(
    input: &RankInput<'_>,
    vocabulary: &Vocabulary,
    params: &RankParams,
    top_k: usize,
) -> Result<Ranking, RetrievalError> {
    if top_k == 0 {
        return Err(RetrievalError::InvalidTopK);
    }
    input.check()?;

    let sims: Vec<f64> = input
        .embeddings
        .iter()
        .map(|e| f64::from(dot(e, input.query)))
        .collect();
    let sim = min_max(&sims);
    let coverage = divide_by_max(&input.incidence.mul_vec(input.propagation));

    let counts: Vec<LexicalCounts> = input
        .paragraphs
        .iter()
        .map(|p| vocabulary.counts(&p.text))
        .collect();
    let keyword_raw: Vec<f64> = counts
        .iter()
        .map(|c| params.topic_weight * c.topic as f64 + params.detail_weight * c.detail as f64)
        .collect();
    let negative_raw: Vec<f64> = counts.iter().map(|c| c.negative as f64).collect();
    let keyword = divide_by_max(&keyword_raw);
    let negative = divide_by_max(&negative_raw);

    let score: Vec<f64> = (0..input.paragraphs.len())
        .map(|p| {
            params.beta * sim[p] + (1.0 - params.beta) * coverage[p] + params.gamma * keyword[p]
                - params.delta * negative[p]
        })
        .collect();

    let all: Vec<usize> = (0..input.paragraphs.len()).collect();
    let mut filter_starved = false;
    let mut candidates = all.clone();
    if params.require_positive {
        let filtered: Vec<usize> = all.iter().copied().filter(|&p| counts[p].positive() > 0).collect();
        let needed = top_k.max(params.min_filtered);
        if filtered.len() >= needed {
            candidates = filtered;
        } else {
            filter_starved = true;
            tracing::debug!(
                qualified = filtered.len(),
                needed,
                "hard filter starved; ranking all paragraphs"
            );
        }
    }

    let ranked = candidates.len();
    candidates.sort_by(|&a, &b| score[b].total_cmp(&score[a]));
    candidates.truncate(top_k);

    let results = candidates
        .into_iter()
        .map(|p| RankedParagraph {
            id: input.paragraphs[p].id.clone(),
            score: score[p],
            text: input.paragraphs[p].text.clone(),
            signals: Signals {
                similarity: sim[p],
                coverage: coverage[p],
                keyword: keyword[p],
                negative: negative[p],
            },
        })
        .collect();

    Ok(Ranking {
        results,
        filter_starved,
        candidates: ranked,
    })
}
