//! Entity extraction collaborators.
//!
//! The graph builder treats whatever an [`EntityExtractor`] returns as ground
//! truth; no canonicalization happens downstream. Two deterministic extractors
//! ship with the crate so that indexes can be built without a model runtime:
//!
//! - [`CapitalizedExtractor`]: capitalized phrases and acronyms
//! - [`GazetteerExtractor`]: a fixed term list, matched case-insensitively

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::{Regex, RegexBuilder};

use crate::error::ExtractError;

/// Produces the set of entity surface strings mentioned in a sentence.
///
/// Implementations must be shareable across rayon workers.
pub trait EntityExtractor: Send + Sync {
    fn extract(&self, sentence: &str) -> Result<BTreeSet<String>, ExtractError>;
}

impl<F> EntityExtractor for F
where
    F: Fn(&str) -> Result<BTreeSet<String>, ExtractError> + Send + Sync,
{
    fn extract(&self, sentence: &str) -> Result<BTreeSet<String>, ExtractError> {
        self(sentence)
    }
}

// ── Capitalized phrases ─────────────────────────────────────────────────

static RE_CAPITALIZED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b[A-Z][A-Za-z0-9]*(?:[-'][A-Za-z0-9]+)*(?:\s+[A-Z][A-Za-z0-9]*(?:[-'][A-Za-z0-9]+)*)*").unwrap()
});

/// Words that open sentences or questions without naming anything.
const LEADING_STOPWORDS: &[&str] = &[
    "A", "An", "And", "Are", "As", "At", "But", "By", "Can", "Could", "Did", "Do", "Does", "For",
    "From", "How", "I", "If", "In", "Is", "It", "Its", "Of", "On", "Or", "Should", "So", "That",
    "The", "Their", "There", "These", "They", "This", "Those", "To", "Was", "We", "Were", "What",
    "When", "Where", "Which", "Who", "Whom", "Whose", "Why", "Will", "With", "Would",
];

/// Extracts runs of capitalized words ("Staphylococcus Aureus") and acronyms
/// ("MRSA"), dropping leading function words such as "The" or "What".
#[derive(Debug, Clone, Default)]
pub struct CapitalizedExtractor;

impl EntityExtractor for CapitalizedExtractor {
    fn extract(&self, sentence: &str) -> Result<BTreeSet<String>, ExtractError> {
        let mut out = BTreeSet::new();
        for m in RE_CAPITALIZED.find_iter(sentence) {
            let words: Vec<&str> = m
                .as_str()
                .split_whitespace()
                .skip_while(|w| LEADING_STOPWORDS.contains(w))
                .collect();
            if words.is_empty() {
                continue;
            }
            let phrase = words.join(" ");
            if !phrase.trim().is_empty() {
                out.insert(phrase);
            }
        }
        Ok(out)
    }
}

// ── Gazetteer ───────────────────────────────────────────────────────────

/// Matches a fixed list of terms on word boundaries, ignoring case, and
/// reports the term as configured (so "VANCOMYCIN" in text yields the
/// configured "vancomycin").
#[derive(Debug, Clone)]
pub struct GazetteerExtractor {
    terms: Vec<String>,
    pattern: Option<Regex>,
}

impl GazetteerExtractor {
    pub fn new<I, S>(terms: I) -> Result<Self, ExtractError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut terms: Vec<String> = terms
            .into_iter()
            .map(Into::into)
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();
        // Longest first so "staphylococcus aureus" wins over "staphylococcus".
        terms.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        terms.dedup();

        let pattern = if terms.is_empty() {
            None
        } else {
            let alternation = terms
                .iter()
                .map(|t| regex::escape(t))
                .collect::<Vec<_>>()
                .join("|");
            let re = RegexBuilder::new(&format!(r"\b(?:{alternation})\b"))
                .case_insensitive(true)
                .build()
                .map_err(|e| ExtractError::new(format!("invalid gazetteer pattern: {e}")))?;
            Some(re)
        };
        Ok(Self { terms, pattern })
    }

    pub fn terms(&self) -> &[String] {
        &self.terms
    }
}

impl EntityExtractor for GazetteerExtractor {
    fn extract(&self, sentence: &str) -> Result<BTreeSet<String>, ExtractError> {
        let Some(re) = &self.pattern else {
            return Ok(BTreeSet::new());
        };
        let mut out = BTreeSet::new();
        for m in re.find_iter(sentence) {
            let hit = m.as_str().to_lowercase();
            if let Some(term) = self.terms.iter().find(|t| t.to_lowercase() == hit) {
                out.insert(term.clone());
            }
        }
        Ok(out)
    }
}
