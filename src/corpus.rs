//! JSONL corpus loading and corpus statistics.
//!
//! One JSON object per line. Field fallbacks:
//!
//! - id: `id`, `pid`, `pmid` (strings or numbers); otherwise `doc_<line>`
//! - text: `text`, `abstract`, `body`, `content`; an optional `title` is
//!   prefixed
//!
//! Text is NFC-normalized and newlines are flattened to spaces.

use std::io::{BufRead, BufReader};
use std::path::Path;

use serde::Serialize;
use serde_json::Value;
use unicode_normalization::UnicodeNormalization;

use crate::error::CorpusError;
use crate::graph::Paragraph;
use crate::retrieve::ranker::Vocabulary;

const ID_FIELDS: &[&str] = &["id", "pid", "pmid"];
const TEXT_FIELDS: &[&str] = &["text", "abstract", "body", "content"];

/// Load every document of a JSONL file.
pub fn load_jsonl(path: &Path) -> Result<Vec<Paragraph>, CorpusError> {
    let file = std::fs::File::open(path).map_err(|source| CorpusError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let docs = parse_jsonl(BufReader::new(file), &path.display().to_string())?;
    tracing::info!(path = %path.display(), documents = docs.len(), "loaded corpus");
    Ok(docs)
}

/// Parse JSONL from any reader. `origin` names the source in errors.
pub fn parse_jsonl(reader: impl BufRead, origin: &str) -> Result<Vec<Paragraph>, CorpusError> {
    let mut docs = Vec::new();
    for (i, line) in reader.lines().enumerate() {
        let line_no = i + 1;
        let line = line.map_err(|source| CorpusError::Io {
            path: origin.to_string(),
            source,
        })?;
        if line.trim().is_empty() {
            continue;
        }
        let value: Value = serde_json::from_str(&line).map_err(|e| CorpusError::Parse {
            path: origin.to_string(),
            line: line_no,
            message: e.to_string(),
        })?;
        let Some(obj) = value.as_object() else {
            return Err(CorpusError::Parse {
                path: origin.to_string(),
                line: line_no,
                message: "expected a JSON object".into(),
            });
        };

        let Some(text) = first_string(obj, TEXT_FIELDS).filter(|t| !t.trim().is_empty()) else {
            tracing::warn!(line = line_no, "skipping corpus line without text");
            continue;
        };
        let text = match first_string(obj, &["title"]).filter(|t| !t.trim().is_empty()) {
            Some(title) => format!("{}. {}", title.trim().trim_end_matches('.'), text),
            None => text,
        };
        let id = first_string(obj, ID_FIELDS).unwrap_or_else(|| format!("doc_{line_no}"));
        docs.push(Paragraph::new(id, clean_text(&text)));
    }
    Ok(docs)
}

fn first_string(obj: &serde_json::Map<String, Value>, fields: &[&str]) -> Option<String> {
    fields.iter().find_map(|f| match obj.get(*f)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

/// NFC, newlines to spaces, runs of whitespace collapsed.
pub fn clean_text(text: &str) -> String {
    let nfc: String = text.nfc().collect();
    nfc.split_whitespace().collect::<Vec<_>>().join(" ")
}

// ---------------------------------------------------------------------------
// Statistics
// ---------------------------------------------------------------------------

/// Corpus-level summary, in characters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorpusStats {
    pub documents: usize,
    pub mean_length: f64,
    pub median_length: f64,
    pub max_length: usize,
    /// Documents containing at least one positive vocabulary term.
    pub with_positive: usize,
    /// Documents containing at least one negative vocabulary term.
    pub with_negative: usize,
}

impl std::fmt::Display for CorpusStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "documents:      {}", self.documents)?;
        writeln!(
            f,
            "text length:    mean {:.1}, median {:.1}, max {}",
            self.mean_length, self.median_length, self.max_length
        )?;
        writeln!(f, "with positive:  {}", self.with_positive)?;
        write!(f, "with negative:  {}", self.with_negative)
    }
}

pub fn corpus_stats(docs: &[Paragraph], vocabulary: &Vocabulary) -> CorpusStats {
    let mut lengths: Vec<usize> = docs.iter().map(|d| d.text.chars().count()).collect();
    lengths.sort_unstable();
    let n = lengths.len();
    let mean_length = if n == 0 {
        0.0
    } else {
        lengths.iter().sum::<usize>() as f64 / n as f64
    };
    let median_length = match n {
        0 => 0.0,
        _ if n % 2 == 1 => lengths[n / 2] as f64,
        _ => (lengths[n / 2 - 1] + lengths[n / 2]) as f64 / 2.0,
    };

    let mut with_positive = 0;
    let mut with_negative = 0;
    for doc in docs {
        let counts = vocabulary.counts(&doc.text);
        if counts.positive() > 0 {
            with_positive += 1;
        }
        if counts.negative > 0 {
            with_negative += 1;
        }
    }

    CorpusStats {
        documents: n,
        mean_length,
        median_length,
        max_length: lengths.last().copied().unwrap_or(0),
        with_positive,
        with_negative,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(input: &str) -> Result<Vec<Paragraph>, CorpusError> {
        parse_jsonl(input.as_bytes(), "test.jsonl")
    }

    #[test]
    fn field_fallbacks() {
        let docs = parse(concat!(
            "{\"id\": \"a\", \"text\": \"First.\"}\n",
            "{\"pmid\": 12345, \"abstract\": \"Second.\"}\n",
            "\n",
            "{\"pid\": \"c\", \"title\": \"Title\", \"body\": \"Third.\"}\n",
            "{\"content\": \"Fifth.\"}\n",
        ))
        .unwrap();
        let got: Vec<(&str, &str)> = docs.iter().map(|d| (d.id.as_str(), d.text.as_str())).collect();
        assert_eq!(
            got,
            vec![
                ("a", "First."),
                ("12345", "Second."),
                ("c", "Title. Third."),
                ("doc_5", "Fifth."),
            ]
        );
    }

    #[test]
    fn lines_without_text_are_skipped() {
        let docs = parse("{\"id\": \"a\"}\n{\"id\": \"b\", \"text\": \"  \"}\n{\"id\": \"c\", \"text\": \"x\"}\n").unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].id, "c");
    }

    #[test]
    fn malformed_line_reports_line_number() {
        let err = parse("{\"id\": \"a\", \"text\": \"ok\"}\n{not json\n").unwrap_err();
        assert!(matches!(err, CorpusError::Parse { line: 2, .. }));
        let err = parse("[1, 2]\n").unwrap_err();
        assert!(matches!(err, CorpusError::Parse { line: 1, .. }));
    }

    #[test]
    fn text_is_normalized_and_flattened() {
        // "e" + combining acute composes to U+00E9 under NFC.
        let docs = parse("{\"id\": \"a\", \"text\": \"Caf\\u0065\\u0301\\nau lait\"}\n").unwrap();
        assert_eq!(docs[0].text, "Caf\u{e9} au lait");
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let err = load_jsonl(&dir.path().join("absent.jsonl")).unwrap_err();
        assert!(matches!(err, CorpusError::Io { .. }));
    }

    #[test]
    fn stats_summarize_lengths_and_vocabulary() {
        let docs = vec![
            Paragraph::new("a", "MRSA vancomycin"),
            Paragraph::new("b", "diabetes"),
            Paragraph::new("c", "abcd"),
        ];
        let stats = corpus_stats(&docs, &Vocabulary::default());
        assert_eq!(stats.documents, 3);
        assert_eq!(stats.max_length, 15);
        assert_eq!(stats.median_length, 8.0);
        assert_eq!(stats.with_positive, 1);
        assert_eq!(stats.with_negative, 1);
    }

    #[test]
    fn stats_of_empty_corpus() {
        let stats = corpus_stats(&[], &Vocabulary::default());
        assert_eq!(stats.documents, 0);
        assert_eq!(stats.mean_length, 0.0);
    }
}
