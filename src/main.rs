//! trigraph CLI: entity-grounded paragraph retrieval.

use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use miette::{IntoDiagnostic, Result};

use trigraph::config::RetrievalConfig;
use trigraph::corpus::{corpus_stats, load_jsonl};
use trigraph::embed::HashingEmbedder;
use trigraph::extract::{CapitalizedExtractor, EntityExtractor, GazetteerExtractor};
use trigraph::retrieve::ranker::RankedParagraph;
use trigraph::session::{QueryOptions, Session};

#[derive(Parser)]
#[command(name = "trigraph", version, about = "Entity-grounded paragraph retrieval")]
struct Cli {
    /// Retrieval config file (TOML). Defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Embedding dimension; overrides the config file.
    #[arg(long, global = true)]
    dimension: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build graph and embedding index from a JSONL corpus.
    Build {
        /// JSONL corpus, one document per line.
        #[arg(long)]
        corpus: PathBuf,

        /// Output directory for the index files.
        #[arg(long)]
        index_dir: PathBuf,

        /// Term list (one per line) to extract entities with instead of the
        /// capitalized-phrase extractor.
        #[arg(long)]
        gazetteer: Option<PathBuf>,
    },

    /// Rank paragraphs for a question with graph-grounded retrieval.
    Query {
        /// Question text.
        query: String,

        #[arg(long)]
        index_dir: PathBuf,

        #[command(flatten)]
        tunables: Tunables,

        /// Print the activated entities and propagation diagnostics.
        #[arg(long)]
        explain: bool,
    },

    /// Rank paragraphs by embedding similarity alone (baseline).
    Dense {
        query: String,

        #[arg(long)]
        index_dir: PathBuf,

        #[arg(long)]
        top_k: Option<usize>,
    },

    /// Show corpus or index statistics.
    Stats {
        /// Summarize a built index.
        #[arg(long, conflicts_with = "corpus", required_unless_present = "corpus")]
        index_dir: Option<PathBuf>,

        /// Summarize a raw JSONL corpus.
        #[arg(long)]
        corpus: Option<PathBuf>,

        /// Number of hub entities to list.
        #[arg(long, default_value = "10")]
        hubs: usize,
    },

    /// Print the effective configuration as TOML.
    Config {
        /// Write to this file instead of stdout.
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

/// Per-invocation overrides of the retrieval config.
#[derive(Args)]
struct Tunables {
    #[arg(long)]
    top_k: Option<usize>,

    /// Activation rounds (1 = no expansion).
    #[arg(long)]
    rounds: Option<usize>,

    /// Sentences always taken during activation.
    #[arg(long)]
    top_r: Option<usize>,

    /// Similarity threshold for activation.
    #[arg(long)]
    threshold: Option<f32>,

    /// PageRank restart probability.
    #[arg(long)]
    damping: Option<f64>,

    /// PageRank iteration cap.
    #[arg(long)]
    max_iters: Option<usize>,

    /// PageRank convergence tolerance (L1).
    #[arg(long)]
    tolerance: Option<f64>,

    /// Weight of semantic similarity against graph coverage.
    #[arg(long)]
    beta: Option<f64>,

    #[arg(long)]
    gamma: Option<f64>,

    #[arg(long)]
    delta: Option<f64>,

    /// Rank every paragraph, not only those with a positive term.
    #[arg(long)]
    no_filter: bool,
}

impl Tunables {
    fn options(&self) -> QueryOptions {
        QueryOptions {
            top_k: self.top_k,
            rounds: self.rounds,
            top_r: self.top_r,
            similarity_threshold: self.threshold,
            damping: self.damping,
            max_iters: self.max_iters,
            tolerance: self.tolerance,
            beta: self.beta,
            gamma: self.gamma,
            delta: self.delta,
            require_positive: self.no_filter.then_some(false),
        }
    }
}

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(3)
                .build(),
        )
    }))
    .ok(); // Ignore error if hook already set (e.g., in tests)

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => RetrievalConfig::load(path)?,
        None => RetrievalConfig::default(),
    };
    if let Some(dimension) = cli.dimension {
        config.embedding_dimension = dimension;
    }

    match cli.command {
        Commands::Build {
            corpus,
            index_dir,
            gazetteer,
        } => {
            let docs = load_jsonl(&corpus)?;
            let extractor: Box<dyn EntityExtractor> = match gazetteer {
                Some(path) => Box::new(load_gazetteer(&path)?),
                None => Box::new(CapitalizedExtractor),
            };
            let session = Session::build(&docs, extractor.as_ref(), embedder(&config)?, config)?;
            session.save(&index_dir)?;
            println!("Built index at {}", index_dir.display());
            print!("{}", session.summary(0)?);
        }

        Commands::Query {
            query,
            index_dir,
            tunables,
            explain,
        } => {
            let session = open(&index_dir, config)?;
            let outcome = session.query(&query, &tunables.options())?;

            if explain {
                println!(
                    "Activated {} entities from {} sentences: {}",
                    outcome.activated.len(),
                    outcome.activated_sentences,
                    outcome.activated.join(", ")
                );
                println!(
                    "Propagation: {} iterations{}",
                    outcome.propagation_iterations,
                    if outcome.propagation_converged {
                        ""
                    } else {
                        " (not converged)"
                    }
                );
            }
            if outcome.filter_starved {
                println!("Note: too few paragraphs matched the positive vocabulary; ranked all.");
            }
            print_results(&outcome.results);
        }

        Commands::Dense {
            query,
            index_dir,
            top_k,
        } => {
            let top_k = top_k.unwrap_or(config.top_k);
            let session = open(&index_dir, config)?;
            print_results(&session.dense_query(&query, top_k)?);
        }

        Commands::Stats {
            index_dir,
            corpus,
            hubs,
        } => {
            if let Some(corpus) = corpus {
                let docs = load_jsonl(&corpus)?;
                println!("{}", corpus_stats(&docs, &config.vocabulary));
            } else if let Some(index_dir) = index_dir {
                let session = open(&index_dir, config)?;
                print!("{}", session.summary(hubs)?);
            }
        }

        Commands::Config { output } => match output {
            Some(path) => {
                config.save(&path)?;
                println!("Wrote {}", path.display());
            }
            None => print!("{}", config.to_toml()?),
        },
    }

    Ok(())
}

fn embedder(config: &RetrievalConfig) -> Result<Box<HashingEmbedder>> {
    Ok(Box::new(HashingEmbedder::new(config.embedding_dimension)?))
}

fn open(index_dir: &Path, config: RetrievalConfig) -> Result<Session> {
    let embedder = embedder(&config)?;
    Ok(Session::open(index_dir, embedder, config)?)
}

/// One term per line; blank lines and `#` comments ignored.
fn load_gazetteer(path: &Path) -> Result<GazetteerExtractor> {
    let content = std::fs::read_to_string(path).into_diagnostic()?;
    let terms = content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'));
    let extractor = GazetteerExtractor::new(terms)?;
    tracing::info!(
        terms = extractor.terms().len(),
        path = %path.display(),
        "loaded gazetteer"
    );
    Ok(extractor)
}

fn print_results(results: &[RankedParagraph]) {
    if results.is_empty() {
        println!("No results.");
        return;
    }
    for (i, r) in results.iter().enumerate() {
        println!(
            "  {}. {} (score: {:.4}; sim {:.3}, coverage {:.3}, keyword {:.3}, negative {:.3})",
            i + 1,
            r.id,
            r.score,
            r.signals.similarity,
            r.signals.coverage,
            r.signals.keyword,
            r.signals.negative,
        );
        println!("     {}", preview(&r.text, 160));
    }
}

fn preview(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars).collect();
    format!("{cut}…")
}
