//! `retrieve` - ingest text files and query the hybrid index.
//!
//! ```bash
//! retrieve ingest ./notes --limit 100
//! retrieve search "feedback loops" -n 5 --json
//! retrieve similar notes-essay:3
//! retrieve concept entropy Entropy --description "a measure of disorder"
//! retrieve analysis an-7 entropy zoom-in "Splits into micro and macro states" \
//!     --elements '{"pattern":"S","whole":"entropy","parts":["microstates","macrostates"]}'
//! retrieve search "entropy" --move-type zoom-in
//! retrieve chunk ./notes/essay.md
//! ```

mod output;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::warn;
use tracing_subscriber::EnvFilter;

use retrieve_core::documents::DocumentScanner;
use retrieve_core::analysis::{Analysis, AnalysisElements, MoveType};
use retrieve_core::types::{FusionStrategy, Meta, OwnerKind, VectorFilter};
use retrieve_core::{Config, Settings};
use retrieve_hybrid::{IngestReport, RetrievalContext};

#[derive(Parser)]
#[command(name = "retrieve", version, about = "Hybrid vector and keyword retrieval")]
struct Cli {
    /// Override `store.data_dir`
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Chunk and index every text file under a directory
    Ingest {
        dir: PathBuf,
        /// Stop after this many files
        #[arg(long)]
        limit: Option<usize>,
        /// File extensions to pick up
        #[arg(long, value_delimiter = ',', default_value = "txt,md")]
        ext: Vec<String>,
    },
    /// Hybrid search over the indexed chunks
    Search {
        query: String,
        #[arg(short = 'n', long)]
        limit: Option<usize>,
        /// Minimum cosine similarity for vector candidates
        #[arg(long)]
        threshold: Option<f64>,
        /// rrf or weighted
        #[arg(long, value_parser = parse_strategy)]
        strategy: Option<FusionStrategy>,
        /// Only rows of this kind (concept, analysis, source_chunk, document_chunk)
        #[arg(long, value_parser = parse_from_str::<OwnerKind>)]
        kind: Option<OwnerKind>,
        /// Only analyses made with this move, e.g. zoom-in
        #[arg(long, value_parser = parse_from_str::<MoveType>)]
        move_type: Option<MoveType>,
        #[arg(long)]
        json: bool,
    },
    /// Rows whose stored vector is closest to the given owner's
    Similar {
        owner_id: String,
        #[arg(short = 'n', long, default_value = "10")]
        limit: usize,
        #[arg(long)]
        json: bool,
    },
    /// Index a named concept
    Concept {
        id: String,
        name: String,
        #[arg(long)]
        description: Option<String>,
    },
    /// Index an analysis of a concept
    Analysis {
        id: String,
        concept_id: String,
        #[arg(value_parser = parse_from_str::<MoveType>)]
        move_type: MoveType,
        reasoning: String,
        /// Pattern elements as JSON, e.g. {"pattern":"R","action":"heats","reaction":"expands"}
        #[arg(long, value_parser = parse_elements)]
        elements: Option<AnalysisElements>,
    },
    /// Print the chunks a file would be split into
    Chunk {
        file: PathBuf,
        /// Pack whole paragraphs instead of sliding a window
        #[arg(long)]
        paragraphs: bool,
        #[arg(long)]
        json: bool,
    },
}

fn parse_strategy(s: &str) -> Result<FusionStrategy, String> {
    match s {
        "rrf" => Ok(FusionStrategy::Rrf),
        "weighted" => Ok(FusionStrategy::Weighted),
        other => Err(format!("unknown strategy '{other}' (expected rrf or weighted)")),
    }
}

fn parse_from_str<T>(s: &str) -> Result<T, String>
where
    T: std::str::FromStr<Err = retrieve_core::Error>,
{
    s.parse().map_err(|e: retrieve_core::Error| e.to_string())
}

fn parse_elements(s: &str) -> Result<AnalysisElements, String> {
    serde_json::from_str(s).map_err(|e| format!("invalid elements: {e}"))
}

fn load_settings(data_dir: Option<&PathBuf>) -> Result<Settings> {
    let mut settings = Config::load()?.settings()?;
    if let Some(dir) = data_dir {
        settings.store.data_dir = dir.to_string_lossy().into_owned();
    }
    Ok(settings)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if cli.verbose { "info" } else { "warn" }));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();

    let settings = load_settings(cli.data_dir.as_ref())?;

    match cli.command {
        Command::Ingest { dir, limit, ext } => ingest(settings, &dir, limit, ext).await,
        Command::Search { query, limit, threshold, strategy, kind, move_type, json } => {
            let ctx = RetrievalContext::open(settings).await?;
            let service = ctx.search_service();
            let mut request = service.request(query);
            if let Some(limit) = limit {
                request = request.limit(limit);
            }
            if let Some(threshold) = threshold {
                request = request.threshold(threshold);
            }
            if let Some(strategy) = strategy {
                request = request.strategy(strategy);
            }
            request = request.owner_kind(kind).move_type(move_type);
            let response = service.respond(&request).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&response)?);
            } else {
                println!("{}", output::format_results(&response.query, &response.results));
            }
            Ok(())
        }
        Command::Similar { owner_id, limit, json } => {
            let ctx = RetrievalContext::open(settings).await?;
            let hits = ctx.vector_index().find_similar(&owner_id, &VectorFilter::default(), limit).await;
            if json {
                println!("{}", serde_json::to_string_pretty(&hits)?);
            } else {
                println!("{}", output::format_candidates(&owner_id, &hits));
            }
            Ok(())
        }
        Command::Concept { id, name, description } => {
            let ctx = RetrievalContext::open(settings).await?;
            let outcome = ctx.ingestor().ingest_concept(&id, &name, description.as_deref()).await?;
            println!("{id}: {outcome:?}");
            Ok(())
        }
        Command::Analysis { id, concept_id, move_type, reasoning, elements } => {
            let analysis = Analysis { analysis_id: id, concept_id, move_type, reasoning, elements };
            analysis.validate()?;
            let ctx = RetrievalContext::open(settings).await?;
            let outcome = ctx.ingestor().ingest_analysis(&analysis).await?;
            println!("{}: {outcome:?}", analysis.analysis_id);
            Ok(())
        }
        Command::Chunk { file, paragraphs, json } => {
            let text = std::fs::read_to_string(&file).with_context(|| format!("reading {}", file.display()))?;
            let chunker = retrieve_core::TextChunker::new(settings.chunking)?;
            let chunks =
                if paragraphs { chunker.chunk_by_paragraphs(&text, None) } else { chunker.chunk(&text, None) };
            if json {
                println!("{}", serde_json::to_string_pretty(&chunks)?);
            } else {
                println!("{}", output::format_chunks(&chunks));
            }
            Ok(())
        }
    }
}

async fn ingest(settings: Settings, dir: &Path, limit: Option<usize>, ext: Vec<String>) -> Result<()> {
    let mut scanner = DocumentScanner::new().extensions(ext);
    if let Some(limit) = limit {
        scanner = scanner.limit(limit);
    }
    let documents = scanner.scan(dir)?;
    if documents.is_empty() {
        println!("No documents found under {}", dir.display());
        return Ok(());
    }

    let ctx = RetrievalContext::open(settings).await?;
    let ingestor = ctx.ingestor();

    let pb = ProgressBar::new(documents.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files ({percent}%) {msg}")?
            .progress_chars("#>-"),
    );

    let mut total = IngestReport::default();
    let mut skipped = 0usize;
    for doc in &documents {
        pb.set_message(doc.filename.clone());
        let mut meta = Meta::new();
        meta.insert("category".into(), doc.category.clone().into());
        meta.insert("path".into(), doc.path.display().to_string().into());
        match ingestor.ingest_document(&doc.document_id, &doc.text, Some(&doc.filename), Some(&meta)).await {
            Ok(report) => total.merge(report),
            Err(e) => {
                skipped += 1;
                pb.suspend(|| warn!(document_id = %doc.document_id, "ingest failed: {}", e));
            }
        }
        pb.inc(1);
    }
    pb.finish_with_message("done");

    println!(
        "Ingested {} files: {} chunks, {} embedded, {} unchanged, {} without embedding, {} files failed",
        documents.len() - skipped,
        total.chunks,
        total.embedded,
        total.unchanged,
        total.failed,
        skipped
    );
    Ok(())
}
