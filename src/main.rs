use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use lectern_core::answer::{AnswerSettings, Answerer, OOD_REPLY};
use lectern_core::prompt::has_citation;
use lectern_core::{Answer, Config, ConfidenceGate};
use lectern_index::{
    ChunkIndex, HierarchicalChunker, IngestionPipeline, Retriever, SearchMode, WeaviateIndex,
};
use lectern_llm::CompletionProvider;
use lectern_llm::ollama::OllamaProvider;

const SMOKE_QUESTIONS: [&str; 5] = [
    "Create a curtain wall with grids at 1200 mm, add a curtain wall door, and apply mullions automatically.",
    "Create terrain using a Toposolid, add a building pad at -150 mm, and finish the sketch.",
    "Create a sheet and place both a floor plan and a 3D view on it.",
    "Set up project levels and grids, rename the levels, and make exterior walls attach to the top level.",
    "Create a room schedule listing Name, Number, and Area, sorted by Level.",
];

#[derive(Parser, Debug)]
#[command(
    name = "lectern",
    version,
    about = "Answer questions over a tutorial corpus, refusing when retrieval is not confident"
)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(long, global = true, env = "LECTERN_CONFIG", default_value = "config/default.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Chunk the corpus and replace the index contents
    Ingest {
        /// Source directory (overrides ingest.src)
        #[arg(long)]
        src: Option<PathBuf>,
        /// Comma-separated glob patterns relative to the source directory
        #[arg(long, value_delimiter = ',')]
        patterns: Option<Vec<String>>,
        /// Chunks per batch request
        #[arg(long)]
        batch: Option<usize>,
    },
    /// Answer a question from the indexed corpus
    Ask {
        question: String,
        #[command(flatten)]
        retrieval: RetrievalArgs,
    },
    /// Print the number of indexed chunks
    Count,
    /// Check that the index and completion services respond
    Health,
    /// Run a fixed set of tutorial questions and report pass/fail
    Smoke {
        #[command(flatten)]
        retrieval: RetrievalArgs,
        /// Pass answers even when they carry no [n] citation
        #[arg(long)]
        no_require_citation: bool,
    },
}

#[derive(clap::Args, Debug, Default)]
struct RetrievalArgs {
    /// Search mode: hybrid, bm25, or vector
    #[arg(long)]
    mode: Option<SearchMode>,
    /// Number of hits to retrieve
    #[arg(long)]
    k: Option<usize>,
    /// Hybrid blend weight (0 = bm25, 1 = vector)
    #[arg(long)]
    alpha: Option<f32>,
}

impl RetrievalArgs {
    fn apply(&self, settings: &mut AnswerSettings) {
        if let Some(mode) = self.mode {
            settings.mode = mode;
        }
        if let Some(k) = self.k {
            settings.k = k;
        }
        if let Some(alpha) = self.alpha {
            settings.alpha = alpha.clamp(0.0, 1.0);
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_subscriber();

    let cli = Cli::parse();
    let config = Config::load(&cli.config)
        .with_context(|| format!("failed to load config from {}", cli.config.display()))?;
    tracing::debug!(
        config = %cli.config.display(),
        index = %config.index.url,
        llm = %config.llm.base_url,
        "configuration loaded"
    );

    match cli.command {
        Command::Ingest { src, patterns, batch } => ingest(&config, src, patterns, batch).await,
        Command::Ask { question, retrieval } => {
            let mut settings = AnswerSettings::from_config(&config);
            retrieval.apply(&mut settings);
            let answerer = build_answerer(&config, settings);
            let answer = answerer.ask(&question).await;
            print_answer(&answer);
            Ok(())
        }
        Command::Count => {
            let index = build_index(&config);
            let count = index.count().await.context("count query failed")?;
            println!("{count}");
            Ok(())
        }
        Command::Health => health(&config).await,
        Command::Smoke {
            retrieval,
            no_require_citation,
        } => smoke(&config, &retrieval, !no_require_citation).await,
    }
}

fn init_subscriber() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn build_index(config: &Config) -> Arc<dyn ChunkIndex> {
    Arc::new(
        WeaviateIndex::new(&config.index.url, config.index.class_name.clone())
            .with_vectorizer(config.index.vectorizer.clone())
            .with_timeout(config.timeouts.index()),
    )
}

fn build_provider(config: &Config) -> OllamaProvider {
    OllamaProvider::new(&config.llm.base_url, config.llm.model.clone()).with_timeout(config.timeouts.llm())
}

fn build_answerer(config: &Config, settings: AnswerSettings) -> Answerer<OllamaProvider> {
    let retriever = Retriever::new(build_index(config)).with_timeout(config.timeouts.index());
    Answerer::new(
        retriever,
        ConfidenceGate::new(config.gate),
        build_provider(config),
        settings,
    )
}

async fn ingest(
    config: &Config,
    src: Option<PathBuf>,
    patterns: Option<Vec<String>>,
    batch: Option<usize>,
) -> anyhow::Result<()> {
    let src = src.unwrap_or_else(|| PathBuf::from(&config.ingest.src));
    if !src.is_dir() {
        bail!("source directory {} does not exist", src.display());
    }
    let patterns = patterns.unwrap_or_else(|| config.ingest.patterns.clone());
    let batch = batch.unwrap_or(config.ingest.batch_size);

    let chunker = HierarchicalChunker::new(config.chunker.clone()).context("invalid chunker configuration")?;
    let index = build_index(config);
    index
        .health_check()
        .await
        .with_context(|| format!("index at {} is not reachable", config.index.url))?;

    tracing::info!(src = %src.display(), batch, "starting ingestion");
    let pipeline =
        IngestionPipeline::new(chunker, index, batch).with_concurrency(config.ingest.concurrency);
    let started = Instant::now();
    let report = pipeline
        .ingest_dir(&src, &patterns)
        .await
        .context("ingestion failed")?;

    println!(
        "documents={} skipped={} chunks={} indexed={} ({:.1}s)",
        report.documents,
        report.skipped,
        report.chunks,
        report.indexed.map_or_else(|| "-".to_owned(), |n| n.to_string()),
        started.elapsed().as_secs_f64()
    );
    Ok(())
}

async fn health(config: &Config) -> anyhow::Result<()> {
    let index_ok = match build_index(config).health_check().await {
        Ok(()) => {
            println!("index:  ok ({})", config.index.url);
            true
        }
        Err(e) => {
            println!("index:  FAILED ({}): {e}", config.index.url);
            false
        }
    };
    let llm_ok = match build_provider(config).health_check().await {
        Ok(()) => {
            println!("llm:    ok ({} @ {})", config.llm.model, config.llm.base_url);
            true
        }
        Err(e) => {
            println!("llm:    FAILED ({}): {e}", config.llm.base_url);
            false
        }
    };
    if !(index_ok && llm_ok) {
        bail!("one or more services are unavailable");
    }
    Ok(())
}

async fn smoke(config: &Config, retrieval: &RetrievalArgs, require_citation: bool) -> anyhow::Result<()> {
    let mut settings = AnswerSettings::from_config(config);
    retrieval.apply(&mut settings);
    settings.require_citation = require_citation;
    let answerer = build_answerer(config, settings);

    let mut passed = 0;
    for (i, question) in SMOKE_QUESTIONS.iter().enumerate() {
        let started = Instant::now();
        let answer = answerer.ask(question).await;
        let ok = smoke_passed(&answer, require_citation);
        if ok {
            passed += 1;
        }

        println!("\n{}", "=".repeat(80));
        println!("Q{}: {question}", i + 1);
        println!("{} ({:.2}s)", answer.diagnostics, started.elapsed().as_secs_f64());
        println!("[{}] Answer:\n{}\n", if ok { "PASS" } else { "FAIL" }, answer.text);
        if !answer.sources.is_empty() {
            println!("Sources:\n{}", answer.sources);
        }
    }
    println!("\n{}", "-".repeat(80));
    println!("Summary: {passed}/{} passed", SMOKE_QUESTIONS.len());
    Ok(())
}

fn smoke_passed(answer: &Answer, require_citation: bool) -> bool {
    let text = answer.text.trim();
    answer.is_answered() && !text.is_empty() && text != OOD_REPLY && (!require_citation || has_citation(text))
}

fn print_answer(answer: &Answer) {
    for (i, hit) in answer.hits.iter().enumerate() {
        println!(
            "{:>2}. {:.3}  {} (chunk {})",
            i + 1,
            hit.score,
            hit.chunk.page_title,
            hit.chunk.chunk_index
        );
    }
    println!("{}\n", answer.diagnostics);
    println!("{}", answer.text);
    if !answer.sources.is_empty() {
        println!("\nSources:\n{}", answer.sources);
    }
}
