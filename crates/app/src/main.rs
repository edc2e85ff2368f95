use anyhow::{bail, Context};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use coursepack_core::syllabus::{
    process_syllabi, read_syllabus_data, syllabus_files, write_syllabus_data, DEFAULT_SYLLABUS_FILE,
};
use coursepack_core::{
    extract_text, ingest_folder_chunks_best_effort, organize_directory,
    organize_directory_with_model, read_chunks, write_chunks, BatchReport, CharacterNgramEmbedder,
    ChunkingConfig, ConvertOptions, Converter, DirectorySettings, Embedder, KnowledgeGraph,
    OllamaCli, OllamaConfig, OrganizeOptions, PairingOptions, PdfTextExtractor, QdrantStore,
    VectorIndex,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(
    name = "coursepack",
    version,
    about = "Organise, convert and index course PDF collections"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Model runner executable
    #[arg(
        long,
        global = true,
        env = "COURSEPACK_LLM_PROGRAM",
        default_value = "ollama"
    )]
    llm_program: String,

    /// Model name passed to `<program> run`
    #[arg(
        long,
        global = true,
        env = "COURSEPACK_LLM_MODEL",
        default_value = "deepseek-r1:7b"
    )]
    llm_model: String,

    /// Per-call model timeout in seconds
    #[arg(long, global = true)]
    llm_timeout_secs: Option<u64>,

    /// Qdrant base URL
    #[arg(
        long,
        global = true,
        env = "QDRANT_URL",
        default_value = "http://localhost:6333"
    )]
    qdrant_url: String,

    /// Qdrant collection
    #[arg(
        long,
        global = true,
        env = "QDRANT_COLLECTION",
        default_value = "course_content"
    )]
    qdrant_collection: String,

    /// Debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true, default_value_t = false)]
    verbose: bool,
}

#[derive(Args)]
struct PairingArgs {
    /// Minimum filename similarity for a question/solution pair
    #[arg(
        short = 't',
        long,
        default_value_t = coursepack_core::models::DEFAULT_PAIRING_THRESHOLD
    )]
    threshold: f64,

    /// Let leftover solutions pair with any non-solution file by similarity alone
    #[arg(long, default_value_t = false)]
    role_agnostic: bool,
}

impl PairingArgs {
    fn options(&self) -> anyhow::Result<PairingOptions> {
        if !(0.0..=1.0).contains(&self.threshold) {
            bail!("threshold must be between 0 and 1, got {}", self.threshold);
        }
        Ok(PairingOptions {
            threshold: self.threshold,
            role_agnostic_fallback: self.role_agnostic,
        })
    }
}

#[derive(Subcommand)]
enum Command {
    /// Sort a folder of PDFs into pair folders and role folders.
    Organize {
        source_dir: PathBuf,
        #[arg(short, long, default_value = "organized_materials")]
        output_dir: PathBuf,
        #[command(flatten)]
        pairing: PairingArgs,
        /// Read the first pages of files whose name gives no role
        #[arg(long, default_value_t = false)]
        inspect_content: bool,
        /// Ask the model to classify files whose name gives no role
        #[arg(long, default_value_t = false)]
        classify_with_model: bool,
    },
    /// Convert every PDF under a folder into structured JSON records.
    Convert {
        source_dir: PathBuf,
        #[arg(short, long, default_value = "json_output")]
        output_dir: PathBuf,
        /// JSON schema file sent to the model as the expected shape
        #[arg(short, long)]
        schema: Option<PathBuf>,
        /// Syllabus PDF used for topic mapping
        #[arg(short = 'y', long)]
        syllabus: Option<PathBuf>,
        #[arg(short, long, default_value_t = 1)]
        workers: usize,
        #[command(flatten)]
        pairing: PairingArgs,
        /// Generate extra practice questions
        #[arg(short = 'q', long, default_value_t = false)]
        generate_questions: bool,
        /// Analyse concept relationships
        #[arg(short = 'r', long, default_value_t = false)]
        analyze_relationships: bool,
        /// Stop after this many jobs
        #[arg(long)]
        max: Option<usize>,
    },
    /// Convert pre-organised question/solution pair folders.
    Pairs {
        pairs_dir: PathBuf,
        #[arg(short, long, default_value = "processed_pairs")]
        output_dir: PathBuf,
        #[arg(short, long, default_value_t = 1)]
        workers: usize,
        #[arg(long)]
        max: Option<usize>,
    },
    /// Chunk, embed and upsert every PDF under a folder into Qdrant.
    Index {
        source_dir: PathBuf,
        /// Where the embedded chunks are also written
        #[arg(short, long, default_value = "content_chunks.json")]
        chunks_file: PathBuf,
        #[arg(long, default_value_t = 1000)]
        chunk_chars: usize,
        #[arg(long, default_value_t = 200)]
        overlap_chars: usize,
    },
    /// Nearest chunks for a free-text query.
    Search {
        query: String,
        #[arg(long, default_value_t = 5)]
        top_k: usize,
    },
    /// Collection size and status.
    Stats,
    /// Parse syllabus PDFs into structured syllabus data.
    Syllabus {
        /// A syllabus PDF or a folder of them
        source: PathBuf,
        #[arg(short, long, default_value = DEFAULT_SYLLABUS_FILE)]
        output: PathBuf,
    },
    /// Build the concept graph from an embedded chunks file.
    Graph {
        chunks_file: PathBuf,
        #[arg(short, long, default_value = "knowledge_graph.json")]
        output: PathBuf,
        /// Syllabus data written by `syllabus`, for syllabus edges
        #[arg(short = 'y', long)]
        syllabus: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    // A missing .env file is normal.
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with(fmt::layer())
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        started_at = %Utc::now().to_rfc3339(),
        "coursepack boot"
    );

    if let Err(error) = run(cli).await {
        error!("{error:#}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let model_config = OllamaConfig {
        program: cli.llm_program.clone(),
        model: cli.llm_model.clone(),
        timeout: cli.llm_timeout_secs.map(Duration::from_secs),
    };
    let embedder = CharacterNgramEmbedder::default();

    match cli.command {
        Command::Organize {
            source_dir,
            output_dir,
            pairing,
            inspect_content,
            classify_with_model,
        } => {
            let options = OrganizeOptions {
                pairing: pairing.options()?,
                inspect_content,
            };
            let report = if classify_with_model {
                organize_directory_with_model(
                    &source_dir,
                    &output_dir,
                    &options,
                    &PdfTextExtractor::default(),
                    &OllamaCli::new(model_config),
                )
                .await
            } else {
                organize_directory(&source_dir, &output_dir, &options)
            }
            .with_context(|| format!("organizing {}", source_dir.display()))?;

            println!("pairs: {}", report.pairs);
            for (role, count) in &report.unpaired_by_role {
                println!("unpaired {role}: {count}");
            }
            println!(
                "copied {} file(s), {} failed, {} reclassified from content",
                report.copied, report.failed_copies, report.reclassified
            );
        }
        Command::Convert {
            source_dir,
            output_dir,
            schema,
            syllabus,
            workers,
            pairing,
            generate_questions,
            analyze_relationships,
            max,
        } => {
            let schema_hint = schema
                .map(|path| {
                    std::fs::read_to_string(&path)
                        .with_context(|| format!("reading schema {}", path.display()))
                })
                .transpose()?;
            let syllabus_text = syllabus.and_then(|path| read_syllabus(&path));

            let options = ConvertOptions {
                schema_hint,
                syllabus_text,
                generate_questions,
                analyze_relationships,
                ..ConvertOptions::default()
            };
            let settings = DirectorySettings {
                pairing: pairing.options()?,
                workers,
                max_jobs: max,
            };

            let converter = Converter::new(Arc::new(OllamaCli::new(model_config)), options);
            let report = converter
                .convert_directory(&source_dir, &output_dir, &settings)
                .await
                .with_context(|| format!("converting {}", source_dir.display()))?;
            print_batch(&report, &output_dir);
        }
        Command::Pairs {
            pairs_dir,
            output_dir,
            workers,
            max,
        } => {
            let converter = Converter::new(
                Arc::new(OllamaCli::new(model_config)),
                ConvertOptions::default(),
            );
            let report = converter
                .convert_pair_directories(&pairs_dir, &output_dir, workers, max)
                .await
                .with_context(|| format!("converting pairs in {}", pairs_dir.display()))?;
            print_batch(&report, &output_dir);
        }
        Command::Index {
            source_dir,
            chunks_file,
            chunk_chars,
            overlap_chars,
        } => {
            let config = ChunkingConfig {
                max_chars: chunk_chars,
                overlap_chars,
                ..ChunkingConfig::default()
            };
            let report = ingest_folder_chunks_best_effort(&source_dir, config, &embedder)
                .with_context(|| format!("chunking {}", source_dir.display()))?;

            for skipped in &report.skipped_files {
                warn!(path = %skipped.path.display(), reason = %skipped.reason, "skipped pdf");
            }
            if report.chunks.is_empty() {
                println!("0 chunks ingested (all files were skipped)");
                return Ok(());
            }

            write_chunks(&report.chunks, &chunks_file)
                .with_context(|| format!("writing {}", chunks_file.display()))?;

            let store = open_store(&cli.qdrant_url, &cli.qdrant_collection, &embedder)?;
            store.ensure_collection().await.context("preparing qdrant collection")?;
            let upserted = store.upsert(&report.chunks).await.context("upserting chunks")?;

            println!(
                "{upserted} chunks from {} document(s) indexed at {}",
                report.documents,
                Utc::now().to_rfc3339()
            );
        }
        Command::Search { query, top_k } => {
            let store = open_store(&cli.qdrant_url, &cli.qdrant_collection, &embedder)?;
            let matches = store
                .query(&embedder.embed(&query), top_k, None)
                .await
                .context("querying qdrant")?;

            println!("query: {query}");
            for hit in matches {
                let source = hit
                    .metadata
                    .get("source")
                    .and_then(|value| value.as_str())
                    .unwrap_or("");
                println!("score={:.4} chunk={} source={source}", hit.score, hit.id);
                println!("  {}", hit.text());
            }
        }
        Command::Stats => {
            let store = open_store(&cli.qdrant_url, &cli.qdrant_collection, &embedder)?;
            let stats = store.describe_stats().await.context("reading collection info")?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        Command::Syllabus { source, output } => {
            let files = syllabus_files(&source)
                .with_context(|| format!("listing syllabi in {}", source.display()))?;
            let syllabi = process_syllabi(&files, &PdfTextExtractor::default());
            write_syllabus_data(&syllabi, &output)
                .with_context(|| format!("writing {}", output.display()))?;

            println!(
                "processed {} of {} syllabus file(s); results in {}",
                syllabi.len(),
                files.len(),
                output.display()
            );
        }
        Command::Graph {
            chunks_file,
            output,
            syllabus,
        } => {
            let chunks = read_chunks(&chunks_file)
                .with_context(|| format!("reading {}", chunks_file.display()))?;
            let syllabi = match syllabus {
                Some(path) => read_syllabus_data(&path)
                    .with_context(|| format!("reading syllabus data {}", path.display()))?,
                None => Vec::new(),
            };
            let graph = KnowledgeGraph::from_chunks(&chunks, &syllabi);
            graph
                .write_json(&output)
                .with_context(|| format!("writing {}", output.display()))?;

            let stats = graph.stats();
            println!(
                "{} nodes, {} edges written to {}",
                stats.nodes,
                stats.edges,
                output.display()
            );
        }
    }

    Ok(())
}

fn open_store(
    url: &str,
    collection: &str,
    embedder: &CharacterNgramEmbedder,
) -> anyhow::Result<QdrantStore> {
    QdrantStore::new(url, collection, embedder.dimensions())
        .with_context(|| format!("qdrant url {url}"))
}

/// An unreadable syllabus only disables syllabus mapping.
fn read_syllabus(path: &Path) -> Option<String> {
    match extract_text(&PdfTextExtractor::default(), path, None) {
        Ok(text) => Some(text),
        Err(error) => {
            warn!(path = %path.display(), reason = %error, "syllabus unreadable, mapping disabled");
            None
        }
    }
}

fn print_batch(report: &BatchReport, output_dir: &Path) {
    println!(
        "{} succeeded, {} failed of {} in {:.1}s; records in {}",
        report.succeeded.len(),
        report.failed.len(),
        report.total(),
        report.elapsed.as_secs_f64(),
        output_dir.display()
    );
    for (path, reason) in &report.failed {
        println!("  failed: {} ({reason})", path.display());
    }
}
