use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use lexi_core::{
    index_chunks, ingest_document, CharacterNgramEmbedder, ChatClientConfig,
    ChatCompletionClient, Embedder, EmbeddingPrefixes, HttpEmbedder, HttpEmbedderConfig,
    IngestionOptions, LawAssistant, LocalIndex, LopdfExtractor, QdrantStore, RetrievalOptions,
    VectorIndex, DEFAULT_EMBEDDING_DIMENSIONS,
};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

type DynEmbedder = Box<dyn Embedder + Send + Sync>;
type DynIndex = Box<dyn VectorIndex + Send + Sync>;

const PREVIEW_CHARS: usize = 300;

#[derive(Clone, Copy, ValueEnum)]
enum EmbedderKind {
    /// Offline character trigram hashing.
    Ngram,
    /// OpenAI-compatible /embeddings endpoint.
    Http,
}

#[derive(Clone, Copy, ValueEnum)]
enum StoreKind {
    /// JSON file on local disk.
    Local,
    /// Qdrant collection over REST.
    Qdrant,
}

#[derive(Parser)]
#[command(name = "lexi", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Embedding backend
    #[arg(long, global = true, value_enum, env = "LEXI_EMBEDDER", default_value = "ngram")]
    embedder: EmbedderKind,

    /// Embedding service base URL
    #[arg(long, global = true, env = "LEXI_EMBEDDING_URL", default_value = "http://localhost:8080/v1")]
    embedding_url: String,

    /// Embedding model name
    #[arg(long, global = true, env = "LEXI_EMBEDDING_MODEL", default_value = "intfloat/e5-base-v2")]
    embedding_model: String,

    /// Embedding service API key
    #[arg(long, global = true, env = "LEXI_EMBEDDING_API_KEY")]
    embedding_api_key: Option<String>,

    /// Embedding vector size (defaults to 384 for ngram, 768 for http)
    #[arg(long, global = true, env = "LEXI_EMBEDDING_DIMENSIONS")]
    embedding_dimensions: Option<usize>,

    /// Do not add "query: " / "passage: " prefixes before embedding
    #[arg(long, global = true, default_value_t = false)]
    no_prefixes: bool,

    /// Vector store backend
    #[arg(long, global = true, value_enum, env = "LEXI_STORE", default_value = "local")]
    store: StoreKind,

    /// Local index file
    #[arg(long, global = true, env = "LEXI_INDEX", default_value = "lexi_index.json")]
    index: PathBuf,

    /// Qdrant base URL
    #[arg(long, global = true, env = "LEXI_QDRANT_URL", default_value = "http://localhost:6333")]
    qdrant_url: String,

    /// Qdrant collection
    #[arg(long, global = true, env = "LEXI_QDRANT_COLLECTION", default_value = "penal_code")]
    qdrant_collection: String,
}

#[derive(Subcommand)]
enum Command {
    /// Print the sections recognised in a penal code PDF.
    Sections {
        #[arg(long)]
        pdf: PathBuf,
        /// Pages up to and including this one are skipped as front matter.
        #[arg(long, default_value = "21")]
        start_page: u32,
        /// Emit JSON instead of a listing.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Segment, chunk, embed and store a penal code PDF.
    Ingest {
        #[arg(long)]
        pdf: PathBuf,
        #[arg(long, default_value = "21")]
        start_page: u32,
        /// Concurrent embedding requests.
        #[arg(long, default_value = "4")]
        concurrency: usize,
    },
    /// Answer a legal question from the indexed sections.
    Ask {
        /// Question text; read from stdin when omitted.
        #[arg(long)]
        question: Option<String>,
        /// Language model timeout in seconds.
        #[arg(long, default_value = "120")]
        llm_timeout_secs: u64,
        /// Similarity search timeout in seconds.
        #[arg(long, default_value = "30")]
        search_timeout_secs: u64,
    },
}

impl Cli {
    fn dimensions(&self) -> usize {
        self.embedding_dimensions.unwrap_or(match self.embedder {
            EmbedderKind::Ngram => DEFAULT_EMBEDDING_DIMENSIONS,
            EmbedderKind::Http => 768,
        })
    }

    fn prefixes(&self) -> EmbeddingPrefixes {
        if self.no_prefixes {
            EmbeddingPrefixes::none()
        } else {
            EmbeddingPrefixes::default()
        }
    }

    fn build_embedder(&self) -> anyhow::Result<DynEmbedder> {
        Ok(match self.embedder {
            EmbedderKind::Ngram => Box::new(CharacterNgramEmbedder {
                dimensions: self.dimensions(),
            }),
            EmbedderKind::Http => Box::new(
                HttpEmbedder::new(HttpEmbedderConfig {
                    base_url: self.embedding_url.clone(),
                    model: self.embedding_model.clone(),
                    api_key: self.embedding_api_key.clone(),
                    dimensions: self.dimensions(),
                    timeout: Duration::from_secs(60),
                })
                .context("invalid embedding service configuration")?,
            ),
        })
    }

    fn open_index(&self) -> anyhow::Result<DynIndex> {
        Ok(match self.store {
            StoreKind::Local => {
                let index = LocalIndex::open(&self.index)
                    .with_context(|| format!("failed to open index {}", self.index.display()))?;
                let stored = index.dimensions()?;
                anyhow::ensure!(
                    stored == self.dimensions(),
                    "index holds {stored}-dim vectors but the embedder produces {}",
                    self.dimensions()
                );
                Box::new(index)
            }
            StoreKind::Qdrant => Box::new(QdrantStore::new(
                &self.qdrant_url,
                &self.qdrant_collection,
                self.dimensions(),
            )?),
        })
    }
}

fn preview(text: &str) -> String {
    text.chars().take(PREVIEW_CHARS).collect()
}

fn read_question() -> anyhow::Result<String> {
    print!("Enter your legal question: ");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer().with_writer(io::stderr))
        .init();

    let cli = Cli::parse();
    info!(
        version = app_version,
        started_at = %Utc::now().to_rfc3339(),
        "lexi boot"
    );

    match &cli.command {
        Command::Sections {
            pdf,
            start_page,
            json,
        } => {
            let options = IngestionOptions {
                start_page: *start_page,
                ..IngestionOptions::default()
            };
            let report = ingest_document(&LopdfExtractor, pdf, &options)
                .with_context(|| format!("failed to read {}", pdf.display()))?;

            if *json {
                println!("{}", serde_json::to_string_pretty(&report.sections)?);
            } else {
                for section in &report.sections {
                    println!(
                        "[{}] page~{} {}",
                        section.id,
                        section.page_estimate,
                        preview(&section.text)
                    );
                }
                println!("{} sections", report.sections.len());
            }
        }
        Command::Ingest {
            pdf,
            start_page,
            concurrency,
        } => {
            let options = IngestionOptions {
                start_page: *start_page,
                embed_concurrency: *concurrency,
                ..IngestionOptions::default()
            };
            let report = ingest_document(&LopdfExtractor, pdf, &options)
                .with_context(|| format!("failed to read {}", pdf.display()))?;

            if report.sections.is_empty() {
                warn!(pdf = %pdf.display(), "0 sections recognised; nothing to index");
            }

            let embedder = cli.build_embedder()?;
            let prefixes = cli.prefixes();
            info!(pdf = %pdf.display(), chunk_count = report.chunks.len(), "indexing chunks");

            let stored = match cli.store {
                StoreKind::Local => {
                    let index = LocalIndex::create(&cli.index, cli.dimensions());
                    let stored = index_chunks(
                        &embedder,
                        &index,
                        &report.chunks,
                        &prefixes,
                        options.embed_concurrency,
                    )
                    .await
                    .map_err(|error| anyhow::anyhow!(error.to_string()))?;
                    index.set_document(report.fingerprint.clone())?;
                    index.persist()?;
                    stored
                }
                StoreKind::Qdrant => {
                    let store =
                        QdrantStore::new(&cli.qdrant_url, &cli.qdrant_collection, cli.dimensions())?;
                    store
                        .ensure_collection()
                        .await
                        .map_err(|error| anyhow::anyhow!(error.to_string()))?;
                    index_chunks(
                        &embedder,
                        &store,
                        &report.chunks,
                        &prefixes,
                        options.embed_concurrency,
                    )
                    .await
                    .map_err(|error| anyhow::anyhow!(error.to_string()))?
                }
            };

            println!(
                "Stored {} chunks from {} sections at {}",
                stored,
                report.sections.len(),
                Utc::now().to_rfc3339()
            );
        }
        Command::Ask {
            question,
            llm_timeout_secs,
            search_timeout_secs,
        } => {
            let question = match question {
                Some(question) => question.clone(),
                None => read_question()?,
            };

            let options = RetrievalOptions {
                llm_timeout: Duration::from_secs(*llm_timeout_secs),
                search_timeout: Duration::from_secs(*search_timeout_secs),
                ..RetrievalOptions::default()
            };
            let llm_config = ChatClientConfig::from_env().fit_within(options.llm_timeout);
            if llm_config.api_key.is_none() {
                warn!("OPENROUTER_API_KEY is not set; the model call will likely be rejected");
            }

            let assistant = LawAssistant::new(
                cli.build_embedder()?,
                cli.open_index()?,
                ChatCompletionClient::new(llm_config)?,
            )
            .with_options(options)
            .with_prefixes(cli.prefixes());

            let answer = assistant.answer_question(&question).await;

            println!("\nAnswer:");
            println!("{}", answer.result);
            if !answer.source_sections.is_empty() {
                println!("\nSource sections used:");
                for (position, source) in answer.source_sections.iter().enumerate() {
                    println!("--- Document {} (Section {}) ---", position + 1, source.section_id);
                    println!("{} ...\n", preview(&source.text));
                }
            }
        }
    }

    Ok(())
}
