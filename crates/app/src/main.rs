use anyhow::Context;
use bangla_rag_core::{
    ingest_document, Answer, CharacterNgramEmbedder, ChunkingConfig, ConversationMemory,
    Embedder, GeminiGenerator, Generator, HttpOcrEngine, HybridExtractor, LopdfLayoutExtractor,
    OcrEndpointConfig, OllamaEmbedder, OllamaGenerator, PdfExtractor, RagOrchestrator,
    RetrievalOptions, TesseractOcr, VectorIndex, DEFAULT_EMBEDDING_DIMENSIONS,
    DEFAULT_GEMINI_MODEL, DEFAULT_OLLAMA_URL,
};
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "bangla-rag", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Directory holding index.json and chunks.json
    #[arg(long, env = "RAG_INDEX_DIR", default_value = "rag-index")]
    index_dir: PathBuf,

    /// Embedding backend
    #[arg(long, env = "EMBEDDING_PROVIDER", value_enum, default_value = "ngram")]
    embedding_provider: EmbeddingProvider,

    /// Embedding model served by Ollama
    #[arg(long, env = "EMBEDDING_MODEL", default_value = "bge-m3")]
    embedding_model: String,

    /// Ollama base URL, used for embeddings and generation
    #[arg(long, env = "OLLAMA_URL", default_value = DEFAULT_OLLAMA_URL)]
    ollama_url: String,

    /// Generative backend
    #[arg(long, env = "GENERATION_PROVIDER", value_enum, default_value = "gemini")]
    generation_provider: GenerationProvider,

    /// Google AI Studio key for Gemini
    #[arg(long, env = "GOOGLE_API_KEY", hide_env_values = true)]
    google_api_key: Option<String>,

    /// Gemini model name
    #[arg(long, env = "GEMINI_MODEL", default_value = DEFAULT_GEMINI_MODEL)]
    gemini_model: String,

    /// Ollama model used for answers
    #[arg(long, env = "OLLAMA_MODEL", default_value = "llama3.1")]
    ollama_model: String,
}

#[derive(Clone, Copy, ValueEnum)]
enum EmbeddingProvider {
    Ngram,
    Ollama,
}

#[derive(Clone, Copy, ValueEnum)]
enum GenerationProvider {
    Gemini,
    Ollama,
    None,
}

#[derive(Subcommand)]
enum Command {
    /// Extract, chunk and index a PDF, replacing the current index.
    Ingest {
        /// PDF to ingest.
        #[arg(long)]
        document: PathBuf,
        /// Remote OCR endpoint; local tesseract is used when absent.
        #[arg(long, env = "OCR_ENDPOINT")]
        ocr_endpoint: Option<String>,
        /// Bearer token for the OCR endpoint.
        #[arg(long, env = "OCR_API_KEY", hide_env_values = true)]
        ocr_api_key: Option<String>,
        /// Tesseract language pack.
        #[arg(long, default_value = "ben")]
        ocr_language: String,
        /// Rasterization resolution for local OCR.
        #[arg(long, default_value = "300")]
        dpi: u32,
    },
    /// Ask a single question against the index.
    Ask {
        #[arg(long)]
        query: String,
        /// Number of chunks given to the model.
        #[arg(long, default_value = "5")]
        top_k: usize,
    },
    /// Multi-turn session reading questions from stdin.
    Chat {
        #[arg(long, default_value = "5")]
        top_k: usize,
    },
    /// Print the chunks stored in the index.
    Chunks {
        #[arg(long, default_value = "20")]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    info!(
        version = app_version,
        started_at = %Utc::now().to_rfc3339(),
        "bangla-rag boot"
    );

    let embedder = build_embedder(&cli)?;

    match &cli.command {
        Command::Ingest {
            document,
            ocr_endpoint,
            ocr_api_key,
            ocr_language,
            dpi,
        } => {
            let extractor: Box<dyn PdfExtractor> = match ocr_endpoint {
                Some(endpoint) => {
                    let config = OcrEndpointConfig {
                        endpoint: endpoint.clone(),
                        api_key: ocr_api_key.clone(),
                        language: ocr_language.clone(),
                    };
                    Box::new(HybridExtractor::new(
                        HttpOcrEngine::new(config),
                        LopdfLayoutExtractor,
                    ))
                }
                None => Box::new(HybridExtractor::new(
                    TesseractOcr {
                        language: ocr_language.clone(),
                        dpi: *dpi,
                        ..TesseractOcr::default()
                    },
                    LopdfLayoutExtractor,
                )),
            };

            let report = ingest_document(
                document,
                extractor.as_ref(),
                &embedder,
                ChunkingConfig::default(),
            )
            .await
            .with_context(|| format!("failed to ingest {}", document.display()))?;

            report
                .index
                .save(&cli.index_dir)
                .with_context(|| format!("failed to save index to {}", cli.index_dir.display()))?;

            println!(
                "{} pages, {} answer tables, {} chunks indexed into {} at {}",
                report.pages,
                report.tables_recovered,
                report.index.len(),
                cli.index_dir.display(),
                Utc::now().to_rfc3339()
            );
        }
        Command::Ask { query, top_k } => {
            let orchestrator = build_orchestrator(&cli, embedder, *top_k)?;
            let mut memory = ConversationMemory::new();

            let answer = orchestrator
                .answer(query, &mut memory)
                .await
                .context("query failed")?;
            print_answer(&answer);
        }
        Command::Chat { top_k } => {
            let orchestrator = build_orchestrator(&cli, embedder, *top_k)?;
            let mut memory = ConversationMemory::new();
            let stdin = std::io::stdin();

            loop {
                print!("> ");
                std::io::stdout().flush()?;

                let mut line = String::new();
                if stdin.lock().read_line(&mut line)? == 0 {
                    break;
                }

                let query = line.trim();
                if query.is_empty() {
                    continue;
                }
                if query == "exit" || query == "quit" {
                    break;
                }

                match orchestrator.answer(query, &mut memory).await {
                    Ok(answer) => println!("{}\n", answer.answer),
                    Err(error) => warn!(%error, "query failed"),
                }
            }

            println!("{} turns in this session", memory.len());
        }
        Command::Chunks { limit } => {
            let index = VectorIndex::open(&cli.index_dir)
                .with_context(|| format!("failed to open index {}", cli.index_dir.display()))?;

            let manifest = index.manifest();
            println!(
                "model={} dimension={} chunks={}",
                manifest.model_id,
                manifest.dimension,
                index.len()
            );
            if let Some(document) = &manifest.document {
                println!(
                    "document={} checksum={} ingested_at={}",
                    document.source_path,
                    document.checksum,
                    document.ingested_at.to_rfc3339()
                );
            }

            for chunk in index.chunks().iter().take(*limit) {
                println!("[{}] chars={}\n{}\n", chunk.index, chunk.char_len, chunk.text);
            }
        }
    }

    Ok(())
}

fn build_embedder(cli: &Cli) -> anyhow::Result<Box<dyn Embedder>> {
    let embedder: Box<dyn Embedder> = match cli.embedding_provider {
        EmbeddingProvider::Ngram => Box::new(CharacterNgramEmbedder {
            dimensions: DEFAULT_EMBEDDING_DIMENSIONS,
        }),
        EmbeddingProvider::Ollama => Box::new(
            OllamaEmbedder::new(&cli.ollama_url, cli.embedding_model.clone())
                .context("invalid ollama embedding configuration")?,
        ),
    };
    Ok(embedder)
}

fn build_generator(cli: &Cli) -> anyhow::Result<Option<Box<dyn Generator>>> {
    let generator: Option<Box<dyn Generator>> = match cli.generation_provider {
        GenerationProvider::Gemini => match &cli.google_api_key {
            Some(key) => Some(Box::new(
                GeminiGenerator::new(key.clone(), &cli.gemini_model)
                    .context("invalid gemini configuration")?,
            ) as Box<dyn Generator>),
            None => {
                warn!("GOOGLE_API_KEY is not set, answers will be placeholders");
                None
            }
        },
        GenerationProvider::Ollama => Some(Box::new(
            OllamaGenerator::new(&cli.ollama_url, cli.ollama_model.clone())
                .context("invalid ollama generation configuration")?,
        ) as Box<dyn Generator>),
        GenerationProvider::None => None,
    };
    Ok(generator)
}

fn build_orchestrator(
    cli: &Cli,
    embedder: Box<dyn Embedder>,
    top_k: usize,
) -> anyhow::Result<RagOrchestrator<Box<dyn Embedder>, Box<dyn Generator>>> {
    let index = VectorIndex::open(&cli.index_dir)
        .with_context(|| format!("failed to open index {}", cli.index_dir.display()))?;
    let generator = build_generator(cli)?;

    Ok(
        RagOrchestrator::new(Arc::new(index), embedder, generator)
            .with_options(RetrievalOptions { top_k }),
    )
}

fn print_answer(answer: &Answer) {
    println!("query: {}", answer.query);
    if answer.degraded {
        println!("(generative service unavailable, placeholder answer)");
    }
    println!("answer:\n{}", answer.answer);
    for (position, turn) in answer.history.iter().enumerate() {
        println!("history[{position}]: Q: {} | A: {}", turn.question, turn.answer);
    }
}
