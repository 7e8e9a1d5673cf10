mod providers;
mod server;

use anyhow::Context;
use chrono::Utc;
use clap::{Args, Parser, Subcommand, ValueEnum};
use docbrief_core::{
    analyze, chat, extract_document, pdf_to_speech, DocumentKind, DocumentQa, ElevenLabsClient,
    IndexStore, KnowledgeGraph, ModelSettings, Neo4jStore, Provider, ReportKind, RfpReviewer,
};
use providers::{Credentials, ModelFactory};
use server::AppState;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "docbrief", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Model provider: gemini, openai, or local (trigram embeddings, Gemini completions)
    #[arg(long, env = "DOCBRIEF_PROVIDER", default_value = "gemini", global = true)]
    provider: Provider,

    /// Chat model, defaults to the provider's model
    #[arg(long, env = "DOCBRIEF_CHAT_MODEL", global = true)]
    chat_model: Option<String>,

    /// Embedding model, defaults to the provider's model
    #[arg(long, env = "DOCBRIEF_EMBEDDING_MODEL", global = true)]
    embedding_model: Option<String>,

    /// Sampling temperature
    #[arg(long, default_value_t = 0.3, global = true)]
    temperature: f32,

    #[arg(long, env = "GOOGLE_API_KEY", hide_env_values = true, global = true)]
    google_api_key: Option<String>,

    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true, global = true)]
    openai_api_key: Option<String>,

    /// OpenAI-compatible base URL
    #[arg(long, env = "OPENAI_BASE_URL", global = true)]
    openai_base_url: Option<String>,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the upload API.
    Serve {
        #[arg(long, env = "DOCBRIEF_BIND", default_value = "127.0.0.1:5000")]
        bind: String,
        /// Largest accepted request body in megabytes.
        #[arg(long, default_value = "25")]
        max_upload_mb: usize,
    },
    /// Answer a question from a PDF or DOCX document.
    Ask {
        #[arg(long)]
        document: PathBuf,
        #[arg(long)]
        question: String,
        /// Number of chunks retrieved as context.
        #[arg(long, default_value = "4")]
        top_k: usize,
    },
    /// Produce a whole-document report.
    Analyze {
        #[arg(long)]
        document: PathBuf,
        #[arg(long, value_enum, default_value = "summary")]
        kind: ReportArg,
    },
    /// Ask the model directly, with no document.
    Chat {
        #[arg(long)]
        question: String,
    },
    /// Review an RFP against a company profile.
    Rfp {
        #[arg(long)]
        company: PathBuf,
        #[arg(long)]
        rfp: PathBuf,
        /// Historical evaluation guidelines (plain text, PDF or DOCX).
        #[arg(long)]
        guidelines: Option<PathBuf>,
        /// Directory the two vector indexes are persisted under.
        #[arg(long, default_value = "faiss_index")]
        index_dir: PathBuf,
        /// Print the review as JSON.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Build or query a knowledge graph in Neo4j.
    Graph {
        #[command(subcommand)]
        action: GraphAction,
        #[command(flatten)]
        neo4j: Neo4jArgs,
    },
    /// Read a document aloud into an MP3 file.
    Speak {
        #[arg(long)]
        document: PathBuf,
        #[arg(long, default_value = "output.mp3")]
        out: PathBuf,
        /// ElevenLabs voice id.
        #[arg(long)]
        voice: Option<String>,
        #[arg(long, env = "ELEVENLABS_API_KEY", hide_env_values = true)]
        elevenlabs_api_key: Option<String>,
    },
}

#[derive(Subcommand)]
enum GraphAction {
    /// Extract entities from a document and store them.
    Build {
        #[arg(long)]
        document: PathBuf,
    },
    /// Answer a question from the stored graph.
    Ask {
        #[arg(long)]
        question: String,
    },
}

#[derive(Args)]
struct Neo4jArgs {
    /// Neo4j URI; bolt and neo4j schemes are served over the HTTP API
    #[arg(long, env = "NEO4J_URI", default_value = "http://localhost:7474")]
    neo4j_url: String,

    #[arg(long, env = "NEO4J_DATABASE", default_value = "neo4j")]
    neo4j_db: String,

    #[arg(long, env = "NEO4J_USERNAME", default_value = "neo4j")]
    neo4j_user: String,

    #[arg(long, env = "NEO4J_PASSWORD", default_value = "password", hide_env_values = true)]
    neo4j_password: String,
}

#[derive(Clone, Copy, ValueEnum)]
enum ReportArg {
    Summary,
    Checklist,
    Contract,
}

impl From<ReportArg> for ReportKind {
    fn from(value: ReportArg) -> Self {
        match value {
            ReportArg::Summary => ReportKind::BidSummary,
            ReportArg::Checklist => ReportKind::SubmissionChecklist,
            ReportArg::Contract => ReportKind::ContractRisks,
        }
    }
}

impl Cli {
    fn model_factory(&self) -> ModelFactory {
        let mut settings = ModelSettings::for_provider(self.provider);
        if let Some(model) = &self.chat_model {
            settings.chat_model = model.clone();
        }
        if let Some(model) = &self.embedding_model {
            settings.embedding_model = model.clone();
        }
        settings.temperature = self.temperature;

        ModelFactory::new(
            settings,
            Credentials {
                google_api_key: self.google_api_key.clone(),
                openai_api_key: self.openai_api_key.clone(),
                openai_base_url: self.openai_base_url.clone(),
            },
        )
    }
}

fn print_section(title: &str, body: &str) {
    println!("## {title}\n");
    println!("{}\n", body.trim());
}

fn document_text(path: &Path) -> anyhow::Result<String> {
    let document = extract_document(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    info!(
        source = %document.source,
        pages = document.pages.len(),
        checksum = %document.checksum,
        "document extracted"
    );
    Ok(document.text())
}

/// Guidelines are usually a plain text file; PDF and DOCX go through extraction.
async fn guidelines_text(path: &Path) -> anyhow::Result<String> {
    if DocumentKind::from_path(path).is_some() {
        return document_text(path);
    }

    tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");

    dotenvy::dotenv().ok();
    dotenvy::from_filename(".env.local").ok();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();
    let factory = cli.model_factory();
    info!(
        version = app_version,
        provider = %factory.settings().provider,
        chat_model = %factory.settings().chat_model,
        started_at = %Utc::now().to_rfc3339(),
        "docbrief boot"
    );

    match cli.command {
        Command::Serve {
            bind,
            max_upload_mb,
        } => {
            let state = AppState {
                model: factory.language_model()?,
                embedder: factory.embedder()?,
            };
            let app = server::router(state, max_upload_mb * 1024 * 1024);

            let listener = tokio::net::TcpListener::bind(&bind)
                .await
                .with_context(|| format!("failed to bind {bind}"))?;
            info!(address = %bind, "listening");
            axum::serve(listener, app).await?;
        }
        Command::Ask {
            document,
            question,
            top_k,
        } => {
            let text = document_text(&document)?;
            let qa = DocumentQa::new(factory.embedder()?, factory.language_model()?)
                .with_top_k(top_k);
            let answer = qa.ask(&text, &question).await?;
            print_section(&question, &answer);
        }
        Command::Analyze { document, kind } => {
            let kind = ReportKind::from(kind);
            let text = document_text(&document)?;
            let model = factory.language_model()?;
            let report = analyze(model.as_ref(), kind, &text).await?;
            print_section(kind.title(), &report);
        }
        Command::Chat { question } => {
            let model = factory.language_model()?;
            let answer = chat(model.as_ref(), &question).await?;
            println!("{answer}");
        }
        Command::Rfp {
            company,
            rfp,
            guidelines,
            index_dir,
            json,
        } => {
            let company_text = document_text(&company)?;
            let rfp_text = document_text(&rfp)?;

            let mut reviewer = RfpReviewer::new(factory.embedder()?, factory.language_model()?)
                .with_store(IndexStore::new(index_dir));
            if let Some(path) = guidelines {
                reviewer = reviewer.with_guidelines(guidelines_text(&path).await?);
            }

            let review = reviewer.review(&company_text, &rfp_text).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&review)?);
            } else {
                for (title, body) in review.sections() {
                    print_section(title, body);
                }
            }
        }
        Command::Graph { action, neo4j } => {
            let store = Neo4jStore::new(
                &neo4j.neo4j_url,
                &neo4j.neo4j_db,
                &neo4j.neo4j_user,
                &neo4j.neo4j_password,
            );
            let graph = KnowledgeGraph::new(factory.language_model()?, factory.embedder()?, store);

            match action {
                GraphAction::Build { document } => {
                    let text = document_text(&document)?;
                    let report = graph.build(&text).await?;
                    println!(
                        "{} chunks, {} entities, {} relationships stored at {}",
                        report.chunks,
                        report.nodes,
                        report.relationships,
                        Utc::now().to_rfc3339()
                    );
                }
                GraphAction::Ask { question } => {
                    let answer = graph.answer(&question).await?;
                    print_section(&question, &answer);
                }
            }
        }
        Command::Speak {
            document,
            out,
            voice,
            elevenlabs_api_key,
        } => {
            let mut client = ElevenLabsClient::new(elevenlabs_api_key.as_deref())?;
            if let Some(voice) = voice {
                client = client.with_voice(voice);
            }
            let bytes = pdf_to_speech(&client, &document, &out).await?;
            println!("{bytes} bytes of audio written to {}", out.display());
        }
    }

    Ok(())
}
