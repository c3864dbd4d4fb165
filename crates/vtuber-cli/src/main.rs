use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};

use vtuber_agent::{ChatMessage, ContextRetriever, RetrievalAugmenter};
use vtuber_core::config::Config;
use vtuber_knowledge::{HttpEmbedder, KnowledgeBase, KnowledgeSearch, build_knowledge_base};
use vtuber_tts::{AudioDispatcher, FilterState, TtsSession};

mod logging;

#[derive(Parser)]
#[command(
    name = "vtuber",
    about = "Speech and knowledge tools for a streaming VTuber agent",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Rebuild the knowledge base from the source directory
    BuildKb {
        /// Directory of .txt/.md files (overrides knowledge.source_dir)
        #[arg(long)]
        source: Option<String>,

        /// Vector store directory (overrides knowledge.db_dir)
        #[arg(long)]
        db: Option<String>,
    },

    /// Print the augmented prompt for a question
    Ask { question: String },

    /// Synthesize text, or each stdin line as one fragment of a single session
    Speak {
        /// Audio file name (without extension)
        #[arg(short, long)]
        name: Option<String>,

        text: Option<String>,
    },

    /// Print the speakable part of each stdin line
    Filter,

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration
    Show,
    /// Get a specific config value
    Get { key: String },
    /// Check the configuration for problems
    Validate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_path = cli
        .config
        .map(PathBuf::from)
        .unwrap_or_else(Config::config_path);
    let config = Config::load(&config_path)?;

    logging::init_tracing(&config.logging.clone().unwrap_or_default(), cli.verbose);
    tracing::debug!(path = %config_path.display(), "Configuration loaded");

    match cli.command {
        Commands::BuildKb { source, db } => {
            let mut knowledge = config.knowledge();
            if let Some(source) = source {
                knowledge.source_dir = source;
            }
            if let Some(db) = db {
                knowledge.db_dir = db;
            }

            let embedder = HttpEmbedder::from_config(&knowledge.embedding);
            tracing::info!(
                source = %knowledge.source_dir,
                db = %knowledge.db_dir,
                model = embedder.model(),
                "Building knowledge base"
            );
            let report = build_knowledge_base(&knowledge, &embedder).await?;
            println!(
                "Indexed {} documents into {} chunks at {}",
                report.documents, report.chunks, knowledge.db_dir
            );
        }
        Commands::Ask { question } => {
            let knowledge = config.knowledge();
            let embedder = Arc::new(HttpEmbedder::from_config(&knowledge.embedding));
            let search: Option<Arc<dyn KnowledgeSearch>> = match KnowledgeBase::open(&knowledge, embedder) {
                Ok(kb) => Some(Arc::new(kb) as Arc<dyn KnowledgeSearch>),
                Err(e) => {
                    tracing::error!(error = %e, "Failed to open knowledge base, continuing without it");
                    None
                }
            };

            let augmenter = RetrievalAugmenter::new(ContextRetriever::from_config(&knowledge, search));
            let mut messages = vec![ChatMessage::user(question)];
            augmenter.augment_now(&mut messages).await;
            println!("{}", serde_json::to_string_pretty(&messages)?);
        }
        Commands::Speak { name, text } => {
            let dispatcher = AudioDispatcher::from_config(&config.tts())?;
            let mut session = TtsSession::new();

            let fragments = match text {
                Some(text) => vec![text],
                None => read_stdin_lines().await?,
            };
            let single = fragments.len() == 1;

            let tickets: Vec<_> = fragments
                .iter()
                .enumerate()
                .map(|(i, fragment)| {
                    let hint = match &name {
                        Some(name) if single => Some(name.clone()),
                        Some(name) => Some(format!("{name}_{i}")),
                        None => None,
                    };
                    dispatcher.submit(&mut session, fragment.as_str(), hint.as_deref())
                })
                .collect();

            for ticket in tickets {
                match ticket.await {
                    Some(path) => println!("{}", path.display()),
                    None => println!("-"),
                }
            }
        }
        Commands::Filter => {
            let mut filter = FilterState::new();
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            while let Some(line) = lines.next_line().await? {
                println!("{}", filter.filter(line.as_str()));
            }
            if filter.is_suppressing() {
                tracing::warn!("Input ended inside an unclosed bracket");
            }
        }
        Commands::Config { action } => match action {
            ConfigAction::Show => {
                let json = serde_json::to_string_pretty(&config)?;
                println!("{json}");
            }
            ConfigAction::Get { key } => match config.get_path(&key) {
                Some(value) => println!("{}", serde_json::to_string_pretty(&value)?),
                None => anyhow::bail!("No config value at '{key}'"),
            },
            ConfigAction::Validate => {
                let (warnings, errors) = config.validate();
                for warning in &warnings {
                    println!("warning: {warning}");
                }
                for error in &errors {
                    println!("error: {error}");
                }
                if !errors.is_empty() {
                    anyhow::bail!("{} configuration error(s) in {}", errors.len(), config_path.display());
                }
                println!("Config OK: {}", config_path.display());
            }
        },
    }

    Ok(())
}

async fn read_stdin_lines() -> anyhow::Result<Vec<String>> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut out = Vec::new();
    while let Some(line) = lines.next_line().await? {
        out.push(line);
    }
    Ok(out)
}
