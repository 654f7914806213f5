//! docent CLI entry point

use clap::{Parser, Subcommand};
use docent::{
    commands::{
        cmd_document_status, cmd_forget, cmd_forget_bot, cmd_list_documents, cmd_purge, cmd_query,
        cmd_remove_document, cmd_status, cmd_sweep, cmd_sync_registry, cmd_train_drive,
        cmd_train_file, print_detach_outcome, print_document_status, print_documents,
        print_query_result, print_remove_outcome, print_status, print_training_outcome,
    },
    config::Config,
    embed::{create_embedder, Embedder},
    error::Result,
    extract::{DriveExtractor, ExtractorSet, TextFileExtractor},
    lifecycle::Lifecycle,
    progress::LogWriterFactory,
    registry::VectorRegistry,
    search::ContextSearcher,
    store::{QdrantStore, VectorIndex},
    tracking::{BlobStore, FsBlobStore, TrackingStore},
    train::Trainer,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "docent")]
#[command(version, about = "Document training and retrieval backend for RAG chatbots", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration file
    Init {
        /// Force overwrite existing config
        #[arg(long)]
        force: bool,
    },

    /// Train a document for a bot
    Train {
        #[command(subcommand)]
        source: TrainSource,
    },

    /// Retrieve grounded context for a query
    Query {
        /// The query text
        query: String,

        /// Bot whose documents are searched
        #[arg(short, long)]
        bot: String,
    },

    /// Show system status, or one document's training status
    Status {
        /// Bot to check a document for
        #[arg(long, requires = "document")]
        bot: Option<String>,

        /// Document to check
        #[arg(long, requires = "bot")]
        document: Option<String>,
    },

    /// List trained documents
    Documents {
        /// Only documents used by this bot
        #[arg(long)]
        bot: Option<String>,
    },

    /// Detach a bot from a document (cleans up when no bots remain)
    Forget {
        /// Document to forget
        document: String,

        /// Bot doing the forgetting
        #[arg(short, long)]
        bot: String,
    },

    /// Detach a bot from every document it uses
    ForgetBot {
        /// Bot to detach everywhere
        bot: String,
    },

    /// Remove a document for all bots
    Remove {
        /// Document to remove
        document: String,
    },

    /// Purge all training data
    Purge {
        /// Confirm the purge
        #[arg(long)]
        yes: bool,
    },

    /// Hard-delete retired vectors
    Sweep,

    /// Rebuild the vector registry from the index
    SyncRegistry,
}

#[derive(Subcommand)]
enum TrainSource {
    /// A blob-stored file (PDF, text, Markdown) by filename
    File {
        /// Filename inside the documents directory
        filename: String,

        /// Bot to train
        #[arg(short, long)]
        bot: String,
    },

    /// A Google Drive file (Docs or Sheets) by file id
    Drive {
        /// Drive file id
        file_id: String,

        /// Bot to train
        #[arg(short, long)]
        bot: String,
    },
}

/// Shared handles built once per invocation
struct App {
    config: Config,
    tracking: Arc<TrackingStore>,
    store: Arc<QdrantStore>,
    index: Arc<dyn VectorIndex>,
    embedder: Arc<dyn Embedder>,
    registry: VectorRegistry,
    lifecycle: Lifecycle,
}

impl App {
    async fn build(config: Config) -> Result<Self> {
        let blob: Arc<dyn BlobStore> =
            Arc::new(FsBlobStore::new(config.paths.state_dir.clone()));
        let tracking = Arc::new(TrackingStore::new(
            blob.clone(),
            docent::config::default_tracking_blob(),
        ));

        let store = Arc::new(QdrantStore::connect(&config).await?);
        let index: Arc<dyn VectorIndex> = store.clone();

        let embedder: Arc<dyn Embedder> = Arc::from(create_embedder(&config.embedding)?);

        let registry = VectorRegistry::new(
            blob,
            docent::config::default_registry_blob(),
            index.clone(),
        );
        let lifecycle = Lifecycle::new(tracking.clone(), index.clone());

        Ok(Self {
            config,
            tracking,
            store,
            index,
            embedder,
            registry,
            lifecycle,
        })
    }

    fn drive(&self) -> Result<Arc<DriveExtractor>> {
        Ok(Arc::new(DriveExtractor::new(&self.config.drive)?))
    }

    fn trainer(&self, drive: Option<Arc<DriveExtractor>>) -> Trainer {
        let mut extractors = ExtractorSet::new();
        extractors.register(Arc::new(TextFileExtractor::new(
            self.config.paths.documents_dir.clone(),
        )));
        #[cfg(feature = "pdf")]
        extractors.register(Arc::new(docent::extract::PdfExtractor::new(
            self.config.paths.documents_dir.clone(),
        )));
        if let Some(ref drive) = drive {
            extractors.register(drive.clone());
        }

        let trainer = Trainer::new(
            &self.config,
            self.tracking.clone(),
            self.index.clone(),
            self.embedder.clone(),
            extractors,
        );
        match drive {
            Some(drive) => trainer.with_drive(drive),
            None => trainer,
        }
    }

    fn searcher(&self) -> ContextSearcher {
        ContextSearcher::new(
            self.tracking.clone(),
            self.index.clone(),
            self.embedder.clone(),
            self.config.search.clone(),
        )
    }
}

fn cmd_init(config_path: Option<PathBuf>, force: bool) -> Result<()> {
    let path = config_path.unwrap_or_else(Config::default_config_path);
    if path.exists() && !force {
        return Err(docent::Error::Config(format!(
            "Config already exists at {} (use --force to overwrite)",
            path.display()
        )));
    }

    let mut config = Config::default();
    config.paths.config_file = path.clone();
    config.save()?;

    let base = path.parent().unwrap_or(std::path::Path::new("."));
    std::fs::create_dir_all(base.join("documents"))?;
    std::fs::create_dir_all(base.join("state"))?;

    println!("✓ Wrote configuration to {}", path.display());
    println!("  Place uploaded documents in {}", base.join("documents").display());
    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    let Cli {
        config: config_path,
        json,
        command,
        ..
    } = cli;

    let command = match command {
        Commands::Init { force } => return cmd_init(config_path, force),
        other => other,
    };

    let config = match &config_path {
        Some(path) => Config::load(path)?,
        None => Config::load_default()?,
    };

    let app = App::build(config).await?;

    match command {
        Commands::Init { .. } => unreachable!("handled above"),

        Commands::Train { source } => {
            app.store.ensure_collection().await?;
            match source {
                TrainSource::File { filename, bot } => {
                    let trainer = app.trainer(None);
                    let outcome =
                        cmd_train_file(&trainer, &app.registry, &filename, &bot).await?;
                    print_training_outcome(&filename, &bot, &outcome);
                }
                TrainSource::Drive { file_id, bot } => {
                    let drive = app.drive()?;
                    let trainer = app.trainer(Some(drive.clone()));
                    let outcome =
                        cmd_train_drive(&trainer, &app.registry, &drive, &file_id, &bot).await?;
                    print_training_outcome(&file_id, &bot, &outcome);
                }
            }
        }

        Commands::Query { query, bot } => {
            let searcher = app.searcher();
            let context = cmd_query(&searcher, &query, &bot).await?;
            if json {
                println!(
                    "{}",
                    serde_json::json!({ "bot": bot, "context": context })
                );
            } else {
                print_query_result(&bot, &context);
            }
        }

        Commands::Status { bot, document } => match (bot, document) {
            (Some(bot), Some(document)) => {
                let status = cmd_document_status(&app.lifecycle, &bot, &document).await?;
                print_document_status(&bot, &document, status);
            }
            _ => {
                let status = cmd_status(&app.config, &app.tracking, &app.store).await?;
                if json {
                    println!("{}", serde_json::to_string_pretty(&status)?);
                } else {
                    print_status(&status);
                }
            }
        },

        Commands::Documents { bot } => {
            let documents = cmd_list_documents(&app.tracking, bot.as_deref()).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&documents)?);
            } else {
                print_documents(&documents);
            }
        }

        Commands::Forget { document, bot } => {
            let outcome = cmd_forget(&app.lifecycle, &document, &bot).await?;
            print_detach_outcome(&document, &bot, outcome);
        }

        Commands::ForgetBot { bot } => {
            let detached = cmd_forget_bot(&app.lifecycle, &bot).await?;
            println!("✓ Bot '{}' detached from {} documents", bot, detached);
        }

        Commands::Remove { document } => {
            let outcome = cmd_remove_document(&app.lifecycle, &document).await?;
            print_remove_outcome(&document, outcome);
        }

        Commands::Purge { yes } => {
            if !yes {
                return Err(docent::Error::Validation(
                    "Purge removes all training data; pass --yes to confirm".to_string(),
                ));
            }
            let purged = cmd_purge(&app.lifecycle).await?;
            println!("✓ Purged {} documents", purged);
        }

        Commands::Sweep => {
            let swept = cmd_sweep(&app.lifecycle).await?;
            println!("✓ Swept {} retired vectors", swept);
        }

        Commands::SyncRegistry => {
            let documents = cmd_sync_registry(&app.registry).await?;
            println!("✓ Registry rebuilt from the index ({} documents)", documents);
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("docent=debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("docent=warn"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(LogWriterFactory).with_target(false))
        .with(filter)
        .init();

    if let Err(e) = run(cli).await {
        error!("{}", e);
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
