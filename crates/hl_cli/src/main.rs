use anyhow::{bail, Context};
use clap::Parser;
use hl_core::config::StorageKind;
use hl_core::{ArticleId, Config, NoteId, NotePayload};
use hl_scrapers::{handle_command, init_logging, IngestPipeline, ScrapeArgs};
use hl_web::{Annotator, AppState};
use serde::Serialize;
use serde_json::Value;
use std::path::PathBuf;
use tracing::{info, Level};

#[derive(Parser, Debug)]
#[command(author, version, about = "Scrape headlines and keep notes on them", long_about = None)]
pub struct Cli {
    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Storage backend: memory or sqlite
    #[arg(long, global = true)]
    storage: Option<StorageKind>,
    /// SQLite database file; implies --storage sqlite
    #[arg(long, global = true)]
    database: Option<PathBuf>,
    #[arg(long, global = true)]
    log_level: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Run the HTTP server
    Serve {
        /// Address to listen on, e.g. 0.0.0.0:8080
        #[arg(long)]
        bind: Option<String>,
    },
    /// Scrape the source page once
    Scrape {
        #[command(flatten)]
        args: ScrapeArgs,
    },
    /// List stored articles
    List {
        #[arg(long)]
        saved: bool,
    },
    /// Mark an article as saved
    Save { id: String },
    /// Clear an article's saved flag
    Unsave { id: String },
    /// Show an article with its notes
    Show { id: String },
    Note {
        #[command(subcommand)]
        command: NoteCommands,
    },
}

#[derive(clap::Subcommand, Debug)]
enum NoteCommands {
    /// Attach a note given as a JSON object, e.g. '{"text":"good find"}'
    Add { id: String, payload: String },
    /// Delete a note and remove it from the article
    Rm { id: String, note_id: String },
}

fn load_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(path) = &cli.database {
        config.storage.path = path.clone();
        config.storage.backend = StorageKind::Sqlite;
    }
    if let Some(kind) = cli.storage {
        config.storage.backend = kind;
    }
    if let Some(level) = &cli.log_level {
        config.log.level = level.clone();
    }
    config.validate()?;
    Ok(config)
}

fn parse_payload(raw: &str) -> anyhow::Result<NotePayload> {
    match serde_json::from_str(raw).context("note payload is not valid JSON")? {
        Value::Object(payload) => Ok(payload),
        _ => bail!("note payload must be a JSON object"),
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;
    let level = config
        .log
        .level
        .parse::<Level>()
        .context("invalid log level")?;
    init_logging(level);

    let stores = hl_storage::create_storage(&config.storage).await?;
    info!("💾 Storage initialized (using {:?})", config.storage.backend);
    if config.storage.backend == StorageKind::Memory && !matches!(cli.command, Commands::Serve { .. }) {
        info!("memory storage is discarded when this command exits");
    }

    match cli.command {
        Commands::Serve { bind } => {
            let bind = bind.unwrap_or_else(|| config.server.bind.clone());
            let ingest = IngestPipeline::from_config(stores.articles.clone(), &config.scrape)?;
            let state = AppState::new(stores, ingest, config.scrape.source_url.clone());
            hl_web::serve(&bind, state).await?;
        }
        Commands::Scrape { args } => {
            handle_command(args, stores.articles.clone(), &config.scrape).await?;
        }
        Commands::List { saved } => {
            let articles = if saved {
                stores.articles.list_saved().await?
            } else {
                stores.articles.list_all().await?
            };
            print_json(&articles)?;
        }
        Commands::Save { id } => {
            let id: ArticleId = id.parse()?;
            print_json(&stores.articles.set_saved(&id, true).await?)?;
        }
        Commands::Unsave { id } => {
            let id: ArticleId = id.parse()?;
            print_json(&stores.articles.set_saved(&id, false).await?)?;
        }
        Commands::Show { id } => {
            let id: ArticleId = id.parse()?;
            print_json(&Annotator::new(&stores).read(&id).await?)?;
        }
        Commands::Note { command } => {
            let annotator = Annotator::new(&stores);
            match command {
                NoteCommands::Add { id, payload } => {
                    let id: ArticleId = id.parse()?;
                    let article = annotator.attach(&id, parse_payload(&payload)?).await?;
                    print_json(&article)?;
                }
                NoteCommands::Rm { id, note_id } => {
                    let id: ArticleId = id.parse()?;
                    let note_id: NoteId = note_id.parse()?;
                    print_json(&annotator.detach(&id, &note_id).await?)?;
                }
            }
        }
    }

    Ok(())
}
