use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use cli::http::{self, AppState};
use doclassify_core::app;
use doclassify_core::config::{self, AppConfig};
use doclassify_core::models::{ListQuery, UserId};
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let cfg = config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Serve { bind } => run_serve(cfg, bind).await,
        Commands::Classify {
            file,
            categories,
            json,
        } => run_classify(cfg, file, categories, json).await,
        Commands::Options { user, json } => {
            let user = resolve_user(&cfg, user);
            let lib = app::open_library(&cfg).await?;
            let options = lib.options(user).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&serde_json::json!({ "options": options }))?);
            } else {
                for name in options {
                    println!("{}", name);
                }
            }
            Ok(())
        }
        Commands::List {
            q,
            classification,
            user,
            json,
        } => {
            let user = resolve_user(&cfg, user);
            let lib = app::open_library(&cfg).await?;
            let files = lib.list(user, &ListQuery { q, classification }).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&serde_json::json!({ "files": files }))?);
            } else {
                for f in files {
                    println!(
                        "{}\t{}\t{}\t{}",
                        f.id,
                        f.uploaded_at.to_rfc3339(),
                        f.classification.as_deref().unwrap_or("-"),
                        f.file_name
                    );
                }
            }
            Ok(())
        }
        Commands::Confirm {
            id,
            classification,
            user,
        } => {
            let user = resolve_user(&cfg, user);
            let lib = app::open_library(&cfg).await?;
            let confirmed = lib.confirm(user, id, &classification).await?;
            println!(
                "{}: {}{}",
                confirmed.id,
                confirmed.classification,
                if confirmed.option_added { " (new option)" } else { "" }
            );
            Ok(())
        }
        Commands::Delete { id, user } => {
            let user = resolve_user(&cfg, user);
            let lib = app::open_library(&cfg).await?;
            lib.delete(user, id).await?;
            println!("deleted {}", id);
            Ok(())
        }
    }
}

#[derive(Parser)]
#[command(name = "doclassify")]
#[command(about = "OCR + LLM document classifier", long_about = None)]
struct Cli {
    /// Path to config TOML
    #[arg(short, long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API
    Serve {
        /// Listen address, overrides server.bind
        #[arg(long)]
        bind: Option<String>,
    },
    /// Classify a single file without storing anything
    Classify {
        file: PathBuf,
        /// Candidate categories (comma-separated); defaults to classification.default_options
        #[arg(long, value_delimiter = ',', num_args = 1..)]
        categories: Vec<String>,
        /// Output JSON
        #[arg(long)]
        json: bool,
    },
    /// Show a user's classification options, seeding defaults if empty
    Options {
        #[arg(long)]
        user: Option<i64>,
        /// Output JSON
        #[arg(long)]
        json: bool,
    },
    /// List stored files, newest first
    List {
        /// Case-insensitive file name substring
        #[arg(long)]
        q: Option<String>,
        /// Case-insensitive classification substring
        #[arg(long)]
        classification: Option<String>,
        #[arg(long)]
        user: Option<i64>,
        /// Output JSON
        #[arg(long)]
        json: bool,
    },
    /// Confirm or override a file's classification
    Confirm {
        id: i64,
        classification: String,
        #[arg(long)]
        user: Option<i64>,
    },
    /// Delete a file record and its stored copy
    Delete {
        id: i64,
        #[arg(long)]
        user: Option<i64>,
    },
}

fn resolve_user(cfg: &AppConfig, user: Option<i64>) -> UserId {
    UserId(user.unwrap_or(cfg.server.default_user))
}

async fn run_serve(cfg: AppConfig, bind: Option<String>) -> Result<()> {
    let bind = bind.unwrap_or_else(|| cfg.server.bind.clone());
    let addr: SocketAddr = bind
        .parse()
        .with_context(|| format!("invalid bind address {}", bind))?;
    let library = app::open_library(&cfg).await?;
    let state = AppState {
        library,
        default_user: UserId(cfg.server.default_user),
        max_upload_bytes: cfg.server.max_upload_bytes,
    };
    http::start_server(addr, state).await
}

async fn run_classify(
    cfg: AppConfig,
    file: PathBuf,
    categories: Vec<String>,
    json: bool,
) -> Result<()> {
    let categories = if categories.is_empty() {
        cfg.classification.default_options.clone()
    } else {
        categories
    };
    let orchestrator = app::build_orchestrator(&cfg)?;
    let label = orchestrator.classify_file(&file, &categories).await?;
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "file": file,
                "categories": categories,
                "classification": label,
            }))?
        );
    } else {
        println!("{}", label);
    }
    Ok(())
}
