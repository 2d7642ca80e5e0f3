use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use aurasync_backend::api::start_api_server;
use aurasync_backend::auth::InitDataVerifier;
use aurasync_backend::config::{bot_token_from_env, AppConfig};
use aurasync_backend::storage::{MemoryProfileStore, ProfileStore, SqlProfileStore};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the API server
    Serve {
        /// Path to configuration file
        #[arg(short, long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// Listen address:port, overriding the config file
        #[arg(short, long)]
        listen: Option<String>,
    },

    /// Validate a single init-data payload and print the result
    CheckInitData {
        /// The raw init-data string
        payload: String,

        /// Replay window in seconds
        #[arg(long, default_value_t = aurasync_backend::auth::DEFAULT_MAX_AGE_SECS)]
        max_age: i64,
    },
}

fn init_tracing(default_level: &str) {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_level.into()))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { config, listen } => {
            let config_path = config.unwrap_or_else(|| PathBuf::from("aurasync.toml"));
            let (mut config, load_error) = match AppConfig::from_file(&config_path).await {
                Ok(cfg) => (cfg, None),
                Err(e) => (AppConfig::default(), Some(e)),
            };

            // RUST_LOG still wins over the configured level.
            init_tracing(&config.logging.level);
            if let Some(e) = load_error {
                info!(
                    "Config file not found or invalid: {}. Using default configuration.",
                    e
                );
            }

            if let Some(listen) = listen {
                config.api.listen_addr = listen;
            }
            config.validate()?;
            config.ensure_directories().await?;

            let bot_token = bot_token_from_env()?;

            let store: Arc<dyn ProfileStore> = match &config.storage.database_path {
                Some(path) => {
                    info!("Using SQLite profile store at {:?}", path);
                    Arc::new(SqlProfileStore::open(path)?)
                }
                None => {
                    warn!("No database path configured; profiles will not survive restarts");
                    Arc::new(MemoryProfileStore::new())
                }
            };

            start_api_server(config, store, bot_token).await?;
        }

        Commands::CheckInitData { payload, max_age } => {
            let bot_token = bot_token_from_env()?;
            let verifier = InitDataVerifier::new(bot_token).with_max_age(max_age);

            match verifier.validate(&payload) {
                Ok(identity) => {
                    println!("valid");
                    println!("  auth_date:   {}", identity.auth_date);
                    if let Some(user) = &identity.user {
                        println!("  user id:     {}", user.id);
                        println!("  first name:  {}", user.first_name);
                    }
                    if let Some(start_param) = &identity.start_param {
                        println!("  start param: {}", start_param);
                    }
                }
                Err(e) => {
                    println!("invalid: {}", e);
                    std::process::exit(1);
                }
            }
        }
    }

    Ok(())
}
