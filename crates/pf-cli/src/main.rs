use anyhow::Result;
use clap::{Parser, Subcommand};
use pf_schemas::CartItem;
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(name = "pickflow")]
#[command(about = "Warehouse picking CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sort a cart into walking order, pack it into pallets, print JSON
    Plan {
        /// JSON array of cart lines
        #[arg(long)]
        cart: PathBuf,

        /// CSV with columns warehouse,location,picking_order
        #[arg(long)]
        locations: PathBuf,

        /// Layered config paths in merge order
        #[arg(long = "config")]
        config_paths: Vec<String>,

        /// Refuse config keys nothing reads
        #[arg(long, default_value_t = false)]
        strict: bool,
    },

    /// Merge confirmed activity with a pending-mutation snapshot, print JSON
    Activity {
        /// JSON array of confirmed log entries
        #[arg(long)]
        confirmed: PathBuf,

        /// Mutation queue snapshot
        #[arg(long)]
        pending: Option<PathBuf>,
    },

    /// Print what the local cache under `cache.dir` holds, as JSON
    Cache {
        /// Layered config paths in merge order
        #[arg(long = "config")]
        config_paths: Vec<String>,

        /// Print this session's saved double-check progress instead of the drafts
        #[arg(long)]
        session: Option<String>,
    },

    /// Compute layered config hash + print canonical JSON
    ConfigHash {
        /// Paths in merge order (base -> site -> terminal...)
        #[arg(required = true)]
        paths: Vec<String>,
    },
}

fn main() -> Result<()> {
    // Dev convenience only; real deployments set the environment.
    let _ = dotenvy::from_filename(".env.local");
    init_tracing();

    let cli = Cli::parse();
    match cli.cmd {
        Commands::Plan {
            cart,
            locations,
            config_paths,
            strict,
        } => {
            let (loaded, cfg) = commands::load_config(&config_paths, strict)?;
            tracing::debug!(config_hash = %loaded.config_hash, "config loaded");
            let cart: Vec<CartItem> = commands::read_json(&cart, "cart")?;
            let locations = commands::plan::load_locations(&locations)?;
            let plan = commands::plan::run(&cart, &locations, cfg.pallet_capacity);
            println!("{}", serde_json::to_string_pretty(&plan)?);
        }

        Commands::Activity { confirmed, pending } => {
            let view = commands::activity::run(&confirmed, pending.as_deref())?;
            println!("{}", serde_json::to_string_pretty(&view)?);
        }

        Commands::Cache {
            config_paths,
            session,
        } => {
            let (_, cfg) = commands::load_config(&config_paths, false)?;
            let json = match session {
                Some(id) => serde_json::to_string_pretty(&commands::cache::progress(&cfg.cache_dir, &id)?)?,
                None => serde_json::to_string_pretty(&commands::cache::drafts(&cfg.cache_dir)?)?,
            };
            println!("{json}");
        }

        Commands::ConfigHash { paths } => {
            let (loaded, _) = commands::load_config(&paths, false)?;
            println!("config_hash={}", loaded.config_hash);
            println!("{}", loaded.canonical_json);
        }
    }

    Ok(())
}

/// Logs go to stderr so stdout stays parseable.
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();
}
