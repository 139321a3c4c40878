//! Modboot CLI

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use modboot_config::{load_config, LoaderConfig, LogFormat};
use modboot_runtime::{
    establish_host_version, Catalog, DependencyResolver, FsAssetSource, KeyValueStore, MemoryStore,
};
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "modboot")]
#[command(about = "Mod loader for browser-hosted games", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve and print the load order of an installed game
    Order {
        /// Game asset directory holding mods.json and the mods folder
        #[arg(short, long, env = "MODBOOT_ROOT")]
        root: PathBuf,

        /// Path to configuration file; defaults apply when omitted
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// JSON object of persisted key-value state (mod overrides, version)
        #[arg(short, long)]
        store: Option<PathBuf>,

        /// Log level (trace, debug, info, warn, error); overrides the config
        #[arg(short, long)]
        log_level: Option<String>,
    },

    /// Validate configuration file
    Validate {
        /// Path to configuration file
        #[arg(short, long, default_value = "modboot.yaml")]
        config: PathBuf,
    },

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Order {
            root,
            config,
            store,
            log_level,
        } => {
            let config = match config {
                Some(path) => load_config(&path)
                    .with_context(|| format!("Failed to load {}", path.display()))?,
                None => LoaderConfig::default(),
            };
            let level = log_level.unwrap_or_else(|| config.logging.level.clone());
            init_tracing(&level, config.logging.format)?;

            let store = match store {
                Some(path) => read_store(&path)?,
                None => MemoryStore::new(),
            };

            print_order(&root, &config, &store).await
        }

        Commands::Validate { config } => {
            init_tracing("info", LogFormat::Text)?;

            tracing::info!("Validating configuration: {}", config.display());

            match load_config(&config) {
                Ok(cfg) => {
                    tracing::info!("✓ Configuration is valid");
                    tracing::info!("  Entrypoint: {}", cfg.paths.entrypoint);
                    tracing::info!("  Mod list: {}", cfg.paths.mod_list);
                    tracing::info!(
                        "  Loader: {} {}",
                        cfg.packages.loader_name,
                        cfg.packages.loader_version
                    );
                    tracing::info!("  Poll interval: {:?}", cfg.bootstrap.poll_interval);
                    match cfg.bootstrap.readiness_timeout {
                        Some(timeout) => tracing::info!("  Readiness timeout: {:?}", timeout),
                        None => tracing::info!("  Readiness timeout: none"),
                    }
                    Ok(())
                }
                Err(e) => {
                    tracing::error!("✗ Configuration validation failed: {}", e);
                    std::process::exit(1);
                }
            }
        }

        Commands::Version => {
            println!("Modboot");
            println!("Version: {}", env!("CARGO_PKG_VERSION"));
            println!("Rust version: {}", env!("CARGO_PKG_RUST_VERSION"));
            Ok(())
        }
    }
}

async fn print_order(root: &Path, config: &LoaderConfig, store: &MemoryStore) -> Result<()> {
    let source = FsAssetSource::new(root);

    let host_version = establish_host_version(&source, store, &config.paths.changelog).await;
    let catalog = Catalog::gather(&source, config, &host_version)
        .await
        .context("Failed to gather packages")?;

    let order = DependencyResolver::new(catalog.packages())
        .priority(config.packages.priority_mod.as_deref())
        .max_passes(config.packages.max_resolve_passes)
        .order(catalog.mod_ids())
        .context("Failed to resolve load order")?;

    println!("{} {}", config.packages.host_name, host_version);
    for (position, id) in order.iter().enumerate() {
        let version = catalog
            .get(id)
            .map(|descriptor| descriptor.version().to_string())
            .unwrap_or_default();
        let state = if store.is_mod_enabled(id) {
            "enabled"
        } else {
            "disabled"
        };
        println!("{:>3}. {} {} ({})", position + 1, id, version, state);
    }

    Ok(())
}

fn read_store(path: &Path) -> Result<MemoryStore> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read store {}", path.display()))?;
    MemoryStore::from_json(&text).with_context(|| format!("Invalid store {}", path.display()))
}

fn init_tracing(level: &str, format: LogFormat) -> Result<()> {
    let filter = match level.to_lowercase().as_str() {
        "trace" => tracing::Level::TRACE,
        "debug" => tracing::Level::DEBUG,
        "info" => tracing::Level::INFO,
        "warn" => tracing::Level::WARN,
        "error" => tracing::Level::ERROR,
        _ => tracing::Level::INFO,
    };
    let filter = EnvFilter::from_default_env().add_directive(filter.into());

    match format {
        LogFormat::Text => tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_level(true)
                    .with_writer(std::io::stderr),
            )
            .with(filter)
            .try_init()?,
        LogFormat::Json => tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .with(filter)
            .try_init()?,
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_order_arguments() {
        let cli = Cli::try_parse_from(["modboot", "order", "--root", "/games/cc/assets"]).unwrap();
        match cli.command {
            Commands::Order { root, config, .. } => {
                assert_eq!(root, PathBuf::from("/games/cc/assets"));
                assert!(config.is_none());
            }
            _ => panic!("expected order command"),
        }
    }
}
