///
/// This module implements the CLI interface for conductdoc: command parsing,
/// wiring of the concrete collaborators, and user-visible output.
///
/// All extraction, caching and orchestration logic lives in [`conductdoc-core`].
/// This module only builds the concrete adapters and hands them to the core.
///
/// ## Commands
/// - `generate --repo-url <url>`: run the pipeline once and print where the page was written
/// - `serve`: start the HTTP API
/// - `cache stats|sweep|clear`: inspect or prune the artifact cache
///
/// ## How To Use
/// - For command-line users: run the `conductdoc` binary with `--help`.
/// - For programmatic/integration use: call [`run`] with a constructed [`Cli`].
///
/// [`conductdoc-core`]: ../../conductdoc-core/
use crate::load_config::{load_config_or_default, CliConfig};
use crate::render::HtmlRenderer;
use crate::server::{serve, AppState};
use crate::synthesis::OpenAiClient;
use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use conductdoc_core::acquire::GitAcquirer;
use conductdoc_core::cache::{Invalidation, SqliteArtifactCache};
use conductdoc_core::contract::ArtifactCache;
use conductdoc_core::generate::Generator;
use std::path::PathBuf;
use std::sync::Arc;

/// CLI for conductdoc: documentation for Python repositories.
#[derive(Parser)]
#[clap(
    name = "conductdoc",
    version,
    about = "Generate browsable documentation for Python repositories"
)]
pub struct Cli {
    /// Optional YAML config file; defaults and environment apply without one
    #[clap(long, global = true)]
    pub config: Option<PathBuf>,

    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate documentation for one repository
    Generate {
        /// Git URL of the repository to document
        #[clap(long)]
        repo_url: String,
    },
    /// Serve the HTTP API
    Serve {
        #[clap(long)]
        host: Option<String>,
        #[clap(long)]
        port: Option<u16>,
    },
    /// Inspect or prune the artifact cache
    Cache {
        #[clap(subcommand)]
        action: CacheCommand,
    },
}

#[derive(Subcommand)]
pub enum CacheCommand {
    /// Print entry counts and size as JSON
    Stats,
    /// Delete expired entries
    Sweep,
    /// Delete entries for one repository, or all entries
    Clear {
        #[clap(long)]
        repo_url: Option<String>,
    },
}

fn open_cache(config: &CliConfig) -> Result<SqliteArtifactCache> {
    let db_path = &config.generator.cache.db_path;
    SqliteArtifactCache::open(db_path)
        .with_context(|| format!("Failed to open cache database {}", db_path.display()))
}

/// Wires the concrete adapters into a [`Generator`].
pub fn build_generator(config: &CliConfig) -> Result<Generator> {
    let cache = open_cache(config)?;
    let backend = OpenAiClient::from_config(&config.openai)?;
    let renderer = HtmlRenderer::new()?;
    Ok(Generator::new(
        Arc::new(GitAcquirer::new()),
        Arc::new(backend),
        Arc::new(renderer),
        Arc::new(cache),
        config.generator.clone(),
    ))
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    tracing::info!("trace_initialised");

    let config = load_config_or_default(cli.config.as_deref())?;
    config.generator.trace_loaded();

    match cli.command {
        Commands::Generate { repo_url } => {
            tracing::info!(command = "generate", repo_url = %repo_url, "Starting generation");
            let generator = build_generator(&config)?;
            let outcome = generator.generate(&repo_url).await?;
            let failed_units = outcome
                .artifact
                .modules
                .iter()
                .flat_map(|m| std::iter::once(&m.overview).chain(m.symbols.iter().map(|s| &s.documentation)))
                .chain(std::iter::once(&outcome.artifact.overview))
                .filter(|o| !o.is_generated())
                .count();
            tracing::info!(
                command = "generate",
                from_cache = outcome.from_cache,
                failed_units,
                skipped_files = outcome.skipped.len(),
                "Generation complete"
            );
            let summary = serde_json::json!({
                "status": "success",
                "from_cache": outcome.from_cache,
                "doc_url": outcome.artifact.doc_url,
                "modules": outcome.artifact.metadata.total_modules,
                "files": outcome.artifact.metadata.total_files,
                "skipped_files": outcome.skipped.len(),
                "failed_units": failed_units,
            });
            println!("{}", serde_json::to_string_pretty(&summary)?);
            Ok(())
        }
        Commands::Serve { host, port } => {
            let host = host.unwrap_or_else(|| config.server.host.clone());
            let port = port.unwrap_or(config.server.port);
            let generator = build_generator(&config)?;
            match generator.cache().sweep_expired(Utc::now()) {
                Ok(swept) => tracing::info!(swept, "Swept expired cache entries at startup"),
                Err(e) => tracing::warn!(error = %e, "Startup cache sweep failed"),
            }
            let output_dir = config.generator.output_dir.clone();
            let state = AppState {
                generator: Arc::new(generator),
            };
            serve(state, &output_dir, &host, port).await
        }
        Commands::Cache { action } => {
            let cache = open_cache(&config)?;
            let now = Utc::now();
            let report = match action {
                CacheCommand::Stats => {
                    let stats = cache.stats(now)?;
                    serde_json::json!({
                        "total_entries": stats.total,
                        "active_entries": stats.active,
                        "expired_entries": stats.expired,
                        "cache_size_bytes": stats.size_bytes,
                        "cache_size_mb": stats.size_mb(),
                    })
                }
                CacheCommand::Sweep => {
                    let deleted = cache.sweep_expired(now)?;
                    serde_json::json!({ "deleted": deleted })
                }
                CacheCommand::Clear { repo_url } => {
                    let scope = match repo_url {
                        Some(url) => Invalidation::Repository(url),
                        None => Invalidation::All,
                    };
                    let deleted = cache.invalidate(&scope)?;
                    serde_json::json!({ "deleted": deleted })
                }
            };
            cache.close()?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
    }
}
