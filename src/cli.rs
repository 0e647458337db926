//! CLI surface: `serve` runs the mock server (optionally syncing first),
//! `sync` runs the Sync Pipeline standalone against a scanned spec file.

use crate::mock::registry::MockRegistry;
use crate::runtime_config::RuntimeConfig;
use crate::server::{AppService, HttpServer};
use crate::spec::{build_endpoints, sync as run_sync, SpecLoader};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "ouroboros")]
#[command(about = "OpenAPI mock serving and specification synchronization engine", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Load the spec, optionally sync against a scanned spec, and serve mocks.
    Serve {
        #[arg(short, long)]
        spec: Option<PathBuf>,

        /// Path to a YAML file holding the scanned spec produced by the caller's
        /// own codebase introspection; the Sync Pipeline is out of scope for
        /// discovering this input itself.
        #[arg(long)]
        scanned: Option<PathBuf>,

        #[arg(long)]
        addr: Option<String>,

        #[arg(long, default_value_t = false)]
        no_sync: bool,
    },
    /// Run the Sync Pipeline once against a scanned spec and write the result.
    Sync {
        #[arg(short, long)]
        spec: PathBuf,

        #[arg(long)]
        scanned: PathBuf,
    },
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Serve { spec, scanned, addr, no_sync } => serve(spec, scanned, addr, no_sync),
        Commands::Sync { spec, scanned } => sync_once(spec, scanned),
    }
}

fn serve(spec_path: Option<PathBuf>, scanned_path: Option<PathBuf>, addr: Option<String>, no_sync: bool) -> Result<()> {
    let config = RuntimeConfig::from_env();
    let spec_path = spec_path.unwrap_or_else(|| PathBuf::from(&config.spec_path));
    let addr = addr.unwrap_or(config.addr.clone());

    let loader = SpecLoader::new(&spec_path);
    let mut doc = loader
        .read_or_create(vec!["http://localhost:8080".to_string()])
        .with_context(|| format!("loading spec from {}", spec_path.display()))?;

    if !no_sync && config.sync_on_start {
        if let Some(scanned_path) = &scanned_path {
            let scanned_loader = SpecLoader::new(scanned_path);
            let scanned = scanned_loader
                .read()
                .with_context(|| format!("loading scanned spec from {}", scanned_path.display()))?;
            info!(spec = %spec_path.display(), scanned = %scanned_path.display(), "running sync pipeline at startup");
            run_sync(&mut doc, &scanned);
            loader.write(&doc).context("writing synced spec back to disk")?;
        }
    }

    let endpoints = build_endpoints(&doc);
    info!(count = endpoints.len(), "registered mock endpoints");
    let registry = MockRegistry::new();
    for endpoint in endpoints {
        registry.register(endpoint);
    }

    let service = AppService::new(registry, doc);
    let handle = HttpServer(service)
        .start(addr.as_str())
        .with_context(|| format!("binding HTTP server to {addr}"))?;
    info!(addr = %addr, "server started");
    handle
        .join()
        .map_err(|e| anyhow::anyhow!("server thread panicked: {e:?}"))?;
    Ok(())
}

fn sync_once(spec_path: PathBuf, scanned_path: PathBuf) -> Result<()> {
    let loader = SpecLoader::new(&spec_path);
    let mut doc = loader
        .read_or_create(vec![])
        .with_context(|| format!("loading spec from {}", spec_path.display()))?;
    let scanned_loader = SpecLoader::new(&scanned_path);
    let scanned = scanned_loader
        .read()
        .with_context(|| format!("loading scanned spec from {}", scanned_path.display()))?;
    run_sync(&mut doc, &scanned);
    loader.write(&doc).context("writing synced spec back to disk")?;
    info!(spec = %spec_path.display(), "sync pipeline complete, file spec written");
    Ok(())
}
