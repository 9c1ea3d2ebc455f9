pub mod analyzer;
pub mod app;
pub mod catalog;
pub mod cli;
pub mod collection;
pub mod commands;
pub mod config;
pub mod error;
pub mod git;
pub mod manifest;
pub mod models;
pub mod persister;
pub mod runner;
pub mod state;
pub mod utils;

use crate::analyzer::JsonResultAnalyzer;
use crate::app::AppFactory;
use crate::catalog::AppCatalog;
use crate::cli::Cli;
use crate::config::{Config, DirsAppDirLocator};
use crate::error::CatalogError;
use crate::git::Git2Client;
use crate::manifest::YamlManifestParser;
use crate::persister::YamlAppStatePersister;
use crate::runner::PlaybookRunner;
use anyhow::Context;
use clap::Parser;
use std::env;
use std::process::ExitCode;
use std::sync::Arc;

fn init_logging(verbose: bool) {
    let mut builder = env_logger::Builder::new();
    builder
        .filter_level(if verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        })
        .filter_module("git2", log::LevelFilter::Warn);
    if let Ok(filters) = env::var("RUST_LOG") {
        builder.parse_filters(&filters);
    }
    if let Err(e) = builder.try_init() {
        eprintln!("Failed to initialize logging: {}", e);
    }
}

/// Wires the catalog to the real git, ansible and filesystem implementations.
pub fn build_catalog(config: Config) -> AppCatalog {
    let app_factory = AppFactory::new(
        Arc::new(YamlAppStatePersister::new(config.data_root())),
        Arc::new(PlaybookRunner::new()),
        Arc::new(JsonResultAnalyzer::new()),
    );
    AppCatalog::new(
        config,
        Arc::new(Git2Client::new()),
        Arc::new(YamlManifestParser::new(app_factory)),
    )
}

fn execute(cli: Cli) -> anyhow::Result<()> {
    if let Some(dir) = &cli.chdir {
        env::set_current_dir(dir)
            .with_context(|| format!("Failed to change directory to {}", dir.display()))?;
        log::debug!("Changed working directory to {}", dir.display());
    }

    let config = Config::resolve(cli.data_dir.clone(), &DirsAppDirLocator)?;
    log::debug!("Data directory: {}", config.data_root().display());

    let mut catalog = build_catalog(config);
    cli.command.execute(&mut catalog)
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match execute(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            match e.downcast_ref::<CatalogError>() {
                Some(CatalogError::CollectionAlreadyExists { name }) => eprintln!(
                    "An app collection named '{}' already exists. \
                     Remove it first or pick another name with --name.",
                    name
                ),
                _ => eprintln!("Error: {:#}", e),
            }
            ExitCode::FAILURE
        }
    }
}
