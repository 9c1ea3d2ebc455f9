use crate::catalog::AppCatalog;
use crate::commands;
use crate::models::{AppInfo, CollectionInfo};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "ansible-self-service",
    version,
    about = "Install and remove desktop apps from git-hosted Ansible playbook collections"
)]
pub struct Cli {
    /// Directory for cloned collections and app states
    #[arg(long, global = true, value_name = "DIR")]
    pub data_dir: Option<PathBuf>,
    /// Change to this directory before doing anything else
    #[arg(long, global = true, value_name = "DIR")]
    pub chdir: Option<PathBuf>,
    /// Log debug output
    #[arg(short, long, global = true)]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Manage app collections
    #[command(subcommand)]
    Collection(CollectionCommand),
    /// Inspect and manage apps
    #[command(subcommand)]
    App(AppCommand),
}

#[derive(Debug, Subcommand)]
pub enum CollectionCommand {
    /// List all app collections
    List,
    /// Clone a new app collection
    Add {
        #[arg(value_name = "URL")]
        url: String,
        /// Name of the collection; derived from the URL if omitted
        #[arg(long)]
        name: Option<String>,
    },
    /// Remove an app collection
    Remove {
        #[arg(value_name = "NAME")]
        name: String,
    },
    /// Update an app collection to a revision or the latest commit
    Update {
        #[arg(value_name = "NAME")]
        name: String,
        /// Commit, tag or branch to check out
        #[arg(long)]
        revision: Option<String>,
    },
    /// Update all app collections to their latest commit
    UpdateAll,
}

#[derive(Debug, Args, Clone)]
pub struct AppTarget {
    #[arg(value_name = "NAME")]
    pub name: String,
    /// Collection containing the app; all collections are searched if omitted
    #[arg(long)]
    pub collection: Option<String>,
}

#[derive(Debug, Subcommand)]
pub enum AppCommand {
    /// List the apps of all collections
    List,
    /// Query the current status of an app
    Refresh(AppTarget),
    /// Install an app
    Install(AppTarget),
    /// Uninstall an app
    Uninstall(AppTarget),
}

impl Command {
    pub fn execute(self, catalog: &mut AppCatalog) -> anyhow::Result<()> {
        match self {
            Command::Collection(command) => command.execute(catalog),
            Command::App(command) => command.execute(catalog),
        }
    }
}

impl CollectionCommand {
    fn execute(self, catalog: &mut AppCatalog) -> anyhow::Result<()> {
        match self {
            CollectionCommand::List => {
                let collections = commands::collection::list_collections(catalog)?;
                print!("{}", collection_table(&collections));
            }
            CollectionCommand::Add { url, name } => {
                let info = commands::collection::add_collection(catalog, &url, name.as_deref())?;
                println!("Added collection {} at revision {}", info.name, info.revision);
                if let Some(error) = &info.validation_error {
                    println!("Warning: {}", error);
                }
            }
            CollectionCommand::Remove { name } => {
                commands::collection::remove_collection(catalog, &name)?;
                println!("Removed collection {}", name);
            }
            CollectionCommand::Update { name, revision } => {
                let report =
                    commands::collection::update_collection(catalog, &name, revision.as_deref())?;
                println!("{}", report);
            }
            CollectionCommand::UpdateAll => {
                let mut failed = 0;
                for (name, result) in commands::collection::update_all_collections(catalog)? {
                    match result {
                        Ok(report) => println!("{}", report),
                        Err(e) => {
                            failed += 1;
                            eprintln!("Failed to update {}: {}", name, e);
                        }
                    }
                }
                if failed > 0 {
                    anyhow::bail!("{} collection(s) could not be updated", failed);
                }
            }
        }
        Ok(())
    }
}

impl AppCommand {
    fn execute(self, catalog: &mut AppCatalog) -> anyhow::Result<()> {
        let info = match self {
            AppCommand::List => {
                let apps = commands::app::list_apps(catalog)?;
                print!("{}", app_table(&apps));
                return Ok(());
            }
            AppCommand::Refresh(target) => commands::app::refresh_app_status(
                catalog,
                target.collection.as_deref(),
                &target.name,
            )?,
            AppCommand::Install(target) => {
                commands::app::install_app(catalog, target.collection.as_deref(), &target.name)?
            }
            AppCommand::Uninstall(target) => {
                commands::app::uninstall_app(catalog, target.collection.as_deref(), &target.name)?
            }
        };
        println!("{} ({}): {}", info.name, info.collection, info.status);
        Ok(())
    }
}

// -----------------------------------------------------------------------------
// Table rendering
// -----------------------------------------------------------------------------

/// Renders rows as left-aligned columns separated by two spaces.
pub fn render_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut out = format_row(headers, &widths);
    for row in rows {
        let cells: Vec<&str> = row.iter().map(String::as_str).collect();
        out.push_str(&format_row(&cells, &widths));
    }
    out
}

fn format_row(cells: &[&str], widths: &[usize]) -> String {
    let line = cells
        .iter()
        .zip(widths)
        .map(|(cell, width)| {
            let padding = width.saturating_sub(cell.chars().count());
            format!("{}{}", cell, " ".repeat(padding))
        })
        .collect::<Vec<_>>()
        .join("  ");
    format!("{}\n", line.trim_end())
}

fn config_valid(validation_error: Option<&str>) -> String {
    match validation_error {
        None => "✓".to_string(),
        Some(error) => format!("✗ ({})", error),
    }
}

pub fn collection_table(collections: &[CollectionInfo]) -> String {
    let rows: Vec<Vec<String>> = collections
        .iter()
        .map(|c| {
            vec![
                c.name.clone(),
                c.url.clone(),
                config_valid(c.validation_error.as_deref()),
                c.revision.clone(),
                c.app_count.to_string(),
                c.last_updated.clone().unwrap_or_else(|| "-".to_string()),
                c.path.display().to_string(),
            ]
        })
        .collect();
    render_table(
        &["Name", "URL", "Config Valid", "Revision", "Apps", "Last Updated", "Directory"],
        &rows,
    )
}

pub fn app_table(apps: &[AppInfo]) -> String {
    let rows: Vec<Vec<String>> = apps
        .iter()
        .map(|a| {
            vec![
                a.name.clone(),
                a.collection.clone(),
                a.categories.join(", "),
                a.status.to_string(),
                a.description.lines().next().unwrap_or_default().to_string(),
            ]
        })
        .collect();
    render_table(
        &["Name", "Collection", "Categories", "Status", "Description"],
        &rows,
    )
}
