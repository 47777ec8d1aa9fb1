use std::fs::File;
use std::io::{self, BufReader, Write};
use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use stt_cli::commands::{courses, export, import, init, reset, run, settings, status, today};
use stt_cli::{Cli, Commands, Config, CoursesAction, SettingsAction};

/// Load config, ensuring the database's parent directory exists.
fn load_config(config_path: Option<&Path>) -> Result<Config> {
    let config = Config::load_from(config_path).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");

    if let Some(parent) = config.database_path.parent() {
        std::fs::create_dir_all(parent).context("failed to create database directory")?;
    }
    Ok(config)
}

/// Load config and open database.
fn open_database(config_path: Option<&Path>) -> Result<(stt_db::Database, Config)> {
    let config = load_config(config_path)?;
    let db = stt_db::Database::open(&config.database_path).context("failed to open database")?;
    Ok((db, config))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing with verbose flag support
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    // Logs go to stderr so stdout stays clean for export and --json output
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();

    let stdout = io::stdout();
    let mut out = stdout.lock();

    match &cli.command {
        Some(Commands::Init) => {
            let (mut db, config) = open_database(cli.config.as_deref())?;
            init::run(&mut out, &mut db, &config.database_path)?;
        }
        Some(Commands::Status) => {
            let config = load_config(cli.config.as_deref())?;
            status::run(&mut out, &config)?;
        }
        Some(Commands::Courses(action)) => {
            let (mut db, _config) = open_database(cli.config.as_deref())?;
            match action {
                CoursesAction::List { json } => courses::list(&mut out, &db, *json)?,
                CoursesAction::Import { path } => {
                    let count = courses::import(&mut db, path)?;
                    writeln!(out, "Imported {count} course(s).")?;
                }
                CoursesAction::Resolve { url } => courses::resolve(&mut out, &db, url)?,
            }
        }
        Some(Commands::Settings(action)) => {
            let (mut db, _config) = open_database(cli.config.as_deref())?;
            match action {
                SettingsAction::Show => settings::show(&mut out, &db)?,
                SettingsAction::SetIdle { seconds } => {
                    settings::set_idle(&mut out, &mut db, *seconds)?;
                }
                SettingsAction::StrictFolders { enabled } => {
                    settings::set_strict_folders(&mut out, &mut db, *enabled)?;
                }
            }
        }
        Some(Commands::Run { input }) => {
            let (mut db, _config) = open_database(cli.config.as_deref())?;
            match input {
                Some(path) => {
                    let file = File::open(path)
                        .with_context(|| format!("failed to open {}", path.display()))?;
                    run::run(BufReader::new(file), &mut out, &mut db)?;
                }
                None => {
                    run::run(io::stdin().lock(), &mut out, &mut db)?;
                }
            }
        }
        Some(Commands::Today { badge, json }) => {
            let (db, _config) = open_database(cli.config.as_deref())?;
            let format = if *badge {
                today::Format::Badge
            } else if *json {
                today::Format::Json
            } else {
                today::Format::Text
            };
            today::run(&mut out, &db, format)?;
        }
        Some(Commands::Export { output }) => {
            let (db, _config) = open_database(cli.config.as_deref())?;
            match output {
                Some(output) => {
                    let written = export::run_to_path(&db, output)?;
                    writeln!(out, "Wrote {}", written.display())?;
                }
                None => export::run(&mut out, &db)?,
            }
        }
        Some(Commands::Import { path }) => {
            let (mut db, _config) = open_database(cli.config.as_deref())?;
            let summary = import::run(&mut db, path)?;
            match summary.courses {
                Some(count) => writeln!(out, "Courses:  replaced ({count})")?,
                None => writeln!(out, "Courses:  unchanged")?,
            }
            writeln!(
                out,
                "Settings: {}",
                if summary.settings { "replaced" } else { "unchanged" }
            )?;
            writeln!(out, "Ledger:   {} cell(s) added", summary.ledger_cells)?;
        }
        Some(Commands::Reset { yes }) => {
            let (mut db, _config) = open_database(cli.config.as_deref())?;
            reset::run(&mut out, &mut db, *yes)?;
        }
        None => {
            // No subcommand, show help
            use clap::CommandFactory;
            Cli::command().print_help()?;
            println!();
        }
    }

    Ok(())
}
