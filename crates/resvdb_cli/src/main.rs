//! Operator CLI over a reservation database file.
//!
//! # Responsibility
//! - Inspect and prune stored reservations without a running scheduler.
//! - Keep output line-oriented (or JSON with `--json`) for scripting.

use clap::{Parser, Subcommand};
use log::info;
use resvdb_core::db::open_db;
use resvdb_core::{
    core_version, init_logging_from_config, CoreConfig, DeleteOutcome, KvResvRepository,
    ResvInfo, ResvService, SqliteKvStore, SyncCheckpoint,
};
use std::error::Error;
use std::ops::ControlFlow;
use std::path::PathBuf;
use std::process::ExitCode;

/// Reservation database inspector.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Database file to open (created when missing).
    #[arg(long, value_name = "FILE", env = "RESVDB_DB_PATH", default_value = "resvdb.sqlite3")]
    db: PathBuf,

    /// JSON config with `namespace`, `log_level` and `log_dir`.
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the core library version
    Version,

    /// List reservations, optionally only those saved since a timestamp
    List {
        /// Lower bound on the save time (epoch seconds)
        #[arg(long)]
        since: Option<i64>,

        /// Emit one JSON object per line
        #[arg(long)]
        json: bool,
    },

    /// Show one reservation with its attributes
    Show {
        resvid: String,

        #[arg(long)]
        json: bool,
    },

    /// Delete one reservation
    Delete { resvid: String },

    /// Remove every attribute of one reservation, keeping its fields
    ClearAttrs { resvid: String },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("resvdb: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    if let Commands::Version = cli.command {
        println!("resvdb_core version={}", core_version());
        return Ok(());
    }

    let config = match &cli.config {
        Some(path) => CoreConfig::from_json_file(path)?,
        None => CoreConfig::default(),
    };
    init_logging_from_config(&config)?;

    let conn = open_db(&cli.db)?;
    let store = SqliteKvStore::new(&conn, config.namespace.as_str());
    let service = ResvService::new(KvResvRepository::new(&store));
    info!(
        "event=cli_start module=cli status=ok namespace={} db={}",
        config.namespace,
        cli.db.display()
    );

    match cli.command {
        Commands::Version => {}
        Commands::List { since, json } => {
            let mut checkpoint = since.map_or_else(SyncCheckpoint::start, SyncCheckpoint::at);
            let mut failure = None;
            let rows = service.sync_changed(&mut checkpoint, |resv| {
                match print_resv(resv, json, false) {
                    Ok(()) => ControlFlow::Continue(()),
                    Err(err) => {
                        failure = Some(err);
                        ControlFlow::Break(())
                    }
                }
            })?;
            if let Some(err) = failure {
                return Err(err);
            }
            if !json {
                println!("{rows} reservation(s)");
            }
        }
        Commands::Show { resvid, json } => {
            let resv = service.get(&resvid)?;
            print_resv(&resv, json, true)?;
        }
        Commands::Delete { resvid } => match service.remove(&resvid)? {
            DeleteOutcome::Deleted => println!("deleted {resvid}"),
            DeleteOutcome::NotFound => println!("{resvid} not found"),
        },
        Commands::ClearAttrs { resvid } => {
            service.clear_attributes(&resvid)?;
            println!("cleared attributes of {resvid}");
        }
    }
    Ok(())
}

fn print_resv(resv: &ResvInfo, json: bool, with_attrs: bool) -> Result<(), Box<dyn Error>> {
    if json {
        println!("{}", serde_json::to_string(resv)?);
        return Ok(());
    }

    println!(
        "{} queue={} state={} substate={} stime={} etime={} duration={} savetm={} attrs={}",
        resv.resvid,
        resv.queue,
        resv.state,
        resv.substate,
        resv.stime,
        resv.etime,
        resv.duration,
        resv.savetm,
        resv.attrs.len()
    );
    if with_attrs {
        for attr in &resv.attrs {
            if attr.has_resource() {
                println!("  {}.{} = {} (flags={})", attr.name, attr.resource, attr.value, attr.flags);
            } else {
                println!("  {} = {} (flags={})", attr.name, attr.value, attr.flags);
            }
        }
    }
    Ok(())
}
