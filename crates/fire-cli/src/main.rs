//! `fire`: command line front end for the FIRE point register.
//!
//! Reads `fire.toml` (or the path given with `--config`) and `FIRE_*`
//! environment variables, opens the SQLite store and runs one command.
//!
//! # Usage
//!
//! ```text
//! fire sag opret "Revision 2024" --behandler abc
//! fire punkt opret --sag "Revision 2024" --landsnr K-12-1231
//! fire info tilfoej --sag "Revision 2024" K-12-1231 ATTR:beskrivelse \
//!   --tekst "Bolt i mur" -b "Ny beskrivelse"
//! fire udtraek-revision "Revision 2024" K-12-1231 K-22-2231
//! fire serve
//! ```

mod commands;
mod config;

use std::path::PathBuf;

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use fire_store_sqlite::SqliteStore;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use crate::config::FireConfig;

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "fire", author, version, about = "FIRE point register")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "fire.toml", global = true)]
  config: PathBuf,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Serve the JSON API over HTTP.
  Serve,
  /// List the known infotypes.
  Infotyper,
  /// Manage sager (projects).
  #[command(subcommand)]
  Sag(SagCommand),
  /// Create and inspect punkter.
  #[command(subcommand)]
  Punkt(PunktCommand),
  /// Add, close and inspect point information.
  #[command(subcommand)]
  Info(InfoCommand),
  /// Record a comment on a sag without changing any punkt.
  Kommentar {
    #[arg(long)]
    sag:         String,
    beskrivelse: String,
  },
  /// Extract the revision sheet of a set of punkter.
  UdtraekRevision {
    projektnavn: String,
    /// Punkt idents (landsnummer, other idents or UUIDs).
    #[arg(required = true)]
    idents:      Vec<String>,
  },
}

#[derive(Subcommand)]
enum SagCommand {
  /// Create a sag.
  Opret {
    navn:        String,
    #[arg(long)]
    behandler:   String,
    #[arg(long, default_value = "")]
    beskrivelse: String,
  },
  /// Show a sag and its sagsevents.
  Vis { navn: String },
}

#[derive(Subcommand)]
enum PunktCommand {
  /// Create a punkt, optionally giving it a landsnummer in the same sag.
  ///
  /// The punkt and its landsnummer are recorded as two sagsevents. If the
  /// second one fails the punkt stays without a landsnummer; the error names
  /// the punkt so the landsnummer can be added with `fire info tilfoej`.
  Opret {
    #[arg(long)]
    sag:         String,
    #[arg(long)]
    landsnr:     Option<String>,
    #[arg(short, long, default_value = "Oprettelse af punkt")]
    beskrivelse: String,
  },
  /// Show a punkt and its open point information.
  Vis { ident: String },
}

#[derive(Subcommand)]
enum InfoCommand {
  /// Add a fact, superseding the open one of the same infotype if any.
  Tilfoej {
    #[arg(long)]
    sag:         String,
    ident:       String,
    infotype:    String,
    #[arg(long, conflicts_with = "tal")]
    tekst:       Option<String>,
    #[arg(long)]
    tal:         Option<f64>,
    /// The reason for the change.
    #[arg(short, long)]
    beskrivelse: String,
  },
  /// Close an open fact.
  Luk {
    #[arg(long)]
    sag:         String,
    objektid:    i64,
    /// The reason for the change.
    #[arg(short, long)]
    beskrivelse: String,
  },
  /// Show every version of one attribute of a punkt.
  Historik { ident: String, infotype: String },
}

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // Initialise tracing. Command output goes to stdout, logs to stderr.
  tracing_subscriber::fmt()
    .with_writer(std::io::stderr)
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();
  let cfg = FireConfig::load(&cli.config)?;

  let store = SqliteStore::open(&cfg.store_path)
    .await
    .with_context(|| format!("failed to open store at {:?}", cfg.store_path))?;

  match cli.command {
    Command::Serve => commands::serve(store, &cfg).await,
    Command::Infotyper => commands::infotyper(&store).await,
    Command::Sag(SagCommand::Opret { navn, behandler, beskrivelse }) => {
      commands::sag_opret(&store, navn, behandler, beskrivelse).await
    }
    Command::Sag(SagCommand::Vis { navn }) => commands::sag_vis(&store, navn).await,
    Command::Punkt(PunktCommand::Opret { sag, landsnr, beskrivelse }) => {
      commands::punkt_opret(&store, sag, landsnr, beskrivelse).await
    }
    Command::Punkt(PunktCommand::Vis { ident }) => {
      commands::punkt_vis(&store, ident).await
    }
    Command::Info(InfoCommand::Tilfoej {
      sag,
      ident,
      infotype,
      tekst,
      tal,
      beskrivelse,
    }) => {
      commands::info_tilfoej(&store, sag, ident, infotype, tekst, tal, beskrivelse)
        .await
    }
    Command::Info(InfoCommand::Luk { sag, objektid, beskrivelse }) => {
      commands::info_luk(&store, sag, objektid, beskrivelse).await
    }
    Command::Info(InfoCommand::Historik { ident, infotype }) => {
      commands::info_historik(&store, ident, infotype).await
    }
    Command::Kommentar { sag, beskrivelse } => {
      commands::kommentar(&store, sag, beskrivelse).await
    }
    Command::UdtraekRevision { projektnavn, idents } => {
      commands::udtraek_revision(&store, &cfg, projektnavn, idents).await
    }
  }
}
