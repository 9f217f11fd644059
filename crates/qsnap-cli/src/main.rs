#![forbid(unsafe_code)]

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use qsnap_binary::AssessmentTestSeeker;
use qsnap_storage::{BinaryStorage, Compression, FsBlobStore, StorageConfig, StorageService};
use qsnap_types::{AssessmentTest, ComponentKind};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "qsnap",
    version,
    about = "Inspect and manage binary assessment session snapshots"
)]
struct Cli {
    /// Log filter (tracing-subscriber EnvFilter syntax).
    ///
    /// Environment variable: `QSNAP_LOG`.
    #[arg(long, global = true, env = "QSNAP_LOG", default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the structural index of a test definition, one entry per line.
    Index {
        #[command(flatten)]
        definition: DefinitionArg,

        /// Comma-separated component kinds to index (default: every kind).
        #[arg(long, value_delimiter = ',')]
        categories: Vec<ComponentKind>,
    },
    /// Create and persist a fresh session, printing its id.
    Init {
        #[command(flatten)]
        definition: DefinitionArg,

        #[command(flatten)]
        store: StoreArg,

        /// Payload compression for the stored snapshot (`none` or `lz4`).
        #[arg(long, env = "QSNAP_COMPRESSION", default_value = "lz4")]
        compression: Compression,
    },
    /// Load a stored session and print it as JSON.
    Inspect {
        #[command(flatten)]
        definition: DefinitionArg,

        #[command(flatten)]
        store: StoreArg,

        /// Id of the session to load.
        #[arg(long, env = "QSNAP_SESSION")]
        session: String,
    },
}

#[derive(Debug, Args)]
struct DefinitionArg {
    /// JSON test definition.
    ///
    /// Environment variable: `QSNAP_DEFINITION`.
    #[arg(long = "definition", env = "QSNAP_DEFINITION")]
    path: PathBuf,
}

#[derive(Debug, Args)]
struct StoreArg {
    /// Directory holding one snapshot file per session.
    ///
    /// Environment variable: `QSNAP_STORE`.
    #[arg(long = "store", env = "QSNAP_STORE")]
    dir: PathBuf,
}

fn load_definition(path: &Path) -> Result<AssessmentTest> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read definition {}", path.display()))?;
    AssessmentTest::parse_str(&text)
        .with_context(|| format!("invalid definition {}", path.display()))
}

fn open_storage(
    definition: &DefinitionArg,
    store: &StoreArg,
    config: StorageConfig,
) -> Result<BinaryStorage<FsBlobStore>> {
    let test = load_definition(&definition.path)?;
    let blobs = FsBlobStore::open(&store.dir)
        .with_context(|| format!("failed to open store {}", store.dir.display()))?;
    Ok(BinaryStorage::new(test, blobs, config)?)
}

fn run(command: Command, out: &mut impl Write) -> Result<()> {
    match command {
        Command::Index {
            definition,
            categories,
        } => {
            let test = load_definition(&definition.path)?;
            let categories = if categories.is_empty() {
                ComponentKind::ALL.to_vec()
            } else {
                categories
            };
            let seeker = AssessmentTestSeeker::build(&test, &categories)?;
            for &kind in seeker.categories() {
                for (position, component) in seeker.entries(kind)? {
                    writeln!(out, "{kind} {position} {}", component.identifier())?;
                }
            }
        }
        Command::Init {
            definition,
            store,
            compression,
        } => {
            let config = StorageConfig {
                compression,
                ..StorageConfig::default()
            };
            let storage = open_storage(&definition, &store, config)?;
            let session = storage.instantiate()?;
            storage.persist(&session)?;
            tracing::info!(
                session = %session.session_id,
                store = %store.dir.display(),
                "created session"
            );
            writeln!(out, "{}", session.session_id)?;
        }
        Command::Inspect {
            definition,
            store,
            session,
        } => {
            let storage = open_storage(&definition, &store, StorageConfig::default())?;
            let session = storage
                .retrieve(&session)
                .with_context(|| format!("failed to load session {session}"))?;
            serde_json::to_writer_pretty(&mut *out, &session)?;
            writeln!(out)?;
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let stdout = io::stdout();
    let mut out = stdout.lock();
    run(cli.command, &mut out)?;
    out.flush()?;
    Ok(())
}
