use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use grantkeeper_cli::OutputFormat;
use grantkeeper_cli::commands;
use grantkeeper_core::validate::NoExisting;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "grantkeeper")]
#[command(author, version, about, long_about = None)]
#[command(
    about = "Validate, archive and track changes to scraped scholarship records",
    long_about = "Grantkeeper takes raw field values extracted from opportunity listings, \
                  validates them into typed records, keeps an archive index of what was \
                  collected, and reports what changed between collections."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format
    #[arg(short, long, global = true, value_enum, default_value = "pretty")]
    format: OutputFormat,

    /// Archive directory (defaults to the user data directory)
    #[arg(long, global = true, env = "GRANTKEEPER_ARCHIVE")]
    archive: Option<PathBuf>,

    /// JSON file with validation thresholds and weights
    #[arg(long, global = true, env = "GRANTKEEPER_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate raw record files without archiving them
    Validate {
        /// JSON files or glob patterns
        #[arg(value_name = "FILES", required = true)]
        files: Vec<String>,

        /// Also check ids against the archive for collisions
        #[arg(long)]
        check_archive: bool,
    },

    /// Validate raw record files and store the valid ones in the archive
    Ingest {
        /// JSON files or glob patterns
        #[arg(value_name = "FILES", required = true)]
        files: Vec<String>,

        /// Replace archived records even when their title or URL differs
        #[arg(long)]
        overwrite: bool,

        /// Append detected changes to this JSON-lines file
        #[arg(long, value_name = "PATH")]
        change_log: Option<PathBuf>,
    },

    /// List archived records
    List {
        /// Only records with this status (upcoming, active, expired, cancelled)
        #[arg(long)]
        status: Option<String>,

        /// Only records in this category
        #[arg(long)]
        category: Option<String>,
    },

    /// Show one archived record
    Show {
        /// Record id
        id: String,
    },

    /// Compare two versions of a raw record
    Diff {
        /// Earlier version
        #[arg(value_name = "OLD")]
        old: PathBuf,

        /// Later version
        #[arg(value_name = "NEW")]
        new: PathBuf,
    },

    /// Remove a record from the archive
    Remove {
        /// Record id
        id: String,
    },

    /// Mark an archived record as cancelled
    Cancel {
        /// Record id
        id: String,
    },

    /// Recompute record statuses (expire past deadlines, open upcoming records)
    Rescan {
        /// Reference time instead of now (YYYY-MM-DD or RFC 3339)
        #[arg(long, value_parser = parse_as_of)]
        as_of: Option<DateTime<Utc>>,
    },

    /// Show archive statistics
    Stats,

    /// Generate shell completion scripts
    #[command(after_help = "SUPPORTED SHELLS: bash, zsh, fish, powershell, elvish\n\n\
                            INSTALLATION:\n  \
                            bash: grantkeeper completion --shell bash >> ~/.bashrc\n  \
                            zsh:  grantkeeper completion --shell zsh > ~/.zfunc/_grantkeeper")]
    Completion {
        /// Target shell
        #[arg(long, value_enum)]
        shell: Shell,
    },
}

fn parse_as_of(value: &str) -> std::result::Result<DateTime<Utc>, String> {
    grantkeeper_core::record::parse_timestamp(value)
        .ok_or_else(|| format!("'{}' is not a date or RFC 3339 timestamp", value))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    init_logging(cli.verbose);
    tracing::debug!("Output format: {}", cli.format.as_str());

    let archive = cli.archive.as_deref();

    match cli.command {
        Commands::Validate {
            files,
            check_archive,
        } => {
            let validator = commands::load_validator(cli.config.as_deref())?;
            if check_archive {
                let index = commands::open_archive(archive)?;
                commands::validate::execute(&files, &validator, &index, cli.format)
            } else {
                commands::validate::execute(&files, &validator, &NoExisting, cli.format)
            }
        }
        Commands::Ingest {
            files,
            overwrite,
            change_log,
        } => {
            let validator = commands::load_validator(cli.config.as_deref())?;
            commands::ingest::execute(
                &files,
                archive,
                &validator,
                overwrite,
                change_log.as_deref(),
                cli.format,
            )
        }
        Commands::List { status, category } => {
            commands::list::execute(archive, status.as_deref(), category.as_deref(), cli.format)
        }
        Commands::Show { id } => commands::show::execute(archive, &id, cli.format),
        Commands::Diff { old, new } => commands::diff::execute(&old, &new, cli.format),
        Commands::Remove { id } => commands::remove::execute(archive, &id),
        Commands::Cancel { id } => commands::cancel::execute(archive, &id),
        Commands::Rescan { as_of } => commands::rescan::execute(archive, as_of, cli.format),
        Commands::Stats => commands::stats::execute(archive, cli.format),
        Commands::Completion { shell } => {
            let mut cmd = Cli::command();
            commands::completion::execute(shell, &mut cmd)
        }
    }
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("grantkeeper=debug,grantkeeper_cli=debug,grantkeeper_core=debug")
    } else {
        EnvFilter::new("grantkeeper=info,grantkeeper_cli=info,grantkeeper_core=warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();
}
