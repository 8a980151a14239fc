//! `shipledger`: headless front end for the shipment reconciliation engine.

mod exit_codes;
mod progress;
mod recon;
mod store;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use exit_codes::{EXIT_CONSISTENCY, EXIT_INVALID_CONFIG, EXIT_RUNTIME, EXIT_SUCCESS, EXIT_USAGE};
use shipledger_recon::ReconError;

#[derive(Parser)]
#[command(name = "shipledger")]
#[command(about = "Consolidate shipments into clusters and reconcile paid vs. reimbursed cost")]
#[command(version)]
struct Cli {
    /// Recon config (.recon.toml). Defaults to $XDG_CONFIG_HOME/shipledger/recon.toml
    #[arg(long, short = 'c', global = true, env = "SHIPLEDGER_CONFIG")]
    config: Option<PathBuf>,

    /// Debug logging
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    /// Only warnings and errors
    #[arg(long, short = 'q', global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a reconciliation pass and persist the resulting clusters
    #[command(after_help = "\
Examples:
  shipledger run -c march.recon.toml
  shipledger run -c march.recon.toml --groups usa,bfmr --print-unknowns
  shipledger run -c march.recon.toml --resume --json --no-save
  shipledger run -c march.recon.toml --fail-on-discrepancy")]
    Run {
        /// Only fetch and credit these buying groups (comma-separated)
        #[arg(long, value_delimiter = ',')]
        groups: Vec<String>,

        /// Log unknown tuples, purchase orders and trackings
        #[arg(long)]
        print_unknowns: bool,

        /// Seed the run from the persisted cluster store
        #[arg(long)]
        resume: bool,

        /// Output JSON to stdout instead of the human summary
        #[arg(long)]
        json: bool,

        /// Write JSON output to file
        #[arg(long)]
        output: Option<PathBuf>,

        /// Do not write the cluster store
        #[arg(long)]
        no_save: bool,

        /// Exit 3 when any discrepancy is found
        #[arg(long)]
        fail_on_discrepancy: bool,
    },

    /// Validate a recon config without running
    Validate,

    /// Write the persisted clusters as CSV rows
    Export {
        /// Output file (stdout when omitted)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },

    /// Load CSV rows into the persisted store; existing clusters win on overlap
    Import {
        /// CSV file with the Orders,Trackings,... header
        rows: PathBuf,
    },

    /// Summarize the persisted store
    Show {
        /// Output JSON to stdout
        #[arg(long)]
        json: bool,
    },
}

fn init_logging(verbose: bool, quiet: bool) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if quiet {
        builder.filter_level(log::LevelFilter::Warn);
    } else if verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.target(env_logger::Target::Stderr).init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let json_output = matches!(
        cli.command,
        Commands::Run { json: true, .. } | Commands::Show { json: true }
    );
    let quiet = cli.quiet || json_output;
    init_logging(cli.verbose, quiet);

    let result = match cli.command {
        Commands::Run {
            groups,
            print_unknowns,
            resume,
            json,
            output,
            no_save,
            fail_on_discrepancy,
        } => recon::cmd_run(recon::RunArgs {
            config: cli.config,
            groups,
            print_unknowns,
            resume,
            json,
            output,
            no_save,
            fail_on_discrepancy,
            show_progress: !quiet,
        }),
        Commands::Validate => recon::cmd_validate(cli.config),
        Commands::Export { output } => store::cmd_export(cli.config, output),
        Commands::Import { rows } => store::cmd_import(cli.config, rows),
        Commands::Show { json } => store::cmd_show(cli.config, json),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn new(code: u8, msg: impl Into<String>) -> Self {
        Self { code, message: msg.into(), hint: None }
    }

    pub fn usage(msg: impl Into<String>) -> Self {
        Self::new(EXIT_USAGE, msg)
    }

    pub fn runtime(msg: impl Into<String>) -> Self {
        Self::new(EXIT_RUNTIME, msg)
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

impl From<ReconError> for CliError {
    fn from(err: ReconError) -> Self {
        match err {
            ReconError::ReimbursementCollision { .. } => Self::new(EXIT_CONSISTENCY, err.to_string())
                .with_hint("remove the overlapping rows from the non-portal reimbursement files; the store was not modified"),
            ReconError::ConfigParse(_) | ReconError::ConfigValidation(_) => {
                Self::new(EXIT_INVALID_CONFIG, err.to_string())
            }
            _ => Self::runtime(err.to_string()),
        }
    }
}
