//! Command line definition

use clap::builder::RangedU64ValueParser;
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use pmig_pipeline::RunOptions;
use std::path::PathBuf;

/// What to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Migrate one entity
    Migrate {
        /// Entity name
        entity: String,
    },
    /// Migrate every entity in dependency order
    RunAll,
    /// Print the dependency order
    Plan,
}

/// Parsed command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// Subcommand
    pub action: Action,
    /// `--config`
    pub config: Option<PathBuf>,
    /// `--json`
    pub json: bool,
    /// `--preview`
    pub preview: bool,
    /// `--limit`
    pub limit: Option<usize>,
    /// `--fault-tolerant`
    pub fault_tolerant: bool,
    /// `--batch-size`, overriding the configured size
    pub batch_size: Option<usize>,
}

fn run_args() -> [Arg; 4] {
    [
        Arg::new("preview")
            .long("preview")
            .action(ArgAction::SetTrue)
            .help("Map and validate without writing anything"),
        Arg::new("limit")
            .long("limit")
            .value_name("N")
            .value_parser(value_parser!(usize))
            .help("Read at most N legacy records"),
        Arg::new("fault-tolerant")
            .long("fault-tolerant")
            .action(ArgAction::SetTrue)
            .help("Report failed writes and keep going instead of aborting"),
        Arg::new("batch-size")
            .long("batch-size")
            .value_name("N")
            .value_parser(RangedU64ValueParser::<usize>::new().range(1..))
            .help("Records per source read (overrides the config file)"),
    ]
}

/// The `pmig` command
#[must_use]
pub fn build() -> Command {
    Command::new("pmig")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Migrate PetLicense legacy records into the new system")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .global(true)
                .value_name("PATH")
                .value_parser(value_parser!(PathBuf))
                .help("Configuration file (default: ./pmig.toml if present)"),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Print the summary as JSON"),
        )
        .subcommand(
            Command::new("migrate")
                .about("Migrate one legacy entity")
                .arg(
                    Arg::new("entity")
                        .required(true)
                        .help("Entity to migrate (see `pmig plan`)"),
                )
                .args(run_args()),
        )
        .subcommand(
            Command::new("run-all")
                .about("Migrate every entity in dependency order, stopping at the first failed stage")
                .args(run_args()),
        )
        .subcommand(Command::new("plan").about("Print the migration order"))
}

impl Invocation {
    /// Read an invocation out of parsed arguments
    ///
    /// # Errors
    /// - if no known subcommand was given
    pub fn from_matches(matches: &ArgMatches) -> anyhow::Result<Self> {
        let (name, sub) = matches
            .subcommand()
            .ok_or_else(|| anyhow::anyhow!("no subcommand given"))?;

        let action = match name {
            "migrate" => Action::Migrate {
                entity: sub
                    .get_one::<String>("entity")
                    .cloned()
                    .ok_or_else(|| anyhow::anyhow!("missing entity"))?,
            },
            "run-all" => Action::RunAll,
            "plan" => Action::Plan,
            other => anyhow::bail!("unknown subcommand `{other}`"),
        };

        let has_run_args = !matches!(action, Action::Plan);
        let flag = |id: &str| has_run_args && sub.get_flag(id);
        let number = |id: &str| {
            if has_run_args {
                sub.get_one::<usize>(id).copied()
            } else {
                None
            }
        };

        Ok(Self {
            config: sub.get_one::<PathBuf>("config").cloned(),
            json: sub.get_flag("json"),
            preview: flag("preview"),
            limit: number("limit"),
            fault_tolerant: flag("fault-tolerant"),
            batch_size: number("batch-size"),
            action,
        })
    }

    /// Run options: command line flags over the configured batch size
    #[must_use]
    pub fn run_options(&self, configured_batch_size: usize) -> RunOptions {
        RunOptions::new()
            .with_preview(self.preview)
            .with_limit(self.limit)
            .with_fault_tolerance(self.fault_tolerant)
            .with_batch_size(self.batch_size.unwrap_or(configured_batch_size))
    }
}
