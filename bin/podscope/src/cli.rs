//! CLI argument assembly and top-level parser.

use clap::{Args, Parser, Subcommand};
use color_eyre::eyre;
use podscope_node_core::args::{CrawlerArgs, DataDirArgs, LogArgs, MetricsArgs};
use podscope_node_core::{logging, version};
use tracing::debug;

use crate::commands;
use crate::commands::alerts::AlertsCommand;
use crate::commands::nodes::NodesArgs;
use crate::context::Context;

/// Crawl a storage pod network and keep a record of every pod.
#[derive(Debug, Parser)]
#[command(author, version, long_version = version::LONG_VERSION.as_str(), about, long_about = None)]
pub(crate) struct Cli {
    /// Logging configuration.
    #[command(flatten)]
    pub(crate) logs: LogArgs,

    /// Data directory configuration.
    #[command(flatten)]
    pub(crate) datadir: DataDirArgs,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub(crate) command: Commands,
}

#[derive(Debug, Subcommand)]
pub(crate) enum Commands {
    /// Run the crawler until interrupted.
    Run(RunArgs),
    /// Run a single cycle and exit.
    Cycle(EngineArgs),
    /// Poll the given stored nodes right away.
    Refresh {
        #[command(flatten)]
        engine: EngineArgs,
        /// Node addresses (`ip` or `ip:port`).
        #[arg(required = true, value_name = "ADDR")]
        addresses: Vec<String>,
    },
    /// Query one pod directly and print its live metrics.
    Probe {
        #[command(flatten)]
        engine: EngineArgs,
        #[arg(value_name = "ADDR")]
        address: String,
    },
    /// List stored nodes, best health score first.
    Nodes(NodesArgs),
    /// Show one stored node and its recent samples.
    Node {
        #[arg(value_name = "ADDR")]
        address: String,
        /// Number of most recent samples.
        #[arg(short = 'n', long, default_value_t = commands::node::DEFAULT_DETAIL_SAMPLES)]
        samples: usize,
        /// Print JSON instead of text.
        #[arg(long)]
        json: bool,
    },
    /// Network totals, top providers and growth over the last week.
    Summary {
        /// Print JSON instead of text.
        #[arg(long)]
        json: bool,
    },
    /// Show the most recent activity entries.
    Activity {
        /// Number of entries.
        #[arg(short = 'n', long, default_value_t = 20)]
        limit: usize,
    },
    /// Manage alert subscribers.
    #[command(subcommand)]
    Alerts(AlertsCommand),
    /// Inspect or create the config file.
    Config(ConfigArgs),
}

/// Arguments for commands that build the engine.
#[derive(Debug, Args)]
pub(crate) struct EngineArgs {
    #[command(flatten)]
    pub(crate) crawler: CrawlerArgs,
}

/// Arguments for the `run` command.
#[derive(Debug, Args)]
pub(crate) struct RunArgs {
    #[command(flatten)]
    pub(crate) engine: EngineArgs,

    #[command(flatten)]
    pub(crate) metrics: MetricsArgs,
}

/// Arguments for the `config` command.
#[derive(Debug, Args)]
pub(crate) struct ConfigArgs {
    /// Write the default configuration to the data directory.
    #[arg(long)]
    pub(crate) init: bool,

    /// Overwrite an existing config file.
    #[arg(long, requires = "init")]
    pub(crate) force: bool,
}

/// Parse arguments and dispatch.
pub(crate) async fn run() -> eyre::Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    logging::init_logging(&cli.logs)?;
    debug!(version = version::VERSION, "starting podscope");

    let mut ctx = Context::load(&cli.datadir)?;

    match cli.command {
        Commands::Run(args) => {
            ctx.apply_overrides(&args.engine.crawler, &args.metrics);
            commands::run::run(ctx).await
        }
        Commands::Cycle(args) => {
            ctx.apply_overrides(&args.crawler, &MetricsArgs::default());
            commands::cycle::run(ctx).await
        }
        Commands::Refresh { engine, addresses } => {
            ctx.apply_overrides(&engine.crawler, &MetricsArgs::default());
            commands::refresh::run(ctx, &addresses).await
        }
        Commands::Probe { engine, address } => {
            ctx.apply_overrides(&engine.crawler, &MetricsArgs::default());
            commands::probe::run(ctx, &address).await
        }
        Commands::Nodes(args) => commands::nodes::run(ctx, &args),
        Commands::Node {
            address,
            samples,
            json,
        } => commands::node::run(ctx, &address, samples, json),
        Commands::Summary { json } => commands::summary::run(ctx, json),
        Commands::Activity { limit } => commands::activity::run(ctx, limit),
        Commands::Alerts(command) => commands::alerts::run(ctx, command),
        Commands::Config(args) => commands::config::run(ctx, &args),
    }
}
