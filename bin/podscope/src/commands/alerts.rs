//! `alerts` - subscriber pairing and watchlists.

use clap::Subcommand;
use eyre::Result;
use podscope_crawler::unix_now;
use podscope_notify::pairing::{self, WatchAction, Watchlist};
use podscope_storage::{NodeAddress, NodeStore};

use crate::context::Context;

#[derive(Debug, Subcommand)]
pub(crate) enum AlertsCommand {
    /// Start watching a node.
    Watch {
        /// Subscriber connect code.
        code: String,
        /// Node address (`ip` or `ip:port`).
        address: String,
    },
    /// Stop watching a node.
    Unwatch { code: String, address: String },
    /// Link a notification channel to a connect code.
    Link { code: String, channel: String },
    /// Show the watchlist of a connect code.
    List { code: String },
}

fn print_watchlist(watchlist: &Watchlist) {
    println!(
        "{} ({})",
        watchlist.connect_code,
        if watchlist.is_connected {
            "linked"
        } else {
            "not linked"
        }
    );
    if watchlist.watched.is_empty() {
        println!("  watching nothing");
    }
    for address in &watchlist.watched {
        println!("  {address}");
    }
}

pub(crate) fn run(ctx: Context, command: AlertsCommand) -> Result<()> {
    let store = ctx.open_store()?;
    let rpc_port = ctx.config.crawler.rpc_port;
    let now = unix_now();

    match command {
        AlertsCommand::Watch { code, address } => {
            let address = NodeAddress::with_rpc_port(&address, rpc_port)?;
            let watchlist =
                pairing::update_watchlist(&*store, &code, Some(&address), WatchAction::Add, now)?;
            print_watchlist(&watchlist);
        }
        AlertsCommand::Unwatch { code, address } => {
            let address = NodeAddress::with_rpc_port(&address, rpc_port)?;
            let watchlist =
                pairing::update_watchlist(&*store, &code, Some(&address), WatchAction::Remove, now)?;
            print_watchlist(&watchlist);
        }
        AlertsCommand::Link { code, channel } => {
            let outcome = pairing::link(&*store, Some(&code), &channel)?;
            println!("{}", outcome.reply());
        }
        AlertsCommand::List { code } => {
            let watchlist = pairing::update_watchlist(&*store, &code, None, WatchAction::Get, now)?;
            print_watchlist(&watchlist);
        }
    }

    store.flush()?;
    Ok(())
}
