//! Subscriber pairing.
//!
//! A subscriber picks a watchlist on the dashboard under a short connect
//! code, then sends `/start <code>` to the chat bot, which links the chat
//! identity to that code. From then on alerts for watched nodes reach the
//! chat.

use podscope_storage::{NodeAddress, SubscriberStore};

use crate::NotifyError;

/// Length of a connect code.
pub const CONNECT_CODE_LEN: usize = 6;

pub const REPLY_CONNECTED: &str = "✅ Connected! You will receive alerts here.";
pub const REPLY_UNKNOWN_CODE: &str = "⚠️ Code not found. Please check your code.";
pub const REPLY_WELCOME: &str =
    "👋 Welcome! Open the Alerts page of the explorer to get your connection code.";
pub const REPLY_EMPTY_WATCHLIST: &str = "📭 You are not watching any nodes.";

/// Checks that `code` is a well-formed connect code.
pub fn validate_code(code: &str) -> Result<&str, NotifyError> {
    let code = code.trim();
    if code.chars().count() == CONNECT_CODE_LEN && code.chars().all(|c| c.is_ascii_alphanumeric())
    {
        Ok(code)
    } else {
        Err(NotifyError::InvalidCode(code.to_string()))
    }
}

/// Watchlist change requested from the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchAction {
    Add,
    Remove,
    Get,
}

/// Current watchlist of a subscriber.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Watchlist {
    pub connect_code: String,
    pub watched: Vec<NodeAddress>,
    pub is_connected: bool,
}

/// Apply `action` for the subscriber identified by `code`, creating the
/// subscriber on first use, and return the resulting watchlist.
pub fn update_watchlist<S: SubscriberStore>(
    store: &S,
    code: &str,
    address: Option<&NodeAddress>,
    action: WatchAction,
    now: u64,
) -> Result<Watchlist, NotifyError> {
    let code = validate_code(code)?;
    let subscriber = store.get_or_create_subscriber(code, now)?;

    match (action, address) {
        (WatchAction::Add, Some(address)) => {
            store.watch(code, address)?;
        }
        (WatchAction::Remove, Some(address)) => {
            store.unwatch(code, address)?;
        }
        _ => {}
    }

    Ok(Watchlist {
        connect_code: code.to_string(),
        watched: store.watched_by(code)?,
        is_connected: subscriber.is_linked(),
    })
}

/// Result of a `/start <code>` handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkOutcome {
    Linked,
    UnknownCode,
    /// No code, or a malformed one.
    MissingCode,
}

impl LinkOutcome {
    pub fn reply(&self) -> &'static str {
        match self {
            Self::Linked => REPLY_CONNECTED,
            Self::UnknownCode => REPLY_UNKNOWN_CODE,
            Self::MissingCode => REPLY_WELCOME,
        }
    }
}

/// Link `channel_id` to the subscriber owning `code`.
pub fn link<S: SubscriberStore>(
    store: &S,
    code: Option<&str>,
    channel_id: &str,
) -> Result<LinkOutcome, NotifyError> {
    let Some(code) = code.and_then(|c| validate_code(c).ok()) else {
        return Ok(LinkOutcome::MissingCode);
    };
    Ok(match store.link_channel(code, channel_id)? {
        Some(_) => {
            tracing::info!(%code, %channel_id, "subscriber linked");
            LinkOutcome::Linked
        }
        None => LinkOutcome::UnknownCode,
    })
}

/// Chat reply listing what `channel_id` watches.
pub fn watchlist_reply<S: SubscriberStore>(
    store: &S,
    channel_id: &str,
) -> Result<String, NotifyError> {
    let watched = match store.subscriber_by_channel(channel_id)? {
        Some(subscriber) => store.watched_by(&subscriber.connect_code)?,
        None => Vec::new(),
    };
    if watched.is_empty() {
        return Ok(REPLY_EMPTY_WATCHLIST.to_string());
    }
    let list = watched
        .iter()
        .map(|a| format!("• `{a}`"))
        .collect::<Vec<_>>()
        .join("\n");
    Ok(format!("👀 *Your Watchlist:*\n{list}"))
}
