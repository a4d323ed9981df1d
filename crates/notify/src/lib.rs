//! Alert dispatch and subscriber pairing.
//!
//! The crawler reports every ONLINE/OFFLINE transition through [`Notify`].
//! [`Notifier`] resolves the watchers of the address and hands one formatted
//! message per linked subscriber to a [`NotificationSink`]. Delivery is
//! best effort: a failing recipient is logged and skipped.

use async_trait::async_trait;
use podscope_storage::NodeAddress;

mod error;
mod notifier;
pub mod pairing;
mod sink;

pub use error::{NotifyError, SinkError};
pub use notifier::{DispatchReport, Notifier, format_alert};
pub use sink::{LogSink, NotificationSink};

/// Receives node state transitions.
#[async_trait]
#[auto_impl::auto_impl(&, Arc)]
pub trait Notify: Send + Sync {
    async fn notify(&self, address: &NodeAddress, is_now_active: bool);
}
