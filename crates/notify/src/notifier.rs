use async_trait::async_trait;
use podscope_storage::{NodeAddress, SubscriberStore};
use tracing::{debug, warn};

use crate::{NotificationSink, Notify};

/// Alert text for a transition.
pub fn format_alert(address: &NodeAddress, is_now_active: bool) -> String {
    let (icon, status) = if is_now_active {
        ("✅", "ONLINE")
    } else {
        ("🚨", "OFFLINE")
    };
    format!("{icon} **Alert:** Node `{address}` is now *{status}*!")
}

/// Outcome of one dispatch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub delivered: usize,
    pub failed: usize,
    /// Watchers that never completed pairing.
    pub unlinked: usize,
}

/// Looks up watchers in `store` and delivers through `sink`.
#[derive(Debug, Clone)]
pub struct Notifier<S, K> {
    store: S,
    sink: K,
}

impl<S, K> Notifier<S, K>
where
    S: SubscriberStore,
    K: NotificationSink,
{
    pub fn new(store: S, sink: K) -> Self {
        Self { store, sink }
    }

    pub async fn dispatch(&self, address: &NodeAddress, is_now_active: bool) -> DispatchReport {
        let mut report = DispatchReport::default();

        let watchers = match self.store.watchers(address) {
            Ok(watchers) => watchers,
            Err(error) => {
                warn!(%address, %error, "failed to load watchers");
                return report;
            }
        };
        if watchers.is_empty() {
            return report;
        }

        let message = format_alert(address, is_now_active);
        for watcher in watchers {
            let Some(channel_id) = watcher.channel_id.as_deref() else {
                report.unlinked += 1;
                continue;
            };
            match self.sink.send(channel_id, &message).await {
                Ok(()) => {
                    report.delivered += 1;
                    metrics::counter!("notify.messages_total", "outcome" => "sent").increment(1);
                }
                Err(error) => {
                    report.failed += 1;
                    metrics::counter!("notify.messages_total", "outcome" => "failed").increment(1);
                    warn!(%address, %channel_id, %error, "failed to deliver alert");
                }
            }
        }

        debug!(
            %address,
            online = is_now_active,
            delivered = report.delivered,
            failed = report.failed,
            "alert dispatched"
        );
        report
    }
}

#[async_trait]
impl<S, K> Notify for Notifier<S, K>
where
    S: SubscriberStore,
    K: NotificationSink,
{
    async fn notify(&self, address: &NodeAddress, is_now_active: bool) {
        self.dispatch(address, is_now_active).await;
    }
}
