use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{debug, info, warn};

use crate::dispatch::{Dispatch, EnforcementCommand};
use crate::domain::{RuleKind, RuleMode};
use crate::store::RuleStore;

use super::rules::dispatch_all;

/// Repairs drift between the database and the enforcement point.
///
/// Reconciliation is add-only: it re-pushes the full set of active
/// blacklist values per kind, so it can restore adds the enforcement
/// point missed but never retracts entries. Removals rely on the
/// immediate per-request delete dispatch.
pub struct Reconciler {
    store: Arc<RuleStore>,
    dispatcher: Arc<dyn Dispatch>,
}

impl Reconciler {
    /// Kinds the enforcement point accepts value sets for.
    const SYNCED_KINDS: [RuleKind; 2] = [RuleKind::Ip, RuleKind::Port];

    pub fn new(store: Arc<RuleStore>, dispatcher: Arc<dyn Dispatch>) -> Self {
        Reconciler { store, dispatcher }
    }

    /// Push the current active-blacklist state, one command per kind.
    ///
    /// Never fails: read errors and dispatch errors are logged and
    /// swallowed, and one kind's failure does not block the other. Safe
    /// to call blindly at startup with the enforcement point down.
    pub async fn sync_rules(&self) {
        let mut commands = Vec::new();

        for kind in Self::SYNCED_KINDS {
            match self.store.active_blacklist_values(kind).await {
                Ok(values) if values.is_empty() => {
                    debug!(kind = %kind, "Sync: no active blacklist rules");
                }
                Ok(values) => {
                    info!(kind = %kind, count = values.len(), "Sync: pushing active blacklist");
                    commands.push(EnforcementCommand::add(kind, RuleMode::Blacklist, values));
                }
                Err(e) => {
                    warn!(kind = %kind, error = %e, "Sync: failed to read rules");
                }
            }
        }

        dispatch_all(Arc::clone(&self.dispatcher), commands).await;
    }

    /// Run `sync_rules` on a fixed interval.
    ///
    /// The first tick fires immediately, so starting the loop also covers
    /// the startup sync.
    pub fn start(self, period: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval(period);

            loop {
                ticker.tick().await;
                self.sync_rules().await;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::MockDispatcher;

    #[tokio::test]
    async fn test_sync_survives_unreachable_database() {
        // Lazy pool pointed at a port nothing listens on: every read fails.
        let store = Arc::new(RuleStore::connect_lazy("postgres://127.0.0.1:1/rampart").unwrap());
        let mock = Arc::new(MockDispatcher::new());
        let reconciler = Reconciler::new(store, mock.clone());

        // Must complete without panicking and dispatch nothing.
        reconciler.sync_rules().await;
        assert!(mock.sent_commands().is_empty());
    }
}
