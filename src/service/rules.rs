use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use thiserror::Error;
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::dispatch::{Dispatch, EnforcementCommand};
use crate::domain::{Rule, RuleKind, RuleMode};
use crate::store::{self, RuleStore};

/// Domain errors surfaced by rule mutations.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("one or more rules already exist")]
    Conflict,

    #[error("one or more rules not found")]
    NotFound,

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// One kind-section of a toggle request: flip `active` on these ids,
/// all of which must belong to `mode`.
#[derive(Debug, Clone)]
pub struct ToggleSection {
    pub ids: Vec<i64>,
    pub mode: RuleMode,
    pub active: bool,
}

/// Orchestrates rule mutations: one DB transaction per call, then a
/// best-effort dispatch to the enforcement point strictly after commit.
///
/// The database is the single source of truth. A dispatch failure never
/// rolls back a committed transaction and never changes the caller-visible
/// result; drift is repaired later by the reconciler.
pub struct RuleService {
    store: Arc<RuleStore>,
    dispatcher: Arc<dyn Dispatch>,
}

impl RuleService {
    pub fn new(store: Arc<RuleStore>, dispatcher: Arc<dyn Dispatch>) -> Self {
        RuleService { store, dispatcher }
    }

    /// Add a batch of rules atomically.
    ///
    /// Any value collision aborts the whole batch with `Conflict`;
    /// nothing is partially added.
    pub async fn add_rules(
        &self,
        kind: RuleKind,
        mode: RuleMode,
        values: Vec<String>,
    ) -> Result<Vec<Rule>, ServiceError> {
        let mut tx = self.store.begin().await?;
        let inserted = store::add_batch(&mut tx, kind, mode, &values).await?;

        if inserted.len() != values.len() {
            tx.rollback().await?;
            return Err(ServiceError::Conflict);
        }

        tx.commit().await?;
        info!(kind = %kind, mode = %mode, count = inserted.len(), "Rules added");

        if kind.dispatchable() {
            self.spawn_dispatch(vec![EnforcementCommand::add(kind, mode, values)]);
        }

        Ok(inserted)
    }

    /// Delete a batch of rules atomically.
    ///
    /// If any requested `(kind, mode, value)` row is missing the whole
    /// batch aborts with `NotFound` and nothing is deleted.
    pub async fn delete_rules(
        &self,
        kind: RuleKind,
        mode: RuleMode,
        values: Vec<String>,
    ) -> Result<Vec<Rule>, ServiceError> {
        let mut tx = self.store.begin().await?;
        let deleted = store::delete_batch(&mut tx, kind, mode, &values).await?;

        if deleted.len() != values.len() {
            tx.rollback().await?;
            return Err(ServiceError::NotFound);
        }

        tx.commit().await?;
        info!(kind = %kind, mode = %mode, count = deleted.len(), "Rules deleted");

        if kind.dispatchable() {
            self.spawn_dispatch(vec![EnforcementCommand::delete(kind, mode, values)]);
        }

        Ok(deleted)
    }

    /// Flip `active` across several sections inside one transaction.
    ///
    /// Either every requested toggle across all sections applies, or none
    /// do. After commit, updated rows are grouped into dispatch buckets by
    /// `(kind, mode, resulting action)` and sent concurrently.
    pub async fn toggle_rules(
        &self,
        sections: Vec<ToggleSection>,
    ) -> Result<Vec<Rule>, ServiceError> {
        let mut tx = self.store.begin().await?;
        let mut updated = Vec::new();

        for section in &sections {
            if section.ids.is_empty() {
                continue;
            }

            let rows =
                store::toggle_batch(&mut tx, section.mode, &section.ids, section.active).await?;

            if rows.len() != section.ids.len() {
                tx.rollback().await?;
                return Err(ServiceError::NotFound);
            }

            updated.extend(rows);
        }

        tx.commit().await?;
        info!(count = updated.len(), "Rules toggled");

        self.spawn_dispatch(plan_dispatch(&updated));

        Ok(updated)
    }

    /// All rules, optionally filtered by kind.
    pub async fn list_rules(&self, filter: Option<RuleKind>) -> Result<Vec<Rule>, ServiceError> {
        Ok(self.store.list(filter).await?)
    }

    /// Send commands after commit without holding up the caller.
    fn spawn_dispatch(&self, commands: Vec<EnforcementCommand>) {
        if commands.is_empty() {
            return;
        }

        let dispatcher = Arc::clone(&self.dispatcher);
        tokio::spawn(async move {
            dispatch_all(dispatcher, commands).await;
        });
    }
}

/// Group updated rows into one enforcement command per
/// `(kind, mode, resulting action)` bucket, deduplicating values.
///
/// An activated rule must be present at the enforcement point, a
/// deactivated one absent, so the resulting action is `add` for active
/// rows and `delete` for inactive ones. Kinds the enforcement point does
/// not handle are skipped.
pub fn plan_dispatch(updated: &[Rule]) -> Vec<EnforcementCommand> {
    let mut buckets: BTreeMap<(RuleKind, RuleMode, bool), BTreeSet<String>> = BTreeMap::new();

    for rule in updated {
        if !rule.kind.dispatchable() {
            continue;
        }

        buckets
            .entry((rule.kind, rule.mode, rule.active))
            .or_default()
            .insert(rule.value.clone());
    }

    buckets
        .into_iter()
        .map(|((kind, mode, active), values)| {
            let values = values.into_iter().collect();
            if active {
                EnforcementCommand::add(kind, mode, values)
            } else {
                EnforcementCommand::delete(kind, mode, values)
            }
        })
        .collect()
}

/// Dispatch a set of commands concurrently and log each outcome.
///
/// One command's failure does not cancel or fail its siblings; the group
/// completes when the slowest command finishes.
pub(crate) async fn dispatch_all(dispatcher: Arc<dyn Dispatch>, commands: Vec<EnforcementCommand>) {
    let mut tasks = JoinSet::new();

    for command in commands {
        let dispatcher = Arc::clone(&dispatcher);
        tasks.spawn(async move {
            let outcome = dispatcher.send(&command).await;
            (command, outcome)
        });
    }

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((command, Ok(_))) => {
                info!(action = command.action(), "Enforcement command dispatched");
            }
            Ok((command, Err(e))) => {
                warn!(
                    action = command.action(),
                    error = %e,
                    "Enforcement dispatch failed, state will be repaired by sync"
                );
            }
            Err(e) => {
                warn!(error = %e, "Dispatch task failed to run");
            }
        }
    }
}
