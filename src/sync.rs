//! One-shot reconciliation between the local ledger and a remote snapshot.
//!
//! The decision is made by the pure [`plan`] function; [`Reconciler`]
//! executes the resulting side effects. Within one pass the store read
//! completes before the comparison, and the comparison completes before any
//! append or bulk send.

use chrono::{DateTime, Utc};
use color_eyre::Result;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::api::{ApiClient, RemoteTransaction};
use crate::cache::CacheStorage;
use crate::db::{LedgerStore, Transaction, TransactionFields};

/// The corrective action one reconciliation pass decided on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncPlan {
  /// Tails denote the same instant (or the remote is empty): no action
  InSync,
  /// Local is behind: append these remote records locally
  Pull(Vec<TransactionFields>),
  /// Remote is behind: bulk-send these local records
  Push(Vec<TransactionFields>),
}

/// What a pass actually did. `Pushed` means the caller should refetch the
/// full snapshot so server-assigned state becomes authoritative again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
  InSync,
  Pulled(usize),
  Pushed(usize),
}

/// Parse an ISO 8601 timestamp into an instant. Unparseable dates yield
/// `None` and are treated as "not newer" everywhere below.
fn instant(date: &str) -> Option<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(date)
    .ok()
    .map(|dt| dt.with_timezone(&Utc))
}

/// Compare the two logs by their tail instants and select the divergence.
///
/// The tails are compared as instants, never as strings: two timestamps are
/// equal iff they denote the same point in time. An empty local log has an
/// epoch tail ("maximally behind"), so the whole remote snapshot is pulled.
/// An empty remote snapshot has no tail at all and the pass is a no-op.
pub fn plan(local: &[Transaction], remote: &[RemoteTransaction]) -> SyncPlan {
  let local_tail = local
    .last()
    .and_then(|t| instant(&t.date))
    .unwrap_or(DateTime::UNIX_EPOCH);

  let remote_tail = match remote.last().and_then(|t| instant(&t.date)) {
    Some(tail) => tail,
    // Absent remote tail: comparisons against an undefined instant are
    // "not newer", so nothing corrective happens
    None => return SyncPlan::InSync,
  };

  if remote_tail == local_tail {
    return SyncPlan::InSync;
  }

  if remote_tail > local_tail {
    // Local is behind: take every remote record strictly after our tail,
    // stripped to the portable fields. Fresh local keys are assigned on
    // append; remote keys are never preserved.
    let missing: Vec<TransactionFields> = remote
      .iter()
      .filter(|t| instant(&t.date).is_some_and(|d| d > local_tail))
      .map(|t| TransactionFields {
        name: t.name.clone(),
        value: t.value,
        date: t.date.clone(),
      })
      .collect();
    return SyncPlan::Pull(missing);
  }

  // Remote is behind: everything local strictly after the remote tail goes
  // out in one bulk send
  let pending: Vec<TransactionFields> = local
    .iter()
    .filter(|t| instant(&t.date).is_some_and(|d| d > remote_tail))
    .map(Transaction::fields)
    .collect();
  SyncPlan::Push(pending)
}

/// Executes reconciliation passes against the local store and the API.
pub struct Reconciler<S: CacheStorage> {
  store: Arc<LedgerStore>,
  api: ApiClient<S>,
}

impl<S: CacheStorage> Reconciler<S> {
  pub fn new(store: Arc<LedgerStore>, api: ApiClient<S>) -> Self {
    Self { store, api }
  }

  /// Run one pass against a freshly fetched remote snapshot.
  ///
  /// A failed bulk send leaves the local store untouched; the same batch is
  /// naturally re-selected on the next pass, and the server deduplicates by
  /// (name, value, date).
  pub async fn reconcile(&self, remote: &[RemoteTransaction]) -> Result<SyncOutcome> {
    let local = self.store.get_all()?;

    match plan(&local, remote) {
      SyncPlan::InSync => {
        debug!("ledger in sync with server");
        Ok(SyncOutcome::InSync)
      }
      SyncPlan::Pull(missing) => {
        let count = missing.len();
        for fields in &missing {
          self.store.append(fields)?;
        }
        info!(records = count, "pulled missing records from server");
        Ok(SyncOutcome::Pulled(count))
      }
      SyncPlan::Push(pending) => {
        let count = pending.len();
        self.api.create_bulk(&pending).await?;
        info!(records = count, "pushed pending records to server");
        Ok(SyncOutcome::Pushed(count))
      }
    }
  }

  /// Reconcile, swallowing failures: sync problems are silent by design and
  /// implicitly retried on the next load.
  pub async fn reconcile_silently(&self, remote: &[RemoteTransaction]) -> Option<SyncOutcome> {
    match self.reconcile(remote).await {
      Ok(outcome) => Some(outcome),
      Err(err) => {
        warn!("reconciliation failed, will retry next pass: {}", err);
        None
      }
    }
  }
}

impl<S: CacheStorage> Clone for Reconciler<S> {
  fn clone(&self) -> Self {
    Self {
      store: Arc::clone(&self.store),
      api: self.api.clone(),
    }
  }
}
