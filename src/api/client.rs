use color_eyre::{eyre::eyre, Result};
use tracing::debug;

use crate::cache::{CacheStorage, RequestProxy};
use crate::db::TransactionFields;

use super::types::{CreateOutcome, CreateResponse, RemoteTransaction};

/// Budget API client. Every call goes through the request proxy, so API
/// reads transparently pick up the network-first-with-fallback policy and
/// keep working offline from the last observed snapshot.
pub struct ApiClient<S: CacheStorage> {
  proxy: RequestProxy<S>,
}

impl<S: CacheStorage> ApiClient<S> {
  pub fn new(proxy: RequestProxy<S>) -> Self {
    Self { proxy }
  }

  pub fn proxy(&self) -> &RequestProxy<S> {
    &self.proxy
  }

  /// Fetch the full transaction log, oldest first.
  pub async fn fetch_transactions(&self) -> Result<Vec<RemoteTransaction>> {
    let url = self.proxy.url("/api/transaction")?;
    let response = self.proxy.get(url).await?;

    if response.status >= 400 {
      return Err(eyre!("Server returned {} for transaction list", response.status));
    }

    response.json()
  }

  /// Submit a single transaction.
  pub async fn create_transaction(&self, fields: &TransactionFields) -> Result<CreateOutcome> {
    let url = self.proxy.url("/api/transaction")?;
    let response = self.proxy.post_json(url, fields).await?;

    match response.json::<CreateResponse>()? {
      CreateResponse::Created(_) => Ok(CreateOutcome::Accepted),
      CreateResponse::Rejected { errors } => {
        debug!(%errors, "server rejected transaction");
        Ok(CreateOutcome::Rejected)
      }
    }
  }

  /// Submit a batch of pending transactions in one call. Used only by the
  /// reconciler's push path; the server deduplicates by (name, value, date).
  pub async fn create_bulk(&self, batch: &[TransactionFields]) -> Result<()> {
    let url = self.proxy.url("/api/transaction/bulk")?;
    let response = self.proxy.post_json(url, &batch).await?;

    if response.status >= 400 {
      return Err(eyre!("Bulk append failed with status {}", response.status));
    }

    debug!(records = batch.len(), "bulk append accepted");
    Ok(())
  }
}

impl<S: CacheStorage> Clone for ApiClient<S> {
  fn clone(&self) -> Self {
    Self {
      proxy: self.proxy.clone(),
    }
  }
}
