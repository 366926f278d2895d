//! Serde-deserializable types matching the budget API responses.
//!
//! These are separate from the store's domain types: server payloads carry
//! extra fields (server keys, bookkeeping) that never cross into the local
//! ledger.

use serde::Deserialize;

/// A transaction as the server reports it. Unknown fields are ignored;
/// server-assigned keys are deliberately not modeled, since local keys are
/// always freshly assigned on pull.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteTransaction {
  pub name: String,
  pub value: i64,
  pub date: String,
}

/// Response to a single-record create: either the echoed record or a
/// validation rejection.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum CreateResponse {
  Rejected {
    errors: serde_json::Value,
  },
  Created(RemoteTransaction),
}

/// Outcome of submitting one transaction while online.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
  /// Server accepted and persisted the record
  Accepted,
  /// Server rejected the record as invalid; not retried
  Rejected,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_remote_transaction_ignores_extra_fields() {
    let json = r#"{"_id":"abc123","name":"rent","value":-900,"date":"2024-01-01T00:00:00Z","__v":0}"#;
    let tx: RemoteTransaction = serde_json::from_str(json).unwrap();
    assert_eq!(tx.name, "rent");
    assert_eq!(tx.value, -900);
  }

  #[test]
  fn test_create_response_created() {
    let json = r#"{"name":"rent","value":-900,"date":"2024-01-01T00:00:00Z"}"#;
    let response: CreateResponse = serde_json::from_str(json).unwrap();
    assert!(matches!(response, CreateResponse::Created(_)));
  }

  #[test]
  fn test_create_response_rejected() {
    let json = r#"{"errors":{"name":"Path `name` is required."}}"#;
    let response: CreateResponse = serde_json::from_str(json).unwrap();
    assert!(matches!(response, CreateResponse::Rejected { .. }));
  }
}
