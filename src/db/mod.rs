//! Local transaction store: a durable, append-only ledger on SQLite.
//!
//! Records are retrievable in insertion order and indexed by name, value and
//! date (non-unique). There is no update or delete; the reconciler and the
//! offline submit path only ever append.

use chrono::{DateTime, Utc};
use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection};
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::debug;

/// A persisted transaction. `id` is store-local and carries no meaning
/// across stores; the server assigns its own keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
  pub id: i64,
  pub name: String,
  /// Signed amount; negative means a withdrawal
  pub value: i64,
  /// ISO 8601 timestamp as received or generated
  pub date: String,
}

/// Fields of a transaction that cross store boundaries. Local and remote
/// keys are never carried over.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TransactionFields {
  pub name: String,
  pub value: i64,
  pub date: String,
}

const SCHEMA_VERSION: i64 = 1;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS transactions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    value INTEGER NOT NULL,
    date TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_transactions_name ON transactions(name);
CREATE INDEX IF NOT EXISTS idx_transactions_value ON transactions(value);
CREATE INDEX IF NOT EXISTS idx_transactions_date ON transactions(date);
"#;

/// The local ledger. A single running instance is assumed; SQLite serializes
/// same-file access but no cross-process coordination is attempted.
pub struct LedgerStore {
  conn: Mutex<Connection>,
}

impl LedgerStore {
  /// Open or create the ledger at the default location.
  pub fn open() -> Result<Self> {
    let path = Self::default_path()?;

    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create data directory: {}", e))?;
    }

    let conn = Connection::open(&path)
      .map_err(|e| eyre!("Failed to open ledger at {}: {}", path.display(), e))?;

    Self::from_connection(conn)
  }

  /// Open an in-memory ledger. Used by tests.
  pub fn open_in_memory() -> Result<Self> {
    let conn =
      Connection::open_in_memory().map_err(|e| eyre!("Failed to open in-memory ledger: {}", e))?;
    Self::from_connection(conn)
  }

  fn from_connection(conn: Connection) -> Result<Self> {
    let store = Self {
      conn: Mutex::new(conn),
    };
    store.ensure_schema()?;
    Ok(store)
  }

  /// Get the default database path.
  fn default_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("tally").join("ledger.db"))
  }

  /// Idempotent schema setup, guarded by `PRAGMA user_version` so repeated
  /// opens never re-run DDL or lose data.
  fn ensure_schema(&self) -> Result<()> {
    let conn = self.conn.lock().map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let version: i64 = conn
      .query_row("PRAGMA user_version", [], |row| row.get(0))
      .map_err(|e| eyre!("Failed to read schema version: {}", e))?;

    if version < SCHEMA_VERSION {
      debug!(from = version, to = SCHEMA_VERSION, "installing ledger schema");
      conn
        .execute_batch(SCHEMA)
        .map_err(|e| eyre!("Failed to install schema: {}", e))?;
      conn
        .pragma_update(None, "user_version", SCHEMA_VERSION)
        .map_err(|e| eyre!("Failed to set schema version: {}", e))?;
    }

    Ok(())
  }

  /// All transactions in insertion order.
  pub fn get_all(&self) -> Result<Vec<Transaction>> {
    let conn = self.conn.lock().map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let mut stmt = conn
      .prepare("SELECT id, name, value, date FROM transactions ORDER BY id")
      .map_err(|e| eyre!("Failed to prepare query: {}", e))?;

    let rows = stmt
      .query_map([], row_to_transaction)
      .map_err(|e| eyre!("Failed to query transactions: {}", e))?
      .collect::<std::result::Result<Vec<_>, _>>()
      .map_err(|e| eyre!("Failed to read transaction row: {}", e))?;

    Ok(rows)
  }

  /// Append a transaction and return its freshly assigned key.
  pub fn append(&self, fields: &TransactionFields) -> Result<i64> {
    let conn = self.conn.lock().map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute(
        "INSERT INTO transactions (name, value, date) VALUES (?, ?, ?)",
        params![fields.name, fields.value, fields.date],
      )
      .map_err(|e| eyre!("Failed to append transaction: {}", e))?;

    Ok(conn.last_insert_rowid())
  }

  /// Transactions with the given name, in insertion order.
  #[allow(dead_code)]
  pub fn find_by_name(&self, name: &str) -> Result<Vec<Transaction>> {
    let conn = self.conn.lock().map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let mut stmt = conn
      .prepare("SELECT id, name, value, date FROM transactions WHERE name = ? ORDER BY id")
      .map_err(|e| eyre!("Failed to prepare query: {}", e))?;

    let rows = stmt
      .query_map(params![name], row_to_transaction)
      .map_err(|e| eyre!("Failed to query transactions: {}", e))?
      .collect::<std::result::Result<Vec<_>, _>>()
      .map_err(|e| eyre!("Failed to read transaction row: {}", e))?;

    Ok(rows)
  }

  /// Transactions dated within `[from, to)`. Dates are RFC 3339 strings, so
  /// the index comparison matches instant order for a uniform offset.
  #[allow(dead_code)]
  pub fn find_by_date_range(
    &self,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
  ) -> Result<Vec<Transaction>> {
    let conn = self.conn.lock().map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let mut stmt = conn
      .prepare("SELECT id, name, value, date FROM transactions WHERE date >= ? AND date < ? ORDER BY id")
      .map_err(|e| eyre!("Failed to prepare query: {}", e))?;

    let rows = stmt
      .query_map(
        params![from.to_rfc3339(), to.to_rfc3339()],
        row_to_transaction,
      )
      .map_err(|e| eyre!("Failed to query transactions: {}", e))?
      .collect::<std::result::Result<Vec<_>, _>>()
      .map_err(|e| eyre!("Failed to read transaction row: {}", e))?;

    Ok(rows)
  }
}

fn row_to_transaction(row: &rusqlite::Row) -> rusqlite::Result<Transaction> {
  Ok(Transaction {
    id: row.get(0)?,
    name: row.get(1)?,
    value: row.get(2)?,
    date: row.get(3)?,
  })
}

impl Transaction {
  pub fn fields(&self) -> TransactionFields {
    TransactionFields {
      name: self.name.clone(),
      value: self.value,
      date: self.date.clone(),
    }
  }
}
