use crossterm::event::{self, Event as CrosstermEvent, KeyEvent};
use std::time::Duration;
use tokio::sync::mpsc;

use crate::api::RemoteTransaction;
use crate::sync::SyncOutcome;

/// Application events
#[derive(Debug)]
pub enum Event {
  /// Terminal key press
  Key(KeyEvent),
  /// Periodic tick for UI refresh
  Tick,
  /// Completion of a background network task
  Net(NetEvent),
}

/// Events produced by background fetch/sync/submit tasks.
#[derive(Debug)]
pub enum NetEvent {
  /// The server's transaction log arrived
  SnapshotLoaded(Vec<RemoteTransaction>),
  /// The startup or refresh fetch failed; render from the local store
  SnapshotFailed(String),
  /// A reconciliation pass finished
  SyncFinished(SyncOutcome),
  /// The server accepted a submitted transaction
  SubmitAccepted,
  /// The server rejected a submitted transaction as invalid
  SubmitRejected,
  /// The network was unreachable; the record was kept in the local store
  SubmitSavedLocally,
}

/// Event handler that produces events from terminal input and a tick timer,
/// and hands out senders for background tasks to report through.
pub struct EventHandler {
  tx: mpsc::UnboundedSender<Event>,
  rx: mpsc::UnboundedReceiver<Event>,
}

impl EventHandler {
  /// Create a new event handler with the given tick rate
  pub fn new(tick_rate: Duration) -> Self {
    let (tx, rx) = mpsc::unbounded_channel();

    // Spawn terminal event reader
    let key_tx = tx.clone();
    tokio::spawn(async move {
      loop {
        if event::poll(tick_rate).unwrap_or(false) {
          if let Ok(CrosstermEvent::Key(key)) = event::read() {
            if key_tx.send(Event::Key(key)).is_err() {
              break;
            }
          }
        } else {
          // Tick
          if key_tx.send(Event::Tick).is_err() {
            break;
          }
        }
      }
    });

    Self { tx, rx }
  }

  /// A sender for background tasks
  pub fn sender(&self) -> mpsc::UnboundedSender<Event> {
    self.tx.clone()
  }

  /// Receive the next event
  pub async fn next(&mut self) -> Option<Event> {
    self.rx.recv().await
  }
}
