use crate::api::{ApiClient, CreateOutcome};
use crate::cache::{RequestProxy, SqliteCacheStorage};
use crate::config::Config;
use crate::db::{LedgerStore, TransactionFields};
use crate::event::{Event, EventHandler, NetEvent};
use crate::sync::{Reconciler, SyncOutcome};
use crate::ui;
use crate::ui::components::{InputKind, InputResult, TextInput};
use chrono::{SecondsFormat, Utc};
use color_eyre::Result;
use crossterm::event::{KeyCode, KeyModifiers};
use crossterm::terminal::{
  disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::prelude::*;
use std::io::stdout;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Input mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
  Normal,
  /// Filling in the add/subtract form
  Entry,
}

/// Whether the entry form adds or subtracts funds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntrySign {
  Add,
  Subtract,
}

/// Which form field has focus
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormField {
  Name,
  Amount,
}

/// The add/subtract funds form
pub struct EntryForm {
  pub name: TextInput,
  pub amount: TextInput,
  pub focus: FormField,
  pub sign: EntrySign,
}

impl EntryForm {
  fn new(sign: EntrySign) -> Self {
    Self {
      name: TextInput::new(InputKind::Text),
      amount: TextInput::new(InputKind::Numeric),
      focus: FormField::Name,
      sign,
    }
  }

  fn focused_mut(&mut self) -> &mut TextInput {
    match self.focus {
      FormField::Name => &mut self.name,
      FormField::Amount => &mut self.amount,
    }
  }

  fn toggle_focus(&mut self) {
    self.focus = match self.focus {
      FormField::Name => FormField::Amount,
      FormField::Amount => FormField::Name,
    };
  }
}

/// Main application state
pub struct App {
  /// Transactions as displayed, newest first
  transactions: Vec<TransactionFields>,

  /// Current input mode
  mode: Mode,

  /// The entry form; present only in Entry mode
  form: Option<EntryForm>,

  /// Inline form error; the only user-facing error in the app
  form_error: Option<&'static str>,

  /// Human label for the last sync result
  sync_label: Option<String>,

  /// Whether the last fetch fell back to local data
  offline: bool,

  /// Whether a fetch is in flight
  loading: bool,

  /// Application configuration
  config: Config,

  /// Local ledger
  store: Arc<LedgerStore>,

  /// Budget API client (all traffic goes through the caching proxy)
  api: ApiClient<SqliteCacheStorage>,

  /// Event sender for async tasks
  event_tx: mpsc::UnboundedSender<Event>,

  /// Whether to quit
  should_quit: bool,

  /// Skip the startup fetch and render from the local store
  start_offline: bool,
}

impl App {
  pub fn new(config: Config, start_offline: bool) -> Result<Self> {
    let store = Arc::new(LedgerStore::open()?);

    let storage =
      SqliteCacheStorage::open(config.cache.ttl_hours, config.cache.max_entries)?;
    let proxy = RequestProxy::new(&config.server.url, &config.server.api_prefix, storage)?;
    let api = ApiClient::new(proxy);

    Ok(Self::with_parts(config, store, api, start_offline))
  }

  fn with_parts(
    config: Config,
    store: Arc<LedgerStore>,
    api: ApiClient<SqliteCacheStorage>,
    start_offline: bool,
  ) -> Self {
    let (tx, _rx) = mpsc::unbounded_channel();

    Self {
      transactions: Vec::new(),
      mode: Mode::Normal,
      form: None,
      form_error: None,
      sync_label: None,
      offline: false,
      loading: false,
      config,
      store,
      api,
      event_tx: tx,
      should_quit: false,
      start_offline,
    }
  }

  pub async fn run(&mut self) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    // Create event handler
    let mut events = EventHandler::new(Duration::from_millis(250));
    self.event_tx = events.sender();

    // Initial data load
    if self.start_offline {
      self.load_local();
      self.sync_label = Some("offline".to_string());
    } else {
      self.install_shell_cache();
      self.spawn_fetch(true);
    }

    // Main loop
    while !self.should_quit {
      // Draw UI
      terminal.draw(|frame| ui::draw(frame, self))?;

      // Handle events
      if let Some(event) = events.next().await {
        self.handle_event(event)?;
      }
    }

    // Cleanup terminal
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    Ok(())
  }

  /// Best-effort prefetch of the static shell into the versioned cache.
  fn install_shell_cache(&self) {
    let api = self.api.clone();
    let manifest = self.config.cache.shell_manifest.clone();

    tokio::spawn(async move {
      if let Err(err) = api.proxy().install(&manifest).await {
        debug!("shell cache install skipped: {}", err);
      }
    });
  }

  /// Fetch the server snapshot, render it, and (optionally) run one
  /// reconciliation pass against it. A push means server state changed, so
  /// the snapshot is refetched once without reconciling again.
  fn spawn_fetch(&mut self, reconcile: bool) {
    self.loading = true;

    let api = self.api.clone();
    let store = Arc::clone(&self.store);
    let tx = self.event_tx.clone();

    tokio::spawn(async move {
      match api.fetch_transactions().await {
        Ok(snapshot) => {
          let _ = tx.send(Event::Net(NetEvent::SnapshotLoaded(snapshot.clone())));

          if reconcile {
            let reconciler = Reconciler::new(store, api);
            if let Some(outcome) = reconciler.reconcile_silently(&snapshot).await {
              let _ = tx.send(Event::Net(NetEvent::SyncFinished(outcome)));
            }
          }
        }
        Err(err) => {
          let _ = tx.send(Event::Net(NetEvent::SnapshotFailed(err.to_string())));
        }
      }
    });
  }

  /// Render whatever the local ledger holds, newest first.
  fn load_local(&mut self) {
    match self.store.get_all() {
      Ok(all) => {
        self.transactions = all.iter().rev().map(|t| t.fields()).collect();
      }
      Err(err) => warn!("failed to read local ledger: {}", err),
    }
    self.offline = true;
    self.loading = false;
  }

  fn handle_event(&mut self, event: Event) -> Result<()> {
    match event {
      Event::Key(key) => self.handle_key(key),
      Event::Tick => {} // UI refresh happens automatically
      Event::Net(net_event) => self.handle_net_event(net_event),
    }
    Ok(())
  }

  fn handle_key(&mut self, key: crossterm::event::KeyEvent) {
    match self.mode {
      Mode::Normal => self.handle_normal_mode_key(key),
      Mode::Entry => self.handle_entry_mode_key(key),
    }
  }

  fn handle_normal_mode_key(&mut self, key: crossterm::event::KeyEvent) {
    match key.code {
      // Quit
      KeyCode::Char('q') => self.should_quit = true,
      KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
        self.should_quit = true;
      }

      // Open the entry form
      KeyCode::Char('a') => {
        self.form = Some(EntryForm::new(EntrySign::Add));
        self.mode = Mode::Entry;
      }
      KeyCode::Char('s') => {
        self.form = Some(EntryForm::new(EntrySign::Subtract));
        self.mode = Mode::Entry;
      }

      // Refresh from server
      KeyCode::Char('r') => {
        if !self.loading {
          self.spawn_fetch(true);
        }
      }

      _ => {}
    }
  }

  fn handle_entry_mode_key(&mut self, key: crossterm::event::KeyEvent) {
    let Some(form) = self.form.as_mut() else {
      self.mode = Mode::Normal;
      return;
    };

    match key.code {
      KeyCode::Tab | KeyCode::Down | KeyCode::Up => form.toggle_focus(),
      _ => match form.focused_mut().handle_key(key) {
        InputResult::Submitted => self.submit_form(),
        InputResult::Cancelled => {
          self.form = None;
          self.form_error = None;
          self.mode = Mode::Normal;
        }
        InputResult::Consumed | InputResult::NotHandled => {}
      },
    }
  }

  /// Validate and submit the entry form.
  ///
  /// An accepted record is shown immediately and sent to the server in the
  /// background; if the network is down it lands in the local ledger
  /// instead, to be pushed by a later reconciliation pass.
  fn submit_form(&mut self) {
    let Some(form) = self.form.as_ref() else {
      return;
    };

    if form.name.is_empty() || form.amount.is_empty() {
      self.form_error = Some("Missing Information");
      return;
    }

    let name = form.name.value().trim().to_string();
    let Ok(amount) = form.amount.value().parse::<i64>() else {
      self.form_error = Some("Missing Information");
      return;
    };

    let value = match form.sign {
      EntrySign::Add => amount,
      EntrySign::Subtract => -amount,
    };

    let fields = TransactionFields {
      name,
      value,
      date: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    };

    // Show it immediately, newest first. The form stays open and populated
    // until the outcome arrives: it only clears on acceptance or offline
    // save, so a rejection leaves the values in place for correction.
    self.transactions.insert(0, fields.clone());
    self.form_error = None;

    let api = self.api.clone();
    let store = Arc::clone(&self.store);
    let tx = self.event_tx.clone();

    tokio::spawn(async move {
      match api.create_transaction(&fields).await {
        Ok(CreateOutcome::Accepted) => {
          let _ = tx.send(Event::Net(NetEvent::SubmitAccepted));
        }
        Ok(CreateOutcome::Rejected) => {
          let _ = tx.send(Event::Net(NetEvent::SubmitRejected));
        }
        Err(err) => {
          // Offline: keep the record locally, a later pass pushes it
          debug!("submit failed, saving locally: {}", err);
          match store.append(&fields) {
            Ok(_) => {
              let _ = tx.send(Event::Net(NetEvent::SubmitSavedLocally));
            }
            Err(store_err) => warn!("failed to save record locally: {}", store_err),
          }
        }
      }
    });
  }

  fn handle_net_event(&mut self, event: NetEvent) {
    match event {
      NetEvent::SnapshotLoaded(snapshot) => {
        // Server order is oldest first; display newest first
        self.transactions = snapshot
          .iter()
          .rev()
          .map(|t| TransactionFields {
            name: t.name.clone(),
            value: t.value,
            date: t.date.clone(),
          })
          .collect();
        self.offline = false;
        self.loading = false;
      }
      NetEvent::SnapshotFailed(err) => {
        debug!("snapshot fetch failed, rendering local ledger: {}", err);
        self.load_local();
        self.sync_label = Some("offline".to_string());
      }
      NetEvent::SyncFinished(outcome) => {
        self.sync_label = Some(match outcome {
          SyncOutcome::InSync => "in sync".to_string(),
          SyncOutcome::Pulled(n) => format!("pulled {}", n),
          SyncOutcome::Pushed(n) => format!("pushed {}", n),
        });

        // Server state changed under a push; make it authoritative again
        if matches!(outcome, SyncOutcome::Pushed(_)) {
          self.spawn_fetch(false);
        }
      }
      NetEvent::SubmitAccepted => self.close_form(),
      NetEvent::SubmitRejected => {
        self.form_error = Some("Rejected by server");
      }
      NetEvent::SubmitSavedLocally => {
        self.close_form();
        self.sync_label = Some("saved locally".to_string());
      }
    }
  }

  fn close_form(&mut self) {
    if self.form.is_some() {
      self.form = None;
      self.form_error = None;
      self.mode = Mode::Normal;
    }
  }

  // Accessors for UI rendering
  pub fn transactions(&self) -> &[TransactionFields] {
    &self.transactions
  }

  /// Running total of all displayed transactions.
  pub fn total(&self) -> i64 {
    self.transactions.iter().map(|t| t.value).sum()
  }

  pub fn mode(&self) -> Mode {
    self.mode
  }

  pub fn form(&self) -> Option<&EntryForm> {
    self.form.as_ref()
  }

  pub fn form_error(&self) -> Option<&'static str> {
    self.form_error
  }

  pub fn sync_label(&self) -> Option<&str> {
    self.sync_label.as_deref()
  }

  pub fn is_offline(&self) -> bool {
    self.offline
  }

  pub fn is_loading(&self) -> bool {
    self.loading
  }

  pub fn title(&self) -> String {
    self.config.display_title()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crossterm::event::KeyEvent;

  fn key(code: KeyCode) -> KeyEvent {
    KeyEvent::new(code, KeyModifiers::NONE)
  }

  // Port 9 (discard) refuses connections, so every submit fails fast.
  fn test_app() -> App {
    let store = Arc::new(LedgerStore::open_in_memory().unwrap());
    let storage = SqliteCacheStorage::open_in_memory(1, 16).unwrap();
    let proxy = RequestProxy::new("http://localhost:9", "/api", storage).unwrap();
    App::with_parts(Config::default(), store, ApiClient::new(proxy), false)
  }

  fn type_entry(app: &mut App, name: &str, amount: &str) {
    app.handle_key(key(KeyCode::Char('a')));
    for c in name.chars() {
      app.handle_key(key(KeyCode::Char(c)));
    }
    app.handle_key(key(KeyCode::Tab));
    for c in amount.chars() {
      app.handle_key(key(KeyCode::Char(c)));
    }
  }

  #[test]
  fn test_incomplete_form_stays_open_with_error() {
    let mut app = test_app();
    app.handle_key(key(KeyCode::Char('a')));
    app.handle_key(key(KeyCode::Char('x')));
    app.handle_key(key(KeyCode::Enter));

    assert_eq!(app.mode(), Mode::Entry);
    assert_eq!(app.form_error(), Some("Missing Information"));
    assert!(app.form().is_some());
    assert!(app.transactions().is_empty());
  }

  #[tokio::test]
  async fn test_form_stays_populated_until_submit_outcome() {
    let mut app = test_app();
    type_entry(&mut app, "groceries", "40");
    app.handle_key(key(KeyCode::Enter));

    // Optimistic row is visible, but the form waits for the server's answer
    assert_eq!(app.transactions().len(), 1);
    assert_eq!(app.transactions()[0].name, "groceries");
    assert_eq!(app.mode(), Mode::Entry);
    let form = app.form().unwrap();
    assert_eq!(form.name.value(), "groceries");
    assert_eq!(form.amount.value(), "40");
  }

  #[tokio::test]
  async fn test_rejection_keeps_values_for_correction() {
    let mut app = test_app();
    type_entry(&mut app, "rent", "900");
    app.handle_key(key(KeyCode::Enter));

    app.handle_net_event(NetEvent::SubmitRejected);

    assert_eq!(app.mode(), Mode::Entry);
    let form = app.form().unwrap();
    assert_eq!(form.name.value(), "rent");
    assert_eq!(form.amount.value(), "900");
    assert_eq!(app.form_error(), Some("Rejected by server"));
  }

  #[tokio::test]
  async fn test_acceptance_closes_form() {
    let mut app = test_app();
    type_entry(&mut app, "salary", "2500");
    app.handle_key(key(KeyCode::Enter));

    app.handle_net_event(NetEvent::SubmitAccepted);

    assert_eq!(app.mode(), Mode::Normal);
    assert!(app.form().is_none());
    assert!(app.form_error().is_none());
    assert_eq!(app.transactions().len(), 1);
  }

  #[tokio::test]
  async fn test_offline_save_closes_form() {
    let mut app = test_app();
    type_entry(&mut app, "bus fare", "3");
    app.handle_key(key(KeyCode::Enter));

    app.handle_net_event(NetEvent::SubmitSavedLocally);

    assert_eq!(app.mode(), Mode::Normal);
    assert!(app.form().is_none());
    assert_eq!(app.sync_label(), Some("saved locally"));
  }
}
