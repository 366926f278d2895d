pub mod components;
mod views;

use crate::app::{App, Mode};
use ratatui::prelude::*;
use ratatui::widgets::Paragraph;

/// Main draw function
pub fn draw(frame: &mut Frame, app: &App) {
  let chunks = Layout::default()
    .direction(Direction::Vertical)
    .constraints([
      Constraint::Length(1),  // Header
      Constraint::Length(10), // Chart
      Constraint::Min(5),     // Ledger + sidebar
      Constraint::Length(1),  // Status bar
    ])
    .split(frame.area());

  draw_header(frame, chunks[0], app);
  views::chart::draw_chart(frame, chunks[1], app.transactions());

  let body = Layout::default()
    .direction(Direction::Horizontal)
    .constraints([Constraint::Min(30), Constraint::Length(36)])
    .split(chunks[2]);

  views::ledger::draw_ledger(frame, body[0], app.transactions(), app.is_loading());

  let sidebar = Layout::default()
    .direction(Direction::Vertical)
    .constraints([Constraint::Length(3), Constraint::Min(5)])
    .split(body[1]);

  views::summary::draw_total(frame, sidebar[0], app.total(), app.is_offline());

  if let Some(form) = app.form() {
    views::form::draw_form(frame, sidebar[1], form, app.form_error());
  } else if let Some(error) = app.form_error() {
    // Keep the rejection visible after the form closes
    let paragraph = Paragraph::new(error).style(Style::default().fg(Color::Red));
    frame.render_widget(paragraph, sidebar[1]);
  }

  draw_status_bar(frame, chunks[3], app);
}

fn draw_header(frame: &mut Frame, area: Rect, app: &App) {
  let mut spans = vec![
    Span::styled(
      " tally ",
      Style::default().fg(Color::Black).bg(Color::LightBlue),
    ),
    Span::raw(" "),
    Span::styled(app.title(), Style::default().fg(Color::Gray)),
  ];

  if let Some(label) = app.sync_label() {
    spans.push(Span::raw("  "));
    spans.push(Span::styled(
      format!("[{}]", label),
      Style::default().fg(Color::DarkGray),
    ));
  }

  frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn draw_status_bar(frame: &mut Frame, area: Rect, app: &App) {
  let (content, style) = match app.mode() {
    Mode::Normal => {
      let hint = " a:add funds  s:subtract funds  r:refresh  q:quit";
      (hint.to_string(), Style::default().fg(Color::DarkGray))
    }
    Mode::Entry => {
      let hint = " Tab:next field  Enter:submit  Esc:cancel";
      (hint.to_string(), Style::default().fg(Color::Yellow))
    }
  };

  let paragraph = Paragraph::new(content).style(style);
  frame.render_widget(paragraph, area);
}
