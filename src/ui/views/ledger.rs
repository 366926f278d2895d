use crate::db::TransactionFields;
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Cell, Paragraph, Row, Table};

pub fn draw_ledger(
  frame: &mut Frame,
  area: Rect,
  transactions: &[TransactionFields],
  loading: bool,
) {
  let title = if loading {
    " Transactions (loading...) ".to_string()
  } else {
    format!(" Transactions ({}) ", transactions.len())
  };

  let block = Block::default()
    .title(title)
    .borders(Borders::ALL)
    .border_style(Style::default().fg(Color::Blue));

  if transactions.is_empty() && !loading {
    let paragraph = Paragraph::new("No transactions yet. Press 'a' to add funds.")
      .block(block)
      .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(paragraph, area);
    return;
  }

  let rows: Vec<Row> = transactions
    .iter()
    .map(|t| {
      let value_color = if t.value < 0 { Color::Red } else { Color::Green };
      Row::new(vec![
        Cell::from(truncate(&t.name, 28)),
        Cell::from(format!("{:>10}", t.value))
          .style(Style::default().fg(value_color)),
        Cell::from(short_date(&t.date)).style(Style::default().fg(Color::DarkGray)),
      ])
    })
    .collect();

  let table = Table::new(
    rows,
    [
      Constraint::Min(16),
      Constraint::Length(10),
      Constraint::Length(12),
    ],
  )
  .header(
    Row::new(vec!["Name", "Value", "Date"])
      .style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)),
  )
  .block(block);

  frame.render_widget(table, area);
}

/// Display a timestamp as M/D/YYYY, matching the chart labels.
fn short_date(date: &str) -> String {
  match chrono::DateTime::parse_from_rfc3339(date) {
    Ok(dt) => {
      use chrono::Datelike;
      format!("{}/{}/{}", dt.month(), dt.day(), dt.year())
    }
    Err(_) => date.to_string(),
  }
}

fn truncate(s: &str, max_len: usize) -> String {
  if s.chars().count() <= max_len {
    s.to_string()
  } else {
    let cut: String = s.chars().take(max_len.saturating_sub(3)).collect();
    format!("{}...", cut)
  }
}
