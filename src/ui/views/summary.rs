use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph};

/// The running total, colored by sign.
pub fn draw_total(frame: &mut Frame, area: Rect, total: i64, offline: bool) {
  let title = if offline { " Total (offline) " } else { " Total " };

  let color = if total < 0 { Color::Red } else { Color::Green };

  let paragraph = Paragraph::new(Line::from(vec![Span::styled(
    format!("{}", total),
    Style::default().fg(color).add_modifier(Modifier::BOLD),
  )]))
  .alignment(Alignment::Center)
  .block(
    Block::default()
      .title(title)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue)),
  );

  frame.render_widget(paragraph, area);
}
