use crate::app::{EntryForm, EntrySign, FormField};
use crate::ui::components::TextInput;
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph};

/// The add/subtract funds form: name, amount, and the inline error line.
pub fn draw_form(frame: &mut Frame, area: Rect, form: &EntryForm, error: Option<&str>) {
  let title = match form.sign {
    EntrySign::Add => " Add Funds ",
    EntrySign::Subtract => " Subtract Funds ",
  };

  let block = Block::default()
    .title(title)
    .borders(Borders::ALL)
    .border_style(Style::default().fg(Color::Yellow));

  let inner = block.inner(area);
  frame.render_widget(block, area);

  let chunks = Layout::default()
    .direction(Direction::Vertical)
    .constraints([
      Constraint::Length(1), // Name
      Constraint::Length(1), // Amount
      Constraint::Length(1), // Error
    ])
    .split(inner);

  draw_field(
    frame,
    chunks[0],
    "Name",
    &form.name,
    form.focus == FormField::Name,
  );
  draw_field(
    frame,
    chunks[1],
    "Amount",
    &form.amount,
    form.focus == FormField::Amount,
  );

  if let Some(error) = error {
    let paragraph = Paragraph::new(error).style(Style::default().fg(Color::Red));
    frame.render_widget(paragraph, chunks[2]);
  }
}

fn draw_field(frame: &mut Frame, area: Rect, label: &str, input: &TextInput, focused: bool) {
  let label_style = if focused {
    Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
  } else {
    Style::default().fg(Color::DarkGray)
  };

  let line = Line::from(vec![
    Span::styled(format!("{:<8}", label), label_style),
    Span::raw(input.value()),
  ]);

  frame.render_widget(Paragraph::new(line), area);

  if focused {
    // 8 columns of label precede the input text
    let x = area.x + 8 + input.cursor_position() as u16;
    if x < area.x + area.width {
      frame.set_cursor_position((x, area.y));
    }
  }
}
