use crate::db::TransactionFields;
use ratatui::prelude::*;
use ratatui::symbols;
use ratatui::widgets::{Axis, Block, Borders, Chart, Dataset, GraphType};

/// Cumulative balance over time, oldest transaction first.
///
/// `transactions` arrives newest first (display order); the running sum is
/// built over the reversed sequence.
pub fn draw_chart(frame: &mut Frame, area: Rect, transactions: &[TransactionFields]) {
  let block = Block::default()
    .title(" Total Over Time ")
    .borders(Borders::ALL)
    .border_style(Style::default().fg(Color::Blue));

  let points = cumulative_points(transactions);

  if points.is_empty() {
    frame.render_widget(block, area);
    return;
  }

  let max_x = (points.len() - 1).max(1) as f64;
  let (min_y, max_y) = y_bounds(&points);

  let dataset = Dataset::default()
    .name("balance")
    .marker(symbols::Marker::Braille)
    .graph_type(GraphType::Line)
    .style(Style::default().fg(Color::LightBlue))
    .data(&points);

  let chart = Chart::new(vec![dataset])
    .block(block)
    .x_axis(
      Axis::default()
        .bounds([0.0, max_x])
        .style(Style::default().fg(Color::DarkGray)),
    )
    .y_axis(
      Axis::default()
        .bounds([min_y, max_y])
        .labels(vec![
          Span::raw(format!("{:.0}", min_y)),
          Span::raw(format!("{:.0}", max_y)),
        ])
        .style(Style::default().fg(Color::DarkGray)),
    );

  frame.render_widget(chart, area);
}

fn cumulative_points(transactions: &[TransactionFields]) -> Vec<(f64, f64)> {
  let mut sum = 0i64;
  transactions
    .iter()
    .rev()
    .enumerate()
    .map(|(i, t)| {
      sum += t.value;
      (i as f64, sum as f64)
    })
    .collect()
}

fn y_bounds(points: &[(f64, f64)]) -> (f64, f64) {
  let mut min = 0.0f64;
  let mut max = 0.0f64;
  for (_, y) in points {
    min = min.min(*y);
    max = max.max(*y);
  }
  if (max - min).abs() < f64::EPSILON {
    max = min + 1.0;
  }
  (min, max)
}

#[cfg(test)]
mod tests {
  use super::*;

  fn tx(value: i64) -> TransactionFields {
    TransactionFields {
      name: "t".to_string(),
      value,
      date: "2024-01-01T00:00:00Z".to_string(),
    }
  }

  #[test]
  fn test_cumulative_points_accumulate_oldest_first() {
    // Display order is newest first: [+5, -2, +10] happened as 10, -2, 5
    let txs = vec![tx(5), tx(-2), tx(10)];
    let points = cumulative_points(&txs);
    assert_eq!(points, vec![(0.0, 10.0), (1.0, 8.0), (2.0, 13.0)]);
  }

  #[test]
  fn test_y_bounds_span_negative_balances() {
    let (min, max) = y_bounds(&[(0.0, -5.0), (1.0, 3.0)]);
    assert_eq!(min, -5.0);
    assert_eq!(max, 3.0);
  }

  #[test]
  fn test_y_bounds_flat_line_gets_height() {
    let (min, max) = y_bounds(&[(0.0, 0.0)]);
    assert!(max > min);
  }
}
