use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph},
    Frame,
};

use crate::display::{format_credits, truncate};
use crate::tui::App;

pub fn draw(f: &mut Frame, app: &App, area: Rect) {
    let title = if let Some(filter) = &app.filter {
        format!(" Courses (filter: {}) ", filter)
    } else {
        " Courses ".to_string()
    };

    let items: Vec<ListItem> = app
        .courses
        .items
        .iter()
        .map(|course| {
            let passed = course.modules_passed();
            let total = course.modules.len();
            let progress_color = if total > 0 && passed == total {
                Color::Green
            } else if passed > 0 {
                Color::Yellow
            } else {
                Color::DarkGray
            };

            ListItem::new(Line::from(vec![
                Span::styled(
                    format!("{:<10}", course.course_code.as_deref().unwrap_or("-")),
                    Style::default().fg(Color::Cyan),
                ),
                Span::styled(
                    format!("{:<40}", truncate(course.display_name(), 38)),
                    Style::default().fg(Color::White),
                ),
                Span::styled(
                    format!("{:>6}  ", format_credits(course.course_credits)),
                    Style::default().fg(Color::White),
                ),
                Span::styled(
                    format!("{:<9}", format!("{}/{}", passed, total)),
                    Style::default().fg(progress_color),
                ),
                Span::styled(
                    course.last_seen_at.format("%b %d").to_string(),
                    Style::default().fg(Color::DarkGray),
                ),
            ]))
        })
        .collect();

    let block = Block::default()
        .borders(Borders::ALL)
        .title(title)
        .title_style(Style::default().fg(Color::Cyan));

    let header_style = Style::default()
        .fg(Color::DarkGray)
        .add_modifier(Modifier::BOLD);
    let header = Line::from(vec![
        Span::raw("  "),
        Span::styled(format!("{:<10}", "Code"), header_style),
        Span::styled(format!("{:<40}", "Name"), header_style),
        Span::styled(format!("{:>6}  ", "HP"), header_style),
        Span::styled(format!("{:<9}", "Passed"), header_style),
        Span::styled("Seen", header_style),
    ]);

    let list = List::new(items)
        .highlight_style(
            Style::default()
                .bg(Color::DarkGray)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");

    let mut state = ListState::default();
    state.select(app.courses.selected);

    let inner = block.inner(area);
    f.render_widget(block, area);

    // Header on the first inner row, indented past the highlight symbol.
    let header_area = Rect {
        height: inner.height.min(1),
        ..inner
    };
    f.render_widget(Paragraph::new(header), header_area);

    let list_area = Rect {
        y: inner.y.saturating_add(1),
        height: inner.height.saturating_sub(1),
        ..inner
    };
    f.render_stateful_widget(list, list_area, &mut state);
}
