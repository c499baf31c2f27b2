use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, Paragraph, Wrap},
    Frame,
};

use crate::aggregate::module_date;
use crate::calendar::{result_date, term_range_of};
use crate::display::{format_credits, truncate};
use crate::models::{CourseRecord, GradeResult};
use crate::tui::App;

fn grade_color(result: Option<&GradeResult>) -> Color {
    match result {
        Some(r) if r.is_passed() => Color::Green,
        Some(r) if r.grade.is_some() => Color::Red,
        _ => Color::DarkGray,
    }
}

pub fn draw(f: &mut Frame, app: &App, area: Rect) {
    let Some(course) = &app.selected_course else {
        let block = Block::default()
            .borders(Borders::ALL)
            .title(" Course Detail ");
        let paragraph = Paragraph::new("No course selected").block(block);
        f.render_widget(paragraph, area);
        return;
    };

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(7), // Header info
            Constraint::Min(0),    // Modules
        ])
        .split(area);

    draw_header(f, course, chunks[0]);
    draw_modules(f, app, course, chunks[1]);
}

fn draw_header(f: &mut Frame, course: &CourseRecord, area: Rect) {
    let result = course.course_result.as_ref();
    let runs = match (&course.term_start, &course.term_end) {
        (Some(start), Some(end)) => format!("{} to {}", start, end),
        (Some(start), None) => format!("from {}", start),
        (None, Some(end)) => format!("until {}", end),
        (None, None) => "-".to_string(),
    };

    let text = vec![
        Line::from(vec![
            Span::styled("Code: ", Style::default().fg(Color::Gray)),
            Span::styled(
                course.course_code.as_deref().unwrap_or("-"),
                Style::default().fg(Color::Cyan),
            ),
            Span::raw("  "),
            Span::styled("Credits: ", Style::default().fg(Color::Gray)),
            Span::styled(
                format!("{} hp", format_credits(course.course_credits)),
                Style::default().fg(Color::White),
            ),
        ]),
        Line::from(vec![
            Span::styled("Runs: ", Style::default().fg(Color::Gray)),
            Span::styled(runs, Style::default().fg(Color::White)),
        ]),
        Line::from(vec![
            Span::styled("Course result: ", Style::default().fg(Color::Gray)),
            Span::styled(
                result.map(|r| r.grade_label()).unwrap_or("-"),
                Style::default().fg(grade_color(result)),
            ),
            Span::raw("  "),
            Span::styled("Modules passed: ", Style::default().fg(Color::Gray)),
            Span::styled(
                format!("{}/{}", course.modules_passed(), course.modules.len()),
                Style::default().fg(Color::Green),
            ),
        ]),
        Line::from(vec![
            Span::styled("Last seen: ", Style::default().fg(Color::Gray)),
            Span::styled(
                course.last_seen_at.format("%Y-%m-%d %H:%M").to_string(),
                Style::default().fg(Color::DarkGray),
            ),
        ]),
    ];

    let block = Block::default()
        .borders(Borders::ALL)
        .title(format!(" {} ", course.display_name()))
        .title_style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        );

    let paragraph = Paragraph::new(text).block(block).wrap(Wrap { trim: true });
    f.render_widget(paragraph, area);
}

fn draw_modules(f: &mut Frame, app: &App, course: &CourseRecord, area: Rect) {
    let mut items: Vec<ListItem> = Vec::new();

    for module in &course.modules {
        let latest = module.latest.as_ref();
        let date = module_date(module, &app.config);
        let term = date
            .map(|d| term_range_of(d, &app.config).label)
            .unwrap_or_default();

        items.push(ListItem::new(Line::from(vec![
            Span::styled(
                format!("{:<8}", module.module_code.as_deref().unwrap_or("-")),
                Style::default().fg(Color::Cyan),
            ),
            Span::styled(
                format!("{:<36}", truncate(&module.name, 34)),
                Style::default().fg(Color::White),
            ),
            Span::styled(
                format!("{:>5}  ", format_credits(module.credits)),
                Style::default().fg(Color::White),
            ),
            Span::styled(
                format!("{:<4}", latest.map(|r| r.grade_label()).unwrap_or("-")),
                Style::default().fg(grade_color(latest)),
            ),
            Span::styled(
                format!(
                    "{:<12}",
                    date.map(|d| d.to_string()).unwrap_or_else(|| "-".to_string())
                ),
                Style::default().fg(Color::DarkGray),
            ),
            Span::styled(term, Style::default().fg(Color::Magenta)),
        ])));

        // Other attempts, oldest first.
        for attempt in module.attempts.iter().filter(|a| Some(*a) != latest) {
            let when = result_date(attempt, app.config.date_basis)
                .map(|d| d.to_string())
                .unwrap_or_else(|| "-".to_string());
            items.push(ListItem::new(Line::from(vec![
                Span::raw("        "),
                Span::styled("attempt ", Style::default().fg(Color::DarkGray)),
                Span::styled(
                    format!("{:<4}", attempt.grade_label()),
                    Style::default().fg(grade_color(Some(attempt))),
                ),
                Span::styled(when, Style::default().fg(Color::DarkGray)),
            ])));
        }
    }

    if items.is_empty() {
        items.push(ListItem::new(Line::from(vec![Span::styled(
            "No modules recorded",
            Style::default().fg(Color::DarkGray),
        )])));
    }

    let block = Block::default()
        .borders(Borders::ALL)
        .title(" Modules ")
        .title_style(Style::default().fg(Color::Cyan));

    let list = List::new(items).block(block);
    f.render_widget(list, area);
}
