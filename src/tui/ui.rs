use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Tabs},
    Frame,
};

use super::widgets::{course_detail, courses, dashboard};
use super::{App, View, REFRESH_INTERVAL};
use crate::display::format_number;

pub fn draw(f: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Tabs and term status
            Constraint::Min(0),    // Content
            Constraint::Length(1), // Help bar
        ])
        .split(f.area());

    draw_header(f, app, chunks[0]);
    draw_content(f, app, chunks[1]);
    draw_help_bar(f, app, chunks[2]);
}

fn tab_titles(app: &App) -> Vec<String> {
    let courses = match &app.filter {
        Some(filter) => format!("Courses ({}, /{})", app.courses.items.len(), filter),
        None => format!("Courses ({})", app.courses.items.len()),
    };
    vec!["Dashboard".to_string(), courses]
}

/// Credits earned so far in the term that contains today.
fn current_term_credits(app: &App) -> f64 {
    app.stats
        .term_series
        .iter()
        .find(|t| t.label == app.stats.current_term_label)
        .map_or(0.0, |t| t.credits)
}

fn status_line(app: &App) -> Line<'static> {
    let label = Style::default().fg(Color::Gray);
    let value = Style::default().fg(Color::White);

    let mut spans = vec![
        Span::styled(
            format!("LVL {}", app.level.level),
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw("  "),
    ];
    if !app.stats.current_term_label.is_empty() {
        spans.extend([
            Span::styled(app.stats.current_term_label.clone(), Style::default().fg(Color::Magenta)),
            Span::styled(" +", label),
            Span::styled(format!("{} hp", format_number(current_term_credits(app))), value),
            Span::raw("  "),
        ]);
    }
    spans.push(Span::styled(app.stats.coverage(None), label));
    Line::from(spans)
}

fn draw_header(f: &mut Frame, app: &App, area: Rect) {
    let selected = match app.view {
        View::Dashboard => 0,
        View::Courses | View::CourseDetail => 1,
    };

    let block = Block::default().borders(Borders::ALL).title(" StudyQuest ");
    let inner = block.inner(area);
    f.render_widget(block, area);

    let halves = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(30), Constraint::Length(48)])
        .split(inner);

    let tabs = Tabs::new(tab_titles(app))
        .select(selected)
        .style(Style::default().fg(Color::White))
        .highlight_style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        );
    f.render_widget(tabs, halves[0]);

    let status = Paragraph::new(status_line(app)).alignment(Alignment::Right);
    f.render_widget(status, halves[1]);
}

fn draw_content(f: &mut Frame, app: &App, area: Rect) {
    match app.view {
        View::Dashboard => dashboard::draw(f, app, area),
        View::Courses => courses::draw(f, app, area),
        View::CourseDetail => course_detail::draw(f, app, area),
    }
}

fn help_spans(app: &App) -> Vec<Span<'_>> {
    let key = Style::default().fg(Color::Cyan);

    if app.filter_mode {
        return vec![
            Span::styled("/", Style::default().fg(Color::Yellow)),
            Span::raw(app.filter_input.as_str()),
            Span::styled("█", Style::default().fg(Color::Yellow)),
            Span::raw(" | match on course name or code  "),
            Span::styled("<CR>", key),
            Span::raw(" Apply  "),
            Span::styled("<Esc>", key),
            Span::raw(" Cancel"),
        ];
    }

    let mut spans = vec![Span::styled("h/l", key), Span::raw(" Views  ")];
    match app.view {
        View::Dashboard => spans.extend([
            Span::styled("^r", key),
            Span::raw(format!(
                " Rescan now (auto every {}s)  ",
                REFRESH_INTERVAL.as_secs()
            )),
        ]),
        View::Courses => {
            spans.extend([
                Span::styled("j/k", key),
                Span::raw(" Nav  "),
                Span::styled("<CR>", key),
                Span::raw(" Modules  "),
                Span::styled("/", key),
                Span::raw(" Filter  "),
            ]);
            if app.filter.is_some() {
                spans.extend([Span::styled("<Esc>", key), Span::raw(" Show all  ")]);
            }
        }
        View::CourseDetail => spans.extend([
            Span::styled("h/<Esc>", key),
            Span::raw(" Back to courses  "),
        ]),
    }
    spans.extend([Span::styled("q", key), Span::raw(" Quit")]);
    spans
}

fn draw_help_bar(f: &mut Frame, app: &App, area: Rect) {
    let help = Paragraph::new(Line::from(help_spans(app))).style(Style::default().bg(Color::DarkGray));
    f.render_widget(help, area);
}
