use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Bar, BarChart, BarGroup, Block, Borders, Gauge, List, ListItem, Paragraph},
    Frame,
};

use crate::display::format_credits;
use crate::tui::App;

pub fn draw(f: &mut Frame, app: &App, area: Rect) {
    if !app.stats.has_data {
        let block = Block::default()
            .borders(Borders::ALL)
            .title(" Progress ")
            .title_style(Style::default().fg(Color::Cyan));
        let paragraph = Paragraph::new(vec![
            Line::from("No statistics yet."),
            Line::from(""),
            Line::from(Span::styled(
                "Store a capture with: studyquest ingest <FILE>",
                Style::default().fg(Color::DarkGray),
            )),
        ])
        .block(block);
        f.render_widget(paragraph, area);
        return;
    }

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // XP gauge
            Constraint::Length(7), // Level + counts row
            Constraint::Min(0),    // Terms + months
        ])
        .split(area);

    let top_chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
        .split(chunks[1]);

    let bottom_chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
        .split(chunks[2]);

    draw_xp_gauge(f, app, chunks[0]);
    draw_level(f, app, top_chunks[0]);
    draw_counts(f, app, top_chunks[1]);
    draw_terms(f, app, bottom_chunks[0]);
    draw_months(f, app, bottom_chunks[1]);
}

fn draw_xp_gauge(f: &mut Frame, app: &App, area: Rect) {
    let level = &app.level;
    let label = if app.config.show_xp_to_next && level.level < level.next_level {
        format!(
            "{:.0}% to level {} ({:.0} XP left)",
            level.percent,
            level.next_level,
            (level.xp_next_level - level.xp).max(0.0)
        )
    } else {
        format!("{:.0}%", level.percent)
    };

    let gauge = Gauge::default()
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" XP ")
                .title_style(Style::default().fg(Color::Cyan)),
        )
        .gauge_style(Style::default().fg(Color::Green).bg(Color::Black))
        .ratio((level.percent / 100.0).clamp(0.0, 1.0))
        .label(label);

    f.render_widget(gauge, area);
}

fn draw_level(f: &mut Frame, app: &App, area: Rect) {
    let level = &app.level;

    let text = vec![
        Line::from(Span::styled(
            format!("LVL {}", level.level),
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from(vec![
            Span::styled("XP: ", Style::default().fg(Color::Gray)),
            Span::styled(
                format!("{:.0} / {}", level.xp, app.xp_total),
                Style::default().fg(Color::White),
            ),
        ]),
        Line::from(vec![
            Span::styled("Curve: ", Style::default().fg(Color::Gray)),
            Span::styled(
                format!("^{}", app.config.level_exponent),
                Style::default().fg(Color::Cyan),
            ),
        ]),
    ];

    let block = Block::default()
        .borders(Borders::ALL)
        .title(" Level ")
        .title_style(Style::default().fg(Color::Yellow));

    f.render_widget(Paragraph::new(text).block(block), area);
}

fn draw_counts(f: &mut Frame, app: &App, area: Rect) {
    let stats = &app.stats;

    let text = vec![
        Line::from(vec![
            Span::styled("Credits: ", Style::default().fg(Color::Gray)),
            Span::styled(
                format!(
                    "{} / {} hp",
                    format_credits(Some(stats.total_credits)),
                    format_credits(Some(app.config.program_credits))
                ),
                Style::default()
                    .fg(Color::White)
                    .add_modifier(Modifier::BOLD),
            ),
        ]),
        Line::from(vec![
            Span::styled("Modules passed: ", Style::default().fg(Color::Gray)),
            Span::styled(
                format!("{}/{}", stats.modules_passed, stats.modules_total),
                Style::default().fg(Color::Green),
            ),
        ]),
        Line::from(vec![
            Span::styled("Courses: ", Style::default().fg(Color::Gray)),
            Span::styled(stats.coverage(None), Style::default().fg(Color::White)),
        ]),
        Line::from(vec![
            Span::styled("Now: ", Style::default().fg(Color::Gray)),
            Span::styled(
                format!("{}, {}", stats.current_term_label, stats.current_month_key),
                Style::default().fg(Color::Cyan),
            ),
        ]),
    ];

    let block = Block::default()
        .borders(Borders::ALL)
        .title(" Stats ")
        .title_style(Style::default().fg(Color::Cyan));

    f.render_widget(Paragraph::new(text).block(block), area);
}

fn draw_terms(f: &mut Frame, app: &App, area: Rect) {
    let bars: Vec<Bar> = app
        .stats
        .term_series
        .iter()
        .map(|term| {
            let color = if term.label == app.stats.current_term_label {
                Color::Yellow
            } else {
                Color::Blue
            };
            // Tenths of a credit so half credits still show.
            Bar::default()
                .value((term.credits * 10.0).round() as u64)
                .text_value(format_credits(Some(term.credits)))
                .label(Line::from(term.label.clone()))
                .style(Style::default().fg(color))
        })
        .collect();

    let chart = BarChart::default()
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" Credits per term ")
                .title_style(Style::default().fg(Color::Magenta)),
        )
        .data(BarGroup::default().bars(&bars))
        .bar_width(9)
        .bar_gap(1)
        .value_style(Style::default().fg(Color::Black).bg(Color::White));

    f.render_widget(chart, area);
}

fn draw_months(f: &mut Frame, app: &App, area: Rect) {
    let items: Vec<ListItem> = app
        .stats
        .series
        .iter()
        .rev()
        .map(|point| {
            let current = point.key == app.stats.current_month_key;
            let key_style = if current {
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::DarkGray)
            };

            ListItem::new(Line::from(vec![
                Span::styled(format!("{:<9}", point.key), key_style),
                Span::styled(
                    format!("+{:<6}", format_credits(Some(point.credits))),
                    Style::default().fg(Color::Green),
                ),
                Span::styled(
                    format!("{:>6} hp", format_credits(Some(point.cumulative_credits))),
                    Style::default().fg(Color::White),
                ),
            ]))
        })
        .collect();

    let block = Block::default()
        .borders(Borders::ALL)
        .title(" Months ")
        .title_style(Style::default().fg(Color::Magenta));

    f.render_widget(List::new(items).block(block), area);
}
