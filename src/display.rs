//! Text helpers shared by the CLI tables and the dashboard widgets.

pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{:.0}", value)
    } else {
        format!("{:.1}", value)
    }
}

pub fn format_credits(credits: Option<f64>) -> String {
    credits.map(format_number).unwrap_or_else(|| "-".to_string())
}

/// Shortens to `max_len` characters, ending in "..." when cut.
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}
