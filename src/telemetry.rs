//! Logging setup.
//!
//! - STUDYQUEST_LOG sets the filter (e.g. "debug" or "studyquest=debug").
//!   Defaults to "warn" so command output and the dashboard stay readable.
//! - STUDYQUEST_LOG_FORMAT=json switches to JSON lines.
//!
//! Everything is written to stderr.

use tracing_subscriber::EnvFilter;

pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_env("STUDYQUEST_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);

    match std::env::var("STUDYQUEST_LOG_FORMAT").as_deref() {
        Ok("json") => builder.json().init(),
        _ => builder.init(),
    }
}
