// ==========================================
// Logging Initialization
// ==========================================
// tracing + tracing-subscriber
// Level filter from RUST_LOG (default: info)
// ==========================================

use tracing_subscriber::{fmt, EnvFilter};

/// Output format of the global subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    /// One JSON object per line, for log shippers
    Json,
}

impl LogFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "text" | "plain" => Some(LogFormat::Text),
            "json" => Some(LogFormat::Json),
            _ => None,
        }
    }
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Initialize the global subscriber
///
/// # Environment
/// - RUST_LOG: level filter (default: info)
///   e.g. RUST_LOG=debug or RUST_LOG=scrap_recycling=trace
///
/// # Example
/// ```no_run
/// use scrap_recycling::logging;
/// logging::init();
/// ```
pub fn init() {
    init_with_format(LogFormat::Text);
}

pub fn init_with_format(format: LogFormat) {
    match format {
        LogFormat::Text => {
            let _ = fmt()
                .with_env_filter(env_filter())
                .with_target(true)
                .with_thread_ids(false)
                .with_line_number(true)
                .with_writer(std::io::stderr)
                .try_init();
        }
        LogFormat::Json => {
            let _ = fmt()
                .json()
                .with_env_filter(env_filter())
                .with_target(true)
                .with_current_span(true)
                .with_writer(std::io::stderr)
                .try_init();
        }
    }
}

/// Test subscriber: debug level, captured by the test harness
pub fn init_test() {
    let _ = fmt()
        .with_env_filter(EnvFilter::new("debug"))
        .with_test_writer()
        .try_init();
}
