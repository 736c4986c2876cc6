//! Logging setup
//!
//! `RUST_LOG` takes precedence over `--log-level`; with neither set the
//! filter is `info`. Logs go to stderr. `NO_COLOR` disables ANSI output.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter directive to install for the given `--log-level`
pub fn filter_directive(level: Option<&str>) -> String {
    match std::env::var("RUST_LOG") {
        Ok(env) if !env.is_empty() => env,
        _ => level.unwrap_or("info").to_string(),
    }
}

/// Install the global subscriber. Safe to call more than once; later calls
/// are ignored.
pub fn init_logging(level: Option<&str>) {
    let filter = EnvFilter::new(filter_directive(level));
    let _ = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr)
                .with_ansi(std::env::var_os("NO_COLOR").is_none()),
        )
        .with(filter)
        .try_init();
}
