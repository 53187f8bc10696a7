//! Structured logging infrastructure for Mailwatch.
//!
//! Libraries in this workspace only emit `tracing` events; binaries pick one
//! of the initializers below.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Initialize the logging system with human-readable output on stderr.
///
/// Log level can be configured via the `RUST_LOG` environment variable.
/// If not set, defaults to `info` level.
///
/// # Example
/// ```no_run
/// use mailwatch_core::logging;
///
/// logging::init();
/// tracing::info!("Application started");
/// ```
pub fn init() {
    tracing_subscriber::registry()
        .with(env_filter())
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .init();
}

/// Initialize the logging system with JSON output.
///
/// Suitable for collecting wake-cycle logs from a fleet of sensors.
///
/// # Example
/// ```no_run
/// use mailwatch_core::logging;
///
/// logging::init_json();
/// tracing::info!(boot_count = 3, "Wake cycle started");
/// ```
pub fn init_json() {
    tracing_subscriber::registry()
        .with(env_filter())
        .with(
            fmt::layer()
                .json()
                .with_target(true)
                .with_writer(std::io::stderr),
        )
        .init();
}
