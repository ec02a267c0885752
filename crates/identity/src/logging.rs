//! Structured logging initialization.
//!
//! Library code only emits `tracing` events; binaries and examples call
//! [`init`] once at startup. Log level is configured through `RUST_LOG`,
//! defaulting to `info`.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize the logging system with structured output.
///
/// # Example
/// ```no_run
/// use hardsign_identity::logging;
///
/// logging::init();
/// tracing::info!("starting");
/// ```
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .init();
}
