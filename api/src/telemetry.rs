use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Arc;

use tracing::Subscriber;
use tracing::subscriber::set_global_default;
use tracing_log::LogTracer;
use tracing_subscriber::{EnvFilter, Registry, fmt, layer::SubscriberExt};

/// Log an error if it exists using the alternate selector, which emits the
/// error chain.
pub fn log_error(e: impl Into<anyhow::Error>) {
    let e: anyhow::Error = e.into();
    tracing::error!("{e:#}");
}

/// Build the subscriber: stderr always, plus an optional append-mode log
/// file. Size-based rotation of that file is left to the process
/// supervisor.
pub fn get_subscriber(
    env_filter: String,
    log_file: Option<&Path>,
) -> impl Subscriber + Sync + Send {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(env_filter));
    let stderr = fmt::Layer::new()
        .with_writer(std::io::stderr)
        .pretty()
        .with_span_events(fmt::format::FmtSpan::CLOSE);
    let file_layer = log_file.and_then(|path| {
        match OpenOptions::new().create(true).append(true).open(path) {
            Ok(file) => Some(
                fmt::Layer::new().with_writer(Arc::new(file)).with_ansi(false),
            ),
            Err(e) => {
                eprintln!("could not open log file {}: {e}", path.display());
                None
            }
        }
    });
    Registry::default()
        .with(env_filter)
        .with(stderr)
        .with(file_layer)
}

/// Register a subscriber as global default to process span data.
///
/// It should only be called once!
pub fn init_subscriber(subscriber: impl Subscriber + Sync + Send) {
    LogTracer::init().expect("Failed to set logger");
    set_global_default(subscriber).expect("Failed to set subscriber");
}
