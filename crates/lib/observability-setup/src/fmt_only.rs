use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::ObservabilityOptions;

pub fn init(options: ObservabilityOptions) {
    if let Some(path) = &options.trace_path {
        eprintln!("tracing-chrome disabled, ignoring {path}. Rebuild with --features trace.");
    }
    if let Err(err) = tracing_subscriber::registry()
        .with(options.env_filter())
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init()
    {
        eprintln!("tracing init failed: {err}");
    }
}

pub fn flush() {}
