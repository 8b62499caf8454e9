use tracing_subscriber::EnvFilter;

/// Env var consulted for the log filter when no explicit filter is given.
pub const LOG_FILTER_ENV: &str = "RUST_LOG";

const DEFAULT_LOG_FILTER: &str = "info";

#[derive(Clone, Debug, Default)]
pub struct ObservabilityOptions {
    /// Filter directives such as `superv=debug`; overrides `RUST_LOG`.
    pub log_filter: Option<String>,
    pub trace_path: Option<String>,
}

impl ObservabilityOptions {
    pub(crate) fn env_filter(&self) -> EnvFilter {
        let directives = self
            .log_filter
            .clone()
            .or_else(|| std::env::var(LOG_FILTER_ENV).ok())
            .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());
        EnvFilter::try_new(&directives).unwrap_or_else(|err| {
            eprintln!("invalid log filter {directives:?} ({err}); falling back to {DEFAULT_LOG_FILTER}");
            EnvFilter::new(DEFAULT_LOG_FILTER)
        })
    }
}
