use std::sync::{Mutex, OnceLock};

use tracing_chrome::FlushGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::ObservabilityOptions;

static TRACE_GUARD: OnceLock<Mutex<Option<FlushGuard>>> = OnceLock::new();

fn store_trace_guard(guard: FlushGuard) {
    let cell = TRACE_GUARD.get_or_init(|| Mutex::new(None));
    let mut slot = cell.lock().expect("trace guard lock poisoned");
    *slot = Some(guard);
}

pub fn flush() {
    if let Some(cell) = TRACE_GUARD.get() {
        let mut slot = cell.lock().expect("trace guard lock poisoned");
        slot.take();
    }
}

pub fn init(options: ObservabilityOptions) {
    let (chrome_layer, trace_guard) = match options.trace_path.clone() {
        Some(path) => {
            let (layer, guard) = tracing_chrome::ChromeLayerBuilder::new()
                .file(path.clone())
                .build();
            eprintln!("tracing-chrome enabled (trace at {path})");
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    if let Err(err) = tracing_subscriber::registry()
        .with(options.env_filter())
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(chrome_layer)
        .try_init()
    {
        eprintln!("tracing init failed: {err}");
    }

    if let Some(guard) = trace_guard {
        store_trace_guard(guard);
    }
}
