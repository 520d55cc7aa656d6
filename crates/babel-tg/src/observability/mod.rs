pub(crate) mod logging;
pub(crate) mod metrics;

pub use logging::{init_logging, tracing_err, LoggingTask};
pub use metrics::init_metrics;

/// Labels attached to every log record and metric sample.
const GLOBAL_LABELS: &[(&str, &str)] = &[("app_version", env!("CARGO_PKG_VERSION"))];
