//! Logging integration for gridbase.
//!
//! Provides helpers for configuring [`tracing`]-based logging from
//! [`Settings`](crate::settings::Settings) and for creating per-operation
//! spans around field changes.

use crate::settings::Settings;

/// Sets up the global tracing subscriber based on the given settings.
///
/// The filter is read from `settings.log_level` (e.g. "debug", "info",
/// "`gridbase_fields=debug`"). In debug mode a pretty, human-readable format is
/// used; otherwise a structured JSON format is used. Installing a subscriber
/// twice is a no-op.
pub fn setup_logging(settings: &Settings) {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_new(&settings.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    if settings.debug {
        fmt::Subscriber::builder()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .pretty()
            .try_init()
            .ok();
    } else {
        fmt::Subscriber::builder()
            .with_env_filter(filter)
            .with_target(true)
            .json()
            .try_init()
            .ok();
    }
}

/// Creates a tracing span for a single field operation.
///
/// Every event emitted while the span is entered carries the operation name
/// and the field id, which is `0` for a field that does not exist yet.
///
/// # Examples
///
/// ```
/// use gridbase_core::logging::field_span;
///
/// let span = field_span("update_field", 42);
/// let _guard = span.enter();
/// tracing::info!("changing field type");
/// ```
pub fn field_span(operation: &'static str, field_id: i64) -> tracing::Span {
    tracing::info_span!("field", op = operation, field_id = field_id)
}
