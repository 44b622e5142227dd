//! Ambient error and metrics types shared by every `qan-*` crate.

mod error;
mod metrics;

pub use error::{QanError, QanErrorKind};
pub use metrics::{metrics_from_opts, MetricError, Metrics, MetricTags};

/// Types that can describe themselves for structured logging / metrics reporting.
pub trait ReportableError: std::error::Error {
    /// A formatted backtrace, if one was captured at the error's construction site.
    fn error_backtrace(&self) -> String;
    /// Whether this error is significant enough to be reported to an external
    /// crash-aggregation service. This crate has no such integration, but the
    /// flag is kept so callers can filter noisy, expected errors from the rest.
    fn is_sentry_event(&self) -> bool;
    /// A short, low-cardinality label suitable for use as a metric tag.
    fn metric_label(&self) -> Option<String>;
}

/// Types that can represent an internal (programmer, not operator-facing) error.
pub trait InternalError {
    fn internal_error(message: String) -> Self;
}

#[macro_export]
macro_rules! from_error {
    ($from:ty, $to:ty, $to_kind:expr) => {
        impl From<$from> for $to {
            fn from(inner: $from) -> $to {
                $to_kind(inner).into()
            }
        }
    };
}

#[macro_export]
macro_rules! impl_fmt_display {
    ($error:ty, $kind:ty) => {
        impl std::fmt::Display for $error {
            fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                std::fmt::Display::fmt(&self.kind, formatter)
            }
        }
    };
}
