use backtrace::Backtrace;
use thiserror::Error;

use crate::{InternalError, ReportableError};

/// The one error type shared by the fetchers, the governor, the scheduler, and the sink.
///
/// Mirrors the `DbError { kind, backtrace }` wrapper shape used elsewhere in this codebase:
/// callers match on `.kind()`, `Display`/`Error` come from the inner `QanErrorKind`, and a
/// backtrace is captured once at the point the error is first constructed.
#[derive(Debug)]
pub struct QanError {
    kind: QanErrorKind,
    backtrace: Box<Backtrace>,
}

/// What went wrong, grouped by how the scheduler is meant to react (see the error handling
/// design: preflight errors are not retried with backoff, query errors are retried next tick,
/// sink/state errors are logged and never fatal, config errors are fatal only at startup).
#[derive(Debug, Error)]
pub enum QanErrorKind {
    #[error("preflight check failed: {0}")]
    Preflight(String),

    #[error("query failed: {0}")]
    Query(String),

    #[error("sink rejected batch: {0}")]
    Sink(String),

    #[error("governor state error: {0}")]
    State(String),

    #[error("deadline exceeded or cancelled")]
    Context,

    #[error("configuration error: {0}")]
    Config(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl QanError {
    pub fn preflight(msg: impl Into<String>) -> Self {
        QanErrorKind::Preflight(msg.into()).into()
    }

    pub fn query(msg: impl Into<String>) -> Self {
        QanErrorKind::Query(msg.into()).into()
    }

    pub fn sink(msg: impl Into<String>) -> Self {
        QanErrorKind::Sink(msg.into()).into()
    }

    pub fn state(msg: impl Into<String>) -> Self {
        QanErrorKind::State(msg.into()).into()
    }

    pub fn context() -> Self {
        QanErrorKind::Context.into()
    }

    pub fn config(msg: impl Into<String>) -> Self {
        QanErrorKind::Config(msg.into()).into()
    }

    pub fn kind(&self) -> &QanErrorKind {
        &self.kind
    }

    pub fn is_preflight(&self) -> bool {
        matches!(self.kind, QanErrorKind::Preflight(_))
    }

    pub fn is_query(&self) -> bool {
        matches!(self.kind, QanErrorKind::Query(_))
    }

    pub fn is_sink(&self) -> bool {
        matches!(self.kind, QanErrorKind::Sink(_))
    }

    pub fn is_state(&self) -> bool {
        matches!(self.kind, QanErrorKind::State(_))
    }

    pub fn is_context(&self) -> bool {
        matches!(self.kind, QanErrorKind::Context)
    }

    pub fn is_config(&self) -> bool {
        matches!(self.kind, QanErrorKind::Config(_))
    }
}

impl From<QanErrorKind> for QanError {
    fn from(kind: QanErrorKind) -> Self {
        Self {
            kind,
            backtrace: Box::new(Backtrace::new()),
        }
    }
}

crate::impl_fmt_display!(QanError, QanErrorKind);

impl std::error::Error for QanError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.kind)
    }
}

impl ReportableError for QanError {
    fn error_backtrace(&self) -> String {
        format!("{:?}", self.backtrace)
    }

    fn is_sentry_event(&self) -> bool {
        !matches!(self.kind, QanErrorKind::Context)
    }

    fn metric_label(&self) -> Option<String> {
        let label = match &self.kind {
            QanErrorKind::Preflight(_) => "preflight",
            QanErrorKind::Query(_) => "query",
            QanErrorKind::Sink(_) => "sink",
            QanErrorKind::State(_) => "state",
            QanErrorKind::Context => "context",
            QanErrorKind::Config(_) => "config",
            QanErrorKind::Internal(_) => "internal",
        };
        Some(label.to_owned())
    }
}

impl InternalError for QanError {
    fn internal_error(message: String) -> Self {
        QanErrorKind::Internal(message).into()
    }
}
