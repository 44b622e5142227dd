use std::io;

use slog::{slog_o, Drain};

/// Mirrors the syncserver binary's `init_logging`: JSON via `MozLogJson` for production,
/// human-readable `slog_term` for local runs, both wrapped in `slog_envlogger` (so
/// `RUST_LOG` filtering still works) and `slog_async` (so logging never blocks a tick).
pub fn init_logging(json: bool) -> Result<(), String> {
    let logger = if json {
        let drain = slog_mozlog_json::MozLogJson::new(io::stdout())
            .logger_name(format!(
                "{}-{}",
                env!("CARGO_PKG_NAME"),
                env!("CARGO_PKG_VERSION")
            ))
            .msg_type(format!("{}:log", env!("CARGO_PKG_NAME")))
            .build()
            .fuse();
        let drain = slog_envlogger::new(drain);
        let drain = slog_async::Async::new(drain).build().fuse();
        slog::Logger::root(drain, slog_o!())
    } else {
        let decorator = slog_term::TermDecorator::new().build();
        let drain = slog_term::FullFormat::new(decorator).build().fuse();
        let drain = slog_envlogger::new(drain);
        let drain = slog_async::Async::new(drain).build().fuse();
        slog::Logger::root(drain, slog_o!())
    };
    // Same NoGlobalLoggerSet cancel as the teacher binary: reset_logging() handles
    // shutdown explicitly, so the panic-on-drop guard would only get in the way.
    slog_scope::set_global_logger(logger).cancel_reset();
    slog_stdlog::init().map_err(|e| e.to_string())
}

pub fn reset_logging() {
    let logger = slog::Logger::root(slog::Discard, slog_o!());
    slog_scope::set_global_logger(logger).cancel_reset();
}
