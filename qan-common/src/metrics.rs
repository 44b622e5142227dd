use std::net::UdpSocket;
use std::sync::Arc;
use std::time::Instant;

use cadence::{
    BufferedUdpMetricSink, NopMetricSink, QueuingMetricSink, StatsdClient, DEFAULT_PORT,
};
use slog::KV;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MetricError {
    #[error("metrics io error: {0}")]
    Io(#[from] std::io::Error),
}

/// A thin, always-safe-to-call wrapper around an optional statsd client. When no
/// `statsd_host` is configured the client is absent and every call is a no-op; callers
/// never need to branch on whether metrics are enabled.
#[derive(Clone)]
pub struct Metrics {
    client: Option<Arc<StatsdClient>>,
    tags: Vec<(String, String)>,
}

impl Metrics {
    pub fn noop() -> Self {
        Self {
            client: None,
            tags: Vec::new(),
        }
    }

    pub fn with_tags(&self, tags: Vec<(&str, String)>) -> Self {
        let mut merged = self.tags.clone();
        merged.extend(tags.into_iter().map(|(k, v)| (k.to_owned(), v)));
        Self {
            client: self.client.clone(),
            tags: merged,
        }
    }

    pub fn incr(&self, label: &str) {
        self.incr_with_tags(label, &[]);
    }

    pub fn incr_with_tags(&self, label: &str, tags: &[(&str, &str)]) {
        if let Some(client) = &self.client {
            let mut builder = client.incr_with_tags(label);
            for (k, v) in self.tags.iter().map(|(k, v)| (k.as_str(), v.as_str())) {
                builder = builder.with_tag(k, v);
            }
            for (k, v) in tags {
                builder = builder.with_tag(k, v);
            }
            if let Err(err) = builder.try_send() {
                slog_scope::warn!("metric send failed"; "label" => label, "error" => err.to_string());
            }
        }
    }

    pub fn decr(&self, label: &str) {
        if let Some(client) = &self.client {
            if let Err(err) = client.decr(label) {
                slog_scope::warn!("metric send failed"; "label" => label, "error" => err.to_string());
            }
        }
    }

    pub fn gauge(&self, label: &str, value: u64) {
        if let Some(client) = &self.client {
            if let Err(err) = client.gauge(label, value) {
                slog_scope::warn!("metric send failed"; "label" => label, "error" => err.to_string());
            }
        }
    }

    /// Returns a guard that records the elapsed time under `label` as a timer
    /// when dropped, mirroring the teacher's Drop-based auto-emitting timer.
    pub fn start_timer(&self, label: &'static str) -> MetricTimer {
        MetricTimer {
            metrics: self.clone(),
            label,
            start: Instant::now(),
        }
    }
}

pub struct MetricTimer {
    metrics: Metrics,
    label: &'static str,
    start: Instant,
}

impl Drop for MetricTimer {
    fn drop(&mut self) {
        if let Some(client) = &self.metrics.client {
            let elapsed_ms = self.start.elapsed().as_millis() as u64;
            match client.time(self.label, elapsed_ms) {
                Ok(_) => slog_scope::trace!("timer sent"; "label" => self.label, "elapsed_ms" => elapsed_ms),
                Err(err) => {
                    slog_scope::warn!("timer send failed"; "label" => self.label, "error" => err.to_string())
                }
            }
        }
    }
}

/// Builds a [`Metrics`] from a statsd host/port pair. `None` disables metrics entirely
/// (a [`NopMetricSink`]); otherwise a buffered UDP sink is wrapped in a queuing sink so
/// callers never block on statsd I/O.
pub fn metrics_from_opts(
    label: &str,
    statsd_host: Option<&str>,
    statsd_port: Option<u16>,
) -> Result<Metrics, MetricError> {
    let client = match statsd_host {
        Some(host) => {
            let socket = UdpSocket::bind("0.0.0.0:0")?;
            socket.set_nonblocking(true)?;
            let sink = BufferedUdpMetricSink::from((host, statsd_port.unwrap_or(DEFAULT_PORT)), socket)?;
            let queuing = QueuingMetricSink::from(sink);
            Some(Arc::new(StatsdClient::from_sink(label, queuing)))
        }
        None => Some(Arc::new(StatsdClient::from_sink(label, NopMetricSink))),
    };
    Ok(Metrics {
        client,
        tags: Vec::new(),
    })
}

/// Adapts a set of tags for inclusion as structured fields on a `slog` log record.
/// Keys are `&'static str` since `slog::Key` itself is `&'static str`; tag names are
/// always known at compile time, only their values vary per call.
pub struct MetricTags(pub Vec<(&'static str, String)>);

impl KV for MetricTags {
    fn serialize(&self, _record: &slog::Record, serializer: &mut dyn slog::Serializer) -> slog::Result {
        for (k, v) in &self.0 {
            serializer.emit_str(k, v)?;
        }
        Ok(())
    }
}
