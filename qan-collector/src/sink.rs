use std::io::{self, Write};
use std::sync::Mutex;

use async_trait::async_trait;
use qan_common::QanError;
use qan_core::{LogBatch, LogsSink};

/// The default `LogsSink` (§10.6): one JSON line per batch on stdout. The real OTLP
/// exporter this would feed is the out-of-scope external collaborator from §1; this sink
/// exists so the collector is runnable and observable without one.
pub struct StdoutJsonSink {
    stdout: Mutex<io::Stdout>,
}

impl StdoutJsonSink {
    pub fn new() -> Self {
        Self {
            stdout: Mutex::new(io::stdout()),
        }
    }
}

impl Default for StdoutJsonSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LogsSink for StdoutJsonSink {
    async fn consume(&self, batch: LogBatch) -> Result<(), QanError> {
        if batch.is_empty() {
            return Ok(());
        }
        let line = serde_json::to_string(&batch)
            .map_err(|e| QanError::sink(format!("failed to serialize log batch: {}", e)))?;

        let mut stdout = self
            .stdout
            .lock()
            .map_err(|_| QanError::sink("stdout sink lock poisoned"))?;
        writeln!(stdout, "{}", line)
            .map_err(|e| QanError::sink(format!("failed to write log batch: {}", e)))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use qan_core::{Family, LogBuilder};

    #[tokio::test]
    async fn empty_batch_is_a_noop() {
        let sink = StdoutJsonSink::new();
        let batch = LogBuilder::build(Family::Mysql, "mysql://localhost/db", &[]);
        assert!(sink.consume(batch).await.is_ok());
    }
}
