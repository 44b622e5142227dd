use async_trait::async_trait;
use qan_common::QanError;

use crate::log::LogBatch;

/// The external collaborator that accepts finished batches for export. Implementations
/// must tolerate concurrent calls from distinct scheduler workers; this crate makes no
/// ordering guarantee across instances (§5).
#[async_trait]
pub trait LogsSink: Send + Sync {
    async fn consume(&self, batch: LogBatch) -> Result<(), QanError>;
}

/// A sink that discards every batch. Useful for tests and for instances with no
/// configured export target.
pub struct NullSink;

#[async_trait]
impl LogsSink for NullSink {
    async fn consume(&self, _batch: LogBatch) -> Result<(), QanError> {
        Ok(())
    }
}
