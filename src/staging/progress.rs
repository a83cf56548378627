use tracing::{debug, info};

/// Observer for transfer progress.
///
/// Invoked synchronously from whichever task performs the I/O, with no
/// thread affinity. Implementations must be cheap and must not block.
pub trait TransferListener: Send + Sync {
    fn on_started(&self, _key: &str, _bytes: u64) {}

    /// `transferred` is cumulative for this key.
    fn on_progress(&self, _key: &str, _transferred: u64, _total: u64) {}

    fn on_complete(&self, _key: &str, _total: u64) {}
}

/// Listener that ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopListener;

impl TransferListener for NoopListener {}

/// Listener that reports progress through `tracing`.
#[derive(Debug, Clone)]
pub struct LoggingListener {
    operation: &'static str,
    container: String,
}

impl LoggingListener {
    pub fn new(operation: &'static str, container: impl Into<String>) -> Self {
        Self {
            operation,
            container: container.into(),
        }
    }
}

impl TransferListener for LoggingListener {
    fn on_started(&self, key: &str, bytes: u64) {
        debug!(
            operation = self.operation,
            container = %self.container,
            key,
            bytes,
            "transfer started"
        );
    }

    fn on_progress(&self, key: &str, transferred: u64, total: u64) {
        debug!(
            operation = self.operation,
            container = %self.container,
            key,
            transferred,
            total,
            "transfer progress"
        );
    }

    fn on_complete(&self, key: &str, total: u64) {
        info!(
            operation = self.operation,
            container = %self.container,
            key,
            total,
            "transfer complete"
        );
    }
}
