use crate::domain_port::RegistryError;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Per-request bound on registry calls: a deadline plus a cancellation token.
#[derive(Debug, Clone)]
pub struct RequestScope {
    cancel: CancellationToken,
    timeout: Duration,
}

impl RequestScope {
    pub fn new(cancel: CancellationToken, timeout: Duration) -> Self {
        Self { cancel, timeout }
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self::new(CancellationToken::new(), timeout)
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Drive `fut` unless the scope is cancelled or the deadline passes first.
    pub async fn run<T, F>(&self, fut: F) -> Result<T, RegistryError>
    where
        F: Future<Output = Result<T, RegistryError>>,
    {
        if self.cancel.is_cancelled() {
            return Err(RegistryError::Cancelled);
        }
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(RegistryError::Cancelled),
            result = tokio::time::timeout(self.timeout, fut) => {
                result.unwrap_or(Err(RegistryError::TimedOut))
            }
        }
    }
}
