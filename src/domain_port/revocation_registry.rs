use crate::domain_model::Jti;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;

/// Tri-state view of a JTI. `Unknown` is treated as revoked by every caller.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum JtiState {
    Unknown,
    Active,
    Revoked,
}

impl JtiState {
    pub fn is_revoked(&self) -> bool {
        !matches!(self, JtiState::Active)
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum RevokeOutcome {
    /// Was active, now revoked.
    Revoked,
    /// Was not tracked as active; a revoked marker was written anyway.
    RevokedUntracked,
    /// Already revoked, nothing changed.
    AlreadyRevoked,
}

#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Serialize)]
pub struct JtiStats {
    pub active_count: u64,
    pub revoked_count: u64,
    pub total_count: u64,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum RegistryError {
    #[error("registry unavailable: {0}")]
    Unavailable(String),
    #[error("registry call timed out")]
    TimedOut,
    #[error("registry call cancelled")]
    Cancelled,
}

/// TTL applied to both active and revoked records.
///
/// ttl = max(time until expiry, fallback) + clock skew buffer
#[derive(Debug, Clone, Copy)]
pub struct JtiTtlPolicy {
    pub fallback: Duration,
    pub clock_skew_buffer: Duration,
}

impl Default for JtiTtlPolicy {
    fn default() -> Self {
        Self {
            fallback: Duration::from_secs(60),
            clock_skew_buffer: Duration::from_secs(5 * 60),
        }
    }
}

impl JtiTtlPolicy {
    pub fn ttl_for(&self, expires_at: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
        let remaining = (expires_at - now).to_std().unwrap_or(Duration::ZERO);
        remaining.max(self.fallback) + self.clock_skew_buffer
    }
}

/// Durable, TTL-bounded bookkeeping of token identifiers.
///
/// Every call may fail independently with [`RegistryError`]; callers must
/// never read a failure as "not revoked".
#[async_trait::async_trait]
pub trait RevocationRegistry: Send + Sync {
    /// Mark `jti` active. Re-recording refreshes the TTL; a revoked JTI stays revoked.
    async fn record_jti(&self, jti: &Jti, expires_at: DateTime<Utc>) -> Result<(), RegistryError>;

    /// Atomically move `jti` to revoked and drop its active record.
    async fn revoke_jti(
        &self,
        jti: &Jti,
        expires_at: DateTime<Utc>,
    ) -> Result<RevokeOutcome, RegistryError>;

    /// Read the state of `jti` in a single atomic operation.
    async fn jti_state(&self, jti: &Jti) -> Result<JtiState, RegistryError>;

    async fn is_jti_revoked(&self, jti: &Jti) -> Result<bool, RegistryError> {
        Ok(self.jti_state(jti).await?.is_revoked())
    }

    /// Full scan. Not for the request path.
    async fn stats(&self) -> Result<JtiStats, RegistryError>;
}
