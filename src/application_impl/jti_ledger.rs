use crate::application_port::{RequestScope, SessionError};
use crate::domain_model::Jti;
use crate::domain_port::{JtiState, RevocationRegistry, RevokeOutcome};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, warn};

/// What happened to the predecessor of a rotation.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Retirement {
    Retired,
    /// Another rotation revoked it first.
    Raced,
    /// The revoke did not complete; the old token stays live until expiry.
    Deferred,
}

/// Registry access shared by the user and device issuers. Every call runs
/// inside the caller's [`RequestScope`].
#[derive(Clone)]
pub struct JtiLedger {
    registry: Arc<dyn RevocationRegistry>,
}

impl JtiLedger {
    pub fn new(registry: Arc<dyn RevocationRegistry>) -> Self {
        Self { registry }
    }

    pub async fn record(
        &self,
        scope: &RequestScope,
        jti: &Jti,
        expires_at: DateTime<Utc>,
    ) -> Result<(), SessionError> {
        scope
            .run(self.registry.record_jti(jti, expires_at))
            .await
            .map_err(SessionError::from)
    }

    pub async fn state(&self, scope: &RequestScope, jti: &Jti) -> Result<JtiState, SessionError> {
        scope
            .run(self.registry.jti_state(jti))
            .await
            .map_err(SessionError::from)
    }

    /// Fail closed: only an `Active` record passes.
    pub async fn ensure_active(&self, scope: &RequestScope, jti: &Jti) -> Result<(), SessionError> {
        match self.state(scope, jti).await? {
            JtiState::Active => Ok(()),
            state => {
                debug!(%jti, ?state, "jti not active");
                Err(SessionError::RevokedToken)
            }
        }
    }

    /// Like [`Self::ensure_active`] but an explicitly revoked JTI means the
    /// token was already rotated away.
    pub async fn ensure_rotatable(
        &self,
        scope: &RequestScope,
        jti: &Jti,
    ) -> Result<(), SessionError> {
        match self.state(scope, jti).await? {
            JtiState::Active => Ok(()),
            JtiState::Revoked => Err(SessionError::ReuseDetected),
            JtiState::Unknown => Err(SessionError::RevokedToken),
        }
    }

    pub async fn revoke(
        &self,
        scope: &RequestScope,
        jti: &Jti,
        expires_at: DateTime<Utc>,
    ) -> Result<RevokeOutcome, SessionError> {
        scope
            .run(self.registry.revoke_jti(jti, expires_at))
            .await
            .map_err(SessionError::from)
    }

    /// Revoke both, attempting the second even when the first fails.
    pub async fn revoke_pair(
        &self,
        scope: &RequestScope,
        first: (&Jti, DateTime<Utc>),
        second: (&Jti, DateTime<Utc>),
    ) -> Result<(), SessionError> {
        let a = self.revoke(scope, first.0, first.1).await;
        let b = self.revoke(scope, second.0, second.1).await;
        a?;
        b?;
        Ok(())
    }

    /// Revoke without surfacing failures.
    pub async fn revoke_quietly(&self, scope: &RequestScope, jti: &Jti, expires_at: DateTime<Utc>) {
        if let Err(e) = self.revoke(scope, jti, expires_at).await {
            warn!(%jti, error = %e, "best-effort revoke failed");
        }
    }

    /// Revoke the predecessor of a rotation once its successor is recorded.
    pub async fn retire(
        &self,
        scope: &RequestScope,
        jti: &Jti,
        expires_at: DateTime<Utc>,
    ) -> Retirement {
        match self.revoke(scope, jti, expires_at).await {
            Ok(RevokeOutcome::Revoked) | Ok(RevokeOutcome::RevokedUntracked) => {
                Retirement::Retired
            }
            Ok(RevokeOutcome::AlreadyRevoked) => Retirement::Raced,
            Err(e) => {
                warn!(%jti, error = %e, "rotated token not revoked, retry later");
                Retirement::Deferred
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra_memory::MemoryRevocationRegistry;
    use std::time::Duration;

    fn scope() -> RequestScope {
        RequestScope::with_timeout(Duration::from_secs(1))
    }

    fn ledger() -> (JtiLedger, Arc<MemoryRevocationRegistry>) {
        let registry = Arc::new(MemoryRevocationRegistry::default());
        (JtiLedger::new(registry.clone()), registry)
    }

    #[tokio::test]
    async fn unknown_jti_is_rejected() {
        let (ledger, _) = ledger();
        let jti = Jti::generate();
        assert!(matches!(
            ledger.ensure_active(&scope(), &jti).await,
            Err(SessionError::RevokedToken)
        ));
        assert!(matches!(
            ledger.ensure_rotatable(&scope(), &jti).await,
            Err(SessionError::RevokedToken)
        ));
    }

    #[tokio::test]
    async fn revoked_jti_is_reuse_on_rotation() {
        let (ledger, _) = ledger();
        let jti = Jti::generate();
        let exp = Utc::now() + chrono::Duration::hours(1);
        ledger.record(&scope(), &jti, exp).await.unwrap();
        ledger.ensure_rotatable(&scope(), &jti).await.unwrap();

        assert_eq!(ledger.retire(&scope(), &jti, exp).await, Retirement::Retired);
        assert!(matches!(
            ledger.ensure_rotatable(&scope(), &jti).await,
            Err(SessionError::ReuseDetected)
        ));
        assert_eq!(ledger.retire(&scope(), &jti, exp).await, Retirement::Raced);
    }

    #[tokio::test]
    async fn cancelled_scope_never_reads_as_valid() {
        let (ledger, _) = ledger();
        let jti = Jti::generate();
        let exp = Utc::now() + chrono::Duration::hours(1);
        ledger.record(&scope(), &jti, exp).await.unwrap();

        let cancelled = scope();
        cancelled.cancellation_token().cancel();
        assert!(matches!(
            ledger.ensure_active(&cancelled, &jti).await,
            Err(SessionError::Cancelled)
        ));
        assert_eq!(ledger.retire(&cancelled, &jti, exp).await, Retirement::Deferred);
        ledger.ensure_active(&scope(), &jti).await.unwrap();
    }
}
