use super::{JwtConfig, TokenSecrets};
use crate::application_port::RequestScope;
use crate::domain_model::Jti;
use crate::domain_port::*;
use chrono::{DateTime, Utc};
use std::time::Duration;

pub(crate) fn test_config() -> JwtConfig {
    JwtConfig {
        secrets: TokenSecrets {
            user_access: b"access-secret".to_vec(),
            user_refresh: b"refresh-secret".to_vec(),
            device_connection: b"device-connection-secret".to_vec(),
            device_refresh: b"device-refresh-secret".to_vec(),
        },
        leeway: Duration::from_secs(30),
    }
}

pub(crate) fn scope() -> RequestScope {
    RequestScope::with_timeout(Duration::from_secs(2))
}

pub(crate) fn short_scope() -> RequestScope {
    RequestScope::with_timeout(Duration::from_millis(20))
}

/// Every call fails as if the store were unreachable.
pub(crate) struct UnavailableRegistry;

#[async_trait::async_trait]
impl RevocationRegistry for UnavailableRegistry {
    async fn record_jti(&self, _: &Jti, _: DateTime<Utc>) -> Result<(), RegistryError> {
        Err(RegistryError::Unavailable("connection refused".to_string()))
    }

    async fn revoke_jti(&self, _: &Jti, _: DateTime<Utc>) -> Result<RevokeOutcome, RegistryError> {
        Err(RegistryError::Unavailable("connection refused".to_string()))
    }

    async fn jti_state(&self, _: &Jti) -> Result<JtiState, RegistryError> {
        Err(RegistryError::Unavailable("connection refused".to_string()))
    }

    async fn stats(&self) -> Result<JtiStats, RegistryError> {
        Err(RegistryError::Unavailable("connection refused".to_string()))
    }
}

/// Every call hangs until the caller gives up.
pub(crate) struct StalledRegistry;

#[async_trait::async_trait]
impl RevocationRegistry for StalledRegistry {
    async fn record_jti(&self, _: &Jti, _: DateTime<Utc>) -> Result<(), RegistryError> {
        std::future::pending().await
    }

    async fn revoke_jti(&self, _: &Jti, _: DateTime<Utc>) -> Result<RevokeOutcome, RegistryError> {
        std::future::pending().await
    }

    async fn jti_state(&self, _: &Jti) -> Result<JtiState, RegistryError> {
        std::future::pending().await
    }

    async fn stats(&self) -> Result<JtiStats, RegistryError> {
        std::future::pending().await
    }
}
