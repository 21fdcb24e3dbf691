use super::{RequestScope, SessionError};
use crate::domain_model::{DeviceConnectionClaims, DeviceId, Jti};
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct ConnectionToken(pub String);

#[derive(Debug, Clone, Serialize)]
pub struct DeviceRefreshToken(pub String);

#[derive(Debug, Clone, Serialize)]
pub struct DeviceTokenSet {
    pub connection_token: ConnectionToken,
    pub refresh_token: DeviceRefreshToken,
    pub connection_token_jti: Jti,
    pub refresh_token_jti: Jti,
    pub connection_expires_at: DateTime<Utc>,
    pub refresh_expires_at: DateTime<Utc>,
}

#[async_trait::async_trait]
pub trait DeviceSessionService: Send + Sync {
    async fn issue_token_set(
        &self,
        scope: &RequestScope,
        device_id: DeviceId,
    ) -> Result<DeviceTokenSet, SessionError>;

    async fn validate_connection_token(
        &self,
        scope: &RequestScope,
        token: &str,
    ) -> Result<DeviceConnectionClaims, SessionError>;

    /// The connection token may be expired but must be authentic and name
    /// the same device as the refresh token.
    async fn rotate(
        &self,
        scope: &RequestScope,
        connection_token: &str,
        refresh_token: &str,
    ) -> Result<DeviceTokenSet, SessionError>;

    async fn revoke(
        &self,
        scope: &RequestScope,
        connection_jti: &Jti,
        connection_expires_at: DateTime<Utc>,
        refresh_jti: &Jti,
        refresh_expires_at: DateTime<Utc>,
    ) -> Result<(), SessionError>;

    /// Revoke the session behind an already-validated connection token.
    async fn logout(
        &self,
        scope: &RequestScope,
        connection: &DeviceConnectionClaims,
        refresh_token: Option<&str>,
    ) -> Result<(), SessionError>;
}
