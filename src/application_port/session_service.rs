use super::{RequestScope, SessionError};
use crate::domain_model::{AccessClaims, Jti, UserId};
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct AccessToken(pub String);

#[derive(Debug, Clone, Serialize)]
pub struct RefreshToken(pub String);

/// Handed to the caller once, never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct UserTokenSet {
    pub access_token: AccessToken,
    pub refresh_token: RefreshToken,
    pub access_token_jti: Jti,
    pub refresh_token_jti: Jti,
    pub access_expires_at: DateTime<Utc>,
    pub refresh_expires_at: DateTime<Utc>,
}

#[async_trait::async_trait]
pub trait SessionService: Send + Sync {
    /// Sign an access/refresh pair. Both JTIs are recorded before returning.
    async fn issue_token_set(
        &self,
        scope: &RequestScope,
        user_id: UserId,
        roles: Vec<String>,
    ) -> Result<UserTokenSet, SessionError>;

    async fn validate_access_token(
        &self,
        scope: &RequestScope,
        token: &str,
    ) -> Result<AccessClaims, SessionError>;

    /// Exchange a live refresh token for a new set and revoke the presented one.
    async fn rotate_refresh_token(
        &self,
        scope: &RequestScope,
        refresh_token: &str,
    ) -> Result<UserTokenSet, SessionError>;

    async fn revoke(
        &self,
        scope: &RequestScope,
        access_jti: &Jti,
        access_expires_at: DateTime<Utc>,
        refresh_jti: &Jti,
        refresh_expires_at: DateTime<Utc>,
    ) -> Result<(), SessionError>;

    /// Revoke the session behind an already-validated access token.
    async fn logout(
        &self,
        scope: &RequestScope,
        access: &AccessClaims,
        refresh_token: Option<&str>,
    ) -> Result<(), SessionError>;
}
