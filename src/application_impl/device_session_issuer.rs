use super::audit;
use super::session_issuer::expiry;
use super::{JtiLedger, JwtHs256Codec, Retirement};
use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::RevocationRegistry;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct DeviceTtls {
    pub connection_ttl: Duration,
    pub refresh_ttl: Duration,
}

pub struct DeviceSessionIssuer {
    codec: Arc<JwtHs256Codec>,
    ledger: JtiLedger,
    ttls: DeviceTtls,
}

impl DeviceSessionIssuer {
    pub fn new(
        codec: Arc<JwtHs256Codec>,
        registry: Arc<dyn RevocationRegistry>,
        ttls: DeviceTtls,
    ) -> Self {
        Self {
            codec,
            ledger: JtiLedger::new(registry),
            ttls,
        }
    }

    fn mint(&self, device_id: DeviceId) -> Result<DeviceTokenSet, SessionError> {
        let now = Utc::now();
        let iat = now.timestamp();
        let connection = DeviceConnectionClaims {
            sub: device_id,
            jti: Jti::generate(),
            iat,
            exp: expiry(now, self.ttls.connection_ttl)?,
        };
        let refresh = DeviceRefreshClaims {
            sub: device_id,
            jti: Jti::generate(),
            iat,
            exp: expiry(now, self.ttls.refresh_ttl)?,
        };
        Ok(DeviceTokenSet {
            connection_token: ConnectionToken(self.codec.sign(&connection)?),
            refresh_token: DeviceRefreshToken(self.codec.sign(&refresh)?),
            connection_expires_at: connection.expires_at(),
            refresh_expires_at: refresh.expires_at(),
            connection_token_jti: connection.jti,
            refresh_token_jti: refresh.jti,
        })
    }

    /// Both tokens must be authentic and name the same device. Expiry is
    /// checked afterwards, so a mismatched pair is always reported as such.
    fn parse_pair(
        &self,
        connection_token: &str,
        refresh_token: &str,
    ) -> Result<(DeviceConnectionClaims, DeviceRefreshClaims), SessionError> {
        let refresh = self
            .codec
            .parse_allow_expired::<DeviceRefreshClaims>(refresh_token)?;
        let connection = self
            .codec
            .parse_allow_expired::<DeviceConnectionClaims>(connection_token)?;

        if connection.sub != refresh.sub {
            audit::subject_mismatch(
                DeviceRefreshClaims::KIND,
                &connection.sub,
                &refresh.sub,
                refresh_token,
            );
            return Err(SessionError::SubjectMismatch);
        }

        self.codec.check_expiry(&refresh)?;
        Ok((connection, refresh))
    }
}

#[async_trait::async_trait]
impl DeviceSessionService for DeviceSessionIssuer {
    async fn issue_token_set(
        &self,
        scope: &RequestScope,
        device_id: DeviceId,
    ) -> Result<DeviceTokenSet, SessionError> {
        let set = self.mint(device_id)?;
        self.ledger
            .record(scope, &set.connection_token_jti, set.connection_expires_at)
            .await?;
        self.ledger
            .record(scope, &set.refresh_token_jti, set.refresh_expires_at)
            .await?;

        debug!(%device_id, connection_jti = %set.connection_token_jti, "issued device tokens");
        Ok(set)
    }

    async fn validate_connection_token(
        &self,
        scope: &RequestScope,
        token: &str,
    ) -> Result<DeviceConnectionClaims, SessionError> {
        let claims = self.codec.parse::<DeviceConnectionClaims>(token)?;
        self.ledger.ensure_active(scope, &claims.jti).await?;
        Ok(claims)
    }

    async fn rotate(
        &self,
        scope: &RequestScope,
        connection_token: &str,
        refresh_token: &str,
    ) -> Result<DeviceTokenSet, SessionError> {
        let (old_connection, old_refresh) = self.parse_pair(connection_token, refresh_token)?;
        let device_id = old_refresh.sub;

        if let Err(e) = self.ledger.ensure_rotatable(scope, &old_refresh.jti).await {
            if let SessionError::ReuseDetected = e {
                audit::reuse_detected(
                    DeviceRefreshClaims::KIND,
                    &device_id,
                    &old_refresh.jti,
                    refresh_token,
                );
            }
            return Err(e);
        }

        let set = self.issue_token_set(scope, device_id).await?;

        match self
            .ledger
            .retire(scope, &old_refresh.jti, old_refresh.expires_at())
            .await
        {
            Retirement::Retired | Retirement::Deferred => {}
            Retirement::Raced => {
                audit::reuse_detected(
                    DeviceRefreshClaims::KIND,
                    &device_id,
                    &old_refresh.jti,
                    refresh_token,
                );
                self.ledger
                    .revoke_quietly(scope, &set.connection_token_jti, set.connection_expires_at)
                    .await;
                self.ledger
                    .revoke_quietly(scope, &set.refresh_token_jti, set.refresh_expires_at)
                    .await;
                return Err(SessionError::ReuseDetected);
            }
        }

        self.ledger
            .revoke_quietly(scope, &old_connection.jti, old_connection.expires_at())
            .await;

        info!(%device_id, old_jti = %old_refresh.jti, new_jti = %set.refresh_token_jti, "device tokens rotated");
        Ok(set)
    }

    async fn revoke(
        &self,
        scope: &RequestScope,
        connection_jti: &Jti,
        connection_expires_at: DateTime<Utc>,
        refresh_jti: &Jti,
        refresh_expires_at: DateTime<Utc>,
    ) -> Result<(), SessionError> {
        self.ledger
            .revoke_pair(
                scope,
                (connection_jti, connection_expires_at),
                (refresh_jti, refresh_expires_at),
            )
            .await
    }

    async fn logout(
        &self,
        scope: &RequestScope,
        connection: &DeviceConnectionClaims,
        refresh_token: Option<&str>,
    ) -> Result<(), SessionError> {
        let refresh = match refresh_token {
            Some(token) => match self.codec.parse::<DeviceRefreshClaims>(token) {
                Ok(refresh) => Some((token, refresh)),
                Err(e) => {
                    debug!(device_id = %connection.sub, error = %e, fingerprint = %audit::token_fingerprint(token), "device refresh token not revocable at logout");
                    None
                }
            },
            None => None,
        };

        match refresh {
            Some((token, refresh)) if refresh.sub != connection.sub => {
                audit::subject_mismatch(
                    DeviceRefreshClaims::KIND,
                    &connection.sub,
                    &refresh.sub,
                    token,
                );
                Err(SessionError::SubjectMismatch)
            }
            Some((_, refresh)) => {
                self.revoke(
                    scope,
                    &connection.jti,
                    connection.expires_at(),
                    &refresh.jti,
                    refresh.expires_at(),
                )
                .await?;
                info!(device_id = %connection.sub, "device session revoked");
                Ok(())
            }
            None => {
                self.ledger
                    .revoke(scope, &connection.jti, connection.expires_at())
                    .await?;
                info!(device_id = %connection.sub, "device connection token revoked");
                Ok(())
            }
        }
    }
}
