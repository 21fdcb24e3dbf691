use super::audit;
use super::{JtiLedger, JwtHs256Codec, Retirement};
use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::{RevocationRegistry, RoleDirectory};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct SessionTtls {
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
}

pub struct SessionIssuer {
    codec: Arc<JwtHs256Codec>,
    ledger: JtiLedger,
    role_directory: Arc<dyn RoleDirectory>,
    ttls: SessionTtls,
}

/// Unix expiry `ttl` after `now`. A TTL past chrono's range is a
/// configuration error, not a token that never expires.
pub(crate) fn expiry(now: DateTime<Utc>, ttl: Duration) -> Result<i64, SessionError> {
    chrono::Duration::from_std(ttl)
        .ok()
        .and_then(|ttl| now.checked_add_signed(ttl))
        .map(|exp| exp.timestamp())
        .ok_or_else(|| SessionError::InternalError(format!("token ttl out of range: {ttl:?}")))
}

impl SessionIssuer {
    pub fn new(
        codec: Arc<JwtHs256Codec>,
        registry: Arc<dyn RevocationRegistry>,
        role_directory: Arc<dyn RoleDirectory>,
        ttls: SessionTtls,
    ) -> Self {
        Self {
            codec,
            ledger: JtiLedger::new(registry),
            role_directory,
            ttls,
        }
    }

    fn mint(
        &self,
        user_id: UserId,
        roles: Vec<String>,
    ) -> Result<(UserTokenSet, AccessClaims, RefreshClaims), SessionError> {
        let now = Utc::now();
        let access = AccessClaims {
            sub: user_id,
            roles,
            jti: Jti::generate(),
            iat: now.timestamp(),
            exp: expiry(now, self.ttls.access_ttl)?,
        };
        let refresh = RefreshClaims {
            sub: user_id,
            jti: Jti::generate(),
            iat: now.timestamp(),
            exp: expiry(now, self.ttls.refresh_ttl)?,
        };
        let set = UserTokenSet {
            access_token: AccessToken(self.codec.sign(&access)?),
            refresh_token: RefreshToken(self.codec.sign(&refresh)?),
            access_token_jti: access.jti.clone(),
            refresh_token_jti: refresh.jti.clone(),
            access_expires_at: access.expires_at(),
            refresh_expires_at: refresh.expires_at(),
        };
        Ok((set, access, refresh))
    }
}

#[async_trait::async_trait]
impl SessionService for SessionIssuer {
    async fn issue_token_set(
        &self,
        scope: &RequestScope,
        user_id: UserId,
        roles: Vec<String>,
    ) -> Result<UserTokenSet, SessionError> {
        let (set, access, refresh) = self.mint(user_id, roles)?;

        self.ledger
            .record(scope, &access.jti, access.expires_at())
            .await?;
        self.ledger
            .record(scope, &refresh.jti, refresh.expires_at())
            .await?;

        debug!(%user_id, access_jti = %access.jti, refresh_jti = %refresh.jti, "issued session tokens");
        Ok(set)
    }

    async fn validate_access_token(
        &self,
        scope: &RequestScope,
        token: &str,
    ) -> Result<AccessClaims, SessionError> {
        let claims = self.codec.parse::<AccessClaims>(token)?;
        self.ledger.ensure_active(scope, &claims.jti).await?;
        Ok(claims)
    }

    async fn rotate_refresh_token(
        &self,
        scope: &RequestScope,
        refresh_token: &str,
    ) -> Result<UserTokenSet, SessionError> {
        let old = self.codec.parse::<RefreshClaims>(refresh_token)?;

        if let Err(e) = self.ledger.ensure_rotatable(scope, &old.jti).await {
            if let SessionError::ReuseDetected = e {
                audit::reuse_detected(RefreshClaims::KIND, &old.sub, &old.jti, refresh_token);
            }
            return Err(e);
        }

        let roles = self.role_directory.roles_for(old.sub).await?;
        let set = self.issue_token_set(scope, old.sub, roles).await?;

        match self.ledger.retire(scope, &old.jti, old.expires_at()).await {
            Retirement::Retired | Retirement::Deferred => {
                info!(user_id = %old.sub, old_jti = %old.jti, new_jti = %set.refresh_token_jti, "refresh token rotated");
                Ok(set)
            }
            Retirement::Raced => {
                audit::reuse_detected(RefreshClaims::KIND, &old.sub, &old.jti, refresh_token);
                self.ledger
                    .revoke_quietly(scope, &set.access_token_jti, set.access_expires_at)
                    .await;
                self.ledger
                    .revoke_quietly(scope, &set.refresh_token_jti, set.refresh_expires_at)
                    .await;
                Err(SessionError::ReuseDetected)
            }
        }
    }

    async fn revoke(
        &self,
        scope: &RequestScope,
        access_jti: &Jti,
        access_expires_at: DateTime<Utc>,
        refresh_jti: &Jti,
        refresh_expires_at: DateTime<Utc>,
    ) -> Result<(), SessionError> {
        self.ledger
            .revoke_pair(
                scope,
                (access_jti, access_expires_at),
                (refresh_jti, refresh_expires_at),
            )
            .await
    }

    async fn logout(
        &self,
        scope: &RequestScope,
        access: &AccessClaims,
        refresh_token: Option<&str>,
    ) -> Result<(), SessionError> {
        let refresh = match refresh_token.map(|t| (t, self.codec.parse::<RefreshClaims>(t))) {
            Some((_, Ok(refresh))) => Some(refresh),
            Some((token, Err(e))) => {
                debug!(user_id = %access.sub, error = %e, fingerprint = %audit::token_fingerprint(token), "refresh token not revocable at logout");
                None
            }
            None => None,
        };

        match refresh {
            Some(refresh) if refresh.sub != access.sub => {
                audit::subject_mismatch(
                    RefreshClaims::KIND,
                    &access.sub,
                    &refresh.sub,
                    refresh_token.unwrap_or_default(),
                );
                Err(SessionError::SubjectMismatch)
            }
            Some(refresh) => {
                self.revoke(
                    scope,
                    &access.jti,
                    access.expires_at(),
                    &refresh.jti,
                    refresh.expires_at(),
                )
                .await?;
                info!(user_id = %access.sub, "session revoked");
                Ok(())
            }
            None => {
                self.ledger
                    .revoke(scope, &access.jti, access.expires_at())
                    .await?;
                info!(user_id = %access.sub, "access token revoked");
                Ok(())
            }
        }
    }
}
