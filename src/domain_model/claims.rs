use super::{DeviceId, Jti, TokenKind, UserId};
use chrono::{DateTime, TimeZone, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Claim set bound to exactly one token kind.
///
/// The kind selects the signing secret, so a claim type can only ever be
/// signed or verified with the key of its own kind.
pub trait TokenClaims: Serialize + DeserializeOwned + Send + Sync {
    const KIND: TokenKind;

    type Subject: Copy + Eq + Display;

    fn subject(&self) -> Self::Subject;
    fn jti(&self) -> &Jti;
    fn issued_at_unix(&self) -> i64;
    fn expires_at_unix(&self) -> i64;

    fn expires_at(&self) -> DateTime<Utc> {
        unix_to_utc(self.expires_at_unix())
    }
}

pub(crate) fn unix_to_utc(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0)
        .single()
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessClaims {
    pub sub: UserId,
    pub roles: Vec<String>,
    pub jti: Jti,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshClaims {
    pub sub: UserId,
    pub jti: Jti,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceConnectionClaims {
    pub sub: DeviceId,
    pub jti: Jti,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRefreshClaims {
    pub sub: DeviceId,
    pub jti: Jti,
    pub iat: i64,
    pub exp: i64,
}

macro_rules! impl_token_claims {
    ($claims:ty, $kind:expr, $subject:ty) => {
        impl TokenClaims for $claims {
            const KIND: TokenKind = $kind;

            type Subject = $subject;

            fn subject(&self) -> $subject {
                self.sub
            }

            fn jti(&self) -> &Jti {
                &self.jti
            }

            fn issued_at_unix(&self) -> i64 {
                self.iat
            }

            fn expires_at_unix(&self) -> i64 {
                self.exp
            }
        }
    };
}

impl_token_claims!(AccessClaims, TokenKind::UserAccess, UserId);
impl_token_claims!(RefreshClaims, TokenKind::UserRefresh, UserId);
impl_token_claims!(DeviceConnectionClaims, TokenKind::DeviceConnection, DeviceId);
impl_token_claims!(DeviceRefreshClaims, TokenKind::DeviceRefresh, DeviceId);
