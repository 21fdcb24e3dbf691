use crate::application_port::SessionError;
use crate::domain_model::{TokenClaims, TokenKind};
use chrono::Utc;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use std::fmt;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("malformed token: {0}")]
    Malformed(String),
    #[error("token expired")]
    Expired,
    #[error("signing failed: {0}")]
    Signing(String),
}

impl From<CodecError> for SessionError {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::Malformed(e) => SessionError::MalformedToken(e),
            CodecError::Expired => SessionError::ExpiredToken,
            CodecError::Signing(e) => SessionError::InternalError(e),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CodecConfigError {
    #[error("empty signing secret for {0}")]
    EmptySecret(TokenKind),
    #[error("{0} and {1} share a signing secret")]
    SharedSecret(TokenKind, TokenKind),
}

/// One HS256 secret per token kind.
#[derive(Clone)]
pub struct TokenSecrets {
    pub user_access: Vec<u8>,
    pub user_refresh: Vec<u8>,
    pub device_connection: Vec<u8>,
    pub device_refresh: Vec<u8>,
}

impl TokenSecrets {
    fn get(&self, kind: TokenKind) -> &[u8] {
        match kind {
            TokenKind::UserAccess => &self.user_access,
            TokenKind::UserRefresh => &self.user_refresh,
            TokenKind::DeviceConnection => &self.device_connection,
            TokenKind::DeviceRefresh => &self.device_refresh,
        }
    }

    fn check(&self) -> Result<(), CodecConfigError> {
        for (i, a) in TokenKind::ALL.iter().enumerate() {
            if self.get(*a).is_empty() {
                return Err(CodecConfigError::EmptySecret(*a));
            }
            for b in &TokenKind::ALL[i + 1..] {
                if self.get(*a) == self.get(*b) {
                    return Err(CodecConfigError::SharedSecret(*a, *b));
                }
            }
        }
        Ok(())
    }
}

impl fmt::Debug for TokenSecrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("TokenSecrets([redacted])")
    }
}

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secrets: TokenSecrets,
    pub leeway: Duration,
}

struct KindKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl KindKeys {
    fn from_secret(secret: &[u8]) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
        }
    }
}

/// Stateless HS256 signer/verifier. Holds only immutable keys.
pub struct JwtHs256Codec {
    user_access: KindKeys,
    user_refresh: KindKeys,
    device_connection: KindKeys,
    device_refresh: KindKeys,
    leeway: Duration,
}

impl fmt::Debug for JwtHs256Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtHs256Codec")
            .field("leeway", &self.leeway)
            .finish_non_exhaustive()
    }
}

impl JwtHs256Codec {
    pub fn new(cfg: JwtConfig) -> Result<Self, CodecConfigError> {
        cfg.secrets.check()?;
        let s = &cfg.secrets;
        Ok(Self {
            user_access: KindKeys::from_secret(&s.user_access),
            user_refresh: KindKeys::from_secret(&s.user_refresh),
            device_connection: KindKeys::from_secret(&s.device_connection),
            device_refresh: KindKeys::from_secret(&s.device_refresh),
            leeway: cfg.leeway,
        })
    }

    pub fn leeway(&self) -> Duration {
        self.leeway
    }

    fn keys(&self, kind: TokenKind) -> &KindKeys {
        match kind {
            TokenKind::UserAccess => &self.user_access,
            TokenKind::UserRefresh => &self.user_refresh,
            TokenKind::DeviceConnection => &self.device_connection,
            TokenKind::DeviceRefresh => &self.device_refresh,
        }
    }

    pub fn sign<C: TokenClaims>(&self, claims: &C) -> Result<String, CodecError> {
        encode(
            &Header::new(Algorithm::HS256),
            claims,
            &self.keys(C::KIND).encoding,
        )
        .map_err(|e| CodecError::Signing(e.to_string()))
    }

    /// Verify signature, algorithm and timestamps (with leeway).
    pub fn parse<C: TokenClaims>(&self, token: &str) -> Result<C, CodecError> {
        self.decode(token, true)
    }

    /// Verify signature and algorithm only; expiry is not checked.
    pub fn parse_allow_expired<C: TokenClaims>(&self, token: &str) -> Result<C, CodecError> {
        self.decode(token, false)
    }

    /// Expiry check for claims obtained through [`Self::parse_allow_expired`].
    pub fn check_expiry<C: TokenClaims>(&self, claims: &C) -> Result<(), CodecError> {
        let now = Utc::now().timestamp();
        if claims.expires_at_unix() < now - self.leeway.as_secs() as i64 {
            return Err(CodecError::Expired);
        }
        Ok(())
    }

    fn decode<C: TokenClaims>(&self, token: &str, check_exp: bool) -> Result<C, CodecError> {
        let leeway = self.leeway.as_secs();
        let mut v = Validation::new(Algorithm::HS256);
        v.leeway = leeway;
        v.validate_exp = check_exp;
        v.validate_nbf = false;
        v.set_required_spec_claims(&["exp", "sub"]);

        let data = decode::<C>(token, &self.keys(C::KIND).decoding, &v).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => CodecError::Expired,
                _ => CodecError::Malformed(e.to_string()),
            }
        })?;

        let claims = data.claims;
        if claims.issued_at_unix() > Utc::now().timestamp() + leeway as i64 {
            return Err(CodecError::Malformed("issued in the future".to_string()));
        }
        Ok(claims)
    }
}
