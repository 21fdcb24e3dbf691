use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque token identifier, the sole key used for revocation bookkeeping.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Jti(pub String);

impl Jti {
    /// Mint a fresh identifier. Never reused.
    pub fn generate() -> Self {
        Jti(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Jti {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    UserAccess,
    UserRefresh,
    DeviceConnection,
    DeviceRefresh,
}

impl TokenKind {
    pub const ALL: [TokenKind; 4] = [
        TokenKind::UserAccess,
        TokenKind::UserRefresh,
        TokenKind::DeviceConnection,
        TokenKind::DeviceRefresh,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TokenKind::UserAccess => "user_access",
            TokenKind::UserRefresh => "user_refresh",
            TokenKind::DeviceConnection => "device_connection",
            TokenKind::DeviceRefresh => "device_refresh",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_jtis_are_unique() {
        let a = Jti::generate();
        let b = Jti::generate();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 36);
    }

    #[test]
    fn jti_serializes_as_plain_string() {
        let jti = Jti("abc".to_string());
        assert_eq!(serde_json::to_string(&jti).unwrap(), "\"abc\"");
    }
}
