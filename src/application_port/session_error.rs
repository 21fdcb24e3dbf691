use crate::domain_port::{RegistryError, RoleDirectoryError};

/// Failure taxonomy shared by the user and device session services.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("malformed token: {0}")]
    MalformedToken(String),
    #[error("token expired")]
    ExpiredToken,
    #[error("token revoked")]
    RevokedToken,
    #[error("token subjects do not match")]
    SubjectMismatch,
    #[error("refresh token reuse detected")]
    ReuseDetected,
    #[error("registry unavailable: {0}")]
    RegistryUnavailable(String),
    #[error("operation cancelled before completion")]
    Cancelled,
    #[error("internal error: {0}")]
    InternalError(String),
}

impl SessionError {
    /// True when validity could not be determined because of infrastructure.
    pub fn is_indeterminate(&self) -> bool {
        matches!(
            self,
            SessionError::RegistryUnavailable(_) | SessionError::Cancelled
        )
    }
}

impl From<RegistryError> for SessionError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::Cancelled => SessionError::Cancelled,
            RegistryError::TimedOut => SessionError::RegistryUnavailable("timed out".to_string()),
            RegistryError::Unavailable(e) => SessionError::RegistryUnavailable(e),
        }
    }
}

impl From<RoleDirectoryError> for SessionError {
    fn from(err: RoleDirectoryError) -> Self {
        match err {
            RoleDirectoryError::UserNotFound => SessionError::RevokedToken,
            RoleDirectoryError::Store(e) => SessionError::InternalError(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_failures_stay_indeterminate() {
        let timed_out: SessionError = RegistryError::TimedOut.into();
        let cancelled: SessionError = RegistryError::Cancelled.into();
        let down: SessionError = RegistryError::Unavailable("conn refused".into()).into();
        assert!(timed_out.is_indeterminate());
        assert!(matches!(cancelled, SessionError::Cancelled));
        assert!(matches!(down, SessionError::RegistryUnavailable(ref e) if e == "conn refused"));
        assert!(!SessionError::RevokedToken.is_indeterminate());
        assert!(!SessionError::ReuseDetected.is_indeterminate());
    }
}
