//! Security-event logging. Raw tokens never reach the log, only a short
//! SHA-256 fingerprint of them.

use crate::domain_model::{Jti, TokenKind};
use sha2::{Digest, Sha256};
use std::fmt::Display;
use tracing::warn;

pub(crate) fn token_fingerprint(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    hex::encode(&digest[..6])
}

pub(crate) fn reuse_detected(kind: TokenKind, subject: &dyn Display, jti: &Jti, token: &str) {
    warn!(
        target: "security",
        event = "refresh_reuse",
        %kind,
        %subject,
        %jti,
        fingerprint = %token_fingerprint(token),
        "rotated refresh token presented again"
    );
}

pub(crate) fn subject_mismatch(
    kind: TokenKind,
    expected: &dyn Display,
    presented: &dyn Display,
    token: &str,
) {
    warn!(
        target: "security",
        event = "subject_mismatch",
        %kind,
        %expected,
        %presented,
        fingerprint = %token_fingerprint(token),
        "paired tokens name different subjects"
    );
}
