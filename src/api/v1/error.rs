use crate::api::v1::handler::ApiResponse;
use crate::application_port::*;
use serde::Serialize;
use std::convert::Infallible;
use thiserror::Error;
use tracing::error;
use warp::http::StatusCode;
use warp::{Rejection, reject};

pub async fn recover_error(err: Rejection) -> Result<impl warp::Reply, Infallible> {
    let code = if let Some(code) = err.find::<ApiErrorCode>() {
        code.clone()
    } else if err.find::<reject::MissingHeader>().is_some()
        || err.find::<reject::MissingCookie>().is_some()
    {
        ApiErrorCode::InvalidToken
    } else if err.find::<reject::InvalidHeader>().is_some()
        || err.find::<warp::filters::body::BodyDeserializeError>().is_some()
        || err.find::<reject::UnsupportedMediaType>().is_some()
    {
        ApiErrorCode::BadRequest
    } else if err.is_not_found() {
        ApiErrorCode::NotFound
    } else if err.find::<reject::MethodNotAllowed>().is_some() {
        ApiErrorCode::NotFound
    } else {
        error!("Unhandled rejection: {:?}", err);
        ApiErrorCode::InternalError
    };

    let json = warp::reply::json(&ApiResponse::<()>::err(code.clone(), code.to_string()));
    Ok(warp::reply::with_status(json, code.status()))
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub code: ApiErrorCode,
    pub message: String,
}

/// Deliberately coarse: a caller never learns which check failed.
#[derive(Debug, Clone, Error, Serialize, PartialEq, Eq)]
pub enum ApiErrorCode {
    #[error("Token is not valid")]
    InvalidToken,
    #[error("Caller is not allowed to issue tokens")]
    UntrustedCaller,
    #[error("Service temporarily unavailable")]
    ServiceUnavailable,
    #[error("Bad request")]
    BadRequest,
    #[error("Not found")]
    NotFound,
    #[error("Internal error")]
    InternalError,
}

impl ApiErrorCode {
    pub fn internal<E: std::fmt::Display>(error: E) -> ApiErrorCode {
        error!("Internal error: {}", error);
        ApiErrorCode::InternalError
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiErrorCode::InvalidToken => StatusCode::UNAUTHORIZED,
            ApiErrorCode::UntrustedCaller => StatusCode::FORBIDDEN,
            ApiErrorCode::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ApiErrorCode::BadRequest => StatusCode::BAD_REQUEST,
            ApiErrorCode::NotFound => StatusCode::NOT_FOUND,
            ApiErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl reject::Reject for ApiErrorCode {}

impl From<SessionError> for ApiErrorCode {
    fn from(error: SessionError) -> Self {
        match error {
            SessionError::MalformedToken(reason) => {
                tracing::debug!(%reason, "rejecting malformed token");
                ApiErrorCode::InvalidToken
            }
            SessionError::ExpiredToken
            | SessionError::RevokedToken
            | SessionError::SubjectMismatch
            | SessionError::ReuseDetected => ApiErrorCode::InvalidToken,
            SessionError::RegistryUnavailable(e) => {
                error!("Registry unavailable: {}", e);
                ApiErrorCode::ServiceUnavailable
            }
            SessionError::Cancelled => ApiErrorCode::ServiceUnavailable,
            SessionError::InternalError(e) => ApiErrorCode::internal(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn definite_rejections_are_unauthorized() {
        for err in [
            SessionError::MalformedToken("bad".into()),
            SessionError::ExpiredToken,
            SessionError::RevokedToken,
            SessionError::SubjectMismatch,
            SessionError::ReuseDetected,
        ] {
            let code = ApiErrorCode::from(err);
            assert_eq!(code, ApiErrorCode::InvalidToken);
            assert_eq!(code.status(), StatusCode::UNAUTHORIZED);
        }
    }

    #[test]
    fn indeterminate_failures_are_unavailable() {
        let code = ApiErrorCode::from(SessionError::RegistryUnavailable("down".into()));
        assert_eq!(code.status(), StatusCode::SERVICE_UNAVAILABLE);
        let code = ApiErrorCode::from(SessionError::Cancelled);
        assert_eq!(code.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn internal_failure_is_server_error() {
        let code = ApiErrorCode::from(SessionError::InternalError("boom".into()));
        assert_eq!(code.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
