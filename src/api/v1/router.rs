use super::error::*;
use super::handler::{self, REFRESH_COOKIE, RefreshCookie, RequestContext};
use crate::application_port::*;
use crate::domain_model::{AccessClaims, DeviceConnectionClaims};
use crate::server::*;
use sha2::{Digest, Sha256};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use warp::{Filter, http, reject};

const MAX_BODY_BYTES: u64 = 16 * 1024;

pub const SERVICE_KEY_HEADER: &str = "x-service-key";

pub fn routes(
    server: Arc<Server>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    let timeout = server.request_timeout;
    let cookie = RefreshCookie {
        secure: server.secure_cookies,
        max_age: server.refresh_ttl,
    };

    let service_key = Arc::new(Sha256::digest(server.service_key.expose().as_bytes()).to_vec());

    let issue_session = warp::post()
        .and(warp::path("session"))
        .and(warp::path::end())
        .and(with_trusted_caller(service_key.clone()))
        .and(with_request_context(timeout))
        .and(warp::body::content_length_limit(MAX_BODY_BYTES))
        .and(warp::body::json())
        .and(with(server.session_service.clone()))
        .and(with_value(cookie))
        .and_then(handler::issue_session);

    let session = warp::get()
        .and(warp::path("session"))
        .and(warp::path::end())
        .and(with_user_identity(server.session_service.clone(), timeout))
        .and_then(handler::current_session);

    let refresh = warp::post()
        .and(warp::path!("session" / "refresh"))
        .and(with_request_context(timeout))
        .and(warp::cookie::optional::<String>(REFRESH_COOKIE))
        .and(with(server.session_service.clone()))
        .and(with_value(cookie))
        .and_then(handler::refresh_session);

    let logout = warp::post()
        .and(warp::path!("session" / "logout"))
        .and(with_user_identity(server.session_service.clone(), timeout))
        .and(warp::cookie::optional::<String>(REFRESH_COOKIE))
        .and(with(server.session_service.clone()))
        .and(with_value(cookie))
        .and_then(handler::logout);

    let issue_device_session = warp::post()
        .and(warp::path!("device" / "session"))
        .and(with_trusted_caller(service_key))
        .and(with_request_context(timeout))
        .and(warp::body::content_length_limit(MAX_BODY_BYTES))
        .and(warp::body::json())
        .and(with(server.device_session_service.clone()))
        .and_then(handler::issue_device_session);

    let device_session = warp::get()
        .and(warp::path!("device" / "session"))
        .and(with_device_identity(
            server.device_session_service.clone(),
            timeout,
        ))
        .and_then(handler::current_device_session);

    let device_refresh = warp::post()
        .and(warp::path!("device" / "refresh"))
        .and(with_request_context(timeout))
        .and(warp::body::content_length_limit(MAX_BODY_BYTES))
        .and(warp::body::json())
        .and(with(server.device_session_service.clone()))
        .and_then(handler::refresh_device_session);

    let device_logout = warp::post()
        .and(warp::path!("device" / "logout"))
        .and(with_device_identity(
            server.device_session_service.clone(),
            timeout,
        ))
        .and(warp::body::content_length_limit(MAX_BODY_BYTES))
        .and(warp::body::json())
        .and(with(server.device_session_service.clone()))
        .and_then(handler::logout_device);

    issue_session
        .or(session)
        .or(refresh)
        .or(logout)
        .or(issue_device_session)
        .or(device_session)
        .or(device_refresh)
        .or(device_logout)
}

fn with<ServiceType>(
    service: Arc<ServiceType>,
) -> impl Filter<Extract = (Arc<ServiceType>,), Error = Infallible> + Clone
where
    ServiceType: Send + Sync + ?Sized,
{
    warp::any().map(move || service.clone())
}

fn with_value<T>(value: T) -> impl Filter<Extract = (T,), Error = Infallible> + Clone
where
    T: Clone + Send + Sync,
{
    warp::any().map(move || value.clone())
}

fn with_request_context(
    timeout: Duration,
) -> impl Filter<Extract = (RequestContext,), Error = Infallible> + Clone {
    warp::any().map(move || RequestContext::new(timeout))
}

fn bearer_token() -> impl Filter<Extract = (String,), Error = warp::Rejection> + Clone {
    warp::header::optional::<String>(http::header::AUTHORIZATION.as_ref()).and_then(
        |header: Option<String>| async move {
            match header.as_deref().and_then(|h| h.strip_prefix("Bearer ")) {
                Some(token) if !token.is_empty() => Ok(token.to_owned()),
                _ => Err(reject::custom(ApiErrorCode::InvalidToken)),
            }
        },
    )
}

/// Issuance is only for upstream services that already authenticated the
/// subject; they prove it with the shared service key.
fn with_trusted_caller(
    expected_digest: Arc<Vec<u8>>,
) -> impl Filter<Extract = (), Error = warp::Rejection> + Clone {
    warp::header::optional::<String>(SERVICE_KEY_HEADER)
        .and_then(move |presented: Option<String>| {
            let expected_digest = expected_digest.clone();
            async move {
                let trusted = presented
                    .map(|key| Sha256::digest(key.as_bytes())[..] == expected_digest[..])
                    .unwrap_or(false);
                if trusted {
                    Ok(())
                } else {
                    tracing::warn!(target: "security", event = "untrusted_issuer", "issuance requested without a valid service key");
                    Err(reject::custom(ApiErrorCode::UntrustedCaller))
                }
            }
        })
        .untuple_one()
}

/// Authorization gate for users: bearer access token in, identity out.
fn with_user_identity(
    session_service: Arc<dyn SessionService>,
    timeout: Duration,
) -> impl Filter<Extract = (RequestContext, AccessClaims), Error = warp::Rejection> + Clone {
    with_request_context(timeout)
        .and(bearer_token())
        .and_then(move |ctx: RequestContext, token: String| {
            let session_service = session_service.clone();
            async move {
                let claims = session_service
                    .validate_access_token(ctx.scope(), &token)
                    .await
                    .map_err(ApiErrorCode::from)
                    .map_err(reject::custom)?;
                Ok::<_, warp::Rejection>((ctx, claims))
            }
        })
        .untuple_one()
}

/// Authorization gate for devices.
fn with_device_identity(
    device_session_service: Arc<dyn DeviceSessionService>,
    timeout: Duration,
) -> impl Filter<Extract = (RequestContext, DeviceConnectionClaims), Error = warp::Rejection> + Clone
{
    with_request_context(timeout)
        .and(bearer_token())
        .and_then(move |ctx: RequestContext, token: String| {
            let device_session_service = device_session_service.clone();
            async move {
                let claims = device_session_service
                    .validate_connection_token(ctx.scope(), &token)
                    .await
                    .map_err(ApiErrorCode::from)
                    .map_err(reject::custom)?;
                Ok::<_, warp::Rejection>((ctx, claims))
            }
        })
        .untuple_one()
}
