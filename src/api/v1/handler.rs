use super::error::*;
use crate::application_port::*;
use crate::domain_model::{AccessClaims, DeviceConnectionClaims, DeviceId, Jti, TokenClaims, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::{CancellationToken, DropGuard};
use warp::http::header::{AUTHORIZATION, SET_COOKIE};
use warp::{self, reject};

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<ApiError>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        ApiResponse {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(code: ApiErrorCode, message: impl Into<String>) -> Self {
        ApiResponse {
            success: false,
            data: None,
            error: Some(ApiError {
                code,
                message: message.into(),
            }),
        }
    }
}

/// Lives exactly as long as the request future. Dropping it (the client went
/// away, or the handler returned) cancels every registry call still bound to
/// its scope.
pub struct RequestContext {
    scope: RequestScope,
    _cancel_on_drop: DropGuard,
}

impl RequestContext {
    pub fn new(timeout: Duration) -> Self {
        let cancel = CancellationToken::new();
        Self {
            scope: RequestScope::new(cancel.child_token(), timeout),
            _cancel_on_drop: cancel.drop_guard(),
        }
    }

    pub fn scope(&self) -> &RequestScope {
        &self.scope
    }
}

pub const REFRESH_COOKIE: &str = "meshpoint_refresh";

#[derive(Debug, Clone, Copy)]
pub struct RefreshCookie {
    pub secure: bool,
    pub max_age: Duration,
}

impl RefreshCookie {
    const PATH: &'static str = "/api/v1/session";

    pub fn set(&self, token: &str) -> String {
        self.render(token, self.max_age.as_secs())
    }

    pub fn clear(&self) -> String {
        self.render("", 0)
    }

    fn render(&self, value: &str, max_age: u64) -> String {
        let mut cookie = format!(
            "{}={}; HttpOnly; SameSite=Lax; Path={}; Max-Age={}",
            REFRESH_COOKIE,
            value,
            Self::PATH,
            max_age
        );
        if self.secure {
            cookie.push_str("; Secure");
        }
        cookie
    }
}

#[derive(Debug, Deserialize)]
pub struct IssueSessionRequest {
    pub user_id: UserId,
    #[serde(default)]
    pub roles: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct SessionIssuedResponse {
    pub user_id: UserId,
    pub access_expires_at: DateTime<Utc>,
    pub refresh_expires_at: DateTime<Utc>,
}

/// Access token goes out in `Authorization`, refresh token in the cookie.
fn with_session_tokens<T: warp::Reply>(
    body: T,
    token_set: &UserTokenSet,
    cookie: RefreshCookie,
) -> impl warp::Reply + use<T> {
    let reply = warp::reply::with_header(
        body,
        AUTHORIZATION,
        format!("Bearer {}", token_set.access_token.0),
    );
    warp::reply::with_header(reply, SET_COOKIE, cookie.set(&token_set.refresh_token.0))
}

pub async fn issue_session(
    ctx: RequestContext,
    body: IssueSessionRequest,
    session_service: Arc<dyn SessionService>,
    cookie: RefreshCookie,
) -> Result<impl warp::Reply, warp::Rejection> {
    let token_set = session_service
        .issue_token_set(ctx.scope(), body.user_id, body.roles)
        .await
        .map_err(ApiErrorCode::from)
        .map_err(reject::custom)?;

    let response = SessionIssuedResponse {
        user_id: body.user_id,
        access_expires_at: token_set.access_expires_at,
        refresh_expires_at: token_set.refresh_expires_at,
    };
    let reply = warp::reply::json(&ApiResponse::ok(response));
    Ok(with_session_tokens(reply, &token_set, cookie))
}

#[derive(Debug, Serialize)]
pub struct UserIdentity {
    pub subject: UserId,
    pub roles: Vec<String>,
    pub jti: Jti,
    pub expires_at: DateTime<Utc>,
}

pub async fn current_session(
    _ctx: RequestContext,
    claims: AccessClaims,
) -> Result<impl warp::Reply, warp::Rejection> {
    let identity = UserIdentity {
        subject: claims.sub,
        expires_at: claims.expires_at(),
        roles: claims.roles,
        jti: claims.jti,
    };
    Ok(warp::reply::json(&ApiResponse::ok(identity)))
}

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub access_expires_at: DateTime<Utc>,
    pub refresh_expires_at: DateTime<Utc>,
}

pub async fn refresh_session(
    ctx: RequestContext,
    refresh_token: Option<String>,
    session_service: Arc<dyn SessionService>,
    cookie: RefreshCookie,
) -> Result<impl warp::Reply, warp::Rejection> {
    let refresh_token = refresh_token
        .filter(|t| !t.is_empty())
        .ok_or_else(|| reject::custom(ApiErrorCode::InvalidToken))?;

    let token_set = session_service
        .rotate_refresh_token(ctx.scope(), &refresh_token)
        .await
        .map_err(ApiErrorCode::from)
        .map_err(reject::custom)?;

    let response = RefreshResponse {
        access_expires_at: token_set.access_expires_at,
        refresh_expires_at: token_set.refresh_expires_at,
    };
    let reply = warp::reply::json(&ApiResponse::ok(response));
    Ok(with_session_tokens(reply, &token_set, cookie))
}

#[derive(Debug, Serialize)]
pub struct LogoutResponse;

pub async fn logout(
    ctx: RequestContext,
    claims: AccessClaims,
    refresh_token: Option<String>,
    session_service: Arc<dyn SessionService>,
    cookie: RefreshCookie,
) -> Result<impl warp::Reply, warp::Rejection> {
    session_service
        .logout(ctx.scope(), &claims, refresh_token.as_deref().filter(|t| !t.is_empty()))
        .await
        .map_err(ApiErrorCode::from)
        .map_err(reject::custom)?;

    let reply = warp::reply::json(&ApiResponse::ok(LogoutResponse));
    Ok(warp::reply::with_header(reply, SET_COOKIE, cookie.clear()))
}

#[derive(Debug, Deserialize)]
pub struct IssueDeviceSessionRequest {
    pub device_id: DeviceId,
}

pub async fn issue_device_session(
    ctx: RequestContext,
    body: IssueDeviceSessionRequest,
    device_session_service: Arc<dyn DeviceSessionService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let token_set = device_session_service
        .issue_token_set(ctx.scope(), body.device_id)
        .await
        .map_err(ApiErrorCode::from)
        .map_err(reject::custom)?;

    Ok(warp::reply::json(&ApiResponse::ok(token_set)))
}

#[derive(Debug, Serialize)]
pub struct DeviceIdentity {
    pub subject: DeviceId,
    pub jti: Jti,
    pub expires_at: DateTime<Utc>,
}

pub async fn current_device_session(
    _ctx: RequestContext,
    claims: DeviceConnectionClaims,
) -> Result<impl warp::Reply, warp::Rejection> {
    let identity = DeviceIdentity {
        subject: claims.sub,
        expires_at: claims.expires_at(),
        jti: claims.jti,
    };
    Ok(warp::reply::json(&ApiResponse::ok(identity)))
}

#[derive(Debug, Deserialize)]
pub struct DeviceRefreshRequest {
    pub connection_token: String,
    pub refresh_token: String,
}

pub async fn refresh_device_session(
    ctx: RequestContext,
    body: DeviceRefreshRequest,
    device_session_service: Arc<dyn DeviceSessionService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let token_set = device_session_service
        .rotate(ctx.scope(), &body.connection_token, &body.refresh_token)
        .await
        .map_err(ApiErrorCode::from)
        .map_err(reject::custom)?;

    Ok(warp::reply::json(&ApiResponse::ok(token_set)))
}

#[derive(Debug, Deserialize)]
pub struct DeviceLogoutRequest {
    #[serde(default)]
    pub refresh_token: Option<String>,
}

pub async fn logout_device(
    ctx: RequestContext,
    claims: DeviceConnectionClaims,
    body: DeviceLogoutRequest,
    device_session_service: Arc<dyn DeviceSessionService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    device_session_service
        .logout(ctx.scope(), &claims, body.refresh_token.as_deref())
        .await
        .map_err(ApiErrorCode::from)
        .map_err(reject::custom)?;

    Ok(warp::reply::json(&ApiResponse::ok(LogoutResponse)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refresh_cookie_attributes() {
        let cookie = RefreshCookie {
            secure: true,
            max_age: Duration::from_secs(600),
        };
        assert_eq!(
            cookie.set("abc"),
            "meshpoint_refresh=abc; HttpOnly; SameSite=Lax; Path=/api/v1/session; Max-Age=600; Secure"
        );
    }

    #[test]
    fn cleared_cookie_expires_immediately() {
        let cookie = RefreshCookie {
            secure: false,
            max_age: Duration::from_secs(600),
        };
        let cleared = cookie.clear();
        assert!(cleared.starts_with("meshpoint_refresh=;"));
        assert!(cleared.contains("Max-Age=0"));
        assert!(!cleared.contains("Secure"));
    }

    #[tokio::test]
    async fn dropping_the_context_cancels_its_scope() {
        let ctx = RequestContext::new(Duration::from_secs(5));
        let token = ctx.scope().cancellation_token().clone();
        assert!(!token.is_cancelled());
        drop(ctx);
        assert!(token.is_cancelled());
    }
}
