//! Axum용 JWT 인증 추출기.

use std::sync::Arc;

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use tracing::debug;

use super::{decode_token, jwt::JwtError, Claims, Role};
use crate::error::ApiErrorResponse;
use crate::state::AppState;

/// 인증된 사용자 추출기.
///
/// ```rust,ignore
/// async fn me(JwtAuth(claims): JwtAuth) -> Json<Claims> {
///     Json(claims)
/// }
/// ```
#[derive(Debug, Clone)]
pub struct JwtAuth(pub Claims);

/// 인증 에러.
#[derive(Debug, thiserror::Error)]
pub enum JwtAuthError {
    #[error("인증 토큰이 필요합니다")]
    MissingToken,
    #[error("잘못된 Authorization 헤더 형식")]
    InvalidAuthHeader,
    #[error("토큰이 만료되었습니다")]
    TokenExpired,
    #[error("유효하지 않은 토큰")]
    InvalidToken,
    #[error("권한이 부족합니다")]
    InsufficientPermission,
}

impl JwtAuthError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            JwtAuthError::MissingToken => (StatusCode::UNAUTHORIZED, "MISSING_TOKEN"),
            JwtAuthError::InvalidAuthHeader => (StatusCode::UNAUTHORIZED, "INVALID_AUTH_HEADER"),
            JwtAuthError::TokenExpired => (StatusCode::UNAUTHORIZED, "TOKEN_EXPIRED"),
            JwtAuthError::InvalidToken => (StatusCode::UNAUTHORIZED, "INVALID_TOKEN"),
            JwtAuthError::InsufficientPermission => {
                (StatusCode::FORBIDDEN, "INSUFFICIENT_PERMISSION")
            }
        }
    }
}

impl IntoResponse for JwtAuthError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        (status, Json(ApiErrorResponse::simple(code, self.to_string()))).into_response()
    }
}

/// `Authorization: Bearer <token>` 헤더에서 토큰을 꺼냅니다.
fn bearer_token(parts: &Parts) -> Result<&str, JwtAuthError> {
    let header = parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or(JwtAuthError::MissingToken)?;

    header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(JwtAuthError::InvalidAuthHeader)
}

impl FromRequestParts<Arc<AppState>> for JwtAuth {
    type Rejection = JwtAuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?;

        let data = decode_token(token, &state.jwt_secret).map_err(|e| {
            debug!(error = %e, "JWT rejected");
            match e {
                JwtError::TokenExpired => JwtAuthError::TokenExpired,
                _ => JwtAuthError::InvalidToken,
            }
        })?;

        Ok(JwtAuth(data.claims))
    }
}

/// 요구 역할 이상인지 확인합니다.
pub fn require_role(required: Role, claims: &Claims) -> Result<(), JwtAuthError> {
    if claims.has_role(required) {
        Ok(())
    } else {
        Err(JwtAuthError::InsufficientPermission)
    }
}

/// 관리자 권한 추출기.
#[derive(Debug, Clone)]
pub struct AdminAuth(pub Claims);

impl FromRequestParts<Arc<AppState>> for AdminAuth {
    type Rejection = JwtAuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let JwtAuth(claims) = JwtAuth::from_request_parts(parts, state).await?;
        require_role(Role::Admin, &claims)?;
        Ok(AdminAuth(claims))
    }
}
