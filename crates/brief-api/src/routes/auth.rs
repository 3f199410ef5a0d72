//! 인증 API.
//!
//! # 엔드포인트
//!
//! - `POST /api/v1/auth/register` - 회원가입 (첫 사용자는 관리자)
//! - `POST /api/v1/auth/login` - 로그인
//! - `POST /api/v1/auth/refresh` - Refresh Token으로 토큰 재발급
//! - `GET /api/v1/auth/me` - 현재 토큰의 사용자 정보

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use brief_data::DataError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::auth::{
    create_token_pair, decode_refresh_token, hash_password, validate_password_strength,
    verify_password, Claims, JwtAuth, Role, TokenPair,
};
use crate::error::{ApiError, ApiErrorResponse, ApiResult};
use crate::repository::{User, UserStore};
use crate::state::AppState;

const INVALID_CREDENTIALS: &str = "이메일 또는 비밀번호가 올바르지 않습니다";

fn validate_password(password: &str) -> Result<(), ValidationError> {
    validate_password_strength(password)
        .map_err(|msg| ValidationError::new("weak_password").with_message(msg.into()))
}

/// 가입/로그인 요청.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct AuthRequest {
    #[validate(email(message = "올바른 이메일 형식이 아닙니다"))]
    pub email: String,
    #[validate(custom(function = "validate_password"))]
    pub password: String,
}

/// 로그인 요청. 비밀번호 규칙은 가입 시에만 검사합니다.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "이메일이 필요합니다"))]
    pub email: String,
    #[validate(length(min = 1, message = "비밀번호가 필요합니다"))]
    pub password: String,
}

/// 토큰 재발급 요청.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// 현재 사용자 응답.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MeResponse {
    pub user_id: String,
    pub email: String,
    pub role: Role,
    /// 토큰 만료 시각 (Unix timestamp)
    pub expires_at: i64,
}

impl From<Claims> for MeResponse {
    fn from(claims: Claims) -> Self {
        Self {
            user_id: claims.sub,
            email: claims.email,
            role: claims.role,
            expires_at: claims.exp,
        }
    }
}

fn issue_tokens(state: &AppState, user: &User) -> ApiResult<TokenPair> {
    create_token_pair(
        &user.id.to_string(),
        &user.email,
        user.role,
        &state.jwt_secret,
        state.config.auth.access_token_minutes,
        state.config.auth.refresh_token_days,
    )
    .map_err(|e| {
        warn!(error = %e, "Token issue failed");
        ApiError::internal("토큰 발급에 실패했습니다")
    })
}

/// 회원가입.
#[utoipa::path(
    post,
    path = "/api/v1/auth/register",
    request_body = AuthRequest,
    responses(
        (status = 200, description = "가입 성공", body = TokenPair),
        (status = 400, description = "잘못된 이메일 또는 약한 비밀번호", body = ApiErrorResponse),
        (status = 409, description = "이미 가입된 이메일", body = ApiErrorResponse)
    ),
    tag = "auth"
)]
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(request): Json<AuthRequest>,
) -> ApiResult<Json<TokenPair>> {
    request.validate()?;

    let role = if state.user_store.count().await? == 0 {
        Role::Admin
    } else {
        Role::User
    };
    let password_hash = hash_password(&request.password).map_err(|e| {
        warn!(error = %e, "Password hashing failed");
        ApiError::internal("비밀번호 처리 중 오류가 발생했습니다")
    })?;

    let user = match state
        .user_store
        .create(&User::new(&request.email, password_hash, role))
        .await
    {
        Ok(user) => user,
        Err(DataError::DuplicateError(_)) => {
            return Err(ApiError::conflict("이미 가입된 이메일입니다"))
        }
        Err(e) => return Err(e.into()),
    };

    info!(user_id = %user.id, role = %user.role, "User registered");
    Ok(Json(issue_tokens(&state, &user)?))
}

/// 로그인.
#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "로그인 성공", body = TokenPair),
        (status = 401, description = "잘못된 자격 증명", body = ApiErrorResponse)
    ),
    tag = "auth"
)]
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LoginRequest>,
) -> ApiResult<Json<TokenPair>> {
    request.validate()?;

    let user = state
        .user_store
        .find_by_email(&request.email)
        .await?
        .ok_or_else(|| ApiError::unauthorized(INVALID_CREDENTIALS))?;

    if verify_password(&request.password, &user.password_hash).is_err() {
        warn!(user_id = %user.id, "Login rejected");
        return Err(ApiError::unauthorized(INVALID_CREDENTIALS));
    }

    info!(user_id = %user.id, "User logged in");
    Ok(Json(issue_tokens(&state, &user)?))
}

/// Refresh Token으로 토큰 쌍을 다시 발급합니다.
#[utoipa::path(
    post,
    path = "/api/v1/auth/refresh",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "재발급 성공", body = TokenPair),
        (status = 401, description = "유효하지 않은 Refresh Token", body = ApiErrorResponse)
    ),
    tag = "auth"
)]
pub async fn refresh(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RefreshRequest>,
) -> ApiResult<Json<TokenPair>> {
    let data = decode_refresh_token(&request.refresh_token, &state.jwt_secret)
        .map_err(|e| ApiError::unauthorized(e.to_string()))?;
    let user_id = Uuid::parse_str(&data.claims.sub)
        .map_err(|_| ApiError::unauthorized("유효하지 않은 토큰"))?;

    let user = state
        .user_store
        .find_by_id(user_id)
        .await?
        .ok_or_else(|| ApiError::unauthorized("사용자를 찾을 수 없습니다"))?;

    Ok(Json(issue_tokens(&state, &user)?))
}

/// 현재 사용자.
#[utoipa::path(
    get,
    path = "/api/v1/auth/me",
    responses(
        (status = 200, description = "토큰 정보", body = MeResponse),
        (status = 401, description = "인증 필요", body = ApiErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "auth"
)]
pub async fn me(JwtAuth(claims): JwtAuth) -> Json<MeResponse> {
    Json(MeResponse::from(claims))
}

/// 인증 라우터.
pub fn auth_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/refresh", post(refresh))
        .route("/me", get(me))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::test_support::{get as get_req, json_post, read_json};
    use crate::state::create_test_state;
    use axum::http::StatusCode;
    use serde_json::json;
    use tower::ServiceExt;

    fn app(state: Arc<AppState>) -> Router {
        Router::new()
            .nest("/api/v1/auth", auth_router())
            .with_state(state)
    }

    async fn register_user(state: &Arc<AppState>, email: &str) -> (StatusCode, Option<TokenPair>) {
        let response = app(state.clone())
            .oneshot(json_post(
                "/api/v1/auth/register",
                None,
                json!({"email": email, "password": "password123"}),
            ))
            .await
            .unwrap();
        let status = response.status();
        if status == StatusCode::OK {
            (status, Some(read_json(response).await))
        } else {
            (status, None)
        }
    }

    async fn me_for(state: &Arc<AppState>, tokens: &TokenPair) -> MeResponse {
        let auth = format!("Bearer {}", tokens.access_token);
        let response = app(state.clone())
            .oneshot(get_req("/api/v1/auth/me", Some(&auth)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        read_json(response).await
    }

    #[tokio::test]
    async fn test_first_user_is_admin() {
        let state = Arc::new(create_test_state());

        let (_, first) = register_user(&state, "admin@example.com").await;
        let (_, second) = register_user(&state, "user@example.com").await;

        assert_eq!(me_for(&state, &first.unwrap()).await.role, Role::Admin);
        let me = me_for(&state, &second.unwrap()).await;
        assert_eq!(me.role, Role::User);
        assert_eq!(me.email, "user@example.com");
    }

    #[tokio::test]
    async fn test_duplicate_email_conflict() {
        let state = Arc::new(create_test_state());

        let (status, _) = register_user(&state, "kim@example.com").await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = register_user(&state, "KIM@example.com").await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_register_validation() {
        let state = Arc::new(create_test_state());

        for body in [
            json!({"email": "not-an-email", "password": "password123"}),
            json!({"email": "kim@example.com", "password": "short1"}),
            json!({"email": "kim@example.com", "password": "onlyletters"}),
        ] {
            let response = app(state.clone())
                .oneshot(json_post("/api/v1/auth/register", None, body.clone()))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{}", body);
        }
    }

    #[tokio::test]
    async fn test_login() {
        let state = Arc::new(create_test_state());
        register_user(&state, "kim@example.com").await;

        let response = app(state.clone())
            .oneshot(json_post(
                "/api/v1/auth/login",
                None,
                json!({"email": "Kim@Example.com", "password": "password123"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let tokens: TokenPair = read_json(response).await;
        assert_eq!(tokens.token_type, "Bearer");

        let response = app(state.clone())
            .oneshot(json_post(
                "/api/v1/auth/login",
                None,
                json!({"email": "kim@example.com", "password": "wrong-password1"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = app(state)
            .oneshot(json_post(
                "/api/v1/auth/login",
                None,
                json!({"email": "nobody@example.com", "password": "password123"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_refresh() {
        let state = Arc::new(create_test_state());
        let (_, tokens) = register_user(&state, "kim@example.com").await;
        let tokens = tokens.unwrap();

        let response = app(state.clone())
            .oneshot(json_post(
                "/api/v1/auth/refresh",
                None,
                json!({"refreshToken": tokens.refresh_token}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let renewed: TokenPair = read_json(response).await;
        assert_eq!(me_for(&state, &renewed).await.email, "kim@example.com");

        // Access Token은 Refresh Token으로 쓸 수 없음
        let response = app(state)
            .oneshot(json_post(
                "/api/v1/auth/refresh",
                None,
                json!({"refreshToken": tokens.access_token}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_me_requires_token() {
        let state = Arc::new(create_test_state());
        let response = app(state)
            .oneshot(get_req("/api/v1/auth/me", None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
