//! JWT 토큰 발급과 검증.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, TokenData, Validation};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::Role;

const REFRESH_TOKEN_TYPE: &str = "refresh";

/// Access Token 페이로드.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Claims {
    /// 사용자 ID
    pub sub: String,
    /// 이메일
    pub email: String,
    /// 역할
    pub role: Role,
    /// 발급 시각 (Unix timestamp)
    pub iat: i64,
    /// 만료 시각 (Unix timestamp)
    pub exp: i64,
    /// 토큰 고유 ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,
}

impl Claims {
    pub fn new(
        user_id: impl Into<String>,
        email: impl Into<String>,
        role: Role,
        expires_in_minutes: i64,
    ) -> Self {
        let now = Utc::now();
        Self {
            sub: user_id.into(),
            email: email.into(),
            role,
            iat: now.timestamp(),
            exp: (now + Duration::minutes(expires_in_minutes)).timestamp(),
            jti: Some(uuid::Uuid::new_v4().to_string()),
        }
    }

    /// 특정 역할 이상인지 확인.
    pub fn has_role(&self, required: Role) -> bool {
        self.role.level() >= required.level()
    }
}

/// Refresh Token 페이로드.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshClaims {
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
    pub token_type: String,
}

impl RefreshClaims {
    pub fn new(user_id: impl Into<String>, expires_in_days: i64) -> Self {
        let now = Utc::now();
        Self {
            sub: user_id.into(),
            iat: now.timestamp(),
            exp: (now + Duration::days(expires_in_days)).timestamp(),
            jti: uuid::Uuid::new_v4().to_string(),
            token_type: REFRESH_TOKEN_TYPE.to_string(),
        }
    }
}

/// 로그인/가입 응답 토큰 쌍.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    /// Access Token 만료까지 남은 시간 (초)
    pub expires_in: i64,
    /// 항상 "Bearer"
    pub token_type: String,
}

/// JWT 처리 에러.
#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    #[error("토큰 인코딩 실패: {0}")]
    EncodingError(#[from] jsonwebtoken::errors::Error),
    #[error("토큰 디코딩 실패")]
    DecodingError,
    #[error("토큰이 만료되었습니다")]
    TokenExpired,
    #[error("잘못된 토큰 형식")]
    InvalidToken,
}

fn encode_claims<T: Serialize>(claims: &T, secret: &str) -> Result<String, JwtError> {
    encode(
        &Header::default(),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(JwtError::from)
}

fn decode_claims<T: serde::de::DeserializeOwned>(
    token: &str,
    secret: &str,
) -> Result<TokenData<T>, JwtError> {
    let mut validation = Validation::default();
    validation.validate_exp = true;
    validation.leeway = 0;

    decode::<T>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => JwtError::TokenExpired,
        jsonwebtoken::errors::ErrorKind::InvalidToken => JwtError::InvalidToken,
        _ => JwtError::DecodingError,
    })
}

/// Access Token 생성.
pub fn create_token(claims: &Claims, secret: &str) -> Result<String, JwtError> {
    encode_claims(claims, secret)
}

/// Access Token 검증.
pub fn decode_token(token: &str, secret: &str) -> Result<TokenData<Claims>, JwtError> {
    decode_claims(token, secret)
}

/// Refresh Token 검증. 토큰 타입이 refresh가 아니면 거부합니다.
pub fn decode_refresh_token(
    token: &str,
    secret: &str,
) -> Result<TokenData<RefreshClaims>, JwtError> {
    let data: TokenData<RefreshClaims> = decode_claims(token, secret)?;
    if data.claims.token_type != REFRESH_TOKEN_TYPE {
        return Err(JwtError::InvalidToken);
    }
    Ok(data)
}

/// Access Token + Refresh Token 쌍 생성.
pub fn create_token_pair(
    user_id: &str,
    email: &str,
    role: Role,
    secret: &str,
    access_expires_minutes: i64,
    refresh_expires_days: i64,
) -> Result<TokenPair, JwtError> {
    let access_claims = Claims::new(user_id, email, role, access_expires_minutes);
    let refresh_claims = RefreshClaims::new(user_id, refresh_expires_days);

    Ok(TokenPair {
        access_token: encode_claims(&access_claims, secret)?,
        refresh_token: encode_claims(&refresh_claims, secret)?,
        expires_in: access_expires_minutes * 60,
        token_type: "Bearer".to_string(),
    })
}
