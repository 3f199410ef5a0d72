//! 인증 및 권한 부여.
//!
//! - [`Claims`]: JWT 페이로드
//! - [`Role`]: 사용자 역할 (admin, user)
//! - [`JwtAuth`], [`AdminAuth`]: 핸들러용 추출기
//! - Argon2 비밀번호 해싱

mod jwt;
mod middleware;
mod password;
mod roles;

pub use jwt::{
    create_token, create_token_pair, decode_refresh_token, decode_token, Claims, JwtError,
    RefreshClaims, TokenPair,
};
pub use middleware::{require_role, AdminAuth, JwtAuth, JwtAuthError};
pub use password::{hash_password, validate_password_strength, verify_password, PasswordError};
pub use roles::Role;
