//! API 사용자 저장소.

use std::collections::HashMap;

use async_trait::async_trait;
use brief_data::DataError;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::auth::Role;

/// 사용자 계정.
#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    /// 소문자로 정규화된 이메일
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(email: &str, password_hash: String, role: Role) -> Self {
        Self {
            id: Uuid::new_v4(),
            email: normalize_email(email),
            password_hash,
            role,
            created_at: Utc::now(),
        }
    }
}

/// 이메일 비교용 정규화.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// 사용자 저장소 인터페이스.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, DataError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, DataError>;

    /// 새 사용자 저장. 이메일이 이미 있으면 `DuplicateError`.
    async fn create(&self, user: &User) -> Result<User, DataError>;

    async fn count(&self) -> Result<i64, DataError>;
}

#[derive(Debug, FromRow)]
struct UserRecord {
    id: Uuid,
    email: String,
    password_hash: String,
    role: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<UserRecord> for User {
    type Error = DataError;

    fn try_from(record: UserRecord) -> Result<Self, DataError> {
        let role = Role::parse(&record.role)
            .ok_or_else(|| DataError::InvalidData(format!("알 수 없는 역할: {}", record.role)))?;
        Ok(User {
            id: record.id,
            email: record.email,
            password_hash: record.password_hash,
            role,
            created_at: record.created_at,
        })
    }
}

/// PostgreSQL 사용자 저장소.
#[derive(Clone)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, DataError> {
        let record = sqlx::query_as::<_, UserRecord>(
            "SELECT id, email, password_hash, role, created_at FROM users WHERE email = $1",
        )
        .bind(normalize_email(email))
        .fetch_optional(&self.pool)
        .await?;

        record.map(User::try_from).transpose()
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, DataError> {
        let record = sqlx::query_as::<_, UserRecord>(
            "SELECT id, email, password_hash, role, created_at FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        record.map(User::try_from).transpose()
    }

    async fn create(&self, user: &User) -> Result<User, DataError> {
        let record = sqlx::query_as::<_, UserRecord>(
            r#"
            INSERT INTO users (id, email, password_hash, role, created_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, email, password_hash, role, created_at
            "#,
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .bind(user.created_at)
        .fetch_one(&self.pool)
        .await?;

        debug!(user_id = %record.id, role = %record.role, "User created");
        User::try_from(record)
    }

    async fn count(&self) -> Result<i64, DataError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

/// 메모리 사용자 저장소. 데이터베이스가 없을 때와 테스트에서 사용합니다.
#[derive(Default)]
pub struct InMemoryUserStore {
    users: RwLock<HashMap<String, User>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, DataError> {
        Ok(self.users.read().await.get(&normalize_email(email)).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, DataError> {
        Ok(self.users.read().await.values().find(|u| u.id == id).cloned())
    }

    async fn create(&self, user: &User) -> Result<User, DataError> {
        let mut users = self.users.write().await;
        if users.contains_key(&user.email) {
            return Err(DataError::DuplicateError(user.email.clone()));
        }
        users.insert(user.email.clone(), user.clone());
        Ok(user.clone())
    }

    async fn count(&self) -> Result<i64, DataError> {
        Ok(self.users.read().await.len() as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_create_and_find() {
        let store = InMemoryUserStore::new();
        let user = User::new(" Kim@Example.com ", "hash".to_string(), Role::User);
        store.create(&user).await.unwrap();

        let found = store.find_by_email("kim@example.com").await.unwrap().unwrap();
        assert_eq!(found.id, user.id);
        assert_eq!(store.count().await.unwrap(), 1);

        let by_id = store.find_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(by_id.email, "kim@example.com");
        assert!(store.find_by_id(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let store = InMemoryUserStore::new();
        store
            .create(&User::new("kim@example.com", "h1".to_string(), Role::User))
            .await
            .unwrap();

        let err = store
            .create(&User::new("KIM@example.com", "h2".to_string(), Role::User))
            .await
            .unwrap_err();
        assert!(matches!(err, DataError::DuplicateError(_)));
    }
}
