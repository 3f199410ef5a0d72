//! API 전용 저장소.

pub mod users;

pub use users::{normalize_email, InMemoryUserStore, PgUserStore, User, UserStore};
