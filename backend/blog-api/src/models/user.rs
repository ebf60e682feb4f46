use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

/// User model - registration identity and post ownership anchor.
///
/// `password_hash` is skipped by serde so no response path can ever carry
/// it, even if a whole `User` is serialized by mistake.
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
