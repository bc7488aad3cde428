use serde::{Deserialize, Serialize};
use sqlx;

#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub user_id: i64,
    pub username: String,

    /// Argon2 hash, never the plain password.
    #[serde(skip_serializing)]
    pub password_hash: String,
}
