use chrono::{TimeZone, Utc};
use serde::{Deserialize, Serialize};
use sqlx;

pub const MIN_RATING: i64 = 1;
pub const MAX_RATING: i64 = 5;

/// A user's rating + comment on one game. `username` is denormalized
/// into the struct so pages never need a second lookup.
#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Review {
    pub review_id: i64,
    pub game_id: i64,
    pub username: String,
    pub rating: i64,
    pub comment: String,

    /// Unix seconds.
    pub created_at: i64,
}

impl Review {
    pub fn posted_at(&self) -> String {
        return match Utc.timestamp_opt(self.created_at, 0).single() {
            Some(ts) => ts.format("%b %e, %Y").to_string(),
            None => String::new(),
        };
    }
}
