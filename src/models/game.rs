use serde::{Deserialize, Serialize};
use sqlx;

/// A catalog entry. `genres` is not a column on the games table; the
/// database backend fills it in from the `game_genres` join table after
/// the row is fetched.
#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Game {
    pub game_id: i64,
    pub title: String,
    pub price: f64,
    pub release_date: String,
    pub description: String,
    pub image_url: String,
    pub publisher_name: String,

    #[sqlx(skip)]
    pub genres: Vec<String>,
}

impl Game {
    /// Trailing year of the display-format release date ("Oct 21, 2008").
    pub fn release_year(&self) -> Option<i64> {
        return self.release_date.split_whitespace().last()?.parse().ok();
    }

    pub fn has_genre(&self, genre: &str) -> bool {
        return self
            .genres
            .iter()
            .any(|g| g.eq_ignore_ascii_case(genre));
    }
}

/// Slim row for browse pages; full records are only loaded on the
/// detail page.
#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct GameSummary {
    pub game_id: i64,
    pub title: String,
    pub release_date: String,
}
