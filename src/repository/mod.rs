pub mod database;
pub mod memory;
pub mod populate;

use crate::models::{Game, GameSummary, Publisher, Review, User};

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("username '{0}' is already taken")]
    DuplicateUser(String),

    #[error("unknown user '{0}'")]
    UnknownUser(String),

    #[error("unknown game {0}")]
    UnknownGame(i64),

    #[error("rating {0} is out of bounds (1-5)")]
    InvalidRating(i64),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),

    #[error("migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Search form filter. Parsing is where unrecognized filter strings die:
/// handlers map a bad form value to an empty result set instead of an
/// error, so no repository ever sees one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchFilter {
    Title,
    Genre,
    Publisher,
    ReleaseYear,
}

impl SearchFilter {
    pub fn parse(value: &str) -> Option<Self> {
        return match value {
            "Title" => Some(Self::Title),
            "Genre" => Some(Self::Genre),
            "Publisher" => Some(Self::Publisher),
            "Release Year" => Some(Self::ReleaseYear),
            _ => None,
        };
    }
}

/// Inclusive price band from a "min-max" form value. Malformed ranges
/// parse to `None` and are dropped by the caller.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceRange {
    pub min: f64,
    pub max: f64,
}

impl PriceRange {
    pub fn parse(value: &str) -> Option<Self> {
        let (min, max) = value.split_once('-')?;
        let min = min.trim().parse().ok()?;
        let max = max.trim().parse().ok()?;
        return Some(Self { min, max });
    }

    pub fn contains(&self, price: f64) -> bool {
        return self.min <= price && price <= self.max;
    }
}

/// The persistence contract. Both backends implement every method and
/// behave identically from the handlers' point of view; requests only
/// ever see this trait, never a concrete store.
#[async_trait]
pub trait GameRepository: Send + Sync {
    // Catalog
    async fn add_game(&self, game: Game) -> Result<(), RepositoryError>;
    async fn add_games(&self, games: Vec<Game>) -> Result<(), RepositoryError>;
    async fn game_by_id(&self, game_id: i64) -> Result<Option<Game>, RepositoryError>;
    async fn all_games(&self) -> Result<Vec<Game>, RepositoryError>;
    async fn game_count(&self) -> Result<i64, RepositoryError>;

    async fn add_publisher(&self, name: &str) -> Result<(), RepositoryError>;
    async fn add_publishers(&self, names: Vec<String>) -> Result<(), RepositoryError>;
    async fn publishers(&self) -> Result<Vec<Publisher>, RepositoryError>;
    async fn publisher_count(&self) -> Result<i64, RepositoryError>;

    async fn add_genres(&self, names: Vec<String>) -> Result<(), RepositoryError>;
    /// Distinct genre names, sorted.
    async fn genre_names(&self) -> Result<Vec<String>, RepositoryError>;

    /// `genre == "All"` selects the whole catalog.
    async fn games_by_genre(&self, genre: &str) -> Result<Vec<Game>, RepositoryError>;
    async fn game_count_by_genre(&self, genre: &str) -> Result<i64, RepositoryError>;

    /// One browse page, ordered by title.
    async fn games_page(
        &self,
        genre: &str,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<GameSummary>, RepositoryError>;

    async fn search_games(
        &self,
        query: &str,
        filter: SearchFilter,
        price_ranges: &[PriceRange],
    ) -> Result<Vec<Game>, RepositoryError>;

    async fn search_games_by_title(&self, fragment: &str) -> Result<Vec<Game>, RepositoryError>;

    // Users
    async fn add_user(&self, username: &str, password_hash: &str) -> Result<User, RepositoryError>;
    async fn user_by_name(&self, username: &str) -> Result<Option<User>, RepositoryError>;

    // Reviews
    async fn add_review(
        &self,
        username: &str,
        game_id: i64,
        rating: i64,
        comment: &str,
    ) -> Result<Review, RepositoryError>;
    /// Newest first.
    async fn reviews_for_game(&self, game_id: i64) -> Result<Vec<Review>, RepositoryError>;
    async fn reviews_by_user(&self, username: &str) -> Result<Vec<Review>, RepositoryError>;
    /// 0.0 when unreviewed, otherwise the mean rounded to one decimal.
    async fn average_rating(&self, game_id: i64) -> Result<f64, RepositoryError>;

    // Wishlist (insertion-ordered) and favorites; adds are idempotent,
    // removes of absent games are no-ops.
    async fn wishlist(&self, username: &str) -> Result<Vec<Game>, RepositoryError>;
    async fn add_to_wishlist(&self, username: &str, game_id: i64) -> Result<(), RepositoryError>;
    async fn remove_from_wishlist(
        &self,
        username: &str,
        game_id: i64,
    ) -> Result<(), RepositoryError>;

    async fn favorites(&self, username: &str) -> Result<Vec<Game>, RepositoryError>;
    async fn add_to_favorites(&self, username: &str, game_id: i64) -> Result<(), RepositoryError>;
    async fn remove_from_favorites(
        &self,
        username: &str,
        game_id: i64,
    ) -> Result<(), RepositoryError>;
}
