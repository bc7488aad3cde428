use std::str::FromStr;
use std::time::SystemTime;

use super::{GameRepository, PriceRange, RepositoryError, SearchFilter};
use crate::models::{Game, GameSummary, Publisher, Review, User, MAX_RATING, MIN_RATING};

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{SqliteConnection, SqlitePool};

/// SQLite backed store. One pool, embedded migrations, duplicate keys
/// surfaced as typed errors.
#[derive(Clone)]
pub struct DatabaseRepository {
    pool: SqlitePool,
}

impl DatabaseRepository {
    pub async fn connect(url: &str) -> Result<Self, RepositoryError> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        sqlx::migrate!().run(&pool).await?;

        return Ok(Self { pool });
    }

    /// In-memory database for tests. Single connection, since every
    /// connection to `sqlite::memory:` is its own database.
    #[cfg(test)]
    pub async fn in_memory() -> Result<Self, RepositoryError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        sqlx::migrate!().run(&pool).await?;

        return Ok(Self { pool });
    }

    async fn attach_genres(&self, games: &mut [Game]) -> Result<(), RepositoryError> {
        for game in games.iter_mut() {
            game.genres = sqlx::query_scalar(
                "SELECT genre_name FROM game_genres WHERE game_id = ? ORDER BY genre_name",
            )
            .bind(game.game_id)
            .fetch_all(&self.pool)
            .await?;
        }
        return Ok(());
    }

    async fn user_id(&self, username: &str) -> Result<Option<i64>, RepositoryError> {
        return Ok(
            sqlx::query_scalar("SELECT user_id FROM users WHERE username = ?")
                .bind(normalize(username))
                .fetch_optional(&self.pool)
                .await?,
        );
    }

    async fn game_exists(&self, game_id: i64) -> Result<bool, RepositoryError> {
        let found: Option<i64> = sqlx::query_scalar("SELECT game_id FROM games WHERE game_id = ?")
            .bind(game_id)
            .fetch_optional(&self.pool)
            .await?;
        return Ok(found.is_some());
    }
}

fn normalize(username: &str) -> String {
    return username.trim().to_lowercase();
}

fn now_unix() -> i64 {
    return SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0);
}

fn round_rating(mean: f64) -> f64 {
    return (mean * 10.0).round() / 10.0;
}

/// Upsert one game and its genre links inside an open transaction.
/// Empty publisher names stay on the game row but never become a
/// publishers entry.
async fn insert_game(conn: &mut SqliteConnection, game: &Game) -> Result<(), RepositoryError> {
    if !game.publisher_name.is_empty() {
        sqlx::query("INSERT OR IGNORE INTO publishers (name) VALUES (?)")
            .bind(&game.publisher_name)
            .execute(&mut *conn)
            .await?;
    }

    sqlx::query(
        "INSERT INTO games (game_id, title, price, release_date, description, image_url, publisher_name) \
         VALUES (?, ?, ?, ?, ?, ?, ?) \
         ON CONFLICT (game_id) DO UPDATE SET \
             title = excluded.title, \
             price = excluded.price, \
             release_date = excluded.release_date, \
             description = excluded.description, \
             image_url = excluded.image_url, \
             publisher_name = excluded.publisher_name",
    )
    .bind(game.game_id)
    .bind(&game.title)
    .bind(game.price)
    .bind(&game.release_date)
    .bind(&game.description)
    .bind(&game.image_url)
    .bind(&game.publisher_name)
    .execute(&mut *conn)
    .await?;

    sqlx::query("DELETE FROM game_genres WHERE game_id = ?")
        .bind(game.game_id)
        .execute(&mut *conn)
        .await?;

    for genre in &game.genres {
        sqlx::query("INSERT OR IGNORE INTO genres (genre_name) VALUES (?)")
            .bind(genre)
            .execute(&mut *conn)
            .await?;
        sqlx::query("INSERT OR IGNORE INTO game_genres (game_id, genre_name) VALUES (?, ?)")
            .bind(game.game_id)
            .bind(genre)
            .execute(&mut *conn)
            .await?;
    }

    return Ok(());
}

#[async_trait]
impl GameRepository for DatabaseRepository {
    async fn add_game(&self, game: Game) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;
        insert_game(&mut tx, &game).await?;
        tx.commit().await?;
        return Ok(());
    }

    async fn add_games(&self, games: Vec<Game>) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;
        for game in &games {
            insert_game(&mut tx, game).await?;
        }
        tx.commit().await?;
        return Ok(());
    }

    async fn game_by_id(&self, game_id: i64) -> Result<Option<Game>, RepositoryError> {
        let game: Option<Game> = sqlx::query_as("SELECT * FROM games WHERE game_id = ? LIMIT 1")
            .bind(game_id)
            .fetch_optional(&self.pool)
            .await?;

        let Some(mut game) = game else {
            return Ok(None);
        };
        self.attach_genres(std::slice::from_mut(&mut game)).await?;
        return Ok(Some(game));
    }

    async fn all_games(&self) -> Result<Vec<Game>, RepositoryError> {
        let mut games: Vec<Game> = sqlx::query_as("SELECT * FROM games ORDER BY game_id")
            .fetch_all(&self.pool)
            .await?;
        self.attach_genres(&mut games).await?;
        return Ok(games);
    }

    async fn game_count(&self) -> Result<i64, RepositoryError> {
        return Ok(sqlx::query_scalar("SELECT COUNT(*) FROM games")
            .fetch_one(&self.pool)
            .await?);
    }

    async fn add_publisher(&self, name: &str) -> Result<(), RepositoryError> {
        if name.is_empty() {
            return Ok(());
        }
        sqlx::query("INSERT OR IGNORE INTO publishers (name) VALUES (?)")
            .bind(name)
            .execute(&self.pool)
            .await?;
        return Ok(());
    }

    async fn add_publishers(&self, names: Vec<String>) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;
        for name in names.iter().filter(|name| !name.is_empty()) {
            sqlx::query("INSERT OR IGNORE INTO publishers (name) VALUES (?)")
                .bind(name)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        return Ok(());
    }

    async fn publishers(&self) -> Result<Vec<Publisher>, RepositoryError> {
        return Ok(sqlx::query_as("SELECT name FROM publishers ORDER BY name")
            .fetch_all(&self.pool)
            .await?);
    }

    async fn publisher_count(&self) -> Result<i64, RepositoryError> {
        return Ok(sqlx::query_scalar("SELECT COUNT(*) FROM publishers")
            .fetch_one(&self.pool)
            .await?);
    }

    async fn add_genres(&self, names: Vec<String>) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;
        for name in &names {
            sqlx::query("INSERT OR IGNORE INTO genres (genre_name) VALUES (?)")
                .bind(name)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        return Ok(());
    }

    async fn genre_names(&self) -> Result<Vec<String>, RepositoryError> {
        return Ok(
            sqlx::query_scalar("SELECT genre_name FROM genres ORDER BY genre_name")
                .fetch_all(&self.pool)
                .await?,
        );
    }

    async fn games_by_genre(&self, genre: &str) -> Result<Vec<Game>, RepositoryError> {
        let mut games: Vec<Game> = if genre == "All" {
            sqlx::query_as("SELECT * FROM games ORDER BY game_id")
                .fetch_all(&self.pool)
                .await?
        } else {
            sqlx::query_as(
                "SELECT g.* FROM games g \
                 JOIN game_genres gg ON gg.game_id = g.game_id \
                 WHERE gg.genre_name = ? COLLATE NOCASE \
                 ORDER BY g.game_id",
            )
            .bind(genre)
            .fetch_all(&self.pool)
            .await?
        };
        self.attach_genres(&mut games).await?;
        return Ok(games);
    }

    async fn game_count_by_genre(&self, genre: &str) -> Result<i64, RepositoryError> {
        if genre == "All" {
            return self.game_count().await;
        }
        return Ok(sqlx::query_scalar(
            "SELECT COUNT(*) FROM game_genres WHERE genre_name = ? COLLATE NOCASE",
        )
        .bind(genre)
        .fetch_one(&self.pool)
        .await?);
    }

    async fn games_page(
        &self,
        genre: &str,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<GameSummary>, RepositoryError> {
        if genre == "All" {
            return Ok(sqlx::query_as(
                "SELECT game_id, title, release_date FROM games \
                 ORDER BY title LIMIT ? OFFSET ?",
            )
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?);
        }

        return Ok(sqlx::query_as(
            "SELECT g.game_id, g.title, g.release_date FROM games g \
             JOIN game_genres gg ON gg.game_id = g.game_id \
             WHERE gg.genre_name = ? COLLATE NOCASE \
             ORDER BY g.title LIMIT ? OFFSET ?",
        )
        .bind(genre)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?);
    }

    async fn search_games(
        &self,
        query: &str,
        filter: SearchFilter,
        price_ranges: &[PriceRange],
    ) -> Result<Vec<Game>, RepositoryError> {
        let needle = format!("%{}%", query.trim().to_lowercase());

        let mut sql = match filter {
            SearchFilter::Title => {
                "SELECT DISTINCT g.* FROM games g WHERE lower(g.title) LIKE ?".to_string()
            }
            SearchFilter::Genre => "SELECT DISTINCT g.* FROM games g \
                 JOIN game_genres gg ON gg.game_id = g.game_id \
                 WHERE lower(gg.genre_name) LIKE ?"
                .to_string(),
            SearchFilter::Publisher => {
                "SELECT DISTINCT g.* FROM games g WHERE lower(g.publisher_name) LIKE ?".to_string()
            }
            SearchFilter::ReleaseYear => {
                // The display date ends in the year; non-numeric queries
                // match nothing rather than erroring.
                if query.trim().parse::<i64>().is_err() {
                    return Ok(Vec::new());
                }
                "SELECT DISTINCT g.* FROM games g WHERE g.release_date LIKE ?".to_string()
            }
        };

        if !price_ranges.is_empty() {
            let bands = price_ranges
                .iter()
                .map(|_| "g.price BETWEEN ? AND ?")
                .collect::<Vec<&'static str>>()
                .join(" OR ");
            sql.push_str(&format!(" AND ({bands})"));
        }
        sql.push_str(" ORDER BY g.game_id");

        let mut q = sqlx::query_as(&sql);
        q = match filter {
            SearchFilter::ReleaseYear => q.bind(format!("% {}", query.trim())),
            _ => q.bind(needle),
        };
        for range in price_ranges {
            q = q.bind(range.min).bind(range.max);
        }

        let mut games: Vec<Game> = q.fetch_all(&self.pool).await?;
        self.attach_genres(&mut games).await?;
        return Ok(games);
    }

    async fn search_games_by_title(&self, fragment: &str) -> Result<Vec<Game>, RepositoryError> {
        let mut games: Vec<Game> =
            sqlx::query_as("SELECT * FROM games WHERE lower(title) LIKE ? ORDER BY game_id")
                .bind(format!("%{}%", fragment.trim().to_lowercase()))
                .fetch_all(&self.pool)
                .await?;
        self.attach_genres(&mut games).await?;
        return Ok(games);
    }

    async fn add_user(&self, username: &str, password_hash: &str) -> Result<User, RepositoryError> {
        let username = normalize(username);

        let result = sqlx::query("INSERT INTO users (username, password_hash) VALUES (?, ?)")
            .bind(&username)
            .bind(password_hash)
            .execute(&self.pool)
            .await;

        let result = match result {
            Ok(result) => result,
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                return Err(RepositoryError::DuplicateUser(username));
            }
            Err(err) => return Err(err.into()),
        };

        return Ok(User {
            user_id: result.last_insert_rowid(),
            username,
            password_hash: password_hash.to_string(),
        });
    }

    async fn user_by_name(&self, username: &str) -> Result<Option<User>, RepositoryError> {
        return Ok(
            sqlx::query_as("SELECT * FROM users WHERE username = ? LIMIT 1")
                .bind(normalize(username))
                .fetch_optional(&self.pool)
                .await?,
        );
    }

    async fn add_review(
        &self,
        username: &str,
        game_id: i64,
        rating: i64,
        comment: &str,
    ) -> Result<Review, RepositoryError> {
        if !(MIN_RATING..=MAX_RATING).contains(&rating) {
            return Err(RepositoryError::InvalidRating(rating));
        }

        let user_id = self
            .user_id(username)
            .await?
            .ok_or_else(|| RepositoryError::UnknownUser(username.to_string()))?;

        if !self.game_exists(game_id).await? {
            return Err(RepositoryError::UnknownGame(game_id));
        }

        let created_at = now_unix();
        let result = sqlx::query(
            "INSERT INTO reviews (user_id, game_id, rating, comment, created_at) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(user_id)
        .bind(game_id)
        .bind(rating)
        .bind(comment)
        .bind(created_at)
        .execute(&self.pool)
        .await?;

        return Ok(Review {
            review_id: result.last_insert_rowid(),
            game_id,
            username: normalize(username),
            rating,
            comment: comment.to_string(),
            created_at,
        });
    }

    async fn reviews_for_game(&self, game_id: i64) -> Result<Vec<Review>, RepositoryError> {
        return Ok(sqlx::query_as(
            "SELECT r.review_id, r.game_id, u.username, r.rating, r.comment, r.created_at \
             FROM reviews r JOIN users u ON u.user_id = r.user_id \
             WHERE r.game_id = ? \
             ORDER BY r.created_at DESC, r.review_id DESC",
        )
        .bind(game_id)
        .fetch_all(&self.pool)
        .await?);
    }

    async fn reviews_by_user(&self, username: &str) -> Result<Vec<Review>, RepositoryError> {
        return Ok(sqlx::query_as(
            "SELECT r.review_id, r.game_id, u.username, r.rating, r.comment, r.created_at \
             FROM reviews r JOIN users u ON u.user_id = r.user_id \
             WHERE u.username = ? \
             ORDER BY r.created_at DESC, r.review_id DESC",
        )
        .bind(normalize(username))
        .fetch_all(&self.pool)
        .await?);
    }

    async fn average_rating(&self, game_id: i64) -> Result<f64, RepositoryError> {
        let mean: Option<f64> =
            sqlx::query_scalar("SELECT AVG(rating) FROM reviews WHERE game_id = ?")
                .bind(game_id)
                .fetch_one(&self.pool)
                .await?;

        return Ok(mean.map(round_rating).unwrap_or(0.0));
    }

    async fn wishlist(&self, username: &str) -> Result<Vec<Game>, RepositoryError> {
        let mut games: Vec<Game> = sqlx::query_as(
            "SELECT g.* FROM games g \
             JOIN user_wishlist w ON w.game_id = g.game_id \
             JOIN users u ON u.user_id = w.user_id \
             WHERE u.username = ? \
             ORDER BY w.id",
        )
        .bind(normalize(username))
        .fetch_all(&self.pool)
        .await?;
        self.attach_genres(&mut games).await?;
        return Ok(games);
    }

    async fn add_to_wishlist(&self, username: &str, game_id: i64) -> Result<(), RepositoryError> {
        let user_id = self
            .user_id(username)
            .await?
            .ok_or_else(|| RepositoryError::UnknownUser(username.to_string()))?;

        if !self.game_exists(game_id).await? {
            return Err(RepositoryError::UnknownGame(game_id));
        }

        sqlx::query("INSERT OR IGNORE INTO user_wishlist (user_id, game_id) VALUES (?, ?)")
            .bind(user_id)
            .bind(game_id)
            .execute(&self.pool)
            .await?;
        return Ok(());
    }

    async fn remove_from_wishlist(
        &self,
        username: &str,
        game_id: i64,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "DELETE FROM user_wishlist WHERE game_id = ? \
             AND user_id IN (SELECT user_id FROM users WHERE username = ?)",
        )
        .bind(game_id)
        .bind(normalize(username))
        .execute(&self.pool)
        .await?;
        return Ok(());
    }

    async fn favorites(&self, username: &str) -> Result<Vec<Game>, RepositoryError> {
        let mut games: Vec<Game> = sqlx::query_as(
            "SELECT g.* FROM games g \
             JOIN user_favorites f ON f.game_id = g.game_id \
             JOIN users u ON u.user_id = f.user_id \
             WHERE u.username = ? \
             ORDER BY f.id",
        )
        .bind(normalize(username))
        .fetch_all(&self.pool)
        .await?;
        self.attach_genres(&mut games).await?;
        return Ok(games);
    }

    async fn add_to_favorites(&self, username: &str, game_id: i64) -> Result<(), RepositoryError> {
        let user_id = self
            .user_id(username)
            .await?
            .ok_or_else(|| RepositoryError::UnknownUser(username.to_string()))?;

        if !self.game_exists(game_id).await? {
            return Err(RepositoryError::UnknownGame(game_id));
        }

        sqlx::query("INSERT OR IGNORE INTO user_favorites (user_id, game_id) VALUES (?, ?)")
            .bind(user_id)
            .bind(game_id)
            .execute(&self.pool)
            .await?;
        return Ok(());
    }

    async fn remove_from_favorites(
        &self,
        username: &str,
        game_id: i64,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "DELETE FROM user_favorites WHERE game_id = ? \
             AND user_id IN (SELECT user_id FROM users WHERE username = ?)",
        )
        .bind(game_id)
        .bind(normalize(username))
        .execute(&self.pool)
        .await?;
        return Ok(());
    }
}
