use std::collections::{BTreeSet, HashMap};
use std::time::SystemTime;

use super::{GameRepository, PriceRange, RepositoryError, SearchFilter};
use crate::models::{Game, GameSummary, Publisher, Review, User, MAX_RATING, MIN_RATING};

use async_trait::async_trait;
use tokio::sync::RwLock;

/// Vec/map backed store. The games vec is kept sorted by id on every
/// insert; adding a game whose id already exists replaces the old record
/// in place, mirroring the merge semantics of the database backend.
pub struct MemoryRepository {
    inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
    games: Vec<Game>,
    users: HashMap<String, User>,
    reviews: Vec<Review>,
    wishlists: HashMap<String, Vec<i64>>,
    favorites: HashMap<String, Vec<i64>>,
    publishers: BTreeSet<String>,
    genres: BTreeSet<String>,
    next_user_id: i64,
    next_review_id: i64,
}

impl MemoryRepository {
    pub fn new() -> Self {
        return Self {
            inner: RwLock::new(Inner::default()),
        };
    }
}

impl Default for MemoryRepository {
    fn default() -> Self {
        return Self::new();
    }
}

impl Inner {
    fn insert_game(&mut self, game: Game) {
        if !game.publisher_name.is_empty() {
            self.publishers.insert(game.publisher_name.clone());
        }
        for genre in &game.genres {
            self.genres.insert(genre.clone());
        }

        match self
            .games
            .binary_search_by_key(&game.game_id, |g| g.game_id)
        {
            Ok(at) => self.games[at] = game,
            Err(at) => self.games.insert(at, game),
        }
    }

    fn game(&self, game_id: i64) -> Option<&Game> {
        return self
            .games
            .binary_search_by_key(&game_id, |g| g.game_id)
            .ok()
            .map(|at| &self.games[at]);
    }

    fn user(&self, username: &str) -> Option<&User> {
        return self.users.get(&normalize(username));
    }

    fn games_matching_genre(&self, genre: &str) -> Vec<Game> {
        if genre == "All" {
            return self.games.clone();
        }
        return self
            .games
            .iter()
            .filter(|g| g.has_genre(genre))
            .cloned()
            .collect();
    }

    fn require_refs(&self, username: &str, game_id: i64) -> Result<(), RepositoryError> {
        if self.user(username).is_none() {
            return Err(RepositoryError::UnknownUser(username.to_string()));
        }
        if self.game(game_id).is_none() {
            return Err(RepositoryError::UnknownGame(game_id));
        }
        return Ok(());
    }

    fn collect_games(&self, ids: &[i64]) -> Vec<Game> {
        return ids.iter().filter_map(|id| self.game(*id).cloned()).collect();
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

#[async_trait]
impl GameRepository for MemoryRepository {
    async fn add_game(&self, game: Game) -> Result<(), RepositoryError> {
        self.inner.write().await.insert_game(game);
        return Ok(());
    }

    async fn add_games(&self, games: Vec<Game>) -> Result<(), RepositoryError> {
        let mut inner = self.inner.write().await;
        for game in games {
            inner.insert_game(game);
        }
        return Ok(());
    }

    async fn game_by_id(&self, game_id: i64) -> Result<Option<Game>, RepositoryError> {
        return Ok(self.inner.read().await.game(game_id).cloned());
    }

    async fn all_games(&self) -> Result<Vec<Game>, RepositoryError> {
        return Ok(self.inner.read().await.games.clone());
    }

    async fn game_count(&self) -> Result<i64, RepositoryError> {
        return Ok(self.inner.read().await.games.len() as i64);
    }

    async fn add_publisher(&self, name: &str) -> Result<(), RepositoryError> {
        if !name.is_empty() {
            self.inner.write().await.publishers.insert(name.to_string());
        }
        return Ok(());
    }

    async fn add_publishers(&self, names: Vec<String>) -> Result<(), RepositoryError> {
        self.inner
            .write()
            .await
            .publishers
            .extend(names.into_iter().filter(|name| !name.is_empty()));
        return Ok(());
    }

    async fn publishers(&self) -> Result<Vec<Publisher>, RepositoryError> {
        return Ok(self
            .inner
            .read()
            .await
            .publishers
            .iter()
            .map(|name| Publisher { name: name.clone() })
            .collect());
    }

    async fn publisher_count(&self) -> Result<i64, RepositoryError> {
        return Ok(self.inner.read().await.publishers.len() as i64);
    }

    async fn add_genres(&self, names: Vec<String>) -> Result<(), RepositoryError> {
        self.inner.write().await.genres.extend(names);
        return Ok(());
    }

    async fn genre_names(&self) -> Result<Vec<String>, RepositoryError> {
        return Ok(self.inner.read().await.genres.iter().cloned().collect());
    }

    async fn games_by_genre(&self, genre: &str) -> Result<Vec<Game>, RepositoryError> {
        return Ok(self.inner.read().await.games_matching_genre(genre));
    }

    async fn game_count_by_genre(&self, genre: &str) -> Result<i64, RepositoryError> {
        return Ok(self.inner.read().await.games_matching_genre(genre).len() as i64);
    }

    async fn games_page(
        &self,
        genre: &str,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<GameSummary>, RepositoryError> {
        let mut games = self.inner.read().await.games_matching_genre(genre);
        games.sort_by(|a, b| a.title.cmp(&b.title));

        return Ok(games
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .map(|g| GameSummary {
                game_id: g.game_id,
                title: g.title,
                release_date: g.release_date,
            })
            .collect());
    }

    async fn search_games(
        &self,
        query: &str,
        filter: SearchFilter,
        price_ranges: &[PriceRange],
    ) -> Result<Vec<Game>, RepositoryError> {
        let needle = query.trim().to_lowercase();
        let inner = self.inner.read().await;

        let matched: Vec<Game> = inner
            .games
            .iter()
            .filter(|game| match filter {
                SearchFilter::Title => game.title.to_lowercase().contains(&needle),
                SearchFilter::Genre => game.has_genre(&needle),
                SearchFilter::Publisher => {
                    game.publisher_name.to_lowercase().contains(&needle)
                }
                SearchFilter::ReleaseYear => match needle.parse::<i64>() {
                    Ok(year) => game.release_year() == Some(year),
                    Err(_) => false,
                },
            })
            .cloned()
            .collect();

        if price_ranges.is_empty() {
            return Ok(matched);
        }
        return Ok(matched
            .into_iter()
            .filter(|g| price_ranges.iter().any(|r| r.contains(g.price)))
            .collect());
    }

    async fn search_games_by_title(&self, fragment: &str) -> Result<Vec<Game>, RepositoryError> {
        let needle = fragment.trim().to_lowercase();
        return Ok(self
            .inner
            .read()
            .await
            .games
            .iter()
            .filter(|g| g.title.to_lowercase().contains(&needle))
            .cloned()
            .collect());
    }

    async fn add_user(&self, username: &str, password_hash: &str) -> Result<User, RepositoryError> {
        let mut inner = self.inner.write().await;
        let key = normalize(username);

        if inner.users.contains_key(&key) {
            return Err(RepositoryError::DuplicateUser(key));
        }

        inner.next_user_id += 1;
        let user = User {
            user_id: inner.next_user_id,
            username: key.clone(),
            password_hash: password_hash.to_string(),
        };
        inner.users.insert(key, user.clone());
        return Ok(user);
    }

    async fn user_by_name(&self, username: &str) -> Result<Option<User>, RepositoryError> {
        return Ok(self.inner.read().await.user(username).cloned());
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

        let mut inner = self.inner.write().await;
        inner.require_refs(username, game_id)?;

        inner.next_review_id += 1;
        let review = Review {
            review_id: inner.next_review_id,
            game_id,
            username: normalize(username),
            rating,
            comment: comment.to_string(),
            created_at: now_unix(),
        };
        inner.reviews.push(review.clone());
        return Ok(review);
    }

    async fn reviews_for_game(&self, game_id: i64) -> Result<Vec<Review>, RepositoryError> {
        let mut reviews: Vec<Review> = self
            .inner
            .read()
            .await
            .reviews
            .iter()
            .filter(|r| r.game_id == game_id)
            .cloned()
            .collect();
        reviews.sort_by(|a, b| (b.created_at, b.review_id).cmp(&(a.created_at, a.review_id)));
        return Ok(reviews);
    }

    async fn reviews_by_user(&self, username: &str) -> Result<Vec<Review>, RepositoryError> {
        let key = normalize(username);
        let mut reviews: Vec<Review> = self
            .inner
            .read()
            .await
            .reviews
            .iter()
            .filter(|r| r.username == key)
            .cloned()
            .collect();
        reviews.sort_by(|a, b| (b.created_at, b.review_id).cmp(&(a.created_at, a.review_id)));
        return Ok(reviews);
    }

    async fn average_rating(&self, game_id: i64) -> Result<f64, RepositoryError> {
        let inner = self.inner.read().await;
        let ratings: Vec<i64> = inner
            .reviews
            .iter()
            .filter(|r| r.game_id == game_id)
            .map(|r| r.rating)
            .collect();

        if ratings.is_empty() {
            return Ok(0.0);
        }
        let mean = ratings.iter().sum::<i64>() as f64 / ratings.len() as f64;
        return Ok((mean * 10.0).round() / 10.0);
    }

    async fn wishlist(&self, username: &str) -> Result<Vec<Game>, RepositoryError> {
        let inner = self.inner.read().await;
        let ids = inner
            .wishlists
            .get(&normalize(username))
            .cloned()
            .unwrap_or_default();
        return Ok(inner.collect_games(&ids));
    }

    async fn add_to_wishlist(&self, username: &str, game_id: i64) -> Result<(), RepositoryError> {
        let mut inner = self.inner.write().await;
        inner.require_refs(username, game_id)?;

        let ids = inner.wishlists.entry(normalize(username)).or_default();
        if !ids.contains(&game_id) {
            ids.push(game_id);
        }
        return Ok(());
    }

    async fn remove_from_wishlist(
        &self,
        username: &str,
        game_id: i64,
    ) -> Result<(), RepositoryError> {
        let mut inner = self.inner.write().await;
        if let Some(ids) = inner.wishlists.get_mut(&normalize(username)) {
            ids.retain(|id| *id != game_id);
        }
        return Ok(());
    }

    async fn favorites(&self, username: &str) -> Result<Vec<Game>, RepositoryError> {
        let inner = self.inner.read().await;
        let ids = inner
            .favorites
            .get(&normalize(username))
            .cloned()
            .unwrap_or_default();
        return Ok(inner.collect_games(&ids));
    }

    async fn add_to_favorites(&self, username: &str, game_id: i64) -> Result<(), RepositoryError> {
        let mut inner = self.inner.write().await;
        inner.require_refs(username, game_id)?;

        let ids = inner.favorites.entry(normalize(username)).or_default();
        if !ids.contains(&game_id) {
            ids.push(game_id);
        }
        return Ok(());
    }

    async fn remove_from_favorites(
        &self,
        username: &str,
        game_id: i64,
    ) -> Result<(), RepositoryError> {
        let mut inner = self.inner.write().await;
        if let Some(ids) = inner.favorites.get_mut(&normalize(username)) {
            ids.retain(|id| *id != game_id);
        }
        return Ok(());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_game(game_id: i64, title: &str) -> Game {
        return Game {
            game_id,
            title: title.to_string(),
            price: 9.99,
            release_date: "Oct 21, 2008".to_string(),
            description: format!("About {title}"),
            image_url: String::new(),
            publisher_name: "Activision".to_string(),
            genres: vec!["Action".to_string()],
        };
    }

    async fn seeded() -> MemoryRepository {
        let repo = MemoryRepository::new();
        let mut shooter = sample_game(7940, "Call of Duty 4");
        shooter.price = 19.99;

        let mut rally = sample_game(3010, "Xpand Rally");
        rally.publisher_name = "Techland".to_string();
        rally.genres = vec!["Racing".to_string(), "Simulation".to_string()];
        rally.release_date = "Sep 22, 2006".to_string();

        let mut automobilista = sample_game(431600, "Automobilista");
        automobilista.publisher_name = "Reiza Studios".to_string();
        automobilista.genres = vec!["Racing".to_string()];
        automobilista.release_date = "Feb 25, 2016".to_string();
        automobilista.price = 39.99;

        repo.add_games(vec![shooter, rally, automobilista])
            .await
            .unwrap();
        return repo;
    }

    #[tokio::test]
    async fn games_stay_sorted_by_id() {
        let repo = seeded().await;
        repo.add_game(sample_game(1, "AAA First")).await.unwrap();
        repo.add_game(sample_game(900000, "ZZZ Last")).await.unwrap();

        let games = repo.all_games().await.unwrap();
        assert_eq!(games.len(), 5);
        assert!(games.windows(2).all(|w| w[0].game_id < w[1].game_id));
        assert_eq!(games[0].game_id, 1);
        assert_eq!(games[4].game_id, 900000);
    }

    #[tokio::test]
    async fn adding_existing_id_replaces_the_record() {
        let repo = seeded().await;
        repo.add_game(sample_game(7940, "Call of Duty 4: Remastered"))
            .await
            .unwrap();

        assert_eq!(repo.game_count().await.unwrap(), 3);
        let game = repo.game_by_id(7940).await.unwrap().unwrap();
        assert_eq!(game.title, "Call of Duty 4: Remastered");
    }

    #[tokio::test]
    async fn game_by_id_misses_cleanly() {
        let repo = seeded().await;
        assert!(repo.game_by_id(424242).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn empty_publisher_names_are_not_catalogued() {
        let repo = seeded().await;
        let mut unattributed = sample_game(99, "Mystery Game");
        unattributed.publisher_name = String::new();
        repo.add_game(unattributed).await.unwrap();
        repo.add_publisher("").await.unwrap();
        repo.add_publishers(vec![String::new(), "Valve".to_string()])
            .await
            .unwrap();

        assert_eq!(repo.publisher_count().await.unwrap(), 4);
        let names: Vec<String> = repo
            .publishers()
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, vec!["Activision", "Reiza Studios", "Techland", "Valve"]);

        let game = repo.game_by_id(99).await.unwrap().unwrap();
        assert_eq!(game.publisher_name, "");
    }

    #[tokio::test]
    async fn usernames_are_unique_and_case_insensitive() {
        let repo = seeded().await;
        repo.add_user("Bob", "hash").await.unwrap();

        let err = repo.add_user("bob", "other-hash").await.unwrap_err();
        assert!(matches!(err, RepositoryError::DuplicateUser(_)));

        let user = repo.user_by_name("BOB").await.unwrap().unwrap();
        assert_eq!(user.username, "bob");
        assert!(repo.user_by_name("alice").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn review_requires_existing_user_and_game() {
        let repo = seeded().await;
        repo.add_user("bob", "hash").await.unwrap();

        let err = repo.add_review("ghost", 7940, 4, "ok").await.unwrap_err();
        assert!(matches!(err, RepositoryError::UnknownUser(_)));

        let err = repo.add_review("bob", 424242, 4, "ok").await.unwrap_err();
        assert!(matches!(err, RepositoryError::UnknownGame(424242)));
    }

    #[tokio::test]
    async fn review_rating_is_bounded() {
        let repo = seeded().await;
        repo.add_user("bob", "hash").await.unwrap();

        for rating in [0, 6, -1] {
            let err = repo.add_review("bob", 7940, rating, "no").await.unwrap_err();
            assert!(matches!(err, RepositoryError::InvalidRating(_)));
        }
        for rating in [1, 5] {
            repo.add_review("bob", 7940, rating, "yes").await.unwrap();
        }
    }

    #[tokio::test]
    async fn reviews_come_back_newest_first() {
        let repo = seeded().await;
        repo.add_user("bob", "hash").await.unwrap();
        repo.add_review("bob", 7940, 3, "first").await.unwrap();
        repo.add_review("bob", 7940, 5, "second").await.unwrap();
        repo.add_review("bob", 3010, 4, "other game").await.unwrap();

        let reviews = repo.reviews_for_game(7940).await.unwrap();
        assert_eq!(reviews.len(), 2);
        assert_eq!(reviews[0].comment, "second");
        assert_eq!(reviews[1].comment, "first");

        let mine = repo.reviews_by_user("bob").await.unwrap();
        assert_eq!(mine.len(), 3);
    }

    #[tokio::test]
    async fn average_rating_rounds_to_one_decimal() {
        let repo = seeded().await;
        repo.add_user("bob", "hash").await.unwrap();
        repo.add_user("ann", "hash").await.unwrap();

        assert_eq!(repo.average_rating(7940).await.unwrap(), 0.0);

        repo.add_review("bob", 7940, 4, "").await.unwrap();
        repo.add_review("ann", 7940, 5, "").await.unwrap();
        repo.add_review("bob", 7940, 4, "again").await.unwrap();

        // (4 + 5 + 4) / 3 = 4.333...
        assert_eq!(repo.average_rating(7940).await.unwrap(), 4.3);
    }

    #[tokio::test]
    async fn wishlist_keeps_insertion_order_without_duplicates() {
        let repo = seeded().await;
        repo.add_user("bob", "hash").await.unwrap();

        repo.add_to_wishlist("bob", 431600).await.unwrap();
        repo.add_to_wishlist("bob", 3010).await.unwrap();
        repo.add_to_wishlist("bob", 431600).await.unwrap();

        let wishlist = repo.wishlist("bob").await.unwrap();
        let ids: Vec<i64> = wishlist.iter().map(|g| g.game_id).collect();
        assert_eq!(ids, vec![431600, 3010]);

        repo.remove_from_wishlist("bob", 431600).await.unwrap();
        // Removing again is a no-op.
        repo.remove_from_wishlist("bob", 431600).await.unwrap();
        let ids: Vec<i64> = repo
            .wishlist("bob")
            .await
            .unwrap()
            .iter()
            .map(|g| g.game_id)
            .collect();
        assert_eq!(ids, vec![3010]);
    }

    #[tokio::test]
    async fn wishlist_rejects_unknown_references() {
        let repo = seeded().await;
        let err = repo.add_to_wishlist("ghost", 7940).await.unwrap_err();
        assert!(matches!(err, RepositoryError::UnknownUser(_)));

        repo.add_user("bob", "hash").await.unwrap();
        let err = repo.add_to_wishlist("bob", 424242).await.unwrap_err();
        assert!(matches!(err, RepositoryError::UnknownGame(_)));
    }

    #[tokio::test]
    async fn favorites_add_remove_roundtrip() {
        let repo = seeded().await;
        repo.add_user("bob", "hash").await.unwrap();

        repo.add_to_favorites("bob", 7940).await.unwrap();
        repo.add_to_favorites("bob", 7940).await.unwrap();
        assert_eq!(repo.favorites("bob").await.unwrap().len(), 1);

        repo.remove_from_favorites("bob", 7940).await.unwrap();
        assert!(repo.favorites("bob").await.unwrap().is_empty());
        assert!(repo.favorites("nobody").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn genre_names_are_sorted_and_distinct() {
        let repo = seeded().await;
        let genres = repo.genre_names().await.unwrap();
        assert_eq!(genres, vec!["Action", "Racing", "Simulation"]);
    }

    #[tokio::test]
    async fn games_by_genre_filters_and_counts() {
        let repo = seeded().await;
        assert_eq!(repo.game_count_by_genre("All").await.unwrap(), 3);
        assert_eq!(repo.game_count_by_genre("Racing").await.unwrap(), 2);
        assert_eq!(repo.game_count_by_genre("Sports").await.unwrap(), 0);

        let racing = repo.games_by_genre("Racing").await.unwrap();
        assert!(racing.iter().all(|g| g.has_genre("Racing")));
    }

    #[tokio::test]
    async fn pagination_slices_in_title_order() {
        let repo = seeded().await;

        let page = repo.games_page("All", 0, 2).await.unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].title, "Automobilista");
        assert_eq!(page[1].title, "Call of Duty 4");

        let page = repo.games_page("All", 2, 2).await.unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].title, "Xpand Rally");

        // Slicing past the end is empty, not an error.
        assert!(repo.games_page("All", 10, 2).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn search_by_title_is_case_insensitive_substring() {
        let repo = seeded().await;
        let found = repo
            .search_games("duty", SearchFilter::Title, &[])
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].game_id, 7940);

        let found = repo.search_games_by_title("RALLY").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].game_id, 3010);
    }

    #[tokio::test]
    async fn search_by_genre_publisher_and_year() {
        let repo = seeded().await;

        let racing = repo
            .search_games("racing", SearchFilter::Genre, &[])
            .await
            .unwrap();
        assert_eq!(racing.len(), 2);

        let techland = repo
            .search_games("tech", SearchFilter::Publisher, &[])
            .await
            .unwrap();
        assert_eq!(techland.len(), 1);
        assert_eq!(techland[0].game_id, 3010);

        let from_2016 = repo
            .search_games("2016", SearchFilter::ReleaseYear, &[])
            .await
            .unwrap();
        assert_eq!(from_2016.len(), 1);
        assert_eq!(from_2016[0].game_id, 431600);

        let nonsense_year = repo
            .search_games("soon", SearchFilter::ReleaseYear, &[])
            .await
            .unwrap();
        assert!(nonsense_year.is_empty());
    }

    #[tokio::test]
    async fn search_price_filter_keeps_any_matching_band() {
        let repo = seeded().await;
        let ranges = [
            PriceRange { min: 0.0, max: 10.0 },
            PriceRange {
                min: 30.0,
                max: 50.0,
            },
        ];

        let racing = repo
            .search_games("racing", SearchFilter::Genre, &ranges)
            .await
            .unwrap();
        let ids: Vec<i64> = racing.iter().map(|g| g.game_id).collect();
        // 19.99 CoD is not racing; 9.99 rally and 39.99 automobilista both band-match.
        assert_eq!(ids, vec![3010, 431600]);
    }
}
