use std::collections::BTreeSet;
use std::path::Path;

use super::{GameRepository, RepositoryError};
use crate::models::Game;

use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum PopulateError {
    #[error("could not read seed file: {0}")]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// One row of the seed file. `genres` is a comma-separated list inside
/// a single quoted field.
#[derive(Debug, Deserialize)]
struct GameRow {
    game_id: String,
    title: String,
    price: String,
    release_date: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    image_url: String,
    publisher: String,
    #[serde(default)]
    genres: String,
}

impl GameRow {
    /// Rows with an unparseable id or price are skipped, not fatal.
    fn into_game(self) -> Option<Game> {
        let game_id = match self.game_id.trim().parse() {
            Ok(id) => id,
            Err(_) => {
                warn!(game_id = %self.game_id, title = %self.title, "skipping row: bad game id");
                return None;
            }
        };
        let price = match self.price.trim().parse() {
            Ok(price) => price,
            Err(_) => {
                warn!(game_id, price = %self.price, "skipping row: bad price");
                return None;
            }
        };

        return Some(Game {
            game_id,
            title: self.title.trim().to_string(),
            price,
            release_date: self.release_date.trim().to_string(),
            description: self.description.trim().to_string(),
            image_url: self.image_url.trim().to_string(),
            publisher_name: self.publisher.trim().to_string(),
            genres: self
                .genres
                .split(',')
                .map(|g| g.trim().to_string())
                .filter(|g| !g.is_empty())
                .collect(),
        });
    }
}

/// Read the seed CSV and bulk-load publishers, genres, then games into
/// whichever backend is active.
pub async fn populate(repo: &dyn GameRepository, data_path: &Path) -> Result<(), PopulateError> {
    let mut reader = csv::Reader::from_path(data_path)?;

    let mut games = Vec::new();
    for row in reader.deserialize::<GameRow>() {
        let row = match row {
            Ok(row) => row,
            Err(err) => {
                warn!(%err, "skipping malformed seed row");
                continue;
            }
        };
        if let Some(game) = row.into_game() {
            games.push(game);
        }
    }

    let publishers: BTreeSet<String> = games
        .iter()
        .map(|g| g.publisher_name.clone())
        .filter(|p| !p.is_empty())
        .collect();
    let genres: BTreeSet<String> = games
        .iter()
        .flat_map(|g| g.genres.iter().cloned())
        .collect();

    info!(
        games = games.len(),
        publishers = publishers.len(),
        genres = genres.len(),
        path = %data_path.display(),
        "populating repository from seed file"
    );

    repo.add_publishers(publishers.into_iter().collect()).await?;
    repo.add_genres(genres.into_iter().collect()).await?;
    repo.add_games(games).await?;

    return Ok(());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::memory::MemoryRepository;

    use std::io::Write;

    const HEADER: &str = "game_id,title,price,release_date,description,image_url,publisher,genres";

    fn seed_file(rows: &[&str]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "{HEADER}").unwrap();
        for row in rows {
            writeln!(file, "{row}").unwrap();
        }
        return file;
    }

    #[tokio::test]
    async fn loads_games_publishers_and_genres() {
        let file = seed_file(&[
            r#"7940,Call of Duty 4,19.99,"Nov 12, 2007",Shooter.,http://img/cod4.jpg,Activision,"Action""#,
            r#"3010,Xpand Rally,9.99,"Sep 22, 2006",Rally racing.,http://img/xr.jpg,Techland,"Racing,Simulation""#,
            r#"1228870,Bartlow's Dread Machine,19.99,"Sep 29, 2020",Arcade.,http://img/bdm.jpg,Beep Games,"Action,Adventure""#,
        ]);

        let repo = MemoryRepository::new();
        populate(&repo, file.path()).await.unwrap();

        assert_eq!(repo.game_count().await.unwrap(), 3);
        assert_eq!(repo.publisher_count().await.unwrap(), 3);
        assert_eq!(
            repo.genre_names().await.unwrap(),
            vec!["Action", "Adventure", "Racing", "Simulation"]
        );

        let rally = repo.game_by_id(3010).await.unwrap().unwrap();
        assert_eq!(rally.publisher_name, "Techland");
        assert_eq!(rally.genres, vec!["Racing", "Simulation"]);
        assert_eq!(rally.release_date, "Sep 22, 2006");
    }

    #[tokio::test]
    async fn bad_rows_are_skipped_not_fatal() {
        let file = seed_file(&[
            r#"not-a-number,Broken Id,9.99,"Jan 1, 2020",,,Nobody,"Indie""#,
            r#"10,Broken Price,free,"Jan 1, 2020",,,Nobody,"Indie""#,
            r#"11,Fine Game,4.99,"Jan 1, 2020",,,Somebody,"Indie""#,
        ]);

        let repo = MemoryRepository::new();
        populate(&repo, file.path()).await.unwrap();

        assert_eq!(repo.game_count().await.unwrap(), 1);
        assert_eq!(
            repo.game_by_id(11).await.unwrap().unwrap().title,
            "Fine Game"
        );
    }

    #[tokio::test]
    async fn missing_file_is_an_error() {
        let repo = MemoryRepository::new();
        let err = populate(&repo, Path::new("no/such/games.csv")).await;
        assert!(matches!(err, Err(PopulateError::Csv(_))));
    }
}
