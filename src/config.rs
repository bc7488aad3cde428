use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::bail;

use crate::result::Result;

/// Which persistence backend to run against. Handlers never see this;
/// they only get the trait object picked at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Memory,
    Database,
}

impl FromStr for Backend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        return match s.trim().to_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "database" => Ok(Self::Database),
            other => bail!("unknown REPOSITORY backend '{other}' (expected memory or database)"),
        };
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server_host: String,
    pub server_port: u16,

    pub backend: Backend,
    pub database_url: String,
    pub data_path: PathBuf,
}

pub fn build() -> Result<Config> {
    let server_host = var_or("SERVER_HOST", "127.0.0.1");
    let server_port = var_or("SERVER_PORT", "8080").parse()?;

    let backend = var_or("REPOSITORY", "memory").parse()?;
    let database_url = var_or("DATABASE_URL", "sqlite:games.db");
    let data_path = PathBuf::from(var_or("GAMES_DATA_PATH", "data/games.csv"));

    return Ok(Config {
        server_host,
        server_port,
        backend,
        database_url,
        data_path,
    });
}

fn var_or(key: &str, default: &str) -> String {
    return env::var(key).unwrap_or_else(|_| default.to_string());
}
