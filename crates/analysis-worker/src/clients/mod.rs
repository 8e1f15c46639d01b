//! Game sources: fetch a user's recent games from a chess platform

pub mod chess_com;
pub mod lichess;

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::WorkerError;

pub use chess_com::ChessComClient;
pub use lichess::LichessClient;

const USER_AGENT: &str = "ChessGenie/1.0";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Platform {
    Lichess,
    ChessCom,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Lichess => "LICHESS",
            Platform::ChessCom => "CHESS_COM",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = WorkerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "LICHESS" => Ok(Platform::Lichess),
            "CHESS_COM" | "CHESSCOM" => Ok(Platform::ChessCom),
            other => Err(WorkerError::InvalidRequest(format!("Unsupported platform: {other}"))),
        }
    }
}

/// One fetched game: the PGN plus whatever the platform reports beside it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameRecord {
    pub game_id: String,
    pub platform: Platform,
    pub pgn: String,
    pub date: Option<String>,
    pub time_control: Option<String>,
}

impl GameRecord {
    pub fn new(game_id: &str, platform: Platform, pgn: &str) -> Self {
        Self {
            game_id: game_id.to_string(),
            platform,
            pgn: pgn.to_string(),
            date: None,
            time_control: None,
        }
    }
}

/// Newest-first list of a user's games, at most `limit` long
#[async_trait]
pub trait GameSource: Send + Sync {
    async fn fetch_games(
        &self,
        platform: Platform,
        username: &str,
        limit: usize,
    ) -> Result<Vec<GameRecord>, WorkerError>;
}

/// Dispatches to the client for the requested platform
pub struct PlatformRouter {
    lichess: LichessClient,
    chess_com: ChessComClient,
}

impl PlatformRouter {
    pub fn new() -> Result<Self, WorkerError> {
        Ok(Self {
            lichess: LichessClient::new()?,
            chess_com: ChessComClient::new()?,
        })
    }
}

#[async_trait]
impl GameSource for PlatformRouter {
    async fn fetch_games(
        &self,
        platform: Platform,
        username: &str,
        limit: usize,
    ) -> Result<Vec<GameRecord>, WorkerError> {
        match platform {
            Platform::Lichess => self.lichess.fetch_user_games(username, limit).await,
            Platform::ChessCom => self.chess_com.fetch_user_games(username, limit).await,
        }
    }
}

fn http_client(timeout_secs: u64) -> Result<reqwest::Client, WorkerError> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| WorkerError::Config(format!("HTTP client: {e}")))
}

/// Base URL plus path segments, each percent-encoded on its own so a
/// username can never reach another endpoint
fn api_url(base: &str, segments: &[&str]) -> Result<reqwest::Url, WorkerError> {
    let mut url = reqwest::Url::parse(base)
        .map_err(|e| WorkerError::Config(format!("Bad API base URL {base}: {e}")))?;
    url.path_segments_mut()
        .map_err(|_| WorkerError::Config(format!("API base URL cannot take a path: {base}")))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// Epoch timestamp rendered the way PGN dates are written
fn pgn_date(seconds: i64) -> Option<String> {
    chrono::DateTime::from_timestamp(seconds, 0).map(|dt| dt.format("%Y.%m.%d").to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_parsing() {
        assert_eq!("lichess".parse::<Platform>().unwrap(), Platform::Lichess);
        assert_eq!("CHESS_COM".parse::<Platform>().unwrap(), Platform::ChessCom);
        assert_eq!("chesscom".parse::<Platform>().unwrap(), Platform::ChessCom);
        assert!("fics".parse::<Platform>().is_err());
    }

    #[test]
    fn test_platform_serializes_like_request() {
        assert_eq!(serde_json::to_string(&Platform::ChessCom).unwrap(), "\"CHESS_COM\"");
        assert_eq!(serde_json::to_string(&Platform::Lichess).unwrap(), "\"LICHESS\"");
    }

    #[test]
    fn test_api_url_encodes_each_segment() {
        let url = api_url("https://lichess.org/api", &["games", "user", "a b/../x?y"]).unwrap();
        assert_eq!(url.as_str(), "https://lichess.org/api/games/user/a%20b%2F..%2Fx%3Fy");

        let url = api_url("https://api.chess.com/pub/", &["player", "hikaru", "games", "archives"]).unwrap();
        assert_eq!(url.as_str(), "https://api.chess.com/pub/player/hikaru/games/archives");
    }

    #[test]
    fn test_pgn_date() {
        assert_eq!(pgn_date(1_700_000_000).as_deref(), Some("2023.11.14"));
    }
}
