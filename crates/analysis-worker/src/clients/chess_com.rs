use reqwest::{Client, StatusCode};
use serde_json::Value;
use tracing::info;

use super::{api_url, http_client, pgn_date, GameRecord, Platform};
use crate::error::WorkerError;

const CHESS_COM_API: &str = "https://api.chess.com/pub";

pub struct ChessComClient {
    client: Client,
    base_url: String,
}

impl ChessComClient {
    pub fn new() -> Result<Self, WorkerError> {
        Ok(Self {
            client: http_client(30)?,
            base_url: CHESS_COM_API.to_string(),
        })
    }

    /// Monthly archive URLs, newest first.
    pub async fn fetch_archives(&self, username: &str) -> Result<Vec<String>, WorkerError> {
        let player = username.to_lowercase();
        let url = api_url(&self.base_url, &["player", &player, "games", "archives"])?;

        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| WorkerError::PlatformUnavailable(format!("Archives request error: {e}")))?;

        if resp.status() == StatusCode::NOT_FOUND {
            return Err(WorkerError::UserNotFound(username.to_string()));
        }
        if !resp.status().is_success() {
            return Err(WorkerError::PlatformUnavailable(format!(
                "Archives HTTP {}",
                resp.status()
            )));
        }

        let data: Value = resp
            .json()
            .await
            .map_err(|e| WorkerError::PlatformUnavailable(format!("Archives JSON parse error: {e}")))?;

        let mut archives: Vec<String> = data["archives"]
            .as_array()
            .cloned()
            .unwrap_or_default()
            .iter()
            .filter_map(|v| v.as_str().map(String::from))
            .collect();
        // Archive URLs end in /YYYY/MM, so lexical order is chronological
        archives.sort();
        archives.reverse();
        Ok(archives)
    }

    /// Fetch a user's most recent games, newest first.
    pub async fn fetch_user_games(
        &self,
        username: &str,
        max_games: usize,
    ) -> Result<Vec<GameRecord>, WorkerError> {
        let archives = self.fetch_archives(username).await?;
        let mut results = Vec::new();

        for archive_url in archives {
            if results.len() >= max_games {
                break;
            }

            let resp = self
                .client
                .get(&archive_url)
                .send()
                .await
                .map_err(|e| WorkerError::PlatformUnavailable(format!("Archive request error: {e}")))?;
            if !resp.status().is_success() {
                return Err(WorkerError::PlatformUnavailable(format!(
                    "Archive HTTP {}",
                    resp.status()
                )));
            }
            let data: Value = resp
                .json()
                .await
                .map_err(|e| WorkerError::PlatformUnavailable(format!("Archive JSON parse error: {e}")))?;

            let remaining = max_games - results.len();
            results.extend(parse_archive(&data, remaining));
        }

        info!(username, count = results.len(), "Fetched Chess.com games");
        Ok(results)
    }
}

/// Games of one monthly archive, newest first, variants skipped
pub fn parse_archive(data: &Value, limit: usize) -> Vec<GameRecord> {
    let games = data["games"].as_array().cloned().unwrap_or_default();
    let mut results = Vec::new();

    for game in games.iter().rev() {
        if results.len() >= limit {
            break;
        }
        let rules = game.get("rules").and_then(|v| v.as_str()).unwrap_or("chess");
        if rules != "chess" {
            continue;
        }
        let Some(pgn) = game.get("pgn").and_then(|v| v.as_str()).filter(|p| !p.is_empty()) else {
            continue;
        };

        let game_id = game
            .get("uuid")
            .and_then(|v| v.as_str())
            .map(String::from)
            .or_else(|| {
                game.get("url")
                    .and_then(|v| v.as_str())
                    .and_then(|u| u.rsplit('/').next())
                    .map(String::from)
            })
            .unwrap_or_default();

        let mut record = GameRecord::new(&game_id, Platform::ChessCom, pgn);
        record.time_control = game.get("time_class").and_then(|v| v.as_str()).map(String::from);
        record.date = game.get("end_time").and_then(|v| v.as_i64()).and_then(pgn_date);
        results.push(record);
    }

    results
}
