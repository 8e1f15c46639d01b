use reqwest::{Client, StatusCode};
use serde_json::Value;
use tracing::{info, warn};

use super::{api_url, http_client, pgn_date, GameRecord, Platform};
use crate::error::WorkerError;

const LICHESS_API: &str = "https://lichess.org/api";

pub struct LichessClient {
    client: Client,
    base_url: String,
}

impl LichessClient {
    pub fn new() -> Result<Self, WorkerError> {
        Ok(Self {
            client: http_client(120)?,
            base_url: LICHESS_API.to_string(),
        })
    }

    /// Fetch a user's most recent games, newest first.
    pub async fn fetch_user_games(
        &self,
        username: &str,
        max_games: usize,
    ) -> Result<Vec<GameRecord>, WorkerError> {
        let url = api_url(&self.base_url, &["games", "user", username])?;
        let params = [
            ("max", max_games.to_string()),
            ("pgnInJson", "true".to_string()),
            ("opening", "true".to_string()),
            ("clocks", "false".to_string()),
            ("evals", "false".to_string()),
        ];

        let resp = self
            .client
            .get(url)
            .query(&params)
            .header("Accept", "application/x-ndjson")
            .send()
            .await
            .map_err(|e| WorkerError::PlatformUnavailable(format!("Lichess request error: {e}")))?;

        if resp.status() == StatusCode::NOT_FOUND {
            return Err(WorkerError::UserNotFound(username.to_string()));
        }
        if !resp.status().is_success() {
            return Err(WorkerError::PlatformUnavailable(format!(
                "Lichess HTTP {}",
                resp.status()
            )));
        }

        let text = resp
            .text()
            .await
            .map_err(|e| WorkerError::PlatformUnavailable(format!("Lichess body read error: {e}")))?;

        let games = parse_ndjson(&text, max_games);
        info!(username, count = games.len(), "Fetched Lichess games");
        Ok(games)
    }
}

/// One JSON object per line; lines without a PGN are skipped
pub fn parse_ndjson(text: &str, limit: usize) -> Vec<GameRecord> {
    let mut results = Vec::new();

    for line in text.lines() {
        if results.len() >= limit {
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let game: Value = match serde_json::from_str(line) {
            Ok(v) => v,
            Err(e) => {
                warn!("Failed to parse Lichess game JSON: {e}");
                continue;
            }
        };
        let Some(pgn) = game.get("pgn").and_then(|v| v.as_str()).filter(|p| !p.is_empty()) else {
            continue;
        };
        let game_id = game.get("id").and_then(|v| v.as_str()).unwrap_or("");

        let mut record = GameRecord::new(game_id, Platform::Lichess, pgn);
        record.time_control = game.get("speed").and_then(|v| v.as_str()).map(String::from);
        record.date = game
            .get("createdAt")
            .and_then(|v| v.as_i64())
            .and_then(|ms| pgn_date(ms / 1000));
        results.push(record);
    }

    results
}
