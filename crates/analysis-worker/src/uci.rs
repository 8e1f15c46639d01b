//! UCI protocol line parsing

use serde::{Deserialize, Serialize};

/// Magnitude a forced mate is normalised to
pub const MATE_SCORE: i32 = 10_000;

/// Engine score for one search line, side-to-move perspective
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Score {
    Cp(i32),
    /// Mate in N moves (positive = side to move mates)
    Mate(i32),
}

impl Score {
    /// Centipawns with mates mapped to +/- MATE_SCORE and everything clamped
    pub fn centipawns(self) -> i32 {
        match self {
            Score::Cp(cp) => cp.clamp(-MATE_SCORE, MATE_SCORE),
            Score::Mate(n) if n > 0 => MATE_SCORE,
            Score::Mate(_) => -MATE_SCORE,
        }
    }

    pub fn mate_in(self) -> Option<i32> {
        match self {
            Score::Mate(n) => Some(n),
            Score::Cp(_) => None,
        }
    }
}

/// A parsed `info` progress line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InfoLine {
    pub depth: u32,
    /// 1-based line index (1 when the engine omits it)
    pub multipv: u32,
    pub score: Score,
    pub pv: Vec<String>,
}

/// One line of engine output
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineLine {
    UciOk,
    ReadyOk,
    Info(InfoLine),
    /// `bestmove` token; empty when the engine reports `(none)`
    BestMove(String),
    /// Anything else (id, option, info string, unknown lines)
    Other,
}

/// Final or intermediate result of a search, scores from the side to move
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationInfo {
    pub depth: u32,
    pub score_centipawns: i32,
    pub mate_in_n: Option<i32>,
    pub best_move: String,
    pub principal_line: Vec<String>,
}

impl EvaluationInfo {
    pub fn from_info(info: &InfoLine) -> Self {
        Self {
            depth: info.depth,
            score_centipawns: info.score.centipawns(),
            mate_in_n: info.score.mate_in(),
            best_move: info.pv.first().cloned().unwrap_or_default(),
            principal_line: info.pv.clone(),
        }
    }
}

pub fn parse_line(line: &str) -> EngineLine {
    let trimmed = line.trim();
    match trimmed {
        "uciok" => return EngineLine::UciOk,
        "readyok" => return EngineLine::ReadyOk,
        _ => {}
    }

    let mut parts = trimmed.split_whitespace();
    match parts.next() {
        Some("bestmove") => {
            let token = parts.next().unwrap_or("");
            if token == "(none)" || token == "0000" {
                EngineLine::BestMove(String::new())
            } else {
                EngineLine::BestMove(token.to_string())
            }
        }
        Some("info") => parse_info(trimmed).map(EngineLine::Info).unwrap_or(EngineLine::Other),
        _ => EngineLine::Other,
    }
}

/// Parse an `info` line; None unless it carries depth, score and pv markers
fn parse_info(line: &str) -> Option<InfoLine> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.get(1) == Some(&"string") {
        return None;
    }

    let mut depth = None;
    let mut multipv = 1;
    let mut score = None;
    let mut pv = Vec::new();

    let mut i = 1;
    while i < parts.len() {
        match parts[i] {
            "depth" => {
                depth = parts.get(i + 1).and_then(|v| v.parse().ok());
                i += 2;
            }
            "multipv" => {
                multipv = parts.get(i + 1).and_then(|v| v.parse().ok()).unwrap_or(1);
                i += 2;
            }
            "score" => {
                let value = parts.get(i + 2).and_then(|v| v.parse::<i32>().ok());
                score = match (parts.get(i + 1), value) {
                    (Some(&"cp"), Some(v)) => Some(Score::Cp(v)),
                    (Some(&"mate"), Some(v)) => Some(Score::Mate(v)),
                    _ => None,
                };
                i += 3;
            }
            "pv" => {
                pv = parts[i + 1..].iter().map(|m| m.to_string()).collect();
                break;
            }
            _ => i += 1,
        }
    }

    if pv.is_empty() {
        return None;
    }
    Some(InfoLine {
        depth: depth?,
        multipv,
        score: score?,
        pv,
    })
}
