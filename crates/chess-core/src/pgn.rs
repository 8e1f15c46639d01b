//! PGN parsing utilities: a lightweight regex-based parser.

use std::sync::OnceLock;

use regex::Regex;

use crate::game_data::{GameData, GameMetadata};

pub const STANDARD_START_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

fn header_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"\[(\w+)\s+"([^"]*)"\]"#).expect("header regex"))
}

fn move_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"O-O-O|O-O|0-0-0|0-0|[KQRBN]?[a-h]?[1-8]?x?[a-h][1-8](?:=?[QRBN])?[+#]?")
            .expect("move regex")
    })
}

/// Parse a PGN string into a GameData struct.
/// Returns None when the text has neither headers nor moves.
pub fn parse_pgn(pgn: &str) -> Option<GameData> {
    let mut metadata = GameMetadata {
        white: "Unknown".to_string(),
        black: "Unknown".to_string(),
        result: "*".to_string(),
        ..GameMetadata::default()
    };
    let mut setup = None;
    let mut fen = None;
    let mut saw_header = false;

    for cap in header_re().captures_iter(pgn) {
        saw_header = true;
        let key = &cap[1];
        let value = cap[2].to_string();
        match key {
            "White" => metadata.white = value,
            "Black" => metadata.black = value,
            "Result" => metadata.result = value,
            "Date" | "UTCDate" if metadata.date.is_none() => metadata.date = Some(value),
            "TimeControl" => metadata.time_control = Some(value),
            "ECO" => metadata.eco = Some(value),
            "Opening" => metadata.opening = Some(value),
            "Event" => metadata.event = Some(value),
            "Link" | "Site" if metadata.link.is_none() => metadata.link = Some(value),
            "SetUp" => setup = Some(value),
            "FEN" => fen = Some(value),
            _ => {}
        }
    }

    // Custom start positions only count when SetUp says so (or is absent)
    if setup.as_deref() != Some("0") {
        if let Some(f) = fen {
            if f != STANDARD_START_FEN {
                metadata.setup_fen = Some(f);
            }
        }
    }

    let moves = extract_moves(pgn);
    if moves.is_empty() && !saw_header {
        return None;
    }

    Some(GameData {
        metadata,
        moves,
        pgn: pgn.to_string(),
    })
}

/// Extract SAN moves from PGN text (after removing headers, comments, variations).
pub fn extract_moves(pgn: &str) -> Vec<String> {
    let movetext = strip_annotations(&header_re().replace_all(pgn, ""));

    move_re()
        .find_iter(&movetext)
        .map(|m| normalize_castling(m.as_str()))
        .collect()
}

/// Remove `{...}` comments, `;` line comments and (possibly nested) variations.
fn strip_annotations(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut depth = 0usize;
    let mut in_brace = false;
    let mut in_line_comment = false;

    for c in text.chars() {
        if in_line_comment {
            if c == '\n' {
                in_line_comment = false;
                out.push(' ');
            }
            continue;
        }
        if in_brace {
            if c == '}' {
                in_brace = false;
                out.push(' ');
            }
            continue;
        }
        match c {
            '{' => in_brace = true,
            ';' if depth == 0 => in_line_comment = true,
            '(' => depth += 1,
            ')' => {
                depth = depth.saturating_sub(1);
                out.push(' ');
            }
            _ if depth == 0 => out.push(c),
            _ => {}
        }
    }

    out
}

fn normalize_castling(san: &str) -> String {
    match san {
        "0-0" => "O-O".to_string(),
        "0-0-0" => "O-O-O".to_string(),
        other => other.to_string(),
    }
}

/// Extract a string value from a PGN header.
pub fn extract_header(pgn: &str, header_name: &str) -> Option<String> {
    let pattern = format!(r#"\[{}\s+"([^"]*)"\]"#, regex::escape(header_name));
    let re = Regex::new(&pattern).ok()?;
    let value = re.captures(pgn)?.get(1)?.as_str().to_string();
    if value.is_empty() { None } else { Some(value) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pgn_basic() {
        let pgn = r#"[White "Player1"]
[Black "Player2"]
[Result "1-0"]
[Date "2025.01.15"]
[TimeControl "600"]
[Opening "King's Pawn Game"]

1. e4 e5 2. Nf3 Nc6 1-0"#;

        let game = parse_pgn(pgn).unwrap();
        assert_eq!(game.metadata.white, "Player1");
        assert_eq!(game.metadata.black, "Player2");
        assert_eq!(game.metadata.result, "1-0");
        assert_eq!(game.metadata.opening_name(), Some("King's Pawn Game"));
        assert_eq!(game.moves, vec!["e4", "e5", "Nf3", "Nc6"]);
    }

    #[test]
    fn test_comments_and_nested_variations_are_skipped() {
        let pgn = "1. e4 {best by test} e5 (1... c5 2. Nf3 (2. c3 d5) d6) 2. Nf3 ; a comment Nc3\n Nc6 *";
        assert_eq!(extract_moves(pgn), vec!["e4", "e5", "Nf3", "Nc6"]);
    }

    #[test]
    fn test_castling_and_promotion_tokens() {
        let moves = extract_moves("1. O-O 0-0-0 2. e8=Q+ bxa1=N# 0-1");
        assert_eq!(moves, vec!["O-O", "O-O-O", "e8=Q+", "bxa1=N#"]);
    }

    #[test]
    fn test_eco_is_opening_fallback() {
        let game = parse_pgn("[ECO \"C20\"]\n\n1. e4 e5 *").unwrap();
        assert_eq!(game.metadata.opening_name(), Some("C20"));
    }

    #[test]
    fn test_custom_setup_fen_is_kept() {
        let pgn = "[SetUp \"1\"]\n[FEN \"4k3/8/8/8/8/8/4P3/4K3 w - - 0 1\"]\n\n1. e4 *";
        let game = parse_pgn(pgn).unwrap();
        assert_eq!(
            game.metadata.setup_fen.as_deref(),
            Some("4k3/8/8/8/8/8/4P3/4K3 w - - 0 1")
        );
    }

    #[test]
    fn test_extract_header() {
        let pgn = "[WhiteElo \"1500\"]\n[Site \"\"]";
        assert_eq!(extract_header(pgn, "WhiteElo").as_deref(), Some("1500"));
        assert_eq!(extract_header(pgn, "Site"), None);
        assert_eq!(extract_header(pgn, "Missing"), None);
    }

    #[test]
    fn test_empty_text_is_rejected() {
        assert!(parse_pgn("   ").is_none());
    }
}
