/// Puzzle acceptance rules: validity margin, solution line shape, alternative caps

/// Best move must beat the next-best alternative by strictly more than this
pub const VALIDITY_MARGIN: i32 = 200;

/// Solution line length bounds (in half-moves)
pub const MAX_SOLUTION_PLIES: usize = 5;
pub const MIN_SOLUTION_PLIES: usize = 3;

/// Alternatives re-scored per candidate position
pub const MAX_ALTERNATIVES: usize = 5;

/// Lines requested by the shallow pre-scan (best move plus alternatives)
pub const PRESCAN_LINES: u32 = MAX_ALTERNATIVES as u32 + 1;

/// Default number of puzzles generated per job
pub const DEFAULT_PUZZLE_TARGET: usize = 25;

pub fn is_valid_margin(best: i32, second_best: i32) -> bool {
    best - second_best > VALIDITY_MARGIN
}

/// Cut a principal line down to a solution line. Lines shorter than the
/// minimum are only accepted when they end the game by mate.
pub fn trim_solution(line: &[String], ends_in_mate: impl Fn(&[String]) -> bool) -> Option<Vec<String>> {
    let solution: Vec<String> = line.iter().take(MAX_SOLUTION_PLIES).cloned().collect();
    if solution.is_empty() {
        return None;
    }
    if solution.len() < MIN_SOLUTION_PLIES && !ends_in_mate(&solution) {
        return None;
    }
    Some(solution)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(s: &str) -> Vec<String> {
        s.split_whitespace().map(String::from).collect()
    }

    #[test]
    fn test_margin_is_strict() {
        assert!(!is_valid_margin(300, 100));
        assert!(is_valid_margin(301, 100));
        assert!(is_valid_margin(10000, -10000));
        assert!(!is_valid_margin(-50, -250));
    }

    #[test]
    fn test_trim_solution_caps_length() {
        let long = line("e2e4 e7e5 g1f3 b8c6 f1b5 a7a6 b5a4");
        let trimmed = trim_solution(&long, |_| false).unwrap();
        assert_eq!(trimmed.len(), MAX_SOLUTION_PLIES);
        assert_eq!(trimmed[4], "f1b5");
    }

    #[test]
    fn test_short_line_needs_mate() {
        assert!(trim_solution(&line("a1a8"), |_| false).is_none());
        assert_eq!(trim_solution(&line("a1a8"), |_| true), Some(line("a1a8")));
        assert!(trim_solution(&[], |_| true).is_none());
    }
}
