/// Board utility functions for tactical pattern checks

use std::str::FromStr;

use chess::{BitBoard, Board, ChessMove, Color, File, Piece, Rank, Square, EMPTY};

// Piece values for material comparisons
pub const PAWN_VALUE: i32 = 1;
pub const KNIGHT_VALUE: i32 = 3;
pub const BISHOP_VALUE: i32 = 3;
pub const ROOK_VALUE: i32 = 5;
pub const QUEEN_VALUE: i32 = 9;
pub const KING_VALUE: i32 = 99;

/// Piece value, king counted as worth more than everything else
pub fn piece_value(piece: Piece) -> i32 {
    match piece {
        Piece::Pawn => PAWN_VALUE,
        Piece::Knight => KNIGHT_VALUE,
        Piece::Bishop => BISHOP_VALUE,
        Piece::Rook => ROOK_VALUE,
        Piece::Queen => QUEEN_VALUE,
        Piece::King => KING_VALUE,
    }
}

/// Rook, queen or king: the targets that make a double attack a fork
pub fn is_major_target(piece: Piece) -> bool {
    piece_value(piece) >= ROOK_VALUE
}

/// Is this a sliding piece?
pub fn is_ray_piece(piece: Piece) -> bool {
    matches!(piece, Piece::Queen | Piece::Rook | Piece::Bishop)
}

pub fn piece_name(piece: Piece) -> &'static str {
    match piece {
        Piece::Pawn => "pawn",
        Piece::Knight => "knight",
        Piece::Bishop => "bishop",
        Piece::Rook => "rook",
        Piece::Queen => "queen",
        Piece::King => "king",
    }
}

/// Squares attacked by the piece standing on `square`
pub fn attacks(board: &Board, square: Square) -> BitBoard {
    let (piece, color) = match (board.piece_on(square), board.color_on(square)) {
        (Some(p), Some(c)) => (p, c),
        _ => return EMPTY,
    };

    match piece {
        Piece::Pawn => pawn_attacks(square, color),
        Piece::Knight => chess::get_knight_moves(square),
        Piece::King => chess::get_king_moves(square),
        Piece::Bishop => chess::get_bishop_moves(square, *board.combined()),
        Piece::Rook => chess::get_rook_moves(square, *board.combined()),
        Piece::Queen => {
            chess::get_bishop_moves(square, *board.combined())
                | chess::get_rook_moves(square, *board.combined())
        }
    }
}

/// Diagonal capture squares of a pawn
pub fn pawn_attacks(square: Square, color: Color) -> BitBoard {
    let file = square.get_file().to_index() as i32;
    let rank = square.get_rank().to_index() as i32;
    let forward = match color {
        Color::White => rank + 1,
        Color::Black => rank - 1,
    };

    let mut result = EMPTY;
    if !(0..8).contains(&forward) {
        return result;
    }
    for df in [-1, 1] {
        let f = file + df;
        if (0..8).contains(&f) {
            result |= BitBoard::from_square(Square::make_square(
                Rank::from_index(forward as usize),
                File::from_index(f as usize),
            ));
        }
    }
    result
}

/// Enemy pieces (piece, square) attacked from `from_square`
pub fn attacked_enemy_pieces(board: &Board, from_square: Square, pov: Color) -> Vec<(Piece, Square)> {
    let mut result = Vec::new();
    for sq in attacks(board, from_square) {
        if let (Some(piece), Some(color)) = (board.piece_on(sq), board.color_on(sq)) {
            if color != pov {
                result.push((piece, sq));
            }
        }
    }
    result
}

/// Does a slider on `from` move along the line towards `to`?
pub fn slides_towards(piece: Piece, from: Square, to: Square) -> bool {
    let df = (from.get_file().to_index() as i32 - to.get_file().to_index() as i32).abs();
    let dr = (from.get_rank().to_index() as i32 - to.get_rank().to_index() as i32).abs();
    let diagonal = df == dr && df != 0;
    let orthogonal = (df == 0) != (dr == 0);
    match piece {
        Piece::Bishop => diagonal,
        Piece::Rook => orthogonal,
        Piece::Queen => diagonal || orthogonal,
        _ => false,
    }
}

/// First occupied square beyond `through` on the ray from `from`
pub fn next_piece_beyond(board: &Board, from: Square, through: Square) -> Option<Square> {
    let ray = chess::line(from, through);
    if ray == EMPTY {
        return None;
    }
    let from_dist = square_distance(from, through);
    let occupied = *board.combined();
    let mut best: Option<(u32, Square)> = None;

    for sq in ray & occupied {
        if sq == from || sq == through {
            continue;
        }
        // Beyond `through`: farther from `from` and `through` lies between them
        let dist = square_distance(from, sq);
        if dist <= from_dist {
            continue;
        }
        if (chess::between(from, sq) & BitBoard::from_square(through)) == EMPTY {
            continue;
        }
        if best.map(|(d, _)| dist < d).unwrap_or(true) {
            best = Some((dist, sq));
        }
    }

    let (_, sq) = best?;
    // Nothing may stand between `through` and the piece found
    if (chess::between(through, sq) & occupied) != EMPTY {
        return None;
    }
    Some(sq)
}

/// Distance between two squares (Chebyshev distance)
pub fn square_distance(s1: Square, s2: Square) -> u32 {
    let r1 = s1.get_rank().to_index() as i32;
    let r2 = s2.get_rank().to_index() as i32;
    let f1 = s1.get_file().to_index() as i32;
    let f2 = s2.get_file().to_index() as i32;
    (r1 - r2).unsigned_abs().max((f1 - f2).unsigned_abs())
}

/// Parse a board from FEN
pub fn board_from_fen(fen: &str) -> Option<Board> {
    Board::from_str(fen).ok()
}

/// Parse a UCI move and check it is legal on `board`
pub fn parse_uci_move(board: &Board, uci: &str) -> Option<ChessMove> {
    let bytes = uci.as_bytes();
    if bytes.len() < 4 {
        return None;
    }
    let square = |file: u8, rank: u8| -> Option<Square> {
        if !(b'a'..=b'h').contains(&file) || !(b'1'..=b'8').contains(&rank) {
            return None;
        }
        Some(Square::make_square(
            Rank::from_index((rank - b'1') as usize),
            File::from_index((file - b'a') as usize),
        ))
    };
    let from = square(bytes[0], bytes[1])?;
    let to = square(bytes[2], bytes[3])?;

    let promotion = match bytes.get(4) {
        Some(b'q') | Some(b'Q') => Some(Piece::Queen),
        Some(b'r') | Some(b'R') => Some(Piece::Rook),
        Some(b'b') | Some(b'B') => Some(Piece::Bishop),
        Some(b'n') | Some(b'N') => Some(Piece::Knight),
        Some(_) => return None,
        None => None,
    };

    let m = ChessMove::new(from, to, promotion);
    if board.legal(m) { Some(m) } else { None }
}

/// Is the move a capture (including en passant)?
pub fn captured_piece(board: &Board, m: ChessMove) -> Option<Piece> {
    if let Some(p) = board.piece_on(m.get_dest()) {
        return Some(p);
    }
    let is_pawn = board.piece_on(m.get_source()) == Some(Piece::Pawn);
    let diagonal = m.get_source().get_file() != m.get_dest().get_file();
    if is_pawn && diagonal {
        Some(Piece::Pawn)
    } else {
        None
    }
}
