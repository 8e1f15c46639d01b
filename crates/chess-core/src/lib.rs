//! Game-record handling shared by the analysis pipeline: PGN extraction and
//! SAN replay into per-ply positions.

pub mod game_data;
pub mod pgn;
pub mod replay;

pub use game_data::{GameData, GameMetadata, Side};
pub use replay::{PgnError, ReplayedGame, ReplayedPly};
