pub use chess;

pub mod board_utils;
pub mod puzzle;
pub mod tactics;
