//! Error taxonomy for the parts of the engine that can actually fail.
//!
//! Most illegal states in this engine are either ordinary results (no legal
//! moves in this position is just a [`crate::status::GameStatus`], not an
//! error) or programmer errors (undoing past the start of history is a bug
//! at the call site, so it panics instead of returning a `Result`).

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("invalid FEN: {0}")]
    InvalidFen(String),
}
