//! Error types shared across the engine.

use thiserror::Error;

/// All errors the engine can produce.
#[derive(Error, Debug)]
pub enum YumError {
    /// A required input file was not found or could not be read.
    #[error("missing input: {0}")]
    MissingInput(String),

    /// The reroll probability table failed header or shape validation.
    #[error("invalid reroll table: {0}")]
    InvalidTable(String),

    /// The state index map failed header or shape validation.
    #[error("invalid state map: {0}")]
    InvalidMap(String),

    /// A dice hand or dice index was outside the valid domain.
    #[error("invalid dice: {0}")]
    InvalidDice(String),

    /// A state or dice index was out of bounds for its table.
    #[error("invalid index: {0}")]
    InvalidIndex(String),

    /// A runtime invariant the solver depends on did not hold.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    /// An I/O operation failed.
    #[error("io failure: {0}")]
    IoFailure(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, YumError>;
