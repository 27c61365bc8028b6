//! Error types for the piece table core.

/// Errors a caller of [`crate::piece_table::PieceTable`] or
/// [`crate::builder::PieceTableBuilder`] can observe.
///
/// Internal consistency failures (a rotation that left aggregates out of
/// sync, a red-black color violation) are not represented here: per the
/// invariants they are programming errors, not recoverable conditions, and
/// are checked with `debug_assert!` at the point they're stated rather than
/// surfaced as a `Result` callers are expected to branch on.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("offset {offset} out of range (buffer length {length})")]
    OutOfRange { offset: usize, length: usize },

    #[error("line {line} out of range (line count {line_count})")]
    LineOutOfRange { line: usize, line_count: usize },

    #[error("builder method called in wrong phase: {0}")]
    InvalidPhase(&'static str),
}

pub type Result<T> = std::result::Result<T, Error>;
