//! A piece-table text buffer: an in-memory, mutation-friendly document
//! representation over an immutable original buffer and an append-only
//! added buffer, indexed by a red-black tree carrying per-subtree length and
//! line-feed aggregates.
//!
//! Typical usage goes through [`builder::PieceTableBuilder`] to assemble a
//! [`piece_table::PieceTable`] from one or more chunks, then mutates it with
//! [`piece_table::PieceTable::insert_at`]/[`piece_table::PieceTable::delete_at`].

pub mod buffer;
pub mod builder;
pub mod char_class;
pub mod error;
pub mod piece;
pub mod piece_table;
pub mod tree;
pub mod types;

pub use builder::PieceTableBuilder;
pub use error::{Error, Result};
pub use piece_table::PieceTable;
pub use types::{BuilderConfig, Eol, Position, Range};
