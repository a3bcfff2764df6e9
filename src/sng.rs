//! SNG arrangement compilation and binary encoding.
//!
//! The [`model::Song`] intermediate carries everything the game's binary
//! SNG format stores, plus the source-side fields (technique booleans,
//! display names, hero levels) the compilation passes consume.
//!
//! - [`xml`] maps a song between the intermediate and the Rocksmith song
//!   XML, the interchange both pipeline entry points share.
//! - [`compile`] runs the enrichment passes: ebeat numbering, chord
//!   template MIDI pitches, phrase-iteration closure, section string
//!   masks, note masks and hashes, chord-note deduplication, per-level
//!   analytics and the final metadata block.
//! - [`codec`] writes and reads the fixed little-endian record layout,
//!   byte-exact in both directions.

pub mod codec;
pub mod compile;
pub mod mask;
pub mod model;
pub mod xml;

use thiserror::Error;

pub use codec::{decode_sng, encode_sng};
pub use compile::compile_song;
pub use model::Song;

/// An error occurred while compiling or encoding an SNG.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum SngError {
    /// A referenced id (chord template, phrase, level) was out of range.
    #[error("dangling reference: {0}")]
    DanglingReference(String),
    /// The song XML did not have the expected shape.
    #[error("unexpected song shape: {0}")]
    Shape(String),
    /// The binary stream ended inside a record.
    #[error("truncated sng stream")]
    Truncated,
    /// Binary I/O failed.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}
