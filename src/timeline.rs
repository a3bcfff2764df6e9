//! Score-to-timeline lowering.
//!
//! [`TimelineBuilder`] walks the master bars of one track, expanding
//! repeats and converting the bar/beat/voice tree into the linear,
//! time-stamped [`Song`](crate::sng::Song) intermediate: ebeats, sections,
//! tone changes, notes, chords, hand shapes and anchors, with chord
//! templates deduplicated against the shared fingering database.

pub mod builder;
pub mod fingering;

use thiserror::Error;

pub use builder::TimelineBuilder;

/// An error occurred while lowering a score to a timeline.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimelineError {
    /// A bar, voice, beat, note or rhythm id did not resolve.
    #[error("unknown {kind} id {id}")]
    UnknownRef {
        /// What kind of id failed to resolve.
        kind: &'static str,
        /// The id.
        id: i64,
    },
    /// The requested track does not exist.
    #[error("track {0} out of range")]
    UnknownTrack(usize),
    /// A note value or rhythm modifier outside the enumerated set.
    #[error("unsupported {what} `{value}`")]
    Unsupported {
        /// The field that failed.
        what: &'static str,
        /// The offending value.
        value: String,
    },
    /// A structural field was missing where the walker required one.
    #[error("missing `{0}`")]
    Missing(&'static str),
}
