//! Rocksmith 2014 DLC package compiler.
//!
//! This crate turns a Go PlayAlong tablature bundle (a Guitar Pro GPX score
//! plus a bar-to-seconds sync list) into the assets consumed by Rocksmith
//! 2014: the binary SNG arrangement, the JSON song manifest, and the PSARC
//! archive that ships them.
//!
//! The pipeline runs in stages, each with its own module:
//!
//! - [`gpx`] undoes the GPX container framing (`BCFZ` bitstream, `BCFS`
//!   sector filesystem) and hands out the embedded `score.gpif` XML.
//! - [`xmltree`] maps XML documents to an attribute-addressable tree and
//!   back, preserving ordered sibling groups.
//! - [`score`] loads the playalong sync list and the score tree, and builds
//!   the bar-to-seconds interpolator.
//! - [`timeline`] walks master bars, bars, voices and beats, expands
//!   repeats, and emits the time-stamped note/chord/section timeline.
//! - [`sng`] enriches the timeline with masks, phrase bookkeeping and
//!   per-level analytics, and encodes the binary SNG record format.
//! - [`psarc`] reads and writes the PSARC bundle with its encrypted table
//!   of contents, per-entry zlib block chains and SNG payload cipher.
//! - [`manifest`], [`hsan`], [`xgraph`] and [`bnk`] produce the JSON/XML
//!   satellite assets that accompany a song package.
//!
//! # Usage
//!
//! ```no_run
//! use rsdlc::score::load_playalong;
//! use rsdlc::timeline::TimelineBuilder;
//! use rsdlc::sng::{compile_song, encode_sng};
//!
//! let loaded = load_playalong("tab.xml".as_ref()).unwrap();
//! let mut song = TimelineBuilder::new(&loaded.score, 0, &loaded.sync)
//!     .unwrap()
//!     .run()
//!     .unwrap();
//! compile_song(&mut song).unwrap();
//! let bytes = encode_sng(&song).unwrap();
//! ```

#![warn(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![recursion_limit = "256"]

pub mod bnk;
pub mod gpx;
pub mod hsan;
pub mod manifest;
pub mod psarc;
pub mod score;
pub mod sng;
pub mod timeline;
pub mod xgraph;
pub mod xmltree;

use std::path::PathBuf;

use thiserror::Error;

/// An error raised while compiling or repacking one input file.
///
/// Every failure is fatal to the current file and carries the path it
/// happened on; batch drivers decide whether to abort or continue.
#[non_exhaustive]
#[derive(Debug, Error)]
#[error("{}: {source}", path.display())]
pub struct DlcError {
    /// The input file the failure belongs to.
    pub path: PathBuf,
    /// The underlying failure.
    #[source]
    pub source: StageError,
}

impl DlcError {
    /// Attaches an input path to a stage failure.
    pub fn new(path: impl Into<PathBuf>, source: impl Into<StageError>) -> Self {
        Self {
            path: path.into(),
            source: source.into(),
        }
    }
}

/// A failure from one of the pipeline stages.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum StageError {
    /// GPX container decoding failed.
    #[error(transparent)]
    Gpx(#[from] gpx::GpxError),
    /// XML mapping failed.
    #[error(transparent)]
    Xml(#[from] xmltree::XmlError),
    /// Score loading failed.
    #[error(transparent)]
    Score(#[from] score::ScoreError),
    /// Timeline construction failed.
    #[error(transparent)]
    Timeline(#[from] timeline::TimelineError),
    /// SNG compilation or encoding failed.
    #[error(transparent)]
    Sng(#[from] sng::SngError),
    /// PSARC archive I/O failed.
    #[error(transparent)]
    Psarc(#[from] psarc::PsarcError),
    /// Plain file I/O failed.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}
