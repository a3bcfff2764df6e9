//! Guitar Pro GPX container decoding.
//!
//! A `.gpx` file is a `BCFZ`-framed back-reference bitstream wrapping a
//! small hierarchical virtual filesystem (`BCFS`). Decoding runs in two
//! steps: [`bitstream`] inflates the framing to a flat byte buffer, and
//! [`filesystem`] cuts that buffer into named blobs. The only blob the
//! pipeline cares about is `score.gpif`, the score XML.

pub mod bitstream;
pub mod filesystem;

use thiserror::Error;

pub use bitstream::inflate;
pub use filesystem::Filesystem;

/// An error occurred while decoding a GPX container.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GpxError {
    /// The four-byte magic did not match the expected tag.
    #[error("bad magic: expected {expected:?}, found {found:?}")]
    BadMagic {
        /// The tag the decoder was looking for.
        expected: [u8; 4],
        /// The bytes actually present.
        found: [u8; 4],
    },
    /// The file ended before the magic and length header.
    #[error("truncated header: {0} bytes")]
    TruncatedHeader(usize),
    /// A back-reference pointed before the start of the output.
    #[error("back-reference offset 0 at output position {0}")]
    ZeroOffset(usize),
    /// The bitstream ran dry without reaching the declared length.
    #[error("declared length {declared} not reachable, stalled at {produced}")]
    LengthNotReachable {
        /// The uncompressed length the header promised.
        declared: usize,
        /// How many bytes were actually produced.
        produced: usize,
    },
    /// The container holds no `score.gpif` entry.
    #[error("no score.gpif in container")]
    NoScore,
}

/// Decodes a whole `.gpx` file and returns the embedded `score.gpif` XML.
pub fn read_score(data: &[u8]) -> Result<Vec<u8>, GpxError> {
    let uncompressed = inflate(data)?;
    let fs = Filesystem::parse(&uncompressed)?;
    fs.get("score.gpif")
        .map(<[u8]>::to_vec)
        .ok_or(GpxError::NoScore)
}
