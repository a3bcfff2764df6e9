//! PSARC archive I/O.
//!
//! The bundle format has an AES-CFB-encrypted table of contents, chunked
//! per-entry zlib block chains, and a companion AES-CTR payload cipher for
//! platform-specific SNG entries. [`archive`] reads and writes whole
//! bundles, [`crypto`] holds the cipher primitives and fixed keys, and
//! [`profile`] decrypts player profiles for tone extraction.

pub mod archive;
pub mod convert;
pub mod crypto;
pub mod profile;

use thiserror::Error;

pub use archive::{Archive, Entry, pack, read_entry, read_toc, unpack};
pub use convert::convert_platform;

/// An error occurred while reading or writing a PSARC bundle.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum PsarcError {
    /// The archive magic did not match `PSAR`.
    #[error("bad magic {0:?}")]
    BadMagic([u8; 4]),
    /// The table of contents or an entry was structurally impossible.
    #[error("malformed archive: {0}")]
    Malformed(String),
    /// A decryption produced sizes that do not line up.
    #[error("crypto failure: {0}")]
    Crypto(String),
    /// Plain I/O failure.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}
