//! Cipher primitives of the PSARC ecosystem.
//!
//! Three constructions, all keyed by fixed values of the target game
//! revision:
//!
//! - The table of contents is AES-CFB-128 with a fixed key and IV.
//! - SNG payloads use an AES-CTR built from AES-CFB-128 applied to
//!   16-byte counter blocks, the counter incremented big-endian from the
//!   right-most byte. The construction is deliberately spelled out here
//!   instead of a library CTR mode to stay bit-exact with existing
//!   content.
//! - Player profiles are AES-ECB.

use aes::Aes256;
use aes::cipher::{AsyncStreamCipher, BlockDecryptMut, KeyInit, KeyIvInit, block_padding::NoPadding};
use flate2::Compression;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use log::error;
use std::io::{Read, Write};

use super::PsarcError;

type CfbEnc = cfb_mode::Encryptor<Aes256>;
type CfbDec = cfb_mode::Decryptor<Aes256>;
type EcbDec = ecb::Decryptor<Aes256>;

/// Archive TOC key.
pub const ARC_KEY: [u8; 32] =
    hex("C53DB23870A1A2F71CAE64061FDD0E1157309DC85204D4C5BFDF25090DF2572C");
/// Archive TOC IV.
pub const ARC_IV: [u8; 16] = hex("E915AA018FEF71FC508132E4BB4CEB42");
/// SNG payload key for Mac packages.
pub const MAC_KEY: [u8; 32] =
    hex("9821330E34B91F70D0A48CBD625993126970CEA09192C0E6CDA676CC9838289D");
/// SNG payload key for PC packages.
pub const PC_KEY: [u8; 32] =
    hex("CB648DF3D12A16BF71701414E69619EC171CCA5D2A142E3E59DE7ADDA18A3A30");
/// Player profile key.
pub const PROFILE_KEY: [u8; 32] =
    hex("728B369E24ED0134768511021812AFC0A3C25D02065F166B4BCC58CD2644F29E");

/// Decodes a hex literal at compile time.
const fn hex<const N: usize>(s: &str) -> [u8; N] {
    const fn nibble(b: u8) -> u8 {
        match b {
            b'0'..=b'9' => b - b'0',
            b'a'..=b'f' => b - b'a' + 10,
            b'A'..=b'F' => b - b'A' + 10,
            _ => panic!("invalid hex digit"),
        }
    }
    let bytes = s.as_bytes();
    assert!(bytes.len() == 2 * N, "hex literal length mismatch");
    let mut out = [0u8; N];
    let mut i = 0;
    while i < N {
        out[i] = nibble(bytes[2 * i]) << 4 | nibble(bytes[2 * i + 1]);
        i += 1;
    }
    out
}

/// Zero-pads to a block multiple.
#[must_use]
pub fn pad(data: &[u8], block: usize) -> Vec<u8> {
    let mut out = data.to_vec();
    let rem = data.len() % block;
    if rem != 0 {
        out.resize(data.len() + block - rem, 0);
    }
    out
}

/// Encrypts a table of contents payload (zero-padded to 16 bytes; callers
/// truncate to the stored size).
#[must_use]
pub fn toc_encrypt(data: &[u8]) -> Vec<u8> {
    let mut buf = pad(data, 16);
    CfbEnc::new(&ARC_KEY.into(), &ARC_IV.into()).encrypt(&mut buf);
    buf
}

/// Decrypts a table of contents payload.
#[must_use]
pub fn toc_decrypt(data: &[u8]) -> Vec<u8> {
    let mut buf = pad(data, 16);
    CfbDec::new(&ARC_KEY.into(), &ARC_IV.into()).decrypt(&mut buf);
    buf
}

/// Increments a counter block from the right-most byte, with carry.
fn update_ctr(counter: &mut [u8; 16]) {
    for byte in counter.iter_mut().rev() {
        let (updated, overflow) = byte.overflowing_add(1);
        *byte = updated;
        if !overflow {
            break;
        }
    }
}

/// The CFB-on-counter-blocks stream cipher of SNG payloads.
///
/// Each 16-byte chunk is zero-padded and run through a fresh AES-CFB-128
/// keyed on the current counter value, so the output length is always a
/// multiple of 16. Encryption and decryption only differ in which CFB
/// direction is applied to the block.
#[must_use]
pub fn aes_ctr(data: &[u8], key: &[u8; 32], iv: &[u8; 16], encrypt: bool) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len().next_multiple_of(16));
    let mut counter = *iv;

    for chunk in data.chunks(16) {
        let mut block = [0u8; 16];
        block[..chunk.len()].copy_from_slice(chunk);
        if encrypt {
            CfbEnc::new(key.into(), &counter.into()).encrypt(&mut block);
        } else {
            CfbDec::new(key.into(), &counter.into()).decrypt(&mut block);
        }
        out.extend_from_slice(&block);
        update_ctr(&mut counter);
    }

    out
}

/// Compresses at best level, the way official archives are built.
pub(crate) fn deflate(data: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::best());
    let _ = encoder.write_all(data);
    encoder.finish().unwrap_or_default()
}

/// Decompresses a zlib stream, tolerating trailing garbage.
pub(crate) fn inflate(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut out = Vec::new();
    ZlibDecoder::new(data).read_to_end(&mut out)?;
    Ok(out)
}

/// Wraps an SNG payload in its encrypted container:
/// `4A 00 00 00 03 00 00 00 | IV (zero) | ciphertext | signature (zero)`.
#[must_use]
pub fn encrypt_sng(data: &[u8], key: &[u8; 32]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&0x4Au32.to_le_bytes());
    out.extend_from_slice(&3u32.to_le_bytes());

    let mut payload = (data.len() as u32).to_le_bytes().to_vec();
    payload.extend_from_slice(&deflate(data));

    let iv = [0u8; 16];
    out.extend_from_slice(&iv);
    out.extend_from_slice(&aes_ctr(&payload, key, &iv, true));
    out.extend_from_slice(&[0u8; 56]);
    out
}

/// Unwraps an SNG payload container.
///
/// The plaintext is `u32 length | zlib(data)`. A decompression failure or
/// a length mismatch is logged and downgrades the result to the raw
/// decrypted bytes, leaving recovery to the caller.
#[must_use]
pub fn decrypt_sng(data: &[u8], key: &[u8; 32]) -> Vec<u8> {
    if data.len() < 24 {
        error!("sng container shorter than its header, keeping raw bytes");
        return data.to_vec();
    }
    let mut iv = [0u8; 16];
    iv.copy_from_slice(&data[8..24]);
    let decrypted = aes_ctr(&data[24..], key, &iv, false);

    if decrypted.len() < 4 {
        error!("sng payload too short, keeping raw bytes");
        return decrypted;
    }
    let length =
        u32::from_le_bytes(decrypted[0..4].try_into().expect("sliced four bytes")) as usize;
    match inflate(&decrypted[4..]) {
        Ok(payload) if payload.len() == length => payload,
        Ok(payload) => {
            error!(
                "sng payload length mismatch ({} != {length}), keeping raw bytes",
                payload.len()
            );
            decrypted
        }
        Err(e) => {
            error!("sng payload inflation failed ({e}), keeping raw bytes");
            decrypted
        }
    }
}

/// Decrypts a player profile body: AES-ECB, then zlib, with the stored
/// length verified.
pub fn decrypt_profile(data: &[u8]) -> Result<Vec<u8>, PsarcError> {
    if data.len() < 20 {
        return Err(PsarcError::Crypto("profile shorter than header".into()));
    }
    let size = u32::from_le_bytes(data[16..20].try_into().expect("sliced four bytes")) as usize;

    let mut body = pad(&data[20..], 16);
    EcbDec::new(&PROFILE_KEY.into())
        .decrypt_padded_mut::<NoPadding>(&mut body)
        .map_err(|_| PsarcError::Crypto("profile block decryption failed".into()))?;

    let inflated =
        inflate(&body).map_err(|e| PsarcError::Crypto(format!("profile inflation: {e}")))?;
    if inflated.len() != size {
        return Err(PsarcError::Crypto(format!(
            "profile length mismatch ({} != {size})",
            inflated.len()
        )));
    }
    Ok(inflated)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn counter_carries_from_the_right() {
        let mut ctr = [0u8; 16];
        update_ctr(&mut ctr);
        assert_eq!(ctr[15], 1);

        let mut ctr = [0xFFu8; 16];
        update_ctr(&mut ctr);
        assert_eq!(ctr, [0u8; 16]);

        let mut ctr = [0u8; 16];
        ctr[15] = 0xFF;
        update_ctr(&mut ctr);
        assert_eq!(ctr[14], 1);
        assert_eq!(ctr[15], 0);
    }

    #[test]
    fn ctr_is_its_own_inverse() {
        let data: Vec<u8> = (0..1024 * 1024u32).map(|i| (i * 31 % 251) as u8).collect();
        let iv = [7u8; 16];
        let encrypted = aes_ctr(&data, &MAC_KEY, &iv, true);
        assert_eq!(encrypted.len() % 16, 0);
        let decrypted = aes_ctr(&encrypted, &MAC_KEY, &iv, false);
        assert_eq!(&decrypted[..data.len()], &data[..]);
    }

    #[test]
    fn sng_container_layout() {
        let payload = b"abcde";
        let container = encrypt_sng(payload, &MAC_KEY);

        // Header, IV, 16-aligned ciphertext, signature.
        let ciphertext_len = container.len() - 8 - 16 - 56;
        assert_eq!(ciphertext_len % 16, 0);
        assert_eq!(&container[0..8], &[0x4A, 0, 0, 0, 3, 0, 0, 0]);
        assert_eq!(&container[8..24], &[0u8; 16]);
        assert_eq!(&container[container.len() - 56..], &[0u8; 56]);

        assert_eq!(decrypt_sng(&container, &MAC_KEY), payload);
    }

    #[test]
    fn corrupt_sng_payload_falls_back_to_raw() {
        let mut container = encrypt_sng(b"abcde", &MAC_KEY);
        let at = container.len() - 60;
        container[at] ^= 0xFF;
        let raw = decrypt_sng(&container, &MAC_KEY);
        assert_ne!(raw, b"abcde");
        assert!(!raw.is_empty());
    }

    #[test]
    fn toc_cipher_round_trips() {
        let data = b"not a multiple of sixteen bytes!!";
        let encrypted = toc_encrypt(data);
        assert_eq!(encrypted.len() % 16, 0);
        let decrypted = toc_decrypt(&encrypted);
        assert_eq!(&decrypted[..data.len()], data);
    }
}
