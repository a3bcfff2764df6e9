//! Tone extraction from player profiles and packages.
//!
//! Profiles (`*_prfldb`) carry the body AES-ECB encrypted and
//! zlib-compressed starting at offset 20, with the plaintext length at
//! offset 16 and a trailing NUL before the JSON ends. Packages carry
//! tones inside their manifest JSON entries.

use std::io::{Read, Seek};

use serde_json::Value;

use super::crypto;
use super::{PsarcError, archive};

/// The profile sections that hold tone definitions.
const PROFILE_TONE_KEYS: [&str; 4] = ["Tones", "BassTones", "DemoTones", "CustomTones"];

fn push_unseen(tones: &mut Vec<Value>, tone: Value) {
    if !tones.contains(&tone) {
        tones.push(tone);
    }
}

/// Collects the distinct tones of every manifest JSON entry in a package.
pub fn tones_from_archive<R: Read + Seek>(reader: &mut R) -> Result<Vec<Value>, PsarcError> {
    let mut tones = Vec::new();

    for entry in archive::read_toc(reader)? {
        if !entry.filepath.ends_with(".json") {
            continue;
        }
        let data = archive::read_entry(reader, &entry)?;
        let Ok(manifest) = serde_json::from_slice::<Value>(&data) else {
            continue;
        };
        let Some(entries) = manifest.get("Entries").and_then(Value::as_object) else {
            continue;
        };
        for body in entries.values() {
            let attributes = body.get("Attributes");
            let listed = attributes
                .and_then(|a| a.get("Tones"))
                .and_then(Value::as_array);
            for tone in listed.unwrap_or(&Vec::new()) {
                push_unseen(&mut tones, tone.clone());
            }
        }
    }

    Ok(tones)
}

/// Decrypts a profile and collects its tones.
pub fn tones_from_profile(data: &[u8]) -> Result<Vec<Value>, PsarcError> {
    let decrypted = crypto::decrypt_profile(data)?;
    // The stored JSON ends with a NUL byte.
    let body = decrypted.strip_suffix(&[0]).unwrap_or(&decrypted);
    let profile: Value = serde_json::from_slice(body)
        .map_err(|e| PsarcError::Crypto(format!("profile json: {e}")))?;

    let mut tones = Vec::new();
    for key in PROFILE_TONE_KEYS {
        let Some(listed) = profile.get(key).and_then(Value::as_array) else {
            continue;
        };
        for tone in listed {
            if !tone.is_null() {
                push_unseen(&mut tones, tone.clone());
            }
        }
    }
    Ok(tones)
}
