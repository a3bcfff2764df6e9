//! Wwise soundbank assembly.
//!
//! A song package ships two tiny soundbanks (full song and preview) that
//! wrap the leading chunk of the `.wem` stream plus the object hierarchy
//! the engine needs to trigger playback. Object ids are random; event ids
//! hash the event name with 32-bit FNV-1.

use byteorder::{LittleEndian as LE, WriteBytesExt};
use rand::Rng;

/// Bytes of the `.wem` stream embedded in the bank.
pub const CHUNK_SIZE: usize = 51200;

const MIXER_ID: u32 = 0x26C7_7444;
const PLUGIN_ID: u32 = 0x0004_0001;
const DIRECT_PARENT_ID: u32 = 0x0001_0000;
const PARENT_BUS_ID: u32 = 0x9BF0_FC29;
const UNK_ID: u32 = 0xF908_C29A;
const UNK_ID2: u32 = 0x0001_0100;

/// 32-bit FNV-1 over the lower-cased name, the Wwise way.
#[must_use]
pub fn fnv_hash(name: &str) -> u32 {
    let mut hash: u32 = 2_166_136_261;
    for byte in name.to_lowercase().bytes() {
        hash = hash.wrapping_mul(16_777_619) ^ u32::from(byte);
    }
    hash
}

/// A generated soundbank and the id its `.wem` must be stored under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoundBank {
    /// The file id the full `.wem` stream must be renamed to.
    pub file_id: u32,
    /// The bank bytes.
    pub data: Vec<u8>,
}

struct Builder {
    chunk: Vec<u8>,
    preview: bool,
    volume: f32,
    file_id: u32,
    sound_id: u32,
    bank_id: u32,
    action_id: u32,
    bus_id: u32,
}

impl Builder {
    fn header(&self) -> Vec<u8> {
        let mut bkhd = Vec::new();
        let _ = bkhd.write_u32::<LE>(91);
        let _ = bkhd.write_u32::<LE>(self.bank_id);
        bkhd.extend_from_slice(&[0u8; 20]);
        bkhd
    }

    fn data_index(&self) -> Vec<u8> {
        let mut didx = Vec::new();
        let _ = didx.write_u32::<LE>(self.file_id);
        let _ = didx.write_u32::<LE>(0);
        let _ = didx.write_u32::<LE>(self.chunk.len() as u32);
        didx
    }

    fn hierarchy(&self, event_name: &str) -> Vec<u8> {
        let preview = u8::from(self.preview);

        let mut sound = Vec::new();
        let _ = sound.write_u32::<LE>(self.sound_id);
        let _ = sound.write_u32::<LE>(PLUGIN_ID);
        let _ = sound.write_u32::<LE>(2);
        let _ = sound.write_u32::<LE>(self.file_id);
        let _ = sound.write_u32::<LE>(self.file_id);
        sound.extend_from_slice(&[0u8; 3]);
        let _ = sound.write_u32::<LE>(self.bus_id);
        let _ = sound.write_u32::<LE>(DIRECT_PARENT_ID);
        let _ = sound.write_u32::<LE>(if self.preview { UNK_ID } else { 0 });
        let _ = sound.write_u32::<LE>(MIXER_ID);
        sound.extend_from_slice(&[0, 0, 0, 3, 0, 0x2E, 0x2F]);
        let _ = sound.write_f32::<LE>(self.volume);
        let _ = sound.write_u32::<LE>(1);
        let _ = sound.write_u32::<LE>(3);
        sound.extend_from_slice(&[0u8; 6]);
        sound.extend_from_slice(&[preview, preview, 0]);
        let _ = sound.write_u16::<LE>(u16::from(self.preview));
        sound.extend_from_slice(&[0, 0, preview]);
        sound.extend_from_slice(&[0u8; 11]);

        let mut mixer = Vec::new();
        let _ = mixer.write_u32::<LE>(MIXER_ID);
        let _ = mixer.write_u16::<LE>(0);
        let _ = mixer.write_u32::<LE>(PARENT_BUS_ID);
        let _ = mixer.write_u32::<LE>(0);
        let _ = mixer.write_u32::<LE>(0);
        let _ = mixer.write_u32::<LE>(UNK_ID2);
        mixer.extend_from_slice(&[0u8; 22]);
        let _ = mixer.write_u16::<LE>(0);
        let _ = mixer.write_u32::<LE>(1);
        let _ = mixer.write_u32::<LE>(self.sound_id);

        let mut action = Vec::new();
        let _ = action.write_u32::<LE>(self.action_id);
        let _ = action.write_u16::<LE>(0x403);
        let _ = action.write_u32::<LE>(self.sound_id);
        action.extend_from_slice(&[0, 0, 0, 4]);
        let _ = action.write_u32::<LE>(self.bank_id);

        let mut event = Vec::new();
        let _ = event.write_u32::<LE>(fnv_hash(event_name));
        let _ = event.write_u32::<LE>(1);
        let _ = event.write_u32::<LE>(self.action_id);

        let mut hirc = Vec::new();
        let _ = hirc.write_u32::<LE>(4);
        for (kind, body) in [(2u8, &sound), (7, &mixer), (3, &action), (4, &event)] {
            let _ = hirc.write_u8(kind);
            let _ = hirc.write_u32::<LE>(body.len() as u32);
            hirc.extend_from_slice(body);
        }
        hirc
    }

    fn string_id(&self, bank_name: &str) -> Vec<u8> {
        let mut stid = Vec::new();
        let _ = stid.write_u32::<LE>(1);
        let _ = stid.write_u32::<LE>(1);
        let _ = stid.write_u32::<LE>(self.bank_id);
        let _ = stid.write_u8(bank_name.len() as u8);
        stid.extend_from_slice(bank_name.as_bytes());
        stid
    }
}

fn section(tag: &[u8; 4], content: &[u8]) -> Vec<u8> {
    let mut out = tag.to_vec();
    let _ = out.write_u32::<LE>(content.len() as u32);
    out.extend_from_slice(content);
    out
}

/// Builds a soundbank for the leading chunk of a `.wem` stream.
#[must_use]
pub fn build_bnk(wem: &[u8], name: &str, preview: bool) -> SoundBank {
    let mut rng = rand::thread_rng();
    let builder = Builder {
        chunk: wem[..wem.len().min(CHUNK_SIZE)].to_vec(),
        preview,
        volume: -5.0,
        file_id: rng.r#gen(),
        sound_id: rng.r#gen(),
        bank_id: rng.r#gen(),
        action_id: rng.r#gen(),
        bus_id: rng.r#gen(),
    };

    let suffix = if preview { "_Preview" } else { "" };
    let mut data = section(b"BKHD", &builder.header());
    data.extend_from_slice(&section(b"DIDX", &builder.data_index()));
    data.extend_from_slice(&section(b"DATA", &builder.chunk));
    data.extend_from_slice(&section(
        b"HIRC",
        &builder.hierarchy(&format!("Play_{name}{suffix}")),
    ));
    data.extend_from_slice(&section(
        b"STID",
        &builder.string_id(&format!("Song_{name}{suffix}")),
    ));

    SoundBank {
        file_id: builder.file_id,
        data,
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn fnv_matches_known_wwise_values() {
        // FNV-1 32 of "play_x" style names is case-insensitive.
        assert_eq!(fnv_hash("Play_Test"), fnv_hash("play_test"));
        assert_ne!(fnv_hash("Play_Test"), fnv_hash("Play_Test_Preview"));
        // Reference value for the empty string is the FNV offset basis.
        assert_eq!(fnv_hash(""), 2_166_136_261);
    }

    #[test]
    fn sections_are_laid_out_in_order() {
        let wem = vec![0x5Au8; 1000];
        let bank = build_bnk(&wem, "Test", false);

        let mut at = 0usize;
        for expected in [b"BKHD", b"DIDX", b"DATA", b"HIRC", b"STID"] {
            assert_eq!(&bank.data[at..at + 4], expected);
            let len =
                u32::from_le_bytes(bank.data[at + 4..at + 8].try_into().unwrap()) as usize;
            at += 8 + len;
        }
        assert_eq!(at, bank.data.len());
    }

    #[test]
    fn wem_chunk_is_capped() {
        let wem = vec![1u8; CHUNK_SIZE * 2];
        let bank = build_bnk(&wem, "Big", true);
        // BKHD body is 28 bytes, so DIDX starts at 36; its third field is
        // the stored chunk length.
        assert_eq!(&bank.data[36..40], b"DIDX");
        let chunk_len = u32::from_le_bytes(bank.data[52..56].try_into().unwrap());
        assert_eq!(chunk_len as usize, CHUNK_SIZE);
    }
}
