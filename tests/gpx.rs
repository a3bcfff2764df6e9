//! GPX container decoding against a synthetically framed score.

use pretty_assertions::assert_eq;

use rsdlc::gpx;
use rsdlc::score::Score;
use rsdlc::xmltree::{from_xml, list_coerce};

/// Frames a payload as `BCFZ` using raw runs only (three bytes per run).
fn bcfz_wrap(payload: &[u8]) -> Vec<u8> {
    let mut bits: Vec<bool> = Vec::new();
    let mut push_bits = |bits: &mut Vec<bool>, value: u32, count: u32, reversed: bool| {
        for i in 0..count {
            let shift = if reversed { i } else { count - i - 1 };
            bits.push((value >> shift) & 1 == 1);
        }
    };

    for chunk in payload.chunks(3) {
        bits.push(false);
        push_bits(&mut bits, chunk.len() as u32, 2, true);
        for &byte in chunk {
            push_bits(&mut bits, u32::from(byte), 8, false);
        }
    }

    let mut stream = Vec::with_capacity(bits.len() / 8 + 9);
    stream.extend_from_slice(b"BCFZ");
    stream.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    let mut current = 0u8;
    for (i, &bit) in bits.iter().enumerate() {
        if bit {
            current |= 1 << (7 - i % 8);
        }
        if i % 8 == 7 {
            stream.push(current);
            current = 0;
        }
    }
    if bits.len() % 8 != 0 {
        stream.push(current);
    }
    stream
}

/// Lays a single file out as a `BCFS` sector directory.
fn bcfs_wrap(name: &str, content: &[u8]) -> Vec<u8> {
    const SECTOR: usize = 0x1000;
    let n_sectors = content.len().div_ceil(SECTOR).max(1);

    let mut directory = vec![0u8; SECTOR];
    directory[0..4].copy_from_slice(&2u32.to_le_bytes());
    directory[4..4 + name.len()].copy_from_slice(name.as_bytes());
    directory[0x8C..0x90].copy_from_slice(&(content.len() as u32).to_le_bytes());
    for i in 0..n_sectors {
        let at = 0x94 + 4 * i;
        directory[at..at + 4].copy_from_slice(&((i + 1) as u32).to_le_bytes());
    }

    let mut data = b"BCFS".to_vec();
    data.extend_from_slice(&directory);
    for i in 0..n_sectors {
        let mut sector = vec![0u8; SECTOR];
        let start = i * SECTOR;
        let end = (start + SECTOR).min(content.len());
        sector[..end - start].copy_from_slice(&content[start..end]);
        data.extend_from_slice(&sector);
    }
    // Slack so the last sector stays inside the scan window.
    data.extend_from_slice(&[0u8; 8]);
    data
}

const GPIF: &str = r#"<GPIF>
  <Tracks><Track id="0"><Name>Lead</Name></Track></Tracks>
  <MasterBars><MasterBar><Time>4/4</Time><Bars>0</Bars></MasterBar></MasterBars>
  <Bars><Bar id="0"><Voices>0 -1</Voices></Bar></Bars>
  <Voices><Voice id="0"><Beats>0</Beats></Voice></Voices>
  <Beats><Beat id="0"><Rhythm ref="0"/></Beat></Beats>
  <Notes><Note id="0"/></Notes>
  <Rhythms><Rhythm id="0"><NoteValue>Quarter</NoteValue></Rhythm></Rhythms>
</GPIF>"#;

#[test]
fn framed_score_decodes_to_the_declared_length() {
    let fs_image = bcfs_wrap("score.gpif", GPIF.as_bytes());
    let gpx_file = bcfz_wrap(&fs_image);

    let score_xml = gpx::read_score(&gpx_file).unwrap();
    assert_eq!(score_xml, GPIF.as_bytes());
}

#[test]
fn decoded_score_loads_into_collections() {
    let gpx_file = bcfz_wrap(&bcfs_wrap("score.gpif", GPIF.as_bytes()));
    let xml = gpx::read_score(&gpx_file).unwrap();

    let root = from_xml(&String::from_utf8(xml).unwrap(), list_coerce).unwrap();
    let score = Score::from_root(root).unwrap();
    assert_eq!(score.tracks.len(), 1);
    assert_eq!(score.beats.len(), 1);
}

#[test]
fn container_without_score_is_fatal() {
    let gpx_file = bcfz_wrap(&bcfs_wrap("misc.bin", b"payload"));
    assert!(matches!(
        gpx::read_score(&gpx_file),
        Err(gpx::GpxError::NoScore)
    ));
}

#[test]
fn multi_sector_files_reassemble() {
    let big: Vec<u8> = (0..9000u32).map(|i| (i % 251) as u8).collect();
    let gpx_file = bcfz_wrap(&bcfs_wrap("score.gpif", &big));
    assert_eq!(gpx::read_score(&gpx_file).unwrap(), big);
}
