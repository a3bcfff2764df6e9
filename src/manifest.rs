//! Song manifest JSON assembly.
//!
//! The manifest is the JSON database entry the game reads for one
//! arrangement: URNs, arrangement properties, per-difficulty note counts
//! and mastery ratios, section/phrase/chord digests and a persistent MD5
//! identity. The key set is fixed by the target game revision.

use md5::{Digest, Md5};
use rand::Rng;
use serde_json::{Value, json};

use crate::sng::Song;

/// Tunables without a derivation in existing content.
///
/// The reference emits constant difficulty quantities; they are exposed
/// here instead of hard-coded.
#[derive(Debug, Clone, PartialEq)]
pub struct ManifestConfig {
    /// `SongDiffEasy` quantity.
    pub song_diff_easy: f64,
    /// `SongDiffMed` quantity.
    pub song_diff_med: f64,
    /// `SongDiffHard` quantity (also `SongDifficulty`).
    pub song_diff_hard: f64,
}

impl Default for ManifestConfig {
    fn default() -> Self {
        Self {
            song_diff_easy: 0.5,
            song_diff_med: 0.5,
            song_diff_hard: 0.5,
        }
    }
}

/// A built manifest: its URN stem and the header-wrapped JSON document.
#[derive(Debug, Clone, PartialEq)]
pub struct Manifest {
    /// Lower-cased `internalName_arrangement`, the entry's URN stem.
    pub urn: String,
    /// The `RSEnumerable_Song` wrapped document.
    pub document: Value,
}

fn dna_peak(song: &Song, id: u32) -> f64 {
    song.dnas
        .iter()
        .filter(|dna| dna.id == id)
        .map(|dna| f64::from(dna.time))
        .fold(0.0, f64::max)
}

fn iter_count(song: &Song, level: usize, iteration: usize) -> u32 {
    song.levels
        .get(level)
        .and_then(|l| l.notes_in_iter_count.get(iteration))
        .copied()
        .unwrap_or(0)
}

/// Assembles the manifest for a compiled song.
#[must_use]
pub fn build_manifest(song: &Song, config: &ManifestConfig) -> Manifest {
    let urn_base = song.internal_name.to_lowercase();
    let fullname = format!("{}_{}", song.internal_name, song.arrangement);
    let urn_full = fullname.to_lowercase();

    let digest = Md5::digest(urn_full.as_bytes());
    let entry_id = digest
        .iter()
        .map(|b| format!("{b:02X}"))
        .collect::<String>();

    let properties = &song.arrangement_properties;
    let route_mask = if properties.get("pathLead") != 0 {
        1
    } else if properties.get("pathRhythm") != 0 {
        2
    } else if properties.get("pathBass") != 0 {
        4
    } else {
        0
    };

    let mut arrangement_properties = serde_json::Map::new();
    for (key, value) in &properties.flags {
        arrangement_properties.insert(key.clone(), json!(value));
    }
    arrangement_properties.insert("routeMask".into(), json!(route_mask));

    let score_pnv = if song.metadata.max_notes > 0.0 {
        song.metadata.max_score / song.metadata.max_notes
    } else {
        1.0
    };

    let mut notes_easy = 0u32;
    let mut notes_medium = 0u32;
    let mut notes_hard = 0u32;
    for (i, piter) in song.phrase_iterations.iter().enumerate() {
        notes_easy += iter_count(song, piter.difficulty[0] as usize, i);
        notes_medium += iter_count(song, piter.difficulty[1] as usize, i);
        notes_hard += iter_count(song, piter.difficulty[2] as usize, i);
    }
    let (easy_mastery, medium_mastery) = if notes_hard > 0 {
        (
            f64::from(notes_easy) / f64::from(notes_hard),
            f64::from(notes_medium) / f64::from(notes_hard),
        )
    } else {
        (1.0, 1.0)
    };

    let sections: Vec<Value> = song
        .sections
        .iter()
        .map(|s| {
            json!({
                "Name": s.name,
                "UIName": format!("{} {} [{}]", song.title, s.name, s.number),
                "Number": s.number,
                "StartTime": s.start_time,
                "EndTime": s.end_time,
                "StartPhraseIterationIndex": s.start_phrase_iteration_id,
                "EndPhraseIterationIndex": s.end_phrase_iteration_id,
                "IsSolo": s.is_solo,
            })
        })
        .collect();

    let phrases: Vec<Value> = song
        .phrases
        .iter()
        .map(|p| {
            json!({
                "MaxDifficulty": p.max_difficulty,
                "Name": p.name,
                "IterationCount": p.phrase_iteration_links,
            })
        })
        .collect();

    let phrase_iterations: Vec<Value> = song
        .phrase_iterations
        .iter()
        .map(|piter| {
            json!({
                "PhraseIndex": piter.phrase_id,
                "MaxDifficulty": piter.difficulty.iter().max().copied().unwrap_or(0),
                "Name": song
                    .phrases
                    .get(piter.phrase_id as usize)
                    .map_or("", |p| p.name.as_str()),
                "StartTime": piter.time,
                "EndTime": piter.end_time,
            })
        })
        .collect();

    let chord_templates: Vec<Value> = song
        .chord_templates
        .iter()
        .enumerate()
        .filter(|(_, t)| !t.chord_name.is_empty())
        .map(|(idx, t)| {
            json!({
                "ChordId": idx,
                "ChordName": t.chord_name,
                "Fingers": t.fingers.to_vec(),
                "Frets": t.frets.to_vec(),
            })
        })
        .collect();

    let tuning: Value = (0..6)
        .map(|k| (format!("string{k}"), json!(song.tuning[k])))
        .collect::<serde_json::Map<String, Value>>()
        .into();

    let master_id: u32 = rand::thread_rng().r#gen();

    let attributes = json!({
        "AlbumArt": format!("urn:image:dds:album_{urn_base}"),
        "AlbumName": song.album_name,
        "AlbumNameSort": song.album_name_sort,
        "ArrangementName": song.arrangement,
        "ArrangementProperties": Value::Object(arrangement_properties),
        "ArrangementSort": 0,
        "ArrangementType": 0,
        "ArtistName": song.artist_name,
        "ArtistNameSort": song.artist_name_sort,
        "BlockAsset": format!("urn:emergent-world:{urn_base}"),
        "CentOffset": song.cent_offset,
        "Chords": {},
        "ChordTemplates": chord_templates,
        "DLC": true,
        "DLCKey": song.internal_name,
        "DNA_Chords": dna_peak(song, 3),
        "DNA_Riffs": dna_peak(song, 2),
        "DNA_Solo": dna_peak(song, 1),
        "DynamicVisualDensity": vec![2.0; 20],
        "EasyMastery": easy_mastery,
        "FullName": fullname,
        "LastConversionDateTime": song.last_conversion_date_time,
        "LeaderboardChallengeRating": 0,
        "ManifestUrn": format!("urn:database:json-db:{urn_full}"),
        "MasterID_PS3": -1,
        "MasterID_RDV": master_id,
        "MasterID_XBox360": -1,
        "MaxPhraseDifficulty": song.metadata.max_difficulty,
        "MediumMastery": medium_mastery,
        "NotesEasy": notes_easy,
        "NotesHard": notes_hard,
        "NotesMedium": notes_medium,
        "Phrases": phrases,
        "PhraseIterations": phrase_iterations,
        "PreviewBankPath": format!("song_{urn_base}_preview.bnk"),
        "RelativeDifficulty": 0,
        "Representative": properties.get("bonusArr") == 0,
        "Score_MaxNotes": song.metadata.max_notes,
        "Score_PNV": score_pnv,
        "Sections": sections,
        "Shipping": true,
        "ShowlightsXML": format!("urn:application:xml:{urn_base}_showlights"),
        "SKU": "RS2",
        "SongAsset": format!("urn:application:musicgame-song:{urn_full}"),
        "SongAverageTempo": song.average_tempo,
        "SongBank": format!("song_{urn_base}.bnk"),
        "SongDiffEasy": config.song_diff_easy,
        "SongDiffHard": config.song_diff_hard,
        "SongDifficulty": config.song_diff_hard,
        "SongDiffMed": config.song_diff_med,
        "SongEvent": format!("Play_{}", song.internal_name),
        "SongKey": song.internal_name,
        "SongLength": song.song_length,
        "SongName": song.title,
        "SongNameSort": song.song_name_sort,
        "SongOffset": song.offset,
        "SongPartition": song.part,
        "SongXml": format!("urn:application:xml:{urn_full}"),
        "SongYear": song.album_year,
        "TargetScore": song.metadata.max_score,
        "Techniques": {},
        "Tone_A": song.tone_a,
        "Tone_B": song.tone_b,
        "Tone_Base": song.tone_base,
        "Tone_C": song.tone_c,
        "Tone_D": song.tone_d,
        "Tone_Multiplayer": song.tone_multiplayer,
        "Tones": [],
        "Tuning": tuning,
        "PersistentID": entry_id,
    });

    let document = json!({
        "Entries": { entry_id: { "Attributes": attributes } },
        "ModelName": "RSEnumerable_Song",
        "IterationVersion": 2,
        "InsertRoot": "Static.Songs.Entries",
    });

    Manifest {
        urn: urn_full,
        document,
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::sng::model::{Level, Phrase, PhraseIteration};

    fn sample() -> Song {
        let mut song = Song {
            title: "Night Song".into(),
            internal_name: "BandNightSong".into(),
            arrangement: "Lead".into(),
            artist_name: "Band".into(),
            song_length: 120.0,
            ..Song::default()
        };
        song.arrangement_properties.set("pathLead", 1);
        song.phrases.push(Phrase {
            name: "default".into(),
            phrase_iteration_links: 1,
            ..Phrase::default()
        });
        song.phrase_iterations.push(PhraseIteration::default());
        let mut level = Level::default();
        level.notes_in_iter_count = vec![12];
        song.levels.push(level);
        song.metadata.max_notes = 12.0;
        song.metadata.max_score = 100_000.0;
        song
    }

    #[test]
    fn urn_and_identity_derive_from_the_names() {
        let manifest = build_manifest(&sample(), &ManifestConfig::default());
        assert_eq!(manifest.urn, "bandnightsong_lead");

        let attributes = &manifest.document["Entries"]
            [manifest.document["Entries"].as_object().unwrap().keys().next().unwrap()]
            ["Attributes"];
        assert_eq!(attributes["DLCKey"], "BandNightSong");
        assert_eq!(
            attributes["ManifestUrn"],
            "urn:database:json-db:bandnightsong_lead"
        );
        assert_eq!(attributes["PersistentID"].as_str().unwrap().len(), 32);
    }

    #[test]
    fn note_counts_and_masteries() {
        let manifest = build_manifest(&sample(), &ManifestConfig::default());
        let entries = manifest.document["Entries"].as_object().unwrap();
        let attributes = &entries[entries.keys().next().unwrap().as_str()]["Attributes"];
        assert_eq!(attributes["NotesEasy"], 12);
        assert_eq!(attributes["NotesHard"], 12);
        assert_eq!(attributes["EasyMastery"], 1.0);
        assert_eq!(attributes["ArrangementProperties"]["routeMask"], 1);
        assert_eq!(attributes["SongDiffHard"], 0.5);
        assert_eq!(attributes["Score_PNV"], 100_000.0 / 12.0);
    }
}
