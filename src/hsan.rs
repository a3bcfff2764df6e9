//! HSAN song database and xblock generation.
//!
//! The HSAN db aggregates a fixed key subset of every manifest in a
//! package; the xblock is the entity-set XML binding each arrangement's
//! assets together.

use serde_json::{Map, Value, json};

/// The manifest keys replicated into the HSAN database.
const HSAN_KEYS: [&str; 33] = [
    "AlbumArt",
    "AlbumName",
    "AlbumNameSort",
    "ArrangementName",
    "ArtistName",
    "ArtistNameSort",
    "CentOffset",
    "DLC",
    "DLCKey",
    "DNA_Chords",
    "DNA_Riffs",
    "DNA_Solo",
    "EasyMastery",
    "LeaderboardChallengeRating",
    "ManifestUrn",
    "MasterID_RDV",
    "MediumMastery",
    "NotesEasy",
    "NotesHard",
    "NotesMedium",
    "PersistentID",
    "SKU",
    "Shipping",
    "SongDiffEasy",
    "SongDiffHard",
    "SongDiffMed",
    "SongDifficulty",
    "SongKey",
    "SongLength",
    "SongName",
    "SongNameSort",
    "SongYear",
    "Tuning",
];

fn xblock_entity(entry: &Map<String, Value>, name: &str) -> String {
    let get = |key: &str| entry.get(key).and_then(Value::as_str).unwrap_or("");
    let persistent_id = get("PersistentID").to_lowercase();
    format!(
        r#"
    <entity id="{persistent_id}" modelName="RSEnumerable_Song" name="{song_key}_{arrangement}" iterations="0">
      <properties>
        <property name="Header">
          <set value="urn:database:hsan-db:songs_dlc_{name}" />
        </property>
        <property name="Manifest">
          <set value="{manifest}" />
        </property>
        <property name="SngAsset">
          <set value="{sng}" />
        </property>
        <property name="AlbumArtSmall">
          <set value="{album_art}_64" />
        </property>
        <property name="AlbumArtMedium">
          <set value="{album_art}_128" />
        </property>
        <property name="AlbumArtLarge">
          <set value="{album_art}_256" />
        </property>
        <property name="LyricArt">
          <set value="" />
        </property>
        <property name="ShowLightsXMLAsset">
          <set value="{showlights}" />
        </property>
        <property name="SoundBank">
          <set value="urn:audio:wwise-sound-bank:song_{name}" />
        </property>
        <property name="PreviewSoundBank">
          <set value="urn:audio:wwise-sound-bank:song_{name}_preview" />
        </property>
      </properties>
    </entity>"#,
        song_key = get("SongKey"),
        arrangement = get("ArrangementName"),
        manifest = get("ManifestUrn"),
        sng = get("SongAsset"),
        album_art = get("AlbumArt"),
        showlights = get("ShowlightsXML"),
    )
}

/// Builds the HSAN database and the xblock from a package's manifests.
///
/// Returns `(hsan_json, xblock_xml, package_name)`; the package name is
/// the lower-cased DLC key of the last manifest seen.
#[must_use]
pub fn hsan(manifests: &[Value]) -> (String, String, String) {
    let mut entries = Map::new();
    let mut xblock = String::from("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n<game>\n  <entitySet>");
    let mut name = String::new();

    for manifest in manifests {
        let Some(documents) = manifest.get("Entries").and_then(Value::as_object) else {
            continue;
        };
        for (persistent_id, body) in documents {
            let Some(entry) = body.get("Attributes").and_then(Value::as_object) else {
                continue;
            };
            name = entry
                .get("DLCKey")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_lowercase();

            xblock.push_str(&xblock_entity(entry, &name));

            let mut hsan_entry = Map::new();
            for key in HSAN_KEYS {
                if let Some(value) = entry.get(key) {
                    hsan_entry.insert(key.to_string(), value.clone());
                }
            }
            if let Some(properties) = entry.get("ArrangementProperties") {
                if let Some(mask) = properties.get("routeMask") {
                    hsan_entry.insert("RouteMask".into(), mask.clone());
                }
                if let Some(represent) = properties.get("represent") {
                    hsan_entry.insert("Representative".into(), represent.clone());
                }
            }
            entries.insert(
                persistent_id.clone(),
                json!({ "Attributes": Value::Object(hsan_entry) }),
            );
        }
    }

    xblock.push_str("\n  </entitySet>\n</game>");

    let db = json!({
        "Entries": Value::Object(entries),
        "InsertRoot": "Static.Songs.Headers",
    });
    let hsan_json = serde_json::to_string_pretty(&db).unwrap_or_default();

    (hsan_json, xblock, name)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    fn manifest() -> Value {
        json!({
            "Entries": {
                "0A1B2C": {
                    "Attributes": {
                        "DLCKey": "BandNightSong",
                        "PersistentID": "0A1B2C",
                        "SongKey": "BandNightSong",
                        "ArrangementName": "Lead",
                        "ManifestUrn": "urn:database:json-db:bandnightsong_lead",
                        "SongAsset": "urn:application:musicgame-song:bandnightsong_lead",
                        "AlbumArt": "urn:image:dds:album_bandnightsong",
                        "ShowlightsXML": "urn:application:xml:bandnightsong_showlights",
                        "SongLength": 120.0,
                        "ArrangementProperties": { "routeMask": 1, "represent": 1 },
                        "SecretField": "dropped"
                    }
                }
            }
        })
    }

    #[test]
    fn hsan_keeps_only_the_fixed_keys() {
        let (db, _, name) = hsan(&[manifest()]);
        assert_eq!(name, "bandnightsong");
        let parsed: Value = serde_json::from_str(&db).unwrap();
        let entry = &parsed["Entries"]["0A1B2C"]["Attributes"];
        assert_eq!(entry["DLCKey"], "BandNightSong");
        assert_eq!(entry["RouteMask"], 1);
        assert!(entry.get("SecretField").is_none());
        assert_eq!(parsed["InsertRoot"], "Static.Songs.Headers");
    }

    #[test]
    fn xblock_binds_the_asset_urns() {
        let (_, xblock, _) = hsan(&[manifest()]);
        assert!(xblock.starts_with("<?xml version=\"1.0\""));
        assert!(xblock.contains(r#"id="0a1b2c""#));
        assert!(xblock.contains("urn:database:hsan-db:songs_dlc_bandnightsong"));
        assert!(xblock.contains("urn:image:dds:album_bandnightsong_256"));
        assert!(xblock.ends_with("</game>"));
    }
}
