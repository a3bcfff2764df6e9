//! Score loading.
//!
//! The playalong file names a GPX score and carries the sync list tying
//! bar positions to wall-clock seconds. This module parses both, flattens
//! the score's named collections (`Tracks`, `MasterBars`, `Bars`, `Voices`,
//! `Beats`, `Notes`, `Rhythms`) into indexable sequences, and exposes the
//! property-bag accessors the downstream passes navigate with.
//!
//! The score itself stays an attribute-dynamic [`Node`] tree; strongly
//! typed views are materialised later, where the timeline needs them.

pub mod load;
pub mod sync;

use thiserror::Error;

use crate::xmltree::Node;

pub use load::{LoadedPlayalong, load_gpx, load_playalong};
pub use sync::BarToTime;

/// The global offset between score time and audio time, in seconds.
pub const SYNC_OFFSET: f64 = -10.0;

/// An error occurred while loading a score or playalong file.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScoreError {
    /// A required field was absent from the playalong or score document.
    #[error("missing field `{0}`")]
    MissingField(&'static str),
    /// One quadruple of the sync list did not parse.
    #[error("malformed sync entry `{0}`")]
    MalformedSync(String),
    /// The sync list held no usable samples.
    #[error("empty sync list")]
    EmptySync,
    /// A named score collection was absent.
    #[error("missing collection `{0}`")]
    MissingCollection(&'static str),
}

/// A score with its named collections flattened to indexable sequences.
#[derive(Debug, Clone, PartialEq)]
pub struct Score {
    /// The full `score.gpif` tree.
    pub root: Node,
    /// The tracks, indexed by position.
    pub tracks: Vec<Node>,
    /// The master bars in score order.
    pub master_bars: Vec<Node>,
    /// All bars, indexed by id.
    pub bars: Vec<Node>,
    /// All voices, indexed by id.
    pub voices: Vec<Node>,
    /// All beats, indexed by id.
    pub beats: Vec<Node>,
    /// All notes, indexed by id.
    pub notes: Vec<Node>,
    /// All rhythms, indexed by id.
    pub rhythms: Vec<Node>,
}

impl Score {
    /// Flattens the named collections of a `score.gpif` tree.
    pub fn from_root(root: Node) -> Result<Self, ScoreError> {
        let tracks = flatten(&root, "Tracks", "Track")?;
        let master_bars = flatten(&root, "MasterBars", "MasterBar")?;
        let bars = flatten(&root, "Bars", "Bar")?;
        let voices = flatten(&root, "Voices", "Voice")?;
        let beats = flatten(&root, "Beats", "Beat")?;
        let notes = flatten(&root, "Notes", "Note")?;
        let rhythms = flatten(&root, "Rhythms", "Rhythm")?;
        Ok(Self {
            root,
            tracks,
            master_bars,
            bars,
            voices,
            beats,
            notes,
            rhythms,
        })
    }
}

fn flatten(root: &Node, outer: &'static str, inner: &str) -> Result<Vec<Node>, ScoreError> {
    let collection = root
        .get(outer)
        .ok_or(ScoreError::MissingCollection(outer))?;
    Ok(collection
        .get(inner)
        .map(|n| n.iter_items().cloned().collect())
        .unwrap_or_default())
}

/// True when the node's property list carries `name`.
#[must_use]
pub fn has_prop(node: &Node, name: &str) -> bool {
    get_prop(node, name).is_some()
}

/// Looks up a property value in a node's `Properties` list.
///
/// A property element is `<Property name="..."><Value .../></Property>`;
/// the returned node is the first payload field after the name attribute.
#[must_use]
pub fn get_prop<'a>(node: &'a Node, name: &str) -> Option<&'a Node> {
    let list = node.get("Properties")?.get("Property")?;
    for property in list.iter_items() {
        let matches = property
            .get("@name")
            .and_then(Node::as_str)
            .is_some_and(|n| n == name);
        if matches {
            return property
                .fields()?
                .iter()
                .find(|(k, _)| k != "@name")
                .map(|(_, v)| v);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::xmltree::{from_xml, list_coerce};

    const GPIF: &str = r#"
        <GPIF>
          <Tracks>
            <Track id="0">
              <Name>Lead</Name>
              <Properties>
                <Property name="Tuning"><Pitches>40 45 50 55 59 64</Pitches></Property>
                <Property name="CapoFret"><Fret>2</Fret></Property>
              </Properties>
            </Track>
          </Tracks>
          <MasterBars><MasterBar><Time>4/4</Time><Bars>0</Bars></MasterBar></MasterBars>
          <Bars><Bar id="0"><Voices>0 -1 -1 -1</Voices></Bar></Bars>
          <Voices><Voice id="0"><Beats>0</Beats></Voice></Voices>
          <Beats><Beat id="0"><Rhythm ref="0"/></Beat></Beats>
          <Notes><Note id="0"/></Notes>
          <Rhythms><Rhythm id="0"><NoteValue>Quarter</NoteValue></Rhythm></Rhythms>
        </GPIF>"#;

    #[test]
    fn collections_flatten_to_sequences() {
        let root = from_xml(GPIF, list_coerce).unwrap();
        let score = Score::from_root(root).unwrap();
        assert_eq!(score.tracks.len(), 1);
        assert_eq!(score.master_bars.len(), 1);
        assert_eq!(score.rhythms.len(), 1);
    }

    #[test]
    fn property_lookup() {
        let root = from_xml(GPIF, list_coerce).unwrap();
        let score = Score::from_root(root).unwrap();
        let track = &score.tracks[0];
        assert!(has_prop(track, "Tuning"));
        assert!(!has_prop(track, "Muted"));
        assert_eq!(
            get_prop(track, "CapoFret").and_then(Node::as_i64),
            Some(2)
        );
        let tuning = get_prop(track, "Tuning").unwrap();
        assert_eq!(tuning.items().map(<[Node]>::len), Some(6));
    }

    #[test]
    fn missing_collection_is_fatal() {
        let root = from_xml("<GPIF><Tracks/></GPIF>", list_coerce).unwrap();
        assert_eq!(
            Score::from_root(root).unwrap_err(),
            ScoreError::MissingCollection("MasterBars")
        );
    }
}
