//! The shared chord-fingering database.
//!
//! The database stores chord shapes normalised so the lowest fretted
//! string sits at fret 1 (open-position shapes keep their zeros). Lookup
//! shifts the queried template the same way and matches with unused
//! strings as wildcards; on a hit the entry's fingers are projected back
//! onto the strings the template actually frets.

use std::sync::OnceLock;

use log::debug;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct Database {
    #[serde(rename = "Static")]
    statics: Statics,
}

#[derive(Debug, Deserialize)]
struct Statics {
    #[serde(rename = "Chords")]
    chords: Chords,
}

#[derive(Debug, Deserialize)]
struct Chords {
    #[serde(rename = "Entries")]
    entries: Vec<Shape>,
}

/// One stored chord shape.
#[derive(Debug, Clone, Deserialize)]
pub struct Shape {
    /// Normalised frets, `-1` for unused strings.
    #[serde(rename = "Frets")]
    pub frets: [i8; 6],
    /// Fingers, `-1` for unused strings.
    #[serde(rename = "Fingers")]
    pub fingers: [i8; 6],
}

fn shapes() -> &'static [Shape] {
    static SHAPES: OnceLock<Vec<Shape>> = OnceLock::new();
    SHAPES.get_or_init(|| {
        let raw = include_str!("../../share/chords.database.json");
        serde_json::from_str::<Database>(raw)
            .map(|db| db.statics.chords.entries)
            .unwrap_or_default()
    })
}

/// Looks up the fingering for a fret template.
///
/// Returns `[-1; 6]` untouched fingers when no stored shape matches; a
/// miss is recoverable and only logged.
#[must_use]
pub fn find_fingering(frets: &[i8; 6]) -> [i8; 6] {
    let mut fingers = [-1i8; 6];

    let fretted: Vec<i8> = frets.iter().copied().filter(|&f| f > -1).collect();
    let Some(&min_fret) = fretted.iter().min() else {
        return fingers;
    };

    let mut shifted = *frets;
    if min_fret > 0 {
        for f in &mut shifted {
            *f = *f - min_fret + 1;
        }
    }

    let hit = shapes()
        .iter()
        .find(|shape| {
            shifted
                .iter()
                .zip(shape.frets.iter())
                .all(|(&x, &y)| x < 0 || x == y)
        });

    match hit {
        Some(shape) => {
            for k in 0..6 {
                if frets[k] > -1 {
                    fingers[k] = shape.fingers[k];
                }
            }
        }
        None => debug!("no fingering for {frets:?}"),
    }
    fingers
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn barre_shape_matches_after_shifting() {
        // E-shape barre at fret 5 normalises to [1, 3, 3, 2, 1, 1].
        let fingers = find_fingering(&[5, 7, 7, 6, 5, 5]);
        assert_eq!(fingers, [1, 3, 4, 2, 1, 1]);
    }

    #[test]
    fn power_chord_leaves_unused_strings_alone() {
        let fingers = find_fingering(&[3, 5, 5, -1, -1, -1]);
        assert_eq!(fingers, [1, 3, 4, -1, -1, -1]);
    }

    #[test]
    fn unknown_shape_is_a_soft_miss() {
        assert_eq!(find_fingering(&[1, 9, 2, 9, 1, 9]), [-1; 6]);
    }

    #[test]
    fn all_open_template_has_no_fingering_to_find() {
        assert_eq!(find_fingering(&[-1; 6]), [-1; 6]);
    }
}
