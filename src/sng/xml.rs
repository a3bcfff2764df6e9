//! Song ↔ song-XML mapping.
//!
//! The song XML is the interchange between the two pipeline entry points:
//! the timeline walker emits it for inspection and hand-editing, and the
//! SNG compiler accepts it back. Only the fields the compiler consumes are
//! mapped; presentation-only blocks (`transcriptionTrack`, `linkedDiffs`,
//! `phraseProperties`) are emitted empty and ignored on the way in.

use crate::sng::model::{
    Anchor, Beat, BendValue, Chord, ChordTemplate, Event, HandShape, Level, NewLinkedDiff, Note,
    Phrase, PhraseIteration, Section, Song, Tone,
};
use crate::xmltree::Node;

use super::SngError;

fn attr<'a>(node: &'a Node, key: &str) -> Option<&'a Node> {
    node.get(&format!("@{key}"))
}

fn attr_i64(node: &Node, key: &str, default: i64) -> i64 {
    attr(node, key).and_then(Node::as_i64).unwrap_or(default)
}

fn attr_f32(node: &Node, key: &str) -> f32 {
    attr(node, key).and_then(Node::as_f64).unwrap_or(0.0) as f32
}

fn attr_bool(node: &Node, key: &str) -> bool {
    attr(node, key).is_some_and(Node::truthy)
}

fn attr_text(node: &Node, key: &str) -> String {
    match attr(node, key) {
        Some(Node::Text(s)) => s.clone(),
        Some(Node::Int(v)) => v.to_string(),
        Some(Node::Float(v)) => v.to_string(),
        _ => String::new(),
    }
}

fn items(node: &Node, key: &str) -> Vec<Node> {
    node.get(key)
        .map(|n| n.iter_items().cloned().collect())
        .unwrap_or_default()
}

fn field_text(node: &Node, key: &str) -> String {
    match node.get(key) {
        Some(Node::Text(s)) => s.clone(),
        Some(Node::Int(v)) => v.to_string(),
        Some(Node::Float(v)) => v.to_string(),
        _ => String::new(),
    }
}

fn field_f32(node: &Node, key: &str) -> f32 {
    node.get(key).and_then(Node::as_f64).unwrap_or(0.0) as f32
}

fn field_i64(node: &Node, key: &str) -> i64 {
    node.get(key).and_then(Node::as_i64).unwrap_or(0)
}

fn bend_values_from(node: &Node) -> Vec<BendValue> {
    items(node, "bendValues")
        .iter()
        .map(|b| BendValue {
            time: attr_f32(b, "time"),
            step: attr_f32(b, "step"),
            unk: 0,
        })
        .collect()
}

fn note_from(node: &Node) -> Note {
    Note {
        time: attr_f32(node, "time"),
        string: attr_i64(node, "string", 0) as i8,
        fret: attr_i64(node, "fret", 0) as i8,
        left_hand: attr_i64(node, "leftHand", -1) as i8,
        tap: attr_i64(node, "tap", 0) as i8,
        pick_direction: attr_i64(node, "pickDirection", 0) as i8,
        slap: attr_i64(node, "slap", -1) as i8,
        pluck: attr_i64(node, "pluck", -1) as i8,
        slide_to: attr_i64(node, "slideTo", -1) as i8,
        slide_unpitch_to: attr_i64(node, "slideUnpitchTo", -1) as i8,
        vibrato: attr_i64(node, "vibrato", 0) as i16,
        sustain: attr_f32(node, "sustain"),
        bend: attr_f32(node, "bend"),
        bend_values: bend_values_from(node),
        accent: attr_bool(node, "accent"),
        hammer_on: attr_bool(node, "hammerOn"),
        pull_off: attr_bool(node, "pullOff"),
        harmonic: attr_bool(node, "harmonic"),
        harmonic_pinch: attr_bool(node, "harmonicPinch"),
        ignore: attr_bool(node, "ignore"),
        link_next: attr_bool(node, "linkNext"),
        mute: attr_bool(node, "mute"),
        palm_mute: attr_bool(node, "palmMute"),
        right_hand: attr_i64(node, "rightHand", -1) as i8,
        tremolo: attr_bool(node, "tremolo"),
        ..Note::default()
    }
}

fn chord_from(node: &Node) -> Chord {
    let chord_notes = node
        .get("chordNote")
        .map(|n| n.iter_items().map(note_from).collect())
        .unwrap_or_default();
    Chord {
        time: attr_f32(node, "time"),
        chord_id: attr_i64(node, "chordId", -1) as i32,
        accent: attr_bool(node, "accent"),
        fret_hand_mute: attr_bool(node, "fretHandMute"),
        high_density: attr_bool(node, "highDensity"),
        ignore: attr_bool(node, "ignore"),
        link_next: attr_bool(node, "linkNext"),
        palm_mute: attr_bool(node, "palmMute"),
        strum: attr_text(node, "strum"),
        chord_notes,
    }
}

fn level_from(node: &Node) -> Level {
    Level {
        difficulty: attr_i64(node, "difficulty", 0) as u32,
        anchors: items(node, "anchors")
            .iter()
            .map(|a| Anchor {
                time: attr_f32(a, "time"),
                fret: attr_i64(a, "fret", 0) as i32,
                width: attr_i64(a, "width", 4) as i32,
                ..Anchor::default()
            })
            .collect(),
        chords: items(node, "chords").iter().map(chord_from).collect(),
        hand_shapes: items(node, "handShapes")
            .iter()
            .map(|h| HandShape {
                chord_id: attr_i64(h, "chordId", -1) as i32,
                start_time: attr_f32(h, "startTime"),
                end_time: attr_f32(h, "endTime"),
            })
            .collect(),
        notes: items(node, "notes").iter().map(note_from).collect(),
        ..Level::default()
    }
}

/// Reads a song-XML tree into the [`Song`] intermediate.
pub fn song_from_tree(root: &Node) -> Result<Song, SngError> {
    if root.fields().is_none() {
        return Err(SngError::Shape("song root is not a record".into()));
    }

    let mut tuning = [0i16; 6];
    if let Some(t) = root.get("tuning") {
        for (k, slot) in tuning.iter_mut().enumerate() {
            *slot = attr_i64(t, &format!("string{k}"), 0) as i16;
        }
    }

    let mut properties = crate::sng::model::ArrangementProperties::default();
    if let Some(Node::Record(fields)) = root.get("arrangementProperties") {
        for (key, value) in fields {
            if let Some(name) = key.strip_prefix('@') {
                properties.set(name, value.as_i64().unwrap_or(0));
            }
        }
    }

    Ok(Song {
        title: field_text(root, "title"),
        arrangement: field_text(root, "arrangement"),
        part: field_i64(root, "part") as i16,
        offset: field_f32(root, "offset"),
        cent_offset: field_f32(root, "centOffset"),
        song_length: field_f32(root, "songLength"),
        average_tempo: field_f32(root, "averageTempo"),
        capo: field_i64(root, "capo") as i8,
        tuning,
        artist_name: field_text(root, "artistName"),
        artist_name_sort: field_text(root, "artistNameSort"),
        album_name: field_text(root, "albumName"),
        album_name_sort: field_text(root, "albumNameSort"),
        song_name_sort: field_text(root, "songNameSort"),
        album_year: field_text(root, "albumYear"),
        album_art: field_text(root, "albumArt"),
        internal_name: field_text(root, "internalName"),
        last_conversion_date_time: field_text(root, "lastConversionDateTime"),
        tone_base: field_text(root, "tone_Base"),
        tone_a: field_text(root, "tone_A"),
        tone_b: field_text(root, "tone_B"),
        tone_c: field_text(root, "tone_C"),
        tone_d: field_text(root, "tone_D"),
        tone_multiplayer: field_text(root, "tone_Multiplayer"),
        arrangement_properties: properties,
        ebeats: items(root, "ebeats")
            .iter()
            .map(|b| Beat {
                time: attr_f32(b, "time"),
                measure: attr_i64(b, "measure", -1) as i32,
                ..Beat::default()
            })
            .collect(),
        phrases: items(root, "phrases")
            .iter()
            .map(|p| Phrase {
                solo: attr_i64(p, "solo", 0) as i8,
                disparity: attr_i64(p, "disparity", 0) as i8,
                ignore: attr_i64(p, "ignore", 0) as i8,
                max_difficulty: attr_i64(p, "maxDifficulty", 0) as u32,
                phrase_iteration_links: 0,
                name: attr_text(p, "name"),
            })
            .collect(),
        phrase_iterations: items(root, "phraseIterations")
            .iter()
            .map(|p| PhraseIteration {
                phrase_id: attr_i64(p, "phraseId", 0) as u32,
                time: attr_f32(p, "time"),
                end_time: 0.0,
                difficulty: [0; 3],
                hero_levels: items(p, "heroLevels")
                    .iter()
                    .map(|h| {
                        (
                            attr_i64(h, "hero", 0) as u32,
                            attr_i64(h, "difficulty", 0) as u32,
                        )
                    })
                    .collect(),
            })
            .collect(),
        chord_templates: items(root, "chordTemplates")
            .iter()
            .map(|t| {
                let mut template = ChordTemplate {
                    chord_name: attr_text(t, "chordName"),
                    display_name: attr_text(t, "displayName"),
                    ..ChordTemplate::default()
                };
                for k in 0..6 {
                    template.frets[k] = attr_i64(t, &format!("fret{k}"), -1) as i8;
                    template.fingers[k] = attr_i64(t, &format!("finger{k}"), -1) as i8;
                }
                template
            })
            .collect(),
        new_linked_diffs: items(root, "newLinkedDiffs")
            .iter()
            .map(|nld| NewLinkedDiff {
                level_break: attr_i64(nld, "levelBreak", 0) as i32,
                phrases: nld
                    .get("nld_phrase")
                    .map(|p| {
                        p.iter_items()
                            .map(|x| attr_i64(x, "id", 0) as u32)
                            .collect()
                    })
                    .unwrap_or_default(),
            })
            .collect(),
        events: items(root, "events")
            .iter()
            .map(|e| Event {
                time: attr_f32(e, "time"),
                code: attr_text(e, "code"),
            })
            .collect(),
        tones: items(root, "tones")
            .iter()
            .map(|t| Tone {
                time: attr_f32(t, "time"),
                id: attr_i64(t, "id", 0) as u32,
            })
            .collect(),
        sections: items(root, "sections")
            .iter()
            .map(|s| Section {
                name: attr_text(s, "name"),
                number: attr_i64(s, "number", 0) as u32,
                start_time: attr_f32(s, "startTime"),
                ..Section::default()
            })
            .collect(),
        levels: items(root, "levels").iter().map(level_from).collect(),
        ..Song::default()
    })
}

fn rec(fields: Vec<(&str, Node)>) -> Node {
    Node::Record(fields.into_iter().map(|(k, v)| (k.to_string(), v)).collect())
}

fn float(v: f32) -> Node {
    Node::Float(f64::from(v))
}

fn int(v: impl Into<i64>) -> Node {
    Node::Int(v.into())
}

fn text(v: &str) -> Node {
    Node::Text(v.to_string())
}

fn note_to(note: &Note) -> Node {
    let mut fields = vec![
        ("@accent", int(note.accent as i64)),
        ("@bend", float(note.bend)),
        ("@fret", int(note.fret)),
        ("@hammerOn", int(note.hammer_on as i64)),
        ("@harmonic", int(note.harmonic as i64)),
        ("@harmonicPinch", int(note.harmonic_pinch as i64)),
        ("@hopo", int(0)),
        ("@ignore", int(note.ignore as i64)),
        ("@leftHand", int(note.left_hand)),
        ("@linkNext", int(note.link_next as i64)),
        ("@mute", int(note.mute as i64)),
        ("@palmMute", int(note.palm_mute as i64)),
        ("@pickDirection", int(note.pick_direction)),
        ("@pluck", int(note.pluck)),
        ("@pullOff", int(note.pull_off as i64)),
        ("@rightHand", int(note.right_hand)),
        ("@slap", int(note.slap)),
        ("@slideTo", int(note.slide_to)),
        ("@slideUnpitchTo", int(note.slide_unpitch_to)),
        ("@string", int(note.string)),
        ("@sustain", float(note.sustain)),
        ("@tap", int(note.tap)),
        ("@time", float(note.time)),
        ("@tremolo", int(note.tremolo as i64)),
        ("@vibrato", int(note.vibrato)),
    ];
    fields.push((
        "bendValues",
        Node::Sequence(
            note.bend_values
                .iter()
                .map(|b| rec(vec![("@time", float(b.time)), ("@step", float(b.step))]))
                .collect(),
        ),
    ));
    rec(fields)
}

fn chord_to(chord: &Chord) -> Node {
    rec(vec![
        ("@accent", int(chord.accent as i64)),
        ("@chordId", int(chord.chord_id)),
        ("@fretHandMute", int(chord.fret_hand_mute as i64)),
        ("@highDensity", int(chord.high_density as i64)),
        ("@ignore", int(chord.ignore as i64)),
        ("@linkNext", int(chord.link_next as i64)),
        ("@palmMute", int(chord.palm_mute as i64)),
        ("@strum", text(&chord.strum)),
        ("@time", float(chord.time)),
        (
            "chordNote",
            Node::Inline(chord.chord_notes.iter().map(note_to).collect()),
        ),
    ])
}

fn level_to(level: &Level) -> Node {
    rec(vec![
        ("@difficulty", int(i64::from(level.difficulty))),
        (
            "anchors",
            Node::Sequence(
                level
                    .anchors
                    .iter()
                    .map(|a| {
                        rec(vec![
                            ("@time", float(a.time)),
                            ("@fret", int(a.fret)),
                            ("@width", int(a.width)),
                        ])
                    })
                    .collect(),
            ),
        ),
        (
            "chords",
            Node::Sequence(level.chords.iter().map(chord_to).collect()),
        ),
        ("fretHandMutes", Node::Sequence(vec![])),
        (
            "handShapes",
            Node::Sequence(
                level
                    .hand_shapes
                    .iter()
                    .map(|h| {
                        rec(vec![
                            ("@chordId", int(h.chord_id)),
                            ("@endTime", float(h.end_time)),
                            ("@startTime", float(h.start_time)),
                        ])
                    })
                    .collect(),
            ),
        ),
        (
            "notes",
            Node::Sequence(level.notes.iter().map(note_to).collect()),
        ),
    ])
}

/// Renders the [`Song`] intermediate as a song-XML tree.
#[must_use]
pub fn song_to_tree(song: &Song) -> Node {
    let properties = Node::Record(
        song.arrangement_properties
            .flags
            .iter()
            .map(|(k, v)| (format!("@{k}"), Node::Int(*v)))
            .collect(),
    );

    let tuning = Node::Record(
        (0..6)
            .map(|k| (format!("@string{k}"), Node::Int(i64::from(song.tuning[k]))))
            .collect(),
    );

    rec(vec![
        ("@version", int(8)),
        ("albumArt", text(&song.album_art)),
        ("albumName", text(&song.album_name)),
        ("albumNameSort", text(&song.album_name_sort)),
        ("albumYear", text(&song.album_year)),
        ("arrangement", text(&song.arrangement)),
        ("arrangementProperties", properties),
        ("artistName", text(&song.artist_name)),
        ("artistNameSort", text(&song.artist_name_sort)),
        ("averageTempo", float(song.average_tempo)),
        ("capo", int(song.capo)),
        ("centOffset", float(song.cent_offset)),
        (
            "chordTemplates",
            Node::Sequence(
                song.chord_templates
                    .iter()
                    .map(|t| {
                        let mut fields = vec![
                            ("@chordName".to_string(), text(&t.chord_name)),
                            ("@displayName".to_string(), text(&t.display_name)),
                        ];
                        for k in 0..6 {
                            fields.push((format!("@finger{k}"), int(t.fingers[k])));
                        }
                        for k in 0..6 {
                            fields.push((format!("@fret{k}"), int(t.frets[k])));
                        }
                        Node::Record(fields)
                    })
                    .collect(),
            ),
        ),
        ("crowdSpeed", int(1)),
        (
            "ebeats",
            Node::Sequence(
                song.ebeats
                    .iter()
                    .map(|b| {
                        rec(vec![
                            ("@time", float(b.time)),
                            ("@measure", int(i64::from(b.measure))),
                        ])
                    })
                    .collect(),
            ),
        ),
        (
            "events",
            Node::Sequence(
                song.events
                    .iter()
                    .map(|e| rec(vec![("@time", float(e.time)), ("@code", text(&e.code))]))
                    .collect(),
            ),
        ),
        ("fretHandMuteTemplates", Node::Sequence(vec![])),
        ("internalName", text(&song.internal_name)),
        (
            "lastConversionDateTime",
            text(&song.last_conversion_date_time),
        ),
        (
            "levels",
            Node::Sequence(song.levels.iter().map(level_to).collect()),
        ),
        ("linkedDiffs", Node::Sequence(vec![])),
        (
            "newLinkedDiffs",
            Node::Sequence(
                song.new_linked_diffs
                    .iter()
                    .map(|nld| {
                        rec(vec![
                            ("@levelBreak", int(nld.level_break)),
                            (
                                "nld_phrase",
                                Node::Inline(
                                    nld.phrases
                                        .iter()
                                        .map(|&id| rec(vec![("@id", int(i64::from(id)))]))
                                        .collect(),
                                ),
                            ),
                        ])
                    })
                    .collect(),
            ),
        ),
        ("offset", float(song.offset)),
        ("part", int(song.part)),
        (
            "phraseIterations",
            Node::Sequence(
                song.phrase_iterations
                    .iter()
                    .map(|p| {
                        rec(vec![
                            ("@time", float(p.time)),
                            ("@phraseId", int(i64::from(p.phrase_id))),
                            ("@variation", text("")),
                        ])
                    })
                    .collect(),
            ),
        ),
        ("phraseProperties", Node::Sequence(vec![])),
        (
            "phrases",
            Node::Sequence(
                song.phrases
                    .iter()
                    .map(|p| {
                        rec(vec![
                            ("@disparity", int(p.disparity)),
                            ("@ignore", int(p.ignore)),
                            ("@maxDifficulty", int(i64::from(p.max_difficulty))),
                            ("@name", text(&p.name)),
                            ("@solo", int(p.solo)),
                        ])
                    })
                    .collect(),
            ),
        ),
        (
            "sections",
            Node::Sequence(
                song.sections
                    .iter()
                    .map(|s| {
                        rec(vec![
                            ("@name", text(&s.name)),
                            ("@number", int(i64::from(s.number))),
                            ("@startTime", float(s.start_time)),
                        ])
                    })
                    .collect(),
            ),
        ),
        ("songLength", float(song.song_length)),
        ("songNameSort", text(&song.song_name_sort)),
        ("startBeat", float(0.0)),
        ("title", text(&song.title)),
        ("tone_A", text(&song.tone_a)),
        ("tone_B", text(&song.tone_b)),
        ("tone_C", text(&song.tone_c)),
        ("tone_D", text(&song.tone_d)),
        ("tone_Base", text(&song.tone_base)),
        ("tone_Multiplayer", text(&song.tone_multiplayer)),
        (
            "tones",
            Node::Sequence(
                song.tones
                    .iter()
                    .map(|t| {
                        rec(vec![
                            ("@id", int(i64::from(t.id))),
                            ("@time", float(t.time)),
                        ])
                    })
                    .collect(),
            ),
        ),
        (
            "transcriptionTrack",
            rec(vec![
                ("@difficulty", int(-1)),
                ("anchors", Node::Sequence(vec![])),
                ("chords", Node::Sequence(vec![])),
                ("handShapes", Node::Sequence(vec![])),
                ("notes", Node::Sequence(vec![])),
            ]),
        ),
        ("tuning", tuning),
        ("wavefilepath", text("")),
    ])
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::xmltree::{default_coerce, from_xml, to_xml};

    fn sample_song() -> Song {
        let mut song = Song {
            title: "Sample".into(),
            arrangement: "Lead".into(),
            part: 1,
            offset: -10.0,
            song_length: 14.0,
            capo: 0,
            tuning: [0, 0, 0, 0, -2, 0],
            artist_name: "Band".into(),
            ..Song::default()
        };
        song.ebeats.push(Beat {
            time: 10.0,
            measure: 1,
            ..Beat::default()
        });
        song.phrases.push(Phrase {
            name: "default".into(),
            ..Phrase::default()
        });
        song.phrase_iterations.push(PhraseIteration::default());
        song.chord_templates.push(ChordTemplate {
            frets: [3, 5, -1, -1, -1, -1],
            fingers: [1, 3, -1, -1, -1, -1],
            ..ChordTemplate::default()
        });
        let mut level = Level::default();
        level.notes.push(Note {
            time: 10.0,
            string: 0,
            fret: 3,
            palm_mute: true,
            ..Note::default()
        });
        level.chords.push(Chord {
            time: 11.0,
            chord_id: 0,
            link_next: true,
            chord_notes: vec![
                Note {
                    time: 11.0,
                    string: 0,
                    fret: 3,
                    ..Note::default()
                },
                Note {
                    time: 11.0,
                    string: 1,
                    fret: 5,
                    ..Note::default()
                },
            ],
            ..Chord::default()
        });
        level.hand_shapes.push(HandShape {
            chord_id: 0,
            start_time: 11.0,
            end_time: 11.4,
        });
        song.levels.push(level);
        song
    }

    #[test]
    fn song_survives_the_xml_detour() {
        let song = sample_song();
        let tree = song_to_tree(&song);
        let xml = to_xml("song", &tree);
        let back = song_from_tree(&from_xml(&xml, default_coerce).unwrap()).unwrap();

        assert_eq!(back.title, song.title);
        assert_eq!(back.tuning, song.tuning);
        assert_eq!(back.ebeats, song.ebeats);
        assert_eq!(back.chord_templates[0].frets, song.chord_templates[0].frets);
        let level = &back.levels[0];
        assert_eq!(level.notes.len(), 1);
        assert!(level.notes[0].palm_mute);
        assert_eq!(level.chords.len(), 1);
        assert!(level.chords[0].link_next);
        assert_eq!(level.chords[0].chord_notes.len(), 2);
        assert_eq!(level.hand_shapes.len(), 1);
    }

    #[test]
    fn produced_xml_round_trips_byte_identically() {
        let tree = song_to_tree(&sample_song());
        let xml = to_xml("song", &tree);
        let reparsed = from_xml(&xml, default_coerce).unwrap();
        assert_eq!(to_xml("song", &reparsed), xml);
    }
}
