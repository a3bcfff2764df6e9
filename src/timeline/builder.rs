//! The master-bar walker.
//!
//! Two counters drive the walk: `bar_idx` indexes the master bars and
//! jumps backwards when a repeat closes, while `measure` counts every
//! played bar and only ever grows. Time advances through the bar-to-time
//! function at `measure + measure_offset`, where `measure_offset` is the
//! fractional position inside the current measure.

use crate::score::{BarToTime, Score, get_prop, has_prop};
use crate::sng::model::{
    Anchor, ArrangementProperties, Beat, Chord, ChordTemplate, HandShape, Level, Note, Phrase,
    PhraseIteration, Section, Song, Tone,
};
use crate::xmltree::Node;

use super::{TimelineError, fingering};

/// Quarters per note value.
fn duration_quarters(note_value: &str) -> Result<f64, TimelineError> {
    Ok(match note_value {
        "Long" => 16.0,
        "DoubleWhole" => 8.0,
        "Whole" => 4.0,
        "Half" => 2.0,
        "Quarter" => 1.0,
        "Eighth" => 1.0 / 2.0,
        "16th" => 1.0 / 4.0,
        "32nd" => 1.0 / 8.0,
        "64th" => 1.0 / 16.0,
        "128th" => 1.0 / 32.0,
        "256th" => 1.0 / 64.0,
        other => {
            return Err(TimelineError::Unsupported {
                what: "note value",
                value: other.to_string(),
            });
        }
    })
}

fn node_text(node: &Node) -> String {
    match node {
        Node::Text(s) => s.clone(),
        Node::Int(v) => v.to_string(),
        Node::Float(v) => v.to_string(),
        Node::Bool(v) => v.to_string(),
        _ => String::new(),
    }
}

/// Walks one track of a score and lowers it into a [`Song`] timeline.
pub struct TimelineBuilder<'a> {
    score: &'a Score,
    track: &'a Node,
    track_id: usize,
    sync: &'a BarToTime,

    measure: i64,
    bar_idx: isize,
    time: f64,
    beats_per_bar: f64,
    measure_offset: f64,
    current_beat_length: f64,
    start_repeat_bar: Option<isize>,
    repeats_count: Option<i64>,

    ebeats: Vec<Beat>,
    sections: Vec<Section>,
    tones: Vec<Tone>,
    tone_names: Vec<String>,
    chord_templates: Vec<ChordTemplate>,
    level: Level,
}

impl<'a> TimelineBuilder<'a> {
    /// Prepares a walk over `track_id` of the score.
    pub fn new(
        score: &'a Score,
        track_id: usize,
        sync: &'a BarToTime,
    ) -> Result<Self, TimelineError> {
        let track = score
            .tracks
            .get(track_id)
            .ok_or(TimelineError::UnknownTrack(track_id))?;
        Ok(Self {
            score,
            track,
            track_id,
            sync,
            measure: 0,
            bar_idx: 0,
            time: sync.at(0.0),
            beats_per_bar: 0.0,
            measure_offset: 0.0,
            current_beat_length: 0.0,
            start_repeat_bar: None,
            repeats_count: None,
            ebeats: Vec::new(),
            sections: Vec::new(),
            tones: Vec::new(),
            tone_names: Vec::new(),
            chord_templates: Vec::new(),
            level: Level::default(),
        })
    }

    fn at(&self, position: f64) -> f64 {
        self.sync.at(position)
    }

    /// Runs the walk and returns the timeline.
    pub fn run(mut self) -> Result<Song, TimelineError> {
        let score = self.score;
        while self.bar_idx >= 0 && (self.bar_idx as usize) < score.master_bars.len() {
            let master = &score.master_bars[self.bar_idx as usize];
            self.bar(master)?;
            self.bar_idx += 1;
            self.measure += 1;
        }
        self.finish()
    }

    fn bar(&mut self, master: &Node) -> Result<(), TimelineError> {
        let score = self.score;

        let time_sig = master
            .get("Time")
            .map(node_text)
            .ok_or(TimelineError::Missing("Time"))?;
        let (num, den) = time_sig
            .split_once('/')
            .and_then(|(n, d)| Some((n.parse::<f64>().ok()?, d.parse::<f64>().ok()?)))
            .ok_or(TimelineError::Missing("Time"))?;
        self.beats_per_bar = 4.0 * num / den;

        if let Some(repeat) = master.get("Repeat") {
            if repeat.get("@start").is_some_and(Node::truthy) {
                self.start_repeat_bar = Some(self.bar_idx);
            }
        }

        if let Some(section) = master.get("Section") {
            let name = section.get("Text").map(node_text).unwrap_or_default();
            self.sections.push(Section {
                name,
                number: self.sections.len() as u32,
                start_time: self.at(self.measure as f64) as f32,
                ..Section::default()
            });
        }

        for i in 0..self.beats_per_bar as i64 {
            self.ebeats.push(Beat {
                time: self.at(self.measure as f64 + i as f64 / self.beats_per_bar) as f32,
                measure: if i == 0 { (self.measure + 1) as i32 } else { -1 },
                ..Beat::default()
            });
        }

        self.measure_offset = 0.0;

        let bar_id = master
            .get("Bars")
            .and_then(|ids| ids.iter_items().nth(self.track_id).and_then(Node::as_i64))
            .ok_or(TimelineError::Missing("Bars"))?;
        let bar = score
            .bars
            .get(bar_id as usize)
            .ok_or(TimelineError::UnknownRef {
                kind: "bar",
                id: bar_id,
            })?;

        let voice_id = bar
            .get("Voices")
            .and_then(|v| v.iter_items().next().and_then(Node::as_i64))
            .ok_or(TimelineError::Missing("Voices"))?;
        if voice_id >= 0 {
            let voice = score
                .voices
                .get(voice_id as usize)
                .ok_or(TimelineError::UnknownRef {
                    kind: "voice",
                    id: voice_id,
                })?;
            if let Some(beat_ids) = voice.get("Beats") {
                for id in beat_ids.iter_items() {
                    let beat_id = id.as_i64().ok_or(TimelineError::Missing("Beats"))?;
                    let beat =
                        score
                            .beats
                            .get(beat_id as usize)
                            .ok_or(TimelineError::UnknownRef {
                                kind: "beat",
                                id: beat_id,
                            })?;
                    self.beat(beat)?;
                }
            }
        }

        if let Some(repeat) = master.get("Repeat") {
            if repeat.get("@end").is_some_and(Node::truthy) {
                if self.repeats_count.is_none() {
                    self.repeats_count =
                        Some(repeat.get("@count").and_then(Node::as_i64).unwrap_or(0));
                }
                if self.repeats_count.is_some_and(|c| c > 1) {
                    if let Some(start) = self.start_repeat_bar {
                        self.bar_idx = start - 1;
                    }
                    self.repeats_count = self.repeats_count.map(|c| c - 1);
                } else {
                    self.repeats_count = None;
                    self.start_repeat_bar = None;
                }
            }
        }

        Ok(())
    }

    fn beat(&mut self, beat: &Node) -> Result<(), TimelineError> {
        let rhythm_ref = beat
            .get("Rhythm")
            .and_then(|r| r.get("@ref"))
            .and_then(Node::as_i64)
            .ok_or(TimelineError::Missing("Rhythm"))?;
        let rhythm =
            self.score
                .rhythms
                .get(rhythm_ref as usize)
                .ok_or(TimelineError::UnknownRef {
                    kind: "rhythm",
                    id: rhythm_ref,
                })?;

        let note_value = rhythm
            .get("NoteValue")
            .map(node_text)
            .ok_or(TimelineError::Missing("NoteValue"))?;
        let mut inc = duration_quarters(&note_value)? / self.beats_per_bar;

        if let Some(tuplet) = rhythm.get("PrimaryTuplet") {
            let num = tuplet.get("@num").and_then(Node::as_f64).unwrap_or(1.0);
            let den = tuplet.get("@den").and_then(Node::as_f64).unwrap_or(1.0);
            inc *= den / num;
        }
        if rhythm.has("AugmentationDot") {
            inc *= 1.5;
        }

        let grace = beat.get("GraceNotes").map(node_text);
        if grace.as_deref() == Some("BeforeBeat") {
            self.measure_offset -= inc;
            self.time = self.at(self.measure as f64 + self.measure_offset);
        }

        self.current_beat_length =
            self.at(self.measure as f64 + self.measure_offset + inc) - self.time;

        if let Some(marker) = beat.get("FreeText") {
            let name = node_text(marker);
            let id = match self.tone_names.iter().position(|n| *n == name) {
                Some(i) => i,
                None => {
                    self.tone_names.push(name);
                    self.tone_names.len() - 1
                }
            };
            self.tones.push(Tone {
                time: self.time as f32,
                id: id as u32,
            });
        }

        if let Some(note_ids) = beat.get("Notes") {
            let ids: Vec<i64> = note_ids.iter_items().filter_map(Node::as_i64).collect();
            self.notes(beat, &ids)?;
        }

        self.measure_offset += inc;
        self.time = self.at(self.measure as f64 + self.measure_offset);

        // Time stays put; the next beat's duration is shortened instead.
        if grace.as_deref() == Some("OnBeat") {
            self.measure_offset -= inc;
        }

        Ok(())
    }

    fn notes(&mut self, beat: &Node, ids: &[i64]) -> Result<(), TimelineError> {
        let mut notes = Vec::with_capacity(ids.len());
        for &id in ids {
            let note = self
                .score
                .notes
                .get(id as usize)
                .ok_or(TimelineError::UnknownRef { kind: "note", id })?;
            notes.push(self.note(beat, note)?);
        }

        if notes.len() > 1 {
            let chord = self.chord(beat, notes);
            self.level.chords.push(chord);
        } else {
            self.level.notes.append(&mut notes);
        }
        Ok(())
    }

    fn note(&self, beat: &Node, note: &Node) -> Result<Note, TimelineError> {
        let string = get_prop(note, "String")
            .and_then(Node::as_i64)
            .ok_or(TimelineError::Missing("String"))?;
        let fret = get_prop(note, "Fret")
            .and_then(Node::as_i64)
            .ok_or(TimelineError::Missing("Fret"))?;

        let harmonic = get_prop(note, "HarmonicType").map(node_text);
        let (artificial, pinch) = match harmonic.as_deref() {
            None => (false, false),
            Some("Artificial") => (true, false),
            Some("Pinch") => (false, true),
            Some(other) => {
                return Err(TimelineError::Unsupported {
                    what: "harmonic type",
                    value: other.to_string(),
                });
            }
        };

        Ok(Note {
            time: self.time as f32,
            string: string as i8,
            fret: fret as i8,
            accent: note.has("Accent"),
            harmonic: artificial,
            harmonic_pinch: pinch,
            link_next: note
                .get("Tie")
                .and_then(|t| t.get("@origin"))
                .is_some_and(Node::truthy),
            mute: has_prop(note, "Muted"),
            palm_mute: has_prop(note, "PalmMuted"),
            tap: i8::from(has_prop(note, "Tapped")),
            vibrato: i16::from(note.has("Vibrato")),
            tremolo: beat.has("Tremolo"),
            pluck: if has_prop(beat, "Popped") { 1 } else { -1 },
            slap: if has_prop(beat, "Slapped") { 1 } else { -1 },
            ..Note::default()
        })
    }

    fn chord(&mut self, beat: &Node, mut notes: Vec<Note>) -> Chord {
        let mut template = ChordTemplate::default();
        for note in &notes {
            if (0..6).contains(&i32::from(note.string)) {
                template.frets[note.string as usize] = note.fret;
            }
        }
        template.fingers = fingering::find_fingering(&template.frets);
        for note in &mut notes {
            note.left_hand = template.fingers[note.string as usize];
        }

        if beat.has("Arpeggio") {
            template.display_name.push_str("_arp");
        }

        let chord_id = match self.chord_templates.iter().position(|t| *t == template) {
            Some(i) => i,
            None => {
                self.chord_templates.push(template.clone());
                self.chord_templates.len() - 1
            }
        };

        self.level.hand_shapes.push(HandShape {
            chord_id: chord_id as i32,
            start_time: self.time as f32,
            end_time: (self.time + self.current_beat_length * 0.90) as f32,
        });

        if let Some(lowest) = template.frets.iter().filter(|&&f| f > -1).min() {
            self.level.anchors.push(Anchor {
                time: self.time as f32,
                fret: i32::from(*lowest),
                width: 4,
                ..Anchor::default()
            });
        }

        Chord {
            time: self.time as f32,
            chord_id: chord_id as i32,
            accent: notes.iter().any(|n| n.accent),
            fret_hand_mute: notes.iter().any(|n| n.mute),
            high_density: false,
            ignore: notes.iter().any(|n| n.ignore),
            link_next: notes.iter().any(|n| n.link_next),
            palm_mute: notes.iter().any(|n| n.palm_mute),
            strum: get_prop(beat, "Direction")
                .map(node_text)
                .unwrap_or_else(|| "Down".to_string())
                .to_lowercase(),
            chord_notes: notes,
        }
    }

    fn finish(mut self) -> Result<Song, TimelineError> {
        let meta = self
            .score
            .root
            .get("Score")
            .cloned()
            .unwrap_or(Node::empty());
        let text_of = |key: &str| meta.get(key).map(node_text).unwrap_or_default();

        let title = text_of("Title");
        let artist_name = text_of("Artist");
        let album_name = text_of("Album");
        let album_year = text_of("Copyright");

        let alnum = |s: &str| -> String { s.chars().filter(char::is_ascii_alphanumeric).collect() };
        let internal_name = format!("{}{}", alnum(&artist_name), alnum(&title));

        let song_length = self.ebeats.last().map_or(0.0, |b| f64::from(b.time));
        let offset = self.sync.offset();
        let average_tempo = if song_length + offset > 0.0 {
            let bpm = (self.ebeats.len().saturating_sub(1)) as f64 / (song_length + offset) * 60.0;
            ((bpm * 1000.0) as i64) as f64 / 1000.0
        } else {
            0.0
        };

        let standard = Song::MIDI_NOTES;
        let pitches: Vec<i64> = get_prop(self.track, "Tuning")
            .map(|n| n.iter_items().filter_map(Node::as_i64).collect())
            .unwrap_or_else(|| standard.iter().map(|&p| i64::from(p)).collect());
        let mut tuning = [0i16; 6];
        for (i, slot) in tuning.iter_mut().enumerate() {
            *slot = (pitches.get(i).copied().unwrap_or(i64::from(standard[i]))
                - i64::from(standard[i])) as i16;
        }
        let standard_tuning = i64::from(tuning.iter().all(|&t| t == 0));

        let capo = get_prop(self.track, "CapoFret")
            .and_then(Node::as_i64)
            .unwrap_or(0) as i8;
        let arrangement = self.track.get("Name").map(node_text).unwrap_or_default();

        let notes = &self.level.notes;
        let chords = &self.level.chords;
        let any_note = |f: &dyn Fn(&Note) -> bool| i64::from(notes.iter().any(f));
        let any_child = |f: &dyn Fn(&Note) -> bool| {
            i64::from(chords.iter().flat_map(|c| c.chord_notes.iter()).any(f))
        };

        let mut props = ArrangementProperties::default();
        props.set("barreChords", 0);
        props.set("bassPick", 0);
        props.set("bends", any_note(&|n| n.bend != 0.0));
        props.set("bonusArr", 0);
        props.set("doubleStops", 0);
        props.set("dropDPower", 0);
        props.set("fifthsAndOctaves", 0);
        props.set("fingerPicking", 0);
        props.set(
            "fretHandMutes",
            i64::from(chords.iter().any(|c| c.fret_hand_mute)),
        );
        props.set("harmonics", any_note(&|n| n.harmonic));
        props.set("hopo", any_note(&|n| n.hammer_on || n.pull_off));
        props.set("nonStandardChords", 0);
        props.set("openChords", 0);
        props.set(
            "palmMutes",
            i64::from(notes.iter().any(|n| n.palm_mute) || chords.iter().any(|c| c.palm_mute)),
        );
        props.set("pathBass", 0);
        props.set("pathLead", 1);
        props.set("pathRhythm", 0);
        props.set("pickDirection", 0);
        props.set("pinchHarmonics", any_note(&|n| n.harmonic_pinch));
        props.set("powerChords", 0);
        props.set("represent", 1);
        props.set("slapPop", any_note(&|n| n.slap != -1 || n.pluck != -1));
        props.set("slides", any_note(&|n| n.slide_to != -1));
        props.set("standardTuning", standard_tuning);
        props.set("sustain", any_note(&|n| n.sustain != 0.0));
        props.set("syncopation", 0);
        props.set("tapping", any_note(&|n| n.tap != 0));
        props.set(
            "tremolo",
            i64::from(notes.iter().any(|n| n.tremolo) || any_child(&|n| n.tremolo) != 0),
        );
        props.set("twoFingerPicking", 0);
        props.set("unpitchedSlides", any_note(&|n| n.slide_unpitch_to != -1));
        props.set("vibrato", any_note(&|n| n.vibrato != 0));

        self.level.difficulty = 0;

        let artist_name_sort = text_for_sort(&artist_name);
        let album_name_sort = text_for_sort(&album_name);
        let song_name_sort = text_for_sort(&title);

        Ok(Song {
            ebeats: self.ebeats,
            phrases: vec![Phrase {
                name: "default".to_string(),
                ..Phrase::default()
            }],
            phrase_iterations: vec![PhraseIteration::default()],
            chord_templates: self.chord_templates,
            sections: self.sections,
            tones: self.tones,
            levels: vec![self.level],
            title,
            arrangement,
            part: 1,
            offset: offset as f32,
            cent_offset: 0.0,
            song_length: song_length as f32,
            average_tempo: average_tempo as f32,
            tuning,
            capo,
            artist_name_sort,
            artist_name,
            album_name_sort,
            album_name,
            song_name_sort,
            album_year,
            album_art: internal_name.clone(),
            internal_name,
            last_conversion_date_time: chrono::Local::now().format("%F %T").to_string(),
            arrangement_properties: props,
            ..Song::default()
        })
    }
}

/// Strips leading articles and capitalises, for the `*Sort` name fields.
#[must_use]
pub fn text_for_sort(text: &str) -> String {
    let mut rest = text;
    loop {
        let lowered = rest.to_lowercase();
        let stripped = ["a ", "an ", "the "]
            .iter()
            .find_map(|article| lowered.starts_with(article).then(|| &rest[article.len()..]));
        match stripped {
            Some(r) => rest = r.trim_start(),
            None => break,
        }
    }
    let mut chars = rest.chars();
    match chars.next() {
        Some(first) => {
            let mut out: String = first.to_uppercase().collect();
            out.push_str(chars.as_str());
            out
        }
        None => String::new(),
    }
}
