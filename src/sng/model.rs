//! The SNG intermediate: every record the binary format stores, plus the
//! source-side fields the compilation passes read.
//!
//! Instances are built once (by the timeline walker or the song-XML
//! reader), mutated only inside [`super::compile`], and read-only
//! afterwards. References between records are flat integer ids; nothing
//! here is cyclic.

/// A timing beat marker.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Beat {
    /// Wall-clock time in seconds.
    pub time: f32,
    /// One-based measure number, or `-1` when inside a measure.
    pub measure: i32,
    /// Beat index within the measure, assigned by compilation.
    pub beat: u16,
    /// Index of the enclosing phrase iteration.
    pub phrase_iteration: u32,
    /// Bar-start mask.
    pub mask: u32,
}

/// A labelled phrase of the song.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Phrase {
    /// Solo marker.
    pub solo: i8,
    /// Display disparity marker.
    pub disparity: i8,
    /// Scoring-ignore marker.
    pub ignore: i8,
    /// Highest difficulty level authored for the phrase.
    pub max_difficulty: u32,
    /// Number of iterations referencing this phrase.
    pub phrase_iteration_links: u32,
    /// Phrase name.
    pub name: String,
}

/// A chord shape shared by chords and hand shapes.
#[derive(Debug, Clone, PartialEq)]
pub struct ChordTemplate {
    /// Arpeggio / no-op shape mask.
    pub mask: u32,
    /// Fret per string, `-1` for unused strings.
    pub frets: [i8; 6],
    /// Finger per string, `-1` when unknown.
    pub fingers: [i8; 6],
    /// MIDI pitch per string, `-1` for unused strings.
    pub notes: [i32; 6],
    /// Chord name as shown in game.
    pub chord_name: String,
    /// Display name; an `arp`/`nop` suffix selects the shape mask.
    pub display_name: String,
}

impl Default for ChordTemplate {
    fn default() -> Self {
        Self {
            mask: 0,
            frets: [-1; 6],
            fingers: [-1; 6],
            notes: [-1; 6],
            chord_name: String::new(),
            display_name: String::new(),
        }
    }
}

/// One sampled point of a bend.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct BendValue {
    /// Wall-clock time in seconds.
    pub time: f32,
    /// Bend amount in half steps.
    pub step: f32,
    /// Opaque byte carried through from existing files.
    pub unk: i8,
}

/// A 32-slot bend table for one chord-note string.
#[derive(Debug, Clone, PartialEq)]
pub struct BendValues32 {
    /// The padded table; only the first `used_count` entries are real.
    pub bend_values: [BendValue; 32],
    /// Number of populated entries.
    pub used_count: u32,
}

impl Default for BendValues32 {
    fn default() -> Self {
        Self {
            bend_values: [BendValue::default(); 32],
            used_count: 0,
        }
    }
}

/// The deduplicated per-string technique record of a chord.
#[derive(Debug, Clone, PartialEq)]
pub struct ChordNotes {
    /// Note mask per string.
    pub mask: [u32; 6],
    /// Bend tables per string.
    pub bend_values: [BendValues32; 6],
    /// Pitched slide target per string.
    pub slide_to: [i8; 6],
    /// Unpitched slide target per string.
    pub slide_unpitch_to: [i8; 6],
    /// Vibrato per string.
    pub vibrato: [i16; 6],
}

impl Default for ChordNotes {
    fn default() -> Self {
        Self {
            mask: [0; 6],
            bend_values: Default::default(),
            slide_to: [-1; 6],
            slide_unpitch_to: [-1; 6],
            vibrato: [0; 6],
        }
    }
}

/// A vocal line entry.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Vocal {
    /// Wall-clock time in seconds.
    pub time: f32,
    /// MIDI note of the lyric.
    pub note: i32,
    /// Length in seconds.
    pub length: f32,
    /// Lyric text.
    pub lyric: String,
}

/// A lyric font texture reference.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Texture {
    /// Font path.
    pub font_path: String,
    /// Stored length of the font path.
    pub font_path_length: u32,
    /// Texture width.
    pub width: u32,
    /// Texture height.
    pub height: u32,
}

/// A lyric symbol definition.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct SymbolDefinition {
    /// The symbol text.
    pub text: String,
    /// Outer rectangle.
    pub rect_outer: [f32; 4],
    /// Inner rectangle.
    pub rect_inner: [f32; 4],
}

/// The symbols block, present only when vocals are present.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Symbols {
    /// Opaque header rows.
    pub headers: Vec<[i32; 8]>,
    /// Font textures.
    pub textures: Vec<Texture>,
    /// Symbol definitions.
    pub definitions: Vec<SymbolDefinition>,
}

/// A concrete time window of a phrase.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct PhraseIteration {
    /// The phrase this iteration instantiates.
    pub phrase_id: u32,
    /// Start time in seconds.
    pub time: f32,
    /// End time; closed by compilation.
    pub end_time: f32,
    /// Difficulty per hero level.
    pub difficulty: [u32; 3],
    /// Source-side hero-level overrides `(hero, difficulty)`.
    pub hero_levels: Vec<(u32, u32)>,
}

/// Per-level phrase extras; emitted empty by this compiler.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct PhraseExtraInfo {
    /// Phrase id.
    pub phrase_id: u32,
    /// Difficulty level.
    pub difficulty: u32,
    /// Unused.
    pub empty: u32,
    /// Level-jump marker.
    pub level_jump: i8,
    /// Redundancy marker.
    pub redundant: i16,
}

/// A linked-difficulty group.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct NewLinkedDiff {
    /// Level break of the group.
    pub level_break: i32,
    /// The phrase ids in the group.
    pub phrases: Vec<u32>,
}

/// A timestamped action.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Action {
    /// Wall-clock time in seconds.
    pub time: f32,
    /// Action name.
    pub name: String,
}

/// A timestamped event.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Event {
    /// Wall-clock time in seconds.
    pub time: f32,
    /// Event code.
    pub code: String,
}

/// A timestamped tone change.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Tone {
    /// Wall-clock time in seconds.
    pub time: f32,
    /// Tone id.
    pub id: u32,
}

/// A detected-note-appraiser event derived from `dna_*` event codes.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Dna {
    /// Wall-clock time in seconds.
    pub time: f32,
    /// DNA id.
    pub id: u32,
}

/// A labelled region of the song.
#[derive(Debug, Clone, PartialEq)]
pub struct Section {
    /// Section name.
    pub name: String,
    /// Occurrence number of this name.
    pub number: u32,
    /// Start time in seconds.
    pub start_time: f32,
    /// End time; closed by compilation.
    pub end_time: f32,
    /// First phrase iteration containing the start time.
    pub start_phrase_iteration_id: u32,
    /// Phrase iteration containing the end time.
    pub end_phrase_iteration_id: u32,
    /// Per-difficulty string usage masks.
    pub string_mask: [i8; 36],
    /// Solo marker; manifest-only, not serialized.
    pub is_solo: bool,
}

impl Default for Section {
    fn default() -> Self {
        Self {
            name: String::default(),
            number: 0,
            start_time: 0.0,
            end_time: 0.0,
            start_phrase_iteration_id: 0,
            end_phrase_iteration_id: 0,
            string_mask: [0; 36],
            is_solo: false,
        }
    }
}

/// A left-hand position hint over a time window.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Anchor {
    /// Start time in seconds.
    pub time: f32,
    /// End time; closed by compilation.
    pub end_time: f32,
    /// First enclosed note time.
    pub unk_time: f32,
    /// Last enclosed note time, sustain included when it fits.
    pub unk_time2: f32,
    /// Anchor fret.
    pub fret: i32,
    /// Anchor width in frets.
    pub width: i32,
    /// Index of the enclosing phrase iteration.
    pub phrase_iteration_id: u32,
}

/// A slide target appended after its note's sustain.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct AnchorExtension {
    /// Wall-clock time in seconds.
    pub time: f32,
    /// Target fret.
    pub fret: i8,
}

/// A hand shape window referencing a chord template.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct FingerPrint {
    /// The chord template in effect.
    pub chord_id: u32,
    /// Start time in seconds.
    pub start_time: f32,
    /// End time in seconds.
    pub end_time: f32,
    /// First enclosed note time.
    pub unk_start_time: f32,
    /// Last enclosed note time, sustain included when it fits.
    pub unk_end_time: f32,
}

/// A playable note, or a chord once compilation has merged chords into the
/// note list.
#[derive(Debug, Clone, PartialEq)]
pub struct Note {
    /// Technique mask.
    pub mask: u32,
    /// Display flags.
    pub flags: u32,
    /// Stable identity hash.
    pub hash: i32,
    /// Wall-clock time in seconds.
    pub time: f32,
    /// String index 0–5, `-1` for chords.
    pub string: i8,
    /// Fret, `-1` for chords.
    pub fret: i8,
    /// Fret of the enclosing anchor.
    pub anchor_fret: i8,
    /// Width of the enclosing anchor.
    pub anchor_width: i8,
    /// Chord template id, `-1` for single notes.
    pub chord_id: i32,
    /// Deduplicated chord-note id, `-1` when techniques are absent.
    pub chord_note_id: i32,
    /// Enclosing phrase id.
    pub phrase_id: i32,
    /// Enclosing phrase iteration index.
    pub phrase_iteration_id: i32,
    /// Enclosing fingerprint per bucket (normal, arpeggio).
    pub finger_print_id: [i16; 2],
    /// Next note slot within the iteration.
    pub next_iter_note: i16,
    /// Previous note slot within the iteration.
    pub prev_iter_note: i16,
    /// Slot of the linked parent note.
    pub parent_prev_note: i16,
    /// Pitched slide target, `-1` when absent.
    pub slide_to: i8,
    /// Unpitched slide target, `-1` when absent.
    pub slide_unpitch_to: i8,
    /// Left-hand finger, `-1` when unknown.
    pub left_hand: i8,
    /// Tap finger.
    pub tap: i8,
    /// Pick direction.
    pub pick_direction: i8,
    /// Slap marker, `-1` when absent.
    pub slap: i8,
    /// Pluck marker, `-1` when absent.
    pub pluck: i8,
    /// Vibrato strength.
    pub vibrato: i16,
    /// Sustain in seconds.
    pub sustain: f32,
    /// Maximum bend in half steps.
    pub bend: f32,
    /// Bend envelope.
    pub bend_values: Vec<BendValue>,

    // Source-side technique fields consumed by the mask passes; never
    // serialized.
    /// Accent marker.
    pub accent: bool,
    /// Hammer-on marker.
    pub hammer_on: bool,
    /// Pull-off marker.
    pub pull_off: bool,
    /// Harmonic marker.
    pub harmonic: bool,
    /// Pinch harmonic marker.
    pub harmonic_pinch: bool,
    /// Scoring-ignore marker.
    pub ignore: bool,
    /// Link to the next note.
    pub link_next: bool,
    /// String mute marker.
    pub mute: bool,
    /// Palm mute marker.
    pub palm_mute: bool,
    /// Right-hand hint, `-1` when absent.
    pub right_hand: i8,
    /// Tremolo marker.
    pub tremolo: bool,
}

impl Default for Note {
    fn default() -> Self {
        Self {
            mask: 0,
            flags: 0,
            hash: 0,
            time: 0.0,
            string: -1,
            fret: -1,
            anchor_fret: -1,
            anchor_width: -1,
            chord_id: -1,
            chord_note_id: -1,
            phrase_id: -1,
            phrase_iteration_id: -1,
            finger_print_id: [-1, -1],
            next_iter_note: -1,
            prev_iter_note: -1,
            parent_prev_note: -1,
            slide_to: -1,
            slide_unpitch_to: -1,
            left_hand: -1,
            tap: 0,
            pick_direction: 0,
            slap: -1,
            pluck: -1,
            vibrato: 0,
            sustain: 0.0,
            bend: 0.0,
            bend_values: Vec::new(),
            accent: false,
            hammer_on: false,
            pull_off: false,
            harmonic: false,
            harmonic_pinch: false,
            ignore: false,
            link_next: false,
            mute: false,
            palm_mute: false,
            right_hand: -1,
            tremolo: false,
        }
    }
}

/// A chord as authored: template reference, chord-level technique flags
/// and the embedded child notes. Compilation lowers chords into the level
/// note list.
#[derive(Debug, Clone, PartialEq)]
pub struct Chord {
    /// Wall-clock time in seconds.
    pub time: f32,
    /// The chord template played.
    pub chord_id: i32,
    /// Accent marker.
    pub accent: bool,
    /// Fret-hand mute marker.
    pub fret_hand_mute: bool,
    /// High-density repetition marker.
    pub high_density: bool,
    /// Scoring-ignore marker.
    pub ignore: bool,
    /// Link to the next note.
    pub link_next: bool,
    /// Palm mute marker.
    pub palm_mute: bool,
    /// Strum direction.
    pub strum: String,
    /// The embedded child notes.
    pub chord_notes: Vec<Note>,
}

impl Default for Chord {
    fn default() -> Self {
        Self {
            time: 0.0,
            chord_id: -1,
            accent: false,
            fret_hand_mute: false,
            high_density: false,
            ignore: false,
            link_next: false,
            palm_mute: false,
            strum: "down".to_string(),
            chord_notes: Vec::new(),
        }
    }
}

/// A hand shape window as authored.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct HandShape {
    /// The chord template in effect.
    pub chord_id: i32,
    /// Start time in seconds.
    pub start_time: f32,
    /// End time in seconds.
    pub end_time: f32,
}

/// One difficulty level of an arrangement.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Level {
    /// Difficulty index.
    pub difficulty: u32,
    /// Left-hand position hints.
    pub anchors: Vec<Anchor>,
    /// Slide targets; built by compilation.
    pub anchor_extensions: Vec<AnchorExtension>,
    /// Hand shape windows split into normal and arpeggio buckets.
    pub finger_prints: [Vec<FingerPrint>; 2],
    /// Notes, with chords merged in by compilation.
    pub notes: Vec<Note>,
    /// Average notes per iteration of each phrase.
    pub average_notes_per_iter: Vec<f32>,
    /// Note counts per iteration, ignored notes excluded.
    pub notes_in_iter_count_no_ignored: Vec<u32>,
    /// Note counts per iteration.
    pub notes_in_iter_count: Vec<u32>,
    /// Authored chords; drained into `notes` by compilation.
    pub chords: Vec<Chord>,
    /// Authored hand shapes; split into `finger_prints` by compilation.
    pub hand_shapes: Vec<HandShape>,
}

/// The trailing metadata block.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Metadata {
    /// Maximum score of the arrangement.
    pub max_score: f64,
    /// Note count at max difficulty.
    pub max_notes: f64,
    /// Note count at max difficulty, ignored notes excluded.
    pub max_notes_no_ignored: f64,
    /// Score value of one note.
    pub points_per_note: f64,
    /// Length of the first beat in seconds.
    pub first_beat_length: f32,
    /// Song start time in seconds.
    pub start_time: f32,
    /// Capo fret, `-1` when uncapoed.
    pub capo: i8,
    /// Conversion timestamp.
    pub last_conversion_date_time: String,
    /// Arrangement part number.
    pub part: i16,
    /// Song length in seconds.
    pub song_length: f32,
    /// String tuning offsets from standard.
    pub tuning: Vec<i16>,
    /// Time of the first played note.
    pub first_note_time: f32,
    /// Duplicate of the first note time.
    pub first_note_time2: f32,
    /// Highest difficulty level.
    pub max_difficulty: i32,
}

/// The per-arrangement flag set echoed into the manifest.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ArrangementProperties {
    /// Techniques observed in the arrangement, by manifest key.
    pub flags: Vec<(String, i64)>,
}

impl ArrangementProperties {
    /// Reads one flag, defaulting to zero.
    #[must_use]
    pub fn get(&self, key: &str) -> i64 {
        self.flags
            .iter()
            .find(|(k, _)| k == key)
            .map_or(0, |(_, v)| *v)
    }

    /// Sets one flag.
    pub fn set(&mut self, key: &str, value: i64) {
        if let Some(slot) = self.flags.iter_mut().find(|(k, _)| k == key) {
            slot.1 = value;
        } else {
            self.flags.push((key.to_string(), value));
        }
    }
}

/// The whole arrangement: wire records plus the song-XML metadata the
/// manifest assembly reads.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Song {
    /// Timing beat markers.
    pub ebeats: Vec<Beat>,
    /// Phrases.
    pub phrases: Vec<Phrase>,
    /// Chord templates.
    pub chord_templates: Vec<ChordTemplate>,
    /// Deduplicated chord-note records; built by compilation.
    pub chord_notes: Vec<ChordNotes>,
    /// Vocal lines.
    pub vocals: Vec<Vocal>,
    /// Lyric symbols, only when vocals are present.
    pub symbols: Option<Symbols>,
    /// Phrase iterations.
    pub phrase_iterations: Vec<PhraseIteration>,
    /// Per-level phrase extras.
    pub phrase_extra_info: Vec<PhraseExtraInfo>,
    /// Linked-difficulty groups.
    pub new_linked_diffs: Vec<NewLinkedDiff>,
    /// Actions.
    pub actions: Vec<Action>,
    /// Events.
    pub events: Vec<Event>,
    /// Tone changes.
    pub tones: Vec<Tone>,
    /// DNA events; derived from event codes by compilation.
    pub dnas: Vec<Dna>,
    /// Sections.
    pub sections: Vec<Section>,
    /// Difficulty levels.
    pub levels: Vec<Level>,
    /// The trailing metadata block; built by compilation.
    pub metadata: Metadata,

    // Song-XML fields consumed by compilation and manifest assembly.
    /// Song title.
    pub title: String,
    /// Arrangement name (`Lead`, `Rhythm`, `Bass`, …).
    pub arrangement: String,
    /// Arrangement part number.
    pub part: i16,
    /// Audio offset in seconds (negative of the start time).
    pub offset: f32,
    /// Cent offset of the tuning.
    pub cent_offset: f32,
    /// Song length in seconds.
    pub song_length: f32,
    /// Average tempo in beats per minute.
    pub average_tempo: f32,
    /// Tuning offsets from standard, per string.
    pub tuning: [i16; 6],
    /// Capo fret, zero when uncapoed.
    pub capo: i8,
    /// Artist name.
    pub artist_name: String,
    /// Artist name for sorting.
    pub artist_name_sort: String,
    /// Album name.
    pub album_name: String,
    /// Album name for sorting.
    pub album_name_sort: String,
    /// Song title for sorting.
    pub song_name_sort: String,
    /// Album release year.
    pub album_year: String,
    /// Album art asset key.
    pub album_art: String,
    /// Internal package name (alphanumeric artist + title).
    pub internal_name: String,
    /// Conversion timestamp.
    pub last_conversion_date_time: String,
    /// Base tone key.
    pub tone_base: String,
    /// Tone slot A.
    pub tone_a: String,
    /// Tone slot B.
    pub tone_b: String,
    /// Tone slot C.
    pub tone_c: String,
    /// Tone slot D.
    pub tone_d: String,
    /// Multiplayer tone key.
    pub tone_multiplayer: String,
    /// Arrangement technique flags.
    pub arrangement_properties: ArrangementProperties,
    /// Time of the first played note; tracked by compilation.
    pub first_note_time: f32,
}

impl Song {
    /// MIDI pitches of the open strings in standard tuning.
    pub const MIDI_NOTES: [i32; 6] = [40, 45, 50, 55, 59, 64];

    /// Computes the standard MIDI pitch of a string/fret pair under the
    /// song's tuning, `-1` for unused strings. Bass arrangements sound an
    /// octave lower.
    #[must_use]
    pub fn midi_note(&self, string: usize, fret: i8) -> i32 {
        if fret == -1 {
            return -1;
        }
        let mut base = Self::MIDI_NOTES[string] + i32::from(self.tuning[string]);
        if self.arrangement == "Bass" {
            base -= 12;
        }
        base + i32::from(fret)
    }
}
