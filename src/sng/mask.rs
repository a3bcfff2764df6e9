//! Note, chord-template and flag bit constants of the SNG format.

/// Note is played on its own, not inside a chord.
pub const NOTE_MASK_SINGLE: u32 = 0x0080_0000;
/// Note belongs to a chord.
pub const NOTE_MASK_CHORD: u32 = 0x0000_0002;
/// Open string.
pub const NOTE_MASK_OPEN: u32 = 0x0000_0004;
/// Fret-hand mute.
pub const NOTE_MASK_FRETHANDMUTE: u32 = 0x0000_0008;
/// Tremolo picking.
pub const NOTE_MASK_TREMOLO: u32 = 0x0000_0010;
/// Natural or artificial harmonic.
pub const NOTE_MASK_HARMONIC: u32 = 0x0000_0020;
/// Palm mute.
pub const NOTE_MASK_PALMMUTE: u32 = 0x0000_0040;
/// Slap technique.
pub const NOTE_MASK_SLAP: u32 = 0x0000_0080;
/// Pluck / pop technique.
pub const NOTE_MASK_PLUCK: u32 = 0x0000_0100;
/// Hammer-on.
pub const NOTE_MASK_HAMMERON: u32 = 0x0000_0200;
/// Pull-off.
pub const NOTE_MASK_PULLOFF: u32 = 0x0000_0400;
/// Pitched slide.
pub const NOTE_MASK_SLIDE: u32 = 0x0000_0800;
/// Bend.
pub const NOTE_MASK_BEND: u32 = 0x0000_1000;
/// Sustained note.
pub const NOTE_MASK_SUSTAIN: u32 = 0x0000_2000;
/// Tapped note.
pub const NOTE_MASK_TAP: u32 = 0x0000_4000;
/// Pinch harmonic.
pub const NOTE_MASK_PINCHHARMONIC: u32 = 0x0000_8000;
/// Vibrato.
pub const NOTE_MASK_VIBRATO: u32 = 0x0001_0000;
/// String mute.
pub const NOTE_MASK_MUTE: u32 = 0x0002_0000;
/// Ignored for scoring.
pub const NOTE_MASK_IGNORE: u32 = 0x0004_0000;
/// Left-hand fingering hint present.
pub const NOTE_MASK_LEFTHAND: u32 = 0x0008_0000;
/// Right-hand hint present.
pub const NOTE_MASK_RIGHTHAND: u32 = 0x0010_0000;
/// High-density chord repetition.
pub const NOTE_MASK_HIGHDENSITY: u32 = 0x0020_0000;
/// Unpitched slide.
pub const NOTE_MASK_SLIDEUNPITCHEDTO: u32 = 0x0040_0000;
/// Chord carries a deduplicated chord-note record.
pub const NOTE_MASK_CHORDNOTES: u32 = 0x0100_0000;
/// Exactly two fretted strings.
pub const NOTE_MASK_DOUBLESTOP: u32 = 0x0200_0000;
/// Accent.
pub const NOTE_MASK_ACCENT: u32 = 0x0400_0000;
/// Links to the next note.
pub const NOTE_MASK_PARENT: u32 = 0x0800_0000;
/// Linked from the previous note.
pub const NOTE_MASK_CHILD: u32 = 0x1000_0000;
/// Inside an arpeggio hand shape.
pub const NOTE_MASK_ARPEGGIO: u32 = 0x2000_0000;
/// First chord of its hand shape.
pub const NOTE_MASK_STRUM: u32 = 0x8000_0000;

/// Chord template is an arpeggio shape.
pub const CHORD_MASK_ARPEGGIO: u32 = 0x0000_0001;
/// Chord template is a no-op shape.
pub const CHORD_MASK_NOP: u32 = 0x0000_0002;

/// Note shows a fret number in the game UI.
pub const NOTE_FLAGS_NUMBERED: u32 = 0x0000_0001;

/// Ebeat starts a measure.
pub const EBEAT_MASK_BAR_START: u32 = 0x0000_0001;
/// Ebeat starts an even measure.
pub const EBEAT_MASK_EVEN_MEASURE: u32 = 0x0000_0002;
