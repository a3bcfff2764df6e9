//! The SNG enrichment passes.
//!
//! [`compile_song`] takes the timeline (or song-XML) intermediate and
//! fills in everything the binary format stores but the source does not:
//! beat numbering, chord-template MIDI pitches, phrase-iteration and
//! section closure, note masks and identity hashes, chord-note
//! deduplication, fingerprint and anchor bookkeeping, per-iteration note
//! statistics and the metadata block.
//!
//! Pass order is significant: sections read the per-level chord lists
//! before level processing merges chords into the note streams.

use itertools::Itertools;

use crate::sng::mask::*;
use crate::sng::model::{
    AnchorExtension, Chord, ChordNotes, Dna, FingerPrint, Metadata, Note, PhraseIteration, Song,
};

use super::SngError;

/// Event codes that double as detected-note-appraiser markers.
const DNA_MAPPING: [(&str, u32); 4] = [
    ("dna_none", 0),
    ("dna_solo", 1),
    ("dna_riff", 2),
    ("dna_chord", 3),
];

/// Index of the phrase iteration containing `time`.
///
/// With `include_end`, an iteration boundary exactly at `time` belongs to
/// the earlier iteration.
#[must_use]
pub fn phrase_iteration_at(piters: &[PhraseIteration], time: f32, include_end: bool) -> usize {
    for (i, piter) in piters.iter().enumerate().skip(1) {
        if piter.time > time || (include_end && piter.time == time) {
            return i - 1;
        }
    }
    piters.len().saturating_sub(1)
}

/// Computes the mask of one note from its technique fields.
#[must_use]
pub fn note_mask(note: &Note, single: bool) -> u32 {
    let mut mask = 0;
    if single {
        mask |= NOTE_MASK_SINGLE;
    }
    if note.fret == 0 {
        mask |= NOTE_MASK_OPEN;
    }
    if note.link_next {
        mask |= NOTE_MASK_PARENT;
    }
    if note.accent {
        mask |= NOTE_MASK_ACCENT;
    }
    if note.bend != 0.0 {
        mask |= NOTE_MASK_BEND;
    }
    if note.hammer_on {
        mask |= NOTE_MASK_HAMMERON;
    }
    if note.harmonic {
        mask |= NOTE_MASK_HARMONIC;
    }
    if single && note.ignore {
        mask |= NOTE_MASK_IGNORE;
    }
    if single && note.left_hand != -1 {
        mask |= NOTE_MASK_LEFTHAND;
    }
    if note.mute {
        mask |= NOTE_MASK_MUTE;
    }
    if note.palm_mute {
        mask |= NOTE_MASK_PALMMUTE;
    }
    if note.pluck != -1 {
        mask |= NOTE_MASK_PLUCK;
    }
    if note.pull_off {
        mask |= NOTE_MASK_PULLOFF;
    }
    if note.slap != -1 {
        mask |= NOTE_MASK_SLAP;
    }
    if note.slide_to != -1 {
        mask |= NOTE_MASK_SLIDE;
    }
    if note.sustain != 0.0 {
        mask |= NOTE_MASK_SUSTAIN;
    }
    if note.tremolo {
        mask |= NOTE_MASK_TREMOLO;
    }
    if note.harmonic_pinch {
        mask |= NOTE_MASK_PINCHHARMONIC;
    }
    if note.right_hand != -1 {
        mask |= NOTE_MASK_RIGHTHAND;
    }
    if note.slide_unpitch_to != -1 {
        mask |= NOTE_MASK_SLIDEUNPITCHEDTO;
    }
    if note.tap != 0 {
        mask |= NOTE_MASK_TAP;
    }
    if note.vibrato != 0 {
        mask |= NOTE_MASK_VIBRATO;
    }
    mask
}

/// The stable identity hash the game uses to recognise a note across
/// recompilations: a CRC-32 of the stringified field tuple.
#[must_use]
pub fn note_hash(note: &Note) -> i32 {
    let mut repr = format!(
        "{} {} {} {} {} {} {} {} {} {} {} {:?} {} {} {} {} {} {} {} {} {} {} {} {} {}",
        note.mask,
        note.flags,
        note.time,
        note.string,
        note.fret,
        note.anchor_fret,
        note.anchor_width,
        note.chord_id,
        note.chord_note_id,
        note.phrase_id,
        note.phrase_iteration_id,
        note.finger_print_id,
        note.next_iter_note,
        note.prev_iter_note,
        note.parent_prev_note,
        note.slide_to,
        note.slide_unpitch_to,
        note.left_hand,
        note.tap,
        note.pick_direction,
        note.slap,
        note.pluck,
        note.vibrato,
        note.sustain,
        note.bend,
    );
    for bend in &note.bend_values {
        repr.push_str(&format!(" {} {}", bend.time, bend.step));
    }
    crc32fast::hash(repr.as_bytes()) as i32
}

fn process_note(note: &mut Note, single: bool, piters: &[PhraseIteration]) {
    note.flags = 0;
    note.anchor_fret = -1;
    note.anchor_width = -1;
    note.chord_id = -1;
    note.chord_note_id = -1;
    note.finger_print_id = [-1, -1];
    note.next_iter_note = -1;
    note.prev_iter_note = -1;
    note.parent_prev_note = -1;
    for bend in &mut note.bend_values {
        bend.unk = 0;
    }

    note.phrase_iteration_id = phrase_iteration_at(piters, note.time, false) as i32;
    note.phrase_id = piters
        .get(note.phrase_iteration_id as usize)
        .map_or(-1, |p| p.phrase_id as i32);
    note.mask = note_mask(note, single);
    note.hash = note_hash(note);
}

fn process_ebeats(song: &mut Song) {
    let Song {
        ebeats,
        phrase_iterations,
        ..
    } = song;

    if let Some(first) = ebeats.first_mut() {
        first.beat = 0;
    }
    for i in 1..ebeats.len() {
        let (previous, ebeat) = {
            let (head, tail) = ebeats.split_at_mut(i);
            (&head[i - 1], &mut tail[0])
        };
        if ebeat.measure > -1 {
            ebeat.beat = 0;
        } else {
            ebeat.measure = previous.measure;
            ebeat.beat = previous.beat + 1;
        }
    }

    for ebeat in ebeats.iter_mut() {
        ebeat.mask = if ebeat.beat == 0 {
            EBEAT_MASK_BAR_START
                | if ebeat.measure % 2 == 0 {
                    EBEAT_MASK_EVEN_MEASURE
                } else {
                    0
                }
        } else {
            0
        };
        ebeat.phrase_iteration = phrase_iteration_at(phrase_iterations, ebeat.time, true) as u32;
    }
}

fn process_chord_templates(song: &mut Song) {
    let tuning = song.tuning;
    let bass = song.arrangement == "Bass";
    for template in &mut song.chord_templates {
        template.mask = 0;
        if template.display_name.ends_with("arp") {
            template.mask |= CHORD_MASK_ARPEGGIO;
        }
        if template.display_name.ends_with("nop") {
            template.mask |= CHORD_MASK_NOP;
        }
        for k in 0..6 {
            template.notes[k] = if template.frets[k] == -1 {
                -1
            } else {
                let mut base = Song::MIDI_NOTES[k] + i32::from(tuning[k]);
                if bass {
                    base -= 12;
                }
                base + i32::from(template.frets[k])
            };
        }
    }
}

fn process_phrase_iterations(song: &mut Song) {
    let song_length = song.song_length;
    let Song {
        phrase_iterations: piters,
        phrases,
        ..
    } = song;

    if let Some(last) = piters.last_mut() {
        last.end_time = song_length;
    }
    for i in 0..piters.len().saturating_sub(1) {
        piters[i].end_time = piters[i + 1].time;
    }

    for piter in piters.iter_mut() {
        let max_difficulty = phrases
            .get(piter.phrase_id as usize)
            .map_or(0, |p| p.max_difficulty);
        piter.difficulty = [0, 0, max_difficulty];
        for &(hero, difficulty) in &piter.hero_levels {
            if (1..=3).contains(&hero) {
                piter.difficulty[(hero - 1) as usize] = difficulty;
            }
        }
    }
}

fn process_sections(song: &mut Song) -> Result<(), SngError> {
    let song_length = song.song_length;
    let max_difficulty = song
        .phrases
        .iter()
        .map(|p| p.max_difficulty)
        .max()
        .unwrap_or(0) as usize;

    if let Some(last) = song.sections.last_mut() {
        last.end_time = song_length;
    }
    for i in 0..song.sections.len().saturating_sub(1) {
        song.sections[i].end_time = song.sections[i + 1].start_time;
    }

    let Song {
        sections,
        phrase_iterations,
        phrases,
        levels,
        chord_templates,
        ..
    } = song;

    for section in sections.iter_mut() {
        section.start_phrase_iteration_id =
            phrase_iteration_at(phrase_iterations, section.start_time, false) as u32;
        section.end_phrase_iteration_id =
            phrase_iteration_at(phrase_iterations, section.end_time, true) as u32;

        section.is_solo = section.name == "solo";
        let range =
            section.start_phrase_iteration_id as usize..section.end_phrase_iteration_id as usize;
        for piter in phrase_iterations.get(range).unwrap_or_default() {
            if phrases
                .get(piter.phrase_id as usize)
                .is_some_and(|p| p.solo > 0)
            {
                section.is_solo = true;
            }
        }

        let mut string_mask = [0i8; 36];
        for j in (0..=max_difficulty).rev() {
            let level = levels.get(j).ok_or_else(|| {
                SngError::DanglingReference(format!("level {j} past {}", levels.len()))
            })?;
            let mut mask = 0i8;
            for note in &level.notes {
                if section.start_time <= note.time && note.time < section.end_time {
                    mask |= 1 << note.string;
                }
            }
            for chord in &level.chords {
                if section.start_time <= chord.time && chord.time < section.end_time {
                    let template =
                        chord_templates
                            .get(chord.chord_id as usize)
                            .ok_or_else(|| {
                                SngError::DanglingReference(format!(
                                    "chord template {}",
                                    chord.chord_id
                                ))
                            })?;
                    for (i, &fret) in template.frets.iter().enumerate() {
                        if fret > -1 {
                            mask |= 1 << i;
                        }
                    }
                }
            }
            if mask == 0 && j < max_difficulty {
                mask = string_mask[j + 1];
            }
            string_mask[j] = mask;
        }
        section.string_mask = string_mask;
    }

    Ok(())
}

/// Lowers one authored chord into its wire note, deduplicating the
/// per-string technique record into the song-wide chord-note table.
fn lower_chord(
    mut chord: Chord,
    piters: &[PhraseIteration],
    template_frets: &[i8; 6],
    chord_notes: &mut Vec<ChordNotes>,
) -> Note {
    for child in &mut chord.chord_notes {
        process_note(child, false, piters);
    }

    let mut cn = ChordNotes::default();
    let mut technique = false;
    for child in &chord.chord_notes {
        let s = child.string as usize;
        if s >= 6 {
            continue;
        }
        cn.mask[s] = child.mask;
        technique |= child.mask != 0;
        cn.vibrato[s] = child.vibrato;
        cn.slide_to[s] = child.slide_to;
        cn.slide_unpitch_to[s] = child.slide_unpitch_to;
        cn.bend_values[s].used_count = child.bend_values.len().min(32) as u32;
        for (i, bend) in child.bend_values.iter().take(32).enumerate() {
            cn.bend_values[s].bend_values[i] = *bend;
        }
    }

    let chord_note_id = if technique {
        match chord_notes.iter().position(|x| *x == cn) {
            Some(i) => i as i32,
            None => {
                chord_notes.push(cn);
                (chord_notes.len() - 1) as i32
            }
        }
    } else {
        -1
    };

    let sustain = chord
        .chord_notes
        .iter()
        .map(|n| n.sustain)
        .fold(0.0f32, f32::max);
    let fretted = template_frets.iter().filter(|&&f| f != -1).count();

    let mut mask = NOTE_MASK_CHORD;
    if chord_note_id > -1 {
        mask |= NOTE_MASK_CHORDNOTES;
    }
    if chord.link_next {
        mask |= NOTE_MASK_PARENT;
    }
    if chord.accent {
        mask |= NOTE_MASK_ACCENT;
    }
    if chord.fret_hand_mute {
        mask |= NOTE_MASK_FRETHANDMUTE;
    }
    if chord.high_density {
        mask |= NOTE_MASK_HIGHDENSITY;
    }
    if chord.ignore {
        mask |= NOTE_MASK_IGNORE;
    }
    if chord.palm_mute {
        mask |= NOTE_MASK_PALMMUTE;
    }
    if sustain > 0.0 {
        mask |= NOTE_MASK_SUSTAIN;
    }
    if fretted == 2 {
        mask |= NOTE_MASK_DOUBLESTOP;
    }

    let phrase_iteration_id = phrase_iteration_at(piters, chord.time, false) as i32;
    let mut note = Note {
        time: chord.time,
        chord_id: chord.chord_id,
        chord_note_id,
        sustain,
        mask,
        pick_direction: -1,
        phrase_iteration_id,
        phrase_id: piters
            .get(phrase_iteration_id as usize)
            .map_or(-1, |p| p.phrase_id as i32),
        ignore: chord.ignore,
        link_next: chord.link_next,
        palm_mute: chord.palm_mute,
        accent: chord.accent,
        ..Note::default()
    };
    note.hash = note_hash(&note);
    note
}

fn process_level(song: &mut Song, level_idx: usize) -> Result<(), SngError> {
    let mut level = std::mem::take(&mut song.levels[level_idx]);
    let piters = song.phrase_iterations.clone();

    // Anchor end times close on the following anchor; the last one on the
    // final phrase iteration.
    if let Some(last) = level.anchors.last_mut() {
        last.end_time = song.phrase_iterations.last().map_or(0.0, |p| p.time);
    }
    for i in 0..level.anchors.len().saturating_sub(1) {
        level.anchors[i].end_time = level.anchors[i + 1].time;
    }
    for anchor in &mut level.anchors {
        anchor.unk_time = 0.0;
        anchor.unk_time2 = 0.0;
        anchor.phrase_iteration_id = phrase_iteration_at(&piters, anchor.time, false) as u32;
    }

    // Hand shapes split into fingerprint buckets: non-arpeggio first,
    // arpeggio second.
    level.finger_prints = [Vec::new(), Vec::new()];
    for shape in std::mem::take(&mut level.hand_shapes) {
        let template = song
            .chord_templates
            .get(shape.chord_id as usize)
            .ok_or_else(|| SngError::DanglingReference(format!("chord template {}", shape.chord_id)))?;
        let bucket = usize::from(template.mask & CHORD_MASK_ARPEGGIO != 0);
        level.finger_prints[bucket].push(FingerPrint {
            chord_id: shape.chord_id as u32,
            start_time: shape.start_time,
            end_time: shape.end_time,
            unk_start_time: 0.0,
            unk_end_time: 0.0,
        });
    }

    for note in &mut level.notes {
        process_note(note, true, &piters);
    }

    for chord in std::mem::take(&mut level.chords) {
        let template = song
            .chord_templates
            .get(chord.chord_id as usize)
            .ok_or_else(|| SngError::DanglingReference(format!("chord template {}", chord.chord_id)))?;
        let frets = template.frets;
        let note = lower_chord(chord, &piters, &frets, &mut song.chord_notes);
        level.notes.push(note);
    }

    level.notes.sort_by(|a, b| a.time.total_cmp(&b.time));

    if let Some(first) = level.notes.first() {
        if song.first_note_time > first.time {
            song.first_note_time = first.time;
        }
    }

    for note in &mut level.notes {
        for j in 0..2 {
            for (i, fp) in level.finger_prints[j].iter_mut().enumerate() {
                if fp.start_time <= note.time && note.time < fp.end_time {
                    note.finger_print_id[j] = i as i16;
                    if j == 1 {
                        note.mask |= NOTE_MASK_ARPEGGIO;
                    }
                    if fp.start_time == note.time && note.chord_id != -1 {
                        note.mask |= NOTE_MASK_STRUM;
                    }
                    if fp.unk_start_time == 0.0 {
                        fp.unk_start_time = note.time;
                    }
                    fp.unk_end_time = note.time;
                    if note.time + note.sustain < fp.end_time {
                        fp.unk_end_time += note.sustain;
                    }
                }
            }
        }

        for anchor in &mut level.anchors {
            if anchor.time <= note.time && note.time < anchor.end_time {
                note.anchor_width = anchor.width as i8;
                note.anchor_fret = anchor.fret as i8;
                if anchor.unk_time == 0.0 {
                    anchor.unk_time = note.time;
                }
                anchor.unk_time2 = note.time;
                if note.time + note.sustain < anchor.end_time - 0.1 {
                    anchor.unk_time2 += note.sustain;
                }
            }
        }
    }

    // Anchors that never saw a note get a token tenth of a second.
    for anchor in &mut level.anchors {
        if anchor.unk_time == 0.0 {
            anchor.unk_time = anchor.time;
            anchor.unk_time2 = anchor.time + 0.1;
        }
    }

    for piter in &piters {
        let mut count = 0;
        let mut exit = 0;
        for j in 0..level.notes.len() {
            exit = j;
            let time = level.notes[j].time;
            if time < piter.time {
                continue;
            }
            if piter.end_time <= time {
                break;
            }
            level.notes[j].next_iter_note = (j + 1) as i16;
            if count > 0 {
                level.notes[j].prev_iter_note = (j - 1) as i16;
            }
            count += 1;
        }
        if count > 0 {
            level.notes[exit].next_iter_note = -1;
        }
    }

    for j in 1..level.notes.len() {
        let time = level.notes[j].time;
        let string = level.notes[j].string;

        let mut prevnote = 1;
        if level.notes[j - 1].time == time {
            for i in 0..level.notes.len() {
                if j < i + 1 {
                    prevnote = i;
                    break;
                }
                let prior = &level.notes[j - i];
                if prior.time != time && (prior.chord_id != -1 || prior.string == string) {
                    prevnote = i;
                    break;
                }
            }
        }
        let prior = &level.notes[j - prevnote];
        if prior.mask & NOTE_MASK_PARENT != 0 {
            let parent_prev = prior.next_iter_note - 1;
            level.notes[j].parent_prev_note = parent_prev;
            level.notes[j].mask |= NOTE_MASK_CHILD;
        }
    }

    level.anchor_extensions = level
        .notes
        .iter()
        .filter(|n| n.slide_to != -1)
        .map(|n| AnchorExtension {
            fret: n.slide_to,
            time: n.time + n.sustain,
        })
        .collect();

    level.notes_in_iter_count = vec![0; piters.len()];
    level.notes_in_iter_count_no_ignored = vec![0; piters.len()];
    for note in &level.notes {
        for i in 1..piters.len() {
            if piters[i].time > note.time {
                if !note.ignore {
                    level.notes_in_iter_count_no_ignored[i - 1] += 1;
                }
                level.notes_in_iter_count[i - 1] += 1;
                break;
            }
        }
    }

    level.average_notes_per_iter = vec![0.0; song.phrases.len()];
    let mut iter_count = vec![0u32; song.phrases.len()];
    for (i, piter) in piters.iter().enumerate() {
        let phrase = piter.phrase_id as usize;
        if phrase < level.average_notes_per_iter.len() {
            level.average_notes_per_iter[phrase] += level.notes_in_iter_count[i] as f32;
            iter_count[phrase] += 1;
        }
    }
    for (avg, count) in level.average_notes_per_iter.iter_mut().zip(&iter_count) {
        if *count > 0 {
            *avg /= *count as f32;
        }
    }

    // Numbering: a note keeps its fret number unless a numbered twin
    // (same fret, or same chord) played within the past eight notes and
    // two seconds of the same iteration.
    let mut p = 0;
    let mut i = 0;
    while i < level.notes.len() {
        let time = level.notes[i].time;
        let fret = level.notes[i].fret;
        let chord_id = level.notes[i].chord_id;
        if fret == 0 {
            i += 1;
            continue;
        }
        if p < piters.len() && piters[p].end_time <= time {
            p += 1;
            continue;
        }
        let mut repeat = false;
        let start = i.saturating_sub(8);
        let mut j = i as isize - 1;
        while j >= start as isize {
            let prior = &level.notes[j as usize];
            if prior.time + 2.0 < time
                || (p < piters.len() && prior.time < piters[p].time)
            {
                j -= 1;
                continue;
            }
            let twin = if chord_id == -1 {
                prior.fret == fret
            } else {
                prior.chord_id == chord_id
            };
            if twin && prior.flags & NOTE_FLAGS_NUMBERED != 0 {
                repeat = true;
                break;
            }
            j -= 1;
        }
        if !repeat {
            level.notes[i].flags |= NOTE_FLAGS_NUMBERED;
        }
        i += 1;
    }

    song.levels[level_idx] = level;
    Ok(())
}

fn process_metadata(song: &mut Song) {
    let mut max_notes = 0.0f64;
    let mut max_notes_no_ignored = 0.0f64;
    for (i, piter) in song.phrase_iterations.iter().enumerate() {
        let j = song
            .phrases
            .get(piter.phrase_id as usize)
            .map_or(0, |p| p.max_difficulty) as usize;
        if let Some(level) = song.levels.get(j) {
            max_notes += f64::from(level.notes_in_iter_count.get(i).copied().unwrap_or(0));
            max_notes_no_ignored += f64::from(
                level
                    .notes_in_iter_count_no_ignored
                    .get(i)
                    .copied()
                    .unwrap_or(0),
            );
        }
    }

    let max_difficulty = song
        .phrases
        .iter()
        .map(|p| p.max_difficulty)
        .max()
        .unwrap_or(0);
    song.levels.truncate(max_difficulty as usize + 1);

    song.metadata = Metadata {
        max_score: 100_000.0,
        max_notes,
        max_notes_no_ignored,
        points_per_note: if max_notes > 0.0 {
            100_000.0 / max_notes
        } else {
            0.0
        },
        first_beat_length: match song.ebeats.get(..2) {
            Some([a, b]) => b.time - a.time,
            _ => 0.0,
        },
        start_time: -song.offset,
        capo: if song.capo == 0 { -1 } else { song.capo },
        last_conversion_date_time: song.last_conversion_date_time.clone(),
        part: song.part,
        song_length: song.song_length,
        tuning: song.tuning.to_vec(),
        first_note_time: song.first_note_time,
        first_note_time2: song.first_note_time,
        max_difficulty: max_difficulty as i32,
    };
}

/// Runs every enrichment pass over a song.
pub fn compile_song(song: &mut Song) -> Result<(), SngError> {
    if song.internal_name.is_empty() {
        song.internal_name = song.title.clone();
    }
    if song.album_name_sort.is_empty() {
        song.album_name_sort = song.album_name.clone();
    }
    if song.song_name_sort.is_empty() {
        song.song_name_sort = song.title.clone();
    }

    song.first_note_time = 1.0e6;
    song.phrase_extra_info.clear();
    song.actions.clear();
    song.chord_notes.clear();

    process_ebeats(song);

    let links = song
        .phrase_iterations
        .iter()
        .map(|piter| piter.phrase_id)
        .counts();
    for (i, phrase) in song.phrases.iter_mut().enumerate() {
        phrase.phrase_iteration_links = links.get(&(i as u32)).copied().unwrap_or(0) as u32;
    }

    process_chord_templates(song);
    process_phrase_iterations(song);

    song.dnas = song
        .events
        .iter()
        .filter_map(|event| {
            DNA_MAPPING
                .iter()
                .find(|(code, _)| *code == event.code)
                .map(|&(_, id)| Dna {
                    time: event.time,
                    id,
                })
        })
        .collect();

    process_sections(song)?;

    for i in 0..song.levels.len() {
        process_level(song, i)?;
    }

    process_metadata(song);
    Ok(())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::sng::model::{Beat, ChordTemplate, HandShape, Level, Phrase, Section};

    fn base_song() -> Song {
        Song {
            ebeats: vec![
                Beat {
                    time: 10.0,
                    measure: 1,
                    ..Beat::default()
                },
                Beat {
                    time: 10.5,
                    measure: -1,
                    ..Beat::default()
                },
                Beat {
                    time: 11.0,
                    measure: 2,
                    ..Beat::default()
                },
                Beat {
                    time: 11.5,
                    measure: -1,
                    ..Beat::default()
                },
            ],
            phrases: vec![Phrase {
                name: "default".into(),
                ..Phrase::default()
            }],
            phrase_iterations: vec![PhraseIteration::default()],
            levels: vec![Level::default()],
            song_length: 12.0,
            offset: -10.0,
            part: 1,
            ..Song::default()
        }
    }

    #[test]
    fn ebeats_inherit_measures_and_count_beats() {
        let mut song = base_song();
        compile_song(&mut song).unwrap();

        let beats: Vec<(i32, u16, u32)> = song
            .ebeats
            .iter()
            .map(|b| (b.measure, b.beat, b.mask))
            .collect();
        assert_eq!(
            beats,
            vec![(1, 0, 1), (1, 1, 0), (2, 0, 3), (2, 1, 0)]
        );
    }

    #[test]
    fn chord_mask_composition() {
        let mut song = base_song();
        song.chord_templates = vec![ChordTemplate {
            frets: [3, 5, -1, -1, -1, -1],
            ..ChordTemplate::default()
        }];
        let child = |string: i8, tremolo: bool| Note {
            time: 10.0,
            string,
            fret: 3,
            tremolo,
            ..Note::default()
        };
        song.levels[0].chords = vec![Chord {
            time: 10.0,
            chord_id: 0,
            link_next: true,
            palm_mute: true,
            chord_notes: vec![child(0, true), child(1, false)],
            ..Chord::default()
        }];
        song.levels[0].hand_shapes = vec![HandShape {
            chord_id: 0,
            start_time: 10.0,
            end_time: 10.9,
        }];
        compile_song(&mut song).unwrap();

        let chord = &song.levels[0].notes[0];
        assert_eq!(chord.chord_note_id, 0);
        let expected = NOTE_MASK_CHORD
            | NOTE_MASK_DOUBLESTOP
            | NOTE_MASK_PARENT
            | NOTE_MASK_PALMMUTE
            | NOTE_MASK_CHORDNOTES
            | NOTE_MASK_STRUM;
        assert_eq!(chord.mask, expected);

        // The tremolo child left its mark in the deduplicated table.
        assert_eq!(song.chord_notes.len(), 1);
        assert_ne!(song.chord_notes[0].mask[0] & NOTE_MASK_TREMOLO, 0);
        assert_eq!(song.chord_notes[0].slide_to, [-1; 6]);
    }

    #[test]
    fn identical_notes_hash_identically() {
        let a = Note {
            time: 12.5,
            string: 2,
            fret: 7,
            ..Note::default()
        };
        let b = a.clone();
        assert_eq!(note_hash(&a), note_hash(&b));
        let c = Note { fret: 8, ..b };
        assert_ne!(note_hash(&a), note_hash(&c));
    }

    #[test]
    fn notes_cover_their_phrase_iterations() {
        let mut song = base_song();
        song.phrase_iterations = vec![
            PhraseIteration {
                time: 0.0,
                ..PhraseIteration::default()
            },
            PhraseIteration {
                time: 11.0,
                ..PhraseIteration::default()
            },
        ];
        for t in [10.0, 10.5, 11.0, 11.5] {
            song.levels[0].notes.push(Note {
                time: t,
                string: 0,
                fret: 2,
                ..Note::default()
            });
        }
        compile_song(&mut song).unwrap();

        for note in &song.levels[0].notes {
            let id = note.phrase_iteration_id as usize;
            let piter = &song.phrase_iterations[id];
            assert!(piter.time <= note.time);
            if id + 1 < song.phrase_iterations.len() {
                assert!(note.time < song.phrase_iterations[id + 1].time);
            }
        }
    }

    #[test]
    fn sections_compute_string_masks() {
        let mut song = base_song();
        song.sections = vec![
            Section {
                name: "verse".into(),
                number: 0,
                start_time: 10.0,
                ..Section::default()
            },
            Section {
                name: "solo".into(),
                number: 1,
                start_time: 11.0,
                ..Section::default()
            },
        ];
        song.levels[0].notes = vec![
            Note {
                time: 10.2,
                string: 2,
                fret: 5,
                ..Note::default()
            },
            Note {
                time: 11.2,
                string: 4,
                fret: 5,
                ..Note::default()
            },
        ];
        compile_song(&mut song).unwrap();

        assert_eq!(song.sections[0].end_time, 11.0);
        assert_eq!(song.sections[1].end_time, 12.0);
        assert_eq!(song.sections[0].string_mask[0], 1 << 2);
        assert_eq!(song.sections[1].string_mask[0], 1 << 4);
        assert!(!song.sections[0].is_solo);
        assert!(song.sections[1].is_solo);
    }

    #[test]
    fn numbering_skips_recent_twins() {
        let mut song = base_song();
        for (i, t) in [10.0, 10.5, 11.0].into_iter().enumerate() {
            song.levels[0].notes.push(Note {
                time: t,
                string: 0,
                fret: if i == 2 { 9 } else { 7 },
                ..Note::default()
            });
        }
        compile_song(&mut song).unwrap();

        let flags: Vec<u32> = song.levels[0].notes.iter().map(|n| n.flags).collect();
        // The second note repeats fret 7 within two seconds: unnumbered.
        assert_eq!(
            flags,
            vec![NOTE_FLAGS_NUMBERED, 0, NOTE_FLAGS_NUMBERED]
        );
    }

    #[test]
    fn metadata_counts_notes_at_max_difficulty() {
        let mut song = base_song();
        for t in [10.0, 10.5, 11.0] {
            song.levels[0].notes.push(Note {
                time: t,
                string: 0,
                fret: 2,
                ..Note::default()
            });
        }
        song.phrase_iterations.push(PhraseIteration {
            time: 11.8,
            ..PhraseIteration::default()
        });
        compile_song(&mut song).unwrap();

        assert_eq!(song.metadata.max_notes, 3.0);
        assert_eq!(song.metadata.points_per_note, 100_000.0 / 3.0);
        assert_eq!(song.metadata.start_time, 10.0);
        assert_eq!(song.metadata.capo, -1);
        assert_eq!(song.metadata.first_beat_length, 0.5);
        assert_eq!(song.metadata.max_difficulty, 0);
        assert_eq!(song.levels.len(), 1);
    }
}
