//! The binary SNG record layout.
//!
//! Every sequence is prefixed with a little-endian `u32` count, every
//! multi-byte scalar is little-endian, floats are IEEE-754 single (double
//! in the metadata block where noted) and fixed-length strings are
//! NUL-padded. Encoding and decoding are exact inverses: decoding an
//! existing file and re-encoding it reproduces the same bytes.

use std::io::{Cursor, Read};

use byteorder::{LittleEndian as LE, ReadBytesExt, WriteBytesExt};

use crate::sng::model::{
    Action, Anchor, AnchorExtension, Beat, BendValue, BendValues32, ChordNotes, ChordTemplate,
    Dna, Event, FingerPrint, Level, Metadata, Note, Phrase, PhraseExtraInfo, PhraseIteration,
    Section, Song, SymbolDefinition, Symbols, Texture, Tone, Vocal,
};

use super::SngError;

fn write_string(out: &mut Vec<u8>, s: &str, len: usize) {
    let bytes = s.as_bytes();
    let used = bytes.len().min(len);
    out.extend_from_slice(&bytes[..used]);
    out.resize(out.len() + (len - used), 0);
}

fn write_count(out: &mut Vec<u8>, count: usize) {
    let _ = out.write_u32::<LE>(count as u32);
}

struct Decoder<'a> {
    cur: Cursor<&'a [u8]>,
}

impl<'a> Decoder<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self {
            cur: Cursor::new(data),
        }
    }

    fn remaining(&self) -> usize {
        let len = self.cur.get_ref().len() as u64;
        (len.saturating_sub(self.cur.position())) as usize
    }

    fn u8(&mut self) -> Result<u8, SngError> {
        Ok(self.cur.read_u8()?)
    }

    fn i8(&mut self) -> Result<i8, SngError> {
        Ok(self.cur.read_i8()?)
    }

    fn u16(&mut self) -> Result<u16, SngError> {
        Ok(self.cur.read_u16::<LE>()?)
    }

    fn i16(&mut self) -> Result<i16, SngError> {
        Ok(self.cur.read_i16::<LE>()?)
    }

    fn u32(&mut self) -> Result<u32, SngError> {
        Ok(self.cur.read_u32::<LE>()?)
    }

    fn i32(&mut self) -> Result<i32, SngError> {
        Ok(self.cur.read_i32::<LE>()?)
    }

    fn f32(&mut self) -> Result<f32, SngError> {
        Ok(self.cur.read_f32::<LE>()?)
    }

    fn f64(&mut self) -> Result<f64, SngError> {
        Ok(self.cur.read_f64::<LE>()?)
    }

    fn skip(&mut self, n: usize) -> Result<(), SngError> {
        let mut sink = vec![0u8; n];
        self.cur.read_exact(&mut sink)?;
        Ok(())
    }

    fn string(&mut self, len: usize) -> Result<String, SngError> {
        let mut raw = vec![0u8; len];
        self.cur.read_exact(&mut raw)?;
        let end = raw.iter().position(|&b| b == 0).unwrap_or(len);
        Ok(String::from_utf8_lossy(&raw[..end]).into_owned())
    }

    /// Reads a sequence count, rejecting counts the remaining bytes can
    /// not possibly satisfy.
    fn count(&mut self, min_record: usize) -> Result<usize, SngError> {
        let count = self.u32()? as usize;
        if count.saturating_mul(min_record) > self.remaining() {
            return Err(SngError::Truncated);
        }
        Ok(count)
    }
}

fn write_beat(out: &mut Vec<u8>, b: &Beat) {
    let _ = out.write_f32::<LE>(b.time);
    let _ = out.write_u16::<LE>(b.measure as u16);
    let _ = out.write_u16::<LE>(b.beat);
    let _ = out.write_u32::<LE>(b.phrase_iteration);
    let _ = out.write_u32::<LE>(b.mask);
}

fn read_beat(d: &mut Decoder<'_>) -> Result<Beat, SngError> {
    Ok(Beat {
        time: d.f32()?,
        measure: i32::from(d.u16()? as i16),
        beat: d.u16()?,
        phrase_iteration: d.u32()?,
        mask: d.u32()?,
    })
}

fn write_phrase(out: &mut Vec<u8>, p: &Phrase) {
    let _ = out.write_i8(p.solo);
    let _ = out.write_i8(p.disparity);
    let _ = out.write_i8(p.ignore);
    out.push(0);
    let _ = out.write_u32::<LE>(p.max_difficulty);
    let _ = out.write_u32::<LE>(p.phrase_iteration_links);
    write_string(out, &p.name, 32);
}

fn read_phrase(d: &mut Decoder<'_>) -> Result<Phrase, SngError> {
    let solo = d.i8()?;
    let disparity = d.i8()?;
    let ignore = d.i8()?;
    d.skip(1)?;
    Ok(Phrase {
        solo,
        disparity,
        ignore,
        max_difficulty: d.u32()?,
        phrase_iteration_links: d.u32()?,
        name: d.string(32)?,
    })
}

fn write_chord_template(out: &mut Vec<u8>, t: &ChordTemplate) {
    let _ = out.write_u32::<LE>(t.mask);
    for &f in &t.frets {
        let _ = out.write_i8(f);
    }
    for &f in &t.fingers {
        let _ = out.write_i8(f);
    }
    for &n in &t.notes {
        let _ = out.write_i32::<LE>(n);
    }
    write_string(out, &t.chord_name, 32);
}

fn read_chord_template(d: &mut Decoder<'_>) -> Result<ChordTemplate, SngError> {
    let mask = d.u32()?;
    let mut frets = [0i8; 6];
    for f in &mut frets {
        *f = d.i8()?;
    }
    let mut fingers = [0i8; 6];
    for f in &mut fingers {
        *f = d.i8()?;
    }
    let mut notes = [0i32; 6];
    for n in &mut notes {
        *n = d.i32()?;
    }
    Ok(ChordTemplate {
        mask,
        frets,
        fingers,
        notes,
        chord_name: d.string(32)?,
        display_name: String::new(),
    })
}

fn write_bend_value(out: &mut Vec<u8>, b: &BendValue) {
    let _ = out.write_f32::<LE>(b.time);
    let _ = out.write_f32::<LE>(b.step);
    out.extend_from_slice(&[0, 0, 0]);
    let _ = out.write_i8(b.unk);
}

fn read_bend_value(d: &mut Decoder<'_>) -> Result<BendValue, SngError> {
    let time = d.f32()?;
    let step = d.f32()?;
    d.skip(3)?;
    Ok(BendValue {
        time,
        step,
        unk: d.i8()?,
    })
}

fn write_bend_values32(out: &mut Vec<u8>, b: &BendValues32) {
    for bend in &b.bend_values {
        write_bend_value(out, bend);
    }
    let _ = out.write_u32::<LE>(b.used_count);
}

fn read_bend_values32(d: &mut Decoder<'_>) -> Result<BendValues32, SngError> {
    let mut bend_values = [BendValue::default(); 32];
    for bend in &mut bend_values {
        *bend = read_bend_value(d)?;
    }
    Ok(BendValues32 {
        bend_values,
        used_count: d.u32()?,
    })
}

fn write_chord_notes(out: &mut Vec<u8>, c: &ChordNotes) {
    for &m in &c.mask {
        let _ = out.write_u32::<LE>(m);
    }
    for b in &c.bend_values {
        write_bend_values32(out, b);
    }
    for &s in &c.slide_to {
        let _ = out.write_i8(s);
    }
    for &s in &c.slide_unpitch_to {
        let _ = out.write_i8(s);
    }
    for &v in &c.vibrato {
        let _ = out.write_i16::<LE>(v);
    }
}

fn read_chord_notes(d: &mut Decoder<'_>) -> Result<ChordNotes, SngError> {
    let mut cn = ChordNotes::default();
    for m in &mut cn.mask {
        *m = d.u32()?;
    }
    for b in &mut cn.bend_values {
        *b = read_bend_values32(d)?;
    }
    for s in &mut cn.slide_to {
        *s = d.i8()?;
    }
    for s in &mut cn.slide_unpitch_to {
        *s = d.i8()?;
    }
    for v in &mut cn.vibrato {
        *v = d.i16()?;
    }
    Ok(cn)
}

fn write_vocal(out: &mut Vec<u8>, v: &Vocal) {
    let _ = out.write_f32::<LE>(v.time);
    let _ = out.write_i32::<LE>(v.note);
    let _ = out.write_f32::<LE>(v.length);
    write_string(out, &v.lyric, 48);
}

fn read_vocal(d: &mut Decoder<'_>) -> Result<Vocal, SngError> {
    Ok(Vocal {
        time: d.f32()?,
        note: d.i32()?,
        length: d.f32()?,
        lyric: d.string(48)?,
    })
}

fn write_symbols(out: &mut Vec<u8>, s: &Symbols) {
    write_count(out, s.headers.len());
    for header in &s.headers {
        for &v in header {
            let _ = out.write_i32::<LE>(v);
        }
    }
    write_count(out, s.textures.len());
    for t in &s.textures {
        write_string(out, &t.font_path, 128);
        let _ = out.write_u32::<LE>(t.font_path_length);
        out.extend_from_slice(&[0; 4]);
        let _ = out.write_u32::<LE>(t.width);
        let _ = out.write_u32::<LE>(t.height);
    }
    write_count(out, s.definitions.len());
    for def in &s.definitions {
        write_string(out, &def.text, 12);
        for &v in &def.rect_outer {
            let _ = out.write_f32::<LE>(v);
        }
        for &v in &def.rect_inner {
            let _ = out.write_f32::<LE>(v);
        }
    }
}

fn read_symbols(d: &mut Decoder<'_>) -> Result<Symbols, SngError> {
    let mut symbols = Symbols::default();
    for _ in 0..d.count(32)? {
        let mut header = [0i32; 8];
        for v in &mut header {
            *v = d.i32()?;
        }
        symbols.headers.push(header);
    }
    for _ in 0..d.count(144)? {
        let font_path = d.string(128)?;
        let font_path_length = d.u32()?;
        d.skip(4)?;
        symbols.textures.push(Texture {
            font_path,
            font_path_length,
            width: d.u32()?,
            height: d.u32()?,
        });
    }
    for _ in 0..d.count(44)? {
        let text = d.string(12)?;
        let mut rect_outer = [0f32; 4];
        for v in &mut rect_outer {
            *v = d.f32()?;
        }
        let mut rect_inner = [0f32; 4];
        for v in &mut rect_inner {
            *v = d.f32()?;
        }
        symbols.definitions.push(SymbolDefinition {
            text,
            rect_outer,
            rect_inner,
        });
    }
    Ok(symbols)
}

fn write_phrase_iteration(out: &mut Vec<u8>, p: &PhraseIteration) {
    let _ = out.write_u32::<LE>(p.phrase_id);
    let _ = out.write_f32::<LE>(p.time);
    let _ = out.write_f32::<LE>(p.end_time);
    for &dfc in &p.difficulty {
        let _ = out.write_u32::<LE>(dfc);
    }
}

fn read_phrase_iteration(d: &mut Decoder<'_>) -> Result<PhraseIteration, SngError> {
    let phrase_id = d.u32()?;
    let time = d.f32()?;
    let end_time = d.f32()?;
    let mut difficulty = [0u32; 3];
    for dfc in &mut difficulty {
        *dfc = d.u32()?;
    }
    Ok(PhraseIteration {
        phrase_id,
        time,
        end_time,
        difficulty,
        hero_levels: Vec::new(),
    })
}

fn write_phrase_extra_info(out: &mut Vec<u8>, p: &PhraseExtraInfo) {
    let _ = out.write_u32::<LE>(p.phrase_id);
    let _ = out.write_u32::<LE>(p.difficulty);
    let _ = out.write_u32::<LE>(p.empty);
    let _ = out.write_i8(p.level_jump);
    let _ = out.write_i16::<LE>(p.redundant);
    out.push(0);
}

fn read_phrase_extra_info(d: &mut Decoder<'_>) -> Result<PhraseExtraInfo, SngError> {
    let info = PhraseExtraInfo {
        phrase_id: d.u32()?,
        difficulty: d.u32()?,
        empty: d.u32()?,
        level_jump: d.i8()?,
        redundant: d.i16()?,
    };
    d.skip(1)?;
    Ok(info)
}

fn write_note(out: &mut Vec<u8>, n: &Note) {
    let _ = out.write_u32::<LE>(n.mask);
    let _ = out.write_u32::<LE>(n.flags);
    let _ = out.write_i32::<LE>(n.hash);
    let _ = out.write_f32::<LE>(n.time);
    let _ = out.write_i8(n.string);
    let _ = out.write_i8(n.fret);
    let _ = out.write_i8(n.anchor_fret);
    let _ = out.write_i8(n.anchor_width);
    let _ = out.write_i32::<LE>(n.chord_id);
    let _ = out.write_i32::<LE>(n.chord_note_id);
    let _ = out.write_i32::<LE>(n.phrase_id);
    let _ = out.write_i32::<LE>(n.phrase_iteration_id);
    for &fp in &n.finger_print_id {
        let _ = out.write_i16::<LE>(fp);
    }
    let _ = out.write_i16::<LE>(n.next_iter_note);
    let _ = out.write_i16::<LE>(n.prev_iter_note);
    let _ = out.write_i16::<LE>(n.parent_prev_note);
    let _ = out.write_i8(n.slide_to);
    let _ = out.write_i8(n.slide_unpitch_to);
    let _ = out.write_i8(n.left_hand);
    let _ = out.write_i8(n.tap);
    let _ = out.write_i8(n.pick_direction);
    let _ = out.write_i8(n.slap);
    let _ = out.write_i8(n.pluck);
    let _ = out.write_i16::<LE>(n.vibrato);
    let _ = out.write_f32::<LE>(n.sustain);
    let _ = out.write_f32::<LE>(n.bend);
    write_count(out, n.bend_values.len());
    for bend in &n.bend_values {
        write_bend_value(out, bend);
    }
}

fn read_note(d: &mut Decoder<'_>) -> Result<Note, SngError> {
    let mut note = Note {
        mask: d.u32()?,
        flags: d.u32()?,
        hash: d.i32()?,
        time: d.f32()?,
        string: d.i8()?,
        fret: d.i8()?,
        anchor_fret: d.i8()?,
        anchor_width: d.i8()?,
        chord_id: d.i32()?,
        chord_note_id: d.i32()?,
        phrase_id: d.i32()?,
        phrase_iteration_id: d.i32()?,
        ..Note::default()
    };
    for fp in &mut note.finger_print_id {
        *fp = d.i16()?;
    }
    note.next_iter_note = d.i16()?;
    note.prev_iter_note = d.i16()?;
    note.parent_prev_note = d.i16()?;
    note.slide_to = d.i8()?;
    note.slide_unpitch_to = d.i8()?;
    note.left_hand = d.i8()?;
    note.tap = d.i8()?;
    note.pick_direction = d.i8()?;
    note.slap = d.i8()?;
    note.pluck = d.i8()?;
    note.vibrato = d.i16()?;
    note.sustain = d.f32()?;
    note.bend = d.f32()?;
    for _ in 0..d.count(12)? {
        note.bend_values.push(read_bend_value(d)?);
    }
    Ok(note)
}

fn write_anchor(out: &mut Vec<u8>, a: &Anchor) {
    let _ = out.write_f32::<LE>(a.time);
    let _ = out.write_f32::<LE>(a.end_time);
    let _ = out.write_f32::<LE>(a.unk_time);
    let _ = out.write_f32::<LE>(a.unk_time2);
    let _ = out.write_i32::<LE>(a.fret);
    let _ = out.write_i32::<LE>(a.width);
    let _ = out.write_u32::<LE>(a.phrase_iteration_id);
}

fn read_anchor(d: &mut Decoder<'_>) -> Result<Anchor, SngError> {
    Ok(Anchor {
        time: d.f32()?,
        end_time: d.f32()?,
        unk_time: d.f32()?,
        unk_time2: d.f32()?,
        fret: d.i32()?,
        width: d.i32()?,
        phrase_iteration_id: d.u32()?,
    })
}

fn write_level(out: &mut Vec<u8>, level: &Level) {
    let _ = out.write_u32::<LE>(level.difficulty);
    write_count(out, level.anchors.len());
    for anchor in &level.anchors {
        write_anchor(out, anchor);
    }
    write_count(out, level.anchor_extensions.len());
    for ext in &level.anchor_extensions {
        let _ = out.write_f32::<LE>(ext.time);
        let _ = out.write_i8(ext.fret);
        out.extend_from_slice(&[0; 7]);
    }
    for bucket in &level.finger_prints {
        write_count(out, bucket.len());
        for fp in bucket {
            let _ = out.write_u32::<LE>(fp.chord_id);
            let _ = out.write_f32::<LE>(fp.start_time);
            let _ = out.write_f32::<LE>(fp.end_time);
            let _ = out.write_f32::<LE>(fp.unk_start_time);
            let _ = out.write_f32::<LE>(fp.unk_end_time);
        }
    }
    write_count(out, level.notes.len());
    for note in &level.notes {
        write_note(out, note);
    }
    write_count(out, level.average_notes_per_iter.len());
    for &avg in &level.average_notes_per_iter {
        let _ = out.write_f32::<LE>(avg);
    }
    write_count(out, level.notes_in_iter_count_no_ignored.len());
    for &count in &level.notes_in_iter_count_no_ignored {
        let _ = out.write_u32::<LE>(count);
    }
    write_count(out, level.notes_in_iter_count.len());
    for &count in &level.notes_in_iter_count {
        let _ = out.write_u32::<LE>(count);
    }
}

fn read_level(d: &mut Decoder<'_>) -> Result<Level, SngError> {
    let mut level = Level {
        difficulty: d.u32()?,
        ..Level::default()
    };
    for _ in 0..d.count(28)? {
        level.anchors.push(read_anchor(d)?);
    }
    for _ in 0..d.count(12)? {
        let time = d.f32()?;
        let fret = d.i8()?;
        d.skip(7)?;
        level.anchor_extensions.push(AnchorExtension { time, fret });
    }
    for bucket in 0..2 {
        for _ in 0..d.count(20)? {
            level.finger_prints[bucket].push(FingerPrint {
                chord_id: d.u32()?,
                start_time: d.f32()?,
                end_time: d.f32()?,
                unk_start_time: d.f32()?,
                unk_end_time: d.f32()?,
            });
        }
    }
    for _ in 0..d.count(67)? {
        level.notes.push(read_note(d)?);
    }
    for _ in 0..d.count(4)? {
        level.average_notes_per_iter.push(d.f32()?);
    }
    for _ in 0..d.count(4)? {
        level.notes_in_iter_count_no_ignored.push(d.u32()?);
    }
    for _ in 0..d.count(4)? {
        level.notes_in_iter_count.push(d.u32()?);
    }
    Ok(level)
}

fn write_metadata(out: &mut Vec<u8>, m: &Metadata) {
    let _ = out.write_f64::<LE>(m.max_score);
    let _ = out.write_f64::<LE>(m.max_notes);
    let _ = out.write_f64::<LE>(m.max_notes_no_ignored);
    let _ = out.write_f64::<LE>(m.points_per_note);
    let _ = out.write_f32::<LE>(m.first_beat_length);
    let _ = out.write_f32::<LE>(m.start_time);
    let _ = out.write_i8(m.capo);
    write_string(out, &m.last_conversion_date_time, 32);
    let _ = out.write_i16::<LE>(m.part);
    let _ = out.write_f32::<LE>(m.song_length);
    write_count(out, m.tuning.len());
    for &t in &m.tuning {
        let _ = out.write_i16::<LE>(t);
    }
    let _ = out.write_f32::<LE>(m.first_note_time);
    let _ = out.write_f32::<LE>(m.first_note_time2);
    let _ = out.write_i32::<LE>(m.max_difficulty);
}

fn read_metadata(d: &mut Decoder<'_>) -> Result<Metadata, SngError> {
    let max_score = d.f64()?;
    let max_notes = d.f64()?;
    let max_notes_no_ignored = d.f64()?;
    let points_per_note = d.f64()?;
    let first_beat_length = d.f32()?;
    let start_time = d.f32()?;
    let capo = d.i8()?;
    let last_conversion_date_time = d.string(32)?;
    let part = d.i16()?;
    let song_length = d.f32()?;
    let mut tuning = Vec::new();
    for _ in 0..d.count(2)? {
        tuning.push(d.i16()?);
    }
    Ok(Metadata {
        max_score,
        max_notes,
        max_notes_no_ignored,
        points_per_note,
        first_beat_length,
        start_time,
        capo,
        last_conversion_date_time,
        part,
        song_length,
        tuning,
        first_note_time: d.f32()?,
        first_note_time2: d.f32()?,
        max_difficulty: d.i32()?,
    })
}

/// Encodes a compiled song into the binary SNG byte stream.
pub fn encode_sng(song: &Song) -> Result<Vec<u8>, SngError> {
    let mut out = Vec::new();

    write_count(&mut out, song.ebeats.len());
    for beat in &song.ebeats {
        write_beat(&mut out, beat);
    }
    write_count(&mut out, song.phrases.len());
    for phrase in &song.phrases {
        write_phrase(&mut out, phrase);
    }
    write_count(&mut out, song.chord_templates.len());
    for template in &song.chord_templates {
        write_chord_template(&mut out, template);
    }
    write_count(&mut out, song.chord_notes.len());
    for cn in &song.chord_notes {
        write_chord_notes(&mut out, cn);
    }
    write_count(&mut out, song.vocals.len());
    for vocal in &song.vocals {
        write_vocal(&mut out, vocal);
    }
    if !song.vocals.is_empty() {
        write_symbols(&mut out, song.symbols.as_ref().unwrap_or(&Symbols::default()));
    }
    write_count(&mut out, song.phrase_iterations.len());
    for piter in &song.phrase_iterations {
        write_phrase_iteration(&mut out, piter);
    }
    write_count(&mut out, song.phrase_extra_info.len());
    for info in &song.phrase_extra_info {
        write_phrase_extra_info(&mut out, info);
    }
    write_count(&mut out, song.new_linked_diffs.len());
    for nld in &song.new_linked_diffs {
        let _ = out.write_i32::<LE>(nld.level_break);
        write_count(&mut out, nld.phrases.len());
        for &phrase in &nld.phrases {
            let _ = out.write_u32::<LE>(phrase);
        }
    }
    write_count(&mut out, song.actions.len());
    for action in &song.actions {
        let _ = out.write_f32::<LE>(action.time);
        write_string(&mut out, &action.name, 256);
    }
    write_count(&mut out, song.events.len());
    for event in &song.events {
        let _ = out.write_f32::<LE>(event.time);
        write_string(&mut out, &event.code, 256);
    }
    write_count(&mut out, song.tones.len());
    for tone in &song.tones {
        let _ = out.write_f32::<LE>(tone.time);
        let _ = out.write_u32::<LE>(tone.id);
    }
    write_count(&mut out, song.dnas.len());
    for dna in &song.dnas {
        let _ = out.write_f32::<LE>(dna.time);
        let _ = out.write_u32::<LE>(dna.id);
    }
    write_count(&mut out, song.sections.len());
    for section in &song.sections {
        write_string(&mut out, &section.name, 32);
        let _ = out.write_u32::<LE>(section.number);
        let _ = out.write_f32::<LE>(section.start_time);
        let _ = out.write_f32::<LE>(section.end_time);
        let _ = out.write_u32::<LE>(section.start_phrase_iteration_id);
        let _ = out.write_u32::<LE>(section.end_phrase_iteration_id);
        for &mask in &section.string_mask {
            let _ = out.write_i8(mask);
        }
    }
    write_count(&mut out, song.levels.len());
    for level in &song.levels {
        write_level(&mut out, level);
    }
    write_metadata(&mut out, &song.metadata);

    Ok(out)
}

/// Decodes a binary SNG stream into the wire fields of a [`Song`].
///
/// Source-only fields (technique booleans, display names, song metadata
/// held by the XML) come back defaulted; re-encoding the result is
/// byte-identical to the input.
pub fn decode_sng(data: &[u8]) -> Result<Song, SngError> {
    let mut d = Decoder::new(data);
    let mut song = Song::default();

    for _ in 0..d.count(16)? {
        song.ebeats.push(read_beat(&mut d)?);
    }
    for _ in 0..d.count(44)? {
        song.phrases.push(read_phrase(&mut d)?);
    }
    for _ in 0..d.count(72)? {
        song.chord_templates.push(read_chord_template(&mut d)?);
    }
    for _ in 0..d.count(24 + 6 * 388 + 12)? {
        song.chord_notes.push(read_chord_notes(&mut d)?);
    }
    for _ in 0..d.count(60)? {
        song.vocals.push(read_vocal(&mut d)?);
    }
    if !song.vocals.is_empty() {
        song.symbols = Some(read_symbols(&mut d)?);
    }
    for _ in 0..d.count(24)? {
        song.phrase_iterations.push(read_phrase_iteration(&mut d)?);
    }
    for _ in 0..d.count(16)? {
        song.phrase_extra_info.push(read_phrase_extra_info(&mut d)?);
    }
    for _ in 0..d.count(8)? {
        let level_break = d.i32()?;
        let mut phrases = Vec::new();
        for _ in 0..d.count(4)? {
            phrases.push(d.u32()?);
        }
        song.new_linked_diffs.push(crate::sng::model::NewLinkedDiff {
            level_break,
            phrases,
        });
    }
    for _ in 0..d.count(260)? {
        song.actions.push(Action {
            time: d.f32()?,
            name: d.string(256)?,
        });
    }
    for _ in 0..d.count(260)? {
        song.events.push(Event {
            time: d.f32()?,
            code: d.string(256)?,
        });
    }
    for _ in 0..d.count(8)? {
        song.tones.push(Tone {
            time: d.f32()?,
            id: d.u32()?,
        });
    }
    for _ in 0..d.count(8)? {
        song.dnas.push(Dna {
            time: d.f32()?,
            id: d.u32()?,
        });
    }
    for _ in 0..d.count(88)? {
        let name = d.string(32)?;
        let number = d.u32()?;
        let start_time = d.f32()?;
        let end_time = d.f32()?;
        let start_phrase_iteration_id = d.u32()?;
        let end_phrase_iteration_id = d.u32()?;
        let mut string_mask = [0i8; 36];
        for mask in &mut string_mask {
            *mask = d.i8()?;
        }
        song.sections.push(Section {
            name,
            number,
            start_time,
            end_time,
            start_phrase_iteration_id,
            end_phrase_iteration_id,
            string_mask,
            is_solo: false,
        });
    }
    for _ in 0..d.count(36)? {
        song.levels.push(read_level(&mut d)?);
    }
    song.metadata = read_metadata(&mut d)?;

    Ok(song)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn record_sizes_match_the_wire_table() {
        let mut out = Vec::new();
        write_beat(&mut out, &Beat::default());
        assert_eq!(out.len(), 16);

        let mut out = Vec::new();
        write_phrase(&mut out, &Phrase::default());
        assert_eq!(out.len(), 44);

        let mut out = Vec::new();
        write_chord_template(&mut out, &ChordTemplate::default());
        assert_eq!(out.len(), 72);

        let mut out = Vec::new();
        write_chord_notes(&mut out, &ChordNotes::default());
        assert_eq!(out.len(), 24 + 6 * (32 * 12 + 4) + 6 + 6 + 12);

        let mut out = Vec::new();
        write_anchor(&mut out, &Anchor::default());
        assert_eq!(out.len(), 28);

        let mut out = Vec::new();
        write_note(&mut out, &Note::default());
        assert_eq!(out.len(), 67);

        let mut out = Vec::new();
        write_metadata(&mut out, &Metadata::default());
        assert_eq!(out.len(), 95);
    }

    #[test]
    fn strings_are_nul_padded_and_truncated() {
        let mut out = Vec::new();
        write_string(&mut out, "solo", 8);
        assert_eq!(out, b"solo\0\0\0\0");

        let mut out = Vec::new();
        write_string(&mut out, "overlong", 4);
        assert_eq!(out, b"over");
    }

    #[test]
    fn truncated_stream_is_rejected() {
        assert!(matches!(
            decode_sng(&[1, 0, 0]),
            Err(SngError::Io(_) | SngError::Truncated)
        ));
        // A count far beyond the remaining bytes fails fast.
        let mut data = u32::MAX.to_le_bytes().to_vec();
        data.extend_from_slice(&[0; 64]);
        assert!(matches!(decode_sng(&data), Err(SngError::Truncated)));
    }
}
