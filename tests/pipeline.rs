//! End-to-end pipeline: GPX score tree → timeline → compiled SNG →
//! binary round trip.

use pretty_assertions::assert_eq;

use rsdlc::score::{BarToTime, SYNC_OFFSET, Score};
use rsdlc::sng::mask::*;
use rsdlc::sng::{compile_song, decode_sng, encode_sng};
use rsdlc::timeline::TimelineBuilder;
use rsdlc::xmltree::{from_xml, list_coerce};

const GPIF: &str = r#"
    <GPIF>
      <Score>
        <Title>Integration</Title>
        <Artist>The Testers</Artist>
        <Album>Fixtures</Album>
        <Copyright>2014</Copyright>
      </Score>
      <Tracks>
        <Track id="0">
          <Name>Lead</Name>
          <Properties>
            <Property name="Tuning"><Pitches>40 45 50 55 59 64</Pitches></Property>
            <Property name="CapoFret"><Fret>0</Fret></Property>
          </Properties>
        </Track>
      </Tracks>
      <MasterBars>
        <MasterBar>
          <Time>4/4</Time><Bars>0</Bars>
          <Section><Letter>A</Letter><Text>intro</Text></Section>
          <Repeat start="true" end="false" count="0"/>
        </MasterBar>
        <MasterBar>
          <Time>4/4</Time><Bars>1</Bars>
          <Repeat start="false" end="true" count="2"/>
        </MasterBar>
        <MasterBar>
          <Time>4/4</Time><Bars>2</Bars>
          <Section><Letter>B</Letter><Text>verse</Text></Section>
        </MasterBar>
      </MasterBars>
      <Bars>
        <Bar id="0"><Voices>0 -1</Voices></Bar>
        <Bar id="1"><Voices>1 -1</Voices></Bar>
        <Bar id="2"><Voices>2 -1</Voices></Bar>
      </Bars>
      <Voices>
        <Voice id="0"><Beats>0 1 2 3</Beats></Voice>
        <Voice id="1"><Beats>4 4 4 4</Beats></Voice>
        <Voice id="2"><Beats>5 6</Beats></Voice>
      </Voices>
      <Beats>
        <Beat id="0"><Rhythm ref="0"/><Notes>0</Notes></Beat>
        <Beat id="1"><Rhythm ref="0"/><Notes>1</Notes></Beat>
        <Beat id="2"><Rhythm ref="0"/><FreeText>crunch</FreeText><Notes>0</Notes></Beat>
        <Beat id="3"><Rhythm ref="0"/><Notes>2 3</Notes></Beat>
        <Beat id="4"><Rhythm ref="0"/><Notes>4</Notes></Beat>
        <Beat id="5"><Rhythm ref="1"/><Notes>2 3</Notes></Beat>
        <Beat id="6"><Rhythm ref="1"/><Notes>5</Notes></Beat>
      </Beats>
      <Notes>
        <Note id="0"><Properties><Property name="String"><String>0</String></Property><Property name="Fret"><Fret>3</Fret></Property></Properties></Note>
        <Note id="1"><Properties><Property name="String"><String>1</String></Property><Property name="Fret"><Fret>5</Fret></Property></Properties></Note>
        <Note id="2"><Properties><Property name="String"><String>2</String></Property><Property name="Fret"><Fret>2</Fret></Property><Property name="PalmMuted"><Enable/></Property></Properties></Note>
        <Note id="3"><Properties><Property name="String"><String>3</String></Property><Property name="Fret"><Fret>2</Fret></Property></Properties></Note>
        <Note id="4"><Vibrato/><Properties><Property name="String"><String>0</String></Property><Property name="Fret"><Fret>0</Fret></Property></Properties></Note>
        <Note id="5"><Properties><Property name="String"><String>5</String></Property><Property name="Fret"><Fret>7</Fret></Property><Property name="Muted"><Enable/></Property></Properties></Note>
      </Notes>
      <Rhythms>
        <Rhythm id="0"><NoteValue>Quarter</NoteValue></Rhythm>
        <Rhythm id="1"><NoteValue>Half</NoteValue></Rhythm>
      </Rhythms>
    </GPIF>"#;

fn build_song() -> rsdlc::sng::Song {
    let score = Score::from_root(from_xml(GPIF, list_coerce).unwrap()).unwrap();
    let sync = BarToTime::new([(0.0, 0.0), (1.0, 2.0)], SYNC_OFFSET).unwrap();
    TimelineBuilder::new(&score, 0, &sync).unwrap().run().unwrap()
}

#[test]
fn timeline_is_time_ordered_and_chords_share_times() {
    let song = build_song();
    let level = &song.levels[0];

    let mut last = f32::MIN;
    for note in &level.notes {
        assert!(note.time >= last);
        last = note.time;
    }
    for chord in &level.chords {
        for child in &chord.chord_notes {
            assert_eq!(child.time, chord.time);
        }
    }

    // One repeat expansion: bars A B A B C, five measures.
    assert_eq!(song.ebeats.len(), 20);
    assert_eq!(song.sections.len(), 2);
    assert_eq!(song.tones.len(), 2);
    assert_eq!(song.tones[0].id, song.tones[1].id);
}

#[test]
fn compiled_masks_are_consistent_with_their_fields() {
    let mut song = build_song();
    compile_song(&mut song).unwrap();

    for level in &song.levels {
        for note in &level.notes {
            assert_eq!(note.mask & NOTE_MASK_OPEN != 0, note.fret == 0);
            assert_eq!(note.mask & NOTE_MASK_SUSTAIN != 0, note.sustain != 0.0);
            if note.chord_id == -1 {
                assert_ne!(note.mask & NOTE_MASK_SINGLE, 0);
            } else {
                assert_ne!(note.mask & NOTE_MASK_CHORD, 0);
                if note.chord_note_id >= 0 {
                    assert_ne!(note.mask & NOTE_MASK_CHORDNOTES, 0);
                    assert!((note.chord_note_id as usize) < song.chord_notes.len());
                }
            }
            let piter = &song.phrase_iterations[note.phrase_iteration_id as usize];
            assert!(piter.time <= note.time);
        }
    }
}

#[test]
fn compiled_sng_round_trips_byte_exactly() {
    let mut song = build_song();
    compile_song(&mut song).unwrap();

    let bytes = encode_sng(&song).unwrap();
    let decoded = decode_sng(&bytes).unwrap();
    let again = encode_sng(&decoded).unwrap();
    assert_eq!(again, bytes);

    // The decode agrees on counts with the compiled song.
    assert_eq!(decoded.ebeats.len(), song.ebeats.len());
    assert_eq!(decoded.levels.len(), song.levels.len());
    assert_eq!(
        decoded.levels[0].notes.len(),
        song.levels[0].notes.len()
    );
    assert_eq!(decoded.metadata, song.metadata);
}

#[test]
fn song_xml_detour_reaches_the_same_binary() {
    let mut direct = build_song();

    let tree = rsdlc::sng::xml::song_to_tree(&direct);
    let xml = rsdlc::xmltree::to_xml("song", &tree);
    let reparsed = rsdlc::xmltree::from_xml(&xml, rsdlc::xmltree::default_coerce).unwrap();
    let mut via_xml = rsdlc::sng::xml::song_from_tree(&reparsed).unwrap();

    compile_song(&mut direct).unwrap();
    compile_song(&mut via_xml).unwrap();

    assert_eq!(encode_sng(&via_xml).unwrap(), encode_sng(&direct).unwrap());
}
