use std::collections::BTreeSet;

use num::Integer;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TonnetzError};

pub type MidiByte = i16;
pub type Tick = u64;

pub const NOTES_PER_OCTAVE: MidiByte = 12;
pub const USIZE_NOTES_PER_OCTAVE: usize = NOTES_PER_OCTAVE as usize;
pub const MAX_MIDI_VALUE: MidiByte = i8::MAX as MidiByte;

const NOTE_NAMES: [&str; USIZE_NOTES_PER_OCTAVE] = ["C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B"];

// MIDI 21 is A0, so pitch numbers sit one octave above their octave label.
const OCTAVE_LABEL_OFFSET: MidiByte = NOTES_PER_OCTAVE;

/// Renders an absolute pitch number as a note name with octave, e.g. 60 -> "C4".
pub fn note_name(pitch: MidiByte) -> String {
    let normalized = pitch - OCTAVE_LABEL_OFFSET;
    let octave = Integer::div_floor(&normalized, &NOTES_PER_OCTAVE);
    let class = Integer::mod_floor(&normalized, &NOTES_PER_OCTAVE) as usize;
    format!("{}{}", NOTE_NAMES[class], octave)
}

/// One sounding note as delivered by the MIDI reader.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct NoteInterval {
    pitch: MidiByte,
    start: Tick,
    end: Tick,
}

impl NoteInterval {
    pub fn new(pitch: MidiByte, start: Tick, end: Tick) -> Self {
        NoteInterval {pitch, start, end}
    }

    pub fn pitch(&self) -> MidiByte {self.pitch}

    pub fn start(&self) -> Tick {self.start}

    pub fn end(&self) -> Tick {self.end}

    pub fn validate(&self) -> Result<()> {
        if self.end < self.start || !(0..=MAX_MIDI_VALUE).contains(&self.pitch) {
            Err(TonnetzError::InvalidNoteInterval {pitch: self.pitch, start: self.start, end: self.end})
        } else {
            Ok(())
        }
    }
}

/// Notes sharing a start tick.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Chord {
    start: Tick,
    pitches: BTreeSet<MidiByte>,
}

impl Chord {
    pub fn start(&self) -> Tick {self.start}

    pub fn pitches(&self) -> &BTreeSet<MidiByte> {&self.pitches}

    pub fn len(&self) -> usize {self.pitches.len()}

    pub fn is_empty(&self) -> bool {self.pitches.is_empty()}
}

/// Validates `notes` and groups them into chords in start-tick order.
/// Input order does not matter; ties keep their relative order.
pub fn group_chords(notes: &[NoteInterval]) -> Result<Vec<Chord>> {
    for note in notes.iter() {
        note.validate()?;
    }
    let mut sorted = notes.to_vec();
    sorted.sort_by_key(|n| n.start);

    let mut chords: Vec<Chord> = vec![];
    for note in sorted {
        match chords.last_mut() {
            Some(chord) if chord.start == note.start => {
                chord.pitches.insert(note.pitch);
            }
            _ => chords.push(Chord {start: note.start, pitches: BTreeSet::from([note.pitch])}),
        }
    }
    Ok(chords)
}
