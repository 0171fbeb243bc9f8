use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::error::{Result, TonnetzError};
use crate::instruments::gm_instrument_name;
use crate::intervals::TonnetzIntervals;
use crate::lattice::Lattice;
use crate::notes::{NoteInterval, Tick};
use crate::transitions::{Track, TrackKind};

/// One instrument as delivered by the MIDI reader.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentInput {
    pub program: u8,
    #[serde(default)]
    pub is_drum: bool,
    pub notes: Vec<NoteInterval>,
}

/// A parsed MIDI file: timing plus per-instrument notes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SongInput {
    pub artist: String,
    pub name: String,
    pub ticks_per_beat: Tick,
    pub beats_per_measure: usize,
    pub instruments: Vec<InstrumentInput>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Song {
    artist: String,
    name: String,
    ticks_per_beat: Tick,
    beats_per_measure: usize,
    intervals: TonnetzIntervals,
    tracks: Vec<Track>,
    instrument_indices: Vec<usize>,
}

impl Song {
    /// Analyses every pitched instrument as a quarter track. Tracks without
    /// enough transitions are dropped; `instrument_indices` maps each kept
    /// track back to its position in `input.instruments`.
    pub fn analyze(input: &SongInput, lattice: &Lattice) -> Result<Self> {
        let ticks_per_measure = input.ticks_per_beat * input.beats_per_measure as Tick;
        let kind = TrackKind::quarter(ticks_per_measure, input.beats_per_measure)?;
        let mut tracks = vec![];
        let mut instrument_indices = vec![];
        for (i, instrument) in input.instruments.iter().enumerate() {
            if instrument.is_drum {
                continue;
            }
            let label = gm_instrument_name(instrument.program).unwrap_or("Unknown");
            let track = Track::analyze(label, &instrument.notes, kind, lattice)?;
            if track.has_enough_data() {
                tracks.push(track);
                instrument_indices.push(i);
            } else {
                warn!("{}-{}: dropping {label} (instrument {i}), too few transitions", input.artist, input.name);
            }
        }
        debug!("{}-{}: kept {} of {} instruments", input.artist, input.name, tracks.len(), input.instruments.len());
        Ok(Song {
            artist: input.artist.clone(),
            name: input.name.clone(),
            ticks_per_beat: input.ticks_per_beat,
            beats_per_measure: input.beats_per_measure,
            intervals: lattice.config().intervals,
            tracks,
            instrument_indices,
        })
    }

    /// Every track must be split into `beats_per_measure` subdivisions.
    pub fn from_tracks(artist: &str, name: &str, ticks_per_beat: Tick, beats_per_measure: usize, intervals: TonnetzIntervals, tracks: Vec<Track>) -> Result<Self> {
        check_track_subdivisions(&tracks, beats_per_measure)?;
        let instrument_indices = (0..tracks.len()).collect();
        Ok(Song {
            artist: artist.to_owned(),
            name: name.to_owned(),
            ticks_per_beat,
            beats_per_measure,
            intervals,
            tracks,
            instrument_indices,
        })
    }

    pub fn id(&self) -> String {
        format!("{}-{}", self.artist, self.name)
    }

    pub fn artist(&self) -> &str {&self.artist}

    pub fn name(&self) -> &str {&self.name}

    pub fn ticks_per_beat(&self) -> Tick {self.ticks_per_beat}

    pub fn beats_per_measure(&self) -> usize {self.beats_per_measure}

    pub fn ticks_per_measure(&self) -> Tick {self.ticks_per_beat * self.beats_per_measure as Tick}

    pub fn intervals(&self) -> TonnetzIntervals {self.intervals}

    pub fn tracks(&self) -> &[Track] {&self.tracks}

    pub fn instrument_indices(&self) -> &[usize] {&self.instrument_indices}
}

pub(crate) fn check_track_subdivisions(tracks: &[Track], beats_per_measure: usize) -> Result<()> {
    match tracks.iter().find(|t| t.subdivisions() != beats_per_measure) {
        Some(track) => Err(TonnetzError::SubdivisionMismatch {left: beats_per_measure, right: track.subdivisions()}),
        None => Ok(()),
    }
}
