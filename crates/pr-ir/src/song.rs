//! Song structure and note editing.
//!
//! A song keeps its notes sorted by start tick and indexed for overlap
//! queries at all times: every edit below re-sorts and re-indexes before
//! returning, so a `Song` can be handed to the engine at any point.

use alloc::vec::Vec;
use arrayvec::ArrayString;

use crate::interval::{find_overlapping, index};
use crate::note::{Note, NoteId, Tick};

/// Default resolution: ticks per quarter note.
pub const DEFAULT_PPQN: u32 = 24;

/// Default tempo. At 60 BPM one quarter note lasts one second.
pub const DEFAULT_BPM: f32 = 60.0;

/// Default loop length: one 4/4 bar at the default resolution.
pub const DEFAULT_PATTERN_DURATION: Tick = 4 * DEFAULT_PPQN;

/// A complete song.
#[derive(Clone, Debug)]
pub struct Song {
    /// Song title
    pub title: ArrayString<32>,
    /// Ticks per quarter note
    pub ppqn: u32,
    /// Tempo in quarter notes per minute
    pub bpm: f32,
    /// Loop length in ticks
    pub pattern_duration: Tick,
    /// Notes, sorted by start and indexed
    notes: Vec<Note>,
    /// Height of the implicit interval tree over `notes`
    max_level: Option<u32>,
    /// Next identifier handed out by `add_note`
    next_id: u64,
}

impl Default for Song {
    fn default() -> Self {
        Self {
            title: ArrayString::new(),
            ppqn: DEFAULT_PPQN,
            bpm: DEFAULT_BPM,
            pattern_duration: DEFAULT_PATTERN_DURATION,
            notes: Vec::new(),
            max_level: None,
            next_id: 1,
        }
    }
}

impl Song {
    /// Create a new empty song.
    pub fn new(title: &str) -> Self {
        let mut song = Self::default();
        let _ = song.title.try_push_str(title);
        song
    }

    /// Create an empty song with explicit timing.
    pub fn with_timing(title: &str, ppqn: u32, bpm: f32, pattern_duration: Tick) -> Self {
        let mut song = Self::new(title);
        song.ppqn = ppqn;
        song.bpm = bpm;
        song.pattern_duration = pattern_duration;
        song
    }

    /// Notes sorted ascending by start.
    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    /// Tree height for [`find_overlapping`](crate::find_overlapping) over [`notes`](Self::notes).
    pub fn max_level(&self) -> Option<u32> {
        self.max_level
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    /// Look up a note by identity.
    pub fn note(&self, id: NoteId) -> Option<&Note> {
        self.notes.iter().find(|n| n.id == id)
    }

    /// Add a note spanning `[start, end)`. Returns `None` if the range is empty.
    pub fn add_note(&mut self, start: Tick, end: Tick, pitch: f32) -> Option<NoteId> {
        if end <= start {
            return None;
        }
        let id = self.allocate_id();
        self.notes.push(Note::new(id, start, end, pitch));
        self.reindex();
        Some(id)
    }

    /// Replace all notes at once. Notes with empty ranges are dropped.
    ///
    /// Future ids from [`add_note`](Self::add_note) stay above every id given here.
    pub fn set_notes(&mut self, notes: Vec<Note>) {
        self.notes = notes;
        self.notes.retain(|n| n.start < n.end);
        let highest = self.notes.iter().map(|n| n.id.get()).max().unwrap_or(0);
        self.next_id = self.next_id.max(highest.saturating_add(1));
        self.reindex();
    }

    /// Remove a note, returning it.
    pub fn remove_note(&mut self, id: NoteId) -> Option<Note> {
        let pos = self.notes.iter().position(|n| n.id == id)?;
        let note = self.notes.remove(pos);
        self.reindex();
        Some(note)
    }

    /// Move or resize a note. Returns false if the note is missing or the range is empty.
    pub fn resize_note(&mut self, id: NoteId, start: Tick, end: Tick) -> bool {
        if end <= start {
            return false;
        }
        let Some(note) = self.notes.iter_mut().find(|n| n.id == id) else {
            return false;
        };
        note.start = start;
        note.end = end;
        self.reindex();
        true
    }

    /// Change a note's pitch. Returns false if the note is missing.
    pub fn set_pitch(&mut self, id: NoteId, pitch: f32) -> bool {
        match self.notes.iter_mut().find(|n| n.id == id) {
            Some(note) => {
                note.pitch = pitch;
                true
            }
            None => false,
        }
    }

    /// Remove every note.
    pub fn clear_notes(&mut self) {
        self.notes.clear();
        self.max_level = None;
    }

    /// Visit every note overlapping `[start, end)`, in no particular order.
    pub fn find_overlapping<F: FnMut(&Note, usize)>(&self, start: Tick, end: Tick, visit: F) {
        find_overlapping(&self.notes, self.max_level, start, end, visit);
    }

    /// Output samples per tick at `sample_rate`, rounded, never below one.
    pub fn samples_per_tick(&self, sample_rate: u32) -> u32 {
        if self.ppqn == 0 || self.bpm <= 0.0 || self.bpm.is_nan() {
            return 1;
        }
        let exact = sample_rate as f64 * 60.0 / (self.bpm as f64 * self.ppqn as f64);
        (libm::round(exact) as u32).max(1)
    }

    /// Output frames in one pass through the loop.
    pub fn loop_frames(&self, sample_rate: u32) -> u64 {
        self.pattern_duration.max(1) as u64 * self.samples_per_tick(sample_rate) as u64
    }

    fn allocate_id(&mut self) -> NoteId {
        loop {
            let raw = self.next_id;
            self.next_id = self.next_id.wrapping_add(1);
            if let Some(id) = NoteId::new(raw) {
                return id;
            }
        }
    }

    /// Restore the sort + index invariant after an edit.
    fn reindex(&mut self) {
        self.notes.sort_by_key(|n| n.start);
        self.max_level = index(&mut self.notes);
    }
}
