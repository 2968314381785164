//! Note and note identity types.

use core::num::NonZeroU64;

use crate::interval::Interval;

/// Position on the song timeline, in ticks.
pub type Tick = u32;

/// Stable identity of a note, preserved across edits.
///
/// Zero marks an empty bucket in the engine's identity map, so it is not
/// representable here.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NoteId(NonZeroU64);

impl NoteId {
    /// Wrap a raw identifier. Returns `None` for zero.
    pub const fn new(raw: u64) -> Option<Self> {
        match NonZeroU64::new(raw) {
            Some(id) => Some(Self(id)),
            None => None,
        }
    }

    /// The raw 64-bit value (never zero).
    pub const fn get(self) -> u64 {
        self.0.get()
    }
}

/// A note on the timeline: the half-open tick range `[start, end)` at `pitch`.
///
/// `pitch` uses the MIDI numbering (69 = A4) but need not be integral.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Note {
    pub id: NoteId,
    pub start: Tick,
    pub end: Tick,
    pub pitch: f32,
    /// Largest `end` in this note's implicit subtree. Written by [`index`](crate::index).
    pub max_end: Tick,
}

impl Note {
    pub fn new(id: NoteId, start: Tick, end: Tick, pitch: f32) -> Self {
        Self {
            id,
            start,
            end,
            pitch,
            max_end: end,
        }
    }

    /// Length in ticks.
    pub fn duration(&self) -> Tick {
        self.end.saturating_sub(self.start)
    }

    /// Is `tick` inside `[start, end)`?
    pub fn contains(&self, tick: Tick) -> bool {
        self.start <= tick && tick < self.end
    }
}

impl Interval for Note {
    fn start(&self) -> Tick {
        self.start
    }

    fn end(&self) -> Tick {
        self.end
    }

    fn max_end(&self) -> Tick {
        self.max_end
    }

    fn set_max_end(&mut self, max_end: Tick) {
        self.max_end = max_end;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(raw: u64) -> NoteId {
        NoteId::new(raw).unwrap()
    }

    #[test]
    fn zero_id_is_rejected() {
        assert!(NoteId::new(0).is_none());
        assert_eq!(id(7).get(), 7);
        assert_eq!(id(u64::MAX).get(), u64::MAX);
    }

    #[test]
    fn new_note_max_end_equals_end() {
        let note = Note::new(id(1), 4, 10, 60.0);
        assert_eq!(note.max_end, 10);
        assert_eq!(note.duration(), 6);
    }

    #[test]
    fn contains_is_half_open() {
        let note = Note::new(id(1), 4, 10, 60.0);
        assert!(!note.contains(3));
        assert!(note.contains(4));
        assert!(note.contains(9));
        assert!(!note.contains(10));
    }

    #[test]
    fn duration_of_inverted_range_is_zero() {
        let note = Note::new(id(1), 10, 4, 60.0);
        assert_eq!(note.duration(), 0);
    }
}
