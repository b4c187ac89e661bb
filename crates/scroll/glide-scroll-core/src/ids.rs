//! Identifiers and simple allocators for engine entities.

use serde::{Deserialize, Serialize};

/// Frame Clock subscription.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SubscriberId(pub u32);

/// Scroll Position Observer registration.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TriggerId(pub u32);

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TimelineId(pub u32);

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TrackId(pub u32);

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HeadingId(pub u32);

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SequenceId(pub u32);

/// Monotonic allocator for the engine-owned ids.
/// Clock and observer ids are allocated by those services themselves.
#[derive(Default, Debug)]
pub struct IdAllocator {
    next_timeline: u32,
    next_track: u32,
    next_heading: u32,
    next_sequence: u32,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn alloc_timeline(&mut self) -> TimelineId {
        let id = TimelineId(self.next_timeline);
        self.next_timeline = self.next_timeline.wrapping_add(1);
        id
    }

    #[inline]
    pub fn alloc_track(&mut self) -> TrackId {
        let id = TrackId(self.next_track);
        self.next_track = self.next_track.wrapping_add(1);
        id
    }

    #[inline]
    pub fn alloc_heading(&mut self) -> HeadingId {
        let id = HeadingId(self.next_heading);
        self.next_heading = self.next_heading.wrapping_add(1);
        id
    }

    #[inline]
    pub fn alloc_sequence(&mut self) -> SequenceId {
        let id = SequenceId(self.next_sequence);
        self.next_sequence = self.next_sequence.wrapping_add(1);
        id
    }

    #[inline]
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alloc_monotonic() {
        let mut alloc = IdAllocator::new();
        assert_eq!(alloc.alloc_timeline(), TimelineId(0));
        assert_eq!(alloc.alloc_timeline(), TimelineId(1));
        assert_eq!(alloc.alloc_track(), TrackId(0));
        assert_eq!(alloc.alloc_track(), TrackId(1));
        assert_eq!(alloc.alloc_heading(), HeadingId(0));
        assert_eq!(alloc.alloc_sequence(), SequenceId(0));
    }

    #[test]
    fn reset_restarts_counters() {
        let mut alloc = IdAllocator::new();
        alloc.alloc_track();
        alloc.alloc_track();
        alloc.reset();
        assert_eq!(alloc.alloc_track(), TrackId(0));
    }
}
