//! Output contracts from the engine.
//!
//! Outputs carry the style writes produced since the last drain, keyed by
//! `Target`, and a separate list of semantic events. Hosts apply the changes
//! to their elements and route media commands to media elements.

use serde::{Deserialize, Serialize};

use crate::ids::{HeadingId, SequenceId, TimelineId, TrackId, TriggerId};
use crate::style::{StyleChange, Target};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaCommand {
    Play,
    Pause,
}

/// Discrete semantic signals emitted while stepping.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
#[non_exhaustive]
pub enum MotionEvent {
    HeadingFragmented {
        heading: HeadingId,
        units: usize,
    },
    TriggerEnter {
        trigger: TriggerId,
    },
    TriggerLeave {
        trigger: TriggerId,
    },
    TriggerEnterBack {
        trigger: TriggerId,
    },
    TriggerLeaveBack {
        trigger: TriggerId,
    },
    TimelineStarted {
        timeline: TimelineId,
    },
    TimelineCompleted {
        timeline: TimelineId,
    },
    TrackReady {
        track: TrackId,
        wrap_distance: f32,
    },
    DragCommitted {
        track: TrackId,
    },
    DragRejected {
        track: TrackId,
    },
    DirectionChanged {
        track: TrackId,
        direction: i8,
    },
    SequenceProgress {
        sequence: SequenceId,
        progress: f32,
    },
    Media {
        target: Target,
        command: MediaCommand,
    },
}

/// Outputs accumulated since the last drain.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Outputs {
    #[serde(default)]
    pub changes: Vec<StyleChange>,
    #[serde(default)]
    pub events: Vec<MotionEvent>,
}

impl Outputs {
    #[inline]
    pub fn clear(&mut self) {
        self.changes.clear();
        self.events.clear();
    }

    #[inline]
    pub fn push_change(&mut self, change: StyleChange) {
        self.changes.push(change);
    }

    #[inline]
    pub fn push_event(&mut self, event: MotionEvent) {
        self.events.push(event);
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty() && self.events.is_empty()
    }

    /// Latest value written to `target.prop` in this batch.
    pub fn last_value(&self, target: &Target, prop: crate::style::StyleProp) -> Option<f32> {
        self.changes
            .iter()
            .rev()
            .find(|c| &c.target == target && c.prop == prop)
            .map(|c| c.value)
    }
}
