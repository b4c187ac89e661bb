//! Error taxonomy for the engine.
//!
//! None of these are user-visible failures: callers degrade to "no animation"
//! for the affected component and keep the rest of the page running.

use thiserror::Error;

use crate::ids::{TimelineId, TrackId, TriggerId};

#[derive(Debug, Error)]
pub enum GlideError {
    /// A track was asked to run before its wrap distance is known.
    #[error("track {0:?} is still measuring")]
    MeasurementNotReady(TrackId),
    /// A timeline or trigger references content absent from the page.
    #[error("missing target: {0}")]
    MissingTarget(String),
    #[error("unknown track {0:?}")]
    UnknownTrack(TrackId),
    #[error("unknown trigger {0:?}")]
    UnknownTrigger(TriggerId),
    #[error("unknown timeline {0:?}")]
    UnknownTimeline(TimelineId),
    #[error("invalid timeline position '{0}'")]
    InvalidPosition(String),
    #[error("invalid ease '{0}'")]
    InvalidEase(String),
    #[error("invalid trigger line '{0}'")]
    InvalidTriggerLine(String),
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
}
