//! Pointer Drag Interpreter.
//!
//! Mouse, touch and pen events are normalized into `PointerInput` at the
//! boundary. A session opens `Undetermined` on pointer-down over a ready
//! track and is decided exactly once, the first time either axis moves past
//! the threshold: the track's primary axis wins (`Committed`) or the gesture
//! is handed back to native scrolling (`Rejected`). The interpreter never
//! touches tracks itself; it returns `DragAction`s for the caller to apply.

use log::trace;
use serde::{Deserialize, Serialize};

use crate::config::DragConfig;
use crate::geometry::Axis;
use crate::ids::TrackId;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointerSource {
    #[default]
    Mouse,
    Touch,
    Pen,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PointerInput {
    pub x: f32,
    pub y: f32,
    /// Mouse button (0 = primary). Ignored for touch and pen.
    #[serde(default)]
    pub button: u8,
    #[serde(default)]
    pub source: PointerSource,
}

impl PointerInput {
    pub fn mouse(x: f32, y: f32) -> Self {
        Self {
            x,
            y,
            button: 0,
            source: PointerSource::Mouse,
        }
    }

    pub fn touch(x: f32, y: f32) -> Self {
        Self {
            x,
            y,
            button: 0,
            source: PointerSource::Touch,
        }
    }

    fn is_primary(&self) -> bool {
        self.source != PointerSource::Mouse || self.button == 0
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DragPhase {
    Undetermined,
    /// Movement follows the track's primary axis; deltas drive the track.
    Committed,
    Rejected,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct DragSession {
    pub track: TrackId,
    pub axis: Axis,
    pub start_x: f32,
    pub start_y: f32,
    pub start_offset: f32,
    pub last_delta: f32,
    pub phase: DragPhase,
}

/// What the caller should do in response to one pointer event.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum DragAction {
    None,
    /// Session opened; do not block native scrolling yet.
    Opened { track: TrackId },
    /// Direction decided for the track: enter Dragging and apply `delta`.
    Commit {
        track: TrackId,
        start_offset: f32,
        delta: f32,
    },
    /// Direction decided against the track; nothing was mutated.
    Reject { track: TrackId },
    Move {
        track: TrackId,
        start_offset: f32,
        delta: f32,
    },
    /// Gesture ended after a commit.
    Release { track: TrackId, last_delta: f32 },
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct DragResponse {
    /// The host should suppress default scrolling for this event.
    pub prevent_default: bool,
    pub action: DragAction,
}

impl DragResponse {
    fn pass(action: DragAction) -> Self {
        Self {
            prevent_default: false,
            action,
        }
    }

    fn capture(action: DragAction) -> Self {
        Self {
            prevent_default: true,
            action,
        }
    }
}

/// Candidate track under the pointer.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TrackHit {
    pub track: TrackId,
    pub axis: Axis,
    pub offset: f32,
    pub ready: bool,
    /// Per-track desktop gate, see `TrackSpec::min_viewport_width`.
    pub min_viewport_width: Option<f32>,
}

#[derive(Clone, Debug, Default)]
pub struct DragInterpreter {
    cfg: DragConfig,
    session: Option<DragSession>,
}

impl DragInterpreter {
    pub fn new(cfg: DragConfig) -> Self {
        Self { cfg, session: None }
    }

    pub fn set_config(&mut self, cfg: DragConfig) {
        self.cfg = cfg;
    }

    pub fn config(&self) -> &DragConfig {
        &self.cfg
    }

    pub fn session(&self) -> Option<&DragSession> {
        self.session.as_ref()
    }

    /// Pointer went down over `hit`. Opens an `Undetermined` session when the
    /// track is ready and the viewport is wider than the track's minimum.
    pub fn pointer_down(&mut self, input: PointerInput, hit: TrackHit, viewport_width: f32) -> DragResponse {
        if !input.is_primary() || !hit.ready {
            return DragResponse::pass(DragAction::None);
        }
        if let Some(min) = hit.min_viewport_width {
            if viewport_width <= min {
                return DragResponse::pass(DragAction::None);
            }
        }
        self.session = Some(DragSession {
            track: hit.track,
            axis: hit.axis,
            start_x: input.x,
            start_y: input.y,
            start_offset: hit.offset,
            last_delta: 0.0,
            phase: DragPhase::Undetermined,
        });
        trace!("drag: open on {:?} at ({}, {})", hit.track, input.x, input.y);
        DragResponse::pass(DragAction::Opened { track: hit.track })
    }

    pub fn pointer_move(&mut self, input: PointerInput) -> DragResponse {
        let Some(session) = self.session.as_mut() else {
            return DragResponse::pass(DragAction::None);
        };
        let (primary, perp) = session
            .axis
            .split(input.x - session.start_x, input.y - session.start_y);
        match session.phase {
            DragPhase::Undetermined => {
                let t = self.cfg.axis_threshold;
                if primary.abs() <= t && perp.abs() <= t {
                    return DragResponse::pass(DragAction::None);
                }
                let track = session.track;
                if primary.abs() > perp.abs() {
                    session.phase = DragPhase::Committed;
                    session.last_delta = primary;
                    trace!("drag: {:?} committed", track);
                    DragResponse::capture(DragAction::Commit {
                        track,
                        start_offset: session.start_offset,
                        delta: primary,
                    })
                } else {
                    trace!("drag: {:?} rejected", track);
                    self.session = None;
                    DragResponse::pass(DragAction::Reject { track })
                }
            }
            DragPhase::Committed => {
                session.last_delta = primary;
                DragResponse::capture(DragAction::Move {
                    track: session.track,
                    start_offset: session.start_offset,
                    delta: primary,
                })
            }
            DragPhase::Rejected => DragResponse::pass(DragAction::None),
        }
    }

    /// Pointer up or cancel. An undecided session resolves to a rejection.
    pub fn pointer_up(&mut self) -> DragResponse {
        let Some(session) = self.session.take() else {
            return DragResponse::pass(DragAction::None);
        };
        match session.phase {
            DragPhase::Committed => DragResponse::capture(DragAction::Release {
                track: session.track,
                last_delta: session.last_delta,
            }),
            DragPhase::Undetermined | DragPhase::Rejected => {
                DragResponse::pass(DragAction::Reject {
                    track: session.track,
                })
            }
        }
    }

    /// Drop any session without a decision (route change, track removed).
    pub fn cancel(&mut self) {
        self.session = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(axis: Axis) -> TrackHit {
        TrackHit {
            track: TrackId(0),
            axis,
            offset: 100.0,
            ready: true,
            min_viewport_width: None,
        }
    }

    fn interp() -> DragInterpreter {
        DragInterpreter::new(DragConfig::default())
    }

    #[test]
    fn horizontal_move_commits_and_captures() {
        let mut d = interp();
        d.pointer_down(PointerInput::touch(100.0, 100.0), hit(Axis::Horizontal), 1280.0);
        assert_eq!(d.pointer_move(PointerInput::touch(105.0, 101.0)).action, DragAction::None);
        let r = d.pointer_move(PointerInput::touch(120.0, 102.0));
        assert!(r.prevent_default);
        assert_eq!(
            r.action,
            DragAction::Commit {
                track: TrackId(0),
                start_offset: 100.0,
                delta: 20.0
            }
        );
        // Later vertical movement does not re-decide.
        let r = d.pointer_move(PointerInput::touch(121.0, 300.0));
        assert!(matches!(r.action, DragAction::Move { delta, .. } if delta == 21.0));
        assert_eq!(
            d.pointer_up().action,
            DragAction::Release {
                track: TrackId(0),
                last_delta: 21.0
            }
        );
        assert!(d.session().is_none());
    }

    #[test]
    fn vertical_move_rejects_horizontal_track() {
        let mut d = interp();
        d.pointer_down(PointerInput::touch(0.0, 0.0), hit(Axis::Horizontal), 1280.0);
        let r = d.pointer_move(PointerInput::touch(2.0, 20.0));
        assert!(!r.prevent_default);
        assert_eq!(r.action, DragAction::Reject { track: TrackId(0) });
        assert!(d.session().is_none());
        assert_eq!(d.pointer_move(PointerInput::touch(50.0, 20.0)).action, DragAction::None);
    }

    #[test]
    fn vertical_track_uses_y_as_primary() {
        let mut d = interp();
        d.pointer_down(PointerInput::mouse(0.0, 0.0), hit(Axis::Vertical), 1280.0);
        let r = d.pointer_move(PointerInput::mouse(1.0, -15.0));
        assert!(matches!(r.action, DragAction::Commit { delta, .. } if delta == -15.0));
    }

    #[test]
    fn release_before_decision_is_a_rejection() {
        let mut d = interp();
        d.pointer_down(PointerInput::mouse(0.0, 0.0), hit(Axis::Horizontal), 1280.0);
        d.pointer_move(PointerInput::mouse(3.0, 3.0));
        assert_eq!(d.pointer_up().action, DragAction::Reject { track: TrackId(0) });
    }

    #[test]
    fn secondary_button_and_unready_tracks_are_ignored() {
        let mut d = interp();
        let right = PointerInput {
            button: 2,
            ..PointerInput::mouse(0.0, 0.0)
        };
        assert_eq!(d.pointer_down(right, hit(Axis::Horizontal), 1280.0).action, DragAction::None);
        let not_ready = TrackHit {
            ready: false,
            ..hit(Axis::Horizontal)
        };
        assert_eq!(
            d.pointer_down(PointerInput::mouse(0.0, 0.0), not_ready, 1280.0).action,
            DragAction::None
        );
        assert!(d.session().is_none());
    }

    #[test]
    fn narrow_viewport_disables_desktop_only_tracks() {
        let mut d = interp();
        let column = TrackHit {
            min_viewport_width: Some(1024.0),
            ..hit(Axis::Vertical)
        };
        let r = d.pointer_down(PointerInput::touch(0.0, 0.0), column, 800.0);
        assert_eq!(r.action, DragAction::None);
        // The gate is strict: exactly 1024 is still too narrow.
        let r = d.pointer_down(PointerInput::touch(0.0, 0.0), column, 1024.0);
        assert_eq!(r.action, DragAction::None);
        let r = d.pointer_down(PointerInput::touch(0.0, 0.0), column, 1025.0);
        assert_eq!(r.action, DragAction::Opened { track: TrackId(0) });
        d.cancel();
        // Ungated tracks drag at any width.
        let r = d.pointer_down(PointerInput::touch(0.0, 0.0), hit(Axis::Horizontal), 375.0);
        assert_eq!(r.action, DragAction::Opened { track: TrackId(0) });
    }
}
