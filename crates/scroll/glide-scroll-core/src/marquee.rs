//! Marquee Carousel Controller.
//!
//! Each `CarouselTrack` is a looping strip whose offset lives in
//! `[0, wrap_distance)`. Tracks start in `Measuring`; once every pending
//! media item reported ready and the strip was measured they become `Idle`,
//! auto-advance from their own Frame Clock subscription and accept drags.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use hashbrown::HashMap;
use log::{debug, trace, warn};
use serde::{Deserialize, Serialize};

use crate::clock::{Flow, FrameClock};
use crate::error::GlideError;
use crate::geometry::{wrap, Axis};
use crate::ids::{SubscriberId, TrackId};
use crate::outputs::MotionEvent;
use crate::style::{StyleProp, Target};
use crate::surface::Surface;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackPhase {
    Measuring,
    Idle,
    Dragging,
}

/// How a release maps the last drag delta to the coasting direction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DragPolarity {
    /// A positive delta yields direction `+1`.
    #[default]
    Follow,
    /// A positive delta yields direction `-1`.
    Inverted,
}

impl DragPolarity {
    pub fn factor(self) -> i8 {
        match self {
            DragPolarity::Follow => 1,
            DragPolarity::Inverted => -1,
        }
    }
}

fn default_copies() -> u32 {
    2
}

fn default_direction() -> i8 {
    1
}

/// Construction parameters for a track.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrackSpec {
    #[serde(default)]
    pub axis: Axis,
    /// Element whose translation is written every frame.
    pub target: Target,
    /// Number of rendered elements (unique run times `copies`).
    #[serde(default)]
    pub element_count: usize,
    /// How many times the unique run is repeated in the strip.
    #[serde(default = "default_copies")]
    pub copies: u32,
    /// Pixels per second.
    pub auto_speed: f32,
    #[serde(default = "default_direction")]
    pub direction: i8,
    #[serde(default)]
    pub polarity: DragPolarity,
    /// Images/videos that must load (or fail) before measuring.
    #[serde(default)]
    pub pending_media: usize,
    /// Drag is only offered while the viewport is wider than this.
    #[serde(default)]
    pub min_viewport_width: Option<f32>,
}

impl TrackSpec {
    pub fn new(target: Target, axis: Axis, auto_speed: f32) -> Self {
        Self {
            axis,
            target,
            element_count: 0,
            copies: default_copies(),
            auto_speed,
            direction: default_direction(),
            polarity: DragPolarity::default(),
            pending_media: 0,
            min_viewport_width: None,
        }
    }

    pub fn copies(mut self, copies: u32) -> Self {
        self.copies = copies;
        self
    }

    pub fn elements(mut self, count: usize) -> Self {
        self.element_count = count;
        self
    }

    pub fn polarity(mut self, polarity: DragPolarity) -> Self {
        self.polarity = polarity;
        self
    }

    pub fn direction(mut self, direction: i8) -> Self {
        self.direction = if direction < 0 { -1 } else { 1 };
        self
    }

    pub fn pending_media(mut self, n: usize) -> Self {
        self.pending_media = n;
        self
    }

    pub fn desktop_only(mut self, min_viewport_width: f32) -> Self {
        self.min_viewport_width = Some(min_viewport_width);
        self
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CarouselTrack {
    pub id: TrackId,
    pub axis: Axis,
    pub target: Target,
    pub element_count: usize,
    pub copies: u32,
    wrap_distance: Option<f32>,
    offset: f32,
    direction: i8,
    pub auto_speed: f32,
    pub polarity: DragPolarity,
    pub min_viewport_width: Option<f32>,
    phase: TrackPhase,
    pending_media: usize,
}

impl CarouselTrack {
    pub fn new(id: TrackId, spec: TrackSpec) -> Self {
        Self {
            id,
            axis: spec.axis,
            target: spec.target,
            element_count: spec.element_count,
            copies: spec.copies,
            wrap_distance: None,
            offset: 0.0,
            direction: if spec.direction < 0 { -1 } else { 1 },
            auto_speed: spec.auto_speed,
            polarity: spec.polarity,
            min_viewport_width: spec.min_viewport_width,
            phase: TrackPhase::Measuring,
            pending_media: spec.pending_media,
        }
    }

    pub fn phase(&self) -> TrackPhase {
        self.phase
    }

    pub fn offset(&self) -> f32 {
        self.offset
    }

    pub fn direction(&self) -> i8 {
        self.direction
    }

    pub fn wrap_distance(&self) -> Option<f32> {
        self.wrap_distance
    }

    pub fn pending_media(&self) -> usize {
        self.pending_media
    }

    pub fn is_ready(&self) -> bool {
        self.phase != TrackPhase::Measuring
    }

    /// One media item finished loading or failed. Returns true when no media
    /// is pending any more.
    pub fn media_ready(&mut self) -> bool {
        self.pending_media = self.pending_media.saturating_sub(1);
        self.pending_media == 0
    }

    /// Record the strip's full extent along its axis and derive the wrap
    /// distance. A track with pending media, zero copies or a degenerate
    /// extent stays `Measuring`.
    pub fn measure(&mut self, extent: f32) -> Result<f32, GlideError> {
        if self.pending_media > 0 || self.copies == 0 || !extent.is_finite() || extent <= 0.0 {
            return Err(GlideError::MeasurementNotReady(self.id));
        }
        let distance = extent / self.copies as f32;
        self.wrap_distance = Some(distance);
        self.offset = wrap(self.offset, distance);
        if self.phase == TrackPhase::Measuring {
            self.phase = TrackPhase::Idle;
        }
        Ok(distance)
    }

    /// Auto-advance by `dt` seconds. No-op unless Idle.
    pub fn advance(&mut self, dt: f32) -> bool {
        let (TrackPhase::Idle, Some(m)) = (self.phase, self.wrap_distance) else {
            return false;
        };
        let next = wrap(
            self.offset + f32::from(self.direction) * self.auto_speed * dt.max(0.0),
            m,
        );
        let changed = next != self.offset;
        self.offset = next;
        changed
    }

    /// Enter `Dragging`. Returns false unless the track is Idle.
    pub fn begin_drag(&mut self) -> bool {
        if self.phase != TrackPhase::Idle {
            return false;
        }
        self.phase = TrackPhase::Dragging;
        true
    }

    /// Follow the pointer: `offset = wrap(start_offset - delta)`.
    pub fn drag_to(&mut self, start_offset: f32, delta: f32) -> bool {
        let (TrackPhase::Dragging, Some(m)) = (self.phase, self.wrap_distance) else {
            return false;
        };
        self.offset = wrap(start_offset - delta, m);
        true
    }

    /// Leave `Dragging`. A last delta above `min_delta` sets the coasting
    /// direction; returns true if the direction changed.
    pub fn release(&mut self, last_delta: f32, min_delta: f32) -> bool {
        if self.phase != TrackPhase::Dragging {
            return false;
        }
        self.phase = TrackPhase::Idle;
        if !last_delta.is_finite() || last_delta.abs() <= min_delta {
            return false;
        }
        let sign: i8 = if last_delta > 0.0 { 1 } else { -1 };
        let next = sign * self.polarity.factor();
        let changed = next != self.direction;
        self.direction = next;
        changed
    }

    fn prop(&self) -> StyleProp {
        match self.axis {
            Axis::Horizontal => StyleProp::X,
            Axis::Vertical => StyleProp::Y,
        }
    }

    /// Publish `-offset` on the track's axis.
    pub fn write(&self, surface: &Surface) {
        surface.write(&self.target, self.prop(), -self.offset);
    }
}

struct TrackSlot {
    track: Rc<RefCell<CarouselTrack>>,
    subscription: Option<SubscriberId>,
    alive: Rc<Cell<bool>>,
}

/// Registry of live tracks. Each ready track owns one clock subscription.
#[derive(Clone)]
pub struct Marquee {
    clock: FrameClock,
    surface: Surface,
    tracks: Rc<RefCell<HashMap<TrackId, TrackSlot>>>,
}

impl fmt::Debug for Marquee {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Marquee")
            .field("tracks", &self.tracks.borrow().len())
            .finish()
    }
}

impl Marquee {
    pub fn new(clock: FrameClock, surface: Surface) -> Self {
        Self {
            clock,
            surface,
            tracks: Rc::new(RefCell::new(HashMap::new())),
        }
    }

    /// Register a track in `Measuring`; its offset is published as 0.
    pub fn add(&self, id: TrackId, spec: TrackSpec) -> TrackId {
        let track = CarouselTrack::new(id, spec);
        track.write(&self.surface);
        let slot = TrackSlot {
            track: Rc::new(RefCell::new(track)),
            subscription: None,
            alive: Rc::new(Cell::new(true)),
        };
        if let Some(old) = self.tracks.borrow_mut().insert(id, slot) {
            warn!("marquee: {:?} replaced an existing track", id);
            self.detach(old);
        }
        id
    }

    fn detach(&self, slot: TrackSlot) {
        slot.alive.set(false);
        if let Some(sub) = slot.subscription {
            self.clock.unsubscribe(sub);
        }
    }

    fn cell(&self, id: TrackId) -> Result<Rc<RefCell<CarouselTrack>>, GlideError> {
        self.tracks
            .borrow()
            .get(&id)
            .map(|s| s.track.clone())
            .ok_or(GlideError::UnknownTrack(id))
    }

    /// A media item of the track loaded or failed.
    pub fn media_ready(&self, id: TrackId) -> Result<bool, GlideError> {
        let cell = self.cell(id)?;
        let done = cell.borrow_mut().media_ready();
        Ok(done)
    }

    /// Measure the strip and, on the first success, start auto-advance.
    pub fn measure(&self, id: TrackId, extent: f32) -> Result<f32, GlideError> {
        let cell = self.cell(id)?;
        let distance = cell.borrow_mut().measure(extent)?;
        let mut tracks = self.tracks.borrow_mut();
        let Some(slot) = tracks.get_mut(&id) else {
            return Err(GlideError::UnknownTrack(id));
        };
        if slot.subscription.is_none() {
            let weak: Weak<RefCell<CarouselTrack>> = Rc::downgrade(&slot.track);
            let alive = slot.alive.clone();
            let surface = self.surface.clone();
            slot.subscription = Some(self.clock.subscribe(move |tick| {
                let Some(track) = weak.upgrade() else {
                    return Flow::Stop;
                };
                if !alive.get() {
                    return Flow::Stop;
                }
                let mut track = track.borrow_mut();
                if track.advance(tick.dt) {
                    track.write(&surface);
                }
                Flow::Continue
            }));
            debug!("marquee: {:?} ready, wrap distance {}", id, distance);
            self.surface.emit(MotionEvent::TrackReady {
                track: id,
                wrap_distance: distance,
            });
        } else {
            trace!("marquee: {:?} re-measured, wrap distance {}", id, distance);
        }
        drop(tracks);
        cell.borrow().write(&self.surface);
        Ok(distance)
    }

    pub fn remove(&self, id: TrackId) -> bool {
        let slot = self.tracks.borrow_mut().remove(&id);
        match slot {
            Some(slot) => {
                self.detach(slot);
                debug!("marquee: {:?} removed", id);
                true
            }
            None => false,
        }
    }

    /// A copy of the track's current state.
    pub fn track(&self, id: TrackId) -> Option<CarouselTrack> {
        self.cell(id).ok().map(|c| c.borrow().clone())
    }

    pub fn is_ready(&self, id: TrackId) -> bool {
        self.cell(id).map(|c| c.borrow().is_ready()).unwrap_or(false)
    }

    pub fn begin_drag(&self, id: TrackId) -> Result<bool, GlideError> {
        let cell = self.cell(id)?;
        let ok = cell.borrow_mut().begin_drag();
        Ok(ok)
    }

    pub fn drag_to(&self, id: TrackId, start_offset: f32, delta: f32) -> Result<(), GlideError> {
        let cell = self.cell(id)?;
        let mut track = cell.borrow_mut();
        if track.drag_to(start_offset, delta) {
            track.write(&self.surface);
        }
        Ok(())
    }

    pub fn release(&self, id: TrackId, last_delta: f32, min_delta: f32) -> Result<i8, GlideError> {
        let cell = self.cell(id)?;
        let mut track = cell.borrow_mut();
        if track.release(last_delta, min_delta) {
            self.surface.emit(MotionEvent::DirectionChanged {
                track: id,
                direction: track.direction(),
            });
        }
        Ok(track.direction())
    }

    pub fn ids(&self) -> Vec<TrackId> {
        self.tracks.borrow().keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.tracks.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.borrow().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClockConfig;

    fn hero() -> CarouselTrack {
        CarouselTrack::new(
            TrackId(0),
            TrackSpec::new(Target::element("hero-track"), Axis::Horizontal, 50.0).elements(10),
        )
    }

    #[test]
    fn measuring_track_is_inert() {
        let mut t = hero();
        assert!(!t.advance(1.0));
        assert!(!t.begin_drag());
        assert_eq!(t.offset(), 0.0);
        assert!(matches!(t.measure(0.0), Err(GlideError::MeasurementNotReady(_))));
        assert!(matches!(t.measure(f32::NAN), Err(GlideError::MeasurementNotReady(_))));
        assert_eq!(t.phase(), TrackPhase::Measuring);
    }

    #[test]
    fn pending_media_blocks_measurement() {
        let mut t = CarouselTrack::new(
            TrackId(1),
            TrackSpec::new(Target::element("col"), Axis::Vertical, 30.0).pending_media(2),
        );
        assert!(t.measure(1200.0).is_err());
        assert!(!t.media_ready());
        assert!(t.media_ready());
        assert_eq!(t.measure(1200.0).unwrap(), 600.0);
        assert!(t.is_ready());
    }

    #[test]
    fn hero_scenario() {
        let mut t = hero();
        assert_eq!(t.measure(1000.0).unwrap(), 500.0);
        for _ in 0..3 {
            t.advance(1.0);
        }
        assert_eq!(t.offset(), 150.0);
        let start = t.offset();
        assert!(t.begin_drag());
        t.drag_to(start, -260.0);
        assert_eq!(t.offset(), 410.0);
        assert!(t.release(-260.0, 4.0));
        assert_eq!(t.direction(), -1);
        assert_eq!(t.phase(), TrackPhase::Idle);
    }

    #[test]
    fn small_release_keeps_direction() {
        let mut t = hero();
        t.measure(1000.0).unwrap();
        t.begin_drag();
        assert!(!t.release(-3.0, 4.0));
        assert_eq!(t.direction(), 1);
    }

    #[test]
    fn inverted_polarity_flips_release() {
        let mut t = CarouselTrack::new(
            TrackId(2),
            TrackSpec::new(Target::element("col"), Axis::Vertical, 20.0)
                .polarity(DragPolarity::Inverted),
        );
        t.measure(800.0).unwrap();
        t.begin_drag();
        t.release(30.0, 4.0);
        assert_eq!(t.direction(), -1);
    }

    #[test]
    fn wraps_backwards() {
        let mut t = hero();
        t.measure(1000.0).unwrap();
        t.begin_drag();
        t.drag_to(0.0, 30.0);
        assert_eq!(t.offset(), 470.0);
    }

    #[test]
    fn controller_subscribes_once_ready_and_writes_translation() {
        let clock = FrameClock::new(ClockConfig::default());
        let surface = Surface::new();
        let m = Marquee::new(clock.clone(), surface.clone());
        let id = m.add(
            TrackId(4),
            TrackSpec::new(Target::element("strip"), Axis::Horizontal, 60.0),
        );
        assert_eq!(clock.subscriber_count(), 0);
        m.measure(id, 400.0).unwrap();
        m.measure(id, 400.0).unwrap();
        assert_eq!(clock.subscriber_count(), 1);
        clock.advance(0.5);
        assert_eq!(surface.get(&Target::element("strip"), StyleProp::X), Some(-30.0));
        assert!(m.remove(id));
        assert_eq!(clock.subscriber_count(), 0);
        assert!(matches!(m.media_ready(id), Err(GlideError::UnknownTrack(_))));
    }
}
