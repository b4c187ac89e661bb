//! Engine: owns the shared services and routes host input through them.
//!
//! Per frame: smooth scroll → observer → clock tick (timelines, tracks and
//! user frame callbacks), then the surface is drained into `Outputs`.
//!
//! Components register their work through a `Mount`, which remembers every
//! handle it created and releases all of them on `unmount()` or drop.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use log::{debug, warn};

use crate::clock::{Flow, FrameClock, FrameTick};
use crate::config::{Config, FragmentConfig};
use crate::drag::{DragAction, DragInterpreter, DragResponse, PointerInput, TrackHit};
use crate::error::GlideError;
use crate::fragment::{FragmentedHeading, Fragmenter, HighlightSet};
use crate::geometry::Viewport;
use crate::ids::{HeadingId, IdAllocator, SequenceId, SubscriberId, TimelineId, TrackId, TriggerId};
use crate::marquee::{Marquee, TrackSpec};
use crate::observer::{RegionTrigger, ScrollObserver, TriggerEvent};
use crate::outputs::{MotionEvent, Outputs};
use crate::pin::{PinSequence, Pins};
use crate::smooth::{ScrollSource, SmoothScroll};
use crate::style::{StyleProp, StyleSnapshot, Target};
use crate::surface::Surface;
use crate::timeline::{Scheduler, Timeline, TimelineState};

/// Handles shared between the engine and its mounts.
#[derive(Clone, Debug)]
struct Services {
    clock: FrameClock,
    observer: ScrollObserver,
    surface: Surface,
    scheduler: Scheduler,
    marquee: Marquee,
    pins: Pins,
    fragmenter: Rc<RefCell<Fragmenter>>,
    ids: Rc<RefCell<IdAllocator>>,
    fragment_cfg: FragmentConfig,
}

#[derive(Debug)]
pub struct Engine {
    cfg: Config,
    svc: Services,
    smooth: SmoothScroll,
    drag: DragInterpreter,
    outputs: Outputs,
}

impl Engine {
    /// Engine with its own private Frame Clock.
    pub fn new(cfg: Config) -> Self {
        let clock = FrameClock::new(cfg.clock.clone());
        Self::with_clock(cfg, clock)
    }

    /// Engine driven by an existing clock, e.g. `FrameClock::global()`.
    pub fn with_clock(cfg: Config, clock: FrameClock) -> Self {
        let observer = ScrollObserver::default();
        let surface = Surface::new();
        let svc = Services {
            scheduler: Scheduler::new(clock.clone(), observer.clone(), surface.clone()),
            marquee: Marquee::new(clock.clone(), surface.clone()),
            pins: Pins::new(observer.clone(), surface.clone()),
            fragmenter: Rc::new(RefCell::new(Fragmenter::new())),
            ids: Rc::new(RefCell::new(IdAllocator::new())),
            fragment_cfg: cfg.fragment.clone(),
            clock,
            observer,
            surface,
        };
        Self {
            smooth: SmoothScroll::new(cfg.smooth_scroll.clone(), 0.0),
            drag: DragInterpreter::new(cfg.drag.clone()),
            outputs: Outputs::default(),
            svc,
            cfg,
        }
    }

    pub fn config(&self) -> &Config {
        &self.cfg
    }

    pub fn clock(&self) -> &FrameClock {
        &self.svc.clock
    }

    pub fn observer(&self) -> &ScrollObserver {
        &self.svc.observer
    }

    pub fn surface(&self) -> &Surface {
        &self.svc.surface
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.svc.scheduler
    }

    pub fn marquee(&self) -> &Marquee {
        &self.svc.marquee
    }

    pub fn pins(&self) -> &Pins {
        &self.svc.pins
    }

    pub fn heading(&self, id: HeadingId) -> Option<FragmentedHeading> {
        self.svc.fragmenter.borrow().get(id).cloned()
    }

    pub fn drag(&self) -> &DragInterpreter {
        &self.drag
    }

    /// Effective (eased) scroll position.
    pub fn scroll(&self) -> f32 {
        self.smooth.current()
    }

    /// Run one display frame at host time `now` (seconds).
    pub fn frame(&mut self, now: f32) -> &Outputs {
        let dt = self.svc.clock.peek_dt(now);
        if let Some(position) = self.smooth.frame(dt) {
            self.svc.observer.update(position);
        }
        self.svc.clock.tick(now);
        self.outputs = self.svc.surface.drain();
        &self.outputs
    }

    /// Style writes and events produced since the last frame (e.g. mount
    /// initial states that must be applied before first paint).
    pub fn take_outputs(&mut self) -> Outputs {
        self.svc.surface.drain()
    }

    pub fn wheel(&mut self, delta: f32) {
        self.smooth.push(delta, ScrollSource::Wheel);
    }

    pub fn touch_scroll(&mut self, delta: f32) {
        self.smooth.push(delta, ScrollSource::Touch);
    }

    /// The page scrolled natively (keyboard, scrollbar, anchor).
    pub fn native_scroll(&mut self, position: f32) {
        self.smooth.sync_native(position);
    }

    pub fn scroll_to(&mut self, position: f32, immediate: bool) {
        self.smooth.scroll_to(position, immediate);
    }

    /// Viewport or document height changed: re-measure every trigger.
    pub fn resize(&mut self, viewport: Viewport, content_height: f32) {
        self.smooth.set_limit(content_height - viewport.height);
        self.svc.observer.set_viewport(viewport);
    }

    /// Re-query trigger geometry without a viewport change.
    pub fn refresh(&self) {
        self.svc.observer.refresh();
    }

    /// Client-side navigation: drop momentum and any gesture in flight.
    pub fn route_change(&mut self) {
        self.smooth.reset(0.0);
        self.drag.cancel();
        self.svc.clock.resync();
        debug!("engine: route change");
    }

    pub fn pointer_down(&mut self, track: TrackId, input: PointerInput) -> DragResponse {
        let hit = match self.svc.marquee.track(track) {
            Some(t) => TrackHit {
                track,
                axis: t.axis,
                offset: t.offset(),
                ready: t.is_ready(),
                min_viewport_width: t.min_viewport_width,
            },
            None => TrackHit {
                track,
                axis: Default::default(),
                offset: 0.0,
                ready: false,
                min_viewport_width: None,
            },
        };
        let viewport = self.svc.observer.viewport();
        self.drag.pointer_down(input, hit, viewport.width)
    }

    pub fn pointer_move(&mut self, input: PointerInput) -> DragResponse {
        let response = self.drag.pointer_move(input);
        self.apply_drag(response.action);
        response
    }

    pub fn pointer_up(&mut self) -> DragResponse {
        let response = self.drag.pointer_up();
        self.apply_drag(response.action);
        response
    }

    fn apply_drag(&mut self, action: DragAction) {
        let marquee = &self.svc.marquee;
        let result = match action {
            DragAction::None | DragAction::Opened { .. } => Ok(()),
            DragAction::Commit {
                track,
                start_offset,
                delta,
            } => marquee.begin_drag(track).and_then(|ok| {
                if ok {
                    self.svc.surface.emit(MotionEvent::DragCommitted { track });
                    marquee.drag_to(track, start_offset, delta)
                } else {
                    Ok(())
                }
            }),
            DragAction::Move {
                track,
                start_offset,
                delta,
            } => marquee.drag_to(track, start_offset, delta),
            DragAction::Reject { track } => {
                self.svc.surface.emit(MotionEvent::DragRejected { track });
                Ok(())
            }
            DragAction::Release { track, last_delta } => marquee
                .release(track, last_delta, self.cfg.drag.min_direction_delta)
                .map(|_| ()),
        };
        if let Err(err) = result {
            warn!("engine: drag dropped: {err}");
            self.drag.cancel();
        }
    }

    /// Open a registration scope for one component.
    pub fn mount(&self) -> Mount {
        Mount {
            svc: self.svc.clone(),
            alive: Rc::new(Cell::new(true)),
            headings: Vec::new(),
            timelines: Vec::new(),
            tracks: Vec::new(),
            triggers: Vec::new(),
            subscriptions: Vec::new(),
            sequences: Vec::new(),
        }
    }
}

/// Everything one component registered. Released on `unmount()` or drop.
#[derive(Debug)]
pub struct Mount {
    svc: Services,
    alive: Rc<Cell<bool>>,
    headings: Vec<HeadingId>,
    timelines: Vec<TimelineId>,
    tracks: Vec<TrackId>,
    triggers: Vec<TriggerId>,
    subscriptions: Vec<SubscriberId>,
    sequences: Vec<SequenceId>,
}

impl Mount {
    pub fn is_alive(&self) -> bool {
        self.alive.get()
    }

    /// Split a heading into per-character units and hide them. Fragmenting
    /// a key that is already fragmented returns the existing heading.
    pub fn fragment_heading(&mut self, key: &str, text: &str, highlights: &HighlightSet) -> HeadingId {
        let ids = self.svc.ids.clone();
        let (id, fresh) = self
            .svc
            .fragmenter
            .borrow_mut()
            .fragment_node(key, text, highlights, || ids.borrow_mut().alloc_heading());
        if !fresh {
            debug!("mount: heading '{key}' already fragmented");
            return id;
        }
        let targets = self.unit_targets(id);
        let initial = StyleSnapshot::new()
            .with(StyleProp::Opacity, self.svc.fragment_cfg.initial_opacity)
            .with(StyleProp::Y, self.svc.fragment_cfg.initial_y);
        for t in &targets {
            self.svc.surface.write_snapshot(t, &initial);
        }
        self.svc.surface.emit(MotionEvent::HeadingFragmented {
            heading: id,
            units: targets.len(),
        });
        self.headings.push(id);
        id
    }

    pub fn unit_targets(&self, heading: HeadingId) -> Vec<Target> {
        self.svc.fragmenter.borrow().unit_targets(heading)
    }

    /// Targets of the units in highlighted words only.
    pub fn highlighted_targets(&self, heading: HeadingId) -> Vec<Target> {
        let fragmenter = self.svc.fragmenter.borrow();
        let Some(h) = fragmenter.get(heading) else {
            return Vec::new();
        };
        h.units()
            .enumerate()
            .filter(|(_, u)| u.highlighted)
            .map(|(index, _)| Target::Unit { heading, index })
            .collect()
    }

    /// Write a style state immediately.
    pub fn set(&self, target: &Target, snapshot: &StyleSnapshot) {
        self.svc.surface.write_snapshot(target, snapshot);
    }

    /// Build and schedule a timeline. A build error (such as a step without
    /// targets) or an unmeasurable gate aborts only this timeline.
    pub fn timeline<F>(&mut self, gate: Option<RegionTrigger>, build: F) -> Option<TimelineId>
    where
        F: FnOnce(&mut Timeline) -> Result<(), GlideError>,
    {
        let id = self.svc.ids.borrow_mut().alloc_timeline();
        let mut timeline = Timeline::new(id);
        let scheduled = build(&mut timeline).and_then(|()| self.svc.scheduler.schedule(timeline, gate));
        match scheduled {
            Ok(id) => {
                self.timelines.push(id);
                Some(id)
            }
            Err(err) => {
                warn!("mount: timeline {:?} aborted: {err}", id);
                None
            }
        }
    }

    pub fn timeline_state(&self, id: TimelineId) -> Option<TimelineState> {
        self.svc.scheduler.state(id)
    }

    pub fn track(&mut self, spec: TrackSpec) -> TrackId {
        let id = self.svc.ids.borrow_mut().alloc_track();
        self.svc.marquee.add(id, spec);
        self.tracks.push(id);
        id
    }

    pub fn media_ready(&self, track: TrackId) -> Result<bool, GlideError> {
        self.svc.marquee.media_ready(track)
    }

    pub fn measure(&self, track: TrackId, extent: f32) -> Result<f32, GlideError> {
        self.svc.marquee.measure(track, extent)
    }

    /// Register a trigger whose callback runs only while this mount is alive.
    pub fn trigger<F>(&mut self, trigger: RegionTrigger, mut callback: F) -> Option<TriggerId>
    where
        F: FnMut(&TriggerEvent) + 'static,
    {
        let alive = self.alive.clone();
        match self.svc.observer.register(trigger, move |ev| {
            if alive.get() {
                callback(ev);
            }
        }) {
            Ok(id) => {
                self.triggers.push(id);
                Some(id)
            }
            Err(err) => {
                warn!("mount: trigger aborted: {err}");
                None
            }
        }
    }

    /// Per-frame callback for ad hoc motion (e.g. a ticker text).
    pub fn on_frame<F>(&mut self, mut callback: F) -> SubscriberId
    where
        F: FnMut(&FrameTick) -> Flow + 'static,
    {
        let alive = self.alive.clone();
        let id = self.svc.clock.subscribe(move |tick| {
            if !alive.get() {
                return Flow::Stop;
            }
            callback(tick)
        });
        self.subscriptions.push(id);
        id
    }

    /// Build a pin sequence and bind it to a pinned trigger.
    pub fn pin_sequence<F>(&mut self, trigger: RegionTrigger, build: F) -> Option<SequenceId>
    where
        F: FnOnce(SequenceId) -> Result<PinSequence, GlideError>,
    {
        let id = self.svc.ids.borrow_mut().alloc_sequence();
        match build(id).and_then(|seq| self.svc.pins.attach(seq, trigger)) {
            Ok(id) => {
                self.sequences.push(id);
                Some(id)
            }
            Err(err) => {
                warn!("mount: pin sequence {:?} aborted: {err}", id);
                None
            }
        }
    }

    pub fn request_play(&self, sequence: SequenceId) -> Result<Option<crate::outputs::MediaCommand>, GlideError> {
        self.svc.pins.request_play(sequence)
    }

    /// Release every registration made through this mount. Idempotent.
    pub fn unmount(&mut self) {
        if !self.alive.replace(false) {
            return;
        }
        for id in self.timelines.drain(..) {
            self.svc.scheduler.kill(id);
        }
        for id in self.sequences.drain(..) {
            self.svc.pins.detach(id);
        }
        for id in self.tracks.drain(..) {
            self.svc.marquee.remove(id);
        }
        for id in self.triggers.drain(..) {
            self.svc.observer.unregister(id);
        }
        for id in self.subscriptions.drain(..) {
            self.svc.clock.unsubscribe(id);
        }
        for id in self.headings.drain(..) {
            self.svc.fragmenter.borrow_mut().release(id);
            self.svc.surface.forget_heading(id);
        }
        debug!("mount: released");
    }
}

impl Drop for Mount {
    fn drop(&mut self) {
        self.unmount();
    }
}
