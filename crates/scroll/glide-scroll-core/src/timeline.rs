//! Animation Timeline Scheduler.
//!
//! A `Timeline` is an ordered list of tween steps placed in time. Rendering is
//! a pure function of the timeline time (`render_at`), so playback (time
//! driven) and scrubbing (progress driven) share one code path.
//!
//! The `Scheduler` owns live timelines: it starts them immediately or when a
//! one-shot trigger fires, drives them from the Frame Clock while playing,
//! and tears down clock subscriptions and trigger registrations on `kill`.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};
use std::str::FromStr;

use hashbrown::HashMap;
use log::{debug, trace};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::clock::{Flow, FrameClock};
use crate::ease::{lerp, Ease};
use crate::error::GlideError;
use crate::ids::{SubscriberId, TimelineId, TriggerId};
use crate::observer::{RegionTrigger, ScrollObserver, TriggerEventKind, TriggerMode};
use crate::outputs::MotionEvent;
use crate::style::{StyleProp, StyleSnapshot, Target};
use crate::surface::Surface;

/// One tween: every target moves from `from` to `to` over `duration` seconds.
/// With a `stagger`, target `i` starts `i * stagger` seconds after target 0.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnimationStep {
    /// May be left empty in JSON when the host fills it in (e.g. from a
    /// fragmented heading); an empty list is rejected by `Timeline::add`.
    #[serde(default)]
    pub targets: Vec<Target>,
    /// Missing properties are captured when the timeline first renders.
    #[serde(default)]
    pub from: Option<StyleSnapshot>,
    pub to: StyleSnapshot,
    pub duration: f32,
    #[serde(default)]
    pub ease: Ease,
    #[serde(default)]
    pub stagger: f32,
}

impl AnimationStep {
    pub fn to(targets: Vec<Target>, to: StyleSnapshot, duration: f32) -> Self {
        Self {
            targets,
            from: None,
            to,
            duration: duration.max(0.0),
            ease: Ease::default(),
            stagger: 0.0,
        }
    }

    pub fn from_to(
        targets: Vec<Target>,
        from: StyleSnapshot,
        to: StyleSnapshot,
        duration: f32,
    ) -> Self {
        Self {
            from: Some(from),
            ..Self::to(targets, to, duration)
        }
    }

    pub fn ease(mut self, ease: Ease) -> Self {
        self.ease = ease;
        self
    }

    pub fn stagger(mut self, stagger: f32) -> Self {
        self.stagger = stagger.max(0.0);
        self
    }

    /// Time from the first target's start to the last target's end.
    pub fn span(&self) -> f32 {
        let n = self.targets.len().saturating_sub(1) as f32;
        self.duration + self.stagger * n
    }
}

/// Where a step is placed on the timeline.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Position {
    /// Offset from the end of the previous step (`">"`, `">-0.05"`, `"-=0.2"`).
    Relative(f32),
    /// Offset from the start of the previous step (`"<"`, `"<0.1"`).
    WithPrevious(f32),
    /// Absolute time in seconds (`"0.4"`).
    Absolute(f32),
}

impl Default for Position {
    fn default() -> Self {
        Position::Relative(0.0)
    }
}

fn parse_offset(s: &str) -> Option<f32> {
    if s.is_empty() {
        return Some(0.0);
    }
    s.parse::<f32>().ok().filter(|v| v.is_finite())
}

impl FromStr for Position {
    type Err = GlideError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let s = raw.trim();
        let bad = || GlideError::InvalidPosition(raw.to_string());
        if let Some(rest) = s.strip_prefix('>') {
            return parse_offset(rest).map(Position::Relative).ok_or_else(bad);
        }
        if let Some(rest) = s.strip_prefix('<') {
            return parse_offset(rest).map(Position::WithPrevious).ok_or_else(bad);
        }
        if let Some(rest) = s.strip_prefix("-=") {
            return parse_offset(rest).map(|v| Position::Relative(-v)).ok_or_else(bad);
        }
        if let Some(rest) = s.strip_prefix("+=") {
            return parse_offset(rest).map(Position::Relative).ok_or_else(bad);
        }
        s.parse::<f32>()
            .ok()
            .filter(|v| v.is_finite() && *v >= 0.0)
            .map(Position::Absolute)
            .ok_or_else(bad)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Position::Relative(o) if o == 0.0 => write!(f, ">"),
            Position::Relative(o) if o > 0.0 => write!(f, ">+{o}"),
            Position::Relative(o) => write!(f, ">{o}"),
            Position::WithPrevious(o) if o == 0.0 => write!(f, "<"),
            Position::WithPrevious(o) if o > 0.0 => write!(f, "<+{o}"),
            Position::WithPrevious(o) => write!(f, "<{o}"),
            Position::Absolute(t) => write!(f, "{t}"),
        }
    }
}

impl Serialize for Position {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Position {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Seconds(f32),
            Text(String),
        }
        match Raw::deserialize(deserializer)? {
            Raw::Seconds(t) if t.is_finite() && t >= 0.0 => Ok(Position::Absolute(t)),
            Raw::Seconds(t) => Err(serde::de::Error::custom(format!(
                "invalid absolute position {t}"
            ))),
            Raw::Text(s) => s.parse().map_err(serde::de::Error::custom),
        }
    }
}

#[derive(Clone, Debug)]
struct Placed {
    step: AnimationStep,
    start: f32,
    /// Per-target start values; resolved on first render.
    from: Option<Vec<StyleSnapshot>>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimelineState {
    /// Waiting for its trigger (or not started yet).
    Pending,
    Playing,
    Complete,
    Killed,
}

#[derive(Clone, Debug)]
pub struct Timeline {
    id: TimelineId,
    steps: Vec<Placed>,
    prev_start: f32,
    prev_end: f32,
    duration: f32,
    time: f32,
    state: TimelineState,
}

impl Timeline {
    pub fn new(id: TimelineId) -> Self {
        Self {
            id,
            steps: Vec::new(),
            prev_start: 0.0,
            prev_end: 0.0,
            duration: 0.0,
            time: 0.0,
            state: TimelineState::Pending,
        }
    }

    pub fn id(&self) -> TimelineId {
        self.id
    }

    /// Append a step. A step without targets is a missing-target error and
    /// leaves the timeline unchanged.
    pub fn add(&mut self, step: AnimationStep, position: Position) -> Result<&mut Self, GlideError> {
        if step.targets.is_empty() {
            return Err(GlideError::MissingTarget(format!(
                "step {} of timeline {:?} has no targets",
                self.steps.len(),
                self.id
            )));
        }
        let start = match position {
            Position::Relative(o) => self.prev_end + o,
            Position::WithPrevious(o) => self.prev_start + o,
            Position::Absolute(t) => t,
        }
        .max(0.0);
        let end = start + step.span();
        self.prev_start = start;
        self.prev_end = end;
        self.duration = self.duration.max(end);
        self.steps.push(Placed {
            step,
            start,
            from: None,
        });
        Ok(self)
    }

    pub fn duration(&self) -> f32 {
        self.duration
    }

    pub fn time(&self) -> f32 {
        self.time
    }

    pub fn state(&self) -> TimelineState {
        self.state
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// `(start, end)` in seconds of every step, in declaration order.
    pub fn step_ranges(&self) -> Vec<(f32, f32)> {
        self.steps
            .iter()
            .map(|p| (p.start, p.start + p.step.span()))
            .collect()
    }

    pub fn steps(&self) -> impl Iterator<Item = &AnimationStep> + '_ {
        self.steps.iter().map(|p| &p.step)
    }

    /// Resolve implicit start values: an earlier step animating the same
    /// property hands over its end value, otherwise the surface's current
    /// value is used.
    fn resolve_from(&mut self, surface: &Surface) {
        if self.steps.iter().all(|p| p.from.is_some()) {
            return;
        }
        let mut handover: HashMap<(Target, StyleProp), f32> = HashMap::new();
        for placed in self.steps.iter_mut() {
            let step = &placed.step;
            let resolved = placed.from.get_or_insert_with(|| {
                step.targets
                    .iter()
                    .map(|t| {
                        step.to
                            .props()
                            .map(|prop| {
                                let v = step
                                    .from
                                    .as_ref()
                                    .and_then(|f| f.get(prop))
                                    .or_else(|| handover.get(&(t.clone(), prop)).copied())
                                    .unwrap_or_else(|| surface.current(t, prop));
                                (prop, v)
                            })
                            .collect()
                    })
                    .collect()
            });
            debug_assert_eq!(resolved.len(), step.targets.len());
            for t in &step.targets {
                for (prop, v) in step.to.iter() {
                    handover.insert((t.clone(), prop), v);
                }
            }
        }
    }

    /// Compute the visual state at time `t` without writing it.
    pub fn evaluate_at(&mut self, t: f32, surface: &Surface) -> Vec<(Target, StyleProp, f32)> {
        self.resolve_from(surface);
        let mut values: Vec<(Target, StyleProp, f32)> = Vec::new();
        let mut index: HashMap<(Target, StyleProp), usize> = HashMap::new();
        for placed in &self.steps {
            let step = &placed.step;
            let Some(froms) = placed.from.as_ref() else {
                continue;
            };
            for (j, (target, from)) in step.targets.iter().zip(froms).enumerate() {
                let t0 = placed.start + step.stagger * j as f32;
                let started = t >= t0;
                let local = if step.duration > 0.0 {
                    ((t - t0) / step.duration).clamp(0.0, 1.0)
                } else if started {
                    1.0
                } else {
                    0.0
                };
                let eased = step.ease.apply(local);
                for (prop, to) in step.to.iter() {
                    let a = from.get(prop).unwrap_or_else(|| prop.neutral());
                    let key = (target.clone(), prop);
                    match index.get(&key).copied() {
                        Some(i) if started => values[i].2 = lerp(a, to, eased),
                        Some(_) => {}
                        None => {
                            let v = if started { lerp(a, to, eased) } else { a };
                            index.insert(key, values.len());
                            values.push((target.clone(), prop, v));
                        }
                    }
                }
            }
        }
        values
    }

    /// Set the visual state to time `t` (clamped to the timeline).
    pub fn render_at(&mut self, t: f32, surface: &Surface) {
        let t = t.clamp(0.0, self.duration);
        self.time = t;
        for (target, prop, v) in self.evaluate_at(t, surface) {
            surface.write(&target, prop, v);
        }
    }

    /// Advance playback by `dt`. Returns true once the end is reached.
    pub fn advance(&mut self, dt: f32, surface: &Surface) -> bool {
        if self.state != TimelineState::Playing {
            return self.state == TimelineState::Complete;
        }
        let t = self.time + dt.max(0.0);
        self.render_at(t, surface);
        if t >= self.duration {
            self.state = TimelineState::Complete;
            return true;
        }
        false
    }
}

struct Slot {
    timeline: Timeline,
    subscription: Option<SubscriberId>,
    trigger: Option<TriggerId>,
    alive: Rc<Cell<bool>>,
}

type SlotRef = Rc<RefCell<Slot>>;

/// What is kept of a timeline once it completes.
#[derive(Clone, Copy, Debug)]
struct Finished {
    time: f32,
    /// Gate registration, released on `kill`.
    trigger: Option<TriggerId>,
}

#[derive(Default)]
struct Registry {
    live: HashMap<TimelineId, SlotRef>,
    finished: HashMap<TimelineId, Finished>,
}

/// Owns timelines and their clock/observer registrations. A completed
/// timeline drops its steps and clock subscription; only its end time and
/// gate id remain until `kill`.
#[derive(Clone)]
pub struct Scheduler {
    clock: FrameClock,
    observer: ScrollObserver,
    surface: Surface,
    registry: Rc<RefCell<Registry>>,
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reg = self.registry.borrow();
        f.debug_struct("Scheduler")
            .field("live", &reg.live.len())
            .field("finished", &reg.finished.len())
            .finish()
    }
}

/// Subscribe a slot's timeline to the clock and mark it playing.
fn start_playback(
    slot_ref: &SlotRef,
    clock: &FrameClock,
    surface: &Surface,
    registry: Weak<RefCell<Registry>>,
) {
    let mut slot = slot_ref.borrow_mut();
    if !slot.alive.get() || slot.timeline.state != TimelineState::Pending {
        return;
    }
    slot.timeline.state = TimelineState::Playing;
    let id = slot.timeline.id;
    surface.emit(MotionEvent::TimelineStarted { timeline: id });
    debug!("timeline {:?}: start ({}s)", id, slot.timeline.duration);

    let weak: Weak<RefCell<Slot>> = Rc::downgrade(slot_ref);
    let surface = surface.clone();
    let sub = clock.subscribe(move |tick| {
        let Some(slot_ref) = weak.upgrade() else {
            return Flow::Stop;
        };
        let mut slot = slot_ref.borrow_mut();
        if !slot.alive.get() {
            return Flow::Stop;
        }
        if !slot.timeline.advance(tick.dt, &surface) {
            return Flow::Continue;
        }
        slot.subscription = None;
        let id = slot.timeline.id;
        let finished = Finished {
            time: slot.timeline.time,
            trigger: slot.trigger.take(),
        };
        drop(slot);
        if let Some(registry) = registry.upgrade() {
            let mut reg = registry.borrow_mut();
            reg.live.remove(&id);
            reg.finished.insert(id, finished);
        }
        trace!("timeline {:?}: complete", id);
        surface.emit(MotionEvent::TimelineCompleted { timeline: id });
        Flow::Stop
    });
    slot.subscription = Some(sub);
}

impl Scheduler {
    pub fn new(clock: FrameClock, observer: ScrollObserver, surface: Surface) -> Self {
        Self {
            clock,
            observer,
            surface,
            registry: Rc::new(RefCell::new(Registry::default())),
        }
    }

    /// Take ownership of a built timeline. Without a gate it starts playing
    /// now; with a one-shot gate it stays pending until the trigger enters,
    /// which happens right away if the region is already past its line.
    /// Either way its initial state is rendered immediately.
    pub fn schedule(
        &self,
        mut timeline: Timeline,
        gate: Option<RegionTrigger>,
    ) -> Result<TimelineId, GlideError> {
        if timeline.is_empty() {
            return Err(GlideError::MissingTarget(format!(
                "timeline {:?} has no steps",
                timeline.id
            )));
        }
        if let Some(g) = &gate {
            if g.mode != TriggerMode::OneShot {
                return Err(GlideError::InvalidConfig(
                    "timeline gates must be one-shot triggers".into(),
                ));
            }
        }
        let id = timeline.id;
        timeline.state = TimelineState::Pending;
        timeline.render_at(0.0, &self.surface);
        let alive = Rc::new(Cell::new(true));
        let slot_ref = Rc::new(RefCell::new(Slot {
            timeline,
            subscription: None,
            trigger: None,
            alive: alive.clone(),
        }));
        self.registry.borrow_mut().live.insert(id, slot_ref.clone());

        match gate {
            None => start_playback(
                &slot_ref,
                &self.clock,
                &self.surface,
                Rc::downgrade(&self.registry),
            ),
            Some(trigger) => {
                let weak = Rc::downgrade(&slot_ref);
                let clock = self.clock.clone();
                let surface = self.surface.clone();
                let registry = Rc::downgrade(&self.registry);
                let registered = self.observer.register(trigger, move |ev| {
                    if ev.kind != TriggerEventKind::Enter || !alive.get() {
                        return;
                    }
                    surface.emit(MotionEvent::TriggerEnter {
                        trigger: ev.trigger,
                    });
                    if let Some(slot_ref) = weak.upgrade() {
                        start_playback(&slot_ref, &clock, &surface, registry.clone());
                    }
                });
                match registered {
                    Ok(trig) => slot_ref.borrow_mut().trigger = Some(trig),
                    Err(err) => {
                        self.registry.borrow_mut().live.remove(&id);
                        return Err(err);
                    }
                }
            }
        }
        Ok(id)
    }

    /// Cancel a timeline: stop its clock subscription, detach its trigger and
    /// make any callback still in flight a no-op. Also releases what is left
    /// of a completed timeline.
    pub fn kill(&self, id: TimelineId) -> bool {
        let (live, finished) = {
            let mut reg = self.registry.borrow_mut();
            (reg.live.remove(&id), reg.finished.remove(&id))
        };
        if let Some(done) = finished {
            if let Some(trig) = done.trigger {
                self.observer.unregister(trig);
            }
            debug!("timeline {:?}: released", id);
            return true;
        }
        let Some(slot_ref) = live else {
            return false;
        };
        let (sub, trig) = {
            let mut slot = slot_ref.borrow_mut();
            slot.alive.set(false);
            slot.timeline.state = TimelineState::Killed;
            (slot.subscription.take(), slot.trigger.take())
        };
        if let Some(sub) = sub {
            self.clock.unsubscribe(sub);
        }
        if let Some(trig) = trig {
            self.observer.unregister(trig);
        }
        debug!("timeline {:?}: killed", id);
        true
    }

    pub fn state(&self, id: TimelineId) -> Option<TimelineState> {
        let reg = self.registry.borrow();
        if reg.finished.contains_key(&id) {
            return Some(TimelineState::Complete);
        }
        let slot = reg.live.get(&id)?;
        let state = slot.borrow().timeline.state;
        Some(state)
    }

    pub fn time(&self, id: TimelineId) -> Option<f32> {
        let reg = self.registry.borrow();
        if let Some(done) = reg.finished.get(&id) {
            return Some(done.time);
        }
        let slot = reg.live.get(&id)?;
        let time = slot.borrow().timeline.time;
        Some(time)
    }

    pub fn trigger_of(&self, id: TimelineId) -> Option<TriggerId> {
        let reg = self.registry.borrow();
        if let Some(done) = reg.finished.get(&id) {
            return done.trigger;
        }
        let slot = reg.live.get(&id)?;
        let trig = slot.borrow().trigger;
        trig
    }

    /// Jump a pending or playing timeline to `t` seconds without changing its
    /// play state. Completed timelines hold their end state.
    pub fn seek(&self, id: TimelineId, t: f32) -> Result<(), GlideError> {
        let slot_ref = self
            .registry
            .borrow()
            .live
            .get(&id)
            .cloned()
            .ok_or(GlideError::UnknownTimeline(id))?;
        slot_ref.borrow_mut().timeline.render_at(t, &self.surface);
        Ok(())
    }

    /// Timelines still pending or playing.
    pub fn live(&self) -> usize {
        self.registry.borrow().live.len()
    }

    /// Every timeline not yet killed, completed ones included.
    pub fn len(&self) -> usize {
        let reg = self.registry.borrow();
        reg.live.len() + reg.finished.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
