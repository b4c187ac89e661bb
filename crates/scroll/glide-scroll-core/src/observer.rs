//! Scroll Position Observer.
//!
//! Tracks registered regions against the effective scroll position. One-shot
//! regions fire `Enter` once and never again for the lifetime of the
//! registration. Pinned regions report `Enter`/`Leave`/`EnterBack`/`LeaveBack`
//! plus a clamped progress ratio and the offset that keeps the pinned element
//! fixed in the viewport.
//!
//! Geometry is re-queried only on `register` and `refresh`; plain scroll
//! updates reuse the cached start/end lines.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::str::FromStr;

use log::{debug, trace, warn};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::GlideError;
use crate::geometry::{Rect, Viewport};
use crate::ids::TriggerId;

/// Returns the region's document-space bounds, or `None` if the element is
/// not on the page.
pub type BoundsProvider = Box<dyn Fn() -> Option<Rect>>;

/// Where the trigger line sits: the point `element_edge` of the way down the
/// element meets the point `viewport_ratio` of the way down the viewport.
/// `"top 80%"` is `{ element_edge: 0.0, viewport_ratio: 0.8 }`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TriggerLine {
    pub element_edge: f32,
    pub viewport_ratio: f32,
}

impl TriggerLine {
    pub fn new(element_edge: f32, viewport_ratio: f32) -> Self {
        Self {
            element_edge,
            viewport_ratio,
        }
    }

    /// Scroll position at which the line is crossed.
    pub fn scroll_position(&self, rect: &Rect, viewport: &Viewport) -> f32 {
        rect.top + self.element_edge * rect.height - self.viewport_ratio * viewport.height
    }
}

impl Default for TriggerLine {
    /// Element top meets viewport bottom.
    fn default() -> Self {
        Self::new(0.0, 1.0)
    }
}

fn parse_ratio(token: &str) -> Option<f32> {
    match token {
        "top" => Some(0.0),
        "center" => Some(0.5),
        "bottom" => Some(1.0),
        _ => token
            .strip_suffix('%')
            .and_then(|n| n.parse::<f32>().ok())
            .filter(|n| n.is_finite())
            .map(|n| n / 100.0),
    }
}

impl FromStr for TriggerLine {
    type Err = GlideError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split_whitespace();
        let bad = || GlideError::InvalidTriggerLine(s.to_string());
        let edge = parts.next().and_then(parse_ratio).ok_or_else(bad)?;
        let vp = parts.next().and_then(parse_ratio).ok_or_else(bad)?;
        if parts.next().is_some() {
            return Err(bad());
        }
        Ok(Self::new(edge, vp))
    }
}

impl fmt::Display for TriggerLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}% {}%",
            self.element_edge * 100.0,
            self.viewport_ratio * 100.0
        )
    }
}

impl Serialize for TriggerLine {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TriggerLine {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Length of a pinned range.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PinEnd {
    Pixels(f32),
    /// Multiple of the element's own height, re-evaluated on refresh.
    HeightMultiple(f32),
}

impl PinEnd {
    fn distance(&self, rect: &Rect) -> f32 {
        match *self {
            PinEnd::Pixels(px) => px,
            PinEnd::HeightMultiple(k) => rect.height * k,
        }
        .max(0.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerMode {
    OneShot,
    Pinned { end: PinEnd },
}

pub struct RegionTrigger {
    pub bounds: BoundsProvider,
    pub start: TriggerLine,
    pub mode: TriggerMode,
}

impl RegionTrigger {
    pub fn one_shot(bounds: BoundsProvider, start: TriggerLine) -> Self {
        Self {
            bounds,
            start,
            mode: TriggerMode::OneShot,
        }
    }

    pub fn pinned(bounds: BoundsProvider, start: TriggerLine, end: PinEnd) -> Self {
        Self {
            bounds,
            start,
            mode: TriggerMode::Pinned { end },
        }
    }
}

impl fmt::Debug for RegionTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegionTrigger")
            .field("start", &self.start)
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TriggerEventKind {
    Enter,
    Leave,
    EnterBack,
    LeaveBack,
    Progress { progress: f32, pin_offset: f32 },
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TriggerEvent {
    pub trigger: TriggerId,
    pub kind: TriggerEventKind,
}

type TriggerFn = Box<dyn FnMut(&TriggerEvent)>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum OneShotState {
    Idle,
    Armed,
    Fired,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PinState {
    Before,
    Active,
    After,
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum EntryState {
    OneShot(OneShotState),
    Pinned {
        state: PinState,
        progress: Option<f32>,
    },
}

struct Entry {
    id: TriggerId,
    /// Shared so providers can run without the observer borrowed.
    bounds: Rc<dyn Fn() -> Option<Rect>>,
    line: TriggerLine,
    mode: TriggerMode,
    /// Taken out while the callback runs.
    callback: Option<TriggerFn>,
    start: f32,
    distance: f32,
    state: EntryState,
}

impl Entry {
    fn place(&mut self, rect: &Rect, viewport: &Viewport) {
        self.start = self.line.scroll_position(rect, viewport);
        self.distance = match self.mode {
            TriggerMode::OneShot => 0.0,
            TriggerMode::Pinned { end } => end.distance(rect),
        };
        if let EntryState::OneShot(OneShotState::Idle) = self.state {
            self.state = EntryState::OneShot(OneShotState::Armed);
        }
    }

    /// Advance the state machine and collect the events for `scroll`.
    fn evaluate(&mut self, scroll: f32, out: &mut Vec<TriggerEvent>) {
        let id = self.id;
        let mut push = |kind| out.push(TriggerEvent { trigger: id, kind });
        match &mut self.state {
            EntryState::OneShot(state) => {
                if *state == OneShotState::Armed && scroll >= self.start {
                    *state = OneShotState::Fired;
                    push(TriggerEventKind::Enter);
                }
            }
            EntryState::Pinned { state, progress } => {
                let end = self.start + self.distance;
                let next = if scroll < self.start {
                    PinState::Before
                } else if scroll >= end {
                    PinState::After
                } else {
                    PinState::Active
                };
                let p = if self.distance > 0.0 {
                    ((scroll - self.start) / self.distance).clamp(0.0, 1.0)
                } else if scroll >= self.start {
                    1.0
                } else {
                    0.0
                };
                use PinState::*;
                match (*state, next) {
                    (Before, Active) => push(TriggerEventKind::Enter),
                    (Before, After) => {
                        push(TriggerEventKind::Enter);
                        push(TriggerEventKind::Leave);
                    }
                    (Active, After) => push(TriggerEventKind::Leave),
                    (After, Active) => push(TriggerEventKind::EnterBack),
                    (Active, Before) => push(TriggerEventKind::LeaveBack),
                    (After, Before) => {
                        push(TriggerEventKind::EnterBack);
                        push(TriggerEventKind::LeaveBack);
                    }
                    _ => {}
                }
                if *progress != Some(p) {
                    let pin_offset = (scroll - self.start).clamp(0.0, self.distance);
                    push(TriggerEventKind::Progress {
                        progress: p,
                        pin_offset,
                    });
                }
                *state = next;
                *progress = Some(p);
            }
        }
    }
}

struct ObserverState {
    next_id: u32,
    entries: Vec<Entry>,
    scroll: f32,
    viewport: Viewport,
}

/// Cloneable handle; clones observe the same scroll position.
#[derive(Clone)]
pub struct ScrollObserver {
    inner: Rc<RefCell<ObserverState>>,
}

impl fmt::Debug for ScrollObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let st = self.inner.borrow();
        f.debug_struct("ScrollObserver")
            .field("triggers", &st.entries.len())
            .field("scroll", &st.scroll)
            .finish()
    }
}

impl Default for ScrollObserver {
    fn default() -> Self {
        Self::new(Viewport::default())
    }
}

impl ScrollObserver {
    pub fn new(viewport: Viewport) -> Self {
        Self {
            inner: Rc::new(RefCell::new(ObserverState {
                next_id: 0,
                entries: Vec::new(),
                scroll: 0.0,
                viewport,
            })),
        }
    }

    /// Register a region. Fails with `MissingTarget` if its bounds cannot be
    /// measured. The region is evaluated against the current scroll position
    /// before this returns, so a region already past its start line fires now.
    pub fn register<F>(&self, trigger: RegionTrigger, callback: F) -> Result<TriggerId, GlideError>
    where
        F: FnMut(&TriggerEvent) + 'static,
    {
        let Some(rect) = (trigger.bounds)() else {
            return Err(GlideError::MissingTarget(format!(
                "trigger region ({:?}) has no bounds",
                trigger
            )));
        };
        let RegionTrigger { bounds, start, mode } = trigger;
        let state = match mode {
            TriggerMode::OneShot => EntryState::OneShot(OneShotState::Idle),
            TriggerMode::Pinned { .. } => EntryState::Pinned {
                state: PinState::Before,
                progress: None,
            },
        };
        let (id, events) = {
            let mut st = self.inner.borrow_mut();
            let id = TriggerId(st.next_id);
            st.next_id = st.next_id.wrapping_add(1);
            let mut entry = Entry {
                id,
                bounds: Rc::from(bounds),
                line: start,
                mode,
                callback: Some(Box::new(callback)),
                start: 0.0,
                distance: 0.0,
                state,
            };
            entry.place(&rect, &st.viewport);
            debug!(
                "observer: register {:?} start={} distance={}",
                id, entry.start, entry.distance
            );
            let mut events = Vec::new();
            entry.evaluate(st.scroll, &mut events);
            st.entries.push(entry);
            (id, events)
        };
        for ev in events {
            self.dispatch(&ev);
        }
        Ok(id)
    }

    /// Detach a region and drop its callback. Returns false if unknown.
    pub fn unregister(&self, id: TriggerId) -> bool {
        let removed = {
            let mut st = self.inner.borrow_mut();
            st.entries
                .iter()
                .position(|e| e.id == id)
                .map(|i| st.entries.remove(i))
        };
        let found = removed.is_some();
        drop(removed);
        if found {
            trace!("observer: unregister {:?}", id);
        }
        found
    }

    pub fn len(&self) -> usize {
        self.inner.borrow().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.borrow().entries.is_empty()
    }

    pub fn contains(&self, id: TriggerId) -> bool {
        self.inner.borrow().entries.iter().any(|e| e.id == id)
    }

    pub fn scroll(&self) -> f32 {
        self.inner.borrow().scroll
    }

    pub fn viewport(&self) -> Viewport {
        self.inner.borrow().viewport
    }

    pub fn one_shot_state(&self, id: TriggerId) -> Option<OneShotState> {
        self.inner
            .borrow()
            .entries
            .iter()
            .find(|e| e.id == id)
            .and_then(|e| match e.state {
                EntryState::OneShot(s) => Some(s),
                EntryState::Pinned { .. } => None,
            })
    }

    pub fn pin_state(&self, id: TriggerId) -> Option<(PinState, f32)> {
        self.inner
            .borrow()
            .entries
            .iter()
            .find(|e| e.id == id)
            .and_then(|e| match e.state {
                EntryState::Pinned { state, progress } => Some((state, progress.unwrap_or(0.0))),
                EntryState::OneShot(_) => None,
            })
    }

    /// New effective scroll position (from the smooth scroller or native).
    pub fn update(&self, scroll: f32) {
        self.inner.borrow_mut().scroll = scroll;
        self.evaluate();
    }

    /// Viewport changed (resize / orientation change): re-measure everything.
    pub fn set_viewport(&self, viewport: Viewport) {
        self.inner.borrow_mut().viewport = viewport;
        self.refresh();
    }

    /// Re-query all bounds and re-evaluate at the current scroll position.
    pub fn refresh(&self) {
        let providers: Vec<(TriggerId, Rc<dyn Fn() -> Option<Rect>>)> = self
            .inner
            .borrow()
            .entries
            .iter()
            .map(|e| (e.id, e.bounds.clone()))
            .collect();
        let measured: Vec<(TriggerId, Option<Rect>)> =
            providers.into_iter().map(|(id, f)| (id, f())).collect();
        {
            let mut st = self.inner.borrow_mut();
            let viewport = st.viewport;
            for (id, rect) in measured {
                // Unregistered by a provider in the meantime.
                let Some(e) = st.entries.iter_mut().find(|e| e.id == id) else {
                    continue;
                };
                match rect {
                    Some(rect) => e.place(&rect, &viewport),
                    None => warn!("observer: {:?} lost its bounds; keeping last measurement", id),
                }
            }
        }
        self.evaluate();
    }

    /// Re-evaluate every region at the current scroll position.
    pub fn evaluate(&self) {
        let events = {
            let mut st = self.inner.borrow_mut();
            let scroll = st.scroll;
            let mut events = Vec::new();
            for e in st.entries.iter_mut() {
                e.evaluate(scroll, &mut events);
            }
            events
        };
        for ev in events {
            self.dispatch(&ev);
        }
    }

    fn dispatch(&self, ev: &TriggerEvent) {
        let cb = {
            let mut st = self.inner.borrow_mut();
            match st.entries.iter_mut().find(|e| e.id == ev.trigger) {
                Some(entry) => entry.callback.take(),
                // Unregistered earlier in this dispatch.
                None => return,
            }
        };
        let Some(mut cb) = cb else { return };
        cb(ev);
        let leftover = {
            let mut st = self.inner.borrow_mut();
            match st.entries.iter_mut().find(|e| e.id == ev.trigger) {
                Some(entry) => {
                    entry.callback = Some(cb);
                    None
                }
                None => Some(cb),
            }
        };
        drop(leftover);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn rect_at(top: f32, height: f32) -> BoundsProvider {
        Box::new(move || Some(Rect::new(top, 0.0, 800.0, height)))
    }

    fn observer() -> ScrollObserver {
        ScrollObserver::new(Viewport {
            width: 1280.0,
            height: 1000.0,
        })
    }

    #[test]
    fn parses_trigger_lines() {
        assert_eq!("top 80%".parse::<TriggerLine>().unwrap(), TriggerLine::new(0.0, 0.8));
        assert_eq!("top top".parse::<TriggerLine>().unwrap(), TriggerLine::new(0.0, 0.0));
        assert_eq!("center 50%".parse::<TriggerLine>().unwrap(), TriggerLine::new(0.5, 0.5));
        assert!("top".parse::<TriggerLine>().is_err());
        assert!("top 80% extra".parse::<TriggerLine>().is_err());
        assert!("left 80%".parse::<TriggerLine>().is_err());
    }

    #[test]
    fn one_shot_fires_once_across_reentry() {
        let obs = observer();
        let fired = Rc::new(Cell::new(0));
        let f = fired.clone();
        let id = obs
            .register(
                RegionTrigger::one_shot(rect_at(2000.0, 300.0), "top 80%".parse().unwrap()),
                move |ev| {
                    if ev.kind == TriggerEventKind::Enter {
                        f.set(f.get() + 1);
                    }
                },
            )
            .unwrap();
        assert_eq!(obs.one_shot_state(id), Some(OneShotState::Armed));
        // Line at 2000 - 800 = 1200.
        obs.update(1100.0);
        assert_eq!(fired.get(), 0);
        obs.update(1250.0); // enter
        obs.update(0.0); // leave
        obs.update(1250.0); // enter again
        assert_eq!(fired.get(), 1);
        assert_eq!(obs.one_shot_state(id), Some(OneShotState::Fired));
    }

    #[test]
    fn missing_bounds_is_rejected() {
        let obs = observer();
        let err = obs
            .register(
                RegionTrigger::one_shot(Box::new(|| None), TriggerLine::default()),
                |_| {},
            )
            .unwrap_err();
        assert!(matches!(err, GlideError::MissingTarget(_)));
        assert!(obs.is_empty());
    }

    #[test]
    fn pinned_reports_clamped_progress_and_edges() {
        let obs = observer();
        let log = Rc::new(RefCell::new(Vec::new()));
        let l = log.clone();
        let id = obs
            .register(
                RegionTrigger::pinned(
                    rect_at(1000.0, 500.0),
                    "top top".parse().unwrap(),
                    PinEnd::HeightMultiple(1.6),
                ),
                move |ev| l.borrow_mut().push(ev.kind),
            )
            .unwrap();
        // Range is [1000, 1800).
        obs.update(1400.0);
        assert_eq!(obs.pin_state(id), Some((PinState::Active, 0.5)));
        obs.update(5000.0);
        assert_eq!(obs.pin_state(id), Some((PinState::After, 1.0)));
        obs.update(1400.0);
        obs.update(0.0);
        let kinds = log.borrow();
        // Registration reports the starting progress.
        assert_eq!(
            kinds[0],
            TriggerEventKind::Progress {
                progress: 0.0,
                pin_offset: 0.0
            }
        );
        assert_eq!(kinds[1], TriggerEventKind::Enter);
        assert_eq!(
            kinds[2],
            TriggerEventKind::Progress {
                progress: 0.5,
                pin_offset: 400.0
            }
        );
        assert_eq!(kinds[3], TriggerEventKind::Leave);
        assert_eq!(
            kinds[4],
            TriggerEventKind::Progress {
                progress: 1.0,
                pin_offset: 800.0
            }
        );
        assert_eq!(kinds[5], TriggerEventKind::EnterBack);
        assert_eq!(kinds[7], TriggerEventKind::LeaveBack);
        assert_eq!(
            kinds[8],
            TriggerEventKind::Progress {
                progress: 0.0,
                pin_offset: 0.0
            }
        );
    }

    #[test]
    fn refresh_picks_up_new_geometry() {
        let obs = observer();
        let height = Rc::new(Cell::new(500.0f32));
        let h = height.clone();
        let id = obs
            .register(
                RegionTrigger::pinned(
                    Box::new(move || Some(Rect::new(0.0, 0.0, 100.0, h.get()))),
                    "top top".parse().unwrap(),
                    PinEnd::HeightMultiple(2.0),
                ),
                |_| {},
            )
            .unwrap();
        obs.update(500.0);
        assert_eq!(obs.pin_state(id).unwrap().1, 0.5);
        height.set(1000.0);
        obs.refresh();
        assert_eq!(obs.pin_state(id).unwrap().1, 0.25);
    }

    #[test]
    fn callback_may_unregister_itself() {
        let obs = observer();
        let slot: Rc<Cell<Option<TriggerId>>> = Rc::new(Cell::new(None));
        let o = obs.clone();
        let s = slot.clone();
        let id = obs
            .register(
                RegionTrigger::one_shot(rect_at(1500.0, 10.0), TriggerLine::default()),
                move |_| {
                    if let Some(me) = s.get() {
                        o.unregister(me);
                    }
                },
            )
            .unwrap();
        slot.set(Some(id));
        obs.update(600.0);
        assert!(!obs.contains(id));
        assert!(obs.is_empty());
    }

    #[test]
    fn region_already_past_its_line_fires_on_register() {
        let obs = observer();
        obs.update(0.0);
        let fired = Rc::new(Cell::new(0));
        let f = fired.clone();
        // Line at 100 - 800 = -700: already crossed at scroll 0.
        let id = obs
            .register(
                RegionTrigger::one_shot(rect_at(100.0, 400.0), "top 80%".parse().unwrap()),
                move |ev| {
                    if ev.kind == TriggerEventKind::Enter {
                        f.set(f.get() + 1);
                    }
                },
            )
            .unwrap();
        assert_eq!(fired.get(), 1);
        assert_eq!(obs.one_shot_state(id), Some(OneShotState::Fired));
        obs.update(50.0);
        obs.refresh();
        assert_eq!(fired.get(), 1);
    }

    #[test]
    fn providers_may_read_the_observer() {
        let obs = observer();
        let o = obs.clone();
        let id = obs
            .register(
                RegionTrigger::pinned(
                    Box::new(move || Some(Rect::new(1000.0, 0.0, 100.0, o.viewport().height))),
                    "top top".parse().unwrap(),
                    PinEnd::HeightMultiple(1.0),
                ),
                |_| {},
            )
            .unwrap();
        obs.update(1500.0);
        obs.refresh();
        obs.set_viewport(Viewport {
            width: 1280.0,
            height: 500.0,
        });
        assert_eq!(obs.pin_state(id), Some((PinState::After, 1.0)));
    }
}
