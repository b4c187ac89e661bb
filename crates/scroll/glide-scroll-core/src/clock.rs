//! Frame Clock: one ticker per display frame with many subscribers.
//!
//! The clock is an instantiable service (tests drive a private instance with
//! synthetic timestamps); production hosts share one instance per thread via
//! [`FrameClock::global`].
//!
//! Subscribing and unsubscribing is allowed from inside a tick callback. The
//! subscriber list is moved out of the cell for the duration of a dispatch,
//! removals made during the dispatch are honoured immediately (a removed
//! subscriber later in the list is not called) and additions are merged
//! after the dispatch completes, so they first run on the next tick.

use std::cell::RefCell;
use std::rc::Rc;

use hashbrown::HashSet;
use log::{trace, warn};
use serde::{Deserialize, Serialize};

use crate::config::ClockConfig;
use crate::ids::SubscriberId;

/// Time information handed to every subscriber.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameTick {
    /// Clock time in seconds (sum of lag-adjusted deltas).
    pub time: f32,
    /// Seconds since the previous tick, after lag smoothing.
    pub dt: f32,
    pub frame: u64,
}

/// Returned by a subscriber to keep or drop its subscription.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Stop,
}

type TickFn = Box<dyn FnMut(&FrameTick) -> Flow>;

struct Subscriber {
    id: SubscriberId,
    callback: TickFn,
}

struct ClockState {
    cfg: ClockConfig,
    next_id: u32,
    subscribers: Vec<Subscriber>,
    /// Subscribed during the current dispatch.
    pending: Vec<Subscriber>,
    live: HashSet<SubscriberId>,
    dispatching: bool,
    last_raw: Option<f32>,
    time: f32,
    frame: u64,
}

impl ClockState {
    /// Lag-smoothed delta between the previous raw timestamp and `now`.
    fn smoothed_dt(&self, now: f32) -> f32 {
        let raw_dt = match self.last_raw {
            Some(last) => (now - last).max(0.0),
            None => 0.0,
        };
        if raw_dt > self.cfg.lag_threshold {
            self.cfg.lag_adjusted_dt
        } else {
            raw_dt
        }
    }
}

/// Cloneable handle; clones drive the same clock.
#[derive(Clone)]
pub struct FrameClock {
    inner: Rc<RefCell<ClockState>>,
}

impl std::fmt::Debug for FrameClock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let st = self.inner.borrow();
        f.debug_struct("FrameClock")
            .field("subscribers", &st.live.len())
            .field("time", &st.time)
            .field("frame", &st.frame)
            .finish()
    }
}

thread_local! {
    static GLOBAL_CLOCK: FrameClock = FrameClock::new(ClockConfig::default());
}

impl FrameClock {
    pub fn new(cfg: ClockConfig) -> Self {
        Self {
            inner: Rc::new(RefCell::new(ClockState {
                cfg,
                next_id: 0,
                subscribers: Vec::new(),
                pending: Vec::new(),
                live: HashSet::new(),
                dispatching: false,
                last_raw: None,
                time: 0.0,
                frame: 0,
            })),
        }
    }

    /// The thread's shared clock.
    pub fn global() -> Self {
        GLOBAL_CLOCK.with(|c| c.clone())
    }

    pub fn set_config(&self, cfg: ClockConfig) {
        self.inner.borrow_mut().cfg = cfg;
    }

    /// Register a per-frame callback.
    pub fn subscribe<F>(&self, callback: F) -> SubscriberId
    where
        F: FnMut(&FrameTick) -> Flow + 'static,
    {
        let mut st = self.inner.borrow_mut();
        let id = SubscriberId(st.next_id);
        st.next_id = st.next_id.wrapping_add(1);
        st.live.insert(id);
        let sub = Subscriber {
            id,
            callback: Box::new(callback),
        };
        if st.dispatching {
            st.pending.push(sub);
        } else {
            st.subscribers.push(sub);
        }
        trace!("clock: subscribe {:?}", id);
        id
    }

    /// Remove a subscription. Returns false if it was not registered.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        let removed = {
            let mut st = self.inner.borrow_mut();
            if !st.live.remove(&id) {
                return false;
            }
            if st.dispatching {
                // The dispatch loop drops it; pending entries can go now.
                st.pending
                    .iter()
                    .position(|s| s.id == id)
                    .map(|i| st.pending.remove(i))
            } else {
                st.subscribers
                    .iter()
                    .position(|s| s.id == id)
                    .map(|i| st.subscribers.remove(i))
            }
        };
        // Drop the callback outside the borrow: its captures may call back in.
        drop(removed);
        trace!("clock: unsubscribe {:?}", id);
        true
    }

    pub fn is_subscribed(&self, id: SubscriberId) -> bool {
        self.inner.borrow().live.contains(&id)
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.borrow().live.len()
    }

    pub fn time(&self) -> f32 {
        self.inner.borrow().time
    }

    pub fn frame(&self) -> u64 {
        self.inner.borrow().frame
    }

    /// Forget the previous raw timestamp so the next tick reports `dt = 0`.
    /// Used after the host was suspended (tab hidden, route change).
    pub fn resync(&self) {
        self.inner.borrow_mut().last_raw = None;
    }

    /// The `dt` the next `tick(now)` will report, without advancing.
    pub fn peek_dt(&self, now: f32) -> f32 {
        self.inner.borrow().smoothed_dt(now)
    }

    /// Advance to the host timestamp `now` (seconds) and run all subscribers.
    pub fn tick(&self, now: f32) -> FrameTick {
        let (tick, mut running) = {
            let mut st = self.inner.borrow_mut();
            if st.dispatching {
                warn!("clock: re-entrant tick ignored");
                return FrameTick {
                    time: st.time,
                    dt: 0.0,
                    frame: st.frame,
                };
            }
            let dt = st.smoothed_dt(now);
            st.last_raw = Some(now);
            st.time += dt;
            st.frame += 1;
            st.dispatching = true;
            let tick = FrameTick {
                time: st.time,
                dt,
                frame: st.frame,
            };
            (tick, std::mem::take(&mut st.subscribers))
        };

        for sub in running.iter_mut() {
            if !self.is_subscribed(sub.id) {
                continue;
            }
            if (sub.callback)(&tick) == Flow::Stop {
                self.inner.borrow_mut().live.remove(&sub.id);
            }
        }

        let dead: Vec<Subscriber> = {
            let mut st = self.inner.borrow_mut();
            st.dispatching = false;
            let pending = std::mem::take(&mut st.pending);
            let (keep, dead): (Vec<_>, Vec<_>) = running
                .into_iter()
                .chain(pending)
                .partition(|s| st.live.contains(&s.id));
            st.subscribers = keep;
            dead
        };
        drop(dead);
        tick
    }

    /// Advance by an explicit delta (seconds) from the previous timestamp.
    pub fn advance(&self, dt: f32) -> FrameTick {
        let base = self.inner.borrow().last_raw.unwrap_or(0.0);
        if self.inner.borrow().last_raw.is_none() {
            // Establish a baseline so the delta is not swallowed.
            self.inner.borrow_mut().last_raw = Some(base);
        }
        self.tick(base + dt.max(0.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn clock() -> FrameClock {
        FrameClock::new(ClockConfig::default())
    }

    #[test]
    fn first_tick_has_zero_dt() {
        let c = clock();
        let t = c.tick(10.0);
        assert_eq!(t.dt, 0.0);
        let t = c.tick(10.016);
        assert!((t.dt - 0.016).abs() < 1e-5);
        assert_eq!(t.frame, 2);
    }

    #[test]
    fn time_is_monotonic_even_if_host_time_goes_back() {
        let c = clock();
        c.tick(5.0);
        let before = c.time();
        let t = c.tick(4.0);
        assert_eq!(t.dt, 0.0);
        assert!(c.time() >= before);
    }

    #[test]
    fn lag_is_smoothed() {
        let c = clock();
        c.tick(0.0);
        let t = c.tick(3.0);
        assert!((t.dt - 1.0 / 30.0).abs() < 1e-6);
    }

    #[test]
    fn peek_matches_the_next_tick() {
        let c = clock();
        c.tick(1.0);
        let peeked = c.peek_dt(1.02);
        assert_eq!(c.tick(1.02).dt, peeked);
        assert_eq!(c.peek_dt(9.0), 1.0 / 30.0);
    }

    #[test]
    fn advance_uses_explicit_delta() {
        let c = clock();
        let t = c.advance(0.25);
        assert_eq!(t.dt, 0.25);
        let t = c.advance(0.25);
        assert_eq!(t.time, 0.5);
    }

    #[test]
    fn stop_removes_subscriber() {
        let c = clock();
        let calls = Rc::new(Cell::new(0));
        let k = calls.clone();
        c.subscribe(move |_| {
            k.set(k.get() + 1);
            Flow::Stop
        });
        c.advance(0.016);
        c.advance(0.016);
        assert_eq!(calls.get(), 1);
        assert_eq!(c.subscriber_count(), 0);
    }

    #[test]
    fn unsubscribe_from_inside_a_tick() {
        let c = clock();
        let calls = Rc::new(Cell::new(0));
        let victim_id = Rc::new(Cell::new(None));

        // First subscriber removes the second one mid-dispatch.
        let c2 = c.clone();
        let v = victim_id.clone();
        c.subscribe(move |_| {
            if let Some(id) = v.get() {
                c2.unsubscribe(id);
            }
            Flow::Continue
        });
        let k = calls.clone();
        let victim = c.subscribe(move |_| {
            k.set(k.get() + 1);
            Flow::Continue
        });
        victim_id.set(Some(victim));

        c.advance(0.016);
        assert_eq!(calls.get(), 0);
        assert_eq!(c.subscriber_count(), 1);
        assert!(!c.is_subscribed(victim));
    }

    #[test]
    fn subscribe_from_inside_a_tick_runs_next_frame() {
        let c = clock();
        let calls = Rc::new(Cell::new(0));
        let c2 = c.clone();
        let k = calls.clone();
        c.subscribe(move |_| {
            let k = k.clone();
            c2.subscribe(move |_| {
                k.set(k.get() + 1);
                Flow::Stop
            });
            Flow::Stop
        });
        c.advance(0.016);
        assert_eq!(calls.get(), 0);
        assert_eq!(c.subscriber_count(), 1);
        c.advance(0.016);
        assert_eq!(calls.get(), 1);
        assert_eq!(c.subscriber_count(), 0);
    }

    #[test]
    fn global_is_shared_per_thread() {
        let a = FrameClock::global();
        let b = FrameClock::global();
        let id = a.subscribe(|_| Flow::Continue);
        assert!(b.is_subscribed(id));
        assert!(b.unsubscribe(id));
    }
}
