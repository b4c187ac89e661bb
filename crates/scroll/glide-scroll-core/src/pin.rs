//! Pin-Scrub Sequencer.
//!
//! A `PinSequence` maps scroll progress through a pinned range onto a
//! timeline. Seeking is a pure function of progress: the same progress always
//! produces the same style state, whichever direction it was reached from.
//! Optional media attached to the section is paused whenever the range is
//! left and may only be played once progress passes `reveal_at`.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use hashbrown::HashMap;
use log::{debug, trace};

use crate::error::GlideError;
use crate::ids::{SequenceId, TimelineId, TriggerId};
use crate::media::MediaController;
use crate::observer::{RegionTrigger, ScrollObserver, TriggerEvent, TriggerEventKind, TriggerMode};
use crate::outputs::{MediaCommand, MotionEvent};
use crate::style::{StyleProp, Target};
use crate::surface::Surface;
use crate::timeline::{AnimationStep, Position, Timeline};

#[derive(Clone, Debug, PartialEq)]
pub struct MediaGate {
    pub target: Target,
    /// Progress at which the media counts as fully revealed.
    pub reveal_at: f32,
    pub controller: MediaController,
}

#[derive(Clone, Debug)]
pub struct PinSequence {
    id: SequenceId,
    timeline: Timeline,
    /// Timeline seconds that correspond to progress 1.
    span: f32,
    pin_target: Option<Target>,
    media: Option<MediaGate>,
    progress: f32,
}

impl PinSequence {
    /// Scrub an existing timeline: progress `p` maps to `p * duration`.
    pub fn from_timeline(id: SequenceId, timeline: Timeline) -> Result<Self, GlideError> {
        if timeline.is_empty() {
            return Err(GlideError::MissingTarget(format!(
                "pin sequence {:?} has no steps",
                id
            )));
        }
        let span = timeline.duration();
        Ok(Self {
            id,
            timeline,
            span,
            pin_target: None,
            media: None,
            progress: 0.0,
        })
    }

    /// Build from steps with explicit progress ranges `[p0, p1]`.
    ///
    /// A staggered step fits its whole cascade into the range: the last
    /// target finishes at `p1`. A stagger wider than the range is shrunk so
    /// the targets start evenly across it.
    pub fn from_ranges(
        id: SequenceId,
        steps: Vec<(AnimationStep, f32, f32)>,
    ) -> Result<Self, GlideError> {
        let mut timeline = Timeline::new(TimelineId(id.0));
        for (mut step, p0, p1) in steps {
            let p0 = p0.clamp(0.0, 1.0);
            let p1 = p1.clamp(p0, 1.0);
            let width = p1 - p0;
            let lags = step.targets.len().saturating_sub(1) as f32;
            if step.stagger * lags > width {
                step.stagger = width / lags;
            }
            step.duration = (width - step.stagger * lags).max(0.0);
            timeline.add(step, Position::Absolute(p0))?;
        }
        let mut seq = Self::from_timeline(id, timeline)?;
        seq.span = seq.span.max(1.0);
        Ok(seq)
    }

    /// Element that receives the pin offset as `y`.
    pub fn pin(mut self, target: Target) -> Self {
        self.pin_target = Some(target);
        self
    }

    pub fn media(mut self, target: Target, reveal_at: f32) -> Self {
        self.media = Some(MediaGate {
            target,
            reveal_at: reveal_at.clamp(0.0, 1.0),
            controller: MediaController::new(),
        });
        self
    }

    pub fn id(&self) -> SequenceId {
        self.id
    }

    pub fn progress(&self) -> f32 {
        self.progress
    }

    pub fn media_gate(&self) -> Option<&MediaGate> {
        self.media.as_ref()
    }

    pub fn media_gate_mut(&mut self) -> Option<&mut MediaGate> {
        self.media.as_mut()
    }

    /// Progress sub-range of every step.
    pub fn ranges(&self) -> Vec<(f32, f32)> {
        let span = self.span;
        self.timeline
            .step_ranges()
            .into_iter()
            .map(|(a, b)| {
                if span > 0.0 {
                    (a / span, b / span)
                } else {
                    (0.0, 1.0)
                }
            })
            .collect()
    }

    fn time_for(&self, progress: f32) -> f32 {
        let p = if progress.is_finite() {
            progress.clamp(0.0, 1.0)
        } else {
            0.0
        };
        p * self.span
    }

    /// Style state implied by `progress`, without writing it.
    pub fn evaluate(&mut self, progress: f32, surface: &Surface) -> Vec<(Target, StyleProp, f32)> {
        let t = self.time_for(progress);
        self.timeline.evaluate_at(t, surface)
    }

    /// Set every mapped step to the state implied by `progress`.
    pub fn seek(&mut self, progress: f32, surface: &Surface) {
        let t = self.time_for(progress);
        self.progress = if self.span > 0.0 { t / self.span } else { 0.0 };
        self.timeline.render_at(t, surface);
    }

    /// Apply one observer event.
    pub fn on_event(&mut self, ev: &TriggerEvent, surface: &Surface) {
        match ev.kind {
            TriggerEventKind::Progress {
                progress,
                pin_offset,
            } => {
                self.seek(progress, surface);
                if let Some(target) = &self.pin_target {
                    surface.write(target, StyleProp::Y, pin_offset);
                }
                surface.emit(MotionEvent::SequenceProgress {
                    sequence: self.id,
                    progress: self.progress,
                });
            }
            TriggerEventKind::Leave | TriggerEventKind::LeaveBack => {
                surface.emit(if ev.kind == TriggerEventKind::Leave {
                    MotionEvent::TriggerLeave {
                        trigger: ev.trigger,
                    }
                } else {
                    MotionEvent::TriggerLeaveBack {
                        trigger: ev.trigger,
                    }
                });
                if let Some(gate) = self.media.as_mut() {
                    let command = gate.controller.pause();
                    surface.emit(MotionEvent::Media {
                        target: gate.target.clone(),
                        command,
                    });
                }
            }
            TriggerEventKind::Enter => surface.emit(MotionEvent::TriggerEnter {
                trigger: ev.trigger,
            }),
            TriggerEventKind::EnterBack => surface.emit(MotionEvent::TriggerEnterBack {
                trigger: ev.trigger,
            }),
        }
    }

    /// User asked to play the media. Only honoured once fully revealed.
    pub fn request_play(&mut self, surface: &Surface) -> Option<MediaCommand> {
        let progress = self.progress;
        let gate = self.media.as_mut()?;
        if progress < gate.reveal_at {
            trace!("pin {:?}: play refused at progress {}", self.id, progress);
            return None;
        }
        let command = gate.controller.play();
        surface.emit(MotionEvent::Media {
            target: gate.target.clone(),
            command,
        });
        Some(command)
    }
}

struct PinSlot {
    sequence: Rc<RefCell<PinSequence>>,
    trigger: TriggerId,
    alive: Rc<Cell<bool>>,
}

/// Live pin sequences, each bound to one pinned trigger.
#[derive(Clone)]
pub struct Pins {
    observer: ScrollObserver,
    surface: Surface,
    slots: Rc<RefCell<HashMap<SequenceId, PinSlot>>>,
}

impl fmt::Debug for Pins {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pins")
            .field("sequences", &self.slots.borrow().len())
            .finish()
    }
}

impl Pins {
    pub fn new(observer: ScrollObserver, surface: Surface) -> Self {
        Self {
            observer,
            surface,
            slots: Rc::new(RefCell::new(HashMap::new())),
        }
    }

    /// Bind a sequence to a pinned trigger. Renders progress 0 immediately.
    pub fn attach(&self, mut sequence: PinSequence, trigger: RegionTrigger) -> Result<SequenceId, GlideError> {
        if !matches!(trigger.mode, TriggerMode::Pinned { .. }) {
            return Err(GlideError::InvalidConfig(
                "pin sequences need a pinned trigger".into(),
            ));
        }
        let id = sequence.id;
        sequence.seek(0.0, &self.surface);
        let sequence = Rc::new(RefCell::new(sequence));
        let alive = Rc::new(Cell::new(true));
        let cb_seq = Rc::downgrade(&sequence);
        let cb_alive = alive.clone();
        let surface = self.surface.clone();
        let trigger = self.observer.register(trigger, move |ev| {
            if !cb_alive.get() {
                return;
            }
            if let Some(seq) = cb_seq.upgrade() {
                seq.borrow_mut().on_event(ev, &surface);
            }
        })?;
        debug!("pin {:?}: attached to {:?}", id, trigger);
        self.slots.borrow_mut().insert(
            id,
            PinSlot {
                sequence,
                trigger,
                alive,
            },
        );
        Ok(id)
    }

    pub fn detach(&self, id: SequenceId) -> bool {
        let Some(slot) = self.slots.borrow_mut().remove(&id) else {
            return false;
        };
        slot.alive.set(false);
        self.observer.unregister(slot.trigger);
        debug!("pin {:?}: detached", id);
        true
    }

    pub fn progress(&self, id: SequenceId) -> Option<f32> {
        let slots = self.slots.borrow();
        let p = slots.get(&id)?.sequence.borrow().progress();
        Some(p)
    }

    pub fn trigger_of(&self, id: SequenceId) -> Option<TriggerId> {
        self.slots.borrow().get(&id).map(|s| s.trigger)
    }

    pub fn media(&self, id: SequenceId) -> Option<MediaController> {
        let slots = self.slots.borrow();
        let seq = slots.get(&id)?.sequence.borrow();
        seq.media_gate().map(|g| g.controller.clone())
    }

    /// Update the attached media controller (duration, time, rate).
    pub fn with_media<R>(&self, id: SequenceId, f: impl FnOnce(&mut MediaController) -> R) -> Option<R> {
        let seq = self.slots.borrow().get(&id)?.sequence.clone();
        let mut seq = seq.borrow_mut();
        seq.media_gate_mut().map(|g| f(&mut g.controller))
    }

    pub fn request_play(&self, id: SequenceId) -> Result<Option<MediaCommand>, GlideError> {
        let seq = self
            .slots
            .borrow()
            .get(&id)
            .map(|s| s.sequence.clone())
            .ok_or_else(|| GlideError::MissingTarget(format!("pin sequence {:?}", id)))?;
        let command = seq.borrow_mut().request_play(&self.surface);
        Ok(command)
    }

    pub fn len(&self) -> usize {
        self.slots.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.borrow().is_empty()
    }
}
