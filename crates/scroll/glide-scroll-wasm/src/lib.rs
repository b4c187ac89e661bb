use std::collections::HashMap;

use js_sys::Function;
use serde::Deserialize;
use serde_wasm_bindgen as swb;
use wasm_bindgen::prelude::*;

use glide_scroll_core::{
    format_time as core_format_time, AnimationStep, Config, Engine, HeadingId, HighlightSet, Mount,
    Outputs, PinEnd, PinSequence, PointerInput, Position, Rect, RegionTrigger, SequenceId,
    Target, TrackId, TrackSpec, TriggerLine, Viewport,
};

#[wasm_bindgen]
pub struct GlideScroll {
    core: Engine,
    mounts: HashMap<u32, Mount>,
    next_mount: u32,
}

fn jsvalue_is_undefined_or_null(v: &JsValue) -> bool {
    v.is_undefined() || v.is_null()
}

/// Wraps a JS callback `() -> {top, left, width, height} | null` that
/// measures an element in document space.
struct JsBounds {
    f: Function,
}

impl JsBounds {
    fn measure(&self) -> Option<Rect> {
        match self.f.call0(&JsValue::UNDEFINED) {
            Ok(val) if !jsvalue_is_undefined_or_null(&val) => swb::from_value::<Rect>(val).ok(),
            _ => None,
        }
    }

    fn into_provider(self) -> Box<dyn Fn() -> Option<Rect>> {
        Box::new(move || self.measure())
    }
}

/// One timeline step as sent by the host. With `heading` set, the step
/// targets every unit of that fragmented heading.
#[derive(Deserialize)]
struct HostStep {
    #[serde(default)]
    position: Position,
    #[serde(default)]
    heading: Option<u32>,
    step: AnimationStep,
}

#[derive(Deserialize)]
struct HostRangedStep {
    range: (f32, f32),
    step: AnimationStep,
}

fn parse_line(start: &str) -> Result<TriggerLine, JsError> {
    start
        .parse()
        .map_err(|e| JsError::new(&format!("trigger line error: {e}")))
}

impl GlideScroll {
    fn mount_mut(&mut self, mount: u32) -> Result<&mut Mount, JsError> {
        self.mounts
            .get_mut(&mount)
            .ok_or_else(|| JsError::new(&format!("unknown mount {mount}")))
    }
}

#[wasm_bindgen]
impl GlideScroll {
    /// Create a new engine. Pass a JSON config object or undefined/null for defaults.
    /// Example:
    ///   new GlideScroll({ smooth_scroll: { lerp: 0.08 } })
    #[wasm_bindgen(constructor)]
    pub fn new(config: JsValue) -> Result<GlideScroll, JsError> {
        console_error_panic_hook::set_once();

        let cfg: Config = if jsvalue_is_undefined_or_null(&config) {
            Config::default()
        } else {
            swb::from_value(config).map_err(|e| JsError::new(&format!("config error: {e}")))?
        };
        cfg.validate()
            .map_err(|e| JsError::new(&format!("config error: {e}")))?;

        Ok(GlideScroll {
            core: Engine::new(cfg),
            mounts: HashMap::new(),
            next_mount: 0,
        })
    }

    /// Run one display frame at `now` (seconds, e.g. `performance.now() / 1000`).
    /// Returns Outputs JSON.
    #[wasm_bindgen]
    pub fn frame(&mut self, now: f32) -> Result<JsValue, JsError> {
        let out: &Outputs = self.core.frame(now);
        swb::to_value(out).map_err(|e| JsError::new(&format!("outputs error: {e}")))
    }

    /// Outputs produced outside a frame (mount initial states, pointer moves).
    #[wasm_bindgen(js_name = take_outputs)]
    pub fn take_outputs(&mut self) -> Result<JsValue, JsError> {
        let out = self.core.take_outputs();
        swb::to_value(&out).map_err(|e| JsError::new(&format!("outputs error: {e}")))
    }

    #[wasm_bindgen]
    pub fn wheel(&mut self, delta: f32) {
        self.core.wheel(delta);
    }

    #[wasm_bindgen(js_name = touch_scroll)]
    pub fn touch_scroll(&mut self, delta: f32) {
        self.core.touch_scroll(delta);
    }

    #[wasm_bindgen(js_name = native_scroll)]
    pub fn native_scroll(&mut self, position: f32) {
        self.core.native_scroll(position);
    }

    #[wasm_bindgen]
    pub fn scroll(&self) -> f32 {
        self.core.scroll()
    }

    #[wasm_bindgen]
    pub fn resize(&mut self, width: f32, height: f32, content_height: f32) {
        self.core.resize(Viewport { width, height }, content_height);
    }

    #[wasm_bindgen]
    pub fn refresh(&self) {
        self.core.refresh();
    }

    #[wasm_bindgen(js_name = route_change)]
    pub fn route_change(&mut self) {
        self.core.route_change();
    }

    /// Pointer/touch down over a track. `input` is `{ x, y, button?, source? }`.
    /// Returns `{ prevent_default, action }`.
    #[wasm_bindgen(js_name = pointer_down)]
    pub fn pointer_down(&mut self, track: u32, input: JsValue) -> Result<JsValue, JsError> {
        let input: PointerInput =
            swb::from_value(input).map_err(|e| JsError::new(&format!("pointer error: {e}")))?;
        let r = self.core.pointer_down(TrackId(track), input);
        swb::to_value(&r).map_err(|e| JsError::new(&format!("drag response error: {e}")))
    }

    #[wasm_bindgen(js_name = pointer_move)]
    pub fn pointer_move(&mut self, input: JsValue) -> Result<JsValue, JsError> {
        let input: PointerInput =
            swb::from_value(input).map_err(|e| JsError::new(&format!("pointer error: {e}")))?;
        let r = self.core.pointer_move(input);
        swb::to_value(&r).map_err(|e| JsError::new(&format!("drag response error: {e}")))
    }

    #[wasm_bindgen(js_name = pointer_up)]
    pub fn pointer_up(&mut self) -> Result<JsValue, JsError> {
        let r = self.core.pointer_up();
        swb::to_value(&r).map_err(|e| JsError::new(&format!("drag response error: {e}")))
    }

    /// Open a registration scope for one component. Returns a mount handle.
    #[wasm_bindgen]
    pub fn mount(&mut self) -> u32 {
        let id = self.next_mount;
        self.next_mount = self.next_mount.wrapping_add(1);
        self.mounts.insert(id, self.core.mount());
        id
    }

    /// Release everything the mount registered. Returns false if unknown.
    #[wasm_bindgen]
    pub fn unmount(&mut self, mount: u32) -> bool {
        match self.mounts.remove(&mount) {
            Some(mut m) => {
                m.unmount();
                true
            }
            None => false,
        }
    }

    /// Fragment a heading into per-character units. `highlights` is
    /// `{ words, case_insensitive?, keep? }` or undefined. Returns a heading id.
    #[wasm_bindgen(js_name = fragment_heading)]
    pub fn fragment_heading(
        &mut self,
        mount: u32,
        key: String,
        text: String,
        highlights: JsValue,
    ) -> Result<u32, JsError> {
        let set: HighlightSet = if jsvalue_is_undefined_or_null(&highlights) {
            HighlightSet::default()
        } else {
            swb::from_value(highlights)
                .map_err(|e| JsError::new(&format!("highlights error: {e}")))?
        };
        let m = self.mount_mut(mount)?;
        Ok(m.fragment_heading(&key, &text, &set).0)
    }

    /// The fragment structure (word groups and separators) of a heading.
    #[wasm_bindgen]
    pub fn heading(&self, id: u32) -> Result<JsValue, JsError> {
        let h = self
            .core
            .heading(HeadingId(id))
            .ok_or_else(|| JsError::new(&format!("unknown heading {id}")))?;
        swb::to_value(&h).map_err(|e| JsError::new(&format!("heading error: {e}")))
    }

    /// Build a timeline from `[{ position?, heading?, step }]`. With a
    /// `gate_bounds` callback it waits for that region to cross `gate_start`
    /// (default `"top 80%"`). Returns the timeline id or undefined if a step
    /// had no targets or the gate region is missing.
    #[wasm_bindgen(js_name = add_timeline)]
    pub fn add_timeline(
        &mut self,
        mount: u32,
        steps: JsValue,
        gate_bounds: Option<Function>,
        gate_start: Option<String>,
    ) -> Result<Option<u32>, JsError> {
        let steps: Vec<HostStep> =
            swb::from_value(steps).map_err(|e| JsError::new(&format!("steps error: {e}")))?;
        let gate = match gate_bounds {
            Some(f) => Some(RegionTrigger::one_shot(
                JsBounds { f }.into_provider(),
                parse_line(gate_start.as_deref().unwrap_or("top 80%"))?,
            )),
            None => None,
        };
        let m = self.mount_mut(mount)?;
        let resolved: Vec<(Position, AnimationStep)> = steps
            .into_iter()
            .map(|s| {
                let mut step = s.step;
                if let Some(h) = s.heading {
                    step.targets = m.unit_targets(HeadingId(h));
                }
                (s.position, step)
            })
            .collect();
        let id = m.timeline(gate, |tl| {
            for (position, step) in resolved {
                tl.add(step, position)?;
            }
            Ok(())
        });
        Ok(id.map(|t| t.0))
    }

    /// Register a looping track from a TrackSpec JSON. Returns a track id.
    #[wasm_bindgen(js_name = add_track)]
    pub fn add_track(&mut self, mount: u32, spec: JsValue) -> Result<u32, JsError> {
        let spec: TrackSpec =
            swb::from_value(spec).map_err(|e| JsError::new(&format!("track spec error: {e}")))?;
        let m = self.mount_mut(mount)?;
        Ok(m.track(spec).0)
    }

    /// An image or video in the track loaded (or failed). True once none are pending.
    #[wasm_bindgen(js_name = media_ready)]
    pub fn media_ready(&self, track: u32) -> Result<bool, JsError> {
        self.core
            .marquee()
            .media_ready(TrackId(track))
            .map_err(|e| JsError::new(&format!("{e}")))
    }

    /// Report the strip's full extent. Returns the wrap distance.
    #[wasm_bindgen]
    pub fn measure(&self, track: u32, extent: f32) -> Result<f32, JsError> {
        self.core
            .marquee()
            .measure(TrackId(track), extent)
            .map_err(|e| JsError::new(&format!("{e}")))
    }

    /// Track state (`offset`, `direction`, `phase`, ...) as JSON.
    #[wasm_bindgen]
    pub fn track(&self, track: u32) -> Result<JsValue, JsError> {
        let t = self
            .core
            .marquee()
            .track(TrackId(track))
            .ok_or_else(|| JsError::new(&format!("unknown track {track}")))?;
        swb::to_value(&t).map_err(|e| JsError::new(&format!("track error: {e}")))
    }

    /// Bind `[{ range: [p0, p1], step }]` to a pinned region that stays pinned
    /// for `end_height_multiple` of its own height.
    #[allow(clippy::too_many_arguments)]
    #[wasm_bindgen(js_name = add_pin_sequence)]
    pub fn add_pin_sequence(
        &mut self,
        mount: u32,
        steps: JsValue,
        bounds: Function,
        start: String,
        end_height_multiple: f32,
        pin_target: Option<String>,
        media_target: Option<String>,
        reveal_at: Option<f32>,
    ) -> Result<Option<u32>, JsError> {
        let steps: Vec<HostRangedStep> =
            swb::from_value(steps).map_err(|e| JsError::new(&format!("steps error: {e}")))?;
        let trigger = RegionTrigger::pinned(
            JsBounds { f: bounds }.into_provider(),
            parse_line(&start)?,
            PinEnd::HeightMultiple(end_height_multiple),
        );
        let m = self.mount_mut(mount)?;
        let id = m.pin_sequence(trigger, move |id| {
            let mut seq = PinSequence::from_ranges(
                id,
                steps
                    .into_iter()
                    .map(|s| (s.step, s.range.0, s.range.1))
                    .collect(),
            )?;
            if let Some(key) = pin_target {
                seq = seq.pin(Target::element(key));
            }
            if let Some(key) = media_target {
                seq = seq.media(Target::element(key), reveal_at.unwrap_or(1.0));
            }
            Ok(seq)
        });
        Ok(id.map(|s| s.0))
    }

    /// User pressed play on the pinned section's video. Returns "play" when
    /// allowed, undefined while the video is not fully revealed.
    #[wasm_bindgen(js_name = request_play)]
    pub fn request_play(&self, sequence: u32) -> Result<Option<String>, JsError> {
        let cmd = self
            .core
            .pins()
            .request_play(SequenceId(sequence))
            .map_err(|e| JsError::new(&format!("{e}")))?;
        Ok(cmd.map(|_| "play".to_string()))
    }

    /// Video metadata and time updates for the pinned section's controls.
    #[wasm_bindgen(js_name = media_time)]
    pub fn media_time(&self, sequence: u32, duration: f32, current_time: f32) -> Option<f32> {
        self.core.pins().with_media(SequenceId(sequence), |m| {
            m.set_duration(duration);
            m.time_update(current_time);
            m.progress_ratio()
        })
    }

    /// Click on the progress bar. Returns the time to seek the video to.
    #[wasm_bindgen(js_name = media_seek_click)]
    pub fn media_seek_click(&self, sequence: u32, click_x: f32, bar_left: f32, bar_width: f32) -> Option<f32> {
        self.core
            .pins()
            .with_media(SequenceId(sequence), |m| m.seek_from_click(click_x, bar_left, bar_width))
    }
}

/// `m:ss` for a media time in seconds.
#[wasm_bindgen(js_name = format_time)]
pub fn format_time(seconds: f32) -> String {
    core_format_time(seconds)
}

/// Numeric ABI version for compatibility checks at init.
#[wasm_bindgen]
pub fn abi_version() -> u32 {
    1
}
