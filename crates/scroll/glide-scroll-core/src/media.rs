//! Playback state for a custom video control bar.

use serde::{Deserialize, Serialize};

use crate::outputs::MediaCommand;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MediaController {
    /// Seconds; 0 until metadata is known.
    pub duration: f32,
    pub current_time: f32,
    pub playback_rate: f32,
    pub playing: bool,
}

impl Default for MediaController {
    fn default() -> Self {
        Self {
            duration: 0.0,
            current_time: 0.0,
            playback_rate: 1.0,
            playing: false,
        }
    }
}

impl MediaController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Metadata arrived.
    pub fn set_duration(&mut self, duration: f32) {
        self.duration = if duration.is_finite() { duration.max(0.0) } else { 0.0 };
        self.current_time = self.current_time.clamp(0.0, self.duration);
    }

    /// Host reported the element's playback position.
    pub fn time_update(&mut self, time: f32) {
        if time.is_finite() {
            self.current_time = time.clamp(0.0, self.duration);
        }
    }

    /// Flip play/pause; returns the command for the media element.
    pub fn toggle(&mut self) -> MediaCommand {
        self.playing = !self.playing;
        if self.playing {
            MediaCommand::Play
        } else {
            MediaCommand::Pause
        }
    }

    pub fn play(&mut self) -> MediaCommand {
        self.playing = true;
        MediaCommand::Play
    }

    pub fn pause(&mut self) -> MediaCommand {
        self.playing = false;
        MediaCommand::Pause
    }

    pub fn set_rate(&mut self, rate: f32) {
        if rate.is_finite() && rate > 0.0 {
            self.playback_rate = rate;
        }
    }

    /// Seek to where the progress bar was clicked. Returns the new time.
    pub fn seek_from_click(&mut self, click_x: f32, bar_left: f32, bar_width: f32) -> f32 {
        if bar_width > 0.0 && click_x.is_finite() {
            let ratio = ((click_x - bar_left) / bar_width).clamp(0.0, 1.0);
            self.current_time = ratio * self.duration;
        }
        self.current_time
    }

    pub fn progress_ratio(&self) -> f32 {
        if self.duration > 0.0 {
            (self.current_time / self.duration).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }
}

/// `m:ss`, with `0:00` for zero, negative or non-finite input.
pub fn format_time(seconds: f32) -> String {
    if !seconds.is_finite() || seconds <= 0.0 {
        return "0:00".to_string();
    }
    let total = seconds.floor() as u64;
    format!("{}:{:02}", total / 60, total % 60)
}
