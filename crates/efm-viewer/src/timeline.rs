//! Per-strip playback timeline.
//!
//! A timeline is one linear tween of the marquee offset from `0` to
//! `-content_width` over `duration_ms`. It only advances through [`tick`];
//! seeks and progress writes move the playhead without changing whether it
//! is playing.
//!
//! [`tick`]: StripTimeline::tick

use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimelineState {
    /// Built but never played.
    #[default]
    Created,
    Playing,
    Paused,
    /// Playhead reached the end.
    Completed,
}

/// Values a frame applies to the document.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimelineFrame {
    /// Percent in `[0, 100]`.
    pub progress: f64,
    pub current_time_ms: f64,
    /// Horizontal marquee offset in pixels, `<= 0`.
    pub translate_x: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StripTimeline {
    strip_id: String,
    state: TimelineState,
    duration_ms: f64,
    current_time_ms: f64,
    content_width: f64,
}

fn sanitize(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 { value } else { 0.0 }
}

impl StripTimeline {
    pub fn new(strip_id: impl Into<String>, duration_ms: f64, content_width: f64) -> Self {
        Self {
            strip_id: strip_id.into(),
            state: TimelineState::Created,
            duration_ms: sanitize(duration_ms),
            current_time_ms: 0.0,
            content_width: sanitize(content_width),
        }
    }

    pub fn strip_id(&self) -> &str {
        &self.strip_id
    }

    pub fn state(&self) -> TimelineState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state == TimelineState::Playing
    }

    pub fn duration_ms(&self) -> f64 {
        self.duration_ms
    }

    pub fn current_time_ms(&self) -> f64 {
        self.current_time_ms
    }

    pub fn content_width(&self) -> f64 {
        self.content_width
    }

    pub fn progress(&self) -> f64 {
        if self.duration_ms <= 0.0 {
            return if self.state == TimelineState::Completed { 100.0 } else { 0.0 };
        }
        (self.current_time_ms / self.duration_ms * 100.0).clamp(0.0, 100.0)
    }

    pub fn frame(&self) -> TimelineFrame {
        let progress = self.progress();
        let offset = -progress / 100.0 * self.content_width;
        TimelineFrame {
            progress,
            current_time_ms: self.current_time_ms,
            // Keep `translateX(0px)` rather than `-0px`.
            translate_x: if offset == 0.0 { 0.0 } else { offset },
        }
    }

    /// Starts or resumes. Returns false when already playing.
    pub fn play(&mut self) -> bool {
        match self.state {
            TimelineState::Playing => false,
            TimelineState::Completed => {
                self.current_time_ms = 0.0;
                self.state = TimelineState::Playing;
                true
            }
            TimelineState::Created | TimelineState::Paused => {
                self.state = TimelineState::Playing;
                true
            }
        }
    }

    /// Returns false unless the timeline was playing.
    pub fn pause(&mut self) -> bool {
        if self.state == TimelineState::Playing {
            self.state = TimelineState::Paused;
            true
        } else {
            false
        }
    }

    /// Moves the playhead to `time_ms`, clamped to the duration.
    pub fn seek(&mut self, time_ms: f64) {
        let time = if time_ms.is_finite() { time_ms } else { 0.0 };
        self.current_time_ms = time.clamp(0.0, self.duration_ms);
        if self.state == TimelineState::Completed && self.current_time_ms < self.duration_ms {
            self.state = TimelineState::Paused;
        }
    }

    pub fn set_progress(&mut self, progress: f64) {
        let progress = if progress.is_finite() { progress.clamp(0.0, 100.0) } else { 0.0 };
        self.seek(progress / 100.0 * self.duration_ms);
    }

    /// Advances a playing timeline by `delta_ms`.
    pub fn tick(&mut self, delta_ms: f64) -> Option<TimelineFrame> {
        if self.state != TimelineState::Playing {
            return None;
        }
        let delta = sanitize(delta_ms);
        self.current_time_ms = (self.current_time_ms + delta).min(self.duration_ms);
        if self.current_time_ms >= self.duration_ms {
            self.state = TimelineState::Completed;
            debug!(strip = %self.strip_id, "timeline completed");
        }
        Some(self.frame())
    }

    /// New duration and content width, keeping the relative position.
    pub fn rebuild(&mut self, duration_ms: f64, content_width: f64) {
        let progress = self.progress();
        self.duration_ms = sanitize(duration_ms);
        self.content_width = sanitize(content_width);
        self.current_time_ms = progress / 100.0 * self.duration_ms;
        debug!(
            strip = %self.strip_id,
            duration_ms = self.duration_ms,
            content_width = self.content_width,
            "timeline metrics rebuilt"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timeline() -> StripTimeline {
        StripTimeline::new("a", 120_000.0, 2_000.0)
    }

    #[test]
    fn test_play_and_pause_are_idempotent() {
        let mut timeline = timeline();
        assert!(!timeline.pause());
        assert!(timeline.play());
        assert!(!timeline.play());
        assert!(timeline.pause());
        assert!(!timeline.pause());
        assert_eq!(timeline.state(), TimelineState::Paused);
    }

    #[test]
    fn test_ticks_advance_monotonically_to_duration() {
        let mut timeline = timeline();
        assert!(timeline.tick(16.0).is_none());
        timeline.play();
        let mut last = 0.0;
        for _ in 0..200 {
            if let Some(frame) = timeline.tick(1_000.0) {
                assert!(frame.progress >= last);
                last = frame.progress;
            }
        }
        assert_eq!(timeline.current_time_ms(), 120_000.0);
        assert_eq!(timeline.state(), TimelineState::Completed);
        assert_eq!(timeline.frame().translate_x, -2_000.0);
        // Negative deltas never move the playhead back.
        timeline.play();
        timeline.tick(500.0);
        timeline.tick(-400.0);
        assert_eq!(timeline.current_time_ms(), 500.0);
    }

    #[test]
    fn test_seek_clamps_and_keeps_play_status() {
        let mut timeline = timeline();
        timeline.seek(60_000.0);
        assert_eq!(timeline.current_time_ms(), 60_000.0);
        assert_eq!(timeline.progress(), 50.0);
        assert_eq!(timeline.state(), TimelineState::Created);

        timeline.play();
        timeline.seek(500_000.0);
        assert_eq!(timeline.current_time_ms(), 120_000.0);
        assert!(timeline.is_playing());
        timeline.seek(-5.0);
        assert_eq!(timeline.current_time_ms(), 0.0);
        assert!(timeline.is_playing());
    }

    #[test]
    fn test_completed_restarts_on_play_and_pauses_on_seek() {
        let mut timeline = timeline();
        timeline.play();
        timeline.tick(200_000.0);
        assert_eq!(timeline.state(), TimelineState::Completed);
        timeline.seek(30_000.0);
        assert_eq!(timeline.state(), TimelineState::Paused);

        timeline.tick(0.0);
        timeline.play();
        timeline.tick(200_000.0);
        assert!(timeline.play());
        assert_eq!(timeline.current_time_ms(), 0.0);
    }

    #[test]
    fn test_rebuild_preserves_progress() {
        let mut timeline = timeline();
        timeline.set_progress(25.0);
        timeline.rebuild(60_000.0, 4_000.0);
        assert_eq!(timeline.current_time_ms(), 15_000.0);
        assert_eq!(timeline.frame().translate_x, -1_000.0);
    }

    #[test]
    fn test_zero_duration_completes_on_first_tick() {
        let mut timeline = StripTimeline::new("z", 0.0, 100.0);
        assert_eq!(timeline.progress(), 0.0);
        assert_eq!(timeline.frame().translate_x, 0.0);
        timeline.play();
        let frame = timeline.tick(16.0).unwrap();
        assert_eq!(frame.progress, 100.0);
        assert_eq!(timeline.state(), TimelineState::Completed);
    }
}
