//! Reconciles the three sources that move the playhead: animation ticks,
//! seek-bar input and drag gestures.
//!
//! Only ticks advance time on their own. Seek-bar, skip and drag input pause
//! the timeline first, and the most recent input of a frame wins over that
//! frame's tick.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::registry::TimelineRegistry;
use crate::timeline::{StripTimeline, TimelineFrame};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeekSource {
    Tick,
    SeekBar,
    Skip,
    Gesture,
}

#[derive(Debug, Default)]
pub struct SeekCoordinator {
    last_source: Option<SeekSource>,
    input_this_frame: bool,
}

impl SeekCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_source(&self) -> Option<SeekSource> {
        self.last_source
    }

    pub fn has_input_this_frame(&self) -> bool {
        self.input_this_frame
    }

    fn user_input(&mut self, source: SeekSource, timeline: &StripTimeline) -> TimelineFrame {
        self.last_source = Some(source);
        self.input_this_frame = true;
        let frame = timeline.frame();
        debug!(
            ?source,
            strip = timeline.strip_id(),
            progress = frame.progress,
            current_time_ms = frame.current_time_ms,
            "playhead moved by input"
        );
        frame
    }

    /// Seek bar `input`/`change`: `value` is a percentage.
    pub fn seek_bar(&mut self, timeline: &mut StripTimeline, value: f64) -> TimelineFrame {
        timeline.pause();
        let value = if value.is_finite() { value.clamp(0.0, 100.0) } else { 0.0 };
        timeline.seek(timeline.duration_ms() * value / 100.0);
        self.user_input(SeekSource::SeekBar, timeline)
    }

    /// Skip buttons: moves by `offset_ms`, clamped to the strip.
    pub fn skip(&mut self, timeline: &mut StripTimeline, offset_ms: f64) -> TimelineFrame {
        timeline.pause();
        timeline.seek(timeline.current_time_ms() + offset_ms);
        self.user_input(SeekSource::Skip, timeline)
    }

    /// Drag gesture at horizontal offset `drag_x`.
    pub fn gesture(&mut self, timeline: &mut StripTimeline, drag_x: f64) -> TimelineFrame {
        timeline.pause();
        let width = timeline.content_width();
        let progress = if width > 0.0 && drag_x.is_finite() {
            ((-drag_x / width).abs() * 100.0).clamp(0.0, 100.0)
        } else {
            timeline.progress()
        };
        timeline.set_progress(progress);
        self.user_input(SeekSource::Gesture, timeline)
    }

    /// Animation-frame tick. Skipped when input already moved the playhead
    /// this frame.
    pub fn tick(&mut self, registry: &mut TimelineRegistry, delta_ms: f64) -> Option<TimelineFrame> {
        if std::mem::take(&mut self.input_this_frame) {
            return None;
        }
        let frame = registry.tick(delta_ms)?;
        self.last_source = Some(SeekSource::Tick);
        Some(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeline::TimelineState;

    fn timeline() -> StripTimeline {
        StripTimeline::new("a", 120_000.0, 1_000.0)
    }

    #[test]
    fn test_seek_bar_pauses_and_seeks() {
        let mut coordinator = SeekCoordinator::new();
        let mut timeline = timeline();
        timeline.play();
        let frame = coordinator.seek_bar(&mut timeline, 50.0);
        assert_eq!(frame.current_time_ms, 60_000.0);
        assert_eq!(frame.translate_x, -500.0);
        assert_eq!(timeline.state(), TimelineState::Paused);
        assert_eq!(coordinator.last_source(), Some(SeekSource::SeekBar));
    }

    #[test]
    fn test_gesture_maps_offset_to_progress() {
        let mut coordinator = SeekCoordinator::new();
        let mut timeline = timeline();
        let frame = coordinator.gesture(&mut timeline, -250.0);
        assert_eq!(frame.progress, 25.0);
        assert_eq!(frame.current_time_ms, 30_000.0);
        assert_eq!(frame.translate_x, -250.0);

        let frame = coordinator.gesture(&mut timeline, -9_000.0);
        assert_eq!(frame.progress, 100.0);

        let mut flat = StripTimeline::new("b", 1_000.0, 0.0);
        flat.seek(500.0);
        assert_eq!(coordinator.gesture(&mut flat, -10.0).progress, 50.0);
    }

    #[test]
    fn test_skip_clamps() {
        let mut coordinator = SeekCoordinator::new();
        let mut timeline = timeline();
        assert_eq!(coordinator.skip(&mut timeline, 15.0 * 60_000.0).current_time_ms, 120_000.0);
        assert_eq!(coordinator.skip(&mut timeline, -30_000.0).current_time_ms, 90_000.0);
        assert_eq!(coordinator.skip(&mut timeline, -15.0 * 60_000.0).current_time_ms, 0.0);
    }

    #[test]
    fn test_input_wins_over_same_frame_tick() {
        let mut coordinator = SeekCoordinator::new();
        let mut registry = TimelineRegistry::new(4);
        registry.ensure("a", 120_000.0, 1_000.0);
        registry.activate("a");

        if let Some(timeline) = registry.active_mut() {
            coordinator.seek_bar(timeline, 50.0);
            timeline.play();
        }
        assert!(coordinator.tick(&mut registry, 1_000.0).is_none());
        assert_eq!(registry.active().unwrap().current_time_ms(), 60_000.0);

        let frame = coordinator.tick(&mut registry, 1_000.0).unwrap();
        assert_eq!(frame.current_time_ms, 61_000.0);
        assert_eq!(coordinator.last_source(), Some(SeekSource::Tick));
    }
}
