//! Timeline cache keyed by strip id.
//!
//! At most one timeline exists per strip. Timelines are created lazily and
//! reused when a strip is selected again; the least recently used ones are
//! evicted past the configured capacity, except the active strip's.

use std::collections::{HashMap, VecDeque};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::timeline::{StripTimeline, TimelineFrame, TimelineState};

/// Lifecycle notifications, drained by the viewer after each frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TimelineEvent {
    Created { strip_id: String },
    Completed { strip_id: String },
    Evicted { strip_id: String },
}

#[derive(Debug)]
pub struct TimelineRegistry {
    timelines: HashMap<String, StripTimeline>,
    /// Least recently used first.
    recency: VecDeque<String>,
    capacity: usize,
    active: Option<String>,
    events: VecDeque<TimelineEvent>,
}

impl TimelineRegistry {
    pub fn new(capacity: usize) -> Self {
        Self {
            timelines: HashMap::new(),
            recency: VecDeque::new(),
            capacity: capacity.max(1),
            active: None,
            events: VecDeque::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.timelines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timelines.is_empty()
    }

    pub fn contains(&self, strip_id: &str) -> bool {
        self.timelines.contains_key(strip_id)
    }

    pub fn get(&self, strip_id: &str) -> Option<&StripTimeline> {
        self.timelines.get(strip_id)
    }

    pub fn get_mut(&mut self, strip_id: &str) -> Option<&mut StripTimeline> {
        self.timelines.get_mut(strip_id)
    }

    pub fn active_id(&self) -> Option<&str> {
        self.active.as_deref()
    }

    pub fn active(&self) -> Option<&StripTimeline> {
        self.active.as_deref().and_then(|id| self.timelines.get(id))
    }

    pub fn active_mut(&mut self) -> Option<&mut StripTimeline> {
        let id = self.active.as_deref()?;
        self.timelines.get_mut(id)
    }

    fn touch(&mut self, strip_id: &str) {
        self.recency.retain(|id| id != strip_id);
        self.recency.push_back(strip_id.to_string());
    }

    /// Evicts least recently used timelines until at most `limit` remain.
    fn evict_to(&mut self, limit: usize) {
        while self.timelines.len() > limit {
            let victim = self
                .recency
                .iter()
                .find(|id| Some(id.as_str()) != self.active.as_deref())
                .cloned();
            let Some(victim) = victim else {
                break;
            };
            self.remove(&victim);
            debug!(strip = %victim, "timeline evicted");
            self.events.push_back(TimelineEvent::Evicted { strip_id: victim });
        }
    }

    /// The strip's timeline, created with the given metrics if absent.
    /// An existing timeline is returned untouched.
    pub fn ensure(&mut self, strip_id: &str, duration_ms: f64, content_width: f64) -> &mut StripTimeline {
        if !self.timelines.contains_key(strip_id) {
            self.evict_to(self.capacity - 1);
            debug!(strip = strip_id, duration_ms, content_width, "timeline created");
            self.events.push_back(TimelineEvent::Created {
                strip_id: strip_id.to_string(),
            });
        }
        self.touch(strip_id);
        self.timelines
            .entry(strip_id.to_string())
            .or_insert_with(|| StripTimeline::new(strip_id, duration_ms, content_width))
    }

    /// Rebuilds metrics of an existing timeline. Returns false if there is none.
    pub fn rebuild(&mut self, strip_id: &str, duration_ms: f64, content_width: f64) -> bool {
        match self.timelines.get_mut(strip_id) {
            Some(timeline) => {
                timeline.rebuild(duration_ms, content_width);
                true
            }
            None => false,
        }
    }

    /// Makes `strip_id` the selected strip, pausing the previous one.
    /// The timeline itself may not exist yet.
    pub fn activate(&mut self, strip_id: &str) {
        if self.active.as_deref() == Some(strip_id) {
            return;
        }
        if let Some(previous) = self.active_mut() {
            previous.pause();
        }
        self.active = Some(strip_id.to_string());
        if self.timelines.contains_key(strip_id) {
            self.touch(strip_id);
        }
        self.evict_to(self.capacity);
    }

    /// Advances the active timeline.
    pub fn tick(&mut self, delta_ms: f64) -> Option<TimelineFrame> {
        let timeline = self.active_mut()?;
        let frame = timeline.tick(delta_ms)?;
        if timeline.state() == TimelineState::Completed {
            let strip_id = timeline.strip_id().to_string();
            self.events.push_back(TimelineEvent::Completed { strip_id });
        }
        Some(frame)
    }

    pub fn pause_all(&mut self) {
        for timeline in self.timelines.values_mut() {
            timeline.pause();
        }
    }

    pub fn remove(&mut self, strip_id: &str) -> Option<StripTimeline> {
        self.recency.retain(|id| id != strip_id);
        self.timelines.remove(strip_id)
    }

    pub fn drain_events(&mut self) -> Vec<TimelineEvent> {
        self.events.drain(..).collect()
    }
}
