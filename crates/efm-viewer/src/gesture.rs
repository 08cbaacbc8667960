//! Drag-to-scroll binding over the media viewport.

use efm_reactive::{Document, NodeId, Selector};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::marquee::MarqueeMetrics;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// State reported by the drag primitive; `position.x` is authoritative.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DragState {
    pub position: Position,
    #[serde(default)]
    pub dragging: bool,
}

impl DragState {
    pub fn at(x: f64) -> Self {
        Self {
            position: Position { x, y: 0.0 },
            dragging: true,
        }
    }
}

/// Binds the drag primitive to a viewport and the content it moves.
#[derive(Debug, Clone, PartialEq)]
pub struct DragBinding {
    viewport: NodeId,
    content: NodeId,
    metrics: MarqueeMetrics,
    attached: bool,
}

impl DragBinding {
    /// Returns `None` while either element is not rendered.
    pub fn attach(
        document: &Document,
        viewport: &Selector,
        content: &Selector,
        metrics: MarqueeMetrics,
    ) -> Option<Self> {
        let viewport = document.query_selector(viewport)?;
        let content = document.query_selector_in(viewport, content)?;
        debug!(displacement = metrics.displacement, "drag binding attached");
        Some(Self {
            viewport,
            content,
            metrics,
            attached: true,
        })
    }

    pub fn viewport(&self) -> NodeId {
        self.viewport
    }

    pub fn content(&self) -> NodeId {
        self.content
    }

    pub fn metrics(&self) -> MarqueeMetrics {
        self.metrics
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }

    pub fn update_metrics(&mut self, metrics: MarqueeMetrics) {
        self.metrics = metrics;
    }

    /// Points the binding at re-rendered content.
    pub fn retarget(&mut self, content: NodeId) {
        self.content = content;
    }

    pub fn destroy(&mut self) {
        self.attached = false;
    }

    /// Clamps a reported state to the travel range `[-displacement, 0]`.
    /// Detached bindings report nothing.
    pub fn update(&self, state: DragState) -> Option<DragState> {
        if !self.attached {
            return None;
        }
        let x = if state.position.x.is_finite() { state.position.x } else { 0.0 };
        Some(DragState {
            position: Position {
                x: x.clamp(-self.metrics.displacement, 0.0),
                y: state.position.y,
            },
            dragging: state.dragging,
        })
    }
}
