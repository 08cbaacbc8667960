//! Viewer-scoped event delegation.
//!
//! Hosts report raw UI events against a document node; the bus matches the
//! node (or its nearest ancestor) against registered selectors and yields the
//! viewer actions to run.

use efm_reactive::{Document, NodeId, Selector};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UiEventKind {
    Click,
    Input,
    Change,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UiEvent {
    pub kind: UiEventKind,
    pub target: NodeId,
}

impl UiEvent {
    pub fn click(target: NodeId) -> Self {
        Self {
            kind: UiEventKind::Click,
            target,
        }
    }

    pub fn input(target: NodeId) -> Self {
        Self {
            kind: UiEventKind::Input,
            target,
        }
    }

    pub fn change(target: NodeId) -> Self {
        Self {
            kind: UiEventKind::Change,
            target,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewerAction {
    TogglePlay,
    SeekInput,
    SkipForward,
    SkipBackward,
    ToggleMenu,
    SelectStrip,
    ChangeSpeed,
}

#[derive(Debug, Clone)]
struct Listener {
    kind: UiEventKind,
    selector: Selector,
    action: ViewerAction,
}

#[derive(Debug, Clone, Default)]
pub struct EventBus {
    listeners: Vec<Listener>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(&mut self, kind: UiEventKind, selector: Selector, action: ViewerAction) {
        self.listeners.push(Listener {
            kind,
            selector,
            action,
        });
    }

    pub fn clear(&mut self) {
        self.listeners.clear();
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Actions triggered by `event`, in registration order, each paired with
    /// the element its selector matched.
    pub fn route(&self, document: &Document, event: &UiEvent) -> Vec<(ViewerAction, NodeId)> {
        self.listeners
            .iter()
            .filter(|listener| listener.kind == event.kind)
            .filter_map(|listener| {
                document
                    .closest(event.target, &listener.selector)
                    .map(|node| (listener.action, node))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bus() -> EventBus {
        let mut bus = EventBus::new();
        bus.on(
            UiEventKind::Click,
            Selector::parse(".efm__play-pause").unwrap(),
            ViewerAction::TogglePlay,
        );
        bus.on(
            UiEventKind::Input,
            Selector::parse(".efm__seek-bar").unwrap(),
            ViewerAction::SeekInput,
        );
        bus.on(
            UiEventKind::Change,
            Selector::parse(".efm__seek-bar").unwrap(),
            ViewerAction::SeekInput,
        );
        bus
    }

    #[test]
    fn test_routes_through_ancestors() {
        let doc = Document::from_markup(
            r#"<button class="efm__play-pause"><i class="mdi mdi-play"></i></button><input class="efm__seek-bar">"#,
        );
        let icon = doc.select(".mdi").unwrap().unwrap();
        let button = doc.select(".efm__play-pause").unwrap().unwrap();
        let bus = bus();
        assert_eq!(
            bus.route(&doc, &UiEvent::click(icon)),
            vec![(ViewerAction::TogglePlay, button)]
        );
        assert!(bus.route(&doc, &UiEvent::input(icon)).is_empty());

        let seek = doc.select(".efm__seek-bar").unwrap().unwrap();
        assert_eq!(bus.route(&doc, &UiEvent::change(seek)).len(), 1);
    }

    #[test]
    fn test_clear_drops_every_listener() {
        let mut bus = bus();
        assert_eq!(bus.len(), 3);
        bus.clear();
        assert!(bus.is_empty());
    }
}
