//! The strip viewer: wires the store, components, timelines and input
//! handling over one document.
//!
//! # Usage
//!
//! ```ignore
//! let document = Document::from_markup("<div data-efm-viewer></div>");
//! let mut viewer = Viewer::mount(document, EfmConfig::load(), ConfigData::from_path("strips.json")?)?;
//! viewer.set_viewport_width(800.0)?;
//! for src in viewer.image_sources() {
//!     viewer.image_loaded(&src, 640.0)?;
//! }
//! viewer.play()?;
//! viewer.frame(16.7)?; // once per animation frame
//! ```

use efm_config::{EfmConfig, SelectorConfig};
use efm_reactive::{
    ComponentId, ComponentSpec, Document, FrameReport, NodeId, RenderEvent, Runtime, Selector,
    StoreId, Target,
};
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::coordinator::SeekCoordinator;
use crate::error::{Result, ViewerError};
use crate::events::{EventBus, UiEvent, UiEventKind, ViewerAction};
use crate::gesture::{DragBinding, DragState};
use crate::machine::TOGGLE;
use crate::marquee::{ImageReadiness, MarqueeMetrics};
use crate::model::{ConfigData, Strip};
use crate::registry::{TimelineEvent, TimelineRegistry};
use crate::state::{LoadState, PlayIcon, StoreState, StripSection, TimerSection, build_store, section};
use crate::templates;
use crate::timeline::{StripTimeline, TimelineFrame};

/// Flushes allowed while settling renders after a synchronous change.
const SETTLE_LIMIT: usize = 8;

/// Component ids, one per viewer region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewerComponents {
    pub player: ComponentId,
    pub strip: ComponentId,
    pub scan_items: ComponentId,
    pub loader: ComponentId,
    pub timeline: ComponentId,
    pub control_bar: ComponentId,
    pub timer: ComponentId,
    pub menu_bar: ComponentId,
    pub menu_bar_strips: ComponentId,
}

#[derive(Debug, Clone)]
struct ViewerSelectors {
    viewer: Selector,
    media: Selector,
    loader: Selector,
    seek_bar: Selector,
    media_collection: Selector,
    media_item_image: Selector,
    play_button: Selector,
    forward_time_button: Selector,
    backward_time_button: Selector,
    play_speed: Selector,
    menu_bar_button: Selector,
    menu_bar_dropdown_item: Selector,
}

impl ViewerSelectors {
    fn parse(config: &SelectorConfig) -> Result<Self> {
        Ok(Self {
            viewer: Selector::parse(&config.viewer)?,
            media: Selector::parse(&config.media)?,
            loader: Selector::parse(&config.loader)?,
            seek_bar: Selector::parse(&config.seek_bar)?,
            media_collection: Selector::parse(&config.media_collection)?,
            media_item_image: Selector::parse(&config.media_item_image)?,
            play_button: Selector::parse(&config.play_button)?,
            forward_time_button: Selector::parse(&config.forward_time_button)?,
            backward_time_button: Selector::parse(&config.backward_time_button)?,
            play_speed: Selector::parse(&config.play_speed)?,
            menu_bar_button: Selector::parse(&config.menu_bar_button)?,
            menu_bar_dropdown_item: Selector::parse(&config.menu_bar_dropdown_item)?,
        })
    }
}

fn component(
    runtime: &mut Runtime,
    store: StoreId,
    selector: &str,
    template: fn(&Value) -> String,
) -> Result<ComponentId> {
    Ok(runtime.add_component(
        ComponentSpec::new(Target::selector(selector)?)
            .store(store)
            .template(template),
    )?)
}

fn register_components(
    runtime: &mut Runtime,
    store: StoreId,
    selectors: &SelectorConfig,
) -> Result<ViewerComponents> {
    let components = ViewerComponents {
        player: component(runtime, store, &selectors.viewer, templates::player)?,
        strip: component(runtime, store, &selectors.media, templates::strip)?,
        scan_items: component(runtime, store, &selectors.media_collection, templates::scan_items)?,
        loader: component(runtime, store, &selectors.loader, templates::loader)?,
        timeline: component(runtime, store, &selectors.timeline, templates::timeline)?,
        control_bar: component(runtime, store, &selectors.control_bar, templates::control_bar)?,
        timer: component(runtime, store, &selectors.timer, templates::timer)?,
        menu_bar: component(runtime, store, &selectors.menu_bar, templates::menu_bar)?,
        menu_bar_strips: component(
            runtime,
            store,
            &selectors.menu_bar_strips,
            templates::menu_bar_strips,
        )?,
    };
    runtime.attach(components.player, components.strip)?;
    runtime.attach(components.player, components.timeline)?;
    runtime.attach(components.player, components.control_bar)?;
    runtime.attach(components.player, components.menu_bar)?;
    runtime.attach(components.strip, components.scan_items)?;
    runtime.attach(components.strip, components.loader)?;
    runtime.attach(components.control_bar, components.timer)?;
    runtime.attach(components.menu_bar, components.menu_bar_strips)?;
    Ok(components)
}

pub struct Viewer {
    settings: EfmConfig,
    selectors: ViewerSelectors,
    runtime: Runtime,
    store: StoreId,
    components: ViewerComponents,
    registry: TimelineRegistry,
    coordinator: SeekCoordinator,
    events: EventBus,
    readiness: Option<ImageReadiness>,
    metrics: Option<MarqueeMetrics>,
    drag: Option<DragBinding>,
    viewport_width: f64,
    last_frame_ms: Option<f64>,
    destroyed: bool,
}

impl Viewer {
    /// Builds the store and components inside the `[selectors] viewer`
    /// element of `document`, selects the first strip and renders.
    pub fn mount(document: Document, settings: EfmConfig, data: ConfigData) -> Result<Self> {
        settings.validate()?;
        let selectors = ViewerSelectors::parse(&settings.selectors)?;
        let mut runtime = Runtime::new(document);
        if runtime.document().query_selector(&selectors.viewer).is_none() {
            return Err(ViewerError::MissingElement(settings.selectors.viewer.clone()));
        }
        if data.strips.is_empty() {
            warn!("strip configuration is empty; rendering an empty viewer");
        }
        let strip_count = data.strips.len();

        let state = StoreState::new(data, &settings);
        let store = runtime.add_store(build_store(&state)?);
        let components = register_components(&mut runtime, store, &settings.selectors)?;

        let mut viewer = Self {
            registry: TimelineRegistry::new(settings.timeline.cache_capacity),
            settings,
            selectors,
            runtime,
            store,
            components,
            coordinator: SeekCoordinator::new(),
            events: EventBus::new(),
            readiness: None,
            metrics: None,
            drag: None,
            viewport_width: 0.0,
            last_frame_ms: None,
            destroyed: false,
        };
        viewer.bind_events();

        viewer.runtime.dispatch(store, "setStrip", &[json!("")])?;
        viewer.runtime.render(components.player)?;
        viewer.settle();
        if let Some(id) = viewer.strip_section().and_then(|strip| strip.id) {
            viewer.registry.activate(&id);
        }
        viewer.init_marquee()?;
        info!(strips = strip_count, "viewer mounted");
        Ok(viewer)
    }

    fn bind_events(&mut self) {
        let selectors = &self.selectors;
        let bindings = [
            (UiEventKind::Click, &selectors.play_button, ViewerAction::TogglePlay),
            (UiEventKind::Input, &selectors.seek_bar, ViewerAction::SeekInput),
            (UiEventKind::Change, &selectors.seek_bar, ViewerAction::SeekInput),
            (UiEventKind::Click, &selectors.forward_time_button, ViewerAction::SkipForward),
            (UiEventKind::Click, &selectors.backward_time_button, ViewerAction::SkipBackward),
            (UiEventKind::Click, &selectors.menu_bar_button, ViewerAction::ToggleMenu),
            (UiEventKind::Click, &selectors.menu_bar_dropdown_item, ViewerAction::SelectStrip),
            (UiEventKind::Change, &selectors.play_speed, ViewerAction::ChangeSpeed),
        ];
        for (kind, selector, action) in bindings {
            self.events.on(kind, selector.clone(), action);
        }
    }

    fn ensure_live(&self) -> Result<()> {
        if self.destroyed {
            Err(ViewerError::Destroyed)
        } else {
            Ok(())
        }
    }

    /// Flushes until no render is pending.
    fn settle(&mut self) {
        for _ in 0..SETTLE_LIMIT {
            if self.runtime.flush().is_idle() {
                return;
            }
        }
        debug!("renders still pending after settling");
    }

    // Accessors.

    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    /// Host access to the document, e.g. to write input values before
    /// reporting an event.
    pub fn document_mut(&mut self) -> &mut Document {
        self.runtime.document_mut()
    }

    pub fn document(&self) -> &Document {
        self.runtime.document()
    }

    pub fn store(&self) -> StoreId {
        self.store
    }

    pub fn components(&self) -> ViewerComponents {
        self.components
    }

    pub fn settings(&self) -> &EfmConfig {
        &self.settings
    }

    pub fn registry(&self) -> &TimelineRegistry {
        &self.registry
    }

    pub fn active_timeline(&self) -> Option<&StripTimeline> {
        self.registry.active()
    }

    pub fn metrics(&self) -> Option<MarqueeMetrics> {
        self.metrics
    }

    pub fn drag_binding(&self) -> Option<&DragBinding> {
        self.drag.as_ref()
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    /// Runs a store getter.
    pub fn get(&self, getter: &str) -> Result<Value> {
        Ok(self.runtime.get(self.store, getter)?)
    }

    pub fn strip_section(&self) -> Option<StripSection> {
        let store = self.runtime.store(self.store).ok()?;
        section(store.raw(), "strip")
    }

    pub fn timer(&self) -> Option<TimerSection> {
        let store = self.runtime.store(self.store).ok()?;
        section(store.raw(), "timer")
    }

    pub fn current_strip_id(&self) -> Option<String> {
        self.strip_section().and_then(|strip| strip.id)
    }

    pub fn menu_state(&self) -> Result<String> {
        let menu = self.get("menuBar")?;
        Ok(menu["machine"]["currentState"]
            .as_str()
            .unwrap_or_default()
            .to_string())
    }

    /// `src` of every scan image currently rendered.
    pub fn image_sources(&self) -> Vec<String> {
        let document = self.runtime.document();
        let Some(collection) = document.query_selector(&self.selectors.media_collection) else {
            return Vec::new();
        };
        document
            .query_selector_all(collection, &self.selectors.media_item_image)
            .into_iter()
            .filter_map(|image| document.attribute(image, "src").map(str::to_string))
            .collect()
    }

    pub fn drain_render_events(&mut self) -> Vec<RenderEvent> {
        self.runtime.drain_events()
    }

    // Marquee.

    fn init_marquee(&mut self) -> Result<()> {
        let document = self.runtime.document_mut();
        let Some(collection) = document.query_selector(&self.selectors.media_collection) else {
            let selector = self.selectors.media_collection.as_str();
            warn!(selector, "marquee container not rendered");
            return Err(ViewerError::MissingElement(selector.to_string()));
        };
        if document.style_property(collection, "white-space").as_deref() != Some("nowrap") {
            document.set_style_property(collection, "white-space", "nowrap")?;
        }
        if let Some(loader) = document.query_selector(&self.selectors.loader) {
            if document.attribute(loader, "data-state") != Some(LoadState::Loading.as_str()) {
                document.set_attribute(loader, "data-state", LoadState::Loading.as_str())?;
            }
        }

        let sources = self.image_sources();
        debug!(images = sources.len(), "waiting for scan images");
        let mut readiness = ImageReadiness::when_all_loaded(sources);
        let ready = readiness.check();
        self.readiness = Some(readiness);
        self.metrics = None;
        if ready {
            self.create_marquee()?;
        }
        Ok(())
    }

    fn create_marquee(&mut self) -> Result<()> {
        let widths = self
            .readiness
            .as_ref()
            .map(ImageReadiness::widths)
            .unwrap_or_default();
        let metrics = MarqueeMetrics::measure(&widths, self.viewport_width);
        self.metrics = Some(metrics);

        let document = self.runtime.document_mut();
        if let Some(loader) = document.query_selector(&self.selectors.loader) {
            if document.attribute(loader, "data-state").is_some() {
                document.remove_attribute(loader, "data-state")?;
            }
        }
        self.runtime
            .dispatch(self.store, "setViewerState", &[json!(LoadState::Ready.as_str())])?;

        let Some(strip) = self.strip_section() else {
            return Ok(());
        };
        let Some(id) = strip.id else {
            return Ok(());
        };
        if !self.registry.rebuild(&id, strip.duration, metrics.displacement) {
            self.registry.ensure(&id, strip.duration, metrics.displacement);
        }
        self.registry.activate(&id);
        self.attach_drag(metrics);
        if let Some(frame) = self.registry.active().map(StripTimeline::frame) {
            self.apply_frame(frame)?;
        }
        self.settle();
        Ok(())
    }

    fn attach_drag(&mut self, metrics: MarqueeMetrics) {
        let document = self.runtime.document();
        if let Some(binding) = self.drag.as_mut().filter(|binding| binding.is_attached()) {
            binding.update_metrics(metrics);
            if let Some(content) = document.query_selector(&self.selectors.media_collection) {
                binding.retarget(content);
            }
            return;
        }
        self.drag = DragBinding::attach(
            document,
            &self.selectors.media,
            &self.selectors.media_collection,
            metrics,
        );
    }

    /// Writes a timeline frame to the marquee, the seek bar and the timer.
    fn apply_frame(&mut self, frame: TimelineFrame) -> Result<()> {
        let document = self.runtime.document_mut();
        if let Some(collection) = document.query_selector(&self.selectors.media_collection) {
            let transform = format!("translateX({}px)", frame.translate_x);
            if document.style_property(collection, "transform").as_deref() != Some(transform.as_str()) {
                document.set_style_property(collection, "transform", &transform)?;
            }
        }
        if let Some(seek_bar) = document.query_selector(&self.selectors.seek_bar) {
            let value = frame.progress.to_string();
            if document.property(seek_bar, "value") != Some(value.as_str()) {
                document.set_property(seek_bar, "value", &value)?;
            }
            if document.attribute(seek_bar, "aria-valuenow") != Some(value.as_str()) {
                document.set_attribute(seek_bar, "aria-valuenow", &value)?;
            }
        }
        self.runtime
            .dispatch(self.store, "setTimer", &[json!(frame.current_time_ms)])?;
        Ok(())
    }

    fn set_icon(&mut self, icon: PlayIcon) -> Result<()> {
        self.runtime
            .dispatch(self.store, "setControlState", &[json!(icon.as_str())])?;
        Ok(())
    }

    /// Reports a scan image as loaded with its rendered width.
    /// Returns true once every image has settled.
    pub fn image_loaded(&mut self, src: &str, width: f64) -> Result<bool> {
        self.ensure_live()?;
        let ready = self
            .readiness
            .as_mut()
            .is_some_and(|readiness| readiness.mark_loaded(src, width));
        if ready {
            self.create_marquee()?;
        }
        Ok(ready)
    }

    pub fn image_failed(&mut self, src: &str) -> Result<bool> {
        self.ensure_live()?;
        warn!(src, "scan image failed to load");
        let ready = self
            .readiness
            .as_mut()
            .is_some_and(|readiness| readiness.mark_failed(src));
        if ready {
            self.create_marquee()?;
        }
        Ok(ready)
    }

    /// Width of the media viewport; remeasures a ready marquee.
    pub fn set_viewport_width(&mut self, width: f64) -> Result<()> {
        self.ensure_live()?;
        self.viewport_width = width;
        if self.metrics.is_some() {
            self.create_marquee()?;
        }
        Ok(())
    }

    // Playback.

    pub fn play(&mut self) -> Result<bool> {
        self.ensure_live()?;
        let Some(timeline) = self.registry.active_mut() else {
            debug!("play before the timeline exists");
            return Ok(false);
        };
        if !timeline.play() {
            return Ok(false);
        }
        let frame = timeline.frame();
        self.last_frame_ms = None;
        self.apply_frame(frame)?;
        self.set_icon(PlayIcon::Playing)?;
        Ok(true)
    }

    pub fn pause(&mut self) -> Result<bool> {
        self.ensure_live()?;
        let paused = self
            .registry
            .active_mut()
            .is_some_and(StripTimeline::pause);
        if paused {
            self.set_icon(PlayIcon::Paused)?;
        }
        Ok(paused)
    }

    pub fn toggle_play(&mut self) -> Result<bool> {
        match self.registry.active().map(StripTimeline::is_playing) {
            Some(true) => self.pause().map(|_| false),
            Some(false) => self.play(),
            None => Ok(false),
        }
    }

    /// Seek bar input at `value` percent.
    pub fn seek_to_percent(&mut self, value: f64) -> Result<()> {
        self.ensure_live()?;
        let Some(timeline) = self.registry.active_mut() else {
            return Ok(());
        };
        let frame = self.coordinator.seek_bar(timeline, value);
        self.apply_frame(frame)?;
        self.set_icon(PlayIcon::Paused)
    }

    /// Skips by `minutes` of strip time; negative skips backward.
    pub fn skip(&mut self, minutes: f64) -> Result<()> {
        self.ensure_live()?;
        let Some(timeline) = self.registry.active_mut() else {
            return Ok(());
        };
        let frame = self.coordinator.skip(timeline, minutes * 60_000.0);
        self.apply_frame(frame)?;
        self.set_icon(PlayIcon::Paused)
    }

    /// Drag update from the gesture primitive.
    pub fn on_drag(&mut self, state: DragState) -> Result<()> {
        self.ensure_live()?;
        let Some(state) = self.drag.as_ref().and_then(|binding| binding.update(state)) else {
            return Ok(());
        };
        let Some(timeline) = self.registry.active_mut() else {
            return Ok(());
        };
        let frame = self.coordinator.gesture(timeline, state.position.x);
        self.apply_frame(frame)?;
        self.set_icon(PlayIcon::Paused)
    }

    pub fn set_speed(&mut self, speed: f64) -> Result<()> {
        self.ensure_live()?;
        if !self.runtime.dispatch(self.store, "setSpeed", &[json!(speed)])? {
            return Ok(());
        }
        if let (Some(metrics), Some(strip)) = (self.metrics, self.strip_section()) {
            if let Some(id) = strip.id {
                self.registry.rebuild(&id, strip.duration, metrics.displacement);
            }
        }
        if let Some(frame) = self.registry.active().map(StripTimeline::frame) {
            self.apply_frame(frame)?;
        }
        info!(speed, "playback speed changed");
        Ok(())
    }

    // Menu.

    pub fn toggle_menu(&mut self) -> Result<String> {
        self.ensure_live()?;
        self.runtime.dispatch(self.store, "toggleMenu", &[json!(TOGGLE)])?;
        self.menu_state()
    }

    /// Switches to another strip: closes the menu, pauses the current
    /// timeline and re-renders the scans. The strip's timeline is reused if
    /// cached, otherwise created once its images are ready.
    pub fn select_strip(&mut self, id: &str) -> Result<()> {
        self.ensure_live()?;
        // Unusable strips are rejected before any state changes.
        let strip = self
            .get("stripData")?
            .as_array()
            .and_then(|strips| strips.iter().find(|strip| strip["id"].as_str() == Some(id)))
            .cloned()
            .ok_or_else(|| ViewerError::UnknownStrip(id.to_string()))?;
        serde_json::from_value::<Strip>(strip)?.times()?;
        if self.menu_state()? == "active" {
            self.runtime.dispatch(self.store, "toggleMenu", &[json!(TOGGLE)])?;
        }
        if self.current_strip_id().as_deref() == Some(id) {
            return Ok(());
        }

        self.pause()?;
        self.runtime.dispatch(self.store, "setStrip", &[json!(id)])?;
        self.runtime
            .dispatch(self.store, "setViewerState", &[json!(LoadState::Loading.as_str())])?;
        self.registry.activate(id);
        self.settle();

        let frame = self
            .registry
            .active()
            .map(StripTimeline::frame)
            .unwrap_or(TimelineFrame {
                progress: 0.0,
                current_time_ms: 0.0,
                translate_x: 0.0,
            });
        self.apply_frame(frame)?;
        self.init_marquee()?;
        self.settle();
        info!(strip = id, "strip selected");
        Ok(())
    }

    // Events and frames.

    /// Routes a UI event to the viewer actions bound to its target.
    pub fn handle_event(&mut self, event: UiEvent) -> Result<Vec<ViewerAction>> {
        self.ensure_live()?;
        let routed = self.events.route(self.runtime.document(), &event);
        for (action, node) in &routed {
            self.perform(*action, *node)?;
        }
        Ok(routed.into_iter().map(|(action, _)| action).collect())
    }

    fn perform(&mut self, action: ViewerAction, node: NodeId) -> Result<()> {
        let document = self.runtime.document();
        let number = |value: Option<&str>| value.and_then(|value| value.trim().parse::<f64>().ok());
        debug!(?action, "ui action");
        match action {
            ViewerAction::TogglePlay => self.toggle_play().map(|_| ()),
            ViewerAction::SeekInput => {
                let value = number(document.property(node, "value")).unwrap_or(0.0);
                self.seek_to_percent(value)
            }
            ViewerAction::SkipForward | ViewerAction::SkipBackward => {
                let minutes = number(document.attribute(node, "data-offset"))
                    .unwrap_or(self.settings.viewer.skip_offset_minutes);
                let sign = if action == ViewerAction::SkipForward { 1.0 } else { -1.0 };
                self.skip(sign * minutes)
            }
            ViewerAction::ToggleMenu => self.toggle_menu().map(|_| ()),
            ViewerAction::SelectStrip => {
                match document.attribute(node, "data-strip-id").map(str::to_string) {
                    Some(id) => self.select_strip(&id),
                    None => {
                        warn!("strip item without data-strip-id");
                        Ok(())
                    }
                }
            }
            ViewerAction::ChangeSpeed => match number(document.property(node, "value")) {
                Some(speed) => self.set_speed(speed),
                None => Ok(()),
            },
        }
    }

    /// Animation-frame entry: advances the active timeline, writes the
    /// frame and flushes pending renders.
    pub fn frame(&mut self, now_ms: f64) -> Result<FrameReport> {
        self.ensure_live()?;
        let delta = self
            .last_frame_ms
            .map(|last| (now_ms - last).max(0.0))
            .unwrap_or(0.0);
        self.last_frame_ms = Some(now_ms);

        if let Some(frame) = self.coordinator.tick(&mut self.registry, delta) {
            self.apply_frame(frame)?;
        }
        for event in self.registry.drain_events() {
            match event {
                TimelineEvent::Completed { strip_id } => {
                    info!(strip = %strip_id, "strip playback completed");
                    self.set_icon(PlayIcon::Paused)?;
                }
                TimelineEvent::Created { strip_id } => debug!(strip = %strip_id, "timeline ready"),
                TimelineEvent::Evicted { strip_id } => debug!(strip = %strip_id, "timeline dropped"),
            }
        }
        Ok(self.runtime.flush())
    }

    /// Removes listeners, detaches the drag binding and stops playback.
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.events.clear();
        if let Some(binding) = self.drag.as_mut() {
            binding.destroy();
        }
        self.registry.pause_all();
        self.readiness = None;
        self.destroyed = true;
        info!(
            orphaned_nodes = self.runtime.document().orphaned_nodes(),
            "viewer destroyed"
        );
    }
}
