//! Render runtime: owns the document, the stores and the component registry.
//!
//! The runtime is the frame-debounce scheduler for the reactive core. Writes
//! (store dispatches, direct assignments, `set_data`) only mark components as
//! pending; [`Runtime::flush`] is the animation-frame callback that renders
//! each pending component once, parent first, then everything attached to it.
//!
//! # Usage
//!
//! ```ignore
//! let mut runtime = Runtime::new(Document::from_markup(r#"<div id="app"></div>"#));
//! let store = runtime.add_store(Store::builder(json!({"n": 0})).build());
//! let app = runtime.add_component(
//!     ComponentSpec::new(Target::selector("#app")?)
//!         .store(store)
//!         .template(|data| format!("<p>{}</p>", data["n"])),
//! )?;
//! runtime.render(app)?;          // first render is synchronous
//! runtime.assign(store, "n", 1)?; // schedules
//! runtime.flush();               // renders once
//! ```

use std::collections::{HashSet, VecDeque};

use serde_json::Value;
use tracing::{debug, warn};

use crate::component::{Component, ComponentId, ComponentSpec, DataSource, StoreId, Target};
use crate::diff::{ExternalOwners, render_into};
use crate::dom::{Document, NodeId};
use crate::error::{ReactiveError, Result};
use crate::escape;
use crate::store::Store;

/// Emitted after every component render.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderEvent {
    pub component: ComponentId,
    pub target: NodeId,
    /// Number of patches applied; zero when the markup was unchanged.
    pub patches: usize,
}

/// What one [`Runtime::flush`] did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameReport {
    pub rendered: Vec<ComponentId>,
    pub failed: Vec<(ComponentId, ReactiveError)>,
}

impl FrameReport {
    pub fn is_idle(&self) -> bool {
        self.rendered.is_empty() && self.failed.is_empty()
    }
}

struct StoreEntry {
    store: Store,
    dependents: Vec<ComponentId>,
}

pub struct Runtime {
    document: Document,
    stores: Vec<StoreEntry>,
    components: Vec<Component>,
    pending: Vec<ComponentId>,
    events: VecDeque<RenderEvent>,
}

impl Runtime {
    pub fn new(document: Document) -> Self {
        Self {
            document,
            stores: Vec::new(),
            components: Vec::new(),
            pending: Vec::new(),
            events: VecDeque::new(),
        }
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Host access to the live document (user input, direct style writes).
    pub fn document_mut(&mut self) -> &mut Document {
        &mut self.document
    }

    // Stores.

    pub fn add_store(&mut self, store: Store) -> StoreId {
        self.stores.push(StoreEntry {
            store,
            dependents: Vec::new(),
        });
        StoreId(self.stores.len() - 1)
    }

    pub fn store(&self, id: StoreId) -> Result<&Store> {
        self.stores
            .get(id.0)
            .map(|entry| &entry.store)
            .ok_or(ReactiveError::UnknownStore(id.0))
    }

    fn store_mut(&mut self, id: StoreId) -> Result<&mut Store> {
        self.stores
            .get_mut(id.0)
            .map(|entry| &mut entry.store)
            .ok_or(ReactiveError::UnknownStore(id.0))
    }

    pub fn get(&self, store: StoreId, getter: &str) -> Result<Value> {
        self.store(store)?.get(getter)
    }

    /// Runs a named setter; dependents render on the next flush if it changed anything.
    pub fn dispatch(&mut self, store: StoreId, setter: &str, args: &[Value]) -> Result<bool> {
        self.store_mut(store)?.dispatch(setter, args)
    }

    pub fn assign(&mut self, store: StoreId, path: &str, value: impl Into<Value>) -> Result<bool> {
        Ok(self.store_mut(store)?.assign(path, value))
    }

    // Components.

    pub fn add_component(&mut self, spec: ComponentSpec) -> Result<ComponentId> {
        if let DataSource::Store(store) = spec.data {
            self.store(store)?;
        }
        let component = Component::from_spec(spec)?;
        let id = ComponentId(self.components.len());
        if let DataSource::Store(store) = component.data {
            if let Some(entry) = self.stores.get_mut(store.0) {
                entry.dependents.push(id);
            }
        }
        self.components.push(component);
        Ok(id)
    }

    fn component(&self, id: ComponentId) -> Result<&Component> {
        self.components
            .get(id.0)
            .ok_or(ReactiveError::UnknownComponent(id.0))
    }

    fn component_mut(&mut self, id: ComponentId) -> Result<&mut Component> {
        self.components
            .get_mut(id.0)
            .ok_or(ReactiveError::UnknownComponent(id.0))
    }

    pub fn target(&self, id: ComponentId) -> Result<&Target> {
        Ok(&self.component(id)?.target)
    }

    pub fn render_count(&self, id: ComponentId) -> Result<u64> {
        Ok(self.component(id)?.renders)
    }

    /// Whether `from` renders `to`, directly or through attached components.
    fn reaches(&self, from: ComponentId, to: ComponentId) -> bool {
        let mut stack = vec![from];
        let mut seen = HashSet::new();
        while let Some(current) = stack.pop() {
            if current == to {
                return true;
            }
            if !seen.insert(current) {
                continue;
            }
            if let Some(component) = self.components.get(current.0) {
                stack.extend(component.attached.iter().copied());
            }
        }
        false
    }

    /// Registers `child` to render after `parent`; its target becomes
    /// off-limits to the parent's diff.
    pub fn attach(&mut self, parent: ComponentId, child: ComponentId) -> Result<()> {
        self.component(child)?;
        self.component(parent)?;
        if self.reaches(child, parent) {
            return Err(ReactiveError::AttachCycle {
                parent: parent.0,
                child: child.0,
            });
        }
        self.component_mut(parent)?.attached.push(child);
        Ok(())
    }

    pub fn detach(&mut self, parent: ComponentId, child: ComponentId) -> Result<()> {
        self.component_mut(parent)?
            .attached
            .retain(|attached| *attached != child);
        Ok(())
    }

    /// Merges `patch` into a component's local data.
    pub fn set_data(&mut self, id: ComponentId, patch: Value) -> Result<()> {
        let component = self.component_mut(id)?;
        let DataSource::Local(data) = &mut component.data else {
            return Err(ReactiveError::StoreBound(id.0));
        };
        let changed = match (data, patch) {
            (Value::Object(current), Value::Object(patch)) => {
                patch.into_iter().fold(false, |changed, (key, value)| {
                    if current.get(&key) == Some(&value) {
                        changed
                    } else {
                        current.insert(key, value);
                        true
                    }
                })
            }
            (data, patch) => {
                let changed = *data != patch;
                *data = patch;
                changed
            }
        };
        if changed {
            self.schedule(id);
        }
        Ok(())
    }

    /// Escaped snapshot of the data a component renders from.
    pub fn data(&self, id: ComponentId) -> Result<Value> {
        let component = self.component(id)?;
        match &component.data {
            DataSource::Local(data) => Ok(escape::snapshot(data, component.allow_html)),
            DataSource::Store(store) => Ok(self.store(*store)?.data()),
        }
    }

    /// Marks a component for the next flush. Repeated calls coalesce.
    pub fn schedule(&mut self, id: ComponentId) {
        if !self.pending.contains(&id) {
            self.pending.push(id);
        }
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty() || self.stores.iter().any(|entry| entry.store.is_dirty())
    }

    /// Renders a component and, parent first, every component attached below it.
    ///
    /// Only the component's own failure is returned; a failing descendant is
    /// logged and skipped like in [`Runtime::flush`].
    pub fn render(&mut self, id: ComponentId) -> Result<RenderEvent> {
        let event = self.render_one(id)?;
        let attached = self.component(id)?.attached.clone();
        let mut visited = HashSet::from([id]);
        let mut report = FrameReport::default();
        self.render_walk(attached.into(), &mut visited, &mut report);
        self.pending.retain(|pending| !visited.contains(pending));
        Ok(event)
    }

    fn render_walk(
        &mut self,
        mut queue: VecDeque<ComponentId>,
        visited: &mut HashSet<ComponentId>,
        report: &mut FrameReport,
    ) {
        while let Some(id) = queue.pop_front() {
            if !visited.insert(id) {
                continue;
            }
            match self.render_one(id) {
                Ok(_) => {
                    report.rendered.push(id);
                    if let Some(component) = self.components.get(id.0) {
                        queue.extend(component.attached.iter().copied());
                    }
                }
                Err(error) => {
                    warn!(component = %id, %error, "render skipped");
                    report.failed.push((id, error));
                }
            }
        }
    }

    fn render_one(&mut self, id: ComponentId) -> Result<RenderEvent> {
        let component = self
            .components
            .get(id.0)
            .ok_or(ReactiveError::UnknownComponent(id.0))?;
        let target = component.target.resolve(&self.document)?;

        let data = match &component.data {
            DataSource::Local(data) => escape::snapshot(data, component.allow_html),
            DataSource::Store(store) => self
                .stores
                .get(store.0)
                .map(|entry| entry.store.data())
                .ok_or(ReactiveError::UnknownStore(store.0))?,
        };
        let markup = (component.template)(&data);

        let mut owners = ExternalOwners::new();
        for child in &component.attached {
            match self.components.get(child.0).map(|c| &c.target) {
                Some(Target::Selector(selector)) => owners.add_selector(selector.clone()),
                Some(Target::Node(node)) => owners.add_node(*node),
                None => {}
            }
        }

        let patches = if markup == self.document.inner_html(target) {
            0
        } else {
            render_into(&mut self.document, target, &markup, &owners)?.patches
        };

        if let Some(component) = self.components.get_mut(id.0) {
            component.renders += 1;
        }
        debug!(component = %id, patches, "component rendered");
        let event = RenderEvent {
            component: id,
            target,
            patches,
        };
        self.events.push_back(event.clone());
        Ok(event)
    }

    /// Animation-frame callback: renders everything scheduled since the last flush.
    pub fn flush(&mut self) -> FrameReport {
        let mut queue: VecDeque<ComponentId> = self.pending.drain(..).collect();
        for entry in &mut self.stores {
            if entry.store.take_dirty() {
                queue.extend(entry.dependents.iter().copied());
            }
        }

        let mut report = FrameReport::default();
        self.render_walk(queue, &mut HashSet::new(), &mut report);
        report
    }

    pub fn drain_events(&mut self) -> Vec<RenderEvent> {
        self.events.drain(..).collect()
    }
}
