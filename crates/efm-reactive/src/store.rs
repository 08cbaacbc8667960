//! Observable data store.
//!
//! The data graph is a JSON value tree. Reads go through named getters, writes
//! through named setters that receive a [`Draft`]: a change-tracking handle
//! over the live graph. A store only reports itself dirty when a write
//! actually changed something, so assigning a property its current value is
//! free.

use std::collections::HashMap;
use std::fmt;

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::{ReactiveError, Result};
use crate::escape;

pub type Getter = Box<dyn Fn(&Value) -> Value>;
pub type Setter = Box<dyn Fn(&mut Draft<'_>, &[Value])>;

fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('.').filter(|segment| !segment.is_empty())
}

/// Resolves a dotted path (`strip.times.mediaStartTime`, `scans.0.url`).
pub fn lookup<'v>(root: &'v Value, path: &str) -> Option<&'v Value> {
    segments(path).try_fold(root, |node, segment| match node {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

fn container_mut<'v>(root: &'v mut Value, path: &[&str]) -> Option<&'v mut Value> {
    let mut node = root;
    for segment in path {
        node = match node {
            Value::Object(map) => map
                .entry(segment.to_string())
                .or_insert_with(|| Value::Object(Map::new())),
            Value::Array(items) => {
                let index = segment.parse::<usize>().ok()?;
                items.get_mut(index)?
            }
            _ => return None,
        };
    }
    Some(node)
}

/// Writes `value` at `path`, creating missing intermediate objects.
/// Returns whether the graph changed.
fn write_path(root: &mut Value, path: &str, value: Value) -> Option<bool> {
    let parts: Vec<&str> = segments(path).collect();
    let Some((last, parents)) = parts.split_last() else {
        if *root == value {
            return Some(false);
        }
        *root = value;
        return Some(true);
    };
    match container_mut(root, parents)? {
        Value::Object(map) => {
            if map.get(*last) == Some(&value) {
                return Some(false);
            }
            map.insert(last.to_string(), value);
            Some(true)
        }
        Value::Array(items) => {
            let slot = items.get_mut(last.parse::<usize>().ok()?)?;
            if *slot == value {
                return Some(false);
            }
            *slot = value;
            Some(true)
        }
        _ => None,
    }
}

fn delete_path(root: &mut Value, path: &str) -> bool {
    let parts: Vec<&str> = segments(path).collect();
    let Some((last, parents)) = parts.split_last() else {
        return false;
    };
    let mut node = root;
    for segment in parents {
        node = match node {
            Value::Object(map) => match map.get_mut(*segment) {
                Some(next) => next,
                None => return false,
            },
            Value::Array(items) => {
                let Ok(index) = segment.parse::<usize>() else {
                    return false;
                };
                match items.get_mut(index) {
                    Some(next) => next,
                    None => return false,
                }
            }
            _ => return false,
        };
    }
    match node {
        Value::Object(map) => map.remove(*last).is_some(),
        _ => false,
    }
}

/// Mutable, change-tracking view of a store's data handed to setters.
pub struct Draft<'a> {
    data: &'a mut Value,
    getters: &'a HashMap<String, Getter>,
    changed: bool,
}

impl<'a> Draft<'a> {
    fn new(data: &'a mut Value, getters: &'a HashMap<String, Getter>) -> Self {
        Self {
            data,
            getters,
            changed: false,
        }
    }

    pub fn get(&self, path: &str) -> Option<&Value> {
        lookup(&*self.data, path)
    }

    pub fn data(&self) -> &Value {
        &*self.data
    }

    /// Assigns `value` at `path`; a no-op when the value is already there.
    pub fn set(&mut self, path: &str, value: impl Into<Value>) -> bool {
        match write_path(self.data, path, value.into()) {
            Some(changed) => {
                self.changed |= changed;
                changed
            }
            None => {
                warn!(path, "store write through a non-container value ignored");
                false
            }
        }
    }

    pub fn delete(&mut self, path: &str) -> bool {
        let removed = delete_path(self.data, path);
        self.changed |= removed;
        removed
    }

    /// Shallow-merges the fields of `patch` into the object at `path`.
    pub fn merge(&mut self, path: &str, patch: Map<String, Value>) -> bool {
        let prefix = path.trim_end_matches('.');
        patch.into_iter().fold(false, |changed, (key, value)| {
            let field = if prefix.is_empty() {
                key
            } else {
                format!("{prefix}.{key}")
            };
            self.set(&field, value) || changed
        })
    }

    /// Evaluates a getter against the current (mutated) data.
    pub fn derive(&self, name: &str) -> Result<Value> {
        let getter = self
            .getters
            .get(name)
            .ok_or_else(|| ReactiveError::UnknownGetter(name.to_string()))?;
        Ok(getter(&*self.data))
    }

    pub fn changed(&self) -> bool {
        self.changed
    }
}

pub struct Store {
    data: Value,
    getters: HashMap<String, Getter>,
    setters: HashMap<String, Setter>,
    allow_html: bool,
    dirty: bool,
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut getters: Vec<_> = self.getters.keys().collect();
        getters.sort();
        let mut setters: Vec<_> = self.setters.keys().collect();
        setters.sort();
        f.debug_struct("Store")
            .field("getters", &getters)
            .field("setters", &setters)
            .field("allow_html", &self.allow_html)
            .field("dirty", &self.dirty)
            .finish()
    }
}

impl Store {
    pub fn builder(data: Value) -> StoreBuilder {
        StoreBuilder::new(data)
    }

    pub fn get(&self, name: &str) -> Result<Value> {
        let getter = self
            .getters
            .get(name)
            .ok_or_else(|| ReactiveError::UnknownGetter(name.to_string()))?;
        Ok(getter(&self.data))
    }

    /// Runs the named setter. Returns whether it changed the data.
    pub fn dispatch(&mut self, name: &str, args: &[Value]) -> Result<bool> {
        let setter = self
            .setters
            .get(name)
            .ok_or_else(|| ReactiveError::UnknownSetter(name.to_string()))?;
        let mut draft = Draft::new(&mut self.data, &self.getters);
        setter(&mut draft, args);
        let changed = draft.changed();
        self.dirty |= changed;
        debug!(setter = name, changed, "store dispatch");
        Ok(changed)
    }

    /// Direct write outside of a setter.
    pub fn assign(&mut self, path: &str, value: impl Into<Value>) -> bool {
        let mut draft = Draft::new(&mut self.data, &self.getters);
        let changed = draft.set(path, value);
        self.dirty |= changed;
        changed
    }

    pub fn remove(&mut self, path: &str) -> bool {
        let removed = delete_path(&mut self.data, path);
        self.dirty |= removed;
        removed
    }

    /// Escaped deep copy for templates.
    pub fn data(&self) -> Value {
        escape::snapshot(&self.data, self.allow_html)
    }

    pub fn raw(&self) -> &Value {
        &self.data
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub(crate) fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }
}

pub struct StoreBuilder {
    store: Store,
}

impl StoreBuilder {
    pub fn new(data: Value) -> Self {
        Self {
            store: Store {
                data,
                getters: HashMap::new(),
                setters: HashMap::new(),
                allow_html: false,
                dirty: false,
            },
        }
    }

    pub fn getter(mut self, name: &str, getter: impl Fn(&Value) -> Value + 'static) -> Self {
        self.store.getters.insert(name.to_string(), Box::new(getter));
        self
    }

    pub fn setter(
        mut self,
        name: &str,
        setter: impl Fn(&mut Draft<'_>, &[Value]) + 'static,
    ) -> Self {
        self.store.setters.insert(name.to_string(), Box::new(setter));
        self
    }

    pub fn allow_html(mut self, allow: bool) -> Self {
        self.store.allow_html = allow;
        self
    }

    pub fn build(self) -> Store {
        self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn counter_store() -> Store {
        Store::builder(json!({"count": 0, "label": "<b>n</b>", "nested": {"a": 1}}))
            .getter("count", |data| data["count"].clone())
            .getter("double", |data| json!(data["count"].as_i64().unwrap_or(0) * 2))
            .setter("increment", |draft, args| {
                let by = args.first().and_then(Value::as_i64).unwrap_or(1);
                let count = draft.get("count").and_then(Value::as_i64).unwrap_or(0);
                draft.set("count", count + by);
            })
            .setter("touch", |draft, _| {
                let count = draft.get("count").cloned().unwrap_or(Value::Null);
                draft.set("count", count);
            })
            .setter("doubleIntoNested", |draft, _| {
                if let Ok(value) = draft.derive("double") {
                    draft.set("nested.double", value);
                }
            })
            .build()
    }

    #[test]
    fn test_getters_and_unknown_names() {
        let mut store = counter_store();
        assert_eq!(store.get("count").unwrap(), json!(0));
        assert_eq!(
            store.get("missing"),
            Err(ReactiveError::UnknownGetter("missing".into()))
        );
        assert_eq!(
            store.dispatch("missing", &[]),
            Err(ReactiveError::UnknownSetter("missing".into()))
        );
    }

    #[test]
    fn test_dispatch_marks_dirty_only_on_change() {
        let mut store = counter_store();
        assert!(!store.dispatch("touch", &[]).unwrap());
        assert!(!store.is_dirty());
        assert!(store.dispatch("increment", &[json!(5)]).unwrap());
        assert!(store.is_dirty());
        assert_eq!(store.get("count").unwrap(), json!(5));
        assert!(store.take_dirty());
        assert!(!store.is_dirty());
    }

    #[test]
    fn test_setters_can_read_getters() {
        let mut store = counter_store();
        store.dispatch("increment", &[json!(2)]).unwrap();
        store.dispatch("doubleIntoNested", &[]).unwrap();
        assert_eq!(store.raw()["nested"]["double"], json!(4));
        assert_eq!(store.raw()["nested"]["a"], json!(1));
    }

    #[test]
    fn test_assign_and_remove_paths() {
        let mut store = counter_store();
        assert!(!store.assign("nested.a", 1));
        assert!(store.assign("deep.er.value", "x"));
        assert_eq!(lookup(store.raw(), "deep.er.value"), Some(&json!("x")));
        assert!(!store.assign("count.inner", 1));
        assert!(store.remove("nested.a"));
        assert!(!store.remove("nested.a"));
    }

    #[test]
    fn test_data_snapshot_is_escaped() {
        let store = counter_store();
        assert_eq!(store.data()["label"], json!("&lt;b&gt;n&lt;/b&gt;"));
        assert_eq!(store.raw()["label"], json!("<b>n</b>"));
        let raw = Store::builder(json!({"label": "<i>"})).allow_html(true).build();
        assert_eq!(raw.data()["label"], json!("<i>"));
    }

    #[test]
    fn test_merge_reports_changes() {
        let mut data = json!({"timer": {"timerCurrent": "0:00", "timerTotal": "0:00"}});
        let getters = HashMap::new();
        let mut draft = Draft::new(&mut data, &getters);
        let patch = json!({"timerCurrent": "10:05"});
        let Value::Object(patch) = patch else { unreachable!() };
        assert!(draft.merge("timer", patch));
        assert!(draft.changed());
        assert_eq!(data["timer"]["timerCurrent"], json!("10:05"));
    }

    #[test]
    fn test_lookup_into_arrays() {
        let data = json!({"scans": [{"url": "a"}, {"url": "b"}]});
        assert_eq!(lookup(&data, "scans.1.url"), Some(&json!("b")));
        assert_eq!(lookup(&data, "scans.9.url"), None);
        assert_eq!(lookup(&data, ""), Some(&data));
    }
}
