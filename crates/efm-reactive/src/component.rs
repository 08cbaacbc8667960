//! Component declarations: a template bound to a target node and a data source.

use std::fmt;

use serde_json::Value;

use crate::dom::{Document, NodeId};
use crate::error::{ReactiveError, Result};
use crate::selector::Selector;

/// Pure function from a data snapshot to markup.
pub type Template = Box<dyn Fn(&Value) -> String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentId(pub(crate) usize);

impl ComponentId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "component#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StoreId(pub(crate) usize);

impl StoreId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Where a component renders.
#[derive(Debug, Clone, PartialEq)]
pub enum Target {
    Selector(Selector),
    Node(NodeId),
}

impl Target {
    pub fn selector(source: &str) -> Result<Self> {
        Ok(Target::Selector(Selector::parse(source)?))
    }

    pub fn resolve(&self, document: &Document) -> Result<NodeId> {
        match self {
            Target::Selector(selector) => document
                .query_selector(selector)
                .ok_or_else(|| ReactiveError::TargetNotFound(selector.to_string())),
            Target::Node(node) if document.is_attached(*node) => Ok(*node),
            Target::Node(node) => Err(ReactiveError::TargetNotFound(format!("{node:?}"))),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Selector(selector) => write!(f, "{selector}"),
            Target::Node(node) => write!(f, "{node:?}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DataSource {
    Local(Value),
    Store(StoreId),
}

/// Declaration handed to [`Runtime::add_component`](crate::Runtime::add_component).
pub struct ComponentSpec {
    pub(crate) target: Target,
    pub(crate) template: Option<Template>,
    pub(crate) data: DataSource,
    pub(crate) allow_html: bool,
}

impl ComponentSpec {
    pub fn new(target: Target) -> Self {
        Self {
            target,
            template: None,
            data: DataSource::Local(Value::Null),
            allow_html: false,
        }
    }

    pub fn template(mut self, template: impl Fn(&Value) -> String + 'static) -> Self {
        self.template = Some(Box::new(template));
        self
    }

    pub fn local(mut self, data: Value) -> Self {
        self.data = DataSource::Local(data);
        self
    }

    pub fn store(mut self, store: StoreId) -> Self {
        self.data = DataSource::Store(store);
        self
    }

    pub fn allow_html(mut self, allow: bool) -> Self {
        self.allow_html = allow;
        self
    }
}

pub(crate) struct Component {
    pub(crate) target: Target,
    pub(crate) template: Template,
    pub(crate) data: DataSource,
    pub(crate) allow_html: bool,
    pub(crate) attached: Vec<ComponentId>,
    pub(crate) renders: u64,
}

impl Component {
    pub(crate) fn from_spec(spec: ComponentSpec) -> Result<Self> {
        let template = spec
            .template
            .ok_or_else(|| ReactiveError::MissingTemplate(spec.target.to_string()))?;
        Ok(Self {
            target: spec.target,
            template,
            data: spec.data,
            allow_html: spec.allow_html,
            attached: Vec::new(),
            renders: 0,
        })
    }
}
