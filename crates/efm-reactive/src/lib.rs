//! Reactive store, template differ and component runtime.
//!
//! Templates are pure functions from a data snapshot to HTML. Components bind a
//! template to a node of a [`Document`]; a [`Store`] holds shared data that is
//! mutated through named setters. The [`Runtime`] coalesces writes and renders
//! each affected component once per frame, patching the document with the
//! minimal set of changes found by the [`diff`] module.

pub mod component;
pub mod diff;
pub mod dom;
pub mod error;
pub mod escape;
pub mod markup;
pub mod runtime;
pub mod selector;
pub mod store;

pub use component::{ComponentId, ComponentSpec, DataSource, StoreId, Target, Template};
pub use diff::{DomPatch, ExternalOwners, RenderSummary, render_into};
pub use dom::{Document, DomNode, ElementData, NodeId};
pub use error::{ReactiveError, Result};
pub use markup::{VKind, VNode, parse_markup};
pub use runtime::{FrameReport, RenderEvent, Runtime};
pub use selector::Selector;
pub use store::{Draft, Store, StoreBuilder};
