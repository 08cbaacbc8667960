//! Error types for the reactive core.

use thiserror::Error;

/// Result type for store, component and render operations.
pub type Result<T> = std::result::Result<T, ReactiveError>;

/// Errors raised by the store, the component registry and the renderer.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ReactiveError {
    /// `get` named a getter the store does not define.
    #[error("unknown getter: {0}")]
    UnknownGetter(String),

    /// `dispatch` named a setter the store does not define.
    #[error("unknown setter: {0}")]
    UnknownSetter(String),

    /// Attaching would make a component (transitively) depend on itself.
    #[error("attach cycle: component {child} already renders component {parent}")]
    AttachCycle { parent: usize, child: usize },

    /// A component was declared without a template.
    #[error("component bound to '{0}' has no template")]
    MissingTemplate(String),

    /// The component's target could not be resolved in the document.
    #[error("render target not found: {0}")]
    TargetNotFound(String),

    /// Selector text could not be parsed.
    #[error("invalid selector: {0}")]
    InvalidSelector(String),

    /// Referenced component id does not exist.
    #[error("unknown component id {0}")]
    UnknownComponent(usize),

    /// Referenced store id does not exist.
    #[error("unknown store id {0}")]
    UnknownStore(usize),

    /// `set_data` on a component whose data lives in a store.
    #[error("component {0} is bound to a store; mutate it through a setter")]
    StoreBound(usize),

    /// Referenced node is missing or not an element.
    #[error("node is not an element in this document")]
    NotAnElement,
}
