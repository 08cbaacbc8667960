//! Live document model.
//!
//! An arena tree (`ego_tree`) of elements, text and comments that components
//! render into and hosts interact with. Every structural or attribute change
//! goes through a method here and bumps the mutation counter, which is how
//! render minimality is observed.

use std::collections::BTreeMap;
use std::fmt;

pub use ego_tree::NodeId;
use ego_tree::{NodeRef, Tree};
use selectors::OpaqueElement;
use selectors::attr::{AttrSelectorOperation, CaseSensitivity, NamespaceConstraint};
use selectors::matching::{ElementSelectorFlags, MatchingContext};

use crate::error::{ReactiveError, Result};
use crate::markup::{VKind, VNode, parse_markup};
use crate::selector::{AttrValue, DomSelectors, Ident, NoPseudo, Selector};

/// Attributes whose live value is owned by user interaction.
pub const DYNAMIC_ATTRIBUTES: [&str; 3] = ["checked", "selected", "value"];

const DEFAULT_PREFIX: &str = "default";

const VOID_ELEMENTS: [&str; 14] = [
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// Strips the `default` prefix from first-render-only attribute names.
pub fn default_target(name: &str) -> Option<&str> {
    if name.len() > DEFAULT_PREFIX.len() {
        name.strip_prefix(DEFAULT_PREFIX)
    } else {
        None
    }
}

pub fn is_dynamic_attribute(name: &str) -> bool {
    DYNAMIC_ATTRIBUTES.contains(&name)
}

fn is_boolean_property(name: &str) -> bool {
    name == "checked" || name == "selected"
}

/// Splits an inline style into `(property, value)` declarations.
pub fn parse_style(style: &str) -> Vec<(String, String)> {
    style
        .split(';')
        .filter_map(|declaration| {
            let (name, value) = declaration.split_once(':')?;
            let name = name.trim();
            let value = value.trim();
            (!name.is_empty()).then(|| (name.to_ascii_lowercase(), value.to_string()))
        })
        .collect()
}

pub fn serialize_style(declarations: &[(String, String)]) -> String {
    declarations
        .iter()
        .map(|(name, value)| format!("{name}: {value};"))
        .collect::<Vec<_>>()
        .join(" ")
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ElementData {
    pub tag: String,
    pub svg: bool,
    attributes: Vec<(String, String)>,
    properties: BTreeMap<String, String>,
}

impl ElementData {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Self::default()
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn attributes(&self) -> &[(String, String)] {
        &self.attributes
    }

    /// Current value of a dynamic property, falling back to its attribute.
    pub fn property(&self, name: &str) -> Option<&str> {
        self.properties
            .get(name)
            .map(String::as_str)
            .or_else(|| self.attribute(name))
    }

    fn set_attribute(&mut self, name: &str, value: &str) {
        let value = if name == "style" {
            serialize_style(&parse_style(value))
        } else {
            value.to_string()
        };
        if is_dynamic_attribute(name) {
            let property = if is_boolean_property(name) {
                "true".to_string()
            } else {
                value.clone()
            };
            self.properties.insert(name.to_string(), property);
        }
        match self.attributes.iter_mut().find(|(key, _)| key == name) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((name.to_string(), value)),
        }
    }

    fn remove_attribute(&mut self, name: &str) {
        self.attributes.retain(|(key, _)| key != name);
        if is_boolean_property(name) {
            self.properties.remove(name);
        }
    }

    fn style(&self) -> Vec<(String, String)> {
        self.attribute("style").map(parse_style).unwrap_or_default()
    }

    fn write_style(&mut self, declarations: &[(String, String)]) {
        if declarations.is_empty() {
            self.remove_attribute("style");
        } else {
            let serialized = serialize_style(declarations);
            self.set_attribute("style", &serialized);
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DomNode {
    Root,
    Element(ElementData),
    Text(String),
    Comment(String),
}

impl DomNode {
    pub fn as_element(&self) -> Option<&ElementData> {
        match self {
            DomNode::Element(element) => Some(element),
            _ => None,
        }
    }

    fn from_vnode(vnode: &VNode) -> Self {
        match &vnode.kind {
            VKind::Text => DomNode::Text(vnode.content.clone()),
            VKind::Comment => DomNode::Comment(vnode.content.clone()),
            VKind::Element { tag, svg } => {
                let mut element = ElementData::new(tag.clone());
                element.svg = *svg;
                for (name, value) in &vnode.attributes {
                    let name = default_target(name).unwrap_or(name);
                    element.set_attribute(name, value);
                }
                DomNode::Element(element)
            }
        }
    }
}

/// Borrowed view of an element, used for selector matching.
#[derive(Clone, Copy)]
pub struct ElementView<'a> {
    node: NodeRef<'a, DomNode>,
    data: &'a ElementData,
}

impl<'a> ElementView<'a> {
    fn new(node: NodeRef<'a, DomNode>) -> Option<Self> {
        node.value().as_element().map(|data| Self { node, data })
    }

    pub fn id(&self) -> NodeId {
        self.node.id()
    }

    fn classes(&self) -> impl Iterator<Item = &'a str> {
        self.data
            .attribute("class")
            .unwrap_or_default()
            .split_ascii_whitespace()
    }
}

impl fmt::Debug for ElementView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElementView")
            .field("id", &self.node.id())
            .field("tag", &self.data.tag)
            .finish()
    }
}

fn case_eq(a: &str, b: &str, case: CaseSensitivity) -> bool {
    match case {
        CaseSensitivity::CaseSensitive => a == b,
        CaseSensitivity::AsciiCaseInsensitive => a.eq_ignore_ascii_case(b),
    }
}

impl<'a> selectors::Element for ElementView<'a> {
    type Impl = DomSelectors;

    fn opaque(&self) -> OpaqueElement {
        OpaqueElement::new(self.node.value())
    }

    fn parent_element(&self) -> Option<Self> {
        self.node.parent().and_then(ElementView::new)
    }

    fn parent_node_is_shadow_root(&self) -> bool {
        false
    }

    fn containing_shadow_host(&self) -> Option<Self> {
        None
    }

    fn is_pseudo_element(&self) -> bool {
        false
    }

    fn prev_sibling_element(&self) -> Option<Self> {
        self.node.prev_siblings().find_map(ElementView::new)
    }

    fn next_sibling_element(&self) -> Option<Self> {
        self.node.next_siblings().find_map(ElementView::new)
    }

    fn first_element_child(&self) -> Option<Self> {
        self.node.children().find_map(ElementView::new)
    }

    fn is_html_element_in_html_document(&self) -> bool {
        !self.data.svg
    }

    fn has_local_name(&self, name: &str) -> bool {
        self.data.tag.eq_ignore_ascii_case(name)
    }

    fn has_namespace(&self, _ns: &str) -> bool {
        true
    }

    fn is_same_type(&self, other: &Self) -> bool {
        self.data.tag.eq_ignore_ascii_case(&other.data.tag)
    }

    fn attr_matches(
        &self,
        _ns: &NamespaceConstraint<&Ident>,
        local_name: &Ident,
        operation: &AttrSelectorOperation<&AttrValue>,
    ) -> bool {
        self.data
            .attribute(local_name.as_ref())
            .is_some_and(|value| operation.eval_str(value))
    }

    fn match_non_ts_pseudo_class(
        &self,
        pc: &NoPseudo,
        _context: &mut MatchingContext<DomSelectors>,
    ) -> bool {
        match *pc {}
    }

    fn match_pseudo_element(
        &self,
        pe: &NoPseudo,
        _context: &mut MatchingContext<DomSelectors>,
    ) -> bool {
        match *pe {}
    }

    fn apply_selector_flags(&self, _flags: ElementSelectorFlags) {}

    fn is_link(&self) -> bool {
        self.data.tag.eq_ignore_ascii_case("a") && self.data.attribute("href").is_some()
    }

    fn is_html_slot_element(&self) -> bool {
        false
    }

    fn imported_part(&self, _name: &Ident) -> Option<Ident> {
        None
    }

    fn is_part(&self, _name: &Ident) -> bool {
        false
    }

    fn has_id(&self, id: &Ident, case: CaseSensitivity) -> bool {
        self.data
            .attribute("id")
            .is_some_and(|value| case_eq(value, id.as_ref(), case))
    }

    fn has_class(&self, name: &Ident, case: CaseSensitivity) -> bool {
        self.classes().any(|class| case_eq(class, name.as_ref(), case))
    }

    fn is_empty(&self) -> bool {
        self.node.children().all(|child| match child.value() {
            DomNode::Element(_) => false,
            DomNode::Text(text) => text.is_empty(),
            _ => true,
        })
    }

    fn is_root(&self) -> bool {
        self.node
            .parent()
            .is_some_and(|parent| matches!(parent.value(), DomNode::Root))
    }
}

#[derive(Debug, Clone)]
pub struct Document {
    tree: Tree<DomNode>,
    mutations: u64,
    orphans: usize,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    pub fn new() -> Self {
        Self {
            tree: Tree::new(DomNode::Root),
            mutations: 0,
            orphans: 0,
        }
    }

    /// Builds a document whose root holds the parsed markup.
    pub fn from_markup(markup: &str) -> Self {
        let mut document = Self::new();
        let root = document.root();
        for vnode in parse_markup(markup) {
            // The root always exists, so building under it cannot fail.
            let _ = document.build(root, &vnode);
        }
        document.mutations = 0;
        document
    }

    pub fn root(&self) -> NodeId {
        self.tree.root().id()
    }

    pub fn mutation_count(&self) -> u64 {
        self.mutations
    }

    /// Nodes removed from the tree whose arena slots are still allocated.
    ///
    /// `ego_tree` never frees a detached node, and handed-out [`NodeId`]s must
    /// stay valid, so removed subtrees live as long as the document. Hosts that
    /// re-render large regions for a long time can watch this number.
    pub fn orphaned_nodes(&self) -> usize {
        self.orphans
    }

    pub fn node(&self, id: NodeId) -> Option<&DomNode> {
        self.tree.get(id).map(|node| node.value())
    }

    pub fn element(&self, id: NodeId) -> Option<&ElementData> {
        self.node(id).and_then(DomNode::as_element)
    }

    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        self.tree
            .get(id)
            .map(|node| node.children().map(|child| child.id()).collect())
            .unwrap_or_default()
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.tree.get(id)?.parent().map(|parent| parent.id())
    }

    /// Whether the node is still reachable from the root.
    pub fn is_attached(&self, id: NodeId) -> bool {
        let root = self.root();
        id == root
            || self
                .tree
                .get(id)
                .map(|node| node.ancestors().any(|ancestor| ancestor.id() == root))
                .unwrap_or(false)
    }

    pub fn attribute(&self, id: NodeId, name: &str) -> Option<&str> {
        self.element(id)?.attribute(name)
    }

    pub fn property(&self, id: NodeId, name: &str) -> Option<&str> {
        self.element(id)?.property(name)
    }

    pub fn style_property(&self, id: NodeId, name: &str) -> Option<String> {
        self.element(id)?
            .style()
            .into_iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    pub fn view(&self, id: NodeId) -> Option<ElementView<'_>> {
        self.tree.get(id).and_then(ElementView::new)
    }

    pub fn matches(&self, id: NodeId, selector: &Selector) -> bool {
        self.view(id).map(|view| selector.matches(&view)).unwrap_or(false)
    }

    /// First element under `scope` (excluding `scope` itself) matching the selector.
    pub fn query_selector_in(&self, scope: NodeId, selector: &Selector) -> Option<NodeId> {
        self.tree.get(scope)?.descendants().skip(1).find_map(|node| {
            ElementView::new(node)
                .filter(|view| selector.matches(view))
                .map(|view| view.id())
        })
    }

    pub fn query_selector(&self, selector: &Selector) -> Option<NodeId> {
        self.query_selector_in(self.root(), selector)
    }

    pub fn query_selector_all(&self, scope: NodeId, selector: &Selector) -> Vec<NodeId> {
        let Some(scope) = self.tree.get(scope) else {
            return Vec::new();
        };
        scope
            .descendants()
            .skip(1)
            .filter_map(ElementView::new)
            .filter(|view| selector.matches(view))
            .map(|view| view.id())
            .collect()
    }

    /// Parses `selector` and returns the first match in the document.
    pub fn select(&self, selector: &str) -> Result<Option<NodeId>> {
        Ok(self.query_selector(&Selector::parse(selector)?))
    }

    /// Nearest inclusive ancestor matching the selector.
    pub fn closest(&self, id: NodeId, selector: &Selector) -> Option<NodeId> {
        let node = self.tree.get(id)?;
        std::iter::once(node)
            .chain(node.ancestors())
            .filter_map(ElementView::new)
            .find(|view| selector.matches(view))
            .map(|view| view.id())
    }

    pub fn text_content(&self, id: NodeId) -> String {
        let Some(node) = self.tree.get(id) else {
            return String::new();
        };
        node.descendants()
            .filter_map(|node| match node.value() {
                DomNode::Text(text) => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn inner_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        if let Some(node) = self.tree.get(id) {
            for child in node.children() {
                write_html(child, &mut out);
            }
        }
        out
    }

    pub fn outer_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        if let Some(node) = self.tree.get(id) {
            write_html(node, &mut out);
        }
        out
    }

    // Mutations.

    fn bump(&mut self) {
        self.mutations += 1;
    }

    fn with_element<R>(
        &mut self,
        id: NodeId,
        f: impl FnOnce(&mut ElementData) -> R,
    ) -> Result<R> {
        let mut node = self.tree.get_mut(id).ok_or(ReactiveError::NotAnElement)?;
        let result = match node.value() {
            DomNode::Element(element) => f(element),
            _ => return Err(ReactiveError::NotAnElement),
        };
        self.bump();
        Ok(result)
    }

    /// Creates the subtree for `vnode` as the last child of `parent`.
    fn build(&mut self, parent: NodeId, vnode: &VNode) -> Result<NodeId> {
        let id = {
            let mut parent = self.tree.get_mut(parent).ok_or(ReactiveError::NotAnElement)?;
            parent.append(DomNode::from_vnode(vnode)).id()
        };
        for child in &vnode.children {
            self.build(id, child)?;
        }
        Ok(id)
    }

    pub fn append_node(&mut self, parent: NodeId, vnode: &VNode) -> Result<NodeId> {
        let id = self.build(parent, vnode)?;
        self.bump();
        Ok(id)
    }

    /// Appends all nodes as one attach operation.
    pub fn append_fragment(&mut self, parent: NodeId, nodes: &[VNode]) -> Result<()> {
        for vnode in nodes {
            self.build(parent, vnode)?;
        }
        self.bump();
        Ok(())
    }

    pub fn replace_node(&mut self, id: NodeId, vnode: &VNode) -> Result<NodeId> {
        let new_id = {
            let mut old = self.tree.get_mut(id).ok_or(ReactiveError::NotAnElement)?;
            old.insert_before(DomNode::from_vnode(vnode)).id()
        };
        for child in &vnode.children {
            self.build(new_id, child)?;
        }
        self.detach_subtree(id)?;
        self.bump();
        Ok(new_id)
    }

    pub fn remove_node(&mut self, id: NodeId) -> Result<()> {
        self.detach_subtree(id)?;
        self.bump();
        Ok(())
    }

    pub fn clear_children(&mut self, id: NodeId) -> Result<()> {
        for child in self.children(id) {
            self.detach_subtree(child)?;
        }
        self.bump();
        Ok(())
    }

    /// Unlinks a subtree. Its arena slots stay allocated and are counted in
    /// [`Document::orphaned_nodes`].
    fn detach_subtree(&mut self, id: NodeId) -> Result<()> {
        let node = self.tree.get(id).ok_or(ReactiveError::NotAnElement)?;
        if node.parent().is_none() {
            return Ok(());
        }
        self.orphans += node.descendants().count();
        if let Some(mut node) = self.tree.get_mut(id) {
            node.detach();
        }
        Ok(())
    }

    pub fn set_attribute(&mut self, id: NodeId, name: &str, value: &str) -> Result<()> {
        self.with_element(id, |element| element.set_attribute(name, value))
    }

    pub fn remove_attribute(&mut self, id: NodeId, name: &str) -> Result<()> {
        self.with_element(id, |element| element.remove_attribute(name))
    }

    /// Sets a dynamic property without touching the attribute, as user input does.
    pub fn set_property(&mut self, id: NodeId, name: &str, value: &str) -> Result<()> {
        self.with_element(id, |element| {
            element.properties.insert(name.to_string(), value.to_string());
        })
    }

    pub fn set_style_property(&mut self, id: NodeId, name: &str, value: &str) -> Result<()> {
        self.with_element(id, |element| {
            let mut declarations = element.style();
            match declarations.iter_mut().find(|(key, _)| key == name) {
                Some(slot) => slot.1 = value.to_string(),
                None => declarations.push((name.to_string(), value.to_string())),
            }
            element.write_style(&declarations);
        })
    }

    pub fn remove_style_property(&mut self, id: NodeId, name: &str) -> Result<()> {
        self.with_element(id, |element| {
            let mut declarations = element.style();
            declarations.retain(|(key, _)| key != name);
            element.write_style(&declarations);
        })
    }

    /// Replaces character data of a text or comment node.
    pub fn set_text(&mut self, id: NodeId, text: &str) -> Result<()> {
        let mut node = self.tree.get_mut(id).ok_or(ReactiveError::NotAnElement)?;
        match node.value() {
            DomNode::Text(content) | DomNode::Comment(content) => *content = text.to_string(),
            _ => return Err(ReactiveError::NotAnElement),
        }
        self.bump();
        Ok(())
    }
}

fn escape_text(text: &str, out: &mut String) {
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
}

fn escape_attribute(value: &str, out: &mut String) {
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
}

fn write_html(node: NodeRef<'_, DomNode>, out: &mut String) {
    match node.value() {
        DomNode::Root => {
            for child in node.children() {
                write_html(child, out);
            }
        }
        DomNode::Text(text) => escape_text(text, out),
        DomNode::Comment(comment) => {
            out.push_str("<!--");
            out.push_str(comment);
            out.push_str("-->");
        }
        DomNode::Element(element) => {
            out.push('<');
            out.push_str(&element.tag);
            for (name, value) in &element.attributes {
                out.push(' ');
                out.push_str(name);
                out.push_str("=\"");
                escape_attribute(value, out);
                out.push('"');
            }
            out.push('>');
            if !element.svg && VOID_ELEMENTS.contains(&element.tag.as_str()) {
                return;
            }
            for child in node.children() {
                write_html(child, out);
            }
            out.push_str("</");
            out.push_str(&element.tag);
            out.push('>');
        }
    }
}
