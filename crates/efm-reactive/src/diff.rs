//! Index-aligned diff between parsed template output and the live document.
//!
//! The diff is computed as a list of [`DomPatch`] operations against the
//! current document and then applied in order. Patches only reference nodes
//! that exist before the render; new subtrees are carried whole.

use tracing::debug;

use crate::dom::{
    Document, DomNode, ElementData, NodeId, default_target, is_dynamic_attribute, parse_style,
};
use crate::error::{ReactiveError, Result};
use crate::markup::{VKind, VNode, parse_markup};
use crate::selector::Selector;

#[derive(Debug, Clone, PartialEq)]
pub enum DomPatch {
    /// Detach a live node (used for surplus nodes at the tail).
    Remove { node: NodeId },
    /// Create a template node as the last child of `parent`.
    Append { parent: NodeId, node: VNode },
    /// Swap a live node for a freshly built one of a different type.
    Replace { node: NodeId, with: VNode },
    SetAttribute {
        node: NodeId,
        name: String,
        value: String,
    },
    RemoveAttribute { node: NodeId, name: String },
    /// Whole-value class replacement.
    SetClass { node: NodeId, value: String },
    SetStyle {
        node: NodeId,
        property: String,
        value: String,
    },
    RemoveStyle { node: NodeId, property: String },
    /// Character data of a text or comment node.
    SetText { node: NodeId, text: String },
    ClearChildren { node: NodeId },
    /// Build `nodes` detached and attach them to `parent` in one step.
    AppendFragment { parent: NodeId, nodes: Vec<VNode> },
}

/// Subtrees rendered by someone else (attached child components).
#[derive(Debug, Clone, Default)]
pub struct ExternalOwners {
    selectors: Vec<Selector>,
    nodes: Vec<NodeId>,
}

impl ExternalOwners {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_selector(&mut self, selector: Selector) {
        self.selectors.push(selector);
    }

    pub fn add_node(&mut self, node: NodeId) {
        self.nodes.push(node);
    }

    pub fn is_empty(&self) -> bool {
        self.selectors.is_empty() && self.nodes.is_empty()
    }

    fn owns(&self, document: &Document, node: NodeId) -> bool {
        self.nodes.contains(&node)
            || self
                .selectors
                .iter()
                .any(|selector| document.matches(node, selector))
    }
}

/// Outcome of [`render_into`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RenderSummary {
    pub patches: usize,
}

/// Parses `markup` and patches the children of `target` to match it.
pub fn render_into(
    document: &mut Document,
    target: NodeId,
    markup: &str,
    owners: &ExternalOwners,
) -> Result<RenderSummary> {
    if document.node(target).is_none() {
        return Err(ReactiveError::NotAnElement);
    }
    let template = parse_markup(markup);
    let patches = diff(document, target, &template, owners);
    debug!(patches = patches.len(), "diff computed");
    apply(document, &patches)?;
    Ok(RenderSummary {
        patches: patches.len(),
    })
}

/// Computes the patches that make `parent`'s children match `template`.
pub fn diff(
    document: &Document,
    parent: NodeId,
    template: &[VNode],
    owners: &ExternalOwners,
) -> Vec<DomPatch> {
    let mut patches = Vec::new();
    diff_children(document, parent, template, owners, &mut patches);
    patches
}

pub fn apply(document: &mut Document, patches: &[DomPatch]) -> Result<()> {
    for patch in patches {
        match patch {
            DomPatch::Remove { node } => document.remove_node(*node)?,
            DomPatch::Append { parent, node } => {
                document.append_node(*parent, node)?;
            }
            DomPatch::Replace { node, with } => {
                document.replace_node(*node, with)?;
            }
            DomPatch::SetAttribute { node, name, value } => {
                document.set_attribute(*node, name, value)?
            }
            DomPatch::RemoveAttribute { node, name } => document.remove_attribute(*node, name)?,
            DomPatch::SetClass { node, value } => document.set_attribute(*node, "class", value)?,
            DomPatch::SetStyle {
                node,
                property,
                value,
            } => document.set_style_property(*node, property, value)?,
            DomPatch::RemoveStyle { node, property } => {
                document.remove_style_property(*node, property)?
            }
            DomPatch::SetText { node, text } => document.set_text(*node, text)?,
            DomPatch::ClearChildren { node } => document.clear_children(*node)?,
            DomPatch::AppendFragment { parent, nodes } => {
                document.append_fragment(*parent, nodes)?
            }
        }
    }
    Ok(())
}

fn live_type(node: &DomNode) -> Option<(&str, bool)> {
    match node {
        DomNode::Element(element) => Some((element.tag.as_str(), element.svg)),
        DomNode::Text(_) => Some(("#text", false)),
        DomNode::Comment(_) => Some(("#comment", false)),
        DomNode::Root => None,
    }
}

fn template_type(vnode: &VNode) -> (&str, bool) {
    match &vnode.kind {
        VKind::Element { tag, svg } => (tag.as_str(), *svg),
        _ => (vnode.type_name(), false),
    }
}

fn diff_children(
    document: &Document,
    parent: NodeId,
    template: &[VNode],
    owners: &ExternalOwners,
    patches: &mut Vec<DomPatch>,
) {
    let live = document.children(parent);

    if live.is_empty() {
        if !template.is_empty() {
            patches.push(DomPatch::AppendFragment {
                parent,
                nodes: template.to_vec(),
            });
        }
        return;
    }

    for &surplus in live.iter().skip(template.len()).rev() {
        patches.push(DomPatch::Remove { node: surplus });
    }

    for (index, vnode) in template.iter().enumerate() {
        let Some(&node) = live.get(index) else {
            patches.push(DomPatch::Append {
                parent,
                node: vnode.clone(),
            });
            continue;
        };
        let Some(live_node) = document.node(node) else {
            continue;
        };
        if live_type(live_node) != Some(template_type(vnode)) {
            patches.push(DomPatch::Replace {
                node,
                with: vnode.clone(),
            });
            continue;
        }

        match live_node {
            DomNode::Text(content) | DomNode::Comment(content) => {
                if *content != vnode.content {
                    patches.push(DomPatch::SetText {
                        node,
                        text: vnode.content.clone(),
                    });
                }
            }
            DomNode::Element(element) => {
                if owners.owns(document, node) {
                    continue;
                }
                diff_attributes(node, element, vnode, patches);

                if vnode.children.is_empty() {
                    if !document.children(node).is_empty() {
                        patches.push(DomPatch::ClearChildren { node });
                    }
                } else {
                    diff_children(document, node, &vnode.children, owners, patches);
                }
            }
            DomNode::Root => {}
        }
    }
}

fn dynamic_matches(name: &str, template_value: &str, live: &ElementData) -> bool {
    match name {
        "checked" | "selected" => live.property(name).is_some(),
        _ => live.property(name) == Some(template_value),
    }
}

fn diff_attributes(
    node: NodeId,
    live: &ElementData,
    vnode: &VNode,
    patches: &mut Vec<DomPatch>,
) {
    // Attributes a `default*` template attribute seeded at creation stay put.
    let protected: Vec<&str> = vnode
        .attributes
        .iter()
        .filter_map(|(name, _)| default_target(name))
        .collect();

    for (name, _) in live.attributes() {
        if is_dynamic_attribute(name) || protected.contains(&name.as_str()) {
            continue;
        }
        if vnode.attribute(name).is_none() {
            patches.push(DomPatch::RemoveAttribute {
                node,
                name: name.clone(),
            });
        }
    }

    for (name, value) in &vnode.attributes {
        if default_target(name).is_some() {
            continue;
        }
        match name.as_str() {
            "class" => {
                if live.attribute("class") != Some(value.as_str()) {
                    patches.push(DomPatch::SetClass {
                        node,
                        value: value.clone(),
                    });
                }
            }
            "style" => diff_styles(node, live, value, patches),
            _ if is_dynamic_attribute(name) => {
                if !dynamic_matches(name, value, live) {
                    patches.push(DomPatch::SetAttribute {
                        node,
                        name: name.clone(),
                        value: value.clone(),
                    });
                }
            }
            _ => {
                if live.attribute(name) != Some(value.as_str()) {
                    patches.push(DomPatch::SetAttribute {
                        node,
                        name: name.clone(),
                        value: value.clone(),
                    });
                }
            }
        }
    }
}

fn diff_styles(node: NodeId, live: &ElementData, style: &str, patches: &mut Vec<DomPatch>) {
    let wanted = parse_style(style);
    let current = live.attribute("style").map(parse_style).unwrap_or_default();

    for (property, _) in &current {
        if !wanted.iter().any(|(name, _)| name == property) {
            patches.push(DomPatch::RemoveStyle {
                node,
                property: property.clone(),
            });
        }
    }
    for (property, value) in wanted {
        let unchanged = current
            .iter()
            .any(|(name, existing)| *name == property && *existing == value);
        if !unchanged {
            patches.push(DomPatch::SetStyle {
                node,
                property,
                value,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mount(markup: &str) -> (Document, NodeId) {
        let mut doc = Document::from_markup(r#"<div id="app"></div>"#);
        let app = doc.select("#app").unwrap().unwrap();
        render_into(&mut doc, app, markup, &ExternalOwners::new()).unwrap();
        (doc, app)
    }

    fn patches(doc: &Document, app: NodeId, markup: &str) -> Vec<DomPatch> {
        diff(doc, app, &parse_markup(markup), &ExternalOwners::new())
    }

    #[test]
    fn test_identical_markup_produces_no_mutations() {
        let markup = r#"<ul class="list"><li style="color: red">a</li><li>b</li></ul><!-- end -->"#;
        let (mut doc, app) = mount(markup);
        let before = doc.mutation_count();
        let summary = render_into(&mut doc, app, markup, &ExternalOwners::new()).unwrap();
        assert_eq!(summary.patches, 0);
        assert_eq!(doc.mutation_count(), before);
    }

    #[test]
    fn test_first_render_attaches_everything_once() {
        let (doc, app) = mount("<p>a</p><p>b</p>");
        assert_eq!(doc.mutation_count(), 1);
        assert_eq!(doc.inner_html(app), "<p>a</p><p>b</p>");
    }

    #[test]
    fn test_text_change_only_touches_text() {
        let (doc, app) = mount("<p>10:00</p>");
        let ops = patches(&doc, app, "<p>10:05</p>");
        assert_eq!(ops.len(), 1);
        assert!(matches!(&ops[0], DomPatch::SetText { text, .. } if text == "10:05"));
    }

    #[test]
    fn test_surplus_nodes_removed_from_tail() {
        let (mut doc, app) = mount("<i>1</i><i>2</i><i>3</i>");
        let children = doc.children(app);
        let ops = patches(&doc, app, "<i>1</i>");
        assert_eq!(
            ops,
            vec![
                DomPatch::Remove { node: children[2] },
                DomPatch::Remove { node: children[1] },
            ]
        );
        apply(&mut doc, &ops).unwrap();
        assert_eq!(doc.inner_html(app), "<i>1</i>");
    }

    #[test]
    fn test_missing_nodes_appended_and_type_mismatch_replaced() {
        let (mut doc, app) = mount("<span>a</span>");
        render_into(&mut doc, app, "<p>a</p><b>c</b>", &ExternalOwners::new()).unwrap();
        assert_eq!(doc.inner_html(app), "<p>a</p><b>c</b>");
    }

    #[test]
    fn test_attribute_updates() {
        let (doc, app) = mount(r#"<a class="x" href="1" title="t">l</a>"#);
        let ops = patches(&doc, app, r#"<a class="y" href="2">l</a>"#);
        let link = doc.children(app)[0];
        assert_eq!(
            ops,
            vec![
                DomPatch::RemoveAttribute {
                    node: link,
                    name: "title".into()
                },
                DomPatch::SetClass {
                    node: link,
                    value: "y".into()
                },
                DomPatch::SetAttribute {
                    node: link,
                    name: "href".into(),
                    value: "2".into()
                },
            ]
        );
    }

    #[test]
    fn test_style_diff_is_per_property() {
        let (doc, app) = mount(r#"<div style="top: 0px; left: 1px">x</div>"#);
        let div = doc.children(app)[0];
        let ops = patches(&doc, app, r#"<div style="top:0px;width: 5px">x</div>"#);
        assert_eq!(
            ops,
            vec![
                DomPatch::RemoveStyle {
                    node: div,
                    property: "left".into()
                },
                DomPatch::SetStyle {
                    node: div,
                    property: "width".into(),
                    value: "5px".into()
                },
            ]
        );
    }

    #[test]
    fn test_dynamic_attributes_survive_rerender() {
        let (mut doc, app) = mount(r#"<input class="seek" type="range" value="0">"#);
        let input = doc.children(app)[0];
        doc.set_property(input, "value", "55").unwrap();
        // Template no longer mentions value: user state is kept.
        render_into(&mut doc, app, r#"<input class="seek" type="range">"#, &ExternalOwners::new())
            .unwrap();
        assert_eq!(doc.property(input, "value"), Some("55"));
        // Template states a value: it is reasserted.
        render_into(
            &mut doc,
            app,
            r#"<input class="seek" type="range" value="0">"#,
            &ExternalOwners::new(),
        )
        .unwrap();
        assert_eq!(doc.property(input, "value"), Some("0"));
    }

    #[test]
    fn test_default_attributes_only_seed_new_nodes() {
        let markup = r#"<input class="seek" defaultvalue="0" defaultaria-valuenow="0">"#;
        let (mut doc, app) = mount(markup);
        let input = doc.children(app)[0];
        assert_eq!(doc.attribute(input, "aria-valuenow"), Some("0"));
        doc.set_property(input, "value", "30").unwrap();
        doc.set_attribute(input, "aria-valuenow", "30").unwrap();
        let before = doc.mutation_count();
        render_into(&mut doc, app, markup, &ExternalOwners::new()).unwrap();
        assert_eq!(doc.mutation_count(), before);
        assert_eq!(doc.property(input, "value"), Some("30"));
        assert_eq!(doc.attribute(input, "aria-valuenow"), Some("30"));
    }

    #[test]
    fn test_externally_owned_subtree_is_skipped() {
        let (mut doc, app) = mount(r#"<div class="child"></div><p>x</p>"#);
        let child = doc.children(app)[0];
        render_into(&mut doc, child, "<em>owned</em>", &ExternalOwners::new()).unwrap();

        let mut owners = ExternalOwners::new();
        owners.add_selector(Selector::parse(".child").unwrap());
        render_into(&mut doc, app, r#"<div class="child"></div><p>y</p>"#, &owners).unwrap();
        assert_eq!(doc.inner_html(child), "<em>owned</em>");
        assert_eq!(doc.text_content(app), "ownedy");

        // Without the registration the parent wipes the child's content.
        render_into(&mut doc, app, r#"<div class="child"></div><p>y</p>"#, &ExternalOwners::new())
            .unwrap();
        assert_eq!(doc.inner_html(child), "");
    }

    #[test]
    fn test_svg_children_keep_namespace() {
        let (doc, app) = mount(r#"<svg><rect width="1"></rect></svg>"#);
        let svg = doc.children(app)[0];
        let rect = doc.children(svg)[0];
        assert!(doc.element(rect).unwrap().svg);
        assert!(patches(&doc, app, r#"<svg><rect width="1"></rect></svg>"#).is_empty());
    }
}
