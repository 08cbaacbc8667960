//! Template markup parsing.
//!
//! Templates produce HTML strings; this module turns them into a detached
//! [`VNode`] tree the differ can compare against the live document. Parsing is
//! delegated to `scraper` (html5ever), which recovers from malformed input the
//! way a browser does, so [`parse_markup`] never fails.

use ego_tree::NodeRef;
use scraper::{Html, Node};
use serde::{Deserialize, Serialize};

pub const SVG_NAMESPACE: &str = "http://www.w3.org/2000/svg";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VKind {
    Element { tag: String, svg: bool },
    Text,
    Comment,
}

/// One node of parsed template output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VNode {
    pub kind: VKind,
    /// Character data for text and comment nodes; empty for elements.
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub attributes: Vec<(String, String)>,
    #[serde(default)]
    pub children: Vec<VNode>,
}

impl VNode {
    pub fn element(tag: impl Into<String>) -> Self {
        Self {
            kind: VKind::Element {
                tag: tag.into(),
                svg: false,
            },
            content: String::new(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn text(content: impl Into<String>) -> Self {
        Self {
            kind: VKind::Text,
            content: content.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((name.into(), value.into()));
        self
    }

    pub fn with_child(mut self, child: VNode) -> Self {
        self.children.push(child);
        self
    }

    /// Node type used for the replace check: the tag name, `#text` or `#comment`.
    pub fn type_name(&self) -> &str {
        match &self.kind {
            VKind::Element { tag, .. } => tag,
            VKind::Text => "#text",
            VKind::Comment => "#comment",
        }
    }

    pub fn is_element(&self) -> bool {
        matches!(self.kind, VKind::Element { .. })
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

/// Parses template output as an HTML fragment.
pub fn parse_markup(markup: &str) -> Vec<VNode> {
    let fragment = Html::parse_fragment(markup);
    fragment
        .root_element()
        .children()
        .filter_map(convert_node)
        .collect()
}

fn convert_node(node: NodeRef<'_, Node>) -> Option<VNode> {
    match node.value() {
        Node::Element(element) => {
            let svg = &*element.name.ns == SVG_NAMESPACE;
            let attributes = element
                .attrs()
                .map(|(name, value)| (name.to_string(), value.to_string()))
                .collect();
            let children = node.children().filter_map(convert_node).collect();
            Some(VNode {
                kind: VKind::Element {
                    tag: element.name().to_string(),
                    svg,
                },
                content: String::new(),
                attributes,
                children,
            })
        }
        Node::Text(text) => {
            let content: &str = text;
            Some(VNode::text(content))
        }
        Node::Comment(comment) => {
            let content: &str = comment;
            Some(VNode {
                kind: VKind::Comment,
                content: content.to_string(),
                attributes: Vec::new(),
                children: Vec::new(),
            })
        }
        // Doctype and processing instructions have no place in a fragment.
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_elements_text_and_comments() {
        let nodes = parse_markup(r#"<div class="a" data-x="1">hi</div> <!-- /.a -->"#);
        assert_eq!(nodes.len(), 3);
        assert_eq!(nodes[0].type_name(), "div");
        assert_eq!(nodes[0].attribute("class"), Some("a"));
        assert_eq!(nodes[0].attribute("data-x"), Some("1"));
        assert_eq!(nodes[0].children, vec![VNode::text("hi")]);
        assert_eq!(nodes[1].kind, VKind::Text);
        assert_eq!(nodes[2].kind, VKind::Comment);
        assert_eq!(nodes[2].content, " /.a ");
    }

    #[test]
    fn test_svg_namespace_flag() {
        let nodes = parse_markup(r#"<svg class="s"><rect width="1"/></svg>"#);
        match &nodes[0].kind {
            VKind::Element { tag, svg } => {
                assert_eq!(tag, "svg");
                assert!(*svg);
            }
            other => panic!("unexpected node {other:?}"),
        }
        assert!(matches!(nodes[0].children[0].kind, VKind::Element { svg: true, .. }));
    }

    #[test]
    fn test_malformed_markup_is_recovered() {
        let nodes = parse_markup("<div><span>open");
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].children[0].type_name(), "span");
        assert_eq!(nodes[0].children[0].children[0].content, "open");
        assert!(parse_markup("").is_empty());
    }

    #[test]
    fn test_attribute_order_is_preserved() {
        let nodes = parse_markup(r#"<input type="range" min="0" max="100" value="0">"#);
        let names: Vec<_> = nodes[0].attributes.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(names, ["type", "min", "max", "value"]);
    }
}
