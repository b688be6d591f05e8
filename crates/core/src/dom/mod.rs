use html5ever::parse_document;
use html5ever::tendril::TendrilSink;
use html5ever::tree_builder::TreeBuilderOpts;
use html5ever::ParseOpts;
use markup5ever_rcdom::{Handle, NodeData, RcDom};
use std::collections::HashMap;

/// A node in our DOM tree. Minimal: only what the extractors read.
#[derive(Debug, Clone)]
pub struct DomNode {
    pub tag: String,
    pub attributes: HashMap<String, String>,
    pub text: String,
    pub children: Vec<DomNode>,
    pub node_type: NodeType,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeType {
    Element,
    Text,
    Document,
}

/// An element together with its immediate surroundings, as seen during
/// [`DomNode::walk`]. Sibling links skip text nodes.
#[derive(Debug, Clone, Copy)]
pub struct NodeContext<'a> {
    pub node: &'a DomNode,
    pub prev_sibling: Option<&'a DomNode>,
    pub next_sibling: Option<&'a DomNode>,
    pub parent_prev_sibling: Option<&'a DomNode>,
}

impl DomNode {
    pub fn new_element(tag: &str) -> Self {
        Self {
            tag: tag.to_string(),
            attributes: HashMap::new(),
            text: String::new(),
            children: Vec::new(),
            node_type: NodeType::Element,
        }
    }

    pub fn new_text(text: &str) -> Self {
        Self {
            tag: String::new(),
            attributes: HashMap::new(),
            text: text.to_string(),
            children: Vec::new(),
            node_type: NodeType::Text,
        }
    }

    pub fn new_document() -> Self {
        Self {
            tag: String::new(),
            attributes: HashMap::new(),
            text: String::new(),
            children: Vec::new(),
            node_type: NodeType::Document,
        }
    }

    pub fn is_element(&self) -> bool {
        self.node_type == NodeType::Element
    }

    pub fn get_attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(|s| s.as_str())
    }

    /// Whitespace-separated entries of the `class` attribute.
    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.get_attr("class").unwrap_or("").split_whitespace()
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes().any(|c| c == class)
    }

    /// Get the visible text content of this node and all children.
    pub fn text_content(&self) -> String {
        let mut result = String::new();
        self.collect_text(&mut result);
        result.trim().to_string()
    }

    /// Text content, or `None` when it is blank.
    pub fn text_opt(&self) -> Option<String> {
        let text = self.text_content();
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }

    fn collect_text(&self, out: &mut String) {
        match self.node_type {
            NodeType::Text => {
                let trimmed = self.text.trim();
                if !trimmed.is_empty() {
                    if !out.is_empty() && !out.ends_with(' ') {
                        out.push(' ');
                    }
                    out.push_str(trimmed);
                }
            }
            _ => {
                for child in &self.children {
                    child.collect_text(out);
                }
            }
        }
    }

    /// Element children only, in document order.
    pub fn element_children(&self) -> impl Iterator<Item = &DomNode> {
        self.children.iter().filter(|c| c.is_element())
    }

    /// Visit every element below (and including) this node in document order.
    pub fn walk<'a>(&'a self, visit: &mut dyn FnMut(NodeContext<'a>)) {
        if self.is_element() {
            visit(NodeContext {
                node: self,
                prev_sibling: None,
                next_sibling: None,
                parent_prev_sibling: None,
            });
        }
        self.walk_children(None, visit);
    }

    fn walk_children<'a>(
        &'a self,
        own_prev: Option<&'a DomNode>,
        visit: &mut dyn FnMut(NodeContext<'a>),
    ) {
        let elements: Vec<&DomNode> = self.element_children().collect();
        for (i, child) in elements.iter().enumerate() {
            let prev = if i > 0 { elements.get(i - 1).copied() } else { None };
            visit(NodeContext {
                node: child,
                prev_sibling: prev,
                next_sibling: elements.get(i + 1).copied(),
                parent_prev_sibling: own_prev,
            });
            child.walk_children(prev, visit);
        }
    }

    /// All elements with the given tag name, in document order.
    pub fn find_all_by_tag(&self, tag: &str) -> Vec<&DomNode> {
        let mut found = Vec::new();
        self.walk(&mut |ctx| {
            if ctx.node.tag == tag {
                found.push(ctx.node);
            }
        });
        found
    }

    /// Text of the document's `<title>` element.
    pub fn title(&self) -> Option<String> {
        self.find_all_by_tag("title")
            .into_iter()
            .find_map(|t| t.text_opt())
    }
}

/// Parse an HTML string into a DomNode tree.
pub fn parse_html(html: &str) -> DomNode {
    let opts = ParseOpts {
        tree_builder: TreeBuilderOpts {
            drop_doctype: true,
            ..Default::default()
        },
        ..Default::default()
    };

    // Reading from an in-memory slice cannot fail.
    let dom = parse_document(RcDom::default(), opts)
        .from_utf8()
        .read_from(&mut html.as_bytes())
        .unwrap_or_default();

    convert_node(&dom.document)
}

fn convert_node(handle: &Handle) -> DomNode {
    match &handle.data {
        NodeData::Document => {
            let mut doc = DomNode::new_document();
            for child in handle.children.borrow().iter() {
                doc.children.push(convert_node(child));
            }
            doc
        }
        NodeData::Element { name, attrs, .. } => {
            let tag = name.local.to_string();

            let mut node = DomNode::new_element(&tag);
            for attr in attrs.borrow().iter() {
                node.attributes
                    .insert(attr.name.local.to_string(), attr.value.to_string());
            }

            // Script and style bodies never contribute page text; scripts are
            // scanned on the raw HTML instead.
            if tag == "script" || tag == "style" || tag == "noscript" {
                return node;
            }

            for child in handle.children.borrow().iter() {
                let child_node = convert_node(child);
                if child_node.node_type == NodeType::Text && child_node.text.trim().is_empty() {
                    continue;
                }
                node.children.push(child_node);
            }
            node
        }
        NodeData::Text { contents } => {
            let text = contents.borrow().to_string();
            DomNode::new_text(&text)
        }
        _ => DomNode::new_document(), // Comments, PIs, doctypes → ignored
    }
}
