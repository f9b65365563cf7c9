use super::{BoxSize, CssPosition, DocumentDom, NodeId, ScriptBlock};

/// Arena-backed element tree with just enough fidelity for the repair pipeline: tags,
/// attributes, inline-style dimensions, and per-element text.
///
/// Layout is approximated from inline styles and `width`/`height` attributes; elements
/// without an explicit size report an unknown bounding box rather than `0×0`, so the
/// classifier does not over-exclude documents that size their charts from stylesheets.
#[derive(Debug, Clone)]
pub struct HeadlessDom {
    nodes: Vec<Node>,
    root: NodeId,
}

#[derive(Debug, Clone)]
struct Node {
    tag: String,
    attrs: Vec<(String, String)>,
    /// Direct text of the element (children's text is not folded in here).
    text: String,
    children: Vec<NodeId>,
    parent: Option<NodeId>,
    detached: bool,
}

impl Node {
    fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_ascii_lowercase(),
            attrs: Vec::new(),
            text: String::new(),
            children: Vec::new(),
            parent: None,
            detached: false,
        }
    }
}

impl HeadlessDom {
    /// An empty `<html><head></head><body></body></html>` document.
    pub fn new() -> Self {
        let mut dom = Self {
            nodes: vec![Node::new("html")],
            root: NodeId(0),
        };
        let head = dom.create_element("head");
        dom.append_child(dom.root, head);
        let body = dom.create_element("body");
        dom.append_child(dom.root, body);
        dom
    }

    pub(super) fn from_root(tag: &str) -> Self {
        Self {
            nodes: vec![Node::new(tag)],
            root: NodeId(0),
        }
    }

    fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.index()]
    }

    pub fn body(&self) -> Option<NodeId> {
        self.children(self.root)
            .iter()
            .copied()
            .find(|&c| self.tag(c) == "body")
    }

    /// Direct (non-recursive) text of the element.
    pub fn own_text(&self, node: NodeId) -> &str {
        &self.node(node).text
    }

    pub fn append_text(&mut self, node: NodeId, text: &str) {
        self.node_mut(node).text.push_str(text);
    }

    fn style_value(&self, node: NodeId, property: &str) -> Option<String> {
        let style = self.attr(node, "style")?;
        for decl in style.split(';') {
            let mut parts = decl.splitn(2, ':');
            let name = parts.next()?.trim();
            let value = parts.next()?.trim();
            if name.eq_ignore_ascii_case(property) {
                return Some(value.to_string());
            }
        }
        None
    }

    fn px_dimension(&self, node: NodeId, property: &str) -> Option<f64> {
        if let Some(value) = self.style_value(node, property) {
            return parse_px(&value);
        }
        // width="400" / height="300" presentation attributes.
        self.attr(node, property).and_then(|v| v.trim().parse().ok())
    }

    /// Serializes the tree back to HTML. Scripts and styles keep their raw text; all other
    /// text is entity-escaped.
    pub fn to_html(&self) -> String {
        let mut out = String::from("<!DOCTYPE html>");
        self.write_node(self.root, &mut out);
        out
    }

    fn write_node(&self, id: NodeId, out: &mut String) {
        let node = self.node(id);
        out.push('<');
        out.push_str(&node.tag);
        for (name, value) in &node.attrs {
            out.push(' ');
            out.push_str(name);
            out.push_str("=\"");
            out.push_str(&escape_attr(value));
            out.push('"');
        }
        out.push('>');
        if is_void_tag(&node.tag) {
            return;
        }
        if matches!(node.tag.as_str(), "script" | "style") {
            out.push_str(&node.text);
        } else if !node.text.is_empty() {
            out.push_str(&escape_text(&node.text));
        }
        for &child in &node.children {
            self.write_node(child, out);
        }
        out.push_str("</");
        out.push_str(&node.tag);
        out.push('>');
    }

    fn collect_descendants(&self, id: NodeId, out: &mut Vec<NodeId>) {
        for &child in &self.node(id).children {
            out.push(child);
            self.collect_descendants(child, out);
        }
    }
}

impl Default for HeadlessDom {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentDom for HeadlessDom {
    fn root(&self) -> NodeId {
        self.root
    }

    fn tag(&self, node: NodeId) -> &str {
        &self.node(node).tag
    }

    fn attr(&self, node: NodeId, name: &str) -> Option<&str> {
        self.node(node)
            .attrs
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.node(node).parent
    }

    fn children(&self, node: NodeId) -> &[NodeId] {
        &self.node(node).children
    }

    fn bounding_box(&self, node: NodeId) -> Option<BoxSize> {
        let width = self.px_dimension(node, "width")?;
        let height = self.px_dimension(node, "height")?;
        Some(BoxSize { width, height })
    }

    fn computed_position(&self, node: NodeId) -> CssPosition {
        match self.style_value(node, "position").as_deref() {
            Some("relative") => CssPosition::Relative,
            Some("absolute") => CssPosition::Absolute,
            Some("fixed") => CssPosition::Fixed,
            Some("sticky") => CssPosition::Sticky,
            _ => CssPosition::Static,
        }
    }

    fn set_style(&mut self, node: NodeId, property: &str, value: &str) {
        let mut decls: Vec<(String, String)> = Vec::new();
        if let Some(style) = self.attr(node, "style") {
            for decl in style.split(';') {
                let mut parts = decl.splitn(2, ':');
                let (Some(name), Some(val)) = (parts.next(), parts.next()) else {
                    continue;
                };
                let name = name.trim();
                if name.is_empty() || name.eq_ignore_ascii_case(property) {
                    continue;
                }
                decls.push((name.to_string(), val.trim().to_string()));
            }
        }
        decls.push((property.to_string(), value.to_string()));
        let style = decls
            .iter()
            .map(|(n, v)| format!("{n}:{v}"))
            .collect::<Vec<_>>()
            .join(";");
        self.set_attr(node, "style", &style);
    }

    fn create_element(&mut self, tag: &str) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        let mut node = Node::new(tag);
        node.detached = true;
        self.nodes.push(node);
        id
    }

    fn set_attr(&mut self, node: NodeId, name: &str, value: &str) {
        let existing = self
            .node(node)
            .attrs
            .iter()
            .position(|(n, _)| n.eq_ignore_ascii_case(name));
        match existing {
            Some(i) => self.node_mut(node).attrs[i].1 = value.to_string(),
            None => self
                .node_mut(node)
                .attrs
                .push((name.to_ascii_lowercase(), value.to_string())),
        }
    }

    fn set_text(&mut self, node: NodeId, text: &str) {
        self.node_mut(node).text = text.to_string();
    }

    fn append_child(&mut self, parent: NodeId, child: NodeId) {
        let parent_attached = !self.node(parent).detached;
        {
            let child_node = self.node_mut(child);
            child_node.parent = Some(parent);
            child_node.detached = !parent_attached;
        }
        self.node_mut(parent).children.push(child);
        if parent_attached {
            let mut subtree = Vec::new();
            self.collect_descendants(child, &mut subtree);
            for id in subtree {
                self.node_mut(id).detached = false;
            }
        }
    }

    fn remove_node(&mut self, node: NodeId) {
        if let Some(parent) = self.node(node).parent {
            self.node_mut(parent).children.retain(|&c| c != node);
        }
        self.node_mut(node).parent = None;
        self.node_mut(node).detached = true;
        let mut subtree = Vec::new();
        self.collect_descendants(node, &mut subtree);
        for id in subtree {
            self.node_mut(id).detached = true;
        }
    }

    fn is_attached(&self, node: NodeId) -> bool {
        !self.node(node).detached
    }

    fn descendants(&self, root: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.collect_descendants(root, &mut out);
        out
    }

    fn text_content(&self, node: NodeId) -> String {
        let mut out = self.node(node).text.clone();
        for &child in &self.node(node).children {
            out.push_str(&self.text_content(child));
        }
        out
    }

    fn inline_scripts(&self) -> Vec<ScriptBlock> {
        let mut out = Vec::new();
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            let node = self.node(id);
            if node.tag == "script" && self.attr(id, "src").is_none() && !node.text.is_empty() {
                out.push(ScriptBlock {
                    node: id,
                    text: node.text.clone(),
                });
            }
            for &child in node.children.iter().rev() {
                stack.push(child);
            }
        }
        out
    }

    fn script_sources(&self) -> Vec<String> {
        let mut out = Vec::new();
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            let node = self.node(id);
            if node.tag == "script" {
                if let Some(src) = self.attr(id, "src") {
                    out.push(src.to_string());
                }
            }
            for &child in node.children.iter().rev() {
                stack.push(child);
            }
        }
        out
    }

    fn head(&self) -> Option<NodeId> {
        self.children(self.root)
            .iter()
            .copied()
            .find(|&c| self.tag(c) == "head")
    }
}

fn parse_px(value: &str) -> Option<f64> {
    let value = value.trim();
    let number = value.strip_suffix("px").unwrap_or(value).trim();
    number.parse().ok()
}

fn is_void_tag(tag: &str) -> bool {
    matches!(
        tag,
        "area"
            | "base"
            | "br"
            | "col"
            | "embed"
            | "hr"
            | "img"
            | "input"
            | "link"
            | "meta"
            | "source"
            | "track"
            | "wbr"
    )
}

fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn escape_attr(value: &str) -> String {
    escape_text(value).replace('"', "&quot;")
}
