//! Document abstraction the pipeline runs against.
//!
//! The repair pipeline never talks to a real browser DOM. It is written against the
//! [`DocumentDom`] query/mutation interface so the same engine can be driven by the in-repo
//! [`HeadlessDom`] (tests, CLI) or by a thin adapter over an embedder's live document.

mod headless;
mod html;

pub use headless::HeadlessDom;

/// Stable handle to an element node. Ids are never reused within one document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoxSize {
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CssPosition {
    Static,
    Relative,
    Absolute,
    Fixed,
    Sticky,
}

/// One inline `<script>` (no `src` attribute) with its full text.
#[derive(Debug, Clone)]
pub struct ScriptBlock {
    pub node: NodeId,
    pub text: String,
}

pub trait DocumentDom {
    fn root(&self) -> NodeId;

    /// Lowercased tag name.
    fn tag(&self, node: NodeId) -> &str;

    fn attr(&self, node: NodeId, name: &str) -> Option<&str>;

    fn element_id(&self, node: NodeId) -> Option<&str> {
        self.attr(node, "id").filter(|s| !s.is_empty())
    }

    fn class_attr(&self, node: NodeId) -> Option<&str> {
        self.attr(node, "class").filter(|s| !s.is_empty())
    }

    fn parent(&self, node: NodeId) -> Option<NodeId>;

    fn children(&self, node: NodeId) -> &[NodeId];

    /// `None` when the document cannot tell (headless documents only know inline-style or
    /// attribute dimensions). A live-browser adapter always returns `Some`.
    fn bounding_box(&self, node: NodeId) -> Option<BoxSize>;

    fn computed_position(&self, node: NodeId) -> CssPosition;

    fn set_style(&mut self, node: NodeId, property: &str, value: &str);

    fn create_element(&mut self, tag: &str) -> NodeId;

    fn set_attr(&mut self, node: NodeId, name: &str, value: &str);

    fn set_text(&mut self, node: NodeId, text: &str);

    fn append_child(&mut self, parent: NodeId, child: NodeId);

    /// Detaches the node (and its subtree) from the document.
    fn remove_node(&mut self, node: NodeId);

    fn is_attached(&self, node: NodeId) -> bool;

    /// All element descendants of `root` (excluding `root` itself), document order.
    fn descendants(&self, root: NodeId) -> Vec<NodeId>;

    /// Concatenated text of the node and its subtree.
    fn text_content(&self, node: NodeId) -> String;

    fn inline_scripts(&self) -> Vec<ScriptBlock>;

    /// `src` attribute of every external `<script>`.
    fn script_sources(&self) -> Vec<String>;

    fn head(&self) -> Option<NodeId>;

    fn has_descendant_tag(&self, node: NodeId, tag: &str) -> bool {
        self.descendants(node).iter().any(|&n| self.tag(n) == tag)
    }
}
