//! Per-container pipeline state and the loading/error overlay UI.

use crate::dom::{CssPosition, DocumentDom, NodeId};
use crate::extract::SourceConfidence;
use crate::libraries::LibraryKind;
use crate::runtime::ChartHandle;
use serde::Serialize;

pub const OVERLAY_STYLE_ID: &str = "chart-fixer-styles";
pub const LOADING_TEXT: &str = "图表加载中...";
pub const ERROR_TITLE: &str = "图表加载失败";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ContainerState {
    Discovered,
    Preparing,
    AwaitingLibrary,
    ConfigSearch,
    Rendering,
    Rendered,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case", tag = "kind", content = "detail")]
pub enum FailReason {
    /// Every mirror of the required library failed.
    LibraryUnavailable,
    /// The library itself rejected init/setOption.
    Init(String),
    /// The watchdog swept this container while it was still loading.
    Timeout,
}

impl FailReason {
    /// The human-readable panel text shown inside the container.
    pub fn message(&self) -> String {
        match self {
            FailReason::LibraryUnavailable => {
                "无法加载或初始化图表：所有图表库源均加载失败".to_string()
            }
            FailReason::Init(message) => format!("图表初始化失败: {message}"),
            FailReason::Timeout => "无法加载或初始化图表，请检查控制台获取详细信息".to_string(),
        }
    }
}

/// Book-keeping for one classified container. The record owns the overlay node it
/// injected and the chart handle it created; the DOM node itself is only referenced.
#[derive(Debug, Clone)]
pub struct ContainerRecord {
    pub key: String,
    pub node: NodeId,
    pub element_id: Option<String>,
    pub state: ContainerState,
    pub library: LibraryKind,
    pub overlay: Option<NodeId>,
    pub handle: Option<ChartHandle>,
    pub confidence: SourceConfidence,
    pub fail_reason: Option<FailReason>,
    /// Position in discovery order; drives fallback chart rotation.
    pub discovery_index: usize,
    pub resize_bound: bool,
}

impl ContainerRecord {
    pub fn new(key: String, node: NodeId, element_id: Option<String>, index: usize) -> Self {
        Self {
            key,
            node,
            element_id,
            state: ContainerState::Discovered,
            library: LibraryKind::Unknown,
            overlay: None,
            handle: None,
            confidence: SourceConfidence::None,
            fail_reason: None,
            discovery_index: index,
            resize_bound: false,
        }
    }

    /// States the watchdog treats as "still loading".
    pub fn is_loading(&self) -> bool {
        matches!(
            self.state,
            ContainerState::Preparing
                | ContainerState::AwaitingLibrary
                | ContainerState::ConfigSearch
                | ContainerState::Rendering
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self.state,
            ContainerState::Rendered | ContainerState::Failed
        )
    }
}

const OVERLAY_CSS: &str = "position:absolute;top:0;left:0;width:100%;height:100%;\
background:rgba(255,255,255,0.9);display:flex;flex-direction:column;align-items:center;\
justify-content:center;z-index:1000";

const SPINNER_CSS: &str = "width:40px;height:40px;border-radius:50%;\
border:3px solid rgba(9,109,217,0.2);border-top-color:#096dd9;\
animation:chartFixer-spinner 1s linear infinite;margin-bottom:15px";

const LOADING_TEXT_CSS: &str = "color:#096dd9;font-size:14px;font-weight:bold";

const PANEL_CSS: &str = "position:absolute;top:0;left:0;width:100%;height:100%;\
background:rgba(255,255,255,0.95);display:flex;flex-direction:column;align-items:center;\
justify-content:center;z-index:1000;text-align:center;padding:20px";

/// Adds the spinner keyframes once per document.
pub fn ensure_spinner_style<D: DocumentDom>(dom: &mut D) {
    let root = dom.root();
    let mut nodes = vec![root];
    nodes.extend(dom.descendants(root));
    let exists = nodes
        .iter()
        .any(|&n| dom.attr(n, "id") == Some(OVERLAY_STYLE_ID));
    if exists {
        return;
    }

    let style = dom.create_element("style");
    dom.set_attr(style, "id", OVERLAY_STYLE_ID);
    dom.set_text(
        style,
        "@keyframes chartFixer-spinner { to { transform: rotate(360deg); } }",
    );
    let target = dom.head().unwrap_or(root);
    dom.append_child(target, style);
}

/// Gives the container non-static positioning so overlays can be absolutely placed.
pub fn ensure_positioned<D: DocumentDom>(dom: &mut D, container: NodeId) {
    if dom.computed_position(container) == CssPosition::Static {
        dom.set_style(container, "position", "relative");
    }
}

/// Injects the spinner + text loading overlay and returns the overlay node.
pub fn inject_loading_overlay<D: DocumentDom>(dom: &mut D, container: NodeId) -> NodeId {
    ensure_spinner_style(dom);
    ensure_positioned(dom, container);

    let overlay = dom.create_element("div");
    dom.set_attr(overlay, "class", "chart-fixer-overlay");
    dom.set_attr(overlay, "style", OVERLAY_CSS);

    let spinner = dom.create_element("div");
    dom.set_attr(spinner, "style", SPINNER_CSS);
    dom.append_child(overlay, spinner);

    let text = dom.create_element("div");
    dom.set_attr(text, "style", LOADING_TEXT_CSS);
    dom.set_text(text, LOADING_TEXT);
    dom.append_child(overlay, text);

    dom.append_child(container, overlay);
    overlay
}

/// Replaces the loading overlay with a visible error panel; returns the panel node.
pub fn show_error_panel<D: DocumentDom>(
    dom: &mut D,
    container: NodeId,
    overlay: Option<NodeId>,
    message: &str,
) -> NodeId {
    if let Some(overlay) = overlay {
        dom.remove_node(overlay);
    }
    ensure_positioned(dom, container);

    let panel = dom.create_element("div");
    dom.set_attr(panel, "class", "chart-fixer-error");
    dom.set_attr(panel, "style", PANEL_CSS);

    let icon = dom.create_element("div");
    dom.set_attr(icon, "style", "font-size:40px;margin-bottom:20px");
    dom.set_text(icon, "⚠️");
    dom.append_child(panel, icon);

    let title = dom.create_element("div");
    dom.set_attr(
        title,
        "style",
        "font-size:18px;font-weight:bold;color:#ff4d4f;margin-bottom:10px",
    );
    dom.set_text(title, ERROR_TITLE);
    dom.append_child(panel, title);

    let details = dom.create_element("div");
    dom.set_attr(details, "style", "font-size:14px;color:#555");
    dom.set_text(details, message);
    dom.append_child(panel, details);

    dom.append_child(container, panel);
    panel
}
