//! The charting-library seam.
//!
//! The pipeline only ever talks to a [`ChartRuntime`]; an embedder running inside a real
//! page adapts the actual library global behind it, while tests and the CLI use
//! [`SimulatedRuntime`], which renders by appending a marker `<canvas>` child.

use crate::dom::{DocumentDom, NodeId};
use crate::libraries::LibraryKind;
use rustc_hash::{FxHashMap, FxHashSet};
use serde_json::Value;

/// Opaque handle to one live chart instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
pub struct ChartHandle(pub u32);

pub trait ChartRuntime<D: DocumentDom> {
    /// Whether the library's page global is installed.
    fn is_loaded(&self, kind: LibraryKind) -> bool;

    /// Called after a script for `kind` finished loading successfully.
    fn note_library_loaded(&mut self, kind: LibraryKind);

    fn init(&mut self, dom: &mut D, node: NodeId, kind: LibraryKind)
    -> std::result::Result<ChartHandle, String>;

    fn apply_option(&mut self, handle: ChartHandle, option: &Value)
    -> std::result::Result<(), String>;

    fn resize(&mut self, handle: ChartHandle);

    fn dispose(&mut self, dom: &mut D, handle: ChartHandle);

    /// The library's instance-lookup-by-node API.
    fn instance_for_node(&self, node: NodeId) -> Option<ChartHandle>;
}

/// Deterministic in-process runtime: "rendering" appends a `<canvas data-chart-lib=…>`
/// child, which is exactly what the re-entrancy check in the pipeline looks for.
#[derive(Debug, Default)]
pub struct SimulatedRuntime {
    loaded: FxHashSet<LibraryKind>,
    instances: FxHashMap<NodeId, ChartHandle>,
    nodes: FxHashMap<ChartHandle, NodeId>,
    canvases: FxHashMap<ChartHandle, NodeId>,
    options: FxHashMap<ChartHandle, Value>,
    resize_counts: FxHashMap<ChartHandle, u32>,
    next_handle: u32,
    fail_init_message: Option<String>,
}

impl SimulatedRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// A runtime whose library globals are already installed (a page that loaded its own
    /// script tags successfully).
    pub fn preloaded(kinds: &[LibraryKind]) -> Self {
        let mut runtime = Self::default();
        for kind in kinds {
            runtime.loaded.insert(*kind);
        }
        runtime
    }

    /// Makes every subsequent `init` call fail with `message` (for failure-path tests).
    pub fn fail_init_with(&mut self, message: &str) {
        self.fail_init_message = Some(message.to_string());
    }

    pub fn clear_init_failure(&mut self) {
        self.fail_init_message = None;
    }

    pub fn option_for(&self, handle: ChartHandle) -> Option<&Value> {
        self.options.get(&handle)
    }

    pub fn resize_count(&self, handle: ChartHandle) -> u32 {
        self.resize_counts.get(&handle).copied().unwrap_or(0)
    }

    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }
}

impl<D: DocumentDom> ChartRuntime<D> for SimulatedRuntime {
    fn is_loaded(&self, kind: LibraryKind) -> bool {
        self.loaded.contains(&kind)
    }

    fn note_library_loaded(&mut self, kind: LibraryKind) {
        self.loaded.insert(kind);
    }

    fn init(
        &mut self,
        dom: &mut D,
        node: NodeId,
        kind: LibraryKind,
    ) -> std::result::Result<ChartHandle, String> {
        if let Some(message) = &self.fail_init_message {
            return Err(message.clone());
        }
        if let Some(existing) = self.instances.get(&node) {
            // Same contract as the real libraries: one instance per node.
            return Ok(*existing);
        }

        let handle = ChartHandle(self.next_handle);
        self.next_handle += 1;

        let canvas = dom.create_element("canvas");
        dom.set_attr(canvas, "data-chart-lib", kind.as_str());
        dom.append_child(node, canvas);

        self.instances.insert(node, handle);
        self.nodes.insert(handle, node);
        self.canvases.insert(handle, canvas);
        Ok(handle)
    }

    fn apply_option(
        &mut self,
        handle: ChartHandle,
        option: &Value,
    ) -> std::result::Result<(), String> {
        if !self.nodes.contains_key(&handle) {
            return Err("setOption on a disposed chart".to_string());
        }
        if !option.is_object() {
            return Err("option must be an object".to_string());
        }
        self.options.insert(handle, option.clone());
        Ok(())
    }

    fn resize(&mut self, handle: ChartHandle) {
        *self.resize_counts.entry(handle).or_insert(0) += 1;
    }

    fn dispose(&mut self, dom: &mut D, handle: ChartHandle) {
        if let Some(node) = self.nodes.remove(&handle) {
            self.instances.remove(&node);
        }
        if let Some(canvas) = self.canvases.remove(&handle) {
            dom.remove_node(canvas);
        }
        self.options.remove(&handle);
    }

    fn instance_for_node(&self, node: NodeId) -> Option<ChartHandle> {
        self.instances.get(&node).copied()
    }
}
