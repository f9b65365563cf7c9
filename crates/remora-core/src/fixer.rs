//! The process-wide repair service.
//!
//! One [`Fixer`] is constructed per document at startup and torn down on unload. It owns
//! the document handle, the chart runtime, the loader, the mutation watcher, and every
//! container record; nothing in this module reaches for ambient globals.
//!
//! Time is cooperative: the embedder reports events (`dom_mutated`, `on_script_result`,
//! `on_page_error`, `window_resized`) and pumps `tick(now_ms)`; the fixer keeps its own
//! timer queue (settle delays, mirror gaps, debounce, watchdog) and never blocks.

use crate::classify;
use crate::config::FixerConfig;
use crate::dom::{DocumentDom, NodeId};
use crate::extract::{self, SourceConfidence};
use crate::fallback;
use crate::helpers::{self, ShimSet};
use crate::libraries::{LibraryKind, LibraryRegistry};
use crate::loader::{LoadAdvance, LoadRequest, LoadStatus, ScriptLoader};
use crate::pipeline::{self, ContainerRecord, ContainerState, FailReason};
use crate::runtime::{ChartHandle, ChartRuntime};
use crate::watch::MutationWatcher;
use indexmap::IndexMap;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq)]
enum TimerKind {
    InitialScan,
    LoadSettleScan,
    MirrorGap(LibraryKind),
    Watchdog,
    ShimRescan,
}

#[derive(Debug, Clone)]
struct Timer {
    due: u64,
    kind: TimerKind,
}

#[derive(Debug, Clone, Serialize)]
pub struct ContainerDiagnostics {
    pub key: String,
    pub element_id: Option<String>,
    pub state: ContainerState,
    pub library: LibraryKind,
    pub confidence: SourceConfidence,
    pub fail_message: Option<String>,
    pub has_chart: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct LibraryDiagnostics {
    pub library: LibraryKind,
    pub status: LoadStatus,
    pub attempts: usize,
}

/// Introspection surface for embedders and the CLI.
#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticsSnapshot {
    pub containers: Vec<ContainerDiagnostics>,
    pub libraries: Vec<LibraryDiagnostics>,
    pub shims: Vec<&'static str>,
}

pub struct Fixer<D: DocumentDom, R: ChartRuntime<D>> {
    dom: D,
    runtime: R,
    config: FixerConfig,
    libraries: LibraryRegistry,
    loader: ScriptLoader,
    watcher: MutationWatcher,
    shims: ShimSet,
    containers: IndexMap<String, ContainerRecord>,
    node_keys: FxHashMap<NodeId, String>,
    timers: Vec<Timer>,
    /// Script elements injected and not yet resolved by a load/error event.
    awaiting_network: FxHashMap<LibraryKind, String>,
    synthetic_seq: u32,
    discovered_total: usize,
    watchdog_armed: bool,
    started: bool,
    torn_down: bool,
}

impl<D: DocumentDom, R: ChartRuntime<D>> Fixer<D, R> {
    pub fn new(dom: D, runtime: R, config: FixerConfig) -> Self {
        let watcher = MutationWatcher::new(config.delays.debounce_ms);
        Self {
            dom,
            runtime,
            config,
            libraries: LibraryRegistry::default_set(),
            loader: ScriptLoader::new(),
            watcher,
            shims: ShimSet::with_common(),
            containers: IndexMap::new(),
            node_keys: FxHashMap::default(),
            timers: Vec::new(),
            awaiting_network: FxHashMap::default(),
            synthetic_seq: 0,
            discovered_total: 0,
            watchdog_armed: false,
            started: false,
            torn_down: false,
        }
    }

    pub fn with_library_registry(mut self, libraries: LibraryRegistry) -> Self {
        self.libraries = libraries;
        self
    }

    pub fn dom(&self) -> &D {
        &self.dom
    }

    pub fn dom_mut(&mut self) -> &mut D {
        &mut self.dom
    }

    pub fn runtime(&self) -> &R {
        &self.runtime
    }

    pub fn runtime_mut(&mut self) -> &mut R {
        &mut self.runtime
    }

    pub fn config(&self) -> &FixerConfig {
        &self.config
    }

    /// Drops the pre-enabled helper shims; extraction then only uses shims enabled later
    /// through [`Fixer::on_page_error`].
    pub fn clear_shims(&mut self) {
        self.shims = ShimSet::empty();
    }

    pub fn into_dom(self) -> D {
        self.dom
    }

    pub fn records(&self) -> impl Iterator<Item = &ContainerRecord> {
        self.containers.values()
    }

    pub fn container_state(&self, key: &str) -> Option<ContainerState> {
        self.containers.get(key).map(|r| r.state)
    }

    /// Schedules the initial settle-delayed classification pass.
    pub fn bootstrap(&mut self, now: u64) {
        if !self.config.enabled {
            tracing::info!("chart repair disabled by configuration");
            return;
        }
        if self.started || self.torn_down {
            return;
        }
        self.started = true;
        let due = now + self.config.delays.initial_check_ms;
        self.timers.push(Timer {
            due,
            kind: TimerKind::InitialScan,
        });
        tracing::debug!(due, "repair pipeline armed");
    }

    /// The document's full `load` event: schedule one more settle-delayed pass for
    /// containers populated by late scripts.
    pub fn document_loaded(&mut self, now: u64) {
        if !self.config.enabled || !self.started || self.torn_down {
            return;
        }
        let due = now + self.config.delays.load_check_ms;
        self.timers.push(Timer {
            due,
            kind: TimerKind::LoadSettleScan,
        });
    }

    /// Manual trigger: re-enters the pipeline for failed containers and re-scans now.
    pub fn fix(&mut self, now: u64) {
        if !self.config.enabled || self.torn_down {
            return;
        }
        self.started = true;

        let failed_keys: Vec<String> = self
            .containers
            .iter()
            .filter(|(_, r)| r.state == ContainerState::Failed)
            .map(|(k, _)| k.clone())
            .collect();
        for key in failed_keys {
            let Some(record) = self.containers.get_mut(&key) else {
                continue;
            };
            let panel = record.overlay.take();
            record.state = ContainerState::Discovered;
            record.fail_reason = None;
            record.confidence = SourceConfidence::None;
            let library = record.library;
            if let Some(panel) = panel {
                self.dom.remove_node(panel);
            }
            self.loader.reset_failed(library);
            tracing::debug!(container = %key, "re-entering pipeline after manual trigger");
        }

        self.scan(now);
    }

    /// Reports inserted element subtrees. Each subtree is classified immediately; a
    /// debounced full re-scan is armed for containers populated indirectly.
    pub fn dom_mutated(&mut self, added: &[NodeId], now: u64) {
        if !self.config.enabled || !self.started || self.torn_down {
            return;
        }
        for &root in added {
            if self.dom.is_attached(root) {
                self.scan_subtree(root, now);
            }
        }
        self.watcher.note_insertions(now);
    }

    /// Load (`ok = true`) or error event for the library script currently in flight.
    pub fn on_script_result(&mut self, kind: LibraryKind, ok: bool, now: u64) {
        if self.torn_down {
            return;
        }
        self.awaiting_network.remove(&kind);
        match self.loader.on_script_result(kind, ok) {
            None => {}
            Some(LoadAdvance::TryNext { .. }) => {
                self.timers.push(Timer {
                    due: now + self.config.delays.mirror_gap_ms,
                    kind: TimerKind::MirrorGap(kind),
                });
            }
            Some(LoadAdvance::Resolved { waiters }) => {
                self.runtime.note_library_loaded(kind);
                for key in waiters {
                    if self.container_state(&key) == Some(ContainerState::AwaitingLibrary) {
                        self.render_container(&key, now);
                    }
                }
            }
            Some(LoadAdvance::Exhausted { waiters, attempts }) => {
                tracing::error!(library = %kind, attempts, "library load exhausted");
                for key in waiters {
                    if self.container_state(&key) == Some(ContainerState::AwaitingLibrary) {
                        self.fail_container(&key, FailReason::LibraryUnavailable);
                    }
                }
            }
        }
    }

    /// Feeds a page error message through the missing-helper interceptor.
    ///
    /// Returns `true` when a new shim was enabled (and a re-scan scheduled).
    pub fn on_page_error(&mut self, message: &str, now: u64) -> bool {
        if self.torn_down {
            return false;
        }
        let Some(symbol) = helpers::missing_symbol(message) else {
            return false;
        };
        let Some(shim) = helpers::known_shim(symbol) else {
            tracing::warn!(symbol, "missing symbol has no known shim");
            return false;
        };
        if !self.shims.enable(shim) {
            return false;
        }
        tracing::info!(shim, "enabled helper shim from page error");
        if !self
            .timers
            .iter()
            .any(|t| t.kind == TimerKind::ShimRescan)
        {
            self.timers.push(Timer {
                due: now + self.config.delays.shim_rescan_ms,
                kind: TimerKind::ShimRescan,
            });
        }
        true
    }

    /// Window resize: forwards to every live chart that asked for resize binding.
    pub fn window_resized(&mut self) {
        let handles: Vec<ChartHandle> = self
            .containers
            .values()
            .filter(|r| r.state == ContainerState::Rendered && r.resize_bound)
            .filter_map(|r| r.handle)
            .collect();
        for handle in handles {
            self.runtime.resize(handle);
        }
    }

    /// Pumps due timers and the debounce window up to `now`.
    pub fn tick(&mut self, now: u64) {
        if self.torn_down {
            return;
        }
        loop {
            let due_idx = self
                .timers
                .iter()
                .enumerate()
                .filter(|(_, t)| t.due <= now)
                .min_by_key(|(_, t)| t.due)
                .map(|(i, _)| i);
            let Some(idx) = due_idx else {
                break;
            };
            let timer = self.timers.remove(idx);
            match timer.kind {
                TimerKind::InitialScan | TimerKind::LoadSettleScan => self.scan(now),
                TimerKind::ShimRescan => self.scan(now),
                TimerKind::MirrorGap(kind) => {
                    if let Some(url) = self.loader.current_url(kind).map(str::to_string) {
                        self.inject_script_element(kind, &url);
                    }
                }
                TimerKind::Watchdog => self.watchdog_sweep(),
            }
        }

        if self.watcher.take_due(now) {
            tracing::debug!("debounced full re-scan");
            self.scan(now);
        }
    }

    /// The earliest instant at which `tick` has work to do.
    pub fn next_wakeup(&self) -> Option<u64> {
        let timer_due = self.timers.iter().map(|t| t.due).min();
        match (timer_due, self.watcher.next_deadline()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (Some(a), None) => Some(a),
            (None, Some(b)) => Some(b),
            (None, None) => None,
        }
    }

    /// Injected scripts whose load/error event has not been reported yet.
    pub fn pending_loads(&self) -> Vec<(LibraryKind, String)> {
        self.awaiting_network
            .iter()
            .map(|(k, url)| (*k, url.clone()))
            .collect()
    }

    pub fn diagnostics(&self) -> DiagnosticsSnapshot {
        let containers = self
            .containers
            .values()
            .map(|r| ContainerDiagnostics {
                key: r.key.clone(),
                element_id: r.element_id.clone(),
                state: r.state,
                library: r.library,
                confidence: r.confidence,
                fail_message: r.fail_reason.as_ref().map(|f| f.message()),
                has_chart: r.handle.is_some(),
            })
            .collect();
        let libraries = self
            .libraries
            .descriptors()
            .iter()
            .map(|d| LibraryDiagnostics {
                library: d.kind,
                status: self.loader.status(d.kind),
                attempts: self.loader.attempts(d.kind),
            })
            .collect();
        DiagnosticsSnapshot {
            containers,
            libraries,
            shims: self.shims.enabled().collect(),
        }
    }

    /// Page unload: stop observation, drop timers, dispose every live chart.
    pub fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;
        self.watcher.teardown();
        self.timers.clear();
        let handles: Vec<ChartHandle> = self
            .containers
            .values()
            .filter_map(|r| r.handle)
            .collect();
        for handle in handles {
            self.runtime.dispose(&mut self.dom, handle);
        }
        for record in self.containers.values_mut() {
            record.handle = None;
        }
        tracing::debug!("repair pipeline torn down");
    }

    fn scan(&mut self, now: u64) {
        self.prune_detached();
        let root = self.dom.root();
        self.scan_subtree(root, now);
    }

    fn scan_subtree(&mut self, root: NodeId, now: u64) {
        let settled: FxHashSet<NodeId> = self
            .containers
            .values()
            .filter(|r| r.is_terminal())
            .map(|r| r.node)
            .collect();
        let classification =
            classify::classify(&self.dom, root, &self.config, &|n| settled.contains(&n));

        for exclusion in &classification.excluded {
            tracing::trace!(
                element = ?exclusion.element_id,
                rule = exclusion.rule,
                "element excluded from chart repair"
            );
        }
        for candidate in &classification.accepted {
            self.ensure_record(candidate.node, candidate.element_id.clone());
        }

        self.advance_all(now);
    }

    fn ensure_record(&mut self, node: NodeId, element_id: Option<String>) -> String {
        if let Some(key) = self.node_keys.get(&node) {
            return key.clone();
        }

        let mut key = match &element_id {
            Some(id) => id.clone(),
            None => {
                self.synthetic_seq += 1;
                format!("chart_{}", self.synthetic_seq)
            }
        };
        while self.containers.contains_key(&key) {
            self.synthetic_seq += 1;
            key = format!("{key}_{}", self.synthetic_seq);
        }

        let index = self.discovered_total;
        self.discovered_total += 1;
        let record = ContainerRecord::new(key.clone(), node, element_id, index);
        tracing::debug!(container = %key, "tracking new chart container");
        self.containers.insert(key.clone(), record);
        self.node_keys.insert(node, key.clone());
        key
    }

    fn advance_all(&mut self, now: u64) {
        let keys: Vec<String> = self.containers.keys().cloned().collect();
        for key in keys {
            if self.container_state(&key) == Some(ContainerState::Discovered) {
                self.start_container(&key, now);
            }
        }
    }

    fn start_container(&mut self, key: &str, now: u64) {
        let Some((node, _element_id)) = self
            .containers
            .get(key)
            .map(|r| (r.node, r.element_id.clone()))
        else {
            return;
        };

        let overlay = pipeline::inject_loading_overlay(&mut self.dom, node);
        if let Some(record) = self.containers.get_mut(key) {
            record.overlay = Some(overlay);
            record.state = ContainerState::Preparing;
        }
        if !self.watchdog_armed {
            self.watchdog_armed = true;
            self.timers.push(Timer {
                due: now + self.config.delays.watchdog_ms,
                kind: TimerKind::Watchdog,
            });
        }

        // Re-entrancy guard: an existing instance (or an already-rendered chart child)
        // short-circuits straight to Rendered without another init.
        let existing = self.runtime.instance_for_node(node);
        let has_rendered_child = self.dom.has_descendant_tag(node, "canvas")
            || self.dom.has_descendant_tag(node, "svg");
        if existing.is_some() || has_rendered_child {
            tracing::debug!(container = %key, "container already rendered, skipping init");
            self.finish_rendered(key, existing);
            return;
        }

        let kind = self.document_library();
        if let Some(record) = self.containers.get_mut(key) {
            record.library = kind;
        }

        if self.runtime.is_loaded(kind) {
            self.loader.mark_preloaded(kind);
            self.render_container(key, now);
            return;
        }

        if let Some(record) = self.containers.get_mut(key) {
            record.state = ContainerState::AwaitingLibrary;
        }
        let mirrors = self.libraries.mirrors_for(kind, &self.config);
        match self.loader.request(kind, mirrors, key) {
            Ok(LoadRequest::Inject { url }) => self.inject_script_element(kind, &url),
            Ok(LoadRequest::Joined) => {}
            Ok(LoadRequest::AlreadyLoaded) => {
                self.runtime.note_library_loaded(kind);
                self.render_container(key, now);
            }
            Ok(LoadRequest::AlreadyFailed) => {
                self.fail_container(key, FailReason::LibraryUnavailable);
            }
            Err(err) => {
                tracing::warn!(container = %key, error = %err, "library load request failed");
                self.fail_container(key, FailReason::LibraryUnavailable);
            }
        }
    }

    fn render_container(&mut self, key: &str, _now: u64) {
        let Some((node, element_id, index, kind)) = self
            .containers
            .get(key)
            .map(|r| (r.node, r.element_id.clone(), r.discovery_index, r.library))
        else {
            return;
        };

        if let Some(record) = self.containers.get_mut(key) {
            record.state = ContainerState::ConfigSearch;
        }

        let scripts = self.dom.inline_scripts();
        let extracted = extract::extract_config(element_id.as_deref(), &scripts, &self.shims);
        let confidence = extracted.confidence;
        let option = match extracted.value {
            Some(value) => value,
            None => match element_id.as_deref() {
                Some(id) => {
                    let fallback_kind = fallback::fallback_kind_for(Some(id), index);
                    let title = fallback::extract_title(&self.dom, node);
                    fallback::fallback_option(fallback_kind, &title)
                }
                // Identity-less containers get the fixed generic placeholder.
                None => fallback::default_pie_option(),
            },
        };

        if let Some(record) = self.containers.get_mut(key) {
            record.confidence = confidence;
            record.state = ContainerState::Rendering;
        }

        let handle = match self.runtime.init(&mut self.dom, node, kind) {
            Ok(handle) => handle,
            Err(message) => {
                tracing::error!(container = %key, %message, "chart init failed");
                self.fail_container(key, FailReason::Init(message));
                return;
            }
        };
        if let Err(message) = self.runtime.apply_option(handle, &option) {
            tracing::error!(container = %key, %message, "applying chart option failed");
            self.runtime.dispose(&mut self.dom, handle);
            self.fail_container(key, FailReason::Init(message));
            return;
        }

        if let Some(record) = self.containers.get_mut(key) {
            record.handle = Some(handle);
            record.resize_bound = true;
        }
        self.finish_rendered(key, Some(handle));
    }

    fn finish_rendered(&mut self, key: &str, handle: Option<ChartHandle>) {
        let Some(record) = self.containers.get_mut(key) else {
            return;
        };
        let overlay = record.overlay.take();
        record.state = ContainerState::Rendered;
        if record.handle.is_none() {
            record.handle = handle;
        }
        if let Some(overlay) = overlay {
            self.dom.remove_node(overlay);
        }
        tracing::debug!(container = %key, "container rendered");
    }

    fn fail_container(&mut self, key: &str, reason: FailReason) {
        let Some((node, overlay)) = self
            .containers
            .get_mut(key)
            .map(|r| (r.node, r.overlay.take()))
        else {
            return;
        };
        let message = reason.message();
        let panel = pipeline::show_error_panel(&mut self.dom, node, overlay, &message);
        if let Some(record) = self.containers.get_mut(key) {
            record.overlay = Some(panel);
            record.state = ContainerState::Failed;
            record.fail_reason = Some(reason);
        }
        tracing::error!(container = %key, %message, "container failed");
    }

    fn watchdog_sweep(&mut self) {
        let stuck: Vec<String> = self
            .containers
            .iter()
            .filter(|(_, r)| r.is_loading())
            .map(|(k, _)| k.clone())
            .collect();
        if stuck.is_empty() {
            return;
        }
        tracing::warn!(count = stuck.len(), "watchdog forcing stuck containers to failed");
        for key in stuck {
            self.fail_container(&key, FailReason::Timeout);
        }
    }

    /// Which library this document wants: the first recognized `script[src]` reference,
    /// else ECharts as the default repair target.
    fn document_library(&self) -> LibraryKind {
        let sources = self.dom.script_sources();
        self.libraries
            .detect_references(&sources)
            .first()
            .copied()
            .unwrap_or(LibraryKind::Echarts)
    }

    fn inject_script_element(&mut self, kind: LibraryKind, url: &str) {
        let script = self.dom.create_element("script");
        self.dom.set_attr(script, "src", url);
        self.dom.set_attr(script, "data-chart-fixer-load", kind.as_str());
        let target = self.dom.head().unwrap_or_else(|| self.dom.root());
        self.dom.append_child(target, script);
        self.awaiting_network.insert(kind, url.to_string());
        tracing::debug!(library = %kind, url, "injected library script");
    }

    /// Drops records whose element left the document, disposing any chart they owned.
    fn prune_detached(&mut self) {
        let gone: Vec<String> = self
            .containers
            .iter()
            .filter(|(_, r)| !self.dom.is_attached(r.node))
            .map(|(k, _)| k.clone())
            .collect();
        for key in gone {
            let Some(record) = self.containers.shift_remove(&key) else {
                continue;
            };
            self.node_keys.remove(&record.node);
            if let Some(handle) = record.handle {
                self.runtime.dispose(&mut self.dom, handle);
            }
            tracing::debug!(container = %key, "container left the document");
        }
    }
}
