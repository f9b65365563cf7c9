#![forbid(unsafe_code)]

//! Headless chart repair engine.
//!
//! Remora attaches to a document snapshot, finds elements that were meant to host a chart,
//! and makes sure every one of them ends visibly rendered or visibly failed:
//!
//! - containers are classified by name with size/tag/class exclusion heuristics,
//! - chart option objects are recovered from inline script text through a restricted
//!   json5 materialization (never by executing page code),
//! - missing charting libraries are loaded from prioritized CDN mirror lists with
//!   strict-order fallback and in-flight deduplication,
//! - containers with no recoverable configuration get a deterministic placeholder chart,
//! - DOM insertions re-trigger the pipeline with a debounced full re-scan, and a single
//!   watchdog sweep forces anything still loading into a terminal failed state.
//!
//! The engine is runtime-agnostic and browser-free: it runs against the [`DocumentDom`]
//! and [`ChartRuntime`] seams, with [`HeadlessDom`] and [`SimulatedRuntime`] as the
//! in-repo implementations used by tests and the CLI.

pub mod classify;
pub mod config;
pub mod dom;
mod error;
pub mod extract;
pub mod fallback;
mod fixer;
pub mod helpers;
pub mod instrument;
pub mod libraries;
pub mod loader;
pub mod pipeline;
pub mod runtime;
pub mod store;
pub mod watch;

pub use config::{Delays, FixerConfig, MirrorOverrides};
pub use dom::{BoxSize, CssPosition, DocumentDom, HeadlessDom, NodeId, ScriptBlock};
pub use error::{Error, Result};
pub use extract::{ExtractedConfig, SourceConfidence, extract_config};
pub use fixer::{ContainerDiagnostics, DiagnosticsSnapshot, Fixer, LibraryDiagnostics};
pub use libraries::{LibraryKind, LibraryRegistry};
pub use loader::{LoadAdvance, LoadRequest, LoadStatus, ScriptLoader};
pub use pipeline::{ContainerRecord, ContainerState, FailReason};
pub use runtime::{ChartHandle, ChartRuntime, SimulatedRuntime};
pub use store::{SnippetMetadata, SnippetStore, StoredSnippet};
pub use watch::MutationWatcher;

#[cfg(test)]
mod tests;
