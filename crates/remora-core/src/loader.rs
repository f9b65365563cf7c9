//! Mirror-fallback script loading, modeled as an event-driven state machine.
//!
//! The loader never touches the network itself: `request` hands the embedder an
//! inject-script action, the embedder reports the outcome per URL via `on_script_result`,
//! and the loader advances the mirror cursor or settles every waiter. At most one load per
//! library is ever in flight; later requests for the same library join the pending one.

use crate::libraries::LibraryKind;
use crate::{Error, Result};
use rustc_hash::FxHashMap;
use serde::Serialize;
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum LoadStatus {
    NotStarted,
    Loading,
    Loaded,
    ExhaustedFailed,
}

#[derive(Debug)]
struct LoadRecord {
    mirrors: Vec<String>,
    attempt: usize,
    status: LoadStatus,
    /// Container keys awaiting this load's outcome.
    waiters: Vec<String>,
}

/// What the caller of [`ScriptLoader::request`] should do next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadRequest {
    /// The library global is already installed; proceed immediately.
    AlreadyLoaded,
    /// A load is in flight; the waiter was attached to it.
    Joined,
    /// A fresh load started: inject a script element for this URL now.
    Inject { url: String },
    /// A previous load for this library already exhausted its mirrors.
    AlreadyFailed,
}

/// Outcome of reporting a script load/error event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadAdvance {
    /// The current mirror failed; inject this one after the configured gap.
    TryNext { url: String },
    /// The library loaded; settle these waiters.
    Resolved { waiters: Vec<String> },
    /// Every mirror failed; fail these waiters.
    Exhausted { waiters: Vec<String>, attempts: usize },
}

#[derive(Debug, Default)]
pub struct ScriptLoader {
    records: FxHashMap<LibraryKind, LoadRecord>,
}

impl ScriptLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests `kind` to be loaded from `mirrors`, registering `waiter` for the outcome.
    ///
    /// Mirrors are attempted strictly in order, one at a time. Entries that are not even
    /// parseable URLs are logged and attempted anyway (the embedder will report an error
    /// event for them), so the attempt count always equals the mirror count.
    pub fn request(
        &mut self,
        kind: LibraryKind,
        mirrors: Vec<String>,
        waiter: &str,
    ) -> Result<LoadRequest> {
        if let Some(record) = self.records.get_mut(&kind) {
            match record.status {
                LoadStatus::Loaded => return Ok(LoadRequest::AlreadyLoaded),
                LoadStatus::Loading => {
                    if !record.waiters.iter().any(|w| w == waiter) {
                        record.waiters.push(waiter.to_string());
                    }
                    return Ok(LoadRequest::Joined);
                }
                LoadStatus::ExhaustedFailed => return Ok(LoadRequest::AlreadyFailed),
                LoadStatus::NotStarted => {}
            }
        }

        if mirrors.is_empty() {
            return Err(Error::EmptyMirrorList {
                library: kind.to_string(),
            });
        }

        for mirror in &mirrors {
            if Url::parse(mirror).is_err() {
                tracing::warn!(library = %kind, url = %mirror, "mirror entry is not a valid URL");
            }
        }

        let url = mirrors[0].clone();
        self.records.insert(
            kind,
            LoadRecord {
                mirrors,
                attempt: 0,
                status: LoadStatus::Loading,
                waiters: vec![waiter.to_string()],
            },
        );
        tracing::debug!(library = %kind, url = %url, "starting library load");
        Ok(LoadRequest::Inject { url })
    }

    /// Reports the load (`ok = true`) or error event for the library's current attempt.
    ///
    /// Returns `None` when no load for `kind` is in flight (stale event).
    pub fn on_script_result(&mut self, kind: LibraryKind, ok: bool) -> Option<LoadAdvance> {
        let record = self.records.get_mut(&kind)?;
        if record.status != LoadStatus::Loading {
            return None;
        }

        if ok {
            record.status = LoadStatus::Loaded;
            let waiters = std::mem::take(&mut record.waiters);
            tracing::debug!(library = %kind, attempts = record.attempt + 1, "library loaded");
            return Some(LoadAdvance::Resolved { waiters });
        }

        let failed = record.mirrors[record.attempt].clone();
        record.attempt += 1;
        if record.attempt < record.mirrors.len() {
            let next = record.mirrors[record.attempt].clone();
            tracing::warn!(library = %kind, failed = %failed, next = %next, "mirror failed, falling back");
            return Some(LoadAdvance::TryNext { url: next });
        }

        record.status = LoadStatus::ExhaustedFailed;
        let waiters = std::mem::take(&mut record.waiters);
        let attempts = record.attempt;
        tracing::error!(library = %kind, attempts, "all mirrors failed");
        Some(LoadAdvance::Exhausted { waiters, attempts })
    }

    /// Records that the library global was already present (no load needed).
    pub fn mark_preloaded(&mut self, kind: LibraryKind) {
        let record = self.records.entry(kind).or_insert(LoadRecord {
            mirrors: Vec::new(),
            attempt: 0,
            status: LoadStatus::Loaded,
            waiters: Vec::new(),
        });
        record.status = LoadStatus::Loaded;
    }

    pub fn status(&self, kind: LibraryKind) -> LoadStatus {
        self.records
            .get(&kind)
            .map(|r| r.status)
            .unwrap_or(LoadStatus::NotStarted)
    }

    /// Mirror attempts consumed so far (including the one currently in flight).
    pub fn attempts(&self, kind: LibraryKind) -> usize {
        self.records
            .get(&kind)
            .map(|r| match r.status {
                LoadStatus::Loaded if r.mirrors.is_empty() => 0,
                LoadStatus::Loading | LoadStatus::Loaded => r.attempt + 1,
                LoadStatus::ExhaustedFailed => r.attempt,
                LoadStatus::NotStarted => 0,
            })
            .unwrap_or(0)
    }

    /// The URL of the attempt currently in flight, if any.
    pub fn current_url(&self, kind: LibraryKind) -> Option<&str> {
        let record = self.records.get(&kind)?;
        if record.status != LoadStatus::Loading {
            return None;
        }
        record.mirrors.get(record.attempt).map(String::as_str)
    }

    /// Libraries with a load currently in flight.
    pub fn loading(&self) -> Vec<LibraryKind> {
        self.records
            .iter()
            .filter(|(_, r)| r.status == LoadStatus::Loading)
            .map(|(k, _)| *k)
            .collect()
    }

    /// Forgets a failed record so a manual re-trigger can retry with a fresh mirror list.
    pub fn reset_failed(&mut self, kind: LibraryKind) {
        if let Some(record) = self.records.get(&kind) {
            if record.status == LoadStatus::ExhaustedFailed {
                self.records.remove(&kind);
            }
        }
    }
}
