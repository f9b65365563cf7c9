#![forbid(unsafe_code)]

//! `remora` is a headless chart repair engine for live HTML previews.
//!
//! User-authored documents frequently reference a charting library that fails to load, or
//! initialize charts before their library arrived. Remora scans such a document for chart
//! containers, recovers option objects from inline script text, loads the library from
//! mirror lists with strict-order fallback, and guarantees each container ends visibly
//! rendered (real config or deterministic placeholder) or visibly failed.
//!
//! This crate re-exports the engine from `remora-core` and adds the [`headless`] driver,
//! which runs the full event loop to quiescence against the in-repo document and runtime
//! implementations; that driver is the entry point used by the CLI and integration tests.

pub use remora_core::*;

pub mod headless {
    //! Drives a [`Fixer`] over a parsed document until no work remains.

    use crate::{
        DiagnosticsSnapshot, Fixer, FixerConfig, HeadlessDom, Result, SimulatedRuntime,
    };

    /// How the driver answers the engine's script-load requests.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub enum NetworkPolicy {
        /// Every injected script "loads" successfully.
        #[default]
        Online,
        /// Every injected script errors, exercising mirror fallback and exhaustion.
        Offline,
    }

    #[derive(Debug, Clone, Copy)]
    pub struct DriveOptions {
        pub network: NetworkPolicy,
        /// Upper bound on driver iterations. Quiescence arrives far earlier; the bound
        /// only guards against an embedder-provided engine that never settles.
        pub max_steps: usize,
    }

    impl Default for DriveOptions {
        fn default() -> Self {
            Self {
                network: NetworkPolicy::Online,
                max_steps: 10_000,
            }
        }
    }

    /// The repaired document plus the engine's final introspection snapshot.
    #[derive(Debug, Clone)]
    pub struct FixOutcome {
        pub html: String,
        pub diagnostics: DiagnosticsSnapshot,
    }

    /// Parses `html`, runs the whole pipeline to quiescence, and returns the repaired
    /// document with diagnostics.
    pub fn fix_document_sync(
        html: &str,
        config: FixerConfig,
        options: DriveOptions,
    ) -> Result<FixOutcome> {
        let dom = HeadlessDom::parse_document(html);
        let mut fixer = Fixer::new(dom, SimulatedRuntime::new(), config);
        let mut now: u64 = 0;
        fixer.bootstrap(now);
        fixer.document_loaded(now);
        run_to_quiescence(&mut fixer, &mut now, options);

        let diagnostics = fixer.diagnostics();
        let html = fixer.into_dom().to_html();
        Ok(FixOutcome { html, diagnostics })
    }

    pub async fn fix_document(
        html: &str,
        config: FixerConfig,
        options: DriveOptions,
    ) -> Result<FixOutcome> {
        fix_document_sync(html, config, options)
    }

    /// Pumps timers and answers pending script loads until the engine has nothing left to
    /// do. `now` advances along the engine's own wakeup schedule, so runs are fully
    /// deterministic.
    pub fn run_to_quiescence(
        fixer: &mut Fixer<HeadlessDom, SimulatedRuntime>,
        now: &mut u64,
        options: DriveOptions,
    ) {
        for _ in 0..options.max_steps {
            let pending = fixer.pending_loads();
            if !pending.is_empty() {
                let ok = options.network == NetworkPolicy::Online;
                for (kind, url) in pending {
                    tracing::debug!(library = %kind, %url, ok, "answering script load");
                    fixer.on_script_result(kind, ok, *now);
                }
                continue;
            }
            match fixer.next_wakeup() {
                Some(due) => {
                    *now = (*now).max(due);
                    fixer.tick(*now);
                }
                None => break,
            }
        }
    }
}
