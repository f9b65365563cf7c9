use serde::{Deserialize, Serialize};

/// Runtime knobs for the repair pipeline.
///
/// Hosts embed this as `window.__CHART_FIXER_CONFIG__` (see [`crate::instrument`]), so the
/// serialized field names follow the JS-side camelCase convention. Every field has a default;
/// a host that only wants to flip one knob can supply a one-key JSON object.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FixerConfig {
    /// Master switch. When `false`, `bootstrap`/`fix` are no-ops.
    pub enabled: bool,
    /// Containers with a known bounding box smaller than this are never chart candidates.
    pub min_width: f64,
    pub min_height: f64,
    /// A class attribute containing any of these tokens excludes the element.
    pub class_denylist: Vec<String>,
    pub delays: Delays,
    /// Per-library mirror overrides. `None` falls back to the built-in CDN lists.
    pub mirrors: MirrorOverrides,
}

impl Default for FixerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_width: 80.0,
            min_height: 80.0,
            class_denylist: DEFAULT_CLASS_DENYLIST
                .iter()
                .map(|s| s.to_string())
                .collect(),
            delays: Delays::default(),
            mirrors: MirrorOverrides::default(),
        }
    }
}

pub const DEFAULT_CLASS_DENYLIST: &[&str] =
    &["icon", "btn", "button", "fa-", "header", "logo", "nav"];

/// All delay knobs, in milliseconds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Delays {
    /// Settle delay before the first classification pass.
    pub initial_check_ms: u64,
    /// Extra settle delay after the document's full `load` event (defaults to twice the
    /// initial delay, mirroring the double-check the fixer scripts always did).
    pub load_check_ms: u64,
    /// Mutation-watcher debounce window for full re-scans.
    pub debounce_ms: u64,
    /// Gap between two mirror attempts of the same library.
    pub mirror_gap_ms: u64,
    /// Watchdog: containers still in a loading state this long after the first overlay are
    /// forced to a terminal failure.
    pub watchdog_ms: u64,
    /// Delay before re-scanning after a helper shim was enabled from a page error.
    pub shim_rescan_ms: u64,
}

impl Default for Delays {
    fn default() -> Self {
        Self {
            initial_check_ms: 500,
            load_check_ms: 1000,
            debounce_ms: 300,
            mirror_gap_ms: 100,
            watchdog_ms: 12_000,
            shim_rescan_ms: 100,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MirrorOverrides {
    pub echarts: Option<Vec<String>>,
    pub chartjs: Option<Vec<String>>,
    pub highcharts: Option<Vec<String>>,
}
