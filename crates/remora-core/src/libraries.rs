use crate::FixerConfig;
use serde::{Deserialize, Serialize};

/// The charting libraries the repair pipeline knows how to drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LibraryKind {
    Echarts,
    Chartjs,
    Highcharts,
    Unknown,
}

impl LibraryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LibraryKind::Echarts => "echarts",
            LibraryKind::Chartjs => "chartjs",
            LibraryKind::Highcharts => "highcharts",
            LibraryKind::Unknown => "unknown",
        }
    }

    /// Name of the page-wide global the library installs when loaded.
    pub fn global_name(&self) -> &'static str {
        match self {
            LibraryKind::Echarts => "echarts",
            LibraryKind::Chartjs => "Chart",
            LibraryKind::Highcharts => "Highcharts",
            LibraryKind::Unknown => "",
        }
    }
}

impl std::fmt::Display for LibraryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A library the registry can recognize in `script[src]` references and load from mirrors.
#[derive(Debug, Clone)]
pub struct LibraryDescriptor {
    pub kind: LibraryKind,
    /// Substrings that identify this library in a script `src` URL.
    pub src_markers: &'static [&'static str],
    /// Built-in CDN mirror list, in attempt order.
    pub mirrors: &'static [&'static str],
}

const ECHARTS_MIRRORS: &[&str] = &[
    "https://cdn.jsdelivr.net/npm/echarts@5.4.3/dist/echarts.min.js",
    "https://cdn.staticfile.org/echarts/5.4.3/echarts.min.js",
    "https://cdn.bootcdn.net/ajax/libs/echarts/5.4.3/echarts.min.js",
    "https://lf9-cdn-tos.bytecdntp.com/cdn/expire-1-M/echarts/5.4.3/echarts.min.js",
    "https://unpkg.zhimg.com/echarts@5.4.3/dist/echarts.min.js",
];

const CHARTJS_MIRRORS: &[&str] = &[
    "https://cdn.jsdelivr.net/npm/chart.js@4.4.0/dist/chart.umd.js",
    "https://cdn.staticfile.org/Chart.js/4.4.0/chart.umd.min.js",
    "https://cdn.bootcdn.net/ajax/libs/Chart.js/4.4.0/chart.umd.min.js",
];

const HIGHCHARTS_MIRRORS: &[&str] = &[
    "https://cdn.jsdelivr.net/npm/highcharts@11.2.0/highcharts.js",
    "https://cdn.staticfile.org/highcharts/11.2.0/highcharts.js",
    "https://cdn.bootcdn.net/ajax/libs/highcharts/11.2.0/highcharts.js",
];

#[derive(Debug, Clone)]
pub struct LibraryRegistry {
    descriptors: Vec<LibraryDescriptor>,
}

impl LibraryRegistry {
    pub fn new() -> Self {
        Self {
            descriptors: Vec::new(),
        }
    }

    pub fn add(&mut self, descriptor: LibraryDescriptor) {
        self.descriptors.push(descriptor);
    }

    /// The three libraries the source product repaired, in its recognition order.
    pub fn default_set() -> Self {
        let mut reg = Self::new();
        reg.add(LibraryDescriptor {
            kind: LibraryKind::Echarts,
            src_markers: &["echarts"],
            mirrors: ECHARTS_MIRRORS,
        });
        reg.add(LibraryDescriptor {
            kind: LibraryKind::Chartjs,
            src_markers: &["chart.js", "Chart.js", "chart.umd"],
            mirrors: CHARTJS_MIRRORS,
        });
        reg.add(LibraryDescriptor {
            kind: LibraryKind::Highcharts,
            src_markers: &["highcharts"],
            mirrors: HIGHCHARTS_MIRRORS,
        });
        reg
    }

    pub fn descriptors(&self) -> &[LibraryDescriptor] {
        &self.descriptors
    }

    pub fn get(&self, kind: LibraryKind) -> Option<&LibraryDescriptor> {
        self.descriptors.iter().find(|d| d.kind == kind)
    }

    /// Libraries referenced by the document's external script URLs, in registry order,
    /// deduplicated.
    pub fn detect_references(&self, script_srcs: &[String]) -> Vec<LibraryKind> {
        let mut found = Vec::new();
        for descriptor in &self.descriptors {
            let referenced = script_srcs
                .iter()
                .any(|src| descriptor.src_markers.iter().any(|m| src.contains(m)));
            if referenced && !found.contains(&descriptor.kind) {
                found.push(descriptor.kind);
            }
        }
        found
    }

    /// Effective mirror list for a library: host override first, else the built-in CDN set.
    pub fn mirrors_for(&self, kind: LibraryKind, config: &FixerConfig) -> Vec<String> {
        let override_list = match kind {
            LibraryKind::Echarts => config.mirrors.echarts.as_ref(),
            LibraryKind::Chartjs => config.mirrors.chartjs.as_ref(),
            LibraryKind::Highcharts => config.mirrors.highcharts.as_ref(),
            LibraryKind::Unknown => None,
        };
        if let Some(list) = override_list {
            return list.clone();
        }
        self.get(kind)
            .map(|d| d.mirrors.iter().map(|s| s.to_string()).collect())
            .unwrap_or_default()
    }
}

impl Default for LibraryRegistry {
    fn default() -> Self {
        Self::default_set()
    }
}
