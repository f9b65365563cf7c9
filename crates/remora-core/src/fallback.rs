//! Built-in placeholder charts for containers whose authored configuration could not be
//! recovered. Datasets are fixed so a repaired document renders identically on every run.

use crate::dom::{DocumentDom, NodeId};
use serde::Serialize;
use serde_json::{Value, json};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FallbackKind {
    Pie,
    Line,
    Bar,
    Scatter,
}

const ROTATION: &[FallbackKind] = &[
    FallbackKind::Line,
    FallbackKind::Bar,
    FallbackKind::Pie,
    FallbackKind::Scatter,
];

/// Picks a placeholder chart type from container-id keywords, else cycles through the
/// rotation by discovery index so neighboring fallback charts don't all look the same.
pub fn fallback_kind_for(element_id: Option<&str>, index: usize) -> FallbackKind {
    if let Some(id) = element_id {
        if id.contains("pie") || id.contains("product") {
            return FallbackKind::Pie;
        }
        if id.contains("line") || id.contains("trend") || id.contains("monthly") {
            return FallbackKind::Line;
        }
        if id.contains("bar") || id.contains("region") {
            return FallbackKind::Bar;
        }
    }
    ROTATION[index % ROTATION.len()]
}

pub fn fallback_option(kind: FallbackKind, title: &str) -> Value {
    match kind {
        FallbackKind::Pie => pie_option(title),
        FallbackKind::Line => line_option(title),
        FallbackKind::Bar => bar_option(title),
        FallbackKind::Scatter => scatter_option(),
    }
}

/// Recovers a chart title from the container's surroundings: an explicit title element
/// next to it, else a prettified version of the container id, else a generic label.
pub fn extract_title<D: DocumentDom>(dom: &D, node: NodeId) -> String {
    if let Some(parent) = dom.parent(node) {
        let mut candidates = vec![parent];
        candidates.extend(dom.descendants(parent));
        for candidate in candidates {
            if candidate == node {
                continue;
            }
            let tag = dom.tag(candidate);
            let class_titled = dom
                .class_attr(candidate)
                .is_some_and(|c| c.contains("chart-title") || c.contains("title"));
            if class_titled || matches!(tag, "h1" | "h2" | "h3" | "h4" | "h5") {
                let text = dom.text_content(candidate).trim().to_string();
                if !text.is_empty() {
                    return text;
                }
            }
        }
    }

    if let Some(id) = dom.element_id(node) {
        let title = id
            .split('-')
            .filter(|part| *part != "chart" && !part.is_empty())
            .map(capitalize)
            .collect::<Vec<_>>()
            .join(" ");
        if !title.is_empty() {
            return title;
        }
    }

    "数据图表".to_string()
}

fn capitalize(part: &str) -> String {
    let mut chars = part.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

fn pie_option(title: &str) -> Value {
    json!({
        "title": { "text": title, "left": "center" },
        "tooltip": { "trigger": "item", "formatter": "{a} <br/>{b}: {c} ({d}%)" },
        "legend": {
            "orient": "horizontal",
            "bottom": 10,
            "data": ["类别A", "类别B", "类别C", "类别D", "类别E"]
        },
        "series": [{
            "name": title,
            "type": "pie",
            "radius": ["40%", "70%"],
            "avoidLabelOverlap": false,
            "itemStyle": { "borderRadius": 10, "borderColor": "#fff", "borderWidth": 2 },
            "label": { "show": false, "position": "center" },
            "emphasis": { "label": { "show": true, "fontSize": "18", "fontWeight": "bold" } },
            "labelLine": { "show": false },
            "data": [
                { "value": 35, "name": "类别A" },
                { "value": 25, "name": "类别B" },
                { "value": 20, "name": "类别C" },
                { "value": 15, "name": "类别D" },
                { "value": 5, "name": "类别E" }
            ]
        }]
    })
}

fn line_option(title: &str) -> Value {
    json!({
        "title": { "text": title, "left": "center" },
        "tooltip": { "trigger": "axis" },
        "legend": { "data": ["数据1", "数据2"], "bottom": 10 },
        "grid": { "left": "3%", "right": "4%", "bottom": "15%", "containLabel": true },
        "xAxis": {
            "type": "category",
            "boundaryGap": false,
            "data": ["1月", "2月", "3月", "4月", "5月", "6月", "7月", "8月", "9月"]
        },
        "yAxis": { "type": "value" },
        "series": [
            {
                "name": "数据1",
                "type": "line",
                "stack": "总量",
                "smooth": true,
                "data": [120, 132, 101, 134, 90, 230, 210, 182, 191]
            },
            {
                "name": "数据2",
                "type": "line",
                "stack": "总量",
                "smooth": true,
                "data": [220, 182, 191, 234, 290, 330, 310, 123, 442]
            }
        ]
    })
}

fn bar_option(title: &str) -> Value {
    json!({
        "title": { "text": title, "left": "center" },
        "tooltip": { "trigger": "axis", "axisPointer": { "type": "shadow" } },
        "legend": { "data": ["数据1", "数据2"], "bottom": 10 },
        "grid": { "left": "3%", "right": "4%", "bottom": "15%", "containLabel": true },
        "xAxis": [{
            "type": "category",
            "data": ["类别1", "类别2", "类别3", "类别4", "类别5", "类别6", "类别7"]
        }],
        "yAxis": [{ "type": "value" }],
        "series": [
            { "name": "数据1", "type": "bar", "data": [120, 132, 101, 134, 90, 230, 210] },
            { "name": "数据2", "type": "bar", "data": [220, 182, 191, 234, 290, 330, 310] }
        ]
    })
}

fn scatter_option() -> Value {
    json!({
        "title": { "text": "散点图示例", "left": "center" },
        "xAxis": {},
        "yAxis": {},
        "series": [{
            "symbolSize": 20,
            "data": [
                [10.0, 8.04], [8.07, 6.95], [13.0, 7.58], [9.05, 8.81], [11.0, 8.33],
                [14.0, 7.66], [13.4, 6.81], [10.0, 6.33], [14.0, 8.96], [12.5, 6.82],
                [9.15, 7.2], [11.5, 7.2], [3.03, 4.23], [12.2, 7.83], [2.02, 4.47],
                [1.05, 3.33], [4.05, 4.96], [6.03, 7.24], [12.0, 6.26], [12.0, 8.84],
                [7.08, 5.82], [5.02, 5.68]
            ],
            "type": "scatter"
        }]
    })
}

/// The default pie chart applied when nothing at all is known about the container.
/// Kept byte-stable: tests and downstream snapshots rely on this exact shape.
pub fn default_pie_option() -> Value {
    json!({
        "tooltip": { "trigger": "item", "formatter": "{a} <br/>{b}: {c} ({d}%)" },
        "legend": {
            "orient": "horizontal",
            "bottom": 10,
            "data": ["示例数据1", "示例数据2", "示例数据3"]
        },
        "series": [{
            "name": "自动生成数据",
            "type": "pie",
            "radius": ["40%", "70%"],
            "center": ["50%", "50%"],
            "avoidLabelOverlap": false,
            "itemStyle": { "borderRadius": 10, "borderColor": "#fff", "borderWidth": 2 },
            "data": [
                { "value": 40, "name": "示例数据1", "itemStyle": { "color": "#5470c6" } },
                { "value": 30, "name": "示例数据2", "itemStyle": { "color": "#91cc75" } },
                { "value": 30, "name": "示例数据3", "itemStyle": { "color": "#fac858" } }
            ]
        }]
    })
}
