use crate::dom::{BoxSize, CssPosition, DocumentDom};
use crate::HeadlessDom;

#[test]
fn parses_ids_classes_and_inline_sizes() {
    let dom = HeadlessDom::parse_document(
        r#"<html><body><div id="main-chart" class="panel wide" style="width: 400px; height:300px"></div></body></html>"#,
    );
    let node = dom
        .descendants(dom.root())
        .into_iter()
        .find(|&n| dom.element_id(n) == Some("main-chart"))
        .unwrap();
    assert_eq!(dom.tag(node), "div");
    assert_eq!(dom.class_attr(node), Some("panel wide"));
    assert_eq!(
        dom.bounding_box(node),
        Some(BoxSize {
            width: 400.0,
            height: 300.0
        })
    );
}

#[test]
fn dimension_attributes_work_like_canvas_sizing() {
    let dom = HeadlessDom::parse_document(
        r#"<html><body><canvas id="chart-canvas" width="600" height="320"></canvas></body></html>"#,
    );
    let node = dom
        .descendants(dom.root())
        .into_iter()
        .find(|&n| dom.tag(n) == "canvas")
        .unwrap();
    assert_eq!(
        dom.bounding_box(node),
        Some(BoxSize {
            width: 600.0,
            height: 320.0
        })
    );
}

#[test]
fn missing_dimensions_mean_unknown_box() {
    let dom =
        HeadlessDom::parse_document(r#"<html><body><div id="chart"></div></body></html>"#);
    let node = dom
        .descendants(dom.root())
        .into_iter()
        .find(|&n| dom.element_id(n) == Some("chart"))
        .unwrap();
    assert_eq!(dom.bounding_box(node), None);
}

#[test]
fn set_style_merges_and_overrides() {
    let mut dom = HeadlessDom::parse_document(
        r#"<html><body><div id="chart" style="width:100px;position:static"></div></body></html>"#,
    );
    let node = dom
        .descendants(dom.root())
        .into_iter()
        .find(|&n| dom.element_id(n) == Some("chart"))
        .unwrap();
    assert_eq!(dom.computed_position(node), CssPosition::Static);

    dom.set_style(node, "position", "relative");
    assert_eq!(dom.computed_position(node), CssPosition::Relative);
    // Unrelated declarations survive.
    assert_eq!(
        dom.bounding_box(node).map(|b| b.width),
        Some(100.0)
    );
}

#[test]
fn inline_scripts_exclude_external_ones() {
    let dom = HeadlessDom::parse_document(
        r#"<html><head>
            <script src="https://cdn.jsdelivr.net/npm/echarts@5.4.3/dist/echarts.min.js"></script>
            <script>var option = {series:[]};</script>
        </head><body></body></html>"#,
    );
    let scripts = dom.inline_scripts();
    assert_eq!(scripts.len(), 1);
    assert!(scripts[0].text.contains("var option"));

    let sources = dom.script_sources();
    assert_eq!(sources.len(), 1);
    assert!(sources[0].contains("echarts"));
}

#[test]
fn created_elements_attach_and_detach() {
    let mut dom = HeadlessDom::parse_document(r#"<html><body></body></html>"#);
    let body = dom.body().unwrap();
    let div = dom.create_element("div");
    assert!(!dom.is_attached(div));

    dom.append_child(body, div);
    assert!(dom.is_attached(div));

    dom.remove_node(div);
    assert!(!dom.is_attached(div));
    assert!(dom.children(body).is_empty());
}

#[test]
fn text_content_recurses() {
    let dom = HeadlessDom::parse_document(
        r#"<html><body><div class="card"><h3>销售趋势</h3><div id="chart"></div></div></body></html>"#,
    );
    let card = dom
        .descendants(dom.root())
        .into_iter()
        .find(|&n| dom.class_attr(n) == Some("card"))
        .unwrap();
    assert_eq!(dom.text_content(card).trim(), "销售趋势");
}

#[test]
fn serializes_back_to_html() {
    let mut dom = HeadlessDom::parse_document(
        r#"<html><head></head><body><div id="chart"></div></body></html>"#,
    );
    let chart = dom
        .descendants(dom.root())
        .into_iter()
        .find(|&n| dom.element_id(n) == Some("chart"))
        .unwrap();
    let overlay = dom.create_element("div");
    dom.set_attr(overlay, "class", "chart-fixer-overlay");
    dom.set_text(overlay, "图表加载中...");
    dom.append_child(chart, overlay);

    let html = dom.to_html();
    assert!(html.starts_with("<!DOCTYPE html>"));
    assert!(html.contains(r#"<div id="chart"><div class="chart-fixer-overlay">图表加载中...</div></div>"#));
}

#[test]
fn script_text_is_not_entity_escaped_on_serialize() {
    let dom = HeadlessDom::parse_document(
        "<html><head><script>if (a < b && c > d) {}</script></head><body></body></html>",
    );
    let html = dom.to_html();
    assert!(html.contains("if (a < b && c > d) {}"));
}
