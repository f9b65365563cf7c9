use futures::executor::block_on;
use remora::headless::{DriveOptions, NetworkPolicy, fix_document_sync};
use remora::{ContainerState, FixerConfig, SourceConfidence};

const PREVIEW_DOC: &str = r#"<html>
<head>
    <script src="https://cdn.jsdelivr.net/npm/echarts@5.4.3/dist/echarts.min.js"></script>
</head>
<body>
    <div class="card">
        <h3>月度销售</h3>
        <div id="sales-chart" style="width:400px;height:300px"></div>
    </div>
    <script>
    var myChart = echarts.init(document.getElementById('sales-chart'));
    var option = {tooltip:{},series:[{type:'pie',data:[{value:1,name:'a'}]}]};
    myChart.setOption(option);
    </script>
</body>
</html>"#;

#[test]
fn online_run_renders_with_extracted_config() {
    let outcome =
        fix_document_sync(PREVIEW_DOC, FixerConfig::default(), DriveOptions::default()).unwrap();

    assert_eq!(outcome.diagnostics.containers.len(), 1);
    let container = &outcome.diagnostics.containers[0];
    assert_eq!(container.key, "sales-chart");
    assert_eq!(container.state, ContainerState::Rendered);
    assert_eq!(container.confidence, SourceConfidence::DirectMatch);
    assert!(container.has_chart);

    // The repaired document carries the simulated chart surface, no overlay remnants.
    assert!(outcome.html.contains("data-chart-lib=\"echarts\""));
    assert!(!outcome.html.contains("chart-fixer-overlay"));
}

#[test]
fn offline_run_ends_in_visible_failure() {
    let options = DriveOptions {
        network: NetworkPolicy::Offline,
        ..DriveOptions::default()
    };
    let outcome = fix_document_sync(PREVIEW_DOC, FixerConfig::default(), options).unwrap();

    let container = &outcome.diagnostics.containers[0];
    assert_eq!(container.state, ContainerState::Failed);
    assert!(
        container
            .fail_message
            .as_deref()
            .unwrap()
            .contains("无法加载或初始化图表")
    );
    assert!(outcome.html.contains("图表加载失败"));

    // Every ECharts mirror was attempted exactly once.
    let echarts = &outcome.diagnostics.libraries[0];
    assert_eq!(echarts.attempts, 5);
}

#[test]
fn document_without_charts_is_untouched() {
    let outcome = fix_document_sync(
        "<html><head></head><body><p>plain text</p></body></html>",
        FixerConfig::default(),
        DriveOptions::default(),
    )
    .unwrap();
    assert!(outcome.diagnostics.containers.is_empty());
    assert!(outcome.html.contains("<p>plain text</p>"));
}

#[test]
fn async_wrapper_matches_sync_behavior() {
    let outcome = block_on(remora::headless::fix_document(
        PREVIEW_DOC,
        FixerConfig::default(),
        DriveOptions::default(),
    ))
    .unwrap();
    assert_eq!(
        outcome.diagnostics.containers[0].state,
        ContainerState::Rendered
    );
}
