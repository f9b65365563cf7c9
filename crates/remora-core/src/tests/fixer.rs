use crate::dom::DocumentDom;
use crate::extract::SourceConfidence;
use crate::pipeline::FailReason;
use crate::{
    ContainerState, Fixer, FixerConfig, HeadlessDom, LibraryKind, LoadStatus, SimulatedRuntime,
};

const SIZED_CONTAINER: &str = r#"<html><head></head><body>
    <div id="sales-chart" style="width:400px;height:300px"></div>
</body></html>"#;

fn preloaded_fixer(html: &str) -> Fixer<HeadlessDom, SimulatedRuntime> {
    let dom = HeadlessDom::parse_document(html);
    let runtime = SimulatedRuntime::preloaded(&[LibraryKind::Echarts]);
    Fixer::new(dom, runtime, FixerConfig::default())
}

fn cold_fixer(html: &str) -> Fixer<HeadlessDom, SimulatedRuntime> {
    let dom = HeadlessDom::parse_document(html);
    Fixer::new(dom, SimulatedRuntime::new(), FixerConfig::default())
}

#[test]
fn preloaded_library_renders_container_after_initial_settle() {
    let mut fixer = preloaded_fixer(SIZED_CONTAINER);
    fixer.bootstrap(0);
    assert!(fixer.records().next().is_none());

    fixer.tick(499);
    assert!(fixer.records().next().is_none());

    fixer.tick(500);
    assert_eq!(
        fixer.container_state("sales-chart"),
        Some(ContainerState::Rendered)
    );

    // Overlay removed, a rendered chart child present.
    let record = fixer.records().next().unwrap();
    assert!(record.overlay.is_none());
    assert!(record.handle.is_some());
    let node = record.node;
    assert!(fixer.dom().has_descendant_tag(node, "canvas"));
}

#[test]
fn fallback_guarantee_renders_without_any_config() {
    let mut fixer = preloaded_fixer(SIZED_CONTAINER);
    fixer.fix(0);
    let record = fixer.records().next().unwrap();
    assert_eq!(record.state, ContainerState::Rendered);
    assert_eq!(record.confidence, SourceConfidence::None);

    let handle = record.handle.unwrap();
    let option = fixer.runtime().option_for(handle).unwrap();
    // "sales-chart" has no type keyword and discovery index 0: line is first in rotation.
    assert_eq!(option["series"][0]["type"], "line");
    assert_eq!(option["title"]["text"], "Sales");
}

#[test]
fn extracted_config_wins_over_fallback() {
    let html = r#"<html><body>
        <div id="sales-chart" style="width:400px;height:300px"></div>
        <script>
        var myChart = echarts.init(document.getElementById('sales-chart'));
        var option = {tooltip:{},series:[{type:'pie',data:[]}]};
        myChart.setOption(option);
        </script>
    </body></html>"#;
    let mut fixer = preloaded_fixer(html);
    fixer.fix(0);
    let record = fixer.records().next().unwrap();
    assert_eq!(record.state, ContainerState::Rendered);
    assert_eq!(record.confidence, SourceConfidence::DirectMatch);
    let option = fixer.runtime().option_for(record.handle.unwrap()).unwrap();
    assert_eq!(option["series"][0]["type"], "pie");
}

#[test]
fn pipeline_is_idempotent_per_container() {
    let mut fixer = preloaded_fixer(SIZED_CONTAINER);
    fixer.fix(0);
    assert_eq!(fixer.runtime().instance_count(), 1);

    fixer.fix(100);
    fixer.tick(2000);
    assert_eq!(fixer.runtime().instance_count(), 1);
    assert_eq!(fixer.records().count(), 1);
}

#[test]
fn container_with_existing_chart_child_short_circuits() {
    let html = r#"<html><body>
        <div id="sales-chart" style="width:400px;height:300px"><canvas></canvas></div>
    </body></html>"#;
    let mut fixer = preloaded_fixer(html);
    fixer.fix(0);
    let record = fixer.records().next().unwrap();
    assert_eq!(record.state, ContainerState::Rendered);
    // Short-circuit: no init call was made.
    assert_eq!(fixer.runtime().instance_count(), 0);
}

#[test]
fn missing_library_is_loaded_through_first_mirror() {
    let mut fixer = cold_fixer(SIZED_CONTAINER);
    fixer.fix(0);
    assert_eq!(
        fixer.container_state("sales-chart"),
        Some(ContainerState::AwaitingLibrary)
    );
    let pending = fixer.pending_loads();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].0, LibraryKind::Echarts);
    assert!(pending[0].1.contains("echarts"));

    fixer.on_script_result(LibraryKind::Echarts, true, 50);
    assert_eq!(
        fixer.container_state("sales-chart"),
        Some(ContainerState::Rendered)
    );
}

#[test]
fn concurrent_triggers_inject_exactly_one_script() {
    let mut fixer = cold_fixer(SIZED_CONTAINER);
    fixer.fix(0);
    fixer.fix(0);
    fixer.tick(1000);

    let dom = fixer.dom();
    let injected: Vec<_> = dom
        .descendants(dom.root())
        .into_iter()
        .filter(|&n| dom.attr(n, "data-chart-fixer-load").is_some())
        .collect();
    assert_eq!(injected.len(), 1);
}

#[test]
fn exhausted_mirrors_fail_with_visible_panel() {
    let mut fixer = cold_fixer(SIZED_CONTAINER);
    fixer.fix(0);

    let mut now = 0;
    // Default ECharts list carries five mirrors; fail each in turn.
    for _ in 0..5 {
        assert_eq!(fixer.pending_loads().len(), 1);
        fixer.on_script_result(LibraryKind::Echarts, false, now);
        now += 100;
        fixer.tick(now);
    }

    let record = fixer.records().next().unwrap();
    assert_eq!(record.state, ContainerState::Failed);
    assert_eq!(record.fail_reason, Some(FailReason::LibraryUnavailable));

    let diag = fixer.diagnostics();
    assert_eq!(diag.libraries[0].status, LoadStatus::ExhaustedFailed);
    assert_eq!(diag.libraries[0].attempts, 5);

    // The panel is visible inside the container and names the failure.
    let node = record.node;
    let text = fixer.dom().text_content(node);
    assert!(text.contains("图表加载失败"));
    assert!(text.contains("无法加载或初始化图表"));
}

#[test]
fn library_failure_propagates_to_every_waiter() {
    let html = r#"<html><body>
        <div id="a-chart" style="width:300px;height:300px"></div>
        <div id="b-chart" style="width:300px;height:300px"></div>
    </body></html>"#;
    let mut fixer = cold_fixer(html);
    fixer.fix(0);

    let mut now = 0;
    for _ in 0..5 {
        fixer.on_script_result(LibraryKind::Echarts, false, now);
        now += 100;
        fixer.tick(now);
    }

    assert_eq!(
        fixer.container_state("a-chart"),
        Some(ContainerState::Failed)
    );
    assert_eq!(
        fixer.container_state("b-chart"),
        Some(ContainerState::Failed)
    );
}

#[test]
fn watchdog_sweeps_stuck_containers() {
    let mut fixer = cold_fixer(SIZED_CONTAINER);
    fixer.fix(0);
    assert_eq!(
        fixer.container_state("sales-chart"),
        Some(ContainerState::AwaitingLibrary)
    );

    // No script result ever arrives; the watchdog fires at fix-time + 12s.
    fixer.tick(12_000);
    let record = fixer.records().next().unwrap();
    assert_eq!(record.state, ContainerState::Failed);
    assert_eq!(record.fail_reason, Some(FailReason::Timeout));
    let text = fixer.dom().text_content(record.node);
    assert!(text.contains("无法加载或初始化图表，请检查控制台获取详细信息"));
}

#[test]
fn init_failure_is_contained_per_container() {
    let html = r#"<html><body>
        <div id="bad-chart" style="width:300px;height:300px"></div>
    </body></html>"#;
    let dom = HeadlessDom::parse_document(html);
    let mut runtime = SimulatedRuntime::preloaded(&[LibraryKind::Echarts]);
    runtime.fail_init_with("container has no size");
    let mut fixer = Fixer::new(dom, runtime, FixerConfig::default());
    fixer.fix(0);

    let record = fixer.records().next().unwrap();
    assert_eq!(record.state, ContainerState::Failed);
    assert_eq!(
        record.fail_reason,
        Some(FailReason::Init("container has no size".to_string()))
    );
    let text = fixer.dom().text_content(record.node);
    assert!(text.contains("图表初始化失败"));
}

#[test]
fn manual_fix_reenters_failed_containers() {
    let html = r#"<html><body>
        <div id="bad-chart" style="width:300px;height:300px"></div>
    </body></html>"#;
    let dom = HeadlessDom::parse_document(html);
    let mut runtime = SimulatedRuntime::preloaded(&[LibraryKind::Echarts]);
    runtime.fail_init_with("flaky");
    let mut fixer = Fixer::new(dom, runtime, FixerConfig::default());
    fixer.fix(0);
    assert_eq!(
        fixer.container_state("bad-chart"),
        Some(ContainerState::Failed)
    );

    // Failure is terminal until a manual trigger; the next fix retries and succeeds.
    fixer.runtime_mut().clear_init_failure();
    fixer.fix(100);
    assert_eq!(
        fixer.container_state("bad-chart"),
        Some(ContainerState::Rendered)
    );
    // The old error panel is gone.
    let record = fixer.records().next().unwrap();
    let text = fixer.dom().text_content(record.node);
    assert!(!text.contains("图表加载失败"));
}

#[test]
fn mutation_debounce_coalesces_full_rescans() {
    let mut fixer = preloaded_fixer("<html><head></head><body><div id=\"host\"></div></body></html>");
    fixer.bootstrap(0);
    fixer.tick(500);
    assert_eq!(fixer.records().count(), 0);

    // A late script populates a chart container without reporting it as an inserted
    // subtree; only the debounced full re-scan can find it.
    let body = fixer.dom().body().unwrap();
    let late = fixer.dom_mut().create_element("div");
    fixer.dom_mut().set_attr(late, "id", "late-chart");
    fixer.dom_mut().set_attr(late, "style", "width:300px;height:300px");
    fixer.dom_mut().append_child(body, late);

    // 50 rapid unrelated insertions inside one debounce window.
    let unrelated = fixer.dom_mut().create_element("div");
    fixer.dom_mut().append_child(body, unrelated);
    for i in 0..50 {
        fixer.dom_mutated(&[unrelated], 600 + i);
    }
    // One deadline was armed at the first notification.
    assert_eq!(fixer.next_wakeup(), Some(900));

    fixer.tick(899);
    assert_eq!(fixer.records().count(), 0);
    fixer.tick(900);
    assert_eq!(
        fixer.container_state("late-chart"),
        Some(ContainerState::Rendered)
    );
}

#[test]
fn inserted_subtree_is_classified_immediately() {
    let mut fixer = preloaded_fixer("<html><head></head><body></body></html>");
    fixer.bootstrap(0);
    fixer.tick(500);

    let body = fixer.dom().body().unwrap();
    let added = fixer.dom_mut().create_element("div");
    fixer.dom_mut().set_attr(added, "id", "live-chart");
    fixer.dom_mut().set_attr(added, "style", "width:300px;height:300px");
    fixer.dom_mut().append_child(body, added);

    fixer.dom_mutated(&[added], 600);
    assert_eq!(
        fixer.container_state("live-chart"),
        Some(ContainerState::Rendered)
    );
}

#[test]
fn removed_container_is_pruned_and_disposed() {
    let mut fixer = preloaded_fixer(SIZED_CONTAINER);
    fixer.fix(0);
    assert_eq!(fixer.runtime().instance_count(), 1);

    let node = fixer.records().next().unwrap().node;
    fixer.dom_mut().remove_node(node);
    fixer.fix(100);
    assert_eq!(fixer.records().count(), 0);
    assert_eq!(fixer.runtime().instance_count(), 0);
}

#[test]
fn page_error_enables_shim_and_schedules_rescan() {
    let dom = HeadlessDom::parse_document(SIZED_CONTAINER);
    let runtime = SimulatedRuntime::preloaded(&[LibraryKind::Echarts]);
    let mut fixer = Fixer::new(dom, runtime, FixerConfig::default());
    // Start from an empty shim set so the error interceptor has something to do.
    fixer.clear_shims();
    fixer.bootstrap(0);

    assert!(fixer.on_page_error("Uncaught ReferenceError: getGradientColor is not defined", 10));
    // Second report of the same symbol is a no-op.
    assert!(!fixer.on_page_error("getGradientColor is not defined", 11));
    // Unknown symbols are ignored.
    assert!(!fixer.on_page_error("someRandomThing is not defined", 12));
    assert!(!fixer.on_page_error("unrelated TypeError: x is null", 13));

    let diag = fixer.diagnostics();
    assert_eq!(diag.shims, vec!["getGradientColor"]);
}

#[test]
fn disabled_config_makes_everything_a_no_op() {
    let mut config = FixerConfig::default();
    config.enabled = false;
    let dom = HeadlessDom::parse_document(SIZED_CONTAINER);
    let runtime = SimulatedRuntime::preloaded(&[LibraryKind::Echarts]);
    let mut fixer = Fixer::new(dom, runtime, config);
    fixer.bootstrap(0);
    fixer.fix(0);
    fixer.tick(60_000);
    assert_eq!(fixer.records().count(), 0);
}

#[test]
fn window_resize_reaches_live_charts() {
    let mut fixer = preloaded_fixer(SIZED_CONTAINER);
    fixer.fix(0);
    let handle = fixer.records().next().unwrap().handle.unwrap();
    fixer.window_resized();
    fixer.window_resized();
    assert_eq!(fixer.runtime().resize_count(handle), 2);
}

#[test]
fn teardown_disposes_instances_and_stops_timers() {
    let mut fixer = preloaded_fixer(SIZED_CONTAINER);
    fixer.fix(0);
    assert_eq!(fixer.runtime().instance_count(), 1);
    fixer.teardown();
    assert_eq!(fixer.runtime().instance_count(), 0);
    assert_eq!(fixer.next_wakeup(), None);
}

#[test]
fn chartjs_reference_targets_chartjs() {
    let html = r#"<html><head>
        <script src="https://cdn.jsdelivr.net/npm/chart.js@4.4.0/dist/chart.umd.js"></script>
    </head><body>
        <div id="stats-chart" style="width:300px;height:300px"></div>
    </body></html>"#;
    let mut fixer = cold_fixer(html);
    fixer.fix(0);
    let pending = fixer.pending_loads();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].0, LibraryKind::Chartjs);
}

#[test]
fn identityless_container_gets_generic_placeholder() {
    let html = r#"<html><body>
        <div class="chart-content" style="width:300px;height:300px"></div>
    </body></html>"#;
    let mut fixer = preloaded_fixer(html);
    fixer.fix(0);
    let record = fixer.records().next().unwrap();
    assert_eq!(record.state, ContainerState::Rendered);
    assert_eq!(record.key, "chart_1");
    let option = fixer.runtime().option_for(record.handle.unwrap()).unwrap();
    assert_eq!(option["series"][0]["name"], "自动生成数据");
}
