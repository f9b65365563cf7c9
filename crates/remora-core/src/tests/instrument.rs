use crate::instrument::{BOOTSTRAP_SCRIPT_ID, instrument_document};
use crate::FixerConfig;

#[test]
fn injects_bootstrap_before_head_close() {
    let html = "<html><head><title>t</title></head><body></body></html>";
    let out = instrument_document(html, &FixerConfig::default()).unwrap();

    let script_at = out.find(BOOTSTRAP_SCRIPT_ID).unwrap();
    let head_close_at = out.find("</head>").unwrap();
    assert!(script_at < head_close_at);
    assert!(out.contains("window.__CHART_FIXER_CONFIG__"));
    // Everything else is untouched.
    assert!(out.contains("<title>t</title>"));
}

#[test]
fn config_json_round_trips_through_the_bootstrap() {
    let mut config = FixerConfig::default();
    config.min_width = 120.0;
    let out = instrument_document("<html><head></head><body></body></html>", &config).unwrap();

    let start = out.find("= {").unwrap() + 2;
    let end = out[start..].find(";</script>").unwrap() + start;
    let parsed: FixerConfig = serde_json::from_str(&out[start..end]).unwrap();
    assert_eq!(parsed.min_width, 120.0);
    assert_eq!(parsed.delays.debounce_ms, 300);
}

#[test]
fn document_without_head_gets_prepended_bootstrap() {
    let html = "<div id=\"chart\"></div>";
    let out = instrument_document(html, &FixerConfig::default()).unwrap();
    assert!(out.starts_with("<script id=\"chart-fixer-bootstrap\">"));
    assert!(out.ends_with(html));
}

#[test]
fn already_instrumented_document_is_unchanged() {
    let html = "<html><head></head><body></body></html>";
    let once = instrument_document(html, &FixerConfig::default()).unwrap();
    let twice = instrument_document(&once, &FixerConfig::default()).unwrap();
    assert_eq!(once, twice);
    assert_eq!(once.matches(BOOTSTRAP_SCRIPT_ID).count(), 1);
}
