use crate::helpers::{
    ShimSet, category_color, known_shim, missing_symbol, rewrite_shim_calls,
};

#[test]
fn missing_symbol_parses_reference_errors() {
    assert_eq!(
        missing_symbol("Uncaught ReferenceError: formatNumber is not defined"),
        Some("formatNumber")
    );
    assert_eq!(missing_symbol("getColorForCategory is not defined"), Some("getColorForCategory"));
    assert_eq!(missing_symbol("TypeError: x.foo is not a function"), None);
}

#[test]
fn only_known_helpers_resolve() {
    assert_eq!(known_shim("formatPercent"), Some("formatPercent"));
    assert_eq!(known_shim("stealCookies"), None);
}

#[test]
fn category_colors_cover_generic_slots() {
    assert_eq!(category_color("上衣"), "#1890ff");
    assert_eq!(category_color("类别3"), "#f5222d");
    assert_eq!(category_color("无名类别"), "#1890ff");
}

#[test]
fn rewrites_color_lookup_calls() {
    let shims = ShimSet::with_common();
    let out = rewrite_shim_calls("{color: getColorForCategory('裤装')}", &shims);
    assert_eq!(out, "{color: \"#52c41a\"}");
}

#[test]
fn rewrites_number_formatting_with_grouping() {
    let shims = ShimSet::with_common();
    assert_eq!(
        rewrite_shim_calls("{label: formatNumber(1234567)}", &shims),
        "{label: \"1,234,567\"}"
    );
    assert_eq!(
        rewrite_shim_calls("{label: formatNumber(987)}", &shims),
        "{label: \"987\"}"
    );
    assert_eq!(
        rewrite_shim_calls("{p: formatPercent(12.5)}", &shims),
        "{p: \"12.50%\"}"
    );
    assert_eq!(
        rewrite_shim_calls("{c: formatCurrency(9999)}", &shims),
        "{c: \"¥9,999\"}"
    );
}

#[test]
fn gradient_call_becomes_object_literal() {
    let shims = ShimSet::with_common();
    let out = rewrite_shim_calls("{color: getGradientColor('#111', '#222', 0.5)}", &shims);
    assert!(out.contains("\"colorStops\""));
    assert!(out.contains("\"#111\""));
    assert!(out.contains("\"#222\""));
    // The result must itself be a valid json5 fragment.
    let value: serde_json::Value = json5::from_str(&out).unwrap();
    assert_eq!(value["color"]["colorStops"][1]["color"], "#222");
}

#[test]
fn unresolvable_arguments_are_left_alone() {
    let shims = ShimSet::with_common();
    let input = "{label: formatNumber(total)}";
    assert_eq!(rewrite_shim_calls(input, &shims), input);
}

#[test]
fn disabled_shims_do_not_rewrite() {
    let shims = ShimSet::empty();
    let input = "{color: getColorForCategory('上衣')}";
    assert_eq!(rewrite_shim_calls(input, &shims), input);
}

#[test]
fn longer_identifiers_are_not_mangled() {
    let shims = ShimSet::with_common();
    let input = "{f: myformatNumberImpl(1), g: xformatNumber(2)}";
    assert_eq!(rewrite_shim_calls(input, &shims), input);
}

#[test]
fn enable_reports_newness_once() {
    let mut shims = ShimSet::empty();
    assert!(shims.enable("formatNumber"));
    assert!(!shims.enable("formatNumber"));
    assert!(shims.is_enabled("formatNumber"));
    assert!(!shims.is_enabled("getGradientColor"));
}
