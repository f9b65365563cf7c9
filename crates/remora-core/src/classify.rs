//! Container classification: which elements of a document plausibly host a chart.
//!
//! Selection is by name: an `id` or `class` containing a chart-ish substring. Exclusion
//! rules then run in a fixed order and the first rule that fires wins; the rule id ends up
//! in diagnostics so a host can see *why* an element was skipped.

use crate::FixerConfig;
use crate::dom::{BoxSize, DocumentDom, NodeId};
use serde::Serialize;

/// Substrings (checked case-sensitively) that make an element a chart candidate.
pub const NAME_MARKERS: &[&str] = &["chart", "Chart", "echarts", "highchart"];

/// A candidate that survived every exclusion rule.
#[derive(Debug, Clone, Serialize)]
pub struct Candidate {
    pub node: NodeId,
    /// The element's own id, when it has one.
    pub element_id: Option<String>,
}

/// An element that matched by name but was rejected.
#[derive(Debug, Clone, Serialize)]
pub struct Exclusion {
    pub node: NodeId,
    pub element_id: Option<String>,
    /// Id of the exclusion rule that fired.
    pub rule: &'static str,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Classification {
    pub accepted: Vec<Candidate>,
    pub excluded: Vec<Exclusion>,
}

/// Everything an exclusion rule may look at, extracted once per element.
#[derive(Debug, Clone)]
pub struct ElementView<'a> {
    pub tag: &'a str,
    pub element_id: Option<&'a str>,
    pub class: Option<&'a str>,
    pub size: Option<BoxSize>,
    pub child_count: usize,
    pub inside_button: bool,
}

pub struct ExclusionRule {
    pub id: &'static str,
    pub check: fn(&ElementView<'_>, &FixerConfig) -> bool,
}

/// The exclusion rules, in evaluation order. First match excludes.
pub const EXCLUSION_RULES: &[ExclusionRule] = &[
    ExclusionRule {
        id: "min-size",
        check: rule_min_size,
    },
    ExclusionRule {
        id: "primitive-tag",
        check: rule_primitive_tag,
    },
    ExclusionRule {
        id: "class-denylist",
        check: rule_class_denylist,
    },
    ExclusionRule {
        id: "button-ancestor",
        check: rule_button_ancestor,
    },
];

fn rule_min_size(view: &ElementView<'_>, config: &FixerConfig) -> bool {
    // Unknown size is not grounds for exclusion; only a known sub-threshold box is.
    match view.size {
        Some(size) => size.width < config.min_width || size.height < config.min_height,
        None => false,
    }
}

fn rule_primitive_tag(view: &ElementView<'_>, _config: &FixerConfig) -> bool {
    match view.tag {
        "i" | "button" | "input" | "select" | "a" => true,
        "span" => view.child_count == 0,
        _ => false,
    }
}

fn rule_class_denylist(view: &ElementView<'_>, config: &FixerConfig) -> bool {
    let Some(class) = view.class else {
        return false;
    };
    let class = class.to_ascii_lowercase();
    config
        .class_denylist
        .iter()
        .any(|token| class.contains(&token.to_ascii_lowercase()))
}

fn rule_button_ancestor(view: &ElementView<'_>, _config: &FixerConfig) -> bool {
    view.inside_button
}

pub fn name_matches(element_id: Option<&str>, class: Option<&str>) -> bool {
    let matches = |s: &str| NAME_MARKERS.iter().any(|m| s.contains(m));
    element_id.is_some_and(matches) || class.is_some_and(matches)
}

fn class_is_buttonish(class: &str) -> bool {
    let class = class.to_ascii_lowercase();
    class.contains("btn") || class.contains("button")
}

fn inside_button<D: DocumentDom>(dom: &D, node: NodeId) -> bool {
    let mut cursor = dom.parent(node);
    while let Some(ancestor) = cursor {
        if dom.tag(ancestor) == "button" {
            return true;
        }
        if dom.class_attr(ancestor).is_some_and(class_is_buttonish) {
            return true;
        }
        cursor = dom.parent(ancestor);
    }
    false
}

/// Scans `root`'s subtree (including `root` itself) for chart candidates.
///
/// `skip` lets the caller exclude nodes it already tracks in a settled state; running the
/// classifier twice over the same subtree must not re-emit those.
pub fn classify<D: DocumentDom>(
    dom: &D,
    root: NodeId,
    config: &FixerConfig,
    skip: &dyn Fn(NodeId) -> bool,
) -> Classification {
    let mut result = Classification::default();
    let mut nodes = vec![root];
    nodes.extend(dom.descendants(root));

    for node in nodes {
        let element_id = dom.element_id(node);
        let class = dom.class_attr(node);
        if !name_matches(element_id, class) {
            continue;
        }
        if skip(node) {
            continue;
        }

        let view = ElementView {
            tag: dom.tag(node),
            element_id,
            class,
            size: dom.bounding_box(node),
            child_count: dom.children(node).len(),
            inside_button: inside_button(dom, node),
        };

        match EXCLUSION_RULES.iter().find(|rule| (rule.check)(&view, config)) {
            Some(rule) => result.excluded.push(Exclusion {
                node,
                element_id: element_id.map(str::to_string),
                rule: rule.id,
            }),
            None => result.accepted.push(Candidate {
                node,
                element_id: element_id.map(str::to_string),
            }),
        }
    }

    result
}
