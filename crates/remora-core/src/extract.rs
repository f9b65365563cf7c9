//! Recovers chart option objects from inline script text.
//!
//! Four rules run in priority order; the first one that both *matches* and *materializes*
//! wins. Materialization goes through a json5 parse of the captured literal, never through
//! evaluation of page code, so a literal that leans on runtime values simply fails its
//! rule and the pipeline falls through to the synthesized fallback.

use crate::dom::ScriptBlock;
use crate::helpers::{self, ShimSet};
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use std::sync::OnceLock;

/// Which extraction rule produced the configuration (diagnostics only).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceConfidence {
    /// Rule 1: `option = {…}` next to the container id, later applied via `.setOption`.
    DirectMatch,
    /// Rule 2: an object literal with `tooltip` and `series` keys right before `.setOption`.
    StructuralMatch,
    /// Rule 3: resolved through the chart instance variable's `.setOption(<var>)` call.
    IndirectionMatch,
    /// Rule 4: a page-global `option` assignment.
    GlobalFallback,
    /// Nothing recovered; the caller must synthesize a fallback.
    None,
}

#[derive(Debug, Clone)]
pub struct ExtractedConfig {
    pub value: Option<Value>,
    pub confidence: SourceConfidence,
}

impl ExtractedConfig {
    fn none() -> Self {
        Self {
            value: None,
            confidence: SourceConfidence::None,
        }
    }
}

fn option_assign_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?:\b(?:const|let|var)\s+)?\boption\s*=\s*\{").expect("valid regex")
    })
}

fn init_var_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?:const|let|var)\s+(\w+)\s*=\s*echarts\s*\.\s*init\s*\(")
            .expect("valid regex")
    })
}

fn window_option_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"window\s*\.\s*option\s*=\s*\{").expect("valid regex"))
}

/// Runs the extraction rules for one container against the document's inline scripts.
pub fn extract_config(
    container_id: Option<&str>,
    scripts: &[ScriptBlock],
    shims: &ShimSet,
) -> ExtractedConfig {
    // Rule 1: direct literal match in a script that mentions the container.
    if let Some(id) = container_id {
        for script in scripts {
            if !script.text.contains(id) {
                continue;
            }
            if let Some(value) = direct_option_match(&script.text, shims) {
                tracing::debug!(container = id, "recovered option via direct literal match");
                return ExtractedConfig {
                    value: Some(value),
                    confidence: SourceConfidence::DirectMatch,
                };
            }
        }
    }

    // Rule 2: structural match, any tooltip+series literal feeding a `.setOption`.
    for script in scripts {
        if container_id.is_some_and(|id| !script.text.contains(id)) {
            continue;
        }
        if let Some(value) = structural_match(&script.text, shims) {
            tracing::debug!(container = ?container_id, "recovered option via structural match");
            return ExtractedConfig {
                value: Some(value),
                confidence: SourceConfidence::StructuralMatch,
            };
        }
    }

    // Rule 3: follow the chart instance variable through `.setOption(<identifier>)`.
    for script in scripts {
        if container_id.is_some_and(|id| !script.text.contains(id)) {
            continue;
        }
        if let Some(value) = indirection_match(&script.text, shims) {
            tracing::debug!(container = ?container_id, "recovered option via indirection");
            return ExtractedConfig {
                value: Some(value),
                confidence: SourceConfidence::IndirectionMatch,
            };
        }
    }

    // Rule 4: a page-global `window.option = {…}` anywhere in the document.
    for script in scripts {
        if let Some(caps) = window_option_regex().find(&script.text) {
            let open = caps.end() - 1;
            if let Some(literal) = capture_object(&script.text, open) {
                if let Some(value) = materialize(literal, shims) {
                    tracing::debug!("recovered option via page-global fallback");
                    return ExtractedConfig {
                        value: Some(value),
                        confidence: SourceConfidence::GlobalFallback,
                    };
                }
            }
        }
    }

    ExtractedConfig::none()
}

fn direct_option_match(text: &str, shims: &ShimSet) -> Option<Value> {
    for m in option_assign_regex().find_iter(text) {
        let open = m.end() - 1;
        let Some(literal) = capture_object(text, open) else {
            continue;
        };
        let tail = &text[open + literal.len()..];
        if !set_option_references(tail, "option") {
            continue;
        }
        if let Some(value) = materialize(literal, shims) {
            return Some(value);
        }
    }
    None
}

fn structural_match(text: &str, shims: &ShimSet) -> Option<Value> {
    let mut pos = 0usize;
    while let Some(rel) = text[pos..].find('{') {
        let open = pos + rel;
        let Some(literal) = capture_object(text, open) else {
            pos = open + 1;
            continue;
        };
        let has_keys = contains_key(literal, "tooltip") && contains_key(literal, "series");
        let followed_by_set_option = text[open + literal.len()..].contains(".setOption");
        if has_keys && followed_by_set_option {
            if let Some(value) = materialize(literal, shims) {
                return Some(value);
            }
        }
        // A parsed-but-rejected block can still contain the real literal, so only skip
        // the opening brace, not the whole block.
        pos = open + 1;
    }
    None
}

fn indirection_match(text: &str, shims: &ShimSet) -> Option<Value> {
    for caps in init_var_regex().captures_iter(text) {
        let instance_var = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
        if instance_var.is_empty() {
            continue;
        }

        let set_option_re =
            Regex::new(&format!(r"{}\s*\.\s*setOption\s*\(\s*(\w+)\s*[),]", regex::escape(instance_var)))
                .expect("valid regex");
        let Some(set_caps) = set_option_re.captures(text) else {
            continue;
        };
        let config_var = set_caps.get(1).map(|m| m.as_str()).unwrap_or_default();
        if config_var.is_empty() {
            continue;
        }
        let call_start = set_caps.get(0).map(|m| m.start()).unwrap_or(0);

        // Resolve the config variable's own literal assignment earlier in the script.
        let assign_re = Regex::new(&format!(
            r"(?:\b(?:const|let|var)\s+)?\b{}\s*=\s*\{{",
            regex::escape(config_var)
        ))
        .expect("valid regex");
        for m in assign_re.find_iter(&text[..call_start]) {
            let open = m.end() - 1;
            let Some(literal) = capture_object(text, open) else {
                continue;
            };
            if let Some(value) = materialize(literal, shims) {
                return Some(value);
            }
        }
    }
    None
}

/// `true` when a later `.setOption(…)` call references `var_name`.
fn set_option_references(tail: &str, var_name: &str) -> bool {
    let re = Regex::new(&format!(
        r"\.\s*setOption\s*\(\s*{}\s*[),]",
        regex::escape(var_name)
    ))
    .expect("valid regex");
    re.is_match(tail)
}

/// Cheap check that an object literal has a given top-ish-level key. A substring probe is
/// enough here: false positives only cost one extra materialization attempt.
fn contains_key(literal: &str, key: &str) -> bool {
    literal.contains(key)
}

/// Captures a balanced `{…}` block starting at byte offset `open` (which must be `{`).
/// String literals (with escapes) and `//`/`/*` comments are skipped, so braces inside
/// them never unbalance the scan.
pub fn capture_object(text: &str, open: usize) -> Option<&str> {
    let bytes = text.as_bytes();
    if bytes.get(open) != Some(&b'{') {
        return None;
    }

    let mut depth = 0usize;
    let mut quote: Option<u8> = None;
    let mut i = open;
    while i < bytes.len() {
        let b = bytes[i];
        if let Some(q) = quote {
            if b == b'\\' {
                i += 2;
                continue;
            }
            if b == q {
                quote = None;
            }
            i += 1;
            continue;
        }
        match b {
            b'\'' | b'"' | b'`' => quote = Some(b),
            b'/' if bytes.get(i + 1) == Some(&b'/') => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
                continue;
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i += 2;
                while i + 1 < bytes.len() && !(bytes[i] == b'*' && bytes[i + 1] == b'/') {
                    i += 1;
                }
                i += 2;
                continue;
            }
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[open..=i]);
                }
            }
            _ => {}
        }
        i += 1;
    }
    None
}

/// Turns a captured literal into a JSON value through the restricted json5 path.
///
/// Two repair passes run first: enabled helper-shim calls are replaced by their results,
/// and function-valued properties (formatters and the like) are nulled out so the rest of
/// the object still parses.
pub fn materialize(literal: &str, shims: &ShimSet) -> Option<Value> {
    let rewritten = helpers::rewrite_shim_calls(literal, shims);
    let defunctioned = null_function_properties(&rewritten);
    match json5::from_str::<Value>(&defunctioned) {
        Ok(value @ Value::Object(_)) => Some(value),
        Ok(_) => None,
        Err(err) => {
            tracing::debug!(error = %err, "captured literal did not materialize");
            None
        }
    }
}

fn function_prop_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // `key: function (…) {` and `key: (…) => {`
    RE.get_or_init(|| {
        Regex::new(r"(?s)\b(function)\s*\w*\s*\([^)]*\)\s*\{|(\([^)]*\)|\w+)\s*=>\s*\{")
            .expect("valid regex")
    })
}

/// Replaces every function-valued expression with `null`, keeping the surrounding object
/// parseable. Charting libraries treat a `null` formatter the same as an absent one.
fn null_function_properties(literal: &str) -> String {
    let mut out = String::with_capacity(literal.len());
    let mut pos = 0usize;

    while let Some(m) = function_prop_regex().find(&literal[pos..]) {
        let start = pos + m.start();
        // The regex match ends at the function body's opening brace.
        let body_open = pos + m.end() - 1;
        let Some(body) = capture_object(literal, body_open) else {
            break;
        };
        out.push_str(&literal[pos..start]);
        out.push_str("null");
        pos = body_open + body.len();
    }

    out.push_str(&literal[pos..]);
    out
}
