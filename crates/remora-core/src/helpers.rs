//! Helper shims for user documents that call small formatting helpers which never made it
//! into the page.
//!
//! The legacy repair layer injected replacement implementations of these helpers into the
//! page and re-ran the chart setup. Here the same knowledge is applied without executing
//! any page code: when a shim is enabled, *calls* to it inside a captured option literal
//! are rewritten to the value the shim would have produced, so the literal still
//! materializes through the restricted json5 path.

use regex::Regex;
use std::collections::BTreeSet;
use std::sync::OnceLock;

/// Helper names the pipeline knows how to stand in for.
pub const KNOWN_SHIMS: &[&str] = &[
    "getColorForCategory",
    "formatNumber",
    "formatPercent",
    "formatCurrency",
    "getGradientColor",
];

const DEFAULT_COLOR: &str = "#1890ff";

const CATEGORY_COLORS: &[(&str, &str)] = &[
    ("上衣", "#1890ff"),
    ("裤装", "#52c41a"),
    ("裙装", "#f5222d"),
    ("外套", "#fa8c16"),
    ("配饰", "#722ed1"),
    ("类别1", "#1890ff"),
    ("类别2", "#52c41a"),
    ("类别3", "#f5222d"),
    ("类别4", "#fa8c16"),
    ("类别5", "#722ed1"),
    ("类别6", "#eb2f96"),
    ("类别7", "#faad14"),
    ("类别8", "#a0d911"),
    ("类别9", "#13c2c2"),
    ("类别10", "#1890ff"),
];

/// The set of currently enabled shims.
///
/// Ordered so diagnostics output is stable.
#[derive(Debug, Clone, Default)]
pub struct ShimSet {
    enabled: BTreeSet<&'static str>,
}

impl ShimSet {
    pub fn empty() -> Self {
        Self::default()
    }

    /// All known shims pre-enabled. The legacy scripts injected the common helpers up
    /// front instead of waiting for the first page error, and that behavior is kept.
    pub fn with_common() -> Self {
        let mut set = Self::default();
        for name in KNOWN_SHIMS {
            set.enabled.insert(name);
        }
        set
    }

    /// Enables a shim; returns `true` when it was not enabled before.
    pub fn enable(&mut self, name: &'static str) -> bool {
        self.enabled.insert(name)
    }

    pub fn is_enabled(&self, name: &str) -> bool {
        self.enabled.contains(name)
    }

    pub fn enabled(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.enabled.iter().copied()
    }
}

/// Resolves a helper name to its canonical static form, if we know it.
pub fn known_shim(name: &str) -> Option<&'static str> {
    KNOWN_SHIMS.iter().copied().find(|&s| s == name)
}

fn not_defined_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\w+) is not defined").expect("valid regex"))
}

/// Extracts the missing symbol from a `"<name> is not defined"` page error message.
pub fn missing_symbol(message: &str) -> Option<&str> {
    not_defined_regex()
        .captures(message)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

pub fn category_color(category: &str) -> &'static str {
    CATEGORY_COLORS
        .iter()
        .find(|(name, _)| *name == category)
        .map(|(_, color)| *color)
        .unwrap_or(DEFAULT_COLOR)
}

/// Rewrites every call to an enabled shim inside `literal` to the shim's deterministic
/// result. Calls whose arguments cannot be resolved statically are left untouched (the
/// extraction rule then falls through like any other unparseable literal).
pub fn rewrite_shim_calls(literal: &str, shims: &ShimSet) -> String {
    let mut out = literal.to_string();
    for name in shims.enabled() {
        out = rewrite_one_shim(&out, name);
    }
    out
}

fn rewrite_one_shim(text: &str, name: &'static str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pos = 0;

    while let Some(rel) = text[pos..].find(name) {
        let start = pos + rel;
        // Reject matches inside a longer identifier.
        let prev_is_word = text[..start]
            .chars()
            .next_back()
            .is_some_and(|c| c.is_alphanumeric() || c == '_' || c == '$');
        let after_name = start + name.len();
        let open = text[after_name..]
            .char_indices()
            .find(|(_, c)| !c.is_whitespace())
            .filter(|(_, c)| *c == '(')
            .map(|(i, _)| after_name + i);

        let (Some(open), false) = (open, prev_is_word) else {
            out.push_str(&text[pos..after_name]);
            pos = after_name;
            continue;
        };

        let Some(close) = matching_paren(text, open) else {
            out.push_str(&text[pos..after_name]);
            pos = after_name;
            continue;
        };

        let args = split_args(&text[open + 1..close]);
        match shim_result(name, &args) {
            Some(replacement) => {
                out.push_str(&text[pos..start]);
                out.push_str(&replacement);
                pos = close + 1;
            }
            None => {
                out.push_str(&text[pos..close + 1]);
                pos = close + 1;
            }
        }
    }

    out.push_str(&text[pos..]);
    out
}

fn shim_result(name: &str, args: &[String]) -> Option<String> {
    match name {
        "getColorForCategory" => {
            let color = match args.first().and_then(|a| string_literal(a)) {
                Some(category) => category_color(&category),
                None => DEFAULT_COLOR,
            };
            Some(format!("\"{color}\""))
        }
        "formatNumber" => {
            let value = number_literal(args.first()?)?;
            Some(format!("\"{}\"", group_thousands(&value)))
        }
        "formatPercent" => {
            let value: f64 = args.first()?.trim().parse().ok()?;
            Some(format!("\"{value:.2}%\""))
        }
        "formatCurrency" => {
            let value = number_literal(args.first()?)?;
            Some(format!("\"¥{}\"", group_thousands(&value)))
        }
        "getGradientColor" => {
            let start = args
                .first()
                .and_then(|a| string_literal(a))
                .unwrap_or_else(|| DEFAULT_COLOR.to_string());
            let end = args
                .get(1)
                .and_then(|a| string_literal(a))
                .unwrap_or_else(|| "#52c41a".to_string());
            Some(format!(
                "{{\"type\":\"linear\",\"x\":0,\"y\":0,\"x2\":0,\"y2\":1,\
                 \"colorStops\":[{{\"offset\":0,\"color\":\"{start}\"}},\
                 {{\"offset\":1,\"color\":\"{end}\"}}]}}"
            ))
        }
        _ => None,
    }
}

fn string_literal(arg: &str) -> Option<String> {
    let arg = arg.trim();
    for quote in ['\'', '"'] {
        if arg.len() >= 2 && arg.starts_with(quote) && arg.ends_with(quote) {
            return Some(arg[1..arg.len() - 1].to_string());
        }
    }
    None
}

fn number_literal(arg: &str) -> Option<String> {
    let arg = arg.trim();
    arg.parse::<f64>().ok()?;
    Some(arg.to_string())
}

/// Groups the integer digits of a decimal number string with commas.
fn group_thousands(number: &str) -> String {
    let (int_part, frac_part) = match number.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (number, None),
    };
    let (sign, digits) = match int_part.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", int_part),
    };

    let mut grouped = String::new();
    for (i, ch) in digits.chars().enumerate() {
        let remaining = digits.len() - i;
        if i > 0 && remaining % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    match frac_part {
        Some(frac) => format!("{sign}{grouped}.{frac}"),
        None => format!("{sign}{grouped}"),
    }
}

fn matching_paren(text: &str, open: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    debug_assert_eq!(bytes[open], b'(');
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
        } else {
            match b {
                b'\'' | b'"' | b'`' => quote = Some(b),
                b'(' => depth += 1,
                b')' => {
                    depth -= 1;
                    if depth == 0 {
                        return Some(i);
                    }
                }
                _ => {}
            }
        }
        i += 1;
    }
    None
}

/// Splits a call argument list at top-level commas.
fn split_args(args: &str) -> Vec<String> {
    let mut out = Vec::new();
    let bytes = args.as_bytes();
    let mut depth = 0usize;
    let mut quote: Option<u8> = None;
    let mut start = 0usize;
    let mut i = 0usize;
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
        } else {
            match b {
                b'\'' | b'"' | b'`' => quote = Some(b),
                b'(' | b'[' | b'{' => depth += 1,
                b')' | b']' | b'}' => depth = depth.saturating_sub(1),
                b',' if depth == 0 => {
                    out.push(args[start..i].trim().to_string());
                    start = i + 1;
                }
                _ => {}
            }
        }
        i += 1;
    }
    let tail = args[start..].trim();
    if !tail.is_empty() || !out.is_empty() {
        out.push(tail.to_string());
    }
    out
}
