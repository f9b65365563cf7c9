//! Preview-document instrumentation.
//!
//! The editor host injects the repair layer's configuration into every preview document it
//! builds, so the in-page bootstrap picks up the same knobs this crate runs with. The
//! rewrite is streaming (`lol_html`) and leaves the rest of the markup byte-identical.

use crate::config::FixerConfig;
use crate::{Error, Result};
use lol_html::html_content::ContentType;
use lol_html::{RewriteStrSettings, element, rewrite_str};
use std::cell::RefCell;
use std::rc::Rc;

pub const BOOTSTRAP_SCRIPT_ID: &str = "chart-fixer-bootstrap";

/// The `<script>` element carrying the serialized configuration.
pub fn bootstrap_markup(config: &FixerConfig) -> Result<String> {
    let json = serde_json::to_string(config)?;
    Ok(format!(
        "<script id=\"{BOOTSTRAP_SCRIPT_ID}\">window.__CHART_FIXER_CONFIG__ = {json};</script>"
    ))
}

/// Injects the bootstrap script at the end of `<head>`, or prepends it when the document
/// has no head at all. A document that already carries a bootstrap is returned unchanged.
pub fn instrument_document(html: &str, config: &FixerConfig) -> Result<String> {
    if html.contains(BOOTSTRAP_SCRIPT_ID) {
        return Ok(html.to_string());
    }

    let markup = bootstrap_markup(config)?;
    let injected = Rc::new(RefCell::new(false));

    let handler_markup = markup.clone();
    let handler_flag = Rc::clone(&injected);
    let rewritten = rewrite_str(
        html,
        RewriteStrSettings {
            element_content_handlers: vec![element!("head", move |el| {
                el.append(&handler_markup, ContentType::Html);
                *handler_flag.borrow_mut() = true;
                Ok(())
            })],
            ..RewriteStrSettings::new()
        },
    )
    .map_err(|e| Error::Rewrite {
        message: e.to_string(),
    })?;

    if *injected.borrow() {
        Ok(rewritten)
    } else {
        Ok(format!("{markup}{html}"))
    }
}
