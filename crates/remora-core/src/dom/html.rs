use super::{DocumentDom, HeadlessDom, NodeId};
use scraper::{ElementRef, Html};

impl HeadlessDom {
    /// Parses an HTML document into a headless tree.
    ///
    /// Parsing itself never fails; malformed markup is repaired the way browsers repair it
    /// (html5ever error recovery), which is exactly the document shape the live pipeline
    /// would have seen.
    pub fn parse_document(html: &str) -> Self {
        let parsed = Html::parse_document(html);
        let root = parsed.root_element();

        let mut dom = HeadlessDom::from_root(root.value().name());
        let root_id = dom.root();
        for (name, value) in root.value().attrs() {
            dom.set_attr(root_id, name, value);
        }
        copy_children(&mut dom, root_id, root);
        dom
    }
}

fn copy_children(dom: &mut HeadlessDom, parent: NodeId, el: ElementRef) {
    for child in el.children() {
        if let Some(text) = child.value().as_text() {
            dom.append_text(parent, text);
            continue;
        }
        let Some(child_el) = ElementRef::wrap(child) else {
            continue;
        };
        let id = dom.create_element(child_el.value().name());
        for (name, value) in child_el.value().attrs() {
            dom.set_attr(id, name, value);
        }
        dom.append_child(parent, id);
        copy_children(dom, id, child_el);
    }
}
