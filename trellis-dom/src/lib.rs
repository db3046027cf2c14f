//! Minimal DOM for templates and hydrated views.
//! Arena document, markup serialization, render locations, listeners and a write queue.

pub mod document;
pub mod events;
pub mod html;
pub mod location;
pub mod platform;
pub mod queue;
pub mod style;

pub use document::{Attr, Document, NodeId, NodeKind, VOID_ELEMENTS};
pub use events::{Event, EventHandler, EventRegistry, ListenerId};
pub use location::{
    LOCATION_END, LOCATION_START, MARKER_TAG, NodeSequence, RenderLocation, TARGET_CLASS,
    convert_to_render_location,
};
pub use platform::Dom;
pub use queue::WriteQueue;

/// Build `<tag attr=value ...>` with the given children appended.
pub fn element(doc: &mut Document, tag: &str, attrs: &[(&str, &str)], children: &[NodeId]) -> NodeId {
    let el = doc.create_element(tag);
    for (k, v) in attrs {
        doc.set_attribute(el, k, *v);
    }
    for c in children {
        doc.append_child(el, *c);
    }
    el
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_tree() {
        let mut doc = Document::new();
        let hello = doc.create_text("hello");
        let world = doc.create_text("world");
        let span = element(&mut doc, "span", &[], &[world]);
        let div = element(&mut doc, "div", &[("class", "app")], &[hello, span]);

        assert_eq!(doc.tag(div), Some("div"));
        assert_eq!(doc.get_attribute(div, "class"), Some("app"));
        assert_eq!(doc.children(div).len(), 2);
        assert_eq!(doc.text_content(div), "helloworld");
    }
}
