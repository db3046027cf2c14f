use crate::document::{Document, NodeId, NodeKind};
use crate::platform::Dom;

pub const MARKER_TAG: &str = "au-m";
pub const TARGET_CLASS: &str = "au";
pub const LOCATION_START: &str = "au-start";
pub const LOCATION_END: &str = "au-end";

/// Comment-anchored insertion point. Views are inserted before `end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderLocation {
    pub start: NodeId,
    pub end: NodeId,
}

impl RenderLocation {
    pub fn parent(&self, doc: &Document) -> Option<NodeId> {
        doc.parent(self.end)
    }

    /// Nodes currently between the two anchors.
    pub fn content(&self, doc: &Document) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut cur = doc.next_sibling(self.start);
        while let Some(node) = cur {
            if node == self.end {
                break;
            }
            out.push(node);
            cur = doc.next_sibling(node);
        }
        out
    }
}

fn is_comment(doc: &Document, node: NodeId, text: &str) -> bool {
    matches!(doc.kind(node), NodeKind::Comment(c) if c == text)
}

/// Turn `node` into a render location.
///
/// An `au-start` comment already followed by `au-end` is reused. Any other
/// node is replaced in its parent by a fresh pair of anchors.
pub fn convert_to_render_location(doc: &mut Document, node: NodeId) -> RenderLocation {
    if is_comment(doc, node, LOCATION_START) {
        if let Some(end) = doc.next_sibling(node).filter(|n| is_comment(doc, *n, LOCATION_END)) {
            return RenderLocation { start: node, end };
        }
    }
    if is_comment(doc, node, LOCATION_END) {
        if let Some(start) = doc.previous_sibling(node).filter(|n| is_comment(doc, *n, LOCATION_START)) {
            return RenderLocation { start, end: node };
        }
    }
    let start = doc.create_comment(LOCATION_START);
    let end = doc.create_comment(LOCATION_END);
    if let Some(parent) = doc.parent(node) {
        doc.insert_before(parent, start, Some(node));
        doc.replace(node, end);
    }
    RenderLocation { start, end }
}

/// A cloned template instance: its top-level node range plus the binding
/// targets found inside it.
///
/// While unmounted the nodes live in a private fragment; mounting moves them
/// out and [`NodeSequence::remove`] moves them back.
#[derive(Debug, Clone)]
pub struct NodeSequence {
    fragment: NodeId,
    first: Option<NodeId>,
    last: Option<NodeId>,
    targets: Vec<NodeId>,
    mounted: bool,
}

impl NodeSequence {
    /// Clone the children of `template` (a fragment or `<template>` element)
    /// and locate the targets: every element carrying the `au` class, in
    /// document order, without descending into nested `<template>`s. An
    /// `au-m` marker is dropped and its next sibling becomes the target.
    pub fn from_template(dom: &Dom, template: NodeId) -> Self {
        let mut doc = dom.doc_mut();
        let fragment = doc.create_fragment();
        let kids = doc.children(template).to_vec();
        for kid in kids {
            let copy = doc.clone_node(kid, true);
            doc.append_child(fragment, copy);
        }

        let marked: Vec<NodeId> = doc
            .descendants_where(fragment, |d, n| d.tag(n) == Some("template"))
            .into_iter()
            .filter(|n| doc.is_element(*n) && doc.has_class(*n, TARGET_CLASS))
            .collect();

        let mut targets = Vec::with_capacity(marked.len());
        for node in marked {
            if doc.tag(node) == Some(MARKER_TAG) {
                let next = doc.next_sibling(node);
                doc.remove(node);
                if let Some(next) = next {
                    targets.push(next);
                }
            } else {
                targets.push(node);
            }
        }

        let first = doc.first_child(fragment);
        let last = doc.last_child(fragment);
        Self {
            fragment,
            first,
            last,
            targets,
            mounted: false,
        }
    }

    /// Sequence adopting already-mounted nodes (no cloning, no targets).
    pub fn empty(dom: &Dom) -> Self {
        let fragment = dom.doc_mut().create_fragment();
        Self {
            fragment,
            first: None,
            last: None,
            targets: Vec::new(),
            mounted: false,
        }
    }

    pub fn targets(&self) -> &[NodeId] {
        &self.targets
    }

    pub fn first_child(&self) -> Option<NodeId> {
        self.first
    }

    pub fn last_child(&self) -> Option<NodeId> {
        self.last
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    pub fn child_nodes(&self, doc: &Document) -> Vec<NodeId> {
        if !self.mounted {
            return doc.children(self.fragment).to_vec();
        }
        let (Some(first), Some(last)) = (self.first, self.last) else {
            return Vec::new();
        };
        let mut out = vec![first];
        let mut cur = first;
        while cur != last {
            match doc.next_sibling(cur) {
                Some(next) => {
                    out.push(next);
                    cur = next;
                }
                None => break,
            }
        }
        out
    }

    pub fn insert_before(&mut self, dom: &Dom, reference: NodeId) {
        if self.mounted {
            return;
        }
        let mut doc = dom.doc_mut();
        let Some(parent) = doc.parent(reference) else { return };
        for node in doc.children(self.fragment).to_vec() {
            doc.insert_before(parent, node, Some(reference));
        }
        self.mounted = self.first.is_some();
    }

    pub fn append_to(&mut self, dom: &Dom, parent: NodeId) {
        if self.mounted {
            return;
        }
        let mut doc = dom.doc_mut();
        doc.move_children(self.fragment, parent);
        self.mounted = self.first.is_some();
    }

    /// Move the mounted node range back into the private fragment.
    pub fn remove(&mut self, dom: &Dom) {
        if !self.mounted {
            return;
        }
        let mut doc = dom.doc_mut();
        let nodes = self.child_nodes(&doc);
        for node in nodes {
            doc.append_child(self.fragment, node);
        }
        self.mounted = false;
    }
}
