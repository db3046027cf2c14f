use std::fmt;

/// Index of a node inside a [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Attr {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Element {
        tag: String,
        attrs: Vec<Attr>,
        shadow_root: Option<NodeId>,
    },
    Text(String),
    Comment(String),
    Fragment,
}

#[derive(Debug, Clone)]
struct NodeData {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// Arena of DOM nodes. Nodes are never freed; detached nodes simply have no parent.
#[derive(Debug, Default, Clone)]
pub struct Document {
    nodes: Vec<NodeData>,
}

pub const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source",
    "track", "wbr",
];

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(NodeData {
            kind,
            parent: None,
            children: Vec::new(),
        });
        id
    }

    pub fn create_element(&mut self, tag: impl Into<String>) -> NodeId {
        self.push(NodeKind::Element {
            tag: tag.into(),
            attrs: Vec::new(),
            shadow_root: None,
        })
    }

    pub fn create_text(&mut self, text: impl Into<String>) -> NodeId {
        self.push(NodeKind::Text(text.into()))
    }

    pub fn create_comment(&mut self, text: impl Into<String>) -> NodeId {
        self.push(NodeKind::Comment(text.into()))
    }

    pub fn create_fragment(&mut self) -> NodeId {
        self.push(NodeKind::Fragment)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.nodes[id.index()].kind
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        matches!(self.kind(id), NodeKind::Element { .. })
    }

    pub fn tag(&self, id: NodeId) -> Option<&str> {
        match self.kind(id) {
            NodeKind::Element { tag, .. } => Some(tag),
            _ => None,
        }
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.index()].parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.index()].children
    }

    pub fn first_child(&self, id: NodeId) -> Option<NodeId> {
        self.children(id).first().copied()
    }

    pub fn last_child(&self, id: NodeId) -> Option<NodeId> {
        self.children(id).last().copied()
    }

    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent(id)?;
        let siblings = self.children(parent);
        let pos = siblings.iter().position(|c| *c == id)?;
        siblings.get(pos + 1).copied()
    }

    pub fn previous_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent(id)?;
        let siblings = self.children(parent);
        let pos = siblings.iter().position(|c| *c == id)?;
        pos.checked_sub(1).map(|p| siblings[p])
    }

    /// Detach `id` from its parent (no-op when already detached).
    pub fn remove(&mut self, id: NodeId) {
        if let Some(parent) = self.nodes[id.index()].parent.take() {
            self.nodes[parent.index()].children.retain(|c| *c != id);
        }
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.remove(child);
        self.nodes[child.index()].parent = Some(parent);
        self.nodes[parent.index()].children.push(child);
    }

    /// Insert `child` into `parent` before `reference`, or at the end when
    /// `reference` is `None` or not a child of `parent`.
    pub fn insert_before(&mut self, parent: NodeId, child: NodeId, reference: Option<NodeId>) {
        self.remove(child);
        let children = &mut self.nodes[parent.index()].children;
        let pos = reference
            .and_then(|r| children.iter().position(|c| *c == r))
            .unwrap_or(children.len());
        children.insert(pos, child);
        self.nodes[child.index()].parent = Some(parent);
    }

    /// Put `replacement` where `old` is and detach `old`.
    pub fn replace(&mut self, old: NodeId, replacement: NodeId) {
        if let Some(parent) = self.parent(old) {
            self.insert_before(parent, replacement, Some(old));
            self.remove(old);
        }
    }

    /// Move all children of `from` to the end of `to`.
    pub fn move_children(&mut self, from: NodeId, to: NodeId) {
        let kids = self.children(from).to_vec();
        for kid in kids {
            self.append_child(to, kid);
        }
    }

    pub fn attributes(&self, id: NodeId) -> &[Attr] {
        match self.kind(id) {
            NodeKind::Element { attrs, .. } => attrs,
            _ => &[],
        }
    }

    pub fn get_attribute(&self, id: NodeId, name: &str) -> Option<&str> {
        self.attributes(id)
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.value.as_str())
    }

    pub fn has_attribute(&self, id: NodeId, name: &str) -> bool {
        self.get_attribute(id, name).is_some()
    }

    pub fn set_attribute(&mut self, id: NodeId, name: &str, value: impl Into<String>) {
        let value = value.into();
        if let NodeKind::Element { attrs, .. } = &mut self.nodes[id.index()].kind {
            match attrs.iter_mut().find(|a| a.name == name) {
                Some(existing) => existing.value = value,
                None => attrs.push(Attr {
                    name: name.to_string(),
                    value,
                }),
            }
        }
    }

    pub fn remove_attribute(&mut self, id: NodeId, name: &str) {
        if let NodeKind::Element { attrs, .. } = &mut self.nodes[id.index()].kind {
            attrs.retain(|a| a.name != name);
        }
    }

    pub fn clear_attributes(&mut self, id: NodeId) {
        if let NodeKind::Element { attrs, .. } = &mut self.nodes[id.index()].kind {
            attrs.clear();
        }
    }

    pub fn has_class(&self, id: NodeId, class: &str) -> bool {
        self.get_attribute(id, "class")
            .is_some_and(|c| c.split_whitespace().any(|x| x == class))
    }

    pub fn add_class(&mut self, id: NodeId, class: &str) {
        if self.has_class(id, class) {
            return;
        }
        let next = match self.get_attribute(id, "class") {
            Some(existing) if !existing.trim().is_empty() => format!("{} {class}", existing.trim()),
            _ => class.to_string(),
        };
        self.set_attribute(id, "class", next);
    }

    pub fn remove_class(&mut self, id: NodeId, class: &str) {
        let Some(existing) = self.get_attribute(id, "class") else {
            return;
        };
        let next: Vec<&str> = existing.split_whitespace().filter(|c| *c != class).collect();
        let next = next.join(" ");
        self.set_attribute(id, "class", next);
    }

    /// Data of a text or comment node.
    pub fn text(&self, id: NodeId) -> Option<&str> {
        match self.kind(id) {
            NodeKind::Text(t) | NodeKind::Comment(t) => Some(t),
            _ => None,
        }
    }

    pub fn set_text(&mut self, id: NodeId, text: impl Into<String>) {
        match &mut self.nodes[id.index()].kind {
            NodeKind::Text(t) | NodeKind::Comment(t) => *t = text.into(),
            NodeKind::Element { .. } | NodeKind::Fragment => {
                let kids = self.children(id).to_vec();
                for kid in kids {
                    self.remove(kid);
                }
                let t = self.create_text(text);
                self.append_child(id, t);
            }
        }
    }

    /// Concatenated text of all descendant text nodes.
    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(id, &mut out);
        out
    }

    fn collect_text(&self, id: NodeId, out: &mut String) {
        match self.kind(id) {
            NodeKind::Text(t) => out.push_str(t),
            NodeKind::Comment(_) => {}
            NodeKind::Element { .. } | NodeKind::Fragment => {
                for c in self.children(id) {
                    self.collect_text(*c, out);
                }
            }
        }
    }

    pub fn shadow_root(&self, id: NodeId) -> Option<NodeId> {
        match self.kind(id) {
            NodeKind::Element { shadow_root, .. } => *shadow_root,
            _ => None,
        }
    }

    /// Attach (or return the existing) shadow root fragment of `host`.
    pub fn attach_shadow(&mut self, host: NodeId) -> NodeId {
        if let Some(existing) = self.shadow_root(host) {
            return existing;
        }
        let root = self.create_fragment();
        if let NodeKind::Element { shadow_root, .. } = &mut self.nodes[host.index()].kind {
            *shadow_root = Some(root);
        }
        root
    }

    /// Copy `id` (and its subtree when `deep`) into new detached nodes.
    pub fn clone_node(&mut self, id: NodeId, deep: bool) -> NodeId {
        let kind = match self.kind(id) {
            NodeKind::Element { tag, attrs, .. } => NodeKind::Element {
                tag: tag.clone(),
                attrs: attrs.clone(),
                shadow_root: None,
            },
            other => other.clone(),
        };
        let copy = self.push(kind);
        if deep {
            let kids = self.children(id).to_vec();
            for kid in kids {
                let c = self.clone_node(kid, true);
                self.append_child(copy, c);
            }
        }
        copy
    }

    /// Pre-order descendants of `root` (excluding `root`), not descending into
    /// nodes for which `skip` returns true.
    pub fn descendants_where(&self, root: NodeId, skip: impl Fn(&Document, NodeId) -> bool) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(root).iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            out.push(id);
            if skip(self, id) {
                continue;
            }
            stack.extend(self.children(id).iter().rev().copied());
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_tree() {
        let mut doc = Document::new();
        let div = doc.create_element("div");
        doc.set_attribute(div, "class", "app");
        let hello = doc.create_text("hello");
        let span = doc.create_element("span");
        let world = doc.create_text("world");
        doc.append_child(div, hello);
        doc.append_child(div, span);
        doc.append_child(span, world);

        assert_eq!(doc.tag(div), Some("div"));
        assert_eq!(doc.get_attribute(div, "class"), Some("app"));
        assert_eq!(doc.children(div).len(), 2);
        assert_eq!(doc.text_content(div), "helloworld");
        assert_eq!(doc.next_sibling(hello), Some(span));
    }

    #[test]
    fn insert_before_moves_node() {
        let mut doc = Document::new();
        let p = doc.create_fragment();
        let a = doc.create_text("a");
        let b = doc.create_text("b");
        doc.append_child(p, a);
        doc.append_child(p, b);
        doc.insert_before(p, b, Some(a));
        assert_eq!(doc.children(p), &[b, a]);
    }

    #[test]
    fn class_list_editing() {
        let mut doc = Document::new();
        let el = doc.create_element("div");
        doc.add_class(el, "x");
        doc.add_class(el, "au");
        doc.add_class(el, "au");
        assert_eq!(doc.get_attribute(el, "class"), Some("x au"));
        doc.remove_class(el, "x");
        assert_eq!(doc.get_attribute(el, "class"), Some("au"));
    }
}
