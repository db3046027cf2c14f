use crate::document::{Document, NodeId, NodeKind, VOID_ELEMENTS};

/// Serialize `id` and its subtree to markup.
pub fn serialize(doc: &Document, id: NodeId) -> String {
    let mut out = String::new();
    write_node(doc, id, &mut out);
    out
}

/// Serialize only the children of `id` (the "content" of a template or fragment).
pub fn serialize_children(doc: &Document, id: NodeId) -> String {
    let mut out = String::new();
    for c in doc.children(id) {
        write_node(doc, *c, &mut out);
    }
    out
}

fn write_node(doc: &Document, id: NodeId, out: &mut String) {
    match doc.kind(id) {
        NodeKind::Text(t) => out.push_str(&escape_text(t)),
        NodeKind::Comment(c) => {
            out.push_str("<!--");
            out.push_str(c);
            out.push_str("-->");
        }
        NodeKind::Fragment => {
            for c in doc.children(id) {
                write_node(doc, *c, out);
            }
        }
        NodeKind::Element { tag, attrs, .. } => {
            out.push('<');
            out.push_str(tag);
            for a in attrs {
                out.push(' ');
                out.push_str(&a.name);
                if !a.value.is_empty() {
                    out.push_str("=\"");
                    out.push_str(&escape_attr(&a.value));
                    out.push('"');
                }
            }
            out.push('>');
            if VOID_ELEMENTS.contains(&tag.as_str()) {
                return;
            }
            for c in doc.children(id) {
                write_node(doc, *c, out);
            }
            out.push_str("</");
            out.push_str(tag);
            out.push('>');
        }
    }
}

pub fn escape_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
    out
}

pub fn escape_attr(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Decode the handful of entities [`escape_text`]/[`escape_attr`] produce.
/// Unknown entities are kept verbatim.
pub fn decode_entities(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(pos) = rest.find('&') {
        out.push_str(&rest[..pos]);
        rest = &rest[pos..];
        let decoded = [
            ("&amp;", '&'),
            ("&lt;", '<'),
            ("&gt;", '>'),
            ("&quot;", '"'),
            ("&#39;", '\''),
            ("&apos;", '\''),
        ]
        .iter()
        .find(|(entity, _)| rest.starts_with(entity));
        match decoded {
            Some((entity, ch)) => {
                out.push(*ch);
                rest = &rest[entity.len()..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_elements_comments_and_text() {
        let mut doc = Document::new();
        let frag = doc.create_fragment();
        let div = doc.create_element("div");
        doc.set_attribute(div, "title", "a \"b\"");
        let input = doc.create_element("input");
        let text = doc.create_text("1 < 2");
        let c = doc.create_comment("au-start");
        doc.append_child(frag, div);
        doc.append_child(div, input);
        doc.append_child(div, text);
        doc.append_child(frag, c);

        assert_eq!(
            serialize_children(&doc, frag),
            r#"<div title="a &quot;b&quot;"><input>1 &lt; 2</div><!--au-start-->"#
        );
    }

    #[test]
    fn decode_round_trips_escapes() {
        assert_eq!(decode_entities("a &amp; b &lt;c&gt; &quot;d&quot; &nbsp;"), "a & b <c> \"d\" &nbsp;");
    }
}
