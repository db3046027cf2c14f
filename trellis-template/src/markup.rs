use pest::Parser;
use pest::iterators::Pair;
use trellis_dom::{Document, NodeId, html};

use crate::error::Result;

#[derive(pest_derive::Parser)]
#[grammar = "markup.pest"]
struct MarkupParser;

/// Parse `source` into a new fragment of `doc`.
///
/// Tag and attribute names are lower-cased, entities in text and attribute
/// values are decoded.
pub fn parse_fragment(doc: &mut Document, source: &str) -> Result<NodeId> {
    let mut pairs = MarkupParser::parse(Rule::markup, source)?;
    let fragment = doc.create_fragment();
    if let Some(root) = pairs.next() {
        for node in root.into_inner() {
            append_node(doc, fragment, node);
        }
    }
    Ok(fragment)
}

fn append_node(doc: &mut Document, parent: NodeId, pair: Pair<Rule>) {
    match pair.as_rule() {
        Rule::text => {
            let t = doc.create_text(html::decode_entities(pair.as_str()));
            doc.append_child(parent, t);
        }
        Rule::comment => {
            let body = pair.into_inner().next().map(|p| p.as_str()).unwrap_or("");
            let c = doc.create_comment(body);
            doc.append_child(parent, c);
        }
        Rule::element | Rule::void_element | Rule::self_closing => {
            let mut inner = pair.into_inner();
            let Some(tag) = inner.next() else { return };
            let el = doc.create_element(tag.as_str().to_ascii_lowercase());
            doc.append_child(parent, el);
            for child in inner {
                match child.as_rule() {
                    Rule::attribute => set_attribute(doc, el, child),
                    _ => append_node(doc, el, child),
                }
            }
        }
        _ => {}
    }
}

fn set_attribute(doc: &mut Document, el: NodeId, pair: Pair<Rule>) {
    let mut inner = pair.into_inner();
    let Some(name) = inner.next() else { return };
    let value = inner.next().map(|v| html::decode_entities(v.as_str())).unwrap_or_default();
    let name = name.as_str().to_ascii_lowercase();
    // first occurrence wins, as in browsers
    if !doc.has_attribute(el, &name) {
        doc.set_attribute(el, &name, value);
    }
}

/// Parse `source` into a standalone document, returning it with its fragment.
pub fn parse_document(source: &str) -> Result<(Document, NodeId)> {
    let mut doc = Document::new();
    let fragment = parse_fragment(&mut doc, source)?;
    Ok((doc, fragment))
}
