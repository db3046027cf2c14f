//! Walks a parsed template and produces the symbol graph of one compilation
//! unit, rewriting the document on the way: binding attributes are removed,
//! template controllers and text interpolations are replaced by markers and
//! `<au-slot>` projections are moved into their own templates.

use std::cell::Cell;
use std::rc::Rc;
use std::sync::Arc;

use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use trellis_dom::{Document, LOCATION_END, LOCATION_START, MARKER_TAG, NodeId, NodeKind, html};

use crate::attr_syntax::{AttrSyntax, AttributeParser};
use crate::binding_command::BindingCommand;
use crate::case::{camel_case, kebab_case};
use crate::error::{Result, TemplateError};
use crate::expr::{Expression, ExpressionKind, ExpressionParser};
use crate::resources::{
    AttrInfo, BindableDefinition, BindableInfo, BindingMode, CustomAttributeDefinition, CustomElementDefinition,
    ElementInfo, ResourceInfoCache, ResourceResolver,
};
use crate::symbols::*;

pub const AU_SLOT: &str = "au-slot";
pub const DEFAULT_SLOT: &str = "default";
pub const AS_ELEMENT: &str = "as-element";
pub const AS_CUSTOM_ELEMENT: &str = "as-custom-element";
pub const CONTAINERLESS: &str = "containerless";
pub const TO_BINDING_CONTEXT: &str = "to-binding-context";
pub const SPREAD_ATTRS: &str = "...$attrs";

pub struct Binder<'a> {
    attr_parser: &'a AttributeParser,
    expressions: &'a dyn ExpressionParser,
    commands: &'a FxHashMap<String, Arc<dyn BindingCommand>>,
    resources: &'a dyn ResourceResolver,
    cache: &'a ResourceInfoCache,
    strict: bool,
    has_slots: Cell<bool>,
}

fn attributes_of(doc: &Document, node: NodeId) -> Vec<(String, String)> {
    doc.attributes(node)
        .iter()
        .map(|a| (a.name.clone(), a.value.clone()))
        .collect()
}

fn is_whitespace_text(doc: &Document, node: NodeId) -> bool {
    matches!(doc.kind(node), NodeKind::Text(t) if t.trim().is_empty())
}

/// An unescaped `:` before any `${` means `key: value; ...` pairs.
fn has_inline_bindings(value: &str) -> bool {
    let mut chars = value.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                chars.next();
            }
            ':' => return true,
            '$' if chars.peek() == Some(&'{') => return false,
            _ => {}
        }
    }
    false
}

/// Split `a: x; b.bind: y` into `[("a", "x"), ("b.bind", "y")]`, honouring
/// `\` escapes.
fn split_inline_bindings(value: &str) -> Vec<(String, String)> {
    let chars: Vec<char> = value.chars().collect();
    let mut out = Vec::new();
    let mut start = 0;
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '\\' => i += 1,
            ':' => {
                let name: String = chars[start..i].iter().collect();
                i += 1;
                while i < chars.len() && chars[i].is_whitespace() {
                    i += 1;
                }
                let value_start = i;
                while i < chars.len() && chars[i] != ';' {
                    if chars[i] == '\\' {
                        i += 1;
                    }
                    i += 1;
                }
                let end = i.min(chars.len());
                let val: String = chars[value_start..end].iter().collect();
                out.push((name.trim().to_string(), val.trim_end().to_string()));
                i += 1;
                while i < chars.len() && chars[i].is_whitespace() {
                    i += 1;
                }
                start = i;
                continue;
            }
            _ => {}
        }
        i += 1;
    }
    out
}

fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "\\'"))
}

/// Pull `<template as-custom-element="name">` children of `root` out of the
/// document and turn them into element definitions.
pub fn hoist_local_templates(doc: &mut Document, root: NodeId, owner: &str) -> Result<Vec<Arc<CustomElementDefinition>>> {
    let mut locals: IndexMap<String, Arc<CustomElementDefinition>> = IndexMap::new();
    for child in doc.children(root).to_vec() {
        if doc.tag(child) != Some("template") || !doc.has_attribute(child, AS_CUSTOM_ELEMENT) {
            continue;
        }
        let name = doc.get_attribute(child, AS_CUSTOM_ELEMENT).unwrap_or("").trim().to_string();
        if name.is_empty() {
            return Err(TemplateError::EmptyLocalTemplateName);
        }
        if locals.contains_key(&name) {
            return Err(TemplateError::DuplicateLocalTemplate(name));
        }

        let mut builder = CustomElementDefinition::builder(&name);
        let mut seen_attributes: Vec<String> = Vec::new();
        for decl in doc.children(child).to_vec() {
            if doc.tag(decl) != Some("bindable") {
                continue;
            }
            let Some(property) = doc.get_attribute(decl, "property").map(str::to_string) else {
                return Err(TemplateError::MissingBindableProperty(name));
            };
            let attribute = doc
                .get_attribute(decl, "attribute")
                .map(str::to_string)
                .unwrap_or_else(|| kebab_case(&property));
            if seen_attributes.contains(&attribute) {
                return Err(TemplateError::DuplicateLocalBindable {
                    element: name,
                    attribute,
                });
            }
            let mode = doc
                .get_attribute(decl, "mode")
                .and_then(BindingMode::parse)
                .unwrap_or_default();
            builder = builder.bindable(BindableDefinition::new(&property).attribute(&attribute).mode(mode));
            seen_attributes.push(attribute);
            doc.remove(decl);
        }
        doc.remove(child);
        let def = builder.template(&html::serialize_children(doc, child)).build();
        locals.insert(name, def);
    }

    let stray = doc
        .descendants_where(root, |d, n| d.tag(n) == Some("template"))
        .into_iter()
        .find(|n| doc.tag(*n) == Some("template") && doc.has_attribute(*n, AS_CUSTOM_ELEMENT));
    if let Some(stray) = stray {
        let name = doc.get_attribute(stray, AS_CUSTOM_ELEMENT).unwrap_or("").to_string();
        return Err(TemplateError::LocalTemplateNotAtRoot(name));
    }
    if !locals.is_empty() && doc.children(root).iter().all(|c| is_whitespace_text(doc, *c)) {
        return Err(TemplateError::OnlyLocalTemplates(owner.to_string()));
    }
    Ok(locals.into_values().collect())
}

impl<'a> Binder<'a> {
    pub fn new(
        attr_parser: &'a AttributeParser,
        expressions: &'a dyn ExpressionParser,
        commands: &'a FxHashMap<String, Arc<dyn BindingCommand>>,
        resources: &'a dyn ResourceResolver,
        cache: &'a ResourceInfoCache,
        strict: bool,
    ) -> Self {
        Self {
            attr_parser,
            expressions,
            commands,
            resources,
            cache,
            strict,
            has_slots: Cell::new(false),
        }
    }

    /// Bind the children of `root`. `surrogate` is the root `<template>`
    /// whose own attributes apply to the host element.
    pub fn bind(&self, doc: &mut Document, root: NodeId, surrogate: Option<NodeId>) -> Result<RootSymbol> {
        self.has_slots.set(false);
        let mut symbol = RootSymbol::default();
        if let Some(host) = surrogate {
            self.bind_surrogates(doc, host, &mut symbol)?;
        }
        symbol.child_nodes = self.bind_children(doc, root)?;
        symbol.has_slots = self.has_slots.get();
        Ok(symbol)
    }

    fn command(&self, syntax: &AttrSyntax) -> Option<Arc<dyn BindingCommand>> {
        syntax.command.as_ref().and_then(|c| self.commands.get(c)).cloned()
    }

    fn attribute_definition(&self, syntax: &AttrSyntax, command: Option<&Arc<dyn BindingCommand>>) -> Option<Arc<CustomAttributeDefinition>> {
        if command.is_some_and(|c| c.ignores_custom_attributes()) {
            return None;
        }
        self.resources.find_attribute(&syntax.target)
    }

    fn bind_surrogates(&self, doc: &mut Document, host: NodeId, root: &mut RootSymbol) -> Result<()> {
        for (name, value) in attributes_of(doc, host) {
            let syntax = self.attr_parser.parse(&name, &value)?;
            let command = self.command(&syntax);
            if let Some(def) = self.attribute_definition(&syntax, command.as_ref()) {
                if def.is_template_controller {
                    return Err(TemplateError::SurrogateTemplateController(def.name.clone()));
                }
                let info = self.cache.attribute(&def, &syntax.target)?;
                root.surrogate_attributes.push(self.custom_attribute(syntax, info, command)?);
            } else if let Some(binding) = self.plain_attribute(syntax, command)? {
                root.surrogate_plain.push(SurrogateAttribute::Binding(binding));
            } else {
                root.surrogate_plain.push(SurrogateAttribute::Static { name, value });
            }
        }
        doc.clear_attributes(host);
        Ok(())
    }

    fn bind_children(&self, doc: &mut Document, parent: NodeId) -> Result<Vec<NodeSymbol>> {
        let mut out = Vec::new();
        for child in doc.children(parent).to_vec() {
            if let Some(symbol) = self.bind_node(doc, child)? {
                out.push(symbol);
            }
        }
        Ok(out)
    }

    fn bind_node(&self, doc: &mut Document, node: NodeId) -> Result<Option<NodeSymbol>> {
        match doc.kind(node) {
            NodeKind::Text(text) => {
                let text = text.clone();
                self.bind_text(doc, node, &text)
            }
            NodeKind::Element { .. } => self.bind_element(doc, node),
            NodeKind::Comment(_) | NodeKind::Fragment => Ok(None),
        }
    }

    fn bind_text(&self, doc: &mut Document, node: NodeId, text: &str) -> Result<Option<NodeSymbol>> {
        let Some(interpolation) = self.expressions.parse_interpolation(text)? else {
            return Ok(None);
        };
        let Some(parent) = doc.parent(node) else { return Ok(None) };
        let marker = doc.create_element(MARKER_TAG);
        doc.insert_before(parent, marker, Some(node));
        doc.set_text(node, " ");
        Ok(Some(NodeSymbol::Text(TextSymbol {
            marker,
            text: node,
            interpolation,
        })))
    }

    fn bind_element(&self, doc: &mut Document, node: NodeId) -> Result<Option<NodeSymbol>> {
        let tag = doc.tag(node).unwrap_or("").to_string();

        if tag == "template" && doc.has_attribute(node, AS_CUSTOM_ELEMENT) {
            let name = doc.get_attribute(node, AS_CUSTOM_ELEMENT).unwrap_or("").to_string();
            return Err(TemplateError::LocalTemplateNotAtRoot(name));
        }

        if let Some(tc) = self.bind_template_controller(doc, node)? {
            return Ok(Some(NodeSymbol::TemplateController(tc)));
        }

        match tag.as_str() {
            // uncontrolled templates are inert
            "template" => return Ok(None),
            "let" => return self.bind_let(doc, node).map(|s| Some(NodeSymbol::Let(s))),
            "slot" => self.has_slots.set(true),
            _ => {}
        }

        let element_name = match doc.get_attribute(node, AS_ELEMENT) {
            Some(name) => {
                let name = name.to_string();
                doc.remove_attribute(node, AS_ELEMENT);
                name
            }
            None => tag.clone(),
        };

        let def = self.resources.find_element(&element_name);
        match def {
            Some(def) => {
                let info = self.cache.element(&def, &element_name);
                self.bind_custom_element(doc, node, info).map(|s| Some(NodeSymbol::CustomElement(s)))
            }
            None if element_name == AU_SLOT => {
                let info = Rc::new(ElementInfo {
                    name: AU_SLOT.to_string(),
                    alias: None,
                    containerless: true,
                    capture: false,
                    bindables: IndexMap::new(),
                });
                self.bind_custom_element(doc, node, info).map(|s| Some(NodeSymbol::CustomElement(s)))
            }
            None if element_name != tag && self.strict => Err(TemplateError::UnknownElement(element_name)),
            None => self.bind_plain_element(doc, node).map(|s| Some(NodeSymbol::PlainElement(s))),
        }
    }

    /// Wrap `node` into the first template controller found on it. The
    /// controller attribute is removed; everything else stays on the node and
    /// is bound later, when the controller's template is compiled.
    fn bind_template_controller(&self, doc: &mut Document, node: NodeId) -> Result<Option<TemplateControllerSymbol>> {
        let mut found = None;
        for (name, value) in attributes_of(doc, node) {
            let syntax = self.attr_parser.parse(&name, &value)?;
            let command = self.command(&syntax);
            if let Some(def) = self.attribute_definition(&syntax, command.as_ref()) {
                if def.is_template_controller {
                    found = Some((syntax, command, def));
                    break;
                }
            }
        }
        let Some((syntax, command, def)) = found else {
            return Ok(None);
        };

        doc.remove_attribute(node, &syntax.raw_name);
        let info = self.cache.attribute(&def, &syntax.target)?;
        let attribute = self.custom_attribute(syntax, info, command)?;

        let marker = doc.create_element(MARKER_TAG);
        let start = doc.create_comment(LOCATION_START);
        let end = doc.create_comment(LOCATION_END);
        if let Some(parent) = doc.parent(node) {
            doc.insert_before(parent, marker, Some(node));
            doc.insert_before(parent, start, Some(node));
            doc.insert_before(parent, end, Some(node));
            doc.remove(node);
        }

        let template = if doc.tag(node) == Some("template") && !self.has_template_controller(doc, node)? {
            node
        } else {
            let template = doc.create_element("template");
            doc.append_child(template, node);
            template
        };

        Ok(Some(TemplateControllerSymbol {
            attribute,
            marker,
            template,
        }))
    }

    fn has_template_controller(&self, doc: &Document, node: NodeId) -> Result<bool> {
        for (name, value) in attributes_of(doc, node) {
            let syntax = self.attr_parser.parse(&name, &value)?;
            let command = self.command(&syntax);
            if self
                .attribute_definition(&syntax, command.as_ref())
                .is_some_and(|d| d.is_template_controller)
            {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn bind_let(&self, doc: &mut Document, node: NodeId) -> Result<LetElementSymbol> {
        let mut symbol = LetElementSymbol {
            node,
            bindings: Vec::new(),
            to_binding_context: false,
        };
        for (name, value) in attributes_of(doc, node) {
            if name == TO_BINDING_CONTEXT {
                symbol.to_binding_context = true;
                continue;
            }
            let syntax = self.attr_parser.parse(&name, &value)?;
            let expression = match self.command(&syntax) {
                Some(command) => self.parse_command_value(&syntax, &*command)?,
                None => match self.expressions.parse_interpolation(&value)? {
                    Some(e) => e,
                    None => {
                        tracing::warn!(
                            target = %syntax.target,
                            "<let> property declared with a literal; did you mean `.bind`?"
                        );
                        self.expressions.parse(&quote_literal(&value), ExpressionKind::Property)?
                    }
                },
            };
            symbol.bindings.push(LetBindingSymbol {
                target: camel_case(&syntax.target),
                expression,
            });
        }
        doc.clear_attributes(node);
        Ok(symbol)
    }

    fn bind_custom_element(&self, doc: &mut Document, node: NodeId, info: Rc<ElementInfo>) -> Result<CustomElementSymbol> {
        let mut containerless = info.containerless;
        if doc.has_attribute(node, CONTAINERLESS) {
            containerless = true;
            doc.remove_attribute(node, CONTAINERLESS);
        }

        let is_au_slot = info.name == AU_SLOT;
        let slot_name = if is_au_slot {
            let name = doc
                .get_attribute(node, "name")
                .filter(|n| !n.is_empty())
                .unwrap_or(DEFAULT_SLOT)
                .to_string();
            doc.remove_attribute(node, "name");
            Some(name)
        } else {
            None
        };

        let mut symbol = CustomElementSymbol {
            node,
            info: info.clone(),
            bindings: Vec::new(),
            custom_attributes: Vec::new(),
            plain_attributes: Vec::new(),
            captures: Vec::new(),
            containerless,
            child_nodes: Vec::new(),
            projections: Vec::new(),
            slot: None,
        };

        for (name, value) in attributes_of(doc, node) {
            let syntax = self.attr_parser.parse(&name, &value)?;
            let command = self.command(&syntax);
            let bindable = info.bindables.get(&syntax.target).filter(|_| syntax.target != SPREAD_ATTRS);

            if info.capture && bindable.is_none() {
                doc.remove_attribute(node, &name);
                symbol.captures.push(syntax);
                continue;
            }
            if let Some(def) = self.attribute_definition(&syntax, command.as_ref()) {
                doc.remove_attribute(node, &name);
                let attr_info = self.cache.attribute(&def, &syntax.target)?;
                symbol.custom_attributes.push(self.custom_attribute(syntax, attr_info, command)?);
                continue;
            }
            let ignores = command.as_ref().is_some_and(|c| c.ignores_custom_attributes());
            if let (Some(bindable), false) = (bindable, ignores) {
                doc.remove_attribute(node, &name);
                symbol.bindings.push(self.binding(bindable.clone(), syntax, command)?);
                continue;
            }
            if let Some(plain) = self.plain_attribute(syntax, command)? {
                doc.remove_attribute(node, &name);
                symbol.plain_attributes.push(plain);
            }
        }

        if let Some(name) = slot_name {
            let fallback = doc.create_element("template");
            doc.move_children(node, fallback);
            symbol.slot = Some(SlotSymbol { name, fallback });
            return Ok(symbol);
        }

        let mut projections: IndexMap<String, NodeId> = IndexMap::new();
        for child in doc.children(node).to_vec() {
            let Some(slot) = doc.get_attribute(child, AU_SLOT).map(str::to_string) else {
                continue;
            };
            let slot = if slot.is_empty() { DEFAULT_SLOT.to_string() } else { slot };
            doc.remove_attribute(child, AU_SLOT);
            let template = *projections
                .entry(slot)
                .or_insert_with(|| doc.create_element("template"));
            if doc.tag(child) == Some("template") {
                doc.move_children(child, template);
                doc.remove(child);
            } else {
                doc.append_child(template, child);
            }
        }
        symbol.projections = projections
            .into_iter()
            .map(|(name, template)| ProjectionSymbol { name, template })
            .collect();

        symbol.child_nodes = self.bind_children(doc, node)?;
        Ok(symbol)
    }

    fn bind_plain_element(&self, doc: &mut Document, node: NodeId) -> Result<PlainElementSymbol> {
        let mut symbol = PlainElementSymbol {
            node,
            custom_attributes: Vec::new(),
            plain_attributes: Vec::new(),
            child_nodes: Vec::new(),
        };
        for (name, value) in attributes_of(doc, node) {
            let syntax = self.attr_parser.parse(&name, &value)?;
            let command = self.command(&syntax);
            if let Some(def) = self.attribute_definition(&syntax, command.as_ref()) {
                doc.remove_attribute(node, &name);
                let info = self.cache.attribute(&def, &syntax.target)?;
                symbol.custom_attributes.push(self.custom_attribute(syntax, info, command)?);
            } else if let Some(plain) = self.plain_attribute(syntax, command)? {
                doc.remove_attribute(node, &name);
                symbol.plain_attributes.push(plain);
            }
        }
        symbol.child_nodes = self.bind_children(doc, node)?;
        Ok(symbol)
    }

    fn custom_attribute(
        &self,
        syntax: AttrSyntax,
        info: Rc<AttrInfo>,
        command: Option<Arc<dyn BindingCommand>>,
    ) -> Result<CustomAttributeSymbol> {
        let bindings = if command.is_none() && !info.no_multi_bindings && has_inline_bindings(&syntax.raw_value) {
            self.multi_bindings(&syntax, &info)?
        } else {
            vec![self.binding(info.primary.clone(), syntax.clone(), command)?]
        };
        Ok(CustomAttributeSymbol { syntax, info, bindings })
    }

    fn multi_bindings(&self, syntax: &AttrSyntax, info: &AttrInfo) -> Result<Vec<BindingSymbol>> {
        let mut out = Vec::new();
        for (name, value) in split_inline_bindings(&syntax.raw_value) {
            let inner = self.attr_parser.parse(&name, &value)?;
            let command = self.command(&inner);
            let key = kebab_case(&inner.target);
            match info.bindables.get(&key) {
                Some(bindable) => out.push(self.binding(bindable.clone(), inner, command)?),
                None if self.strict => {
                    return Err(TemplateError::UnknownBindable {
                        attribute: info.name.clone(),
                        property: inner.target,
                    });
                }
                None => {}
            }
        }
        Ok(out)
    }

    /// Bind a value to a known bindable: command, then interpolation, then literal.
    fn binding(
        &self,
        bindable: BindableInfo,
        syntax: AttrSyntax,
        command: Option<Arc<dyn BindingCommand>>,
    ) -> Result<BindingSymbol> {
        let value = match &command {
            Some(c) => BindingValue::Expression(self.parse_command_value(&syntax, &**c)?),
            None => match self.expressions.parse_interpolation(&syntax.raw_value)? {
                Some(e) => BindingValue::Expression(e),
                None => BindingValue::Literal(syntax.raw_value.clone()),
            },
        };
        Ok(BindingSymbol {
            command,
            bindable,
            value,
            syntax,
        })
    }

    fn plain_attribute(&self, syntax: AttrSyntax, command: Option<Arc<dyn BindingCommand>>) -> Result<Option<PlainAttributeSymbol>> {
        if let Some(c) = command {
            let expression = self.parse_command_value(&syntax, &*c)?;
            return Ok(Some(PlainAttributeSymbol {
                syntax,
                command: Some(c),
                expression,
            }));
        }
        Ok(self
            .expressions
            .parse_interpolation(&syntax.raw_value)?
            .map(|expression| PlainAttributeSymbol {
                syntax,
                command: None,
                expression,
            }))
    }

    fn parse_command_value(&self, syntax: &AttrSyntax, command: &dyn BindingCommand) -> Result<Expression> {
        let value = syntax.raw_value.trim();
        if value.is_empty() && command.defaults_empty_value() {
            return self.expressions.parse(&camel_case(&syntax.target), command.expression_kind());
        }
        self.expressions.parse(value, command.expression_kind())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn colon_rule() {
        assert!(has_inline_bindings("a: b"));
        assert!(!has_inline_bindings("${a ? b : c}"));
        assert!(!has_inline_bindings(r"a\:b"));
        assert!(!has_inline_bindings("plain"));
    }

    #[test]
    fn splits_pairs() {
        assert_eq!(
            split_inline_bindings("a: 1; b.bind: x.y ;c:${z}"),
            vec![
                ("a".to_string(), "1".to_string()),
                ("b.bind".to_string(), "x.y".to_string()),
                ("c".to_string(), "${z}".to_string()),
            ]
        );
    }

    #[test]
    fn quotes_literals() {
        assert_eq!(quote_literal("it's"), r"'it\'s'");
    }
}
