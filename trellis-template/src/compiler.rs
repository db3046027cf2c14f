//! Turns a custom element definition into a [`CompiledDefinition`]: markup is
//! parsed, bound into symbols and lowered into one instruction row per
//! target, in document order.

use std::cell::Cell;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use trellis_dom::{Document, NodeId, NodeKind, TARGET_CLASS, html};

use crate::attr_syntax::{AttributeParser, AttributePattern, default_patterns};
use crate::binder::{AU_SLOT, AS_CUSTOM_ELEMENT, Binder, hoist_local_templates};
use crate::binding_command::{AttrMapper, BindingCommand, CommandBuildInfo, default_commands};
use crate::case::camel_case;
use crate::error::Result;
use crate::expr::{BasicExpressionParser, ExpressionParser};
use crate::instructions::*;
use crate::markup;
use crate::resources::{
    CustomElementDefinition, ResourceDefinition, ResourceInfoCache, ResourceRegistry, ResourceResolver,
    ScopedResolver,
};
use crate::symbols::*;

#[derive(Clone)]
pub struct CompilerOptions {
    /// Unknown `as-element` names and unknown multi-binding properties are
    /// errors instead of being ignored.
    pub strict_resolution: bool,
    pub patterns: Vec<AttributePattern>,
    pub commands: Vec<Arc<dyn BindingCommand>>,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        Self {
            strict_resolution: true,
            patterns: default_patterns(),
            commands: default_commands(),
        }
    }
}

pub struct TemplateCompiler {
    attr_parser: AttributeParser,
    commands: FxHashMap<String, Arc<dyn BindingCommand>>,
    expressions: Box<dyn ExpressionParser>,
    mapper: AttrMapper,
    cache: ResourceInfoCache,
    strict: bool,
}

impl Default for TemplateCompiler {
    fn default() -> Self {
        Self::new(CompilerOptions::default())
    }
}

/// State shared by all units of one `compile` call.
struct Unit<'a> {
    binder: Binder<'a>,
    mapper: &'a AttrMapper,
    projections: Option<&'a ProjectionMap>,
    has_slots: Cell<bool>,
}

impl TemplateCompiler {
    pub fn new(options: CompilerOptions) -> Self {
        let commands = options
            .commands
            .into_iter()
            .map(|c| (c.name().to_string(), c))
            .collect();
        Self {
            attr_parser: AttributeParser::new(&options.patterns),
            commands,
            expressions: Box::new(BasicExpressionParser),
            mapper: AttrMapper,
            cache: ResourceInfoCache::new(),
            strict: options.strict_resolution,
        }
    }

    pub fn with_expression_parser(mut self, parser: Box<dyn ExpressionParser>) -> Self {
        self.expressions = parser;
        self
    }

    pub fn expression_parser(&self) -> &dyn ExpressionParser {
        &*self.expressions
    }

    /// Compile `def` against `resources`. `projections` are the consumer's
    /// `au-slot` contents when the element is compiled for a specific usage.
    pub fn compile(
        &self,
        def: &CustomElementDefinition,
        resources: &dyn ResourceResolver,
        projections: Option<&ProjectionMap>,
    ) -> Result<Arc<CompiledDefinition>> {
        let mut compiled = CompiledDefinition::empty(&def.name);
        compiled.bindables = def.bindables.clone();
        compiled.containerless = def.containerless;
        compiled.capture = def.capture;
        compiled.shadow_options = def.shadow_options;
        compiled.dependencies = def.dependencies.clone();
        compiled.projections_map = projections.cloned();

        let Some(source) = def.template.as_deref() else {
            return Ok(Arc::new(compiled));
        };

        let (mut doc, fragment) = markup::parse_document(source)?;
        let (root, surrogate) = match template_root(&doc, fragment) {
            Some(template) => (template, Some(template)),
            None => (fragment, None),
        };

        let locals = hoist_local_templates(&mut doc, root, &def.name)?;
        let mut local_registry = ResourceRegistry::new();
        for dep in &def.dependencies {
            local_registry.register(dep.clone());
        }
        for local in &locals {
            local_registry.register(local.clone());
            compiled.dependencies.push(ResourceDefinition::Element(local.clone()));
        }
        let scoped = ScopedResolver {
            local: &local_registry,
            parent: resources,
        };

        let unit = Unit {
            binder: Binder::new(
                &self.attr_parser,
                &*self.expressions,
                &self.commands,
                &scoped,
                &self.cache,
                self.strict,
            ),
            mapper: &self.mapper,
            projections,
            has_slots: Cell::new(false),
        };

        let symbol = unit.binder.bind(&mut doc, root, surrogate)?;
        unit.has_slots.set(unit.has_slots.get() | symbol.has_slots);
        if let Some(host) = surrogate {
            compiled.surrogates = unit.surrogates(&doc, host, &symbol);
        }
        compiled.instructions = unit.rows(&mut doc, &symbol.child_nodes)?;
        compiled.template = html::serialize_children(&doc, root);
        compiled.has_slots = unit.has_slots.get();

        tracing::debug!(
            name = %compiled.name,
            targets = compiled.target_count(),
            surrogates = compiled.surrogates.len(),
            locals = locals.len(),
            "compiled template"
        );
        Ok(Arc::new(compiled))
    }
}

/// The root `<template>` when it is the only non-blank node of the markup.
fn template_root(doc: &Document, fragment: NodeId) -> Option<NodeId> {
    let mut significant = doc.children(fragment).iter().copied().filter(|c| match doc.kind(*c) {
        NodeKind::Text(t) => !t.trim().is_empty(),
        NodeKind::Comment(_) => false,
        _ => true,
    });
    let first = significant.next()?;
    if significant.next().is_some() {
        return None;
    }
    (doc.tag(first) == Some("template") && !doc.has_attribute(first, AS_CUSTOM_ELEMENT)).then_some(first)
}

impl Unit<'_> {
    /// Compile the content of a detached `<template>` into its own definition.
    fn compile_unit(&self, doc: &mut Document, template: NodeId, name: &str) -> Result<Arc<CompiledDefinition>> {
        let symbol = self.binder.bind(doc, template, None)?;
        self.has_slots.set(self.has_slots.get() | symbol.has_slots);
        let mut compiled = CompiledDefinition::empty(name);
        compiled.instructions = self.rows(doc, &symbol.child_nodes)?;
        compiled.template = html::serialize_children(doc, template);
        compiled.has_slots = symbol.has_slots;
        compiled.projections_map = self.projections.cloned();
        Ok(Arc::new(compiled))
    }

    fn rows(&self, doc: &mut Document, nodes: &[NodeSymbol]) -> Result<Vec<Vec<Instruction>>> {
        let mut rows = Vec::new();
        self.collect_rows(doc, nodes, &mut rows)?;
        Ok(rows)
    }

    fn collect_rows(&self, doc: &mut Document, nodes: &[NodeSymbol], rows: &mut Vec<Vec<Instruction>>) -> Result<()> {
        for node in nodes {
            match node {
                NodeSymbol::CustomElement(el) => {
                    doc.add_class(el.node, TARGET_CLASS);
                    rows.push(self.custom_element_row(doc, el)?);
                    self.collect_rows(doc, &el.child_nodes, rows)?;
                }
                NodeSymbol::PlainElement(el) => {
                    if el.is_target() {
                        doc.add_class(el.node, TARGET_CLASS);
                        let mut row = Vec::new();
                        for attr in &el.custom_attributes {
                            row.push(self.hydrate_attribute(doc, el.node, attr));
                        }
                        for attr in &el.plain_attributes {
                            row.push(self.plain_attribute(doc, el.node, attr));
                        }
                        rows.push(row);
                    }
                    self.collect_rows(doc, &el.child_nodes, rows)?;
                }
                NodeSymbol::TemplateController(tc) => {
                    doc.add_class(tc.marker, TARGET_CLASS);
                    let res = tc.attribute.res().to_string();
                    let def = self.compile_unit(doc, tc.template, &res)?;
                    let props = self.bindings(doc, tc.marker, &tc.attribute.bindings);
                    rows.push(vec![Instruction::HydrateTemplateController(
                        HydrateTemplateControllerInstruction {
                            def,
                            res,
                            alias: tc.attribute.info.alias.clone(),
                            props,
                        },
                    )]);
                }
                NodeSymbol::Let(el) => {
                    doc.add_class(el.node, TARGET_CLASS);
                    let instructions = el
                        .bindings
                        .iter()
                        .map(|b| LetBindingInstruction {
                            from: b.expression.clone(),
                            to: b.target.clone(),
                        })
                        .collect();
                    rows.push(vec![Instruction::HydrateLetElement(HydrateLetElementInstruction {
                        instructions,
                        to_binding_context: el.to_binding_context,
                    })]);
                }
                NodeSymbol::Text(text) => {
                    doc.add_class(text.marker, TARGET_CLASS);
                    rows.push(vec![Instruction::TextBinding(TextBindingInstruction {
                        from: text.interpolation.clone(),
                    })]);
                }
            }
        }
        Ok(())
    }

    fn custom_element_row(&self, doc: &mut Document, el: &CustomElementSymbol) -> Result<Vec<Instruction>> {
        let slot_info = match &el.slot {
            Some(slot) => Some(match self.projections.and_then(|p| p.get(&slot.name)) {
                Some(content) => SlotInfo {
                    name: slot.name.clone(),
                    kind: SlotKind::Projection,
                    content: content.clone(),
                },
                None => SlotInfo {
                    name: slot.name.clone(),
                    kind: SlotKind::Fallback,
                    content: self.compile_unit(doc, slot.fallback, AU_SLOT)?,
                },
            }),
            None => None,
        };

        let projections = if el.projections.is_empty() {
            None
        } else {
            let mut map = ProjectionMap::new();
            for p in &el.projections {
                map.insert(p.name.clone(), self.compile_unit(doc, p.template, &p.name)?);
            }
            Some(map)
        };

        let mut row = vec![Instruction::HydrateElement(HydrateElementInstruction {
            res: el.info.name.clone(),
            alias: el.info.alias.clone(),
            props: self.bindings(doc, el.node, &el.bindings),
            projections,
            slot_info,
            containerless: el.containerless,
            captures: el.captures.clone(),
        })];
        for attr in &el.custom_attributes {
            row.push(self.hydrate_attribute(doc, el.node, attr));
        }
        for attr in &el.plain_attributes {
            row.push(self.plain_attribute(doc, el.node, attr));
        }
        Ok(row)
    }

    fn hydrate_attribute(&self, doc: &Document, node: NodeId, attr: &CustomAttributeSymbol) -> Instruction {
        Instruction::HydrateAttribute(HydrateAttributeInstruction {
            res: attr.res().to_string(),
            alias: attr.info.alias.clone(),
            props: self.bindings(doc, node, &attr.bindings),
        })
    }

    fn bindings(&self, doc: &Document, node: NodeId, bindings: &[BindingSymbol]) -> Vec<Instruction> {
        bindings
            .iter()
            .map(|b| match (&b.command, &b.value) {
                (Some(command), BindingValue::Expression(expression)) => command.build(CommandBuildInfo {
                    doc,
                    node,
                    attr: &b.syntax,
                    expression: expression.clone(),
                    bindable: Some(&b.bindable),
                    mapper: self.mapper,
                }),
                (_, BindingValue::Expression(expression)) => Instruction::Interpolation(InterpolationInstruction {
                    from: expression.clone(),
                    to: b.bindable.prop_name.clone(),
                }),
                (_, BindingValue::Literal(value)) => Instruction::SetProperty(SetPropertyInstruction {
                    value: value.clone(),
                    to: b.bindable.prop_name.clone(),
                }),
            })
            .collect()
    }

    fn plain_attribute(&self, doc: &Document, node: NodeId, attr: &PlainAttributeSymbol) -> Instruction {
        match &attr.command {
            Some(command) => command.build(CommandBuildInfo {
                doc,
                node,
                attr: &attr.syntax,
                expression: attr.expression.clone(),
                bindable: None,
                mapper: self.mapper,
            }),
            None => Instruction::Interpolation(InterpolationInstruction {
                from: attr.expression.clone(),
                to: self
                    .mapper
                    .map(doc, node, &attr.syntax.target)
                    .unwrap_or_else(|| camel_case(&attr.syntax.target)),
            }),
        }
    }

    fn surrogates(&self, doc: &Document, host: NodeId, root: &RootSymbol) -> Vec<Instruction> {
        let mut out: Vec<Instruction> = root
            .surrogate_attributes
            .iter()
            .map(|a| self.hydrate_attribute(doc, host, a))
            .collect();
        for attr in &root.surrogate_plain {
            out.push(match attr {
                SurrogateAttribute::Binding(binding) => self.plain_attribute(doc, host, binding),
                SurrogateAttribute::Static { name, value } if name == "class" => {
                    Instruction::SetClassAttribute(SetClassAttributeInstruction { value: value.clone() })
                }
                SurrogateAttribute::Static { name, value } if name == "style" => {
                    Instruction::SetStyleAttribute(SetStyleAttributeInstruction { value: value.clone() })
                }
                SurrogateAttribute::Static { name, value } => Instruction::SetAttribute(SetAttributeInstruction {
                    value: value.clone(),
                    to: name.clone(),
                }),
            });
        }
        out
    }
}
