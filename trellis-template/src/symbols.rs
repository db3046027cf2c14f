//! Semantic model produced by the binder for one compilation unit.
//!
//! Symbols point at nodes of the document being compiled and live only for
//! the duration of a `compile` call. Attribute and child lists start empty
//! and only allocate once something is pushed.

use std::rc::Rc;
use std::sync::Arc;

use trellis_dom::NodeId;

use crate::attr_syntax::AttrSyntax;
use crate::binding_command::BindingCommand;
use crate::expr::Expression;
use crate::resources::{AttrInfo, BindableInfo, ElementInfo};

/// Value bound to a bindable: a parsed expression or a literal string.
#[derive(Debug, Clone, PartialEq)]
pub enum BindingValue {
    Expression(Expression),
    Literal(String),
}

/// One resolved bindable binding on a custom element or attribute.
#[derive(Debug, Clone)]
pub struct BindingSymbol {
    pub command: Option<Arc<dyn BindingCommand>>,
    pub bindable: BindableInfo,
    pub value: BindingValue,
    pub syntax: AttrSyntax,
}

#[derive(Debug, Clone)]
pub struct CustomAttributeSymbol {
    pub syntax: AttrSyntax,
    pub info: Rc<AttrInfo>,
    pub bindings: Vec<BindingSymbol>,
}

impl CustomAttributeSymbol {
    pub fn res(&self) -> &str {
        &self.info.name
    }
}

/// A binding on a native attribute or property.
#[derive(Debug, Clone)]
pub struct PlainAttributeSymbol {
    pub syntax: AttrSyntax,
    /// `None` for an interpolated value.
    pub command: Option<Arc<dyn BindingCommand>>,
    pub expression: Expression,
}

#[derive(Debug, Clone)]
pub struct TemplateControllerSymbol {
    pub attribute: CustomAttributeSymbol,
    /// `au-m` marker left where the controlled element was.
    pub marker: NodeId,
    /// `<template>` holding the controlled content.
    pub template: NodeId,
}

#[derive(Debug, Clone)]
pub struct LetBindingSymbol {
    pub target: String,
    pub expression: Expression,
}

#[derive(Debug, Clone)]
pub struct LetElementSymbol {
    pub node: NodeId,
    pub bindings: Vec<LetBindingSymbol>,
    pub to_binding_context: bool,
}

#[derive(Debug, Clone)]
pub struct TextSymbol {
    pub marker: NodeId,
    pub text: NodeId,
    pub interpolation: Expression,
}

/// Consumer-supplied content for one named slot of a custom element.
#[derive(Debug, Clone)]
pub struct ProjectionSymbol {
    pub name: String,
    pub template: NodeId,
}

/// `<au-slot>`: its name and a template with the fallback content.
#[derive(Debug, Clone)]
pub struct SlotSymbol {
    pub name: String,
    pub fallback: NodeId,
}

#[derive(Debug, Clone)]
pub struct CustomElementSymbol {
    pub node: NodeId,
    pub info: Rc<ElementInfo>,
    pub bindings: Vec<BindingSymbol>,
    pub custom_attributes: Vec<CustomAttributeSymbol>,
    pub plain_attributes: Vec<PlainAttributeSymbol>,
    pub captures: Vec<AttrSyntax>,
    pub containerless: bool,
    pub child_nodes: Vec<NodeSymbol>,
    pub projections: Vec<ProjectionSymbol>,
    pub slot: Option<SlotSymbol>,
}

#[derive(Debug, Clone)]
pub struct PlainElementSymbol {
    pub node: NodeId,
    pub custom_attributes: Vec<CustomAttributeSymbol>,
    pub plain_attributes: Vec<PlainAttributeSymbol>,
    pub child_nodes: Vec<NodeSymbol>,
}

impl PlainElementSymbol {
    /// Only elements carrying bindings consume an instruction row.
    pub fn is_target(&self) -> bool {
        !self.custom_attributes.is_empty() || !self.plain_attributes.is_empty()
    }
}

#[derive(Debug, Clone)]
pub enum NodeSymbol {
    CustomElement(CustomElementSymbol),
    PlainElement(PlainElementSymbol),
    TemplateController(TemplateControllerSymbol),
    Let(LetElementSymbol),
    Text(TextSymbol),
}

#[derive(Debug, Clone)]
pub enum SurrogateAttribute {
    Binding(PlainAttributeSymbol),
    Static { name: String, value: String },
}

/// Root of a compilation unit.
#[derive(Debug, Clone, Default)]
pub struct RootSymbol {
    /// Custom attributes declared on the root `<template>`.
    pub surrogate_attributes: Vec<CustomAttributeSymbol>,
    /// The remaining root `<template>` attributes, in source order.
    pub surrogate_plain: Vec<SurrogateAttribute>,
    pub child_nodes: Vec<NodeSymbol>,
    pub has_slots: bool,
}
