//! The compiled instruction set.
//!
//! Instructions are plain data: they can be cached, shared across hydrations
//! and serialized. Each one carries a two-character `type` tag.

use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::attr_syntax::AttrSyntax;
use crate::expr::Expression;
use crate::resources::{BindableDefinition, BindingMode, ResourceDefinition, ShadowOptions};

pub mod tag {
    pub const HYDRATE_ELEMENT: &str = "ra";
    pub const HYDRATE_ATTRIBUTE: &str = "rb";
    pub const HYDRATE_TEMPLATE_CONTROLLER: &str = "rc";
    pub const HYDRATE_LET_ELEMENT: &str = "rd";
    pub const SET_PROPERTY: &str = "re";
    pub const INTERPOLATION: &str = "rf";
    pub const PROPERTY_BINDING: &str = "rg";
    pub const CALL_BINDING: &str = "rh";
    pub const LET_BINDING: &str = "ri";
    pub const REF_BINDING: &str = "rj";
    pub const ITERATOR_BINDING: &str = "rk";
    pub const TEXT_BINDING: &str = "ha";
    pub const LISTENER_BINDING: &str = "hb";
    pub const ATTRIBUTE_BINDING: &str = "hc";
    pub const STYLE_PROPERTY_BINDING: &str = "hd";
    pub const SET_ATTRIBUTE: &str = "he";
    pub const SET_CLASS_ATTRIBUTE: &str = "hf";
    pub const SET_STYLE_ATTRIBUTE: &str = "hg";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Instruction {
    #[serde(rename = "ra")]
    HydrateElement(HydrateElementInstruction),
    #[serde(rename = "rb")]
    HydrateAttribute(HydrateAttributeInstruction),
    #[serde(rename = "rc")]
    HydrateTemplateController(HydrateTemplateControllerInstruction),
    #[serde(rename = "rd")]
    HydrateLetElement(HydrateLetElementInstruction),
    #[serde(rename = "re")]
    SetProperty(SetPropertyInstruction),
    #[serde(rename = "rf")]
    Interpolation(InterpolationInstruction),
    #[serde(rename = "rg")]
    PropertyBinding(PropertyBindingInstruction),
    #[serde(rename = "rh")]
    CallBinding(CallBindingInstruction),
    #[serde(rename = "ri")]
    LetBinding(LetBindingInstruction),
    #[serde(rename = "rj")]
    RefBinding(RefBindingInstruction),
    #[serde(rename = "rk")]
    IteratorBinding(IteratorBindingInstruction),
    #[serde(rename = "ha")]
    TextBinding(TextBindingInstruction),
    #[serde(rename = "hb")]
    ListenerBinding(ListenerBindingInstruction),
    #[serde(rename = "hc")]
    AttributeBinding(AttributeBindingInstruction),
    #[serde(rename = "hd")]
    StylePropertyBinding(StylePropertyBindingInstruction),
    #[serde(rename = "he")]
    SetAttribute(SetAttributeInstruction),
    #[serde(rename = "hf")]
    SetClassAttribute(SetClassAttributeInstruction),
    #[serde(rename = "hg")]
    SetStyleAttribute(SetStyleAttributeInstruction),
}

impl Instruction {
    pub fn type_tag(&self) -> &'static str {
        match self {
            Instruction::HydrateElement(_) => tag::HYDRATE_ELEMENT,
            Instruction::HydrateAttribute(_) => tag::HYDRATE_ATTRIBUTE,
            Instruction::HydrateTemplateController(_) => tag::HYDRATE_TEMPLATE_CONTROLLER,
            Instruction::HydrateLetElement(_) => tag::HYDRATE_LET_ELEMENT,
            Instruction::SetProperty(_) => tag::SET_PROPERTY,
            Instruction::Interpolation(_) => tag::INTERPOLATION,
            Instruction::PropertyBinding(_) => tag::PROPERTY_BINDING,
            Instruction::CallBinding(_) => tag::CALL_BINDING,
            Instruction::LetBinding(_) => tag::LET_BINDING,
            Instruction::RefBinding(_) => tag::REF_BINDING,
            Instruction::IteratorBinding(_) => tag::ITERATOR_BINDING,
            Instruction::TextBinding(_) => tag::TEXT_BINDING,
            Instruction::ListenerBinding(_) => tag::LISTENER_BINDING,
            Instruction::AttributeBinding(_) => tag::ATTRIBUTE_BINDING,
            Instruction::StylePropertyBinding(_) => tag::STYLE_PROPERTY_BINDING,
            Instruction::SetAttribute(_) => tag::SET_ATTRIBUTE,
            Instruction::SetClassAttribute(_) => tag::SET_CLASS_ATTRIBUTE,
            Instruction::SetStyleAttribute(_) => tag::SET_STYLE_ATTRIBUTE,
        }
    }
}

/// Compiled projections keyed by slot name.
pub type ProjectionMap = IndexMap<String, Arc<CompiledDefinition>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotKind {
    /// The slot's own children.
    Fallback,
    /// Content supplied by the element's consumer.
    Projection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotInfo {
    pub name: String,
    pub kind: SlotKind,
    pub content: Arc<CompiledDefinition>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HydrateElementInstruction {
    pub res: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    pub props: Vec<Instruction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub projections: Option<ProjectionMap>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slot_info: Option<SlotInfo>,
    #[serde(default)]
    pub containerless: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub captures: Vec<AttrSyntax>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HydrateAttributeInstruction {
    pub res: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    pub props: Vec<Instruction>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HydrateTemplateControllerInstruction {
    pub def: Arc<CompiledDefinition>,
    pub res: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    pub props: Vec<Instruction>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HydrateLetElementInstruction {
    pub instructions: Vec<LetBindingInstruction>,
    pub to_binding_context: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetPropertyInstruction {
    pub value: String,
    pub to: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterpolationInstruction {
    pub from: Expression,
    pub to: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyBindingInstruction {
    pub from: Expression,
    pub to: String,
    pub mode: BindingMode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallBindingInstruction {
    pub from: Expression,
    pub to: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LetBindingInstruction {
    pub from: Expression,
    pub to: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefBindingInstruction {
    pub from: Expression,
    pub to: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IteratorBindingInstruction {
    pub from: Expression,
    pub to: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextBindingInstruction {
    pub from: Expression,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DelegationStrategy {
    None,
    Capturing,
    Bubbling,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListenerBindingInstruction {
    pub from: Expression,
    /// Event name.
    pub to: String,
    pub prevent_default: bool,
    pub strategy: DelegationStrategy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeBindingInstruction {
    /// `class`, `style` or the attribute name itself.
    pub attr: String,
    pub from: Expression,
    pub to: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StylePropertyBindingInstruction {
    pub from: Expression,
    pub to: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetAttributeInstruction {
    pub value: String,
    pub to: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetClassAttributeInstruction {
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetStyleAttributeInstruction {
    pub value: String,
}

/// Output of compiling one template.
///
/// `instructions[i]` belongs to the i-th target of `template` in document
/// order; `surrogates` apply to the host element itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledDefinition {
    pub name: String,
    pub template: String,
    pub instructions: Vec<Vec<Instruction>>,
    pub surrogates: Vec<Instruction>,
    pub dependencies: Vec<ResourceDefinition>,
    pub bindables: IndexMap<String, BindableDefinition>,
    pub containerless: bool,
    pub capture: bool,
    pub shadow_options: Option<ShadowOptions>,
    pub has_slots: bool,
    /// Projections this definition was compiled against.
    pub projections_map: Option<ProjectionMap>,
}

impl CompiledDefinition {
    /// Definition of a view with no targets.
    pub fn empty(name: &str) -> Self {
        Self {
            name: name.to_string(),
            template: String::new(),
            instructions: Vec::new(),
            surrogates: Vec::new(),
            dependencies: Vec::new(),
            bindables: IndexMap::new(),
            containerless: false,
            capture: false,
            shadow_options: None,
            has_slots: false,
            projections_map: None,
        }
    }

    pub fn target_count(&self) -> usize {
        self.instructions.len()
    }
}
