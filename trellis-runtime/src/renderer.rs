//! Renderer dispatch: one renderer per instruction type tag.
//!
//! A renderer either adds a binding to the controller being hydrated,
//! creates a child controller, or mutates the target node once.

use std::fmt;
use std::rc::Rc;

use rustc_hash::FxHashMap;
use trellis_core::{Object, Value};
use trellis_dom::{NodeId, convert_to_render_location, style};
use trellis_template::binder::AU_SLOT;
use trellis_template::instructions::tag;
use trellis_template::{DelegationStrategy, Instruction, ResourceResolver};

use crate::bindings::{Binding, BindingTarget, CallBinding, ListenerBinding, PropertyBinding, RefBinding, ToViewBinding};
use crate::container::RenderContext;
use crate::controller::{Controller, ElementOptions};
use crate::error::{Result, RuntimeError};
use crate::flags::LifecycleFlags;
use crate::slot;
use crate::view_factory::ViewFactory;
use crate::view_model::{AttributeContext, ElementContext};

pub trait Renderer {
    /// Type tag of the instruction this renderer handles.
    fn target(&self) -> &'static str;

    fn render(
        &self,
        flags: LifecycleFlags,
        context: &RenderContext,
        controller: &Controller,
        target: &BindingTarget,
        instruction: &Instruction,
    ) -> Result<()>;
}

/// Instruction type tag to renderer. Built once, read-only afterwards.
pub struct RendererTable {
    renderers: FxHashMap<&'static str, Box<dyn Renderer>>,
}

impl RendererTable {
    pub fn builder() -> RendererTableBuilder {
        RendererTableBuilder {
            renderers: FxHashMap::default(),
        }
    }

    /// A renderer for every instruction the compiler emits.
    pub fn with_defaults() -> Self {
        Self::builder().defaults().build()
    }

    pub fn len(&self) -> usize {
        self.renderers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.renderers.is_empty()
    }

    pub fn has(&self, type_tag: &str) -> bool {
        self.renderers.contains_key(type_tag)
    }

    pub fn render(
        &self,
        flags: LifecycleFlags,
        context: &RenderContext,
        controller: &Controller,
        target: &BindingTarget,
        instruction: &Instruction,
    ) -> Result<()> {
        let type_tag = instruction.type_tag();
        match self.renderers.get(type_tag) {
            Some(renderer) => renderer.render(flags, context, controller, target, instruction),
            None => Err(RuntimeError::MissingRenderer(type_tag.to_string())),
        }
    }
}

impl fmt::Debug for RendererTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut tags: Vec<_> = self.renderers.keys().collect();
        tags.sort();
        f.debug_struct("RendererTable").field("tags", &tags).finish()
    }
}

pub struct RendererTableBuilder {
    renderers: FxHashMap<&'static str, Box<dyn Renderer>>,
}

impl RendererTableBuilder {
    /// Later registrations for the same tag replace earlier ones.
    pub fn register(mut self, renderer: impl Renderer + 'static) -> Self {
        self.renderers.insert(renderer.target(), Box::new(renderer));
        self
    }

    pub fn defaults(self) -> Self {
        self.register(HydrateElementRenderer)
            .register(HydrateAttributeRenderer)
            .register(TemplateControllerRenderer)
            .register(LetElementRenderer)
            .register(SetPropertyRenderer)
            .register(InterpolationRenderer)
            .register(PropertyBindingRenderer)
            .register(CallBindingRenderer)
            .register(LetBindingRenderer)
            .register(RefBindingRenderer)
            .register(IteratorBindingRenderer)
            .register(TextBindingRenderer)
            .register(ListenerBindingRenderer)
            .register(AttributeBindingRenderer)
            .register(StylePropertyBindingRenderer)
            .register(SetAttributeRenderer)
            .register(SetClassAttributeRenderer)
            .register(SetStyleAttributeRenderer)
    }

    pub fn build(self) -> RendererTable {
        RendererTable {
            renderers: self.renderers,
        }
    }
}

fn mismatch(renderer: &'static str, instruction: &Instruction) -> RuntimeError {
    RuntimeError::RendererMismatch {
        renderer,
        instruction: instruction.type_tag().to_string(),
    }
}

fn node_target(target: &BindingTarget, instruction: &Instruction) -> Result<NodeId> {
    target.node().ok_or_else(|| RuntimeError::NodeTargetRequired(instruction.type_tag().to_string()))
}

/// Render bindable instructions against a child's state, registering the
/// resulting bindings on the controller that owns the markup.
fn render_props(
    flags: LifecycleFlags,
    context: &RenderContext,
    controller: &Controller,
    state: &Object,
    props: &[Instruction],
) -> Result<()> {
    let target = BindingTarget::Component(state.clone());
    let renderers = context.container().renderers();
    for prop in props {
        renderers.render(flags, context, controller, &target, prop)?;
    }
    Ok(())
}

pub struct HydrateElementRenderer;

impl Renderer for HydrateElementRenderer {
    fn target(&self) -> &'static str {
        tag::HYDRATE_ELEMENT
    }

    fn render(
        &self,
        flags: LifecycleFlags,
        context: &RenderContext,
        controller: &Controller,
        target: &BindingTarget,
        instruction: &Instruction,
    ) -> Result<()> {
        let Instruction::HydrateElement(instr) = instruction else {
            return Err(mismatch("hydrate-element", instruction));
        };
        let host = node_target(target, instruction)?;

        if instr.res == AU_SLOT {
            if let Some(info) = &instr.slot_info {
                let child = slot::hydrate_slot(context, host, info)?;
                controller.add_child(child);
                return Ok(());
            }
        }

        let def = context
            .find_element(&instr.res)
            .ok_or_else(|| RuntimeError::UnknownElement(instr.res.clone()))?;
        let container = context.container();
        let view_model = container.element_view_model(
            &def.name,
            &ElementContext {
                dom: container.dom(),
                host,
            },
        );
        let state = view_model.state().clone();
        let child = Controller::for_custom_element(
            container,
            view_model,
            host,
            def,
            ElementOptions {
                projections: instr.projections.clone(),
                captures: instr.captures.clone(),
                containerless: instr.containerless,
                context: Some(context.clone()),
            },
        )?;
        render_props(flags, context, controller, &state, &instr.props)?;
        controller.add_child(child);
        Ok(())
    }
}

pub struct HydrateAttributeRenderer;

impl Renderer for HydrateAttributeRenderer {
    fn target(&self) -> &'static str {
        tag::HYDRATE_ATTRIBUTE
    }

    fn render(
        &self,
        flags: LifecycleFlags,
        context: &RenderContext,
        controller: &Controller,
        target: &BindingTarget,
        instruction: &Instruction,
    ) -> Result<()> {
        let Instruction::HydrateAttribute(instr) = instruction else {
            return Err(mismatch("hydrate-attribute", instruction));
        };
        let host = node_target(target, instruction)?;
        let def = context
            .find_attribute(&instr.res)
            .ok_or_else(|| RuntimeError::UnknownAttribute(instr.res.clone()))?;
        let container = context.container();
        let view_model = container.attribute_view_model(
            &def.name,
            &AttributeContext {
                dom: container.dom(),
                host,
                factory: None,
                location: None,
            },
        );
        let state = view_model.state().clone();
        let child = Controller::for_custom_attribute(container, view_model, host, &def);
        render_props(flags, context, controller, &state, &instr.props)?;
        controller.add_child(child);
        Ok(())
    }
}

pub struct TemplateControllerRenderer;

impl Renderer for TemplateControllerRenderer {
    fn target(&self) -> &'static str {
        tag::HYDRATE_TEMPLATE_CONTROLLER
    }

    fn render(
        &self,
        flags: LifecycleFlags,
        context: &RenderContext,
        controller: &Controller,
        target: &BindingTarget,
        instruction: &Instruction,
    ) -> Result<()> {
        let Instruction::HydrateTemplateController(instr) = instruction else {
            return Err(mismatch("template-controller", instruction));
        };
        let node = node_target(target, instruction)?;
        let def = context
            .find_attribute(&instr.res)
            .ok_or_else(|| RuntimeError::UnknownAttribute(instr.res.clone()))?;
        let container = context.container();
        let factory = ViewFactory::new(&def.name, context.child(instr.def.clone()));
        let location = convert_to_render_location(&mut container.dom().doc_mut(), node);
        let view_model = container.attribute_view_model(
            &def.name,
            &AttributeContext {
                dom: container.dom(),
                host: location.start,
                factory: Some(factory),
                location: Some(location),
            },
        );
        let state = view_model.state().clone();
        let child = Controller::for_custom_attribute(container, view_model, location.start, &def);
        render_props(flags, context, controller, &state, &instr.props)?;
        controller.add_child(child);
        Ok(())
    }
}

pub struct LetElementRenderer;

impl Renderer for LetElementRenderer {
    fn target(&self) -> &'static str {
        tag::HYDRATE_LET_ELEMENT
    }

    fn render(
        &self,
        _flags: LifecycleFlags,
        context: &RenderContext,
        controller: &Controller,
        target: &BindingTarget,
        instruction: &Instruction,
    ) -> Result<()> {
        let Instruction::HydrateLetElement(instr) = instruction else {
            return Err(mismatch("let-element", instruction));
        };
        let node = node_target(target, instruction)?;
        context.dom().doc_mut().remove(node);
        for binding in &instr.instructions {
            controller.add_binding(Rc::new(ToViewBinding::let_value(
                context.dom(),
                binding.from.clone(),
                &binding.to,
                instr.to_binding_context,
            )));
        }
        Ok(())
    }
}

pub struct SetPropertyRenderer;

impl Renderer for SetPropertyRenderer {
    fn target(&self) -> &'static str {
        tag::SET_PROPERTY
    }

    fn render(
        &self,
        _flags: LifecycleFlags,
        context: &RenderContext,
        _controller: &Controller,
        target: &BindingTarget,
        instruction: &Instruction,
    ) -> Result<()> {
        let Instruction::SetProperty(instr) = instruction else {
            return Err(mismatch("set-property", instruction));
        };
        match target {
            BindingTarget::Node(node) => context.dom().set_property(*node, &instr.to, Value::string(&instr.value)),
            BindingTarget::Component(state) => state.set(instr.to.clone(), Value::string(&instr.value)),
        }
        Ok(())
    }
}

pub struct InterpolationRenderer;

impl Renderer for InterpolationRenderer {
    fn target(&self) -> &'static str {
        tag::INTERPOLATION
    }

    fn render(
        &self,
        _flags: LifecycleFlags,
        context: &RenderContext,
        controller: &Controller,
        target: &BindingTarget,
        instruction: &Instruction,
    ) -> Result<()> {
        let Instruction::Interpolation(instr) = instruction else {
            return Err(mismatch("interpolation", instruction));
        };
        let binding = ToViewBinding::interpolation(context.dom(), instr.from.clone(), target, &instr.to);
        controller.add_binding(Rc::new(binding));
        Ok(())
    }
}

pub struct PropertyBindingRenderer;

impl Renderer for PropertyBindingRenderer {
    fn target(&self) -> &'static str {
        tag::PROPERTY_BINDING
    }

    fn render(
        &self,
        _flags: LifecycleFlags,
        context: &RenderContext,
        controller: &Controller,
        target: &BindingTarget,
        instruction: &Instruction,
    ) -> Result<()> {
        let Instruction::PropertyBinding(instr) = instruction else {
            return Err(mismatch("property-binding", instruction));
        };
        let binding = PropertyBinding::new(context.dom(), instr.from.clone(), target, &instr.to, instr.mode);
        controller.add_binding(Rc::new(binding));
        Ok(())
    }
}

pub struct CallBindingRenderer;

impl Renderer for CallBindingRenderer {
    fn target(&self) -> &'static str {
        tag::CALL_BINDING
    }

    fn render(
        &self,
        _flags: LifecycleFlags,
        context: &RenderContext,
        controller: &Controller,
        target: &BindingTarget,
        instruction: &Instruction,
    ) -> Result<()> {
        let Instruction::CallBinding(instr) = instruction else {
            return Err(mismatch("call-binding", instruction));
        };
        let binding = CallBinding::new(context.dom(), instr.from.clone(), target, &instr.to);
        controller.add_binding(Rc::new(binding));
        Ok(())
    }
}

pub struct LetBindingRenderer;

impl Renderer for LetBindingRenderer {
    fn target(&self) -> &'static str {
        tag::LET_BINDING
    }

    fn render(
        &self,
        _flags: LifecycleFlags,
        context: &RenderContext,
        controller: &Controller,
        _target: &BindingTarget,
        instruction: &Instruction,
    ) -> Result<()> {
        let Instruction::LetBinding(instr) = instruction else {
            return Err(mismatch("let-binding", instruction));
        };
        let binding = ToViewBinding::let_value(context.dom(), instr.from.clone(), &instr.to, false);
        controller.add_binding(Rc::new(binding));
        Ok(())
    }
}

pub struct RefBindingRenderer;

impl Renderer for RefBindingRenderer {
    fn target(&self) -> &'static str {
        tag::REF_BINDING
    }

    fn render(
        &self,
        _flags: LifecycleFlags,
        context: &RenderContext,
        controller: &Controller,
        target: &BindingTarget,
        instruction: &Instruction,
    ) -> Result<()> {
        let Instruction::RefBinding(instr) = instruction else {
            return Err(mismatch("ref-binding", instruction));
        };
        let value = match target {
            BindingTarget::Component(state) => Value::Object(state.clone()),
            BindingTarget::Node(node) => {
                let dom = context.dom();
                let component = match instr.to.as_str() {
                    "element" => None,
                    "component" | "view-model" | "controller" => dom.first_component(*node),
                    name => dom.component(*node, name),
                };
                component.map(Value::Object).unwrap_or(Value::Node(node.0))
            }
        };
        controller.add_binding(Rc::new(RefBinding::new(instr.from.clone(), value)));
        Ok(())
    }
}

pub struct IteratorBindingRenderer;

impl Renderer for IteratorBindingRenderer {
    fn target(&self) -> &'static str {
        tag::ITERATOR_BINDING
    }

    fn render(
        &self,
        _flags: LifecycleFlags,
        context: &RenderContext,
        controller: &Controller,
        target: &BindingTarget,
        instruction: &Instruction,
    ) -> Result<()> {
        let Instruction::IteratorBinding(instr) = instruction else {
            return Err(mismatch("iterator-binding", instruction));
        };
        let BindingTarget::Component(state) = target else {
            return Err(RuntimeError::ComponentTargetRequired(instruction.type_tag().to_string()));
        };
        let binding = ToViewBinding::iterator(context.dom(), instr.from.clone(), state, &instr.to);
        controller.add_binding(Rc::new(binding));
        Ok(())
    }
}

pub struct TextBindingRenderer;

impl Renderer for TextBindingRenderer {
    fn target(&self) -> &'static str {
        tag::TEXT_BINDING
    }

    fn render(
        &self,
        _flags: LifecycleFlags,
        context: &RenderContext,
        controller: &Controller,
        target: &BindingTarget,
        instruction: &Instruction,
    ) -> Result<()> {
        let Instruction::TextBinding(instr) = instruction else {
            return Err(mismatch("text-binding", instruction));
        };
        let node = node_target(target, instruction)?;
        controller.add_binding(Rc::new(ToViewBinding::text(context.dom(), instr.from.clone(), node)));
        Ok(())
    }
}

pub struct ListenerBindingRenderer;

impl Renderer for ListenerBindingRenderer {
    fn target(&self) -> &'static str {
        tag::LISTENER_BINDING
    }

    fn render(
        &self,
        _flags: LifecycleFlags,
        context: &RenderContext,
        controller: &Controller,
        target: &BindingTarget,
        instruction: &Instruction,
    ) -> Result<()> {
        let Instruction::ListenerBinding(instr) = instruction else {
            return Err(mismatch("listener-binding", instruction));
        };
        let node = node_target(target, instruction)?;
        let binding = ListenerBinding::new(
            context.dom(),
            instr.from.clone(),
            node,
            &instr.to,
            instr.strategy == DelegationStrategy::Capturing,
            instr.prevent_default,
        );
        controller.add_binding(Rc::new(binding));
        Ok(())
    }
}

pub struct AttributeBindingRenderer;

impl Renderer for AttributeBindingRenderer {
    fn target(&self) -> &'static str {
        tag::ATTRIBUTE_BINDING
    }

    fn render(
        &self,
        _flags: LifecycleFlags,
        context: &RenderContext,
        controller: &Controller,
        target: &BindingTarget,
        instruction: &Instruction,
    ) -> Result<()> {
        let Instruction::AttributeBinding(instr) = instruction else {
            return Err(mismatch("attribute-binding", instruction));
        };
        let node = node_target(target, instruction)?;
        let binding = ToViewBinding::attribute(context.dom(), instr.from.clone(), node, &instr.attr, &instr.to);
        controller.add_binding(Rc::new(binding));
        Ok(())
    }
}

pub struct StylePropertyBindingRenderer;

impl Renderer for StylePropertyBindingRenderer {
    fn target(&self) -> &'static str {
        tag::STYLE_PROPERTY_BINDING
    }

    fn render(
        &self,
        _flags: LifecycleFlags,
        context: &RenderContext,
        controller: &Controller,
        target: &BindingTarget,
        instruction: &Instruction,
    ) -> Result<()> {
        let Instruction::StylePropertyBinding(instr) = instruction else {
            return Err(mismatch("style-property-binding", instruction));
        };
        let node = node_target(target, instruction)?;
        let binding = ToViewBinding::style(context.dom(), instr.from.clone(), node, &instr.to);
        controller.add_binding(Rc::new(binding));
        Ok(())
    }
}

pub struct SetAttributeRenderer;

impl Renderer for SetAttributeRenderer {
    fn target(&self) -> &'static str {
        tag::SET_ATTRIBUTE
    }

    fn render(
        &self,
        _flags: LifecycleFlags,
        context: &RenderContext,
        _controller: &Controller,
        target: &BindingTarget,
        instruction: &Instruction,
    ) -> Result<()> {
        let Instruction::SetAttribute(instr) = instruction else {
            return Err(mismatch("set-attribute", instruction));
        };
        let node = node_target(target, instruction)?;
        context.dom().set_attribute(node, &instr.to, &instr.value);
        Ok(())
    }
}

pub struct SetClassAttributeRenderer;

impl Renderer for SetClassAttributeRenderer {
    fn target(&self) -> &'static str {
        tag::SET_CLASS_ATTRIBUTE
    }

    fn render(
        &self,
        _flags: LifecycleFlags,
        context: &RenderContext,
        _controller: &Controller,
        target: &BindingTarget,
        instruction: &Instruction,
    ) -> Result<()> {
        let Instruction::SetClassAttribute(instr) = instruction else {
            return Err(mismatch("set-class-attribute", instruction));
        };
        let node = node_target(target, instruction)?;
        for class in instr.value.split_whitespace() {
            context.dom().toggle_class(node, class, true);
        }
        Ok(())
    }
}

pub struct SetStyleAttributeRenderer;

impl Renderer for SetStyleAttributeRenderer {
    fn target(&self) -> &'static str {
        tag::SET_STYLE_ATTRIBUTE
    }

    fn render(
        &self,
        _flags: LifecycleFlags,
        context: &RenderContext,
        _controller: &Controller,
        target: &BindingTarget,
        instruction: &Instruction,
    ) -> Result<()> {
        let Instruction::SetStyleAttribute(instr) = instruction else {
            return Err(mismatch("set-style-attribute", instruction));
        };
        let node = node_target(target, instruction)?;
        context.dom().merge_style(node, &style::parse_declarations(&instr.value));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_every_instruction_tag() {
        let table = RendererTable::with_defaults();
        assert_eq!(table.len(), 18);
        for t in [
            tag::HYDRATE_ELEMENT,
            tag::HYDRATE_ATTRIBUTE,
            tag::HYDRATE_TEMPLATE_CONTROLLER,
            tag::HYDRATE_LET_ELEMENT,
            tag::SET_PROPERTY,
            tag::INTERPOLATION,
            tag::PROPERTY_BINDING,
            tag::CALL_BINDING,
            tag::LET_BINDING,
            tag::REF_BINDING,
            tag::ITERATOR_BINDING,
            tag::TEXT_BINDING,
            tag::LISTENER_BINDING,
            tag::ATTRIBUTE_BINDING,
            tag::STYLE_PROPERTY_BINDING,
            tag::SET_ATTRIBUTE,
            tag::SET_CLASS_ATTRIBUTE,
            tag::SET_STYLE_ATTRIBUTE,
        ] {
            assert!(table.has(t), "missing renderer for {t}");
        }
    }

    #[test]
    fn empty_table_reports_missing_renderer() {
        let table = RendererTable::builder().register(SetAttributeRenderer).build();
        assert_eq!(table.len(), 1);
        assert!(!table.has(tag::TEXT_BINDING));
    }
}
