use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use trellis_dom::{Dom, NodeId};
use trellis_template::instructions::ProjectionMap;
use trellis_template::markup;
use trellis_template::{
    CompiledDefinition, CompilerOptions, CustomAttributeDefinition, CustomElementDefinition, ResourceDefinition,
    ResourceRegistry, ResourceResolver, TemplateCompiler,
};

use crate::bindings::BindingTarget;
use crate::controller::Controller;
use crate::error::{Result, RuntimeError};
use crate::flags::LifecycleFlags;
use crate::renderer::RendererTable;
use crate::view_model::{AttributeContext, AttributeFactory, ElementContext, ElementFactory, StateViewModel, ViewModel};

/// Everything a hydration needs: the platform, registered resources with
/// their view-model factories, the compiler and the renderer table.
///
/// Compiled definitions are cached per definition and projection set;
/// parsed templates are cached per compiled definition.
#[derive(Clone)]
pub struct Container(Rc<ContainerInner>);

struct ContainerInner {
    dom: Dom,
    resources: RefCell<ResourceRegistry>,
    elements: RefCell<FxHashMap<String, ElementFactory>>,
    attributes: RefCell<FxHashMap<String, AttributeFactory>>,
    compiler: TemplateCompiler,
    renderers: RendererTable,
    // Keyed by addresses; the Arcs are kept so the addresses stay taken.
    compiled: RefCell<FxHashMap<CompileKey, CompiledEntry>>,
    templates: RefCell<FxHashMap<usize, (Arc<CompiledDefinition>, NodeId)>>,
}

/// A definition address plus the address of each projected slot body.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CompileKey {
    definition: usize,
    projections: Option<Vec<(String, usize)>>,
}

impl CompileKey {
    fn new(def: &Arc<CustomElementDefinition>, projections: Option<&ProjectionMap>) -> Self {
        Self {
            definition: Arc::as_ptr(def) as usize,
            projections: projections.map(|map| {
                map.iter()
                    .map(|(slot, body)| (slot.clone(), Arc::as_ptr(body) as usize))
                    .collect()
            }),
        }
    }
}

struct CompiledEntry {
    _definition: Arc<CustomElementDefinition>,
    // Holds the projected bodies too, through `projections_map`.
    compiled: Arc<CompiledDefinition>,
}

impl Container {
    pub fn new(dom: Dom) -> Self {
        Self::with_options(dom, CompilerOptions::default(), RendererTable::with_defaults())
    }

    pub fn with_options(dom: Dom, options: CompilerOptions, renderers: RendererTable) -> Self {
        Self(Rc::new(ContainerInner {
            dom,
            resources: RefCell::new(ResourceRegistry::new()),
            elements: RefCell::new(FxHashMap::default()),
            attributes: RefCell::new(FxHashMap::default()),
            compiler: TemplateCompiler::new(options),
            renderers,
            compiled: RefCell::new(FxHashMap::default()),
            templates: RefCell::new(FxHashMap::default()),
        }))
    }

    pub fn dom(&self) -> &Dom {
        &self.0.dom
    }

    pub fn renderers(&self) -> &RendererTable {
        &self.0.renderers
    }

    pub fn compiler(&self) -> &TemplateCompiler {
        &self.0.compiler
    }

    /// Register an element definition without behaviour.
    pub fn register(&self, def: impl Into<ResourceDefinition>) {
        self.0.resources.borrow_mut().register(def);
    }

    pub fn register_element(
        &self,
        def: Arc<CustomElementDefinition>,
        factory: impl Fn(&ElementContext<'_>) -> Rc<dyn ViewModel> + 'static,
    ) {
        self.0.elements.borrow_mut().insert(def.name.clone(), Rc::new(factory));
        self.register(def);
    }

    pub fn register_attribute(
        &self,
        def: Arc<CustomAttributeDefinition>,
        factory: impl Fn(&AttributeContext<'_>) -> Rc<dyn ViewModel> + 'static,
    ) {
        self.0.attributes.borrow_mut().insert(def.name.clone(), Rc::new(factory));
        self.register(def);
    }

    pub(crate) fn element_view_model(&self, name: &str, cx: &ElementContext<'_>) -> Rc<dyn ViewModel> {
        let factory = self.0.elements.borrow().get(name).cloned();
        match factory {
            Some(f) => f(cx),
            None => Rc::new(StateViewModel::new()),
        }
    }

    pub(crate) fn attribute_view_model(&self, name: &str, cx: &AttributeContext<'_>) -> Rc<dyn ViewModel> {
        let factory = self.0.attributes.borrow().get(name).cloned();
        match factory {
            Some(f) => f(cx),
            None => Rc::new(StateViewModel::new()),
        }
    }

    /// Compile `def`, once per definition and set of projected slot bodies.
    pub fn compile(
        &self,
        def: &Arc<CustomElementDefinition>,
        resources: &dyn ResourceResolver,
        projections: Option<&ProjectionMap>,
    ) -> Result<Arc<CompiledDefinition>> {
        let key = CompileKey::new(def, projections);
        if let Some(entry) = self.0.compiled.borrow().get(&key) {
            return Ok(entry.compiled.clone());
        }
        let compiled = self.0.compiler.compile(def, resources, projections)?;
        self.0.compiled.borrow_mut().insert(
            key,
            CompiledEntry {
                _definition: def.clone(),
                compiled: compiled.clone(),
            },
        );
        Ok(compiled)
    }

    /// Fragment holding the parsed markup of `compiled`, parsed once.
    pub(crate) fn template_node(&self, compiled: &Arc<CompiledDefinition>) -> Result<NodeId> {
        let key = Arc::as_ptr(compiled) as usize;
        if let Some((_, node)) = self.0.templates.borrow().get(&key) {
            return Ok(*node);
        }
        let node = markup::parse_fragment(&mut self.0.dom.doc_mut(), &compiled.template)?;
        self.0.templates.borrow_mut().insert(key, (compiled.clone(), node));
        Ok(node)
    }

    pub fn compiled_count(&self) -> usize {
        self.0.compiled.borrow().len()
    }

    pub fn template_count(&self) -> usize {
        self.0.templates.borrow().len()
    }
}

impl ResourceResolver for Container {
    fn find_element(&self, name: &str) -> Option<Arc<CustomElementDefinition>> {
        self.0.resources.borrow().find_element(name)
    }

    fn find_attribute(&self, name: &str) -> Option<Arc<CustomAttributeDefinition>> {
        self.0.resources.borrow().find_attribute(name)
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("resources", &self.0.resources.borrow().len())
            .field("compiled", &self.compiled_count())
            .finish()
    }
}

/// A compiled definition together with the resources visible to it: its
/// own local dependencies, then the enclosing context's, then the
/// container's.
#[derive(Clone)]
pub struct RenderContext(Rc<ContextInner>);

struct ContextInner {
    container: Container,
    definition: Arc<CompiledDefinition>,
    locals: ResourceRegistry,
    parent: Option<RenderContext>,
}

impl RenderContext {
    pub fn new(container: &Container, definition: Arc<CompiledDefinition>) -> Self {
        Self::build(container, definition, None)
    }

    /// Context for a view nested in this one (template controller content,
    /// slot content). Local resources stay visible.
    pub fn child(&self, definition: Arc<CompiledDefinition>) -> Self {
        Self::build(&self.0.container, definition, Some(self.clone()))
    }

    fn build(container: &Container, definition: Arc<CompiledDefinition>, parent: Option<RenderContext>) -> Self {
        let mut locals = ResourceRegistry::new();
        for dep in &definition.dependencies {
            locals.register(dep.clone());
        }
        Self(Rc::new(ContextInner {
            container: container.clone(),
            definition,
            locals,
            parent,
        }))
    }

    pub fn container(&self) -> &Container {
        &self.0.container
    }

    pub fn dom(&self) -> &Dom {
        self.0.container.dom()
    }

    pub fn definition(&self) -> &Arc<CompiledDefinition> {
        &self.0.definition
    }

    /// Dispatch every row to its target, then the surrogates to `host`.
    pub fn render(&self, controller: &Controller, targets: &[NodeId], host: Option<NodeId>) -> Result<()> {
        let def = &self.0.definition;
        if targets.len() != def.instructions.len() {
            return Err(RuntimeError::TargetCountMismatch {
                name: def.name.clone(),
                targets: targets.len(),
                rows: def.instructions.len(),
            });
        }
        let renderers = self.0.container.renderers();
        let flags = LifecycleFlags::NONE;
        for (row, target) in def.instructions.iter().zip(targets) {
            let target = BindingTarget::Node(*target);
            for instruction in row {
                renderers.render(flags, self, controller, &target, instruction)?;
            }
        }
        if let Some(host) = host {
            let target = BindingTarget::Node(host);
            for instruction in &def.surrogates {
                renderers.render(flags, self, controller, &target, instruction)?;
            }
        }
        Ok(())
    }
}

impl ResourceResolver for RenderContext {
    fn find_element(&self, name: &str) -> Option<Arc<CustomElementDefinition>> {
        self.0
            .locals
            .find_element(name)
            .or_else(|| self.0.parent.as_ref().and_then(|p| p.find_element(name)))
            .or_else(|| self.0.container.find_element(name))
    }

    fn find_attribute(&self, name: &str) -> Option<Arc<CustomAttributeDefinition>> {
        self.0
            .locals
            .find_attribute(name)
            .or_else(|| self.0.parent.as_ref().and_then(|p| p.find_attribute(name)))
            .or_else(|| self.0.container.find_attribute(name))
    }
}

impl fmt::Debug for RenderContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderContext")
            .field("definition", &self.0.definition.name)
            .field("locals", &self.0.locals.len())
            .finish()
    }
}
