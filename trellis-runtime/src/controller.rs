//! Controllers own a hydrated component or view and drive its lifecycle.
//!
//! Activation: `binding` → bind → `bound` → mount → `attaching` together
//! with child activation → `attached` once every pending hook in the
//! subtree has settled. The join is a counter shared up to the initiator.
//!
//! Deactivation: children first, then `detaching`. Each controller appends
//! itself to the initiator's list, so once every `detaching` has settled
//! the initiator removes nodes, runs `unbinding` and unbinds the whole list
//! in one linear pass.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use trellis_core::{Deferred, HookError, HookOutcome, JoinCounter, Settlement};
use trellis_dom::{Dom, NodeId, NodeSequence, RenderLocation, convert_to_render_location};
use trellis_template::instructions::ProjectionMap;
use trellis_template::{AttrSyntax, CompiledDefinition, CustomAttributeDefinition, CustomElementDefinition, ShadowMode};

use crate::bindings::Binding;
use crate::container::{Container, RenderContext};
use crate::error::{Result, RuntimeError};
use crate::flags::LifecycleFlags;
use crate::scope::Scope;
use crate::view_factory::ViewFactory;
use crate::view_model::{HookContext, ViewModel};

static NEXT_ID: AtomicUsize = AtomicUsize::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerKind {
    CustomElement,
    CustomAttribute,
    Synthetic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    None,
    Activating,
    Activated,
    Deactivating,
    Deactivated,
}

/// Where a controller's nodes go when it mounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MountTarget {
    None,
    Host,
    ShadowRoot,
    Location,
}

/// Per-usage options of a custom element hydration.
#[derive(Default)]
pub struct ElementOptions {
    pub projections: Option<ProjectionMap>,
    pub captures: Vec<AttrSyntax>,
    /// Forced by the usage (`containerless` attribute).
    pub containerless: bool,
    /// Context of the markup the element appears in.
    pub context: Option<RenderContext>,
}

#[derive(Clone)]
pub struct Controller(Rc<Inner>);

#[derive(Clone)]
pub struct WeakController(Weak<Inner>);

impl WeakController {
    pub fn upgrade(&self) -> Option<Controller> {
        self.0.upgrade().map(Controller)
    }
}

struct Inner {
    id: usize,
    kind: ControllerKind,
    name: String,
    container: Container,
    view_model: RefCell<Option<Rc<dyn ViewModel>>>,
    factory: Option<ViewFactory>,
    captures: Vec<AttrSyntax>,

    context: RefCell<Option<RenderContext>>,
    compiled: RefCell<Option<Arc<CompiledDefinition>>>,
    host: Cell<Option<NodeId>>,
    shadow_root: Cell<Option<NodeId>>,
    location: Cell<Option<RenderLocation>>,
    mount: Cell<MountTarget>,
    nodes: RefCell<Option<NodeSequence>>,

    state: Cell<State>,
    released: Cell<bool>,
    disposed: Cell<bool>,
    is_bound: Cell<bool>,
    flags: Cell<LifecycleFlags>,

    scope: RefCell<Option<Rc<Scope>>>,
    locked_scope: Cell<bool>,
    bindings: RefCell<Vec<Rc<dyn Binding>>>,
    children: RefCell<Vec<Controller>>,
    parent: RefCell<Option<WeakController>>,
    initiator: RefCell<Option<WeakController>>,

    promise: RefCell<Option<Deferred>>,
    activating: JoinCounter,
    detaching: JoinCounter,
    unbinding: JoinCounter,

    // Detach list, threaded through the initiator.
    head: RefCell<Option<Controller>>,
    tail: RefCell<Option<Controller>>,
    next: RefCell<Option<Controller>>,
}

impl Controller {
    fn create(
        container: &Container,
        kind: ControllerKind,
        name: &str,
        view_model: Option<Rc<dyn ViewModel>>,
        factory: Option<ViewFactory>,
        captures: Vec<AttrSyntax>,
    ) -> Self {
        Controller(Rc::new(Inner {
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
            kind,
            name: name.to_string(),
            container: container.clone(),
            view_model: RefCell::new(view_model),
            factory,
            captures,
            context: RefCell::new(None),
            compiled: RefCell::new(None),
            host: Cell::new(None),
            shadow_root: Cell::new(None),
            location: Cell::new(None),
            mount: Cell::new(MountTarget::None),
            nodes: RefCell::new(None),
            state: Cell::new(State::None),
            released: Cell::new(false),
            disposed: Cell::new(false),
            is_bound: Cell::new(false),
            flags: Cell::new(LifecycleFlags::NONE),
            scope: RefCell::new(None),
            locked_scope: Cell::new(false),
            bindings: RefCell::new(Vec::new()),
            children: RefCell::new(Vec::new()),
            parent: RefCell::new(None),
            initiator: RefCell::new(None),
            promise: RefCell::new(None),
            activating: JoinCounter::new(),
            detaching: JoinCounter::new(),
            unbinding: JoinCounter::new(),
            head: RefCell::new(None),
            tail: RefCell::new(None),
            next: RefCell::new(None),
        }))
    }

    /// Hydrate a custom element on `host`: compile its definition, create
    /// its nodes and render every instruction row into them.
    pub fn for_custom_element(
        container: &Container,
        view_model: Rc<dyn ViewModel>,
        host: NodeId,
        definition: Arc<CustomElementDefinition>,
        options: ElementOptions,
    ) -> Result<Controller> {
        let ctrl = Controller::create(
            container,
            ControllerKind::CustomElement,
            &definition.name,
            Some(view_model.clone()),
            None,
            options.captures,
        );
        ctrl.0.host.set(Some(host));
        *ctrl.0.scope.borrow_mut() = Some(Scope::create(view_model.state().clone()));
        container
            .dom()
            .register_component(host, &definition.name, view_model.state().clone());

        let definition = view_model.define(&ctrl, &definition).unwrap_or(definition);
        ctrl.hydrate(&view_model, host, &definition, options.projections.as_ref(), options.containerless, options.context)?;
        ctrl.hydrate_children(host)?;
        view_model.created(&ctrl);
        Ok(ctrl)
    }

    fn hydrate(
        &self,
        view_model: &Rc<dyn ViewModel>,
        host: NodeId,
        definition: &Arc<CustomElementDefinition>,
        projections: Option<&ProjectionMap>,
        containerless: bool,
        outer: Option<RenderContext>,
    ) -> Result<()> {
        view_model.hydrating(self);
        let container = &self.0.container;
        let compiled = match &outer {
            Some(cx) => container.compile(definition, cx, projections)?,
            None => container.compile(definition, container, projections)?,
        };

        let dom = container.dom();
        let containerless = containerless || compiled.containerless;
        if compiled.shadow_options.is_some() || compiled.has_slots {
            if containerless {
                return Err(RuntimeError::ContainerlessShadow(self.0.name.clone()));
            }
            let mode = compiled.shadow_options.map(|o| o.mode).unwrap_or(ShadowMode::Open);
            let root = dom.doc_mut().attach_shadow(host);
            tracing::trace!(controller = self.0.id, ?mode, "attached shadow root");
            self.0.shadow_root.set(Some(root));
            self.0.mount.set(MountTarget::ShadowRoot);
        } else if containerless {
            let location = convert_to_render_location(&mut dom.doc_mut(), host);
            self.0.location.set(Some(location));
            self.0.mount.set(MountTarget::Location);
        } else {
            self.0.mount.set(MountTarget::Host);
        }

        let template = container.template_node(&compiled)?;
        *self.0.nodes.borrow_mut() = Some(NodeSequence::from_template(dom, template));
        *self.0.context.borrow_mut() = Some(RenderContext::new(container, compiled.clone()));
        *self.0.compiled.borrow_mut() = Some(compiled);
        view_model.hydrated(self);
        Ok(())
    }

    fn hydrate_children(&self, surrogate_host: NodeId) -> Result<()> {
        let context = self.0.context.borrow().clone();
        let targets = self
            .0
            .nodes
            .borrow()
            .as_ref()
            .map(|n| n.targets().to_vec())
            .unwrap_or_default();
        if let Some(context) = context {
            context.render(self, &targets, Some(surrogate_host))?;
        }
        Ok(())
    }

    pub fn for_custom_attribute(
        container: &Container,
        view_model: Rc<dyn ViewModel>,
        host: NodeId,
        definition: &CustomAttributeDefinition,
    ) -> Controller {
        let ctrl = Controller::create(
            container,
            ControllerKind::CustomAttribute,
            &definition.name,
            Some(view_model.clone()),
            None,
            Vec::new(),
        );
        ctrl.0.host.set(Some(host));
        container
            .dom()
            .register_component(host, &definition.name, view_model.state().clone());
        view_model.created(&ctrl);
        ctrl
    }

    /// A fresh view of `factory`'s definition. It still needs a location
    /// or host before it can mount.
    pub fn for_synthetic_view(factory: &ViewFactory) -> Result<Controller> {
        let context = factory.context().clone();
        let container = context.container().clone();
        let ctrl = Controller::create(
            &container,
            ControllerKind::Synthetic,
            factory.name(),
            None,
            Some(factory.clone()),
            Vec::new(),
        );
        let compiled = context.definition().clone();
        let template = container.template_node(&compiled)?;
        let nodes = NodeSequence::from_template(container.dom(), template);
        let targets = nodes.targets().to_vec();
        *ctrl.0.nodes.borrow_mut() = Some(nodes);
        *ctrl.0.compiled.borrow_mut() = Some(compiled);
        *ctrl.0.context.borrow_mut() = Some(context.clone());
        context.render(&ctrl, &targets, None)?;
        tracing::trace!(controller = ctrl.0.id, view = %ctrl.0.name, "created view");
        Ok(ctrl)
    }

    pub fn id(&self) -> usize {
        self.0.id
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn kind(&self) -> ControllerKind {
        self.0.kind
    }

    pub fn state(&self) -> State {
        self.0.state.get()
    }

    /// Activating or activated.
    pub fn is_active(&self) -> bool {
        matches!(self.0.state.get(), State::Activating | State::Activated)
    }

    pub fn is_bound(&self) -> bool {
        self.0.is_bound.get()
    }

    pub fn is_released(&self) -> bool {
        self.0.released.get()
    }

    pub fn is_disposed(&self) -> bool {
        self.0.disposed.get()
    }

    pub fn downgrade(&self) -> WeakController {
        WeakController(Rc::downgrade(&self.0))
    }

    pub fn ptr_eq(&self, other: &Controller) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn container(&self) -> &Container {
        &self.0.container
    }

    pub fn dom(&self) -> &Dom {
        self.0.container.dom()
    }

    pub fn view_model(&self) -> Option<Rc<dyn ViewModel>> {
        self.0.view_model.borrow().clone()
    }

    pub fn scope(&self) -> Option<Rc<Scope>> {
        self.0.scope.borrow().clone()
    }

    pub fn compiled(&self) -> Option<Arc<CompiledDefinition>> {
        self.0.compiled.borrow().clone()
    }

    pub fn factory(&self) -> Option<&ViewFactory> {
        self.0.factory.as_ref()
    }

    pub fn captures(&self) -> &[AttrSyntax] {
        &self.0.captures
    }

    pub fn host(&self) -> Option<NodeId> {
        self.0.host.get()
    }

    pub fn shadow_root(&self) -> Option<NodeId> {
        self.0.shadow_root.get()
    }

    pub fn location(&self) -> Option<RenderLocation> {
        self.0.location.get()
    }

    pub fn mount_target(&self) -> MountTarget {
        self.0.mount.get()
    }

    pub fn parent(&self) -> Option<Controller> {
        self.0.parent.borrow().as_ref().and_then(WeakController::upgrade)
    }

    pub fn children(&self) -> Vec<Controller> {
        self.0.children.borrow().clone()
    }

    pub fn bindings_len(&self) -> usize {
        self.0.bindings.borrow().len()
    }

    /// Top-level nodes of this controller's view, mounted or not.
    pub fn child_nodes(&self) -> Vec<NodeId> {
        let nodes = self.0.nodes.borrow();
        match nodes.as_ref() {
            Some(n) => n.child_nodes(&self.dom().doc()),
            None => Vec::new(),
        }
    }

    pub fn add_binding(&self, binding: Rc<dyn Binding>) {
        self.0.bindings.borrow_mut().push(binding);
    }

    pub fn add_child(&self, child: Controller) {
        self.0.children.borrow_mut().push(child);
    }

    /// Mount this view before `location.end`.
    pub fn set_location(&self, location: RenderLocation) {
        self.0.location.set(Some(location));
        self.0.mount.set(MountTarget::Location);
    }

    /// Mount this view as the last children of `host`.
    pub fn set_host(&self, host: NodeId) {
        self.0.host.set(Some(host));
        self.0.mount.set(MountTarget::Host);
    }

    /// Use `scope` for every later activation instead of the one passed in.
    pub fn lock_scope(&self, scope: Rc<Scope>) {
        *self.0.scope.borrow_mut() = Some(scope);
        self.0.locked_scope.set(true);
    }

    /// Mark this view as recyclable once it is unbound.
    pub fn release(&self) {
        self.0.released.set(true);
    }

    pub(crate) fn reuse(&self) {
        self.0.released.set(false);
    }

    fn invalid(&self, operation: &'static str) -> RuntimeError {
        let state = if self.is_disposed() {
            format!("{:?} (disposed)", self.state())
        } else {
            format!("{:?}", self.state())
        };
        RuntimeError::InvalidTransition {
            controller: format!("{}#{}", self.0.name, self.0.id),
            operation,
            state,
        }
    }

    fn initiator(&self) -> Controller {
        self.0
            .initiator
            .borrow()
            .as_ref()
            .and_then(WeakController::upgrade)
            .unwrap_or_else(|| self.clone())
    }

    fn is_initiator(&self) -> bool {
        self.initiator().ptr_eq(self)
    }

    fn with_hook<T>(&self, f: impl FnOnce(&dyn ViewModel, &HookContext<'_>) -> T) -> Option<T> {
        let view_model = self.view_model()?;
        let initiator = self.initiator();
        let parent = self.parent();
        let cx = HookContext {
            controller: self,
            initiator: &initiator,
            parent: parent.as_ref(),
            flags: self.0.flags.get(),
        };
        Some(f(&*view_model, &cx))
    }

    fn outcome(&self) -> HookOutcome {
        match self.0.promise.borrow().as_ref() {
            Some(d) => HookOutcome::Pending(d.clone()),
            None => HookOutcome::Done,
        }
    }

    /// Activate this controller and, through it, its children.
    ///
    /// `scope` is the parent scope for custom elements, the scope itself for
    /// custom attributes and views. Activating under a parent that is not
    /// active is ignored.
    pub fn activate(
        &self,
        initiator: &Controller,
        parent: Option<&Controller>,
        flags: LifecycleFlags,
        scope: Option<Rc<Scope>>,
    ) -> Result<HookOutcome> {
        if self.is_disposed() {
            return Err(self.invalid("activate"));
        }
        match self.state() {
            State::None | State::Deactivated => {
                if let Some(p) = parent {
                    if !p.is_active() {
                        tracing::warn!(
                            controller = self.0.id,
                            parent = p.0.id,
                            "activation ignored, parent is not active"
                        );
                        return Ok(HookOutcome::Done);
                    }
                }
            }
            State::Activated => return Ok(HookOutcome::Done),
            State::Activating | State::Deactivating => return Err(self.invalid("activate")),
        }

        match self.0.kind {
            ControllerKind::CustomElement => {
                if let Some(own) = self.scope() {
                    own.set_parent(scope);
                }
            }
            ControllerKind::CustomAttribute => *self.0.scope.borrow_mut() = scope,
            ControllerKind::Synthetic => {
                if !self.0.locked_scope.get() {
                    match scope {
                        Some(s) => *self.0.scope.borrow_mut() = Some(s),
                        None => return Err(RuntimeError::MissingScope(self.0.name.clone())),
                    }
                }
            }
        }

        self.0.state.set(State::Activating);
        *self.0.parent.borrow_mut() = parent.map(Controller::downgrade);
        *self.0.initiator.borrow_mut() = Some(initiator.downgrade());
        self.0.flags.set(flags | LifecycleFlags::FROM_BIND);
        tracing::debug!(controller = self.0.id, name = %self.0.name, kind = ?self.0.kind, "activating");

        self.enter_activating();
        if let Some(HookOutcome::Pending(d)) = self.with_hook(|vm, cx| vm.binding(cx)) {
            self.ensure_promise();
            let this = self.clone();
            d.on_settled(move |r| match r {
                Ok(()) => this.bind(),
                Err(e) => this.reject(e),
            });
            return Ok(self.outcome());
        }
        self.bind();
        Ok(self.outcome())
    }

    fn bind(&self) {
        if let Some(scope) = self.scope() {
            let bindings = self.0.bindings.borrow().clone();
            for binding in bindings {
                if let Err(err) = binding.bind(&scope) {
                    self.fail(err);
                    return;
                }
            }
        }
        tracing::trace!(controller = self.0.id, "bound");

        if let Some(HookOutcome::Pending(d)) = self.with_hook(|vm, cx| vm.bound(cx)) {
            self.ensure_promise();
            let this = self.clone();
            d.on_settled(move |r| match r {
                Ok(()) => {
                    this.0.is_bound.set(true);
                    this.attach();
                }
                Err(e) => this.reject(e),
            });
            return;
        }
        self.0.is_bound.set(true);
        self.attach();
    }

    fn attach(&self) {
        self.mount_nodes();

        if let Some(HookOutcome::Pending(d)) = self.with_hook(|vm, cx| vm.attaching(cx)) {
            self.ensure_promise();
            self.enter_activating();
            let this = self.clone();
            d.on_settled(move |r| match r {
                Ok(()) => this.leave_activating(),
                Err(e) => this.reject(e),
            });
        }

        let initiator = self.initiator();
        let flags = self.0.flags.get();
        let scope = self.scope();
        for child in self.children() {
            if let Err(err) = child.activate(&initiator, Some(self), flags, scope.clone()) {
                self.fail(err);
            }
        }
        self.leave_activating();
    }

    fn mount_nodes(&self) {
        let dom = self.dom();
        let mut nodes = self.0.nodes.borrow_mut();
        let Some(nodes) = nodes.as_mut() else { return };
        match self.0.mount.get() {
            MountTarget::Host => {
                if let Some(host) = self.0.host.get() {
                    nodes.append_to(dom, host);
                }
            }
            MountTarget::ShadowRoot => {
                if let Some(root) = self.0.shadow_root.get() {
                    nodes.append_to(dom, root);
                }
            }
            MountTarget::Location => {
                if let Some(location) = self.0.location.get() {
                    nodes.insert_before(dom, location.end);
                }
            }
            MountTarget::None => {}
        }
    }

    fn remove_nodes(&self) {
        if let Some(nodes) = self.0.nodes.borrow_mut().as_mut() {
            nodes.remove(self.dom());
        }
    }

    fn enter_activating(&self) {
        self.0.activating.enter();
        if !self.is_initiator() {
            if let Some(parent) = self.parent() {
                parent.enter_activating();
            }
        }
    }

    fn leave_activating(&self) {
        if self.0.activating.leave() {
            if let Some(HookOutcome::Pending(d)) = self.with_hook(|vm, cx| vm.attached(cx)) {
                self.ensure_promise();
                let this = self.clone();
                d.on_settled(move |r| match r {
                    Ok(()) => {
                        this.finish_activation();
                        if !this.is_initiator() {
                            if let Some(parent) = this.parent() {
                                parent.leave_activating();
                            }
                        }
                    }
                    Err(e) => this.reject(e),
                });
                return;
            }
            self.finish_activation();
        }
        if !self.is_initiator() {
            if let Some(parent) = self.parent() {
                parent.leave_activating();
            }
        }
    }

    fn finish_activation(&self) {
        self.0.state.set(State::Activated);
        tracing::debug!(controller = self.0.id, name = %self.0.name, "activated");
        self.resolve();
    }

    /// Deactivate this controller and its subtree.
    ///
    /// Deactivating a controller that is not active is a no-op.
    pub fn deactivate(&self, initiator: &Controller, parent: Option<&Controller>, flags: LifecycleFlags) -> Result<HookOutcome> {
        match self.state() {
            State::Activated => self.0.state.set(State::Deactivating),
            State::None | State::Deactivated => return Ok(HookOutcome::Done),
            State::Activating | State::Deactivating => return Err(self.invalid("deactivate")),
        }
        *self.0.initiator.borrow_mut() = Some(initiator.downgrade());
        if let Some(p) = parent {
            *self.0.parent.borrow_mut() = Some(p.downgrade());
        }
        self.0.flags.set(flags);
        tracing::debug!(controller = self.0.id, name = %self.0.name, "deactivating");

        let is_initiator = initiator.ptr_eq(self);
        if is_initiator {
            self.0.detaching.enter();
        }

        for child in self.children() {
            child.deactivate(initiator, Some(self), flags)?;
        }

        if let Some(HookOutcome::Pending(d)) = self.with_hook(|vm, cx| vm.detaching(cx)) {
            self.ensure_promise();
            initiator.0.detaching.enter();
            let root = initiator.clone();
            d.on_settled(move |r| match r {
                Ok(()) => root.leave_detaching(),
                Err(e) => root.reject(e),
            });
        }

        // Append to the initiator's detach list.
        let tail = initiator.0.tail.borrow_mut().replace(self.clone());
        match tail {
            Some(tail) => *tail.0.next.borrow_mut() = Some(self.clone()),
            None => *initiator.0.head.borrow_mut() = Some(self.clone()),
        }

        if !is_initiator {
            return Ok(HookOutcome::Done);
        }
        self.leave_detaching();
        Ok(self.outcome())
    }

    fn leave_detaching(&self) {
        if !self.0.detaching.leave() {
            return;
        }
        self.0.unbinding.enter();
        let mut cur = self.0.head.borrow().clone();
        while let Some(ctrl) = cur {
            ctrl.remove_nodes();
            if let Some(HookOutcome::Pending(d)) = ctrl.with_hook(|vm, cx| vm.unbinding(cx)) {
                self.ensure_promise();
                self.0.unbinding.enter();
                let this = self.clone();
                d.on_settled(move |r| match r {
                    Ok(()) => this.leave_unbinding(),
                    Err(e) => this.reject(e),
                });
            }
            cur = ctrl.0.next.borrow().clone();
        }
        self.leave_unbinding();
    }

    fn leave_unbinding(&self) {
        if !self.0.unbinding.leave() {
            return;
        }
        let mut cur = self.0.head.borrow_mut().take();
        self.0.tail.borrow_mut().take();
        while let Some(ctrl) = cur {
            if !ctrl.ptr_eq(self) {
                ctrl.0.is_bound.set(false);
                ctrl.unbind();
            }
            cur = ctrl.0.next.borrow_mut().take();
        }
        self.0.is_bound.set(false);
        self.unbind();
    }

    fn unbind(&self) {
        let flags = self.0.flags.get() | LifecycleFlags::FROM_UNBIND;
        let bindings = self.0.bindings.borrow().clone();
        for binding in bindings {
            binding.unbind();
        }
        let is_initiator = self.is_initiator();
        *self.0.parent.borrow_mut() = None;

        match self.0.kind {
            ControllerKind::CustomAttribute => *self.0.scope.borrow_mut() = None,
            ControllerKind::Synthetic => {
                if !self.0.locked_scope.get() {
                    *self.0.scope.borrow_mut() = None;
                }
                if self.is_released() {
                    let cached = self.0.factory.as_ref().is_some_and(|f| f.try_return_to_cache(self));
                    if !cached && is_initiator {
                        self.dispose();
                    }
                }
            }
            ControllerKind::CustomElement => {
                if let Some(scope) = self.scope() {
                    scope.set_parent(None);
                }
            }
        }

        if flags.contains(LifecycleFlags::DISPOSE) && is_initiator {
            self.dispose();
        }
        self.0.state.set(State::Deactivated);
        *self.0.initiator.borrow_mut() = None;
        tracing::debug!(controller = self.0.id, name = %self.0.name, "deactivated");
        self.resolve();
    }

    /// Tear down for good: children, view model, bindings and nodes.
    pub fn dispose(&self) {
        if self.0.disposed.replace(true) {
            return;
        }
        tracing::debug!(controller = self.0.id, name = %self.0.name, "disposing");
        let children = std::mem::take(&mut *self.0.children.borrow_mut());
        for child in children {
            child.dispose();
        }
        if let Some(view_model) = self.0.view_model.borrow_mut().take() {
            view_model.dispose();
        }
        let bindings = std::mem::take(&mut *self.0.bindings.borrow_mut());
        for binding in bindings {
            binding.unbind();
        }
        *self.0.scope.borrow_mut() = None;
        *self.0.nodes.borrow_mut() = None;
        *self.0.context.borrow_mut() = None;
    }

    fn ensure_promise(&self) {
        if self.0.promise.borrow().is_some() {
            return;
        }
        *self.0.promise.borrow_mut() = Some(Deferred::new());
        if !self.is_initiator() {
            if let Some(parent) = self.parent() {
                parent.ensure_promise();
            }
        }
    }

    fn resolve(&self) {
        let promise = self.0.promise.borrow_mut().take();
        if let Some(d) = promise {
            d.resolve();
        }
    }

    /// Reject this controller's pending operation and every ancestor's up
    /// to the initiator. Nothing is rolled back.
    fn reject(&self, err: HookError) {
        tracing::debug!(controller = self.0.id, name = %self.0.name, %err, "lifecycle hook failed");
        let promise = self.0.promise.borrow_mut().take();
        if let Some(d) = promise {
            d.reject(err.clone());
        }
        if !self.is_initiator() {
            if let Some(parent) = self.parent() {
                parent.reject(err);
            }
        }
    }

    fn fail(&self, err: RuntimeError) {
        self.ensure_promise();
        self.reject(HookError::new(err.to_string()));
    }
}

impl fmt::Debug for Controller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Controller")
            .field("id", &self.0.id)
            .field("name", &self.0.name)
            .field("kind", &self.0.kind)
            .field("state", &self.0.state.get())
            .field("disposed", &self.0.disposed.get())
            .finish()
    }
}

/// Turn a lifecycle result into a hook outcome, for view models that
/// activate or deactivate views from inside their own hooks.
pub fn into_outcome(result: Result<HookOutcome>) -> HookOutcome {
    match result {
        Ok(outcome) => outcome,
        Err(err) => HookOutcome::failed(HookError::new(err.to_string())),
    }
}

/// Await a lifecycle outcome.
pub async fn settle(outcome: HookOutcome) -> Settlement {
    match outcome {
        HookOutcome::Done => Ok(()),
        HookOutcome::Pending(d) => d.await,
    }
}
