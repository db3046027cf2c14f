use std::rc::Rc;
use std::sync::Arc;

use trellis_core::{HookOutcome, Object};
use trellis_dom::{Dom, NodeId, RenderLocation};
use trellis_template::CustomElementDefinition;

use crate::controller::Controller;
use crate::flags::LifecycleFlags;
use crate::view_factory::ViewFactory;

/// Arguments shared by the activation and deactivation hooks.
pub struct HookContext<'a> {
    /// The controller the hook runs for.
    pub controller: &'a Controller,
    /// Where `activate`/`deactivate` was originally called.
    pub initiator: &'a Controller,
    pub parent: Option<&'a Controller>,
    pub flags: LifecycleFlags,
}

/// Behaviour behind a custom element or custom attribute.
///
/// The state object is the binding context: bindables and everything the
/// template reads live there. Every hook is optional. The activation hooks
/// may return [`HookOutcome::Pending`] to suspend the lifecycle until the
/// handle settles.
///
/// A view model that needs its controller later (a template controller
/// reacting to a property change, say) keeps the handle it gets in
/// [`ViewModel::created`], downgraded.
pub trait ViewModel {
    fn state(&self) -> &Object;

    /// May replace the definition before it is compiled.
    fn define(&self, _controller: &Controller, _definition: &Arc<CustomElementDefinition>) -> Option<Arc<CustomElementDefinition>> {
        None
    }

    fn hydrating(&self, _controller: &Controller) {}

    fn hydrated(&self, _controller: &Controller) {}

    fn created(&self, _controller: &Controller) {}

    fn binding(&self, _cx: &HookContext<'_>) -> HookOutcome {
        HookOutcome::Done
    }

    fn bound(&self, _cx: &HookContext<'_>) -> HookOutcome {
        HookOutcome::Done
    }

    fn attaching(&self, _cx: &HookContext<'_>) -> HookOutcome {
        HookOutcome::Done
    }

    fn attached(&self, _cx: &HookContext<'_>) -> HookOutcome {
        HookOutcome::Done
    }

    fn detaching(&self, _cx: &HookContext<'_>) -> HookOutcome {
        HookOutcome::Done
    }

    fn unbinding(&self, _cx: &HookContext<'_>) -> HookOutcome {
        HookOutcome::Done
    }

    fn dispose(&self) {}
}

/// View model with state and no behaviour, used for elements registered
/// without a factory (local templates among them).
#[derive(Debug, Default)]
pub struct StateViewModel {
    state: Object,
}

impl StateViewModel {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ViewModel for StateViewModel {
    fn state(&self) -> &Object {
        &self.state
    }
}

pub struct ElementContext<'a> {
    pub dom: &'a Dom,
    pub host: NodeId,
}

pub struct AttributeContext<'a> {
    pub dom: &'a Dom,
    pub host: NodeId,
    /// Set for template controllers: creates views of the lifted content.
    pub factory: Option<ViewFactory>,
    /// Set for template controllers: where the views go.
    pub location: Option<RenderLocation>,
}

pub type ElementFactory = Rc<dyn Fn(&ElementContext<'_>) -> Rc<dyn ViewModel>>;
pub type AttributeFactory = Rc<dyn Fn(&AttributeContext<'_>) -> Rc<dyn ViewModel>>;
