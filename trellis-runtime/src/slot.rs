use std::rc::Rc;
use std::sync::{Arc, OnceLock};

use trellis_core::{HookOutcome, Object};
use trellis_dom::NodeId;
use trellis_template::binder::AU_SLOT;
use trellis_template::{CustomElementDefinition, SlotInfo, SlotKind};

use crate::container::RenderContext;
use crate::controller::{Controller, ElementOptions, into_outcome};
use crate::error::Result;
use crate::view_factory::ViewFactory;
use crate::view_model::{HookContext, ViewModel};

fn au_slot_definition() -> Arc<CustomElementDefinition> {
    static DEF: OnceLock<Arc<CustomElementDefinition>> = OnceLock::new();
    DEF.get_or_init(|| CustomElementDefinition::builder(AU_SLOT).containerless().build())
        .clone()
}

/// Renders slot content in place of an `<au-slot>`.
///
/// Projected content is evaluated in the scope of the markup that supplied
/// it; fallback content in the scope of the element owning the slot.
pub struct AuSlot {
    state: Object,
    kind: SlotKind,
    view: Controller,
}

impl AuSlot {
    pub fn view(&self) -> &Controller {
        &self.view
    }
}

impl ViewModel for AuSlot {
    fn state(&self) -> &Object {
        &self.state
    }

    fn created(&self, controller: &Controller) {
        if let Some(location) = controller.location() {
            self.view.set_location(location);
        }
    }

    fn binding(&self, cx: &HookContext<'_>) -> HookOutcome {
        // Own scope -> owning element's scope -> the consumer's scope.
        let owner = cx.controller.scope().and_then(|s| s.parent());
        let scope = match self.kind {
            SlotKind::Projection => owner.and_then(|s| s.parent()),
            SlotKind::Fallback => owner,
        };
        if let Some(scope) = scope {
            self.view.lock_scope(scope);
        }
        HookOutcome::Done
    }

    fn attaching(&self, cx: &HookContext<'_>) -> HookOutcome {
        into_outcome(self.view.activate(cx.initiator, Some(cx.controller), cx.flags, None))
    }

    fn detaching(&self, cx: &HookContext<'_>) -> HookOutcome {
        into_outcome(self.view.deactivate(cx.initiator, Some(cx.controller), cx.flags))
    }

    fn dispose(&self) {
        self.view.dispose();
    }
}

/// Hydrate an `<au-slot>` target as a containerless element whose view is
/// the slot's content.
pub(crate) fn hydrate_slot(context: &RenderContext, host: NodeId, info: &SlotInfo) -> Result<Controller> {
    let factory = ViewFactory::new(&info.name, context.child(info.content.clone()));
    let view = factory.create()?;
    let view_model = Rc::new(AuSlot {
        state: Object::new(),
        kind: info.kind,
        view,
    });
    tracing::trace!(slot = %info.name, kind = ?info.kind, "hydrating au-slot");
    Controller::for_custom_element(
        context.container(),
        view_model,
        host,
        au_slot_definition(),
        ElementOptions {
            containerless: true,
            context: Some(context.clone()),
            ..ElementOptions::default()
        },
    )
}
