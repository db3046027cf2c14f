use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use trellis_core::HookOutcome;
use trellis_dom::NodeId;
use trellis_template::CustomElementDefinition;

use crate::container::Container;
use crate::controller::{Controller, ElementOptions};
use crate::error::Result;
use crate::flags::LifecycleFlags;
use crate::view_model::ViewModel;

/// Root of an application: hydrates one component on a host node and
/// drives its activation.
pub struct App {
    container: Container,
    root: RefCell<Option<Controller>>,
}

impl App {
    pub fn new(container: Container) -> Self {
        Self {
            container,
            root: RefCell::new(None),
        }
    }

    pub fn container(&self) -> &Container {
        &self.container
    }

    pub fn root(&self) -> Option<Controller> {
        self.root.borrow().clone()
    }

    /// Hydrate and activate `definition` on `host`.
    pub fn start(
        &self,
        host: NodeId,
        definition: Arc<CustomElementDefinition>,
        view_model: Rc<dyn ViewModel>,
    ) -> Result<HookOutcome> {
        let root = Controller::for_custom_element(&self.container, view_model, host, definition, ElementOptions::default())?;
        *self.root.borrow_mut() = Some(root.clone());
        tracing::debug!(root = root.id(), name = root.name(), "starting app");
        root.activate(&root, None, LifecycleFlags::NONE, None)
    }

    /// Deactivate the root and dispose it once unbound.
    pub fn stop(&self) -> Result<HookOutcome> {
        let root = self.root.borrow_mut().take();
        let Some(root) = root else {
            return Ok(HookOutcome::Done);
        };
        tracing::debug!(root = root.id(), "stopping app");
        root.deactivate(&root, None, LifecycleFlags::DISPOSE)
    }
}
