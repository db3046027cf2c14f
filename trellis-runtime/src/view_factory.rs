use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use trellis_template::CompiledDefinition;

use crate::container::RenderContext;
use crate::controller::Controller;
use crate::error::Result;

/// Creates synthetic views of one compiled definition, for template
/// controllers and slots.
///
/// Views that are released and unbound come back through
/// [`ViewFactory::try_return_to_cache`] and are handed out again by
/// [`ViewFactory::create`] while the cache has room.
#[derive(Clone)]
pub struct ViewFactory(Rc<FactoryInner>);

struct FactoryInner {
    name: String,
    context: RenderContext,
    cache: RefCell<Vec<Controller>>,
    cache_size: Cell<usize>,
}

impl ViewFactory {
    pub fn new(name: &str, context: RenderContext) -> Self {
        Self(Rc::new(FactoryInner {
            name: name.to_string(),
            context,
            cache: RefCell::new(Vec::new()),
            cache_size: Cell::new(0),
        }))
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn context(&self) -> &RenderContext {
        &self.0.context
    }

    pub fn definition(&self) -> &Arc<CompiledDefinition> {
        self.0.context.definition()
    }

    /// A recycled view when one is cached, otherwise a freshly hydrated one.
    pub fn create(&self) -> Result<Controller> {
        loop {
            let cached = self.0.cache.borrow_mut().pop();
            match cached {
                Some(view) if view.is_disposed() => continue,
                Some(view) => {
                    view.reuse();
                    tracing::trace!(factory = %self.0.name, id = view.id(), "reusing cached view");
                    return Ok(view);
                }
                None => return Controller::for_synthetic_view(self),
            }
        }
    }

    /// Allow up to `size` views to be cached. A smaller size drops the
    /// excess right away.
    pub fn set_cache_size(&self, size: usize) {
        self.0.cache_size.set(size);
        let mut cache = self.0.cache.borrow_mut();
        while cache.len() > size {
            if let Some(view) = cache.pop() {
                view.dispose();
            }
        }
    }

    pub fn cache_size(&self) -> usize {
        self.0.cache_size.get()
    }

    pub fn cached(&self) -> usize {
        self.0.cache.borrow().len()
    }

    pub fn try_return_to_cache(&self, view: &Controller) -> bool {
        let mut cache = self.0.cache.borrow_mut();
        if cache.len() < self.0.cache_size.get() {
            cache.push(view.clone());
            true
        } else {
            false
        }
    }
}

impl fmt::Debug for ViewFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewFactory")
            .field("name", &self.0.name)
            .field("cached", &self.cached())
            .field("cache_size", &self.cache_size())
            .finish()
    }
}
