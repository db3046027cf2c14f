//! Template runtime: scopes and bindings, the renderer dispatch table,
//! view factories and the controller lifecycle.
//!
//! ```ignore
//! let container = Container::new(Dom::new());
//! let app = App::new(container.clone());
//! let host = container.dom().doc_mut().create_element("app");
//! let outcome = app.start(host, definition, Rc::new(StateViewModel::new()))?;
//! ```

pub mod app;
pub mod ast;
pub mod bindings;
pub mod container;
pub mod controller;
pub mod error;
pub mod flags;
pub mod renderer;
pub mod scope;
pub mod slot;
pub mod view_factory;
pub mod view_model;

pub use app::App;
pub use bindings::{Binding, BindingTarget};
pub use container::{Container, RenderContext};
pub use controller::{
    Controller, ControllerKind, ElementOptions, MountTarget, State, WeakController, into_outcome, settle,
};
pub use error::{Result, RuntimeError};
pub use flags::LifecycleFlags;
pub use renderer::{Renderer, RendererTable, RendererTableBuilder};
pub use scope::Scope;
pub use slot::AuSlot;
pub use view_factory::ViewFactory;
pub use view_model::{AttributeContext, ElementContext, HookContext, StateViewModel, ViewModel};
