use std::cell::{Ref, RefCell, RefMut};
use std::rc::{Rc, Weak};

use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use trellis_core::{Object, Observable, Subscription, Value};

use crate::document::{Document, NodeId};
use crate::events::{Event, EventHandler, EventRegistry, ListenerId, run_plan};
use crate::queue::WriteQueue;
use crate::style;

/// Shared handle to the live document plus the services bindings use on it:
/// element property observers, event listeners, a DOM write queue and the
/// per-node component lookup.
#[derive(Clone, Default)]
pub struct Dom {
    doc: Rc<RefCell<Document>>,
    events: Rc<RefCell<EventRegistry>>,
    writes: Rc<WriteQueue>,
    properties: Rc<RefCell<FxHashMap<(NodeId, String), Observable>>>,
    reflectors: Rc<RefCell<Vec<Subscription>>>,
    components: Rc<RefCell<FxHashMap<NodeId, IndexMap<String, Object>>>>,
}

impl Dom {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn doc(&self) -> Ref<'_, Document> {
        self.doc.borrow()
    }

    pub fn doc_mut(&self) -> RefMut<'_, Document> {
        self.doc.borrow_mut()
    }

    pub fn write_queue(&self) -> &WriteQueue {
        &self.writes
    }

    pub fn queue_write(&self, task: impl FnOnce() + 'static) {
        self.writes.queue(task);
    }

    pub fn flush_writes(&self) -> usize {
        self.writes.flush()
    }

    /// Observable backing property `name` of element `node`.
    ///
    /// Properties that mirror markup (`class`, `style`, `id`, `textContent`, ...)
    /// write through to the document whenever they change.
    pub fn property(&self, node: NodeId, name: &str) -> Observable {
        let key = (node, name.to_string());
        if let Some(existing) = self.properties.borrow().get(&key) {
            return existing.clone();
        }
        let obs = Observable::new(self.initial_property_value(node, name));
        if let Some(reflect) = Reflect::for_property(name) {
            let doc: Weak<RefCell<Document>> = Rc::downgrade(&self.doc);
            let sub = obs.subscribe(move |new, _old| {
                if let Some(doc) = doc.upgrade() {
                    reflect.write(&mut doc.borrow_mut(), node, new);
                }
            });
            self.reflectors.borrow_mut().push(sub);
        }
        self.properties.borrow_mut().insert(key, obs.clone());
        obs
    }

    fn initial_property_value(&self, node: NodeId, name: &str) -> Value {
        let doc = self.doc.borrow();
        match Reflect::for_property(name) {
            Some(Reflect::TextContent) => Value::string(doc.text_content(node)),
            Some(Reflect::Attribute(attr)) => doc
                .get_attribute(node, attr)
                .map(Value::string)
                .unwrap_or_default(),
            None => Value::Undefined,
        }
    }

    pub fn set_property(&self, node: NodeId, name: &str, value: Value) {
        self.property(node, name).set_value(value);
    }

    pub fn get_property(&self, node: NodeId, name: &str) -> Value {
        self.property(node, name).get_value()
    }

    pub fn set_attribute(&self, node: NodeId, name: &str, value: &str) {
        self.doc.borrow_mut().set_attribute(node, name, value);
    }

    pub fn remove_attribute(&self, node: NodeId, name: &str) {
        self.doc.borrow_mut().remove_attribute(node, name);
    }

    pub fn toggle_class(&self, node: NodeId, class: &str, on: bool) {
        let mut doc = self.doc.borrow_mut();
        if on {
            doc.add_class(node, class);
        } else {
            doc.remove_class(node, class);
        }
    }

    /// Set (or clear, when `value` is empty) one inline style property.
    pub fn set_style_property(&self, node: NodeId, name: &str, value: &str) {
        let mut updates = IndexMap::new();
        updates.insert(style::kebab_case(name), value.trim().to_string());
        self.merge_style(node, &updates);
    }

    pub fn merge_style(&self, node: NodeId, updates: &IndexMap<String, String>) {
        let mut doc = self.doc.borrow_mut();
        let merged = style::merge_styles(doc.get_attribute(node, "style"), updates);
        if merged.is_empty() {
            doc.remove_attribute(node, "style");
        } else {
            doc.set_attribute(node, "style", merged);
        }
    }

    pub fn add_event_listener(&self, node: NodeId, event: &str, capture: bool, handler: EventHandler) -> ListenerId {
        self.events.borrow_mut().on(node, event, capture, handler)
    }

    pub fn remove_event_listener(&self, id: ListenerId) {
        self.events.borrow_mut().remove(id);
    }

    pub fn listener_count(&self, node: NodeId, event: &str) -> usize {
        self.events.borrow().count(node, event)
    }

    /// Dispatch `name` at `target` through capture and bubble phases.
    pub fn dispatch_event(&self, target: NodeId, name: &str) -> Event {
        let plan = {
            let doc = self.doc.borrow();
            self.events.borrow().dispatch_plan(&doc, name, target)
        };
        let event = Event::new(name, target);
        let invoked = run_plan(&event, plan);
        tracing::trace!(event = name, %target, invoked, "dispatched event");
        event
    }

    /// Record the view-model object of a component hydrated on `node`.
    pub fn register_component(&self, node: NodeId, name: &str, view_model: Object) {
        self.components
            .borrow_mut()
            .entry(node)
            .or_default()
            .insert(name.to_string(), view_model);
    }

    pub fn component(&self, node: NodeId, name: &str) -> Option<Object> {
        self.components.borrow().get(&node)?.get(name).cloned()
    }

    /// The first component registered on `node` (the custom element, if any).
    pub fn first_component(&self, node: NodeId) -> Option<Object> {
        self.components.borrow().get(&node)?.values().next().cloned()
    }
}

#[derive(Clone, Copy)]
enum Reflect {
    TextContent,
    Attribute(&'static str),
}

impl Reflect {
    fn for_property(name: &str) -> Option<Self> {
        Some(match name {
            "textContent" => Reflect::TextContent,
            "class" | "className" => Reflect::Attribute("class"),
            "style" => Reflect::Attribute("style"),
            "htmlFor" => Reflect::Attribute("for"),
            "id" | "title" | "href" | "src" | "alt" | "name" | "placeholder" | "type" | "role" => {
                Reflect::Attribute(static_attr(name)?)
            }
            _ => return None,
        })
    }

    fn write(self, doc: &mut Document, node: NodeId, value: &Value) {
        match self {
            Reflect::TextContent => doc.set_text(node, value.to_display_string()),
            Reflect::Attribute(attr) => {
                if value.is_nullish() {
                    doc.remove_attribute(node, attr);
                } else {
                    doc.set_attribute(node, attr, value.to_display_string());
                }
            }
        }
    }
}

fn static_attr(name: &str) -> Option<&'static str> {
    ["id", "title", "href", "src", "alt", "name", "placeholder", "type", "role"]
        .into_iter()
        .find(|a| *a == name)
}
