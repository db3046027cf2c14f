use std::cell::Cell;
use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::document::{Document, NodeId};

/// Event object handed to listeners during dispatch.
#[derive(Debug)]
pub struct Event {
    pub name: String,
    pub target: NodeId,
    current_target: Cell<NodeId>,
    default_prevented: Cell<bool>,
    propagation_stopped: Cell<bool>,
}

impl Event {
    pub fn new(name: impl Into<String>, target: NodeId) -> Self {
        Self {
            name: name.into(),
            target,
            current_target: Cell::new(target),
            default_prevented: Cell::new(false),
            propagation_stopped: Cell::new(false),
        }
    }

    pub fn current_target(&self) -> NodeId {
        self.current_target.get()
    }

    pub fn prevent_default(&self) {
        self.default_prevented.set(true);
    }

    pub fn default_prevented(&self) -> bool {
        self.default_prevented.get()
    }

    pub fn stop_propagation(&self) {
        self.propagation_stopped.set(true);
    }
}

pub type EventHandler = Rc<dyn Fn(&Event)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

struct Listener {
    id: ListenerId,
    event: String,
    capture: bool,
    handler: EventHandler,
}

/// Per-node event listeners with capture/bubble dispatch.
#[derive(Default)]
pub struct EventRegistry {
    listeners: FxHashMap<NodeId, Vec<Listener>>,
    next_id: u64,
}

impl EventRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(&mut self, node: NodeId, event: impl Into<String>, capture: bool, handler: EventHandler) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.listeners.entry(node).or_default().push(Listener {
            id,
            event: event.into(),
            capture,
            handler,
        });
        id
    }

    pub fn remove(&mut self, id: ListenerId) {
        for list in self.listeners.values_mut() {
            list.retain(|l| l.id != id);
        }
    }

    pub fn count(&self, node: NodeId, event: &str) -> usize {
        self.listeners
            .get(&node)
            .map(|l| l.iter().filter(|x| x.event == event).count())
            .unwrap_or(0)
    }

    /// Handlers to invoke for `event` on `target`, in dispatch order: capture
    /// listeners root-to-target, then bubble listeners target-to-root.
    pub fn dispatch_plan(&self, doc: &Document, event: &str, target: NodeId) -> Vec<(NodeId, EventHandler)> {
        let mut path = vec![target];
        let mut cur = doc.parent(target);
        while let Some(p) = cur {
            path.push(p);
            cur = doc.parent(p);
        }

        let mut plan = Vec::new();
        for node in path.iter().rev() {
            self.collect(*node, event, true, &mut plan);
        }
        for node in &path {
            self.collect(*node, event, false, &mut plan);
        }
        plan
    }

    fn collect(&self, node: NodeId, event: &str, capture: bool, out: &mut Vec<(NodeId, EventHandler)>) {
        if let Some(list) = self.listeners.get(&node) {
            for l in list {
                if l.event == event && l.capture == capture {
                    out.push((node, l.handler.clone()));
                }
            }
        }
    }
}

/// Invoke a dispatch plan. Returns the number of handlers invoked.
pub fn run_plan(event: &Event, plan: Vec<(NodeId, EventHandler)>) -> usize {
    let mut invoked = 0;
    for (node, handler) in plan {
        if event.propagation_stopped.get() {
            break;
        }
        event.current_target.set(node);
        handler(event);
        invoked += 1;
    }
    invoked
}
