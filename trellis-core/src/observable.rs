// trellis-core/src/observable.rs

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use crate::value::Value;

type Callback = Rc<dyn Fn(&Value, &Value)>;

struct Inner {
    value: RefCell<Value>,
    subscribers: RefCell<Vec<(u64, Callback)>>,
    next_id: Cell<u64>,
}

/// An observable property cell: `get_value`/`set_value` plus change subscription.
///
/// Subscribers are called with `(new, old)` after the value changed. Setting an
/// equal value does not notify.
#[derive(Clone)]
pub struct Observable(Rc<Inner>);

impl Observable {
    pub fn new(initial: Value) -> Self {
        Self(Rc::new(Inner {
            value: RefCell::new(initial),
            subscribers: RefCell::new(Vec::new()),
            next_id: Cell::new(0),
        }))
    }

    pub fn get_value(&self) -> Value {
        self.0.value.borrow().clone()
    }

    pub fn set_value(&self, new: Value) {
        let old = {
            let mut slot = self.0.value.borrow_mut();
            if *slot == new {
                return;
            }
            std::mem::replace(&mut *slot, new.clone())
        };

        // Snapshot subscribers so callbacks may subscribe/unsubscribe or set
        // this observable again without a live borrow.
        let subscribers: Vec<Callback> = self
            .0
            .subscribers
            .borrow()
            .iter()
            .map(|(_, cb)| cb.clone())
            .collect();
        for cb in subscribers {
            cb(&new, &old);
        }
    }

    /// Register `callback`; it stays registered until the returned
    /// [`Subscription`] is dropped or unsubscribed.
    pub fn subscribe(&self, callback: impl Fn(&Value, &Value) + 'static) -> Subscription {
        let id = self.0.next_id.get();
        self.0.next_id.set(id + 1);
        self.0.subscribers.borrow_mut().push((id, Rc::new(callback)));
        Subscription {
            target: Rc::downgrade(&self.0),
            id,
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.0.subscribers.borrow().len()
    }

    pub fn ptr_eq(&self, other: &Observable) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Observable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Observable").field(&self.get_value()).finish()
    }
}

/// Handle returned by [`Observable::subscribe`]. Dropping it unsubscribes.
pub struct Subscription {
    target: Weak<Inner>,
    id: u64,
}

impl Subscription {
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.target.upgrade() {
            inner.subscribers.borrow_mut().retain(|(id, _)| *id != self.id);
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Subscription({})", self.id)
    }
}
