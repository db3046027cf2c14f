use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use trellis_core::Object;

/// Evaluation scope: a binding context (usually a view model's state), an
/// override context for locals such as `$event` or a repeat item, and an
/// optional parent.
///
/// Lookups walk up through parents but stop at a boundary scope, which is
/// what a custom element's own scope is.
pub struct Scope {
    pub binding_context: Object,
    pub override_context: Object,
    parent: RefCell<Option<Rc<Scope>>>,
    is_boundary: bool,
}

impl Scope {
    /// Root scope of a component. Lookups never leave it.
    pub fn create(binding_context: Object) -> Rc<Scope> {
        Rc::new(Scope {
            binding_context,
            override_context: Object::new(),
            parent: RefCell::new(None),
            is_boundary: true,
        })
    }

    /// Child scope that falls back to `parent` for names it doesn't define.
    pub fn from_parent(parent: &Rc<Scope>, binding_context: Object) -> Rc<Scope> {
        Rc::new(Scope {
            binding_context,
            override_context: Object::new(),
            parent: RefCell::new(Some(parent.clone())),
            is_boundary: false,
        })
    }

    pub fn parent(&self) -> Option<Rc<Scope>> {
        self.parent.borrow().clone()
    }

    pub fn set_parent(&self, parent: Option<Rc<Scope>>) {
        *self.parent.borrow_mut() = parent;
    }

    pub fn is_boundary(&self) -> bool {
        self.is_boundary
    }

    /// The scope `ancestor` levels up (`$parent`), or `None` past the root.
    pub fn ancestor(self: &Rc<Self>, ancestor: u32) -> Option<Rc<Scope>> {
        let mut cur = self.clone();
        for _ in 0..ancestor {
            cur = cur.parent()?;
        }
        Some(cur)
    }

    /// The object that owns `name` as seen from this scope.
    ///
    /// Override contexts shadow binding contexts. When nothing up to the
    /// boundary defines `name`, the current binding context is the owner so
    /// that assignments create the property there.
    pub fn context_for(self: &Rc<Self>, name: &str, ancestor: u32) -> Option<Object> {
        if ancestor > 0 {
            let target = self.ancestor(ancestor)?;
            if target.override_context.has(name) {
                return Some(target.override_context.clone());
            }
            return Some(target.binding_context.clone());
        }

        let mut cur = Some(self.clone());
        while let Some(scope) = cur {
            if scope.override_context.has(name) {
                return Some(scope.override_context.clone());
            }
            if scope.binding_context.has(name) {
                return Some(scope.binding_context.clone());
            }
            if scope.is_boundary {
                break;
            }
            cur = scope.parent();
        }
        Some(self.binding_context.clone())
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("binding_context", &self.binding_context)
            .field("boundary", &self.is_boundary)
            .field("has_parent", &self.parent.borrow().is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trellis_core::Value;

    #[test]
    fn lookup_prefers_override_then_walks_parents() {
        let root = Scope::create(Object::from_pairs([("name", Value::from("root")), ("shared", 1.into())]));
        let child = Scope::from_parent(&root, Object::from_pairs([("name", Value::from("child"))]));
        child.override_context.set("item", Value::from("x"));

        assert!(child.context_for("item", 0).unwrap().ptr_eq(&child.override_context));
        assert!(child.context_for("name", 0).unwrap().ptr_eq(&child.binding_context));
        assert!(child.context_for("shared", 0).unwrap().ptr_eq(&root.binding_context));
        assert!(child.context_for("name", 1).unwrap().ptr_eq(&root.binding_context));
        assert!(child.context_for("name", 2).is_none());
    }

    #[test]
    fn boundary_stops_lookup() {
        let outer = Scope::create(Object::from_pairs([("secret", Value::from(true))]));
        let inner = Scope::create(Object::new());
        inner.set_parent(Some(outer.clone()));

        let owner = inner.context_for("secret", 0).unwrap();
        assert!(owner.ptr_eq(&inner.binding_context));
        // `$parent` still crosses the boundary explicitly.
        assert!(inner.context_for("secret", 1).unwrap().ptr_eq(&outer.binding_context));
    }
}
