//! Bindings connect an expression evaluated in a [`Scope`] to a target:
//! an element property, a view-model property, an attribute, a listener.
//!
//! The first value is written synchronously while binding. Later changes to
//! DOM targets go through the platform write queue.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use trellis_core::{Func, Object, Observable, Subscription, Value};
use trellis_dom::{Dom, Event, ListenerId, NodeId};
use trellis_template::{BindingMode, Expression};

use crate::ast::{assign, evaluate, evaluate_observed};
use crate::error::Result;
use crate::scope::Scope;

pub trait Binding {
    fn bind(&self, scope: &Rc<Scope>) -> Result<()>;
    fn unbind(&self);
    fn is_bound(&self) -> bool;
}

/// Re-evaluates an expression whenever a property it read changes, and
/// hands the value to `on_value` (`initial` is true for the first run).
struct ExprObserver {
    expression: Expression,
    scope: Rc<Scope>,
    subscriptions: RefCell<Vec<Subscription>>,
    active: Cell<bool>,
    on_value: Box<dyn Fn(&Rc<Scope>, Value, bool)>,
}

impl ExprObserver {
    fn start(
        expression: Expression,
        scope: Rc<Scope>,
        on_value: impl Fn(&Rc<Scope>, Value, bool) + 'static,
    ) -> Rc<Self> {
        let observer = Rc::new(Self {
            expression,
            scope,
            subscriptions: RefCell::new(Vec::new()),
            active: Cell::new(true),
            on_value: Box::new(on_value),
        });
        observer.run(true);
        observer
    }

    fn run(self: &Rc<Self>, initial: bool) {
        if !self.active.get() {
            return;
        }
        let mut deps = Vec::new();
        let value = evaluate_observed(self.expression.ast(), &self.scope, &mut deps);
        let subscriptions: Vec<Subscription> = deps
            .iter()
            .map(|dep| {
                let weak = Rc::downgrade(self);
                dep.subscribe(move |_, _| {
                    if let Some(observer) = weak.upgrade() {
                        observer.run(false);
                    }
                })
            })
            .collect();
        let stale = std::mem::replace(&mut *self.subscriptions.borrow_mut(), subscriptions);
        drop(stale);
        (self.on_value)(&self.scope, value, initial);
    }

    fn stop(&self) {
        self.active.set(false);
        self.subscriptions.borrow_mut().clear();
    }
}

/// Observable cell behind `name` on a node or a view model.
pub fn target_property(dom: &Dom, target: &BindingTarget, name: &str) -> Observable {
    match target {
        BindingTarget::Node(node) => dom.property(*node, name),
        BindingTarget::Component(state) => state.property(name),
    }
}

/// What a binding writes into.
#[derive(Debug, Clone)]
pub enum BindingTarget {
    Node(NodeId),
    /// A custom element or attribute's state object.
    Component(Object),
}

impl BindingTarget {
    pub fn node(&self) -> Option<NodeId> {
        match self {
            BindingTarget::Node(n) => Some(*n),
            BindingTarget::Component(_) => None,
        }
    }

    fn is_node(&self) -> bool {
        matches!(self, BindingTarget::Node(_))
    }
}

#[derive(Default)]
struct Connection {
    scope: Option<Rc<Scope>>,
    observer: Option<Rc<ExprObserver>>,
    target_subscription: Option<Subscription>,
}

impl Connection {
    fn clear(&mut self) {
        if let Some(observer) = self.observer.take() {
            observer.stop();
        }
        self.target_subscription = None;
        self.scope = None;
    }
}

/// `prop.bind`, `prop.two-way` and friends.
pub struct PropertyBinding {
    dom: Dom,
    expression: Expression,
    target: Observable,
    mode: BindingMode,
    queued: bool,
    connection: RefCell<Connection>,
}

impl PropertyBinding {
    pub fn new(dom: &Dom, expression: Expression, target: &BindingTarget, property: &str, mode: BindingMode) -> Self {
        Self {
            dom: dom.clone(),
            expression,
            target: target_property(dom, target, property),
            mode: mode.or(BindingMode::ToView),
            queued: target.is_node(),
            connection: RefCell::new(Connection::default()),
        }
    }
}

impl Binding for PropertyBinding {
    fn bind(&self, scope: &Rc<Scope>) -> Result<()> {
        self.unbind();
        let mut connection = Connection {
            scope: Some(scope.clone()),
            ..Connection::default()
        };

        match self.mode {
            BindingMode::OneTime => {
                self.target.set_value(evaluate(self.expression.ast(), scope));
            }
            BindingMode::ToView | BindingMode::TwoWay | BindingMode::Default => {
                let target = self.target.clone();
                let dom = self.dom.clone();
                let queued = self.queued;
                connection.observer = Some(ExprObserver::start(
                    self.expression.clone(),
                    scope.clone(),
                    move |_, value, initial| {
                        if initial || !queued {
                            target.set_value(value);
                        } else {
                            let target = target.clone();
                            dom.queue_write(move || target.set_value(value));
                        }
                    },
                ));
            }
            BindingMode::FromView => {
                assign(&self.expression, scope, self.target.get_value())?;
            }
        }

        if matches!(self.mode, BindingMode::FromView | BindingMode::TwoWay) {
            let expression = self.expression.clone();
            let scope = scope.clone();
            connection.target_subscription = Some(self.target.subscribe(move |new, _| {
                if let Err(err) = assign(&expression, &scope, new.clone()) {
                    tracing::warn!(%err, "from-view update dropped");
                }
            }));
        }

        *self.connection.borrow_mut() = connection;
        Ok(())
    }

    fn unbind(&self) {
        // Take first so that dropping subscriptions cannot re-enter a live borrow.
        let mut connection = std::mem::take(&mut *self.connection.borrow_mut());
        connection.clear();
    }

    fn is_bound(&self) -> bool {
        self.connection.borrow().scope.is_some()
    }
}

impl fmt::Debug for PropertyBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyBinding")
            .field("expression", &self.expression.source())
            .field("mode", &self.mode)
            .finish()
    }
}

type Apply = Rc<dyn Fn(&Rc<Scope>, Value)>;

/// One-directional binding that pushes every value of an expression into an
/// arbitrary sink: interpolations, text nodes, attributes, styles, lets.
pub struct ToViewBinding {
    kind: &'static str,
    dom: Dom,
    expression: Expression,
    queued: bool,
    apply: Apply,
    connection: RefCell<Connection>,
}

impl ToViewBinding {
    pub fn new(
        kind: &'static str,
        dom: &Dom,
        expression: Expression,
        queued: bool,
        apply: impl Fn(&Rc<Scope>, Value) + 'static,
    ) -> Self {
        Self {
            kind,
            dom: dom.clone(),
            expression,
            queued,
            apply: Rc::new(apply),
            connection: RefCell::new(Connection::default()),
        }
    }

    /// `${...}` into a node or view-model property, always as a string.
    pub fn interpolation(dom: &Dom, expression: Expression, target: &BindingTarget, property: &str) -> Self {
        let cell = target_property(dom, target, property);
        Self::new("interpolation", dom, expression, target.is_node(), move |_, v| {
            cell.set_value(Value::string(v.to_display_string()))
        })
    }

    /// Content of an interpolated text node.
    pub fn text(dom: &Dom, expression: Expression, node: NodeId) -> Self {
        let cell = dom.property(node, "textContent");
        Self::new("text", dom, expression, true, move |_, v| {
            cell.set_value(Value::string(v.to_display_string()))
        })
    }

    /// `name.attr="..."` (remove on nullish or `false`) and `name.class="cond"`.
    pub fn attribute(dom: &Dom, expression: Expression, node: NodeId, attr: &str, to: &str) -> Self {
        let platform = dom.clone();
        let attr = attr.to_string();
        let to = to.to_string();
        Self::new("attribute", dom, expression, true, move |_, v| {
            if attr == "class" {
                platform.toggle_class(node, &to, v.is_truthy());
            } else if v.is_nullish() || v == Value::Bool(false) {
                platform.remove_attribute(node, &to);
            } else {
                platform.set_attribute(node, &to, &v.to_display_string());
            }
        })
    }

    pub fn style(dom: &Dom, expression: Expression, node: NodeId, property: &str) -> Self {
        let platform = dom.clone();
        let property = property.to_string();
        Self::new("style", dom, expression, true, move |_, v| {
            platform.set_style_property(node, &property, &v.to_display_string());
        })
    }

    /// `<let>` locals: into the binding context or the override context.
    pub fn let_value(dom: &Dom, expression: Expression, to: &str, to_binding_context: bool) -> Self {
        let to = to.to_string();
        Self::new("let", dom, expression, false, move |scope, v| {
            let owner = if to_binding_context {
                &scope.binding_context
            } else {
                &scope.override_context
            };
            owner.set(to.clone(), v);
        })
    }

    /// `items.for="item of list"`: the iterable goes to `to`, the local
    /// name to the `local` property of the same view model.
    pub fn iterator(dom: &Dom, expression: Expression, state: &Object, to: &str) -> Self {
        if let trellis_template::Expr::ForOf { declaration, .. } = expression.ast() {
            state.set("local", Value::string(declaration));
        }
        let cell = state.property(to);
        Self::new("iterator", dom, expression, false, move |_, v| cell.set_value(v))
    }
}

impl Binding for ToViewBinding {
    fn bind(&self, scope: &Rc<Scope>) -> Result<()> {
        self.unbind();
        let apply = self.apply.clone();
        let dom = self.dom.clone();
        let queued = self.queued;
        let observer = ExprObserver::start(self.expression.clone(), scope.clone(), move |scope, value, initial| {
            if initial || !queued {
                apply(scope, value);
            } else {
                let apply = apply.clone();
                let scope = scope.clone();
                dom.queue_write(move || apply(&scope, value));
            }
        });
        *self.connection.borrow_mut() = Connection {
            scope: Some(scope.clone()),
            observer: Some(observer),
            target_subscription: None,
        };
        Ok(())
    }

    fn unbind(&self) {
        let mut connection = std::mem::take(&mut *self.connection.borrow_mut());
        connection.clear();
    }

    fn is_bound(&self) -> bool {
        self.connection.borrow().scope.is_some()
    }
}

impl fmt::Debug for ToViewBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToViewBinding")
            .field("kind", &self.kind)
            .field("expression", &self.expression.source())
            .finish()
    }
}

/// `event.trigger` / `.capture` / `.delegate`. The event is visible to the
/// handler expression as `$event`.
pub struct ListenerBinding {
    dom: Dom,
    expression: Expression,
    node: NodeId,
    event: String,
    capture: bool,
    prevent_default: bool,
    listener: RefCell<Option<ListenerId>>,
}

impl ListenerBinding {
    pub fn new(dom: &Dom, expression: Expression, node: NodeId, event: &str, capture: bool, prevent_default: bool) -> Self {
        Self {
            dom: dom.clone(),
            expression,
            node,
            event: event.to_string(),
            capture,
            prevent_default,
            listener: RefCell::new(None),
        }
    }
}

impl Binding for ListenerBinding {
    fn bind(&self, scope: &Rc<Scope>) -> Result<()> {
        self.unbind();
        let expression = self.expression.clone();
        let scope = scope.clone();
        let prevent_default = self.prevent_default;
        let handler = Rc::new(move |event: &Event| {
            let details = Object::from_pairs([
                ("type", Value::string(&event.name)),
                ("target", Value::Node(event.target.0)),
            ]);
            scope.override_context.set("$event", Value::Object(details));
            let result = evaluate(expression.ast(), &scope);
            scope.override_context.remove("$event");
            if prevent_default && result != Value::Bool(true) {
                event.prevent_default();
            }
        });
        let id = self.dom.add_event_listener(self.node, &self.event, self.capture, handler);
        *self.listener.borrow_mut() = Some(id);
        Ok(())
    }

    fn unbind(&self) {
        if let Some(id) = self.listener.borrow_mut().take() {
            self.dom.remove_event_listener(id);
        }
    }

    fn is_bound(&self) -> bool {
        self.listener.borrow().is_some()
    }
}

impl fmt::Debug for ListenerBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerBinding")
            .field("event", &self.event)
            .field("expression", &self.expression.source())
            .finish()
    }
}

/// `ref="name"`: assigns the node or view model to a scope property and
/// clears it again on unbind.
pub struct RefBinding {
    expression: Expression,
    value: Value,
    scope: RefCell<Option<Rc<Scope>>>,
}

impl RefBinding {
    pub fn new(expression: Expression, value: Value) -> Self {
        Self {
            expression,
            value,
            scope: RefCell::new(None),
        }
    }
}

impl Binding for RefBinding {
    fn bind(&self, scope: &Rc<Scope>) -> Result<()> {
        assign(&self.expression, scope, self.value.clone())?;
        *self.scope.borrow_mut() = Some(scope.clone());
        Ok(())
    }

    fn unbind(&self) {
        let Some(scope) = self.scope.borrow_mut().take() else { return };
        if evaluate(self.expression.ast(), &scope) == self.value {
            let _ = assign(&self.expression, &scope, Value::Undefined);
        }
    }

    fn is_bound(&self) -> bool {
        self.scope.borrow().is_some()
    }
}

impl fmt::Debug for RefBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefBinding").field("expression", &self.expression.source()).finish()
    }
}

/// `prop.call="fn(arg)"`: the target receives a function that evaluates the
/// expression. Fields of an object passed as the first argument become
/// locals of the call.
pub struct CallBinding {
    expression: Expression,
    target: Observable,
    bound: Cell<bool>,
}

impl CallBinding {
    pub fn new(dom: &Dom, expression: Expression, target: &BindingTarget, property: &str) -> Self {
        Self {
            expression,
            target: target_property(dom, target, property),
            bound: Cell::new(false),
        }
    }
}

impl Binding for CallBinding {
    fn bind(&self, scope: &Rc<Scope>) -> Result<()> {
        let expression = self.expression.clone();
        let scope = scope.clone();
        let call = Func::new(move |args| {
            if let Some(Value::Object(locals)) = args.first() {
                for key in locals.keys() {
                    scope.override_context.set(key.clone(), locals.get(&key));
                }
            }
            evaluate(expression.ast(), &scope)
        });
        self.target.set_value(Value::Function(call));
        self.bound.set(true);
        Ok(())
    }

    fn unbind(&self) {
        if self.bound.replace(false) {
            self.target.set_value(Value::Undefined);
        }
    }

    fn is_bound(&self) -> bool {
        self.bound.get()
    }
}

impl fmt::Debug for CallBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallBinding").field("expression", &self.expression.source()).finish()
    }
}
