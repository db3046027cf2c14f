use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use pollster::block_on;
use trellis_core::{Deferred, HookError, HookOutcome, Object};
use trellis_dom::{Dom, NodeId};
use trellis_runtime::*;
use trellis_template::CustomElementDefinition;

type Log = Rc<RefCell<Vec<String>>>;

/// Records every lifecycle hook and suspends the ones it was told to.
struct Probe {
    name: &'static str,
    state: Object,
    log: Log,
    gates: RefCell<Vec<(&'static str, Deferred)>>,
}

impl Probe {
    fn new(name: &'static str, log: &Log) -> Rc<Self> {
        Rc::new(Self {
            name,
            state: Object::new(),
            log: log.clone(),
            gates: RefCell::new(Vec::new()),
        })
    }

    fn suspend(&self, hook: &'static str) -> Deferred {
        let gate = Deferred::new();
        self.gates.borrow_mut().push((hook, gate.clone()));
        gate
    }

    fn record(&self, hook: &'static str) -> HookOutcome {
        self.log.borrow_mut().push(format!("{}.{hook}", self.name));
        self.gates
            .borrow()
            .iter()
            .find(|(h, _)| *h == hook)
            .map(|(_, gate)| HookOutcome::Pending(gate.clone()))
            .unwrap_or(HookOutcome::Done)
    }
}

impl ViewModel for Probe {
    fn state(&self) -> &Object {
        &self.state
    }

    fn binding(&self, _cx: &HookContext<'_>) -> HookOutcome {
        self.record("binding")
    }

    fn bound(&self, _cx: &HookContext<'_>) -> HookOutcome {
        self.record("bound")
    }

    fn attaching(&self, _cx: &HookContext<'_>) -> HookOutcome {
        self.record("attaching")
    }

    fn attached(&self, _cx: &HookContext<'_>) -> HookOutcome {
        self.record("attached")
    }

    fn detaching(&self, _cx: &HookContext<'_>) -> HookOutcome {
        self.record("detaching")
    }

    fn unbinding(&self, _cx: &HookContext<'_>) -> HookOutcome {
        self.record("unbinding")
    }
}

/// An `app` element whose template holds one custom element per name.
struct Tree {
    container: Container,
    app: App,
    def: Arc<CustomElementDefinition>,
    root: Rc<Probe>,
    children: Vec<Rc<Probe>>,
    log: Log,
}

fn register(container: &Container, log: &Log, name: &'static str, markup: &str) -> Rc<Probe> {
    let probe = Probe::new(name, log);
    let vm = probe.clone();
    let def = CustomElementDefinition::builder(name).template(markup).build();
    container.register_element(def, move |_| vm.clone() as Rc<dyn ViewModel>);
    probe
}

fn assemble(container: Container, log: Log, markup: &str, children: Vec<Rc<Probe>>) -> Tree {
    let def = CustomElementDefinition::builder("app").template(markup).build();
    Tree {
        app: App::new(container.clone()),
        container,
        def,
        root: Probe::new("app", &log),
        children,
        log,
    }
}

/// Siblings: `app > (name, name, ...)`.
fn tree(names: &[&'static str]) -> Tree {
    let log = Log::default();
    let container = Container::new(Dom::new());
    let mut markup = String::new();
    let mut children = Vec::new();
    for &name in names {
        children.push(register(&container, &log, name, &format!("<span>{name}</span>")));
        markup.push_str(&format!("<{name}></{name}>"));
    }
    assemble(container, log, &markup, children)
}

/// Nested: `app > names[0] > names[1] > ...`.
fn chain(names: &[&'static str]) -> Tree {
    let log = Log::default();
    let container = Container::new(Dom::new());
    let mut children = Vec::new();
    for (i, &name) in names.iter().enumerate() {
        let inner = names.get(i + 1).map(|n| format!("<{n}></{n}>")).unwrap_or_default();
        children.push(register(&container, &log, name, &format!("<span>{name}</span>{inner}")));
    }
    let markup = names.first().map(|n| format!("<{n}></{n}>")).unwrap_or_default();
    assemble(container, log, &markup, children)
}

impl Tree {
    fn host(&self) -> NodeId {
        self.container.dom().doc_mut().create_element("app")
    }

    fn start(&self) -> Result<HookOutcome> {
        let host = self.host();
        self.app.start(host, self.def.clone(), self.root.clone())
    }

    fn hydrate(&self) -> (Controller, NodeId) {
        let host = self.host();
        let root = Controller::for_custom_element(
            &self.container,
            self.root.clone(),
            host,
            self.def.clone(),
            ElementOptions::default(),
        )
        .unwrap();
        (root, host)
    }

    fn hooks(&self, hook: &str) -> Vec<String> {
        let suffix = format!(".{hook}");
        self.log.borrow().iter().filter(|e| e.ends_with(&suffix)).cloned().collect()
    }

    fn logged(&self, entry: &str) -> bool {
        self.log.borrow().iter().any(|e| e == entry)
    }

    fn text(&self, node: NodeId) -> String {
        self.container.dom().doc().text_content(node)
    }
}

#[test]
fn synchronous_activation_runs_hooks_in_order() {
    let t = tree(&["x-a"]);
    let outcome = t.start().unwrap();
    assert!(outcome.is_done());

    let expected = [
        "app.binding",
        "app.bound",
        "app.attaching",
        "x-a.binding",
        "x-a.bound",
        "x-a.attaching",
        "x-a.attached",
        "app.attached",
    ];
    assert_eq!(*t.log.borrow(), expected);

    let root = t.app.root().unwrap();
    assert_eq!(root.state(), State::Activated);
    assert!(root.is_bound());
    assert_eq!(root.children()[0].state(), State::Activated);
}

#[test]
fn attached_waits_for_pending_child_attaching() {
    let t = tree(&["x-a", "x-b"]);
    let gate = t.children[1].suspend("attaching");

    let outcome = t.start().unwrap();
    assert!(!outcome.is_done());

    let root = t.app.root().unwrap();
    assert_eq!(root.state(), State::Activating);
    assert!(t.logged("x-a.attached"));
    assert!(!t.logged("x-b.attached"));
    assert!(!t.logged("app.attached"));

    gate.resolve();
    assert_eq!(root.state(), State::Activated);
    assert_eq!(t.hooks("attached"), ["x-a.attached", "x-b.attached", "app.attached"]);
    assert_eq!(block_on(settle(outcome)), Ok(()));
}

#[test]
fn grandchild_attaching_holds_every_ancestor_attached() {
    let t = chain(&["x-outer", "x-inner"]);
    let gate = t.children[1].suspend("attaching");

    let outcome = t.start().unwrap();
    assert!(!outcome.is_done());
    assert_eq!(
        *t.log.borrow(),
        [
            "app.binding",
            "app.bound",
            "app.attaching",
            "x-outer.binding",
            "x-outer.bound",
            "x-outer.attaching",
            "x-inner.binding",
            "x-inner.bound",
            "x-inner.attaching",
        ]
    );
    let root = t.app.root().unwrap();
    let outer = root.children()[0].clone();
    assert_eq!(outer.state(), State::Activating);

    gate.resolve();
    assert_eq!(t.hooks("attached"), ["x-inner.attached", "x-outer.attached", "app.attached"]);
    assert_eq!(outer.children()[0].state(), State::Activated);
    assert_eq!(outer.state(), State::Activated);
    assert_eq!(root.state(), State::Activated);
    assert_eq!(block_on(settle(outcome)), Ok(()));
}

#[test]
fn grandchild_detaching_holds_the_single_unbinding_pass() {
    let t = chain(&["x-outer", "x-inner"]);
    assert!(t.start().unwrap().is_done());
    let root = t.app.root().unwrap();
    let outer = root.children()[0].clone();
    let inner = outer.children()[0].clone();
    let gate = t.children[1].suspend("detaching");

    let outcome = t.app.stop().unwrap();
    assert!(!outcome.is_done());
    assert_eq!(t.hooks("detaching"), ["x-inner.detaching", "x-outer.detaching", "app.detaching"]);
    assert!(t.hooks("unbinding").is_empty());
    assert_eq!(inner.state(), State::Deactivating);

    gate.resolve();
    assert_eq!(t.hooks("unbinding"), ["x-inner.unbinding", "x-outer.unbinding", "app.unbinding"]);
    assert_eq!(block_on(settle(outcome)), Ok(()));
    assert!([&root, &outer, &inner].iter().all(|c| c.state() == State::Deactivated));
}

#[test]
fn pending_binding_defers_the_rest_of_activation() {
    let t = tree(&["x-a"]);
    let gate = t.root.suspend("binding");

    let outcome = t.start().unwrap();
    assert!(!outcome.is_done());
    assert_eq!(*t.log.borrow(), ["app.binding"]);

    gate.resolve();
    assert!(t.logged("x-a.attached"));
    assert_eq!(t.log.borrow().last().map(String::as_str), Some("app.attached"));
    assert_eq!(block_on(settle(outcome)), Ok(()));
}

#[test]
fn rejected_hook_rejects_the_initiator_without_rollback() {
    let t = tree(&["x-a"]);
    let gate = t.children[0].suspend("attaching");
    let outcome = t.start().unwrap();

    gate.reject(HookError::new("boom"));

    let err = block_on(settle(outcome)).unwrap_err();
    assert_eq!(err.message(), "boom");
    let root = t.app.root().unwrap();
    assert_eq!(root.state(), State::Activating);
    assert!(!t.logged("app.attached"));
}

#[test]
fn activating_twice_while_pending_is_invalid() {
    let t = tree(&[]);
    let _gate = t.root.suspend("binding");
    let (root, _) = t.hydrate();
    let first = root.activate(&root, None, LifecycleFlags::NONE, None).unwrap();
    assert!(!first.is_done());

    let err = root.activate(&root, None, LifecycleFlags::NONE, None).unwrap_err();
    assert!(matches!(err, RuntimeError::InvalidTransition { operation: "activate", .. }));
}

#[test]
fn activation_under_inactive_parent_is_ignored() {
    let t = tree(&["x-a"]);
    let (root, _) = t.hydrate();
    let child = root.children()[0].clone();

    let outcome = child.activate(&root, Some(&root), LifecycleFlags::NONE, None).unwrap();
    assert!(outcome.is_done());
    assert_eq!(child.state(), State::None);
    assert!(t.log.borrow().is_empty());
}

#[test]
fn deactivating_inactive_controller_is_a_no_op() {
    let t = tree(&[]);
    let (root, _) = t.hydrate();
    let outcome = root.deactivate(&root, None, LifecycleFlags::NONE).unwrap();
    assert!(outcome.is_done());
    assert_eq!(root.state(), State::None);
    assert!(t.hooks("detaching").is_empty());
}

#[test]
fn unbinding_waits_for_every_detaching() {
    let t = tree(&["x-a", "x-b", "x-c"]);
    assert!(t.start().unwrap().is_done());
    let root = t.app.root().unwrap();
    let children = root.children();
    let gates: Vec<Deferred> = t.children.iter().map(|p| p.suspend("detaching")).collect();

    let outcome = t.app.stop().unwrap();
    assert!(!outcome.is_done());
    assert_eq!(
        t.hooks("detaching"),
        ["x-a.detaching", "x-b.detaching", "x-c.detaching", "app.detaching"]
    );

    gates[2].resolve();
    gates[1].resolve();
    assert!(t.hooks("unbinding").is_empty());
    assert_eq!(root.state(), State::Deactivating);

    gates[0].resolve();
    assert_eq!(
        t.hooks("unbinding"),
        ["x-a.unbinding", "x-b.unbinding", "x-c.unbinding", "app.unbinding"]
    );
    assert_eq!(block_on(settle(outcome)), Ok(()));
    for name in ["x-a", "x-b", "x-c", "app"] {
        let entry = format!("{name}.unbinding");
        assert_eq!(t.log.borrow().iter().filter(|e| **e == entry).count(), 1, "{entry}");
    }
    assert_eq!(root.state(), State::Deactivated);
    assert!(children.iter().all(|c| c.state() == State::Deactivated && !c.is_bound()));
    assert!(root.is_disposed());
}

#[test]
fn disposed_controller_refuses_activation() {
    let t = tree(&["x-a"]);
    assert!(t.start().unwrap().is_done());
    let root = t.app.root().unwrap();
    assert!(t.app.stop().unwrap().is_done());
    assert!(root.is_disposed());
    assert!(t.app.root().is_none());

    let err = root.activate(&root, None, LifecycleFlags::NONE, None).unwrap_err();
    assert!(matches!(err, RuntimeError::InvalidTransition { operation: "activate", .. }));
}

#[test]
fn nodes_are_mounted_and_removed_with_activation() {
    let t = tree(&["x-a", "x-b"]);
    let (root, host) = t.hydrate();
    assert_eq!(root.mount_target(), MountTarget::Host);
    assert_eq!(t.text(host), "");

    root.activate(&root, None, LifecycleFlags::NONE, None).unwrap();
    assert_eq!(t.text(host), "x-ax-b");

    root.deactivate(&root, None, LifecycleFlags::NONE).unwrap();
    assert_eq!(t.text(host), "");
    assert!(!root.is_disposed());

    root.activate(&root, None, LifecycleFlags::NONE, None).unwrap();
    assert_eq!(root.state(), State::Activated);
    assert_eq!(t.text(host), "x-ax-b");
    assert_eq!(t.hooks("attached").len(), 6);
}
