use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use rstest::rstest;
use trellis_core::{HookError, HookOutcome, Object, Value};
use trellis_dom::{Dom, NodeId, RenderLocation};
use trellis_runtime::*;
use trellis_template::{CompiledDefinition, CustomAttributeDefinition, CustomElementDefinition, ShadowMode};

/// Minimal `if`: renders its view while `value` is truthy at attach time.
struct If {
    state: Object,
    factory: ViewFactory,
    location: RenderLocation,
    view: RefCell<Option<Controller>>,
}

impl If {
    fn current(&self) -> Option<Controller> {
        self.view.borrow().clone()
    }
}

impl ViewModel for If {
    fn state(&self) -> &Object {
        &self.state
    }

    fn attaching(&self, cx: &HookContext<'_>) -> HookOutcome {
        if !self.state.get("value").is_truthy() {
            return HookOutcome::Done;
        }
        let view = match self.factory.create() {
            Ok(view) => view,
            Err(err) => return HookOutcome::failed(HookError::new(err.to_string())),
        };
        view.set_location(self.location);
        *self.view.borrow_mut() = Some(view.clone());
        into_outcome(view.activate(cx.initiator, Some(cx.controller), cx.flags, cx.controller.scope()))
    }

    fn detaching(&self, cx: &HookContext<'_>) -> HookOutcome {
        let view = self.view.borrow_mut().take();
        match view {
            Some(view) => {
                view.release();
                into_outcome(view.deactivate(cx.initiator, Some(cx.controller), cx.flags))
            }
            None => HookOutcome::Done,
        }
    }
}

type Made = Rc<RefCell<Vec<Rc<If>>>>;

fn with_if(container: &Container) -> Made {
    let made = Made::default();
    let sink = made.clone();
    let def = CustomAttributeDefinition::builder("if")
        .template_controller()
        .bindables(&["value"])
        .build();
    container.register_attribute(def, move |cx| {
        let factory = cx.factory.clone().unwrap();
        factory.set_cache_size(1);
        let vm = Rc::new(If {
            state: Object::new(),
            factory,
            location: cx.location.unwrap(),
            view: RefCell::new(None),
        });
        sink.borrow_mut().push(vm.clone());
        vm as Rc<dyn ViewModel>
    });
    made
}

fn state_vm(pairs: &[(&str, Value)]) -> Rc<StateViewModel> {
    let vm = Rc::new(StateViewModel::new());
    for (key, value) in pairs {
        vm.state().set(*key, value.clone());
    }
    vm
}

fn host(container: &Container) -> NodeId {
    container.dom().doc_mut().create_element("app")
}

fn lookup(dom: &Dom, root: NodeId, tag: &str) -> Option<NodeId> {
    let doc = dom.doc();
    doc.descendants_where(root, |_, _| false)
        .into_iter()
        .find(|n| doc.tag(*n) == Some(tag))
}

fn find(dom: &Dom, root: NodeId, tag: &str) -> NodeId {
    lookup(dom, root, tag).unwrap()
}

fn contains(dom: &Dom, root: NodeId, tag: &str) -> bool {
    lookup(dom, root, tag).is_some()
}

fn text(dom: &Dom, node: NodeId) -> String {
    dom.doc().text_content(node)
}

#[test]
fn bindings_follow_state_and_events() {
    let container = Container::new(Dom::new());
    let app = App::new(container.clone());
    let def = CustomElementDefinition::builder("app")
        .template(
            r#"<template class="shell" data-role="root"><let greeting.bind="'Hello ' + name"></let><p>${greeting}</p><button click.trigger="count = count + 1">+</button><span>${count}</span><div ref="field"></div></template>"#,
        )
        .build();
    let vm = state_vm(&[("name", "Ada".into()), ("count", 0.into())]);
    let host = host(&container);

    assert!(app.start(host, def, vm.clone()).unwrap().is_done());

    let dom = container.dom();
    let p = find(dom, host, "p");
    let span = find(dom, host, "span");
    let button = find(dom, host, "button");
    assert_eq!(text(dom, p), "Hello Ada");
    assert_eq!(text(dom, span), "0");
    assert!(dom.doc().has_class(host, "shell"));
    assert_eq!(dom.doc().get_attribute(host, "data-role"), Some("root"));
    assert!(matches!(vm.state().get("field"), Value::Node(_)));
    assert!(!contains(dom, host, "let"));

    dom.dispatch_event(button, "click");
    assert_eq!(vm.state().get("count"), Value::from(1));
    assert_eq!(text(dom, span), "0");
    assert!(dom.flush_writes() > 0);
    assert_eq!(text(dom, span), "1");

    vm.state().set("name", "Grace".into());
    dom.flush_writes();
    assert_eq!(text(dom, p), "Hello Grace");

    assert_eq!(dom.listener_count(button, "click"), 1);
    assert!(app.stop().unwrap().is_done());
    assert_eq!(dom.listener_count(button, "click"), 0);
    dom.dispatch_event(button, "click");
    assert_eq!(vm.state().get("count"), Value::from(1));
}

#[rstest]
#[case(true, "hi")]
#[case(false, "")]
fn template_controller_renders_when_truthy(#[case] show: bool, #[case] expected: &str) {
    let container = Container::new(Dom::new());
    let made = with_if(&container);
    let def = CustomElementDefinition::builder("app")
        .template(r#"<div if.bind="show">${msg}</div>"#)
        .build();
    let vm = state_vm(&[("show", show.into()), ("msg", "hi".into())]);
    let host = host(&container);

    let root = Controller::for_custom_element(&container, vm, host, def, ElementOptions::default()).unwrap();
    assert!(root.activate(&root, None, LifecycleFlags::NONE, None).unwrap().is_done());

    assert_eq!(text(container.dom(), host), expected);
    assert_eq!(made.borrow().len(), 1);
    assert_eq!(made.borrow()[0].current().is_some(), show);
    assert_eq!(root.children()[0].kind(), ControllerKind::CustomAttribute);
}

#[test]
fn released_view_is_cached_and_reused() {
    let container = Container::new(Dom::new());
    let made = with_if(&container);
    let def = CustomElementDefinition::builder("app")
        .template(r#"<div if.bind="show">${msg}</div>"#)
        .build();
    let vm = state_vm(&[("show", true.into()), ("msg", "hi".into())]);
    let host = host(&container);
    let root = Controller::for_custom_element(&container, vm.clone(), host, def, ElementOptions::default()).unwrap();

    root.activate(&root, None, LifecycleFlags::NONE, None).unwrap();
    let tc = made.borrow()[0].clone();
    let first = tc.current().unwrap();
    assert_eq!(first.kind(), ControllerKind::Synthetic);
    assert_eq!(first.mount_target(), MountTarget::Location);

    root.deactivate(&root, None, LifecycleFlags::NONE).unwrap();
    assert_eq!(text(container.dom(), host), "");
    assert_eq!(tc.factory.cached(), 1);
    assert_eq!(first.state(), State::Deactivated);
    assert!(!first.is_disposed());

    vm.state().set("msg", "again".into());
    root.activate(&root, None, LifecycleFlags::NONE, None).unwrap();
    let second = tc.current().unwrap();
    assert!(first.ptr_eq(&second));
    assert_eq!(tc.factory.cached(), 0);
    assert_eq!(text(container.dom(), host), "again");
}

#[rstest]
#[case(r#"<card><b au-slot="title">${label}</b></card>"#, "Ada")]
#[case("<card></card>", "untitled")]
fn au_slot_renders_projection_or_fallback(#[case] markup: &str, #[case] expected: &str) {
    let container = Container::new(Dom::new());
    container.register(
        CustomElementDefinition::builder("card")
            .template(r#"<h3><au-slot name="title">untitled</au-slot></h3>"#)
            .build(),
    );
    let def = CustomElementDefinition::builder("app").template(markup).build();
    let vm = state_vm(&[("label", "Ada".into())]);
    let host = host(&container);
    let app = App::new(container.clone());

    assert!(app.start(host, def, vm).unwrap().is_done());

    let dom = container.dom();
    let card = find(dom, host, "card");
    let shadow = dom.doc().shadow_root(card).unwrap();
    assert_eq!(text(dom, shadow), expected);

    let root = app.root().unwrap();
    let card_ctrl = root.children()[0].clone();
    assert_eq!(card_ctrl.mount_target(), MountTarget::ShadowRoot);
    let slot = card_ctrl.children()[0].clone();
    assert_eq!(slot.name(), "au-slot");
    assert_eq!(slot.state(), State::Activated);
}

#[test]
fn rehydrating_projected_content_reuses_compiled_templates() {
    let container = Container::new(Dom::new());
    container.register(
        CustomElementDefinition::builder("card")
            .template(r#"<h3><au-slot name="title">untitled</au-slot></h3>"#)
            .build(),
    );
    let def = CustomElementDefinition::builder("app")
        .template(r#"<card><b au-slot="title">x</b></card>"#)
        .build();
    let app = App::new(container.clone());

    let mut sizes = Vec::new();
    for _ in 0..5 {
        let host = host(&container);
        assert!(app.start(host, def.clone(), Rc::new(StateViewModel::new())).unwrap().is_done());
        assert_eq!(text(container.dom(), dom_shadow(&container, host)), "x");
        assert!(app.stop().unwrap().is_done());
        sizes.push((container.compiled_count(), container.template_count()));
    }
    assert!(sizes.iter().all(|s| *s == sizes[0]), "{sizes:?}");
}

fn dom_shadow(container: &Container, host: NodeId) -> NodeId {
    let dom = container.dom();
    let card = find(dom, host, "card");
    dom.doc().shadow_root(card).unwrap()
}

#[test]
fn row_count_must_match_targets() {
    let container = Container::new(Dom::new());
    let mut compiled = CompiledDefinition::empty("broken");
    compiled.template = "<p></p>".to_string();
    compiled.instructions = vec![Vec::new()];
    let factory = ViewFactory::new("broken", RenderContext::new(&container, Arc::new(compiled)));

    let err = factory.create().unwrap_err();
    assert_eq!(
        err,
        RuntimeError::TargetCountMismatch {
            name: "broken".to_string(),
            targets: 0,
            rows: 1,
        }
    );
}

#[test]
fn containerless_element_cannot_use_shadow_dom() {
    let container = Container::new(Dom::new());
    let def = CustomElementDefinition::builder("panel")
        .template("<i>x</i>")
        .containerless()
        .shadow(ShadowMode::Open)
        .build();
    let host = host(&container);
    let err = Controller::for_custom_element(&container, Rc::new(StateViewModel::new()), host, def, ElementOptions::default())
        .unwrap_err();
    assert_eq!(err, RuntimeError::ContainerlessShadow("panel".to_string()));
}

#[test]
fn custom_element_bindables_receive_values() {
    let container = Container::new(Dom::new());
    container.register(
        CustomElementDefinition::builder("name-tag")
            .template("<b>${who}</b>")
            .bindables(&["who"])
            .build(),
    );
    let def = CustomElementDefinition::builder("app")
        .template(r#"<name-tag who.bind="user"></name-tag>"#)
        .build();
    let vm = state_vm(&[("user", "Lin".into())]);
    let host = host(&container);
    let app = App::new(container.clone());

    assert!(app.start(host, def, vm.clone()).unwrap().is_done());
    let dom = container.dom();
    assert_eq!(text(dom, host), "Lin");

    vm.state().set("user", "Sam".into());
    dom.flush_writes();
    assert_eq!(text(dom, host), "Sam");
    let child = app.root().unwrap().children()[0].clone();
    assert_eq!(child.view_model().unwrap().state().get("who"), Value::string("Sam"));
}

#[test]
fn deserialized_definition_renders_like_the_compiled_one() {
    let container = Container::new(Dom::new());
    let def = CustomElementDefinition::builder("greeting").template("<p>${msg}</p>").build();
    let compiled = container.compile(&def, &container, None).unwrap();
    let json = serde_json::to_string(&*compiled).unwrap();
    let restored: CompiledDefinition = serde_json::from_str(&json).unwrap();
    assert_eq!(restored, *compiled);

    let factory = ViewFactory::new("greeting", RenderContext::new(&container, Arc::new(restored)));
    let view = factory.create().unwrap();
    let host = host(&container);
    view.set_host(host);
    let scope = Scope::create(Object::from_pairs([("msg", Value::from("hey"))]));
    assert!(view.activate(&view, None, LifecycleFlags::NONE, Some(scope)).unwrap().is_done());
    assert_eq!(text(container.dom(), host), "hey");
    assert_eq!(view.bindings_len(), 1);
}
