use std::cell::RefCell;
use std::rc::Rc;

use trellis_core::{Object, Value};
use trellis_dom::{Dom, element};

#[test]
fn reflected_properties_write_through() {
    let dom = Dom::new();
    let (div, text) = {
        let mut doc = dom.doc_mut();
        let text = doc.create_text("");
        let div = element(&mut doc, "div", &[("id", "a")], &[]);
        (div, text)
    };

    assert_eq!(dom.get_property(div, "id"), Value::from("a"));
    dom.set_property(div, "id", Value::from("b"));
    dom.set_property(div, "className", Value::from("x y"));
    dom.set_property(text, "textContent", Value::from(42));
    dom.set_property(div, "custom", Value::from(true));

    let doc = dom.doc();
    assert_eq!(doc.get_attribute(div, "id"), Some("b"));
    assert_eq!(doc.get_attribute(div, "class"), Some("x y"));
    assert_eq!(doc.text(text), Some("42"));
    assert!(!doc.has_attribute(div, "custom"));
}

#[test]
fn style_properties_merge() {
    let dom = Dom::new();
    let div = element(&mut dom.doc_mut(), "div", &[("style", "color: red;")], &[]);

    dom.set_style_property(div, "backgroundColor", "blue");
    assert_eq!(dom.doc().get_attribute(div, "style"), Some("color: red; background-color: blue;"));

    dom.set_style_property(div, "color", "");
    dom.set_style_property(div, "background-color", "");
    assert!(!dom.doc().has_attribute(div, "style"));
}

#[test]
fn dispatch_runs_capture_then_bubble() {
    let dom = Dom::new();
    let (outer, inner) = {
        let mut doc = dom.doc_mut();
        let inner = doc.create_element("button");
        let outer = element(&mut doc, "div", &[], &[inner]);
        (outer, inner)
    };
    let log = Rc::new(RefCell::new(Vec::new()));
    for (node, capture, tag) in [(outer, false, "outer-bubble"), (inner, false, "inner"), (outer, true, "outer-capture")] {
        let log = log.clone();
        dom.add_event_listener(node, "click", capture, Rc::new(move |_| log.borrow_mut().push(tag)));
    }

    dom.dispatch_event(inner, "click");
    assert_eq!(*log.borrow(), vec!["outer-capture", "inner", "outer-bubble"]);
}

#[test]
fn write_queue_defers_until_flush() {
    let dom = Dom::new();
    let hits = Rc::new(RefCell::new(0));
    let h = hits.clone();
    dom.queue_write(move || *h.borrow_mut() += 1);
    assert_eq!(*hits.borrow(), 0);
    assert_eq!(dom.flush_writes(), 1);
    assert_eq!(*hits.borrow(), 1);
}

#[test]
fn components_are_looked_up_per_node() {
    let dom = Dom::new();
    let node = dom.doc_mut().create_element("my-el");
    let vm = Object::new();
    dom.register_component(node, "my-el", vm.clone());

    assert!(dom.component(node, "my-el").is_some_and(|o| o.ptr_eq(&vm)));
    assert!(dom.component(node, "other").is_none());
}
