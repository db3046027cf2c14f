use std::sync::Arc;

use trellis_template::*;

fn registry(defs: Vec<ResourceDefinition>) -> ResourceRegistry {
    let mut r = ResourceRegistry::new();
    for d in defs {
        r.register(d);
    }
    r
}

fn compile_with(markup: &str, resources: &ResourceRegistry) -> Result<Arc<CompiledDefinition>> {
    let def = CustomElementDefinition::builder("app").template(markup).build();
    TemplateCompiler::default().compile(&def, resources, None)
}

fn compile(markup: &str, resources: &ResourceRegistry) -> Arc<CompiledDefinition> {
    compile_with(markup, resources).unwrap()
}

fn controllers() -> Vec<ResourceDefinition> {
    vec![
        CustomAttributeDefinition::builder("if").template_controller().bindables(&["value"]).build().into(),
        CustomAttributeDefinition::builder("repeat").template_controller().bindables(&["items"]).build().into(),
    ]
}

fn hydrate_element(i: &Instruction) -> &HydrateElementInstruction {
    match i {
        Instruction::HydrateElement(h) => h,
        other => panic!("expected hydrate element, got {other:?}"),
    }
}

fn hydrate_tc(i: &Instruction) -> &HydrateTemplateControllerInstruction {
    match i {
        Instruction::HydrateTemplateController(h) => h,
        other => panic!("expected template controller, got {other:?}"),
    }
}

#[test]
fn custom_attribute_wins_over_same_named_bindable() {
    let resources = registry(vec![
        CustomElementDefinition::builder("el").bindables(&["prop1", "prop2", "prop3"]).build().into(),
        CustomAttributeDefinition::builder("prop3").build().into(),
    ]);
    let compiled = compile(
        r#"<template><el prop1.bind="p" prop2.bind="p" prop3.bind="t" prop3="t"></el></template>"#,
        &resources,
    );

    assert_eq!(compiled.instructions.len(), 1);
    let row = &compiled.instructions[0];
    assert_eq!(row.len(), 3);

    let el = hydrate_element(&row[0]);
    assert_eq!(el.res, "el");
    let targets: Vec<_> = el
        .props
        .iter()
        .map(|p| match p {
            Instruction::PropertyBinding(b) => b.to.as_str(),
            other => panic!("unexpected {other:?}"),
        })
        .collect();
    assert_eq!(targets, ["prop1", "prop2"]);

    let Instruction::HydrateAttribute(bound) = &row[1] else { panic!("expected attribute") };
    let Instruction::HydrateAttribute(literal) = &row[2] else { panic!("expected attribute") };
    assert_eq!((bound.res.as_str(), literal.res.as_str()), ("prop3", "prop3"));
    assert!(matches!(&bound.props[..], [Instruction::PropertyBinding(p)] if p.to == "value" && p.mode == BindingMode::ToView));
    assert!(matches!(&literal.props[..], [Instruction::SetProperty(s)] if s.to == "value" && s.value == "t"));
    assert_eq!(compiled.template, r#"<el class="au"></el>"#);
}

#[test]
fn template_controller_is_lifted_off_its_host() {
    let resources = registry(vec![
        CustomElementDefinition::builder("el").bindables(&["a", "b"]).build().into(),
        CustomAttributeDefinition::builder("tc").template_controller().build().into(),
    ]);
    let compiled = compile(r#"<el a.bind="x" b.bind="y" tc.bind="z"></el>"#, &resources);

    assert_eq!(compiled.template, r#"<au-m class="au"></au-m><!--au-start--><!--au-end-->"#);
    assert_eq!(compiled.instructions.len(), 1);
    let tc = hydrate_tc(&compiled.instructions[0][0]);
    assert_eq!(tc.res, "tc");
    assert!(matches!(&tc.props[..], [Instruction::PropertyBinding(p)] if p.from.source() == "z"));

    assert_eq!(tc.def.template, r#"<el class="au"></el>"#);
    let el = hydrate_element(&tc.def.instructions[0][0]);
    let sources: Vec<_> = el
        .props
        .iter()
        .map(|p| match p {
            Instruction::PropertyBinding(b) => (b.to.as_str(), b.from.source()),
            other => panic!("unexpected {other:?}"),
        })
        .collect();
    assert_eq!(sources, [("a", "x"), ("b", "y")]);
}

#[test]
fn multiple_controllers_match_manual_nesting() {
    let resources = registry(controllers());
    let lifted = compile(r#"<div><div if.bind="show" repeat.for="i of items">${i}</div></div>"#, &resources);
    let manual = compile(
        r#"<div><template if.bind="show"><div repeat.for="i of items">${i}</div></template></div>"#,
        &resources,
    );
    assert_eq!(lifted, manual);

    let outer = hydrate_tc(&lifted.instructions[0][0]);
    assert_eq!(outer.res, "if");
    let inner = hydrate_tc(&outer.def.instructions[0][0]);
    assert_eq!(inner.res, "repeat");
    assert!(matches!(&inner.props[..], [Instruction::IteratorBinding(b)] if b.to == "items"));
    assert_eq!(inner.def.template, r#"<div><au-m class="au"></au-m> </div>"#);
    assert!(matches!(&inner.def.instructions[0][..], [Instruction::TextBinding(_)]));
}

#[test]
fn controller_order_decides_nesting() {
    let resources = registry(controllers());
    let compiled = compile(r#"<p repeat.for="i of items" if.bind="i"></p>"#, &resources);
    let outer = hydrate_tc(&compiled.instructions[0][0]);
    let inner = hydrate_tc(&outer.def.instructions[0][0]);
    assert_eq!((outer.res.as_str(), inner.res.as_str()), ("repeat", "if"));
    assert_eq!(inner.def.template, "<p></p>");
    assert!(inner.def.instructions.is_empty());
}

#[test]
fn compiling_twice_is_structurally_equal() {
    let resources = registry(controllers());
    let def = CustomElementDefinition::builder("app")
        .template(r#"<template class="host"><ul><li repeat.for="x of xs" click.trigger="pick(x)">${x.name}</li></ul></template>"#)
        .build();
    let a = TemplateCompiler::default().compile(&def, &resources, None).unwrap();
    let b = TemplateCompiler::default().compile(&def, &resources, None).unwrap();
    assert!(!Arc::ptr_eq(&a, &b));
    assert_eq!(a, b);

    let json = serde_json::to_string(&*a).unwrap();
    let back: CompiledDefinition = serde_json::from_str(&json).unwrap();
    assert_eq!(back, *a);
}

#[test]
fn capture_keeps_bindables_and_takes_everything_else() {
    let resources = registry(vec![
        CustomElementDefinition::builder("el").bindables(&["value"]).capture().build().into(),
        CustomAttributeDefinition::builder("my-attr").bindables(&["a", "b"]).build().into(),
    ]);
    let compiled = compile(
        r#"<el value.bind="v" foo="bar" ...$attrs my-attr="a: 1; b: 2" click.trigger="go()"></el>"#,
        &resources,
    );
    let el = hydrate_element(&compiled.instructions[0][0]);
    assert_eq!(compiled.instructions[0].len(), 1);
    assert!(matches!(&el.props[..], [Instruction::PropertyBinding(p)] if p.to == "value"));
    let captured: Vec<_> = el.captures.iter().map(|c| c.raw_name.as_str()).collect();
    assert_eq!(captured, ["foo", "...$attrs", "my-attr", "click.trigger"]);
    assert_eq!(el.captures[3].command.as_deref(), Some("trigger"));
    assert_eq!(compiled.template, r#"<el class="au"></el>"#);
}

#[test]
fn au_slot_uses_fallback_or_projection() {
    let resources = ResourceRegistry::new();
    let def = CustomElementDefinition::builder("card")
        .template(r#"<au-slot name="title"><b>none</b></au-slot>"#)
        .build();
    let compiler = TemplateCompiler::default();

    let fallback = compiler.compile(&def, &resources, None).unwrap();
    let slot = hydrate_element(&fallback.instructions[0][0]);
    assert_eq!(slot.res, "au-slot");
    assert!(slot.containerless);
    let info = slot.slot_info.as_ref().unwrap();
    assert_eq!((info.name.as_str(), info.kind), ("title", SlotKind::Fallback));
    assert_eq!(info.content.template, "<b>none</b>");
    assert_eq!(fallback.template, r#"<au-slot class="au"></au-slot>"#);

    let projected = Arc::new(CompiledDefinition::empty("title"));
    let mut projections = ProjectionMap::new();
    projections.insert("title".to_string(), projected.clone());
    let with = compiler.compile(&def, &resources, Some(&projections)).unwrap();
    let info = hydrate_element(&with.instructions[0][0]).slot_info.clone().unwrap();
    assert_eq!(info.kind, SlotKind::Projection);
    assert!(Arc::ptr_eq(&info.content, &projected));
    assert_eq!(with.projections_map.as_ref().map(|p| p.len()), Some(1));
}

#[test]
fn au_slot_children_become_projections() {
    let resources = registry(vec![CustomElementDefinition::builder("card").build().into()]);
    let compiled = compile(
        r#"<card><h1 au-slot="title">${t}</h1><template au-slot>body</template><i>kept</i></card>"#,
        &resources,
    );
    assert_eq!(compiled.template, r#"<card class="au"><i>kept</i></card>"#);
    assert_eq!(compiled.instructions.len(), 1);

    let card = hydrate_element(&compiled.instructions[0][0]);
    let projections = card.projections.as_ref().unwrap();
    let names: Vec<_> = projections.keys().map(String::as_str).collect();
    assert_eq!(names, ["title", "default"]);
    assert_eq!(projections["title"].template, r#"<h1><au-m class="au"></au-m> </h1>"#);
    assert_eq!(projections["title"].instructions.len(), 1);
    assert_eq!(projections["default"].template, "body");
}

#[test]
fn let_element_bindings() {
    let compiled = compile(
        r#"<let foo-bar.bind="x + 1" greeting="hi" to-binding-context></let>"#,
        &ResourceRegistry::new(),
    );
    assert_eq!(compiled.template, r#"<let class="au"></let>"#);
    let Instruction::HydrateLetElement(l) = &compiled.instructions[0][0] else { panic!("expected let") };
    assert!(l.to_binding_context);
    let pairs: Vec<_> = l.instructions.iter().map(|i| (i.to.as_str(), i.from.source())).collect();
    assert_eq!(pairs, [("fooBar", "x + 1"), ("greeting", "'hi'")]);
}

#[test]
fn surrogate_attributes() {
    let resources = registry(vec![CustomAttributeDefinition::builder("focus").build().into()]);
    let compiled = compile(
        r#"<template class="a b" style="color: red" id="x" title="${t}" focus.bind="f"><p></p></template>"#,
        &resources,
    );
    assert_eq!(compiled.template, "<p></p>");
    assert!(compiled.instructions.is_empty());
    let s = &compiled.surrogates;
    assert_eq!(s.len(), 5);
    assert!(matches!(&s[0], Instruction::HydrateAttribute(h) if h.res == "focus"));
    assert!(matches!(&s[1], Instruction::SetClassAttribute(c) if c.value == "a b"));
    assert!(matches!(&s[2], Instruction::SetStyleAttribute(c) if c.value == "color: red"));
    assert!(matches!(&s[3], Instruction::SetAttribute(a) if a.to == "id" && a.value == "x"));
    assert!(matches!(&s[4], Instruction::Interpolation(i) if i.to == "title"));
}

#[test]
fn plain_elements_only_target_when_bound() {
    let compiled = compile(
        r#"<div><input value.bind="v" class="x" @click="go()"><a href="${u}">${label}</a><span>static</span></div>"#,
        &ResourceRegistry::new(),
    );
    assert_eq!(
        compiled.template,
        r#"<div><input class="x au"><a class="au"><au-m class="au"></au-m> </a><span>static</span></div>"#
    );
    assert_eq!(compiled.instructions.len(), 3);
    assert!(matches!(
        &compiled.instructions[0][..],
        [Instruction::PropertyBinding(p), Instruction::ListenerBinding(l)]
            if p.to == "value" && p.mode == BindingMode::TwoWay && l.to == "click" && l.prevent_default
    ));
    assert!(matches!(&compiled.instructions[1][..], [Instruction::Interpolation(i)] if i.to == "href"));
    assert!(matches!(&compiled.instructions[2][..], [Instruction::TextBinding(_)]));
}

#[test]
fn multi_binding_custom_attribute() {
    let resources = registry(vec![
        CustomAttributeDefinition::builder("tip").bindables(&["text", "placement"]).build().into(),
    ]);
    let compiled = compile(r#"<div tip="text: hello; placement.bind: where"></div>"#, &resources);
    let Instruction::HydrateAttribute(h) = &compiled.instructions[0][0] else { panic!("expected attribute") };
    assert!(matches!(&h.props[0], Instruction::SetProperty(s) if s.to == "text" && s.value == "hello"));
    assert!(matches!(&h.props[1], Instruction::PropertyBinding(p) if p.to == "placement" && p.from.source() == "where"));

    let err = compile_with(r#"<div tip="colour: red"></div>"#, &resources).unwrap_err();
    assert!(matches!(err, TemplateError::UnknownBindable { .. }));

    let lenient = TemplateCompiler::new(CompilerOptions {
        strict_resolution: false,
        ..CompilerOptions::default()
    });
    let def = CustomElementDefinition::builder("app").template(r#"<div tip="colour: red"></div>"#).build();
    let compiled = lenient.compile(&def, &resources, None).unwrap();
    let Instruction::HydrateAttribute(h) = &compiled.instructions[0][0] else { panic!("expected attribute") };
    assert!(h.props.is_empty());
}

#[test]
fn local_templates_become_dependencies() {
    let compiled = compile(
        r#"<template as-custom-element="name-tag"><bindable property="fullName" mode="two-way"></bindable><b>${fullName}</b></template><name-tag full-name.bind="user.name"></name-tag>"#,
        &ResourceRegistry::new(),
    );
    assert_eq!(compiled.template, r#"<name-tag class="au"></name-tag>"#);
    let ResourceDefinition::Element(local) = &compiled.dependencies[0] else { panic!("expected element") };
    assert_eq!(local.name, "name-tag");
    assert_eq!(local.template.as_deref(), Some("<b>${fullName}</b>"));
    assert_eq!(local.bindables["fullName"].attribute, "full-name");

    let el = hydrate_element(&compiled.instructions[0][0]);
    assert!(matches!(&el.props[..], [Instruction::PropertyBinding(p)] if p.to == "fullName" && p.mode == BindingMode::TwoWay));
}

#[test]
fn inert_templates_are_left_alone() {
    let compiled = compile(r#"<div><template><p>${x}</p></template></div>"#, &ResourceRegistry::new());
    assert!(compiled.instructions.is_empty());
    assert_eq!(compiled.template, "<div><template><p>${x}</p></template></div>");
}

#[test]
fn slot_sets_has_slots() {
    let compiled = compile("<div><slot></slot></div>", &ResourceRegistry::new());
    assert!(compiled.has_slots);
    assert!(!compile("<div></div>", &ResourceRegistry::new()).has_slots);
}

fn compile_err(markup: &str, resources: &ResourceRegistry) -> TemplateError {
    compile_with(markup, resources).unwrap_err()
}

#[test]
fn structural_errors() {
    let none = ResourceRegistry::new();
    let tc = registry(controllers());

    let err = compile_err(r#"<div as-element="nope"></div>"#, &none);
    assert_eq!(err, TemplateError::UnknownElement("nope".into()));

    let err = compile_err(r#"<template if.bind="x"><p></p></template>"#, &tc);
    assert_eq!(err, TemplateError::SurrogateTemplateController("if".into()));

    let err = compile_err(
        r#"<template as-custom-element="a"><p></p></template><template as-custom-element="a"><i></i></template><a></a>"#,
        &none,
    );
    assert_eq!(err, TemplateError::DuplicateLocalTemplate("a".into()));

    let err = compile_err(r#"<template as-custom-element=""></template><p></p>"#, &none);
    assert_eq!(err, TemplateError::EmptyLocalTemplateName);

    let err = compile_err(r#"<div><template as-custom-element="x"></template></div>"#, &none);
    assert_eq!(err, TemplateError::LocalTemplateNotAtRoot("x".into()));

    let err = compile_err(r#"<template as-custom-element="x"><p></p></template>"#, &none);
    assert_eq!(err, TemplateError::OnlyLocalTemplates("app".into()));

    let err = compile_err(
        r#"<template as-custom-element="x"><bindable mode="to-view"></bindable></template><p></p>"#,
        &none,
    );
    assert_eq!(err, TemplateError::MissingBindableProperty("x".into()));

    let err = compile_err(
        r#"<template as-custom-element="x"><bindable property="a"></bindable><bindable property="b" attribute="a"></bindable></template><p></p>"#,
        &none,
    );
    assert_eq!(
        err,
        TemplateError::DuplicateLocalBindable {
            element: "x".into(),
            attribute: "a".into(),
        }
    );

    assert!(matches!(compile_err("<div><p></div>", &none), TemplateError::Markup(_)));
}

#[test]
fn unknown_as_element_falls_back_when_lenient() {
    let compiler = TemplateCompiler::new(CompilerOptions {
        strict_resolution: false,
        ..CompilerOptions::default()
    });
    let def = CustomElementDefinition::builder("app").template(r#"<div as-element="nope"></div>"#).build();
    let compiled = compiler.compile(&def, &ResourceRegistry::new(), None).unwrap();
    assert_eq!(compiled.template, "<div></div>");
}

#[test]
fn as_element_resolves_to_custom_element() {
    let resources = registry(vec![CustomElementDefinition::builder("fancy").alias("fx").build().into()]);
    let compiled = compile(r#"<div as-element="fx"></div>"#, &resources);
    let el = hydrate_element(&compiled.instructions[0][0]);
    assert_eq!((el.res.as_str(), el.alias.as_deref()), ("fancy", Some("fx")));
    assert_eq!(compiled.template, r#"<div class="au"></div>"#);
}

#[test]
fn elements_without_a_template_compile_empty() {
    let def = CustomElementDefinition::builder("bare").bindables(&["x"]).containerless().build();
    let compiled = TemplateCompiler::default().compile(&def, &ResourceRegistry::new(), None).unwrap();
    assert_eq!(compiled.target_count(), 0);
    assert!(compiled.containerless);
    assert!(compiled.bindables.contains_key("x"));
}
