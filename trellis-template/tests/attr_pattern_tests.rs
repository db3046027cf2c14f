use rstest::rstest;
use trellis_template::{AttributeParser, default_patterns};

#[rstest]
#[case("value.bind", "value", Some("bind"))]
#[case("foo.bar.two-way", "foo", Some("two-way"))]
#[case("ref", "element", Some("ref"))]
#[case("view-model.ref", "component", Some("ref"))]
#[case("input.ref", "input", Some("ref"))]
#[case(":value", "value", Some("bind"))]
#[case("@click", "click", Some("trigger"))]
#[case("class", "class", None)]
#[case("...$attrs", "...$attrs", None)]
#[case("a.b.c.d", "a.b.c.d", None)]
fn default_patterns_split_target_and_command(#[case] name: &str, #[case] target: &str, #[case] command: Option<&str>) {
    let parser = AttributeParser::default();
    let syntax = parser.parse(name, "v").unwrap();
    assert_eq!(syntax.raw_name, name);
    assert_eq!(syntax.raw_value, "v");
    assert_eq!(syntax.target, target);
    assert_eq!(syntax.command.as_deref(), command);
}

#[test]
fn static_segment_beats_dynamic() {
    let parser = AttributeParser::default();
    let i = parser.interpret("foo.ref");
    assert_eq!(i.pattern.as_deref(), Some("PART.ref"));
    assert_eq!(i.parts, vec!["foo".to_string(), "ref".to_string()]);
}

#[rstest]
#[case("value.bind")]
#[case("foo.ref")]
#[case("x.y.z")]
#[case("@submit")]
#[case("nothing")]
fn interpretation_is_deterministic(#[case] name: &str) {
    let parser = AttributeParser::default();
    let first = parser.interpret(name);
    let cached = parser.interpret(name);
    assert_eq!(first, cached);

    let mut reversed = default_patterns();
    reversed.reverse();
    let other = AttributeParser::new(&reversed);
    assert_eq!(other.interpret(name), first);
}

#[rstest]
#[case("value.bind", "value", Some("bind"))]
#[case("foo.bar.two-way", "foo", Some("two-way"))]
#[case("input.ref", "input", Some("ref"))]
fn registration_order_does_not_change_the_command(#[case] name: &str, #[case] target: &str, #[case] command: Option<&str>) {
    let mut reversed = default_patterns();
    reversed.reverse();
    let parser = AttributeParser::new(&reversed);
    let syntax = parser.parse(name, "v").unwrap();
    assert_eq!(syntax.target, target);
    assert_eq!(syntax.command.as_deref(), command);
}
