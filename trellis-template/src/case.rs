/// `foo-bar` / `foo_bar` -> `fooBar`.
pub fn camel_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper = false;
    for ch in name.chars() {
        if ch == '-' || ch == '_' {
            upper = !out.is_empty();
        } else if upper {
            out.extend(ch.to_uppercase());
            upper = false;
        } else {
            out.push(ch);
        }
    }
    out
}

/// `fooBar` -> `foo-bar`.
pub fn kebab_case(name: &str) -> String {
    trellis_dom::style::kebab_case(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn camel_and_kebab() {
        assert_eq!(camel_case("value-as-number"), "valueAsNumber");
        assert_eq!(camel_case("-x"), "x");
        assert_eq!(camel_case("prop1"), "prop1");
        assert_eq!(kebab_case("valueAsNumber"), "value-as-number");
    }
}
