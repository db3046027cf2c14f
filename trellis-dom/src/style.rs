use indexmap::IndexMap;

/// Parse inline `key: value; key2: value2` declarations, keeping source order.
/// Later duplicates override earlier ones. Unknown syntax is ignored.
pub fn parse_declarations(css: &str) -> IndexMap<String, String> {
    let mut decls = IndexMap::new();
    for decl in css.split(';') {
        let decl = decl.trim();
        if decl.is_empty() {
            continue;
        }
        if let Some((k, v)) = decl.split_once(':') {
            let k = k.trim();
            if k.is_empty() {
                continue;
            }
            decls.insert(k.to_string(), v.trim().to_string());
        }
    }
    decls
}

/// Merge `updates` into an existing inline style string. An empty value
/// removes the property.
pub fn merge_styles(existing: Option<&str>, updates: &IndexMap<String, String>) -> String {
    let mut map = existing.map(parse_declarations).unwrap_or_default();
    for (k, v) in updates {
        if v.is_empty() {
            map.shift_remove(k);
        } else {
            map.insert(k.clone(), v.clone());
        }
    }
    to_style_string(&map)
}

pub fn to_style_string(map: &IndexMap<String, String>) -> String {
    let mut out = String::new();
    for (i, (k, v)) in map.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        out.push_str(k);
        out.push_str(": ");
        out.push_str(v);
        out.push(';');
    }
    out
}

/// `backgroundColor` -> `background-color`; kebab input is returned unchanged.
pub fn kebab_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for ch in name.chars() {
        if ch.is_ascii_uppercase() {
            out.push('-');
            out.push(ch.to_ascii_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_overrides_and_removes() {
        let mut updates = IndexMap::new();
        updates.insert("color".to_string(), "red".to_string());
        updates.insert("margin".to_string(), String::new());
        let merged = merge_styles(Some("margin: 0; font-weight: bold; color: blue"), &updates);
        assert_eq!(merged, "font-weight: bold; color: red;");
    }

    #[test]
    fn kebab_from_camel() {
        assert_eq!(kebab_case("backgroundColor"), "background-color");
        assert_eq!(kebab_case("color"), "color");
    }
}
