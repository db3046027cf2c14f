use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::observable::Observable;

/// Dynamic value flowing through bindings.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(Rc<str>),
    List(Rc<Vec<Value>>),
    Object(Object),
    Function(Func),
    /// Opaque handle of a DOM node, as produced by `ref` bindings.
    Node(u32),
}

impl Value {
    pub fn string(s: impl AsRef<str>) -> Self {
        Value::String(Rc::from(s.as_ref()))
    }

    pub fn list(items: impl IntoIterator<Item = Value>) -> Self {
        Value::List(Rc::new(items.into_iter().collect()))
    }

    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::String(s) => !s.is_empty(),
            Value::List(_) | Value::Object(_) | Value::Function(_) | Value::Node(_) => true,
        }
    }

    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Text used when a value is written into markup (interpolations, text nodes).
    /// Nullish values render as the empty string.
    pub fn to_display_string(&self) -> String {
        match self {
            Value::Undefined | Value::Null => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => format_number(*n),
            Value::String(s) => s.to_string(),
            Value::List(items) => items
                .iter()
                .map(Value::to_display_string)
                .collect::<Vec<_>>()
                .join(","),
            Value::Object(_) => "[object Object]".to_string(),
            Value::Function(_) => "[function]".to_string(),
            Value::Node(id) => format!("[node {id}]"),
        }
    }
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.is_finite() && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::List(a), Value::List(b)) => Rc::ptr_eq(a, b) || a == b,
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(&a.0, &b.0),
            (Value::Node(a), Value::Node(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => write!(f, "undefined"),
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) => write!(f, "{}", format_number(*n)),
            Value::String(s) => write!(f, "{s:?}"),
            Value::List(items) => f.debug_list().entries(items.iter()).finish(),
            Value::Object(o) => o.fmt(f),
            Value::Function(_) => write!(f, "[function]"),
            Value::Node(id) => write!(f, "Node({id})"),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::string(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(Rc::from(s))
    }
}

impl From<Object> for Value {
    fn from(o: Object) -> Self {
        Value::Object(o)
    }
}

impl From<Func> for Value {
    fn from(f: Func) -> Self {
        Value::Function(f)
    }
}

/// Callable value. Arguments are passed by slice, the result is returned by value.
#[derive(Clone)]
pub struct Func(pub Rc<dyn Fn(&[Value]) -> Value>);

impl Func {
    pub fn new(f: impl Fn(&[Value]) -> Value + 'static) -> Self {
        Func(Rc::new(f))
    }

    pub fn call(&self, args: &[Value]) -> Value {
        (self.0)(args)
    }
}

/// A bag of observable properties. Cloning shares the same object.
#[derive(Clone, Default)]
pub struct Object(Rc<RefCell<IndexMap<String, Observable>>>);

impl Object {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an object from `(name, value)` pairs.
    pub fn from_pairs<K: Into<String>>(pairs: impl IntoIterator<Item = (K, Value)>) -> Self {
        let obj = Object::new();
        for (k, v) in pairs {
            obj.set(k, v);
        }
        obj
    }

    /// The observable backing `name`, created as `undefined` when missing.
    pub fn property(&self, name: &str) -> Observable {
        if let Some(existing) = self.0.borrow().get(name) {
            return existing.clone();
        }
        let created = Observable::new(Value::Undefined);
        self.0
            .borrow_mut()
            .insert(name.to_string(), created.clone());
        created
    }

    pub fn has(&self, name: &str) -> bool {
        self.0.borrow().contains_key(name)
    }

    pub fn get(&self, name: &str) -> Value {
        let prop = self.0.borrow().get(name).cloned();
        prop.map(|p| p.get_value()).unwrap_or_default()
    }

    pub fn set(&self, name: impl Into<String>, value: Value) {
        let name = name.into();
        let prop = self.0.borrow().get(&name).cloned();
        match prop {
            Some(p) => p.set_value(value),
            None => {
                self.0.borrow_mut().insert(name, Observable::new(value));
            }
        }
    }

    pub fn remove(&self, name: &str) {
        self.0.borrow_mut().shift_remove(name);
    }

    pub fn keys(&self) -> Vec<String> {
        self.0.borrow().keys().cloned().collect()
    }

    pub fn ptr_eq(&self, other: &Object) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Ok(map) = self.0.try_borrow() else {
            return write!(f, "Object(<borrowed>)");
        };
        let mut dbg = f.debug_map();
        for (k, v) in map.iter() {
            dbg.entry(k, &v.get_value());
        }
        dbg.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_strings() {
        assert_eq!(Value::Undefined.to_display_string(), "");
        assert_eq!(Value::from(3.0).to_display_string(), "3");
        assert_eq!(Value::from(2.5).to_display_string(), "2.5");
        assert_eq!(
            Value::list([Value::from(1), Value::from("a")]).to_display_string(),
            "1,a"
        );
    }

    #[test]
    fn object_properties_are_shared() {
        let a = Object::new();
        let b = a.clone();
        a.set("x", Value::from(1));
        assert_eq!(b.get("x"), Value::from(1));
        assert!(b.property("x").ptr_eq(&a.property("x")));
        assert_eq!(a.get("missing"), Value::Undefined);
    }
}
