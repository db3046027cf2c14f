//! Expression evaluation against a [`Scope`].
//!
//! [`evaluate_observed`] additionally records every property cell it read so
//! that a binding can subscribe to exactly those.

use std::cmp::Ordering;
use std::rc::Rc;

use trellis_core::{Observable, Value};
use trellis_template::Expression;
use trellis_template::expr::{BinaryOp, Expr, Literal, UnaryOp};

use crate::error::{Result, RuntimeError};
use crate::scope::Scope;

pub fn evaluate(expr: &Expr, scope: &Rc<Scope>) -> Value {
    let mut deps = Vec::new();
    eval(expr, scope, &mut deps)
}

/// Evaluate and collect the observables read along the way, deduplicated.
pub fn evaluate_observed(expr: &Expr, scope: &Rc<Scope>, deps: &mut Vec<Observable>) -> Value {
    let value = eval(expr, scope, deps);
    let mut unique: Vec<Observable> = Vec::with_capacity(deps.len());
    for d in deps.drain(..) {
        if !unique.iter().any(|u| u.ptr_eq(&d)) {
            unique.push(d);
        }
    }
    *deps = unique;
    value
}

/// Write `value` through an assignable expression.
pub fn assign(expression: &Expression, scope: &Rc<Scope>, value: Value) -> Result<()> {
    if assign_expr(expression.ast(), scope, value) {
        Ok(())
    } else {
        Err(RuntimeError::NotAssignable(expression.source().to_string()))
    }
}

fn assign_expr(expr: &Expr, scope: &Rc<Scope>, value: Value) -> bool {
    match expr {
        Expr::AccessScope { name, ancestor } => match scope.context_for(name, *ancestor) {
            Some(owner) => {
                owner.property(name).set_value(value);
                true
            }
            None => false,
        },
        Expr::AccessMember { object, name } => match evaluate(object, scope) {
            Value::Object(owner) => {
                owner.property(name).set_value(value);
                true
            }
            _ => false,
        },
        Expr::AccessKeyed { object, key } => {
            let key = evaluate(key, scope).to_display_string();
            match evaluate(object, scope) {
                Value::Object(owner) => {
                    owner.property(&key).set_value(value);
                    true
                }
                _ => false,
            }
        }
        _ => false,
    }
}

fn eval(expr: &Expr, scope: &Rc<Scope>, deps: &mut Vec<Observable>) -> Value {
    match expr {
        Expr::AccessThis { ancestor } => scope
            .ancestor(*ancestor)
            .map(|s| Value::Object(s.binding_context.clone()))
            .unwrap_or_default(),
        Expr::AccessScope { name, ancestor } => match scope.context_for(name, *ancestor) {
            Some(owner) => {
                let cell = owner.property(name);
                let v = cell.get_value();
                deps.push(cell);
                v
            }
            None => Value::Undefined,
        },
        Expr::AccessMember { object, name } => {
            let target = eval(object, scope, deps);
            member(&target, name, deps)
        }
        Expr::AccessKeyed { object, key } => {
            let target = eval(object, scope, deps);
            let key = eval(key, scope, deps);
            match (&target, &key) {
                (Value::List(items), Value::Number(n)) if *n >= 0.0 => {
                    items.get(*n as usize).cloned().unwrap_or_default()
                }
                _ => member(&target, &key.to_display_string(), deps),
            }
        }
        Expr::Call { func, args } => {
            let callee = eval(func, scope, deps);
            let args: Vec<Value> = args.iter().map(|a| eval(a, scope, deps)).collect();
            match callee {
                Value::Function(f) => f.call(&args),
                _ => Value::Undefined,
            }
        }
        Expr::Literal(lit) => match lit {
            Literal::Undefined => Value::Undefined,
            Literal::Null => Value::Null,
            Literal::Bool(b) => Value::Bool(*b),
            Literal::Number(n) => Value::Number(*n),
            Literal::String(s) => Value::string(s),
        },
        Expr::Array(items) => Value::list(items.iter().map(|i| eval(i, scope, deps)).collect::<Vec<_>>()),
        Expr::Unary { op, operand } => {
            let v = eval(operand, scope, deps);
            match op {
                UnaryOp::Not => Value::Bool(!v.is_truthy()),
                UnaryOp::Negate => Value::Number(-to_number(&v)),
                UnaryOp::Plus => Value::Number(to_number(&v)),
            }
        }
        Expr::Binary { op, left, right } => binary(*op, left, right, scope, deps),
        Expr::Conditional { test, yes, no } => {
            if eval(test, scope, deps).is_truthy() {
                eval(yes, scope, deps)
            } else {
                eval(no, scope, deps)
            }
        }
        Expr::Assign { target, value } => {
            let v = eval(value, scope, deps);
            if !assign_expr(target, scope, v.clone()) {
                tracing::warn!(?target, "assignment to a non-assignable expression ignored");
            }
            v
        }
        Expr::Interpolation { parts, expressions } => {
            let mut out = String::new();
            for (i, part) in parts.iter().enumerate() {
                out.push_str(part);
                if let Some(e) = expressions.get(i) {
                    out.push_str(&eval(e, scope, deps).to_display_string());
                }
            }
            Value::string(out)
        }
        Expr::ForOf { iterable, .. } => eval(iterable, scope, deps),
    }
}

fn member(target: &Value, name: &str, deps: &mut Vec<Observable>) -> Value {
    match target {
        Value::Object(obj) => {
            let cell = obj.property(name);
            let v = cell.get_value();
            deps.push(cell);
            v
        }
        Value::List(items) if name == "length" => Value::Number(items.len() as f64),
        Value::String(s) if name == "length" => Value::Number(s.chars().count() as f64),
        _ => Value::Undefined,
    }
}

fn binary(op: BinaryOp, left: &Expr, right: &Expr, scope: &Rc<Scope>, deps: &mut Vec<Observable>) -> Value {
    let l = eval(left, scope, deps);
    match op {
        BinaryOp::Or => {
            return if l.is_truthy() { l } else { eval(right, scope, deps) };
        }
        BinaryOp::And => {
            return if l.is_truthy() { eval(right, scope, deps) } else { l };
        }
        _ => {}
    }
    let r = eval(right, scope, deps);
    match op {
        BinaryOp::Eq => Value::Bool(loose_eq(&l, &r)),
        BinaryOp::NotEq => Value::Bool(!loose_eq(&l, &r)),
        BinaryOp::StrictEq => Value::Bool(l == r),
        BinaryOp::StrictNotEq => Value::Bool(l != r),
        BinaryOp::Lt => Value::Bool(compare(&l, &r) == Some(Ordering::Less)),
        BinaryOp::Gt => Value::Bool(compare(&l, &r) == Some(Ordering::Greater)),
        BinaryOp::Le => Value::Bool(matches!(compare(&l, &r), Some(Ordering::Less | Ordering::Equal))),
        BinaryOp::Ge => Value::Bool(matches!(compare(&l, &r), Some(Ordering::Greater | Ordering::Equal))),
        BinaryOp::Add => match (&l, &r) {
            (Value::String(_), _) | (_, Value::String(_)) => {
                Value::string(format!("{}{}", l.to_display_string(), r.to_display_string()))
            }
            _ => Value::Number(to_number(&l) + to_number(&r)),
        },
        BinaryOp::Sub => Value::Number(to_number(&l) - to_number(&r)),
        BinaryOp::Mul => Value::Number(to_number(&l) * to_number(&r)),
        BinaryOp::Div => Value::Number(to_number(&l) / to_number(&r)),
        BinaryOp::Rem => Value::Number(to_number(&l) % to_number(&r)),
        BinaryOp::Or | BinaryOp::And => Value::Undefined,
    }
}

fn to_number(v: &Value) -> f64 {
    match v {
        Value::Number(n) => *n,
        Value::Bool(true) => 1.0,
        Value::Bool(false) | Value::Null => 0.0,
        Value::String(s) if s.trim().is_empty() => 0.0,
        Value::String(s) => s.trim().parse().unwrap_or(f64::NAN),
        _ => f64::NAN,
    }
}

fn loose_eq(l: &Value, r: &Value) -> bool {
    match (l, r) {
        (a, b) if a.is_nullish() && b.is_nullish() => true,
        (a, b) if a.is_nullish() || b.is_nullish() => false,
        (Value::Number(_), Value::String(_)) | (Value::String(_), Value::Number(_)) | (Value::Bool(_), _) | (_, Value::Bool(_)) => {
            to_number(l) == to_number(r)
        }
        _ => l == r,
    }
}

fn compare(l: &Value, r: &Value) -> Option<Ordering> {
    match (l, r) {
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => to_number(l).partial_cmp(&to_number(r)),
    }
}
