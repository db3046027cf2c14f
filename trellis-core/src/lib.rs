//! Reactive primitives and async-hook coordination shared by the template
//! runtime: observable properties, dynamic values, and settle-once handles.

pub mod lifecycle;
pub mod observable;
pub mod value;

pub use lifecycle::{Deferred, HookError, HookOutcome, JoinCounter, Settlement};
pub use observable::{Observable, Subscription};
pub use value::{Func, Object, Value};
