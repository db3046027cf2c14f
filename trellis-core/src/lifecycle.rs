// trellis-core/src/lifecycle.rs
//! Coordination primitives for possibly-async lifecycle hooks.
//!
//! Everything here is single-threaded and cooperative: a [`Deferred`] is settled
//! explicitly by whoever owns it, and continuations registered with
//! [`Deferred::on_settled`] run synchronously at that moment.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};

/// Rejection reason carried by a failed hook.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct HookError {
    message: String,
}

impl HookError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

pub type Settlement = Result<(), HookError>;

type Continuation = Box<dyn FnOnce(Settlement)>;

#[derive(Default)]
struct DeferredState {
    outcome: Option<Settlement>,
    continuations: Vec<Continuation>,
    wakers: Vec<Waker>,
}

/// A settle-once completion handle, shared by cloning.
#[derive(Clone, Default)]
pub struct Deferred {
    state: Rc<RefCell<DeferredState>>,
}

impl Deferred {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resolved() -> Self {
        let d = Self::new();
        d.resolve();
        d
    }

    pub fn rejected(err: HookError) -> Self {
        let d = Self::new();
        d.reject(err);
        d
    }

    pub fn resolve(&self) {
        self.settle(Ok(()));
    }

    pub fn reject(&self, err: HookError) {
        self.settle(Err(err));
    }

    pub fn is_pending(&self) -> bool {
        self.state.borrow().outcome.is_none()
    }

    pub fn outcome(&self) -> Option<Settlement> {
        self.state.borrow().outcome.clone()
    }

    /// Run `f` once settled; runs immediately when already settled.
    pub fn on_settled(&self, f: impl FnOnce(Settlement) + 'static) {
        let settled = self.state.borrow().outcome.clone();
        match settled {
            Some(outcome) => f(outcome),
            None => self.state.borrow_mut().continuations.push(Box::new(f)),
        }
    }

    pub fn ptr_eq(&self, other: &Deferred) -> bool {
        Rc::ptr_eq(&self.state, &other.state)
    }

    fn settle(&self, outcome: Settlement) {
        // Take continuations out before running them: they may register more
        // continuations or settle other handles.
        let (continuations, wakers) = {
            let mut state = self.state.borrow_mut();
            if state.outcome.is_some() {
                return;
            }
            state.outcome = Some(outcome.clone());
            (
                std::mem::take(&mut state.continuations),
                std::mem::take(&mut state.wakers),
            )
        };
        for waker in wakers {
            waker.wake();
        }
        for f in continuations {
            f(outcome.clone());
        }
    }
}

impl fmt::Debug for Deferred {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.outcome() {
            None => write!(f, "Deferred(pending)"),
            Some(Ok(())) => write!(f, "Deferred(resolved)"),
            Some(Err(e)) => write!(f, "Deferred(rejected: {e})"),
        }
    }
}

impl Future for Deferred {
    type Output = Settlement;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut state = self.state.borrow_mut();
        match &state.outcome {
            Some(outcome) => Poll::Ready(outcome.clone()),
            None => {
                state.wakers.push(cx.waker().clone());
                Poll::Pending
            }
        }
    }
}

/// Result of a lifecycle hook or lifecycle operation.
#[derive(Debug, Clone, Default)]
pub enum HookOutcome {
    /// Finished synchronously.
    #[default]
    Done,
    /// Finishes when the handle settles.
    Pending(Deferred),
}

impl HookOutcome {
    pub fn failed(err: HookError) -> Self {
        HookOutcome::Pending(Deferred::rejected(err))
    }

    pub fn is_done(&self) -> bool {
        matches!(self, HookOutcome::Done)
    }

    pub fn deferred(&self) -> Option<&Deferred> {
        match self {
            HookOutcome::Done => None,
            HookOutcome::Pending(d) => Some(d),
        }
    }
}

impl From<Deferred> for HookOutcome {
    fn from(d: Deferred) -> Self {
        HookOutcome::Pending(d)
    }
}

/// Counting join: `enter` once per in-flight task, `leave` when it settles.
/// `leave` reports the transition back to idle so the caller can run the join
/// continuation exactly once per quiescent point.
#[derive(Debug, Default)]
pub struct JoinCounter {
    pending: Cell<usize>,
}

impl JoinCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enter(&self) {
        self.pending.set(self.pending.get() + 1);
    }

    /// Returns `true` when this call brought the count back to zero.
    pub fn leave(&self) -> bool {
        let current = self.pending.get();
        if current == 0 {
            tracing::warn!("JoinCounter::leave called while idle");
            return false;
        }
        self.pending.set(current - 1);
        current == 1
    }

    pub fn pending(&self) -> usize {
        self.pending.get()
    }

    pub fn is_idle(&self) -> bool {
        self.pending.get() == 0
    }

    pub fn reset(&self) {
        self.pending.set(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn continuation_runs_once_on_settle() {
        let d = Deferred::new();
        let hits = Rc::new(Cell::new(0));
        let h = hits.clone();
        d.on_settled(move |r| {
            assert!(r.is_ok());
            h.set(h.get() + 1);
        });
        assert_eq!(hits.get(), 0);
        d.resolve();
        d.resolve();
        d.reject(HookError::new("late"));
        assert_eq!(hits.get(), 1);
        assert_eq!(d.outcome(), Some(Ok(())));
    }

    #[test]
    fn join_counter_reports_idle_transition() {
        let join = JoinCounter::new();
        join.enter();
        join.enter();
        assert!(!join.leave());
        assert!(join.leave());
        assert!(join.is_idle());
        assert!(!join.leave());
    }
}
