use std::cell::{Cell, RefCell};
use std::collections::VecDeque;

type Task = Box<dyn FnOnce()>;

/// Queue batching DOM writes triggered by observer changes.
///
/// Tasks queued while a flush is running are processed by that same flush.
#[derive(Default)]
pub struct WriteQueue {
    tasks: RefCell<VecDeque<Task>>,
    flushing: Cell<bool>,
}

impl WriteQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue(&self, task: impl FnOnce() + 'static) {
        self.tasks.borrow_mut().push_back(Box::new(task));
    }

    pub fn len(&self) -> usize {
        self.tasks.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.borrow().is_empty()
    }

    /// Run queued tasks in FIFO order. Returns how many ran.
    pub fn flush(&self) -> usize {
        // Prevent re-entrant flush; the outer loop drains anything queued meanwhile.
        if self.flushing.replace(true) {
            return 0;
        }
        let mut ran = 0;
        loop {
            let next = self.tasks.borrow_mut().pop_front();
            let Some(task) = next else { break };
            task();
            ran += 1;
        }
        self.flushing.set(false);
        ran
    }
}
