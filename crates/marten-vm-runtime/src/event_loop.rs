//! Macrotask event loop
//!
//! Microtasks belong to the context and drain between VM steps; this loop
//! adds the outer macrotask ring the embedder drives. Each macrotask runs to
//! completion, then the context's microtask queue is drained (which also
//! services pending finalization sweeps).

use std::collections::VecDeque;

use marten_vm_core::Context;

/// A macrotask.
pub type Macrotask = Box<dyn FnOnce(&mut Context)>;

/// A single-threaded macrotask queue.
pub struct EventLoop {
    tasks: VecDeque<Macrotask>,
}

impl EventLoop {
    /// Create an empty loop.
    pub fn new() -> Self {
        Self {
            tasks: VecDeque::new(),
        }
    }

    /// Queue a macrotask.
    pub fn post<F>(&mut self, task: F)
    where
        F: FnOnce(&mut Context) + 'static,
    {
        self.tasks.push_back(Box::new(task));
    }

    /// Number of queued macrotasks.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Whether the loop has no queued macrotasks.
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Run one macrotask and drain microtasks after it. Returns false when
    /// the queue was empty.
    pub fn turn(&mut self, cx: &mut Context) -> bool {
        let Some(task) = self.tasks.pop_front() else {
            // Even an idle turn services pending finalization sweeps.
            cx.process_microtasks();
            return false;
        };
        tracing::trace!("event loop turn");
        task(cx);
        cx.process_microtasks();
        true
    }

    /// Run until no macrotasks remain.
    pub fn run_until_idle(&mut self, cx: &mut Context) {
        while self.turn(cx) {}
    }
}

impl Default for EventLoop {
    fn default() -> Self {
        Self::new()
    }
}
