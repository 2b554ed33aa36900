use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};

/// A single movement request for both axes.
///
/// Direction is encoded in the sign of the revolution counts. The command is
/// a plain value: it is built once and consumed once, either immediately or
/// after sitting in the [`CommandQueue`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MoveCommand {
    pub revs_dec: f64,
    pub revs_ra: f64,
    /// Edge delay at the start of the movement, per axis (microseconds)
    pub delay_start_dec_us: u64,
    pub delay_start_ra_us: u64,
    /// Edge delay at full speed, per axis (microseconds)
    pub delay_end_dec_us: u64,
    pub delay_end_ra_us: u64,
    pub microstepping: bool,
}

/// Bounded FIFO of pending movement commands.
///
/// `push` blocks while the queue is full; this is deliberate backpressure,
/// not an error path. The draining side (`trigger()`) must therefore never
/// issue a blocking `push` of its own while the queue is full, or it would
/// deadlock against itself.
#[derive(Debug)]
pub struct CommandQueue {
    inner: Mutex<VecDeque<MoveCommand>>,
    space: Condvar,
    capacity: usize,
}

impl CommandQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(VecDeque::with_capacity(capacity)),
            space: Condvar::new(),
            capacity,
        }
    }

    /// Append a command, blocking while the queue is at capacity.
    pub fn push(&self, command: MoveCommand) {
        let mut queue = self.inner.lock().unwrap();
        while queue.len() >= self.capacity {
            queue = self.space.wait(queue).unwrap();
        }
        queue.push_back(command);
    }

    /// Remove and return the oldest command, if any.
    pub fn try_pop(&self) -> Option<MoveCommand> {
        let mut queue = self.inner.lock().unwrap();
        let command = queue.pop_front();
        if command.is_some() {
            self.space.notify_one();
        }
        command
    }

    /// Drop all pending commands and release any blocked submitters.
    pub fn clear(&self) {
        let mut queue = self.inner.lock().unwrap();
        queue.clear();
        self.space.notify_all();
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
