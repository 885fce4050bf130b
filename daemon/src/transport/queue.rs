// Copyright 2024 The Android Open Source Project
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! FIFO queue with blocking pop and cooperative close.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};

struct Inner<T> {
    queue: VecDeque<T>,
    active: bool,
}

/// Unbounded multi-producer FIFO.
///
/// `stop` drains the queue and wakes every waiter; pops after stop
/// return `None` and pushes are discarded. FIFO order holds per
/// producer.
pub struct BlockingQueue<T> {
    inner: Mutex<Inner<T>>,
    available: Condvar,
}

impl<T> BlockingQueue<T> {
    pub fn new() -> Self {
        BlockingQueue {
            inner: Mutex::new(Inner { queue: VecDeque::new(), active: true }),
            available: Condvar::new(),
        }
    }

    /// Appends a value. Silently discarded once the queue is stopped.
    pub fn push(&self, value: T) {
        let mut inner = self.inner.lock().unwrap();
        if inner.active {
            inner.queue.push_back(value);
            self.available.notify_one();
        }
    }

    /// Blocks until a value is available or the queue is stopped.
    pub fn wait_and_pop(&self) -> Option<T> {
        let mut inner = self.inner.lock().unwrap();
        loop {
            if !inner.active {
                return None;
            }
            if let Some(value) = inner.queue.pop_front() {
                return Some(value);
            }
            inner = self.available.wait(inner).unwrap();
        }
    }

    /// Closes the queue: pending values are dropped and all waiters
    /// wake up with `None`.
    pub fn stop(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.active = false;
        inner.queue.clear();
        self.available.notify_all();
    }

    pub fn active(&self) -> bool {
        self.inner.lock().unwrap().active
    }
}

impl<T> Default for BlockingQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_fifo_order() {
        let queue = BlockingQueue::new();
        for i in 0..10 {
            queue.push(i);
        }
        for i in 0..10 {
            assert_eq!(queue.wait_and_pop(), Some(i));
        }
    }

    #[test]
    fn test_pop_blocks_until_push() {
        let queue = Arc::new(BlockingQueue::new());
        let producer = Arc::clone(&queue);
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            producer.push(7u32);
        });
        assert_eq!(queue.wait_and_pop(), Some(7));
        handle.join().unwrap();
    }

    #[test]
    fn test_stop_wakes_waiter() {
        let queue = Arc::new(BlockingQueue::<u32>::new());
        let waiter = Arc::clone(&queue);
        let handle = thread::spawn(move || waiter.wait_and_pop());
        thread::sleep(Duration::from_millis(20));
        queue.stop();
        assert_eq!(handle.join().unwrap(), None);
    }

    #[test]
    fn test_stop_drains_pending_values() {
        let queue = BlockingQueue::new();
        queue.push(1);
        queue.push(2);
        queue.stop();
        assert_eq!(queue.wait_and_pop(), None);
    }

    #[test]
    fn test_push_after_stop_is_discarded() {
        let queue = BlockingQueue::new();
        queue.stop();
        assert!(!queue.active());
        queue.push(1);
        assert_eq!(queue.wait_and_pop(), None);
    }
}
