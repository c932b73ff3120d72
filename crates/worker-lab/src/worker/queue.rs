//! Shared task queue
//!
//! A FIFO multi-producer/multi-consumer channel. It is the only
//! synchronization primitive used to hand tasks to workers: each task is
//! delivered to exactly one receiver. Closing is explicit because every
//! handle keeps a sender alive.

use std::fmt;
use std::str::FromStr;

use flume::{Receiver, Sender};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::task::Task;

/// Queue sizing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueCapacity {
    /// Rendezvous: every submit waits until a worker takes the task
    Unbuffered,
    /// Holds up to N tasks
    Bounded(usize),
    /// Never blocks producers
    Unbounded,
}

impl QueueCapacity {
    /// Capacity from a raw size; `0` means unbuffered
    pub fn from_size(size: usize) -> Self {
        if size == 0 {
            Self::Unbuffered
        } else {
            Self::Bounded(size)
        }
    }

    /// Maximum number of queued tasks, `None` when unbounded
    pub fn slots(&self) -> Option<usize> {
        match self {
            Self::Unbuffered => Some(0),
            Self::Bounded(n) => Some((*n).max(1)),
            Self::Unbounded => None,
        }
    }
}

impl fmt::Display for QueueCapacity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unbuffered => f.write_str("0"),
            Self::Bounded(n) => write!(f, "{n}"),
            Self::Unbounded => f.write_str("unbounded"),
        }
    }
}

impl FromStr for QueueCapacity {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("unbounded") {
            return Ok(Self::Unbounded);
        }
        s.parse::<usize>().map(Self::from_size)
    }
}

/// Push rejected because the queue is closed
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("task queue is closed")]
pub struct QueueClosed;

/// Cloneable handle to the task queue
#[derive(Clone)]
pub struct TaskQueue {
    tx: Sender<Task>,
    rx: Receiver<Task>,
    closed: CancellationToken,
}

impl TaskQueue {
    pub fn new(capacity: QueueCapacity) -> Self {
        let (tx, rx) = match capacity.slots() {
            Some(slots) => flume::bounded(slots),
            None => flume::unbounded(),
        };
        Self {
            tx,
            rx,
            closed: CancellationToken::new(),
        }
    }

    /// Enqueue a task, waiting while the queue is full
    ///
    /// A pending push is abandoned (and the task dropped) when the queue
    /// closes before a slot or a receiver frees up.
    pub async fn push(&self, task: Task) -> Result<(), QueueClosed> {
        if self.closed.is_cancelled() {
            return Err(QueueClosed);
        }
        tokio::select! {
            biased;
            sent = self.tx.send_async(task) => sent.map_err(|_| QueueClosed),
            _ = self.closed.cancelled() => Err(QueueClosed),
        }
    }

    /// Dequeue the next task
    ///
    /// Returns `None` once the queue is closed and fully drained.
    pub async fn pop(&self) -> Option<Task> {
        tokio::select! {
            biased;
            received = self.rx.recv_async() => received.ok(),
            _ = self.closed.cancelled() => self.rx.try_recv().ok(),
        }
    }

    /// Stop accepting new tasks; queued tasks can still be popped
    ///
    /// Returns `false` if the queue was already closed.
    pub fn close(&self) -> bool {
        if self.closed.is_cancelled() {
            return false;
        }
        self.closed.cancel();
        true
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// Number of tasks waiting
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::task::Operation;

    #[test]
    fn test_capacity_parsing() {
        assert_eq!("0".parse::<QueueCapacity>().unwrap(), QueueCapacity::Unbuffered);
        assert_eq!("16".parse::<QueueCapacity>().unwrap(), QueueCapacity::Bounded(16));
        assert_eq!(
            "Unbounded".parse::<QueueCapacity>().unwrap(),
            QueueCapacity::Unbounded
        );
        assert!("lots".parse::<QueueCapacity>().is_err());
        assert_eq!(QueueCapacity::Unbuffered.slots(), Some(0));
        assert_eq!(QueueCapacity::Unbounded.slots(), None);
    }

    #[tokio::test]
    async fn test_fifo_and_drain_after_close() {
        let queue = TaskQueue::new(QueueCapacity::Bounded(4));
        for id in 0..3 {
            queue.push(Task::new(id, vec![], Operation::Sum)).await.unwrap();
        }
        assert_eq!(queue.len(), 3);

        assert!(queue.close());
        assert!(!queue.close());
        assert!(queue.is_closed());

        let rejected = queue.push(Task::new(9, vec![], Operation::Sum)).await;
        assert_eq!(rejected, Err(QueueClosed));

        let mut ids = Vec::new();
        while let Some(task) = queue.pop().await {
            ids.push(task.id());
        }
        assert_eq!(ids, vec![0, 1, 2]);
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_unbuffered_push_waits_for_receiver() {
        let queue = TaskQueue::new(QueueCapacity::Unbuffered);

        // Nobody is receiving: even the first push cannot complete
        let first = tokio::time::timeout(
            Duration::from_millis(50),
            queue.push(Task::new(0, vec![], Operation::Sum)),
        )
        .await;
        assert!(first.is_err());
        assert_eq!(queue.len(), 0);

        let receiver = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.pop().await.map(|task| task.id()) })
        };
        tokio::time::timeout(
            Duration::from_secs(1),
            queue.push(Task::new(1, vec![], Operation::Sum)),
        )
        .await
        .expect("push should complete once a receiver waits")
        .unwrap();
        assert_eq!(receiver.await.unwrap(), Some(1));
    }

    #[tokio::test]
    async fn test_close_releases_pending_push_and_pop() {
        let queue = TaskQueue::new(QueueCapacity::Unbuffered);

        let pusher = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.push(Task::new(0, vec![], Operation::Sum)).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!pusher.is_finished());

        queue.close();
        let pushed = pusher.await.unwrap();
        let popped = queue.pop().await;
        // The pending task is either rejected or handed over, never both
        assert_eq!(pushed.is_ok(), popped.is_some());
        assert!(queue.pop().await.is_none());
    }
}
