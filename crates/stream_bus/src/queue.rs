//! A bounded, drop-oldest delivery queue. Plain `tokio::mpsc` can only drop
//! the newest item when full (`try_send` failing), but §4.5 calls for
//! dropping the *oldest* queued item instead — so publishers never block
//! and subscribers always see the freshest tail. Built directly on a
//! `Mutex<VecDeque<_>>` plus `Notify` rather than a crate dependency, since
//! the policy (evict-front-on-overflow) isn't what any standard channel
//! implements.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use model::subscription::StreamItem;
use tokio::sync::Notify;

struct QueueState {
    items: VecDeque<StreamItem>,
    closed: bool,
}

#[derive(Clone)]
pub struct QueueSender {
    state: Arc<Mutex<QueueState>>,
    notify: Arc<Notify>,
    capacity: usize,
}

pub struct QueueReceiver {
    state: Arc<Mutex<QueueState>>,
    notify: Arc<Notify>,
}

impl QueueSender {
    /// Enqueues `item`, evicting the oldest queued item if already at
    /// capacity. Returns `true` iff an item was dropped to make room.
    pub fn push(&self, item: StreamItem) -> bool {
        let dropped = {
            let mut guard = self.state.lock().expect("queue mutex poisoned");
            let dropped = guard.items.len() >= self.capacity;
            if dropped {
                guard.items.pop_front();
            }
            guard.items.push_back(item);
            dropped
        };
        self.notify.notify_one();
        dropped
    }

    pub fn close(&self) {
        {
            let mut guard = self.state.lock().expect("queue mutex poisoned");
            guard.closed = true;
        }
        self.notify.notify_waiters();
    }
}

impl QueueReceiver {
    /// Awaits the next item, or `None` once the queue is closed and drained.
    pub async fn recv(&mut self) -> Option<StreamItem> {
        loop {
            {
                let mut guard = self.state.lock().expect("queue mutex poisoned");
                if let Some(item) = guard.items.pop_front() {
                    return Some(item);
                }
                if guard.closed {
                    return None;
                }
            }
            self.notify.notified().await;
        }
    }
}

pub fn channel(capacity: usize) -> (QueueSender, QueueReceiver) {
    let state = Arc::new(Mutex::new(QueueState {
        items: VecDeque::with_capacity(capacity.min(256)),
        closed: false,
    }));
    let notify = Arc::new(Notify::new());
    (
        QueueSender {
            state: state.clone(),
            notify: notify.clone(),
            capacity,
        },
        QueueReceiver { state, notify },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn heartbeat() -> StreamItem {
        StreamItem::Heartbeat { t: Utc::now() }
    }

    #[tokio::test]
    async fn delivers_in_fifo_order() {
        let (tx, mut rx) = channel(4);
        for _ in 0..3 {
            tx.push(heartbeat());
        }
        tx.close();
        let mut count = 0;
        while rx.recv().await.is_some() {
            count += 1;
        }
        assert_eq!(count, 3);
    }

    #[tokio::test]
    async fn drops_oldest_when_full() {
        let (tx, mut rx) = channel(2);
        assert!(!tx.push(heartbeat()));
        assert!(!tx.push(heartbeat()));
        assert!(tx.push(heartbeat()));
        tx.close();
        let mut count = 0;
        while rx.recv().await.is_some() {
            count += 1;
        }
        assert_eq!(count, 2);
    }
}
