use super::{RemoteQueue, RemoteQueueError};
use crate::record::Record;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// In-process stand-in for a remote FIFO, for single-process setups and tests
#[derive(Debug, Default)]
pub struct MemoryRemoteQueue {
    items: Mutex<VecDeque<Record>>,
}

impl MemoryRemoteQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items().len()
    }

    // Each critical section is a single deque call, so a poisoned lock still holds a valid queue
    fn items(&self) -> MutexGuard<'_, VecDeque<Record>> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl RemoteQueue for MemoryRemoteQueue {
    async fn push(&self, record: &Record) -> Result<(), RemoteQueueError> {
        self.items().push_back(record.clone());
        Ok(())
    }

    async fn pop(&self) -> Result<Option<Record>, RemoteQueueError> {
        Ok(self.items().pop_front())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fifo() {
        let queue = MemoryRemoteQueue::new();
        queue.push(&Record::new("a")).await.unwrap();
        queue.push(&Record::new("b")).await.unwrap();
        assert_eq!(queue.len(), 2);

        assert_eq!(queue.pop().await.unwrap().unwrap().content, "a");
        assert_eq!(queue.pop().await.unwrap().unwrap().content, "b");
        assert!(queue.pop().await.unwrap().is_none());
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_push_after_poisoned_lock_is_kept() {
        let queue = std::sync::Arc::new(MemoryRemoteQueue::new());

        let poisoner = queue.clone();
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.items.lock().unwrap();
            panic!("poison the lock");
        })
        .join();
        assert!(queue.items.is_poisoned());

        queue.push(&Record::new("survivor")).await.unwrap();
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.pop().await.unwrap().unwrap().content, "survivor");
    }
}
