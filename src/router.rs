//! Fan-out of records to all registered consumers.
//!
//! Every consumer gets its own unbounded FIFO queue. Publishing never blocks
//! and never waits for a consumer, so a slow sink cannot stall the samplers.

use crate::record::Record;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::warn;

/// The receiving end of a consumer's queue.
///
/// Yields `None` once the consumer was unregistered and everything queued
/// before that was received.
pub type ConsumerQueue = UnboundedReceiver<Record>;

/// Shared registry of consumer queues. Cloning yields another handle to the
/// same registry.
#[derive(Debug, Clone, Default)]
pub struct Router {
    queues: Arc<Mutex<BTreeMap<String, UnboundedSender<Record>>>>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, UnboundedSender<Record>>> {
        // The map stays consistent even if a holder panicked
        self.queues.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a consumer and return its queue.
    ///
    /// Registering a name twice replaces the previous queue; its receiver
    /// sees the end of the stream.
    pub fn register(&self, name: &str) -> ConsumerQueue {
        let (tx, rx) = mpsc::unbounded_channel();
        if self.lock().insert(name.to_string(), tx).is_some() {
            warn!(consumer = name, "consumer was already registered, replacing its queue");
        }
        rx
    }

    /// Remove a consumer. Records already queued stay receivable.
    ///
    /// Returns `false` if no consumer of that name was registered.
    pub fn unregister(&self, name: &str) -> bool {
        let removed = self.lock().remove(name).is_some();
        if !removed {
            warn!(consumer = name, "consumer was not in the data queue");
        }
        removed
    }

    /// Push `record` onto every registered queue. Returns the number of
    /// queues it was delivered to.
    pub fn publish(&self, record: Record) -> usize {
        let mut queues = self.lock();
        let mut delivered = 0;
        queues.retain(|name, tx| match tx.send(record.clone()) {
            Ok(()) => {
                delivered += 1;
                true
            }
            Err(_) => {
                warn!(consumer = name.as_str(), "consumer dropped its queue, removing it");
                false
            }
        });
        delivered
    }

    /// Names of the registered consumers.
    pub fn consumers(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::record;
    use crate::value::Value;

    fn numbered(i: i64) -> Record {
        record("Temperature", Value::Int(i), "°C/100")
    }

    #[test]
    fn test_publish_without_consumers_is_noop() {
        let router = Router::new();
        assert_eq!(router.publish(numbered(1)), 0);
        assert!(router.consumers().is_empty());
    }

    #[test]
    fn test_publish_reaches_every_consumer() {
        let router = Router::new();
        let mut csv = router.register("CSV-Writer");
        let mut gui = router.register("GUI");

        assert_eq!(router.publish(numbered(1)), 2);

        assert_eq!(csv.try_recv().unwrap(), numbered(1));
        assert_eq!(gui.try_recv().unwrap(), numbered(1));
        assert!(csv.try_recv().is_err());
    }

    #[test]
    fn test_fifo_per_consumer() {
        let router = Router::new();
        let mut queue = router.register("CSV-Writer");

        for i in 0..100 {
            router.publish(numbered(i));
        }

        for i in 0..100 {
            assert_eq!(queue.try_recv().unwrap(), numbered(i));
        }
    }

    #[test]
    fn test_late_consumer_gets_no_replay() {
        let router = Router::new();
        let mut early = router.register("early");
        router.publish(numbered(1));

        let mut late = router.register("late");
        router.publish(numbered(2));

        assert_eq!(early.try_recv().unwrap(), numbered(1));
        assert_eq!(early.try_recv().unwrap(), numbered(2));
        assert_eq!(late.try_recv().unwrap(), numbered(2));
        assert!(late.try_recv().is_err());
    }

    #[test]
    fn test_unregister_drains_then_closes() {
        let router = Router::new();
        let mut queue = router.register("CSV-Writer");
        router.publish(numbered(1));
        router.publish(numbered(2));

        assert!(router.unregister("CSV-Writer"));
        assert_eq!(router.publish(numbered(3)), 0);

        assert_eq!(queue.blocking_recv(), Some(numbered(1)));
        assert_eq!(queue.blocking_recv(), Some(numbered(2)));
        assert_eq!(queue.blocking_recv(), None);
    }

    #[test]
    fn test_unregister_unknown_is_signaled() {
        let router = Router::new();
        assert!(!router.unregister("nobody"));
    }

    #[test]
    fn test_register_twice_replaces_queue() {
        let router = Router::new();
        let mut first = router.register("GUI");
        let mut second = router.register("GUI");

        assert_eq!(router.publish(numbered(1)), 1);
        assert_eq!(first.blocking_recv(), None);
        assert_eq!(second.try_recv().unwrap(), numbered(1));
    }

    #[test]
    fn test_dropped_queue_is_pruned() {
        let router = Router::new();
        let queue = router.register("GUI");
        let _csv = router.register("CSV-Writer");
        drop(queue);

        assert_eq!(router.publish(numbered(1)), 1);
        assert_eq!(router.consumers(), vec!["CSV-Writer".to_string()]);
    }

    #[test]
    fn test_concurrent_publishers() {
        let router = Router::new();
        let mut queue = router.register("CSV-Writer");

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let router = router.clone();
                std::thread::spawn(move || {
                    for i in 0..250 {
                        router.publish(numbered(t * 1000 + i));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let mut per_thread = vec![Vec::new(); 8];
        while let Ok(r) = queue.try_recv() {
            let i = raw_int(&r);
            per_thread[(i / 1000) as usize].push(i % 1000);
        }
        for seen in per_thread {
            // Each publisher's records arrive complete and in order
            assert_eq!(seen, (0..250_i64).collect::<Vec<_>>());
        }
    }

    fn raw_int(r: &Record) -> i64 {
        match &r.raw_value {
            crate::record::RawValue::Value(Value::Int(i)) => *i,
            other => panic!("unexpected raw value {other:?}"),
        }
    }
}
