//! Destinations for records.
//!
//! A [`Sink`] persists or displays records one at a time. A [`SinkJob`]
//! drains one consumer queue of the router into one sink on a blocking
//! thread, until the queue is closed and empty.

pub mod csv;
pub mod stream;

use crate::record::Record;
use crate::router::ConsumerQueue;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

pub use self::csv::{CsvWriter, SinkError};
pub use self::stream::StreamSink;

/// A record destination.
///
/// Failures are reported through the return value only; a sink that fails to
/// write one record keeps accepting the next.
pub trait Sink: Send {
    /// Persist one record. Returns `false` if it was not written.
    fn write(&mut self, record: &Record) -> bool;

    /// Release the destination. Returns `false` if it was already closed.
    fn close(&mut self) -> bool;
}

/// A running consumer loop.
#[derive(Debug)]
pub struct SinkJob {
    name: String,
    handle: JoinHandle<usize>,
}

impl SinkJob {
    /// Start draining `queue` into `sink`.
    ///
    /// The loop ends once every sender of the queue is gone, which happens
    /// when the consumer is unregistered from the router. Everything queued
    /// before that is still written, then the sink is closed.
    pub fn spawn(name: &str, mut queue: ConsumerQueue, mut sink: Box<dyn Sink>) -> Self {
        let job = name.to_string();
        let handle = tokio::task::spawn_blocking(move || {
            let mut written = 0;
            while let Some(record) = queue.blocking_recv() {
                if sink.write(&record) {
                    written += 1;
                } else {
                    warn!(job = %job, record = %record, "could not write record");
                }
            }
            if !sink.close() {
                debug!(job = %job, "sink was already closed");
            }
            debug!(job = %job, written, "sink job finished");
            written
        });

        Self {
            name: name.to_string(),
            handle,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Wait for the job to drain its queue. Returns the number of records
    /// written successfully.
    pub async fn join(self) -> usize {
        match self.handle.await {
            Ok(written) => written,
            Err(e) => {
                error!(job = %self.name, error = %e, "sink job ended abnormally");
                0
            }
        }
    }
}
