//! Human-readable record output to any byte stream.

use super::Sink;
use crate::record::Record;
use std::io::{self, Write};
use tracing::debug;

/// Writes every record on its own line, formatted like
/// `[TIME=..;NAME=..;UID=..;VAR=..;RAW=..;UNIT=..]`.
#[derive(Debug)]
pub struct StreamSink<W: Write + Send> {
    out: Option<W>,
}

impl<W: Write + Send> StreamSink<W> {
    pub fn new(out: W) -> Self {
        Self { out: Some(out) }
    }

    /// Give back the stream, if the sink was not closed.
    pub fn into_inner(mut self) -> Option<W> {
        self.out.take()
    }
}

impl StreamSink<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

fn write_record(out: &mut dyn Write, record: &Record) -> io::Result<()> {
    writeln!(out, "{record}")?;
    out.flush()
}

impl<W: Write + Send> Sink for StreamSink<W> {
    fn write(&mut self, record: &Record) -> bool {
        match self.out.as_mut() {
            Some(out) => write_record(out, record).is_ok(),
            None => false,
        }
    }

    fn close(&mut self) -> bool {
        match self.out.take() {
            Some(mut out) => {
                if let Err(e) = out.flush() {
                    debug!(error = %e, "could not flush output stream");
                }
                true
            }
            None => false,
        }
    }
}
