//! The root of a compiled command tree.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use crate::command::{Command, Downstream, Notification, Sink};
use crate::context::{FaultPolicy, MorphlineContext};
use crate::error::RuntimeResult;
use crate::flow::pipe::Pipe;
use crate::metrics::{Counter, Timer, MetricsRegistry, NUM_FAILURES, NUM_RECORDS, PROCESS_TIME};
use crate::record::Record;

const SCOPE: &str = "morphline";

/// Lends the host sink to the tree as its final continuation.
struct SinkTail<'a>(&'a mut dyn Sink);

impl Downstream for SinkTail<'_> {
    fn forward(&mut self, record: Record) -> RuntimeResult<bool> {
        self.0.forward(record)
    }
}

/// A compiled morphline: the top-level pipe plus the host's sink.
pub struct Morphline {
    id: String,
    pipe: Pipe,
    sink: Box<dyn Sink>,
    context: Arc<MorphlineContext>,
    num_records: Arc<Counter>,
    num_failures: Arc<Counter>,
    process_time: Arc<Timer>,
}

impl fmt::Debug for Morphline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Morphline")
            .field("id", &self.id)
            .field("commands", &self.pipe.len())
            .finish()
    }
}

impl Morphline {
    pub fn new(id: impl Into<String>, pipe: Pipe, sink: Box<dyn Sink>, context: Arc<MorphlineContext>) -> Self {
        let metrics = context.metrics();
        let num_records = metrics.counter(&MetricsRegistry::name(SCOPE, NUM_RECORDS));
        let num_failures = metrics.counter(&MetricsRegistry::name(SCOPE, NUM_FAILURES));
        let process_time = metrics.timer(&MetricsRegistry::name(SCOPE, PROCESS_TIME));
        Self {
            id: id.into(),
            pipe,
            sink,
            context,
            num_records,
            num_failures,
            process_time,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn context(&self) -> &Arc<MorphlineContext> {
        &self.context
    }

    /// Run one record through the tree.
    ///
    /// `Ok(false)` means the record was filtered somewhere along the way.
    pub fn process(&mut self, record: Record) -> RuntimeResult<bool> {
        self.num_records.inc();
        tracing::trace!(morphline = %self.id, record = ?record, "processing record");

        let start = Instant::now();
        let mut tail = SinkTail(self.sink.as_mut());
        let result = self.pipe.process(record, &mut tail);
        self.process_time.record(start.elapsed());

        match result {
            Ok(accepted) => Ok(accepted),
            Err(err) => {
                self.num_failures.inc();
                match self.context.fault_policy() {
                    FaultPolicy::Propagate => Err(err),
                    FaultPolicy::LogAndReject => {
                        tracing::error!(
                            morphline = %self.id,
                            command = %err.command,
                            error = %err,
                            "record rejected after runtime fault"
                        );
                        Ok(false)
                    }
                }
            }
        }
    }

    /// Broadcast `notification` depth-first through the tree, then to the sink.
    pub fn notify(&mut self, notification: Notification) -> RuntimeResult<()> {
        tracing::debug!(morphline = %self.id, notification = %notification, "notify");
        self.pipe.notify(notification)?;
        self.sink.notify(notification)
    }

    pub fn start_session(&mut self) -> RuntimeResult<()> {
        self.notify(Notification::StartSession)
    }

    pub fn commit(&mut self) -> RuntimeResult<()> {
        self.notify(Notification::CommitTransaction)
    }

    pub fn rollback(&mut self) -> RuntimeResult<()> {
        self.notify(Notification::RollbackTransaction)
    }

    pub fn shutdown(&mut self) -> RuntimeResult<()> {
        self.notify(Notification::Shutdown)
    }
}
