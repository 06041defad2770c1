//! The command execution protocol.
//!
//! Every node of a compiled morphline implements [`Command`]. A command
//! receives a record together with its *continuation*: the rest of the
//! enclosing chain plus everything after it, lent for the duration of one
//! call.
//!
//! ```text
//!            ┌─────────┐   forward   ┌─────────┐   forward   ┌──────┐
//! record ──▶ │ cmd [0] │ ──────────▶ │ cmd [1] │ ──────────▶ │ tail │
//!            └─────────┘             └─────────┘             └──────┘
//!                 ▲ process(record, Chain{ [1..], tail })
//! ```
//!
//! Ownership only flows downward. A command never holds a reference to its
//! parent or to its child; the child exists only inside `process`.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::RuntimeResult;
use crate::record::Record;

// =============================================================================
// Notifications
// =============================================================================

/// Lifecycle events broadcast through the whole tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Notification {
    StartSession,
    CommitTransaction,
    RollbackTransaction,
    Shutdown,
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Notification::StartSession => "start_session",
            Notification::CommitTransaction => "commit_transaction",
            Notification::RollbackTransaction => "rollback_transaction",
            Notification::Shutdown => "shutdown",
        };
        f.write_str(name)
    }
}

// =============================================================================
// Contract
// =============================================================================

/// Receives records emitted by a command.
pub trait Downstream {
    /// Hand a record to the rest of the tree.
    ///
    /// `Ok(true)` if it was accepted, `Ok(false)` if something downstream
    /// filtered it, `Err` on a runtime fault.
    fn forward(&mut self, record: Record) -> RuntimeResult<bool>;
}

/// A processing step.
pub trait Command: Send {
    /// Configured name, e.g. `addValues`.
    fn name(&self) -> &str;

    /// Transform, filter or multiply `record`, emitting results into `child`.
    fn process(&mut self, record: Record, child: &mut dyn Downstream) -> RuntimeResult<bool>;

    /// React to a lifecycle event and pass it on to owned sub-chains.
    fn notify(&mut self, _notification: Notification) -> RuntimeResult<()> {
        Ok(())
    }
}

/// Host-side end of a morphline.
pub trait Sink: Downstream + Send {
    fn notify(&mut self, _notification: Notification) -> RuntimeResult<()> {
        Ok(())
    }
}

// =============================================================================
// Chains
// =============================================================================

/// A borrowed run of sibling commands followed by a tail.
///
/// Forwarding into a chain runs its first command with the remaining
/// commands (and the tail) as that command's child.
pub struct Chain<'a, 't> {
    commands: &'a mut [Box<dyn Command>],
    tail: &'a mut (dyn Downstream + 't),
}

impl<'a, 't> Chain<'a, 't> {
    pub fn new(commands: &'a mut [Box<dyn Command>], tail: &'a mut (dyn Downstream + 't)) -> Self {
        Self { commands, tail }
    }
}

impl Downstream for Chain<'_, '_> {
    fn forward(&mut self, record: Record) -> RuntimeResult<bool> {
        match self.commands.split_first_mut() {
            None => self.tail.forward(record),
            Some((first, rest)) => {
                let mut next = Chain {
                    commands: rest,
                    tail: &mut *self.tail,
                };
                first.process(record, &mut next)
            }
        }
    }
}

/// Run `record` through `commands`, ending in `tail`.
pub fn run_chain(
    commands: &mut [Box<dyn Command>],
    record: Record,
    tail: &mut dyn Downstream,
) -> RuntimeResult<bool> {
    Chain::new(commands, tail).forward(record)
}

/// Notify every command of a chain in order.
pub fn notify_chain(commands: &mut [Box<dyn Command>], notification: Notification) -> RuntimeResult<()> {
    for command in commands.iter_mut() {
        command.notify(notification)?;
    }
    Ok(())
}

// =============================================================================
// Helper sinks
// =============================================================================

/// Accepts and drops every record.
#[derive(Debug, Default, Clone, Copy)]
pub struct Discard;

impl Downstream for Discard {
    fn forward(&mut self, _record: Record) -> RuntimeResult<bool> {
        Ok(true)
    }
}

impl Sink for Discard {}

#[derive(Debug, Default)]
struct CollectorState {
    records: Vec<Record>,
    notifications: Vec<Notification>,
}

/// Sink that keeps every emitted record.
///
/// Clones share the same buffer, so a host can keep one handle and hand
/// the other to the morphline.
#[derive(Debug, Default, Clone)]
pub struct Collector {
    state: Arc<Mutex<CollectorState>>,
}

impl Collector {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, CollectorState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::warn!("collector lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    /// Snapshot of the collected records.
    pub fn records(&self) -> Vec<Record> {
        self.lock().records.clone()
    }

    pub fn len(&self) -> usize {
        self.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().records.is_empty()
    }

    pub fn first_record(&self) -> Option<Record> {
        self.lock().records.first().cloned()
    }

    /// Remove and return the collected records.
    pub fn take(&self) -> Vec<Record> {
        std::mem::take(&mut self.lock().records)
    }

    /// Drop collected records and notification counts.
    pub fn reset(&self) {
        let mut state = self.lock();
        state.records.clear();
        state.notifications.clear();
    }

    /// How many times `notification` reached this sink.
    pub fn notification_count(&self, notification: Notification) -> usize {
        self.lock()
            .notifications
            .iter()
            .filter(|n| **n == notification)
            .count()
    }

    pub fn num_start_events(&self) -> usize {
        self.notification_count(Notification::StartSession)
    }
}

impl Downstream for Collector {
    fn forward(&mut self, record: Record) -> RuntimeResult<bool> {
        self.lock().records.push(record);
        Ok(true)
    }
}

impl Sink for Collector {
    fn notify(&mut self, notification: Notification) -> RuntimeResult<()> {
        self.lock().notifications.push(notification);
        Ok(())
    }
}
