//! Diagnostic events emitted around every command execution.
//!
//! A [`DiagnosticSink`] observes four callbacks:
//!
//! - `executing` before the native primitive runs; it may short-circuit the
//!   call by returning [`Interception::Suppress`]
//! - `executed` after a successful (or intercepted) call
//! - `failed` before any error propagates to the caller
//! - `reader_closed` when a result reader releases its connection
//!
//! All events of one call share a [`CorrelationId`].

use std::fmt;
use std::time::Duration;

use auto_impl::auto_impl;
use crossbeam_queue::SegQueue;
use uuid::Uuid;

use crate::command::Operation;
use crate::error::{Error, ErrorKind};
use crate::param::Parameter;
use crate::value::{Column, Row, Value};

/// Opaque token threading one call through its diagnostic events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CorrelationId(Uuid);

impl CorrelationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for CorrelationId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// The call a diagnostic event belongs to
#[derive(Debug, Clone, Copy)]
pub struct CommandEvent<'a> {
    pub correlation_id: CorrelationId,
    pub operation: Operation,
    pub command_text: &'a str,
    pub parameters: &'a [Parameter],
    /// Resolved values in parameter order; empty if resolution did not happen
    pub values: &'a [Value],
    /// Expected result columns, if the caller supplied them
    pub reader_columns: Option<&'a [String]>,
    pub is_async: bool,
    /// Whether sinks may print `values`
    pub log_parameter_values: bool,
}

/// What a successful call produced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutedResult {
    RowsAffected(i64),
    Scalar { has_value: bool },
    Reader { columns: usize },
}

#[derive(Debug, Clone, Copy)]
pub struct CommandExecuted<'a> {
    pub command: CommandEvent<'a>,
    pub duration: Duration,
    pub result: ExecutedResult,
    /// The result came from [`Interception::Suppress`] rather than the engine
    pub intercepted: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct CommandFailed<'a> {
    pub command: CommandEvent<'a>,
    pub duration: Duration,
    pub error: &'a Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReaderClosed {
    pub correlation_id: CorrelationId,
    pub rows_read: u64,
    /// Time between the reader being produced and released
    pub duration: Duration,
    /// All rows were consumed, as opposed to an early close, drop or error
    pub exhausted: bool,
}

/// Decision returned from [`DiagnosticSink::executing`]
#[derive(Debug, Clone, PartialEq)]
pub enum Interception {
    Proceed,
    /// Skip the native call and hand this result to the caller
    Suppress(InterceptedResult),
}

/// A replacement result; its variant must match the call's [`Operation`]
#[derive(Debug, Clone, PartialEq)]
pub enum InterceptedResult {
    RowsAffected(i64),
    Scalar(Option<Value>),
    Rows { columns: Vec<Column>, rows: Vec<Row> },
}

impl InterceptedResult {
    pub fn operation(&self) -> Operation {
        match self {
            InterceptedResult::RowsAffected(_) => Operation::NonQuery,
            InterceptedResult::Scalar(_) => Operation::Scalar,
            InterceptedResult::Rows { .. } => Operation::Reader,
        }
    }
}

/// Receiver of command diagnostics
///
/// Callbacks run on the executing thread and must not block.
#[auto_impl(&, Box, Arc)]
pub trait DiagnosticSink: Send + Sync {
    fn executing(&self, _event: &CommandEvent<'_>) -> Interception {
        Interception::Proceed
    }

    fn executed(&self, _event: &CommandExecuted<'_>) {}

    fn failed(&self, _event: &CommandFailed<'_>) {}

    fn reader_closed(&self, _event: &ReaderClosed) {}
}

/// Discards every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl DiagnosticSink for NullSink {}

/// Forwards events to `tracing`
///
/// This is the default sink of an [`ExecutionContext`](crate::ExecutionContext).
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn executing(&self, event: &CommandEvent<'_>) -> Interception {
        let names: Vec<&str> = event.parameters.iter().map(Parameter::name).collect();
        if event.log_parameter_values {
            tracing::debug!(
                correlation_id = %event.correlation_id,
                operation = %event.operation,
                is_async = event.is_async,
                parameters = ?names,
                values = ?event.values,
                reader_columns = ?event.reader_columns,
                "executing: {}",
                event.command_text
            );
        } else {
            tracing::debug!(
                correlation_id = %event.correlation_id,
                operation = %event.operation,
                is_async = event.is_async,
                parameters = ?names,
                reader_columns = ?event.reader_columns,
                "executing: {}",
                event.command_text
            );
        }
        Interception::Proceed
    }

    fn executed(&self, event: &CommandExecuted<'_>) {
        tracing::debug!(
            correlation_id = %event.command.correlation_id,
            operation = %event.command.operation,
            elapsed_us = micros(event.duration),
            result = ?event.result,
            intercepted = event.intercepted,
            "executed"
        );
    }

    fn failed(&self, event: &CommandFailed<'_>) {
        if event.error.kind() == ErrorKind::Cancellation {
            tracing::debug!(
                correlation_id = %event.command.correlation_id,
                operation = %event.command.operation,
                elapsed_us = micros(event.duration),
                "cancelled"
            );
        } else {
            tracing::warn!(
                correlation_id = %event.command.correlation_id,
                operation = %event.command.operation,
                elapsed_us = micros(event.duration),
                error = %event.error,
                "failed: {}",
                event.command.command_text
            );
        }
    }

    fn reader_closed(&self, event: &ReaderClosed) {
        tracing::debug!(
            correlation_id = %event.correlation_id,
            rows_read = event.rows_read,
            exhausted = event.exhausted,
            elapsed_us = micros(event.duration),
            "reader closed"
        );
    }
}

pub(crate) fn micros(duration: Duration) -> u64 {
    u64::try_from(duration.as_micros()).unwrap_or(u64::MAX)
}

/// Owned copy of one diagnostic event, as stored by [`CollectingSink`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
    Executing {
        correlation_id: CorrelationId,
        operation: Operation,
        reader_columns: Option<Vec<String>>,
    },
    Executed {
        correlation_id: CorrelationId,
        operation: Operation,
        result: ExecutedResult,
        intercepted: bool,
    },
    Failed {
        correlation_id: CorrelationId,
        operation: Operation,
        kind: ErrorKind,
    },
    ReaderClosed {
        correlation_id: CorrelationId,
        rows_read: u64,
        exhausted: bool,
    },
}

impl Record {
    pub fn correlation_id(&self) -> CorrelationId {
        match self {
            Record::Executing { correlation_id, .. }
            | Record::Executed { correlation_id, .. }
            | Record::Failed { correlation_id, .. }
            | Record::ReaderClosed { correlation_id, .. } => *correlation_id,
        }
    }
}

/// Records every event in a lock-free queue
#[derive(Debug, Default)]
pub struct CollectingSink {
    records: SegQueue<Record>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Remove and return all records in arrival order
    pub fn take(&self) -> Vec<Record> {
        std::iter::from_fn(|| self.records.pop()).collect()
    }
}

impl DiagnosticSink for CollectingSink {
    fn executing(&self, event: &CommandEvent<'_>) -> Interception {
        self.records.push(Record::Executing {
            correlation_id: event.correlation_id,
            operation: event.operation,
            reader_columns: event.reader_columns.map(<[String]>::to_vec),
        });
        Interception::Proceed
    }

    fn executed(&self, event: &CommandExecuted<'_>) {
        self.records.push(Record::Executed {
            correlation_id: event.command.correlation_id,
            operation: event.command.operation,
            result: event.result,
            intercepted: event.intercepted,
        });
    }

    fn failed(&self, event: &CommandFailed<'_>) {
        self.records.push(Record::Failed {
            correlation_id: event.command.correlation_id,
            operation: event.command.operation,
            kind: event.error.kind(),
        });
    }

    fn reader_closed(&self, event: &ReaderClosed) {
        self.records.push(Record::ReaderClosed {
            correlation_id: event.correlation_id,
            rows_read: event.rows_read,
            exhausted: event.exhausted,
        });
    }
}
