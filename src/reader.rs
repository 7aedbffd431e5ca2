use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;

use crate::command::Operation;
use crate::diagnostics::{CorrelationId, DiagnosticSink, ReaderClosed};
use crate::error::{Error, ExecutionError};
use crate::native::{ConnectionHold, NativeError};
use crate::value::{Column, Row};

/// Where a reader's rows come from
pub(crate) enum RowSource<R> {
    Native(R),
    /// Rows supplied by an interceptor
    Buffered(VecDeque<Row>),
}

/// Ownership shared by the blocking and async readers
///
/// Holds the native reader, the native command that produced it and the
/// connection hold. [`ReaderCore::release`] drops them in that order and
/// runs at most once; `Drop` calls it for readers that were never closed.
pub(crate) struct ReaderCore<'c, N, R> {
    source: Option<RowSource<R>>,
    command: Option<N>,
    hold: Option<ConnectionHold<'c>>,
    sink: &'c dyn DiagnosticSink,
    correlation_id: CorrelationId,
    command_text: Arc<str>,
    columns: Vec<Column>,
    rows_read: u64,
    opened: Instant,
}

impl<'c, N, R> ReaderCore<'c, N, R> {
    pub fn new(
        source: RowSource<R>,
        command: Option<N>,
        hold: ConnectionHold<'c>,
        sink: &'c dyn DiagnosticSink,
        correlation_id: CorrelationId,
        command_text: Arc<str>,
        columns: Vec<Column>,
    ) -> Self {
        Self {
            source: Some(source),
            command,
            hold: Some(hold),
            sink,
            correlation_id,
            command_text,
            columns,
            rows_read: 0,
            opened: Instant::now(),
        }
    }

    pub fn correlation_id(&self) -> CorrelationId {
        self.correlation_id
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn rows_read(&self) -> u64 {
        self.rows_read
    }

    pub fn is_closed(&self) -> bool {
        self.hold.is_none()
    }

    /// `None` once the reader is closed
    pub fn source_mut(&mut self) -> Option<&mut RowSource<R>> {
        self.source.as_mut()
    }

    pub fn command_mut(&mut self) -> Option<&mut N> {
        self.command.as_mut()
    }

    /// Count a fetched row, or release on end of stream
    pub fn advance(&mut self, row: Option<Row>) -> Option<Row> {
        match row {
            Some(row) => {
                self.rows_read += 1;
                Some(row)
            }
            None => {
                self.release(true);
                None
            }
        }
    }

    /// Release after a failed fetch and classify the error
    pub fn fail(&mut self, source: NativeError) -> Error {
        self.release(false);
        Error::Execution(ExecutionError {
            correlation_id: self.correlation_id,
            operation: Operation::Reader,
            command_text: Arc::clone(&self.command_text),
            source,
        })
    }

    pub fn cancelled(&mut self) -> Error {
        self.release(false);
        Error::Cancelled {
            correlation_id: self.correlation_id,
        }
    }

    pub fn release(&mut self, exhausted: bool) {
        let Some(hold) = self.hold.take() else {
            return;
        };
        self.source = None;
        self.command = None;
        drop(hold);

        self.sink.reader_closed(&ReaderClosed {
            correlation_id: self.correlation_id,
            rows_read: self.rows_read,
            duration: self.opened.elapsed(),
            exhausted,
        });
    }
}

impl<N, R> Drop for ReaderCore<'_, N, R> {
    fn drop(&mut self) {
        self.release(false);
    }
}
