use tokio_util::sync::CancellationToken;

use crate::diagnostics::CorrelationId;
use crate::error::{Error, Result};
use crate::reader::{ReaderCore, RowSource};
use crate::value::{Column, Row};

use super::cancel::run_cancellable;
use super::{AsyncCommand, AsyncReader};

/// Streaming result of `Command::execute_reader_async`
///
/// Same release rules as the blocking reader. Cancelling the token that
/// started the call makes a pending [`next_row`](Self::next_row) return
/// `Error::Cancelled` and releases the connection.
pub struct ResultReader<'c, N: AsyncCommand> {
    core: ReaderCore<'c, N, N::Reader>,
    cancel: Option<CancellationToken>,
}

impl<'c, N: AsyncCommand> ResultReader<'c, N> {
    pub(crate) fn new(
        core: ReaderCore<'c, N, N::Reader>,
        cancel: Option<CancellationToken>,
    ) -> Self {
        Self { core, cancel }
    }

    pub fn correlation_id(&self) -> CorrelationId {
        self.core.correlation_id()
    }

    pub fn columns(&self) -> &[Column] {
        self.core.columns()
    }

    pub fn rows_read(&self) -> u64 {
        self.core.rows_read()
    }

    pub fn is_closed(&self) -> bool {
        self.core.is_closed()
    }

    /// Fetch the next row; `Ok(None)` once the stream is exhausted or closed
    pub async fn next_row(&mut self) -> Result<Option<Row>> {
        if self.core.is_closed() {
            return Ok(None);
        }
        if self.cancel.as_ref().is_some_and(CancellationToken::is_cancelled) {
            return Err(self.cancelled());
        }
        let fetched = match self.core.source_mut() {
            None => return Ok(None),
            Some(RowSource::Buffered(rows)) => Some(Ok(rows.pop_front())),
            Some(RowSource::Native(reader)) => {
                run_cancellable(self.cancel.as_ref(), reader.next_row()).await
            }
        };
        match fetched {
            Some(Ok(row)) => Ok(self.core.advance(row)),
            Some(Err(source)) => Err(self.core.fail(source)),
            None => Err(self.cancelled()),
        }
    }

    fn cancelled(&mut self) -> Error {
        if let Some(command) = self.core.command_mut() {
            command.cancel();
        }
        self.core.cancelled()
    }

    /// Release the connection without reading the remaining rows
    ///
    /// Calling it again does nothing.
    pub fn close(&mut self) {
        self.core.release(false);
    }
}
