use crate::diagnostics::CorrelationId;
use crate::error::Result;
use crate::reader::{ReaderCore, RowSource};
use crate::value::{Column, Row};

use super::{BlockingCommand, BlockingReader};

/// Streaming result of `Command::execute_reader`
///
/// Owns the native reader and the native command, and keeps the connection
/// busy until released. Release happens exactly once: at end of stream, on
/// a fetch error, on [`close`](Self::close) or on drop.
pub struct ResultReader<'c, N: BlockingCommand> {
    core: ReaderCore<'c, N, N::Reader>,
}

impl<'c, N: BlockingCommand> ResultReader<'c, N> {
    pub(crate) fn new(core: ReaderCore<'c, N, N::Reader>) -> Self {
        Self { core }
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
    pub fn next_row(&mut self) -> Result<Option<Row>> {
        let row = match self.core.source_mut() {
            None => return Ok(None),
            Some(RowSource::Buffered(rows)) => rows.pop_front(),
            Some(RowSource::Native(reader)) => match reader.next_row() {
                Ok(row) => row,
                Err(source) => return Err(self.core.fail(source)),
            },
        };
        Ok(self.core.advance(row))
    }

    /// Release the connection without reading the remaining rows
    ///
    /// Calling it again does nothing.
    pub fn close(&mut self) {
        self.core.release(false);
    }
}

impl<N: BlockingCommand> Iterator for ResultReader<'_, N> {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_row().transpose()
    }
}
