use std::collections::VecDeque;

use crate::command::{Command, Operation};
use crate::context::ExecutionContext;
use crate::error::Result;
use crate::exec::{Action, Execution};
use crate::native::{NativeCommand, NativeConnection, NativeError};
use crate::reader::RowSource;
use crate::value::{Column, Row, Value};

use super::ResultReader;

/// Blocking execution primitives of a provider command
pub trait BlockingCommand: NativeCommand {
    type Reader: BlockingReader;

    /// Run for effect; returns the engine-reported affected row count
    fn execute_non_query(&mut self) -> std::result::Result<i64, NativeError>;

    /// First column of the first row, `None` if there is no row
    fn execute_scalar(&mut self) -> std::result::Result<Option<Value>, NativeError>;

    /// Start a streaming result without reading any row
    fn execute_reader(&mut self) -> std::result::Result<Self::Reader, NativeError>;
}

/// Forward-only blocking row stream
pub trait BlockingReader {
    fn columns(&self) -> &[Column];

    /// `Ok(None)` at end of stream
    fn next_row(&mut self) -> std::result::Result<Option<Row>, NativeError>;
}

impl Command {
    /// Execute for effect and return the affected row count
    ///
    /// The count follows engine semantics, e.g. `-1` for statements that
    /// report none.
    #[tracing::instrument(skip_all)]
    pub fn execute_non_query<C>(&self, ctx: &ExecutionContext<'_, C>) -> Result<i64>
    where
        C: NativeConnection + ?Sized,
        C::Command: BlockingCommand,
    {
        let mut exec = Execution::new(self, ctx, Operation::NonQuery, false);
        match exec.start()? {
            Action::Intercepted(result) => exec.intercepted_non_query(result),
            Action::Execute(mut native) => {
                let outcome = native.execute_non_query();
                exec.finish_non_query(outcome)
            }
        }
    }

    /// Execute and return the first column of the first row
    ///
    /// Returns `Ok(None)` for an empty result or a NULL value.
    #[tracing::instrument(skip_all)]
    pub fn execute_scalar<C>(&self, ctx: &ExecutionContext<'_, C>) -> Result<Option<Value>>
    where
        C: NativeConnection + ?Sized,
        C::Command: BlockingCommand,
    {
        let mut exec = Execution::new(self, ctx, Operation::Scalar, false);
        match exec.start()? {
            Action::Intercepted(result) => exec.intercepted_scalar(result),
            Action::Execute(mut native) => {
                let outcome = native.execute_scalar();
                exec.finish_scalar(outcome)
            }
        }
    }

    /// Execute in streaming mode
    ///
    /// The returned reader keeps the connection busy until it is exhausted,
    /// closed or dropped.
    #[tracing::instrument(skip_all)]
    pub fn execute_reader<'c, C>(
        &self,
        ctx: &ExecutionContext<'c, C>,
    ) -> Result<ResultReader<'c, C::Command>>
    where
        C: NativeConnection + ?Sized,
        C::Command: BlockingCommand,
    {
        let mut exec = Execution::new(self, ctx, Operation::Reader, false);
        match exec.start()? {
            Action::Intercepted(result) => {
                let (columns, rows) = exec.intercepted_rows(result)?;
                let core = exec.into_reader(RowSource::Buffered(VecDeque::from(rows)), None, columns)?;
                Ok(ResultReader::new(core))
            }
            Action::Execute(mut native) => {
                let outcome = native.execute_reader();
                let reader = exec.finish_reader(outcome, |r| r.columns().len())?;
                let columns = reader.columns().to_vec();
                let core = exec.into_reader(RowSource::Native(reader), Some(native), columns)?;
                Ok(ResultReader::new(core))
            }
        }
    }
}
