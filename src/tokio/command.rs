use std::collections::VecDeque;
use std::future::Future;

use crate::command::{Command, Operation};
use crate::context::ExecutionContext;
use crate::error::Result;
use crate::exec::{Action, Execution};
use crate::native::{NativeCommand, NativeConnection, NativeError};
use crate::reader::RowSource;
use crate::value::{Column, Row, Value};

use super::ResultReader;
use super::cancel::{CancelOnDrop, is_cancelled, run_cancellable};

/// Async execution primitives of a provider command
///
/// The returned futures are dropped when the call is cancelled through its
/// token or abandoned by the caller; the provider is then told through
/// [`AsyncCommand::cancel`].
pub trait AsyncCommand: NativeCommand + Send {
    type Reader: AsyncReader;

    fn execute_non_query(
        &mut self,
    ) -> impl Future<Output = std::result::Result<i64, NativeError>> + Send;

    fn execute_scalar(
        &mut self,
    ) -> impl Future<Output = std::result::Result<Option<Value>, NativeError>> + Send;

    fn execute_reader(
        &mut self,
    ) -> impl Future<Output = std::result::Result<Self::Reader, NativeError>> + Send;

    /// Abort server-side work after an in-flight call was cancelled
    fn cancel(&mut self) {}
}

/// Forward-only async row stream
pub trait AsyncReader: Send {
    fn columns(&self) -> &[Column];

    /// `Ok(None)` at end of stream
    fn next_row(
        &mut self,
    ) -> impl Future<Output = std::result::Result<Option<Row>, NativeError>> + Send;
}

impl Command {
    /// Async form of `execute_non_query`
    ///
    /// Returns `Error::Cancelled` if the context's token fires before or
    /// during the call. A call cancelled before it starts creates no native
    /// command.
    #[tracing::instrument(skip_all)]
    pub async fn execute_non_query_async<C>(&self, ctx: &ExecutionContext<'_, C>) -> Result<i64>
    where
        C: NativeConnection + ?Sized,
        C::Command: AsyncCommand,
    {
        let token = ctx.cancel_token();
        let mut exec = Execution::new(self, ctx, Operation::NonQuery, true);
        if is_cancelled(token) {
            return Err(exec.cancelled());
        }
        match exec.start()? {
            Action::Intercepted(result) => exec.intercepted_non_query(result),
            Action::Execute(mut native) => {
                let mut pending = CancelOnDrop::new(&mut native);
                let outcome = run_cancellable(token, pending.command().execute_non_query()).await;
                match outcome {
                    Some(outcome) => {
                        pending.disarm();
                        exec.finish_non_query(outcome)
                    }
                    None => {
                        drop(pending);
                        drop(native);
                        Err(exec.cancelled())
                    }
                }
            }
        }
    }

    /// Async form of `execute_scalar`
    #[tracing::instrument(skip_all)]
    pub async fn execute_scalar_async<C>(
        &self,
        ctx: &ExecutionContext<'_, C>,
    ) -> Result<Option<Value>>
    where
        C: NativeConnection + ?Sized,
        C::Command: AsyncCommand,
    {
        let token = ctx.cancel_token();
        let mut exec = Execution::new(self, ctx, Operation::Scalar, true);
        if is_cancelled(token) {
            return Err(exec.cancelled());
        }
        match exec.start()? {
            Action::Intercepted(result) => exec.intercepted_scalar(result),
            Action::Execute(mut native) => {
                let mut pending = CancelOnDrop::new(&mut native);
                let outcome = run_cancellable(token, pending.command().execute_scalar()).await;
                match outcome {
                    Some(outcome) => {
                        pending.disarm();
                        exec.finish_scalar(outcome)
                    }
                    None => {
                        drop(pending);
                        drop(native);
                        Err(exec.cancelled())
                    }
                }
            }
        }
    }

    /// Async form of `execute_reader`
    ///
    /// The token stays attached to the returned reader, so a later
    /// cancellation also aborts a pending `next_row`.
    #[tracing::instrument(skip_all)]
    pub async fn execute_reader_async<'c, C>(
        &self,
        ctx: &ExecutionContext<'c, C>,
    ) -> Result<ResultReader<'c, C::Command>>
    where
        C: NativeConnection + ?Sized,
        C::Command: AsyncCommand,
    {
        let token = ctx.cancel_token();
        let mut exec = Execution::new(self, ctx, Operation::Reader, true);
        if is_cancelled(token) {
            return Err(exec.cancelled());
        }
        match exec.start()? {
            Action::Intercepted(result) => {
                let (columns, rows) = exec.intercepted_rows(result)?;
                let core =
                    exec.into_reader(RowSource::Buffered(VecDeque::from(rows)), None, columns)?;
                Ok(ResultReader::new(core, token.cloned()))
            }
            Action::Execute(mut native) => {
                let mut pending = CancelOnDrop::new(&mut native);
                let outcome = run_cancellable(token, pending.command().execute_reader()).await;
                let Some(outcome) = outcome else {
                    drop(pending);
                    drop(native);
                    return Err(exec.cancelled());
                };
                pending.disarm();
                let reader = exec.finish_reader(outcome, |r| r.columns().len())?;
                let columns = reader.columns().to_vec();
                let core = exec.into_reader(RowSource::Native(reader), Some(native), columns)?;
                Ok(ResultReader::new(core, token.cloned()))
            }
        }
    }
}
