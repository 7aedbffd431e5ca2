//! Mode-independent execution state machine.
//!
//! [`Execution`] performs every step of a call except the native I/O:
//! parameter resolution, connection hold, native command construction,
//! diagnostics and result translation. The blocking and async drivers call
//! [`Execution::start`], run the native primitive named by the returned
//! [`Action`], then hand the outcome back through one of the `finish_*`
//! methods.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::command::{Command, Operation};
use crate::context::ExecutionContext;
use crate::diagnostics::{
    CommandEvent, CommandExecuted, CommandFailed, CorrelationId, ExecutedResult, Interception,
    InterceptedResult,
};
use crate::error::{Error, ExecutionError, Result, eyre};
use crate::native::{ConnectionHold, NativeConnection, NativeError};
use crate::reader::{ReaderCore, RowSource};
use crate::value::{Column, Row, Value};

/// What the driver must do after [`Execution::start`]
pub(crate) enum Action<N> {
    /// Run the native primitive for the operation on this command
    Execute(N),
    /// The executing hook supplied a result; no native I/O happens
    Intercepted(InterceptedResult),
}

pub(crate) struct Execution<'a, 'c, C: ?Sized> {
    command: &'a Command,
    ctx: &'a ExecutionContext<'c, C>,
    operation: Operation,
    correlation_id: CorrelationId,
    is_async: bool,
    started: Instant,
    values: Vec<Value>,
    hold: Option<ConnectionHold<'c>>,
    /// The `executing` event went out
    announced: bool,
    /// An `executed` or `failed` event went out
    settled: bool,
}

impl<C: ?Sized> Execution<'_, '_, C> {
    fn event(&self) -> CommandEvent<'_> {
        CommandEvent {
            correlation_id: self.correlation_id,
            operation: self.operation,
            command_text: self.command.text(),
            parameters: self.command.parameters(),
            values: &self.values,
            reader_columns: self.ctx.reader_columns(),
            is_async: self.is_async,
            log_parameter_values: self.ctx.opts().log_parameter_values,
        }
    }

    fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Emit the failed event and hand the error back for propagation
    pub fn fail(&mut self, error: Error) -> Error {
        self.settled = true;
        let duration = self.elapsed();
        self.ctx.sink().failed(&CommandFailed {
            command: self.event(),
            duration,
            error: &error,
        });
        error
    }

    pub fn cancelled(&mut self) -> Error {
        let error = Error::Cancelled {
            correlation_id: self.correlation_id,
        };
        self.fail(error)
    }

    fn succeed(&mut self, result: ExecutedResult, intercepted: bool) {
        self.settled = true;
        self.ctx.sink().executed(&CommandExecuted {
            command: self.event(),
            duration: self.elapsed(),
            result,
            intercepted,
        });
    }
}

/// A call dropped between `executing` and its outcome was abandoned by the
/// caller and is reported as cancelled
impl<C: ?Sized> Drop for Execution<'_, '_, C> {
    fn drop(&mut self) {
        if self.announced && !self.settled && !std::thread::panicking() {
            self.cancelled();
        }
    }
}

impl<'a, 'c, C> Execution<'a, 'c, C>
where
    C: NativeConnection + ?Sized,
{
    pub fn new(
        command: &'a Command,
        ctx: &'a ExecutionContext<'c, C>,
        operation: Operation,
        is_async: bool,
    ) -> Self {
        Self {
            command,
            ctx,
            operation,
            correlation_id: CorrelationId::new(),
            is_async,
            started: Instant::now(),
            values: Vec::new(),
            hold: None,
            announced: false,
            settled: false,
        }
    }

    /// Resolve values, take the connection hold, build the native command and
    /// consult the executing hook
    pub fn start(&mut self) -> Result<Action<C::Command>> {
        match self.try_start() {
            Ok(action) => Ok(action),
            Err(err) => Err(self.fail(err)),
        }
    }

    fn try_start(&mut self) -> Result<Action<C::Command>> {
        self.values = self.command.resolve_values(self.ctx.parameter_values())?;

        let connection: &'c C = self.ctx.connection();
        if !connection.is_open() {
            return Err(Error::ConnectionClosed);
        }
        self.hold = Some(connection.state().try_acquire()?);

        let native = self.command.build_native_command(
            self.ctx,
            &self.values,
            self.correlation_id,
            self.operation,
        )?;

        self.announced = true;
        match self.ctx.sink().executing(&self.event()) {
            Interception::Proceed => Ok(Action::Execute(native)),
            Interception::Suppress(result) => {
                drop(native);
                if result.operation() != self.operation {
                    return Err(Error::BadUsageError(format!(
                        "interceptor returned a {} result for a {} command",
                        result.operation(),
                        self.operation
                    )));
                }
                Ok(Action::Intercepted(result))
            }
        }
    }

    fn execution_error(&self, source: NativeError) -> Error {
        Error::Execution(ExecutionError {
            correlation_id: self.correlation_id,
            operation: self.operation,
            command_text: Arc::clone(self.command.shared_text()),
            source,
        })
    }

    fn finish<T>(
        &mut self,
        outcome: std::result::Result<T, NativeError>,
        describe: impl FnOnce(&T) -> ExecutedResult,
    ) -> Result<T> {
        match outcome {
            Ok(value) => {
                self.succeed(describe(&value), false);
                Ok(value)
            }
            Err(source) => {
                let error = self.execution_error(source);
                Err(self.fail(error))
            }
        }
    }

    pub fn finish_non_query(
        &mut self,
        outcome: std::result::Result<i64, NativeError>,
    ) -> Result<i64> {
        self.finish(outcome, |rows| ExecutedResult::RowsAffected(*rows))
    }

    /// A NULL first value is reported as no value
    pub fn finish_scalar(
        &mut self,
        outcome: std::result::Result<Option<Value>, NativeError>,
    ) -> Result<Option<Value>> {
        let outcome = outcome.map(|value| value.filter(|v| !v.is_null()));
        self.finish(outcome, |value| ExecutedResult::Scalar {
            has_value: value.is_some(),
        })
    }

    pub fn finish_reader<R>(
        &mut self,
        outcome: std::result::Result<R, NativeError>,
        columns: impl FnOnce(&R) -> usize,
    ) -> Result<R> {
        self.finish(outcome, |reader| ExecutedResult::Reader {
            columns: columns(reader),
        })
    }

    pub fn intercepted_non_query(&mut self, result: InterceptedResult) -> Result<i64> {
        match result {
            InterceptedResult::RowsAffected(rows) => {
                self.succeed(ExecutedResult::RowsAffected(rows), true);
                Ok(rows)
            }
            other => Err(self.mismatch(&other)),
        }
    }

    pub fn intercepted_scalar(&mut self, result: InterceptedResult) -> Result<Option<Value>> {
        match result {
            InterceptedResult::Scalar(value) => {
                let value = value.filter(|v| !v.is_null());
                self.succeed(
                    ExecutedResult::Scalar {
                        has_value: value.is_some(),
                    },
                    true,
                );
                Ok(value)
            }
            other => Err(self.mismatch(&other)),
        }
    }

    pub fn intercepted_rows(&mut self, result: InterceptedResult) -> Result<(Vec<Column>, Vec<Row>)> {
        match result {
            InterceptedResult::Rows { columns, rows } => {
                self.succeed(
                    ExecutedResult::Reader {
                        columns: columns.len(),
                    },
                    true,
                );
                Ok((columns, rows))
            }
            other => Err(self.mismatch(&other)),
        }
    }

    // `start` already rejects mismatches; reaching this is a driver bug
    fn mismatch(&mut self, result: &InterceptedResult) -> Error {
        let error = Error::LibraryBug(eyre!(
            "{} driver received a {} interception",
            self.operation,
            result.operation()
        ));
        self.fail(error)
    }

    /// Move the connection hold into a reader over `source`
    pub fn into_reader<N, R>(
        mut self,
        source: RowSource<R>,
        command: Option<N>,
        columns: Vec<Column>,
    ) -> Result<ReaderCore<'c, N, R>> {
        let Some(hold) = self.hold.take() else {
            let error = Error::LibraryBug(eyre!("reader produced without a connection hold"));
            return Err(self.fail(error));
        };
        Ok(ReaderCore::new(
            source,
            command,
            hold,
            self.ctx.sink(),
            self.correlation_id,
            Arc::clone(self.command.shared_text()),
            columns,
        ))
    }
}
