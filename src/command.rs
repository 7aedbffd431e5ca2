use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use crate::context::ExecutionContext;
use crate::diagnostics::CorrelationId;
use crate::error::{Error, ExecutionError, Result};
use crate::native::{NativeCommand, NativeConnection};
use crate::param::{Parameter, ParameterValues};
use crate::value::Value;

/// The result shape a call asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Run for effect, return the affected row count
    NonQuery,
    /// Return the first column of the first row
    Scalar,
    /// Return a streaming reader
    Reader,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::NonQuery => "non_query",
            Operation::Scalar => "scalar",
            Operation::Reader => "reader",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A statement plus its ordered parameter declarations
///
/// Immutable once built; each execution creates and configures its own
/// native command, so one `Command` can run many times, including
/// concurrently on different connections.
///
/// The execution operations are defined next to their drivers:
/// `execute_non_query`, `execute_scalar` and `execute_reader` in
/// [`crate::sync`], and their `*_async` counterparts in [`crate::tokio`].
#[derive(Debug, Clone)]
pub struct Command {
    text: Arc<str>,
    parameters: Vec<Parameter>,
}

impl Command {
    /// # Errors
    /// Returns `Error::DuplicateParameter` if two parameters share a name.
    pub fn new(text: impl Into<Arc<str>>, parameters: Vec<Parameter>) -> Result<Self> {
        {
            let mut seen = HashSet::with_capacity(parameters.len());
            for param in &parameters {
                if !seen.insert(param.name()) {
                    return Err(Error::DuplicateParameter(param.name().to_string()));
                }
            }
        }
        Ok(Self {
            text: text.into(),
            parameters,
        })
    }

    pub fn without_parameters(text: impl Into<Arc<str>>) -> Self {
        Self {
            text: text.into(),
            parameters: Vec::new(),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub(crate) fn shared_text(&self) -> &Arc<str> {
        &self.text
    }

    /// Parameters in bind order
    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    /// Build a native command ready to execute on `ctx.connection()`
    ///
    /// Sets the text, binds every parameter in declared order from
    /// `ctx.parameter_values()`, enlists the connection's ambient transaction
    /// and applies `ctx.opts().command_timeout`. `correlation_id` and
    /// `operation` only label diagnostics.
    ///
    /// # Errors
    /// - `Error::ConnectionClosed` if the connection is not open
    /// - `Error::MissingParameter` if a declared parameter has no value
    /// - `Error::BindError` if the provider rejects a parameter
    /// - `Error::Execution` if the provider cannot allocate a command
    pub fn create_native_command<C>(
        &self,
        ctx: &ExecutionContext<'_, C>,
        correlation_id: CorrelationId,
        operation: Operation,
    ) -> Result<C::Command>
    where
        C: NativeConnection + ?Sized,
    {
        let values = self.resolve_values(ctx.parameter_values())?;
        self.build_native_command(ctx, &values, correlation_id, operation)
    }

    /// Look up every declared parameter, in order
    pub(crate) fn resolve_values(&self, values: &dyn ParameterValues) -> Result<Vec<Value>> {
        self.parameters
            .iter()
            .map(|param| {
                values
                    .value(param.name())
                    .ok_or_else(|| Error::MissingParameter(param.name().to_string()))
            })
            .collect()
    }

    #[tracing::instrument(skip_all, fields(correlation_id = %correlation_id, operation = operation.as_str()))]
    pub(crate) fn build_native_command<C>(
        &self,
        ctx: &ExecutionContext<'_, C>,
        values: &[Value],
        correlation_id: CorrelationId,
        operation: Operation,
    ) -> Result<C::Command>
    where
        C: NativeConnection + ?Sized,
    {
        let connection = ctx.connection();
        if !connection.is_open() {
            return Err(Error::ConnectionClosed);
        }

        let mut native = connection.create_command().map_err(|source| {
            Error::Execution(ExecutionError {
                correlation_id,
                operation,
                command_text: Arc::clone(&self.text),
                source,
            })
        })?;

        native.set_text(&self.text);
        for (param, value) in self.parameters.iter().zip(values) {
            param.bind(&mut native, value.clone())?;
        }
        if let Some(transaction) = connection.transaction() {
            native.set_transaction(transaction);
        }
        native.set_timeout(ctx.opts().command_timeout);

        tracing::trace!(parameters = self.parameters.len(), "native command configured");
        Ok(native)
    }
}
