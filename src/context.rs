use crate::diagnostics::{DiagnosticSink, TracingSink};
use crate::opts::Opts;
use crate::param::ParameterValues;

#[cfg(feature = "tokio")]
use tokio_util::sync::CancellationToken;

/// Everything one execution call needs besides the command itself
///
/// Built fresh per call. The connection is borrowed, never owned; a result
/// reader produced from this context keeps the borrow alive.
///
/// ```rs
/// let values = HashMap::from([("id".to_string(), Value::from(1))]);
/// let ctx = ExecutionContext::new(&conn)
///     .with_parameter_values(&values)
///     .with_sink(&sink);
/// let rows = command.execute_non_query(&ctx)?;
/// ```
pub struct ExecutionContext<'c, C: ?Sized> {
    connection: &'c C,
    parameter_values: &'c dyn ParameterValues,
    sink: &'c dyn DiagnosticSink,
    opts: Opts,
    reader_columns: Option<&'c [String]>,
    #[cfg(feature = "tokio")]
    cancel: Option<CancellationToken>,
}

impl<'c, C: ?Sized> ExecutionContext<'c, C> {
    /// A context with no parameter values, default options and the tracing sink
    pub fn new(connection: &'c C) -> Self {
        Self {
            connection,
            parameter_values: &(),
            sink: &TracingSink,
            opts: Opts::default(),
            reader_columns: None,
            #[cfg(feature = "tokio")]
            cancel: None,
        }
    }

    pub fn with_parameter_values(mut self, values: &'c dyn ParameterValues) -> Self {
        self.parameter_values = values;
        self
    }

    pub fn with_sink(mut self, sink: &'c dyn DiagnosticSink) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_opts(mut self, opts: Opts) -> Self {
        self.opts = opts;
        self
    }

    /// Expected result column names, reported in diagnostics only
    pub fn with_reader_columns(mut self, columns: &'c [String]) -> Self {
        self.reader_columns = Some(columns);
        self
    }

    /// Cancellation signal observed by the async forms
    #[cfg(feature = "tokio")]
    pub fn with_cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn connection(&self) -> &'c C {
        self.connection
    }

    pub fn parameter_values(&self) -> &'c dyn ParameterValues {
        self.parameter_values
    }

    pub fn sink(&self) -> &'c dyn DiagnosticSink {
        self.sink
    }

    pub fn opts(&self) -> &Opts {
        &self.opts
    }

    pub fn reader_columns(&self) -> Option<&'c [String]> {
        self.reader_columns
    }

    #[cfg(feature = "tokio")]
    pub fn cancel_token(&self) -> Option<&CancellationToken> {
        self.cancel.as_ref()
    }
}
