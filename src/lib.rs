pub mod command;
pub mod context;
pub mod diagnostics;
pub mod error;
mod exec;
pub mod native;
mod opts;
pub mod param;
mod reader;
pub mod value;

#[cfg(feature = "sync")]
pub mod sync;

#[cfg(feature = "tokio")]
pub mod tokio;

pub use command::{Command, Operation};
pub use context::ExecutionContext;
pub use diagnostics::{
    CollectingSink, CorrelationId, DiagnosticSink, Interception, InterceptedResult, NullSink,
    TracingSink,
};
pub use error::{Error, ErrorKind, Result};
pub use opts::Opts;
pub use param::{DbType, Direction, Parameter, ParameterValues};
pub use value::{Column, Row, Value};
