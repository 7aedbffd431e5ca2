//! Cancellable async execution on tokio.
//!
//! Providers implement [`AsyncCommand`] and [`AsyncReader`]; callers use
//! `Command::execute_non_query_async`, `Command::execute_scalar_async` and
//! `Command::execute_reader_async`. A [`CancellationToken`] attached with
//! `ExecutionContext::with_cancel_token` aborts the call before it starts or
//! while the native round-trip is pending.

mod cancel;
mod command;
mod reader;

pub use command::{AsyncCommand, AsyncReader};
pub use reader::ResultReader;
pub use tokio_util::sync::CancellationToken;
