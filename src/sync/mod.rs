//! Blocking execution.
//!
//! Providers implement [`BlockingCommand`] and [`BlockingReader`]; callers use
//! `Command::execute_non_query`, `Command::execute_scalar` and
//! `Command::execute_reader`, which block the calling thread for the native
//! round-trip.

mod command;
mod reader;

pub use command::{BlockingCommand, BlockingReader};
pub use reader::ResultReader;
