//! Traits implemented by database providers.
//!
//! The execution primitives themselves live in [`crate::sync`] and
//! [`crate::tokio`]; this module holds what both modes share: creating and
//! configuring a native command, and tracking whether a connection is busy.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::param::NativeParameter;

/// Error type reported by providers
pub type NativeError = Box<dyn std::error::Error + Send + Sync>;

/// A provider connection
///
/// The connection is borrowed for every call and never closed by this crate.
pub trait NativeConnection {
    /// Handle to the transaction currently associated with the connection
    type Transaction;

    type Command: NativeCommand<Transaction = Self::Transaction>;

    fn is_open(&self) -> bool;

    /// Busy-tracking state owned by the connection
    fn state(&self) -> &ConnectionState;

    /// The ambient transaction new commands must join, if any
    fn transaction(&self) -> Option<Self::Transaction>;

    /// Allocate a fresh, unconfigured command bound to this connection
    ///
    /// Must not perform network I/O.
    fn create_command(&self) -> std::result::Result<Self::Command, NativeError>;
}

/// Configuration surface of a provider command
///
/// Dropping the command releases its native resources.
pub trait NativeCommand {
    type Transaction;

    fn set_text(&mut self, text: &str);

    /// `None` means wait indefinitely
    fn set_timeout(&mut self, timeout: Option<Duration>);

    fn set_transaction(&mut self, transaction: Self::Transaction);

    /// Append one parameter; called in declared order
    fn add_parameter(&mut self, parameter: NativeParameter<'_>)
    -> std::result::Result<(), NativeError>;
}

/// Tracks the single in-flight command (or open reader) a connection allows
///
/// Providers embed one per connection and return it from
/// [`NativeConnection::state`].
#[derive(Debug, Default)]
pub struct ConnectionState {
    busy: AtomicBool,
    acquired: AtomicU64,
    released: AtomicU64,
}

impl ConnectionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Number of holds ever taken on this connection
    pub fn acquired(&self) -> u64 {
        self.acquired.load(Ordering::Acquire)
    }

    /// Number of holds ever released on this connection
    pub fn released(&self) -> u64 {
        self.released.load(Ordering::Acquire)
    }

    /// Mark the connection busy, failing if it already is
    pub(crate) fn try_acquire(&self) -> Result<ConnectionHold<'_>> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_busy| Error::ConnectionBusy)?;
        self.acquired.fetch_add(1, Ordering::AcqRel);
        Ok(ConnectionHold { state: self })
    }
}

/// Exclusive use of a connection; clears the busy flag when dropped
#[derive(Debug)]
#[must_use]
pub struct ConnectionHold<'c> {
    state: &'c ConnectionState,
}

impl Drop for ConnectionHold<'_> {
    fn drop(&mut self) {
        self.state.released.fetch_add(1, Ordering::AcqRel);
        self.state.busy.store(false, Ordering::Release);
    }
}
