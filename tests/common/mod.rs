//! In-memory provider shared by the integration tests

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use zero_command::native::{
    ConnectionState, NativeCommand, NativeConnection, NativeError,
};
use zero_command::param::NativeParameter;
use zero_command::{Column, DbType, Row, Value};

#[derive(Debug, thiserror::Error)]
#[error("mock: {0}")]
pub struct MockError(pub String);

/// What the engine saw for one native execution
#[derive(Debug, Clone, PartialEq)]
pub struct Executed {
    pub text: String,
    pub params: Vec<(String, Option<DbType>, Value)>,
    pub timeout: Option<Duration>,
    pub transaction: Option<u32>,
}

/// Counters shared between a connection and every command it created
#[derive(Debug, Default)]
pub struct Log {
    pub executed: Mutex<Vec<Executed>>,
    pub created: AtomicUsize,
    pub live_commands: AtomicUsize,
    pub io_started: AtomicUsize,
    pub cancels: AtomicUsize,
}

impl Log {
    pub fn executed(&self) -> Vec<Executed> {
        self.executed.lock().unwrap().clone()
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn live_commands(&self) -> usize {
        self.live_commands.load(Ordering::SeqCst)
    }

    pub fn io_started(&self) -> usize {
        self.io_started.load(Ordering::SeqCst)
    }

    pub fn cancels(&self) -> usize {
        self.cancels.load(Ordering::SeqCst)
    }
}

/// How the mock engine answers
#[derive(Debug, Clone, Default)]
pub struct Behaviour {
    pub rows_affected: i64,
    pub columns: Vec<Column>,
    pub rows: Vec<Row>,
    /// Every execution fails with this message
    pub fail: Option<String>,
    /// Fetching the row at this index fails
    pub fail_fetch_at: Option<usize>,
    /// Executions never complete (async only)
    pub hang: bool,
    /// Row fetches never complete (async only)
    pub hang_fetch: bool,
    pub fail_create: bool,
    pub fail_bind: Option<String>,
}

pub struct MockConnection {
    pub state: ConnectionState,
    pub open: AtomicBool,
    pub transaction: Option<u32>,
    pub behaviour: Behaviour,
    pub log: Arc<Log>,
}

impl MockConnection {
    pub fn new() -> Self {
        Self::with_behaviour(Behaviour::default())
    }

    pub fn with_behaviour(behaviour: Behaviour) -> Self {
        Self {
            state: ConnectionState::new(),
            open: AtomicBool::new(true),
            transaction: None,
            behaviour,
            log: Arc::new(Log::default()),
        }
    }

    pub fn returning_rows(columns: &[&str], rows: Vec<Vec<Value>>) -> Self {
        Self::with_behaviour(Behaviour {
            columns: columns.iter().map(|name| Column::new(*name, None)).collect(),
            rows: rows.into_iter().map(Row::from).collect(),
            ..Behaviour::default()
        })
    }

    pub fn close(&self) {
        self.open.store(false, Ordering::SeqCst);
    }
}

impl NativeConnection for MockConnection {
    type Transaction = u32;
    type Command = MockCommand;

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    fn state(&self) -> &ConnectionState {
        &self.state
    }

    fn transaction(&self) -> Option<u32> {
        self.transaction
    }

    fn create_command(&self) -> Result<MockCommand, NativeError> {
        if self.behaviour.fail_create {
            return Err(MockError("cannot allocate command".to_string()).into());
        }
        self.log.created.fetch_add(1, Ordering::SeqCst);
        self.log.live_commands.fetch_add(1, Ordering::SeqCst);
        Ok(MockCommand {
            log: Arc::clone(&self.log),
            behaviour: self.behaviour.clone(),
            text: String::new(),
            params: Vec::new(),
            timeout: None,
            transaction: None,
        })
    }
}

pub struct MockCommand {
    log: Arc<Log>,
    behaviour: Behaviour,
    text: String,
    params: Vec<(String, Option<DbType>, Value)>,
    timeout: Option<Duration>,
    transaction: Option<u32>,
}

impl MockCommand {
    /// Configuration the command would run with
    pub fn snapshot(&self) -> Executed {
        Executed {
            text: self.text.clone(),
            params: self.params.clone(),
            timeout: self.timeout,
            transaction: self.transaction,
        }
    }

    fn start_io(&self) {
        self.log.io_started.fetch_add(1, Ordering::SeqCst);
        self.log.executed.lock().unwrap().push(self.snapshot());
    }

    fn outcome(&self) -> Result<(), NativeError> {
        match &self.behaviour.fail {
            Some(message) => Err(MockError(message.clone()).into()),
            None => Ok(()),
        }
    }

    fn run_non_query(&self) -> Result<i64, NativeError> {
        self.outcome()?;
        Ok(self.behaviour.rows_affected)
    }

    fn run_scalar(&self) -> Result<Option<Value>, NativeError> {
        self.outcome()?;
        Ok(self
            .behaviour
            .rows
            .first()
            .and_then(|row| row.get(0).cloned()))
    }

    fn run_reader(&self) -> Result<MockReader, NativeError> {
        self.outcome()?;
        Ok(MockReader {
            columns: self.behaviour.columns.clone(),
            rows: self.behaviour.rows.iter().cloned().collect(),
            fetched: 0,
            fail_fetch_at: self.behaviour.fail_fetch_at,
            hang_fetch: self.behaviour.hang_fetch,
        })
    }
}

impl Drop for MockCommand {
    fn drop(&mut self) {
        self.log.live_commands.fetch_sub(1, Ordering::SeqCst);
    }
}

impl NativeCommand for MockCommand {
    type Transaction = u32;

    fn set_text(&mut self, text: &str) {
        self.text = text.to_string();
    }

    fn set_timeout(&mut self, timeout: Option<Duration>) {
        self.timeout = timeout;
    }

    fn set_transaction(&mut self, transaction: u32) {
        self.transaction = Some(transaction);
    }

    fn add_parameter(&mut self, parameter: NativeParameter<'_>) -> Result<(), NativeError> {
        if self.behaviour.fail_bind.as_deref() == Some(parameter.name) {
            return Err(MockError(format!("cannot bind {}", parameter.name)).into());
        }
        self.params.push((
            parameter.name.to_string(),
            parameter.db_type,
            parameter.value,
        ));
        Ok(())
    }
}

pub struct MockReader {
    columns: Vec<Column>,
    rows: VecDeque<Row>,
    fetched: usize,
    fail_fetch_at: Option<usize>,
    hang_fetch: bool,
}

impl MockReader {
    fn fetch(&mut self) -> Result<Option<Row>, NativeError> {
        if self.fail_fetch_at == Some(self.fetched) {
            return Err(MockError(format!("fetch {} failed", self.fetched)).into());
        }
        let row = self.rows.pop_front();
        if row.is_some() {
            self.fetched += 1;
        }
        Ok(row)
    }
}

#[cfg(feature = "sync")]
mod blocking {
    use zero_command::native::NativeError;
    use zero_command::sync::{BlockingCommand, BlockingReader};
    use zero_command::{Column, Row, Value};

    use super::{MockCommand, MockReader};

    impl BlockingCommand for MockCommand {
        type Reader = MockReader;

        fn execute_non_query(&mut self) -> Result<i64, NativeError> {
            self.start_io();
            self.run_non_query()
        }

        fn execute_scalar(&mut self) -> Result<Option<Value>, NativeError> {
            self.start_io();
            self.run_scalar()
        }

        fn execute_reader(&mut self) -> Result<MockReader, NativeError> {
            self.start_io();
            self.run_reader()
        }
    }

    impl BlockingReader for MockReader {
        fn columns(&self) -> &[Column] {
            &self.columns
        }

        fn next_row(&mut self) -> Result<Option<Row>, NativeError> {
            self.fetch()
        }
    }
}

#[cfg(feature = "tokio")]
mod nonblocking {
    use std::future::{Future, pending};
    use std::sync::atomic::Ordering;

    use zero_command::native::NativeError;
    use zero_command::tokio::{AsyncCommand, AsyncReader};
    use zero_command::{Column, Row, Value};

    use super::{MockCommand, MockReader};

    impl AsyncCommand for MockCommand {
        type Reader = MockReader;

        fn execute_non_query(&mut self) -> impl Future<Output = Result<i64, NativeError>> + Send {
            async move {
                self.start_io();
                if self.behaviour.hang {
                    pending::<()>().await;
                }
                tokio::task::yield_now().await;
                self.run_non_query()
            }
        }

        fn execute_scalar(
            &mut self,
        ) -> impl Future<Output = Result<Option<Value>, NativeError>> + Send {
            async move {
                self.start_io();
                if self.behaviour.hang {
                    pending::<()>().await;
                }
                tokio::task::yield_now().await;
                self.run_scalar()
            }
        }

        fn execute_reader(&mut self) -> impl Future<Output = Result<MockReader, NativeError>> + Send {
            async move {
                self.start_io();
                if self.behaviour.hang {
                    pending::<()>().await;
                }
                tokio::task::yield_now().await;
                self.run_reader()
            }
        }

        fn cancel(&mut self) {
            self.log.cancels.fetch_add(1, Ordering::SeqCst);
        }
    }

    impl AsyncReader for MockReader {
        fn columns(&self) -> &[Column] {
            &self.columns
        }

        fn next_row(&mut self) -> impl Future<Output = Result<Option<Row>, NativeError>> + Send {
            async move {
                if self.hang_fetch {
                    pending::<()>().await;
                }
                self.fetch()
            }
        }
    }
}
