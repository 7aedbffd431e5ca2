//! Cancellable async execution against the in-memory provider

mod common;

use std::collections::HashMap;
use std::time::Duration;

use pretty_assertions::assert_eq;

use common::{Behaviour, MockConnection};
use zero_command::diagnostics::{ExecutedResult, Record};
use zero_command::error::{Error, ErrorKind};
use zero_command::tokio::CancellationToken;
use zero_command::{CollectingSink, Command, ExecutionContext, Operation, Parameter, Value};

fn update_command() -> Command {
    Command::new(
        "UPDATE t SET v = @v WHERE id = @id",
        vec![Parameter::new("id"), Parameter::new("v")],
    )
    .expect("unique parameter names")
}

fn update_values() -> HashMap<String, Value> {
    HashMap::from([
        ("id".to_string(), Value::from(7)),
        ("v".to_string(), Value::from("x")),
    ])
}

#[tokio::test]
async fn test_non_query_async_matches_blocking() {
    let conn = MockConnection::with_behaviour(Behaviour {
        rows_affected: 1,
        ..Behaviour::default()
    });
    let values = update_values();
    let sink = CollectingSink::new();
    let ctx = ExecutionContext::new(&conn)
        .with_parameter_values(&values)
        .with_sink(&sink);

    let rows = update_command()
        .execute_non_query_async(&ctx)
        .await
        .expect("execute");
    assert_eq!(rows, 1);

    let records = sink.take();
    let id = records[0].correlation_id();
    assert_eq!(
        records,
        vec![
            Record::Executing {
                correlation_id: id,
                operation: Operation::NonQuery,
                reader_columns: None,
            },
            Record::Executed {
                correlation_id: id,
                operation: Operation::NonQuery,
                result: ExecutedResult::RowsAffected(1),
                intercepted: false,
            },
        ]
    );
    assert_eq!(conn.log.executed()[0].params.len(), 2);
    assert!(!conn.state.is_busy());
    assert_eq!(conn.log.live_commands(), 0);
}

#[tokio::test]
async fn test_scalar_async_null_is_none() {
    let conn = MockConnection::returning_rows(&["v"], vec![vec![Value::Null]]);
    let ctx = ExecutionContext::new(&conn);

    let value = Command::without_parameters("SELECT v FROM t")
        .execute_scalar_async(&ctx)
        .await
        .expect("execute");
    assert_eq!(value, None);
}

#[tokio::test]
async fn test_reader_async_streams_rows() {
    let conn = MockConnection::returning_rows(
        &["id", "name"],
        vec![
            vec![Value::from(1), Value::from("a")],
            vec![Value::from(2), Value::from("b")],
        ],
    );
    let ctx = ExecutionContext::new(&conn);

    let mut reader = Command::without_parameters("SELECT id, name FROM t")
        .execute_reader_async(&ctx)
        .await
        .expect("reader");
    assert_eq!(reader.columns().len(), 2);

    let mut names = Vec::new();
    while let Some(row) = reader.next_row().await.expect("row") {
        names.push(row.get(1).and_then(Value::as_str).expect("name").to_string());
    }
    assert_eq!(names, vec!["a".to_string(), "b".to_string()]);
    assert_eq!(reader.rows_read(), 2);
    assert!(reader.is_closed());
    assert!(!conn.state.is_busy());
}

#[tokio::test]
async fn test_missing_parameter_async_without_io() {
    let conn = MockConnection::new();
    let ctx = ExecutionContext::new(&conn);

    let err = update_command()
        .execute_non_query_async(&ctx)
        .await
        .unwrap_err();
    assert!(matches!(&err, Error::MissingParameter(name) if name == "id"));
    assert_eq!(conn.log.created(), 0);
    assert_eq!(conn.log.io_started(), 0);
}

#[tokio::test]
async fn test_pre_cancelled_call_never_starts() {
    let conn = MockConnection::new();
    let values = update_values();
    let sink = CollectingSink::new();
    let token = CancellationToken::new();
    token.cancel();
    let ctx = ExecutionContext::new(&conn)
        .with_parameter_values(&values)
        .with_sink(&sink)
        .with_cancel_token(token);
    let command = update_command();

    let err = command.execute_non_query_async(&ctx).await.unwrap_err();
    assert!(err.is_cancelled());
    assert_eq!(err.kind(), ErrorKind::Cancellation);

    let err = command.execute_scalar_async(&ctx).await.unwrap_err();
    assert!(err.is_cancelled());

    let err = command
        .execute_reader_async(&ctx)
        .await
        .err()
        .expect("reader must fail");
    assert!(err.is_cancelled());

    assert_eq!(conn.log.created(), 0);
    assert_eq!(conn.log.io_started(), 0);
    assert_eq!(conn.state.acquired(), 0);

    let records = sink.take();
    assert_eq!(records.len(), 3);
    for record in &records {
        assert!(matches!(
            record,
            Record::Failed {
                kind: ErrorKind::Cancellation,
                ..
            }
        ));
    }
}

#[tokio::test]
async fn test_cancel_in_flight() {
    let conn = MockConnection::with_behaviour(Behaviour {
        hang: true,
        ..Behaviour::default()
    });
    let sink = CollectingSink::new();
    let token = CancellationToken::new();
    let ctx = ExecutionContext::new(&conn)
        .with_sink(&sink)
        .with_cancel_token(token.clone());
    let command = Command::without_parameters("SELECT SLEEP(60)");

    let (result, ()) = tokio::join!(command.execute_scalar_async(&ctx), async {
        while conn.log.io_started() == 0 {
            tokio::task::yield_now().await;
        }
        token.cancel();
    });

    let err = result.unwrap_err();
    assert!(err.is_cancelled());
    assert_eq!(conn.log.cancels(), 1);
    assert_eq!(conn.log.live_commands(), 0);
    assert!(!conn.state.is_busy());

    let records = sink.take();
    assert_eq!(records.len(), 2);
    let id = records[0].correlation_id();
    assert_eq!(err.correlation_id(), Some(id));
    assert_eq!(
        records[1],
        Record::Failed {
            correlation_id: id,
            operation: Operation::Scalar,
            kind: ErrorKind::Cancellation,
        }
    );
}

#[tokio::test]
async fn test_cancel_in_flight_reader() {
    let conn = MockConnection::with_behaviour(Behaviour {
        hang: true,
        ..Behaviour::default()
    });
    let token = CancellationToken::new();
    let ctx = ExecutionContext::new(&conn).with_cancel_token(token.clone());
    let command = Command::without_parameters("SELECT * FROM big");

    let (result, ()) = tokio::join!(command.execute_reader_async(&ctx), async {
        while conn.log.io_started() == 0 {
            tokio::task::yield_now().await;
        }
        token.cancel();
    });

    let err = result.err().expect("reader must be cancelled");
    assert!(err.is_cancelled());
    assert_eq!(conn.log.cancels(), 1);
    assert_eq!(conn.log.live_commands(), 0);
    assert!(!conn.state.is_busy());
}

#[tokio::test]
async fn test_timed_out_call_is_cancelled() {
    let conn = MockConnection::with_behaviour(Behaviour {
        hang: true,
        ..Behaviour::default()
    });
    let values = update_values();
    let sink = CollectingSink::new();
    let ctx = ExecutionContext::new(&conn)
        .with_parameter_values(&values)
        .with_sink(&sink);

    let timed_out = tokio::time::timeout(
        Duration::from_millis(20),
        update_command().execute_non_query_async(&ctx),
    )
    .await;
    assert!(timed_out.is_err());
    assert_eq!(conn.log.io_started(), 1);
    assert_eq!(conn.log.cancels(), 1);
    assert_eq!(conn.log.live_commands(), 0);
    assert!(!conn.state.is_busy());
    assert_eq!(conn.state.released(), 1);

    let records = sink.take();
    let id = records[0].correlation_id();
    assert_eq!(
        records,
        vec![
            Record::Executing {
                correlation_id: id,
                operation: Operation::NonQuery,
                reader_columns: None,
            },
            Record::Failed {
                correlation_id: id,
                operation: Operation::NonQuery,
                kind: ErrorKind::Cancellation,
            },
        ]
    );
}

#[tokio::test]
async fn test_timed_out_scalar_and_reader_are_cancelled() {
    let conn = MockConnection::with_behaviour(Behaviour {
        hang: true,
        ..Behaviour::default()
    });
    let sink = CollectingSink::new();
    let ctx = ExecutionContext::new(&conn).with_sink(&sink);
    let command = Command::without_parameters("SELECT * FROM big");

    let scalar =
        tokio::time::timeout(Duration::from_millis(20), command.execute_scalar_async(&ctx)).await;
    assert!(scalar.is_err());
    let reader =
        tokio::time::timeout(Duration::from_millis(20), command.execute_reader_async(&ctx)).await;
    assert!(reader.is_err());

    assert_eq!(conn.log.cancels(), 2);
    assert_eq!(conn.log.live_commands(), 0);
    assert!(!conn.state.is_busy());

    let failed: Vec<_> = sink
        .take()
        .into_iter()
        .filter_map(|record| match record {
            Record::Failed {
                operation, kind, ..
            } => Some((operation, kind)),
            _ => None,
        })
        .collect();
    assert_eq!(
        failed,
        vec![
            (Operation::Scalar, ErrorKind::Cancellation),
            (Operation::Reader, ErrorKind::Cancellation),
        ]
    );
}

#[tokio::test]
async fn test_completed_call_is_not_cancelled_by_drop() {
    let conn = MockConnection::with_behaviour(Behaviour {
        rows_affected: 1,
        ..Behaviour::default()
    });
    let values = update_values();
    let sink = CollectingSink::new();
    let ctx = ExecutionContext::new(&conn)
        .with_parameter_values(&values)
        .with_sink(&sink);

    let rows = tokio::time::timeout(
        Duration::from_secs(5),
        update_command().execute_non_query_async(&ctx),
    )
    .await
    .expect("in time")
    .expect("execute");
    assert_eq!(rows, 1);
    assert_eq!(conn.log.cancels(), 0);
    assert_eq!(sink.take().len(), 2);
}

#[tokio::test]
async fn test_unfired_token_completes_normally() {
    let conn = MockConnection::with_behaviour(Behaviour {
        rows_affected: 3,
        ..Behaviour::default()
    });
    let values = update_values();
    let token = CancellationToken::new();
    let ctx = ExecutionContext::new(&conn)
        .with_parameter_values(&values)
        .with_cancel_token(token.clone());

    let rows = update_command()
        .execute_non_query_async(&ctx)
        .await
        .expect("execute");
    assert_eq!(rows, 3);
    assert!(!token.is_cancelled());
    assert_eq!(conn.log.cancels(), 0);
}

#[tokio::test]
async fn test_execution_failure_async() {
    let conn = MockConnection::with_behaviour(Behaviour {
        fail: Some("deadlock".to_string()),
        ..Behaviour::default()
    });
    let ctx = ExecutionContext::new(&conn);

    let err = Command::without_parameters("UPDATE t SET v = 1")
        .execute_non_query_async(&ctx)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Execution);
    assert!(err.to_string().contains("deadlock"));
    assert!(!conn.state.is_busy());
}
