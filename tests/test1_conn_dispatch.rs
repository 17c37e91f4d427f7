use std::time::Duration;

use table_sql_middleware::backend::{Column, QueryResult, ResultSetData, StatsMode};
use table_sql_middleware::prelude::*;
use table_sql_middleware::test_utils::{Call, MockBackend, Op};
use tokio_util::sync::CancellationToken;

fn users(ids: &[u64]) -> ResultSetData {
    ResultSetData::new(
        vec![Column::new("id", "Uint64"), Column::new("name", "Utf8?")],
        ids.iter()
            .map(|id| vec![Value::Uint64(*id), Value::optional(Value::Utf8(format!("user{id}")))])
            .collect(),
    )
}

fn executes(mock: &MockBackend) -> Vec<Call> {
    mock.calls()
        .into_iter()
        .filter(|c| c.op() == Op::Execute)
        .collect()
}

#[tokio::test]
async fn data_exec_binds_named_values_with_default_control() -> Result<(), TableSqlError> {
    let mock = MockBackend::new();
    let mut conn = mock.connection().await;

    conn.exec(
        &ExecContext::default(),
        "UPSERT INTO users (id, name) VALUES ($id, $name)",
        &[NamedArg::named("id", 1_u64), NamedArg::named("name", "alice")],
    )
    .await?;

    let calls = executes(&mock);
    assert_eq!(calls.len(), 1);
    let Call::Execute {
        tx_control, params, ..
    } = &calls[0]
    else {
        unreachable!()
    };
    assert_eq!(tx_control, &TxControl::default());
    assert_eq!(params.get("$id"), Some(&Value::Uint64(1)));
    assert_eq!(params.get("$name"), Some(&Value::Utf8("alice".into())));
    Ok(())
}

#[tokio::test]
async fn per_call_overrides_layer_on_connection_defaults() -> Result<(), TableSqlError> {
    let mock = MockBackend::new();
    let options = ConnectorOptions {
        data_query_options: vec![DataQueryOption::KeepInCache(true)],
        ..MockBackend::options()
    };
    let connector = mock.driver().connector(options);
    let mut conn = connector.connect(&ExecContext::default()).await?;

    let stale = TxControl::begin(TxSettings::StaleReadOnly).with_commit();
    let ctx = ExecContext::default()
        .with_tx_control(stale.clone())
        .with_data_options([DataQueryOption::CollectStats(StatsMode::Basic)]);
    conn.query(&ctx, "SELECT 1", &[]).await?;

    let calls = executes(&mock);
    let Call::Execute {
        tx_control,
        options,
        ..
    } = &calls[0]
    else {
        unreachable!()
    };
    assert_eq!(tx_control, &stale);
    assert_eq!(
        options,
        &vec![
            DataQueryOption::KeepInCache(true),
            DataQueryOption::CollectStats(StatsMode::Basic),
        ]
    );
    Ok(())
}

#[tokio::test]
async fn data_query_buffers_every_result_set() -> Result<(), TableSqlError> {
    let mock = MockBackend::new();
    mock.push_result(QueryResult::new(vec![users(&[1, 2]), users(&[3])]));
    let mut conn = mock.connection().await;

    let mut rows = conn.query(&ExecContext::default(), "SELECT * FROM users", &[]).await?;
    assert_eq!(rows.columns(), ["id", "name"]);
    assert!(rows.has_next_result_set());

    let sets = rows.collect_all().await?;
    assert_eq!(sets.len(), 2);
    assert_eq!(sets[0].len(), 2);
    assert_eq!(sets[1].results[0].get("id").and_then(Value::as_i64), Some(3));
    assert_eq!(
        sets[0].results[1].get("name").and_then(Value::as_text),
        Some("user2")
    );
    assert!(!rows.next_result_set());
    Ok(())
}

#[tokio::test]
async fn scan_directive_streams_parts_lazily() -> Result<(), TableSqlError> {
    let mock = MockBackend::new();
    mock.set_scan_parts(vec![users(&[1, 2]), users(&[3])]);
    let mut conn = mock.connection().await;

    let mut rows = conn
        .query(&ExecContext::default(), &scan_query("SELECT * FROM users"), &[])
        .await?;
    assert_eq!(mock.count(Op::StreamScan), 1);
    assert_eq!(mock.count(Op::ScanPart), 1);
    assert_eq!(rows.columns(), ["id", "name"]);

    let mut ids = Vec::new();
    while let Some(row) = rows.next().await? {
        ids.push(row[0].as_i64());
    }
    assert_eq!(ids, [Some(1), Some(2), Some(3)]);
    assert_eq!(mock.count(Op::ScanPart), 3);
    assert!(!rows.next_result_set());
    rows.close().await?;
    assert_eq!(mock.count(Op::CloseScan), 1);
    assert_eq!(mock.count(Op::Execute), 0);
    Ok(())
}

#[tokio::test]
async fn scan_honors_cancellation_between_parts() -> Result<(), TableSqlError> {
    let mock = MockBackend::new();
    mock.set_scan_parts(vec![users(&[1]), users(&[2])]);
    let mut conn = mock.connection().await;

    let token = CancellationToken::new();
    let ctx = ExecContext::new(token.clone()).with_mode(QueryMode::Scan);
    let mut rows = conn.query(&ctx, "SELECT * FROM users", &[]).await?;
    assert!(rows.next().await?.is_some());

    token.cancel();
    let err = rows.next().await.unwrap_err();
    assert!(err.is_cancelled());
    Ok(())
}

#[tokio::test]
async fn scan_open_is_cancellable_while_backend_hangs() {
    let mock = MockBackend::new();
    mock.hang(Op::ScanPart);
    let mut conn = mock.connection().await;

    let token = CancellationToken::new();
    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        canceller.cancel();
    });
    let ctx = ExecContext::new(token);
    let err = conn
        .query(&ctx, &scan_query("SELECT * FROM big"), &[])
        .await
        .unwrap_err();
    assert!(err.is_cancelled());
    assert!(!conn.is_bad());
    assert_eq!(mock.count(Op::CloseScan), 1);
}

#[tokio::test]
async fn scan_stream_is_closed_when_first_part_fails() {
    let mock = MockBackend::new();
    mock.fail(
        Op::ScanPart,
        BackendError::operation(StatusCode::SchemeError, "table not found"),
    );
    let mut conn = mock.connection().await;

    let err = conn
        .query(&ExecContext::default(), &scan_query("SELECT * FROM missing"), &[])
        .await
        .unwrap_err();
    assert!(err.backend_error().is_some_and(BackendError::is_scheme_error));
    assert_eq!(mock.count(Op::ScanPart), 1);
    assert_eq!(mock.count(Op::CloseScan), 1);
}

#[tokio::test]
async fn explain_returns_single_ast_and_plan_row() -> Result<(), TableSqlError> {
    let mock = MockBackend::new();
    mock.set_explanation("(let x (Read!))", r#"{"Plan":{}}"#);
    let mut conn = mock.connection().await;

    let ctx = ExecContext::default().with_mode(QueryMode::Explain);
    let mut rows = conn.query(&ctx, "SELECT * FROM users", &[]).await?;
    assert_eq!(rows.columns(), ["AST", "Plan"]);
    let row = rows.next().await?.expect("one row");
    assert_eq!(row[0].as_text(), Some("(let x (Read!))"));
    assert_eq!(row[1].as_text(), Some(r#"{"Plan":{}}"#));
    assert!(rows.next().await?.is_none());
    assert_eq!(mock.count(Op::Explain), 1);
    Ok(())
}

#[tokio::test]
async fn scheme_exec_takes_options_from_arguments() -> Result<(), TableSqlError> {
    let mock = MockBackend::new();
    let mut conn = mock.connection().await;

    conn.exec(
        &ExecContext::default(),
        &scheme_query("CREATE TABLE t (id Uint64, PRIMARY KEY (id))"),
        &[NamedArg::named(
            "timeout",
            SchemeOption::OperationTimeout(Duration::from_secs(3)),
        )],
    )
    .await?;
    let calls: Vec<_> = mock
        .calls()
        .into_iter()
        .filter(|c| c.op() == Op::ExecuteScheme)
        .collect();
    assert!(matches!(
        &calls[..],
        [Call::ExecuteScheme { options, .. }] if options == &[SchemeOption::OperationTimeout(Duration::from_secs(3))]
    ));

    let err = conn
        .exec(
            &ExecContext::default().with_mode(QueryMode::Scheme),
            "DROP TABLE t",
            &[NamedArg::named("id", 1_i32)],
        )
        .await
        .unwrap_err();
    assert!(matches!(err, TableSqlError::InvalidSchemeArgument { .. }));
    assert_eq!(mock.count(Op::ExecuteScheme), 1);
    Ok(())
}

#[tokio::test]
async fn unsupported_modes_fail_before_any_backend_call() {
    let mock = MockBackend::new();
    let mut conn = mock.connection().await;
    let before = mock.calls().len();
    let ctx = ExecContext::default();

    let err = conn.query(&ctx, &scheme_query("CREATE TABLE t"), &[]).await.unwrap_err();
    assert!(matches!(
        err,
        TableSqlError::UnsupportedQueryMode { mode: QueryMode::Scheme, .. }
    ));
    for query in [scan_query("SELECT 1"), explain_query("SELECT 1")] {
        let err = conn.exec(&ctx, &query, &[]).await.unwrap_err();
        assert!(matches!(err, TableSqlError::UnsupportedQueryMode { .. }), "{err}");
    }
    assert_eq!(mock.calls().len(), before);
    assert!(!conn.is_bad());
}

#[tokio::test]
async fn unnamed_arguments_are_rejected() {
    let mock = MockBackend::new();
    let mut conn = mock.connection().await;

    let err = conn
        .exec(
            &ExecContext::default(),
            "SELECT $1",
            &[NamedArg::positional(1, 5_i64)],
        )
        .await
        .unwrap_err();
    assert!(matches!(err, TableSqlError::InvalidParameter { ordinal: 1 }));
    assert_eq!(mock.count(Op::Execute), 0);
}

#[tokio::test]
async fn session_loss_marks_connection_bad() {
    let mock = MockBackend::new();
    mock.fail(
        Op::Execute,
        BackendError::operation(StatusCode::BadSession, "session expired on node 3"),
    );
    let mut conn = mock.connection().await;

    let err = conn
        .exec(&ExecContext::default().with_idempotent(true), "SELECT 1", &[])
        .await
        .unwrap_err();
    assert!(err.is_bad_connection());
    assert!(conn.is_bad());
    assert_eq!(mock.count(Op::Execute), 1);
}

#[tokio::test]
async fn non_retryable_failures_propagate_unchanged() {
    let mock = MockBackend::new();
    mock.fail(
        Op::Execute,
        BackendError::operation(StatusCode::SchemeError, "table not found"),
    );
    let mut conn = mock.connection().await;

    let err = conn
        .query(&ExecContext::default(), "SELECT * FROM missing", &[])
        .await
        .unwrap_err();
    assert!(err.backend_error().is_some_and(BackendError::is_scheme_error));
    assert!(!conn.is_bad());
}

#[tokio::test]
async fn ping_reports_session_health() -> Result<(), TableSqlError> {
    let mock = MockBackend::new();
    let mut conn = mock.connection().await;
    conn.ping(&ExecContext::default()).await?;

    mock.fail(
        Op::KeepAlive,
        BackendError::operation(StatusCode::SessionExpired, "expired"),
    );
    let err = conn.ping(&ExecContext::default()).await.unwrap_err();
    assert!(err.is_bad_connection());
    assert!(conn.is_bad());
    assert_eq!(mock.count(Op::KeepAlive), 2);
    Ok(())
}

#[tokio::test]
async fn close_rolls_back_open_transaction_then_closes_session() -> Result<(), TableSqlError> {
    let mock = MockBackend::new();
    let mut conn = mock.connection().await;
    conn.begin_tx(&ExecContext::default(), TxOptions::default())
        .await?;
    let session = conn.session_id().to_owned();

    conn.close().await?;

    let tail: Vec<_> = mock.calls().into_iter().rev().take(2).collect();
    assert_eq!(
        tail,
        [
            Call::CloseSession { session },
            Call::Rollback { tx: "tx-1".into() },
        ]
    );
    Ok(())
}

#[tokio::test]
async fn legacy_entry_points_are_deprecated() {
    let mock = MockBackend::new();
    let conn = mock.connection().await;
    assert!(matches!(conn.legacy_prepare("SELECT 1"), Err(TableSqlError::Deprecated)));
    assert!(matches!(conn.legacy_begin(), Err(TableSqlError::Deprecated)));
    assert!(matches!(mock.driver().open("table"), Err(TableSqlError::Deprecated)));
}

#[tokio::test]
async fn check_named_value_prevalidates_like_exec() -> Result<(), TableSqlError> {
    let mock = MockBackend::new();
    let conn = mock.connection().await;

    let mut arg = NamedArg::named("id", uuid::Uuid::nil());
    conn.check_named_value(&mut arg)?;
    assert_eq!(arg.name, "$id");

    let mut bad = NamedArg::named("payload", serde_json::json!({"k": 1}));
    let err = conn.check_named_value(&mut bad).unwrap_err();
    assert!(matches!(err, TableSqlError::UnsupportedParameterType { .. }));
    Ok(())
}
