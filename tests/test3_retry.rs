use std::time::Duration;

use table_sql_middleware::prelude::*;
use table_sql_middleware::test_utils::{MockBackend, Op};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

fn status(code: StatusCode) -> BackendError {
    BackendError::operation(code, "scripted")
}

async fn connection_with(mock: &MockBackend, policy: RetryPolicy) -> Connection {
    let options = ConnectorOptions {
        retry: policy,
        ..MockBackend::options()
    };
    mock.driver()
        .connector(options)
        .connect(&ExecContext::default())
        .await
        .expect("mock connect")
}

#[tokio::test]
async fn aborted_is_retried_until_success() -> Result<(), TableSqlError> {
    let mock = MockBackend::new();
    mock.fail_times(Op::Execute, &status(StatusCode::Aborted), 3);
    let mut conn = mock.connection().await;

    conn.exec(&ExecContext::default(), "UPDATE t SET v = 1", &[])
        .await?;
    assert_eq!(mock.count(Op::Execute), 4);
    assert!(!conn.is_bad());
    Ok(())
}

#[tokio::test]
async fn undetermined_waits_for_idempotency() -> Result<(), TableSqlError> {
    let mock = MockBackend::new();
    mock.fail(Op::Execute, status(StatusCode::Undetermined));
    let mut conn = mock.connection().await;

    let err = conn
        .exec(&ExecContext::default(), "UPDATE t SET v = v + 1", &[])
        .await
        .unwrap_err();
    assert_eq!(
        err.backend_error().and_then(BackendError::status),
        Some(StatusCode::Undetermined)
    );
    assert_eq!(mock.count(Op::Execute), 1);

    mock.fail(Op::Execute, status(StatusCode::Undetermined));
    conn.exec(
        &ExecContext::default().with_idempotent(true),
        "UPSERT INTO t (id, v) VALUES (1, 1)",
        &[],
    )
    .await?;
    assert_eq!(mock.count(Op::Execute), 3);
    Ok(())
}

#[tokio::test]
async fn lost_session_stops_after_one_attempt() {
    let mock = MockBackend::new();
    mock.fail_times(Op::Execute, &status(StatusCode::BadSession), 5);
    let mut conn = mock.connection().await;

    let err = conn
        .query(
            &ExecContext::default().with_idempotent(true),
            "SELECT 1",
            &[],
        )
        .await
        .unwrap_err();
    assert!(err.is_bad_connection());
    assert_eq!(mock.count(Op::Execute), 1);
    assert!(conn.is_bad());
}

#[tokio::test]
async fn transport_failure_invalidates_the_session() {
    let mock = MockBackend::new();
    mock.fail(
        Op::Execute,
        BackendError::transport(TransportCode::Unavailable, "connection reset"),
    );
    let mut conn = mock.connection().await;

    let err = conn
        .exec(&ExecContext::default(), "SELECT 1", &[])
        .await
        .unwrap_err();
    assert!(err.is_bad_connection());
    assert_eq!(mock.count(Op::Execute), 1);
}

#[tokio::test]
async fn overloaded_budget_surfaces_bad_connection() {
    let mock = MockBackend::new();
    mock.fail_times(Op::Execute, &status(StatusCode::Overloaded), 10);
    let policy = MockBackend::options().retry.with_max_attempts(3);
    let mut conn = connection_with(&mock, policy).await;

    let err = conn
        .exec(&ExecContext::default(), "UPDATE t SET v = 1", &[])
        .await
        .unwrap_err();
    assert!(err.is_bad_connection());
    assert_eq!(mock.count(Op::Execute), 3);
    assert!(conn.is_bad());
}

#[tokio::test]
async fn fatal_status_is_not_retried() {
    let mock = MockBackend::new();
    mock.fail_times(Op::Execute, &status(StatusCode::PreconditionFailed), 3);
    let mut conn = mock.connection().await;

    let err = conn
        .exec(
            &ExecContext::default().with_idempotent(true),
            "INSERT INTO t (id) VALUES (1)",
            &[],
        )
        .await
        .unwrap_err();
    assert_eq!(
        err.backend_error().and_then(BackendError::status),
        Some(StatusCode::PreconditionFailed)
    );
    assert_eq!(mock.count(Op::Execute), 1);
    assert!(!conn.is_bad());
}

fn ten_ms_policy() -> RetryPolicy {
    RetryPolicy::default()
        .with_fast(Backoff::new(Duration::from_millis(10), 6, 1.0))
        .with_slow(Backoff::new(Duration::from_millis(100), 6, 1.0))
}

#[tokio::test(start_paused = true)]
async fn alternating_codes_restart_the_backoff_ladder() -> Result<(), TableSqlError> {
    let mock = MockBackend::new();
    for code in [
        StatusCode::Aborted,
        StatusCode::Unavailable,
        StatusCode::Aborted,
        StatusCode::Unavailable,
    ] {
        mock.fail(Op::Execute, status(code));
    }
    let mut conn = connection_with(&mock, ten_ms_policy()).await;

    let started = Instant::now();
    conn.exec(&ExecContext::default(), "UPDATE t SET v = 1", &[])
        .await?;
    let elapsed = started.elapsed();
    assert!(
        elapsed >= Duration::from_millis(40) && elapsed < Duration::from_millis(50),
        "waited {elapsed:?}"
    );
    assert_eq!(mock.count(Op::Execute), 5);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn repeated_code_climbs_the_backoff_ladder() -> Result<(), TableSqlError> {
    let mock = MockBackend::new();
    mock.fail_times(Op::Execute, &status(StatusCode::Aborted), 4);
    let mut conn = connection_with(&mock, ten_ms_policy()).await;

    let started = Instant::now();
    conn.exec(&ExecContext::default(), "UPDATE t SET v = 1", &[])
        .await?;
    let elapsed = started.elapsed();
    assert!(
        elapsed >= Duration::from_millis(150) && elapsed < Duration::from_millis(160),
        "waited {elapsed:?}"
    );
    Ok(())
}

#[tokio::test]
async fn cancellation_interrupts_backoff() {
    let mock = MockBackend::new();
    mock.fail_times(Op::Execute, &status(StatusCode::Overloaded), 100);
    let policy = RetryPolicy::default().with_slow(Backoff::new(Duration::from_secs(60), 6, 1.0));
    let mut conn = connection_with(&mock, policy).await;

    let token = CancellationToken::new();
    let ctx = ExecContext::new(token.clone());
    let canceller = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        token.cancel();
    });

    let err = conn.exec(&ctx, "UPDATE t SET v = 1", &[]).await.unwrap_err();
    assert!(err.is_cancelled());
    assert_eq!(mock.count(Op::Execute), 1);
    assert!(!conn.is_bad());
    canceller.await.expect("canceller task");
}

#[tokio::test]
async fn cancelled_context_makes_no_backend_call() {
    let mock = MockBackend::new();
    let mut conn = mock.connection().await;
    let before = mock.calls().len();

    let token = CancellationToken::new();
    token.cancel();
    let err = conn
        .query(&ExecContext::new(token), "SELECT 1", &[])
        .await
        .unwrap_err();
    assert!(matches!(err, TableSqlError::Cancelled));
    assert_eq!(mock.calls().len(), before);
}

#[tokio::test]
async fn explain_is_retried_regardless_of_idempotency() -> Result<(), TableSqlError> {
    let mock = MockBackend::new();
    mock.fail(Op::Explain, status(StatusCode::Undetermined));
    mock.set_explanation("ast", "plan");
    let mut conn = mock.connection().await;

    let mut rows = conn
        .query(&ExecContext::default(), &explain_query("SELECT 1"), &[])
        .await?;
    let row = rows.next().await?.expect("explanation row");
    assert_eq!(row[1].as_text(), Some("plan"));
    assert_eq!(mock.count(Op::Explain), 2);
    Ok(())
}
