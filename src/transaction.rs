//! Transaction boundary around a unit of work.
//!
//! One flat scope per call: auto-commit is switched off for the duration,
//! the work runs against the same connection, and the connection's previous
//! auto-commit mode is put back whatever the outcome. There are no nested
//! transactions or savepoints.

use crate::error::TideError;
use crate::executor::Connection;

#[cfg(feature = "metrics")]
use crate::metrics::METRICS;
#[cfg(feature = "tracing")]
use crate::metrics::tracing_helpers;

/// Run `work` in a transaction on `conn`.
///
/// Commits when `work` succeeds. On failure the transaction is rolled back
/// and the error is returned as `TideError::Execution` with the original as
/// its source; `Configuration` and `Validation` errors are returned as they
/// are, since nothing was attempted against the store for them.
///
/// # Errors
///
/// The error of `work` (see above), or `Execution` when the commit fails.
pub fn run_in_transaction<C, T, F>(conn: &mut C, work: F) -> Result<T, TideError>
where
    C: Connection + ?Sized,
    F: FnOnce(&mut C) -> Result<T, TideError>,
{
    #[cfg(feature = "tracing")]
    let _span = tracing_helpers::begin_transaction_span().entered();

    let previous = conn.auto_commit();
    if previous {
        conn.set_auto_commit(false)?;
    }

    let result = match work(conn) {
        Ok(value) => match commit(conn) {
            Ok(()) => Ok(value),
            Err(err) => {
                rollback(conn);
                Err(TideError::execution_caused_by("commit failed", err))
            }
        },
        Err(err) => {
            rollback(conn);
            log::warn!("transaction rolled back: {err}");
            if err.is_precondition() {
                Err(err)
            } else {
                Err(TideError::execution_caused_by("transaction rolled back", err))
            }
        }
    };

    if previous {
        if let Err(err) = conn.set_auto_commit(true) {
            log::error!("failed to restore auto-commit: {err}");
        }
    }

    result
}

fn commit<C: Connection + ?Sized>(conn: &mut C) -> Result<(), TideError> {
    #[cfg(feature = "tracing")]
    let _span = tracing_helpers::commit_transaction_span().entered();

    conn.commit()?;

    #[cfg(feature = "metrics")]
    METRICS.record_commit();
    Ok(())
}

/// Roll back, keeping whatever error caused it. A failed rollback is only logged.
fn rollback<C: Connection + ?Sized>(conn: &mut C) {
    #[cfg(feature = "tracing")]
    let _span = tracing_helpers::rollback_transaction_span().entered();

    if let Err(err) = conn.rollback() {
        log::error!("rollback failed: {err}");
    }

    #[cfg(feature = "metrics")]
    METRICS.record_rollback();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::Executor;
    use crate::test_helpers::{MockEvent, MockStore};

    #[test]
    fn test_commit_on_success_restores_auto_commit() {
        let store = MockStore::new();
        let mut conn = store.connection();

        let affected = run_in_transaction(&mut conn, |c| c.execute("UPDATE t SET a = 1", &[])).unwrap();
        assert_eq!(affected, 1);
        assert_eq!(
            store.events(),
            vec![
                MockEvent::AutoCommit(false),
                MockEvent::Statement("UPDATE t SET a = 1".to_string()),
                MockEvent::Commit,
                MockEvent::AutoCommit(true),
            ]
        );
        assert!(conn.auto_commit());
    }

    #[test]
    fn test_execution_failure_rolls_back_and_wraps() {
        let store = MockStore::new();
        store.fail_on("DELETE");
        let mut conn = store.connection();

        let err = run_in_transaction(&mut conn, |c| {
            c.execute("UPDATE t SET a = 1", &[])?;
            c.execute("DELETE FROM t", &[])
        })
        .unwrap_err();

        assert!(err.is_execution());
        assert!(err.root_cause().to_string().contains("scripted failure"));
        let events = store.events();
        assert!(events.contains(&MockEvent::Rollback));
        assert!(!events.contains(&MockEvent::Commit));
        assert_eq!(events.last(), Some(&MockEvent::AutoCommit(true)));
    }

    #[test]
    fn test_precondition_errors_pass_through() {
        let store = MockStore::new();
        let mut conn = store.connection();

        let err = run_in_transaction(&mut conn, |_| -> Result<(), TideError> {
            Err(TideError::configuration("no such relation"))
        })
        .unwrap_err();
        assert!(err.is_configuration());

        let err = run_in_transaction(&mut conn, |_| -> Result<(), TideError> {
            Err(TideError::validation("empty"))
        })
        .unwrap_err();
        assert!(err.is_validation());
        assert_eq!(
            store.events().iter().filter(|e| **e == MockEvent::Rollback).count(),
            2
        );
    }

    #[test]
    fn test_commit_failure_rolls_back() {
        let store = MockStore::new();
        store.fail_commit();
        let mut conn = store.connection();

        let err = run_in_transaction(&mut conn, |c| c.execute("UPDATE t SET a = 1", &[])).unwrap_err();
        assert!(err.is_execution());
        assert!(store.events().contains(&MockEvent::Rollback));
        assert!(conn.auto_commit());
    }

    #[test]
    fn test_manual_mode_is_left_alone() {
        let store = MockStore::new();
        let mut conn = store.connection();
        conn.set_auto_commit(false).unwrap();

        run_in_transaction(&mut conn, |c| c.execute("UPDATE t SET a = 1", &[])).unwrap();
        assert!(!conn.auto_commit());
        assert_eq!(store.events().last(), Some(&MockEvent::Commit));
    }
}
