//! Shared worker-loop plumbing for the long-running stage commands.
//!
//! Each worker binds to one pipeline stage and repeats: claim a batch, do the
//! stage work, write results back. Workers coordinate only through posting
//! status and leases in the store, so any number of them can run against the
//! same database.

use std::future::Future;
use std::time::Duration;

use tracing::{error, info};
use uuid::Uuid;

pub(crate) mod analyze;
pub(crate) mod vectorize;

/// Sleep after a failed pass before polling again.
const ERROR_BACKOFF: Duration = Duration::from_secs(10);

/// Lease owner label for claims taken by this process.
pub(crate) fn worker_id(stage: &str) -> String {
    format!("{stage}-{}", Uuid::new_v4())
}

/// Drives `pass` until shutdown (or once, with `once`).
///
/// An empty pass sleeps `idle` before polling again; a failed pass logs and
/// backs off [`ERROR_BACKOFF`]. With `once` the loop runs a single pass and
/// propagates its error, which is what the live tests and cron-style
/// deployments use. SIGINT/SIGTERM stop the loop between passes.
pub(crate) async fn poll_loop<F, Fut>(
    stage: &str,
    idle: Duration,
    once: bool,
    mut pass: F,
) -> anyhow::Result<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = anyhow::Result<usize>>,
{
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    info!(stage, once, "worker started");

    loop {
        let result = tokio::select! {
            () = &mut shutdown => {
                info!(stage, "received shutdown signal, stopping worker");
                return Ok(());
            }
            result = pass() => result,
        };

        let sleep_for = match result {
            Ok(0) => {
                if once {
                    return Ok(());
                }
                idle
            }
            Ok(processed) => {
                info!(stage, processed, "pass complete");
                if once {
                    return Ok(());
                }
                // More work may be waiting; poll again immediately.
                continue;
            }
            Err(e) => {
                if once {
                    return Err(e);
                }
                error!(stage, error = %e, "pass failed, backing off");
                ERROR_BACKOFF
            }
        };

        tokio::select! {
            () = &mut shutdown => {
                info!(stage, "received shutdown signal, stopping worker");
                return Ok(());
            }
            () = tokio::time::sleep(sleep_for) => {}
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to listen for ctrl-c");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    #[tokio::test]
    async fn once_runs_exactly_one_pass() {
        let calls = AtomicU32::new(0);
        let result = poll_loop("test", Duration::from_secs(60), true, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok(3) }
        })
        .await;

        assert!(result.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn once_with_empty_pass_still_returns() {
        let result = poll_loop("test", Duration::from_secs(60), true, || async { Ok(0) }).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn once_propagates_pass_errors() {
        let result = poll_loop("test", Duration::from_secs(60), true, || async {
            Err(anyhow::anyhow!("store unreachable"))
        })
        .await;

        let err = result.expect_err("pass error must surface with --once");
        assert!(err.to_string().contains("store unreachable"));
    }

    #[test]
    fn worker_ids_are_unique_per_process() {
        let a = worker_id("vectorize");
        let b = worker_id("vectorize");
        assert!(a.starts_with("vectorize-"));
        assert_ne!(a, b);
    }
}
