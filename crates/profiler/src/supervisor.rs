use std::fmt::Debug;
use std::future::Future;

use anyhow::anyhow;
use tokio_util::sync::CancellationToken;

/// Runs `future` as its own task and reports how it ended.
///
/// Success is logged at debug level, errors and panics at error level. The
/// token is cancelled in every case so sibling tasks wind down with it.
pub async fn supervise<F, T, E>(
    future: F,
    token: CancellationToken,
    task_name: &str,
) -> anyhow::Result<T>
where
    F: Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: Into<anyhow::Error> + Debug + Send + 'static,
{
    let handle = tokio::spawn(future);

    let result = match handle.await {
        Ok(Ok(value)) => {
            log::debug!("{} completed successfully", task_name);
            Ok(value)
        }
        Ok(Err(error)) => {
            log::error!("{} failed with error: {:?}", task_name, error);
            Err(error.into())
        }
        Err(join_error) => {
            log::error!("{} panicked or was cancelled: {:?}", task_name, join_error);
            Err(anyhow!("{} panicked or was cancelled", task_name))
        }
    };

    token.cancel();
    result
}
