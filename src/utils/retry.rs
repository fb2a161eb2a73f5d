// Retry with a fixed delay between attempts

use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::warn;

/// Run `operation`, retrying on failure after `delay`, up to `max_retries`
/// additional attempts. Returns the first success or the last error.
pub async fn with_retry<F, Fut, T, E>(
    mut operation: F,
    max_retries: u32,
    delay: Duration,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempt = 0u32;

    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(error) => {
                if attempt >= max_retries {
                    return Err(error);
                }
                attempt += 1;
                warn!(attempt, max_retries, error = %error, "attempt failed, retrying");
                sleep(delay).await;
            }
        }
    }
}
