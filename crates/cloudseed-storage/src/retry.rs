use std::time::Duration;

use crate::RetryConfig;

/// Exponential backoff schedule without jitter: `retry_delay_ms` doubling up
/// to `retry_max_delay_ms`, one entry per retry attempt.
pub(crate) fn backoff_schedule(config: &RetryConfig) -> impl Iterator<Item = u64> + '_ {
    let mut delay_ms = config.retry_delay_ms;
    (0..config.max_retries).map(move |_| {
        let current = delay_ms;
        delay_ms = delay_ms.saturating_mul(2).min(config.retry_max_delay_ms);
        current
    })
}

/// Retry a closure on transient `ureq::Error`s with exponential backoff + jitter.
#[allow(clippy::result_large_err)]
pub fn retry_http<T>(
    config: &RetryConfig,
    op_name: &str,
    store_label: &str,
    f: impl Fn() -> std::result::Result<T, ureq::Error>,
) -> std::result::Result<T, ureq::Error> {
    let mut delays = backoff_schedule(config);
    let mut attempt = 0usize;
    loop {
        let err = match f() {
            Ok(val) => return Ok(val),
            Err(e) => e,
        };
        if !is_retryable_http(&err) {
            return Err(err);
        }
        let Some(delay_ms) = delays.next() else {
            return Err(err);
        };
        attempt += 1;
        tracing::warn!(
            "{store_label} {op_name}: transient error (attempt {attempt}/{}), retrying: {err}",
            config.max_retries,
        );
        let jitter = rand::random::<u64>() % delay_ms.max(1);
        std::thread::sleep(Duration::from_millis(delay_ms + jitter));
    }
}

/// Whether an HTTP error is transient and worth retrying.
pub fn is_retryable_http(err: &ureq::Error) -> bool {
    match err {
        ureq::Error::Transport(_) => true,
        ureq::Error::Status(code, _) => *code == 429 || *code >= 500,
    }
}
