//! Stream-level retry with exponential backoff.
//!
//! Wraps a provider's stream factory. **Key constraint**: a retry is only
//! possible while no chunk has been yielded yet — once data reaches the
//! caller, the stream cannot be restarted.
//!
//! Transient failures (connection reset, HTTP 429/5xx incl. 503) are
//! retried with backoff starting at the configured base delay (2 s by
//! default), doubling, capped at the configured retry count (4). Any other
//! failure is surfaced verbatim.

use std::future::Future;
use std::pin::Pin;

use futures::Stream;
use hive_core::retry::{backoff_delay_ms, RetryConfig};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::provider::{ChunkStream, ProviderError, StreamChunk};

/// Factory invoked on each attempt to open a fresh stream.
pub type StreamFactory = Box<
    dyn Fn() -> Pin<Box<dyn Future<Output = Result<ChunkStream, ProviderError>> + Send>>
        + Send,
>;

/// Wrap a stream factory with retry logic.
///
/// The returned stream transparently retries failed attempts while nothing
/// has been yielded; once chunks flow, errors pass straight through. When a
/// cancellation token is supplied, backoff sleeps abort promptly.
pub fn with_provider_retry(
    factory: StreamFactory,
    config: RetryConfig,
    cancel: Option<CancellationToken>,
) -> Pin<Box<dyn Stream<Item = Result<StreamChunk, ProviderError>> + Send>> {
    use futures::StreamExt;

    type Item = Result<StreamChunk, ProviderError>;

    Box::pin(async_stream::stream! {
        let mut attempt = 0u32;
        let mut has_yielded = false;

        loop {
            match factory().await {
                Ok(inner) => {
                    let mut inner = std::pin::pin!(inner);
                    while let Some(item) = StreamExt::next(&mut inner).await {
                        has_yielded = true;
                        let v: Item = item;
                        yield v;
                    }
                    break;
                }
                Err(err) => {
                    if has_yielded || !err.is_retryable() || attempt >= config.max_retries {
                        let v: Item = Err(err);
                        yield v;
                        break;
                    }

                    if let Some(ref token) = cancel {
                        if token.is_cancelled() {
                            let v: Item = Err(ProviderError::Cancelled);
                            yield v;
                            break;
                        }
                    }

                    let delay_ms =
                        backoff_delay_ms(attempt, config.base_delay_ms, config.max_delay_ms);
                    attempt += 1;
                    warn!(
                        attempt,
                        max_retries = config.max_retries,
                        delay_ms,
                        category = err.category(),
                        "transient provider failure, retrying: {err}"
                    );
                    metrics::counter!(
                        "provider_retries_total",
                        "category" => err.category()
                    )
                    .increment(1);

                    let sleep = tokio::time::sleep(std::time::Duration::from_millis(delay_ms));
                    if let Some(ref token) = cancel {
                        tokio::select! {
                            () = sleep => {}
                            () = token.cancelled() => {
                                let v: Item = Err(ProviderError::Cancelled);
                                yield v;
                                break;
                            }
                        }
                    } else {
                        sleep.await;
                    }
                }
            }
        }
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
