/// Bounded fan-out over independent items
///
/// Every item is processed; a failing item never cancels its siblings. Callers
/// that need per-item error handling return a `Result` from the closure and
/// inspect each output themselves.
use futures_util::stream::{self, StreamExt};
use std::future::Future;

/// Run `f` over `items` with at most `limit` futures in flight.
///
/// Outputs are returned in input order regardless of completion order.
/// A `limit` of zero is treated as one.
pub async fn gather_bounded<I, F, Fut, T>(items: I, limit: usize, f: F) -> Vec<T>
where
    I: IntoIterator,
    F: FnMut(I::Item) -> Fut,
    Fut: Future<Output = T>,
{
    stream::iter(items)
        .map(f)
        .buffered(limit.max(1))
        .collect()
        .await
}
