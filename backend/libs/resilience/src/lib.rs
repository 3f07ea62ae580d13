/// Resilience helpers for backend calls
///
/// - **Timeout**: every suspending call to storage or the table API gets a deadline
/// - **Fan-out**: bounded, order-preserving concurrency that never aborts on a failed item
/// - **Presets**: default deadlines per backend kind
///
/// # Example: Table query with a deadline
///
/// ```rust,no_run
/// use resilience::{presets, with_timeout};
///
/// #[tokio::main]
/// async fn main() {
///     let config = presets::table_api_config();
///
///     let rows = with_timeout(config.duration, async {
///         // Your table query
///         Vec::<String>::new()
///     })
///     .await;
/// }
/// ```
///
/// # Example: Enriching a page of items
///
/// ```rust,no_run
/// use resilience::gather_bounded;
///
/// #[tokio::main]
/// async fn main() {
///     let ids = vec!["a", "b", "c"];
///     let lookups: Vec<Result<usize, String>> =
///         gather_bounded(ids, 8, |id| async move { Ok(id.len()) }).await;
/// }
/// ```

pub mod fanout;
pub mod presets;
pub mod timeout;

pub use fanout::gather_bounded;
pub use presets::{object_storage_config, table_api_config};
pub use timeout::{with_deadline, with_timeout, TimeoutConfig, TimeoutError};
