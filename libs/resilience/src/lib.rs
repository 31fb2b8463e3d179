/// Resilience patterns for client-side backend calls
///
/// This library provides the retry policy used when talking to backend
/// services whose failures are transient by nature (e.g. a credential
/// endpoint that returns "not found" while user provisioning propagates):
/// - **Retry**: bounded, fixed-delay retry gated by an error-class predicate
///
/// # Example: retry a provisioning-sensitive call
///
/// ```rust,no_run
/// use resilience::{retry_fixed, RetryConfig};
/// use std::time::Duration;
///
/// #[tokio::main]
/// async fn main() {
///     let config = RetryConfig {
///         max_retries: 3,
///         delay: Duration::from_secs(2),
///     };
///
///     let result = retry_fixed(config, |e: &String| e == "not ready", || async {
///         // Your backend call here
///         Ok::<_, String>(())
///     })
///     .await;
/// }
/// ```
pub mod retry;

// Re-export main types for convenience
pub use retry::{retry_fixed, RetryConfig};
