//! Progress reporting trait for pipeline feedback.
//!
//! The [`ProgressCallback`] trait lets callers receive progress updates from any
//! stage without coupling the library to a specific progress bar implementation.
//! The CLI crate provides an `indicatif`-based implementation.

/// Trait for receiving progress updates while a stage runs.
///
/// # Example
///
/// ```
/// use firmpanel::ProgressCallback;
///
/// struct LogProgress;
///
/// impl ProgressCallback for LogProgress {
///     fn inc(&self, n: u64) {
///         println!("Processed {n} more rows");
///     }
///     fn stage_started(&self, msg: &str) {
///         println!("{msg}");
///     }
/// }
/// ```
pub trait ProgressCallback: Send + Sync {
    /// Called to report that `n` additional rows have been processed.
    fn inc(&self, n: u64);

    /// Called when a unit of work (a query window, a file, a partition) begins.
    fn stage_started(&self, msg: &str);
}
