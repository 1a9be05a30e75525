//! Summarizer port.

use futures::future::BoxFuture;

use crate::Result;

/// Boxed future returned by [`Summarizer::summarize`], keeping the trait
/// object-safe.
pub type SummaryFuture<'a> = BoxFuture<'a, Result<String>>;

/// Produces a natural-language summary of one file.
///
/// The returned text is trusted verbatim. Implementations must not retry on
/// their own; retry policy belongs to the pipeline.
pub trait Summarizer: Send + Sync {
    /// Summarize `content` with `model`.
    ///
    /// # Errors
    ///
    /// Returns an error if the service call fails or answers with something
    /// that is not a summary.
    fn summarize<'a>(&'a self, content: &'a str, model: &'a str) -> SummaryFuture<'a>;
}
