//! Summarization collaborators.
//!
//! The pipeline only sees the [`Summarizer`] trait; [`OpenAiSummarizer`] is
//! the live adapter. Cost estimation is informational and never gates work.

mod artifact;
mod client;
mod cost;
mod openai;
mod prompt;

pub use artifact::{
    artifact_path, is_artifact, remove_artifact, render_artifact, write_artifact, ARTIFACT_SUFFIX,
};
pub use client::{Summarizer, SummaryFuture};
pub use cost::{CostEstimator, ModelPrice, PricingTable};
pub use openai::{OpenAiConfig, OpenAiSummarizer, API_BASE_ENV, API_KEY_ENV, DEFAULT_API_BASE};
pub use prompt::summary_prompt;
