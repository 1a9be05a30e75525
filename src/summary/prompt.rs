//! Prompt sent with each file.

/// Build the summarization prompt for one file's content.
#[must_use]
pub fn summary_prompt(content: &str) -> String {
    format!(
        "File:\n```\n{content}\n```\nTask: Create a summary of this file, what it does and how \
         it contributes to the overall project.\n"
    )
}
