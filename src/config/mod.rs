//! Configuration management for codebrief.
//!
//! Supports configuration from:
//! - Command-line arguments (highest priority)
//! - Environment variables, including a `.env` file in the working directory
//! - Built-in defaults (lowest priority)

mod settings;

pub use settings::{Config, DATABASE_FILE_NAME, DEFAULT_TOKEN_CEILING, METADATA_DIR_NAME};
