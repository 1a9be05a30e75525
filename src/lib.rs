//! codebrief: incremental natural-language summaries of a source tree.
//!
//! A full pass reconciles every candidate file against the record store and
//! summarizes only new or changed content. The watch loop then keeps the
//! store current as files change.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod logging;
pub mod storage;
pub mod summary;
pub mod watcher;

pub use config::Config;
pub use error::{Error, Result};
