#![forbid(unsafe_code)]

mod error;

pub use error::*;

pub const DEFAULT_PROMPT: &str = "lapse> ";
pub const DEFAULT_LOG_FILTER: &str = "lapse_cli=info,lapse_storage=info";
