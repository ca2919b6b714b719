//! Command handlers
//!
//! `workflow` needs the `browser` feature and `probe` the `http` feature;
//! `validate` is always available.

#[cfg(feature = "http")]
pub mod probe;
pub mod validate;
#[cfg(feature = "browser")]
pub mod workflow;

#[cfg(feature = "http")]
pub use probe::execute_probe;
pub use validate::{execute_validate, load_client, summarize, ValidateSummary};
#[cfg(feature = "browser")]
pub use workflow::{execute_check_parts, execute_find, execute_parts, execute_upload};
