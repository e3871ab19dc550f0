//! Types shared between the stagepipe library and its consumers.

pub mod constants;
pub mod errors;

pub use errors::{StageError, StageResult};
