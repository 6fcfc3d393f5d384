//! Request, artifact and error types

pub mod error;
pub mod types;
