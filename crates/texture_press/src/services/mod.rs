//! Compression pipeline

pub mod command_builder;
pub mod compression;
pub mod housekeeping;
pub mod image_validator;
pub mod invoker;
pub mod output_resolver;
