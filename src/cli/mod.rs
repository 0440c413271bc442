//! CLI command handlers

pub mod commands;

pub use commands::{fill, inspect, load_data, TemplateInspection};
