//! CLI command implementations

pub mod costs;
pub mod suggestions;
pub mod tools;
