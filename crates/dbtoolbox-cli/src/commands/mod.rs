//! CLI command implementations for dbtoolbox.

pub mod check;
pub mod serve;
