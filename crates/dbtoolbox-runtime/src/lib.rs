//! # dbtoolbox-runtime
//!
//! Tool kinds and the [`Toolbox`] that owns every configured resource.
//!
//! A request flows through the toolbox as:
//!
//! 1. look up the tool by name
//! 2. check the tool's `authRequired` against the verified auth services
//! 3. [`Tool::parse_params`]: type checks, defaults, claim-sourced values
//! 4. [`Tool::invoke`]: template resolution, positional binding, execution

pub mod error;
pub mod execute_sql;
pub mod sql;
pub mod tool;
pub mod toolbox;

pub use error::{ToolError, ToolboxError};
pub use execute_sql::ExecuteSqlTool;
pub use sql::SqlTool;
pub use tool::{Tool, is_authorized, rows_to_result};
pub use toolbox::{Toolbox, Toolset};
