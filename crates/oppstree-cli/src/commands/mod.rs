//! CLI command implementations for `ost`.
//!
//! - [`run`]: load sources, synthesize, write the session file.
//! - [`categories`]: list configured source categories.
//! - [`config_cmd`]: show resolved configuration and providers.

pub mod categories;
pub mod config_cmd;
pub mod run;
