//! CLI command implementations.
//!
//! Each submodule owns one or more related `Commands` variants:
//!
//! | Module      | Commands handled                                  |
//! |-------------|---------------------------------------------------|
//! | `hooks`     | `Guard`, `Orchestrate`, `AutoCompile`, `Cleanup`  |
//! | `workflow`  | `Activate`, `Confirm`, `Status`                   |
//! | `supervise` | `Supervise`                                       |

pub mod hooks;
pub mod supervise;
pub mod workflow;

pub use hooks::{cmd_auto_compile, cmd_cleanup, cmd_guard, cmd_orchestrate};
pub use supervise::cmd_supervise;
pub use workflow::{ConfirmTarget, cmd_activate, cmd_confirm, cmd_status};
