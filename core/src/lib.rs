//! Orchestration-bus core: command-card execution, task/approval/lock
//! coordination, agent monitoring, topology approvals, and the tool
//! registry the dashboard server and Telegram bridge both call into.
//!
//! Every fallible entry point returns [`error::BusResult`]; tool-facing
//! entry points (under [`tools`]) instead return a `{ok, ...}` JSON
//! envelope, per spec §7.

pub mod agent_status;
pub mod audit;
pub mod common;
pub mod error;
pub mod executor;
pub mod monitor;
pub mod ops_store;
pub mod roster;
pub mod shared_file;
pub mod sql_gate;
pub mod state_files;
pub mod system_log;
pub mod task_extras;
pub mod terminal_bridge;
pub mod tools;
pub mod topology;

pub use error::{BusError, BusResult};
pub use terminal_bridge::{NullBridge, OutputRow, SessionInfo, TerminalBridge};
pub use tools::Tool;
