//! Flow execution module
//!
//! This module turns raw arguments into a run: argument parsing, usage
//! rendering, dependency-ordered task execution and child process plumbing.

pub mod args;
pub mod command;
pub mod runner;
pub mod usage;

pub use args::{parse_args, Invocation, ParamValues};
pub use command::run_process;
pub use runner::FlowRunner;
pub use usage::write_usage;
