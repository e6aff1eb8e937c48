//! Taskflow Core Library
//!
//! A programmatic task runner. Calling code declares named tasks with
//! dependencies and typed parameters, then runs a requested subset. Each
//! task runs at most once per invocation, after its dependencies, and its
//! pass/fail/skip status and elapsed time are reported.
//!
//! ## Architecture
//!
//! The core library is organized into several modules:
//!
//! - [`taskflow`] - Task and parameter registry, and the entry point for runs
//! - [`execution`] - Argument parsing, usage text and dependency-ordered execution
//! - [`runner`] - Running a single task body and the [`Tf`] context it receives
//! - [`params`] - Parameter descriptors, typed handles and the [`Params`] view
//! - [`value`] - Typed parameter values settable from text
//! - [`output`] - Output streams and the buffer that holds back quiet task output
//! - [`configs`] - YAML task file format
//! - [`taskfile`] - Building a [`Taskflow`] from a task file
//! - [`duration`] / [`literals`] - Parsers for command-line literals
//! - [`types`] - Error types
//!
//! ## Usage
//!
//! ```rust
//! use taskflow_core::{ParameterInfo, Status, Task, Taskflow};
//! use tokio_util::sync::CancellationToken;
//!
//! let mut flow = Taskflow::new().with_output(std::io::sink());
//! let retries = flow.register_int_param(3, ParameterInfo::new("retries", "How often to retry"));
//!
//! let fetch = flow.must_register(
//!     Task::new("fetch")
//!         .description("Download sources")
//!         .param(&retries)
//!         .command(move |tf| {
//!             tf.log(format!("fetching with {} retries", retries.get(tf)));
//!             Ok(())
//!         }),
//! );
//! flow.must_register(Task::new("build").depends_on(&fetch).command(|tf| {
//!     Err(tf.fatal("compiler not found"))
//! }));
//!
//! let token = CancellationToken::new();
//! assert_eq!(flow.run(&token, ["fetch", "--retries=5"]), Status::Pass);
//! assert_eq!(flow.run(&token, ["build"]), Status::Failure);
//! assert_eq!(flow.run(&token, ["--bogus"]).code(), 2);
//! ```

pub mod configs;
pub mod duration;
pub mod execution;
pub mod literals;
pub mod output;
pub mod params;
pub mod runner;
pub mod taskfile;
pub mod taskflow;
pub mod types;
pub mod value;

// Re-export the main types for easier usage
pub use output::{BufferedOutput, Output, SharedWriter};
pub use params::{
    BoolParam, DurationParam, FloatParam, IntParam, Param, ParameterDefinition, ParameterInfo,
    Params, StringParam, ValueParam,
};
pub use runner::{Command, RunResult, Runner, Stop, TaskStatus, Tf};
pub use taskfile::{build_taskflow, load_taskfile};
pub use taskflow::{RegisteredTask, Status, Task, Taskflow};
pub use types::{ConfigError, FlowError, ParamError, RegistrationError};
pub use value::{BoolValue, DurationValue, FloatValue, IntValue, StringValue, Value};
