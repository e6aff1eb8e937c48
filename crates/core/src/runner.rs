//! Running a single task body.
//!
//! The [`Runner`] turns a task body into a [`RunResult`]: pass, fail or
//! skip, plus the time it took. The body talks to the runner through
//! [`Tf`], which carries the task's name, cancellation token, visible
//! parameter values and output.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::process::{Command as ProcessCommand, ExitStatus};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use crate::execution::command::run_process;
use crate::output::Output;
use crate::params::Params;
use crate::value::Value;

/// A task body.
pub type Command = Arc<dyn Fn(&mut Tf<'_>) -> Result<(), Stop> + Send + Sync>;

/// Early exit from a task body.
///
/// Returned by [`Tf::fail_now`], [`Tf::fatal`], [`Tf::skip_now`] and
/// [`Tf::skip`]. Any [`std::error::Error`] converts into `Stop`, so `?` can
/// be used inside a body; the error is logged and the task fails.
#[derive(Debug)]
pub enum Stop {
    Failed,
    Skipped,
    Error(String),
}

impl<E: std::error::Error> From<E> for Stop {
    fn from(err: E) -> Self {
        Stop::Error(err.to_string())
    }
}

/// Context passed to a running task body.
pub struct Tf<'a> {
    name: &'a str,
    cancellation: &'a CancellationToken,
    values: HashMap<&'a str, &'a dyn Value>,
    output: Output,
    failed: bool,
    skipped: bool,
}

impl<'a> Tf<'a> {
    pub fn name(&self) -> &str {
        self.name
    }

    /// Long-running bodies should watch this token; the flow only checks it
    /// between tasks.
    pub fn cancellation(&self) -> &CancellationToken {
        self.cancellation
    }

    pub fn output(&self) -> Output {
        self.output.clone()
    }

    /// Value of a parameter declared by the task.
    pub fn value(&self, name: &str) -> Option<&'a dyn Value> {
        self.values.get(name).copied()
    }

    /// Textual view of the parameters visible to the task.
    pub fn params(&self) -> Params {
        self.values
            .iter()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect()
    }

    /// Write a line to the message stream.
    pub fn log(&self, message: impl fmt::Display) {
        self.output.write_message(format_args!("{message}"));
    }

    /// Log and mark the task failed, continuing execution.
    pub fn error(&mut self, message: impl fmt::Display) {
        self.log(message);
        self.fail();
    }

    /// Mark the task failed, continuing execution.
    pub fn fail(&mut self) {
        self.failed = true;
    }

    pub fn failed(&self) -> bool {
        self.failed
    }

    pub fn skipped(&self) -> bool {
        self.skipped
    }

    /// Mark the task failed; return the result to stop the body.
    pub fn fail_now(&mut self) -> Stop {
        self.fail();
        Stop::Failed
    }

    /// Log, mark the task failed, and stop.
    pub fn fatal(&mut self, message: impl fmt::Display) -> Stop {
        self.log(message);
        self.fail_now()
    }

    /// Mark the task skipped; return the result to stop the body.
    pub fn skip_now(&mut self) -> Stop {
        self.skipped = true;
        Stop::Skipped
    }

    /// Log, mark the task skipped, and stop.
    pub fn skip(&mut self, message: impl fmt::Display) -> Stop {
        self.log(message);
        self.skip_now()
    }

    /// Run a child process with its stdout on the primary stream and its
    /// stderr on the message stream. The child is killed if the run is
    /// cancelled.
    pub fn exec(&self, command: &mut ProcessCommand) -> io::Result<ExitStatus> {
        run_process(command, &self.output, self.cancellation)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Pass,
    Fail,
    Skip,
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TaskStatus::Pass => "PASS",
            TaskStatus::Fail => "FAIL",
            TaskStatus::Skip => "SKIP",
        })
    }
}

/// Outcome of one task body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunResult {
    failed: bool,
    skipped: bool,
    duration: Duration,
}

impl RunResult {
    pub fn failed(&self) -> bool {
        self.failed
    }

    pub fn skipped(&self) -> bool {
        self.skipped
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn status(&self) -> TaskStatus {
        if self.failed {
            TaskStatus::Fail
        } else if self.skipped {
            TaskStatus::Skip
        } else {
            TaskStatus::Pass
        }
    }
}

/// Runs one task body.
pub struct Runner<'a> {
    pub task_name: &'a str,
    pub cancellation: &'a CancellationToken,
    pub values: HashMap<&'a str, &'a dyn Value>,
    pub output: Output,
}

impl<'a> Runner<'a> {
    pub fn run(self, command: &(dyn Fn(&mut Tf<'_>) -> Result<(), Stop> + Send + Sync)) -> RunResult {
        let mut tf = Tf {
            name: self.task_name,
            cancellation: self.cancellation,
            values: self.values,
            output: self.output,
            failed: false,
            skipped: false,
        };

        let started = Instant::now();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| command(&mut tf)));
        let duration = started.elapsed();

        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(Stop::Failed)) => tf.fail(),
            Ok(Err(Stop::Skipped)) => tf.skipped = true,
            Ok(Err(Stop::Error(message))) => tf.error(message),
            Err(payload) => tf.error(format_args!("panic: {}", panic_message(payload.as_ref()))),
        }

        RunResult {
            failed: tf.failed,
            skipped: tf.skipped,
            duration,
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "unknown panic payload"
    }
}
