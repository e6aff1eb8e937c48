//! Flow runner
//!
//! Coordinates one invocation: parses the arguments, then walks the
//! dependency graph depth-first, running each task body at most once.

use std::collections::{HashMap, HashSet};
use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::execution::args::{parse_args, ParamValues};
use crate::execution::usage::write_usage;
use crate::output::BufferedOutput;
use crate::params::Param;
use crate::runner::Runner;
use crate::taskflow::{Task, Taskflow};
use crate::types::FlowError;
use crate::value::{BoolValue, Value};

/// Runs one invocation of a [`Taskflow`].
pub struct FlowRunner<'f> {
    flow: &'f Taskflow,
    values: ParamValues,
}

impl<'f> FlowRunner<'f> {
    pub fn new(flow: &'f Taskflow) -> Self {
        Self {
            flow,
            values: ParamValues::new(flow.param_map()),
        }
    }

    /// Every error is reported with one line on the message stream before
    /// it is returned.
    pub fn run<S: AsRef<str>>(
        mut self,
        cancellation: &CancellationToken,
        args: &[S],
    ) -> Result<(), FlowError> {
        let output = self.flow.output();
        let tasks = self.flow.task_map();
        let invocation = match parse_args(args, |arg| tasks.contains_key(arg), &mut self.values) {
            Ok(invocation) => invocation,
            Err(err) => {
                output.write_message(format_args!("{err}"));
                return Err(err);
            }
        };

        if invocation.usage_requested {
            write_usage(self.flow, &output.message);
            return Ok(());
        }

        let mut requested = invocation.tasks;
        if requested.is_empty() {
            if let Some(task) = self.flow.default_task() {
                requested.push(task.name().to_string());
            }
        }
        if requested.is_empty() {
            let err = FlowError::NoTask;
            output.write_message(format_args!("{err}"));
            write_usage(self.flow, &output.message);
            return Err(err);
        }

        self.run_tasks(cancellation, &requested)
    }

    fn run_tasks(&self, cancellation: &CancellationToken, requested: &[String]) -> Result<(), FlowError> {
        let output = self.flow.output();
        let started = Instant::now();
        let mut executed = HashSet::new();

        for name in requested {
            if let Err(err) = self.visit(cancellation, name, &mut executed) {
                warn!(task = %name, error = %err, "run stopped");
                output.write_message(format_args!(
                    "{err}\t{:.3}s",
                    started.elapsed().as_secs_f64()
                ));
                return Err(err);
            }
        }

        output.write_message(format_args!("ok\t{:.3}s", started.elapsed().as_secs_f64()));
        Ok(())
    }

    /// Run `name` after its dependencies, skipping anything already run.
    fn visit(
        &self,
        cancellation: &CancellationToken,
        name: &str,
        executed: &mut HashSet<String>,
    ) -> Result<(), FlowError> {
        if executed.contains(name) {
            return Ok(());
        }
        let Some(task) = self.flow.task(name) else {
            return Err(FlowError::UnknownArgument(name.to_string()));
        };

        for dependency in task.dependencies() {
            self.visit(cancellation, dependency.name(), executed)?;
        }

        if cancellation.is_cancelled() {
            return Err(FlowError::Cancelled);
        }
        let passed = self.run_task(cancellation, task);
        if cancellation.is_cancelled() {
            return Err(FlowError::Cancelled);
        }
        if !passed {
            return Err(FlowError::TaskFailed(name.to_string()));
        }

        executed.insert(name.to_string());
        Ok(())
    }

    fn verbose(&self) -> bool {
        self.flow
            .verbose()
            .and_then(|param| self.values.get(param.name()))
            .and_then(|value| value.downcast_ref::<BoolValue>())
            .map_or(true, |value| value.0)
    }

    /// Run a single task body. Returns whether it passed.
    fn run_task(&self, cancellation: &CancellationToken, task: &Task) -> bool {
        let Some(command) = &task.command else {
            return true;
        };
        debug!(task = %task.name, "running task");

        let mut visible: HashMap<&str, &dyn Value> = HashMap::new();
        let verbose = self.flow.verbose().map(|param| param.name());
        for name in task.params.iter().map(String::as_str).chain(verbose) {
            if let Some(value) = self.values.get(name) {
                visible.insert(name, value);
            }
        }

        let destination = self.flow.output().clone();
        let buffer = (!self.verbose()).then(BufferedOutput::new);
        let output = match &buffer {
            Some(buffer) => buffer.output(),
            None => destination.clone(),
        };

        output.write_message(format_args!("===== TASK  {}", task.name));
        let result = Runner {
            task_name: &task.name,
            cancellation,
            values: visible,
            output: output.clone(),
        }
        .run(&**command);
        output.write_message(format_args!(
            "----- {}: {} ({:.2}s)",
            result.status(),
            task.name,
            result.duration().as_secs_f64()
        ));

        if result.failed() {
            warn!(task = %task.name, "task failed");
            if let Some(buffer) = &buffer {
                if let Err(err) = buffer.write_to(&destination) {
                    warn!(task = %task.name, error = %err, "could not replay task output");
                }
            }
        }
        !result.failed()
    }
}
