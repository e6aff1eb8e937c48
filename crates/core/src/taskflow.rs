//! Task and parameter registry.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::io::Write;
use std::sync::Arc;

use chrono::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::execution::runner::FlowRunner;
use crate::output::{Output, SharedWriter};
use crate::params::{
    BoolParam, DurationParam, FloatParam, IntParam, Param, ParameterDefinition, ParameterInfo,
    StringParam, ValueFactory, ValueParam,
};
use crate::runner::{Command, Stop, Tf};
use crate::types::{FlowError, RegistrationError};
use crate::value::{BoolValue, DurationValue, FloatValue, IntValue, StringValue, Value};

const VERBOSE_NAME: &str = "v";
const VERBOSE_USAGE: &str = "Verbose output: log all tasks as they are run. Also print all text from log calls even if the task succeeds.";

fn factory<V: Value + Clone + 'static>(default: V) -> ValueFactory {
    Arc::new(move || Box::new(default.clone()) as Box<dyn Value>)
}

/// Outcome of a flow invocation, mapped to a process exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Pass,
    Failure,
    InvalidArgs,
}

impl Status {
    pub fn code(self) -> i32 {
        match self {
            Status::Pass => 0,
            Status::Failure => 1,
            Status::InvalidArgs => 2,
        }
    }
}

impl From<&Result<(), FlowError>> for Status {
    fn from(result: &Result<(), FlowError>) -> Self {
        match result {
            Ok(()) => Status::Pass,
            Err(err) if err.is_invalid_invocation() => Status::InvalidArgs,
            Err(_) => Status::Failure,
        }
    }
}

/// A task definition, built up before registration.
///
/// ```
/// use taskflow_core::{Task, Taskflow};
///
/// let mut flow = Taskflow::new();
/// let fmt = flow.must_register(Task::new("fmt").command(|tf| {
///     tf.log("formatting");
///     Ok(())
/// }));
/// flow.must_register(
///     Task::new("build")
///         .description("Build everything")
///         .depends_on(&fmt),
/// );
/// ```
#[derive(Clone, Default)]
pub struct Task {
    pub(crate) name: String,
    pub(crate) description: String,
    pub(crate) command: Option<Command>,
    pub(crate) dependencies: Vec<RegisteredTask>,
    pub(crate) params: BTreeSet<String>,
}

impl Task {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Tasks without a description are left out of the usage text.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn command<F>(mut self, command: F) -> Self
    where
        F: Fn(&mut Tf<'_>) -> Result<(), Stop> + Send + Sync + 'static,
    {
        self.command = Some(Arc::new(command));
        self
    }

    pub fn depends_on(mut self, dependency: &RegisteredTask) -> Self {
        self.dependencies.push(dependency.clone());
        self
    }

    /// Make a parameter visible to the task body.
    pub fn param(mut self, param: &(impl Param + ?Sized)) -> Self {
        self.params.insert(param.name().to_string());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dependencies(&self) -> &[RegisteredTask] {
        &self.dependencies
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("has_command", &self.command.is_some())
            .field("dependencies", &self.dependencies)
            .field("params", &self.params)
            .finish()
    }
}

/// Handle to a registered task, used to declare dependencies.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RegisteredTask {
    name: String,
}

impl RegisteredTask {
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Registry of tasks and parameters, and the entry point for running them.
///
/// ```
/// use taskflow_core::{ParameterInfo, Task, Taskflow};
/// use tokio_util::sync::CancellationToken;
///
/// let mut flow = Taskflow::new();
/// let name = flow.register_string_param("world", ParameterInfo::new("name", "Who to greet"));
/// flow.must_register(
///     Task::new("greet")
///         .param(&name)
///         .command(move |tf| {
///             tf.log(format!("hello {}", name.get(tf)));
///             Ok(())
///         }),
/// );
///
/// let status = flow.run(&CancellationToken::new(), ["greet", "--name=you"]);
/// assert_eq!(status.code(), 0);
/// ```
#[derive(Debug, Default)]
pub struct Taskflow {
    output: Output,
    default_task: Option<RegisteredTask>,
    verbose: Option<BoolParam>,
    params: BTreeMap<String, ParameterDefinition>,
    tasks: BTreeMap<String, Task>,
}

impl Taskflow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Route both output streams to `writer`.
    pub fn with_output<W: Write + Send + 'static>(mut self, writer: W) -> Self {
        self.output = Output::single(SharedWriter::new(writer));
        self
    }

    pub fn set_output(&mut self, output: Output) {
        self.output = output;
    }

    pub fn output(&self) -> &Output {
        &self.output
    }

    /// Task run when the arguments name none.
    pub fn set_default_task(&mut self, task: &RegisteredTask) -> Result<(), RegistrationError> {
        if !self.tasks.contains_key(task.name()) {
            return Err(RegistrationError::UnknownTask(task.name.clone()));
        }
        self.default_task = Some(task.clone());
        Ok(())
    }

    pub fn default_task(&self) -> Option<&RegisteredTask> {
        self.default_task.as_ref()
    }

    /// The boolean `v` parameter. When it is false, the output of a task is
    /// only shown if the task fails.
    ///
    /// Registered on first use. Running a flow registers it too, so the name
    /// `v` cannot be used for another parameter.
    pub fn verbose_param(&mut self) -> BoolParam {
        if let Some(param) = &self.verbose {
            return param.clone();
        }
        let param = self.register_bool_param(false, ParameterInfo::new(VERBOSE_NAME, VERBOSE_USAGE));
        self.verbose = Some(param.clone());
        param
    }

    /// Register a parameter with a caller-defined value type. `new_value` is
    /// called once per run to produce the default value.
    ///
    /// # Panics
    ///
    /// Panics if the name is empty or already registered.
    pub fn register_value_param<F>(&mut self, new_value: F, info: ParameterInfo) -> ValueParam
    where
        F: Fn() -> Box<dyn Value> + Send + Sync + 'static,
    {
        let name = info.name.clone();
        self.register_param(Arc::new(new_value), info);
        ValueParam::new(name)
    }

    /// # Panics
    ///
    /// Panics if the name is empty or already registered.
    pub fn register_bool_param(&mut self, default: bool, info: ParameterInfo) -> BoolParam {
        let name = info.name.clone();
        self.register_param(factory(BoolValue(default)), info);
        BoolParam::new(name)
    }

    /// # Panics
    ///
    /// Panics if the name is empty or already registered.
    pub fn register_int_param(&mut self, default: i64, info: ParameterInfo) -> IntParam {
        let name = info.name.clone();
        self.register_param(factory(IntValue(default)), info);
        IntParam::new(name)
    }

    /// # Panics
    ///
    /// Panics if the name is empty or already registered.
    pub fn register_float_param(&mut self, default: f64, info: ParameterInfo) -> FloatParam {
        let name = info.name.clone();
        self.register_param(factory(FloatValue(default)), info);
        FloatParam::new(name)
    }

    /// # Panics
    ///
    /// Panics if the name is empty or already registered.
    pub fn register_string_param(
        &mut self,
        default: impl Into<String>,
        info: ParameterInfo,
    ) -> StringParam {
        let name = info.name.clone();
        self.register_param(factory(StringValue(default.into())), info);
        StringParam::new(name)
    }

    /// # Panics
    ///
    /// Panics if the name is empty or already registered.
    pub fn register_duration_param(&mut self, default: Duration, info: ParameterInfo) -> DurationParam {
        let name = info.name.clone();
        self.register_param(factory(DurationValue(default)), info);
        DurationParam::new(name)
    }

    #[allow(clippy::panic)]
    fn register_param(&mut self, factory: ValueFactory, info: ParameterInfo) {
        if info.name.is_empty() {
            panic!("{}", RegistrationError::EmptyParamName);
        }
        if self.params.contains_key(&info.name) {
            panic!("{}", RegistrationError::DuplicateParam(info.name));
        }
        debug!(param = %info.name, "registered parameter");
        self.params
            .insert(info.name.clone(), ParameterDefinition { info, factory });
    }

    /// Register a task. Its dependencies and parameters must be registered
    /// already. On error the registry is left unchanged.
    pub fn register(&mut self, task: Task) -> Result<RegisteredTask, RegistrationError> {
        if task.name.is_empty() {
            return Err(RegistrationError::EmptyTaskName);
        }
        if self.tasks.contains_key(&task.name) {
            return Err(RegistrationError::DuplicateTask(task.name));
        }
        if let Some(dependency) = task
            .dependencies
            .iter()
            .find(|dependency| !self.tasks.contains_key(dependency.name()))
        {
            return Err(RegistrationError::UnknownDependency {
                task: task.name.clone(),
                dependency: dependency.name.clone(),
            });
        }
        if let Some(parameter) = task
            .params
            .iter()
            .find(|param| !self.params.contains_key(*param))
        {
            return Err(RegistrationError::UnknownParameter {
                task: task.name.clone(),
                parameter: parameter.clone(),
            });
        }

        debug!(
            task = %task.name,
            dependencies = task.dependencies.len(),
            "registered task"
        );
        let handle = RegisteredTask {
            name: task.name.clone(),
        };
        self.tasks.insert(task.name.clone(), task);
        Ok(handle)
    }

    /// # Panics
    ///
    /// Panics if the task cannot be registered.
    #[allow(clippy::panic)]
    pub fn must_register(&mut self, task: Task) -> RegisteredTask {
        match self.register(task) {
            Ok(handle) => handle,
            Err(err) => panic!("{err}"),
        }
    }

    pub fn task(&self, name: &str) -> Option<&Task> {
        self.tasks.get(name)
    }

    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.tasks.values()
    }

    pub fn params(&self) -> impl Iterator<Item = &ParameterDefinition> {
        self.params.values()
    }

    pub(crate) fn param_map(&self) -> &BTreeMap<String, ParameterDefinition> {
        &self.params
    }

    pub(crate) fn task_map(&self) -> &BTreeMap<String, Task> {
        &self.tasks
    }

    pub(crate) fn verbose(&self) -> Option<&BoolParam> {
        self.verbose.as_ref()
    }

    /// Run the tasks named in `args` along with their dependencies, and
    /// return the status. See [`Taskflow::execute`].
    pub fn run<I, S>(&mut self, cancellation: &CancellationToken, args: I) -> Status
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Status::from(&self.execute(cancellation, args))
    }

    /// Parse `args` into parameter values and task names, then run each
    /// named task after its dependencies. Every task runs at most once and
    /// the run stops at the first failure.
    pub fn execute<I, S>(&mut self, cancellation: &CancellationToken, args: I) -> Result<(), FlowError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.verbose_param();
        let args: Vec<String> = args.into_iter().map(|a| a.as_ref().to_string()).collect();
        FlowRunner::new(self).run(cancellation, &args)
    }
}
