use thiserror::Error;

/// Errors returned while registering tasks into a [`Taskflow`](crate::Taskflow)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistrationError {
    #[error("task name cannot be empty")]
    EmptyTaskName,

    #[error("{0} task was already registered")]
    DuplicateTask(String),

    #[error("invalid dependency {dependency} for task {task}")]
    UnknownDependency { task: String, dependency: String },

    #[error("invalid parameter {parameter} for task {task}")]
    UnknownParameter { task: String, parameter: String },

    #[error("parameter name cannot be empty")]
    EmptyParamName,

    #[error("{0} parameter was already registered")]
    DuplicateParam(String),

    #[error("{0} task is not registered")]
    UnknownTask(String),
}

/// Errors produced when setting or reading a parameter value.
///
/// `NotSet` is the sentinel for an absent value and is never produced by a
/// conversion, so callers can tell "absent" from "invalid" apart.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParamError {
    #[error("parameter is not set")]
    NotSet,

    #[error("invalid value {value:?}: {reason}")]
    Malformed { value: String, reason: String },

    #[error("parameter {0} is not available to this task")]
    NotVisible(String),
}

impl ParamError {
    pub fn malformed(value: impl Into<String>, reason: impl ToString) -> Self {
        Self::Malformed {
            value: value.into(),
            reason: reason.to_string(),
        }
    }
}

/// Errors that end a flow invocation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FlowError {
    #[error("unknown argument: {0}")]
    UnknownArgument(String),

    #[error("invalid value for flag {flag}: {source}")]
    InvalidValue { flag: String, source: ParamError },

    #[error("flag {0} needs a value")]
    MissingValue(String),

    #[error("no task provided")]
    NoTask,

    #[error("task failed: {0}")]
    TaskFailed(String),

    #[error("run cancelled")]
    Cancelled,
}

impl FlowError {
    /// Invalid invocations are reported before any task runs.
    pub fn is_invalid_invocation(&self) -> bool {
        matches!(
            self,
            Self::UnknownArgument(_) | Self::InvalidValue { .. } | Self::MissingValue(_) | Self::NoTask
        )
    }
}

/// Errors raised while loading a task file
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid {kind} value for parameter {name}: {source}")]
    Default {
        name: String,
        kind: String,
        source: ParamError,
    },

    #[error("task '{task}' depends on '{dependency}' which was not found")]
    UnknownDependency { task: String, dependency: String },

    #[error("Circular dependency detected: {0}")]
    Cycle(String),

    #[error("default task '{0}' was not found")]
    UnknownDefault(String),

    #[error("task '{0}' sets both command and script")]
    CommandAndScript(String),

    #[error("task '{0}' has an empty command")]
    EmptyCommand(String),

    #[error(transparent)]
    Registration(#[from] RegistrationError),
}
