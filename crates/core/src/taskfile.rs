//! Building a [`Taskflow`] from a YAML task file.
//!
//! Tasks may appear in any order in the file. The loader builds the
//! dependency graph, rejects unknown dependencies and cycles, then registers
//! tasks dependencies-first.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command as ProcessCommand;

use petgraph::algo::kosaraju_scc;
use petgraph::prelude::*;
use petgraph::visit::DfsPostOrder;
use tracing::{debug, info};

use crate::configs::tasks::{parse_tasks_config, Command, ParamConfig, ParamKind, TaskConfig, TasksFileConfig};
use crate::params::{Param, ParameterInfo};
use crate::runner::{Stop, Tf};
use crate::taskflow::{RegisteredTask, Task, Taskflow};
use crate::types::{ConfigError, RegistrationError};
use crate::value::{BoolValue, DurationValue, IntValue, StringValue, Value};

/// Read and load the task file at `path`. Commands run in the file's
/// directory.
pub fn load_taskfile(path: &Path) -> Result<Taskflow, ConfigError> {
    let yaml = std::fs::read_to_string(path)?;
    let config = parse_tasks_config(&yaml)?;
    let dir = path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    info!(path = %path.display(), tasks = config.tasks.len(), "loaded task file");
    build_taskflow(&config, dir)
}

/// Register the parameters and tasks of `config` into a new [`Taskflow`].
pub fn build_taskflow(config: &TasksFileConfig, dir: &Path) -> Result<Taskflow, ConfigError> {
    let mut flow = Taskflow::new();
    flow.verbose_param();

    let mut params: HashMap<String, Box<dyn Param>> = HashMap::new();
    for param in &config.params {
        if param.name.is_empty() {
            return Err(RegistrationError::EmptyParamName.into());
        }
        if flow.params().any(|p| p.info().name == param.name) {
            return Err(RegistrationError::DuplicateParam(param.name.clone()).into());
        }
        let handle = register_param(&mut flow, param)?;
        params.insert(param.name.clone(), handle);
    }

    let mut handles: HashMap<&str, RegisteredTask> = HashMap::new();
    for config in dependency_order(&config.tasks)? {
        let mut task = Task::new(&config.name);
        if let Some(description) = &config.description {
            task = task.description(description);
        }
        for dependency in config.dependencies.iter().flatten() {
            if let Some(handle) = handles.get(dependency.as_str()) {
                task = task.depends_on(handle);
            }
        }
        for name in config.params.iter().flatten() {
            let Some(param) = params.get(name) else {
                return Err(RegistrationError::UnknownParameter {
                    task: config.name.clone(),
                    parameter: name.clone(),
                }
                .into());
            };
            task = task.param(param.as_ref());
        }
        if let Some(action) = Action::from_config(config, dir)? {
            task = task.command(move |tf| action.run(tf));
        }

        let handle = flow.register(task)?;
        handles.insert(config.name.as_str(), handle);
    }

    if let Some(default) = &config.default {
        let handle = handles
            .get(default.as_str())
            .ok_or_else(|| ConfigError::UnknownDefault(default.clone()))?;
        flow.set_default_task(handle)?;
    }
    Ok(flow)
}

fn default_value<V: Value + Default>(param: &ParamConfig) -> Result<V, ConfigError> {
    let mut value = V::default();
    if let Some(default) = &param.default {
        value.set(&default.to_string()).map_err(|source| ConfigError::Default {
            name: param.name.clone(),
            kind: param.kind.as_str().to_string(),
            source,
        })?;
    }
    Ok(value)
}

fn register_param(flow: &mut Taskflow, param: &ParamConfig) -> Result<Box<dyn Param>, ConfigError> {
    let info = ParameterInfo::new(&param.name, &param.usage);
    let handle: Box<dyn Param> = match param.kind {
        ParamKind::Bool => {
            let value: BoolValue = default_value(param)?;
            Box::new(flow.register_bool_param(value.0, info))
        }
        ParamKind::Int => {
            let value: IntValue = default_value(param)?;
            Box::new(flow.register_int_param(value.0, info))
        }
        ParamKind::String => {
            let value: StringValue = default_value(param)?;
            Box::new(flow.register_string_param(value.0, info))
        }
        ParamKind::Duration => {
            let value: DurationValue = default_value(param)?;
            Box::new(flow.register_duration_param(value.0, info))
        }
    };
    debug!(param = %param.name, kind = param.kind.as_str(), "registered parameter from task file");
    Ok(handle)
}

/// Order tasks so that every task comes after its dependencies.
fn dependency_order(tasks: &[TaskConfig]) -> Result<Vec<&TaskConfig>, ConfigError> {
    let mut graph = DiGraph::<&str, ()>::new();
    let mut node_indices = HashMap::new();

    for task in tasks {
        if task.name.is_empty() {
            return Err(RegistrationError::EmptyTaskName.into());
        }
        if node_indices.contains_key(task.name.as_str()) {
            return Err(RegistrationError::DuplicateTask(task.name.clone()).into());
        }
        let node_index = graph.add_node(task.name.as_str());
        node_indices.insert(task.name.as_str(), node_index);
    }

    // Edge: task -> dependency
    for task in tasks {
        let from_node = node_indices[task.name.as_str()];
        for dep in task.dependencies.iter().flatten() {
            let Some(&to_node) = node_indices.get(dep.as_str()) else {
                return Err(ConfigError::UnknownDependency {
                    task: task.name.clone(),
                    dependency: dep.clone(),
                });
            };
            graph.add_edge(from_node, to_node, ());
        }
    }

    let mut cycles: Vec<Vec<&str>> = kosaraju_scc(&graph)
        .into_iter()
        .filter(|component| {
            component.len() > 1 || graph.contains_edge(component[0], component[0])
        })
        .map(|component| {
            let mut cycle: Vec<&str> = component.iter().map(|node| graph[*node]).collect();
            cycle.sort();
            cycle
        })
        .collect();
    if !cycles.is_empty() {
        cycles.sort();
        let message = cycles
            .into_iter()
            .map(|mut cycle| {
                cycle.push(cycle[0]);
                cycle.join(" -> ")
            })
            .collect::<Vec<_>>()
            .join("; ");
        return Err(ConfigError::Cycle(message));
    }

    let mut order = Vec::with_capacity(tasks.len());
    let mut dfs = DfsPostOrder::empty(&graph);
    for task in tasks {
        dfs.move_to(node_indices[task.name.as_str()]);
        while let Some(node) = dfs.next(&graph) {
            order.push(node);
        }
    }
    Ok(order.into_iter().map(|node| &tasks[node.index()]).collect())
}

/// What a task from the file runs.
enum Action {
    Shell { dir: PathBuf, line: String },
    Program { dir: PathBuf, argv: Vec<String> },
    Script { dir: PathBuf, path: PathBuf },
}

impl Action {
    fn from_config(config: &TaskConfig, dir: &Path) -> Result<Option<Self>, ConfigError> {
        let dir = dir.to_path_buf();
        match (&config.command, &config.script) {
            (Some(_), Some(_)) => Err(ConfigError::CommandAndScript(config.name.clone())),
            (Some(Command::Single(line)), None) => Ok(Some(Action::Shell {
                dir,
                line: line.clone(),
            })),
            (Some(Command::Multiple(argv)), None) => {
                if argv.is_empty() {
                    return Err(ConfigError::EmptyCommand(config.name.clone()));
                }
                Ok(Some(Action::Program {
                    dir,
                    argv: argv.clone(),
                }))
            }
            (None, Some(script)) => {
                // relative scripts resolve against the task file's directory
                let path = dir.join(script);
                Ok(Some(Action::Script { dir, path }))
            }
            (None, None) => Ok(None),
        }
    }

    fn dir(&self) -> &Path {
        match self {
            Action::Shell { dir, .. } | Action::Program { dir, .. } | Action::Script { dir, .. } => dir,
        }
    }

    fn to_command(&self) -> ProcessCommand {
        match self {
            Action::Shell { line, .. } => {
                let mut command = ProcessCommand::new("sh");
                command.arg("-c").arg(line);
                command
            }
            Action::Program { argv, .. } => {
                let mut command = ProcessCommand::new(&argv[0]);
                command.args(&argv[1..]);
                command
            }
            Action::Script { path, .. } => ProcessCommand::new(path),
        }
    }

    fn run(&self, tf: &mut Tf<'_>) -> Result<(), Stop> {
        if let Action::Script { path, .. } = self {
            if !path.exists() {
                return Err(tf.fatal(format_args!("Script file '{}' not found", path.display())));
            }
        }

        let mut command = self.to_command();
        command.current_dir(self.dir());
        for (name, value) in tf.params().iter() {
            command.env(env_var(name), value);
        }

        let status = tf.exec(&mut command)?;
        if !status.success() {
            return Err(tf.fatal(format_args!("{} failed: {status}", self)));
        }
        Ok(())
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Shell { line, .. } => write!(f, "command '{line}'"),
            Action::Program { argv, .. } => write!(f, "command '{}'", argv.join(" ")),
            Action::Script { path, .. } => write!(f, "script '{}'", path.display()),
        }
    }
}

/// `TASKFLOW_<NAME>`, upper-cased with `-` replaced by `_`.
fn env_var(param: &str) -> String {
    format!("TASKFLOW_{}", param.to_uppercase().replace('-', "_"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::BufferedOutput;
    use crate::taskflow::Status;
    use tokio_util::sync::CancellationToken;

    fn config(yaml: &str) -> TasksFileConfig {
        parse_tasks_config(yaml).unwrap()
    }

    #[test]
    fn test_tasks_register_dependencies_first() {
        let flow = build_taskflow(
            &config(
                r#"
default: all
tasks:
  - name: all
    description: Everything
    dependencies: [build, test]
  - name: test
    dependencies: [build]
  - name: build
"#,
            ),
            Path::new("."),
        )
        .unwrap();

        let names: Vec<&str> = flow.tasks().map(|t| t.name()).collect();
        assert_eq!(names, vec!["all", "build", "test"]);
        let deps: Vec<&str> = flow
            .task("all")
            .unwrap()
            .dependencies()
            .iter()
            .map(|d| d.name())
            .collect();
        assert_eq!(deps, vec!["build", "test"]);
        assert_eq!(flow.default_task().map(|t| t.name()), Some("all"));
    }

    #[test]
    fn test_cycles_are_reported() {
        let err = build_taskflow(
            &config(
                r#"
tasks:
  - name: a
    dependencies: [b]
  - name: b
    dependencies: [a]
  - name: c
    dependencies: [c]
"#,
            ),
            Path::new("."),
        )
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Circular dependency detected: a -> b -> a; c -> c"
        );
    }

    #[test]
    fn test_unknown_references_are_rejected() {
        let err = build_taskflow(
            &config("tasks:\n  - name: a\n    dependencies: [missing]\n"),
            Path::new("."),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::UnknownDependency { ref dependency, .. } if dependency == "missing"));

        let err = build_taskflow(&config("default: nope\ntasks:\n  - name: a\n"), Path::new("."))
            .unwrap_err();
        assert!(matches!(err, ConfigError::UnknownDefault(_)));

        let err = build_taskflow(
            &config("tasks:\n  - name: a\n    params: [missing]\n"),
            Path::new("."),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Registration(RegistrationError::UnknownParameter { .. })
        ));
    }

    #[test]
    fn test_duplicate_and_reserved_names() {
        let err = build_taskflow(&config("tasks:\n  - name: a\n  - name: a\n"), Path::new("."))
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Registration(RegistrationError::DuplicateTask(_))
        ));

        let err = build_taskflow(
            &config("params:\n  - name: v\n    kind: bool\ntasks: []\n"),
            Path::new("."),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Registration(RegistrationError::DuplicateParam(ref name)) if name == "v"
        ));
    }

    #[test]
    fn test_param_defaults_are_validated() {
        let err = build_taskflow(
            &config("params:\n  - name: wait\n    kind: duration\n    default: soon\ntasks: []\n"),
            Path::new("."),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Default { ref kind, .. } if kind == "duration"));

        let flow = build_taskflow(
            &config("params:\n  - name: jobs\n    kind: int\n    default: 4\ntasks: []\n"),
            Path::new("."),
        )
        .unwrap();
        let jobs = flow.params().find(|p| p.info().name == "jobs").unwrap();
        assert_eq!(jobs.new_value().to_string(), "4");
    }

    #[test]
    fn test_command_and_script_conflict() {
        let err = build_taskflow(
            &config("tasks:\n  - name: a\n    command: echo\n    script: a.sh\n"),
            Path::new("."),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::CommandAndScript(_)));

        let err = build_taskflow(&config("tasks:\n  - name: a\n    command: []\n"), Path::new("."))
            .unwrap_err();
        assert!(matches!(err, ConfigError::EmptyCommand(_)));
    }

    #[test]
    fn test_env_var_names() {
        assert_eq!(env_var("dry-run"), "TASKFLOW_DRY_RUN");
        assert_eq!(env_var("v"), "TASKFLOW_V");
    }

    #[cfg(unix)]
    #[test]
    fn test_commands_run_in_the_taskfile_directory() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("taskflow.yml");
        std::fs::write(
            &path,
            r#"
params:
  - name: greeting
    kind: string
    default: hello
tasks:
  - name: write
    command: echo "$TASKFLOW_GREETING" > out.txt
    params: [greeting]
  - name: check
    command: ["cat", "out.txt"]
    dependencies: [write]
"#,
        )
        .unwrap();

        let mut flow = load_taskfile(&path).unwrap();
        let buffer = BufferedOutput::new();
        flow.set_output(buffer.output());

        let status = flow.run(&CancellationToken::new(), ["check", "-v", "--greeting=hi"]);
        assert_eq!(status, Status::Pass);
        let contents = std::fs::read_to_string(temp_dir.path().join("out.txt")).unwrap();
        assert_eq!(contents, "hi\n");
        let output: Vec<u8> = buffer.entries().into_iter().flat_map(|e| e.data).collect();
        assert!(String::from_utf8(output).unwrap().contains("hi\n"));
    }

    #[cfg(unix)]
    #[test]
    fn test_failing_command_fails_the_task() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("taskflow.yml");
        std::fs::write(
            &path,
            "tasks:\n  - name: broken\n    command: echo oops 1>&2; exit 4\n  - name: gone\n    script: missing.sh\n",
        )
        .unwrap();

        let mut flow = load_taskfile(&path).unwrap();
        let buffer = BufferedOutput::new();
        flow.set_output(buffer.output());

        assert_eq!(flow.run(&CancellationToken::new(), ["broken"]), Status::Failure);
        assert_eq!(flow.run(&CancellationToken::new(), ["gone"]), Status::Failure);
        let output: Vec<u8> = buffer.entries().into_iter().flat_map(|e| e.data).collect();
        let output = String::from_utf8(output).unwrap();
        assert!(output.contains("oops\n"));
        assert!(output.contains("failed: exit status: 4"));
        assert!(output.contains("Script file"));
    }
}
