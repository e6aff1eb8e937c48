use std::fmt;

use schemars::{JsonSchema, Schema};
use serde::{Deserialize, Serialize};

use crate::types::ConfigError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum Command {
    /// Run through `sh -c`.
    Single(String),
    /// Program followed by its arguments, run without a shell.
    Multiple(Vec<String>),
}

/// A parameter default as written in YAML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum Scalar {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Bool(value) => write!(f, "{value}"),
            Scalar::Int(value) => write!(f, "{value}"),
            Scalar::Float(value) => write!(f, "{value}"),
            Scalar::Text(value) => f.write_str(value),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum ParamKind {
    Bool,
    Int,
    String,
    Duration,
}

impl ParamKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ParamKind::Bool => "bool",
            ParamKind::Int => "int",
            ParamKind::String => "string",
            ParamKind::Duration => "duration",
        }
    }
}

#[derive(Debug, Deserialize, Serialize, JsonSchema, Clone)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ParamConfig {
    pub name: String,
    #[serde(default)]
    pub usage: String,
    pub kind: ParamKind,
    /// Parsed according to `kind`.
    pub default: Option<Scalar>,
}

#[derive(Debug, Deserialize, Serialize, JsonSchema, Clone)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TaskConfig {
    pub name: String,
    pub description: Option<String>,
    pub script: Option<String>,
    pub command: Option<Command>,
    pub dependencies: Option<Vec<String>>,
    pub params: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, Serialize, JsonSchema, Clone)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TasksFileConfig {
    pub default: Option<String>,
    #[serde(default)]
    pub params: Vec<ParamConfig>,
    pub tasks: Vec<TaskConfig>,
}

pub fn parse_tasks_config(yaml_str: &str) -> Result<TasksFileConfig, ConfigError> {
    let config: TasksFileConfig = serde_yaml::from_str(yaml_str)?;
    Ok(config)
}

/// JSON schema of the task file.
pub fn taskfile_schema() -> Schema {
    schemars::schema_for!(TasksFileConfig)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let config = parse_tasks_config(
            r#"
default: build
params:
  - name: profile
    usage: Build profile
    kind: string
    default: debug
  - name: v2
    kind: bool
    default: true
tasks:
  - name: build
    description: Compile everything
    command: cargo build
    dependencies: [fmt]
    params: [profile]
  - name: fmt
    command: ["cargo", "fmt"]
  - name: release
    script: scripts/release.sh
"#,
        )
        .unwrap();

        assert_eq!(config.default.as_deref(), Some("build"));
        assert_eq!(config.params.len(), 2);
        assert_eq!(config.params[0].kind, ParamKind::String);
        assert_eq!(config.params[1].usage, "");
        assert_eq!(config.params[0].default, Some(Scalar::Text("debug".to_string())));
        assert_eq!(config.params[1].default, Some(Scalar::Bool(true)));
        assert_eq!(
            config.tasks[0].command,
            Some(Command::Single("cargo build".to_string()))
        );
        assert_eq!(
            config.tasks[1].command,
            Some(Command::Multiple(vec!["cargo".to_string(), "fmt".to_string()]))
        );
        assert_eq!(config.tasks[2].script.as_deref(), Some("scripts/release.sh"));
    }

    #[test]
    fn test_unknown_fields_are_rejected() {
        let err = parse_tasks_config("tasks:\n  - name: a\n    targets: [x]\n").unwrap_err();
        assert!(matches!(err, ConfigError::Yaml(_)));
        assert!(err.to_string().contains("targets"));
    }

    #[test]
    fn test_unknown_param_kind_is_rejected() {
        let yaml = "params:\n  - name: a\n    kind: float\ntasks: []\n";
        assert!(parse_tasks_config(yaml).is_err());
    }

    #[test]
    fn test_schema_names_the_fields() {
        let schema = serde_json::to_string(&taskfile_schema()).unwrap();
        assert!(schema.contains("dependencies"));
        assert!(schema.contains("duration"));
    }
}
