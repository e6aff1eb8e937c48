//! Configuration file formats

pub mod tasks;

pub use tasks::{
    parse_tasks_config, taskfile_schema, Command, ParamConfig, ParamKind, Scalar, TaskConfig,
    TasksFileConfig,
};
