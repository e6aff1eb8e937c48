//! Command-line argument parsing
//!
//! Arguments are scanned left to right. A flag that needs a value claims the
//! next argument, whatever it looks like.

use std::collections::{BTreeMap, HashMap};

use tracing::trace;

use crate::params::ParameterDefinition;
use crate::types::FlowError;
use crate::value::Value;

/// The values of every registered parameter for one run, addressable by
/// parameter name and by flag spelling.
pub struct ParamValues {
    values: BTreeMap<String, Box<dyn Value>>,
    flags: HashMap<String, String>,
}

impl ParamValues {
    /// Fresh values from each parameter's factory.
    pub fn new(params: &BTreeMap<String, ParameterDefinition>) -> Self {
        let mut values = BTreeMap::new();
        let mut flags = HashMap::new();
        for (name, param) in params {
            values.insert(name.clone(), param.new_value());
            flags.insert(param.info().long_flag(), name.clone());
            if let Some(short) = param.info().short_flag() {
                flags.insert(short, name.clone());
            }
        }
        Self { values, flags }
    }

    pub fn get(&self, name: &str) -> Option<&dyn Value> {
        self.values.get(name).map(|value| value.as_ref())
    }

    fn by_flag(&mut self, flag: &str) -> Option<&mut Box<dyn Value>> {
        let name = self.flags.get(flag)?;
        self.values.get_mut(name)
    }

    fn set(&mut self, flag: &str, text: &str) -> Result<(), FlowError> {
        let Some(value) = self.by_flag(flag) else {
            return Err(FlowError::UnknownArgument(flag.to_string()));
        };
        value.set(text).map_err(|source| FlowError::InvalidValue {
            flag: flag.to_string(),
            source,
        })
    }
}

/// What the arguments asked for.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Invocation {
    pub tasks: Vec<String>,
    pub usage_requested: bool,
}

/// Parse `args`, setting parameter values as flags are seen.
///
/// Each argument is, in order of precedence: the value of a pending flag, a
/// task name, a flag (`--name`, `-n`, optionally `=value`), or a help
/// request. Anything else is an unknown argument.
///
/// A non-boolean flag written without `=value` takes the next argument as its
/// value. If it is the last argument there is nothing to take, and parsing
/// fails with [`FlowError::MissingValue`] instead of ignoring the flag.
pub fn parse_args<S: AsRef<str>>(
    args: &[S],
    is_task: impl Fn(&str) -> bool,
    values: &mut ParamValues,
) -> Result<Invocation, FlowError> {
    let mut invocation = Invocation::default();
    let mut pending: Option<String> = None;

    for arg in args {
        let arg = arg.as_ref();

        if let Some(flag) = pending.take() {
            trace!(%flag, value = arg, "flag value");
            values.set(&flag, arg)?;
            continue;
        }

        if is_task(arg) {
            trace!(task = arg, "task requested");
            invocation.tasks.push(arg.to_string());
            continue;
        }

        let (flag, text) = match arg.split_once('=') {
            Some((flag, text)) => (flag, Some(text)),
            None => (arg, None),
        };
        if let Some(is_bool) = values.by_flag(flag).map(|value| value.is_bool()) {
            match text {
                Some(text) => values.set(flag, text)?,
                None if is_bool => values.set(flag, "")?,
                None => pending = Some(flag.to_string()),
            }
            continue;
        }

        if matches!(arg, "-h" | "--help" | "help") {
            invocation.usage_requested = true;
            continue;
        }

        return Err(FlowError::UnknownArgument(arg.to_string()));
    }

    if let Some(flag) = pending {
        return Err(FlowError::MissingValue(flag));
    }
    Ok(invocation)
}
