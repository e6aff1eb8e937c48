//! Parameter descriptors, typed handles and the [`Params`] string view.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use chrono::Duration;

use crate::duration::parse_duration;
use crate::literals::{parse_bool, parse_float, parse_int};
use crate::runner::Tf;
use crate::types::ParamError;
use crate::value::{BoolValue, DurationValue, FloatValue, IntValue, StringValue, Value};

/// Describes a parameter: its name, from which the flags are derived, and
/// the usage text shown in help.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterInfo {
    pub name: String,
    pub usage: String,
}

impl ParameterInfo {
    pub fn new(name: impl Into<String>, usage: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            usage: usage.into(),
        }
    }

    /// `--name`
    pub fn long_flag(&self) -> String {
        format!("--{}", self.name)
    }

    /// `-n`, only for single-character names.
    pub fn short_flag(&self) -> Option<String> {
        let mut chars = self.name.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Some(format!("-{c}")),
            _ => None,
        }
    }
}

pub(crate) type ValueFactory = Arc<dyn Fn() -> Box<dyn Value> + Send + Sync>;

/// A registered parameter. The factory produces a fresh value for every run.
#[derive(Clone)]
pub struct ParameterDefinition {
    pub(crate) info: ParameterInfo,
    pub(crate) factory: ValueFactory,
}

impl ParameterDefinition {
    pub fn info(&self) -> &ParameterInfo {
        &self.info
    }

    pub fn new_value(&self) -> Box<dyn Value> {
        (self.factory)()
    }
}

impl fmt::Debug for ParameterDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParameterDefinition")
            .field("info", &self.info)
            .finish_non_exhaustive()
    }
}

/// Anything that names a registered parameter and can be declared by a task.
pub trait Param {
    fn name(&self) -> &str;
}

macro_rules! typed_param {
    ($(#[$meta:meta])* $handle:ident, $value:ident, $target:ty) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash)]
        pub struct $handle {
            name: String,
        }

        impl $handle {
            pub(crate) fn new(name: impl Into<String>) -> Self {
                Self { name: name.into() }
            }

            /// Read the value visible to the running task.
            pub fn try_get(&self, tf: &Tf<'_>) -> Result<$target, ParamError> {
                tf.value(&self.name)
                    .and_then(|value| value.downcast_ref::<$value>())
                    .map(|value| value.0.clone())
                    .ok_or_else(|| ParamError::NotVisible(self.name.clone()))
            }

            /// Read the value visible to the running task.
            ///
            /// # Panics
            ///
            /// Panics if the task did not declare this parameter.
            #[allow(clippy::panic)]
            pub fn get(&self, tf: &Tf<'_>) -> $target {
                match self.try_get(tf) {
                    Ok(value) => value,
                    Err(err) => panic!("{} in task {}", err, tf.name()),
                }
            }
        }

        impl Param for $handle {
            fn name(&self) -> &str {
                &self.name
            }
        }
    };
}

typed_param!(
    /// Handle to a registered boolean parameter.
    BoolParam, BoolValue, bool
);
typed_param!(
    /// Handle to a registered integer parameter.
    IntParam, IntValue, i64
);
typed_param!(
    /// Handle to a registered floating point parameter.
    FloatParam, FloatValue, f64
);
typed_param!(
    /// Handle to a registered string parameter.
    StringParam, StringValue, String
);
typed_param!(
    /// Handle to a registered duration parameter.
    DurationParam, DurationValue, Duration
);

/// Handle to a parameter with a caller-defined [`Value`] type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ValueParam {
    name: String,
}

impl ValueParam {
    pub(crate) fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn try_get<'t>(&self, tf: &Tf<'t>) -> Result<&'t dyn Value, ParamError> {
        tf.value(&self.name)
            .ok_or_else(|| ParamError::NotVisible(self.name.clone()))
    }

    /// # Panics
    ///
    /// Panics if the task did not declare this parameter.
    #[allow(clippy::panic)]
    pub fn get<'t>(&self, tf: &Tf<'t>) -> &'t dyn Value {
        match self.try_get(tf) {
            Ok(value) => value,
            Err(err) => panic!("{} in task {}", err, tf.name()),
        }
    }
}

impl Param for ValueParam {
    fn name(&self) -> &str {
        &self.name
    }
}

/// Parameter values in their textual form. An empty string means the
/// parameter is not set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params(BTreeMap<String, String>);

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    fn raw(&self, key: &str) -> Result<&str, ParamError> {
        match self.0.get(key) {
            Some(value) if !value.is_empty() => Ok(value),
            _ => Err(ParamError::NotSet),
        }
    }

    pub fn string(&self, key: &str) -> Result<&str, ParamError> {
        self.raw(key)
    }

    /// Integer literal with optional `0x`, `0o`, `0b` or `0` base prefix.
    pub fn int(&self, key: &str) -> Result<i64, ParamError> {
        let raw = self.raw(key)?;
        parse_int(raw).map_err(|e| ParamError::malformed(raw, e))
    }

    /// Accepts `1, t, T, TRUE, true, True, 0, f, F, FALSE, false, False`.
    pub fn bool(&self, key: &str) -> Result<bool, ParamError> {
        let raw = self.raw(key)?;
        parse_bool(raw).map_err(|e| ParamError::malformed(raw, e))
    }

    /// Decimal or hexadecimal floating point syntax.
    pub fn float64(&self, key: &str) -> Result<f64, ParamError> {
        let raw = self.raw(key)?;
        parse_float(raw).map_err(|e| ParamError::malformed(raw, e))
    }

    /// Signed sequence of `<number><unit>` pairs such as `300ms` or `-1.5h`.
    pub fn duration(&self, key: &str) -> Result<Duration, ParamError> {
        let raw = self.raw(key)?;
        parse_duration(raw).map_err(|e| ParamError::malformed(raw, e))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Params {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_derived_from_name() {
        let info = ParameterInfo::new("v", "verbose");
        assert_eq!(info.long_flag(), "--v");
        assert_eq!(info.short_flag().as_deref(), Some("-v"));

        let info = ParameterInfo::new("count", "");
        assert_eq!(info.long_flag(), "--count");
        assert_eq!(info.short_flag(), None);
    }

    #[test]
    fn test_unset_params_report_not_set() {
        let params: Params = [("empty", "")].into_iter().collect();
        for key in ["missing", "empty"] {
            assert_eq!(params.int(key), Err(ParamError::NotSet));
            assert_eq!(params.bool(key), Err(ParamError::NotSet));
            assert_eq!(params.float64(key), Err(ParamError::NotSet));
            assert_eq!(params.duration(key), Err(ParamError::NotSet));
            assert_eq!(params.string(key), Err(ParamError::NotSet));
        }
    }

    #[test]
    fn test_malformed_params_are_distinct_from_not_set() {
        let params: Params = [("x", "abc")].into_iter().collect();
        for err in [
            params.int("x").unwrap_err(),
            params.bool("x").unwrap_err(),
            params.float64("x").unwrap_err(),
            params.duration("x").unwrap_err(),
        ] {
            assert!(matches!(err, ParamError::Malformed { ref value, .. } if value == "abc"));
            assert_ne!(err, ParamError::NotSet);
        }
    }

    #[test]
    fn test_typed_accessors() {
        let mut params = Params::new();
        params.insert("n", "0x1f");
        params.insert("b", "T");
        params.insert("f", "0x1p-1");
        params.insert("d", "1h1s");
        assert_eq!(params.int("n"), Ok(31));
        assert_eq!(params.bool("b"), Ok(true));
        assert_eq!(params.float64("f"), Ok(0.5));
        assert_eq!(params.duration("d"), Ok(Duration::seconds(3601)));
        assert_eq!(params.iter().count(), 4);
    }
}
