//! Typed parameter values.
//!
//! Every value can be set from its textual form and rendered back through
//! [`Display`](fmt::Display). A fresh value is created for each run by the
//! factory registered with the parameter, so no state leaks between runs.

use std::any::Any;
use std::fmt;

use chrono::Duration;

use crate::duration::{format_duration, parse_duration};
use crate::literals::{parse_bool, parse_float, parse_int};
use crate::types::ParamError;

/// Access to the concrete type behind a `dyn Value`.
pub trait AsAny {
    fn as_any(&self) -> &dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A parameter value that can be bound to a command-line flag.
///
/// Implement this for custom parameter types and register them with
/// [`Taskflow::register_value_param`](crate::Taskflow::register_value_param).
pub trait Value: fmt::Display + AsAny + Send + Sync {
    /// Set the value from text. The last call wins; malformed text is
    /// rejected with [`ParamError::Malformed`].
    fn set(&mut self, text: &str) -> Result<(), ParamError>;

    /// Boolean values may be given as a bare flag, without a value.
    fn is_bool(&self) -> bool {
        false
    }
}

impl<'a> dyn Value + 'a {
    /// Downcast to a concrete value type.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BoolValue(pub bool);

impl Value for BoolValue {
    fn set(&mut self, text: &str) -> Result<(), ParamError> {
        // a bare flag means true
        if text.is_empty() {
            self.0 = true;
            return Ok(());
        }
        self.0 = parse_bool(text).map_err(|e| ParamError::malformed(text, e))?;
        Ok(())
    }

    fn is_bool(&self) -> bool {
        true
    }
}

impl fmt::Display for BoolValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IntValue(pub i64);

impl Value for IntValue {
    fn set(&mut self, text: &str) -> Result<(), ParamError> {
        self.0 = parse_int(text).map_err(|e| ParamError::malformed(text, e))?;
        Ok(())
    }
}

impl fmt::Display for IntValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FloatValue(pub f64);

impl Value for FloatValue {
    fn set(&mut self, text: &str) -> Result<(), ParamError> {
        self.0 = parse_float(text).map_err(|e| ParamError::malformed(text, e))?;
        Ok(())
    }
}

impl fmt::Display for FloatValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StringValue(pub String);

impl Value for StringValue {
    fn set(&mut self, text: &str) -> Result<(), ParamError> {
        self.0 = text.to_string();
        Ok(())
    }
}

impl fmt::Display for StringValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DurationValue(pub Duration);

impl Default for DurationValue {
    fn default() -> Self {
        Self(Duration::zero())
    }
}

impl Value for DurationValue {
    fn set(&mut self, text: &str) -> Result<(), ParamError> {
        self.0 = parse_duration(text).map_err(|e| ParamError::malformed(text, e))?;
        Ok(())
    }
}

impl fmt::Display for DurationValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_duration(self.0))
    }
}
