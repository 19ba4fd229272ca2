//! Marshals typed tool arguments into an ordered command line.

use serde_json::{Map, Value};
use thiserror::Error;
use umcp_primitives::{ArgType, ArgumentSpec, CatalogSettings, ToolDefinition};

/// Result alias for command construction.
pub type BuildResult<T> = Result<T, BuildError>;

/// Errors produced while building a command line.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BuildError {
    /// A required argument had neither a caller value nor a default.
    #[error("required argument `{0}` not provided")]
    MissingRequiredArgument(String),

    /// A supplied value could not be formatted as the declared type.
    #[error("argument `{name}` expected {expected} value")]
    InvalidValueType {
        /// Argument name.
        name: String,
        /// Declared argument type.
        expected: &'static str,
    },
}

/// Builds the token sequence for one tool invocation.
///
/// Token order is the catalog base command, the tool sub-command, positional
/// arguments by ascending position, then flag arguments in declaration order.
#[derive(Clone, Copy, Debug)]
pub struct CommandBuilder<'a> {
    settings: &'a CatalogSettings,
    tool: &'a ToolDefinition,
}

impl<'a> CommandBuilder<'a> {
    /// Creates a builder for the supplied catalog settings and tool.
    #[must_use]
    pub const fn new(settings: &'a CatalogSettings, tool: &'a ToolDefinition) -> Self {
        Self { settings, tool }
    }

    /// Builds the command line from caller-supplied argument values.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::MissingRequiredArgument`] when a required argument
    /// is absent and has no default, or [`BuildError::InvalidValueType`] when a
    /// value cannot be formatted as its declared type.
    pub fn build(&self, values: &Map<String, Value>) -> BuildResult<Vec<String>> {
        let mut tokens = Vec::new();
        if !self.settings.command().is_empty() {
            tokens.push(self.settings.command().to_owned());
        }
        if let Some(command) = self.tool.command() {
            tokens.push(command.to_owned());
        }

        let mut positional: Vec<&ArgumentSpec> = self
            .tool
            .arguments()
            .iter()
            .filter(|arg| arg.is_positional())
            .collect();
        positional.sort_by_key(|arg| arg.position());

        for arg in positional {
            let Some(value) = resolve(arg, values)? else {
                continue;
            };
            emit_positional(arg, value, &mut tokens)?;
        }

        for arg in self.tool.arguments().iter().filter(|arg| !arg.is_positional()) {
            let Some(value) = resolve(arg, values)? else {
                continue;
            };
            if let Some(condition) = arg.condition() {
                if !condition.evaluate(values) {
                    continue;
                }
            }
            emit_flag(arg, value, &mut tokens)?;
        }

        Ok(tokens)
    }
}

fn resolve<'v>(arg: &'v ArgumentSpec, values: &'v Map<String, Value>) -> BuildResult<Option<&'v Value>> {
    match values.get(arg.name()).filter(|value| !value.is_null()) {
        Some(value) => Ok(Some(value)),
        None => match arg.default_value() {
            Some(default) => Ok(Some(default)),
            None if arg.is_required() => {
                Err(BuildError::MissingRequiredArgument(arg.name().to_owned()))
            }
            None => Ok(None),
        },
    }
}

fn emit_positional(arg: &ArgumentSpec, value: &Value, tokens: &mut Vec<String>) -> BuildResult<()> {
    if arg.arg_type() == ArgType::Array {
        tokens.extend(elements(value).iter().map(text));
    } else {
        tokens.push(format_value(arg, value)?);
    }
    Ok(())
}

fn emit_flag(arg: &ArgumentSpec, value: &Value, tokens: &mut Vec<String>) -> BuildResult<()> {
    match arg.arg_type() {
        ArgType::Boolean => {
            let enabled = value.as_bool().ok_or_else(|| invalid(arg))?;
            if let Some(flag) = arg.flag().filter(|flag| enabled && !flag.is_empty()) {
                tokens.push(flag.to_owned());
            }
        }
        ArgType::Array => {
            for item in elements(value) {
                push_flagged(arg.flag(), text(item), tokens);
            }
        }
        _ => {
            let formatted = format_value(arg, value)?;
            push_flagged(arg.flag(), formatted, tokens);
        }
    }
    Ok(())
}

fn push_flagged(flag: Option<&str>, value: String, tokens: &mut Vec<String>) {
    match flag.filter(|flag| !flag.is_empty()) {
        Some(flag) if flag.contains('=') => tokens.push(format!("{flag}{value}")),
        Some(flag) => {
            tokens.push(flag.to_owned());
            tokens.push(value);
        }
        None => tokens.push(value),
    }
}

fn elements(value: &Value) -> &[Value] {
    match value {
        Value::Array(items) => items,
        other => std::slice::from_ref(other),
    }
}

/// Textual form of a JSON value: strings raw, everything else compact JSON.
fn text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn invalid(arg: &ArgumentSpec) -> BuildError {
    BuildError::InvalidValueType {
        name: arg.name().to_owned(),
        expected: arg.arg_type().as_str(),
    }
}

#[allow(clippy::cast_possible_truncation)]
fn format_value(arg: &ArgumentSpec, value: &Value) -> BuildResult<String> {
    match arg.arg_type() {
        ArgType::String | ArgType::Array => Ok(text(value)),
        ArgType::Boolean => value
            .as_bool()
            .map(|b| b.to_string())
            .ok_or_else(|| invalid(arg)),
        ArgType::Integer => match value {
            Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().map(|f| f.trunc() as i64))
                .map(|i| i.to_string())
                .ok_or_else(|| invalid(arg)),
            Value::String(s) => s
                .trim()
                .parse::<i64>()
                .map(|i| i.to_string())
                .map_err(|_| invalid(arg)),
            _ => Err(invalid(arg)),
        },
        ArgType::Float => {
            let number = match value {
                Value::Number(n) => n.as_f64(),
                Value::String(s) => s.trim().parse::<f64>().ok(),
                _ => None,
            };
            number.map(|f| format!("{f:.6}")).ok_or_else(|| invalid(arg))
        }
        ArgType::Object => Ok(value.to_string()),
    }
}
