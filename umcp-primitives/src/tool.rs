//! Tool, argument, and chain definitions.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::Deserialize;
use serde_json::Value;

use crate::condition::Condition;
use crate::error::{Error, Result};
use crate::output::OutputSpec;

/// Semantic type of a tool argument.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Deserialize)]
#[serde(try_from = "String")]
pub enum ArgType {
    /// Free-form text.
    #[default]
    String,
    /// Switch emitted as a bare flag when true.
    Boolean,
    /// Whole number.
    Integer,
    /// Floating point number, rendered with six decimals.
    Float,
    /// Repeated value, one flag occurrence per element.
    Array,
    /// Arbitrary JSON value, rendered as compact JSON.
    Object,
}

impl ArgType {
    /// Returns the lowercase name used in catalog files.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Boolean => "boolean",
            Self::Integer => "integer",
            Self::Float => "float",
            Self::Array => "array",
            Self::Object => "object",
        }
    }

    /// Returns the JSON-Schema type advertised for this argument type.
    #[must_use]
    pub const fn json_schema_type(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Boolean => "boolean",
            Self::Integer => "integer",
            Self::Float => "number",
            Self::Array => "array",
            Self::Object => "object",
        }
    }
}

impl FromStr for ArgType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "" | "string" => Ok(Self::String),
            "boolean" => Ok(Self::Boolean),
            "integer" => Ok(Self::Integer),
            "float" => Ok(Self::Float),
            "array" => Ok(Self::Array),
            "object" => Ok(Self::Object),
            other => Err(Error::InvalidType {
                kind: "argument",
                value: other.to_owned(),
            }),
        }
    }
}

impl TryFrom<String> for ArgType {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl Display for ArgType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Declares one argument accepted by a tool.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct ArgumentSpec {
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default, rename = "type")]
    arg_type: ArgType,
    #[serde(default)]
    required: bool,
    #[serde(default)]
    default: Option<Value>,
    #[serde(default)]
    flag: Option<String>,
    #[serde(default)]
    positional: bool,
    #[serde(default)]
    position: i64,
    #[serde(default)]
    when: Option<Condition>,
    #[serde(default)]
    min: Option<i64>,
    #[serde(default)]
    max: Option<i64>,
}

impl ArgumentSpec {
    /// Creates an optional, non-positional argument without a flag.
    #[must_use]
    pub fn new(name: impl Into<String>, arg_type: ArgType) -> Self {
        Self {
            name: name.into(),
            description: None,
            arg_type,
            required: false,
            default: None,
            flag: None,
            positional: false,
            position: 0,
            when: None,
            min: None,
            max: None,
        }
    }

    /// Marks the argument as required.
    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Sets the human-readable description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the flag token emitted before the value.
    #[must_use]
    pub fn with_flag(mut self, flag: impl Into<String>) -> Self {
        self.flag = Some(flag.into());
        self
    }

    /// Sets the value used when the caller omits the argument.
    #[must_use]
    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    /// Makes the argument positional at the supplied position.
    #[must_use]
    pub fn at_position(mut self, position: i64) -> Self {
        self.positional = true;
        self.position = position;
        self
    }

    /// Attaches a condition gating emission of the argument.
    #[must_use]
    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.when = Some(condition);
        self
    }

    /// Sets the advertised integer bounds.
    #[must_use]
    pub fn with_bounds(mut self, min: Option<i64>, max: Option<i64>) -> Self {
        self.min = min;
        self.max = max;
        self
    }

    /// Returns the argument name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the optional description.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Returns the semantic type.
    #[must_use]
    pub const fn arg_type(&self) -> ArgType {
        self.arg_type
    }

    /// Returns `true` when callers must supply the argument.
    #[must_use]
    pub const fn is_required(&self) -> bool {
        self.required
    }

    /// Returns the default value, if any.
    #[must_use]
    pub fn default_value(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    /// Returns the flag token, if any.
    #[must_use]
    pub fn flag(&self) -> Option<&str> {
        self.flag.as_deref()
    }

    /// Returns `true` when the argument is emitted positionally.
    #[must_use]
    pub const fn is_positional(&self) -> bool {
        self.positional
    }

    /// Returns the declared position (meaningful for positional arguments).
    #[must_use]
    pub const fn position(&self) -> i64 {
        self.position
    }

    /// Returns the emission condition, if any.
    #[must_use]
    pub fn condition(&self) -> Option<&Condition> {
        self.when.as_ref()
    }

    /// Returns the advertised lower bound.
    #[must_use]
    pub const fn min(&self) -> Option<i64> {
        self.min
    }

    /// Returns the advertised upper bound.
    #[must_use]
    pub const fn max(&self) -> Option<i64> {
        self.max
    }
}

/// One sub-command of a multi-step chain.
#[derive(Clone, Debug, Default, Eq, PartialEq, Deserialize)]
pub struct ChainStep {
    #[serde(default)]
    command: Option<String>,
    #[serde(default)]
    arguments: Vec<String>,
}

impl ChainStep {
    /// Creates a chain step with the supplied sub-command and argument templates.
    #[must_use]
    pub fn new<I, S>(command: Option<&str>, arguments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            command: command.map(str::to_owned),
            arguments: arguments.into_iter().map(Into::into).collect(),
        }
    }

    /// Returns the sub-command token, if any.
    #[must_use]
    pub fn command(&self) -> Option<&str> {
        self.command.as_deref().filter(|cmd| !cmd.is_empty())
    }

    /// Returns the argument templates in order.
    #[must_use]
    pub fn arguments(&self) -> &[String] {
        &self.arguments
    }
}

/// A tool exposed to protocol clients.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct ToolDefinition {
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    command: Option<String>,
    #[serde(default)]
    arguments: Vec<ArgumentSpec>,
    #[serde(default)]
    output: OutputSpec,
    #[serde(default)]
    chain: Vec<ChainStep>,
}

impl ToolDefinition {
    /// Creates a tool with no sub-command, arguments, or chain and raw output.
    #[must_use]
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            command: None,
            arguments: Vec::new(),
            output: OutputSpec::default(),
            chain: Vec::new(),
        }
    }

    /// Sets the sub-command token.
    #[must_use]
    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = Some(command.into());
        self
    }

    /// Appends an argument in declaration order.
    #[must_use]
    pub fn with_argument(mut self, argument: ArgumentSpec) -> Self {
        self.arguments.push(argument);
        self
    }

    /// Sets the output spec.
    #[must_use]
    pub fn with_output(mut self, output: OutputSpec) -> Self {
        self.output = output;
        self
    }

    /// Appends a chain step.
    #[must_use]
    pub fn with_chain_step(mut self, step: ChainStep) -> Self {
        self.chain.push(step);
        self
    }

    /// Returns the tool name (unqualified).
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the description.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Returns the sub-command token, if any.
    #[must_use]
    pub fn command(&self) -> Option<&str> {
        self.command.as_deref().filter(|cmd| !cmd.is_empty())
    }

    /// Returns the arguments in declaration order.
    #[must_use]
    pub fn arguments(&self) -> &[ArgumentSpec] {
        &self.arguments
    }

    /// Returns the output spec.
    #[must_use]
    pub fn output(&self) -> &OutputSpec {
        &self.output
    }

    /// Returns the chain steps; empty for single-command tools.
    #[must_use]
    pub fn chain(&self) -> &[ChainStep] {
        &self.chain
    }
}
