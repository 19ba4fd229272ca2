//! Output interpretation specs.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::Deserialize;

use crate::error::{Error, Result};

/// Structured format a tool's captured output is reinterpreted as.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Deserialize)]
#[serde(try_from = "String")]
pub enum OutputType {
    /// Pass the captured text through untouched.
    #[default]
    Raw,
    /// Validate and pretty-print JSON.
    Json,
    /// Split into a JSON array of trimmed, non-empty lines.
    Lines,
    /// Extract regex matches into an array of objects.
    Regex,
    /// Convert CSV rows into an array of header-keyed objects.
    Csv,
    /// Decode XML into a generic nested JSON value.
    Xml,
}

impl OutputType {
    /// Returns the lowercase name used in catalog files.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Raw => "raw",
            Self::Json => "json",
            Self::Lines => "lines",
            Self::Regex => "regex",
            Self::Csv => "csv",
            Self::Xml => "xml",
        }
    }
}

impl FromStr for OutputType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "" | "raw" => Ok(Self::Raw),
            "json" => Ok(Self::Json),
            "lines" => Ok(Self::Lines),
            "regex" => Ok(Self::Regex),
            "csv" => Ok(Self::Csv),
            "xml" => Ok(Self::Xml),
            other => Err(Error::InvalidType {
                kind: "output",
                value: other.to_owned(),
            }),
        }
    }
}

impl TryFrom<String> for OutputType {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl Display for OutputType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Type a regex capture is coerced to.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Deserialize)]
#[serde(from = "String")]
pub enum CoercionType {
    /// Keep the captured text.
    #[default]
    String,
    /// Parse as a signed integer, keeping the text on failure.
    Integer,
    /// Parse as a float, keeping the text on failure.
    Float,
    /// Map `true/yes/1` and `false/no/0` (case-insensitive), keeping the text otherwise.
    Boolean,
}

impl From<String> for CoercionType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "integer" => Self::Integer,
            "float" | "number" => Self::Float,
            "boolean" => Self::Boolean,
            _ => Self::String,
        }
    }
}

/// Name and coercion for one positional regex capture group.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize)]
pub struct Group {
    name: String,
    #[serde(default, rename = "type")]
    coercion: CoercionType,
}

impl Group {
    /// Creates a group mapping.
    #[must_use]
    pub fn new(name: impl Into<String>, coercion: CoercionType) -> Self {
        Self {
            name: name.into(),
            coercion,
        }
    }

    /// Returns the key the capture is stored under.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the coercion applied to the capture.
    #[must_use]
    pub const fn coercion(&self) -> CoercionType {
        self.coercion
    }
}

/// Describes how a tool's output is parsed.
#[derive(Clone, Debug, Default, Eq, PartialEq, Deserialize)]
pub struct OutputSpec {
    #[serde(default, rename = "type")]
    output_type: OutputType,
    #[serde(default)]
    pattern: Option<String>,
    #[serde(default)]
    groups: Vec<Group>,
}

impl OutputSpec {
    /// Creates a spec of the given type with no pattern or groups.
    #[must_use]
    pub fn new(output_type: OutputType) -> Self {
        Self {
            output_type,
            pattern: None,
            groups: Vec::new(),
        }
    }

    /// Creates a `regex` spec with the supplied pattern and group mappings.
    #[must_use]
    pub fn regex(pattern: impl Into<String>, groups: Vec<Group>) -> Self {
        Self {
            output_type: OutputType::Regex,
            pattern: Some(pattern.into()),
            groups,
        }
    }

    /// Returns the output type.
    #[must_use]
    pub const fn output_type(&self) -> OutputType {
        self.output_type
    }

    /// Returns the regex pattern, if any.
    #[must_use]
    pub fn pattern(&self) -> Option<&str> {
        self.pattern.as_deref()
    }

    /// Returns the declared capture groups.
    #[must_use]
    pub fn groups(&self) -> &[Group] {
        &self.groups
    }
}
