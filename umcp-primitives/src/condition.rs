//! Conditional-argument expressions.
//!
//! An argument may carry a `when` clause of the form `${name} == literal` or
//! `${name} != literal`. The clause is parsed once at load time into a
//! [`Condition`] so literals containing spaces stay unambiguous.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// Comparison operator supported by [`Condition`].
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum ConditionOp {
    /// Textual equality.
    Eq,
    /// Textual inequality.
    Ne,
}

impl ConditionOp {
    /// Returns the operator token as written in catalog files.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Eq => "==",
            Self::Ne => "!=",
        }
    }
}

/// A single `${variable} op literal` comparison.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Condition {
    variable: String,
    op: ConditionOp,
    literal: String,
}

impl Condition {
    /// Creates a condition from its parts.
    #[must_use]
    pub fn new(variable: impl Into<String>, op: ConditionOp, literal: impl Into<String>) -> Self {
        Self {
            variable: variable.into(),
            op,
            literal: literal.into(),
        }
    }

    /// Returns the referenced argument name.
    #[must_use]
    pub fn variable(&self) -> &str {
        &self.variable
    }

    /// Returns the comparison operator.
    #[must_use]
    pub const fn op(&self) -> ConditionOp {
        self.op
    }

    /// Returns the literal compared against.
    #[must_use]
    pub fn literal(&self) -> &str {
        &self.literal
    }

    /// Evaluates the condition against caller-supplied argument values.
    ///
    /// A variable that was not supplied makes the condition false regardless
    /// of the operator.
    #[must_use]
    pub fn evaluate(&self, values: &Map<String, Value>) -> bool {
        let Some(actual) = values.get(&self.variable) else {
            return false;
        };

        let actual = match actual {
            Value::String(text) => text.clone(),
            other => other.to_string(),
        };

        match self.op {
            ConditionOp::Eq => actual == self.literal,
            ConditionOp::Ne => actual != self.literal,
        }
    }
}

impl FromStr for Condition {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = |reason: &str| Error::InvalidCondition {
            expression: s.to_owned(),
            reason: reason.to_owned(),
        };

        let rest = s
            .trim()
            .strip_prefix("${")
            .ok_or_else(|| invalid("expected `${name}` on the left-hand side"))?;
        let (variable, rest) = rest
            .split_once('}')
            .ok_or_else(|| invalid("unterminated variable reference"))?;
        let variable = variable.trim();
        if variable.is_empty() {
            return Err(invalid("variable name cannot be empty"));
        }

        let rest = rest.trim_start();
        let (op, literal) = if let Some(literal) = rest.strip_prefix("==") {
            (ConditionOp::Eq, literal)
        } else if let Some(literal) = rest.strip_prefix("!=") {
            (ConditionOp::Ne, literal)
        } else {
            return Err(invalid("expected `==` or `!=`"));
        };

        let literal = literal.trim();
        let literal = literal
            .strip_prefix('"')
            .and_then(|inner| inner.strip_suffix('"'))
            .unwrap_or(literal);

        Ok(Self::new(variable, op, literal))
    }
}

impl TryFrom<String> for Condition {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Condition> for String {
    fn from(value: Condition) -> Self {
        value.to_string()
    }
}

impl Display for Condition {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "${{{}}} {} \"{}\"",
            self.variable,
            self.op.as_str(),
            self.literal
        )
    }
}
