//! YAML catalog loader and validator.

use std::collections::HashSet;
use std::path::Path;

use tracing::debug;
use umcp_primitives::{Catalog, OutputType};

use crate::error::{ConfigError, ConfigResult, ValidationError};

/// Reads, parses, and validates a catalog file.
///
/// # Errors
///
/// Returns [`ConfigError::Read`], [`ConfigError::Parse`], or
/// [`ConfigError::Invalid`] depending on which stage failed.
pub fn load_catalog(path: impl AsRef<Path>) -> ConfigResult<Catalog> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let catalog = parse_catalog(path, &text)?;
    debug!(config = %path.display(), tools = catalog.tools().len(), "catalog loaded");
    Ok(catalog)
}

/// Parses and validates catalog text; `path` is used for error reporting.
///
/// # Errors
///
/// Returns [`ConfigError::Parse`] or [`ConfigError::Invalid`].
pub fn parse_catalog(path: impl AsRef<Path>, text: &str) -> ConfigResult<Catalog> {
    let path = path.as_ref();
    let catalog: Catalog = serde_yaml::from_str(text).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    validate_catalog(&catalog).map_err(|source| ConfigError::Invalid {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(catalog)
}

/// Checks the structural rules a loaded catalog must satisfy.
///
/// # Errors
///
/// Returns the first [`ValidationError`] encountered, in declaration order.
pub fn validate_catalog(catalog: &Catalog) -> Result<(), ValidationError> {
    if catalog.name().is_empty() {
        return Err(ValidationError::MissingName);
    }
    if catalog.settings().command().is_empty() {
        return Err(ValidationError::MissingCommand);
    }
    if catalog.tools().is_empty() {
        return Err(ValidationError::NoTools);
    }

    for tool in catalog.tools() {
        let name = tool.name();
        if name.is_empty() {
            return Err(ValidationError::MissingToolName);
        }
        if tool.description().is_empty() {
            return Err(ValidationError::MissingDescription { tool: name.into() });
        }
        if tool.output().output_type() == OutputType::Regex
            && tool.output().pattern().is_none_or(str::is_empty)
        {
            return Err(ValidationError::MissingPattern { tool: name.into() });
        }

        let mut seen = HashSet::new();
        for arg in tool.arguments() {
            if arg.name().is_empty() {
                return Err(ValidationError::MissingArgumentName { tool: name.into() });
            }
            if !seen.insert(arg.name()) {
                return Err(ValidationError::DuplicateArgument {
                    tool: name.into(),
                    argument: arg.name().into(),
                });
            }
            if arg.is_required() && arg.default_value().is_some() {
                return Err(ValidationError::RequiredWithDefault {
                    tool: name.into(),
                    argument: arg.name().into(),
                });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> ConfigResult<Catalog> {
        parse_catalog("test.yaml", text)
    }

    fn invalid(text: &str) -> ValidationError {
        match parse(text) {
            Err(ConfigError::Invalid { source, .. }) => source,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    const MINIMAL: &str = r"
metadata:
  name: ls
settings:
  command: ls
tools:
  - name: list
    description: List files
";

    #[test]
    fn minimal_catalog_gets_defaults() {
        let catalog = parse(MINIMAL).unwrap();
        assert_eq!(catalog.version(), "1.0");
        assert_eq!(catalog.tools()[0].output().output_type(), OutputType::Raw);
        assert!(catalog.settings().working_dir().is_none());
        assert_eq!(catalog.settings().effective_timeout().as_secs(), 30);
    }

    #[test]
    fn structural_rules_are_enforced() {
        assert_eq!(
            invalid("settings:\n  command: ls\ntools:\n  - name: a\n    description: b\n"),
            ValidationError::MissingName
        );
        assert_eq!(
            invalid("metadata:\n  name: ls\ntools:\n  - name: a\n    description: b\n"),
            ValidationError::MissingCommand
        );
        assert_eq!(
            invalid("metadata:\n  name: ls\nsettings:\n  command: ls\n"),
            ValidationError::NoTools
        );
        assert_eq!(
            invalid(&MINIMAL.replace("    description: List files\n", "")),
            ValidationError::MissingDescription { tool: "list".into() }
        );
    }

    #[test]
    fn regex_output_requires_pattern() {
        let text = format!("{MINIMAL}    output:\n      type: regex\n");
        assert_eq!(
            invalid(&text),
            ValidationError::MissingPattern { tool: "list".into() }
        );
    }

    #[test]
    fn argument_rules_are_enforced() {
        let dup = format!(
            "{MINIMAL}    arguments:\n      - name: path\n      - name: path\n"
        );
        assert!(matches!(invalid(&dup), ValidationError::DuplicateArgument { .. }));

        let defaulted = format!(
            "{MINIMAL}    arguments:\n      - name: path\n        required: true\n        default: .\n"
        );
        assert_eq!(
            invalid(&defaulted),
            ValidationError::RequiredWithDefault {
                tool: "list".into(),
                argument: "path".into()
            }
        );
    }

    #[test]
    fn bad_condition_is_a_parse_error() {
        let text = format!(
            "{MINIMAL}    arguments:\n      - name: all\n        when: \"short is true\"\n"
        );
        assert!(matches!(parse(&text), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let err = load_catalog("/nonexistent/umcp/catalog.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
