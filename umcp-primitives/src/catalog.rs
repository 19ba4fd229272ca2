//! Catalog-level settings and security policy.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::tool::ToolDefinition;

/// Output size cap applied when a policy does not configure one (10 MiB).
pub const DEFAULT_MAX_OUTPUT_SIZE: u64 = 10 * 1024 * 1024;

/// Per-command timeout applied when a catalog does not configure one.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Returns the fully qualified `<catalog>_<tool>` name.
#[must_use]
pub fn qualified_name(catalog: &str, tool: &str) -> String {
    format!("{catalog}_{tool}")
}

/// Identity of a catalog.
#[derive(Clone, Debug, Default, Eq, PartialEq, Deserialize)]
pub struct CatalogMetadata {
    #[serde(default)]
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    version: Option<String>,
}

impl CatalogMetadata {
    /// Creates metadata for the supplied catalog name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            version: None,
        }
    }

    /// Returns the catalog name, used as the tool-name prefix.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the optional description.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Returns the optional catalog version.
    #[must_use]
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }
}

/// Process settings shared by every tool in a catalog.
#[derive(Clone, Debug, Default, Eq, PartialEq, Deserialize)]
pub struct CatalogSettings {
    #[serde(default)]
    command: String,
    #[serde(default)]
    working_dir: Option<PathBuf>,
    #[serde(default, deserialize_with = "crate::duration::deserialize_option")]
    timeout: Option<Duration>,
    #[serde(default)]
    environment: Vec<String>,
}

impl CatalogSettings {
    /// Creates settings for the supplied base command.
    #[must_use]
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ..Self::default()
        }
    }

    /// Sets the working directory.
    #[must_use]
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Sets the per-command timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Appends a `KEY=VALUE` environment entry.
    #[must_use]
    pub fn with_env(mut self, entry: impl Into<String>) -> Self {
        self.environment.push(entry.into());
        self
    }

    /// Returns the base command token.
    #[must_use]
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Returns the configured working directory. `None` and `"."` both mean
    /// the server's current directory.
    #[must_use]
    pub fn working_dir(&self) -> Option<&Path> {
        self.working_dir
            .as_deref()
            .filter(|dir| !dir.as_os_str().is_empty() && *dir != Path::new("."))
    }

    /// Returns the configured timeout, if any. A zero timeout counts as unset.
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout.filter(|timeout| !timeout.is_zero())
    }

    /// Returns the configured timeout or [`DEFAULT_TIMEOUT`].
    #[must_use]
    pub fn effective_timeout(&self) -> Duration {
        self.timeout().unwrap_or(DEFAULT_TIMEOUT)
    }

    /// Returns the `KEY=VALUE` entries appended to the inherited environment.
    #[must_use]
    pub fn environment(&self) -> &[String] {
        &self.environment
    }

    /// Uses `dir` when no working directory is configured.
    pub fn fill_working_dir(&mut self, dir: impl Into<PathBuf>) {
        if self.working_dir().is_none() {
            self.working_dir = Some(dir.into());
        }
    }

    /// Uses `timeout` when no timeout is configured.
    pub fn fill_timeout(&mut self, timeout: Duration) {
        if self.timeout().is_none() {
            self.timeout = Some(timeout);
        }
    }
}

/// Security policy applied to every tool call from a catalog.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize)]
pub struct SecurityPolicy {
    #[serde(default)]
    blocked_commands: BTreeSet<String>,
    #[serde(default)]
    allowed_paths: Vec<PathBuf>,
    #[serde(default = "default_max_output_size")]
    max_output_size: u64,
    #[serde(default)]
    disable_injection_check: bool,
}

fn default_max_output_size() -> u64 {
    DEFAULT_MAX_OUTPUT_SIZE
}

impl Default for SecurityPolicy {
    fn default() -> Self {
        Self {
            blocked_commands: BTreeSet::new(),
            allowed_paths: Vec::new(),
            max_output_size: DEFAULT_MAX_OUTPUT_SIZE,
            disable_injection_check: false,
        }
    }
}

impl SecurityPolicy {
    /// Creates a permissive policy with the default output cap.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds commands rejected by basename.
    #[must_use]
    pub fn with_blocked_commands<I, S>(mut self, commands: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.blocked_commands
            .extend(commands.into_iter().map(Into::into));
        self
    }

    /// Adds allowed path prefixes.
    #[must_use]
    pub fn with_allowed_paths<I, P>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.allowed_paths.extend(paths.into_iter().map(Into::into));
        self
    }

    /// Sets the output cap in bytes. Zero selects [`DEFAULT_MAX_OUTPUT_SIZE`].
    #[must_use]
    pub fn with_max_output_size(mut self, bytes: u64) -> Self {
        self.max_output_size = bytes;
        self
    }

    /// Disables injection and path checks for trusted catalogs.
    #[must_use]
    pub fn without_injection_check(mut self) -> Self {
        self.disable_injection_check = true;
        self
    }

    /// Returns the blocked command names.
    #[must_use]
    pub fn blocked_commands(&self) -> &BTreeSet<String> {
        &self.blocked_commands
    }

    /// Returns the allowed path prefixes. Empty means unrestricted.
    #[must_use]
    pub fn allowed_paths(&self) -> &[PathBuf] {
        &self.allowed_paths
    }

    /// Returns the effective output cap in bytes.
    #[must_use]
    pub const fn max_output_size(&self) -> u64 {
        if self.max_output_size == 0 {
            DEFAULT_MAX_OUTPUT_SIZE
        } else {
            self.max_output_size
        }
    }

    /// Returns `true` unless injection checking was disabled.
    #[must_use]
    pub const fn injection_check_enabled(&self) -> bool {
        !self.disable_injection_check
    }
}

/// One loaded tool definition set.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct Catalog {
    #[serde(default = "default_version")]
    version: String,
    #[serde(default)]
    metadata: CatalogMetadata,
    #[serde(default)]
    settings: CatalogSettings,
    #[serde(default)]
    security: SecurityPolicy,
    #[serde(default)]
    tools: Vec<ToolDefinition>,
}

fn default_version() -> String {
    "1.0".to_owned()
}

impl Catalog {
    /// Creates a catalog with no tools and a permissive policy.
    #[must_use]
    pub fn new(metadata: CatalogMetadata, settings: CatalogSettings) -> Self {
        Self {
            version: default_version(),
            metadata,
            settings,
            security: SecurityPolicy::default(),
            tools: Vec::new(),
        }
    }

    /// Replaces the security policy.
    #[must_use]
    pub fn with_security(mut self, security: SecurityPolicy) -> Self {
        self.security = security;
        self
    }

    /// Appends a tool in declaration order.
    #[must_use]
    pub fn with_tool(mut self, tool: ToolDefinition) -> Self {
        self.tools.push(tool);
        self
    }

    /// Returns the catalog schema version.
    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Returns the catalog identity.
    #[must_use]
    pub fn metadata(&self) -> &CatalogMetadata {
        &self.metadata
    }

    /// Returns the catalog name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.metadata.name()
    }

    /// Returns the shared process settings.
    #[must_use]
    pub fn settings(&self) -> &CatalogSettings {
        &self.settings
    }

    /// Returns mutable process settings for command-line overrides.
    pub fn settings_mut(&mut self) -> &mut CatalogSettings {
        &mut self.settings
    }

    /// Returns the security policy.
    #[must_use]
    pub fn security(&self) -> &SecurityPolicy {
        &self.security
    }

    /// Returns the tools in declaration order.
    #[must_use]
    pub fn tools(&self) -> &[ToolDefinition] {
        &self.tools
    }

    /// Returns the fully qualified name of one of this catalog's tools.
    #[must_use]
    pub fn qualified_name(&self, tool: &ToolDefinition) -> String {
        qualified_name(self.name(), tool.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ArgType, ConditionOp, OutputType};

    const GIT: &str = r#"
metadata:
  name: git
  description: Git wrapper
settings:
  command: git
  timeout: 45s
  environment:
    - GIT_PAGER=cat
security:
  blocked_commands: [rm]
  allowed_paths: [/tmp]
tools:
  - name: status
    description: Show status
    command: status
    arguments:
      - name: short
        type: boolean
        flag: --short
      - name: format
        flag: --format=
        when: "${short} != true"
    output:
      type: lines
"#;

    #[test]
    fn deserializes_catalog_with_defaults() {
        let catalog: Catalog = serde_yaml::from_str(GIT).unwrap();
        assert_eq!(catalog.version(), "1.0");
        assert_eq!(catalog.name(), "git");
        assert_eq!(catalog.settings().command(), "git");
        assert_eq!(catalog.settings().timeout(), Some(Duration::from_secs(45)));
        assert_eq!(catalog.settings().environment(), ["GIT_PAGER=cat"]);
        assert!(catalog.security().blocked_commands().contains("rm"));
        assert_eq!(catalog.security().max_output_size(), DEFAULT_MAX_OUTPUT_SIZE);
        assert!(catalog.security().injection_check_enabled());

        let tool = &catalog.tools()[0];
        assert_eq!(catalog.qualified_name(tool), "git_status");
        assert_eq!(tool.output().output_type(), OutputType::Lines);
        assert_eq!(tool.arguments()[0].arg_type(), ArgType::Boolean);
        assert_eq!(tool.arguments()[1].arg_type(), ArgType::String);
        let cond = tool.arguments()[1].condition().unwrap();
        assert_eq!(cond.op(), ConditionOp::Ne);
    }

    #[test]
    fn unknown_argument_type_is_rejected() {
        let yaml = "name: t\narguments:\n  - name: a\n    type: date\n";
        let err = serde_yaml::from_str::<ToolDefinition>(yaml).expect_err("date is not a type");
        assert!(err.to_string().contains("invalid argument type"));
    }

    #[test]
    fn dot_working_dir_means_current_directory() {
        let settings = CatalogSettings::new("ls").with_working_dir(".");
        assert!(settings.working_dir().is_none());
        assert_eq!(settings.effective_timeout(), DEFAULT_TIMEOUT);

        let mut settings = settings;
        settings.fill_working_dir("/srv");
        assert_eq!(settings.working_dir(), Some(Path::new("/srv")));
    }

    #[test]
    fn zero_timeout_uses_default() {
        for yaml in ["command: echo\ntimeout: 0\n", "command: echo\ntimeout: 0s\n"] {
            let settings: CatalogSettings = serde_yaml::from_str(yaml).unwrap();
            assert_eq!(settings.timeout(), None, "{yaml:?}");
            assert_eq!(settings.effective_timeout(), DEFAULT_TIMEOUT);

            let mut settings = settings;
            settings.fill_timeout(Duration::from_secs(5));
            assert_eq!(settings.effective_timeout(), Duration::from_secs(5));
        }
    }

    #[test]
    fn zero_output_cap_uses_default() {
        let policy = SecurityPolicy::new().with_max_output_size(0);
        assert_eq!(policy.max_output_size(), DEFAULT_MAX_OUTPUT_SIZE);
    }
}
