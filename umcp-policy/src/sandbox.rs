//! Sandbox validator for command token sequences.

use std::path::{Component, Path, PathBuf};

use thiserror::Error;
use tracing::debug;
use umcp_primitives::SecurityPolicy;

/// Substrings rejected by injection checking, in match order.
pub const INJECTION_PATTERNS: [&str; 14] = [
    "$(", "`", "&&", "||", ";", "|", ">", "<", ">>", "<<", "\n", "\r", "$IFS", "${IFS}",
];

/// Result alias for sandbox validation.
pub type SandboxResult<T> = Result<T, SandboxError>;

/// Reasons a command line was rejected.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SandboxError {
    /// No tokens were supplied.
    #[error("empty command")]
    EmptyCommand,

    /// The command binary is on the blocked list.
    #[error("command '{0}' is blocked")]
    Blocked(String),

    /// A token contained a shell metacharacter.
    #[error("potential injection detected: pattern '{pattern}' in argument '{token}'")]
    InjectionDetected {
        /// The matched pattern.
        pattern: &'static str,
        /// The offending token.
        token: String,
    },

    /// A path argument falls outside every allowed prefix.
    #[error("path '{0}' is not in allowed paths")]
    PathNotAllowed(String),
}

/// Validates command lines before execution.
pub trait CommandValidator: Send + Sync {
    /// Approves or rejects the supplied token sequence.
    ///
    /// # Errors
    ///
    /// Returns a [`SandboxError`] describing the first violated rule.
    fn validate(&self, tokens: &[String]) -> SandboxResult<()>;
}

/// Validator enforcing one catalog's [`SecurityPolicy`].
#[derive(Clone, Debug)]
pub struct Sandbox {
    policy: SecurityPolicy,
    base_dir: Option<PathBuf>,
}

impl Sandbox {
    /// Creates a sandbox that resolves relative paths against the current
    /// directory at validation time.
    #[must_use]
    pub fn new(policy: SecurityPolicy) -> Self {
        Self {
            policy,
            base_dir: None,
        }
    }

    /// Resolves relative paths against `dir` instead of the current directory.
    #[must_use]
    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(dir.into());
        self
    }

    /// Returns the enforced policy.
    #[must_use]
    pub fn policy(&self) -> &SecurityPolicy {
        &self.policy
    }

    fn absolute(&self, path: &Path) -> PathBuf {
        let base = self
            .base_dir
            .clone()
            .or_else(|| std::env::current_dir().ok());
        let joined = match base {
            Some(base) => base.join(path),
            None => path.to_path_buf(),
        };
        lexical_clean(&joined)
    }

    fn check_blocked(&self, command: &str) -> SandboxResult<()> {
        let name = Path::new(command)
            .file_name()
            .map_or_else(|| command.to_owned(), |name| name.to_string_lossy().into_owned());
        if self.policy.blocked_commands().contains(&name) {
            return Err(SandboxError::Blocked(name));
        }
        Ok(())
    }

    fn check_injection(tokens: &[String]) -> SandboxResult<()> {
        for token in tokens {
            if let Some(pattern) = INJECTION_PATTERNS.iter().copied().find(|p| token.contains(p)) {
                return Err(SandboxError::InjectionDetected {
                    pattern,
                    token: token.clone(),
                });
            }
        }
        Ok(())
    }

    // Plain string-prefix containment on lexically cleaned paths: an allowed
    // `/home/user` also admits `/home/user2`.
    fn check_paths(&self, tokens: &[String]) -> SandboxResult<()> {
        if self.policy.allowed_paths().is_empty() {
            return Ok(());
        }
        let allowed: Vec<String> = self
            .policy
            .allowed_paths()
            .iter()
            .map(|prefix| self.absolute(prefix).to_string_lossy().into_owned())
            .collect();

        for token in tokens.iter().skip(1).filter(|token| looks_like_path(token)) {
            let resolved = self.absolute(Path::new(token));
            let resolved = resolved.to_string_lossy();
            if !allowed.iter().any(|prefix| resolved.starts_with(prefix.as_str())) {
                return Err(SandboxError::PathNotAllowed(token.clone()));
            }
        }
        Ok(())
    }
}

impl CommandValidator for Sandbox {
    fn validate(&self, tokens: &[String]) -> SandboxResult<()> {
        let command = tokens.first().ok_or(SandboxError::EmptyCommand)?;
        self.check_blocked(command)?;

        if self.policy.injection_check_enabled() {
            Self::check_injection(tokens)?;
            self.check_paths(tokens)?;
        }

        debug!(command = %command, tokens = tokens.len(), "command approved");
        Ok(())
    }
}

/// Collapses `.` and `..` components and trailing separators. Symlinks are
/// not resolved.
fn lexical_clean(path: &Path) -> PathBuf {
    let mut clean = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match clean.components().next_back() {
                Some(Component::Normal(_)) => {
                    clean.pop();
                }
                Some(Component::RootDir | Component::Prefix(_)) => {}
                _ => clean.push(".."),
            },
            other => clean.push(other.as_os_str()),
        }
    }
    clean
}

fn looks_like_path(token: &str) -> bool {
    token.starts_with('/') || token.starts_with("./") || token.starts_with("../") || token.contains('/')
}
