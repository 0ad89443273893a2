//! Verification entry-point discovery.
//!
//! The core never names a lint or test tool itself; it asks a discovery
//! collaborator for a command string.

/// A post-edit check the verification runner can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CheckKind {
    Lint,
    Test,
}

impl CheckKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Lint => "lint",
            Self::Test => "test",
        }
    }
}

impl std::fmt::Display for CheckKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Answers "is there a lint/test entry point here?".
pub trait EntryPointDiscovery: Send + Sync {
    /// A shell command to run for `check`, or `None` when the workspace has none.
    fn discover(&self, check: CheckKind) -> Option<String>;
}
