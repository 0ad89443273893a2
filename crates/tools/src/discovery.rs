//! Lint/test entry-point discovery from project manifests.
//!
//! Lookup order: configured command, `package.json` scripts, `Cargo.toml`,
//! `Makefile` targets.

use std::path::PathBuf;

use actloop_core::{CheckKind, EntryPointDiscovery};
use tracing::debug;

/// The placeholder `npm init` writes for `scripts.test`.
const NPM_TEST_PLACEHOLDER: &str = "no test specified";

#[derive(Debug, Clone, Default)]
pub struct ProjectDiscovery {
    root: PathBuf,
    lint_command: Option<String>,
    test_command: Option<String>,
}

impl ProjectDiscovery {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    /// Commands that win over anything found on disk.
    pub fn with_overrides(mut self, lint: Option<String>, test: Option<String>) -> Self {
        self.lint_command = lint.filter(|c| !c.trim().is_empty());
        self.test_command = test.filter(|c| !c.trim().is_empty());
        self
    }

    fn from_package_json(&self, check: CheckKind) -> Option<String> {
        let text = std::fs::read_to_string(self.root.join("package.json")).ok()?;
        let manifest: serde_json::Value = serde_json::from_str(&text).ok()?;
        let script = manifest.get("scripts")?.get(check.as_str())?.as_str()?;
        if check == CheckKind::Test && script.contains(NPM_TEST_PLACEHOLDER) {
            return None;
        }
        Some(match check {
            CheckKind::Test => "npm test".into(),
            CheckKind::Lint => "npm run lint".into(),
        })
    }

    fn from_cargo(&self, check: CheckKind) -> Option<String> {
        if !self.root.join("Cargo.toml").is_file() {
            return None;
        }
        Some(match check {
            CheckKind::Lint => "cargo clippy --all-targets".into(),
            CheckKind::Test => "cargo test".into(),
        })
    }

    fn from_makefile(&self, check: CheckKind) -> Option<String> {
        let text = ["Makefile", "makefile", "GNUmakefile"]
            .iter()
            .find_map(|name| std::fs::read_to_string(self.root.join(name)).ok())?;
        makefile_has_target(&text, check.as_str()).then(|| format!("make {}", check.as_str()))
    }
}

fn makefile_has_target(text: &str, target: &str) -> bool {
    text.lines().any(|line| {
        !line.starts_with(['\t', ' ', '#'])
            && line
                .split_once(':')
                .is_some_and(|(names, rest)| {
                    !rest.starts_with('=') && names.split_whitespace().any(|n| n == target)
                })
    })
}

impl EntryPointDiscovery for ProjectDiscovery {
    fn discover(&self, check: CheckKind) -> Option<String> {
        let configured = match check {
            CheckKind::Lint => self.lint_command.clone(),
            CheckKind::Test => self.test_command.clone(),
        };
        let found = configured
            .or_else(|| self.from_package_json(check))
            .or_else(|| self.from_cargo(check))
            .or_else(|| self.from_makefile(check));
        debug!(
            check = %check,
            command = ?found,
            root = %self.root.display(),
            "Entry point discovery"
        );
        found
    }
}
