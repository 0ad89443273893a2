//! `actloop config` — Configuration management commands.

use actloop_config::{AppConfig, DISABLE_APPROVAL_ENV, VerifyMode};

pub async fn validate() -> Result<(), Box<dyn std::error::Error>> {
    println!("🔍 Validating configuration...");

    match AppConfig::load() {
        Ok(config) => {
            println!("   ✅ Config parsed successfully");

            let warnings = warnings(&config);
            if warnings.is_empty() {
                println!("   ✅ All checks passed");
            } else {
                println!();
                for w in &warnings {
                    println!("   ⚠️  {w}");
                }
            }

            println!();
            println!("   Endpoint:  {}", config.base_url);
            println!("   Model:     {}", config.model);
            println!("   Approval:  {}", config.agent.approval_level);
            println!("   Verify:    {}", config.agent.verify_mode);
            println!("   Passes:    {}", config.agent.max_passes);
            println!(
                "   Workspace: {}",
                config.tools.resolved_workspace_root().display()
            );
        }
        Err(e) => {
            println!("   ❌ Config error: {e}");
            return Err(e.into());
        }
    }

    Ok(())
}

/// Problems that do not stop loading but will bite at runtime.
fn warnings(config: &AppConfig) -> Vec<String> {
    let mut warnings = Vec::new();
    if config.api_key.is_none() && config.base_url.contains("api.openai.com") {
        warnings.push("No API key set (set ACTLOOP_API_KEY or OPENAI_API_KEY)".to_string());
    }
    if config.agent.disable_approval {
        warnings.push(format!(
            "{DISABLE_APPROVAL_ENV} is set: actions run without confirmation"
        ));
    }
    if config.agent.verify_mode != VerifyMode::None && config.verify.timeout_secs < 10 {
        warnings.push(format!(
            "verify.timeout_secs = {} is very short for lint/test runs",
            config.verify.timeout_secs
        ));
    }
    if let Some(root) = &config.tools.workspace_root
        && !root.is_dir()
    {
        warnings.push(format!(
            "tools.workspace_root {} is not a directory",
            root.display()
        ));
    }
    warnings
}

pub async fn show() -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    config.api_key = None;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

pub async fn path() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = AppConfig::config_dir().join("config.toml");
    println!("{}", config_path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_path_is_valid() {
        let path = AppConfig::config_dir().join("config.toml");
        assert!(path.to_str().unwrap().contains("config.toml"));
    }

    #[test]
    fn missing_key_warns_only_for_hosted_endpoint() {
        let mut config = AppConfig::default();
        assert_eq!(warnings(&config).len(), 1);
        config.base_url = "http://localhost:11434/v1".into();
        assert!(warnings(&config).is_empty());
    }

    #[test]
    fn override_is_reported() {
        let mut config = AppConfig::default();
        config.api_key = Some("k".into());
        config.agent.disable_approval = true;
        let w = warnings(&config);
        assert_eq!(w.len(), 1);
        assert!(w[0].contains(DISABLE_APPROVAL_ENV));
    }
}
