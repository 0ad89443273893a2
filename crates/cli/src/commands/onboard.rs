//! `actloop onboard` — First-time setup.

use std::path::Path;

use actloop_config::AppConfig;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config_dir = AppConfig::config_dir();

    println!("actloop — First-Time Setup");
    println!("==========================\n");

    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)?;
        println!("✅ Created config directory: {}", config_dir.display());
    } else {
        println!("  Config directory exists: {}", config_dir.display());
    }

    let config_path = config_dir.join("config.toml");
    if write_default_config(&config_path)? {
        println!("✅ Created config.toml at: {}", config_path.display());
        println!("\n📝 Next steps:");
        println!("   1. Set ACTLOOP_API_KEY, or add api_key to {}", config_path.display());
        println!("   2. Optionally drop a .actloop.toml into a project to override settings there");
        println!("   3. Run: actloop agent\n");
    } else {
        println!("\n⚠️  Config already exists at: {}", config_path.display());
        println!("   Edit it manually or delete and re-run onboard.\n");
    }

    Ok(())
}

/// Write the default config unless a file is already there.
fn write_default_config(path: &Path) -> std::io::Result<bool> {
    if path.exists() {
        return Ok(false);
    }
    std::fs::write(path, AppConfig::default_toml())?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_round_trips_through_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        assert!(write_default_config(&path).unwrap());
        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.agent.max_passes, 2);
    }

    #[test]
    fn existing_config_is_left_alone() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "model = \"mine\"\n").unwrap();
        assert!(!write_default_config(&path).unwrap());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "model = \"mine\"\n");
    }
}
