//! Configuration file management for wayplan.
//!
//! Provides a TOML-based config file at `~/.config/wayplan/config.toml` and a
//! resolution chain: CLI flag > env var > config file > default.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use wayplan_core::generation::GenerationConfig;
use wayplan_core::llm::LlmConfig;
use wayplan_db::config::DbConfig;

/// Provider credential.
pub const API_KEY_ENV: &str = "OPENROUTER_API_KEY";
/// Model identifier override.
pub const MODEL_ENV: &str = "WAYPLAN_MODEL";

// -----------------------------------------------------------------------
// Config file types
// -----------------------------------------------------------------------

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub database: DatabaseSection,
    #[serde(default)]
    pub llm: LlmSection,
    #[serde(default)]
    pub generation: GenerationSection,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DatabaseSection {
    pub url: String,
}

impl Default for DatabaseSection {
    fn default() -> Self {
        Self {
            url: DbConfig::DEFAULT_URL.to_owned(),
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct LlmSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct GenerationSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

// -----------------------------------------------------------------------
// Paths
// -----------------------------------------------------------------------

/// Return the wayplan config directory.
///
/// Always uses XDG layout: `$XDG_CONFIG_HOME/wayplan` or `~/.config/wayplan`,
/// also on macOS.
pub fn config_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("wayplan");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("wayplan")
}

/// Return the path to the wayplan config file.
pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

// -----------------------------------------------------------------------
// Read / write
// -----------------------------------------------------------------------

pub fn load_config_from(path: &Path) -> Result<ConfigFile> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file at {}", path.display()))?;
    toml::from_str(&contents)
        .with_context(|| format!("failed to parse config file at {}", path.display()))
}

/// Load the config file. `Ok(None)` when it does not exist.
pub fn load_config() -> Result<Option<ConfigFile>> {
    let path = config_path();
    if !path.exists() {
        return Ok(None);
    }
    load_config_from(&path).map(Some)
}

/// Serialize and write a config file, creating parent dirs as needed.
/// The file holds a credential, so it is made owner-only on Unix.
pub fn save_config_to(path: &Path, config: &ConfigFile) -> Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create config directory {}", dir.display()))?;
    }

    let contents = toml::to_string_pretty(config).context("failed to serialize config")?;
    std::fs::write(path, &contents)
        .with_context(|| format!("failed to write config file at {}", path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(path, perms)
            .with_context(|| format!("failed to set permissions on {}", path.display()))?;
    }

    Ok(())
}

pub fn save_config(config: &ConfigFile) -> Result<()> {
    save_config_to(&config_path(), config)
}

// -----------------------------------------------------------------------
// Resolved config
// -----------------------------------------------------------------------

fn env_nonempty(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

/// Fully resolved configuration, ready for use.
#[derive(Debug)]
pub struct WayplanConfig {
    pub db_config: DbConfig,
    pub llm: LlmConfig,
    pub generation: GenerationConfig,
}

impl WayplanConfig {
    /// Resolve configuration from the user's config file (if any).
    pub fn resolve(cli_db_url: Option<&str>) -> Result<Self> {
        let file = load_config()?;
        Ok(Self::resolve_with(cli_db_url, file.as_ref()))
    }

    /// Resolve using the chain: CLI flag > env var > config file > default.
    ///
    /// - DB URL: `cli_db_url` > `WAYPLAN_DATABASE_URL` > `[database].url` > `DbConfig::DEFAULT_URL`
    /// - API key: `OPENROUTER_API_KEY` > `[llm].api_key` > none (generation disabled)
    /// - Model: `WAYPLAN_MODEL` > `[llm].model` > `LlmConfig::DEFAULT_MODEL`
    pub fn resolve_with(cli_db_url: Option<&str>, file: Option<&ConfigFile>) -> Self {
        let db_url = cli_db_url
            .map(str::to_owned)
            .or_else(|| env_nonempty(DbConfig::ENV_VAR))
            .or_else(|| file.map(|f| f.database.url.clone()))
            .unwrap_or_else(|| DbConfig::DEFAULT_URL.to_owned());

        let llm_file = file.map(|f| &f.llm);
        let api_key = env_nonempty(API_KEY_ENV)
            .or_else(|| llm_file.and_then(|l| l.api_key.clone()))
            .filter(|k| !k.trim().is_empty());
        let model = env_nonempty(MODEL_ENV)
            .or_else(|| llm_file.and_then(|l| l.model.clone()))
            .unwrap_or_else(|| LlmConfig::DEFAULT_MODEL.to_owned());
        let base_url = llm_file
            .and_then(|l| l.base_url.clone())
            .unwrap_or_else(|| LlmConfig::DEFAULT_BASE_URL.to_owned());
        let timeout = llm_file
            .and_then(|l| l.timeout_secs)
            .map(Duration::from_secs)
            .unwrap_or(LlmConfig::DEFAULT_TIMEOUT);

        let language = file
            .and_then(|f| f.generation.language.clone())
            .unwrap_or_else(|| GenerationConfig::DEFAULT_LANGUAGE.to_owned());

        Self {
            db_config: DbConfig::new(db_url),
            generation: GenerationConfig {
                model: model.clone(),
                language,
                // The client enforces `timeout`; this is the outer bound.
                call_timeout: timeout + Duration::from_secs(5),
            },
            llm: LlmConfig {
                api_key,
                base_url,
                model,
                timeout,
            },
        }
    }
}

// -----------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn lock_env() -> std::sync::MutexGuard<'static, ()> {
        crate::test_util::lock_env()
    }

    fn clear_env() {
        unsafe { std::env::remove_var(DbConfig::ENV_VAR) };
        unsafe { std::env::remove_var(API_KEY_ENV) };
        unsafe { std::env::remove_var(MODEL_ENV) };
    }

    fn file_config() -> ConfigFile {
        ConfigFile {
            database: DatabaseSection {
                url: "postgresql://filehost:5432/filedb".to_owned(),
            },
            llm: LlmSection {
                api_key: Some("file-key".to_owned()),
                model: Some("anthropic/claude-3.5-haiku".to_owned()),
                base_url: Some("http://localhost:8080/v1".to_owned()),
                timeout_secs: Some(20),
            },
            generation: GenerationSection {
                language: Some("German".to_owned()),
            },
        }
    }

    #[test]
    fn save_and_load_roundtrip_with_owner_only_permissions() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("wayplan").join("config.toml");

        save_config_to(&path, &file_config()).unwrap();
        let loaded = load_config_from(&path).unwrap();
        assert_eq!(loaded.database.url, "postgresql://filehost:5432/filedb");
        assert_eq!(loaded.llm.api_key.as_deref(), Some("file-key"));
        assert_eq!(loaded.generation.language.as_deref(), Some("German"));

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let meta = std::fs::metadata(&path).unwrap();
            assert_eq!(meta.permissions().mode() & 0o777, 0o600);
        }
    }

    #[test]
    fn partial_file_uses_defaults() {
        let parsed: ConfigFile = toml::from_str("[llm]\nmodel = \"x/y\"\n").unwrap();
        assert_eq!(parsed.database.url, DbConfig::DEFAULT_URL);
        assert_eq!(parsed.llm.model.as_deref(), Some("x/y"));
        assert!(parsed.llm.api_key.is_none());
    }

    #[test]
    fn file_values_apply_when_env_is_clear() {
        let _lock = lock_env();
        clear_env();

        let config = WayplanConfig::resolve_with(None, Some(&file_config()));
        assert_eq!(config.db_config.database_url, "postgresql://filehost:5432/filedb");
        assert_eq!(config.llm.api_key.as_deref(), Some("file-key"));
        assert_eq!(config.llm.model, "anthropic/claude-3.5-haiku");
        assert_eq!(config.generation.model, "anthropic/claude-3.5-haiku");
        assert_eq!(config.llm.timeout, Duration::from_secs(20));
        assert_eq!(config.generation.language, "German");
    }

    #[test]
    fn env_overrides_file_and_cli_overrides_env() {
        let _lock = lock_env();
        clear_env();
        unsafe { std::env::set_var(DbConfig::ENV_VAR, "postgresql://env:5432/envdb") };
        unsafe { std::env::set_var(API_KEY_ENV, "env-key") };
        unsafe { std::env::set_var(MODEL_ENV, "openai/gpt-4o") };

        let config = WayplanConfig::resolve_with(None, Some(&file_config()));
        assert_eq!(config.db_config.database_url, "postgresql://env:5432/envdb");
        assert_eq!(config.llm.api_key.as_deref(), Some("env-key"));
        assert_eq!(config.llm.model, "openai/gpt-4o");

        let config =
            WayplanConfig::resolve_with(Some("postgresql://cli:5432/clidb"), Some(&file_config()));
        assert_eq!(config.db_config.database_url, "postgresql://cli:5432/clidb");

        clear_env();
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let _lock = lock_env();
        clear_env();

        let config = WayplanConfig::resolve_with(None, None);
        assert_eq!(config.db_config.database_url, DbConfig::DEFAULT_URL);
        assert!(!config.llm.has_credentials());
        assert_eq!(config.llm.base_url, LlmConfig::DEFAULT_BASE_URL);
        assert_eq!(config.llm.timeout, LlmConfig::DEFAULT_TIMEOUT);
        assert_eq!(config.generation.language, "English");
    }

    #[test]
    fn config_path_ends_with_expected_filename() {
        let path = config_path();
        assert!(
            path.ends_with("wayplan/config.toml"),
            "unexpected config path: {}",
            path.display()
        );
    }
}
