//! Configuration Loader
//!
//! Handles loading and merging configuration from multiple sources with proper precedence.

use crate::global::GlobalConfig;
use crate::project::{AuditConfig, ProjectConfig, RegistryConfig, StoreConfig, PROJECT_CONFIG_FILE};
use crate::values::{
    validate_audit_backend, validate_lookup, validate_permission, validate_sentinel_key,
    DEFAULT_AUDIT_BACKEND, DEFAULT_LOOKUP, DEFAULT_POLICY, DEFAULT_SENTINEL_KEY,
};
use crate::ConfigResult;
use std::env;
use std::path::{Path, PathBuf};

/// Configuration loader
///
/// Loads configuration from multiple sources and merges them with proper precedence:
/// 1. Global config (~/.warden/config.toml) - lowest priority
/// 2. Project config (./warden.toml) - overrides global
/// 3. Environment variables (WARDEN_*) - highest priority
pub struct ConfigLoader {
    /// Cached global config path
    global_config_path: Option<PathBuf>,
}

/// Merged configuration result
#[derive(Debug, Clone)]
pub struct Config {
    /// Project configuration
    pub project: ProjectConfig,

    /// Global configuration
    pub global: GlobalConfig,

    /// Project root directory (where warden.toml was found)
    pub project_root: Option<PathBuf>,
}

impl ConfigLoader {
    /// Create a new configuration loader
    pub fn new() -> Self {
        Self {
            global_config_path: None,
        }
    }

    /// Use an explicit global config file instead of ~/.warden/config.toml
    pub fn with_global_config_path(path: impl Into<PathBuf>) -> Self {
        Self {
            global_config_path: Some(path.into()),
        }
    }

    /// Load configuration starting from the given directory
    ///
    /// Walks up the directory tree to find warden.toml, then loads and merges
    /// global config if it exists.
    pub fn load_from_directory(&mut self, start_dir: &Path) -> ConfigResult<Config> {
        let (project_root, project_config) = self.find_project_config(start_dir)?;

        let global_config = self.load_global_config().unwrap_or_default();

        let project_config = self.apply_env_overrides(project_config)?;

        Ok(Config {
            project: project_config,
            global: global_config,
            project_root,
        })
    }

    /// Load configuration from a specific project config file
    pub fn load_from_file(&mut self, config_path: &Path) -> ConfigResult<Config> {
        let project_config = ProjectConfig::load_from_file(config_path)?;
        let global_config = self.load_global_config().unwrap_or_default();
        let project_config = self.apply_env_overrides(project_config)?;

        let project_root = config_path.parent().map(|p| p.to_path_buf());

        Ok(Config {
            project: project_config,
            global: global_config,
            project_root,
        })
    }

    /// Find project configuration by walking up directory tree
    ///
    /// Returns (project_root, project_config); a missing file yields the default config
    fn find_project_config(
        &self,
        start_dir: &Path,
    ) -> ConfigResult<(Option<PathBuf>, ProjectConfig)> {
        let mut current = start_dir.to_path_buf();

        loop {
            let config_path = current.join(PROJECT_CONFIG_FILE);

            if config_path.exists() {
                let project_config = ProjectConfig::load_from_file(&config_path)?;
                return Ok((Some(current), project_config));
            }

            match current.parent() {
                Some(parent) => current = parent.to_path_buf(),
                None => return Ok((None, ProjectConfig::default())),
            }
        }
    }

    /// Load global configuration from ~/.warden/config.toml
    fn load_global_config(&mut self) -> ConfigResult<GlobalConfig> {
        let path = match &self.global_config_path {
            Some(path) => path.clone(),
            None => {
                let path = GlobalConfig::global_config_path()?;
                self.global_config_path = Some(path.clone());
                path
            }
        };

        // Global config is optional - if it doesn't exist, return default
        if !path.exists() {
            return Ok(GlobalConfig::default());
        }

        GlobalConfig::load_from_file(&path)
    }

    /// Apply environment variable overrides to project config
    ///
    /// Recognized variables: WARDEN_DEFAULT_POLICY, WARDEN_SENTINEL_KEY,
    /// WARDEN_LOOKUP, WARDEN_AUDIT
    fn apply_env_overrides(&self, mut config: ProjectConfig) -> ConfigResult<ProjectConfig> {
        if let Ok(policy) = env::var("WARDEN_DEFAULT_POLICY") {
            validate_permission("WARDEN_DEFAULT_POLICY", &policy)?;
            config
                .store
                .get_or_insert_with(StoreConfig::default)
                .default_policy = Some(policy);
        }

        if let Ok(sentinel) = env::var("WARDEN_SENTINEL_KEY") {
            validate_sentinel_key("WARDEN_SENTINEL_KEY", &sentinel)?;
            config
                .store
                .get_or_insert_with(StoreConfig::default)
                .sentinel_key = Some(sentinel);
        }

        if let Ok(lookup) = env::var("WARDEN_LOOKUP") {
            validate_lookup("WARDEN_LOOKUP", &lookup)?;
            config
                .registry
                .get_or_insert_with(RegistryConfig::default)
                .lookup = Some(lookup);
        }

        if let Ok(backend) = env::var("WARDEN_AUDIT") {
            validate_audit_backend("WARDEN_AUDIT", &backend)?;
            config.audit.get_or_insert_with(AuditConfig::default).backend = Some(backend);
        }

        Ok(config)
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            project: ProjectConfig::default(),
            global: GlobalConfig::default(),
            project_root: None,
        }
    }
}

impl Config {
    /// Get the effective default policy (project > global > built-in)
    pub fn default_policy(&self) -> &str {
        self.project
            .default_policy()
            .or_else(|| self.global.default_policy())
            .unwrap_or(DEFAULT_POLICY)
    }

    /// Get the effective sentinel key (project > global > built-in)
    pub fn sentinel_key(&self) -> &str {
        self.project
            .sentinel_key()
            .or_else(|| self.global.sentinel_key())
            .unwrap_or(DEFAULT_SENTINEL_KEY)
    }

    /// Get the effective registry lookup mode (project > global > built-in)
    pub fn lookup(&self) -> &str {
        self.project
            .lookup()
            .or_else(|| self.global.lookup())
            .unwrap_or(DEFAULT_LOOKUP)
    }

    /// Get the effective audit backend (project > global > built-in)
    pub fn audit_backend(&self) -> &str {
        self.project
            .audit_backend()
            .or_else(|| self.global.audit_backend())
            .unwrap_or(DEFAULT_AUDIT_BACKEND)
    }

    /// Policy documents, resolved against the project root
    pub fn policy_files(&self) -> Vec<PathBuf> {
        self.project
            .policies()
            .iter()
            .map(|path| match &self.project_root {
                Some(root) if path.is_relative() => root.join(path),
                _ => path.clone(),
            })
            .collect()
    }

    /// Get the project root directory
    pub fn project_root(&self) -> Option<&Path> {
        self.project_root.as_deref()
    }

    /// Check if this is a project (has warden.toml)
    pub fn is_project(&self) -> bool {
        self.project_root.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serial_test::serial;
    use std::fs;
    use tempfile::TempDir;

    fn create_config_file(dir: &Path, content: &str) -> PathBuf {
        let config_path = dir.join(PROJECT_CONFIG_FILE);
        fs::write(&config_path, content).unwrap();
        config_path
    }

    fn isolated_loader(dir: &TempDir) -> ConfigLoader {
        ConfigLoader::with_global_config_path(dir.path().join("no-global.toml"))
    }

    #[test]
    #[serial]
    fn test_load_project_config() {
        let temp_dir = TempDir::new().unwrap();
        create_config_file(
            temp_dir.path(),
            r#"
[store]
default_policy = "none"
"#,
        );

        let mut loader = isolated_loader(&temp_dir);
        let config = loader.load_from_directory(temp_dir.path()).unwrap();

        assert_eq!(config.default_policy(), "none");
        assert!(config.is_project());
    }

    #[test]
    #[serial]
    fn test_find_config_in_parent() {
        let temp_dir = TempDir::new().unwrap();
        create_config_file(
            temp_dir.path(),
            r#"
[registry]
lookup = "nearest-entry"
"#,
        );

        let sub_dir = temp_dir.path().join("subdir");
        fs::create_dir(&sub_dir).unwrap();

        let mut loader = isolated_loader(&temp_dir);
        let config = loader.load_from_directory(&sub_dir).unwrap();

        assert_eq!(config.lookup(), "nearest-entry");
        assert_eq!(config.project_root(), Some(temp_dir.path()));
    }

    #[test]
    #[serial]
    fn test_no_project_config_uses_builtin_defaults() {
        let temp_dir = TempDir::new().unwrap();

        let mut loader = isolated_loader(&temp_dir);
        let config = loader.load_from_directory(temp_dir.path()).unwrap();

        assert!(!config.is_project());
        assert_eq!(config.default_policy(), "read-write");
        assert_eq!(config.sentinel_key(), "store");
        assert_eq!(config.lookup(), "per-field");
        assert_eq!(config.audit_backend(), "none");
    }

    #[test]
    #[serial]
    fn test_global_config_fills_gaps() {
        let temp_dir = TempDir::new().unwrap();
        let global_path = temp_dir.path().join("global.toml");
        fs::write(
            &global_path,
            r#"
[defaults]
default_policy = "read-only"
sentinel_key = "child"
"#,
        )
        .unwrap();
        create_config_file(
            temp_dir.path(),
            r#"
[store]
default_policy = "none"
"#,
        );

        let mut loader = ConfigLoader::with_global_config_path(global_path);
        let config = loader.load_from_directory(temp_dir.path()).unwrap();

        assert_eq!(config.default_policy(), "none");
        assert_eq!(config.sentinel_key(), "child");
    }

    #[test]
    #[serial]
    fn test_env_override_default_policy() {
        let temp_dir = TempDir::new().unwrap();
        create_config_file(
            temp_dir.path(),
            r#"
[store]
default_policy = "read-write"
"#,
        );

        env::set_var("WARDEN_DEFAULT_POLICY", "write-only");

        let mut loader = isolated_loader(&temp_dir);
        let config = loader.load_from_directory(temp_dir.path()).unwrap();

        env::remove_var("WARDEN_DEFAULT_POLICY");

        assert_eq!(config.default_policy(), "write-only");
    }

    #[test]
    #[serial]
    fn test_env_override_lookup_and_audit() {
        let temp_dir = TempDir::new().unwrap();

        env::set_var("WARDEN_LOOKUP", "nearest-entry");
        env::set_var("WARDEN_AUDIT", "log");

        let mut loader = isolated_loader(&temp_dir);
        let config = loader.load_from_directory(temp_dir.path()).unwrap();

        env::remove_var("WARDEN_LOOKUP");
        env::remove_var("WARDEN_AUDIT");

        assert_eq!(config.lookup(), "nearest-entry");
        assert_eq!(config.audit_backend(), "log");
    }

    #[test]
    #[serial]
    fn test_invalid_env_override_rejected() {
        let temp_dir = TempDir::new().unwrap();

        env::set_var("WARDEN_SENTINEL_KEY", "a:b");

        let mut loader = isolated_loader(&temp_dir);
        let result = loader.load_from_directory(temp_dir.path());

        env::remove_var("WARDEN_SENTINEL_KEY");

        assert!(result.is_err());
    }

    #[test]
    #[serial]
    fn test_policy_files_resolved_against_root() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = create_config_file(
            temp_dir.path(),
            r#"
[registry]
policies = ["policies/admin.toml", "/etc/warden/base.toml"]
"#,
        );

        let mut loader = isolated_loader(&temp_dir);
        let config = loader.load_from_file(&config_path).unwrap();

        assert_eq!(
            config.policy_files(),
            vec![
                temp_dir.path().join("policies/admin.toml"),
                PathBuf::from("/etc/warden/base.toml"),
            ]
        );
    }
}
