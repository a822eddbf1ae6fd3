//! Configuration management with layered loading
//!
//! Precedence (lowest to highest):
//! 1. Compiled defaults
//! 2. Global config: `$XDG_CONFIG_HOME/autowire/autowire.toml`
//! 3. Project config: `<project_dir>/autowire.toml`
//! 4. Environment variables: `AUTOWIRE_*` prefix
//!
//! A project without an `[autoload.psr-4]` table falls back to the
//! `autoload.psr-4` section of its `composer.json`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use config::{Config, ConfigError, Environment};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::application::ApplicationError;
use crate::domain::{expand_env_vars, ManualOverrideMap, NamespaceMapping};

/// Project config file name.
pub const CONFIG_FILE_NAME: &str = "autowire.toml";

/// Composer manifest consulted for the PSR-4 mapping.
pub const COMPOSER_FILE_NAME: &str = "composer.json";

/// One directory or a list of them, as composer allows both.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum Directories {
    One(String),
    Many(Vec<String>),
}

impl Directories {
    pub fn as_vec(&self) -> Vec<&str> {
        match self {
            Directories::One(dir) => vec![dir.as_str()],
            Directories::Many(dirs) => dirs.iter().map(String::as_str).collect(),
        }
    }
}

/// `[autoload]` section: namespace prefix to directories.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AutoloadConfig {
    #[serde(rename = "psr-4")]
    pub psr4: BTreeMap<String, Directories>,
}

impl AutoloadConfig {
    pub fn is_empty(&self) -> bool {
        self.psr4.is_empty()
    }
}

/// Raw settings for intermediate parsing (`None` means "not specified").
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawSettings {
    pub environment: Option<String>,
    pub root_namespace: Option<String>,
    pub cache_dir: Option<PathBuf>,
    pub autoload: Option<AutoloadConfig>,
    pub overrides: Option<ManualOverrideMap>,
}

#[derive(Debug, Clone, Deserialize, Default)]
struct ComposerManifest {
    #[serde(default)]
    autoload: AutoloadConfig,
}

/// Unified configuration for autowire.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// Project root; relative paths resolve against it
    #[serde(skip)]
    pub project_dir: PathBuf,
    /// Environment tag; `development` never uses the compiled container
    pub environment: String,
    /// Only classes under this namespace are roots (empty: all)
    pub root_namespace: String,
    /// Where compiled containers are stored
    pub cache_dir: PathBuf,
    pub autoload: AutoloadConfig,
    /// Manual constructor arguments, per class
    pub overrides: ManualOverrideMap,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            project_dir: PathBuf::from("."),
            environment: "production".to_string(),
            root_namespace: String::new(),
            cache_dir: PathBuf::from(".cache/autowire"),
            autoload: AutoloadConfig::default(),
            overrides: ManualOverrideMap::new(),
        }
    }
}

/// Get the XDG config directory for autowire.
pub fn global_config_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "autowire").map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the global config file.
pub fn global_config_path() -> Option<PathBuf> {
    global_config_dir().map(|dir| dir.join(CONFIG_FILE_NAME))
}

/// Get the path to the project config file.
pub fn project_config_path(project_dir: &Path) -> PathBuf {
    project_dir.join(CONFIG_FILE_NAME)
}

/// Load a TOML file into RawSettings for manual merging.
fn load_raw_settings(path: &Path) -> Result<RawSettings, ApplicationError> {
    let content = std::fs::read_to_string(path).map_err(|e| ApplicationError::Config {
        message: format!("read {}: {}", path.display(), e),
    })?;
    toml::from_str(&content).map_err(|e| ApplicationError::Config {
        message: format!("parse {}: {}", path.display(), e),
    })
}

/// Read the PSR-4 mapping from a composer manifest, if there is one.
fn load_composer_autoload(project_dir: &Path) -> Result<Option<AutoloadConfig>, ApplicationError> {
    let path = project_dir.join(COMPOSER_FILE_NAME);
    if !path.is_file() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(&path).map_err(|e| ApplicationError::Config {
        message: format!("read {}: {}", path.display(), e),
    })?;
    let manifest: ComposerManifest =
        serde_json::from_str(&content).map_err(|e| ApplicationError::Config {
            message: format!("parse {}: {}", path.display(), e),
        })?;
    debug!(
        "load_composer_autoload: {} prefixes from {}",
        manifest.autoload.psr4.len(),
        path.display()
    );
    Ok(Some(manifest.autoload))
}

impl Settings {
    /// Absolute-ish location of the compiled container cache.
    pub fn cache_path(&self) -> PathBuf {
        self.resolve_path(&self.cache_dir)
    }

    /// Namespace mappings with directories resolved against the project.
    pub fn autoload_mappings(&self) -> Vec<NamespaceMapping> {
        self.autoload
            .psr4
            .iter()
            .map(|(prefix, dirs)| {
                let directories = dirs
                    .as_vec()
                    .into_iter()
                    .map(|d| self.resolve_path(Path::new(&expand_env_vars(d))))
                    .collect();
                NamespaceMapping::new(prefix, directories)
            })
            .collect()
    }

    fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.project_dir.join(path)
        }
    }

    /// Expand shell variables and tilde in path-like fields.
    fn expand_paths(&mut self) {
        let expanded = expand_env_vars(self.cache_dir.to_string_lossy().as_ref());
        self.cache_dir = PathBuf::from(expanded);
    }

    /// Project config onto self: scalars and the mapping replace, overrides merge per class.
    fn merge_with(&self, overlay: &RawSettings) -> Self {
        let mut overrides = self.overrides.clone();
        if let Some(o) = &overlay.overrides {
            overrides.extend(o);
        }
        Self {
            project_dir: self.project_dir.clone(),
            environment: overlay
                .environment
                .clone()
                .unwrap_or_else(|| self.environment.clone()),
            root_namespace: overlay
                .root_namespace
                .clone()
                .unwrap_or_else(|| self.root_namespace.clone()),
            cache_dir: overlay
                .cache_dir
                .clone()
                .unwrap_or_else(|| self.cache_dir.clone()),
            autoload: overlay
                .autoload
                .clone()
                .unwrap_or_else(|| self.autoload.clone()),
            overrides,
        }
    }

    /// Global config onto defaults: every specified value replaces.
    fn apply_global(&self, global: &RawSettings) -> Self {
        Self {
            project_dir: self.project_dir.clone(),
            environment: global
                .environment
                .clone()
                .unwrap_or_else(|| self.environment.clone()),
            root_namespace: global
                .root_namespace
                .clone()
                .unwrap_or_else(|| self.root_namespace.clone()),
            cache_dir: global
                .cache_dir
                .clone()
                .unwrap_or_else(|| self.cache_dir.clone()),
            autoload: global
                .autoload
                .clone()
                .unwrap_or_else(|| self.autoload.clone()),
            overrides: global
                .overrides
                .clone()
                .unwrap_or_else(|| self.overrides.clone()),
        }
    }

    /// Load settings with layered precedence.
    ///
    /// # Arguments
    /// * `project_dir` - Project root (default: current directory)
    ///
    /// # Precedence (lowest to highest)
    /// 1. Compiled defaults
    /// 2. Global config: `$XDG_CONFIG_HOME/autowire/autowire.toml`
    /// 3. Project config: `<project_dir>/autowire.toml`
    /// 4. Environment variables: `AUTOWIRE_*` prefix
    pub fn load(project_dir: Option<&Path>) -> Result<Self, ApplicationError> {
        // 1. Start with defaults
        let mut current = Self {
            project_dir: project_dir
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from(".")),
            ..Self::default()
        };

        // 2. Global config
        if let Some(global_path) = global_config_path() {
            if global_path.exists() {
                debug!("load: global config {}", global_path.display());
                let raw = load_raw_settings(&global_path)?;
                current = current.apply_global(&raw);
            }
        }

        // 3. Project config
        let local_path = project_config_path(&current.project_dir);
        if local_path.exists() {
            debug!("load: project config {}", local_path.display());
            let raw = load_raw_settings(&local_path)?;
            current = current.merge_with(&raw);
        }

        // 4. Environment variables
        current = Self::apply_env_overrides(current, None)?;

        if current.autoload.is_empty() {
            if let Some(autoload) = load_composer_autoload(&current.project_dir)? {
                current.autoload = autoload;
            }
        }

        current.expand_paths();
        Ok(current)
    }

    /// Apply AUTOWIRE_* environment variables as explicit overrides.
    ///
    /// `source` replaces the process environment (used by tests).
    pub fn apply_env_overrides(
        mut settings: Self,
        source: Option<config::Map<String, String>>,
    ) -> Result<Self, ApplicationError> {
        let builder = Config::builder().add_source(
            Environment::with_prefix("AUTOWIRE")
                .prefix_separator("_")
                .separator("__")
                .source(source),
        );

        let config = builder.build().map_err(config_err)?;

        if let Ok(val) = config.get_string("environment") {
            settings.environment = val;
        }
        if let Ok(val) = config.get_string("root_namespace") {
            settings.root_namespace = val;
        }
        if let Ok(val) = config.get_string("cache_dir") {
            settings.cache_dir = PathBuf::from(val);
        }

        Ok(settings)
    }

    /// Show the effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String, ApplicationError> {
        toml::to_string_pretty(self).map_err(|e| ApplicationError::Config {
            message: format!("serialize config: {e}"),
        })
    }

    /// Generate a template config file.
    pub fn template() -> String {
        r#"# autowire configuration
#
# Locations (by precedence, lowest to highest):
#   Global:  ~/.config/autowire/autowire.toml
#   Project: <project_dir>/autowire.toml
#   Env:     AUTOWIRE_ENVIRONMENT, AUTOWIRE_ROOT_NAMESPACE, AUTOWIRE_CACHE_DIR

# Environment tag. "development" always rebuilds the dependency plan;
# any other value reuses the compiled container for that tag.
# environment = "production"

# Only classes under this namespace are booted (empty: everything mapped)
# root_namespace = "App"

# Compiled containers, relative to the project directory
# cache_dir = ".cache/autowire"

# Namespace prefix -> directories. Without this table the mapping
# is read from composer.json.
[autoload.psr-4]
# "App\\" = "src/"
# "App\\Tests\\" = ["tests/unit", "tests/integration"]

# Constructor arguments autowiring cannot supply, by position or by name.
# A string naming a discovered class is wired as that class.
[overrides]
# "App\\Mailer" = ["smtp.example.com", 25]
# "App\\Cache" = { ttl = 3600, store = "App\\RedisStore" }
"#
        .to_string()
    }
}

fn config_err(e: ConfigError) -> ApplicationError {
    ApplicationError::Config {
        message: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Literal;

    #[test]
    fn given_no_config_when_loading_defaults_then_production_environment() {
        let settings = Settings::default();
        assert_eq!(settings.environment, "production");
        assert_eq!(settings.cache_dir, PathBuf::from(".cache/autowire"));
        assert!(settings.autoload.is_empty());
        assert!(settings.overrides.is_empty());
    }

    #[test]
    fn given_env_source_when_applying_overrides_then_replaces_scalars() {
        let source = config::Map::from([
            ("AUTOWIRE_ENVIRONMENT".to_string(), "staging".to_string()),
            ("AUTOWIRE_ROOT_NAMESPACE".to_string(), "Shop".to_string()),
            ("OTHER_VAR".to_string(), "ignored".to_string()),
        ]);
        let settings = Settings::apply_env_overrides(Settings::default(), Some(source))
            .expect("apply env");
        assert_eq!(settings.environment, "staging");
        assert_eq!(settings.root_namespace, "Shop");
        assert_eq!(settings.cache_dir, PathBuf::from(".cache/autowire"));
    }

    #[test]
    fn given_global_and_project_overrides_when_merging_then_project_wins_per_class() {
        let global: RawSettings = toml::from_str(
            r#"
environment = "staging"
[overrides]
"App\\Mailer" = ["global.smtp"]
"App\\Cache" = { ttl = 10 }
"#,
        )
        .unwrap();
        let project: RawSettings = toml::from_str(
            r#"
[overrides]
"App\\Mailer" = ["project.smtp"]
"#,
        )
        .unwrap();

        let settings = Settings::default().apply_global(&global).merge_with(&project);

        assert_eq!(settings.environment, "staging");
        assert_eq!(settings.overrides.len(), 2);
        assert_eq!(
            settings.overrides.lookup("App\\Mailer", 0, "host"),
            Some(&Literal::Str("project.smtp".into()))
        );
        assert_eq!(
            settings.overrides.lookup("App\\Cache", 0, "ttl"),
            Some(&Literal::Int(10))
        );
    }

    #[test]
    fn given_relative_directories_when_building_mappings_then_resolves_against_project() {
        let mut settings = Settings {
            project_dir: PathBuf::from("/work/shop"),
            ..Settings::default()
        };
        settings.autoload.psr4.insert(
            "Shop\\".into(),
            Directories::Many(vec!["src".into(), "/abs/lib".into()]),
        );

        let mappings = settings.autoload_mappings();
        assert_eq!(mappings.len(), 1);
        assert_eq!(mappings[0].prefix, "Shop\\");
        assert_eq!(
            mappings[0].directories,
            vec![PathBuf::from("/work/shop/src"), PathBuf::from("/abs/lib")]
        );
        assert_eq!(settings.cache_path(), PathBuf::from("/work/shop/.cache/autowire"));
    }

    #[test]
    fn given_template_when_parsing_then_is_valid_toml() {
        let raw: RawSettings = toml::from_str(&Settings::template()).expect("template parses");
        assert!(raw.autoload.map(|a| a.is_empty()).unwrap_or(true));
    }
}
