//! Integration tests for Settings loading.
//!
//! Merge semantics:
//! - Defaults -> Global: REPLACE
//! - Global -> Project: scalars and the PSR-4 table REPLACE, overrides merge per class
//! - Any -> Env vars: REPLACE
//! - composer.json is read only when no PSR-4 table is configured
//!
//! These tests use temp project directories only.

use std::fs;
use std::path::PathBuf;

use tempfile::TempDir;

use autowire::config::{Directories, Settings, CONFIG_FILE_NAME, COMPOSER_FILE_NAME};
use autowire::domain::Literal;

const COMPOSER_JSON: &str = r#"{
    "name": "acme/shop",
    "require": { "php": "^8.2" },
    "autoload": {
        "psr-4": {
            "Acme\\Shop\\": "src/",
            "Acme\\Support\\": ["lib/support", "lib/legacy"]
        }
    },
    "autoload-dev": {
        "psr-4": { "Acme\\Shop\\Tests\\": "tests/" }
    }
}"#;

#[test]
fn given_project_config_when_loading_then_values_and_overrides_are_read() {
    let project = TempDir::new().unwrap();
    fs::write(
        project.path().join(CONFIG_FILE_NAME),
        r#"
root_namespace = "App"
cache_dir = "var/cache"

[autoload.psr-4]
"App\\" = "src/"

[overrides]
"App\\Mailer" = ["smtp.local", 2525]
"App\\Cache" = { ttl = 60 }
"#,
    )
    .unwrap();

    let settings = Settings::load(Some(project.path())).expect("load settings");

    assert_eq!(settings.root_namespace, "App");
    assert_eq!(settings.cache_path(), project.path().join("var/cache"));
    assert_eq!(
        settings.autoload.psr4.get("App\\"),
        Some(&Directories::One("src/".into()))
    );
    assert_eq!(
        settings.overrides.lookup("App\\Mailer", 1, "port"),
        Some(&Literal::Int(2525))
    );
    assert_eq!(
        settings.overrides.lookup("App\\Cache", 0, "ttl"),
        Some(&Literal::Int(60))
    );
}

#[test]
fn given_only_composer_manifest_when_loading_then_imports_psr4_mapping() {
    let project = TempDir::new().unwrap();
    fs::write(project.path().join(COMPOSER_FILE_NAME), COMPOSER_JSON).unwrap();

    let settings = Settings::load(Some(project.path())).expect("load settings");
    let mappings = settings.autoload_mappings();

    assert_eq!(mappings.len(), 2);
    assert_eq!(mappings[0].prefix, "Acme\\Shop\\");
    assert_eq!(mappings[0].directories, vec![project.path().join("src/")]);
    assert_eq!(mappings[1].prefix, "Acme\\Support\\");
    assert_eq!(
        mappings[1].directories,
        vec![
            project.path().join("lib/support"),
            project.path().join("lib/legacy")
        ]
    );
}

#[test]
fn given_project_mapping_and_composer_when_loading_then_project_mapping_wins() {
    let project = TempDir::new().unwrap();
    fs::write(project.path().join(COMPOSER_FILE_NAME), COMPOSER_JSON).unwrap();
    fs::write(
        project.path().join(CONFIG_FILE_NAME),
        "[autoload.psr-4]\n\"Acme\\\\Shop\\\\\" = \"app/\"\n",
    )
    .unwrap();

    let settings = Settings::load(Some(project.path())).expect("load settings");
    let mappings = settings.autoload_mappings();

    assert_eq!(mappings.len(), 1);
    assert_eq!(mappings[0].directories, vec![project.path().join("app/")]);
}

#[test]
fn given_invalid_project_toml_when_loading_then_config_error() {
    let project = TempDir::new().unwrap();
    fs::write(project.path().join(CONFIG_FILE_NAME), "root_namespace = [unclosed").unwrap();

    let err = Settings::load(Some(project.path())).unwrap_err();

    assert!(err.to_string().starts_with("config error:"), "{err}");
    assert!(err.to_string().contains(CONFIG_FILE_NAME));
}

#[test]
fn given_invalid_composer_manifest_when_loading_then_config_error() {
    let project = TempDir::new().unwrap();
    fs::write(project.path().join(COMPOSER_FILE_NAME), "{ \"autoload\": ").unwrap();

    let err = Settings::load(Some(project.path())).unwrap_err();

    assert!(err.to_string().contains(COMPOSER_FILE_NAME));
}

#[test]
fn given_env_vars_when_applying_overrides_then_take_precedence_over_project() {
    let project = TempDir::new().unwrap();
    fs::write(
        project.path().join(CONFIG_FILE_NAME),
        "environment = \"staging\"\nroot_namespace = \"App\"\n",
    )
    .unwrap();
    let loaded = Settings::load(Some(project.path())).expect("load settings");
    let env = config::Map::from([
        ("AUTOWIRE_ENVIRONMENT".to_string(), "development".to_string()),
        ("AUTOWIRE_CACHE_DIR".to_string(), "/tmp/autowire".to_string()),
    ]);

    let settings = Settings::apply_env_overrides(loaded, Some(env)).expect("apply env");

    assert_eq!(settings.environment, "development");
    assert_eq!(settings.root_namespace, "App");
    assert_eq!(settings.cache_path(), PathBuf::from("/tmp/autowire"));
}

#[test]
fn given_loaded_settings_when_rendering_toml_then_round_trips_effective_values() {
    let project = TempDir::new().unwrap();
    fs::write(project.path().join(COMPOSER_FILE_NAME), COMPOSER_JSON).unwrap();
    let settings = Settings::load(Some(project.path())).expect("load settings");

    let rendered = settings.to_toml().expect("render");
    let parsed: Settings = toml::from_str(&rendered).expect("parse rendered");

    assert_eq!(parsed.autoload, settings.autoload);
    assert_eq!(parsed.environment, settings.environment);
}
