//! Compiled container artifacts on disk.

use std::fs;
use std::sync::Arc;

use rstest::rstest;
use tempfile::TempDir;

use autowire::application::services::{
    artifact_key, CacheMiss, CompiledContainerArtifact, ContainerCompiler, ARTIFACT_VERSION,
};
use autowire::domain::{resolve, Argument, DependencyTree, Literal, ManualOverrideMap};
use autowire::infrastructure::traits::{CacheStorage, FileCacheStorage};
use autowire::util::testing::{init_test_setup, universe_from_php};

fn sample_tree() -> DependencyTree {
    let universe = universe_from_php(
        r#"<?php
namespace App;
class Clock {}
class Kernel {
    public function __construct(Clock $clock, int $workers = 4) {}
    public function register(): void {}
}
"#,
    );
    resolve(&universe, &["App\\Kernel"], &ManualOverrideMap::new(), false)
        .unwrap()
        .tree
}

fn none() -> ManualOverrideMap {
    ManualOverrideMap::new()
}

fn file_compiler(temp: &TempDir) -> (ContainerCompiler, FileCacheStorage) {
    let storage = FileCacheStorage::new(temp.path().join("var/cache"));
    (ContainerCompiler::new(Arc::new(storage.clone())), storage)
}

#[test]
fn given_compiled_artifact_when_loading_then_returns_identical_plan() {
    init_test_setup();
    let temp = TempDir::new().unwrap();
    let (compiler, storage) = file_compiler(&temp);
    let artifact = CompiledContainerArtifact::new(
        "production",
        vec!["App\\Kernel".into()],
        sample_tree(),
        &none(),
    );

    compiler.compile(&artifact).unwrap();
    let loaded = compiler.load_compiled("production", &none()).expect("cache hit");

    assert_eq!(loaded, artifact);
    assert!(storage.path_for(&artifact_key("production")).is_file());
}

#[test]
fn given_no_artifact_when_loading_then_missing() {
    let temp = TempDir::new().unwrap();
    let (compiler, _) = file_compiler(&temp);

    assert_eq!(compiler.try_load("production", &none()), Err(CacheMiss::Missing));
    assert!(compiler.load_compiled("production", &none()).is_none());
}

#[test]
fn given_artifact_for_other_environment_when_loading_then_not_used() {
    let temp = TempDir::new().unwrap();
    let (compiler, storage) = file_compiler(&temp);
    let artifact = CompiledContainerArtifact::new("staging", vec![], sample_tree(), &none());
    // staging artifact copied under the production key
    storage
        .write(&artifact_key("production"), &artifact.to_json().unwrap())
        .unwrap();

    assert_eq!(
        compiler.try_load("production", &none()),
        Err(CacheMiss::EnvironmentMismatch {
            found: "staging".into()
        })
    );
    assert!(compiler.load_compiled("staging", &none()).is_none());
}

#[rstest]
#[case::not_json("{ this is not json")]
#[case::wrong_shape(r#"{"version": 1, "environment": "production"}"#)]
#[case::empty("")]
fn given_corrupt_blob_when_loading_then_miss_without_error(#[case] blob: &str) {
    let temp = TempDir::new().unwrap();
    let (compiler, storage) = file_compiler(&temp);
    storage.write(&artifact_key("production"), blob).unwrap();

    assert!(matches!(
        compiler.try_load("production", &none()),
        Err(CacheMiss::Corrupt(_))
    ));
    assert!(compiler.load_compiled("production", &none()).is_none());
}

#[test]
fn given_older_artifact_version_when_loading_then_version_mismatch() {
    let temp = TempDir::new().unwrap();
    let (compiler, storage) = file_compiler(&temp);
    let mut artifact = CompiledContainerArtifact::new("production", vec![], sample_tree(), &none());
    artifact.version = ARTIFACT_VERSION + 1;
    compiler.compile(&artifact).unwrap();

    assert_eq!(
        compiler.try_load("production", &none()),
        Err(CacheMiss::VersionMismatch {
            found: ARTIFACT_VERSION + 1
        })
    );
    assert!(storage.path_for(&artifact_key("production")).exists());
}

#[test]
fn given_hand_edited_plan_when_loading_then_digest_mismatch() {
    let temp = TempDir::new().unwrap();
    let (compiler, storage) = file_compiler(&temp);
    let artifact = CompiledContainerArtifact::new("production", vec![], sample_tree(), &none());
    compiler.compile(&artifact).unwrap();

    let path = storage.path_for(&artifact_key("production"));
    let edited = fs::read_to_string(&path)
        .unwrap()
        .replace("\"value\": 4", "\"value\": 16");
    assert!(edited.contains("16"));
    fs::write(&path, edited).unwrap();

    assert_eq!(
        compiler.try_load("production", &none()),
        Err(CacheMiss::DigestMismatch)
    );
}

#[test]
fn given_compiled_environment_when_invalidating_then_removed_once() {
    let temp = TempDir::new().unwrap();
    let (compiler, _) = file_compiler(&temp);
    compiler
        .compile(&CompiledContainerArtifact::new("production", vec![], sample_tree(), &none()))
        .unwrap();

    assert!(compiler.invalidate("production").unwrap());
    assert!(!compiler.invalidate("production").unwrap());
    assert!(compiler.load_compiled("production", &none()).is_none());
}

#[test]
fn given_changed_overrides_when_loading_then_plan_is_not_used() {
    let temp = TempDir::new().unwrap();
    let (compiler, _) = file_compiler(&temp);
    let built_with = ManualOverrideMap::new().with_named("App\\Kernel", "workers", Literal::Int(8));
    compiler
        .compile(&CompiledContainerArtifact::new(
            "production",
            vec![],
            sample_tree(),
            &built_with,
        ))
        .unwrap();

    assert!(compiler.load_compiled("production", &built_with).is_some());
    assert_eq!(
        compiler.try_load("production", &none()),
        Err(CacheMiss::OverridesChanged)
    );
}

#[test]
fn given_overflowing_float_default_when_round_tripping_then_plan_is_unchanged() {
    let temp = TempDir::new().unwrap();
    let (compiler, _) = file_compiler(&temp);
    let universe = universe_from_php(
        r#"<?php
namespace App;
class Limiter {
    public function __construct(float $limit = 1e999, float $ratio = 0.5) {}
}
"#,
    );
    let tree = resolve(&universe, &["App\\Limiter"], &none(), false)
        .unwrap()
        .tree;
    let artifact = CompiledContainerArtifact::new("production", vec![], tree, &none());

    compiler.compile(&artifact).unwrap();
    let loaded = compiler.load_compiled("production", &none()).expect("cache hit");

    assert_eq!(loaded.tree, artifact.tree);
    assert_eq!(
        loaded.tree.get("App\\Limiter").unwrap().arguments,
        vec![
            Argument::Value(Literal::Expr {
                expr: "1e999".into()
            }),
            Argument::Value(Literal::Float(0.5)),
        ]
    );
}
