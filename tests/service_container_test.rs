//! End-to-end pipeline over a project directory: scan, validate, resolve,
//! compile and boot.

use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tempfile::TempDir;

use autowire::application::services::{artifact_key, DEVELOPMENT};
use autowire::application::ApplicationError;
use autowire::config::Settings;
use autowire::domain::{Argument, DomainError, Literal, ManualOverrideMap};
use autowire::infrastructure::traits::{CacheStorage, MemoryCacheStorage, RealFileSystem};
use autowire::infrastructure::{InfraError, ServiceContainer};
use autowire::util::testing::{init_test_setup, write_source};

fn write_project(root: &Path) {
    write_source(
        root,
        "src/Kernel.php",
        r#"<?php
namespace App;

use App\Mail\Mailer;

final class Kernel
{
    public function __construct(private Mailer $mailer) {}

    public function register(): void {}
}
"#,
    );
    write_source(
        root,
        "src/Mail/Mailer.php",
        r#"<?php
namespace App\Mail;

class Mailer
{
    public function __construct(Transport $transport, string $host, int $port = 25) {}

    public function register(): void {}
}
"#,
    );
    write_source(
        root,
        "src/Mail/Transport.php",
        "<?php\nnamespace App\\Mail;\n\ninterface Transport {}\n",
    );
    write_source(
        root,
        "src/Mail/SmtpTransport.php",
        "<?php\nnamespace App\\Mail;\n\nclass SmtpTransport implements Transport {}\n",
    );
}

fn settings(root: &Path, environment: &str) -> Settings {
    let mut settings = Settings {
        project_dir: root.to_path_buf(),
        environment: environment.to_string(),
        root_namespace: "App".to_string(),
        overrides: ManualOverrideMap::new().with_named("App\\Mail\\Mailer", "host", "smtp.local".into()),
        ..Settings::default()
    };
    settings
        .autoload
        .psr4
        .insert("App\\".into(), autowire::config::Directories::One("src".into()));
    settings
}

fn container(root: &Path, environment: &str, cache: Arc<dyn CacheStorage>) -> ServiceContainer {
    ServiceContainer::with_deps(settings(root, environment), Arc::new(RealFileSystem), cache)
}

#[test]
fn given_project_when_resolving_all_roots_then_plan_uses_overrides_and_defaults() {
    init_test_setup();
    let project = TempDir::new().unwrap();
    write_project(project.path());
    let services = container(project.path(), "production", Arc::new(MemoryCacheStorage::new()));

    let scan = services.scan();
    services.validate(&scan).unwrap();
    let resolution = services.resolve(&scan, None, false).unwrap();

    assert_eq!(
        resolution.tree.get("App\\Mail\\Mailer").unwrap().arguments,
        vec![
            Argument::Class("App\\Mail\\SmtpTransport".into()),
            Argument::Value(Literal::Str("smtp.local".into())),
            Argument::Value(Literal::Int(25)),
        ]
    );
    assert!(resolution.tree.contains("App\\Kernel"));
    assert!(resolution.is_complete());
}

#[test]
fn given_project_when_compiling_then_boot_reuses_compiled_plan() {
    let project = TempDir::new().unwrap();
    write_project(project.path());
    let cache = Arc::new(MemoryCacheStorage::new());
    let services = container(project.path(), "production", cache.clone());

    let artifact = services.compile().unwrap();
    assert_eq!(artifact.services, vec!["App\\Kernel", "App\\Mail\\Mailer"]);
    assert!(cache.read(&artifact_key("production")).unwrap().is_some());

    let report = services.boot().unwrap();

    assert!(report.from_cache);
    assert_eq!(report.registered, artifact.services);
}

#[test]
fn given_development_when_booting_then_scans_and_leaves_cache_untouched() {
    let project = TempDir::new().unwrap();
    write_project(project.path());
    let cache = Arc::new(MemoryCacheStorage::new());
    let services = container(project.path(), DEVELOPMENT, cache.clone());

    let report = services.boot().unwrap();

    assert!(!report.from_cache);
    assert_eq!(report.registered.len(), 2);
    assert!(!services.clear_cache().unwrap());
}

#[test]
fn given_file_cache_when_clearing_then_artifact_is_removed() {
    let project = TempDir::new().unwrap();
    write_project(project.path());
    let services = ServiceContainer::new(settings(project.path(), "production"));

    services.compile().unwrap();
    let file = project
        .path()
        .join(".cache/autowire")
        .join(format!("{}.json", artifact_key("production")));
    assert!(file.is_file());

    assert!(services.clear_cache().unwrap());
    assert!(!file.exists());
}

#[test]
fn given_misplaced_class_when_booting_then_validation_error() {
    let project = TempDir::new().unwrap();
    write_project(project.path());
    write_source(
        project.path(),
        "src/Mail/Queue.php",
        "<?php\nnamespace App\\Queue;\n\nclass Queue {}\n",
    );
    let services = container(project.path(), DEVELOPMENT, Arc::new(MemoryCacheStorage::new()));

    let err = services.boot().unwrap_err();

    assert!(matches!(
        err,
        InfraError::Application(ApplicationError::Domain(
            DomainError::NonCompliantNamespaceClass { ref class, .. }
        )) if class == "App\\Queue\\Queue"
    ));
}

#[test]
fn given_missing_override_when_compiling_then_nothing_is_written() {
    let project = TempDir::new().unwrap();
    write_project(project.path());
    let mut settings = settings(project.path(), "production");
    settings.overrides = ManualOverrideMap::new();
    let cache = Arc::new(MemoryCacheStorage::new());
    let services = ServiceContainer::with_deps(settings, Arc::new(RealFileSystem), cache.clone());

    let err = services.compile().unwrap_err();

    assert!(err.to_string().contains("$host"), "{err}");
    assert!(cache.read(&artifact_key("production")).unwrap().is_none());
}

#[test]
fn given_requested_classes_in_partial_mode_when_resolving_then_reports_failures() {
    let project = TempDir::new().unwrap();
    write_project(project.path());
    let mut settings = settings(project.path(), "production");
    settings.overrides = ManualOverrideMap::new();
    let services =
        ServiceContainer::with_deps(settings, Arc::new(RealFileSystem), Arc::new(MemoryCacheStorage::new()));
    let scan = services.scan();
    let requested = vec![
        "App\\Mail\\SmtpTransport".to_string(),
        "App\\Kernel".to_string(),
    ];

    let resolution = services.resolve(&scan, Some(&requested), true).unwrap();

    assert!(resolution.tree.contains("App\\Mail\\SmtpTransport"));
    assert!(!resolution.tree.contains("App\\Kernel"));
    assert_eq!(resolution.failures.len(), 1);
    assert_eq!(resolution.failures[0].class(), "App\\Mail\\Mailer");
}

/// Second mapping `Lib\` whose `Helper` sits in the wrong directory.
fn write_misplaced_library(root: &Path) {
    write_source(
        root,
        "src/Kernel.php",
        r#"<?php
namespace App;

use Lib\Helper;

class Kernel
{
    public function __construct(Helper $helper) {}

    public function register(): void {}
}
"#,
    );
    write_source(
        root,
        "lib/Wrong/Place.php",
        "<?php\nnamespace Lib;\n\nclass Helper {}\n",
    );
}

fn library_container(root: &Path, environment: &str) -> ServiceContainer {
    let mut settings = settings(root, environment);
    settings
        .autoload
        .psr4
        .insert("Lib\\".into(), autowire::config::Directories::One("lib".into()));
    ServiceContainer::with_deps(
        settings,
        Arc::new(RealFileSystem),
        Arc::new(MemoryCacheStorage::new()),
    )
}

fn is_misplaced_helper(err: &InfraError) -> bool {
    matches!(
        err,
        InfraError::Application(ApplicationError::Domain(
            DomainError::NonCompliantNamespaceClass { class, .. }
        )) if class == "Lib\\Helper"
    )
}

#[test]
fn given_misplaced_dependency_outside_root_namespace_when_booting_then_validation_error() {
    let project = TempDir::new().unwrap();
    write_misplaced_library(project.path());
    let services = library_container(project.path(), DEVELOPMENT);

    let scan = services.scan();
    assert!(services.validate(&scan).is_ok());

    let err = services.boot().unwrap_err();
    assert!(is_misplaced_helper(&err), "{err}");
    let err = services.compile().unwrap_err();
    assert!(is_misplaced_helper(&err), "{err}");
    let err = services.resolve(&scan, None, false).unwrap_err();
    assert!(is_misplaced_helper(&err), "{err}");
}

#[test]
fn given_misplaced_dependency_when_booting_in_production_then_nothing_is_compiled() {
    let project = TempDir::new().unwrap();
    write_misplaced_library(project.path());
    let services = library_container(project.path(), "production");

    let err = services.boot().unwrap_err();

    assert!(is_misplaced_helper(&err), "{err}");
    assert!(services
        .cache
        .read(&artifact_key("production"))
        .unwrap()
        .is_none());
}

#[test]
fn given_changed_override_when_booting_from_cache_then_plan_is_rebuilt() {
    let project = TempDir::new().unwrap();
    write_project(project.path());
    let cache = Arc::new(MemoryCacheStorage::new());
    container(project.path(), "production", cache.clone())
        .compile()
        .unwrap();

    let mut settings = settings(project.path(), "production");
    settings.overrides =
        ManualOverrideMap::new().with_named("App\\Mail\\Mailer", "host", "mail.example".into());
    let services = ServiceContainer::with_deps(settings, Arc::new(RealFileSystem), cache);
    let report = services.boot().unwrap();

    assert!(!report.from_cache);
    assert_eq!(
        report.container.plan().get("App\\Mail\\Mailer").unwrap().arguments[1],
        Argument::Value(Literal::Str("mail.example".into()))
    );
    assert!(services.boot().unwrap().from_cache);
}

/// Memory storage that counts reads.
#[derive(Default)]
struct CountingStorage {
    inner: MemoryCacheStorage,
    reads: AtomicUsize,
}

impl CacheStorage for CountingStorage {
    fn read(&self, key: &str) -> io::Result<Option<String>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.read(key)
    }

    fn write(&self, key: &str, blob: &str) -> io::Result<()> {
        self.inner.write(key, blob)
    }

    fn remove(&self, key: &str) -> io::Result<bool> {
        self.inner.remove(key)
    }
}

#[test]
fn given_corrupt_artifact_when_booting_then_reads_cache_once_and_rewrites() {
    let project = TempDir::new().unwrap();
    write_project(project.path());
    let cache = Arc::new(CountingStorage::default());
    cache
        .write(&artifact_key("production"), "{\"truncated\": ")
        .unwrap();
    let services = container(project.path(), "production", cache.clone());

    let report = services.boot().unwrap();

    assert!(!report.from_cache);
    assert_eq!(cache.reads.load(Ordering::SeqCst), 1);
    assert!(services.boot().unwrap().from_cache);
}
