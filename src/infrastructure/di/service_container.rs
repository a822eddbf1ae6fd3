//! Service container for dependency injection
//!
//! Wires settings, filesystem and cache storage into the scan, resolve and
//! boot pipeline.

use std::sync::Arc;

use tracing::{debug, info};

use crate::application::ApplicationError;
use crate::application::services::{
    BootReport, Bootstrapper, ClassScanner, CompiledContainerArtifact, ContainerBuilder,
    ContainerCompiler, FactoryRegistry, ScanOutcome,
};
use crate::config::Settings;
use crate::domain::{resolve, DependencyTree, NamespaceValidator, Resolution};
use crate::infrastructure::error::{InfraError, InfraResult};
use crate::infrastructure::traits::{CacheStorage, FileCacheStorage, FileSystem, RealFileSystem};

/// Container holding all application services.
pub struct ServiceContainer {
    /// Application settings
    pub settings: Arc<Settings>,

    /// Filesystem abstraction
    pub fs: Arc<dyn FileSystem>,

    /// Compiled container storage
    pub cache: Arc<dyn CacheStorage>,

    /// Factories for classes that need real construction logic
    pub factories: FactoryRegistry,
}

impl ServiceContainer {
    /// Create a new service container with real implementations.
    pub fn new(settings: Settings) -> Self {
        let cache = Arc::new(FileCacheStorage::new(settings.cache_path()));
        Self::with_deps(settings, Arc::new(RealFileSystem), cache)
    }

    /// Create a service container with custom dependencies (for testing).
    pub fn with_deps(
        settings: Settings,
        fs: Arc<dyn FileSystem>,
        cache: Arc<dyn CacheStorage>,
    ) -> Self {
        let settings = Arc::new(settings);

        Self {
            settings,
            fs,
            cache,
            factories: FactoryRegistry::new(),
        }
    }

    pub fn with_factories(mut self, factories: FactoryRegistry) -> Self {
        self.factories = factories;
        self
    }

    pub fn scanner(&self) -> ClassScanner {
        ClassScanner::new(Arc::clone(&self.fs))
    }

    pub fn compiler(&self) -> ContainerCompiler {
        ContainerCompiler::new(Arc::clone(&self.cache))
    }

    pub fn bootstrapper(&self) -> Bootstrapper {
        Bootstrapper::new(
            &self.settings.environment,
            ContainerBuilder::with_factories(self.factories.clone()),
            self.compiler(),
        )
    }

    /// Discover classes through the configured mappings.
    pub fn scan(&self) -> ScanOutcome {
        self.scanner().scan(
            &self.settings.autoload_mappings(),
            &self.settings.root_namespace,
        )
    }

    /// Fail on the first root class that is not where its namespace says.
    pub fn validate(&self, scan: &ScanOutcome) -> InfraResult<()> {
        NamespaceValidator::new()
            .validate(scan.root_classes())
            .map_err(|e| InfraError::Application(e.into()))
    }

    /// Fail on the first planned class, from any mapping, that is not where its
    /// namespace says.
    pub fn validate_plan(&self, scan: &ScanOutcome, tree: &DependencyTree) -> InfraResult<()> {
        NamespaceValidator::new()
            .validate(tree.class_names().filter_map(|name| scan.universe.get(name)))
            .map_err(|e| InfraError::Application(e.into()))
    }

    /// Resolve `classes`, or every constructible root when `None`.
    pub fn resolve(
        &self,
        scan: &ScanOutcome,
        classes: Option<&[String]>,
        allow_partial: bool,
    ) -> InfraResult<Resolution> {
        let roots = match classes {
            Some(classes) => classes.to_vec(),
            None => scan.constructible_roots(),
        };
        debug!("resolve: {} roots, partial={}", roots.len(), allow_partial);
        let resolution = resolve(
            &scan.universe,
            &roots,
            &self.settings.overrides,
            allow_partial,
        )
        .map_err(|e| InfraError::Application(e.into()))?;
        self.validate_plan(scan, &resolution.tree)?;
        Ok(resolution)
    }

    /// Scan, validate, resolve the services and write the artifact.
    pub fn compile(&self) -> InfraResult<CompiledContainerArtifact> {
        let scan = self.scan();
        self.validate(&scan)?;
        let services = scan.service_roots();
        let tree = resolve(
            &scan.universe,
            &services,
            &self.settings.overrides,
            false,
        )
        .map_err(|e| InfraError::Application(e.into()))?
        .tree;
        self.validate_plan(&scan, &tree)?;

        let artifact = CompiledContainerArtifact::new(
            &self.settings.environment,
            services,
            tree,
            &self.settings.overrides,
        );
        self.compiler()
            .compile(&artifact)
            .map_err(cache_error)?;
        Ok(artifact)
    }

    /// Full pipeline: compiled plan if valid, else scan, validate and rebuild.
    pub fn boot(&self) -> InfraResult<BootReport> {
        let bootstrapper = self.bootstrapper();
        let overrides = &self.settings.overrides;
        if !bootstrapper.is_development() {
            if let Some(report) = bootstrapper.boot_compiled(overrides)? {
                info!("booted from compiled container");
                return Ok(report);
            }
        }

        let scan = self.scan();
        self.validate(&scan)?;
        // the compiled plan was already consulted above
        Ok(bootstrapper.rebuild(&scan.universe, &scan.roots, overrides)?)
    }

    /// Remove the compiled container of the configured environment.
    pub fn clear_cache(&self) -> InfraResult<bool> {
        self.compiler()
            .invalidate(&self.settings.environment)
            .map_err(cache_error)
    }
}

fn cache_error(e: ApplicationError) -> InfraError {
    let message = match std::error::Error::source(&e) {
        Some(source) => format!("{e}: {source}"),
        None => e.to_string(),
    };
    InfraError::Cache { message }
}
