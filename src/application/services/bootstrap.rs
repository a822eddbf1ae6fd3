//! Service bootstrapping: plan, build, and call `register()` on every service.

use tracing::{debug, info, warn};

use crate::application::services::compiler::{CompiledContainerArtifact, ContainerCompiler};
use crate::application::services::container::{Container, ContainerBuilder};
use crate::application::{ApplicationError, ApplicationResult};
use crate::domain::{resolve, ClassUniverse, DependencyTree, ManualOverrideMap, NamespaceValidator};

/// Environment in which the plan is always rebuilt and never cached.
pub const DEVELOPMENT: &str = "development";

/// What a boot did.
#[derive(Debug)]
pub struct BootReport {
    pub container: Container,
    /// Services whose `register()` ran, in order
    pub registered: Vec<String>,
    /// Plan came from a compiled artifact
    pub from_cache: bool,
}

pub struct Bootstrapper {
    environment: String,
    builder: ContainerBuilder,
    compiler: ContainerCompiler,
}

impl Bootstrapper {
    pub fn new(environment: &str, builder: ContainerBuilder, compiler: ContainerCompiler) -> Self {
        Self {
            environment: environment.to_string(),
            builder,
            compiler,
        }
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case(DEVELOPMENT)
    }

    /// Boot every service among `roots`.
    ///
    /// Outside development a valid compiled plan for the environment is reused;
    /// otherwise the plan is rebuilt as in [`rebuild`](Self::rebuild).
    pub fn boot(
        &self,
        universe: &ClassUniverse,
        roots: &[String],
        overrides: &ManualOverrideMap,
    ) -> ApplicationResult<BootReport> {
        let services = service_names(universe, roots);
        debug!(
            "boot: env='{}', {} roots, {} services",
            self.environment,
            roots.len(),
            services.len()
        );

        if !self.is_development() {
            if let Some(artifact) = self.compiler.load_compiled(&self.environment, overrides) {
                if artifact.services == services {
                    return self.start(artifact.tree, services, true);
                }
                info!("compiled container is stale (service set changed), rebuilding");
            }
        }
        self.rebuild_services(universe, services, overrides)
    }

    /// Boot without reading the compiled plan.
    ///
    /// Every class in the resolved plan must be namespace compliant. Outside
    /// development the plan is then compiled; a failed compile is logged and
    /// does not stop the boot.
    pub fn rebuild(
        &self,
        universe: &ClassUniverse,
        roots: &[String],
        overrides: &ManualOverrideMap,
    ) -> ApplicationResult<BootReport> {
        let services = service_names(universe, roots);
        debug!("rebuild: env='{}', {} services", self.environment, services.len());
        self.rebuild_services(universe, services, overrides)
    }

    fn rebuild_services(
        &self,
        universe: &ClassUniverse,
        services: Vec<String>,
        overrides: &ManualOverrideMap,
    ) -> ApplicationResult<BootReport> {
        let tree = resolve(universe, &services, overrides, false)?.tree;
        NamespaceValidator::new()
            .validate(tree.class_names().filter_map(|name| universe.get(name)))?;

        if !self.is_development() {
            let artifact = CompiledContainerArtifact::new(
                &self.environment,
                services.clone(),
                tree.clone(),
                overrides,
            );
            if let Err(e) = self.compiler.compile(&artifact) {
                warn!("continuing without compiled container: {}", e);
            }
        }
        self.start(tree, services, false)
    }

    /// Boot from the compiled plan alone, without scanning or resolving.
    ///
    /// `Ok(None)` when there is no valid artifact for the environment and
    /// `overrides`.
    pub fn boot_compiled(
        &self,
        overrides: &ManualOverrideMap,
    ) -> ApplicationResult<Option<BootReport>> {
        debug!("boot_compiled: env='{}'", self.environment);
        match self.compiler.load_compiled(&self.environment, overrides) {
            Some(artifact) => self
                .start(artifact.tree, artifact.services, true)
                .map(Some),
            None => Ok(None),
        }
    }

    fn start(
        &self,
        tree: DependencyTree,
        services: Vec<String>,
        from_cache: bool,
    ) -> ApplicationResult<BootReport> {
        let mut container = self.builder.build(tree);

        // construct everything before any register() runs
        let mut instances = Vec::with_capacity(services.len());
        for name in &services {
            instances.push(container.get(name)?);
        }

        for (name, instance) in services.iter().zip(&instances) {
            let service = instance
                .as_service()
                .ok_or_else(|| ApplicationError::NotAService(name.clone()))?;
            service
                .register()
                .map_err(|source| ApplicationError::RegistrationFailed {
                    class: name.clone(),
                    source,
                })?;
            debug!("boot: registered {}", name);
        }

        info!(
            "booted {} services ({})",
            services.len(),
            if from_cache { "compiled" } else { "resolved" }
        );
        Ok(BootReport {
            container,
            registered: services,
            from_cache,
        })
    }
}

fn service_names(universe: &ClassUniverse, roots: &[String]) -> Vec<String> {
    roots
        .iter()
        .filter_map(|name| universe.get(name))
        .filter(|class| class.is_service)
        .map(|class| class.name.clone())
        .collect()
}
