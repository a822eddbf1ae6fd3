//! Application services
//!
//! Concrete service implementations that orchestrate domain logic.
//! Services depend on I/O boundary traits (FileSystem, CacheStorage)
//! but are themselves concrete structs, not traits.

mod bootstrap;
mod compiler;
mod container;
mod scanner;

pub use bootstrap::{BootReport, Bootstrapper, DEVELOPMENT};
pub use compiler::{
    artifact_key, CacheMiss, CompiledContainerArtifact, ContainerCompiler, ARTIFACT_VERSION,
};
pub use container::{
    Arg, Component, Container, ContainerBuilder, Factory, FactoryRegistry, GenericComponent,
    Instance, Service,
};
pub use scanner::{in_namespace, ClassScanner, ScanOutcome};
