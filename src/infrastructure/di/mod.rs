//! Dependency wiring for the CLI and embedding applications.

mod service_container;

pub use service_container::ServiceContainer;
