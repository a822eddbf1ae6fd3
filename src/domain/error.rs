//! Domain-level errors (no external dependencies)

use thiserror::Error;

/// Conditions that make a dependency plan impossible to build.
///
/// Every variant names the class (and parameter) at fault so the caller can
/// print an actionable message.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("class {class} is not loadable from its location: expected {expected}, found {actual}")]
    NonCompliantNamespaceClass {
        class: String,
        expected: String,
        actual: String,
    },

    #[error(
        "cannot resolve parameter ${parameter} of {class}: capability {capability} has {count} candidate(s) [{list}]",
        count = .candidates.len(),
        list = .candidates.join(", ")
    )]
    AmbiguousOrUnresolvedCapabilityDependency {
        class: String,
        parameter: String,
        capability: String,
        candidates: Vec<String>,
    },

    #[error("cannot resolve parameter ${parameter} of {class}: no default value and no manual override")]
    UnresolvedPrimitiveDependency { class: String, parameter: String },

    #[error("cannot resolve parameter ${parameter} of {class}: type {type_name} is not a discovered class")]
    UnknownClassDependency {
        class: String,
        parameter: String,
        type_name: String,
    },

    #[error("cyclic dependency detected at {class}: {path}", path = .path.join(" -> "))]
    CyclicDependency { class: String, path: Vec<String> },

    #[error("unknown class: {0}")]
    UnknownClass(String),

    #[error("class {0} is abstract, an interface or a trait and cannot be instantiated")]
    NotInstantiable(String),
}

impl DomainError {
    /// Class the error is about.
    pub fn class(&self) -> &str {
        match self {
            DomainError::NonCompliantNamespaceClass { class, .. }
            | DomainError::AmbiguousOrUnresolvedCapabilityDependency { class, .. }
            | DomainError::UnresolvedPrimitiveDependency { class, .. }
            | DomainError::UnknownClassDependency { class, .. }
            | DomainError::CyclicDependency { class, .. } => class,
            DomainError::UnknownClass(class) | DomainError::NotInstantiable(class) => class,
        }
    }
}

/// Result type for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;
