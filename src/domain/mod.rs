//! Domain layer: entities and business logic
//!
//! This layer is independent of external concerns (no I/O, no CLI, no config loading).

pub mod entities;
pub mod error;
pub mod heuristic;
pub mod inspector;
pub mod resolver;
pub mod source;
pub mod universe;
pub mod validator;

pub use entities::*;
pub use error::{DomainError, DomainResult};
pub use inspector::{SignatureInspector, UniverseInspector};
pub use resolver::{resolve, Autowirer, Resolution};
pub use source::parse_source;
pub use universe::{ClassUniverse, REGISTER_METHOD};
pub use validator::NamespaceValidator;
