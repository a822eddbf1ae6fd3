//! Autowiring service-container builder.
//!
//! Discovers classes under namespace-prefix to directory mappings, checks
//! that they live where their namespace says, resolves constructor
//! dependencies into a closed plan, and boots every service exactly once
//! from a lazily instantiating container. Plans can be compiled to disk per
//! environment and reused on later boots.
//!
//! Layers, innermost first: [`domain`] (parsing, resolution, no I/O),
//! [`application`] (scanner, container, compiler, bootstrapper),
//! [`infrastructure`] (filesystem and cache storage, wiring),
//! [`cli`].

pub mod application;
pub mod cli;
pub mod config;
pub mod domain;
pub mod exitcode;
pub mod infrastructure;
pub mod util;
