//! PHP source reading: tokenizer and declaration parser.
//!
//! Stands in for runtime reflection: constructor and method signatures are
//! read from the declaring source file.

pub mod lexer;
pub mod parser;

pub use parser::parse_source;
