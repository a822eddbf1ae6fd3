//! CLI argument definitions using clap

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand, ValueHint};

/// Autowiring service-container builder: discover classes, resolve constructor dependencies, boot services
#[derive(Parser, Debug)]
#[command(name = "autowire")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Debug output on stderr (-d info, -dd debug, -ddd trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub debug: u8,

    /// Project directory (default: cwd)
    #[arg(short = 'C', long, global = true, value_hint = ValueHint::DirPath)]
    pub project_dir: Option<PathBuf>,

    /// Environment tag (overrides config and AUTOWIRE_ENVIRONMENT)
    #[arg(short, long, global = true)]
    pub environment: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List discovered classes under the root namespace
    Scan {
        /// Show interfaces, abstract classes and traits too
        #[arg(short, long)]
        all: bool,
    },

    /// Check that every class lives where its namespace says
    Validate,

    /// Show the dependency plan
    Resolve {
        /// Record failures and continue instead of stopping at the first one
        #[arg(short, long)]
        partial: bool,
        /// Classes to resolve (default: every constructible class)
        classes: Vec<String>,
    },

    /// Resolve all services and write the compiled container
    Compile,

    /// Boot all services and report what was registered
    Boot,

    /// Manage the compiled container cache
    Cache {
        #[command(subcommand)]
        command: CacheCommands,
    },

    /// Manage settings
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Generate shell completions
    Completion {
        /// Shell type
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand, Debug)]
pub enum CacheCommands {
    /// Delete the compiled container of the current environment
    Clear,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show merged config
    Show,

    /// Print a config template
    Template,

    /// Show config paths
    Path,
}
