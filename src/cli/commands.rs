//! Command dispatch: one handler per subcommand

use std::io;

use clap::CommandFactory;
use termtree::Tree;
use tracing::{debug, instrument};

use crate::application::ApplicationError;
use crate::cli::args::{CacheCommands, Cli, Commands, ConfigCommands};
use crate::cli::error::{CliError, CliResult};
use crate::cli::output;
use crate::config::{global_config_path, project_config_path, Settings};
use crate::domain::{Argument, DependencyTree, NamespaceValidator};
use crate::infrastructure::ServiceContainer;
use crate::util::path::PathExt;

pub fn execute_command(cli: &Cli) -> CliResult<()> {
    let Some(command) = &cli.command else {
        return Err(CliError::Usage(
            "no command given, see `autowire --help`".to_string(),
        ));
    };

    if let Commands::Completion { shell } = command {
        let mut cmd = Cli::command();
        let name = cmd.get_name().to_string();
        clap_complete::generate(*shell, &mut cmd, name, &mut io::stdout());
        return Ok(());
    }

    let settings = load_settings(cli)?;
    match command {
        Commands::Scan { all } => cmd_scan(settings, *all),
        Commands::Validate => cmd_validate(settings),
        Commands::Resolve { partial, classes } => cmd_resolve(settings, *partial, classes),
        Commands::Compile => cmd_compile(settings),
        Commands::Boot => cmd_boot(settings),
        Commands::Cache { command } => match command {
            CacheCommands::Clear => cmd_cache_clear(settings),
        },
        Commands::Config { command } => match command {
            ConfigCommands::Show => cmd_config_show(&settings),
            ConfigCommands::Template => {
                output::info(&Settings::template());
                Ok(())
            }
            ConfigCommands::Path => cmd_config_path(&settings),
        },
        Commands::Completion { .. } => Ok(()),
    }
}

fn load_settings(cli: &Cli) -> CliResult<Settings> {
    let mut settings = Settings::load(cli.project_dir.as_deref())?;
    if let Some(environment) = &cli.environment {
        settings.environment = environment.clone();
    }
    debug!(
        "settings: project={}, env={}",
        settings.project_dir.display(),
        settings.environment
    );
    Ok(settings)
}

#[instrument(skip(settings))]
fn cmd_scan(settings: Settings, all: bool) -> CliResult<()> {
    let container = ServiceContainer::new(settings);
    let scan = container.scan();

    output::header(&format!(
        "{} classes discovered, {} under '{}'",
        scan.universe.len(),
        scan.roots.len(),
        container.settings.root_namespace
    ));
    for class in scan.root_classes() {
        if !all && !class.is_constructible() {
            continue;
        }
        let kind = if class.is_abstract {
            format!("abstract {}", class.kind)
        } else {
            class.kind.to_string()
        };
        let marker = if class.is_service { "service" } else { "" };
        output::class_line(&kind, &class.name, marker);
        if let Some(location) = &class.location {
            output::detail(&format!(
                "           {}",
                location.file.display_relative_to(&container.settings.project_dir)
            ));
        }
    }
    Ok(())
}

#[instrument(skip(settings))]
fn cmd_validate(settings: Settings) -> CliResult<()> {
    let container = ServiceContainer::new(settings);
    let scan = container.scan();
    // every mapped class, since any of them can end up in a plan
    let violations = NamespaceValidator::new().violations(scan.universe.iter());

    if violations.is_empty() {
        output::success(&format!("{} classes compliant", scan.universe.len()));
        return Ok(());
    }
    output::header(&format!("{} non-compliant classes", violations.len()));
    for violation in &violations {
        output::failure(violation);
    }
    let first = violations.into_iter().next().map(ApplicationError::from);
    match first {
        Some(e) => Err(e.into()),
        None => Ok(()),
    }
}

#[instrument(skip(settings))]
fn cmd_resolve(settings: Settings, partial: bool, classes: &[String]) -> CliResult<()> {
    let container = ServiceContainer::new(settings);
    let scan = container.scan();
    let requested = (!classes.is_empty()).then_some(classes);
    let resolution = container.resolve(&scan, requested, partial)?;

    let roots: Vec<String> = match requested {
        Some(classes) => classes.to_vec(),
        None => scan.constructible_roots(),
    };
    for root in roots.iter().filter(|r| resolution.tree.contains(r)) {
        output::info(&plan_tree(&resolution.tree, root));
    }

    if !resolution.failures.is_empty() {
        output::header(&format!("{} classes could not be resolved", resolution.failures.len()));
        for failure in &resolution.failures {
            output::failure(failure);
        }
    }
    output::success(&format!("{} classes planned", resolution.tree.len()));
    Ok(())
}

/// Render the construction plan below `class`.
fn plan_tree(tree: &DependencyTree, class: &str) -> Tree<String> {
    let mut node = Tree::new(class.to_string());
    if let Some(entry) = tree.get(class) {
        for argument in &entry.arguments {
            match argument {
                Argument::Class(dependency) => node.push(plan_tree(tree, dependency)),
                Argument::Value(_) => node.push(Tree::new(argument.to_string())),
            };
        }
    }
    node
}

#[instrument(skip(settings))]
fn cmd_compile(settings: Settings) -> CliResult<()> {
    let container = ServiceContainer::new(settings);
    let artifact = container.compile()?;
    output::success(&format!(
        "compiled {} services ({} classes) for '{}'",
        artifact.services.len(),
        artifact.tree.len(),
        artifact.environment
    ));
    output::detail(&container.settings.cache_path().display());
    Ok(())
}

#[instrument(skip(settings))]
fn cmd_boot(settings: Settings) -> CliResult<()> {
    let container = ServiceContainer::new(settings);
    let report = container.boot()?;
    output::header(&format!(
        "booted {} services from {} plan ({} instances)",
        report.registered.len(),
        if report.from_cache { "compiled" } else { "resolved" },
        report.container.instantiated()
    ));
    for service in &report.registered {
        output::success_detail(service);
    }
    Ok(())
}

#[instrument(skip(settings))]
fn cmd_cache_clear(settings: Settings) -> CliResult<()> {
    let container = ServiceContainer::new(settings);
    if container.clear_cache()? {
        output::success(&format!(
            "removed compiled container for '{}'",
            container.settings.environment
        ));
    } else {
        output::warning(&format!(
            "no compiled container for '{}'",
            container.settings.environment
        ));
    }
    Ok(())
}

fn cmd_config_show(settings: &Settings) -> CliResult<()> {
    output::info(&settings.to_toml()?);
    Ok(())
}

fn cmd_config_path(settings: &Settings) -> CliResult<()> {
    match global_config_path() {
        Some(path) => {
            let state = if path.exists() { "" } else { " (missing)" };
            output::detail(&format!("global:  {}{}", path.display(), state));
        }
        None => output::warning("cannot determine global config directory"),
    }
    let project = project_config_path(&settings.project_dir);
    let state = if project.exists() { "" } else { " (missing)" };
    output::detail(&format!("project: {}{}", project.display(), state));
    output::detail(&format!("cache:   {}", settings.cache_path().display()));
    Ok(())
}
