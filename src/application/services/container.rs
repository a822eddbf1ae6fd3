//! Runtime container: lazy, per-container singletons built from a dependency plan.

use std::any::Any;
use std::cell::Cell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use tracing::{debug, trace};

use crate::application::{ApplicationError, ApplicationResult, BoxError};
use crate::domain::{normalize_class_name, Argument, DependencyTree, DomainError, Literal};

/// Shared handle to a constructed component.
pub type Instance = Rc<dyn Component>;

/// Something the container constructed.
pub trait Component: Any {
    fn class_name(&self) -> &str;

    fn as_any(&self) -> &dyn Any;

    /// The service view of this component, when it has one.
    fn as_service(&self) -> Option<&dyn Service> {
        None
    }
}

impl fmt::Debug for dyn Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Component({})", self.class_name())
    }
}

/// Component with a boot hook.
pub trait Service {
    /// Called exactly once per boot.
    fn register(&self) -> Result<(), BoxError>;
}

/// Constructor argument handed to a factory.
#[derive(Clone)]
pub enum Arg {
    Instance(Instance),
    Value(Literal),
}

impl Arg {
    pub fn as_instance(&self) -> Option<&Instance> {
        match self {
            Arg::Instance(instance) => Some(instance),
            Arg::Value(_) => None,
        }
    }

    pub fn as_value(&self) -> Option<&Literal> {
        match self {
            Arg::Value(value) => Some(value),
            Arg::Instance(_) => None,
        }
    }
}

impl fmt::Debug for Arg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arg::Instance(instance) => write!(f, "Instance({})", instance.class_name()),
            Arg::Value(value) => write!(f, "Value({value})"),
        }
    }
}

/// Builds one class from its resolved arguments.
pub type Factory = Arc<dyn Fn(&[Arg]) -> Result<Instance, BoxError> + Send + Sync>;

/// Class name to factory. Lookups ignore ASCII case and a leading `\`.
#[derive(Clone, Default)]
pub struct FactoryRegistry {
    factories: HashMap<String, Factory>,
}

impl FactoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, class: &str, factory: F) -> &mut Self
    where
        F: Fn(&[Arg]) -> Result<Instance, BoxError> + Send + Sync + 'static,
    {
        self.factories.insert(Self::key(class), Arc::new(factory));
        self
    }

    pub fn get(&self, class: &str) -> Option<&Factory> {
        self.factories.get(&Self::key(class))
    }

    pub fn contains(&self, class: &str) -> bool {
        self.get(class).is_some()
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    fn key(class: &str) -> String {
        normalize_class_name(class).to_ascii_lowercase()
    }
}

impl fmt::Debug for FactoryRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut classes: Vec<&String> = self.factories.keys().collect();
        classes.sort();
        f.debug_struct("FactoryRegistry")
            .field("classes", &classes)
            .finish()
    }
}

/// Fallback component for classes without a factory.
///
/// Keeps the class name and the arguments it was built with, and counts
/// `register()` calls.
#[derive(Debug)]
pub struct GenericComponent {
    class: String,
    arguments: Vec<Arg>,
    registrations: Cell<usize>,
}

impl GenericComponent {
    pub fn new(class: impl Into<String>, arguments: Vec<Arg>) -> Self {
        Self {
            class: class.into(),
            arguments,
            registrations: Cell::new(0),
        }
    }

    pub fn arguments(&self) -> &[Arg] {
        &self.arguments
    }

    pub fn registrations(&self) -> usize {
        self.registrations.get()
    }
}

impl Component for GenericComponent {
    fn class_name(&self) -> &str {
        &self.class
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_service(&self) -> Option<&dyn Service> {
        Some(self)
    }
}

impl Service for GenericComponent {
    fn register(&self) -> Result<(), BoxError> {
        trace!("register: {}", self.class);
        self.registrations.set(self.registrations.get() + 1);
        Ok(())
    }
}

/// Turns dependency plans into containers.
#[derive(Debug, Clone, Default)]
pub struct ContainerBuilder {
    factories: FactoryRegistry,
}

impl ContainerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_factories(factories: FactoryRegistry) -> Self {
        Self { factories }
    }

    pub fn factories(&self) -> &FactoryRegistry {
        &self.factories
    }

    pub fn factories_mut(&mut self) -> &mut FactoryRegistry {
        &mut self.factories
    }

    /// Nothing is instantiated until first requested.
    pub fn build(&self, tree: DependencyTree) -> Container {
        debug!("build: container over {} planned classes", tree.len());
        Container {
            tree,
            factories: self.factories.clone(),
            instances: HashMap::new(),
            constructing: Vec::new(),
        }
    }
}

/// Lazily instantiating container. One instance per class per container.
pub struct Container {
    tree: DependencyTree,
    factories: FactoryRegistry,
    instances: HashMap<String, Instance>,
    constructing: Vec<String>,
}

impl Container {
    /// Get the instance of `class`, constructing it and its dependencies on first use.
    ///
    /// `class` is matched ignoring ASCII case.
    pub fn get(&mut self, class: &str) -> ApplicationResult<Instance> {
        let name = self
            .tree
            .canonical_name(class)
            .map(str::to_string)
            .ok_or_else(|| {
                ApplicationError::UnknownService(normalize_class_name(class).to_string())
            })?;
        let name = name.as_str();
        if let Some(instance) = self.instances.get(name) {
            return Ok(Rc::clone(instance));
        }
        let entry = self.tree.get(name).cloned().unwrap_or_default();

        if self.constructing.iter().any(|c| c == name) {
            let mut path = self.constructing.clone();
            path.push(name.to_string());
            return Err(DomainError::CyclicDependency {
                class: name.to_string(),
                path,
            }
            .into());
        }

        self.constructing.push(name.to_string());
        let instance = self.construct(name, &entry.arguments);
        self.constructing.pop();

        let instance = instance?;
        self.instances.insert(name.to_string(), Rc::clone(&instance));
        Ok(instance)
    }

    fn construct(&mut self, name: &str, arguments: &[Argument]) -> ApplicationResult<Instance> {
        let mut args = Vec::with_capacity(arguments.len());
        for argument in arguments {
            args.push(match argument {
                Argument::Class(dependency) => Arg::Instance(self.get(dependency)?),
                Argument::Value(value) => Arg::Value(value.clone()),
            });
        }

        match self.factories.get(name) {
            Some(factory) => {
                trace!("construct: {} via factory", name);
                (**factory)(&args).map_err(|source| ApplicationError::FactoryFailed {
                    class: name.to_string(),
                    source,
                })
            }
            None => {
                trace!("construct: {} as generic component", name);
                let component: Instance = Rc::new(GenericComponent::new(name, args));
                Ok(component)
            }
        }
    }

    /// Is `class` part of the plan?
    pub fn has(&self, class: &str) -> bool {
        self.tree.contains(class)
    }

    /// Already constructed?
    pub fn is_instantiated(&self, class: &str) -> bool {
        self.tree
            .canonical_name(class)
            .is_some_and(|name| self.instances.contains_key(name))
    }

    /// Number of constructed instances.
    pub fn instantiated(&self) -> usize {
        self.instances.len()
    }

    pub fn plan(&self) -> &DependencyTree {
        &self.tree
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("planned", &self.tree.len())
            .field("instantiated", &self.instances.len())
            .finish()
    }
}
