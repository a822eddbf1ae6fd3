//! Autowiring: build the dependency tree for a set of root classes.

use tracing::{debug, trace};

use crate::domain::entities::{
    normalize_class_name, Argument, ClassDescriptor, ConstructorParameter, DependencyEntry,
    DependencyTree, Literal, ManualOverrideMap, TypeKind,
};
use crate::domain::error::{DomainError, DomainResult};
use crate::domain::heuristic::match_by_parameter_name;
use crate::domain::inspector::{SignatureInspector, UniverseInspector};
use crate::domain::universe::ClassUniverse;

/// Outcome of a resolution run.
#[derive(Debug, Clone, Default)]
pub struct Resolution {
    /// Closed, acyclic plan for every root that could be resolved
    pub tree: DependencyTree,
    /// Failures collected in partial mode (always empty in strict mode)
    pub failures: Vec<DomainError>,
}

impl Resolution {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Resolve `roots` against `universe`.
///
/// Strict mode (`allow_partial = false`) stops at the first failure. Partial
/// mode records every failure and leaves failing classes out of the tree.
pub fn resolve<S: AsRef<str>>(
    universe: &ClassUniverse,
    roots: &[S],
    overrides: &ManualOverrideMap,
    allow_partial: bool,
) -> DomainResult<Resolution> {
    Autowirer::new(universe, overrides).resolve(roots, allow_partial)
}

/// Recursive, memoizing constructor-argument resolver.
pub struct Autowirer<'a, I: SignatureInspector = UniverseInspector<'a>> {
    universe: &'a ClassUniverse,
    inspector: I,
    overrides: &'a ManualOverrideMap,
    tree: DependencyTree,
    in_progress: Vec<String>,
}

impl<'a> Autowirer<'a, UniverseInspector<'a>> {
    pub fn new(universe: &'a ClassUniverse, overrides: &'a ManualOverrideMap) -> Self {
        Self::with_inspector(universe, UniverseInspector::new(universe), overrides)
    }
}

impl<'a, I: SignatureInspector> Autowirer<'a, I> {
    pub fn with_inspector(
        universe: &'a ClassUniverse,
        inspector: I,
        overrides: &'a ManualOverrideMap,
    ) -> Self {
        Self {
            universe,
            inspector,
            overrides,
            tree: DependencyTree::new(),
            in_progress: Vec::new(),
        }
    }

    pub fn resolve<S: AsRef<str>>(
        mut self,
        roots: &[S],
        allow_partial: bool,
    ) -> DomainResult<Resolution> {
        debug!(
            "resolve: {} roots, partial={}",
            roots.len(),
            allow_partial
        );
        let mut failures = Vec::new();
        for root in roots {
            match self.resolve_class(root.as_ref()) {
                Ok(_) => {}
                Err(e) if allow_partial => {
                    debug!("resolve: skipping {}: {}", root.as_ref(), e);
                    failures.push(e);
                }
                Err(e) => return Err(e),
            }
        }
        debug!(
            "resolve: {} classes planned, {} failures",
            self.tree.len(),
            failures.len()
        );
        Ok(Resolution {
            tree: self.tree,
            failures,
        })
    }

    /// Resolve one class and its dependencies; returns its canonical name.
    fn resolve_class(&mut self, name: &str) -> DomainResult<String> {
        let universe = self.universe;
        let class = universe
            .get(name)
            .ok_or_else(|| DomainError::UnknownClass(normalize_class_name(name).to_string()))?;
        if self.tree.contains(&class.name) {
            return Ok(class.name.clone());
        }
        if !class.is_constructible() {
            return Err(DomainError::NotInstantiable(class.name.clone()));
        }
        if self.in_progress.iter().any(|c| c == &class.name) {
            let mut path = self.in_progress.clone();
            path.push(class.name.clone());
            return Err(DomainError::CyclicDependency {
                class: class.name.clone(),
                path,
            });
        }

        self.in_progress.push(class.name.clone());
        let entry = self.build_entry(class);
        self.in_progress.pop();

        let entry = entry?;
        trace!("resolve_class: {} -> {} args", class.name, entry.arguments.len());
        self.tree.insert(class.name.clone(), entry);
        Ok(class.name.clone())
    }

    fn build_entry(&mut self, class: &'a ClassDescriptor) -> DomainResult<DependencyEntry> {
        let parameters = self.inspector.constructor_parameters(class);
        let mut arguments = Vec::with_capacity(parameters.len());
        for parameter in &parameters {
            arguments.push(self.resolve_parameter(class, parameter)?);
        }
        Ok(DependencyEntry::new(arguments))
    }

    fn resolve_parameter(
        &mut self,
        class: &ClassDescriptor,
        parameter: &ConstructorParameter,
    ) -> DomainResult<Argument> {
        let overrides = self.overrides;
        let manual = overrides
            .lookup(&class.name, parameter.position, &parameter.name);

        match parameter.kind {
            TypeKind::Concrete => {
                if let Some(value) = manual {
                    return self.override_argument(value);
                }
                let target = parameter.type_name.as_deref().unwrap_or_default();
                Ok(Argument::Class(self.resolve_class(target)?))
            }
            TypeKind::Capability => self.resolve_capability(class, parameter, manual),
            TypeKind::Primitive | TypeKind::Untyped => match (manual, &parameter.default) {
                (Some(value), _) => Ok(Argument::Value(value.clone())),
                (None, Some(default)) => Ok(Argument::Value(default.clone())),
                (None, None) => Err(DomainError::UnresolvedPrimitiveDependency {
                    class: class.name.clone(),
                    parameter: parameter.name.clone(),
                }),
            },
            TypeKind::Unknown => match (manual, &parameter.default) {
                (Some(value), _) => self.override_argument(value),
                (None, Some(default)) => Ok(Argument::Value(default.clone())),
                (None, None) => Err(DomainError::UnknownClassDependency {
                    class: class.name.clone(),
                    parameter: parameter.name.clone(),
                    type_name: parameter.type_name.clone().unwrap_or_default(),
                }),
            },
        }
    }

    fn resolve_capability(
        &mut self,
        class: &ClassDescriptor,
        parameter: &ConstructorParameter,
        manual: Option<&'a Literal>,
    ) -> DomainResult<Argument> {
        let capability = parameter.type_name.as_deref().unwrap_or_default();
        let universe = self.universe;
        let candidates = universe.implementors(capability);

        if let [only] = candidates.as_slice() {
            return Ok(Argument::Class(self.resolve_class(&only.name)?));
        }
        if let Some(value) = manual {
            return self.override_argument(value);
        }
        if candidates.len() > 1 {
            if let Some(picked) = match_by_parameter_name(&parameter.name, capability, &candidates) {
                debug!(
                    "resolve: {}::${} matched {} by name",
                    class.name, parameter.name, picked.name
                );
                return Ok(Argument::Class(self.resolve_class(&picked.name)?));
            }
        }
        if let Some(default) = &parameter.default {
            return Ok(Argument::Value(default.clone()));
        }
        Err(DomainError::AmbiguousOrUnresolvedCapabilityDependency {
            class: class.name.clone(),
            parameter: parameter.name.clone(),
            capability: capability.to_string(),
            candidates: candidates.iter().map(|c| c.name.clone()).collect(),
        })
    }

    /// A string naming a known class is wired as that class, anything else is a literal.
    fn override_argument(&mut self, value: &Literal) -> DomainResult<Argument> {
        if let Some(name) = value.as_str() {
            if self.universe.contains(name) {
                return Ok(Argument::Class(self.resolve_class(name)?));
            }
        }
        Ok(Argument::Value(value.clone()))
    }
}
