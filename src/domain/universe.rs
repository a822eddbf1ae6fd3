//! The set of discovered classes and the type relations between them.

use std::collections::{HashMap, HashSet};

use tracing::warn;

use crate::domain::entities::{normalize_class_name, ClassDescriptor, DeclaredParameter, MethodSignature};

/// Method name that marks a class as a service.
pub const REGISTER_METHOD: &str = "register";

/// Discovered classes in discovery order, indexed by name.
///
/// Lookups are case-insensitive, matching how class names resolve at runtime.
#[derive(Debug, Clone, Default)]
pub struct ClassUniverse {
    classes: Vec<ClassDescriptor>,
    index: HashMap<String, usize>,
}

impl ClassUniverse {
    /// Freeze a set of descriptors. The first declaration of a name wins.
    pub fn new(classes: Vec<ClassDescriptor>) -> Self {
        let mut universe = Self::default();
        for class in classes {
            let key = class.name.to_ascii_lowercase();
            if universe.index.contains_key(&key) {
                warn!(
                    "duplicate declaration of {} ignored ({})",
                    class.name,
                    class
                        .location
                        .as_ref()
                        .map(|l| l.file.display().to_string())
                        .unwrap_or_default()
                );
                continue;
            }
            universe.index.insert(key, universe.classes.len());
            universe.classes.push(class);
        }

        let service_flags: Vec<bool> = universe
            .classes
            .iter()
            .map(|c| {
                c.is_constructible()
                    && universe
                        .find_method(&c.name, REGISTER_METHOD)
                        .is_some_and(MethodSignature::is_nullary_instance_method)
            })
            .collect();
        for (class, is_service) in universe.classes.iter_mut().zip(service_flags) {
            class.is_service = is_service;
        }
        universe
    }

    pub fn get(&self, name: &str) -> Option<&ClassDescriptor> {
        let key = normalize_class_name(name).to_ascii_lowercase();
        self.index.get(&key).map(|&i| &self.classes[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// All descriptors in discovery order.
    pub fn iter(&self) -> std::slice::Iter<'_, ClassDescriptor> {
        self.classes.iter()
    }

    /// Classes that can be instantiated.
    pub fn constructible(&self) -> impl Iterator<Item = &ClassDescriptor> {
        self.classes.iter().filter(|c| c.is_constructible())
    }

    /// Transitive supertypes (parents, interfaces, traits) of a class.
    ///
    /// Names outside the universe are included but not expanded further.
    /// Inheritance loops in broken sources terminate.
    pub fn ancestors(&self, name: &str) -> Vec<String> {
        let mut seen: HashSet<String> = HashSet::new();
        let mut result = Vec::new();
        let mut stack: Vec<String> = Vec::new();
        if let Some(class) = self.get(name) {
            seen.insert(class.name.to_ascii_lowercase());
            stack.extend(Self::direct_supertypes(class).rev());
        }
        while let Some(current) = stack.pop() {
            if !seen.insert(current.to_ascii_lowercase()) {
                continue;
            }
            match self.get(&current) {
                Some(class) => {
                    result.push(class.name.clone());
                    stack.extend(Self::direct_supertypes(class).rev());
                }
                None => result.push(current),
            }
        }
        result
    }

    fn direct_supertypes(class: &ClassDescriptor) -> impl DoubleEndedIterator<Item = String> + '_ {
        class
            .parent
            .iter()
            .chain(class.interfaces.iter())
            .chain(class.traits.iter())
            .cloned()
    }

    pub fn is_subtype_of(&self, class: &str, supertype: &str) -> bool {
        let supertype = normalize_class_name(supertype);
        self.ancestors(class)
            .iter()
            .any(|a| a.eq_ignore_ascii_case(supertype))
    }

    /// Constructible classes that extend or implement `capability`, in discovery order.
    pub fn implementors(&self, capability: &str) -> Vec<&ClassDescriptor> {
        self.constructible()
            .filter(|c| self.is_subtype_of(&c.name, capability))
            .collect()
    }

    /// Method lookup through the class, its traits and its parent chain.
    pub fn find_method(&self, class: &str, method: &str) -> Option<&MethodSignature> {
        self.walk_hierarchy(class, |c| c.own_method(method))
    }

    /// Constructor in effect for a class: its own, a trait's, or the nearest parent's.
    pub fn constructor_of(&self, class: &str) -> Option<(&ClassDescriptor, &[DeclaredParameter])> {
        self.walk_hierarchy(class, |c| c.constructor.as_deref().map(|params| (c, params)))
    }

    fn walk_hierarchy<'a, T>(
        &'a self,
        class: &str,
        find: impl Fn(&'a ClassDescriptor) -> Option<T>,
    ) -> Option<T> {
        let mut visited: HashSet<String> = HashSet::new();
        let mut current = self.get(class);
        while let Some(c) = current {
            if !visited.insert(c.name.to_ascii_lowercase()) {
                return None;
            }
            if let Some(found) = find(c) {
                return Some(found);
            }
            if let Some(found) = c
                .traits
                .iter()
                .filter_map(|t| self.get(t))
                .find_map(|t| find(t))
            {
                return Some(found);
            }
            current = c.parent.as_deref().and_then(|p| self.get(p));
        }
        None
    }
}

impl<'a> IntoIterator for &'a ClassUniverse {
    type Item = &'a ClassDescriptor;
    type IntoIter = std::slice::Iter<'a, ClassDescriptor>;

    fn into_iter(self) -> Self::IntoIter {
        self.classes.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::source::parse_source;

    fn universe(source: &str) -> ClassUniverse {
        ClassUniverse::new(parse_source(source))
    }

    #[test]
    fn given_interface_hierarchy_when_finding_implementors_then_includes_indirect_ones() {
        let u = universe(
            r#"<?php
namespace App;
interface Logger {}
interface FileLogger extends Logger {}
abstract class BaseLogger implements FileLogger {}
class RotatingLogger extends BaseLogger {}
class NullLogger implements Logger {}
class Unrelated {}
"#,
        );
        let names: Vec<&str> = u
            .implementors("App\\Logger")
            .iter()
            .map(|c| c.name.as_str())
            .collect();
        assert_eq!(names, vec!["App\\RotatingLogger", "App\\NullLogger"]);
        assert!(u.is_subtype_of("App\\RotatingLogger", "\\App\\Logger"));
    }

    #[test]
    fn given_inherited_register_when_building_universe_then_child_is_service() {
        let u = universe(
            r#"<?php
namespace App;
abstract class Base { public function register(): void {} }
class Child extends Base {}
class Helper { public static function register() {} }
class Needy { public function register($container) {} }
"#,
        );
        assert!(!u.get("App\\Base").unwrap().is_service);
        assert!(u.get("App\\Child").unwrap().is_service);
        assert!(!u.get("App\\Helper").unwrap().is_service);
        assert!(!u.get("App\\Needy").unwrap().is_service);
    }

    #[test]
    fn given_register_from_trait_when_building_universe_then_class_is_service() {
        let u = universe(
            r#"<?php
namespace App;
trait Registers { public function register() {} }
class Feature { use Registers; }
"#,
        );
        assert!(u.get("app\\feature").unwrap().is_service);
    }

    #[test]
    fn given_child_without_constructor_when_looking_up_then_inherits_parent_constructor() {
        let u = universe(
            r#"<?php
namespace App;
class Base { public function __construct(Dep $dep) {} }
class Child extends Base {}
class Dep {}
"#,
        );
        let (declaring, params) = u.constructor_of("App\\Child").unwrap();
        assert_eq!(declaring.name, "App\\Base");
        assert_eq!(params.len(), 1);
    }

    #[test]
    fn given_inheritance_loop_when_walking_ancestors_then_terminates() {
        let u = universe("<?php class A extends B {} class B extends A {}");
        assert_eq!(u.ancestors("A"), vec!["B".to_string()]);
        assert!(u.constructor_of("A").is_none());
    }

    #[test]
    fn given_duplicate_declaration_when_building_universe_then_first_wins() {
        let u = universe("<?php class A { public function register() {} } class A {}");
        assert_eq!(u.len(), 1);
        assert!(u.get("A").unwrap().is_service);
    }
}
