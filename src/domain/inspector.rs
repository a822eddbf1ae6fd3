//! Constructor signature inspection.

use crate::domain::entities::{
    ClassDescriptor, ClassKind, ConstructorParameter, DeclaredType, TypeKind,
};
use crate::domain::universe::ClassUniverse;

/// Source of constructor metadata.
///
/// Classification never fails; deciding what to do with a parameter is the
/// resolver's job.
pub trait SignatureInspector {
    fn constructor_parameters(&self, class: &ClassDescriptor) -> Vec<ConstructorParameter>;
}

/// Inspector backed by parsed declarations, classifying types against a universe.
pub struct UniverseInspector<'a> {
    universe: &'a ClassUniverse,
}

impl<'a> UniverseInspector<'a> {
    pub fn new(universe: &'a ClassUniverse) -> Self {
        Self { universe }
    }

    fn classify(&self, declared: &DeclaredType) -> (TypeKind, Option<String>) {
        match declared {
            DeclaredType::None | DeclaredType::Composite(_) => (TypeKind::Untyped, None),
            DeclaredType::Builtin(_) => (TypeKind::Primitive, None),
            DeclaredType::Named(name) => match self.universe.get(name) {
                Some(class) if class.kind == ClassKind::Enum => (TypeKind::Primitive, None),
                Some(class) if class.is_capability() => {
                    (TypeKind::Capability, Some(class.name.clone()))
                }
                Some(class) => (TypeKind::Concrete, Some(class.name.clone())),
                None => (TypeKind::Unknown, Some(name.clone())),
            },
        }
    }
}

impl SignatureInspector for UniverseInspector<'_> {
    fn constructor_parameters(&self, class: &ClassDescriptor) -> Vec<ConstructorParameter> {
        let Some((_, params)) = self.universe.constructor_of(&class.name) else {
            return Vec::new();
        };
        params
            .iter()
            // variadics are optional and take no single argument
            .filter(|p| !p.variadic)
            .enumerate()
            .map(|(position, p)| {
                let (kind, type_name) = self.classify(&p.declared_type);
                ConstructorParameter {
                    position,
                    name: p.name.clone(),
                    kind,
                    type_name,
                    default: p.default.clone(),
                }
            })
            .collect()
    }
}
