//! Domain entities: core data structures

use std::collections::btree_map;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Strip the leading namespace separator from a class name.
///
/// `\App\Mailer` and `App\Mailer` name the same class.
pub fn normalize_class_name(name: &str) -> &str {
    name.trim_start_matches('\\')
}

/// Expand `~`, `$VAR` and `${VAR}` in a path-like string.
pub fn expand_env_vars(path: &str) -> String {
    shellexpand::full(path)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| path.to_string())
}

/// Namespace prefix mapped to one or more source directories (PSR-4 convention).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceMapping {
    /// Namespace prefix, always ending with `\` unless empty (e.g. `App\`)
    pub prefix: String,
    /// Directories holding the classes of this prefix
    pub directories: Vec<PathBuf>,
}

impl NamespaceMapping {
    pub fn new(prefix: &str, directories: Vec<PathBuf>) -> Self {
        let trimmed = prefix.trim_matches('\\');
        let prefix = if trimmed.is_empty() {
            String::new()
        } else {
            format!("{trimmed}\\")
        };
        Self {
            prefix,
            directories,
        }
    }
}

/// Kind of class-like declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassKind {
    Class,
    Interface,
    Trait,
    Enum,
}

impl fmt::Display for ClassKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ClassKind::Class => "class",
            ClassKind::Interface => "interface",
            ClassKind::Trait => "trait",
            ClassKind::Enum => "enum",
        };
        f.write_str(s)
    }
}

/// Where a class was discovered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
    /// Source file declaring the class
    pub file: PathBuf,
    /// Namespace prefix of the mapping the file was found through
    pub mapping_prefix: String,
    /// Mapped directory the file was found under
    pub mapping_dir: PathBuf,
}

/// A parameter type as written in source, with class names fully qualified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeclaredType {
    /// No type declaration
    None,
    /// Built-in type (`string`, `int`, `array`, ...), lower-cased
    Builtin(String),
    /// Class-like type, fully qualified
    Named(String),
    /// Union, intersection or DNF type, kept as written
    Composite(String),
}

/// Constructor or method parameter as declared in source.
#[derive(Debug, Clone, PartialEq)]
pub struct DeclaredParameter {
    pub name: String,
    pub declared_type: DeclaredType,
    pub default: Option<Literal>,
    pub variadic: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Public,
    Protected,
    Private,
}

/// Method signature summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodSignature {
    pub name: String,
    pub visibility: Visibility,
    pub is_static: bool,
    pub is_abstract: bool,
    /// Number of parameters a caller must supply
    pub required_params: usize,
}

impl MethodSignature {
    /// Callable on an instance without arguments.
    pub fn is_nullary_instance_method(&self) -> bool {
        self.visibility == Visibility::Public
            && !self.is_static
            && !self.is_abstract
            && self.required_params == 0
    }
}

/// A discovered class, interface, trait or enum.
///
/// Built by the source parser, completed by the scanner (location) and frozen
/// by [`ClassUniverse`](crate::domain::ClassUniverse) (service flag).
#[derive(Debug, Clone, PartialEq)]
pub struct ClassDescriptor {
    /// Fully-qualified name without leading separator
    pub name: String,
    /// Declared namespace (empty for the global namespace)
    pub namespace: String,
    pub short_name: String,
    pub kind: ClassKind,
    pub is_abstract: bool,
    /// Parent class (classes only), fully qualified
    pub parent: Option<String>,
    /// Implemented interfaces, or extended interfaces for an interface
    pub interfaces: Vec<String>,
    /// Traits used by the class body
    pub traits: Vec<String>,
    /// Own constructor parameters; `None` when no constructor is declared
    pub constructor: Option<Vec<DeclaredParameter>>,
    pub methods: Vec<MethodSignature>,
    pub location: Option<SourceLocation>,
    /// Exposes a no-argument `register()` (own, inherited or from a trait)
    pub is_service: bool,
}

impl ClassDescriptor {
    pub fn new(namespace: &str, short_name: &str, kind: ClassKind) -> Self {
        let namespace = normalize_class_name(namespace).trim_end_matches('\\');
        let name = if namespace.is_empty() {
            short_name.to_string()
        } else {
            format!("{namespace}\\{short_name}")
        };
        Self {
            name,
            namespace: namespace.to_string(),
            short_name: short_name.to_string(),
            kind,
            is_abstract: false,
            parent: None,
            interfaces: Vec::new(),
            traits: Vec::new(),
            constructor: None,
            methods: Vec::new(),
            location: None,
            is_service: false,
        }
    }

    pub fn is_interface(&self) -> bool {
        self.kind == ClassKind::Interface
    }

    /// Concrete class that can be instantiated.
    pub fn is_constructible(&self) -> bool {
        self.kind == ClassKind::Class && !self.is_abstract
    }

    /// Interface or abstract class: a type that needs an implementor.
    pub fn is_capability(&self) -> bool {
        matches!(self.kind, ClassKind::Interface | ClassKind::Trait)
            || (self.kind == ClassKind::Class && self.is_abstract)
    }

    /// Method declared directly on this class (case-insensitive, like PHP).
    pub fn own_method(&self, name: &str) -> Option<&MethodSignature> {
        self.methods
            .iter()
            .find(|m| m.name.eq_ignore_ascii_case(name))
    }
}

/// Literal construction value.
///
/// Serialized untagged so that override tables read naturally
/// (`["smtp.local", 25, true]`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Literal {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Literal>),
    /// Constant expression that is not a plain literal (`self::DEFAULT`)
    Expr { expr: String },
}

impl Literal {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Literal::Str(s) => Some(s),
            _ => None,
        }
    }

    /// False for `inf`/`NaN` floats, which JSON cannot represent.
    pub fn is_finite(&self) -> bool {
        match self {
            Literal::Float(f) => f.is_finite(),
            Literal::List(items) => items.iter().all(Literal::is_finite),
            _ => true,
        }
    }
}

impl From<&str> for Literal {
    fn from(value: &str) -> Self {
        Literal::Str(value.to_string())
    }
}

impl From<String> for Literal {
    fn from(value: String) -> Self {
        Literal::Str(value)
    }
}

impl From<i64> for Literal {
    fn from(value: i64) -> Self {
        Literal::Int(value)
    }
}

impl From<bool> for Literal {
    fn from(value: bool) -> Self {
        Literal::Bool(value)
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Null => f.write_str("null"),
            Literal::Bool(b) => write!(f, "{b}"),
            Literal::Int(i) => write!(f, "{i}"),
            Literal::Float(x) => write!(f, "{x:?}"),
            Literal::Str(s) => write!(f, "'{}'", s.replace('\\', "\\\\").replace('\'', "\\'")),
            Literal::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Literal::Expr { expr } => f.write_str(expr),
        }
    }
}

/// How a constructor parameter's declared type was classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKind {
    /// Instantiable class in the universe
    Concrete,
    /// Interface or abstract class in the universe
    Capability,
    /// Built-in type
    Primitive,
    /// No usable type (absent, union, intersection)
    Untyped,
    /// Class-like name not present in the universe
    Unknown,
}

/// Classified constructor parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstructorParameter {
    pub position: usize,
    pub name: String,
    pub kind: TypeKind,
    /// Referenced type name for `Concrete`, `Capability` and `Unknown`
    pub type_name: Option<String>,
    pub default: Option<Literal>,
}

impl ConstructorParameter {
    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }
}

/// One resolved construction argument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Argument {
    /// Another class from the plan, constructed recursively
    Class(String),
    /// Literal value passed as-is
    Value(Literal),
}

impl Argument {
    pub fn class_name(&self) -> Option<&str> {
        match self {
            Argument::Class(name) => Some(name),
            Argument::Value(_) => None,
        }
    }
}

impl fmt::Display for Argument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Argument::Class(name) => f.write_str(name),
            Argument::Value(value) => write!(f, "= {value}"),
        }
    }
}

/// Ordered construction arguments for one class.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DependencyEntry {
    pub arguments: Vec<Argument>,
}

impl DependencyEntry {
    pub fn new(arguments: Vec<Argument>) -> Self {
        Self { arguments }
    }

    /// Class-valued arguments, in order.
    pub fn class_dependencies(&self) -> impl Iterator<Item = &str> {
        self.arguments.iter().filter_map(Argument::class_name)
    }
}

/// Resolved construction plan: class name to its arguments.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DependencyTree {
    entries: BTreeMap<String, DependencyEntry>,
}

impl DependencyTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, class: impl Into<String>, entry: DependencyEntry) {
        self.entries.insert(class.into(), entry);
    }

    /// Planned spelling of `class`. Lookup ignores ASCII case.
    pub fn canonical_name(&self, class: &str) -> Option<&str> {
        let name = normalize_class_name(class);
        if let Some((key, _)) = self.entries.get_key_value(name) {
            return Some(key);
        }
        self.entries
            .keys()
            .find(|key| key.eq_ignore_ascii_case(name))
            .map(String::as_str)
    }

    pub fn get(&self, class: &str) -> Option<&DependencyEntry> {
        self.canonical_name(class).and_then(|name| self.entries.get(name))
    }

    pub fn contains(&self, class: &str) -> bool {
        self.canonical_name(class).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, DependencyEntry> {
        self.entries.iter()
    }

    pub fn class_names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Class-valued arguments that are not keys of the tree.
    ///
    /// Empty for every tree produced by a successful resolution.
    pub fn missing_dependencies(&self) -> Vec<(&str, &str)> {
        self.entries
            .iter()
            .flat_map(|(class, entry)| {
                entry
                    .class_dependencies()
                    .filter(|dep| !self.entries.contains_key(*dep))
                    .map(move |dep| (class.as_str(), dep))
            })
            .collect()
    }

    pub fn is_closed(&self) -> bool {
        self.missing_dependencies().is_empty()
    }
}

impl<'a> IntoIterator for &'a DependencyTree {
    type Item = (&'a String, &'a DependencyEntry);
    type IntoIter = btree_map::Iter<'a, String, DependencyEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Manual values for one class: by position, or by parameter name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OverrideSpec {
    Positional(Vec<Literal>),
    Named(BTreeMap<String, Literal>),
}

/// Caller-supplied values for parameters autowiring cannot satisfy.
///
/// A string value that names a known class is wired as that class when the
/// parameter is class-typed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ManualOverrideMap {
    entries: BTreeMap<String, OverrideSpec>,
}

impl ManualOverrideMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Positional values for a class.
    pub fn with_positional(mut self, class: &str, values: Vec<Literal>) -> Self {
        self.entries.insert(
            normalize_class_name(class).to_string(),
            OverrideSpec::Positional(values),
        );
        self
    }

    /// Value for a single named parameter of a class.
    pub fn with_named(mut self, class: &str, parameter: &str, value: Literal) -> Self {
        let key = normalize_class_name(class).to_string();
        let parameter = parameter.trim_start_matches('$').to_string();
        match self.entries.get_mut(&key) {
            Some(OverrideSpec::Named(map)) => {
                map.insert(parameter, value);
            }
            _ => {
                self.entries.insert(
                    key,
                    OverrideSpec::Named(BTreeMap::from([(parameter, value)])),
                );
            }
        }
        self
    }

    /// Override for the parameter at `position` named `name` of `class`.
    pub fn lookup(&self, class: &str, position: usize, name: &str) -> Option<&Literal> {
        let class = normalize_class_name(class);
        let spec = self.entries.get(class).or_else(|| {
            self.entries
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(class))
                .map(|(_, v)| v)
        })?;
        match spec {
            OverrideSpec::Positional(values) => values.get(position),
            OverrideSpec::Named(map) => map.get(name.trim_start_matches('$')),
        }
    }

    /// Merge `other` into `self`; entries of `other` replace same-class entries.
    pub fn extend(&mut self, other: &ManualOverrideMap) {
        for (class, spec) in &other.entries {
            self.entries.insert(class.clone(), spec.clone());
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_prefix_without_separator_when_creating_mapping_then_appends_separator() {
        let mapping = NamespaceMapping::new("\\App", vec![PathBuf::from("src")]);
        assert_eq!(mapping.prefix, "App\\");
        assert_eq!(NamespaceMapping::new("", vec![]).prefix, "");
    }

    #[test]
    fn given_global_namespace_when_creating_descriptor_then_name_is_short_name() {
        let class = ClassDescriptor::new("", "Kernel", ClassKind::Class);
        assert_eq!(class.name, "Kernel");
        let class = ClassDescriptor::new("\\App\\Http\\", "Kernel", ClassKind::Class);
        assert_eq!(class.name, "App\\Http\\Kernel");
        assert_eq!(class.namespace, "App\\Http");
    }

    #[test]
    fn given_tree_with_dangling_argument_when_checking_closure_then_reports_it() {
        let mut tree = DependencyTree::new();
        tree.insert("A", DependencyEntry::new(vec![Argument::Class("B".into())]));
        assert!(!tree.is_closed());
        assert_eq!(tree.missing_dependencies(), vec![("A", "B")]);

        tree.insert("B", DependencyEntry::default());
        assert!(tree.is_closed());
    }

    #[test]
    fn given_positional_and_named_overrides_when_looking_up_then_matches_each_form() {
        let overrides = ManualOverrideMap::new()
            .with_positional("\\App\\Mailer", vec!["smtp.local".into(), Literal::Int(25)])
            .with_named("App\\Cache", "$ttl", Literal::Int(60));

        assert_eq!(
            overrides.lookup("App\\Mailer", 1, "port"),
            Some(&Literal::Int(25))
        );
        assert_eq!(overrides.lookup("App\\Mailer", 2, "tls"), None);
        assert_eq!(
            overrides.lookup("app\\cache", 0, "ttl"),
            Some(&Literal::Int(60))
        );
        assert_eq!(overrides.lookup("App\\Cache", 0, "size"), None);
    }

    #[test]
    fn given_literals_when_displaying_then_renders_source_form() {
        let list = Literal::List(vec![Literal::Int(1), "a'b".into(), Literal::Null]);
        assert_eq!(list.to_string(), "[1, 'a\\'b', null]");
        assert_eq!(Literal::Float(1.5).to_string(), "1.5");
    }

    #[test]
    fn given_override_table_when_deserializing_toml_then_accepts_both_forms() {
        let raw = r#"
"App\\Mailer" = ["smtp.local", 25]
"App\\Cache" = { ttl = 60, prefix = "app" }
"#;
        let overrides: ManualOverrideMap = toml::from_str(raw).expect("parse overrides");
        assert_eq!(overrides.len(), 2);
        assert_eq!(
            overrides.lookup("App\\Mailer", 0, "host"),
            Some(&Literal::Str("smtp.local".into()))
        );
        assert_eq!(
            overrides.lookup("App\\Cache", 3, "prefix"),
            Some(&Literal::Str("app".into()))
        );
    }
}
