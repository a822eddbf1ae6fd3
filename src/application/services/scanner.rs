//! Class discovery over namespace-prefix to directory mappings.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::application::{ApplicationResult, IoResultExt};
use crate::domain::{
    normalize_class_name, parse_source, ClassDescriptor, ClassUniverse, NamespaceMapping,
    SourceLocation,
};
use crate::infrastructure::traits::FileSystem;
use crate::util::path::PathExt;

/// Result of a scan.
#[derive(Debug, Clone, Default)]
pub struct ScanOutcome {
    /// Every class-like declaration found through the mappings
    pub universe: ClassUniverse,
    /// Names under the root namespace, in discovery order
    pub roots: Vec<String>,
}

impl ScanOutcome {
    /// Descriptors of the roots, in discovery order.
    pub fn root_classes(&self) -> impl Iterator<Item = &ClassDescriptor> {
        self.roots.iter().filter_map(|name| self.universe.get(name))
    }

    /// Roots that can be instantiated.
    pub fn constructible_roots(&self) -> Vec<String> {
        self.root_classes()
            .filter(|c| c.is_constructible())
            .map(|c| c.name.clone())
            .collect()
    }

    /// Roots exposing the service capability.
    pub fn service_roots(&self) -> Vec<String> {
        self.root_classes()
            .filter(|c| c.is_service)
            .map(|c| c.name.clone())
            .collect()
    }
}

/// Does `class` live in `root` or one of its sub-namespaces?
///
/// Case-insensitive; an empty root matches everything.
pub fn in_namespace(class: &str, root: &str) -> bool {
    let root = normalize_class_name(root).trim_end_matches('\\');
    if root.is_empty() {
        return true;
    }
    let class = normalize_class_name(class);
    match class.get(..root.len()) {
        Some(head) if head.eq_ignore_ascii_case(root) => {
            class[root.len()..].starts_with('\\')
        }
        _ => false,
    }
}

/// Walks mapped directories and parses every source file found.
pub struct ClassScanner {
    fs: Arc<dyn FileSystem>,
}

impl ClassScanner {
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        Self { fs }
    }

    /// Scan all mappings and collect the classes under `root_namespace`.
    ///
    /// Missing directories and unreadable files are skipped with a warning.
    pub fn scan(&self, mappings: &[NamespaceMapping], root_namespace: &str) -> ScanOutcome {
        debug!(
            "scan: {} mappings, root_namespace='{}'",
            mappings.len(),
            root_namespace
        );
        let mut discovered = Vec::new();
        for mapping in mappings {
            for dir in &mapping.directories {
                discovered.extend(self.scan_directory(mapping, dir));
            }
        }

        let universe = ClassUniverse::new(discovered);
        let roots: Vec<String> = universe
            .iter()
            .filter(|c| in_namespace(&c.name, root_namespace))
            .map(|c| c.name.clone())
            .collect();
        info!(
            "scan: {} classes discovered, {} under root namespace",
            universe.len(),
            roots.len()
        );
        ScanOutcome { universe, roots }
    }

    fn scan_directory(&self, mapping: &NamespaceMapping, dir: &Path) -> Vec<ClassDescriptor> {
        if !self.fs.is_dir(dir) {
            warn!(
                "scan: directory {} for prefix '{}' does not exist, skipped",
                dir.display(),
                mapping.prefix
            );
            return Vec::new();
        }

        let mut found = Vec::new();
        for entry in WalkDir::new(dir).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("scan: cannot read entry under {}: {}", dir.display(), e);
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            if !path.is_class_source() {
                continue;
            }

            match self.parse_file(path) {
                Ok(classes) => {
                    for mut class in classes {
                        class.location = Some(SourceLocation {
                            file: path.to_path_buf(),
                            mapping_prefix: mapping.prefix.clone(),
                            mapping_dir: dir.to_path_buf(),
                        });
                        found.push(class);
                    }
                }
                Err(e) => warn!("scan: {}, skipped", e),
            }
        }
        debug!("scan_directory: {} -> {} classes", dir.display(), found.len());
        found
    }

    fn parse_file(&self, path: &Path) -> ApplicationResult<Vec<ClassDescriptor>> {
        let source = self
            .fs
            .read_to_string(path)
            .with_path_context("read class source", path)?;
        Ok(parse_source(&source))
    }
}
