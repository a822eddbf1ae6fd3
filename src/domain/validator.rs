//! Namespace compliance: a class must live where its namespace says it does.

use std::path::{Component, Path};

use tracing::{debug, trace};

use crate::domain::entities::ClassDescriptor;
use crate::domain::error::{DomainError, DomainResult};

/// Checks that `Prefix\Sub\Name` lives at `<mapped dir>/Sub/Name.php`.
///
/// Comparison ignores ASCII case and treats `\` and `/` alike.
/// Descriptors without a source location are not checked.
#[derive(Debug, Default, Clone, Copy)]
pub struct NamespaceValidator;

impl NamespaceValidator {
    pub fn new() -> Self {
        Self
    }

    /// Check a single class.
    pub fn check(&self, class: &ClassDescriptor) -> DomainResult<()> {
        let Some(location) = &class.location else {
            trace!("check: {} has no location, skipped", class.name);
            return Ok(());
        };

        let prefix = location.mapping_prefix.trim_end_matches('\\');
        let remainder = strip_prefix_ignore_case(&class.namespace, prefix);
        let expected = match remainder {
            Some(rest) => {
                let mut segments: Vec<&str> = rest.split('\\').filter(|s| !s.is_empty()).collect();
                let file_name = format!("{}.php", class.short_name);
                segments.push(&file_name);
                segments.join("/")
            }
            // namespace outside the mapping prefix can never comply
            None => format!("{}\\{}", class.namespace, class.short_name),
        };

        let actual = pathdiff::diff_paths(&location.file, &location.mapping_dir)
            .map(|rel| path_to_slashes(&rel))
            .unwrap_or_else(|| path_to_slashes(&location.file));

        if remainder.is_some() && normalize(&expected) == normalize(&actual) {
            Ok(())
        } else {
            Err(DomainError::NonCompliantNamespaceClass {
                class: class.name.clone(),
                expected,
                actual,
            })
        }
    }

    /// Fail on the first non-compliant class.
    pub fn validate<'c>(&self, classes: impl IntoIterator<Item = &'c ClassDescriptor>) -> DomainResult<()> {
        let mut checked = 0usize;
        for class in classes {
            self.check(class)?;
            checked += 1;
        }
        debug!("validate: {} classes compliant", checked);
        Ok(())
    }

    /// Every violation, in input order.
    pub fn violations<'c>(
        &self,
        classes: impl IntoIterator<Item = &'c ClassDescriptor>,
    ) -> Vec<DomainError> {
        classes
            .into_iter()
            .filter_map(|c| self.check(c).err())
            .collect()
    }
}

fn strip_prefix_ignore_case<'s>(namespace: &'s str, prefix: &str) -> Option<&'s str> {
    if prefix.is_empty() {
        return Some(namespace);
    }
    let head = namespace.get(..prefix.len())?;
    if !head.eq_ignore_ascii_case(prefix) {
        return None;
    }
    let rest = &namespace[prefix.len()..];
    if rest.is_empty() || rest.starts_with('\\') {
        Some(rest)
    } else {
        None
    }
}

fn path_to_slashes(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            Component::ParentDir => Some("..".to_string()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

fn normalize(path: &str) -> String {
    path.replace('\\', "/").to_ascii_lowercase()
}
