//! Parameter-name tie-breaker for ambiguous capability parameters.
//!
//! Applied after manual overrides and before failing:
//! 1. the parameter name is normalized to a type-name shape
//!    (`file_logger` -> `FileLogger`, `fooBar` -> `FooBar`);
//! 2. the capability's base name drops a trailing `Interface`/`Contract` and
//!    a leading `Abstract` (`LoggerInterface` -> `Logger`);
//! 3. a candidate matches when its short name equals, ignoring ASCII case,
//!    the normalized name or the normalized name followed by the base name;
//! 4. only a single match is accepted.

use itertools::Itertools;

use crate::domain::entities::ClassDescriptor;

/// `$file_logger` -> `FileLogger`.
pub fn type_name_shape(parameter: &str) -> String {
    parameter
        .trim_start_matches('$')
        .split(|c: char| c == '_' || c == '-')
        .filter(|segment| !segment.is_empty())
        .map(|segment| {
            let mut chars = segment.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect()
}

/// `App\LoggerInterface` -> `Logger`.
pub fn capability_base_name(capability: &str) -> &str {
    let short = capability.rsplit('\\').next().unwrap_or(capability);
    let short = short
        .strip_suffix("Interface")
        .or_else(|| short.strip_suffix("Contract"))
        .filter(|s| !s.is_empty())
        .unwrap_or(short);
    short
        .strip_prefix("Abstract")
        .filter(|s| !s.is_empty())
        .unwrap_or(short)
}

/// Pick the single candidate whose short name matches the parameter name.
pub fn match_by_parameter_name<'c>(
    parameter: &str,
    capability: &str,
    candidates: &[&'c ClassDescriptor],
) -> Option<&'c ClassDescriptor> {
    let shape = type_name_shape(parameter);
    if shape.is_empty() {
        return None;
    }
    let qualified = format!("{}{}", shape, capability_base_name(capability));

    candidates
        .iter()
        .filter(|c| {
            c.short_name.eq_ignore_ascii_case(&shape)
                || c.short_name.eq_ignore_ascii_case(&qualified)
        })
        .exactly_one()
        .ok()
        .copied()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::ClassKind;
    use rstest::rstest;

    fn class(name: &str) -> ClassDescriptor {
        ClassDescriptor::new("App", name, ClassKind::Class)
    }

    #[rstest]
    #[case("foo", "Foo")]
    #[case("$foo", "Foo")]
    #[case("file_logger", "FileLogger")]
    #[case("fooBar", "FooBar")]
    #[case("_private", "Private")]
    #[case("__", "")]
    fn given_parameter_name_when_normalizing_then_returns_type_shape(
        #[case] parameter: &str,
        #[case] expected: &str,
    ) {
        assert_eq!(type_name_shape(parameter), expected);
    }

    #[rstest]
    #[case("App\\LoggerInterface", "Logger")]
    #[case("App\\CacheContract", "Cache")]
    #[case("App\\AbstractRepository", "Repository")]
    #[case("App\\Interface", "Interface")]
    #[case("Transport", "Transport")]
    fn given_capability_when_deriving_base_name_then_strips_affixes(
        #[case] capability: &str,
        #[case] expected: &str,
    ) {
        assert_eq!(capability_base_name(capability), expected);
    }

    #[test]
    fn given_parameter_named_like_candidate_when_matching_then_picks_it() {
        let foo = class("Foo");
        let bar = class("Bar");
        let picked = match_by_parameter_name("foo", "App\\I", &[&foo, &bar]);
        assert_eq!(picked.map(|c| c.name.as_str()), Some("App\\Foo"));
    }

    #[test]
    fn given_parameter_prefixing_capability_when_matching_then_picks_qualified_candidate() {
        let file = class("FileLogger");
        let null = class("NullLogger");
        let picked = match_by_parameter_name("file", "App\\LoggerInterface", &[&file, &null]);
        assert_eq!(picked.map(|c| c.name.as_str()), Some("App\\FileLogger"));
    }

    #[test]
    fn given_no_or_several_matches_when_matching_then_returns_none() {
        let foo = class("Foo");
        let foo_logger = class("FooLogger");
        let bar = class("Bar");
        assert!(match_by_parameter_name("baz", "App\\I", &[&foo, &bar]).is_none());
        assert!(match_by_parameter_name("foo", "App\\Logger", &[&foo, &foo_logger]).is_none());
    }
}
