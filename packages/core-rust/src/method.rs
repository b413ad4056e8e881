//! Method-name handling: `namespace_method` splitting and namespace rules.

use std::sync::LazyLock;

use regex::Regex;

/// Separator between namespace and method in a full method name.
pub const NAMESPACE_SEPARATOR: char = '_';

static NAMESPACE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9]*$").expect("namespace pattern is valid"));

/// A full method name split into its namespace and method parts.
///
/// `arbtrace_replayBlockTransactions` splits into namespace `arbtrace` and
/// method `replayBlockTransactions`. Only the first separator counts, so
/// method parts may themselves contain `_`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MethodName<'a> {
    pub namespace: &'a str,
    pub method: &'a str,
}

impl<'a> MethodName<'a> {
    /// Splits a full method name. Returns `None` when there is no separator
    /// or either side of it is empty.
    #[must_use]
    pub fn parse(full: &'a str) -> Option<Self> {
        let (namespace, method) = full.split_once(NAMESPACE_SEPARATOR)?;
        if namespace.is_empty() || method.is_empty() {
            return None;
        }
        Some(Self { namespace, method })
    }
}

/// Joins a namespace and method back into a full method name.
#[must_use]
pub fn join_method(namespace: &str, method: &str) -> String {
    format!("{namespace}{NAMESPACE_SEPARATOR}{method}")
}

/// Whether `namespace` is usable as a routing key: ASCII alphanumeric,
/// starting with a letter, with no separator.
#[must_use]
pub fn is_valid_namespace(namespace: &str) -> bool {
    NAMESPACE_PATTERN.is_match(namespace)
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn splits_at_first_separator() {
        let name = MethodName::parse("arbtrace_replayBlockTransactions").unwrap();
        assert_eq!(name.namespace, "arbtrace");
        assert_eq!(name.method, "replayBlockTransactions");

        let nested = MethodName::parse("debug_trace_call").unwrap();
        assert_eq!(nested.namespace, "debug");
        assert_eq!(nested.method, "trace_call");
    }

    #[test]
    fn rejects_names_without_both_parts() {
        assert!(MethodName::parse("modules").is_none());
        assert!(MethodName::parse("_call").is_none());
        assert!(MethodName::parse("arbtrace_").is_none());
        assert!(MethodName::parse("").is_none());
    }

    #[test]
    fn namespace_rules() {
        assert!(is_valid_namespace("arbtrace"));
        assert!(is_valid_namespace("legacyTrace"));
        assert!(is_valid_namespace("web3"));
        assert!(!is_valid_namespace(""));
        assert!(!is_valid_namespace("3d"));
        assert!(!is_valid_namespace("arb_trace"));
        assert!(!is_valid_namespace("arb-trace"));
    }

    proptest! {
        #[test]
        fn join_then_parse_recovers_parts(
            namespace in "[A-Za-z][A-Za-z0-9]{0,12}",
            method in "[A-Za-z0-9_]{1,24}",
        ) {
            let full = join_method(&namespace, &method);
            let name = MethodName::parse(&full).unwrap();
            prop_assert_eq!(name.namespace, namespace.as_str());
            prop_assert_eq!(name.method, method.as_str());
        }
    }
}
