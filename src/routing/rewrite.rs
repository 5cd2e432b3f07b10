//! Path prefix rewriting.
//!
//! # Responsibilities
//! - Apply a route's rewrite rules to the request path before forwarding
//! - Leave the query string and body untouched
//!
//! # Design Decisions
//! - Patterns are start-anchored literal prefixes, not regexes; a leading
//!   `^` is accepted for familiarity and stripped at compile time
//! - Rules are tried in insertion order and only the first match applies

/// A compiled rewrite rule: anchored literal prefix → replacement.
#[derive(Debug, Clone)]
pub struct RewriteRule {
    pattern: String,
    replacement: String,
}

impl RewriteRule {
    /// Compile a rule, stripping an optional leading `^` anchor.
    pub fn new(pattern: &str, replacement: &str) -> Self {
        let pattern = pattern.strip_prefix('^').unwrap_or(pattern);
        Self {
            pattern: pattern.to_string(),
            replacement: replacement.to_string(),
        }
    }
}

/// Rewrite `path` using the first matching rule, or return it unchanged.
///
/// A rewrite that consumes the whole path yields `/` so the outbound
/// request line stays valid.
pub fn rewrite_path(path: &str, rules: &[RewriteRule]) -> String {
    for rule in rules {
        if let Some(rest) = path.strip_prefix(&rule.pattern) {
            let rewritten = format!("{}{}", rule.replacement, rest);
            if rewritten.is_empty() {
                return "/".to_string();
            }
            return rewritten;
        }
    }
    path.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_prefix() {
        let rules = [RewriteRule::new("^/dapi", "")];
        assert_eq!(rewrite_path("/dapi/v1/users", &rules), "/v1/users");
    }

    #[test]
    fn replaces_prefix() {
        let rules = [RewriteRule::new("^/dapi", "/api")];
        assert_eq!(rewrite_path("/dapi/v1/users", &rules), "/api/v1/users");
    }

    #[test]
    fn identity_rewrite_is_noop() {
        let rules = [RewriteRule::new("^/mqtt", "/mqtt")];
        assert_eq!(rewrite_path("/mqtt/x", &rules), "/mqtt/x");
    }

    #[test]
    fn no_rules_returns_path_unchanged() {
        assert_eq!(rewrite_path("/api/v1", &[]), "/api/v1");
    }

    #[test]
    fn only_first_matching_rule_applies() {
        let rules = [
            RewriteRule::new("^/a", "/one"),
            RewriteRule::new("^/a/b", "/two"),
        ];
        assert_eq!(rewrite_path("/a/b/c", &rules), "/one/b/c");
    }

    #[test]
    fn non_matching_rule_is_skipped() {
        let rules = [
            RewriteRule::new("^/other", "/x"),
            RewriteRule::new("^/osrm", ""),
        ];
        assert_eq!(rewrite_path("/osrm/route/v1", &rules), "/route/v1");
    }

    #[test]
    fn whole_path_consumed_yields_root() {
        let rules = [RewriteRule::new("^/osrm", "")];
        assert_eq!(rewrite_path("/osrm", &rules), "/");
    }
}
