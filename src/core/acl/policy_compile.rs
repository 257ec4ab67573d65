// src/core/acl/policy_compile.rs

//! Compiles a policy's raw rule text into an efficient internal form once,
//! at upsert time, instead of re-parsing on every permission check. Mirrors
//! `spineldb::core::acl::enforcer::AclEnforcer::parse_pattern_rule` /
//! `parse_command_rule`: glob patterns become compiled regexes, and
//! `+capability` / `-capability` / `+@category` / `-@category` lines become
//! a small typed rule enum.
//!
//! Rule text grammar, one rule per line, blank lines and `#` comments
//! ignored:
//!
//! ```text
//! ~<namespace-glob> +<capability>
//! ~<namespace-glob> -<capability>
//! ~<namespace-glob> +@<category>
//! ~<namespace-glob> -@<category>
//! ```

use crate::core::domain::PolicyName;
use crate::core::errors::OrchError;
use regex::Regex;
use tracing::warn;

#[derive(Debug, Clone)]
pub enum CapabilityRule {
    Allow(String),
    Deny(String),
    AllowCategory(Vec<&'static str>),
    DenyCategory(Vec<&'static str>),
}

#[derive(Debug, Clone)]
pub struct NamespaceRule {
    pattern: Regex,
    rules: Vec<CapabilityRule>,
}

#[derive(Debug, Clone)]
pub struct ParsedPolicy {
    pub name: PolicyName,
    namespace_rules: Vec<NamespaceRule>,
}

impl ParsedPolicy {
    pub fn allows(&self, capability: &str, namespace: &str) -> bool {
        let mut verdict = false;
        for ns_rule in &self.namespace_rules {
            if !ns_rule.pattern.is_match(namespace) {
                continue;
            }
            for rule in &ns_rule.rules {
                match rule {
                    CapabilityRule::Allow(c) if c == capability => verdict = true,
                    CapabilityRule::AllowCategory(cats) if cats.contains(&capability) => {
                        verdict = true
                    }
                    CapabilityRule::Deny(c) if c == capability => return false,
                    CapabilityRule::DenyCategory(cats) if cats.contains(&capability) => {
                        return false;
                    }
                    _ => {}
                }
            }
        }
        verdict
    }
}

fn category_capabilities(cat: &str) -> Vec<&'static str> {
    match cat {
        "read" => vec!["read-job", "list-jobs", "list-deployments", "read-deployment"],
        "write" => vec!["submit-job", "dispatch-job", "set-alloc-health", "promote"],
        "all" => vec![
            "read-job",
            "list-jobs",
            "list-deployments",
            "read-deployment",
            "submit-job",
            "dispatch-job",
            "destroy-job",
            "set-alloc-health",
            "promote",
            "pause",
            "fail",
        ],
        _ => vec![],
    }
}

/// Turns a glob (`*`, `?`) namespace pattern into an anchored regex, the way
/// `AclEnforcer::parse_pattern_rule` turns key/channel globs into regexes.
fn glob_to_regex(glob: &str) -> Result<Regex, regex::Error> {
    let mut pattern = String::with_capacity(glob.len() * 2 + 2);
    pattern.push('^');
    for c in glob.chars() {
        match c {
            '*' => pattern.push_str(".*"),
            '?' => pattern.push('.'),
            _ => pattern.push_str(&regex::escape(&c.to_string())),
        }
    }
    pattern.push('$');
    Regex::new(&pattern)
}

pub fn compile(name: &PolicyName, rules_text: &str) -> Result<ParsedPolicy, OrchError> {
    let mut namespace_rules = Vec::new();

    for (lineno, raw_line) in rules_text.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some(rest) = line.strip_prefix('~') else {
            return Err(OrchError::Validation(format!(
                "policy {name}: line {}: expected a namespace rule starting with '~'",
                lineno + 1
            )));
        };

        let mut parts = rest.splitn(2, char::is_whitespace);
        let glob = parts.next().unwrap_or("").trim();
        let capability_spec = parts.next().unwrap_or("").trim();
        if glob.is_empty() || capability_spec.is_empty() {
            return Err(OrchError::Validation(format!(
                "policy {name}: line {}: malformed rule",
                lineno + 1
            )));
        }

        let pattern = glob_to_regex(glob).map_err(|e| {
            warn!(%name, glob, "invalid namespace glob in policy rule: {e}");
            OrchError::Validation(format!("policy {name}: invalid namespace glob '{glob}'"))
        })?;

        let rule = if let Some(cat) = capability_spec.strip_prefix("+@") {
            CapabilityRule::AllowCategory(category_capabilities(cat))
        } else if let Some(cat) = capability_spec.strip_prefix("-@") {
            CapabilityRule::DenyCategory(category_capabilities(cat))
        } else if let Some(cap) = capability_spec.strip_prefix('+') {
            CapabilityRule::Allow(cap.to_string())
        } else if let Some(cap) = capability_spec.strip_prefix('-') {
            CapabilityRule::Deny(cap.to_string())
        } else {
            return Err(OrchError::Validation(format!(
                "policy {name}: line {}: capability must start with '+' or '-'",
                lineno + 1
            )));
        };

        namespace_rules.push(NamespaceRule {
            pattern,
            rules: vec![rule],
        });
    }

    Ok(ParsedPolicy {
        name: name.clone(),
        namespace_rules,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allow_then_deny_is_denied() {
        let text = "~* +@all\n~prod -destroy-job\n";
        let parsed = compile(&PolicyName("ops".into()), text).unwrap();
        assert!(parsed.allows("read-job", "default"));
        assert!(!parsed.allows("destroy-job", "prod"));
        assert!(parsed.allows("destroy-job", "default"));
    }

    #[test]
    fn rejects_malformed_rule() {
        let text = "not-a-rule\n";
        assert!(compile(&PolicyName("bad".into()), text).is_err());
    }
}
