//! Domain→role policy parsing and role assignment.
//!
//! The policy is operator-supplied text, one `domain=role` rule per line.
//! Rules are ordered; the first rule whose domain suffix matches the
//! account's email domain wins.

use crate::account::Account;

/// A single domain→role rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleRule {
    /// Lowercased, non-empty email-domain suffix.
    domain_suffix: String,
    /// Non-empty role name.
    role: String,
}

impl RoleRule {
    /// Returns the domain suffix this rule matches.
    #[must_use]
    pub fn domain_suffix(&self) -> &str {
        &self.domain_suffix
    }

    /// Returns the role this rule assigns.
    #[must_use]
    pub fn role(&self) -> &str {
        &self.role
    }

    /// Returns true if the rule matches the given email domain.
    ///
    /// Matching is case-insensitive and label-boundary-aware: the rule
    /// matches when the domain equals the suffix or ends with `.` followed
    /// by the suffix. `example.com` matches `sub.example.com` but not
    /// `notexample.com`.
    #[must_use]
    pub fn matches(&self, email_domain: &str) -> bool {
        let domain = email_domain.to_ascii_lowercase();
        if domain == self.domain_suffix {
            return true;
        }
        domain
            .strip_suffix(self.domain_suffix.as_str())
            .is_some_and(|head| head.ends_with('.'))
    }
}

/// Ordered list of domain→role rules parsed from policy text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RolePolicy {
    rules: Vec<RoleRule>,
}

impl RolePolicy {
    /// Parses policy text into an ordered rule list.
    ///
    /// One rule per line, `domain=role`, split on the first `=`. Whitespace
    /// is trimmed, domains are lowercased, and rule order follows line
    /// order. Parsing never fails: empty lines are ignored and malformed
    /// lines (no `=`, or an empty side) are skipped with a logged warning.
    /// Duplicate domains are kept, but only the first is ever reachable.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let mut rules = Vec::new();
        for (lineno, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let Some((domain, role)) = line.split_once('=') else {
                tracing::warn!(line = lineno + 1, "role policy line has no '=', skipping");
                continue;
            };
            let domain = domain.trim();
            let role = role.trim();
            if domain.is_empty() || role.is_empty() {
                tracing::warn!(
                    line = lineno + 1,
                    "role policy line has an empty domain or role, skipping"
                );
                continue;
            }
            rules.push(RoleRule {
                domain_suffix: domain.to_ascii_lowercase(),
                role: role.to_string(),
            });
        }
        Self { rules }
    }

    /// Returns the rules in declaration order.
    #[must_use]
    pub fn rules(&self) -> &[RoleRule] {
        &self.rules
    }

    /// Returns true if the policy holds no rules.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Returns the role of the first rule matching the given email domain.
    #[must_use]
    pub fn role_for_domain(&self, email_domain: &str) -> Option<&str> {
        self.rules
            .iter()
            .find(|rule| rule.matches(email_domain))
            .map(RoleRule::role)
    }
}

/// Applies the policy to an account's role set.
///
/// The first rule matching the account's email domain decides; the matched
/// role is added unless already held, and no further rules are evaluated.
/// No rule match, an empty policy, or an email without a domain leave the
/// account unchanged; roles are never removed. Returns true if a role was
/// added.
pub fn assign_role(account: &mut Account, policy: &RolePolicy) -> bool {
    let Some(domain) = account.email_domain() else {
        return false;
    };
    let Some(role) = policy.role_for_domain(&domain) else {
        return false;
    };
    account.add_role(role)
}
