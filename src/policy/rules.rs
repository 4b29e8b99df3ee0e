//! Fixed security-header ruleset.
//!
//! Each rule pairs a lowercase header name with a predicate over the
//! header's (comma-joined) value. Matching is case-insensitive.

use serde::Serialize;

/// How much a failing rule costs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Transport and script-injection protections.
    High,
    /// Isolation and hygiene headers.
    Medium,
}

impl Severity {
    /// Score deduction when a rule of this severity is missing or invalid.
    pub fn penalty(self) -> i32 {
        match self {
            Severity::High => 30,
            Severity::Medium => 10,
        }
    }
}

/// One entry in the ruleset.
#[derive(Clone, Copy)]
pub struct HeaderRule {
    /// Lowercase canonical header name.
    pub name: &'static str,
    /// What the header does.
    pub description: &'static str,
    /// Pass/fail over the header value.
    pub check: fn(&str) -> bool,
    /// Shown when the header is missing or fails `check`.
    pub advice: &'static str,
    /// Fixed severity.
    pub severity: Severity,
}

impl std::fmt::Debug for HeaderRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HeaderRule")
            .field("name", &self.name)
            .field("severity", &self.severity)
            .finish()
    }
}

impl HeaderRule {
    /// Whether `value` satisfies this rule.
    pub fn is_valid(&self, value: &str) -> bool {
        (self.check)(value)
    }
}

/// The eight audited headers, in report order.
pub static RULES: [HeaderRule; 8] = [
    HeaderRule {
        name: "strict-transport-security",
        description: "Forces HTTPS for the host and its subdomains",
        check: hsts_is_strong,
        advice: "Send 'Strict-Transport-Security: max-age=63072000; includeSubDomains' (max-age of at least six digits)",
        severity: Severity::High,
    },
    HeaderRule {
        name: "content-security-policy",
        description: "Restricts where scripts and other resources may load from",
        check: csp_has_fetch_directive,
        advice: "Define a Content-Security-Policy with at least a default-src or script-src directive",
        severity: Severity::High,
    },
    HeaderRule {
        name: "x-frame-options",
        description: "Prevents the page from being framed (clickjacking)",
        check: frame_options_restrictive,
        advice: "Set 'X-Frame-Options: DENY' or 'SAMEORIGIN'",
        severity: Severity::Medium,
    },
    HeaderRule {
        name: "referrer-policy",
        description: "Limits referrer information sent to other origins",
        check: referrer_policy_strict,
        advice: "Set 'Referrer-Policy: no-referrer' or 'strict-origin-when-cross-origin'",
        severity: Severity::Medium,
    },
    HeaderRule {
        name: "cross-origin-opener-policy",
        description: "Isolates the browsing context from cross-origin openers",
        check: opener_policy_isolated,
        advice: "Set 'Cross-Origin-Opener-Policy: same-origin' (or same-origin-allow-popups)",
        severity: Severity::Medium,
    },
    HeaderRule {
        name: "cross-origin-embedder-policy",
        description: "Requires embedded resources to opt in to cross-origin loading",
        check: embedder_policy_requires_corp,
        advice: "Set 'Cross-Origin-Embedder-Policy: require-corp'",
        severity: Severity::Medium,
    },
    HeaderRule {
        name: "cross-origin-resource-policy",
        description: "Controls which origins may load this resource",
        check: resource_policy_restrictive,
        advice: "Set 'Cross-Origin-Resource-Policy: same-origin' or 'same-site'",
        severity: Severity::Medium,
    },
    HeaderRule {
        name: "permissions-policy",
        description: "Restricts powerful browser features",
        check: permissions_policy_present,
        advice: "Send a Permissions-Policy, e.g. 'geolocation=(), camera=(), microphone=()'",
        severity: Severity::Medium,
    },
];

/// Look up a rule by header name (any case).
pub fn rule(name: &str) -> Option<&'static HeaderRule> {
    RULES.iter().find(|r| r.name.eq_ignore_ascii_case(name))
}

fn contains_any(value: &str, needles: &[&str]) -> bool {
    let value = value.to_ascii_lowercase();
    needles.iter().any(|n| value.contains(n))
}

/// `max-age=` followed by at least six digits.
fn has_long_max_age(value: &str) -> bool {
    value.match_indices("max-age=").any(|(i, m)| {
        value[i + m.len()..]
            .bytes()
            .take_while(u8::is_ascii_digit)
            .count()
            >= 6
    })
}

fn hsts_is_strong(value: &str) -> bool {
    let value = value.to_ascii_lowercase();
    has_long_max_age(&value) && value.contains("includesubdomains")
}

fn csp_has_fetch_directive(value: &str) -> bool {
    contains_any(value, &["default-src", "script-src"])
}

fn frame_options_restrictive(value: &str) -> bool {
    contains_any(value, &["deny", "sameorigin"])
}

fn referrer_policy_strict(value: &str) -> bool {
    contains_any(value, &["no-referrer", "strict-origin-when-cross-origin"])
}

fn opener_policy_isolated(value: &str) -> bool {
    contains_any(value, &["same-origin", "same-origin-allow-popups"])
}

fn embedder_policy_requires_corp(value: &str) -> bool {
    contains_any(value, &["require-corp"])
}

fn resource_policy_restrictive(value: &str) -> bool {
    contains_any(value, &["same-site", "same-origin"])
}

fn permissions_policy_present(value: &str) -> bool {
    !value.trim().is_empty()
}
