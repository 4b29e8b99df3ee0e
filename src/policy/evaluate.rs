//! Header normalization, rule evaluation and scoring.
//!
//! Everything here is a pure function of its input headers.

use crate::policy::rules::{HeaderRule, Severity, RULES};
use serde::Serialize;
use std::collections::BTreeMap;

/// Starting score before penalties. The result is not clamped and may go
/// negative.
pub const MAX_SCORE: i32 = 100;

/// Lowercase header name to comma-joined value.
pub type NormalizedHeaders = BTreeMap<String, String>;

/// Result of one rule against one response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Finding {
    /// Lowercase header name.
    pub header: &'static str,
    /// Whether the header was sent.
    pub present: bool,
    /// Whether it passed the rule. Absent headers are never valid.
    pub valid: bool,
    /// Observed value.
    pub value: Option<String>,
    /// What the header does.
    pub description: &'static str,
    /// Remediation, `None` when valid.
    pub advice: Option<&'static str>,
    /// Rule severity.
    pub severity: Severity,
}

impl Finding {
    /// Missing or invalid.
    pub fn failed(&self) -> bool {
        !self.valid
    }
}

/// Findings for the whole ruleset plus the derived grade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Evaluation {
    /// One finding per rule, in ruleset order.
    pub findings: Vec<Finding>,
    /// Headers that were not sent.
    pub missing: Vec<&'static str>,
    /// Headers sent with a failing value.
    pub invalid: Vec<&'static str>,
    /// `100 - 30 * failed_high - 10 * failed_medium`.
    pub score: i32,
}

impl Evaluation {
    /// Number of failed rules with the given severity.
    pub fn failures(&self, severity: Severity) -> usize {
        self.findings
            .iter()
            .filter(|f| f.severity == severity && f.failed())
            .count()
    }
}

/// Lowercase header names and join repeated instances with `", "`.
pub fn normalize_headers<N, V>(headers: impl IntoIterator<Item = (N, V)>) -> NormalizedHeaders
where
    N: AsRef<str>,
    V: AsRef<str>,
{
    let mut normalized = NormalizedHeaders::new();
    for (name, value) in headers {
        let key = name.as_ref().to_ascii_lowercase();
        let value = value.as_ref();
        normalized
            .entry(key)
            .and_modify(|existing: &mut String| {
                existing.push_str(", ");
                existing.push_str(value);
            })
            .or_insert_with(|| value.to_string());
    }
    normalized
}

/// Evaluate a single rule against a possibly absent value.
pub fn evaluate_rule(rule: &HeaderRule, value: Option<&str>) -> Finding {
    let valid = value.map(|v| rule.is_valid(v)).unwrap_or(false);
    Finding {
        header: rule.name,
        present: value.is_some(),
        valid,
        value: value.map(str::to_string),
        description: rule.description,
        advice: if valid { None } else { Some(rule.advice) },
        severity: rule.severity,
    }
}

/// Evaluate normalized headers against every rule.
pub fn evaluate(headers: &NormalizedHeaders) -> Evaluation {
    let findings: Vec<Finding> = RULES
        .iter()
        .map(|rule| evaluate_rule(rule, headers.get(rule.name).map(String::as_str)))
        .collect();

    let missing = findings
        .iter()
        .filter(|f| !f.present)
        .map(|f| f.header)
        .collect();
    let invalid = findings
        .iter()
        .filter(|f| f.present && !f.valid)
        .map(|f| f.header)
        .collect();
    let score = findings
        .iter()
        .filter(|f| f.failed())
        .fold(MAX_SCORE, |score, f| score - f.severity.penalty());

    Evaluation {
        findings,
        missing,
        invalid,
        score,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secure_headers() -> NormalizedHeaders {
        normalize_headers([
            ("strict-transport-security", "max-age=63072000; includeSubDomains"),
            ("content-security-policy", "default-src 'self'"),
            ("x-frame-options", "DENY"),
            ("referrer-policy", "no-referrer"),
            ("cross-origin-opener-policy", "same-origin"),
            ("cross-origin-embedder-policy", "require-corp"),
            ("cross-origin-resource-policy", "same-origin"),
            ("permissions-policy", "geolocation=()"),
        ])
    }

    #[test]
    fn normalize_lowercases_and_joins() {
        let headers = normalize_headers([
            ("Set-Cookie", "a=1"),
            ("set-cookie", "b=2"),
            ("X-Frame-Options", "DENY"),
        ]);
        assert_eq!(headers.get("set-cookie").unwrap(), "a=1, b=2");
        assert_eq!(headers.get("x-frame-options").unwrap(), "DENY");
        assert!(headers.get("X-Frame-Options").is_none());
    }

    #[test]
    fn fully_secure_scores_100() {
        let eval = evaluate(&secure_headers());
        assert_eq!(eval.findings.len(), 8);
        assert!(eval.findings.iter().all(|f| f.present && f.valid));
        assert!(eval.findings.iter().all(|f| f.advice.is_none()));
        assert!(eval.missing.is_empty());
        assert!(eval.invalid.is_empty());
        assert_eq!(eval.score, 100);
    }

    #[test]
    fn empty_headers_score_negative_20() {
        let eval = evaluate(&NormalizedHeaders::new());
        assert!(eval.findings.iter().all(|f| !f.present && !f.valid));
        assert!(eval.findings.iter().all(|f| f.advice.is_some()));
        assert_eq!(eval.missing.len(), 8);
        assert!(eval.invalid.is_empty());
        assert_eq!(eval.failures(Severity::High), 2);
        assert_eq!(eval.failures(Severity::Medium), 6);
        assert_eq!(eval.score, -20);
    }

    #[test]
    fn short_hsts_is_invalid_not_missing() {
        let headers =
            normalize_headers([("strict-transport-security", "max-age=100; includeSubDomains")]);
        let eval = evaluate(&headers);

        let hsts = &eval.findings[0];
        assert_eq!(hsts.header, "strict-transport-security");
        assert!(hsts.present);
        assert!(!hsts.valid);
        assert_eq!(hsts.value.as_deref(), Some("max-age=100; includeSubDomains"));

        assert_eq!(eval.invalid, vec!["strict-transport-security"]);
        assert!(!eval.missing.contains(&"strict-transport-security"));
        assert_eq!(eval.missing.len(), 7);
        assert_eq!(eval.score, -20);
    }

    #[test]
    fn single_medium_failure_costs_10() {
        let mut headers = secure_headers();
        headers.insert("x-frame-options".to_string(), "ALLOWALL".to_string());
        let eval = evaluate(&headers);
        assert_eq!(eval.score, 90);
        assert_eq!(eval.invalid, vec!["x-frame-options"]);
    }

    #[test]
    fn single_high_failure_costs_30() {
        let mut headers = secure_headers();
        headers.remove("content-security-policy");
        let eval = evaluate(&headers);
        assert_eq!(eval.score, 70);
        assert_eq!(eval.missing, vec!["content-security-policy"]);
    }

    #[test]
    fn evaluation_is_deterministic() {
        let headers = normalize_headers([
            ("Strict-Transport-Security", "max-age=31536000"),
            ("Referrer-Policy", "origin"),
            ("Permissions-Policy", "camera=()"),
        ]);
        assert_eq!(evaluate(&headers), evaluate(&headers));
    }

    #[test]
    fn findings_follow_ruleset_order() {
        let eval = evaluate(&NormalizedHeaders::new());
        let names: Vec<_> = eval.findings.iter().map(|f| f.header).collect();
        let expected: Vec<_> = RULES.iter().map(|r| r.name).collect();
        assert_eq!(names, expected);
    }
}
