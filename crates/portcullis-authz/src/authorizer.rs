//! A minimal ordered-rule policy evaluator.

use std::str::FromStr;

use portcullis_core::{is_domain_suffix, AuthzError, Object, RequiredLevel, Subject};

use crate::traits::{Authorizer, BoxFuture, PolicyMatch};

/// Who a rule is scoped to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubjectMatcher {
    /// A single user by name.
    User(String),
    /// Every member of a group.
    Group(String),
}

impl SubjectMatcher {
    /// Whether `subject` is covered. Anonymous subjects never are.
    pub fn matches(&self, subject: &Subject) -> bool {
        if subject.is_anonymous() {
            return false;
        }
        match self {
            Self::User(name) => subject.username == *name,
            Self::Group(group) => subject.in_group(group),
        }
    }
}

impl FromStr for SubjectMatcher {
    type Err = AuthzError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(name) = s.strip_prefix("user:").filter(|n| !n.is_empty()) {
            Ok(Self::User(name.to_string()))
        } else if let Some(group) = s.strip_prefix("group:").filter(|g| !g.is_empty()) {
            Ok(Self::Group(group.to_string()))
        } else {
            Err(AuthzError::config(format!(
                "subject '{s}' must be 'user:<name>' or 'group:<name>'"
            )))
        }
    }
}

/// One access rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessRule {
    domains: Vec<String>,
    methods: Vec<String>,
    subjects: Vec<SubjectMatcher>,
    policy: RequiredLevel,
}

impl AccessRule {
    /// A rule requiring `policy` on `domains` (label-suffix match).
    pub fn new(domains: Vec<String>, policy: RequiredLevel) -> Self {
        Self {
            domains,
            methods: Vec::new(),
            subjects: Vec::new(),
            policy,
        }
    }

    /// Restricts the rule to the given HTTP methods.
    #[must_use]
    pub fn with_methods(mut self, methods: Vec<String>) -> Self {
        self.methods = methods.into_iter().map(|m| m.to_ascii_uppercase()).collect();
        self
    }

    /// Restricts the rule to the given subjects.
    #[must_use]
    pub fn with_subjects(mut self, subjects: Vec<SubjectMatcher>) -> Self {
        self.subjects = subjects;
        self
    }

    /// Whether the rule is scoped to subjects.
    pub fn has_subjects(&self) -> bool {
        !self.subjects.is_empty()
    }

    fn matches(&self, subject: &Subject, object: &Object) -> bool {
        self.domains
            .iter()
            .any(|d| is_domain_suffix(object.domain(), d))
            && (self.methods.is_empty() || self.methods.iter().any(|m| m == object.method()))
            && (self.subjects.is_empty() || self.subjects.iter().any(|s| s.matches(subject)))
    }
}

/// Evaluates rules in order; the first match decides.
#[derive(Debug, Clone)]
pub struct StaticAuthorizer {
    default: RequiredLevel,
    rules: Vec<AccessRule>,
}

impl StaticAuthorizer {
    /// An authorizer that requires `default` everywhere.
    pub fn new(default: RequiredLevel) -> Self {
        Self {
            default,
            rules: Vec::new(),
        }
    }

    /// Appends a rule.
    #[must_use]
    pub fn with_rule(mut self, rule: AccessRule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Looks up the policy without going through the async trait.
    pub fn evaluate(&self, subject: &Subject, object: &Object) -> PolicyMatch {
        self.rules
            .iter()
            .find(|rule| rule.matches(subject, object))
            .map_or(PolicyMatch::new(false, self.default), |rule| {
                PolicyMatch::new(rule.has_subjects(), rule.policy)
            })
    }
}

impl Authorizer for StaticAuthorizer {
    fn required_level<'a>(
        &'a self,
        subject: &'a Subject,
        object: &'a Object,
    ) -> BoxFuture<'a, PolicyMatch> {
        Box::pin(async move { self.evaluate(subject, object) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};

    fn subject(username: &str, groups: &[&str]) -> Subject {
        Subject::new(
            username,
            groups.iter().map(ToString::to_string).collect(),
            IpAddr::V4(Ipv4Addr::LOCALHOST),
        )
    }

    fn object(url: &str, method: &str) -> Object {
        Object::parse(url, method).unwrap()
    }

    fn authorizer() -> StaticAuthorizer {
        StaticAuthorizer::new(RequiredLevel::TwoFactor)
            .with_rule(AccessRule::new(
                vec!["public.example.com".to_string()],
                RequiredLevel::Bypass,
            ))
            .with_rule(
                AccessRule::new(vec!["admin.example.com".to_string()], RequiredLevel::Denied)
                    .with_subjects(vec![SubjectMatcher::Group("contractors".to_string())]),
            )
            .with_rule(
                AccessRule::new(vec!["api.example.com".to_string()], RequiredLevel::OneFactor)
                    .with_methods(vec!["get".to_string()]),
            )
    }

    #[test]
    fn test_subject_matcher_parse() {
        assert_eq!(
            "user:john".parse::<SubjectMatcher>().unwrap(),
            SubjectMatcher::User("john".to_string())
        );
        assert_eq!(
            "group:admins".parse::<SubjectMatcher>().unwrap(),
            SubjectMatcher::Group("admins".to_string())
        );
        assert!("admins".parse::<SubjectMatcher>().is_err());
        assert!("user:".parse::<SubjectMatcher>().is_err());
    }

    #[test]
    fn test_default_when_nothing_matches() {
        let result = authorizer().evaluate(&subject("", &[]), &object("https://app.example.com/", "GET"));
        assert_eq!(result, PolicyMatch::new(false, RequiredLevel::TwoFactor));
    }

    #[test]
    fn test_bypass_rule() {
        let result = authorizer().evaluate(
            &subject("", &[]),
            &object("https://www.public.example.com/", "GET"),
        );
        assert_eq!(result, PolicyMatch::new(false, RequiredLevel::Bypass));
    }

    #[test]
    fn test_subject_rule_reports_subject_match() {
        let result = authorizer().evaluate(
            &subject("bob", &["contractors"]),
            &object("https://admin.example.com/", "GET"),
        );
        assert_eq!(result, PolicyMatch::new(true, RequiredLevel::Denied));
    }

    #[test]
    fn test_subject_rule_skips_anonymous_and_others() {
        let target = object("https://admin.example.com/", "GET");

        let anonymous = authorizer().evaluate(&subject("", &[]), &target);
        assert_eq!(anonymous, PolicyMatch::new(false, RequiredLevel::TwoFactor));

        let employee = authorizer().evaluate(&subject("alice", &["staff"]), &target);
        assert_eq!(employee, PolicyMatch::new(false, RequiredLevel::TwoFactor));
    }

    #[test]
    fn test_method_rule() {
        let get = authorizer().evaluate(&subject("", &[]), &object("https://api.example.com/", "GET"));
        assert_eq!(get.required, RequiredLevel::OneFactor);

        let post = authorizer().evaluate(&subject("", &[]), &object("https://api.example.com/", "POST"));
        assert_eq!(post.required, RequiredLevel::TwoFactor);
    }

    #[test]
    fn test_user_matcher() {
        let rule = AccessRule::new(vec!["example.com".to_string()], RequiredLevel::OneFactor)
            .with_subjects(vec![SubjectMatcher::User("john".to_string())]);
        let authz = StaticAuthorizer::new(RequiredLevel::Denied).with_rule(rule);
        let target = object("https://example.com/", "GET");

        assert_eq!(
            authz.evaluate(&subject("john", &[]), &target),
            PolicyMatch::new(true, RequiredLevel::OneFactor)
        );
        assert_eq!(
            authz.evaluate(&subject("jane", &[]), &target),
            PolicyMatch::new(false, RequiredLevel::Denied)
        );
    }

    #[tokio::test]
    async fn test_trait_delegates() {
        let authz = authorizer();
        let s = subject("", &[]);
        let o = object("https://public.example.com/", "GET");
        let result = authz.required_level(&s, &o).await;
        assert_eq!(result.required, RequiredLevel::Bypass);
    }
}
