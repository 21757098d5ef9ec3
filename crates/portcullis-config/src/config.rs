//! Configuration types.

use std::collections::HashSet;
use std::net::IpAddr;
use std::time::Duration;

use portcullis_core::{is_domain_suffix, is_uri_secure, AuthenticationLevel, RequiredLevel};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{ConfigError, ConfigResult};

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PortcullisConfig {
    /// HTTP listener settings.
    pub server: ServerConfig,
    /// Protected domains, in match order.
    pub domains: Vec<DomainConfig>,
    /// Rules applied to the domain list at startup.
    pub domain_policy: DomainPolicyConfig,
    /// Authentication strategy chain.
    pub authn: AuthnConfig,
    /// Access policy.
    pub policy: PolicyConfig,
    /// Logging and metrics.
    pub telemetry: TelemetryConfig,
}

impl PortcullisConfig {
    /// Validates the configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        self.server.validate()?;
        self.validate_domains()?;
        self.authn.validate()?;
        self.policy.validate()?;

        if self.telemetry.service_name.trim().is_empty() {
            return Err(ConfigError::invalid_value(
                "telemetry.service_name",
                "must not be empty",
            ));
        }

        Ok(())
    }

    fn validate_domains(&self) -> ConfigResult<()> {
        if self.domains.is_empty() {
            return Err(ConfigError::missing_field("domains"));
        }

        for (i, domain) in self.domains.iter().enumerate() {
            let field = format!("domains[{i}].name");
            let name = domain.name.as_str();

            if name.trim().is_empty() {
                return Err(ConfigError::invalid_value(field, "must not be empty"));
            }
            if name.contains("://") || name.contains('/') || name.contains(':') {
                return Err(ConfigError::invalid_value(
                    field,
                    "must be a bare domain name without scheme, port or path",
                ));
            }
            if name != name.to_ascii_lowercase() {
                return Err(ConfigError::invalid_value(field, "must be lower case"));
            }

            if let Some(portal) = &domain.portal_url {
                if !is_uri_secure(portal) {
                    return Err(ConfigError::invalid_value(
                        format!("domains[{i}].portal_url"),
                        format!("scheme '{}' is not secure, use https", portal.scheme()),
                    ));
                }
            }
        }

        if self.domain_policy.reject_overlapping {
            for (i, a) in self.domains.iter().enumerate() {
                for b in self.domains.iter().skip(i + 1) {
                    if is_domain_suffix(&a.name, &b.name) || is_domain_suffix(&b.name, &a.name) {
                        return Err(ConfigError::validation_error(format!(
                            "domains '{}' and '{}' overlap; match order would decide between them",
                            a.name, b.name
                        )));
                    }
                }
            }
        }

        Ok(())
    }
}

/// HTTP listener settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind to.
    pub listen_addr: String,
    /// Port to listen on.
    pub listen_port: u16,
    /// Deadline for all collaborator calls of a single request.
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0".to_string(),
            listen_port: 9091,
            request_timeout: Duration::from_secs(5),
        }
    }
}

impl ServerConfig {
    fn validate(&self) -> ConfigResult<()> {
        if self.listen_addr.parse::<IpAddr>().is_err() {
            return Err(ConfigError::invalid_value(
                "server.listen_addr",
                format!("invalid IP address: {}", self.listen_addr),
            ));
        }
        if self.request_timeout.is_zero() {
            return Err(ConfigError::invalid_value(
                "server.request_timeout",
                "must be greater than zero",
            ));
        }
        Ok(())
    }
}

/// A protected domain and the portal that signs users in for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainConfig {
    /// Domain suffix covering the domain and all of its subdomains.
    pub name: String,
    /// Login portal. `None` means "resolve dynamically" or "no portal".
    #[serde(default)]
    pub portal_url: Option<Url>,
}

impl DomainConfig {
    /// Creates a domain entry without a portal.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            portal_url: None,
        }
    }

    /// Sets the portal URL.
    #[must_use]
    pub fn with_portal(mut self, portal_url: Url) -> Self {
        self.portal_url = Some(portal_url);
        self
    }
}

/// Startup checks on the domain list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DomainPolicyConfig {
    /// Refuse domain lists where one entry is a suffix of another.
    pub reject_overlapping: bool,
}

/// Built-in authentication strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// Identity asserted by a trusted upstream header.
    TrustedHeader,
    /// Static `Authorization: Bearer` tokens.
    BearerToken,
}

impl StrategyKind {
    /// Configuration name of the strategy.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::TrustedHeader => "trusted_header",
            Self::BearerToken => "bearer_token",
        }
    }
}

/// Authentication chain settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthnConfig {
    /// Strategies in chain order.
    pub strategies: Vec<StrategyKind>,
    /// Trusted header strategy settings.
    pub trusted_header: TrustedHeaderConfig,
    /// Bearer token strategy settings.
    pub bearer_token: BearerTokenConfig,
}

impl AuthnConfig {
    fn validate(&self) -> ConfigResult<()> {
        let mut seen = HashSet::new();
        for kind in &self.strategies {
            if !seen.insert(kind) {
                return Err(ConfigError::invalid_value(
                    "authn.strategies",
                    format!("strategy '{}' listed more than once", kind.as_str()),
                ));
            }
        }

        if self.strategies.contains(&StrategyKind::TrustedHeader) {
            self.trusted_header.validate()?;
        }
        if self.strategies.contains(&StrategyKind::BearerToken) {
            self.bearer_token.validate()?;
        }

        Ok(())
    }
}

/// Settings for identity asserted by a trusted upstream.
///
/// The proxy in front of Portcullis must strip these headers from client
/// requests, otherwise any client can claim any identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrustedHeaderConfig {
    /// Header carrying the username.
    pub user_header: String,
    /// Header carrying comma separated groups.
    pub groups_header: String,
    /// Level granted to callers identified this way.
    pub level: AuthenticationLevel,
}

impl Default for TrustedHeaderConfig {
    fn default() -> Self {
        Self {
            user_header: "Remote-User".to_string(),
            groups_header: "Remote-Groups".to_string(),
            level: AuthenticationLevel::OneFactor,
        }
    }
}

impl TrustedHeaderConfig {
    fn validate(&self) -> ConfigResult<()> {
        if http_header_name_invalid(&self.user_header) {
            return Err(ConfigError::invalid_value(
                "authn.trusted_header.user_header",
                "must be a valid header name",
            ));
        }
        if http_header_name_invalid(&self.groups_header) {
            return Err(ConfigError::invalid_value(
                "authn.trusted_header.groups_header",
                "must be a valid header name",
            ));
        }
        if !self.level.is_authenticated() {
            return Err(ConfigError::invalid_value(
                "authn.trusted_header.level",
                "must be one_factor or two_factor",
            ));
        }
        Ok(())
    }
}

/// Settings for static bearer tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BearerTokenConfig {
    /// Realm advertised in the `WWW-Authenticate` challenge.
    pub realm: String,
    /// Answer unauthorized requests with a bearer challenge instead of a
    /// portal redirect.
    pub challenge: bool,
    /// Accepted tokens.
    pub tokens: Vec<TokenConfig>,
}

impl Default for BearerTokenConfig {
    fn default() -> Self {
        Self {
            realm: "portcullis".to_string(),
            challenge: false,
            tokens: Vec::new(),
        }
    }
}

impl BearerTokenConfig {
    fn validate(&self) -> ConfigResult<()> {
        if self.realm.contains('"') {
            return Err(ConfigError::invalid_value(
                "authn.bearer_token.realm",
                "must not contain quotes",
            ));
        }

        let mut seen = HashSet::new();
        for (i, token) in self.tokens.iter().enumerate() {
            if token.token.trim().is_empty() {
                return Err(ConfigError::invalid_value(
                    format!("authn.bearer_token.tokens[{i}].token"),
                    "must not be empty",
                ));
            }
            if token.username.trim().is_empty() {
                return Err(ConfigError::invalid_value(
                    format!("authn.bearer_token.tokens[{i}].username"),
                    "must not be empty",
                ));
            }
            if !token.level.is_authenticated() {
                return Err(ConfigError::invalid_value(
                    format!("authn.bearer_token.tokens[{i}].level"),
                    "must be one_factor or two_factor",
                ));
            }
            if !seen.insert(token.token.as_str()) {
                return Err(ConfigError::invalid_value(
                    format!("authn.bearer_token.tokens[{i}].token"),
                    "duplicate token",
                ));
            }
        }
        Ok(())
    }
}

/// One accepted bearer token and the identity it stands for.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenConfig {
    /// The secret token value.
    pub token: String,
    /// Username the token authenticates as.
    pub username: String,
    /// Groups of that user.
    #[serde(default)]
    pub groups: Vec<String>,
    /// Display name.
    #[serde(default)]
    pub display_name: String,
    /// Email address.
    #[serde(default)]
    pub email: Option<String>,
    /// Level granted.
    #[serde(default = "default_token_level")]
    pub level: AuthenticationLevel,
}

fn default_token_level() -> AuthenticationLevel {
    AuthenticationLevel::OneFactor
}

impl std::fmt::Debug for TokenConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenConfig")
            .field("token", &"<redacted>")
            .field("username", &self.username)
            .field("groups", &self.groups)
            .field("level", &self.level)
            .finish_non_exhaustive()
    }
}

/// Access policy settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Level required when no rule matches.
    pub default: RequiredLevel,
    /// Rules evaluated in order; the first match wins.
    pub rules: Vec<RuleConfig>,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            default: RequiredLevel::TwoFactor,
            rules: Vec::new(),
        }
    }
}

impl PolicyConfig {
    fn validate(&self) -> ConfigResult<()> {
        for (i, rule) in self.rules.iter().enumerate() {
            if rule.domains.is_empty() {
                return Err(ConfigError::invalid_value(
                    format!("policy.rules[{i}].domains"),
                    "must list at least one domain",
                ));
            }
            for subject in &rule.subjects {
                let valid = subject
                    .strip_prefix("user:")
                    .or_else(|| subject.strip_prefix("group:"))
                    .is_some_and(|name| !name.is_empty());
                if !valid {
                    return Err(ConfigError::invalid_value(
                        format!("policy.rules[{i}].subjects"),
                        format!("'{subject}' must be 'user:<name>' or 'group:<name>'"),
                    ));
                }
            }
        }
        Ok(())
    }
}

/// One access rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleConfig {
    /// Domain suffixes the rule applies to.
    pub domains: Vec<String>,
    /// HTTP methods the rule applies to; empty means all.
    #[serde(default)]
    pub methods: Vec<String>,
    /// `user:<name>` / `group:<name>` entries; empty means everyone.
    #[serde(default)]
    pub subjects: Vec<String>,
    /// Level required when the rule matches.
    pub policy: RequiredLevel,
}

/// Telemetry settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Service name attached to logs.
    pub service_name: String,
    /// Logging settings.
    pub logging: LoggingConfig,
    /// Metrics settings.
    pub metrics: MetricsConfig,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "portcullis".to_string(),
            logging: LoggingConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (e.g. `info`, `portcullis_authz=debug,warn`).
    pub level: String,
    /// Output format.
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Json,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// One JSON object per line.
    #[default]
    Json,
    /// Multi-line human-readable output.
    Pretty,
}

/// Metrics settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Install the Prometheus recorder and serve `/_portcullis/metrics`.
    pub enabled: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

fn http_header_name_invalid(name: &str) -> bool {
    name.is_empty()
        || !name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

/// Serde adapter for durations written as `500ms`, `5s`, `2m` or `1h`.
pub(crate) mod humantime_serde {
    use std::time::Duration;

    use serde::{self, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let s = if duration.subsec_millis() == 0 {
            format!("{}s", duration.as_secs())
        } else {
            format!("{}ms", duration.as_millis())
        };
        serializer.serialize_str(&s)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        parse_duration(&s).map_err(serde::de::Error::custom)
    }

    pub fn parse_duration(s: &str) -> Result<Duration, String> {
        let s = s.trim();
        let invalid = || format!("invalid duration: '{s}'");

        if let Some(n) = s.strip_suffix("ms") {
            let n: u64 = n.trim().parse().map_err(|_| invalid())?;
            Ok(Duration::from_millis(n))
        } else if let Some(n) = s.strip_suffix('s') {
            let n: u64 = n.trim().parse().map_err(|_| invalid())?;
            Ok(Duration::from_secs(n))
        } else if let Some(n) = s.strip_suffix('m') {
            let n: u64 = n.trim().parse().map_err(|_| invalid())?;
            n.checked_mul(60).map(Duration::from_secs).ok_or_else(invalid)
        } else if let Some(n) = s.strip_suffix('h') {
            let n: u64 = n.trim().parse().map_err(|_| invalid())?;
            n.checked_mul(3600).map(Duration::from_secs).ok_or_else(invalid)
        } else {
            // Bare numbers are seconds
            let n: u64 = s.parse().map_err(|_| invalid())?;
            Ok(Duration::from_secs(n))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with(domains: Vec<DomainConfig>) -> PortcullisConfig {
        PortcullisConfig {
            domains,
            ..PortcullisConfig::default()
        }
    }

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_default_config() {
        let config = PortcullisConfig::default();
        assert_eq!(config.server.listen_port, 9091);
        assert_eq!(config.server.request_timeout, Duration::from_secs(5));
        assert_eq!(config.policy.default, RequiredLevel::TwoFactor);
        assert!(config.domains.is_empty());
        assert!(config.telemetry.metrics.enabled);
    }

    #[test]
    fn test_requires_domains() {
        let err = PortcullisConfig::default().validate().unwrap_err();
        assert!(matches!(err, ConfigError::MissingField { .. }));
    }

    #[test]
    fn test_valid_single_domain() {
        let config = config_with(vec![
            DomainConfig::new("example.com").with_portal(url("https://auth.example.com"))
        ]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_bad_domain_names() {
        for name in ["", "https://example.com", "example.com/path", "Example.com", "example.com:443"] {
            let config = config_with(vec![DomainConfig::new(name)]);
            assert!(config.validate().is_err(), "accepted '{name}'");
        }
    }

    #[test]
    fn test_rejects_insecure_portal() {
        let config = config_with(vec![
            DomainConfig::new("example.com").with_portal(url("http://auth.example.com"))
        ]);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("portal_url"));
    }

    #[test]
    fn test_overlapping_domains() {
        let mut config = config_with(vec![
            DomainConfig::new("b.example.com"),
            DomainConfig::new("example.com"),
        ]);
        assert!(config.validate().is_ok());

        config.domain_policy.reject_overlapping = true;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("overlap"));

        let config = PortcullisConfig {
            domain_policy: DomainPolicyConfig {
                reject_overlapping: true,
            },
            ..config_with(vec![
                DomainConfig::new("example.com"),
                DomainConfig::new("example.org"),
            ])
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_duplicate_strategies_rejected() {
        let mut config = config_with(vec![DomainConfig::new("example.com")]);
        config.authn.strategies = vec![StrategyKind::BearerToken, StrategyKind::BearerToken];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_token_validation() {
        let mut config = config_with(vec![DomainConfig::new("example.com")]);
        config.authn.strategies = vec![StrategyKind::BearerToken];
        config.authn.bearer_token.tokens = vec![TokenConfig {
            token: "secret".to_string(),
            username: String::new(),
            groups: vec![],
            display_name: String::new(),
            email: None,
            level: AuthenticationLevel::OneFactor,
        }];
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("username"));
    }

    #[test]
    fn test_token_debug_is_redacted() {
        let token = TokenConfig {
            token: "super-secret".to_string(),
            username: "ci".to_string(),
            groups: vec![],
            display_name: String::new(),
            email: None,
            level: AuthenticationLevel::OneFactor,
        };
        let debug = format!("{token:?}");
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("ci"));
    }

    #[test]
    fn test_policy_subject_format() {
        let mut config = config_with(vec![DomainConfig::new("example.com")]);
        config.policy.rules = vec![RuleConfig {
            domains: vec!["example.com".to_string()],
            methods: vec![],
            subjects: vec!["admins".to_string()],
            policy: RequiredLevel::OneFactor,
        }];
        assert!(config.validate().is_err());

        config.policy.rules[0].subjects = vec!["group:admins".to_string(), "user:john".to_string()];
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_toml_config() {
        let toml = r#"
[server]
listen_port = 8080
request_timeout = "250ms"

[[domains]]
name = "b.example.com"
portal_url = "https://auth.b.example.com"

[[domains]]
name = "example.com"

[authn]
strategies = ["bearer_token", "trusted_header"]

[authn.bearer_token]
challenge = true

[[authn.bearer_token.tokens]]
token = "abc"
username = "ci"
groups = ["automation"]

[policy]
default = "one_factor"

[[policy.rules]]
domains = ["public.example.com"]
policy = "bypass"

[telemetry.logging]
format = "pretty"
"#;
        let config: PortcullisConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.server.listen_port, 8080);
        assert_eq!(config.server.request_timeout, Duration::from_millis(250));
        assert_eq!(config.domains[0].name, "b.example.com");
        assert!(config.domains[1].portal_url.is_none());
        assert_eq!(
            config.authn.strategies,
            vec![StrategyKind::BearerToken, StrategyKind::TrustedHeader]
        );
        assert!(config.authn.bearer_token.challenge);
        assert_eq!(config.authn.bearer_token.tokens[0].level, AuthenticationLevel::OneFactor);
        assert_eq!(config.policy.default, RequiredLevel::OneFactor);
        assert_eq!(config.policy.rules[0].policy, RequiredLevel::Bypass);
        assert_eq!(config.telemetry.logging.format, LogFormat::Pretty);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_duration() {
        use super::humantime_serde::parse_duration;

        assert_eq!(parse_duration("5s").unwrap(), Duration::from_secs(5));
        assert_eq!(parse_duration("150ms").unwrap(), Duration::from_millis(150));
        assert_eq!(parse_duration("2m").unwrap(), Duration::from_secs(120));
        assert_eq!(parse_duration("1h").unwrap(), Duration::from_secs(3600));
        assert_eq!(parse_duration("7").unwrap(), Duration::from_secs(7));
        assert!(parse_duration("soon").is_err());
    }

    #[test]
    fn test_parse_duration_overflow() {
        use super::humantime_serde::parse_duration;

        assert!(parse_duration("99999999999999999h").is_err());
        assert!(parse_duration("999999999999999999m").is_err());
        assert_eq!(
            parse_duration("5124095576030431h").unwrap(),
            Duration::from_secs(5_124_095_576_030_431 * 3600)
        );
    }
}
