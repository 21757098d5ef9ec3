//! Authentication levels held by callers and required by resources.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Authentication level a caller currently holds.
///
/// Variants are declared in ascending order so the derived `Ord` means
/// "a higher level satisfies everything a lower one does".
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum AuthenticationLevel {
    /// No credential was presented or none was accepted.
    #[default]
    NotAuthenticated,
    /// A single factor (password, token) was verified.
    OneFactor,
    /// A second factor was verified on top of the first.
    TwoFactor,
}

impl AuthenticationLevel {
    /// Returns the canonical configuration name of this level.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::NotAuthenticated => "not_authenticated",
            Self::OneFactor => "one_factor",
            Self::TwoFactor => "two_factor",
        }
    }

    /// Whether this level represents an authenticated caller.
    pub fn is_authenticated(&self) -> bool {
        *self != Self::NotAuthenticated
    }
}

impl fmt::Display for AuthenticationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuthenticationLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "not_authenticated" | "none" => Ok(Self::NotAuthenticated),
            "one_factor" => Ok(Self::OneFactor),
            "two_factor" => Ok(Self::TwoFactor),
            other => Err(format!("unknown authentication level: {other}")),
        }
    }
}

/// Minimum level a policy demands for a resource.
///
/// `Bypass` and `Denied` are overrides rather than points on the
/// authentication scale; only the tiers in between map onto an
/// [`AuthenticationLevel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequiredLevel {
    /// Always satisfied, even without authentication.
    Bypass,
    /// Requires at least one factor.
    OneFactor,
    /// Requires two factors.
    TwoFactor,
    /// Never satisfied regardless of authentication.
    #[serde(rename = "deny", alias = "denied")]
    Denied,
}

impl RequiredLevel {
    /// Returns the canonical configuration name of this level.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Bypass => "bypass",
            Self::OneFactor => "one_factor",
            Self::TwoFactor => "two_factor",
            Self::Denied => "deny",
        }
    }

    /// Returns the authentication tier this level demands.
    ///
    /// `None` for the `Bypass` and `Denied` overrides.
    pub const fn authentication_tier(&self) -> Option<AuthenticationLevel> {
        match self {
            Self::OneFactor => Some(AuthenticationLevel::OneFactor),
            Self::TwoFactor => Some(AuthenticationLevel::TwoFactor),
            Self::Bypass | Self::Denied => None,
        }
    }

    /// Whether `level` meets this requirement as an authenticated tier.
    ///
    /// Always false for `Denied`, always true for `Bypass`.
    pub fn is_satisfied_by(&self, level: AuthenticationLevel) -> bool {
        match self {
            Self::Bypass => true,
            Self::Denied => false,
            tier => tier
                .authentication_tier()
                .is_some_and(|required| level >= required),
        }
    }
}

impl fmt::Display for RequiredLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequiredLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "bypass" => Ok(Self::Bypass),
            "one_factor" => Ok(Self::OneFactor),
            "two_factor" => Ok(Self::TwoFactor),
            "deny" | "denied" => Ok(Self::Denied),
            other => Err(format!("unknown policy level: {other}")),
        }
    }
}
