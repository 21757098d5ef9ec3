//! Per-request authentication envelope.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::level::AuthenticationLevel;
use crate::object::{friendly_method, Object};

/// Which kind of strategy produced an [`Authn`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthnType {
    /// No strategy produced a result.
    #[default]
    None,
    /// Identity asserted by a trusted upstream header.
    TrustedHeader,
    /// `Authorization: Bearer` token.
    BearerToken,
    /// A strategy provided outside this workspace.
    Custom(String),
}

impl fmt::Display for AuthnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("none"),
            Self::TrustedHeader => f.write_str("trusted_header"),
            Self::BearerToken => f.write_str("bearer_token"),
            Self::Custom(name) => f.write_str(name),
        }
    }
}

/// User details as known to the strategy that authenticated the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Details {
    /// Username, empty when anonymous.
    pub username: String,
    /// Display name.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub display_name: String,
    /// Email addresses, primary first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub emails: Vec<String>,
    /// Group memberships.
    #[serde(default)]
    pub groups: Vec<String>,
}

impl Details {
    /// Creates details for a named user.
    pub fn user(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            ..Self::default()
        }
    }

    /// Sets the groups.
    #[must_use]
    pub fn with_groups(mut self, groups: Vec<String>) -> Self {
        self.groups = groups;
        self
    }

    /// Sets the display name.
    #[must_use]
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = name.into();
        self
    }

    /// Adds an email address.
    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.emails.push(email.into());
        self
    }

    /// Whether no user is known.
    pub fn is_anonymous(&self) -> bool {
        self.username.is_empty()
    }
}

/// Authentication state of one request.
///
/// Created by a strategy, then completed with the resolved [`Object`]
/// before policy evaluation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Authn {
    /// Strategy that produced this result.
    pub kind: AuthnType,
    /// Level the caller holds.
    pub level: AuthenticationLevel,
    /// Known user details.
    pub details: Details,
    /// Resource being accessed, attached by the pipeline.
    pub object: Option<Object>,
    /// Display rendering of the HTTP method.
    pub method: String,
}

impl Authn {
    /// An unauthenticated result attributed to `kind`.
    pub fn anonymous(kind: AuthnType) -> Self {
        Self {
            kind,
            ..Self::default()
        }
    }

    /// An authenticated result.
    pub fn authenticated(kind: AuthnType, level: AuthenticationLevel, details: Details) -> Self {
        Self {
            kind,
            level,
            details,
            object: None,
            method: String::new(),
        }
    }

    /// Attaches the resource and its display method.
    pub fn attach(&mut self, object: Object) {
        self.method = friendly_method(object.method());
        self.object = Some(object);
    }

    /// Username, empty when anonymous.
    pub fn username(&self) -> &str {
        &self.details.username
    }

    /// Whether the caller holds any authentication level.
    pub fn is_authenticated(&self) -> bool {
        self.level.is_authenticated()
    }
}
