//! The decision engine.
//!
//! [`classify`] folds the caller's level, the policy's requirement and
//! whether a policy rule was scoped to this subject into one [`Verdict`].
//! It is pure and total so it can be tested without any HTTP concern.
//!
//! | required | rule matched subject | level | verdict |
//! |---|---|---|---|
//! | `Bypass` | any | any | `Authorized` |
//! | `Denied` | yes | any | `Forbidden` |
//! | `Denied` | no | any | `Unauthorized` |
//! | tier | any | `>= tier` | `Authorized` |
//! | tier | any | `< tier` | `Unauthorized` |

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::level::{AuthenticationLevel, RequiredLevel};

/// Terminal outcome of an authorization decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// The caller is identified and still refused. Never redirects to login.
    Forbidden,
    /// The caller must (re-)authenticate.
    Unauthorized,
    /// The request may pass through.
    Authorized,
}

impl Verdict {
    /// Label used in logs and metrics.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Forbidden => "forbidden",
            Self::Unauthorized => "unauthorized",
            Self::Authorized => "authorized",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classifies a request into a [`Verdict`].
///
/// A `Denied` requirement only becomes `Forbidden` when a rule was
/// explicitly matched to the subject; otherwise the caller is asked to
/// authenticate first so the denial is not disclosed.
pub fn classify(
    level: AuthenticationLevel,
    required: RequiredLevel,
    rule_matched_subject: bool,
) -> Verdict {
    match required {
        RequiredLevel::Bypass => Verdict::Authorized,
        RequiredLevel::Denied if rule_matched_subject => Verdict::Forbidden,
        RequiredLevel::Denied => Verdict::Unauthorized,
        tier if tier.is_satisfied_by(level) => Verdict::Authorized,
        _ => Verdict::Unauthorized,
    }
}
