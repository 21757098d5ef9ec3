//! The authentication chain.
//!
//! Strategies run in configured order:
//!
//! 1. A strategy error ends the chain. If that strategy can handle
//!    unauthorized requests it becomes the owner and the caller sees an
//!    anonymous result instead of the error; otherwise the error propagates
//!    with no owner.
//! 2. The first result above `NotAuthenticated` ends the chain.
//! 3. Afterwards the last strategy consulted is the owner if it can handle
//!    unauthorized requests.
//!
//! Deadline expiry always propagates, even from a strategy that could own
//! the unauthorized path.

use std::fmt;
use std::sync::Arc;

use portcullis_core::{AuthenticationLevel, Authn, AuthnType, AuthzResult};
use tracing::debug;

use crate::context::RequestContext;
use crate::traits::AuthnStrategy;

/// Result of running the chain.
#[derive(Clone)]
pub struct ChainOutcome {
    /// Authentication state established for the request.
    pub authn: Authn,
    /// Strategy that owns the unauthorized response, if any.
    pub owner: Option<Arc<dyn AuthnStrategy>>,
}

impl fmt::Debug for ChainOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChainOutcome")
            .field("authn", &self.authn)
            .field("owner", &self.owner.as_ref().map(|s| s.kind()))
            .finish()
    }
}

/// Ordered list of authentication strategies.
#[derive(Clone, Default)]
pub struct AuthnChain {
    strategies: Vec<Arc<dyn AuthnStrategy>>,
}

impl fmt::Debug for AuthnChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.strategies.iter().map(|s| s.kind()))
            .finish()
    }
}

impl AuthnChain {
    /// Creates a chain; order is precedence.
    pub fn new(strategies: Vec<Arc<dyn AuthnStrategy>>) -> Self {
        Self { strategies }
    }

    /// Appends a strategy.
    #[must_use]
    pub fn with(mut self, strategy: Arc<dyn AuthnStrategy>) -> Self {
        self.strategies.push(strategy);
        self
    }

    /// Number of strategies.
    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    /// Whether the chain has no strategies.
    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    /// Runs the chain for one request.
    pub async fn authenticate(&self, ctx: &RequestContext) -> AuthzResult<ChainOutcome> {
        let mut authn = Authn::anonymous(AuthnType::None);
        let mut last: Option<&Arc<dyn AuthnStrategy>> = None;

        for strategy in &self.strategies {
            last = Some(strategy);

            match ctx.within("authentication", strategy.get(ctx)).await {
                Ok(result) => {
                    authn = result;
                    if authn.level != AuthenticationLevel::NotAuthenticated {
                        break;
                    }
                }
                Err(err) if err.is_cancelled() => return Err(err),
                Err(err) if strategy.can_handle_unauthorized() => {
                    debug!(
                        strategy = %strategy.kind(),
                        error = %err,
                        "strategy failed and takes over the unauthorized response"
                    );
                    return Ok(ChainOutcome {
                        authn: Authn::anonymous(strategy.kind()),
                        owner: Some(Arc::clone(strategy)),
                    });
                }
                Err(err) => return Err(err),
            }
        }

        let owner = last
            .filter(|strategy| strategy.can_handle_unauthorized())
            .cloned();

        Ok(ChainOutcome { authn, owner })
    }
}
