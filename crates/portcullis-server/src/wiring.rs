//! Turns configuration into pipeline collaborators.

use std::sync::Arc;

use portcullis_authz::{
    AccessRule, AuthnChain, AuthnStrategy, Authz, BearerTokenStrategy, HeaderPortalUrlResolver,
    Implementation, PortalRoute, StaticAuthorizer, SubjectMatcher, TrustedHeaderStrategy,
};
use portcullis_config::{
    AuthnConfig, BearerTokenConfig, PolicyConfig, PortcullisConfig, StrategyKind, TokenConfig,
};
use portcullis_core::Details;

use crate::error::ServerResult;

/// Builds the pipeline serving `implementation`.
///
/// A single domain without a static portal URL gets the
/// `X-Portcullis-URL` header resolver as its dynamic portal.
pub fn build_authz(config: &PortcullisConfig, implementation: Implementation) -> ServerResult<Authz> {
    let routes = config
        .domains
        .iter()
        .map(|domain| PortalRoute::new(domain.name.clone(), domain.portal_url.clone()));

    let mut builder = Authz::builder(implementation)
        .routes(routes)
        .chain(build_chain(&config.authn)?)
        .authorizer(Arc::new(build_authorizer(&config.policy)?));

    if let [domain] = config.domains.as_slice() {
        if domain.portal_url.is_none() {
            builder = builder.dynamic_portal(Arc::new(HeaderPortalUrlResolver));
        }
    }

    Ok(builder.build()?)
}

/// Builds the strategy chain in configured order.
pub fn build_chain(config: &AuthnConfig) -> ServerResult<AuthnChain> {
    let mut chain = AuthnChain::default();

    for kind in &config.strategies {
        let strategy: Arc<dyn AuthnStrategy> = match kind {
            StrategyKind::TrustedHeader => {
                let header = &config.trusted_header;
                Arc::new(TrustedHeaderStrategy::new(
                    &header.user_header,
                    &header.groups_header,
                    header.level,
                )?)
            }
            StrategyKind::BearerToken => Arc::new(bearer_token(&config.bearer_token)),
        };
        chain = chain.with(strategy);
    }

    Ok(chain)
}

fn bearer_token(config: &BearerTokenConfig) -> BearerTokenStrategy {
    config.tokens.iter().fold(
        BearerTokenStrategy::new(config.realm.clone(), config.challenge),
        |strategy, token| strategy.with_token(token.token.clone(), details(token), token.level),
    )
}

fn details(token: &TokenConfig) -> Details {
    let mut details = Details::user(token.username.clone()).with_groups(token.groups.clone());
    if !token.display_name.is_empty() {
        details = details.with_display_name(token.display_name.clone());
    }
    if let Some(email) = &token.email {
        details = details.with_email(email.clone());
    }
    details
}

/// Builds the rule evaluator.
pub fn build_authorizer(config: &PolicyConfig) -> ServerResult<StaticAuthorizer> {
    config
        .rules
        .iter()
        .try_fold(StaticAuthorizer::new(config.default), |authorizer, rule| -> ServerResult<_> {
            let subjects = rule
                .subjects
                .iter()
                .map(|s| s.parse::<SubjectMatcher>())
                .collect::<Result<Vec<_>, _>>()?;

            Ok(authorizer.with_rule(
                AccessRule::new(rule.domains.clone(), rule.policy)
                    .with_methods(rule.methods.clone())
                    .with_subjects(subjects),
            ))
        })
}
