//! Built-in authentication strategies.

mod bearer_token;
mod trusted_header;

pub use bearer_token::BearerTokenStrategy;
pub use trusted_header::TrustedHeaderStrategy;
