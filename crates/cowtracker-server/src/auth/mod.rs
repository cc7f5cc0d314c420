//! Authentication: identity-provider client and request extractors.
//!
//! Tokens are verified against the external identity provider; the matching
//! `usuario` row supplies the numeric user id and role for authorization
//! decisions.

pub mod extract;
pub mod provider;

pub use extract::{AdminUser, AuthState, CurrentUser, resolve_current_user};
pub use provider::{
    AuthIdentity, AuthProviderError, AuthSession, IdentityProvider, SupabaseAuthClient,
};
