//! Application state shared across handlers.

use std::sync::Arc;

use axum::extract::FromRef;

use cowtracker_storage::PgPool;

use crate::auth::AuthState;
use crate::cache::ResponseCache;
use crate::config::AppConfig;
use crate::link_codes::LinkCodeService;

/// State handed to the router. Cloned per request; every field is a cheap
/// handle.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub pool: Arc<PgPool>,
    pub cache: Arc<ResponseCache>,
    pub link_codes: Arc<LinkCodeService>,
    pub auth: AuthState,
}

impl FromRef<AppState> for AuthState {
    fn from_ref(state: &AppState) -> Self {
        state.auth.clone()
    }
}
