//! HTTP integration of the response cache.
//!
//! Only idempotent GET requests are eligible for caching. The cache key
//! incorporates the route, the full query string, and an identity
//! discriminator (the authenticated user id, or the `anonymous` sentinel on
//! unauthenticated routes) so two callers never observe each other's cached
//! data. Only 2xx responses are stored.
//!
//! Mutating route groups run through `invalidate_on_write`, which clears the
//! configured substring patterns after a successful response.

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{HeaderValue, Method, StatusCode, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use std::sync::Arc;
use std::time::Duration;

use crate::auth::{AuthState, CurrentUser, resolve_current_user};

use super::manager::ResponseCache;

/// Read-through configuration for a cached route group.
#[derive(Clone)]
pub struct ReadThrough {
    pub cache: Arc<ResponseCache>,
    pub auth: AuthState,
    /// Key prefix naming the resource family ("farms", "cattle", "user", ...).
    pub scope: &'static str,
    pub ttl: Duration,
}

impl ReadThrough {
    pub fn new(
        cache: Arc<ResponseCache>,
        auth: AuthState,
        scope: &'static str,
        ttl: Duration,
    ) -> Self {
        Self {
            cache,
            auth,
            scope,
            ttl,
        }
    }
}

/// Invalidation configuration for a mutating route group.
#[derive(Clone)]
pub struct InvalidateOnWrite {
    pub cache: Arc<ResponseCache>,
    /// Substring patterns plausibly overlapping the mutated resources.
    pub patterns: &'static [&'static str],
}

impl InvalidateOnWrite {
    pub fn new(cache: Arc<ResponseCache>, patterns: &'static [&'static str]) -> Self {
        Self { cache, patterns }
    }
}

/// Derive the cache key for a request.
///
/// Shape: `{scope}_{identity}_{path}_{{query}}` — e.g.
/// `farms_7f0b..._/api/farms_{}`. The scope prefix keeps the substring
/// invalidation patterns ("farms_", "cattle_", "user_") effective.
pub fn fingerprint(scope: &str, identity: &str, path: &str, query: &str) -> String {
    format!("{scope}_{identity}_{path}_{{{query}}}")
}

/// Axum middleware serving GET responses from the cache and populating it
/// from successful responses.
pub async fn read_through(
    State(layer): State<ReadThrough>,
    mut req: Request,
    next: Next,
) -> Response {
    if req.method() != Method::GET {
        return next.run(req).await;
    }

    let identity = match req.extensions().get::<CurrentUser>() {
        Some(user) => user.auth_id.to_string(),
        None => match resolve_current_user(&layer.auth, req.headers()).await {
            Ok(user) => {
                let identity = user.auth_id.to_string();
                // Hand the resolution to the handler's extractor.
                req.extensions_mut().insert(user);
                identity
            }
            // Unauthenticated caller: run the handler uncached and let its
            // extractor produce the error response.
            Err(_) => return next.run(req).await,
        },
    };

    let path = req.uri().path().to_string();
    let query = req.uri().query().unwrap_or("").to_string();
    let key = fingerprint(layer.scope, &identity, &path, &query);

    if let Some(cached) = layer.cache.get(&key).await {
        tracing::debug!(key = %key, "serving cached response");
        return cached_body_response(&cached);
    }

    let response = next.run(req).await;
    if !response.status().is_success() {
        return response;
    }

    // Buffer the response body so it can be stored; rebuild the response
    // from the same bytes.
    let (parts, body) = response.into_parts();
    let bytes = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(key = %key, error = %e, "failed to buffer response for caching");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    layer.cache.set(&key, bytes.to_vec(), layer.ttl).await;

    Response::from_parts(parts, Body::from(bytes))
}

fn cached_body_response(data: &Arc<Vec<u8>>) -> Response {
    let mut response = Response::new(Body::from(data.as_ref().clone()));
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    response
}

/// Axum middleware clearing cache patterns after successful mutations.
pub async fn invalidate_on_write(
    State(layer): State<InvalidateOnWrite>,
    req: Request,
    next: Next,
) -> Response {
    let method = req.method().clone();
    let response = next.run(req).await;

    let mutating = !matches!(method, Method::GET | Method::HEAD | Method::OPTIONS);
    if mutating && response.status().is_success() {
        for pattern in layer.patterns {
            layer.cache.invalidate_pattern(pattern).await;
        }
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_shape() {
        let key = fingerprint("farms", "u1", "/api/farms", "");
        assert_eq!(key, "farms_u1_/api/farms_{}");
        assert!(key.starts_with("farms_"));

        let key = fingerprint("cattle", "anonymous", "/api/cattle", "farmId=42");
        assert_eq!(key, "cattle_anonymous_/api/cattle_{farmId=42}");
    }

    #[test]
    fn fingerprint_discriminates_callers_and_routes() {
        let a = fingerprint("farms", "u1", "/api/farms", "");
        let b = fingerprint("farms", "u2", "/api/farms", "");
        let c = fingerprint("farms", "u1", "/api/farms/7", "");
        assert_ne!(a, b);
        assert_ne!(a, c);
    }
}
