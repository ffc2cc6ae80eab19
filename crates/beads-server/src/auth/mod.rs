use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use tracing::{debug, warn};

use crate::config::Settings;

/// Whether the caller presented the configured token
#[derive(Debug, Clone)]
pub enum AuthContext {
    Authenticated,
    None,
}

impl AuthContext {
    pub fn require_auth(&self) -> Result<(), StatusCode> {
        match self {
            AuthContext::Authenticated => Ok(()),
            AuthContext::None => Err(StatusCode::UNAUTHORIZED),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, AuthContext::Authenticated)
    }

    /// Resolve the context for an optional presented token
    pub fn resolve(settings: &Settings, token: Option<&str>) -> Self {
        if !settings.auth_enabled() {
            return AuthContext::Authenticated;
        }

        match token {
            Some(t) if settings.token_matches(t) => {
                debug!("Token authenticated");
                AuthContext::Authenticated
            }
            Some(_) => {
                warn!("Invalid token provided");
                AuthContext::None
            }
            None => {
                debug!("No token provided");
                AuthContext::None
            }
        }
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

/// Attach an [`AuthContext`] from the `Authorization: Bearer` header
///
/// Never rejects on its own; handlers call `require_auth`. Browser
/// `EventSource` clients cannot set headers, so `GET /api/events/stream`
/// also accepts the token as `?token=` and checks it itself when this
/// context is `None`. With no `user_token` configured every request is
/// authenticated.
pub async fn auth_middleware(
    State(settings): State<Settings>,
    mut request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let context = AuthContext::resolve(&settings, bearer_token(request.headers()));

    request.extensions_mut().insert(context);
    Ok(next.run(request).await)
}
