pub mod beads;
pub mod error;
pub mod events;
pub mod stream;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use std::convert::Infallible;
use uuid::Uuid;

pub const ACTOR_HEADER: &str = "x-beads-actor";
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Who made a mutation and which request it belongs to
///
/// Read from `X-Beads-Actor` (default `anonymous`) and `X-Request-Id`
/// (a fresh UUID when absent) and stamped onto every published event.
#[derive(Debug, Clone)]
pub struct RequestMeta {
    pub actor: String,
    pub correlation_id: String,
}

fn header_value(parts: &Parts, name: &str) -> Option<String> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for RequestMeta
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self {
            actor: header_value(parts, ACTOR_HEADER).unwrap_or_else(|| "anonymous".to_string()),
            correlation_id: header_value(parts, REQUEST_ID_HEADER)
                .unwrap_or_else(|| Uuid::new_v4().to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn extract(request: Request<()>) -> RequestMeta {
        let (mut parts, _) = request.into_parts();
        RequestMeta::from_request_parts(&mut parts, &()).await.unwrap()
    }

    #[tokio::test]
    async fn test_request_meta_from_headers() {
        let request = Request::builder()
            .header("X-Beads-Actor", "alice")
            .header("X-Request-Id", "req-42")
            .body(())
            .unwrap();

        let meta = extract(request).await;
        assert_eq!(meta.actor, "alice");
        assert_eq!(meta.correlation_id, "req-42");
    }

    #[tokio::test]
    async fn test_request_meta_defaults() {
        let meta = extract(Request::builder().body(()).unwrap()).await;
        assert_eq!(meta.actor, "anonymous");
        assert!(Uuid::parse_str(&meta.correlation_id).is_ok());
    }
}
