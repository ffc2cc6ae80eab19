use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

/// Publisher for the external, cross-process message bus.
///
/// Delivery is best-effort; this process never retries.
#[async_trait]
pub trait MessageBus: Send + Sync {
    async fn publish(&self, topic: &str, payload: &str) -> Result<(), BusError>;
}

#[derive(Debug, thiserror::Error)]
pub enum BusError {
    #[error("network error: {0}")]
    Network(String),
    #[error("bus rejected event {0}: {1}")]
    Rejected(u16, String),
    #[error("failed to build bus client: {0}")]
    Client(String),
}

/// Accepts every event without forwarding it anywhere
pub struct NoopBus;

#[async_trait]
impl MessageBus for NoopBus {
    async fn publish(&self, topic: &str, _payload: &str) -> Result<(), BusError> {
        debug!(topic = %topic, "no external bus configured, skipping publish");
        Ok(())
    }
}

/// Publishes each event as a JSON POST to `{base_url}/{topic}`
#[derive(Clone)]
pub struct HttpBus {
    http_client: reqwest::Client,
    base_url: String,
}

impl HttpBus {
    /// `timeout` bounds each whole request, connect through response body.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, BusError> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BusError::Client(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn endpoint(&self, topic: &str) -> String {
        format!("{}/{}", self.base_url, topic)
    }
}

#[async_trait]
impl MessageBus for HttpBus {
    async fn publish(&self, topic: &str, payload: &str) -> Result<(), BusError> {
        let resp = self
            .http_client
            .post(self.endpoint(topic))
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(payload.to_string())
            .send()
            .await
            .map_err(|e| BusError::Network(e.to_string()))?;

        if resp.status().is_success() {
            debug!(topic = %topic, "published event to external bus");
            Ok(())
        } else {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            Err(BusError::Rejected(status.as_u16(), body))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_joins_topic() {
        let bus = HttpBus::new("http://bus.local/publish/", Duration::from_secs(5)).unwrap();
        assert_eq!(
            bus.endpoint("beads.bead.created"),
            "http://bus.local/publish/beads.bead.created"
        );
    }

    #[tokio::test]
    async fn test_noop_bus_accepts_everything() {
        assert!(NoopBus.publish("beads.bead.created", "{}").await.is_ok());
    }

    #[tokio::test]
    async fn test_unreachable_bus_is_network_error() {
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let bus = HttpBus::new(&format!("http://127.0.0.1:{port}"), Duration::from_secs(5)).unwrap();
        let result = bus.publish("beads.bead.created", "{}").await;
        assert!(matches!(result, Err(BusError::Network(_))));
    }

    #[tokio::test]
    async fn test_silent_bus_hits_client_timeout() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let bus = HttpBus::new(&format!("http://{addr}"), Duration::from_millis(100)).unwrap();
        let result = tokio::time::timeout(
            Duration::from_secs(5),
            bus.publish("beads.bead.created", "{}"),
        )
        .await
        .expect("client timeout should fire first");
        assert!(matches!(result, Err(BusError::Network(_))));
    }
}
