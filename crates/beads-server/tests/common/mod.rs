#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use beads_protocol::{FrameDecoder, StreamFrame};
use beads_server::config::Settings;
use beads_server::event_bus::{EventLedger, MemoryLedger, NoopBus};
use beads_server::{router, AppState};
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::time::timeout;

pub type TestResult = Result<(), Box<dyn std::error::Error>>;

pub const WAIT: Duration = Duration::from_secs(5);

/// Running server bound to an ephemeral local port
pub struct TestApp {
    pub base_url: String,
    pub state: AppState,
    pub client: reqwest::Client,
}

pub async fn spawn_app(settings: Settings) -> TestApp {
    spawn_app_with_ledger(settings, Arc::new(MemoryLedger::new())).await
}

pub async fn spawn_app_with_ledger(settings: Settings, ledger: Arc<dyn EventLedger>) -> TestApp {
    let state = AppState::from_parts(settings, ledger, Arc::new(NoopBus));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let app = router(state.clone());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestApp {
        base_url: format!("http://{}", addr),
        state,
        client: reqwest::Client::new(),
    }
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// POST /api/beads as actor `tester`
    pub async fn create_bead(&self, title: &str) -> Value {
        self.client
            .post(self.url("/api/beads"))
            .header("X-Beads-Actor", "tester")
            .json(&serde_json::json!({ "title": title }))
            .send()
            .await
            .unwrap()
            .error_for_status()
            .unwrap()
            .json()
            .await
            .unwrap()
    }

    pub async fn open_stream(&self, query: &str, last_event_id: Option<u64>) -> EventStream {
        let mut request = self.client.get(self.url(&format!("/api/events/stream{}", query)));
        if let Some(id) = last_event_id {
            request = request.header("Last-Event-ID", id.to_string());
        }

        let response = timeout(WAIT, request.send()).await.unwrap().unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::OK);
        EventStream::new(response)
    }

    /// Wait until the hub reports `count` subscribers
    pub async fn wait_for_subscribers(&self, count: usize) {
        timeout(WAIT, async {
            while self.state.hub.subscriber_count() != count {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap_or_else(|_| {
            panic!(
                "expected {} subscribers, hub has {}",
                count,
                self.state.hub.subscriber_count()
            )
        });
    }
}

/// Client side of an open `text/event-stream` response
pub struct EventStream {
    response: reqwest::Response,
    decoder: FrameDecoder,
    pending: VecDeque<StreamFrame>,
}

impl EventStream {
    pub fn new(response: reqwest::Response) -> Self {
        Self {
            response,
            decoder: FrameDecoder::new(),
            pending: VecDeque::new(),
        }
    }

    pub async fn next_frame(&mut self) -> StreamFrame {
        loop {
            if let Some(frame) = self.pending.pop_front() {
                return frame;
            }

            let chunk = timeout(WAIT, self.response.chunk())
                .await
                .expect("timed out waiting for stream frame")
                .unwrap()
                .expect("stream ended");
            self.pending.extend(self.decoder.push(&chunk));
        }
    }

    /// Next event frame, skipping keepalives
    pub async fn next_event(&mut self) -> (u64, String, Value) {
        loop {
            if let StreamFrame::Event { id, topic, data } = self.next_frame().await {
                return (id, topic, serde_json::from_str(&data).unwrap());
            }
        }
    }
}
