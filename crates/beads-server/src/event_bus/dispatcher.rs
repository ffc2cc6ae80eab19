use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::timeout;
use tracing::{debug, error, warn};

use super::bus::MessageBus;
use super::hub::Hub;
use super::ledger::{EventLedger, LedgerEntry};

/// Limits applied to the external sinks
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DispatchConfig {
    /// Seconds a single ledger append or bus publish may take (default: 5)
    #[serde(default = "default_sink_timeout_secs")]
    pub sink_timeout_secs: u64,
}

fn default_sink_timeout_secs() -> u64 {
    5
}

impl DispatchConfig {
    pub fn sink_timeout(&self) -> Duration {
        Duration::from_secs(self.sink_timeout_secs.max(1))
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            sink_timeout_secs: default_sink_timeout_secs(),
        }
    }
}

/// Publish Dispatcher
///
/// Single entry point for mutation handlers. One call fans the event out to:
/// 1. the durable ledger
/// 2. the external message bus
/// 3. the in-process hub (live streaming clients)
///
/// The sinks are independent: a failure or timeout in one is logged and never
/// stops the others. The calling mutation has already committed, so nothing
/// is returned.
pub struct Dispatcher {
    ledger: Arc<dyn EventLedger>,
    bus: Arc<dyn MessageBus>,
    hub: Arc<Hub>,
    sink_timeout: Duration,
}

impl Dispatcher {
    pub fn new(ledger: Arc<dyn EventLedger>, bus: Arc<dyn MessageBus>, hub: Arc<Hub>) -> Self {
        Self {
            ledger,
            bus,
            hub,
            sink_timeout: DispatchConfig::default().sink_timeout(),
        }
    }

    /// Bound each ledger append and bus publish to `sink_timeout`.
    pub fn with_sink_timeout(mut self, sink_timeout: Duration) -> Self {
        self.sink_timeout = sink_timeout;
        self
    }

    pub async fn dispatch<T>(&self, topic: &str, correlation_id: &str, actor: &str, payload: &T)
    where
        T: Serialize + ?Sized,
    {
        let data = match serde_json::to_string(payload) {
            Ok(data) => data,
            Err(e) => {
                error!(topic = %topic, correlation_id = %correlation_id, error = %e, "failed to serialize event payload, dropping event");
                return;
            }
        };

        let entry = LedgerEntry {
            topic,
            correlation_id,
            actor,
            payload: &data,
        };
        match timeout(self.sink_timeout, self.ledger.append(entry)).await {
            Ok(Ok(id)) => debug!(topic = %topic, ledger_id = id, "event recorded"),
            Ok(Err(e)) => {
                warn!(topic = %topic, correlation_id = %correlation_id, error = %e, "failed to record event in ledger")
            }
            Err(_) => {
                warn!(topic = %topic, correlation_id = %correlation_id, timeout = ?self.sink_timeout, "ledger append timed out")
            }
        }

        match timeout(self.sink_timeout, self.bus.publish(topic, &data)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                warn!(topic = %topic, correlation_id = %correlation_id, error = %e, "failed to publish event to external bus")
            }
            Err(_) => {
                warn!(topic = %topic, correlation_id = %correlation_id, timeout = ?self.sink_timeout, "external bus publish timed out")
            }
        }

        let sequence = self.hub.broadcast(topic, data);
        debug!(topic = %topic, sequence, actor = %actor, "event broadcast");
    }
}
