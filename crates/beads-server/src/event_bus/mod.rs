// Event Bus
//
// Every mutation fans out through the Dispatcher to three independent sinks:
// the durable ledger, the external message bus and the in-process Hub that
// feeds live streaming clients. Only the Hub is read by the stream endpoint;
// the ledger is queried by the REST history API.

pub mod bus;
pub mod dispatcher;
pub mod hub;
pub mod ledger;
pub mod ring;

pub use bus::{BusError, HttpBus, MessageBus, NoopBus};
pub use dispatcher::{DispatchConfig, Dispatcher};
pub use hub::{Hub, HubConfig, HubEvent, HubStats, SubscriberId, SubscriberInfo, Subscription};
pub use ledger::{EventLedger, LedgerEntry, LedgerRecord, MemoryLedger, PgLedger};
pub use ring::EventRing;
