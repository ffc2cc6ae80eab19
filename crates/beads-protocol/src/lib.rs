//! Shared protocol definitions for the beads event stream.
//!
//! Both the server and stream consumers depend on this crate so that topic
//! matching and the wire encoding cannot drift apart.

pub mod frame;
pub mod topic;

pub use frame::{FrameDecoder, StreamFrame};
pub use topic::{Topic, TopicFilter, matches};
