//! Hierarchical topics and glob-style subscription patterns.
//!
//! Topics are dot-separated (`beads.bead.created`). Patterns use two
//! wildcards:
//! - `*` matches exactly one segment
//! - `>` matches one or more remaining segments
//!
//! `>` is not required to be the last pattern segment; wherever it appears it
//! short-circuits the match as long as the topic still has a segment there.

use serde::{Deserialize, Serialize};

/// Topics emitted by the beads server, namespaced as `beads.<entity>.<action>`.
pub struct Topic;

impl Topic {
    // ========================================================================
    // Bead lifecycle
    // ========================================================================
    pub const BEAD_CREATED: &'static str = "beads.bead.created";
    pub const BEAD_UPDATED: &'static str = "beads.bead.updated";
    pub const BEAD_CLOSED: &'static str = "beads.bead.closed";
    pub const BEAD_REOPENED: &'static str = "beads.bead.reopened";
    pub const BEAD_DELETED: &'static str = "beads.bead.deleted";

    // ========================================================================
    // Labels
    // ========================================================================
    pub const LABEL_ADDED: &'static str = "beads.label.added";
    pub const LABEL_REMOVED: &'static str = "beads.label.removed";

    // ========================================================================
    // Dependency graph
    // ========================================================================
    pub const DEPENDENCY_ADDED: &'static str = "beads.dependency.added";
    pub const DEPENDENCY_REMOVED: &'static str = "beads.dependency.removed";

    // ========================================================================
    // Comments
    // ========================================================================
    pub const COMMENT_ADDED: &'static str = "beads.comment.added";
}

/// Does `topic` satisfy the subscription `pattern`?
pub fn matches(pattern: &str, topic: &str) -> bool {
    if pattern == topic {
        return true;
    }

    let mut topic_segments = topic.split('.');

    for segment in pattern.split('.') {
        let Some(current) = topic_segments.next() else {
            return false;
        };

        match segment {
            ">" => return true,
            "*" => {}
            literal if literal == current => {}
            _ => return false,
        }
    }

    topic_segments.next().is_none()
}

/// Ordered list of subscription patterns, combined with logical OR.
///
/// An empty filter matches every topic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TopicFilter {
    patterns: Vec<String>,
}

impl TopicFilter {
    pub fn new(patterns: Vec<String>) -> Self {
        Self { patterns }
    }

    /// Parse a comma-separated pattern list such as `beads.bead.*,beads.label.>`.
    ///
    /// Blank entries are ignored, so `""` and `","` both yield the match-all filter.
    pub fn parse(raw: &str) -> Self {
        let patterns = raw
            .split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(String::from)
            .collect();

        Self { patterns }
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn matches(&self, topic: &str) -> bool {
        self.patterns.is_empty() || self.patterns.iter().any(|p| matches(p, topic))
    }
}

impl From<Vec<String>> for TopicFilter {
    fn from(patterns: Vec<String>) -> Self {
        Self::new(patterns)
    }
}
