use std::collections::{HashMap, HashSet};

use chrono::Utc;
use tokio::sync::RwLock;

use crate::models::{
    Bead, BeadDependencies, BeadDetail, BeadQuery, BeadStatus, Comment, CreateBeadRequest, Dependency,
    DependencyKind, UpdateBeadRequest, MAX_PRIORITY,
};
use crate::{BeadsError, Result};

const MAX_LABEL_LEN: usize = 64;

#[derive(Default)]
struct StoreState {
    next_bead: u64,
    next_comment: u64,
    beads: HashMap<String, Bead>,
    dependencies: Vec<Dependency>,
    comments: Vec<Comment>,
}

impl StoreState {
    fn bead(&self, id: &str) -> Result<&Bead> {
        self.beads
            .get(id)
            .ok_or_else(|| BeadsError::NotFound(format!("Bead {} not found", id)))
    }

    fn bead_mut(&mut self, id: &str) -> Result<&mut Bead> {
        self.beads
            .get_mut(id)
            .ok_or_else(|| BeadsError::NotFound(format!("Bead {} not found", id)))
    }

    /// Is `target` reachable from `start` along `blocks` edges?
    fn reaches(&self, start: &str, target: &str) -> bool {
        let mut stack = vec![start];
        let mut seen = HashSet::new();

        while let Some(node) = stack.pop() {
            if node == target {
                return true;
            }
            if !seen.insert(node) {
                continue;
            }
            stack.extend(
                self.dependencies
                    .iter()
                    .filter(|d| d.kind == DependencyKind::Blocks && d.from_id == node)
                    .map(|d| d.to_id.as_str()),
            );
        }
        false
    }

    fn is_ready(&self, bead: &Bead) -> bool {
        bead.status == BeadStatus::Open
            && self
                .dependencies
                .iter()
                .filter(|d| d.kind == DependencyKind::Blocks && d.from_id == bead.id)
                .all(|d| self.beads.get(&d.to_id).is_none_or(|b| b.status.is_closed()))
    }
}

fn validate_title(title: &str) -> Result<String> {
    let title = title.trim();
    if title.is_empty() {
        return Err(BeadsError::InvalidInput("title must not be empty".to_string()));
    }
    Ok(title.to_string())
}

fn validate_priority(priority: u8) -> Result<u8> {
    if priority > MAX_PRIORITY {
        return Err(BeadsError::InvalidInput(format!(
            "priority must be between 0 and {}",
            MAX_PRIORITY
        )));
    }
    Ok(priority)
}

fn validate_label(label: &str) -> Result<String> {
    let label = label.trim();
    if label.is_empty() || label.len() > MAX_LABEL_LEN || label.chars().any(char::is_whitespace) {
        return Err(BeadsError::InvalidInput(format!(
            "label must be 1-{} characters without whitespace",
            MAX_LABEL_LEN
        )));
    }
    Ok(label.to_string())
}

fn sort_beads(beads: &mut [Bead]) {
    beads.sort_by(|a, b| {
        a.priority
            .cmp(&b.priority)
            .then(a.created_at.cmp(&b.created_at))
            .then(a.id.cmp(&b.id))
    });
}

/// In-memory bead store
///
/// Holds beads, the dependency graph and comments. Every mutating method
/// returns the committed value so handlers can publish it afterwards.
#[derive(Default)]
pub struct BeadStore {
    state: RwLock<StoreState>,
}

impl BeadStore {
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Bead operations
    // ========================================================================

    pub async fn create_bead(&self, req: CreateBeadRequest) -> Result<Bead> {
        let title = validate_title(&req.title)?;
        let priority = validate_priority(req.priority)?;
        let labels = req
            .labels
            .iter()
            .map(|l| validate_label(l))
            .collect::<Result<_>>()?;

        let mut state = self.state.write().await;
        state.next_bead += 1;
        let now = Utc::now();
        let bead = Bead {
            id: format!("bd-{}", state.next_bead),
            title,
            description: req.description,
            status: BeadStatus::Open,
            priority,
            issue_type: req.issue_type,
            assignee: req.assignee,
            labels,
            created_at: now,
            updated_at: now,
            closed_at: None,
            close_reason: None,
        };

        state.beads.insert(bead.id.clone(), bead.clone());
        Ok(bead)
    }

    pub async fn get_bead(&self, id: &str) -> Option<Bead> {
        self.state.read().await.beads.get(id).cloned()
    }

    /// Bead with its edges and comments, read under one lock
    pub async fn bead_detail(&self, id: &str) -> Result<BeadDetail> {
        let state = self.state.read().await;
        let bead = state.bead(id)?.clone();

        let (depends_on, dependents) = state
            .dependencies
            .iter()
            .filter(|d| d.from_id == id || d.to_id == id)
            .cloned()
            .partition(|d| d.from_id == id);
        let comments = state
            .comments
            .iter()
            .filter(|c| c.bead_id == id)
            .cloned()
            .collect();

        Ok(BeadDetail {
            bead,
            dependencies: BeadDependencies {
                depends_on,
                dependents,
            },
            comments,
        })
    }

    pub async fn list_beads(&self, query: &BeadQuery) -> Vec<Bead> {
        let state = self.state.read().await;
        let mut beads: Vec<Bead> = state
            .beads
            .values()
            .filter(|b| query.status.is_none_or(|s| b.status == s))
            .filter(|b| query.label.as_ref().is_none_or(|l| b.labels.contains(l)))
            .filter(|b| {
                query
                    .assignee
                    .as_ref()
                    .is_none_or(|a| b.assignee.as_ref() == Some(a))
            })
            .cloned()
            .collect();

        sort_beads(&mut beads);
        beads
    }

    /// Open beads whose `blocks` prerequisites are all closed
    pub async fn ready_beads(&self) -> Vec<Bead> {
        let state = self.state.read().await;
        let mut beads: Vec<Bead> = state
            .beads
            .values()
            .filter(|b| state.is_ready(b))
            .cloned()
            .collect();

        sort_beads(&mut beads);
        beads
    }

    pub async fn update_bead(&self, id: &str, req: UpdateBeadRequest) -> Result<Bead> {
        let title = req.title.as_deref().map(validate_title).transpose()?;
        let priority = req.priority.map(validate_priority).transpose()?;

        let mut state = self.state.write().await;
        let bead = state.bead_mut(id)?;

        if let Some(status) = req.status {
            if status.is_closed() != bead.status.is_closed() {
                return Err(BeadsError::InvalidInput(
                    "use the close and reopen endpoints to change closed state".to_string(),
                ));
            }
            bead.status = status;
        }
        if let Some(title) = title {
            bead.title = title;
        }
        if let Some(description) = req.description {
            bead.description = description;
        }
        if let Some(priority) = priority {
            bead.priority = priority;
        }
        if let Some(issue_type) = req.issue_type {
            bead.issue_type = issue_type;
        }
        if let Some(assignee) = req.assignee {
            bead.assignee = assignee;
        }

        bead.updated_at = Utc::now();
        Ok(bead.clone())
    }

    pub async fn close_bead(&self, id: &str, reason: Option<String>) -> Result<Bead> {
        let mut state = self.state.write().await;
        let bead = state.bead_mut(id)?;
        if bead.status.is_closed() {
            return Err(BeadsError::Conflict(format!("Bead {} is already closed", id)));
        }

        let now = Utc::now();
        bead.status = BeadStatus::Closed;
        bead.closed_at = Some(now);
        bead.close_reason = reason;
        bead.updated_at = now;
        Ok(bead.clone())
    }

    pub async fn reopen_bead(&self, id: &str) -> Result<Bead> {
        let mut state = self.state.write().await;
        let bead = state.bead_mut(id)?;
        if !bead.status.is_closed() {
            return Err(BeadsError::Conflict(format!("Bead {} is not closed", id)));
        }

        bead.status = BeadStatus::Open;
        bead.closed_at = None;
        bead.close_reason = None;
        bead.updated_at = Utc::now();
        Ok(bead.clone())
    }

    /// Remove a bead together with its edges and comments
    pub async fn delete_bead(&self, id: &str) -> Result<Bead> {
        let mut state = self.state.write().await;
        let bead = state
            .beads
            .remove(id)
            .ok_or_else(|| BeadsError::NotFound(format!("Bead {} not found", id)))?;

        state
            .dependencies
            .retain(|d| d.from_id != bead.id && d.to_id != bead.id);
        state.comments.retain(|c| c.bead_id != bead.id);
        Ok(bead)
    }

    // ========================================================================
    // Label operations
    // ========================================================================

    pub async fn add_label(&self, id: &str, label: &str) -> Result<Bead> {
        let label = validate_label(label)?;

        let mut state = self.state.write().await;
        let bead = state.bead_mut(id)?;
        if !bead.labels.insert(label.clone()) {
            return Err(BeadsError::Conflict(format!(
                "Bead {} already has label {}",
                id, label
            )));
        }

        bead.updated_at = Utc::now();
        Ok(bead.clone())
    }

    pub async fn remove_label(&self, id: &str, label: &str) -> Result<Bead> {
        let mut state = self.state.write().await;
        let bead = state.bead_mut(id)?;
        if !bead.labels.remove(label) {
            return Err(BeadsError::NotFound(format!(
                "Bead {} has no label {}",
                id, label
            )));
        }

        bead.updated_at = Utc::now();
        Ok(bead.clone())
    }

    // ========================================================================
    // Dependency operations
    // ========================================================================

    pub async fn add_dependency(
        &self,
        from_id: &str,
        to_id: &str,
        kind: DependencyKind,
    ) -> Result<Dependency> {
        if from_id == to_id {
            return Err(BeadsError::InvalidInput(
                "a bead cannot depend on itself".to_string(),
            ));
        }

        let mut state = self.state.write().await;
        state.bead(from_id)?;
        state.bead(to_id)?;

        if state
            .dependencies
            .iter()
            .any(|d| d.from_id == from_id && d.to_id == to_id)
        {
            return Err(BeadsError::Conflict(format!(
                "{} already depends on {}",
                from_id, to_id
            )));
        }

        if kind == DependencyKind::Blocks && state.reaches(to_id, from_id) {
            return Err(BeadsError::InvalidInput(format!(
                "{} -> {} would create a dependency cycle",
                from_id, to_id
            )));
        }

        let dependency = Dependency {
            from_id: from_id.to_string(),
            to_id: to_id.to_string(),
            kind,
            created_at: Utc::now(),
        };
        state.dependencies.push(dependency.clone());
        Ok(dependency)
    }

    pub async fn remove_dependency(&self, from_id: &str, to_id: &str) -> Result<Dependency> {
        let mut state = self.state.write().await;
        let index = state
            .dependencies
            .iter()
            .position(|d| d.from_id == from_id && d.to_id == to_id)
            .ok_or_else(|| {
                BeadsError::NotFound(format!("{} does not depend on {}", from_id, to_id))
            })?;

        Ok(state.dependencies.remove(index))
    }

    pub async fn dependencies(&self, id: &str) -> Result<BeadDependencies> {
        let state = self.state.read().await;
        state.bead(id)?;

        let (depends_on, dependents): (Vec<_>, Vec<_>) = state
            .dependencies
            .iter()
            .filter(|d| d.from_id == id || d.to_id == id)
            .cloned()
            .partition(|d| d.from_id == id);

        Ok(BeadDependencies {
            depends_on,
            dependents,
        })
    }

    // ========================================================================
    // Comment operations
    // ========================================================================

    pub async fn add_comment(&self, id: &str, author: &str, text: &str) -> Result<Comment> {
        let text = text.trim();
        if text.is_empty() {
            return Err(BeadsError::InvalidInput("comment must not be empty".to_string()));
        }

        let mut state = self.state.write().await;
        state.bead(id)?;
        state.next_comment += 1;

        let comment = Comment {
            id: state.next_comment,
            bead_id: id.to_string(),
            author: author.to_string(),
            text: text.to_string(),
            created_at: Utc::now(),
        };
        state.comments.push(comment.clone());
        Ok(comment)
    }

    pub async fn comments(&self, id: &str) -> Result<Vec<Comment>> {
        let state = self.state.read().await;
        state.bead(id)?;

        Ok(state
            .comments
            .iter()
            .filter(|c| c.bead_id == id)
            .cloned()
            .collect())
    }
}
