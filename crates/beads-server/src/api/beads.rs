use axum::extract::{Path, Query, State};
use axum::{Extension, Json};
use beads_protocol::Topic;

use crate::api::error::ApiError;
use crate::api::RequestMeta;
use crate::auth::AuthContext;
use crate::models::{
    Bead, BeadDeletedEvent, BeadDependencies, BeadDetail, BeadQuery, CloseBeadRequest, Comment,
    CommentRequest, CreateBeadRequest, Dependency, DependencyRequest, LabelEvent, LabelRequest,
    UpdateBeadRequest,
};
use crate::{Db, Publisher};

// ============================================================================
// Beads
// ============================================================================

/// GET /api/beads - List beads, optionally filtered by status, label or assignee
pub async fn list_beads(
    Extension(auth): Extension<AuthContext>,
    State(db): State<Db>,
    Query(query): Query<BeadQuery>,
) -> Result<Json<Vec<Bead>>, ApiError> {
    auth.require_auth().map_err(|_| ApiError::unauthorized())?;

    Ok(Json(db.list_beads(&query).await))
}

/// GET /api/beads/ready - Open beads with nothing blocking them
pub async fn ready_beads(
    Extension(auth): Extension<AuthContext>,
    State(db): State<Db>,
) -> Result<Json<Vec<Bead>>, ApiError> {
    auth.require_auth().map_err(|_| ApiError::unauthorized())?;

    Ok(Json(db.ready_beads().await))
}

/// POST /api/beads - Create a new bead
pub async fn create_bead(
    Extension(auth): Extension<AuthContext>,
    State(db): State<Db>,
    State(publisher): State<Publisher>,
    meta: RequestMeta,
    Json(payload): Json<CreateBeadRequest>,
) -> Result<Json<Bead>, ApiError> {
    auth.require_auth().map_err(|_| ApiError::unauthorized())?;

    let bead = db.create_bead(payload).await?;
    publisher
        .dispatch(Topic::BEAD_CREATED, &meta.correlation_id, &meta.actor, &bead)
        .await;

    Ok(Json(bead))
}

/// GET /api/beads/:bead_id - Get a bead with its dependencies and comments
pub async fn get_bead(
    Extension(auth): Extension<AuthContext>,
    State(db): State<Db>,
    Path(bead_id): Path<String>,
) -> Result<Json<BeadDetail>, ApiError> {
    auth.require_auth().map_err(|_| ApiError::unauthorized())?;

    Ok(Json(db.bead_detail(&bead_id).await?))
}

/// PATCH /api/beads/:bead_id - Update bead fields
pub async fn update_bead(
    Extension(auth): Extension<AuthContext>,
    State(db): State<Db>,
    State(publisher): State<Publisher>,
    Path(bead_id): Path<String>,
    meta: RequestMeta,
    Json(payload): Json<UpdateBeadRequest>,
) -> Result<Json<Bead>, ApiError> {
    auth.require_auth().map_err(|_| ApiError::unauthorized())?;

    let bead = db.update_bead(&bead_id, payload).await?;
    publisher
        .dispatch(Topic::BEAD_UPDATED, &meta.correlation_id, &meta.actor, &bead)
        .await;

    Ok(Json(bead))
}

/// POST /api/beads/:bead_id/close - Close a bead with an optional reason
pub async fn close_bead(
    Extension(auth): Extension<AuthContext>,
    State(db): State<Db>,
    State(publisher): State<Publisher>,
    Path(bead_id): Path<String>,
    meta: RequestMeta,
    payload: Option<Json<CloseBeadRequest>>,
) -> Result<Json<Bead>, ApiError> {
    auth.require_auth().map_err(|_| ApiError::unauthorized())?;

    let reason = payload.and_then(|Json(req)| req.reason);
    let bead = db.close_bead(&bead_id, reason).await?;
    publisher
        .dispatch(Topic::BEAD_CLOSED, &meta.correlation_id, &meta.actor, &bead)
        .await;

    Ok(Json(bead))
}

/// POST /api/beads/:bead_id/reopen - Reopen a closed bead
pub async fn reopen_bead(
    Extension(auth): Extension<AuthContext>,
    State(db): State<Db>,
    State(publisher): State<Publisher>,
    Path(bead_id): Path<String>,
    meta: RequestMeta,
) -> Result<Json<Bead>, ApiError> {
    auth.require_auth().map_err(|_| ApiError::unauthorized())?;

    let bead = db.reopen_bead(&bead_id).await?;
    publisher
        .dispatch(Topic::BEAD_REOPENED, &meta.correlation_id, &meta.actor, &bead)
        .await;

    Ok(Json(bead))
}

/// DELETE /api/beads/:bead_id - Delete a bead and everything attached to it
pub async fn delete_bead(
    Extension(auth): Extension<AuthContext>,
    State(db): State<Db>,
    State(publisher): State<Publisher>,
    Path(bead_id): Path<String>,
    meta: RequestMeta,
) -> Result<Json<()>, ApiError> {
    auth.require_auth().map_err(|_| ApiError::unauthorized())?;

    let bead = db.delete_bead(&bead_id).await?;
    let event = BeadDeletedEvent {
        id: bead.id,
        title: bead.title,
    };
    publisher
        .dispatch(Topic::BEAD_DELETED, &meta.correlation_id, &meta.actor, &event)
        .await;

    Ok(Json(()))
}

// ============================================================================
// Labels
// ============================================================================

/// POST /api/beads/:bead_id/labels - Attach a label
pub async fn add_label(
    Extension(auth): Extension<AuthContext>,
    State(db): State<Db>,
    State(publisher): State<Publisher>,
    Path(bead_id): Path<String>,
    meta: RequestMeta,
    Json(payload): Json<LabelRequest>,
) -> Result<Json<Bead>, ApiError> {
    auth.require_auth().map_err(|_| ApiError::unauthorized())?;

    let bead = db.add_label(&bead_id, &payload.label).await?;
    let event = LabelEvent {
        bead_id: bead.id.clone(),
        label: payload.label.trim().to_string(),
    };
    publisher
        .dispatch(Topic::LABEL_ADDED, &meta.correlation_id, &meta.actor, &event)
        .await;

    Ok(Json(bead))
}

/// DELETE /api/beads/:bead_id/labels/:label - Detach a label
pub async fn remove_label(
    Extension(auth): Extension<AuthContext>,
    State(db): State<Db>,
    State(publisher): State<Publisher>,
    Path((bead_id, label)): Path<(String, String)>,
    meta: RequestMeta,
) -> Result<Json<Bead>, ApiError> {
    auth.require_auth().map_err(|_| ApiError::unauthorized())?;

    let bead = db.remove_label(&bead_id, &label).await?;
    let event = LabelEvent {
        bead_id: bead.id.clone(),
        label,
    };
    publisher
        .dispatch(Topic::LABEL_REMOVED, &meta.correlation_id, &meta.actor, &event)
        .await;

    Ok(Json(bead))
}

// ============================================================================
// Dependencies
// ============================================================================

/// GET /api/beads/:bead_id/dependencies - Outgoing and incoming edges
pub async fn list_dependencies(
    Extension(auth): Extension<AuthContext>,
    State(db): State<Db>,
    Path(bead_id): Path<String>,
) -> Result<Json<BeadDependencies>, ApiError> {
    auth.require_auth().map_err(|_| ApiError::unauthorized())?;

    Ok(Json(db.dependencies(&bead_id).await?))
}

/// POST /api/beads/:bead_id/dependencies - Make this bead depend on another
pub async fn add_dependency(
    Extension(auth): Extension<AuthContext>,
    State(db): State<Db>,
    State(publisher): State<Publisher>,
    Path(bead_id): Path<String>,
    meta: RequestMeta,
    Json(payload): Json<DependencyRequest>,
) -> Result<Json<Dependency>, ApiError> {
    auth.require_auth().map_err(|_| ApiError::unauthorized())?;

    let dependency = db
        .add_dependency(&bead_id, &payload.depends_on, payload.kind)
        .await?;
    publisher
        .dispatch(Topic::DEPENDENCY_ADDED, &meta.correlation_id, &meta.actor, &dependency)
        .await;

    Ok(Json(dependency))
}

/// DELETE /api/beads/:bead_id/dependencies/:depends_on - Remove an edge
pub async fn remove_dependency(
    Extension(auth): Extension<AuthContext>,
    State(db): State<Db>,
    State(publisher): State<Publisher>,
    Path((bead_id, depends_on)): Path<(String, String)>,
    meta: RequestMeta,
) -> Result<Json<Dependency>, ApiError> {
    auth.require_auth().map_err(|_| ApiError::unauthorized())?;

    let dependency = db.remove_dependency(&bead_id, &depends_on).await?;
    publisher
        .dispatch(Topic::DEPENDENCY_REMOVED, &meta.correlation_id, &meta.actor, &dependency)
        .await;

    Ok(Json(dependency))
}

// ============================================================================
// Comments
// ============================================================================

/// GET /api/beads/:bead_id/comments - Comments in posting order
pub async fn list_comments(
    Extension(auth): Extension<AuthContext>,
    State(db): State<Db>,
    Path(bead_id): Path<String>,
) -> Result<Json<Vec<Comment>>, ApiError> {
    auth.require_auth().map_err(|_| ApiError::unauthorized())?;

    Ok(Json(db.comments(&bead_id).await?))
}

/// POST /api/beads/:bead_id/comments - Comment on a bead as the request actor
pub async fn add_comment(
    Extension(auth): Extension<AuthContext>,
    State(db): State<Db>,
    State(publisher): State<Publisher>,
    Path(bead_id): Path<String>,
    meta: RequestMeta,
    Json(payload): Json<CommentRequest>,
) -> Result<Json<Comment>, ApiError> {
    auth.require_auth().map_err(|_| ApiError::unauthorized())?;

    let comment = db.add_comment(&bead_id, &meta.actor, &payload.text).await?;
    publisher
        .dispatch(Topic::COMMENT_ADDED, &meta.correlation_id, &meta.actor, &comment)
        .await;

    Ok(Json(comment))
}
