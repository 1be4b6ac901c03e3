use crate::analytics::review::{export_rows, ExportRow, FeedbackFilter};
use crate::analytics::stats::aggregate;
use crate::db::{self, ViewOutcome};
use crate::domain::models::{AlertWithFeedback, DashboardStats, FeedbackRecord};
use crate::events::ChangeEvent;
use crate::state::SharedState;
use crate::web::event_stream;
use crate::web::session::FacultySession;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use uuid::Uuid;

const TABLE_LIMIT: i64 = 50;

#[derive(Serialize)]
pub struct StatsResponse {
    #[serde(flatten)]
    pub stats: DashboardStats,
    pub positive_percentage: u32,
    pub alert_count: i64,
}

#[derive(Serialize)]
pub struct ViewedResponse {
    pub feedback: FeedbackRecord,
    pub newly_viewed: bool,
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/stats", get(stats))
        .route("/feedback", get(list_feedback))
        .route("/feedback/:id/viewed", post(mark_viewed))
        .route("/export", get(export))
        .route("/alerts", get(alerts))
        .route("/events", get(events))
        .with_state(state)
}

async fn stats(
    FacultySession(_): FacultySession,
    State(state): State<SharedState>,
) -> Result<Json<StatsResponse>, StatusCode> {
    let records = db::list_feedback_for_stats(&state.pool).await.map_err(|e| {
        tracing::error!("Failed to fetch feedback for stats: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    let alert_count = db::count_alerts(&state.pool).await.map_err(|e| {
        tracing::error!("Failed to count alerts: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    let stats = aggregate(&records);
    Ok(Json(StatsResponse {
        positive_percentage: stats.positive_percentage(),
        stats,
        alert_count,
    }))
}

async fn recent_filtered(
    state: &SharedState,
    filter: &FeedbackFilter,
) -> Result<Vec<FeedbackRecord>, StatusCode> {
    let rows = db::list_recent_feedback(&state.pool, TABLE_LIMIT)
        .await
        .map_err(|e| {
            tracing::error!("Failed to fetch recent feedback: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;
    Ok(filter.apply(rows))
}

async fn list_feedback(
    FacultySession(_): FacultySession,
    State(state): State<SharedState>,
    Query(filter): Query<FeedbackFilter>,
) -> Result<Json<Vec<FeedbackRecord>>, StatusCode> {
    recent_filtered(&state, &filter).await.map(Json)
}

async fn export(
    FacultySession(claims): FacultySession,
    State(state): State<SharedState>,
    Query(filter): Query<FeedbackFilter>,
) -> Result<Json<Vec<ExportRow>>, StatusCode> {
    let rows = recent_filtered(&state, &filter).await?;
    tracing::info!("Faculty {} exported {} feedback rows", claims.user_id, rows.len());
    Ok(Json(export_rows(&rows)))
}

async fn alerts(
    FacultySession(_): FacultySession,
    State(state): State<SharedState>,
) -> Result<Json<Vec<AlertWithFeedback>>, StatusCode> {
    let alerts = db::list_alerts(&state.pool).await.map_err(|e| {
        tracing::error!("Failed to fetch alerts: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    Ok(Json(alerts))
}

async fn mark_viewed(
    FacultySession(claims): FacultySession,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ViewedResponse>, StatusCode> {
    let outcome = db::mark_viewed(&state.pool, id, claims.user_id)
        .await
        .map_err(|e| {
            tracing::error!("Failed to mark feedback {} viewed: {}", id, e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    match outcome {
        ViewOutcome::Marked(feedback) => {
            if let Some(viewed_at) = feedback.viewed_at {
                state.feed.publish(ChangeEvent::FeedbackViewed {
                    feedback_id: id,
                    viewed_at,
                });
            }
            Ok(Json(ViewedResponse {
                feedback,
                newly_viewed: true,
            }))
        }
        ViewOutcome::AlreadyViewed(feedback) => Ok(Json(ViewedResponse {
            feedback,
            newly_viewed: false,
        })),
        ViewOutcome::NotFound => Err(StatusCode::NOT_FOUND),
    }
}

async fn events(
    FacultySession(_): FacultySession,
    State(state): State<SharedState>,
) -> impl IntoResponse {
    event_stream(&state.feed, None)
}
