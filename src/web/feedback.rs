use crate::db::{self, ViewOutcome};
use crate::domain::models::{AlertRecord, FeedbackMessage, FeedbackRecord, SenderType};
use crate::events::ChangeEvent;
use crate::middleware::client_ip;
use crate::services::pipeline::validate_message;
use crate::state::SharedState;
use crate::web::session::{SessionClaims, UserSession};
use crate::web::{event_stream, validation_status};
use axum::{
    extract::{ConnectInfo, Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use uuid::Uuid;

#[derive(Deserialize)]
pub struct SubmitPayload {
    pub message: String,
    #[serde(default = "default_anonymous")]
    pub is_anonymous: bool,
    pub student_name: Option<String>,
}

fn default_anonymous() -> bool {
    true
}

#[derive(Serialize)]
pub struct SubmitResponse {
    pub feedback: FeedbackRecord,
    pub alerts: Vec<AlertRecord>,
}

#[derive(Deserialize)]
pub struct MessagePayload {
    pub message: String,
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/", axum::routing::post(submit_feedback))
        .route("/mine", get(my_feedback))
        .route("/:id", get(get_feedback))
        .route("/:id/messages", get(list_thread).post(post_message))
        .route("/:id/events", get(thread_events))
        .with_state(state)
}

async fn submit_feedback(
    headers: HeaderMap,
    peer: Option<ConnectInfo<SocketAddr>>,
    session: Option<UserSession>,
    State(state): State<SharedState>,
    Json(payload): Json<SubmitPayload>,
) -> Result<(StatusCode, Json<SubmitResponse>), StatusCode> {
    let student_id = session.map(|UserSession(claims)| claims.user_id);

    // guests are limited per IP, signed-in students per account
    let limiter_key = match student_id {
        Some(id) => id.to_string(),
        None => client_ip(
            &headers,
            peer.map(|ConnectInfo(addr)| addr),
            state.trust_proxy,
        ),
    };
    if !state.anon_limiter.check(&limiter_key).await {
        tracing::warn!("Rate limit exceeded for feedback submission from {}", limiter_key);
        return Err(StatusCode::TOO_MANY_REQUESTS);
    }

    let submission = state
        .pipeline
        .submit(
            &payload.message,
            payload.is_anonymous,
            payload.student_name.as_deref(),
            student_id,
        )
        .await
        .map_err(|e| {
            tracing::debug!("Rejected feedback submission: {}", e);
            validation_status(&e)
        })?;

    let (feedback, alerts) = db::insert_submission(&state.pool, &submission)
        .await
        .map_err(|e| {
            tracing::error!("Failed to store feedback: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    tracing::info!(
        "Feedback stored: id={}, sentiment={}, topic={}, alerts={}, anonymous={}",
        feedback.id,
        feedback.sentiment.as_str(),
        feedback.topic,
        alerts.len(),
        feedback.is_anonymous
    );

    state.feed.publish(ChangeEvent::FeedbackCreated {
        feedback_id: feedback.id,
    });
    if !alerts.is_empty() {
        state.feed.publish(ChangeEvent::AlertsRaised {
            feedback_id: feedback.id,
            count: alerts.len(),
        });
    }

    Ok((StatusCode::CREATED, Json(SubmitResponse { feedback, alerts })))
}

async fn my_feedback(
    UserSession(claims): UserSession,
    State(state): State<SharedState>,
) -> Result<Json<Vec<FeedbackRecord>>, StatusCode> {
    let rows = db::list_feedback_for_student(&state.pool, claims.user_id)
        .await
        .map_err(|e| {
            tracing::error!("Failed to fetch feedback for {}: {}", claims.user_id, e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;
    Ok(Json(rows))
}

/// Loads a feedback record the caller may see: its owner or any faculty member.
pub(crate) async fn load_accessible(
    state: &SharedState,
    claims: &SessionClaims,
    id: Uuid,
) -> Result<FeedbackRecord, StatusCode> {
    let record = db::find_feedback(&state.pool, id)
        .await
        .map_err(|e| {
            tracing::error!("Failed to fetch feedback {}: {}", id, e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .ok_or(StatusCode::NOT_FOUND)?;

    if !claims.is_faculty() && !record.is_owned_by(claims.user_id) {
        tracing::warn!("User {} denied access to feedback {}", claims.user_id, id);
        return Err(StatusCode::FORBIDDEN);
    }
    Ok(record)
}

async fn get_feedback(
    UserSession(claims): UserSession,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<FeedbackRecord>, StatusCode> {
    load_accessible(&state, &claims, id).await.map(Json)
}

async fn list_thread(
    UserSession(claims): UserSession,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<FeedbackMessage>>, StatusCode> {
    load_accessible(&state, &claims, id).await?;
    let messages = db::list_messages(&state.pool, id).await.map_err(|e| {
        tracing::error!("Failed to fetch messages for {}: {}", id, e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    Ok(Json(messages))
}

async fn post_message(
    UserSession(claims): UserSession,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<MessagePayload>,
) -> Result<(StatusCode, Json<FeedbackMessage>), StatusCode> {
    let text = validate_message(&payload.message).map_err(|e| validation_status(&e))?;
    let record = load_accessible(&state, &claims, id).await?;
    let sender_type = SenderType::from(claims.role);

    let message = db::insert_message(&state.pool, id, claims.user_id, sender_type, text)
        .await
        .map_err(|e| {
            tracing::error!("Failed to store message on {}: {}", id, e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    state.feed.publish(ChangeEvent::MessagePosted {
        feedback_id: id,
        message_id: message.id,
    });

    // a faculty reply counts as reviewing the feedback
    if sender_type == SenderType::Faculty && record.viewed_at.is_none() {
        match db::mark_viewed(&state.pool, id, claims.user_id).await {
            Ok(ViewOutcome::Marked(updated)) => {
                if let Some(viewed_at) = updated.viewed_at {
                    state.feed.publish(ChangeEvent::FeedbackViewed {
                        feedback_id: id,
                        viewed_at,
                    });
                }
            }
            Ok(_) => {}
            Err(e) => tracing::warn!("Failed to auto-mark feedback {} viewed: {}", id, e),
        }
    }

    Ok((StatusCode::CREATED, Json(message)))
}

async fn thread_events(
    UserSession(claims): UserSession,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, StatusCode> {
    load_accessible(&state, &claims, id).await?;
    Ok(event_stream(&state.feed, Some(id)))
}
