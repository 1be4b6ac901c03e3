use crate::domain::models::{
    AlertFeedbackSummary, AlertRecord, AlertWithFeedback, FeedbackMessage, FeedbackRecord,
    SenderType, Severity,
};
use crate::services::pipeline::Submission;
use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use uuid::Uuid;

const FEEDBACK_COLUMNS: &str = "id, message, sentiment, topic, suggestions, is_anonymous, \
     student_name, student_id, created_at, viewed_at, viewed_by";

pub enum ViewOutcome {
    Marked(FeedbackRecord),
    AlreadyViewed(FeedbackRecord),
    NotFound,
}

/// Stores the feedback and its alerts in one transaction. Alerts share the
/// feedback's `created_at`.
pub async fn insert_submission(
    pool: &PgPool,
    submission: &Submission,
) -> Result<(FeedbackRecord, Vec<AlertRecord>)> {
    let draft = &submission.feedback;
    let mut tx = pool.begin().await?;

    let sql = format!(
        r#"
        INSERT INTO feedback (message, sentiment, topic, suggestions, is_anonymous, student_name, student_id)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING {FEEDBACK_COLUMNS}
        "#
    );
    let record = sqlx::query_as::<_, FeedbackRecord>(&sql)
        .bind(&draft.message)
        .bind(draft.sentiment)
        .bind(&draft.topic)
        .bind(&draft.suggestions)
        .bind(draft.is_anonymous)
        .bind(&draft.student_name)
        .bind(draft.student_id)
        .fetch_one(&mut *tx)
        .await?;

    let mut alerts = Vec::with_capacity(submission.alerts.len());
    for alert in &submission.alerts {
        let stored = sqlx::query_as::<_, AlertRecord>(
            r#"
            INSERT INTO alerts (feedback_id, alert_type, severity, created_at)
            VALUES ($1, $2, $3, $4)
            RETURNING id, feedback_id, alert_type, severity, created_at
            "#,
        )
        .bind(record.id)
        .bind(&alert.alert_type)
        .bind(alert.severity)
        .bind(record.created_at)
        .fetch_one(&mut *tx)
        .await?;
        alerts.push(stored);
    }

    tx.commit().await?;
    Ok((record, alerts))
}

pub async fn find_feedback(pool: &PgPool, id: Uuid) -> Result<Option<FeedbackRecord>> {
    let sql = format!("SELECT {FEEDBACK_COLUMNS} FROM feedback WHERE id = $1");
    let record = sqlx::query_as::<_, FeedbackRecord>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(record)
}

pub async fn list_recent_feedback(pool: &PgPool, limit: i64) -> Result<Vec<FeedbackRecord>> {
    let sql = format!(
        "SELECT {FEEDBACK_COLUMNS} FROM feedback ORDER BY created_at DESC LIMIT $1"
    );
    let rows = sqlx::query_as::<_, FeedbackRecord>(&sql)
        .bind(limit)
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

pub async fn list_feedback_for_student(
    pool: &PgPool,
    student_id: Uuid,
) -> Result<Vec<FeedbackRecord>> {
    let sql = format!(
        "SELECT {FEEDBACK_COLUMNS} FROM feedback WHERE student_id = $1 ORDER BY created_at DESC"
    );
    let rows = sqlx::query_as::<_, FeedbackRecord>(&sql)
        .bind(student_id)
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

/// Full feedback history in submission order, the input for stats.
pub async fn list_feedback_for_stats(pool: &PgPool) -> Result<Vec<FeedbackRecord>> {
    let sql = format!("SELECT {FEEDBACK_COLUMNS} FROM feedback ORDER BY created_at ASC, id ASC");
    let rows = sqlx::query_as::<_, FeedbackRecord>(&sql)
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

/// First reviewer wins; later calls leave `viewed_at`/`viewed_by` untouched.
pub async fn mark_viewed(pool: &PgPool, id: Uuid, reviewer: Uuid) -> Result<ViewOutcome> {
    let sql = format!(
        r#"
        UPDATE feedback
        SET viewed_at = NOW(), viewed_by = $2
        WHERE id = $1
          AND viewed_at IS NULL
        RETURNING {FEEDBACK_COLUMNS}
        "#
    );
    let updated = sqlx::query_as::<_, FeedbackRecord>(&sql)
        .bind(id)
        .bind(reviewer)
        .fetch_optional(pool)
        .await?;

    if let Some(record) = updated {
        return Ok(ViewOutcome::Marked(record));
    }

    Ok(match find_feedback(pool, id).await? {
        Some(record) => ViewOutcome::AlreadyViewed(record),
        None => ViewOutcome::NotFound,
    })
}

pub async fn list_alerts(pool: &PgPool) -> Result<Vec<AlertWithFeedback>> {
    let rows = sqlx::query(
        r#"
        SELECT
            a.id,
            a.feedback_id,
            a.alert_type,
            a.severity,
            a.created_at,
            f.message,
            f.student_name,
            f.is_anonymous,
            f.created_at AS feedback_created_at
        FROM alerts a
        JOIN feedback f ON f.id = a.feedback_id
        ORDER BY a.created_at DESC
        "#,
    )
    .fetch_all(pool)
    .await?;

    let mut alerts = Vec::with_capacity(rows.len());
    for row in rows {
        let feedback_id: Uuid = row.try_get("feedback_id")?;
        let is_anonymous: bool = row.try_get("is_anonymous")?;
        let student_name: Option<String> = row.try_get("student_name")?;
        let feedback_created_at: DateTime<Utc> = row.try_get("feedback_created_at")?;

        alerts.push(AlertWithFeedback {
            alert: AlertRecord {
                id: row.try_get("id")?,
                feedback_id,
                alert_type: row.try_get("alert_type")?,
                severity: row.try_get::<Severity, _>("severity")?,
                created_at: row.try_get("created_at")?,
            },
            feedback: AlertFeedbackSummary {
                id: feedback_id,
                message: row.try_get("message")?,
                student_name: if is_anonymous { None } else { student_name },
                is_anonymous,
                created_at: feedback_created_at,
            },
        });
    }
    Ok(alerts)
}

pub async fn count_alerts(pool: &PgPool) -> Result<i64> {
    let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM alerts")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

pub async fn insert_message(
    pool: &PgPool,
    feedback_id: Uuid,
    sender_id: Uuid,
    sender_type: SenderType,
    message: &str,
) -> Result<FeedbackMessage> {
    let stored = sqlx::query_as::<_, FeedbackMessage>(
        r#"
        INSERT INTO messages (feedback_id, sender_id, sender_type, message)
        VALUES ($1, $2, $3, $4)
        RETURNING id, feedback_id, sender_id, sender_type, message, created_at
        "#,
    )
    .bind(feedback_id)
    .bind(sender_id)
    .bind(sender_type)
    .bind(message)
    .fetch_one(pool)
    .await?;
    Ok(stored)
}

pub async fn list_messages(pool: &PgPool, feedback_id: Uuid) -> Result<Vec<FeedbackMessage>> {
    let rows = sqlx::query_as::<_, FeedbackMessage>(
        r#"
        SELECT id, feedback_id, sender_id, sender_type, message, created_at
        FROM messages
        WHERE feedback_id = $1
        ORDER BY created_at ASC
        "#,
    )
    .bind(feedback_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}
