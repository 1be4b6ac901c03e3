use crate::domain::models::{AlertDraft, FeedbackDraft};
use crate::services::alerts;
use crate::services::classifier::SentimentClassifier;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

pub const MAX_MESSAGE_CHARS: usize = 2000;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("feedback message is empty")]
    EmptyMessage,
    #[error("feedback message exceeds {max} characters")]
    MessageTooLong { max: usize },
}

/// Everything the storage layer needs to persist one submission.
#[derive(Debug, Clone, Serialize)]
pub struct Submission {
    pub feedback: FeedbackDraft,
    pub alerts: Vec<AlertDraft>,
}

/// Trims and bounds free text coming from students or faculty.
pub fn validate_message(raw: &str) -> Result<&str, ValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyMessage);
    }
    if trimmed.chars().count() > MAX_MESSAGE_CHARS {
        return Err(ValidationError::MessageTooLong {
            max: MAX_MESSAGE_CHARS,
        });
    }
    Ok(trimmed)
}

pub struct FeedbackPipeline {
    classifier: SentimentClassifier,
}

impl FeedbackPipeline {
    pub fn new(classifier: SentimentClassifier) -> Self {
        Self { classifier }
    }

    /// Validates, classifies and scans one submission. Storage is left to the
    /// caller.
    pub async fn submit(
        &self,
        raw_text: &str,
        is_anonymous: bool,
        student_name: Option<&str>,
        student_id: Option<Uuid>,
    ) -> Result<Submission, ValidationError> {
        let message = validate_message(raw_text)?;

        let analysis = self.classifier.classify(message).await;
        let alerts = alerts::scan(message);

        let student_name = if is_anonymous {
            None
        } else {
            student_name
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(String::from)
        };

        if !alerts.is_empty() {
            tracing::info!(
                "Feedback raised {} alert(s): {:?}",
                alerts.len(),
                alerts.iter().map(|a| a.alert_type.as_str()).collect::<Vec<_>>()
            );
        }

        Ok(Submission {
            feedback: FeedbackDraft {
                message: message.to_string(),
                sentiment: analysis.sentiment,
                topic: analysis.topic,
                suggestions: analysis.suggestions,
                is_anonymous,
                student_name,
                student_id,
            },
            alerts,
        })
    }
}
