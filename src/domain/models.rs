use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, Hash)]
#[sqlx(type_name = "sentiment", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Negative,
    Neutral,
}

impl Sentiment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sentiment::Positive => "positive",
            Sentiment::Negative => "negative",
            Sentiment::Neutral => "neutral",
        }
    }

    /// Parse used on remote classifier output: only the exact lowercase
    /// labels count, anything else is neutral.
    pub fn coerce(raw: &str) -> Self {
        match raw {
            "positive" => Sentiment::Positive,
            "negative" => Sentiment::Negative,
            _ => Sentiment::Neutral,
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "alert_severity", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "sender_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SenderType {
    Student,
    Faculty,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Faculty,
    Student,
}

impl From<UserRole> for SenderType {
    fn from(role: UserRole) -> Self {
        match role {
            UserRole::Faculty => SenderType::Faculty,
            UserRole::Student => SenderType::Student,
        }
    }
}

/// Output of the sentiment classifier, already normalized.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Analysis {
    pub topic: String,
    pub sentiment: Sentiment,
    pub suggestions: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct FeedbackRecord {
    pub id: Uuid,
    pub message: String,
    pub sentiment: Sentiment,
    pub topic: String,
    pub suggestions: String,
    pub is_anonymous: bool,
    pub student_name: Option<String>,
    #[serde(skip_serializing, default)]
    pub student_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub viewed_at: Option<DateTime<Utc>>,
    pub viewed_by: Option<Uuid>,
}

impl FeedbackRecord {
    /// Records the first faculty view. Returns false when already viewed.
    pub fn mark_viewed(&mut self, reviewer: Uuid, at: DateTime<Utc>) -> bool {
        if self.viewed_at.is_some() {
            return false;
        }
        self.viewed_at = Some(at);
        self.viewed_by = Some(reviewer);
        true
    }

    pub fn is_owned_by(&self, user_id: Uuid) -> bool {
        self.student_id == Some(user_id)
    }

    pub fn display_name(&self) -> &str {
        if self.is_anonymous {
            return "Anonymous";
        }
        self.student_name.as_deref().unwrap_or("Anonymous")
    }
}

/// Feedback ready for persistence; storage assigns `id` and `created_at`.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FeedbackDraft {
    pub message: String,
    pub sentiment: Sentiment,
    pub topic: String,
    pub suggestions: String,
    pub is_anonymous: bool,
    pub student_name: Option<String>,
    pub student_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct AlertDraft {
    pub alert_type: String,
    pub severity: Severity,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AlertRecord {
    pub id: Uuid,
    pub feedback_id: Uuid,
    pub alert_type: String,
    pub severity: Severity,
    pub created_at: DateTime<Utc>,
}

/// Parent feedback fields shown next to an alert on the dashboard.
#[derive(Debug, Clone, Serialize)]
pub struct AlertFeedbackSummary {
    pub id: Uuid,
    pub message: String,
    pub student_name: Option<String>,
    pub is_anonymous: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AlertWithFeedback {
    #[serde(flatten)]
    pub alert: AlertRecord,
    pub feedback: AlertFeedbackSummary,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct FeedbackMessage {
    pub id: Uuid,
    pub feedback_id: Uuid,
    pub sender_id: Uuid,
    pub sender_type: SenderType,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SentimentDistribution {
    pub positive: usize,
    pub negative: usize,
    pub neutral: usize,
}

impl SentimentDistribution {
    pub fn record(&mut self, sentiment: Sentiment) {
        match sentiment {
            Sentiment::Positive => self.positive += 1,
            Sentiment::Negative => self.negative += 1,
            Sentiment::Neutral => self.neutral += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.positive + self.negative + self.neutral
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TopicCount {
    pub topic: String,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DailyCount {
    pub date: NaiveDate,
    pub count: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DashboardStats {
    pub total_feedback: usize,
    pub sentiment_distribution: SentimentDistribution,
    pub top_topics: Vec<TopicCount>,
    pub recent_activity: Vec<DailyCount>,
}

impl DashboardStats {
    pub fn positive_percentage(&self) -> u32 {
        if self.total_feedback == 0 {
            return 0;
        }
        let share = self.sentiment_distribution.positive as f64 / self.total_feedback as f64;
        (share * 100.0).round() as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(is_anonymous: bool, name: Option<&str>) -> FeedbackRecord {
        FeedbackRecord {
            id: Uuid::new_v4(),
            message: "The labs run late".to_string(),
            sentiment: Sentiment::Neutral,
            topic: "general".to_string(),
            suggestions: String::new(),
            is_anonymous,
            student_name: name.map(String::from),
            student_id: None,
            created_at: Utc::now(),
            viewed_at: None,
            viewed_by: None,
        }
    }

    #[test]
    fn mark_viewed_only_sets_once() {
        let mut record = sample(true, None);
        let first = Uuid::new_v4();
        let first_at = Utc::now();
        assert!(record.mark_viewed(first, first_at));

        assert!(!record.mark_viewed(Uuid::new_v4(), Utc::now()));
        assert_eq!(record.viewed_by, Some(first));
        assert_eq!(record.viewed_at, Some(first_at));
    }

    #[test]
    fn display_name_hides_anonymous_students() {
        assert_eq!(sample(true, None).display_name(), "Anonymous");
        assert_eq!(sample(false, Some("Alice")).display_name(), "Alice");
        assert_eq!(sample(false, None).display_name(), "Anonymous");
    }

    #[test]
    fn sentiment_coerce_defaults_to_neutral() {
        assert_eq!(Sentiment::coerce("positive"), Sentiment::Positive);
        assert_eq!(Sentiment::coerce("negative"), Sentiment::Negative);
        assert_eq!(Sentiment::coerce("mixed"), Sentiment::Neutral);
        assert_eq!(Sentiment::coerce(" Positive "), Sentiment::Neutral);
        assert_eq!(Sentiment::coerce("NEGATIVE"), Sentiment::Neutral);
    }

    #[test]
    fn student_id_never_serialized() {
        let mut record = sample(false, Some("Alice"));
        record.student_id = Some(Uuid::new_v4());
        let json = serde_json::to_value(&record).unwrap();
        assert!(json.get("student_id").is_none());
        assert_eq!(json["sentiment"], "neutral");
    }

    #[test]
    fn positive_percentage_rounds() {
        let stats = DashboardStats {
            total_feedback: 3,
            sentiment_distribution: SentimentDistribution {
                positive: 2,
                negative: 1,
                neutral: 0,
            },
            ..Default::default()
        };
        assert_eq!(stats.positive_percentage(), 67);
        assert_eq!(DashboardStats::default().positive_percentage(), 0);
    }
}
