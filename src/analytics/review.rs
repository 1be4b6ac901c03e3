use crate::domain::models::{FeedbackRecord, Sentiment};
use serde::de::{Deserializer, IntoDeserializer};
use serde::{Deserialize, Serialize};

/// Dashboard table filter: free-text search plus an optional sentiment.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FeedbackFilter {
    pub search: Option<String>,
    /// `all` or an empty value means no sentiment filter.
    #[serde(default, deserialize_with = "sentiment_filter")]
    pub sentiment: Option<Sentiment>,
}

fn sentiment_filter<'de, D>(deserializer: D) -> Result<Option<Sentiment>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") | Some("all") => Ok(None),
        Some(value) => Sentiment::deserialize(value.into_deserializer()).map(Some),
    }
}

impl FeedbackFilter {
    /// Case-insensitive match on message, topic, or (attributed) student name.
    pub fn matches(&self, record: &FeedbackRecord) -> bool {
        if let Some(sentiment) = self.sentiment {
            if record.sentiment != sentiment {
                return false;
            }
        }

        let Some(term) = self
            .search
            .as_deref()
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
        else {
            return true;
        };

        record.message.to_lowercase().contains(&term)
            || record.topic.to_lowercase().contains(&term)
            || (!record.is_anonymous
                && record
                    .student_name
                    .as_deref()
                    .is_some_and(|name| name.to_lowercase().contains(&term)))
    }

    pub fn apply(&self, records: Vec<FeedbackRecord>) -> Vec<FeedbackRecord> {
        records.into_iter().filter(|r| self.matches(r)).collect()
    }
}

/// One row of the faculty export, in the column order of the download.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct ExportRow {
    pub date: String,
    pub student: String,
    pub topic: String,
    pub sentiment: String,
    pub message: String,
    pub suggestions: String,
}

impl From<&FeedbackRecord> for ExportRow {
    fn from(record: &FeedbackRecord) -> Self {
        Self {
            date: record.created_at.format("%Y-%m-%d %H:%M").to_string(),
            student: record.display_name().to_string(),
            topic: record.topic.clone(),
            sentiment: record.sentiment.as_str().to_string(),
            message: record.message.clone(),
            suggestions: record.suggestions.clone(),
        }
    }
}

pub fn export_rows(records: &[FeedbackRecord]) -> Vec<ExportRow> {
    records.iter().map(ExportRow::from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::Query;
    use axum::http::Uri;
    use chrono::{TimeZone, Utc};
    use uuid::Uuid;

    fn record(message: &str, topic: &str, sentiment: Sentiment, name: Option<&str>) -> FeedbackRecord {
        FeedbackRecord {
            id: Uuid::new_v4(),
            message: message.to_string(),
            sentiment,
            topic: topic.to_string(),
            suggestions: "Keep going".to_string(),
            is_anonymous: name.is_none(),
            student_name: name.map(String::from),
            student_id: None,
            created_at: Utc.with_ymd_and_hms(2026, 2, 14, 9, 30, 0).unwrap(),
            viewed_at: None,
            viewed_by: None,
        }
    }

    #[test]
    fn search_covers_message_topic_and_name() {
        let records = vec![
            record("Projector is broken", "facilities", Sentiment::Negative, None),
            record("Loved the guest talk", "teaching", Sentiment::Positive, Some("Dana")),
            record("Fine", "assignments", Sentiment::Neutral, None),
        ];

        let by_message = FeedbackFilter {
            search: Some("PROJECTOR".to_string()),
            sentiment: None,
        };
        assert_eq!(by_message.apply(records.clone()).len(), 1);

        let by_topic = FeedbackFilter {
            search: Some("assign".to_string()),
            sentiment: None,
        };
        assert_eq!(by_topic.apply(records.clone())[0].message, "Fine");

        let by_name = FeedbackFilter {
            search: Some("dana".to_string()),
            sentiment: None,
        };
        assert_eq!(by_name.apply(records.clone()).len(), 1);

        assert_eq!(FeedbackFilter::default().apply(records).len(), 3);
    }

    #[test]
    fn sentiment_and_search_combine() {
        let records = vec![
            record("Great labs", "labs", Sentiment::Positive, None),
            record("Labs are late", "labs", Sentiment::Negative, None),
        ];
        let filter = FeedbackFilter {
            search: Some("labs".to_string()),
            sentiment: Some(Sentiment::Negative),
        };
        let matched = filter.apply(records);
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].message, "Labs are late");
    }

    fn from_query(query: &str) -> Result<FeedbackFilter, String> {
        let uri: Uri = format!("/dashboard/feedback?{query}").parse().unwrap();
        Query::<FeedbackFilter>::try_from_uri(&uri)
            .map(|Query(filter)| filter)
            .map_err(|e| e.body_text())
    }

    #[test]
    fn all_or_blank_sentiment_means_no_filter() {
        assert_eq!(from_query("sentiment=all").unwrap().sentiment, None);
        assert_eq!(from_query("sentiment=").unwrap().sentiment, None);
        assert_eq!(from_query("search=labs").unwrap().sentiment, None);

        let negative = from_query("search=labs&sentiment=negative").unwrap();
        assert_eq!(negative.sentiment, Some(Sentiment::Negative));
        assert_eq!(negative.search.as_deref(), Some("labs"));

        assert!(from_query("sentiment=furious").is_err());
    }

    #[test]
    fn export_hides_anonymous_names() {
        let rows = export_rows(&[
            record("Too fast", "teaching", Sentiment::Negative, None),
            record("Thanks", "support", Sentiment::Positive, Some("Sam")),
        ]);
        assert_eq!(rows[0].student, "Anonymous");
        assert_eq!(rows[1].student, "Sam");
        assert_eq!(rows[0].date, "2026-02-14 09:30");
        assert_eq!(rows[0].sentiment, "negative");

        let json = serde_json::to_value(&rows[1]).unwrap();
        assert_eq!(json["Student"], "Sam");
        assert_eq!(json["Suggestions"], "Keep going");
    }
}
