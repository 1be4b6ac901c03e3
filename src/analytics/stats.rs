use crate::domain::models::{
    DailyCount, DashboardStats, FeedbackRecord, SentimentDistribution, TopicCount,
};
use chrono::NaiveDate;
use std::collections::{BTreeMap, HashMap};

pub const TOP_TOPICS_LIMIT: usize = 5;
pub const RECENT_DAYS_LIMIT: usize = 7;

/// Folds a batch of feedback into dashboard metrics.
///
/// `recent_activity` covers the most recent dates present in the batch,
/// so gaps between submission days are skipped rather than reported as 0.
pub fn aggregate(records: &[FeedbackRecord]) -> DashboardStats {
    let mut distribution = SentimentDistribution::default();
    // (topic, count) in first-seen order, indexed by topic
    let mut topics: Vec<(String, usize)> = Vec::new();
    let mut topic_index: HashMap<&str, usize> = HashMap::new();
    let mut daily: BTreeMap<NaiveDate, usize> = BTreeMap::new();

    for record in records {
        distribution.record(record.sentiment);

        if !record.topic.is_empty() {
            match topic_index.get(record.topic.as_str()) {
                Some(&idx) => topics[idx].1 += 1,
                None => {
                    topic_index.insert(record.topic.as_str(), topics.len());
                    topics.push((record.topic.clone(), 1));
                }
            }
        }

        *daily.entry(record.created_at.date_naive()).or_insert(0) += 1;
    }

    // sort_by is stable, equal counts keep first-seen order
    topics.sort_by(|a, b| b.1.cmp(&a.1));
    let top_topics = topics
        .into_iter()
        .take(TOP_TOPICS_LIMIT)
        .map(|(topic, count)| TopicCount { topic, count })
        .collect();

    let recent_activity = daily
        .into_iter()
        .rev()
        .take(RECENT_DAYS_LIMIT)
        .map(|(date, count)| DailyCount { date, count })
        .collect();

    DashboardStats {
        total_feedback: records.len(),
        sentiment_distribution: distribution,
        top_topics,
        recent_activity,
    }
}
