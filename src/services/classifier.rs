use crate::domain::models::{Analysis, Sentiment};
use async_openai::types::{
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
};
use async_openai::{config::OpenAIConfig, Client};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use thiserror::Error;
use tokio::time::{timeout, Duration};

pub const MAX_TOPIC_CHARS: usize = 50;
pub const MAX_SUGGESTION_CHARS: usize = 300;
pub const FALLBACK_TOPIC: &str = "general";

const POSITIVE_WORDS: [&str; 8] = [
    "good", "great", "excellent", "amazing", "love", "like", "helpful", "clear",
];

const NEGATIVE_WORDS: [&str; 8] = [
    "bad", "terrible", "awful", "hate", "confusing", "difficult", "boring", "poor",
];

const POSITIVE_SUGGESTION: &str =
    "Continue current practices and consider expanding successful approaches.";
const NEGATIVE_SUGGESTION: &str = "Review feedback areas and implement targeted improvements.";
const NEUTRAL_SUGGESTION: &str =
    "Gather more specific feedback to identify improvement opportunities.";

const SYSTEM_PROMPT: &str = "You classify student course feedback for faculty review. \
Reply with a single JSON object and nothing else.";

const ANALYSIS_TEMPLATE: &str = r#"Analyze the student feedback below and reply ONLY with valid JSON, no extra text.

Feedback: "{{feedback}}"

JSON format:
{
  "topic": "short topic category (max 50 chars)",
  "sentiment": "positive|negative|neutral",
  "suggestions": "2-3 actionable improvement suggestions (max 300 chars)"
}"#;

/// Reasons the remote path was abandoned. Never leaves this module.
#[derive(Debug, Error)]
pub enum ClassificationUnavailable {
    #[error("remote classification timed out after {0:?}")]
    Timeout(Duration),
    #[error("remote classification failed: {0}")]
    Remote(String),
    #[error("malformed classification response: {0}")]
    Malformed(String),
}

/// A remote text-completion service. Receives the fully rendered prompt and
/// returns the raw model reply.
#[async_trait]
pub trait AnalysisBackend: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, ClassificationUnavailable>;
}

pub struct OpenAiBackend {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiBackend {
    pub fn new(api_key: String, model: String) -> Self {
        let config = OpenAIConfig::new().with_api_key(api_key);
        let client = Client::with_config(config);
        Self { client, model }
    }
}

#[async_trait]
impl AnalysisBackend for OpenAiBackend {
    async fn complete(&self, prompt: &str) -> Result<String, ClassificationUnavailable> {
        let remote = |e: async_openai::error::OpenAIError| {
            ClassificationUnavailable::Remote(e.to_string())
        };

        let messages = vec![
            ChatCompletionRequestMessage::System(
                ChatCompletionRequestSystemMessageArgs::default()
                    .content(SYSTEM_PROMPT)
                    .build()
                    .map_err(remote)?,
            ),
            ChatCompletionRequestMessage::User(
                ChatCompletionRequestUserMessageArgs::default()
                    .content(prompt)
                    .build()
                    .map_err(remote)?,
            ),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(self.model.as_str())
            .messages(messages)
            .temperature(0.2) // keep labels stable between identical submissions
            .build()
            .map_err(remote)?;

        let resp = self.client.chat().create(request).await.map_err(remote)?;
        resp.choices
            .first()
            .and_then(|c| c.message.content.clone())
            .ok_or_else(|| ClassificationUnavailable::Malformed("empty completion".to_string()))
    }
}

#[derive(Deserialize)]
struct RemoteAnalysis {
    topic: Option<String>,
    sentiment: Option<String>,
    suggestions: Option<String>,
}

#[derive(Clone)]
pub struct SentimentClassifier {
    backend: Option<Arc<dyn AnalysisBackend>>,
    timeout: Duration,
}

impl SentimentClassifier {
    pub fn new(backend: Option<Arc<dyn AnalysisBackend>>, timeout: Duration) -> Self {
        Self { backend, timeout }
    }

    /// Classifier that always uses the local heuristic.
    pub fn offline() -> Self {
        Self::new(None, Duration::from_secs(0))
    }

    /// Always yields a valid analysis; remote failures fall back to the
    /// local heuristic.
    pub async fn classify(&self, text: &str) -> Analysis {
        let Some(backend) = &self.backend else {
            return fallback_analysis(text);
        };

        match self.classify_remote(backend.as_ref(), text).await {
            Ok(analysis) => analysis,
            Err(err) => {
                tracing::warn!("Remote classification unavailable, using fallback: {}", err);
                fallback_analysis(text)
            }
        }
    }

    async fn classify_remote(
        &self,
        backend: &dyn AnalysisBackend,
        text: &str,
    ) -> Result<Analysis, ClassificationUnavailable> {
        let prompt = render_prompt(text);
        let raw = timeout(self.timeout, backend.complete(&prompt))
            .await
            .map_err(|_| ClassificationUnavailable::Timeout(self.timeout))??;
        parse_analysis(&raw)
    }
}

pub fn render_prompt(text: &str) -> String {
    ANALYSIS_TEMPLATE.replace("{{feedback}}", text)
}

/// Parses a model reply, accepting an optional markdown code fence around
/// the JSON object.
pub fn parse_analysis(raw: &str) -> Result<Analysis, ClassificationUnavailable> {
    let body = strip_code_fence(raw.trim());
    let parsed: RemoteAnalysis = serde_json::from_str(body)
        .map_err(|e| ClassificationUnavailable::Malformed(e.to_string()))?;

    let required = |field: Option<String>, name: &str| {
        field
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| ClassificationUnavailable::Malformed(format!("missing field `{name}`")))
    };

    let topic = required(parsed.topic, "topic")?;
    let sentiment = required(parsed.sentiment, "sentiment")?;
    let suggestions = required(parsed.suggestions, "suggestions")?;

    Ok(Analysis {
        topic: truncate_chars(topic.trim(), MAX_TOPIC_CHARS),
        sentiment: Sentiment::coerce(&sentiment),
        suggestions: truncate_chars(suggestions.trim(), MAX_SUGGESTION_CHARS),
    })
}

fn strip_code_fence(body: &str) -> &str {
    let Some(rest) = body.strip_prefix("```") else {
        return body;
    };
    // drop the language tag line, e.g. ```json
    let rest = rest.split_once('\n').map(|(_, r)| r).unwrap_or(rest);
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

fn truncate_chars(value: &str, max: usize) -> String {
    value.chars().take(max).collect()
}

pub fn fallback_sentiment(text: &str) -> Sentiment {
    let lowered = text.to_lowercase();
    let positive = POSITIVE_WORDS.iter().filter(|w| lowered.contains(*w)).count();
    let negative = NEGATIVE_WORDS.iter().filter(|w| lowered.contains(*w)).count();

    if positive > negative {
        Sentiment::Positive
    } else if negative > positive {
        Sentiment::Negative
    } else {
        Sentiment::Neutral
    }
}

pub fn fallback_analysis(text: &str) -> Analysis {
    let sentiment = fallback_sentiment(text);
    let suggestions = match sentiment {
        Sentiment::Positive => POSITIVE_SUGGESTION,
        Sentiment::Negative => NEGATIVE_SUGGESTION,
        Sentiment::Neutral => NEUTRAL_SUGGESTION,
    };

    Analysis {
        topic: FALLBACK_TOPIC.to_string(),
        sentiment,
        suggestions: suggestions.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    enum Reply {
        Text(String),
        Fail,
        Hang,
    }

    struct StubBackend {
        reply: Reply,
        calls: AtomicUsize,
    }

    impl StubBackend {
        fn new(reply: Reply) -> Arc<Self> {
            Arc::new(Self {
                reply,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl AnalysisBackend for StubBackend {
        async fn complete(&self, prompt: &str) -> Result<String, ClassificationUnavailable> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            assert!(prompt.contains("Feedback: \""));
            match &self.reply {
                Reply::Text(text) => Ok(text.clone()),
                Reply::Fail => Err(ClassificationUnavailable::Remote("503".to_string())),
                Reply::Hang => {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    Ok(String::new())
                }
            }
        }
    }

    fn remote(reply: Reply) -> (SentimentClassifier, Arc<StubBackend>) {
        let backend = StubBackend::new(reply);
        let classifier = SentimentClassifier::new(
            Some(backend.clone() as Arc<dyn AnalysisBackend>),
            Duration::from_millis(100),
        );
        (classifier, backend)
    }

    #[test]
    fn fallback_sentiment_examples() {
        assert_eq!(
            fallback_sentiment("This course is excellent and the teaching is great"),
            Sentiment::Positive
        );
        assert_eq!(
            fallback_sentiment("The assignments are confusing and the content is boring"),
            Sentiment::Negative
        );
        assert_eq!(fallback_sentiment("The lecture was at 10am"), Sentiment::Neutral);
    }

    #[test]
    fn fallback_counts_each_word_once() {
        // "good" twice still counts once against one "bad"
        assert_eq!(fallback_sentiment("good good but bad"), Sentiment::Neutral);
        // substring match: "unclear" contains "clear"
        assert_eq!(fallback_sentiment("the slides are unclear"), Sentiment::Positive);
    }

    #[test]
    fn fallback_is_deterministic() {
        let text = "Office hours were helpful";
        let first = fallback_analysis(text);
        assert_eq!(first, fallback_analysis(text));
        assert_eq!(first.topic, FALLBACK_TOPIC);
        assert_eq!(first.suggestions, POSITIVE_SUGGESTION);
    }

    #[tokio::test]
    async fn offline_classifier_stays_within_limits() {
        let classifier = SentimentClassifier::offline();
        let long = "y".repeat(2000);
        for text in ["x", "I hate the awful parking", long.as_str()] {
            let analysis = classifier.classify(text).await;
            assert!(analysis.topic.chars().count() <= MAX_TOPIC_CHARS);
            assert!(analysis.suggestions.chars().count() <= MAX_SUGGESTION_CHARS);
        }
    }

    #[tokio::test]
    async fn remote_reply_is_used_and_normalized() {
        let reply = format!(
            r#"{{"topic": "{}", "sentiment": "mixed", "suggestions": "{}"}}"#,
            "t".repeat(80),
            "s".repeat(400)
        );
        let (classifier, backend) = remote(Reply::Text(reply));

        let analysis = classifier.classify("It was fine").await;
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
        assert_eq!(analysis.sentiment, Sentiment::Neutral);
        assert_eq!(analysis.topic.chars().count(), MAX_TOPIC_CHARS);
        assert_eq!(analysis.suggestions.chars().count(), MAX_SUGGESTION_CHARS);
    }

    #[tokio::test]
    async fn fenced_reply_is_accepted() {
        let reply = "```json\n{\"topic\": \"assignments\", \"sentiment\": \"negative\", \"suggestions\": \"Spread deadlines out.\"}\n```";
        let (classifier, _) = remote(Reply::Text(reply.to_string()));

        let analysis = classifier.classify("Too many deadlines in one week").await;
        assert_eq!(analysis.topic, "assignments");
        assert_eq!(analysis.sentiment, Sentiment::Negative);
        assert_eq!(analysis.suggestions, "Spread deadlines out.");
    }

    #[tokio::test]
    async fn missing_field_falls_back() {
        let reply = r#"{"topic": "teaching", "sentiment": "positive"}"#;
        let (classifier, _) = remote(Reply::Text(reply.to_string()));

        let text = "The teaching is great";
        assert_eq!(classifier.classify(text).await, fallback_analysis(text));
    }

    #[tokio::test]
    async fn non_json_falls_back() {
        let (classifier, _) = remote(Reply::Text("Sure! The sentiment is positive.".to_string()));
        let text = "Boring lectures";
        assert_eq!(classifier.classify(text).await, fallback_analysis(text));
    }

    #[tokio::test]
    async fn remote_error_falls_back() {
        let (classifier, backend) = remote(Reply::Fail);
        let text = "Helpful TA";
        assert_eq!(classifier.classify(text).await, fallback_analysis(text));
        // single attempt, no retry
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn slow_remote_times_out_to_fallback() {
        let (classifier, _) = remote(Reply::Hang);
        let text = "The room is too small";
        let started = std::time::Instant::now();
        assert_eq!(classifier.classify(text).await, fallback_analysis(text));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn parse_rejects_empty_fields() {
        let err = parse_analysis(r#"{"topic": "", "sentiment": "positive", "suggestions": "x"}"#);
        assert!(matches!(err, Err(ClassificationUnavailable::Malformed(_))));
    }

    #[test]
    fn sentiment_label_must_match_exactly() {
        let analysis = parse_analysis(
            r#"{"topic": "labs", "sentiment": "Positive", "suggestions": "Keep it up."}"#,
        )
        .unwrap();
        assert_eq!(analysis.sentiment, Sentiment::Neutral);
    }

    #[test]
    fn prompt_embeds_feedback() {
        let prompt = render_prompt("Labs start too early");
        assert!(prompt.contains("Feedback: \"Labs start too early\""));
        assert!(prompt.contains("\"sentiment\": \"positive|negative|neutral\""));
    }
}
