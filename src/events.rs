use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

const FEED_CAPACITY: usize = 256;

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ChangeEvent {
    FeedbackCreated {
        feedback_id: Uuid,
    },
    AlertsRaised {
        feedback_id: Uuid,
        count: usize,
    },
    FeedbackViewed {
        feedback_id: Uuid,
        viewed_at: DateTime<Utc>,
    },
    MessagePosted {
        feedback_id: Uuid,
        message_id: Uuid,
    },
}

impl ChangeEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            ChangeEvent::FeedbackCreated { .. } => "feedback_created",
            ChangeEvent::AlertsRaised { .. } => "alerts_raised",
            ChangeEvent::FeedbackViewed { .. } => "feedback_viewed",
            ChangeEvent::MessagePosted { .. } => "message_posted",
        }
    }

    pub fn feedback_id(&self) -> Uuid {
        match self {
            ChangeEvent::FeedbackCreated { feedback_id }
            | ChangeEvent::AlertsRaised { feedback_id, .. }
            | ChangeEvent::FeedbackViewed { feedback_id, .. }
            | ChangeEvent::MessagePosted { feedback_id, .. } => *feedback_id,
        }
    }
}

/// Fan-out of storage changes to whoever is listening (dashboards, open
/// threads). Publishing with no subscribers is not an error.
#[derive(Clone)]
pub struct ChangeFeed {
    sender: broadcast::Sender<ChangeEvent>,
}

impl ChangeFeed {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(FEED_CAPACITY);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.sender.subscribe()
    }

    pub fn publish(&self, event: ChangeEvent) {
        let kind = event.kind();
        match self.sender.send(event) {
            Ok(listeners) => tracing::debug!("Published {} to {} listener(s)", kind, listeners),
            Err(_) => tracing::trace!("No listeners for {}", kind),
        }
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}
