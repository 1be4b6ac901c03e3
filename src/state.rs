use crate::events::ChangeFeed;
use crate::middleware::RateLimiter;
use crate::services::pipeline::FeedbackPipeline;
use sqlx::PgPool;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub pipeline: Arc<FeedbackPipeline>,
    pub feed: ChangeFeed,
    pub session_key: Vec<u8>,
    pub anon_limiter: RateLimiter,
    pub trust_proxy: bool,
}

pub type SharedState = Arc<AppState>;
