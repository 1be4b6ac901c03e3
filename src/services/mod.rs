pub mod alerts;
pub mod classifier;
pub mod pipeline;
