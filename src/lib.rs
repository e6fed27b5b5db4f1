// Pulseboard - trading-dashboard backend
// Aggregates market data from an upstream provider, derives secondary
// metrics, and serves normalized JSON to a dashboard front-end, with an
// optional generative-text analysis layer.

#![deny(clippy::unwrap_used)]

pub mod config;
pub mod data;
pub mod llm;
pub mod prompts;
pub mod server;
pub mod signals;

// Re-export commonly used items
pub use config::Config;
pub use data::{MarketDataClient, MarketSnapshot, SessionState, SnapshotBuilder, SnapshotDepth};
