//! Market Research Intelligence
//!
//! Back end for a market-research assistant:
//! - Specialised analysis agents over a hosted language model
//! - PDF chunking, upload and chunk-wise Q&A
//! - SQLite cache of analyses, document sessions, M&A searches and analytics
//! - REST API consumed by the dashboard
//!
//! REQUEST FLOW:
//! ENDPOINT → CACHE LOOKUP → AGENT (retry on rate limit) → STORE → RESPOND

pub mod agents;
pub mod api;
pub mod config;
pub mod documents;
pub mod error;
pub mod llm;
pub mod markdown;
pub mod store;

pub use error::Result;

// Re-export common types
pub use agents::{AnalysisKind, MarketResearcher};
pub use config::AppConfig;
pub use documents::{ChunkRef, DocumentProcessor};
pub use store::ResearchStore;
