//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `CrawlPhase`: Lifecycle of one crawl (not started, running, finished)
//! - `AuState`: Per archival unit record of past crawls, persisted between runs

mod au_state;
mod crawl_phase;

// Re-export main types
pub use au_state::AuState;
pub use crawl_phase::CrawlPhase;
