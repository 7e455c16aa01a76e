//! Crawl scope and timing predicates
//!
//! [`CrawlRule`] decides whether a URL belongs to an archival unit and
//! [`CrawlWindow`] decides whether fetching is allowed at a given instant.
//! Both are pure functions of their input.

mod crawl_rule;
mod window;

pub use crawl_rule::{CrawlRule, PatternAction, PatternRule, RuleMatch};
pub use window::CrawlWindow;
