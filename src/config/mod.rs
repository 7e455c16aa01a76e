//! Configuration module for the crawler daemon
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use au_crawler::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("config.toml")).unwrap();
//! println!("Configured units: {}", config.units.len());
//! ```

mod build;
mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    CheckerKind, Config, CrawlOrder, CrawlerConfig, OaiConfig, RuleConfig, StartPermissionPolicy,
    StorageConfig, UnitConfig, UserAgentConfig, WindowConfig,
};

pub use build::{build_crawl_rule, build_crawl_window};

// Re-export parser functions
pub use parser::{
    compute_config_hash, config_hash, load_config, load_config_with_hash, parse_config,
};
