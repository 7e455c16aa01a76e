//! Integration tests for au-crawler
//!
//! These tests run complete crawls against wiremock servers.

mod common;
mod crawl_tests;
mod oai_tests;
