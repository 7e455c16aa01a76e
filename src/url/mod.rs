//! URL handling module
//!
//! Link normalization, host extraction and host pattern matching used by the
//! crawler and the permission map.

mod host;
mod matcher;
mod normalize;

pub use host::{extract_host, host_of};
pub use matcher::{matches_any_host_pattern, matches_host_pattern};
pub use normalize::{is_supported_protocol, normalize_url};
