use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Reads, parses and validates the daemon configuration
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use au_crawler::config::load_config;
///
/// let config = load_config(Path::new("au-crawler.toml")).unwrap();
/// println!("Units: {}", config.units.len());
/// ```
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    parse_config(&std::fs::read_to_string(path)?)
}

/// Parses and validates configuration text
///
/// # Returns
///
/// * `Ok(Config)` - A configuration whose units are all well formed
/// * `Err(ConfigError::Parse)` - The text is not valid TOML for a `Config`
/// * `Err(ConfigError::Validation)` - A value is out of range or inconsistent
pub fn parse_config(content: &str) -> Result<Config, ConfigError> {
    let config: Config = toml::from_str(content)?;
    validate(&config)?;
    Ok(config)
}

/// Hex SHA-256 of configuration text, logged so runs can be matched to the
/// configuration they used
pub fn config_hash(content: &str) -> String {
    hex::encode(Sha256::digest(content.as_bytes()))
}

/// Computes the hash of a configuration file
pub fn compute_config_hash(path: &Path) -> Result<String, ConfigError> {
    Ok(config_hash(&std::fs::read_to_string(path)?))
}

/// Loads a configuration together with the hash of the text it was parsed from
///
/// The file is read once, so the hash always matches the returned config.
pub fn load_config_with_hash(path: &Path) -> Result<(Config, String), ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config = parse_config(&content)?;
    Ok((config, config_hash(&content)))
}
