use crate::parser::RamTranslation;
use crate::rules::PatternAction;
use serde::Deserialize;

/// Main configuration structure for the crawler daemon
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub storage: StorageConfig,
    #[serde(rename = "unit", default)]
    pub units: Vec<UnitConfig>,
}

/// Daemon-wide crawler behavior
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Depth cap for units that do not set their own
    #[serde(rename = "max-depth", default = "default_max_depth")]
    pub max_depth: u32,

    /// Pause inserted before each fetch (milliseconds)
    #[serde(rename = "fetch-delay-ms", default)]
    pub fetch_delay_ms: u64,

    /// What to do when a start URL is refused permission
    #[serde(rename = "start-permission-policy", default)]
    pub start_permission_policy: StartPermissionPolicy,

    /// Checkers every manifest page must satisfy
    #[serde(
        rename = "daemon-permission-checkers",
        default = "default_permission_checkers"
    )]
    pub daemon_permission_checkers: Vec<CheckerKind>,

    /// Hosts whose content needs no manifest page (e.g., "*.cdn.example.org")
    #[serde(rename = "globally-permitted-hosts", default)]
    pub globally_permitted_hosts: Vec<String>,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            fetch_delay_ms: 0,
            start_permission_policy: StartPermissionPolicy::default(),
            daemon_permission_checkers: default_permission_checkers(),
            globally_permitted_hosts: Vec::new(),
        }
    }
}

fn default_max_depth() -> u32 {
    1000
}

fn default_permission_checkers() -> Vec<CheckerKind> {
    vec![CheckerKind::Statement]
}

fn default_true() -> bool {
    true
}

fn default_metadata_prefix() -> String {
    "oai_dc".to_string()
}

/// Policy for a start URL whose permission check fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StartPermissionPolicy {
    /// Record the error and keep crawling the other start URLs
    Continue,

    /// Abort only when the unit sets `fail-on-start-url-error`
    #[default]
    FailOnStartUrlError,

    /// Always abort
    Abort,
}

/// Daemon-level permission checker kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CheckerKind {
    /// LOCKSS / CLOCKSS permission statement
    Statement,

    /// Creative Commons license link
    CreativeCommons,
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

/// Storage configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,
}

/// Frontier order of a unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CrawlOrder {
    #[default]
    BreadthFirst,
    DeepestFirst,
}

/// One archival unit
#[derive(Debug, Clone, Deserialize)]
pub struct UnitConfig {
    /// Unique identifier, also the key of stored content
    pub id: String,

    /// Human readable name
    #[serde(default)]
    pub name: Option<String>,

    /// URLs the crawl starts from
    #[serde(rename = "start-urls", default)]
    pub start_urls: Option<Vec<String>>,

    /// Manifest pages that grant crawl permission
    #[serde(rename = "permission-urls", default)]
    pub permission_urls: Option<Vec<String>>,

    /// Maximum link depth, else the crawler default
    #[serde(rename = "max-depth", default)]
    pub max_depth: Option<u32>,

    /// Whether a failing start URL fails the crawl
    #[serde(rename = "fail-on-start-url-error", default = "default_true")]
    pub fail_on_start_url_error: bool,

    /// Absolute path probed for a manifest on hosts without one
    #[serde(rename = "per-host-permission-path", default)]
    pub per_host_permission_path: Option<String>,

    /// Hosts the unit may fetch from without a manifest page
    #[serde(rename = "permitted-host-patterns", default)]
    pub permitted_host_patterns: Vec<String>,

    /// Statement required on manifest pages in addition to the daemon checkers
    #[serde(rename = "plugin-permission-statement", default)]
    pub plugin_permission_statement: Option<String>,

    #[serde(default)]
    pub order: CrawlOrder,

    /// Crawl rules, evaluated first match first
    #[serde(default)]
    pub rules: Vec<RuleConfig>,

    #[serde(default)]
    pub window: Option<WindowConfig>,

    #[serde(rename = "ram-translation", default)]
    pub ram_translation: Option<RamTranslation>,

    /// Present when the unit is harvested over OAI-PMH
    #[serde(default)]
    pub oai: Option<OaiConfig>,
}

/// One crawl rule
#[derive(Debug, Clone, Deserialize)]
pub struct RuleConfig {
    /// Regular expression searched for in the URL
    pub pattern: String,

    pub action: PatternAction,

    #[serde(rename = "ignore-case", default)]
    pub ignore_case: bool,
}

/// Crawl window definition
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum WindowConfig {
    Always,
    Never,
    Interval {
        /// "HH:MM"
        start: String,
        /// "HH:MM"
        end: String,
        /// Weekday names ("mon", "Tuesday", ...); all days when absent
        #[serde(default)]
        days: Option<Vec<String>>,
        #[serde(rename = "utc-offset-minutes", default)]
        utc_offset_minutes: i32,
    },
    And {
        windows: Vec<WindowConfig>,
    },
    Or {
        windows: Vec<WindowConfig>,
    },
    Not {
        window: Box<WindowConfig>,
    },
}

/// OAI-PMH harvest settings
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OaiConfig {
    /// Repository base URL
    #[serde(rename = "base-url")]
    pub base_url: String,

    #[serde(rename = "metadata-prefix", default = "default_metadata_prefix")]
    pub metadata_prefix: String,

    /// Optional set to restrict the harvest to
    #[serde(default)]
    pub set: Option<String>,

    /// Also spider links found on harvested pages
    #[serde(rename = "follow-links", default)]
    pub follow_links: bool,
}
