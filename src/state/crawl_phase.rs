/// Lifecycle phases of a single crawl
use std::fmt;

/// Represents where a crawl is in its lifecycle
///
/// `NotStarted -> Running -> {Success | Error | Aborted}`. A crawl that
/// fails before it starts running may also go straight to `Error` or
/// `Aborted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CrawlPhase {
    /// Crawl has been created but `do_crawl` has not been called
    NotStarted,

    /// Crawl is draining its frontier
    Running,

    // ===== Terminal States =====
    /// Frontier drained without a crawl-level error
    Success,

    /// Crawl ended with a crawl-level error
    Error,

    /// Crawl was cancelled, or stopped by a start URL failure
    Aborted,
}

impl CrawlPhase {
    /// Returns true if this is a terminal phase
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Error | Self::Aborted)
    }

    /// Returns true if moving from this phase to `next` is allowed
    pub fn can_transition_to(&self, next: CrawlPhase) -> bool {
        matches!(
            (self, next),
            (Self::NotStarted, Self::Running)
                | (Self::NotStarted, Self::Error)
                | (Self::NotStarted, Self::Aborted)
                | (Self::Running, Self::Success)
                | (Self::Running, Self::Error)
                | (Self::Running, Self::Aborted)
        )
    }

    /// Converts the phase to a database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::Running => "running",
            Self::Success => "success",
            Self::Error => "error",
            Self::Aborted => "aborted",
        }
    }

    /// Parses a phase from a database string representation
    ///
    /// Returns None if the string doesn't match any known phase.
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "not_started" => Some(Self::NotStarted),
            "running" => Some(Self::Running),
            "success" => Some(Self::Success),
            "error" => Some(Self::Error),
            "aborted" => Some(Self::Aborted),
            _ => None,
        }
    }
}

impl fmt::Display for CrawlPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}
