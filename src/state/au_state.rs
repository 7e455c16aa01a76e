use super::CrawlPhase;
use chrono::{DateTime, NaiveDate, Utc};

/// Persistent crawl history of one archival unit
///
/// Loaded before a crawl and saved after it. The OAI crawl seed derives its
/// harvest window from `last_crawl_time`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuState {
    /// Identifier of the archival unit
    pub unit_id: String,

    /// When the last successful crawl finished
    pub last_crawl_time: Option<DateTime<Utc>>,

    /// When the last crawl of any outcome started
    pub last_crawl_attempt: Option<DateTime<Utc>>,

    /// Outcome of the last crawl
    pub last_crawl_result: Option<CrawlPhase>,

    /// Status message of the last crawl
    pub last_crawl_message: Option<String>,
}

impl AuState {
    /// Creates the state of a unit that has never been crawled
    pub fn new(unit_id: impl Into<String>) -> Self {
        Self {
            unit_id: unit_id.into(),
            last_crawl_time: None,
            last_crawl_attempt: None,
            last_crawl_result: None,
            last_crawl_message: None,
        }
    }

    /// Records the start of a crawl attempt
    pub fn new_crawl_started(&mut self, at: DateTime<Utc>) {
        self.last_crawl_attempt = Some(at);
    }

    /// Records the outcome of a crawl
    ///
    /// Only a successful crawl advances `last_crawl_time`.
    pub fn new_crawl_finished(&mut self, result: CrawlPhase, message: &str, at: DateTime<Utc>) {
        self.last_crawl_result = Some(result);
        self.last_crawl_message = Some(message.to_string());
        if result == CrawlPhase::Success {
            self.last_crawl_time = Some(at);
        }
    }

    /// Returns the date of the last successful crawl, if any
    pub fn last_crawl_date(&self) -> Option<NaiveDate> {
        self.last_crawl_time.map(|t| t.date_naive())
    }

    /// Returns true if the unit has ever been crawled successfully
    pub fn has_crawled(&self) -> bool {
        self.last_crawl_time.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_new_state() {
        let state = AuState::new("unit-1");
        assert_eq!(state.unit_id, "unit-1");
        assert!(!state.has_crawled());
        assert_eq!(state.last_crawl_date(), None);
    }

    #[test]
    fn test_success_advances_crawl_time() {
        let mut state = AuState::new("unit-1");
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 5, 1, 11, 30, 0).unwrap();

        state.new_crawl_started(start);
        state.new_crawl_finished(CrawlPhase::Success, "Successful", end);

        assert_eq!(state.last_crawl_attempt, Some(start));
        assert_eq!(state.last_crawl_time, Some(end));
        assert_eq!(state.last_crawl_date(), NaiveDate::from_ymd_opt(2024, 5, 1));
    }

    #[test]
    fn test_failure_keeps_previous_success() {
        let mut state = AuState::new("unit-1");
        let first = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
        let second = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();

        state.new_crawl_finished(CrawlPhase::Success, "Successful", first);
        state.new_crawl_finished(CrawlPhase::Error, "Fetch error", second);

        assert_eq!(state.last_crawl_time, Some(first));
        assert_eq!(state.last_crawl_result, Some(CrawlPhase::Error));
        assert_eq!(state.last_crawl_message.as_deref(), Some("Fetch error"));
    }
}
