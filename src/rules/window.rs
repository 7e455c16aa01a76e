use chrono::{DateTime, Datelike, Duration, NaiveTime, Utc, Weekday};
use std::fmt;

/// Policy restricting when an archival unit may be crawled
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CrawlWindow {
    /// Always open
    Always,

    /// Never open
    Never,

    /// Open between two times of day, optionally only on some weekdays
    ///
    /// When `start > end` the interval wraps past midnight. When
    /// `start == end` the window is open the whole day. Times and weekdays
    /// are evaluated at `utc_offset_minutes` from UTC.
    Interval {
        start: NaiveTime,
        end: NaiveTime,
        days: Option<Vec<Weekday>>,
        utc_offset_minutes: i32,
    },

    /// Open when every nested window is open
    And(Vec<CrawlWindow>),

    /// Open when any nested window is open
    Or(Vec<CrawlWindow>),

    /// Open when the nested window is closed
    Not(Box<CrawlWindow>),
}

impl CrawlWindow {
    /// Returns true if crawling is allowed at `now`
    pub fn is_open(&self, now: DateTime<Utc>) -> bool {
        match self {
            CrawlWindow::Always => true,
            CrawlWindow::Never => false,
            CrawlWindow::Interval {
                start,
                end,
                days,
                utc_offset_minutes,
            } => {
                let local = now.naive_utc() + Duration::minutes(i64::from(*utc_offset_minutes));

                if let Some(days) = days {
                    if !days.contains(&local.weekday()) {
                        return false;
                    }
                }

                let time = local.time();
                if start == end {
                    true
                } else if start < end {
                    *start <= time && time < *end
                } else {
                    time >= *start || time < *end
                }
            }
            CrawlWindow::And(windows) => windows.iter().all(|w| w.is_open(now)),
            CrawlWindow::Or(windows) => windows.iter().any(|w| w.is_open(now)),
            CrawlWindow::Not(window) => !window.is_open(now),
        }
    }

    /// Returns true if crawling is allowed right now
    pub fn is_open_now(&self) -> bool {
        self.is_open(Utc::now())
    }
}

impl fmt::Display for CrawlWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CrawlWindow::Always => write!(f, "always"),
            CrawlWindow::Never => write!(f, "never"),
            CrawlWindow::Interval {
                start,
                end,
                days,
                utc_offset_minutes,
            } => {
                write!(
                    f,
                    "{}-{} (UTC{:+}m)",
                    start.format("%H:%M"),
                    end.format("%H:%M"),
                    utc_offset_minutes
                )?;
                if let Some(days) = days {
                    let names: Vec<String> = days.iter().map(|d| d.to_string()).collect();
                    write!(f, " on {}", names.join(","))?;
                }
                Ok(())
            }
            CrawlWindow::And(windows) => write_joined(f, "and", windows),
            CrawlWindow::Or(windows) => write_joined(f, "or", windows),
            CrawlWindow::Not(window) => write!(f, "not({})", window),
        }
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, op: &str, windows: &[CrawlWindow]) -> fmt::Result {
    write!(f, "{}(", op)?;
    for (i, window) in windows.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", window)?;
    }
    write!(f, ")")
}
