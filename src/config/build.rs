//! Turns configuration entries into crawl rules and windows

use crate::config::types::{RuleConfig, WindowConfig};
use crate::rules::{CrawlRule, CrawlWindow};
use crate::ConfigError;
use chrono::{NaiveTime, Weekday};

/// Compiles a unit's rule list
///
/// # Returns
///
/// * `Ok(None)` - The unit has no rules; every URL is in scope
/// * `Ok(Some(CrawlRule))` - A first-match rule over the entries, in order
/// * `Err(ConfigError::InvalidPattern)` - A regex does not compile
pub fn build_crawl_rule(rules: &[RuleConfig]) -> Result<Option<CrawlRule>, ConfigError> {
    if rules.is_empty() {
        return Ok(None);
    }

    let compiled = rules
        .iter()
        .map(|r| CrawlRule::pattern(&r.pattern, r.action, r.ignore_case))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Some(CrawlRule::FirstMatch(compiled)))
}

/// Builds a crawl window from its configuration
pub fn build_crawl_window(config: &WindowConfig) -> Result<CrawlWindow, ConfigError> {
    Ok(match config {
        WindowConfig::Always => CrawlWindow::Always,
        WindowConfig::Never => CrawlWindow::Never,
        WindowConfig::Interval {
            start,
            end,
            days,
            utc_offset_minutes,
        } => {
            if utc_offset_minutes.abs() >= 24 * 60 {
                return Err(ConfigError::Validation(format!(
                    "utc-offset-minutes must be within one day, got {}",
                    utc_offset_minutes
                )));
            }

            let days = match days {
                Some(names) => {
                    if names.is_empty() {
                        return Err(ConfigError::Validation(
                            "Crawl window day list cannot be empty".to_string(),
                        ));
                    }
                    Some(
                        names
                            .iter()
                            .map(|d| parse_weekday(d))
                            .collect::<Result<Vec<_>, _>>()?,
                    )
                }
                None => None,
            };

            CrawlWindow::Interval {
                start: parse_time(start)?,
                end: parse_time(end)?,
                days,
                utc_offset_minutes: *utc_offset_minutes,
            }
        }
        WindowConfig::And { windows } => CrawlWindow::And(build_all(windows)?),
        WindowConfig::Or { windows } => CrawlWindow::Or(build_all(windows)?),
        WindowConfig::Not { window } => CrawlWindow::Not(Box::new(build_crawl_window(window)?)),
    })
}

fn build_all(windows: &[WindowConfig]) -> Result<Vec<CrawlWindow>, ConfigError> {
    if windows.is_empty() {
        return Err(ConfigError::Validation(
            "Combined crawl window needs at least one window".to_string(),
        ));
    }
    windows.iter().map(build_crawl_window).collect()
}

fn parse_time(s: &str) -> Result<NaiveTime, ConfigError> {
    NaiveTime::parse_from_str(s.trim(), "%H:%M")
        .map_err(|e| ConfigError::Validation(format!("Invalid time '{}' (expected HH:MM): {}", s, e)))
}

fn parse_weekday(s: &str) -> Result<Weekday, ConfigError> {
    s.trim()
        .parse::<Weekday>()
        .map_err(|_| ConfigError::Validation(format!("Invalid weekday '{}'", s)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::PatternAction;

    fn rule(pattern: &str, action: PatternAction) -> RuleConfig {
        RuleConfig {
            pattern: pattern.to_string(),
            action,
            ignore_case: false,
        }
    }

    #[test]
    fn test_no_rules() {
        assert!(build_crawl_rule(&[]).unwrap().is_none());
    }

    #[test]
    fn test_rules_first_match() {
        let rule = build_crawl_rule(&[
            rule(r"\.pdf$", PatternAction::MatchExclude),
            rule(r"^http://example\.com/", PatternAction::MatchInclude),
        ])
        .unwrap()
        .unwrap();

        assert!(rule.should_crawl("http://example.com/a.html"));
        assert!(!rule.should_crawl("http://example.com/a.pdf"));
        assert!(!rule.should_crawl("http://other.com/"));
    }

    #[test]
    fn test_invalid_rule() {
        let result = build_crawl_rule(&[rule("[", PatternAction::MatchInclude)]);
        assert!(matches!(result, Err(ConfigError::InvalidPattern(_))));
    }

    #[test]
    fn test_interval_window() {
        let window = build_crawl_window(&WindowConfig::Interval {
            start: "22:00".to_string(),
            end: "06:30".to_string(),
            days: Some(vec!["sat".to_string(), "Sunday".to_string()]),
            utc_offset_minutes: 60,
        })
        .unwrap();

        assert_eq!(
            window,
            CrawlWindow::Interval {
                start: NaiveTime::from_hms_opt(22, 0, 0).unwrap(),
                end: NaiveTime::from_hms_opt(6, 30, 0).unwrap(),
                days: Some(vec![Weekday::Sat, Weekday::Sun]),
                utc_offset_minutes: 60,
            }
        );
    }

    #[test]
    fn test_nested_window() {
        let window = build_crawl_window(&WindowConfig::Not {
            window: Box::new(WindowConfig::Or {
                windows: vec![WindowConfig::Never, WindowConfig::Always],
            }),
        })
        .unwrap();
        assert_eq!(
            window,
            CrawlWindow::Not(Box::new(CrawlWindow::Or(vec![
                CrawlWindow::Never,
                CrawlWindow::Always
            ])))
        );
    }

    #[test]
    fn test_invalid_windows() {
        let bad_time = WindowConfig::Interval {
            start: "25:00".to_string(),
            end: "06:00".to_string(),
            days: None,
            utc_offset_minutes: 0,
        };
        assert!(build_crawl_window(&bad_time).is_err());

        let empty_days = WindowConfig::Interval {
            start: "01:00".to_string(),
            end: "06:00".to_string(),
            days: Some(vec![]),
            utc_offset_minutes: 0,
        };
        assert!(build_crawl_window(&empty_days).is_err());

        let bad_day = WindowConfig::Interval {
            start: "01:00".to_string(),
            end: "06:00".to_string(),
            days: Some(vec!["someday".to_string()]),
            utc_offset_minutes: 0,
        };
        assert!(build_crawl_window(&bad_day).is_err());

        assert!(build_crawl_window(&WindowConfig::And { windows: vec![] }).is_err());
    }
}
