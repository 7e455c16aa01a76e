use crate::ConfigError;
use regex::{Regex, RegexBuilder};
use serde::Deserialize;
use std::collections::HashSet;
use std::fmt;

/// Verdict of a crawl rule for one URL
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleMatch {
    /// The URL is in scope
    Include,

    /// The URL is out of scope
    Exclude,

    /// The rule has no opinion about the URL
    Ignore,
}

/// What a pattern rule answers when its regex does or does not match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum PatternAction {
    /// Match: include. No match: ignore
    #[serde(rename = "include")]
    MatchInclude,

    /// Match: exclude. No match: ignore
    #[serde(rename = "exclude")]
    MatchExclude,

    /// Match: ignore. No match: include
    #[serde(rename = "no-match-include")]
    NoMatchInclude,

    /// Match: ignore. No match: exclude
    #[serde(rename = "no-match-exclude")]
    NoMatchExclude,

    /// Match: include. No match: exclude
    #[serde(rename = "include-else-exclude")]
    MatchIncludeElseExclude,

    /// Match: exclude. No match: include
    #[serde(rename = "exclude-else-include")]
    MatchExcludeElseInclude,
}

impl PatternAction {
    fn verdict(self, matched: bool) -> RuleMatch {
        use PatternAction::*;
        match (self, matched) {
            (MatchInclude, true) | (MatchIncludeElseExclude, true) => RuleMatch::Include,
            (MatchExclude, true) | (MatchExcludeElseInclude, true) => RuleMatch::Exclude,
            (NoMatchInclude, false) | (MatchExcludeElseInclude, false) => RuleMatch::Include,
            (NoMatchExclude, false) | (MatchIncludeElseExclude, false) => RuleMatch::Exclude,
            _ => RuleMatch::Ignore,
        }
    }

    /// Returns the configuration name of this action
    pub fn as_str(self) -> &'static str {
        match self {
            PatternAction::MatchInclude => "include",
            PatternAction::MatchExclude => "exclude",
            PatternAction::NoMatchInclude => "no-match-include",
            PatternAction::NoMatchExclude => "no-match-exclude",
            PatternAction::MatchIncludeElseExclude => "include-else-exclude",
            PatternAction::MatchExcludeElseInclude => "exclude-else-include",
        }
    }
}

/// A regular expression paired with an action
#[derive(Debug, Clone)]
pub struct PatternRule {
    regex: Regex,
    action: PatternAction,
}

impl PatternRule {
    /// Compiles a pattern rule
    ///
    /// # Arguments
    ///
    /// * `pattern` - Regular expression searched for anywhere in the URL
    /// * `action` - What to answer on match / no match
    /// * `ignore_case` - Compile the regex case-insensitively
    ///
    /// # Returns
    ///
    /// * `Ok(PatternRule)` - The compiled rule
    /// * `Err(ConfigError::InvalidPattern)` - The regex does not compile
    pub fn new(pattern: &str, action: PatternAction, ignore_case: bool) -> Result<Self, ConfigError> {
        let regex = RegexBuilder::new(pattern)
            .case_insensitive(ignore_case)
            .build()
            .map_err(|e| ConfigError::InvalidPattern(format!("{}: {}", pattern, e)))?;
        Ok(Self { regex, action })
    }

    /// Returns the verdict for a URL
    pub fn evaluate(&self, url: &str) -> RuleMatch {
        self.action.verdict(self.regex.is_match(url))
    }

    pub fn pattern(&self) -> &str {
        self.regex.as_str()
    }

    pub fn action(&self) -> PatternAction {
        self.action
    }
}

/// Decides which URLs belong to an archival unit
#[derive(Debug, Clone)]
pub enum CrawlRule {
    /// A single regex rule
    Pattern(PatternRule),

    /// The first non-`Ignore` verdict of the nested rules wins
    FirstMatch(Vec<CrawlRule>),

    /// Includes exactly the listed URLs and ignores everything else
    Contains(HashSet<String>),
}

impl CrawlRule {
    /// Builds a single pattern rule
    pub fn pattern(pattern: &str, action: PatternAction, ignore_case: bool) -> Result<Self, ConfigError> {
        Ok(CrawlRule::Pattern(PatternRule::new(pattern, action, ignore_case)?))
    }

    /// Builds a rule that includes only the given URLs
    pub fn contains<I, S>(urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        CrawlRule::Contains(urls.into_iter().map(Into::into).collect())
    }

    /// Returns the rule's verdict for a URL
    pub fn evaluate(&self, url: &str) -> RuleMatch {
        match self {
            CrawlRule::Pattern(rule) => rule.evaluate(url),
            CrawlRule::FirstMatch(rules) => rules
                .iter()
                .map(|rule| rule.evaluate(url))
                .find(|verdict| *verdict != RuleMatch::Ignore)
                .unwrap_or(RuleMatch::Ignore),
            CrawlRule::Contains(urls) => {
                if urls.contains(url) {
                    RuleMatch::Include
                } else {
                    RuleMatch::Ignore
                }
            }
        }
    }

    /// Returns true if the URL is in scope
    ///
    /// Only an explicit `Include` puts a URL in scope.
    pub fn should_crawl(&self, url: &str) -> bool {
        self.evaluate(url) == RuleMatch::Include
    }
}

impl fmt::Display for CrawlRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CrawlRule::Pattern(rule) => write!(f, "{} {}", rule.action().as_str(), rule.pattern()),
            CrawlRule::FirstMatch(rules) => {
                write!(f, "first-match[")?;
                for (i, rule) in rules.iter().enumerate() {
                    if i > 0 {
                        write!(f, "; ")?;
                    }
                    write!(f, "{}", rule)?;
                }
                write!(f, "]")
            }
            CrawlRule::Contains(urls) => write!(f, "contains({} urls)", urls.len()),
        }
    }
}
