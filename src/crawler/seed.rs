//! Where a crawl's start URLs come from

use crate::crawler::oai::OaiHarvester;
use crate::crawler::spec::CrawlSpec;
use crate::CrawlError;
use chrono::NaiveDate;

/// Supplies the start and permission URLs of a crawl
#[derive(Debug)]
pub enum CrawlSeed {
    /// Start URLs listed by the crawl spec
    Base(CrawlSpec),

    /// Start URLs harvested from an OAI-PMH repository
    Oai(OaiCrawlSeed),
}

impl CrawlSeed {
    /// Start URLs of the crawl
    ///
    /// An OAI seed contacts the repository; a base seed only reads its crawl spec.
    pub async fn start_urls(&self) -> Result<Vec<String>, CrawlError> {
        match self {
            Self::Base(spec) => Ok(spec.start_urls()?.to_vec()),
            Self::Oai(seed) => seed.start_urls().await,
        }
    }

    pub fn permission_urls(&self) -> Result<Vec<String>, CrawlError> {
        Ok(self.spec().permission_urls()?.to_vec())
    }

    /// Fails with a definition error when a URL list the seed relies on
    /// is missing, without any network activity
    pub fn check_definition(&self) -> Result<(), CrawlError> {
        self.spec().permission_urls()?;
        if let Self::Base(spec) = self {
            spec.start_urls()?;
        }
        Ok(())
    }

    /// Harvested start URLs never fail the crawl
    pub fn fail_on_start_url_error(&self) -> bool {
        match self {
            Self::Base(spec) => spec.fail_on_start_url_error(),
            Self::Oai(_) => false,
        }
    }

    /// Whether links found in fetched content are followed
    pub fn should_follow_links(&self) -> bool {
        match self {
            Self::Base(_) => true,
            Self::Oai(seed) => seed.follow_links,
        }
    }

    pub fn spec(&self) -> &CrawlSpec {
        match self {
            Self::Base(spec) => spec,
            Self::Oai(seed) => &seed.spec,
        }
    }
}

/// Seeds a crawl from an OAI-PMH `ListRecords` harvest
#[derive(Debug)]
pub struct OaiCrawlSeed {
    spec: CrawlSpec,
    harvester: OaiHarvester,
    from: NaiveDate,
    until: NaiveDate,
    follow_links: bool,
}

impl OaiCrawlSeed {
    /// # Arguments
    ///
    /// * `spec` - Supplies the permission URLs
    /// * `harvester` - Client for the unit's repository
    /// * `from` - Date of the last successful crawl, or the epoch
    /// * `until` - Today
    pub fn new(spec: CrawlSpec, harvester: OaiHarvester, from: NaiveDate, until: NaiveDate) -> Self {
        let follow_links = harvester.follow_links();
        Self {
            spec,
            harvester,
            from,
            until,
            follow_links,
        }
    }

    pub fn from_date(&self) -> NaiveDate {
        self.from
    }

    pub fn until_date(&self) -> NaiveDate {
        self.until
    }

    async fn start_urls(&self) -> Result<Vec<String>, CrawlError> {
        Ok(self.harvester.harvest(self.from, self.until).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OaiConfig;

    fn oai_seed(permission_urls: Option<Vec<String>>) -> CrawlSeed {
        let config = OaiConfig {
            base_url: "http://oai.example.com/oai".to_string(),
            metadata_prefix: "oai_dc".to_string(),
            set: None,
            follow_links: false,
        };
        let spec = CrawlSpec::new(None, permission_urls, None, 3);
        CrawlSeed::Oai(OaiCrawlSeed::new(
            spec,
            OaiHarvester::new(reqwest::Client::new(), config),
            NaiveDate::from_ymd_opt(1970, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
        ))
    }

    #[tokio::test]
    async fn test_base_seed_reads_spec() {
        let spec = CrawlSpec::new(
            Some(vec!["http://a/".to_string()]),
            Some(vec!["http://a/perm".to_string()]),
            None,
            3,
        );
        let seed = CrawlSeed::Base(spec);

        assert!(seed.check_definition().is_ok());
        assert_eq!(seed.start_urls().await.unwrap(), vec!["http://a/".to_string()]);
        assert!(seed.fail_on_start_url_error());
        assert!(seed.should_follow_links());
    }

    #[tokio::test]
    async fn test_base_seed_without_start_urls() {
        let seed = CrawlSeed::Base(CrawlSpec::new(None, None, None, 3));
        let err = seed.start_urls().await.unwrap_err();
        assert!(err.to_string().contains("non-null start URL list"));

        let err = seed.permission_urls().unwrap_err();
        assert!(err.to_string().contains("non-null permission URL list"));
    }

    #[test]
    fn test_oai_seed_needs_only_permission_urls() {
        let seed = oai_seed(Some(vec!["http://oai.example.com/perm".to_string()]));
        assert!(seed.check_definition().is_ok());
        assert!(!seed.fail_on_start_url_error());
        assert!(!seed.should_follow_links());

        let seed = oai_seed(None);
        assert!(matches!(
            seed.check_definition(),
            Err(CrawlError::Definition(_))
        ));
    }
}
