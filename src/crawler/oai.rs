//! OAI-PMH `ListRecords` harvesting
//!
//! The harvest lists the records of a repository changed within a date
//! window and turns every URL-valued `identifier` inside the record
//! metadata into a start URL.

use crate::config::OaiConfig;
use chrono::NaiveDate;
use quick_xml::events::Event;
use quick_xml::reader::Reader;
use reqwest::Client;
use std::collections::HashSet;
use thiserror::Error;
use url::Url;

/// OAI-PMH date granularity used for `from` / `until`
pub const OAI_DATE_FORMAT: &str = "%Y-%m-%d";

const NO_RECORDS_MATCH: &str = "noRecordsMatch";

/// Errors raised while harvesting
#[derive(Debug, Error)]
pub enum OaiError {
    #[error("Invalid OAI base URL: {0}")]
    InvalidBaseUrl(String),

    #[error("OAI request to {url} failed: {message}")]
    Request { url: String, message: String },

    #[error("OAI endpoint {url} returned HTTP {status}")]
    Http { url: String, status: u16 },

    #[error("Malformed OAI-PMH response: {0}")]
    Xml(String),

    #[error("OAI-PMH error {code}: {message}")]
    Protocol { code: String, message: String },
}

impl From<quick_xml::Error> for OaiError {
    fn from(e: quick_xml::Error) -> Self {
        OaiError::Xml(e.to_string())
    }
}

/// One page of a `ListRecords` response
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OaiPage {
    /// URL-valued identifiers found in record metadata, in document order
    pub urls: Vec<String>,

    /// Token for the next page, if the list is incomplete
    pub resumption_token: Option<String>,
}

/// Client for one repository
#[derive(Debug, Clone)]
pub struct OaiHarvester {
    client: Client,
    config: OaiConfig,
}

impl OaiHarvester {
    pub fn new(client: Client, config: OaiConfig) -> Self {
        Self { client, config }
    }

    pub fn follow_links(&self) -> bool {
        self.config.follow_links
    }

    /// Builds the first `ListRecords` request of a harvest
    pub fn list_records_url(&self, from: NaiveDate, until: NaiveDate) -> Result<Url, OaiError> {
        let mut url = self.base_url()?;
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("verb", "ListRecords")
                .append_pair("metadataPrefix", &self.config.metadata_prefix)
                .append_pair("from", &from.format(OAI_DATE_FORMAT).to_string())
                .append_pair("until", &until.format(OAI_DATE_FORMAT).to_string());
            if let Some(set) = &self.config.set {
                query.append_pair("set", set);
            }
        }
        Ok(url)
    }

    /// Builds a follow-up request; OAI-PMH forbids other arguments here
    pub fn resumption_url(&self, token: &str) -> Result<Url, OaiError> {
        let mut url = self.base_url()?;
        url.query_pairs_mut()
            .append_pair("verb", "ListRecords")
            .append_pair("resumptionToken", token);
        Ok(url)
    }

    fn base_url(&self) -> Result<Url, OaiError> {
        Url::parse(&self.config.base_url)
            .map_err(|e| OaiError::InvalidBaseUrl(format!("{}: {}", self.config.base_url, e)))
    }

    /// Harvests every page of the listing
    ///
    /// # Arguments
    ///
    /// * `from` - First day of the window
    /// * `until` - Last day of the window
    ///
    /// # Returns
    ///
    /// * `Ok(Vec<String>)` - Distinct record URLs in listing order
    /// * `Err(OaiError)` - A request failed or a response was not OAI-PMH
    pub async fn harvest(&self, from: NaiveDate, until: NaiveDate) -> Result<Vec<String>, OaiError> {
        let mut request = self.list_records_url(from, until)?;
        let mut urls = Vec::new();
        let mut seen_urls = HashSet::new();
        let mut seen_tokens = HashSet::new();

        tracing::info!(
            "Harvesting {} from {} until {}",
            self.config.base_url,
            from.format(OAI_DATE_FORMAT),
            until.format(OAI_DATE_FORMAT)
        );

        loop {
            let body = self.get(&request).await?;
            let page = parse_list_records(&body)?;
            tracing::debug!("{} record URLs from {}", page.urls.len(), request);

            for url in page.urls {
                if seen_urls.insert(url.clone()) {
                    urls.push(url);
                }
            }

            match page.resumption_token {
                Some(token) if seen_tokens.insert(token.clone()) => {
                    request = self.resumption_url(&token)?;
                }
                Some(token) => {
                    tracing::warn!("Repeated resumption token {}, ending harvest", token);
                    break;
                }
                None => break,
            }
        }

        Ok(urls)
    }

    async fn get(&self, url: &Url) -> Result<String, OaiError> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| OaiError::Request {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(OaiError::Http {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        response.text().await.map_err(|e| OaiError::Request {
            url: url.to_string(),
            message: e.to_string(),
        })
    }
}

/// Parses one `ListRecords` response
///
/// A `noRecordsMatch` error is an empty page; any other OAI-PMH error is
/// returned as [`OaiError::Protocol`].
pub fn parse_list_records(xml: &str) -> Result<OaiPage, OaiError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut page = OaiPage::default();
    let mut in_metadata = 0usize;
    let mut current: Option<Field> = None;
    let mut text = String::new();
    let mut error_code: Option<String> = None;
    let mut saw_root = false;

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                match e.local_name().as_ref() {
                    b"OAI-PMH" => saw_root = true,
                    b"metadata" => in_metadata += 1,
                    b"identifier" if in_metadata > 0 => {
                        current = Some(Field::Identifier);
                        text.clear();
                    }
                    b"resumptionToken" => {
                        current = Some(Field::ResumptionToken);
                        text.clear();
                    }
                    b"error" => {
                        error_code = Some(attribute(&e, "code")?.unwrap_or_default());
                        current = Some(Field::Error);
                        text.clear();
                    }
                    _ => {}
                }
            }
            Event::Empty(e) => {
                if e.local_name().as_ref() == b"error" {
                    let code = attribute(&e, "code")?.unwrap_or_default();
                    if code != NO_RECORDS_MATCH {
                        return Err(OaiError::Protocol {
                            code,
                            message: String::new(),
                        });
                    }
                    error_code = Some(code);
                }
            }
            Event::Text(t) => {
                if current.is_some() {
                    let unescaped = t.unescape().map_err(|e| OaiError::Xml(e.to_string()))?;
                    text.push_str(&unescaped);
                }
            }
            Event::CData(t) => {
                if current.is_some() {
                    text.push_str(&String::from_utf8_lossy(&t));
                }
            }
            Event::End(e) => match (e.local_name().as_ref(), current) {
                (b"metadata", _) => in_metadata = in_metadata.saturating_sub(1),
                (b"identifier", Some(Field::Identifier)) => {
                    let value = text.trim();
                    if is_url(value) {
                        page.urls.push(value.to_string());
                    }
                    current = None;
                }
                (b"resumptionToken", Some(Field::ResumptionToken)) => {
                    let token = text.trim();
                    if !token.is_empty() {
                        page.resumption_token = Some(token.to_string());
                    }
                    current = None;
                }
                (b"error", Some(Field::Error)) => {
                    let code = error_code.clone().unwrap_or_default();
                    if code != NO_RECORDS_MATCH {
                        return Err(OaiError::Protocol {
                            code,
                            message: text.trim().to_string(),
                        });
                    }
                    current = None;
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    if !saw_root {
        return Err(OaiError::Xml("missing OAI-PMH root element".to_string()));
    }

    if error_code.as_deref() == Some(NO_RECORDS_MATCH) {
        tracing::debug!("OAI-PMH repository reports no matching records");
    }

    Ok(page)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Identifier,
    ResumptionToken,
    Error,
}

fn attribute(
    element: &quick_xml::events::BytesStart<'_>,
    name: &str,
) -> Result<Option<String>, OaiError> {
    let attr = element
        .try_get_attribute(name)
        .map_err(|e| OaiError::Xml(e.to_string()))?;
    match attr {
        Some(attr) => Ok(Some(
            attr.unescape_value()
                .map_err(|e| OaiError::Xml(e.to_string()))?
                .into_owned(),
        )),
        None => Ok(None),
    }
}

fn is_url(value: &str) -> bool {
    let lower = value.to_ascii_lowercase();
    (lower.starts_with("http://") || lower.starts_with("https://")) && Url::parse(value).is_ok()
}
