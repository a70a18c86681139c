use std::time::Duration;

use anyhow::Context;
use reqwest::{Client, Url};
use tracing::debug;

use crate::xml::Document;

pub const DEFAULT_ENDPOINT: &str = "https://oai.sbb.berlin/";
pub const DEFAULT_METADATA_PREFIX: &str = "oai_dc";

/// OAI-PMH error code for an empty result; not a failure for harvesting.
pub const NO_RECORDS_MATCH: &str = "noRecordsMatch";

#[derive(Debug, Clone)]
pub struct OaiConfig {
    pub endpoint: String,
    pub metadata_prefix: String,
    pub timeout: Option<Duration>,
}

impl OaiConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            metadata_prefix: DEFAULT_METADATA_PREFIX.to_string(),
            timeout: None,
        }
    }
}

impl Default for OaiConfig {
    fn default() -> Self {
        Self::new(DEFAULT_ENDPOINT)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    ListRecords,
    ListSets,
}

impl Verb {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verb::ListRecords => "ListRecords",
            Verb::ListSets => "ListSets",
        }
    }
}

impl std::fmt::Display for Verb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A `ListRecords` request. A resumption token carries the full paging
/// state, so a resumed request sends nothing but the token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListRecordsRequest {
    Initial { set: String, metadata_prefix: String },
    Resume { token: String },
}

impl ListRecordsRequest {
    pub fn resume(token: impl Into<String>) -> Self {
        Self::Resume {
            token: token.into(),
        }
    }

    pub fn url(&self, endpoint: &str) -> anyhow::Result<Url> {
        let verb = ("verb", Verb::ListRecords.as_str());
        match self {
            Self::Initial {
                set,
                metadata_prefix,
            } => request_url(
                endpoint,
                &[
                    verb,
                    ("metadataPrefix", metadata_prefix.as_str()),
                    ("set", set.as_str()),
                ],
            ),
            Self::Resume { token } => {
                request_url(endpoint, &[verb, ("resumptionToken", token.as_str())])
            }
        }
    }
}

pub fn build_request(
    set: &str,
    metadata_prefix: &str,
    resumption_token: Option<&str>,
) -> ListRecordsRequest {
    match resumption_token {
        Some(token) => ListRecordsRequest::resume(token),
        None => ListRecordsRequest::Initial {
            set: set.to_string(),
            metadata_prefix: metadata_prefix.to_string(),
        },
    }
}

pub fn list_sets_url(endpoint: &str) -> anyhow::Result<Url> {
    request_url(endpoint, &[("verb", Verb::ListSets.as_str())])
}

fn request_url(endpoint: &str, params: &[(&str, &str)]) -> anyhow::Result<Url> {
    Url::parse_with_params(endpoint, params)
        .with_context(|| format!("invalid OAI endpoint url: {}", endpoint))
}

/// Text of the first `resumptionToken`; an empty token marks the last page.
pub fn extract_resumption_token(doc: &Document) -> Option<String> {
    let token = doc.first("//resumptionToken")?.full_text();
    let token = token.trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

/// An `<error code="...">` element of the OAI-PMH envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OaiError {
    pub code: String,
    pub message: String,
}

impl OaiError {
    pub fn from_document(doc: &Document) -> Option<Self> {
        let error = doc.root().select("error").into_iter().next()?;
        Some(Self {
            code: error.attribute("code").unwrap_or_default().to_string(),
            message: error.full_text().trim().to_string(),
        })
    }
}

impl std::fmt::Display for OaiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OAI-PMH request error: {}: {}", self.code, self.message)
    }
}

impl std::error::Error for OaiError {}

/// Fetches OAI-PMH responses and parses them into documents.
#[derive(Debug, Clone)]
pub struct OaiClient {
    client: Client,
}

impl OaiClient {
    pub fn new(timeout: Option<Duration>) -> anyhow::Result<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
        })
    }

    pub async fn fetch(&self, url: Url) -> anyhow::Result<Document> {
        debug!("GET {}", url);
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .with_context(|| format!("request to {} failed", url))?
            .error_for_status()?;
        let body = response.text().await?;

        Document::parse(&body).with_context(|| format!("malformed XML from {}", url))
    }
}
