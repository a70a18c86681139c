mod cli;
mod fields;
mod report;
mod status;

use std::collections::VecDeque;
use std::io::Write;

use futures::{Stream, stream};
use tracing::{debug, info};

pub use cli::{HarvesterArgs, OaiArgs, StatusArgs};
pub use fields::{BibliographicRow, extract_fields};
pub use report::REPORT_FIELDS;
pub use status::check_list_sets;

use crate::oai::{
    ListRecordsRequest, NO_RECORDS_MATCH, OaiClient, OaiConfig, OaiError, build_request,
    extract_resumption_token,
};
use crate::xml::{Document, Element};

/// One `record` element of a `ListRecords` response.
#[derive(Debug, Clone)]
pub struct Record {
    element: Element,
}

impl Record {
    pub fn new(element: Element) -> Self {
        Self { element }
    }

    pub fn element(&self) -> &Element {
        &self.element
    }

    pub fn identifier(&self) -> Option<String> {
        self.element
            .select("header/identifier")
            .first()
            .map(|identifier| identifier.full_text())
    }

    pub fn extract_fields(&self, fields: &[&str]) -> Vec<String> {
        extract_fields(&self.element, fields)
    }
}

#[derive(Debug)]
pub struct ListRecordsPage {
    pub records: Vec<Record>,
    pub resumption_token: Option<String>,
}

impl ListRecordsPage {
    pub fn from_document(doc: &Document) -> anyhow::Result<Self> {
        if let Some(error) = OaiError::from_document(doc) {
            if error.code == NO_RECORDS_MATCH {
                debug!("{}", error);
                return Ok(Self {
                    records: Vec::new(),
                    resumption_token: None,
                });
            }
            return Err(error.into());
        }

        let list = doc
            .first("//ListRecords")
            .ok_or_else(|| anyhow::anyhow!("response has no ListRecords element"))?;

        Ok(Self {
            records: list
                .select("record")
                .into_iter()
                .cloned()
                .map(Record::new)
                .collect(),
            resumption_token: extract_resumption_token(doc),
        })
    }
}

/// Paging state owned by a single `list_records` stream.
struct Pager {
    next: Option<ListRecordsRequest>,
    page: VecDeque<Record>,
    remaining: Option<usize>,
    requests: usize,
}

pub struct Harvester {
    config: OaiConfig,
    client: OaiClient,
}

impl Harvester {
    pub fn new(config: OaiConfig) -> anyhow::Result<Self> {
        let client = OaiClient::new(config.timeout)?;
        Ok(Self { config, client })
    }

    pub fn config(&self) -> &OaiConfig {
        &self.config
    }

    pub async fn check_list_sets(&self) -> bool {
        status::run(&self.client, &self.config.endpoint).await
    }

    pub async fn report<W: Write>(
        &self,
        set: &str,
        limit: Option<usize>,
        out: &mut W,
    ) -> anyhow::Result<Vec<BibliographicRow>> {
        report::run(self, set, limit, out).await
    }

    pub async fn request_list_records(
        &self,
        request: &ListRecordsRequest,
    ) -> anyhow::Result<Document> {
        let url = request.url(&self.config.endpoint)?;
        self.client.fetch(url).await
    }

    async fn fetch_page(&self, request: &ListRecordsRequest) -> anyhow::Result<ListRecordsPage> {
        let doc = self.request_list_records(request).await?;
        let page = ListRecordsPage::from_document(&doc)?;
        info!(
            "Fetched {} record(s), resumption token: {}",
            page.records.len(),
            page.resumption_token.as_deref().unwrap_or("none")
        );
        Ok(page)
    }

    /// Lazily harvests the records of `set`, following resumption tokens.
    ///
    /// `limit` of `None` is unbounded. The first page is requested on the
    /// first poll even when `limit` is `Some(0)`; later pages are requested
    /// only once the current one is used up and the limit is not reached.
    /// Any fetch error ends the stream.
    pub fn list_records<'a>(
        &'a self,
        set: &str,
        limit: Option<usize>,
    ) -> impl Stream<Item = anyhow::Result<Record>> + 'a {
        let pager = Pager {
            next: Some(build_request(set, &self.config.metadata_prefix, None)),
            page: VecDeque::new(),
            remaining: limit,
            requests: 0,
        };

        stream::try_unfold(pager, move |pager| self.next_record(pager))
    }

    async fn next_record(&self, mut pager: Pager) -> anyhow::Result<Option<(Record, Pager)>> {
        loop {
            if pager.requests > 0 && pager.remaining == Some(0) {
                return Ok(None);
            }

            if let Some(record) = pager.page.pop_front() {
                if let Some(remaining) = pager.remaining.as_mut() {
                    *remaining -= 1;
                }
                return Ok(Some((record, pager)));
            }

            let Some(request) = pager.next.take() else {
                return Ok(None);
            };

            let page = self.fetch_page(&request).await?;
            pager.requests += 1;
            pager.page = page.records.into();
            pager.next = page.resumption_token.map(ListRecordsRequest::resume);
        }
    }
}
