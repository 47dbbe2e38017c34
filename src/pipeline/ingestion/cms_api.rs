//! Paginated extraction from the CMS Provider Data datastore API.
//!
//! The API serves pages of `limit` records starting at `offset` under a `results`
//! key. Paging stops at the first short page or once `max_records` is reached.

use serde::Deserialize;
use std::time::Duration;
use tracing::{info, instrument, warn};

use crate::config::SourceConfig;
use crate::error::{PipelineError, Result};
use crate::types::RawHospitalRecord;

#[derive(Debug, Deserialize)]
pub struct DatastorePage {
    #[serde(default)]
    pub results: Vec<RawHospitalRecord>,
}

/// Why paging stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PagingOutcome {
    /// A page came back shorter than the batch size
    EndOfData,
    /// `max_records` reached; records were truncated to it
    MaxRecords,
    /// A request failed; records fetched so far are kept
    Interrupted(String),
}

#[derive(Debug)]
pub struct ApiExtract {
    pub records: Vec<RawHospitalRecord>,
    pub pages: usize,
    pub outcome: PagingOutcome,
}

pub struct CmsApiClient {
    client: reqwest::blocking::Client,
    base_url: String,
    batch_size: usize,
    max_records: Option<usize>,
    page_delay: Duration,
    timeout_retries: u32,
}

impl CmsApiClient {
    pub fn new(config: &SourceConfig) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;
        Ok(Self {
            client,
            base_url: config.api_url.clone(),
            batch_size: config.batch_size,
            max_records: config.max_records,
            page_delay: Duration::from_millis(config.page_delay_ms),
            timeout_retries: config.timeout_retries,
        })
    }

    fn fetch_page(&self, offset: usize) -> reqwest::Result<DatastorePage> {
        self.client
            .get(&self.base_url)
            .query(&[("limit", self.batch_size), ("offset", offset)])
            .send()?
            .error_for_status()?
            .json::<DatastorePage>()
    }

    /// Page through the dataset. Timeouts are retried up to `timeout_retries` times per
    /// page; any other failure ends paging with what has been collected.
    #[instrument(skip(self), fields(url = %self.base_url))]
    pub fn extract(&self) -> ApiExtract {
        let mut records = Vec::new();
        let mut offset = 0;
        let mut pages = 0;
        let mut retries_left = self.timeout_retries;

        let outcome = loop {
            info!("Requesting records {} to {}", offset, offset + self.batch_size - 1);
            let page = match self.fetch_page(offset) {
                Ok(page) => page,
                Err(e) if e.is_timeout() && retries_left > 0 => {
                    retries_left -= 1;
                    warn!("Page at offset {} timed out, retrying ({} retries left)", offset, retries_left);
                    continue;
                }
                Err(e) => {
                    warn!("API request at offset {} failed: {}", offset, e);
                    break PagingOutcome::Interrupted(e.to_string());
                }
            };

            pages += 1;
            retries_left = self.timeout_retries;
            let received = page.results.len();
            info!("Page {}: got {} records", pages, received);
            records.extend(page.results);

            if received < self.batch_size {
                break PagingOutcome::EndOfData;
            }
            if let Some(max) = self.max_records {
                if records.len() >= max {
                    records.truncate(max);
                    break PagingOutcome::MaxRecords;
                }
            }

            offset += self.batch_size;
            std::thread::sleep(self.page_delay);
        };

        ApiExtract {
            records,
            pages,
            outcome,
        }
    }
}

/// Extract from the API, failing when nothing was obtained.
pub fn extract_records(config: &SourceConfig) -> Result<Vec<RawHospitalRecord>> {
    let client = CmsApiClient::new(config)?;
    let extract = client.extract();
    info!(
        "API extraction finished after {} page(s): {} records ({:?})",
        extract.pages,
        extract.records.len(),
        extract.outcome
    );
    if extract.records.is_empty() {
        return Err(PipelineError::Extract(match extract.outcome {
            PagingOutcome::Interrupted(reason) => format!("API returned no records: {reason}"),
            _ => "API returned no records".to_string(),
        }));
    }
    Ok(extract.records)
}
