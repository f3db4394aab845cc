use reqwest::{Client, Response};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::RegistryError;
use crate::types::{DomainRecord, RecordId, RecordPage, ResultUpdate, ScanOutcome};

const TOKEN_HEADER: &str = "xc-token";

/// Typed access to the registry's record listing and partial updates.
#[derive(Debug, Clone)]
pub struct RegistryClient {
    client: Client,
    records_url: String,
    token: String,
    page_size: u32,
    max_pages: u32,
}

impl RegistryClient {
    pub fn new(config: &Config) -> Result<Self, RegistryError> {
        let mut builder = Client::builder().timeout(config.http_timeout);
        if !config.use_system_proxy {
            builder = builder.no_proxy();
        }
        let client = builder.build()?;
        Ok(Self {
            client,
            records_url: config.records_url(),
            token: config.token.clone(),
            page_size: config.page_size,
            max_pages: config.max_pages,
        })
    }

    /// Fetch every record page and keep the rows flagged active.
    ///
    /// Filtering happens here rather than via the registry's `where` syntax,
    /// which differs between backend versions.
    pub async fn fetch_active_domains(&self) -> Result<Vec<DomainRecord>, RegistryError> {
        info!(url = %self.records_url, "Fetching domains from registry");
        let records = self.fetch_all_records().await?;
        let total = records.len();
        let active: Vec<DomainRecord> = records.into_iter().filter(|r| r.active).collect();
        info!(total, active = active.len(), "Found active domains to scan");
        Ok(active)
    }

    async fn fetch_all_records(&self) -> Result<Vec<DomainRecord>, RegistryError> {
        let mut records = Vec::new();
        let mut reported_total = None;

        for page_no in 0..self.max_pages {
            let offset = u64::from(page_no) * u64::from(self.page_size);
            let page = self.fetch_page(offset).await?;
            let rows = page.list.len();
            debug!(offset, rows, "Fetched registry page");
            records.extend(page.list);

            let last = match page.page_info {
                Some(info) => {
                    reported_total = info.total_rows.or(reported_total);
                    info.is_last_page.unwrap_or(rows < self.page_size as usize)
                }
                None => rows < self.page_size as usize,
            };
            if last || rows == 0 {
                if let Some(total) = reported_total {
                    if total != records.len() as u64 {
                        warn!(
                            reported = total,
                            collected = records.len(),
                            "Registry row count differs from reported total"
                        );
                    }
                }
                return Ok(records);
            }
        }

        Err(RegistryError::Unavailable(format!(
            "registry still reported more rows after {} pages of {}; refusing to scan a truncated list",
            self.max_pages, self.page_size
        )))
    }

    async fn fetch_page(&self, offset: u64) -> Result<RecordPage, RegistryError> {
        let resp = self
            .client
            .get(&self.records_url)
            .header(TOKEN_HEADER, &self.token)
            .query(&[("limit", u64::from(self.page_size)), ("offset", offset)])
            .send()
            .await
            .map_err(|e| RegistryError::Unavailable(e.to_string()))?;
        let resp = ensure_success(resp)
            .await
            .map_err(RegistryError::Unavailable)?;
        resp.json::<RecordPage>()
            .await
            .map_err(|e| RegistryError::Unavailable(format!("undecodable record page: {e}")))
    }

    /// PATCH the grade, findings and scan date of one record.
    pub async fn update_result(
        &self,
        id: &RecordId,
        outcome: &ScanOutcome,
    ) -> Result<(), RegistryError> {
        let body = ResultUpdate::new(id, outcome);
        let failed = |message: String| RegistryError::UpdateFailed {
            id: id.to_string(),
            message,
        };

        let resp = self
            .client
            .patch(&self.records_url)
            .header(TOKEN_HEADER, &self.token)
            .json(&body)
            .send()
            .await
            .map_err(|e| failed(e.to_string()))?;
        ensure_success(resp).await.map_err(failed)?;

        info!(record = %id, grade = %outcome.grade, "Updated record");
        Ok(())
    }
}

async fn ensure_success(resp: Response) -> Result<Response, String> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    let mut snippet: String = body.chars().take(200).collect();
    if snippet.len() < body.len() {
        snippet.push('…');
    }
    Err(format!("HTTP {status}: {snippet}"))
}
