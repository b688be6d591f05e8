//! Persisted catalog records and the cache/merge policy around the engine.
//!
//! The engine itself is stateless. This module decides when a detail page is
//! extracted again and how fresh results are folded into what was stored
//! before.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;
use std::thread;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::error::FetchError;
use crate::fetch::PageFetch;
use crate::model::{
    CatalogSummary, DetailResult, OperationInfo, ParameterInfo, SearchResultPage,
    SERVICE_TYPE_REST,
};
use crate::portal::CatalogClient;

/// Pause between listing pages during a bulk sync.
pub const DEFAULT_SYNC_DELAY: Duration = Duration::from_millis(500);

/// Failure of the backing store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("catalog store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Request,
    Response,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterRecord {
    pub name: Option<String>,
    pub param_type: Option<String>,
    pub required: bool,
    pub description: Option<String>,
    pub default_value: Option<String>,
    pub direction: Direction,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationRecord {
    pub name: String,
    pub http_method: String,
    pub endpoint_url: Option<String>,
    pub parameters: Vec<ParameterRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogRecord {
    pub id: String,
    pub name: Option<String>,
    pub description: Option<String>,
    pub provider_org: Option<String>,
    pub category: Option<String>,
    pub service_type: String,
    pub data_format: Option<String>,
    pub endpoint_url: Option<String>,
    /// Unix seconds of the last listing or detail merge.
    pub last_synced_at: Option<u64>,
    pub operations: Vec<OperationRecord>,
}

impl CatalogRecord {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            description: None,
            provider_org: None,
            category: None,
            service_type: SERVICE_TYPE_REST.to_string(),
            data_format: None,
            endpoint_url: None,
            last_synced_at: None,
            operations: Vec::new(),
        }
    }

    /// Whether a stored detail is complete enough to serve without
    /// extracting again: at least one operation carries parameters.
    pub fn has_cached_detail(&self) -> bool {
        self.operations.iter().any(|op| !op.parameters.is_empty())
    }

    /// Fold a listing entry in. Absent values never overwrite stored ones.
    pub fn merge_summary(&mut self, summary: &CatalogSummary) {
        overwrite(&mut self.name, &summary.name);
        overwrite(&mut self.description, &summary.description);
        overwrite(&mut self.provider_org, &summary.provider_org);
        overwrite(&mut self.category, &summary.category);
        overwrite(&mut self.data_format, &summary.data_format);
        overwrite(&mut self.endpoint_url, &summary.endpoint_url);
        self.service_type = SERVICE_TYPE_REST.to_string();
        self.last_synced_at = now_secs();
    }

    /// Fold a detail result in. Scalars follow the same rule as
    /// [`merge_summary`](Self::merge_summary); operations are replaced.
    pub fn merge_detail(&mut self, detail: &DetailResult) {
        overwrite(&mut self.name, &detail.name);
        overwrite(&mut self.description, &detail.description);
        overwrite(&mut self.provider_org, &detail.provider_org);
        overwrite(&mut self.category, &detail.category);
        overwrite(&mut self.data_format, &detail.data_format);
        overwrite(&mut self.endpoint_url, &detail.service_url);
        self.last_synced_at = now_secs();
        self.operations = detail.operations.iter().map(OperationRecord::from).collect();
    }
}

fn overwrite(slot: &mut Option<String>, value: &Option<String>) {
    if let Some(value) = value {
        *slot = Some(value.clone());
    }
}

fn now_secs() -> Option<u64> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .ok()
        .map(|d| d.as_secs())
}

impl From<&OperationInfo> for OperationRecord {
    fn from(op: &OperationInfo) -> Self {
        let request = op
            .request_params
            .iter()
            .map(|p| ParameterRecord::from_info(p, Direction::Request));
        let response = op
            .response_fields
            .iter()
            .map(|p| ParameterRecord::from_info(p, Direction::Response));

        Self {
            name: op.name.clone(),
            http_method: op.http_method.clone(),
            endpoint_url: op.endpoint_url.clone(),
            parameters: request.chain(response).collect(),
        }
    }
}

impl ParameterRecord {
    pub fn from_info(info: &ParameterInfo, direction: Direction) -> Self {
        let required = direction == Direction::Request
            && matches!(info.division.as_deref(), Some("필") | Some("필수"));

        Self {
            name: info.name_eng.clone().or_else(|| info.name_kor.clone()),
            param_type: info.size.clone(),
            required,
            description: describe(info),
            default_value: info.sample.clone(),
            direction,
        }
    }
}

/// Korean name, then ` - ` and the description when it adds anything.
fn describe(info: &ParameterInfo) -> Option<String> {
    let mut text = info.name_kor.clone().unwrap_or_default();
    if let Some(desc) = &info.description {
        if info.name_kor.as_ref() != Some(desc) {
            if !text.is_empty() {
                text.push_str(" - ");
            }
            text.push_str(desc);
        }
    }
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

impl From<&CatalogRecord> for CatalogSummary {
    fn from(record: &CatalogRecord) -> Self {
        Self {
            id: record.id.clone(),
            name: record.name.clone(),
            description: record.description.clone(),
            provider_org: record.provider_org.clone(),
            category: record.category.clone(),
            data_format: record.data_format.clone(),
            service_type: record.service_type.clone(),
            endpoint_url: record.endpoint_url.clone(),
        }
    }
}

/// Filters for a search over stored records. Blank values match everything.
#[derive(Debug, Clone, Default)]
pub struct LocalFilter {
    /// Case-insensitive substring of the name, description or provider.
    pub keyword: Option<String>,
    pub category: Option<String>,
    pub org: Option<String>,
}

impl LocalFilter {
    pub fn matches(&self, record: &CatalogRecord) -> bool {
        if record.service_type != SERVICE_TYPE_REST {
            return false;
        }
        if let Some(keyword) = filled(&self.keyword) {
            let needle = keyword.to_lowercase();
            let hit = [&record.name, &record.description, &record.provider_org]
                .into_iter()
                .flatten()
                .any(|value| value.to_lowercase().contains(&needle));
            if !hit {
                return false;
            }
        }
        exact(&self.category, &record.category) && exact(&self.org, &record.provider_org)
    }
}

fn filled(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn exact(filter: &Option<String>, value: &Option<String>) -> bool {
    match filled(filter) {
        Some(wanted) => value.as_deref() == Some(wanted),
        None => true,
    }
}

/// Where catalog records are kept between requests.
pub trait CatalogStore {
    fn get(&self, id: &str) -> Result<Option<CatalogRecord>, StoreError>;
    fn put(&self, record: CatalogRecord) -> Result<(), StoreError>;
    /// All records, ordered by id.
    fn list(&self) -> Result<Vec<CatalogRecord>, StoreError>;
}

/// Process-local store.
#[derive(Debug, Default)]
pub struct MemoryCatalogStore {
    records: Mutex<BTreeMap<String, CatalogRecord>>,
}

impl MemoryCatalogStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<String, CatalogRecord>>, StoreError> {
        self.records
            .lock()
            .map_err(|e| StoreError::Unavailable(e.to_string()))
    }
}

impl CatalogStore for MemoryCatalogStore {
    fn get(&self, id: &str) -> Result<Option<CatalogRecord>, StoreError> {
        Ok(self.lock()?.get(id).cloned())
    }

    fn put(&self, record: CatalogRecord) -> Result<(), StoreError> {
        self.lock()?.insert(record.id.clone(), record);
        Ok(())
    }

    fn list(&self) -> Result<Vec<CatalogRecord>, StoreError> {
        Ok(self.lock()?.values().cloned().collect())
    }
}

/// The two engine calls, as the orchestrator consumes them.
pub trait CatalogSource {
    fn search_listing(
        &self,
        page_number: u32,
        page_size: u32,
        keyword: &str,
        category: Option<&str>,
    ) -> Result<SearchResultPage, FetchError>;

    fn fetch_detail(&self, catalog_id: &str) -> Result<DetailResult, FetchError>;
}

impl<F: PageFetch> CatalogSource for CatalogClient<F> {
    fn search_listing(
        &self,
        page_number: u32,
        page_size: u32,
        keyword: &str,
        category: Option<&str>,
    ) -> Result<SearchResultPage, FetchError> {
        CatalogClient::search_listing(self, page_number, page_size, keyword, category)
    }

    fn fetch_detail(&self, catalog_id: &str) -> Result<DetailResult, FetchError> {
        CatalogClient::fetch_detail(self, catalog_id)
    }
}

impl<T: CatalogSource + ?Sized> CatalogSource for Box<T> {
    fn search_listing(
        &self,
        page_number: u32,
        page_size: u32,
        keyword: &str,
        category: Option<&str>,
    ) -> Result<SearchResultPage, FetchError> {
        (**self).search_listing(page_number, page_size, keyword, category)
    }

    fn fetch_detail(&self, catalog_id: &str) -> Result<DetailResult, FetchError> {
        (**self).fetch_detail(catalog_id)
    }
}

/// Outcome of a bulk sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SyncReport {
    pub synced: u64,
    pub created: u64,
    pub updated: u64,
    /// Total reported by the portal on the first page.
    pub portal_total: u64,
}

/// Cache-aware access to catalog details and bulk listing sync.
pub struct CatalogService<S, St> {
    source: S,
    store: St,
    sync_delay: Duration,
}

impl<S: CatalogSource, St: CatalogStore> CatalogService<S, St> {
    pub fn new(source: S, store: St) -> Self {
        Self {
            source,
            store,
            sync_delay: DEFAULT_SYNC_DELAY,
        }
    }

    pub fn with_sync_delay(mut self, delay: Duration) -> Self {
        self.sync_delay = delay;
        self
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn store(&self) -> &St {
        &self.store
    }

    /// Live search, never cached.
    pub fn search(
        &self,
        page_number: u32,
        page_size: u32,
        keyword: &str,
        category: Option<&str>,
    ) -> Result<SearchResultPage, CatalogError> {
        Ok(self
            .source
            .search_listing(page_number, page_size, keyword, category)?)
    }

    /// Live search; when the portal cannot be reached, the same filter runs
    /// over stored records instead.
    pub fn search_with_fallback(
        &self,
        filter: &LocalFilter,
        page_number: u32,
        page_size: u32,
    ) -> Result<SearchResultPage, CatalogError> {
        let keyword = filter.keyword.as_deref().unwrap_or_default();
        match self
            .source
            .search_listing(page_number, page_size, keyword, filter.category.as_deref())
        {
            Ok(page) => Ok(page),
            Err(e) => {
                warn!(error = %e, "portal search failed, searching stored records");
                self.search_local(filter, page_number, page_size)
            }
        }
    }

    /// Search stored REST records, most recently synced first.
    pub fn search_local(
        &self,
        filter: &LocalFilter,
        page_number: u32,
        page_size: u32,
    ) -> Result<SearchResultPage, CatalogError> {
        let mut matches: Vec<CatalogRecord> = self
            .store
            .list()?
            .into_iter()
            .filter(|record| filter.matches(record))
            .collect();
        matches.sort_by(|a, b| {
            b.last_synced_at
                .cmp(&a.last_synced_at)
                .then_with(|| a.id.cmp(&b.id))
        });

        let skip = (page_number.saturating_sub(1) as usize).saturating_mul(page_size as usize);
        let items = matches
            .iter()
            .skip(skip)
            .take(page_size as usize)
            .map(CatalogSummary::from)
            .collect();
        Ok(SearchResultPage {
            items,
            total_count: matches.len() as u64,
            page_number,
            page_size,
        })
    }

    /// Distinct categories of stored REST records, sorted.
    pub fn categories(&self) -> Result<Vec<String>, CatalogError> {
        self.distinct(|record| record.category.as_ref())
    }

    /// Distinct provider organizations of stored REST records, sorted.
    pub fn orgs(&self) -> Result<Vec<String>, CatalogError> {
        self.distinct(|record| record.provider_org.as_ref())
    }

    fn distinct(
        &self,
        field: impl Fn(&CatalogRecord) -> Option<&String>,
    ) -> Result<Vec<String>, CatalogError> {
        let values: BTreeSet<String> = self
            .store
            .list()?
            .iter()
            .filter(|record| record.service_type == SERVICE_TYPE_REST)
            .filter_map(|record| field(record).cloned())
            .collect();
        Ok(values.into_iter().collect())
    }

    /// The stored record when it already holds parameters, otherwise a fresh
    /// extraction merged into the stored record.
    pub fn detail(&self, catalog_id: &str) -> Result<CatalogRecord, CatalogError> {
        let existing = self.store.get(catalog_id)?;
        if let Some(record) = existing.as_ref().filter(|r| r.has_cached_detail()) {
            debug!(catalog_id, "serving cached detail");
            return Ok(record.clone());
        }
        self.extract_and_merge(catalog_id, existing)
    }

    /// Drop stored operations and extract again, ignoring the cache.
    pub fn refresh(&self, catalog_id: &str) -> Result<CatalogRecord, CatalogError> {
        info!(catalog_id, "refreshing detail");
        let existing = self.store.get(catalog_id)?.map(|mut record| {
            record.operations.clear();
            record
        });
        if let Some(record) = &existing {
            self.store.put(record.clone())?;
        }
        self.extract_and_merge(catalog_id, existing)
    }

    fn extract_and_merge(
        &self,
        catalog_id: &str,
        existing: Option<CatalogRecord>,
    ) -> Result<CatalogRecord, CatalogError> {
        let detail = self.source.fetch_detail(catalog_id)?;

        let mut record = match existing {
            Some(record) => record,
            None => CatalogRecord {
                service_type: detail
                    .api_type
                    .clone()
                    .unwrap_or_else(|| SERVICE_TYPE_REST.to_string()),
                ..CatalogRecord::new(catalog_id)
            },
        };
        record.merge_detail(&detail);
        self.store.put(record.clone())?;
        Ok(record)
    }

    /// Walk the listing from page 1 and upsert every entry.
    ///
    /// Stops at the first empty page or after `max_pages`. A failure on the
    /// first page is returned; a failure later ends the sync with what was
    /// stored so far.
    pub fn sync(&self, max_pages: u32, page_size: u32) -> Result<SyncReport, CatalogError> {
        info!(max_pages, page_size, "starting catalog sync");
        let mut report = SyncReport::default();

        for page_number in 1..=max_pages {
            let page = match self.source.search_listing(page_number, page_size, "", None) {
                Ok(page) => page,
                Err(e) if page_number == 1 => return Err(e.into()),
                Err(e) => {
                    warn!(page = page_number, error = %e, "sync stopped early");
                    break;
                }
            };
            if page_number == 1 {
                report.portal_total = page.total_count;
            }
            if page.items.is_empty() {
                break;
            }

            for summary in &page.items {
                let mut record = match self.store.get(&summary.id)? {
                    Some(record) => {
                        report.updated += 1;
                        record
                    }
                    None => {
                        report.created += 1;
                        CatalogRecord::new(summary.id.clone())
                    }
                };
                record.merge_summary(summary);
                self.store.put(record)?;
                report.synced += 1;
            }
            info!(
                page = page_number,
                items = page.items.len(),
                synced = report.synced,
                "synced page"
            );

            if page_number < max_pages && !self.sync_delay.is_zero() {
                thread::sleep(self.sync_delay);
            }
        }

        info!(
            synced = report.synced,
            created = report.created,
            updated = report.updated,
            portal_total = report.portal_total,
            "catalog sync completed"
        );
        Ok(report)
    }
}
