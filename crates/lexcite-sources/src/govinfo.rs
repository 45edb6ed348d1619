//! GovInfo (Government Publishing Office) adapter.
//!
//! Every request needs an `api_key`; without one the public `DEMO_KEY` is
//! used, which is heavily throttled. Each configured collection is searched
//! separately.
//!
//! Docs: <https://api.govinfo.gov/docs/>

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use futures::future::join_all;
use lexcite_core::candidate::title_or;
use lexcite_core::config::GovInfoConfig;
use lexcite_core::normalize::{
    HeuristicScore, excerpt_or_fallback, extract_cfr_citation, extract_usc_citation, parse_date,
};
use lexcite_core::{CitationCandidate, CitationKind, SourceProvider};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use crate::http::{USER_AGENT, base_url, decode_items, fetch_json, null_as_default};
use crate::{CitationSource, ProviderError};

const PROVIDER: SourceProvider = SourceProvider::GovInfo;

#[derive(Debug, Default, Deserialize)]
pub struct SearchResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    pub results: Vec<serde_json::Value>,
}

impl SearchResponse {
    /// Typed hits; entries that fail to decode are skipped.
    pub fn into_results(self) -> Vec<GovInfoResult> {
        decode_items(PROVIDER, self.results)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GovInfoResult {
    pub package_id: Option<String>,
    pub granule_id: Option<String>,
    pub title: Option<String>,
    pub summary: Option<String>,
    pub date_issued: Option<String>,
    #[serde(rename = "governmentAuthor1")]
    pub government_author: Option<String>,
    pub package_link: Option<String>,
    pub result_link: Option<String>,
    pub html_link: Option<String>,
    pub pdf_link: Option<String>,
    pub download: Option<Download>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Download {
    pub html_link: Option<String>,
    pub pdf_link: Option<String>,
}

impl GovInfoResult {
    fn link(&self) -> Option<String> {
        let download = self.download.as_ref();
        self.package_link
            .as_ref()
            .or(self.result_link.as_ref())
            .or(self.html_link.as_ref())
            .or(download.and_then(|d| d.html_link.as_ref()))
            .or(self.pdf_link.as_ref())
            .or(download.and_then(|d| d.pdf_link.as_ref()))
            .cloned()
    }
}

/// Collection code to citation kind.
pub fn map_collection(collection: &str) -> CitationKind {
    match collection {
        "CFR" | "FR" => CitationKind::Regulation,
        "USCODE" | "PLAW" | "STATUTE" | "BILLS" => CitationKind::Statute,
        _ => CitationKind::Document,
    }
}

fn collection_name(collection: &str) -> &str {
    match collection {
        "CFR" => "Code of Federal Regulations",
        "USCODE" => "United States Code",
        "FR" => "Federal Register",
        "PLAW" => "Public Law",
        other => other,
    }
}

/// GovInfo sends no relevance score.
pub fn estimate_relevance(result: &GovInfoResult, collection: &str, today: NaiveDate) -> u8 {
    let tax_author = result.government_author.as_deref().is_some_and(|a| {
        let a = a.to_lowercase();
        a.contains("internal revenue") || a.contains("treasury")
    });
    HeuristicScore::new(70)
        .bonus(tax_author, 15)
        .recency(result.date_issued.as_deref().and_then(parse_date), today)
        .bonus(matches!(collection, "CFR" | "USCODE"), 10)
        .finish()
}

fn citation(result: &GovInfoResult, collection: &str, title: &str) -> String {
    let extracted = result.title.as_deref().and_then(|t| match collection {
        "CFR" => extract_cfr_citation(t),
        "USCODE" => extract_usc_citation(t),
        _ => None,
    });
    extracted
        .or_else(|| result.title.clone().filter(|t| !t.trim().is_empty()))
        .or_else(|| result.package_id.clone())
        .unwrap_or_else(|| title.to_string())
}

pub fn normalize_result(
    result: &GovInfoResult,
    collection: &str,
    index: usize,
    today: NaiveDate,
) -> CitationCandidate {
    let title = title_or(result.title.as_deref(), "Untitled Document");
    let name = collection_name(collection);
    let rationale = match &result.government_author {
        Some(author) => format!("{name} - {author}"),
        None => format!("From {name}"),
    };

    let mut metadata = BTreeMap::new();
    metadata.insert("collection".into(), json!(collection));
    if let Some(id) = &result.package_id {
        metadata.insert("package_id".into(), json!(id));
    }
    if let Some(date) = &result.date_issued {
        metadata.insert("date_issued".into(), json!(date));
    }
    if let Some(author) = &result.government_author {
        metadata.insert("government_author".into(), json!(author));
    }

    CitationCandidate {
        id: result
            .granule_id
            .clone()
            .or_else(|| result.package_id.clone())
            .unwrap_or_else(|| format!("govinfo-{collection}-{index}")),
        kind: map_collection(collection),
        relevance_score: estimate_relevance(result, collection, today),
        excerpt: excerpt_or_fallback(result.summary.as_deref(), result.title.as_deref()),
        rationale,
        source_provider: PROVIDER,
        external_url: result.link(),
        citation_text: citation(result, collection, &title),
        title,
        metadata,
    }
}

/// Client for the GovInfo search and package summary endpoints.
pub struct GovInfoClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    collections: Vec<String>,
}

impl GovInfoClient {
    pub fn new(client: reqwest::Client, config: &GovInfoConfig) -> Self {
        Self {
            client,
            base_url: base_url(&config.base_url),
            api_key: config.effective_api_key().to_string(),
            collections: config.collections.clone(),
        }
    }

    pub fn search_request(
        &self,
        query: &str,
        collection: &str,
        page_size: usize,
    ) -> reqwest::RequestBuilder {
        let page_size = page_size.to_string();
        self.client
            .get(format!("{}/search", self.base_url))
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .query(&[
                ("query", query),
                ("pageSize", page_size.as_str()),
                ("offsetMark", "*"),
                ("api_key", self.api_key.as_str()),
                ("collection", collection),
            ])
    }

    async fn search_collection(
        &self,
        query: &str,
        collection: &str,
        page_size: usize,
        today: NaiveDate,
    ) -> Result<Vec<CitationCandidate>, ProviderError> {
        let resp: SearchResponse =
            fetch_json(PROVIDER, self.search_request(query, collection, page_size)).await?;
        Ok(resp
            .into_results()
            .iter()
            .take(page_size)
            .enumerate()
            .map(|(i, r)| normalize_result(r, collection, i, today))
            .collect())
    }

    /// Search every configured collection concurrently.
    ///
    /// A failing collection is logged and skipped; the call only fails when
    /// every collection failed.
    pub async fn search_collections(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<CitationCandidate>, ProviderError> {
        if self.collections.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }
        let per_collection = limit.div_ceil(self.collections.len());
        let today = Utc::now().date_naive();
        info!(query, collections = self.collections.len(), per_collection, "searching GovInfo");

        let outcomes = join_all(
            self.collections
                .iter()
                .map(|c| self.search_collection(query, c, per_collection, today)),
        )
        .await;

        let mut candidates = Vec::new();
        let mut last_error = None;
        let mut succeeded = 0usize;
        for (collection, outcome) in self.collections.iter().zip(outcomes) {
            match outcome {
                Ok(found) => {
                    succeeded += 1;
                    candidates.extend(found);
                }
                Err(e) => {
                    warn!(%collection, error = %e, "GovInfo collection search failed");
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) if succeeded == 0 => Err(e),
            _ => {
                candidates.truncate(limit);
                info!(count = candidates.len(), "GovInfo results");
                Ok(candidates)
            }
        }
    }

    /// Fetch a package summary by package id.
    pub async fn get_package(&self, package_id: &str) -> Result<serde_json::Value, ProviderError> {
        let url = format!("{}/packages/{}/summary", self.base_url, package_id);
        info!(url = %url, "fetching GovInfo package");
        fetch_json(
            PROVIDER,
            self.client
                .get(url)
                .header(reqwest::header::USER_AGENT, USER_AGENT)
                .query(&[("api_key", self.api_key.as_str())]),
        )
        .await
    }
}

#[async_trait]
impl CitationSource for GovInfoClient {
    fn provider(&self) -> SourceProvider {
        PROVIDER
    }

    async fn search(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<CitationCandidate>, ProviderError> {
        self.search_collections(query, limit).await
    }
}
