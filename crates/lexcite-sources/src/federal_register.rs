//! Federal Register adapter. Free API, no authentication.
//!
//! Docs: <https://www.federalregister.gov/developers/documentation/api/v1>

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use lexcite_core::candidate::title_or;
use lexcite_core::config::FederalRegisterConfig;
use lexcite_core::normalize::{HeuristicScore, excerpt_or_fallback, parse_date};
use lexcite_core::{CitationCandidate, CitationKind, SourceProvider};
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use crate::http::{USER_AGENT, base_url, decode_items, fetch_json, null_as_default, value_text};
use crate::{CitationSource, ProviderError};

const PROVIDER: SourceProvider = SourceProvider::FederalRegister;

#[derive(Debug, Default, Deserialize)]
pub struct SearchResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    pub results: Vec<serde_json::Value>,
}

impl SearchResponse {
    /// Typed hits; entries that fail to decode are skipped.
    pub fn into_results(self) -> Vec<FrDocument> {
        decode_items(PROVIDER, self.results)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FrDocument {
    pub document_number: Option<String>,
    pub title: Option<String>,
    #[serde(rename = "type")]
    pub doc_type: Option<String>,
    #[serde(rename = "abstract")]
    pub abstract_text: Option<String>,
    pub html_url: Option<String>,
    pub pdf_url: Option<String>,
    pub publication_date: Option<String>,
    pub citation: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub agencies: Vec<FrAgency>,
    #[serde(deserialize_with = "null_as_default")]
    pub cfr_references: Vec<CfrReference>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FrAgency {
    pub name: Option<String>,
    pub short_name: Option<String>,
    pub slug: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CfrReference {
    pub title: serde_json::Value,
    pub part: serde_json::Value,
}

impl CfrReference {
    fn label(&self) -> Option<String> {
        Some(format!(
            "{} CFR {}",
            value_text(&self.title)?,
            value_text(&self.part)?
        ))
    }
}

/// Map a Federal Register document type onto a citation kind.
pub fn map_document_type(doc_type: Option<&str>) -> CitationKind {
    match doc_type {
        Some("Rule" | "Proposed Rule" | "Correction") => CitationKind::Regulation,
        Some("Presidential Document") => CitationKind::Statute,
        _ => CitationKind::Guidance,
    }
}

/// The Federal Register sends no relevance score, so estimate one.
pub fn estimate_relevance(doc: &FrDocument, today: NaiveDate) -> u8 {
    let irs = doc.agencies.iter().any(|a| {
        a.slug
            .as_deref()
            .is_some_and(|s| s.contains("internal-revenue"))
    });
    HeuristicScore::new(70)
        .bonus(irs, 15)
        .recency(doc.publication_date.as_deref().and_then(parse_date), today)
        .bonus(doc.doc_type.as_deref() == Some("Rule"), 5)
        .finish()
}

fn rationale(doc: &FrDocument) -> String {
    let doc_type = doc.doc_type.as_deref().unwrap_or("Document");
    let cfr: Vec<String> = doc.cfr_references.iter().filter_map(CfrReference::label).collect();
    if !cfr.is_empty() {
        return format!("{doc_type} affecting {}", cfr.join(", "));
    }
    let agencies: Vec<&str> = doc
        .agencies
        .iter()
        .filter_map(|a| a.short_name.as_deref().or(a.name.as_deref()))
        .collect();
    if !agencies.is_empty() {
        return format!("{doc_type} from {}", agencies.join(", "));
    }
    format!("Federal Register {doc_type}")
}

/// `89 FR 1234 (Jan 5, 2024)`, falling back to the document number.
fn citation(doc: &FrDocument, title: &str) -> String {
    let base = doc
        .citation
        .as_deref()
        .or(doc.document_number.as_deref())
        .unwrap_or(title);
    match doc.publication_date.as_deref().and_then(parse_date) {
        Some(date) => format!("{base} ({})", date.format("%b %-d, %Y")),
        None => base.to_string(),
    }
}

/// Convert one API document into a candidate. `index` disambiguates
/// documents that arrive without a document number.
pub fn normalize_document(doc: &FrDocument, index: usize, today: NaiveDate) -> CitationCandidate {
    let title = title_or(doc.title.as_deref(), "Untitled Document");

    let mut metadata = BTreeMap::new();
    if let Some(number) = &doc.document_number {
        metadata.insert("document_number".into(), json!(number));
    }
    if let Some(date) = &doc.publication_date {
        metadata.insert("publication_date".into(), json!(date));
    }
    let agencies: Vec<&str> = doc.agencies.iter().filter_map(|a| a.name.as_deref()).collect();
    metadata.insert("agencies".into(), json!(agencies));
    let cfr: Vec<String> = doc.cfr_references.iter().filter_map(CfrReference::label).collect();
    metadata.insert("cfr_references".into(), json!(cfr));

    CitationCandidate {
        id: doc
            .document_number
            .clone()
            .unwrap_or_else(|| format!("fr-{index}")),
        kind: map_document_type(doc.doc_type.as_deref()),
        relevance_score: estimate_relevance(doc, today),
        excerpt: excerpt_or_fallback(doc.abstract_text.as_deref(), doc.title.as_deref()),
        rationale: rationale(doc),
        source_provider: PROVIDER,
        external_url: doc.html_url.clone().or_else(|| doc.pdf_url.clone()),
        citation_text: citation(doc, &title),
        title,
        metadata,
    }
}

/// Client for `GET /documents.json`.
pub struct FederalRegisterClient {
    client: reqwest::Client,
    base_url: String,
    agencies: Vec<String>,
}

impl FederalRegisterClient {
    pub fn new(client: reqwest::Client, config: &FederalRegisterConfig) -> Self {
        Self {
            client,
            base_url: base_url(&config.base_url),
            agencies: config.agencies.clone(),
        }
    }

    pub fn search_request(&self, query: &str, per_page: usize) -> reqwest::RequestBuilder {
        let mut params: Vec<(&str, String)> = vec![
            ("conditions[term]", query.to_string()),
            ("per_page", per_page.to_string()),
            ("order", "relevance".to_string()),
        ];
        for agency in &self.agencies {
            params.push(("conditions[agencies][]", agency.clone()));
        }
        self.client
            .get(format!("{}/documents.json", self.base_url))
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .query(&params)
    }

    pub async fn search_documents(
        &self,
        query: &str,
        per_page: usize,
    ) -> Result<Vec<CitationCandidate>, ProviderError> {
        info!(query, per_page, "searching Federal Register");
        let resp: SearchResponse = fetch_json(PROVIDER, self.search_request(query, per_page)).await?;
        let today = Utc::now().date_naive();
        let candidates: Vec<CitationCandidate> = resp
            .into_results()
            .iter()
            .take(per_page)
            .enumerate()
            .map(|(i, doc)| normalize_document(doc, i, today))
            .collect();
        info!(count = candidates.len(), "Federal Register results");
        Ok(candidates)
    }

    /// Fetch one document's full record by document number.
    pub async fn get_document(
        &self,
        document_number: &str,
    ) -> Result<serde_json::Value, ProviderError> {
        let url = format!("{}/documents/{}.json", self.base_url, document_number);
        info!(url = %url, "fetching Federal Register document");
        fetch_json(
            PROVIDER,
            self.client
                .get(url)
                .header(reqwest::header::USER_AGENT, USER_AGENT),
        )
        .await
    }
}

#[async_trait]
impl CitationSource for FederalRegisterClient {
    fn provider(&self) -> SourceProvider {
        PROVIDER
    }

    async fn search(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<CitationCandidate>, ProviderError> {
        self.search_documents(query, limit).await
    }
}
