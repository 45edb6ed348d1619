//! CourtListener (Free Law Project) case law adapter.
//!
//! Works anonymously; an API token only raises the rate limit.
//! Docs: <https://www.courtlistener.com/help/api/rest/>

use std::collections::BTreeMap;

use async_trait::async_trait;
use lexcite_core::candidate::title_or;
use lexcite_core::config::CourtListenerConfig;
use lexcite_core::normalize::{excerpt_or_fallback, normalize_raw_score, year_of};
use lexcite_core::{CitationCandidate, CitationKind, SourceProvider};
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use crate::http::{USER_AGENT, base_url, decode_items, fetch_json, null_as_default, value_text};
use crate::{CitationSource, ProviderError};

const PROVIDER: SourceProvider = SourceProvider::CourtListener;

/// Score used when the search backend sends none.
const DEFAULT_SCORE: u8 = 70;

#[derive(Debug, Default, Deserialize)]
pub struct SearchResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    pub results: Vec<serde_json::Value>,
}

impl SearchResponse {
    /// Typed hits; entries that fail to decode are skipped.
    pub fn into_results(self) -> Vec<ClResult> {
        decode_items(PROVIDER, self.results)
    }
}

/// One search hit. The v3 and v4 APIs disagree on casing, so both spellings
/// are accepted and merged in the accessors below.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ClResult {
    pub id: serde_json::Value,
    pub cluster_id: serde_json::Value,
    pub case_name: Option<String>,
    #[serde(rename = "caseName")]
    pub case_name_camel: Option<String>,
    pub court: Option<String>,
    pub court_id: Option<String>,
    pub date_filed: Option<String>,
    #[serde(rename = "dateFiled")]
    pub date_filed_camel: Option<String>,
    pub docket_number: Option<String>,
    #[serde(rename = "docketNumber")]
    pub docket_number_camel: Option<String>,
    pub status: Option<String>,
    pub score: Option<f64>,
    pub snippet: Option<String>,
    pub text: Option<String>,
    pub citation: Option<CitationField>,
    pub absolute_url: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub opinions: Vec<ClOpinion>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ClOpinion {
    pub snippet: Option<String>,
}

/// `citation` is a string on some endpoints and a list on others.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum CitationField {
    One(String),
    Many(Vec<Option<String>>),
}

impl CitationField {
    fn first(&self) -> Option<&str> {
        let s = match self {
            Self::One(s) => Some(s.as_str()),
            Self::Many(v) => v
                .iter()
                .flatten()
                .map(String::as_str)
                .find(|s| !s.trim().is_empty()),
        };
        s.map(str::trim).filter(|s| !s.is_empty())
    }
}

impl ClResult {
    fn case_name(&self) -> Option<&str> {
        self.case_name_camel.as_deref().or(self.case_name.as_deref())
    }

    fn date_filed(&self) -> Option<&str> {
        self.date_filed_camel.as_deref().or(self.date_filed.as_deref())
    }

    fn docket_number(&self) -> Option<&str> {
        self.docket_number_camel
            .as_deref()
            .or(self.docket_number.as_deref())
    }

    /// Short court code, e.g. `tax`. v4 puts the full name in `court`.
    fn court_code(&self) -> Option<&str> {
        self.court_id.as_deref().or(self.court.as_deref())
    }

    fn body(&self) -> Option<&str> {
        self.snippet
            .as_deref()
            .or_else(|| self.opinions.iter().find_map(|o| o.snippet.as_deref()))
            .or(self.text.as_deref())
    }
}

/// Human-readable court for a CourtListener court code.
pub fn court_label(code: Option<&str>) -> &'static str {
    match code {
        Some("tax") => "Tax Court",
        Some("scotus") => "Supreme Court",
        Some("ca1") => "1st Circuit",
        Some("ca2") => "2nd Circuit",
        Some("ca3") => "3rd Circuit",
        Some("ca4") => "4th Circuit",
        Some("ca5") => "5th Circuit",
        Some("ca6") => "6th Circuit",
        Some("ca7") => "7th Circuit",
        Some("ca8") => "8th Circuit",
        Some("ca9") => "9th Circuit",
        Some("ca10") => "10th Circuit",
        Some("ca11") => "11th Circuit",
        Some("cadc") => "D.C. Circuit",
        Some("cafc") => "Federal Circuit",
        _ => "Federal Court",
    }
}

/// Provider scores are unbounded; squeeze them into `[50, 99]`.
pub fn relevance(score: Option<f64>) -> u8 {
    match score {
        Some(s) if s > 0.0 => normalize_raw_score(s, 50, 99),
        _ => DEFAULT_SCORE,
    }
}

pub fn normalize_result(result: &ClResult, index: usize, site_url: &str) -> CitationCandidate {
    let title = title_or(result.case_name(), "Untitled Case");
    let court = court_label(result.court_code());
    let year = result.date_filed().and_then(year_of);

    let rationale = match year {
        Some(y) => format!("{court} decision ({y})"),
        None => format!("{court} case"),
    };

    let citation_text = match result.citation.as_ref().and_then(CitationField::first) {
        Some(c) => c.to_string(),
        None => match year {
            Some(y) => format!("{title} ({y})"),
            None => title.clone(),
        },
    };

    let external_url = result.absolute_url.as_deref().map(|path| {
        if path.starts_with("http") {
            path.to_string()
        } else {
            format!("{}{}", site_url.trim_end_matches('/'), path)
        }
    });

    let mut metadata = BTreeMap::new();
    metadata.insert("court".into(), json!(court));
    if let Some(code) = result.court_code() {
        metadata.insert("court_id".into(), json!(code));
    }
    if let Some(date) = result.date_filed() {
        metadata.insert("date_filed".into(), json!(date));
    }
    if let Some(docket) = result.docket_number() {
        metadata.insert("docket_number".into(), json!(docket));
    }
    if let Some(status) = &result.status {
        metadata.insert("status".into(), json!(status));
    }

    CitationCandidate {
        id: value_text(&result.id)
            .or_else(|| value_text(&result.cluster_id))
            .unwrap_or_else(|| format!("cl-{index}")),
        kind: CitationKind::Case,
        relevance_score: relevance(result.score),
        excerpt: excerpt_or_fallback(result.body(), result.case_name()),
        rationale,
        source_provider: PROVIDER,
        external_url,
        citation_text,
        title,
        metadata,
    }
}

/// Client for opinion search and lookup.
pub struct CourtListenerClient {
    client: reqwest::Client,
    base_url: String,
    site_url: String,
    api_token: Option<String>,
    courts: Vec<String>,
    order_by: String,
}

impl CourtListenerClient {
    pub fn new(client: reqwest::Client, config: &CourtListenerConfig) -> Self {
        Self {
            client,
            base_url: base_url(&config.base_url),
            site_url: base_url(&config.site_url),
            api_token: config
                .api_token
                .clone()
                .filter(|t| !t.trim().is_empty()),
            courts: config.courts.clone(),
            order_by: config.order_by.clone(),
        }
    }

    fn get(&self, url: String) -> reqwest::RequestBuilder {
        let req = self
            .client
            .get(url)
            .header(reqwest::header::USER_AGENT, USER_AGENT);
        match &self.api_token {
            Some(token) => req.header(reqwest::header::AUTHORIZATION, format!("Token {token}")),
            None => req,
        }
    }

    pub fn search_request(&self, query: &str) -> reqwest::RequestBuilder {
        let mut params: Vec<(&str, &str)> = vec![
            ("q", query),
            ("type", "o"),
            ("order_by", self.order_by.as_str()),
        ];
        for court in &self.courts {
            params.push(("court", court.as_str()));
        }
        self.get(format!("{}/search/", self.base_url)).query(&params)
    }

    pub async fn search_opinions(
        &self,
        query: &str,
        per_page: usize,
    ) -> Result<Vec<CitationCandidate>, ProviderError> {
        info!(
            query,
            per_page,
            authenticated = self.api_token.is_some(),
            "searching CourtListener"
        );
        let resp: SearchResponse = fetch_json(PROVIDER, self.search_request(query)).await?;
        let candidates: Vec<CitationCandidate> = resp
            .into_results()
            .iter()
            .take(per_page)
            .enumerate()
            .map(|(i, r)| normalize_result(r, i, &self.site_url))
            .collect();
        info!(count = candidates.len(), "CourtListener results");
        Ok(candidates)
    }

    /// Fetch a single opinion record.
    pub async fn get_opinion(&self, opinion_id: &str) -> Result<serde_json::Value, ProviderError> {
        let url = format!("{}/opinions/{}/", self.base_url, opinion_id);
        info!(url = %url, "fetching CourtListener opinion");
        fetch_json(PROVIDER, self.get(url)).await
    }
}

#[async_trait]
impl CitationSource for CourtListenerClient {
    fn provider(&self) -> SourceProvider {
        PROVIDER
    }

    /// Case law takes at most half of the result slots.
    fn page_size(&self, max_results: usize) -> usize {
        max_results.div_ceil(2)
    }

    async fn search(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<CitationCandidate>, ProviderError> {
        self.search_opinions(query, limit).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SITE: &str = "https://www.courtlistener.com";

    fn parse(json: &str) -> ClResult {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn v4_search_hit() {
        let r = parse(
            r#"{
                "caseName": "Smith v. Commissioner",
                "cluster_id": 2718281,
                "court": "United States Tax Court",
                "court_id": "tax",
                "dateFiled": "2012-03-01",
                "docketNumber": "1234-10",
                "citation": ["138 T.C. 121", "2012 WL 12345"],
                "absolute_url": "/opinion/2718281/smith-v-commissioner/",
                "status": "Published",
                "opinions": [{"snippet": "the <mark>substantiation</mark> requirements of section 274(d)"}]
            }"#,
        );
        let c = normalize_result(&r, 0, SITE);
        assert_eq!(c.id, "2718281");
        assert_eq!(c.title, "Smith v. Commissioner");
        assert_eq!(c.kind, CitationKind::Case);
        assert_eq!(c.relevance_score, 70);
        assert_eq!(c.excerpt, "the substantiation requirements of section 274(d)");
        assert_eq!(c.rationale, "Tax Court decision (2012)");
        assert_eq!(c.citation_text, "138 T.C. 121");
        assert_eq!(
            c.external_url.as_deref(),
            Some("https://www.courtlistener.com/opinion/2718281/smith-v-commissioner/")
        );
        assert_eq!(c.metadata["court"], "Tax Court");
        assert_eq!(c.metadata["docket_number"], "1234-10");
    }

    #[test]
    fn snake_case_fields_and_string_citation() {
        let r = parse(
            r#"{
                "id": 99,
                "case_name": "Jones v. Commissioner",
                "court": "ca9",
                "date_filed": "2019-11-20T00:00:00-08:00",
                "citation": "940 F.3d 1",
                "score": 12.6
            }"#,
        );
        let c = normalize_result(&r, 0, SITE);
        assert_eq!(c.id, "99");
        assert_eq!(c.title, "Jones v. Commissioner");
        assert_eq!(c.rationale, "9th Circuit decision (2019)");
        assert_eq!(c.citation_text, "940 F.3d 1");
        assert_eq!(c.relevance_score, 50);
        // No body text: the case name stands in.
        assert_eq!(c.excerpt, "Jones v. Commissioner");
    }

    #[test]
    fn empty_result_degrades_gracefully() {
        let r = parse("{}");
        let c = normalize_result(&r, 4, SITE);
        assert_eq!(c.id, "cl-4");
        assert_eq!(c.title, "Untitled Case");
        assert_eq!(c.rationale, "Federal Court case");
        assert_eq!(c.citation_text, "Untitled Case");
        assert_eq!(c.excerpt, "No excerpt available.");
        assert!(c.external_url.is_none());
    }

    #[test]
    fn citation_synthesised_from_name_and_year() {
        let r = parse(r#"{"caseName": "Doe v. Commissioner", "dateFiled": "2001-02-03", "citation": []}"#);
        let c = normalize_result(&r, 0, SITE);
        assert_eq!(c.citation_text, "Doe v. Commissioner (2001)");
    }

    #[test]
    fn score_is_clamped() {
        assert_eq!(relevance(None), 70);
        assert_eq!(relevance(Some(0.0)), 70);
        assert_eq!(relevance(Some(3.2)), 50);
        assert_eq!(relevance(Some(77.5)), 78);
        assert_eq!(relevance(Some(4_000.0)), 99);
    }

    #[test]
    fn court_table() {
        assert_eq!(court_label(Some("scotus")), "Supreme Court");
        assert_eq!(court_label(Some("cadc")), "D.C. Circuit");
        assert_eq!(court_label(Some("United States Tax Court")), "Federal Court");
        assert_eq!(court_label(None), "Federal Court");
    }

    #[test]
    fn token_header_only_when_configured() {
        let anon = CourtListenerClient::new(reqwest::Client::new(), &CourtListenerConfig::default());
        let req = anon.search_request("hobby loss").build().unwrap();
        assert!(req.headers().get(reqwest::header::AUTHORIZATION).is_none());

        let authed = CourtListenerClient::new(
            reqwest::Client::new(),
            &CourtListenerConfig {
                api_token: Some("secret".into()),
                courts: vec!["tax".into(), "scotus".into()],
                ..Default::default()
            },
        );
        let req = authed.search_request("hobby loss").build().unwrap();
        assert_eq!(req.headers()[reqwest::header::AUTHORIZATION], "Token secret");
        assert_eq!(req.url().path(), "/api/rest/v4/search/");
        let pairs: Vec<(String, String)> = req.url().query_pairs().into_owned().collect();
        assert!(pairs.contains(&("q".into(), "hobby loss".into())));
        assert!(pairs.contains(&("type".into(), "o".into())));
        assert!(pairs.contains(&("order_by".into(), "score desc".into())));
        let courts: Vec<&str> = pairs
            .iter()
            .filter(|(k, _)| k == "court")
            .map(|(_, v)| v.as_str())
            .collect();
        assert_eq!(courts, ["tax", "scotus"]);
    }

    #[test]
    fn case_law_gets_half_the_slots() {
        let client = CourtListenerClient::new(reqwest::Client::new(), &CourtListenerConfig::default());
        assert_eq!(client.page_size(10), 5);
        assert_eq!(client.page_size(7), 4);
    }

    const MIXED_PAGE: &str = r#"{
        "count": 3,
        "results": [
            {"caseName": "Smith v. Commissioner", "court_id": "tax", "score": 12.5},
            {"caseName": "Broken v. Commissioner", "score": "12.5"},
            {"caseName": "Doe v. Commissioner", "citation": [null, "138 T.C. 121"]}
        ]
    }"#;

    #[test]
    fn malformed_hit_does_not_sink_the_page() {
        let resp: SearchResponse = serde_json::from_str(MIXED_PAGE).unwrap();
        let results = resp.into_results();
        let names: Vec<_> = results.iter().map(|r| r.case_name()).collect();
        assert_eq!(names, [Some("Smith v. Commissioner"), Some("Doe v. Commissioner")]);
        assert_eq!(normalize_result(&results[1], 1, SITE).citation_text, "138 T.C. 121");
    }

    #[tokio::test]
    async fn search_keeps_good_hits_over_http() {
        let base = crate::http::test_server::serve(|line| {
            assert!(line.starts_with("GET /search/?q=hobby"), "{line}");
            (200, MIXED_PAGE.to_string())
        })
        .await;
        let client = CourtListenerClient::new(
            reqwest::Client::new(),
            &CourtListenerConfig {
                base_url: base,
                ..Default::default()
            },
        );
        let found = client.search_opinions("hobby loss", 5).await.unwrap();
        let titles: Vec<&str> = found.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(titles, ["Smith v. Commissioner", "Doe v. Commissioner"]);
    }
}
