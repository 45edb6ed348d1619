//! Static demo suggestions, used when no live provider returns anything.

use std::collections::BTreeMap;

use crate::candidate::{CitationCandidate, CitationKind, SourceProvider};

/// Keywords that select a demo item when present in both query and item.
const TRACKED_KEYWORDS: &[&str] = &[
    "162",
    "183",
    "business",
    "expense",
    "deduction",
    "profit",
    "hobby",
];

/// Queries longer than this (in characters) get every demo item.
const GENERIC_QUERY_CHARS: usize = 10;

struct DemoEntry {
    id: &'static str,
    title: &'static str,
    kind: CitationKind,
    score: u8,
    excerpt: &'static str,
    rationale: &'static str,
    url: &'static str,
    citation: &'static str,
    court: Option<&'static str>,
}

const DEMO_ENTRIES: &[DemoEntry] = &[
    DemoEntry {
        id: "demo-1",
        title: "IRC section 162(a)",
        kind: CitationKind::Statute,
        score: 95,
        excerpt: "There shall be allowed as a deduction all the ordinary and necessary expenses paid or incurred during the taxable year in carrying on any trade or business...",
        rationale: "Defines ordinary and necessary business expense standard",
        url: "https://www.law.cornell.edu/uscode/text/26/162",
        citation: "26 U.S.C. § 162(a)",
        court: None,
    },
    DemoEntry {
        id: "demo-2",
        title: "Smith v. Commissioner, 138 T.C. 121 (2012)",
        kind: CitationKind::Case,
        score: 92,
        excerpt: "The taxpayer must demonstrate by adequate records or sufficient evidence substantiating each element of the claimed expense under Section 274(d).",
        rationale: "Addresses substantiation requirements for business expenses",
        url: "https://www.courtlistener.com",
        citation: "Smith v. Commissioner, 138 T.C. 121 (2012)",
        court: Some("Tax Court"),
    },
    DemoEntry {
        id: "demo-3",
        title: "Treas. Reg. section 1.183-2(b)",
        kind: CitationKind::Regulation,
        score: 88,
        excerpt: "Whether an activity is engaged in for profit is determined by reference to objective standards...",
        rationale: "Nine-factor test for profit motive in hobby loss cases",
        url: "https://www.ecfr.gov",
        citation: "26 C.F.R. § 1.183-2(b)",
        court: None,
    },
];

impl DemoEntry {
    fn searchable_text(&self) -> String {
        format!("{} {} {}", self.title, self.excerpt, self.rationale).to_lowercase()
    }

    fn to_candidate(&self) -> CitationCandidate {
        let mut metadata = BTreeMap::new();
        if let Some(court) = self.court {
            metadata.insert("court".to_string(), court.into());
        }
        CitationCandidate {
            id: self.id.to_string(),
            title: self.title.to_string(),
            kind: self.kind,
            relevance_score: self.score,
            excerpt: self.excerpt.to_string(),
            rationale: self.rationale.to_string(),
            source_provider: SourceProvider::Demo,
            external_url: Some(self.url.to_string()),
            citation_text: self.citation.to_string(),
            metadata,
        }
    }
}

/// The full demo set, in its fixed order.
pub fn demo_suggestions() -> Vec<CitationCandidate> {
    DEMO_ENTRIES.iter().map(DemoEntry::to_candidate).collect()
}

/// Demo items relevant to `query`.
///
/// An item is kept when a tracked keyword occurs in both the query and the
/// item text (case-insensitive), or unconditionally for long queries.
pub fn filter_demo(query: &str) -> Vec<CitationCandidate> {
    let lower_query = query.to_lowercase();
    let generic = query.chars().count() > GENERIC_QUERY_CHARS;

    DEMO_ENTRIES
        .iter()
        .filter(|entry| {
            let text = entry.searchable_text();
            generic
                || TRACKED_KEYWORDS
                    .iter()
                    .any(|kw| lower_query.contains(kw) && text.contains(kw))
        })
        .map(DemoEntry::to_candidate)
        .collect()
}
