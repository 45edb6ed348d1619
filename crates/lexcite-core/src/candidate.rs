//! Normalised citation candidates shared by every source adapter.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Classification used to group candidates for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CitationKind {
    Statute,
    Regulation,
    Case,
    Guidance,
    Document,
}

impl CitationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Statute => "Statute",
            Self::Regulation => "Regulation",
            Self::Case => "Case",
            Self::Guidance => "Guidance",
            Self::Document => "Document",
        }
    }
}

impl fmt::Display for CitationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The provider a candidate came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceProvider {
    FederalRegister,
    #[serde(rename = "courtlistener")]
    CourtListener,
    #[serde(rename = "govinfo")]
    GovInfo,
    Demo,
}

impl SourceProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FederalRegister => "federal_register",
            Self::CourtListener => "courtlistener",
            Self::GovInfo => "govinfo",
            Self::Demo => "demo",
        }
    }
}

impl fmt::Display for SourceProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One search hit, in the same shape regardless of which provider produced it.
///
/// Built fresh per search call and dropped once the caller has rendered it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CitationCandidate {
    /// Adapter-local identifier.
    pub id: String,
    /// Never empty; adapters substitute a placeholder.
    pub title: String,
    pub kind: CitationKind,
    /// Percentage in `[0, 100]`. Only used for ordering.
    pub relevance_score: u8,
    pub excerpt: String,
    pub rationale: String,
    pub source_provider: SourceProvider,
    pub external_url: Option<String>,
    /// Canonical form inserted into the document when the candidate is accepted.
    pub citation_text: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl CitationCandidate {
    /// Text to splice into a document: the citation, or the title when the
    /// provider gave no usable citation.
    pub fn insertion_text(&self) -> &str {
        if self.citation_text.trim().is_empty() {
            &self.title
        } else {
            &self.citation_text
        }
    }
}

/// Substitute `placeholder` for a missing or blank title.
pub fn title_or(title: Option<&str>, placeholder: &str) -> String {
    match title.map(str::trim) {
        Some(t) if !t.is_empty() => t.to_string(),
        _ => placeholder.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(citation: &str) -> CitationCandidate {
        CitationCandidate {
            id: "fr-2024-00001".into(),
            title: "Section 162 Business Expenses".into(),
            kind: CitationKind::Regulation,
            relevance_score: 85,
            excerpt: "Final regulations under section 162.".into(),
            rationale: "Rule from IRS".into(),
            source_provider: SourceProvider::FederalRegister,
            external_url: None,
            citation_text: citation.into(),
            metadata: BTreeMap::new(),
        }
    }

    #[test]
    fn provider_serialises_to_wire_names() {
        let names: Vec<String> = [
            SourceProvider::FederalRegister,
            SourceProvider::CourtListener,
            SourceProvider::GovInfo,
            SourceProvider::Demo,
        ]
        .iter()
        .map(|p| serde_json::to_string(p).unwrap())
        .collect();
        assert_eq!(
            names,
            ["\"federal_register\"", "\"courtlistener\"", "\"govinfo\"", "\"demo\""]
        );
        for p in [SourceProvider::CourtListener, SourceProvider::GovInfo] {
            assert_eq!(serde_json::to_string(&p).unwrap(), format!("\"{}\"", p.as_str()));
        }
    }

    #[test]
    fn candidate_json_without_metadata() {
        let json = r#"{
            "id": "demo-1",
            "title": "IRC section 162(a)",
            "kind": "Statute",
            "relevance_score": 95,
            "excerpt": "There shall be allowed as a deduction...",
            "rationale": "Business expense standard",
            "source_provider": "demo",
            "external_url": null,
            "citation_text": "26 U.S.C. § 162(a)"
        }"#;
        let parsed: CitationCandidate = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.kind, CitationKind::Statute);
        assert_eq!(parsed.source_provider, SourceProvider::Demo);
        assert!(parsed.metadata.is_empty());
    }

    #[test]
    fn insertion_text_prefers_citation() {
        assert_eq!(candidate("89 FR 1234").insertion_text(), "89 FR 1234");
        assert_eq!(
            candidate("  ").insertion_text(),
            "Section 162 Business Expenses"
        );
    }

    #[test]
    fn blank_title_gets_placeholder() {
        assert_eq!(title_or(None, "Untitled Case"), "Untitled Case");
        assert_eq!(title_or(Some("   "), "Untitled Case"), "Untitled Case");
        assert_eq!(title_or(Some(" Smith v. Commissioner "), "x"), "Smith v. Commissioner");
    }
}
