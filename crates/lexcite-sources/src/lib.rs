//! Source adapters: one per legal-data provider, each normalising its own
//! response shape into [`CitationCandidate`]s.

pub mod courtlistener;
mod error;
pub mod federal_register;
pub mod govinfo;
mod http;

use async_trait::async_trait;
use lexcite_core::{CitationCandidate, SourceProvider};

pub use courtlistener::CourtListenerClient;
pub use error::ProviderError;
pub use federal_register::FederalRegisterClient;
pub use govinfo::GovInfoClient;

/// A searchable citation provider.
#[async_trait]
pub trait CitationSource: Send + Sync {
    fn provider(&self) -> SourceProvider;

    /// How many results to ask this provider for when the caller wants
    /// `max_results` overall.
    fn page_size(&self, max_results: usize) -> usize {
        max_results
    }

    /// Search for `query`, returning at most `limit` candidates.
    async fn search(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<CitationCandidate>, ProviderError>;
}
