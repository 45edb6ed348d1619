//! Citation search orchestration: concurrent aggregation across sources and
//! debounced, latest-wins suggestions for an editor.

pub mod aggregator;
pub mod suggest;

pub use aggregator::{Aggregator, SearchOptions, SearchOutcome, SourceFailure};
pub use suggest::{CitationSearch, SearchError, SuggestionEngine, SuggestionState};
