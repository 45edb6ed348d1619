pub mod candidate;
pub mod config;
pub mod demo;
pub mod normalize;
pub mod trigger;

pub use candidate::{CitationCandidate, CitationKind, SourceProvider};
pub use config::{ApiStatus, ConfigError, SearchConfig};
pub use demo::{demo_suggestions, filter_demo};
pub use trigger::{Splice, TriggerDetector, TriggerMatch, TriggerRule, detect_trigger};
