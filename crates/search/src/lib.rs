pub mod engine;
pub mod query;
pub mod types;

pub use engine::{calculate_score, SearchEngine};
pub use types::{SearchFilters, SearchParams, SearchResults, SortMode};
