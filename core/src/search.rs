//! Full-text search and recent-changes listings.

mod engine;
mod query;

pub use engine::{RecentQuery, SearchEngine, SearchScope};
pub use query::to_fts_query;
