mod database;
mod document_repository;
mod metadata_repository;
mod node_repository;
mod sync_state_repository;

pub use database::{Connection, Database, SCHEMA_VERSION};
pub use document_repository::DocumentRepository;
pub use metadata_repository::MetadataRepository;
pub use node_repository::{NodeRepository, RecentFilter, TextHit, TextScope};
pub use sync_state_repository::SyncStateRepository;
