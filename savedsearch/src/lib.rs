//! Saved searches over a Solr job index.
//!
//! Turns saved-search criteria into escaped Solr boolean queries, runs grouped
//! (field-collapsing) searches against Solr and stores saved searches in Redis.

pub mod backend;
pub mod config;
pub mod errors;
pub mod group;
pub mod id;
pub mod keys;
pub mod location;
pub mod query;
pub mod registry;
pub mod saved_search;
pub mod store;
pub mod validators;
pub mod value;

pub use backend::{FacetCounts, GroupedResponse, GroupedResult, SearchHit, SearchState, SolrGroupBackend};
pub use config::{AppConfig, RedisSettings, SolrSettings};
pub use errors::*;
pub use group::{Connector, GroupNode, GroupQuery, GroupTree};
pub use query::{FieldKind, SearchField, build_clause, compose, escape};
pub use registry::{DocumentType, DocumentTypeRegistration, DocumentTypeRegistry};
pub use saved_search::{SavedSearch, SiteScope};
pub use store::SavedSearchRepo;
pub use value::FieldValue;

// Re-export redis types so users don't need to depend on a specific redis version
pub use redis;
pub use redis::aio::ConnectionManager;

// Re-export inventory for static document type registration
pub use inventory;

/// Delete all keys matching a pattern (for test cleanup).
///
/// This performs a SCAN + DEL operation to safely delete keys without blocking Redis.
pub async fn cleanup_pattern(conn: &mut ConnectionManager, pattern: &str) -> Result<u64, SearchError> {
    const SCAN_COUNT: usize = 1000;
    let mut cursor: u64 = 0;
    let mut total_deleted: u64 = 0;

    loop {
        let (next_cursor, keys): (u64, Vec<String>) = redis::cmd("SCAN")
            .arg(cursor)
            .arg("MATCH")
            .arg(pattern)
            .arg("COUNT")
            .arg(SCAN_COUNT)
            .query_async(conn)
            .await?;

        if !keys.is_empty() {
            let deleted: u64 = redis::cmd("DEL").arg(&keys).query_async(conn).await?;
            total_deleted += deleted;
        }

        cursor = next_cursor;
        if cursor == 0 {
            break;
        }
    }

    Ok(total_deleted)
}
